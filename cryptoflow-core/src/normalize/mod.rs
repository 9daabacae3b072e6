//! Response normalization: raw market charts → one typed table.

pub mod join;
pub mod normalizer;
pub mod schema;
pub mod table;

pub use join::{date_key_from_millis, join_series, round2, JoinedPoint};
pub use normalizer::{NormalizeError, ResponseNormalizer};
pub use schema::{SchemaError, TableSchema};
pub use table::{NormalizedRow, NormalizedTable, TableError};
