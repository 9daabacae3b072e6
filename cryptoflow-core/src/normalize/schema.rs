use polars::prelude::*;

pub const DATE_KEY: &str = "date_key";
pub const PRICE: &str = "price";
pub const VOLUME: &str = "volume";
pub const CAPITALIZATION: &str = "capitalization";
pub const INSTRUMENT_ID: &str = "instrument_id";
pub const QUOTE_CURRENCY: &str = "quote_currency";

/// Column layout of a normalized market table.
///
/// Downstream storage and analytics address columns by these names.
pub struct TableSchema;

impl TableSchema {
    /// Column names in table order.
    pub const COLUMNS: [&'static str; 6] = [
        DATE_KEY,
        PRICE,
        VOLUME,
        CAPITALIZATION,
        INSTRUMENT_ID,
        QUOTE_CURRENCY,
    ];

    /// Low-cardinality identity columns are stored as categoricals.
    pub fn categorical() -> DataType {
        DataType::Categorical(None, CategoricalOrdering::Physical)
    }

    /// Get the canonical table schema
    pub fn schema() -> Schema {
        Schema::from_iter(vec![
            Field::new(DATE_KEY.into(), DataType::Int32),
            Field::new(PRICE.into(), DataType::Float64),
            Field::new(VOLUME.into(), DataType::Float64),
            Field::new(CAPITALIZATION.into(), DataType::Float64),
            Field::new(INSTRUMENT_ID.into(), Self::categorical()),
            Field::new(QUOTE_CURRENCY.into(), Self::categorical()),
        ])
    }

    /// Validate DataFrame against schema
    pub fn validate(df: &DataFrame) -> Result<(), SchemaError> {
        let expected = Self::schema();
        let actual = df.schema();

        for field in expected.iter_fields() {
            let actual_dtype = actual
                .get(field.name())
                .ok_or_else(|| SchemaError::MissingColumn(field.name().to_string()))?;

            let matches = match field.dtype() {
                // Categorical equality would also compare the reverse mapping.
                DataType::Categorical(..) => matches!(actual_dtype, DataType::Categorical(..)),
                dtype => actual_dtype == dtype,
            };
            if !matches {
                return Err(SchemaError::TypeMismatch {
                    column: field.name().to_string(),
                    expected: field.dtype().clone(),
                    actual: actual_dtype.clone(),
                });
            }
        }

        Ok(())
    }
}

#[derive(Debug, thiserror::Error)]
pub enum SchemaError {
    #[error("Missing required column: {0}")]
    MissingColumn(String),

    #[error("Type mismatch in column {column}: expected {expected:?}, got {actual:?}")]
    TypeMismatch {
        column: String,
        expected: DataType,
        actual: DataType,
    },
}
