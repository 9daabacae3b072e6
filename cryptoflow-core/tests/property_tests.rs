//! Property tests for pipeline invariants.
//!
//! Uses proptest to verify:
//! 1. Gather arity and order: one outcome per request, in request order
//! 2. Normalize idempotence: same batch, same table
//! 3. Rounding: at most 2 decimals, within half a cent of the input
//! 4. Deduplication: no two rows of a table are identical

mod common;

use common::{chart_body, ScriptedTransport, Step, DAY_MS, JAN_1_2024_MS};
use cryptoflow_core::domain::{FetchTarget, MarketChart, RawResponse, SeriesPoint, TimeRange};
use cryptoflow_core::fetch::{FetchOutcome, RateLimitedFetcher};
use cryptoflow_core::normalize::{round2, ResponseNormalizer};
use cryptoflow_core::plan::RequestPlanner;
use proptest::prelude::*;
use std::time::Duration;

// ── Strategies (proptest) ────────────────────────────────────────────

fn arb_step() -> impl Strategy<Value = Step> {
    prop_oneof![
        (1.0..100_000.0_f64).prop_map(|p| Step::ok(chart_body(&[(JAN_1_2024_MS, p)]))),
        Just(Step::status(429)),
        Just(Step::status(500)),
        Just(Step::ok(r#"{"error": "boom"}"#)),
        Just(Step::ok("not json")),
    ]
}

fn arb_chart() -> impl Strategy<Value = RawResponse> {
    prop_oneof![
        1 => Just(RawResponse::Empty),
        4 => prop::collection::vec((0u32..5, 0.0..50_000.0_f64), 0..8).prop_map(|points| {
            let series: Vec<SeriesPoint> = points
                .iter()
                .map(|(day, v)| SeriesPoint::new(JAN_1_2024_MS + *day as f64 * DAY_MS, *v))
                .collect();
            RawResponse::Success(MarketChart {
                prices: series.clone(),
                total_volumes: series.clone(),
                market_caps: series,
            })
        }),
    ]
}

fn arb_batch() -> impl Strategy<Value = (Vec<RawResponse>, Vec<FetchTarget>)> {
    prop::collection::vec(
        (arb_chart(), prop::sample::select(vec!["bitcoin", "ethereum"])),
        0..5,
    )
    .prop_map(|entries| {
        let (responses, targets): (Vec<RawResponse>, Vec<FetchTarget>) = entries
            .into_iter()
            .map(|(chart, id)| (chart, FetchTarget::new(id, "usd")))
            .unzip();
        (responses, targets)
    })
}

fn block_on<F: std::future::Future>(future: F) -> F::Output {
    tokio::runtime::Builder::new_current_thread()
        .enable_time()
        .build()
        .unwrap()
        .block_on(future)
}

// ── 1. Gather arity and order ────────────────────────────────────────

proptest! {
    #![proptest_config(ProptestConfig::with_cases(32))]

    #[test]
    fn gather_preserves_length_and_order(
        steps in prop::collection::vec(arb_step(), 0..8),
        capacity in 1usize..4,
    ) {
        let mut transport = ScriptedTransport::new();
        let mut targets = Vec::new();
        for (i, step) in steps.iter().enumerate() {
            let id = format!("coin{i}");
            transport = transport.on(&format!("{id}/usd"), [step.clone()]);
            targets.push(FetchTarget::new(id, "usd"));
        }
        let requests = RequestPlanner::new("http://scripted").build(&targets, TimeRange::new(0, 1));
        let fetcher = RateLimitedFetcher::new(transport.clone())
            .with_max_concurrent(capacity)
            .with_timeout(Duration::from_secs(1));

        let outcomes = block_on(fetcher.gather(&requests));

        prop_assert_eq!(outcomes.len(), steps.len());
        for (step, outcome) in steps.iter().zip(&outcomes) {
            if let Step::Respond { status, body, .. } = step {
                let expected_success = *status == 200 && body.contains("prices");
                prop_assert_eq!(outcome.is_success(), expected_success);
                if *status == 429 {
                    let is_rate_limited = matches!(outcome, FetchOutcome::RateLimited { .. });
                    prop_assert!(is_rate_limited);
                }
            }
        }
        prop_assert!(transport.peak_in_flight() <= capacity);
    }
}

// ── 2. Normalize idempotence ─────────────────────────────────────────

proptest! {
    #[test]
    fn normalize_is_idempotent((responses, targets) in arb_batch()) {
        let mut normalizer = ResponseNormalizer::new();
        let first = normalizer.normalize(&responses, &targets).unwrap();
        let second = normalizer.normalize(&responses, &targets).unwrap();
        prop_assert_eq!(first.rows().unwrap(), second.rows().unwrap());
        prop_assert_eq!(first.fingerprint().unwrap(), second.fingerprint().unwrap());
    }

    #[test]
    fn normalized_rows_are_unique((responses, targets) in arb_batch()) {
        let mut normalizer = ResponseNormalizer::new();
        let rows = normalizer.normalize(&responses, &targets).unwrap().rows().unwrap();
        for (i, a) in rows.iter().enumerate() {
            for b in &rows[i + 1..] {
                prop_assert_ne!(a, b);
            }
        }
    }
}

// ── 3. Rounding ──────────────────────────────────────────────────────

proptest! {
    #[test]
    fn round2_stays_within_half_a_cent(value in -1.0e9..1.0e9_f64) {
        let rounded = round2(value);
        prop_assert!((rounded - value).abs() <= 0.005 + 1e-6);
        let scaled = rounded * 100.0;
        prop_assert!((scaled - scaled.round()).abs() < 1e-3);
    }

    #[test]
    fn round2_is_stable(value in -1.0e9..1.0e9_f64) {
        let once = round2(value);
        prop_assert_eq!(round2(once), once);
    }
}
