//! Property-based tests for the engine's universal invariants:
//! regex-inducer coverage, epsilon monotonicity, monotone widening of
//! constraints, and structural JSON round-trips.

mod common;

use common::*;
use proptest::prelude::*;
use tokio::runtime::Runtime;
use veracity::discover::{induce, RexOptions};
use veracity::prelude::*;

/// Strategy for strings shaped like the identifiers, codes and words the
/// inducer sees in practice, plus arbitrary printable noise.
fn sample_string() -> impl Strategy<Value = String> {
    prop_oneof![
        "[A-Z]{1,3}-[0-9]{1,4}",
        "[a-z]{1,8}",
        "[0-9]{1,6}",
        "[A-Za-z0-9 .,_/:-]{0,12}",
    ]
}

proptest! {
    /// Invariant: every input string matches at least one induced
    /// pattern.
    #[test]
    fn prop_rex_covers_every_input(inputs in prop::collection::vec(sample_string(), 1..20)) {
        let patterns = induce(&inputs, &RexOptions::default());
        prop_assert!(!patterns.is_empty());

        let compiled: Vec<regex::Regex> = patterns
            .iter()
            .map(|p| regex::Regex::new(p).unwrap())
            .collect();
        for input in &inputs {
            prop_assert!(
                compiled.iter().any(|r| r.is_match(input)),
                "{input:?} not covered by {patterns:?}"
            );
        }
    }

    /// Invariant: a tighter alternation cap never loses coverage, it
    /// only splits patterns.
    #[test]
    fn prop_rex_cap_preserves_coverage(
        inputs in prop::collection::vec(sample_string(), 1..12),
        cap in 1usize..6,
    ) {
        let options = RexOptions { alternation_cap: cap, ..Default::default() };
        let patterns = induce(&inputs, &options);
        let compiled: Vec<regex::Regex> = patterns
            .iter()
            .map(|p| regex::Regex::new(p).unwrap())
            .collect();
        for input in &inputs {
            prop_assert!(compiled.iter().any(|r| r.is_match(input)));
        }
    }

    /// Invariant: if a value satisfies a bound under epsilon e1, it
    /// satisfies it under any e2 >= e1.
    #[test]
    fn prop_epsilon_monotonicity(
        value in -1e6f64..1e6,
        bound in -1e6f64..1e6,
        e1 in 0f64..0.1,
        extra in 0f64..0.1,
    ) {
        let e2 = e1 + extra;
        let max = Bound::closed(FieldValue::Real(bound));
        if max.admits_max(&FieldValue::Real(value), e1) == Some(true) {
            prop_assert_eq!(max.admits_max(&FieldValue::Real(value), e2), Some(true));
        }
        let min = Bound::closed(FieldValue::Real(bound));
        if min.admits_min(&FieldValue::Real(value), e1) == Some(true) {
            prop_assert_eq!(min.admits_min(&FieldValue::Real(value), e2), Some(true));
        }
    }

    /// Invariant: widening any constraint of a passing document keeps
    /// the dataset passing.
    #[test]
    fn prop_monotone_widening(values in prop::collection::vec(-1000i64..1000, 1..30)) {
        let rt = Runtime::new().unwrap();
        rt.block_on(async {
            let data: Vec<Option<i64>> = values.iter().copied().map(Some).collect();
            let source = source_from(vec![("x", int_array(&data))]);

            let document = Discoverer::default().discover(&source).await.unwrap();
            let report = Verifier::default().verify(&source, &document).await.unwrap();
            assert!(report.is_success(), "discovery must self-verify");

            // Widen: stretch bounds, raise the null budget, extend the
            // allowed set.
            let mut widened = document.clone();
            let bundle = widened.fields.get_mut("x").unwrap();
            if let Some(min) = &mut bundle.min {
                min.value = FieldValue::Int(min.value.as_f64().unwrap() as i64 - 10);
            }
            if let Some(max) = &mut bundle.max {
                max.value = FieldValue::Int(max.value.as_f64().unwrap() as i64 + 10);
            }
            if let Some(budget) = &mut bundle.max_nulls {
                *budget += 5;
            }
            if let Some(allowed) = &mut bundle.allowed_values {
                allowed.push(FieldValue::Int(100_000));
            }
            // Widening can break the sign pinned by the old minimum.
            bundle.sign = None;

            let report = Verifier::default().verify(&source, &widened).await.unwrap();
            assert!(
                report.is_success(),
                "widening broke a pass: {:?}",
                report.failed_checks()
            );
        });
    }

    /// Invariant: documents survive a JSON round trip structurally.
    #[test]
    fn prop_document_round_trip(
        min in -1000i64..0,
        max in 0i64..1000,
        max_nulls in 0u64..100,
        lengths in (1u32..10, 10u32..50),
    ) {
        let mut document = ConstraintDocument::default();
        document.fields.insert(
            "n".to_string(),
            FieldConstraints {
                field_type: Some(LogicalType::Int),
                min: Some(Bound::closed(FieldValue::Int(min))),
                max: Some(Bound::closed(FieldValue::Int(max))),
                max_nulls: Some(max_nulls),
                ..Default::default()
            },
        );
        document.fields.insert(
            "s".to_string(),
            FieldConstraints {
                field_type: Some(LogicalType::String),
                min_length: Some(lengths.0),
                max_length: Some(lengths.1),
                no_duplicates: Some(true),
                ..Default::default()
            },
        );

        let json = document.to_json_string().unwrap();
        let back = ConstraintDocument::from_json_str(&json).unwrap();
        prop_assert_eq!(document, back);
    }
}
