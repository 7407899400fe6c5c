//! Property-based tests for values, expressions and annotation ordering

use ferro_sift::annotate::{AnnotationConfig, AnnotationEngine};
use ferro_sift::expr::{select_extremal, AggregateMode};
use ferro_sift::vcf::VcfRecord;
use ferro_sift::{parse_expression, MemoryDatabase, SiftError, Value};
use proptest::prelude::*;
use proptest::test_runner::Config as ProptestConfig;

const DB: &str = "#chr\tpos\tref\talt\tX\n1\t100\tA\tG\t5\n2\t100\tA\tG\t6\n";

fn engine() -> AnnotationEngine<MemoryDatabase> {
    let db = MemoryDatabase::from_text(DB).unwrap();
    AnnotationEngine::new(db, AnnotationConfig::new().with_fields(["X"]).with_min_jump(10)).unwrap()
}

fn annotate_positions(loci: &[(String, u64)]) -> Result<(), SiftError> {
    let mut engine = engine();
    for (chrom, pos) in loci {
        let mut record = VcfRecord::snv(chrom, *pos, 'A', 'G');
        engine.annotate(&mut record)?;
    }
    Ok(())
}

/// Loci sorted within each chromosome, chromosomes visited once each
fn sorted_loci() -> impl Strategy<Value = Vec<(String, u64)>> {
    prop::collection::vec(prop::collection::vec(1..10_000u64, 0..20), 1..4).prop_map(|chroms| {
        chroms
            .into_iter()
            .enumerate()
            .flat_map(|(i, mut positions)| {
                positions.sort_unstable();
                positions.into_iter().map(move |p| ((i + 1).to_string(), p))
            })
            .collect()
    })
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(256))]

    /// Integers survive display then re-parse
    #[test]
    fn prop_integer_roundtrip(v in any::<i64>()) {
        let text = Value::Integer(v).to_string();
        prop_assert_eq!(Value::from_text(&text), Value::Integer(v));
    }

    /// Finite reals survive display then re-parse as the same number
    #[test]
    fn prop_real_roundtrip(v in -1.0e12f64..1.0e12) {
        let text = Value::Real(v).to_string();
        prop_assert_eq!(Value::from_text(&text).as_real(), v);
    }

    /// Mixed Integer/Real comparison agrees with f64 ordering
    #[test]
    fn prop_mixed_comparison_promotes(i in -1_000_000i64..1_000_000, r in -1.0e6f64..1.0e6) {
        let expected = (i as f64).partial_cmp(&r).unwrap();
        prop_assert_eq!(Value::Integer(i).compare(&Value::Real(r)), expected);
        prop_assert_eq!(Value::Real(r).compare(&Value::Integer(i)), expected.reverse());
    }

    /// Sorted input never trips the order check
    #[test]
    fn prop_sorted_input_accepted(loci in sorted_loci()) {
        prop_assert!(annotate_positions(&loci).is_ok());
    }

    /// A single step backwards on one chromosome always fails
    #[test]
    fn prop_out_of_order_rejected(a in 2..10_000u64, back in 1..1_000u64) {
        let b = a.saturating_sub(back).max(1);
        prop_assume!(b < a);
        let loci = vec![("1".to_string(), a), ("1".to_string(), b)];
        let result = annotate_positions(&loci);
        let is_unsorted = matches!(result, Err(SiftError::UnsortedInput { .. }));
        prop_assert!(is_unsorted);
    }

    /// MIN and MAX over one element select it
    #[test]
    fn prop_extremal_single(text in "[0-9]{1,6}|[a-z]{1,6}|\\.") {
        prop_assert_eq!(select_extremal(AggregateMode::Min, &[Some(text.as_str())]), Some(0));
        prop_assert_eq!(select_extremal(AggregateMode::Max, &[Some(text.as_str())]), Some(0));
    }

    /// The parser never panics and reports positions inside the input
    #[test]
    fn prop_parse_error_position_in_bounds(input in "[A-Z0-9 ()<>=!&|.*\\[\\]']{0,30}") {
        if let Err(SiftError::Parse { pos, .. }) = parse_expression(&input) {
            prop_assert!(pos <= input.len());
        }
    }
}
