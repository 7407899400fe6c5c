//! Fuzz target for the filter expression parser
//!
//! Feeds arbitrary strings to the parser and, when parsing succeeds,
//! evaluates the expression against a fixed record.

#![no_main]

use ferro_sift::vcf::{InfoValue, VcfHeader, VcfRecord};
use ferro_sift::{EvalContext, ExpressionParser, NamedSet};
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    let Ok(input) = std::str::from_utf8(data) else {
        return;
    };
    if input.len() > 1000 {
        return;
    }

    let parser = ExpressionParser::new().with_sets(vec![NamedSet::new("genes", ["KRAS"])]);
    let Ok(expr) = parser.parse(input) else {
        return;
    };

    let header = VcfHeader::default();
    let record = VcfRecord::snv("1", 100, 'A', 'G')
        .with_info("DP", InfoValue::String("30".to_string()))
        .with_info(
            "ANN",
            InfoValue::String("G|missense_variant|MODERATE|KRAS|ENSG1|transcript|ENST1|protein_coding|2/6|c.35G>C|p.Gly12Ala|||||".to_string()),
        )
        .with_sample(&["GT", "DP"], &["0/1", "12"]);

    // Evaluation errors are fine; panics are not
    if expr.is_genotype_scoped() {
        let _ = expr.matches(&mut EvalContext::for_genotype(&record, &header, 0));
    } else {
        let _ = expr.matches(&mut EvalContext::new(&record, &header));
    }
});
