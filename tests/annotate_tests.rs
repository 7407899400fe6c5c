//! End-to-end annotation tests over VCF text and in-memory databases

use ferro_sift::annotate::{collapse_values, AnnotationConfig, AnnotationEngine};
use ferro_sift::cli::run_annotate;
use ferro_sift::vcf::parse_vcf_string;
use ferro_sift::{ErrorCode, MemoryDatabase, SiftError};
use rstest::rstest;

const DB: &str = "\
#chr\tpos\tref\talt\tX\tPRED\tSCORE
1\t100\tA\tG\t5\tD;D;T\t0.5
1\t100\tA\tC\t.\tT\t.
1\t5000\tT\tA\t8\tD\t1.25
";

const VCF: &str = "\
##fileformat=VCFv4.2
##INFO=<ID=DP,Number=1,Type=Integer,Description=\"Depth\">
#CHROM\tPOS\tID\tREF\tALT\tQUAL\tFILTER\tINFO
1\t100\t.\tA\tG\t50\tPASS\tDP=10
1\t200\t.\tC\tT\t50\tPASS\tDP=12
1\t5000\t.\tT\tA,G\t50\tPASS\t.
";

fn annotate(config: AnnotationConfig, vcf: &str) -> Result<String, SiftError> {
    let db = MemoryDatabase::from_text(DB).unwrap();
    let mut engine = AnnotationEngine::new(db, config)?;
    let mut out = Vec::new();
    run_annotate(parse_vcf_string(vcf).unwrap(), &mut out, &mut engine)?;
    Ok(String::from_utf8(out).unwrap())
}

fn data_lines(text: &str) -> Vec<&str> {
    text.lines().filter(|l| !l.starts_with('#')).collect()
}

#[test]
fn test_end_to_end_single_field() {
    let config = AnnotationConfig::new().with_fields(["X"]).with_prefix("");
    let text = annotate(config, VCF).unwrap();
    let lines = data_lines(&text);

    assert_eq!(lines[0], "1\t100\t.\tA\tG\t50\tPASS\tDP=10;X=5");
    // No database row at 200
    assert_eq!(lines[1], "1\t200\t.\tC\tT\t50\tPASS\tDP=12");
    // Only the first allele has a value
    assert_eq!(lines[2], "1\t5000\t.\tT\tA,G\t50\tPASS\tX=8");
}

#[test]
fn test_header_declares_fields() {
    let config = AnnotationConfig::new()
        .with_fields(["X", "PRED", "SCORE"])
        .with_prefix("dbNSFP_");
    let text = annotate(config, VCF).unwrap();

    let info: Vec<&str> = text.lines().filter(|l| l.starts_with("##INFO")).collect();
    assert_eq!(info.len(), 4);
    assert!(info[1].starts_with("##INFO=<ID=dbNSFP_X,Number=A,Type=Integer,"));
    assert!(info[2].starts_with("##INFO=<ID=dbNSFP_PRED,Number=A,Type=String,"));
    assert!(info[3].starts_with("##INFO=<ID=dbNSFP_SCORE,Number=A,Type=Float,"));
    // Declarations come before the column line
    let column = text.find("#CHROM").unwrap();
    assert!(text.find("dbNSFP_SCORE").unwrap() < column);
}

#[test]
fn test_unknown_field_fails_before_output() {
    let db = MemoryDatabase::from_text(DB).unwrap();
    let config = AnnotationConfig::new().with_fields(["X", "MISSING"]);
    let err = AnnotationEngine::new(db, config).err().unwrap();
    assert_eq!(err.code(), Some(ErrorCode::UnknownDatabaseField));
    assert!(err.is_fatal());

    let result = annotate(AnnotationConfig::new().with_fields(["MISSING"]), VCF);
    assert!(result.is_err());
}

#[test]
fn test_default_fields_need_dbnsfp_columns() {
    // The default field list names dbNSFP columns this database lacks
    let err = annotate(AnnotationConfig::new(), VCF).unwrap_err();
    assert!(err.to_string().contains("not found in database"));
}

#[test]
fn test_unsorted_input_fails() {
    let vcf = "\
##fileformat=VCFv4.2
#CHROM\tPOS\tID\tREF\tALT\tQUAL\tFILTER\tINFO
1\t200\t.\tC\tT\t50\tPASS\t.
1\t100\t.\tA\tG\t50\tPASS\t.
";
    let err = annotate(AnnotationConfig::new().with_fields(["X"]), vcf).unwrap_err();
    assert_eq!(err.code(), Some(ErrorCode::UnsortedInput));
    assert_eq!(
        err.to_string(),
        "Input VCF must be sorted: previous entry 1:200, current entry 1:100"
    );
}

#[rstest]
#[case("1\t100\n1\t100\n1\t5000")]
#[case("1\t100\n2\t50\n3\t1")]
#[case("1\t100\n2\t10\n2\t10")]
fn test_sorted_input_never_fails(#[case] loci: &str) {
    let mut vcf = String::from("##fileformat=VCFv4.2\n#CHROM\tPOS\tID\tREF\tALT\tQUAL\tFILTER\tINFO\n");
    for locus in loci.lines() {
        vcf.push_str(&format!("{}\t.\tA\tG\t.\t.\t.\n", locus));
    }
    assert!(annotate(AnnotationConfig::new().with_fields(["X"]), &vcf).is_ok());
}

#[test]
fn test_annotate_empty() {
    let config = AnnotationConfig::new()
        .with_fields(["X", "SCORE"])
        .with_annotate_empty(true)
        .with_prefix("");
    let text = annotate(config, VCF).unwrap();
    let lines = data_lines(&text);

    assert_eq!(lines[0], "1\t100\t.\tA\tG\t50\tPASS\tDP=10;X=5;SCORE=0.5");
    assert_eq!(lines[1], "1\t200\t.\tC\tT\t50\tPASS\tDP=12");
    assert_eq!(lines[2], "1\t5000\t.\tT\tA,G\t50\tPASS\tX=8,.;SCORE=1.25,.");
}

#[rstest]
#[case(true, "D,T")]
#[case(false, "D,D,T")]
fn test_collapse_policy(#[case] collapse: bool, #[case] expected: &str) {
    let config = AnnotationConfig::new()
        .with_fields(["PRED"])
        .with_collapse(collapse)
        .with_prefix("");
    let text = annotate(config, VCF).unwrap();
    assert!(data_lines(&text)[0].ends_with(&format!("PRED={}", expected)));
}

#[test]
fn test_collapse_values() {
    assert_eq!(collapse_values("A,A,A,B"), "A,B");
    assert_eq!(collapse_values("A,B,B,A"), "A,B,A");
    assert_eq!(collapse_values("A"), "A");
}

#[test]
fn test_stats() {
    let db = MemoryDatabase::from_text(DB).unwrap();
    let mut engine = AnnotationEngine::new(db, AnnotationConfig::new().with_fields(["X"])).unwrap();
    let mut out = Vec::new();
    let stats = run_annotate(parse_vcf_string(VCF).unwrap(), &mut out, &mut engine).unwrap();

    assert_eq!(stats.total, 3);
    assert_eq!(stats.annotated, 2);
    assert!((stats.percent - 200.0 / 3.0).abs() < 1e-9);
}
