//! Filter tests over VCF text, using rstest parameterized cases
//!
//! Test categories:
//! - Record fields: INFO, fixed columns, arithmetic
//! - Effect lists: ANN and EFF layouts with aggregate indices
//! - Genotypes: per-sample scope and explicit sample indices
//! - Sets and errors

use ferro_sift::cli::run_filter;
use ferro_sift::vcf::{parse_vcf_string, EffectFormat, VcfRecord};
use ferro_sift::{ErrorCode, NamedSet, SiftError, VcfFilter};
use rstest::rstest;

const ANN_VCF: &str = "\
##fileformat=VCFv4.2
##INFO=<ID=DP,Number=1,Type=Integer,Description=\"Depth\">
##INFO=<ID=AF,Number=A,Type=Float,Description=\"Allele frequency\">
##INFO=<ID=ANN,Number=.,Type=String,Description=\"Functional annotations: 'Allele | Annotation | Annotation_Impact | Gene_Name | Gene_ID | Feature_Type | Feature_ID | Transcript_BioType | Rank | HGVS.c | HGVS.p | cDNA.pos / cDNA.length | CDS.pos / CDS.length | AA.pos / AA.length | Distance | ERRORS / WARNINGS / INFO'\">
#CHROM\tPOS\tID\tREF\tALT\tQUAL\tFILTER\tINFO\tFORMAT\tS1\tS2
1\t100\trs1\tA\tG\t50\tPASS\tDP=30;AF=0.25;ANN=G|missense_variant|MODERATE|KRAS|ENSG1|transcript|ENST1|protein_coding|2/6|c.35G>C|p.Gly12Ala|||||,G|stop_gained|HIGH|KRAS|ENSG1|transcript|ENST2|protein_coding|2/5|c.34G>T|p.Gly12*|||||\tGT:DP\t0/1:12\t1/1:20
1\t200\t.\tC\tT,A\t12\tq10\tDP=5;AF=0.1,0.7;DB;ANN=T|intron_variant|MODIFIER|TP53|ENSG2|transcript|ENST3|protein_coding||c.10+5C>T||||||\tGT:DP\t0/0:3\t0/1:2
2\t300\t.\tG\tC\t99\tPASS\tAF=0.5\tGT:DP\t./.:.\t0/0:40
";

fn records() -> (Vec<VcfRecord>, ferro_sift::vcf::VcfHeader) {
    let mut reader = parse_vcf_string(ANN_VCF).unwrap();
    let mut records = Vec::new();
    while let Some(record) = reader.read_record().unwrap() {
        records.push(record);
    }
    (records, reader.header().clone())
}

/// Positions of the records an expression selects
fn selected(expression: &str) -> Vec<u64> {
    selected_with(expression, vec![], None)
}

fn selected_with(expression: &str, sets: Vec<NamedSet>, format: Option<EffectFormat>) -> Vec<u64> {
    let (records, header) = records();
    let filter = VcfFilter::parse(expression, sets, format).unwrap();
    records
        .iter()
        .filter(|r| filter.matches(r, &header).unwrap())
        .map(|r| r.pos)
        .collect()
}

// =============================================================================
// Record fields
// =============================================================================

#[rstest]
#[case("DP > 10", vec![100])]
#[case("DP < 10", vec![200, 300])]
#[case("QUAL >= 50", vec![100, 300])]
#[case("CHROM = '2'", vec![300])]
#[case("POS + 100 = 200", vec![100])]
#[case("(DP > 10) | (QUAL > 90)", vec![100, 300])]
#[case("(DP > 10) & (QUAL > 90)", vec![])]
#[case("!(FILTER = 'PASS')", vec![200])]
#[case("exists(ID)", vec![100])]
#[case("na(DP)", vec![300])]
#[case("DB", vec![200])]
#[case("AF[1] > 0.5", vec![200])]
#[case("AF[0] * 2 = 0.5", vec![100])]
#[case("DP / 2 > 10", vec![100])]
fn test_record_fields(#[case] expression: &str, #[case] expected: Vec<u64>) {
    assert_eq!(selected(expression), expected, "expression: {}", expression);
}

#[test]
fn test_mixed_integer_real_comparison_promotes() {
    // Integer and Real compare after promotion to f64
    assert_eq!(selected("DP = 30.0"), vec![100]);
    assert_eq!(selected("DP > 29.999"), vec![100]);
    assert_eq!(selected("QUAL = 12.0000000000000001"), vec![200]);
}

// =============================================================================
// Effect lists
// =============================================================================

#[rstest]
#[case("ANN[0].GENE = 'KRAS'", vec![100])]
#[case("ANN[*].IMPACT = 'HIGH'", vec![100])]
#[case("ANN[ANY].EFFECT =~ 'intron'", vec![200])]
#[case("ANN[?].GENE = 'KRAS'", vec![100, 300])]
#[case("ANN[1].HGVS_P = 'p.Gly12*'", vec![100])]
fn test_effect_fields(#[case] expression: &str, #[case] expected: Vec<u64>) {
    assert_eq!(selected(expression), expected, "expression: {}", expression);
}

#[test]
fn test_aggregate_over_empty_list() {
    // Record 300 has no ANN: ANY is false, ALL holds vacuously
    assert_eq!(selected("ANN[*].GENE = 'KRAS'"), vec![100]);
    assert_eq!(selected("ANN[ALL].GENE = 'KRAS'"), vec![100, 300]);
}

#[test]
fn test_explicit_effect_format() {
    let selected = selected_with("ANN[0].GENE = 'KRAS'", vec![], Some(EffectFormat::Ann));
    assert_eq!(selected, vec![100]);
}

// =============================================================================
// Genotypes
// =============================================================================

#[rstest]
#[case("GEN[0] = '0/1'", vec![100])]
#[case("GEN[1].GT = '0/1'", vec![200])]
#[case("GEN[1].DP > 30", vec![300])]
#[case("GEN.GT = '1/1'", vec![100])]
#[case("GEN.DP > 30", vec![300])]
#[case("GEN.DP < 5", vec![200, 300])]
fn test_genotype_fields(#[case] expression: &str, #[case] expected: Vec<u64>) {
    assert_eq!(selected(expression), expected, "expression: {}", expression);
}

/// Three samples whose AD lists hold zero, one or two values
const AD_VCF: &str = "\
##fileformat=VCFv4.2
##FORMAT=<ID=GT,Number=1,Type=String,Description=\"Genotype\">
##FORMAT=<ID=AD,Number=R,Type=Integer,Description=\"Allelic depths\">
#CHROM\tPOS\tID\tREF\tALT\tQUAL\tFILTER\tINFO\tFORMAT\tS1\tS2\tS3
1\t10\t.\tA\tG\t.\t.\t.\tGT:AD\t0/1:.\t0/1:9\t0/1:10,7
1\t20\t.\tA\tG\t.\t.\t.\tGT:AD\t0/1:.\t0/1:.\t0/1:2,1
1\t30\t.\tA\tG\t.\t.\t.\tGT:AD\t0/1:.\t0/1:.\t0/1:.
1\t40\t.\tA\tG\t.\t.\t.\tGT:AD\t0/1:4\t0/1:3,30\t0/1:.
";

#[rstest]
#[case("GEN[*].AD[*] > 8", vec![10, 40])]
#[case("GEN[ANY].AD[ANY] = 1", vec![20])]
#[case("GEN[?].AD[?] > 5", vec![10, 30])]
#[case("GEN[ALL].AD[ALL] < 20", vec![10, 20, 30])]
#[case("GEN[*].AD[1] > 5", vec![10, 40])]
fn test_nested_genotype_lists(#[case] expression: &str, #[case] expected: Vec<u64>) {
    let mut reader = parse_vcf_string(AD_VCF).unwrap();
    let filter = VcfFilter::parse(expression, vec![], None).unwrap();
    let mut selected = Vec::new();
    while let Some(record) = reader.read_record().unwrap() {
        if filter.matches(&record, reader.header()).unwrap() {
            selected.push(record.pos);
        }
    }
    assert_eq!(selected, expected, "expression: {}", expression);
}

// =============================================================================
// Sets
// =============================================================================

#[test]
fn test_set_membership() {
    let genes = NamedSet::new("genes", ["TP53", "BRCA1"]);
    let ids = NamedSet::new("ids", ["rs1"]);
    assert_eq!(
        selected_with("ANN[*].GENE in SET[0]", vec![genes.clone(), ids.clone()], None),
        vec![200]
    );
    assert_eq!(selected_with("ID in SET[1]", vec![genes, ids], None), vec![100]);
}

#[test]
fn test_set_index_out_of_bounds() {
    let (records, header) = records();
    let filter = VcfFilter::parse("ID in SET[3]", vec![], None).unwrap();
    let err = filter.matches(&records[0], &header).unwrap_err();
    assert_eq!(err.code(), Some(ErrorCode::SetIndexOutOfBounds));
}

// =============================================================================
// Stream filtering
// =============================================================================

#[test]
fn test_run_filter_inverse() {
    let filter = VcfFilter::parse("DP > 10", vec![], None).unwrap().with_inverse(true);
    let mut out = Vec::new();
    let stats = run_filter(parse_vcf_string(ANN_VCF).unwrap(), &mut out, &filter).unwrap();
    assert_eq!((stats.total, stats.written), (3, 2));

    let text = String::from_utf8(out).unwrap();
    assert!(text.contains("\n1\t200\t"));
    assert!(text.contains("\n2\t300\t"));
    assert!(!text.contains("\n1\t100\t"));
}

#[test]
fn test_run_filter_add_filter() {
    let filter = VcfFilter::parse("QUAL < 30", vec![], None)
        .unwrap()
        .with_add_filter(Some("LowQual".to_string()));
    let mut out = Vec::new();
    let stats = run_filter(parse_vcf_string(ANN_VCF).unwrap(), &mut out, &filter).unwrap();
    assert_eq!((stats.total, stats.written), (3, 3));

    let text = String::from_utf8(out).unwrap();
    assert!(text.contains("##FILTER=<ID=LowQual,"));
    assert!(text.contains("\tq10;LowQual\t"));
    assert!(text.contains("\t99\tPASS\t"));
}

// =============================================================================
// Errors
// =============================================================================

#[rstest]
#[case("DP >", ErrorCode::UnexpectedEnd)]
#[case("ANN[0].GENE =~ '('", ErrorCode::InvalidRegex)]
#[case("ANN[].GENE = 'KRAS'", ErrorCode::InvalidIndex)]
#[case("ID in SET[ANN[*].RANK]", ErrorCode::InvalidIndex)]
fn test_parse_errors(#[case] expression: &str, #[case] code: ErrorCode) {
    let err = VcfFilter::parse(expression, vec![], None).unwrap_err();
    assert!(matches!(err, SiftError::Parse { .. }), "{}", expression);
    assert_eq!(err.code(), Some(code), "{}", expression);
}
