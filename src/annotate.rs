//! Database annotation of a sorted VCF stream
//!
//! [`AnnotationEngine`] merge-joins records against an [`AnnotationDatabase`]
//! and copies the configured columns into INFO, one value per alternate
//! allele of the record.

use log::{debug, warn};
use serde::Serialize;

use crate::db::{find_match, AnnotationDatabase, ColumnType, CursorState, DEFAULT_MIN_JUMP};
use crate::error::SiftError;
use crate::vcf::{InfoDefinition, InfoValue, VcfHeader, VcfRecord};

/// Columns added when no field list is configured
pub const DEFAULT_FIELDS: &[&str] = &[
    "Uniprot_acc",
    "Interpro_domain",
    "SIFT_pred",
    "Polyphen2_HDIV_pred",
    "Polyphen2_HVAR_pred",
    "LRT_pred",
    "MutationTaster_pred",
    "GERP++_NR",
    "GERP++_RS",
    "phastCons100way_vertebrate",
    "1000Gp1_AF",
    "1000Gp1_AFR_AF",
    "1000Gp1_EUR_AF",
    "1000Gp1_AMR_AF",
    "1000Gp1_ASN_AF",
    "ESP6500_AA_AF",
    "ESP6500_EA_AF",
];

/// INFO prefix used by the `annotate` command
pub const DBNSFP_PREFIX: &str = "dbNSFP_";

/// Statistics from an annotation run
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct AnnotationStats {
    /// Records processed
    pub total: usize,
    /// Records that gained at least one field
    pub annotated: usize,
    /// Annotated share of all records, in percent
    pub percent: f64,
}

impl AnnotationStats {
    fn record(&mut self, annotated: bool) {
        self.total += 1;
        if annotated {
            self.annotated += 1;
        }
        self.percent = 100.0 * self.annotated as f64 / self.total as f64;
    }
}

/// Configuration for annotation
#[derive(Debug, Clone)]
pub struct AnnotationConfig {
    /// Database columns to copy
    pub fields: Vec<String>,
    /// Write `.` for alleles and fields without a value
    pub annotate_empty: bool,
    /// Drop consecutive repeated values
    pub collapse: bool,
    /// Gap above which the cursor seeks
    pub min_jump: u64,
    /// Prefix of the INFO keys written
    pub prefix: String,
}

impl Default for AnnotationConfig {
    fn default() -> Self {
        Self {
            fields: DEFAULT_FIELDS.iter().map(|f| f.to_string()).collect(),
            annotate_empty: false,
            collapse: false,
            min_jump: DEFAULT_MIN_JUMP,
            prefix: String::new(),
        }
    }
}

impl AnnotationConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the columns to copy; an empty list keeps the defaults
    pub fn with_fields<I, S>(mut self, fields: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let fields: Vec<String> = fields.into_iter().map(Into::into).collect();
        if !fields.is_empty() {
            self.fields = fields;
        }
        self
    }

    pub fn with_annotate_empty(mut self, annotate_empty: bool) -> Self {
        self.annotate_empty = annotate_empty;
        self
    }

    pub fn with_collapse(mut self, collapse: bool) -> Self {
        self.collapse = collapse;
        self
    }

    pub fn with_min_jump(mut self, min_jump: u64) -> Self {
        self.min_jump = min_jump;
        self
    }

    pub fn with_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.prefix = prefix.into();
        self
    }
}

/// Whether a database value carries nothing (absent, `""`, `.` or only
/// empty comma separated parts)
pub fn is_empty_value(value: Option<&str>) -> bool {
    match value {
        None => true,
        Some(v) => v.split(',').all(|part| part.is_empty() || part == "."),
    }
}

/// Split on `;`/`,` and drop consecutive duplicates, joining with `,`
pub fn collapse_values(value: &str) -> String {
    let mut parts: Vec<&str> = value.split([';', ',']).collect();
    parts.dedup();
    parts.join(",")
}

/// Make text safe inside an INFO value
pub fn sanitize(value: &str) -> String {
    value
        .chars()
        .map(|c| match c {
            ';' => ',',
            '\t' | ' ' => '_',
            c => c,
        })
        .collect()
}

/// Streaming database annotator
pub struct AnnotationEngine<D> {
    db: D,
    config: AnnotationConfig,
    /// Configured fields with their column index
    columns: Vec<(String, usize)>,
    cursor: CursorState,
    previous: Option<(String, u64)>,
    stats: AnnotationStats,
}

impl<D: AnnotationDatabase> AnnotationEngine<D> {
    /// Create an engine, failing when a configured field is not a database
    /// column
    pub fn new(db: D, config: AnnotationConfig) -> Result<Self, SiftError> {
        let columns = config
            .fields
            .iter()
            .map(|field| {
                db.column_index(field)
                    .map(|i| (field.clone(), i))
                    .ok_or_else(|| SiftError::unknown_field(field))
            })
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Self {
            db,
            config,
            columns,
            cursor: CursorState::default(),
            previous: None,
            stats: AnnotationStats::default(),
        })
    }

    pub fn config(&self) -> &AnnotationConfig {
        &self.config
    }

    pub fn stats(&self) -> &AnnotationStats {
        &self.stats
    }

    pub fn database(&self) -> &D {
        &self.db
    }

    /// INFO definitions for the added fields
    pub fn info_definitions(&self) -> Vec<InfoDefinition> {
        self.columns
            .iter()
            .map(|(field, _)| {
                let kind = match self.db.column_types().get(field) {
                    Some(kind) => *kind,
                    None => {
                        warn!("Cannot infer type of field '{}', using String", field);
                        ColumnType::String
                    }
                };
                InfoDefinition {
                    id: format!("{}{}", self.config.prefix, field),
                    number: "A".to_string(),
                    kind: kind.vcf_type().to_string(),
                    description: format!("Field '{}' from database", field),
                }
            })
            .collect()
    }

    /// Header lines for the added fields
    pub fn header_lines(&self) -> Vec<String> {
        self.info_definitions().iter().map(InfoDefinition::to_line).collect()
    }

    /// Declare the added fields in a VCF header
    pub fn annotate_header(&self, header: &mut VcfHeader) {
        for definition in self.info_definitions() {
            header.add_info(&definition);
        }
    }

    /// Annotate one record in stream order
    ///
    /// Returns whether any field was added. A record before the previous
    /// one on the same chromosome fails the run.
    pub fn annotate(&mut self, record: &mut VcfRecord) -> Result<bool, SiftError> {
        if let Some((chrom, pos)) = &self.previous {
            if *chrom == record.chrom && record.pos < *pos {
                return Err(SiftError::UnsortedInput {
                    previous: format!("{}:{}", chrom, pos),
                    current: record.locus(),
                });
            }
        }
        self.previous = Some((record.chrom.clone(), record.pos));

        let state = std::mem::take(&mut self.cursor);
        let (state, matched) =
            find_match(state, &mut self.db, &record.chrom, record.pos, self.config.min_jump)?;
        self.cursor = state;

        let annotated = match (matched, &self.cursor.current) {
            (true, Some(_)) => self.merge(record),
            _ => false,
        };

        if annotated {
            debug!("Annotated {}", record.locus());
        }
        self.stats.record(annotated);
        Ok(annotated)
    }

    fn merge(&self, record: &mut VcfRecord) -> bool {
        let Some(row) = &self.cursor.current else {
            return false;
        };

        let mut annotated = false;
        for (field, column) in &self.columns {
            let mut values = Vec::with_capacity(record.alternate.len());
            for alt in &record.alternate {
                let value = row.value(alt, *column);
                let value = if self.config.annotate_empty {
                    Some(value.unwrap_or("."))
                } else if is_empty_value(value) {
                    None
                } else {
                    value
                };

                if let Some(v) = value {
                    values.push(if self.config.collapse {
                        collapse_values(v)
                    } else {
                        v.to_string()
                    });
                }
            }

            if self.config.annotate_empty || !values.is_empty() {
                let mut text = values.join(",");
                if text.is_empty() {
                    text = ".".to_string();
                }
                let key = format!("{}{}", self.config.prefix, field);
                record.set_info(&key, InfoValue::String(sanitize(&text)));
                annotated = true;
            }
        }
        annotated
    }

    /// Release the database
    pub fn into_database(self) -> D {
        self.db
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::MemoryDatabase;

    const DB: &str = "\
#chr\tpos\tref\talt\tX\tY\tZ
1\t100\tA\tG\t5\tfoo bar;baz\t.
1\t100\tA\tT\t6\t.\t.
1\t200\tC\tA\t7\tP1;P1;P2\t1
";

    fn engine(config: AnnotationConfig) -> AnnotationEngine<MemoryDatabase> {
        AnnotationEngine::new(MemoryDatabase::from_text(DB).unwrap(), config).unwrap()
    }

    fn info(record: &VcfRecord, key: &str) -> Option<String> {
        record.get_info_str(key)
    }

    #[test]
    fn test_empty_detection() {
        assert!(is_empty_value(None));
        assert!(is_empty_value(Some("")));
        assert!(is_empty_value(Some(".,.")));
        assert!(!is_empty_value(Some(".,1")));
    }

    #[test]
    fn test_collapse() {
        assert_eq!(collapse_values("A,A,A,B"), "A,B");
        assert_eq!(collapse_values("A;A,B,A"), "A,B,A");
    }

    #[test]
    fn test_sanitize() {
        assert_eq!(sanitize("a b;c\td"), "a_b,c_d");
    }

    #[test]
    fn test_unknown_field_is_fatal() {
        let db = MemoryDatabase::from_text(DB).unwrap();
        let err = AnnotationEngine::new(db, AnnotationConfig::new().with_fields(["X", "W"]))
            .err()
            .unwrap();
        assert_eq!(err.to_string(), "Configuration error: Field 'W' not found in database");
    }

    #[test]
    fn test_header_lines() {
        let engine = engine(AnnotationConfig::new().with_fields(["X", "Z"]).with_prefix("dbNSFP_"));
        assert_eq!(
            engine.header_lines(),
            vec![
                "##INFO=<ID=dbNSFP_X,Number=A,Type=Integer,Description=\"Field 'X' from database\">",
                "##INFO=<ID=dbNSFP_Z,Number=A,Type=Integer,Description=\"Field 'Z' from database\">",
            ]
        );
    }

    #[test]
    fn test_per_allele_values() {
        let mut engine = engine(AnnotationConfig::new().with_fields(["X", "Y"]));
        let mut record = VcfRecord::new("1".into(), 100, "A".into(), vec!["T".into(), "C".into(), "G".into()]);
        assert!(engine.annotate(&mut record).unwrap());
        assert_eq!(info(&record, "X").as_deref(), Some("6,5"));
        // Spaces and semicolons are rewritten
        assert_eq!(info(&record, "Y").as_deref(), Some("foo_bar,baz"));
    }

    #[test]
    fn test_annotate_empty_placeholders() {
        let mut engine = engine(
            AnnotationConfig::new()
                .with_fields(["X", "Z"])
                .with_annotate_empty(true),
        );
        let mut record = VcfRecord::new("1".into(), 100, "A".into(), vec!["C".into(), "G".into()]);
        assert!(engine.annotate(&mut record).unwrap());
        assert_eq!(info(&record, "X").as_deref(), Some(".,5"));
        assert_eq!(info(&record, "Z").as_deref(), Some(".,."));
    }

    #[test]
    fn test_collapse_setting() {
        let mut record = VcfRecord::new("1".into(), 200, "C".into(), vec!["A".into()]);
        let mut collapsing = engine(AnnotationConfig::new().with_fields(["Y"]).with_collapse(true));
        collapsing.annotate(&mut record).unwrap();
        assert_eq!(info(&record, "Y").as_deref(), Some("P1,P2"));

        let mut record = VcfRecord::new("1".into(), 200, "C".into(), vec!["A".into()]);
        let mut plain = engine(AnnotationConfig::new().with_fields(["Y"]));
        plain.annotate(&mut record).unwrap();
        assert_eq!(info(&record, "Y").as_deref(), Some("P1,P1,P2"));
    }

    #[test]
    fn test_unsorted_input() {
        let mut engine = engine(AnnotationConfig::new().with_fields(["X"]));
        let mut first = VcfRecord::new("1".into(), 200, "C".into(), vec!["A".into()]);
        let mut second = VcfRecord::new("1".into(), 100, "A".into(), vec!["G".into()]);
        engine.annotate(&mut first).unwrap();
        let err = engine.annotate(&mut second).unwrap_err();
        assert!(matches!(err, SiftError::UnsortedInput { .. }));
        assert_eq!(
            err.to_string(),
            "Input VCF must be sorted: previous entry 1:200, current entry 1:100"
        );
    }

    #[test]
    fn test_stats() {
        let mut engine = engine(AnnotationConfig::new().with_fields(["X"]));
        for pos in [100, 150, 200, 250] {
            let mut record = VcfRecord::new("1".into(), pos, "A".into(), vec!["G".into(), "A".into()]);
            engine.annotate(&mut record).unwrap();
        }
        let stats = engine.stats();
        assert_eq!((stats.total, stats.annotated), (4, 2));
        assert!((stats.percent - 50.0).abs() < 1e-9);
        let json = serde_json::to_string(stats).unwrap();
        assert!(json.contains("\"annotated\":2"));
    }
}
