//! Functional annotation lists attached by an upstream effect predictor
//!
//! Two layouts are understood:
//! - `ANN`: `Allele|Annotation|Impact|Gene|GeneID|Feature|FeatureID|...`
//! - `EFF`: `Effect(Impact|Class|Codon|AA|AA_len|Gene|BioType|Coding|Transcript|Rank|GT|Errors)`
//!
//! plus the `LOF` and `NMD` lists, `(Gene|GeneID|NumTranscripts|Percent)`.
//! Entries are kept as text; sub-fields are addressed by name through a
//! per-layout schema.

use std::fmt;
use std::str::FromStr;

use crate::error::SiftError;

use super::parser::VcfHeader;
use super::record::VcfRecord;

/// Layout of the effect list
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EffectFormat {
    /// `ANN` field
    Ann,
    /// Legacy `EFF` field
    Eff,
}

/// Where a named sub-field lives inside an entry
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SubField {
    /// Column number within the entry
    pub column: usize,
    /// For `a/b` columns, which half to take
    pub part: Option<usize>,
}

impl SubField {
    const fn whole(column: usize) -> Self {
        Self { column, part: None }
    }

    const fn part(column: usize, part: usize) -> Self {
        Self {
            column,
            part: Some(part),
        }
    }
}

impl EffectFormat {
    /// INFO key holding the list
    pub fn info_key(self) -> &'static str {
        match self {
            EffectFormat::Ann => "ANN",
            EffectFormat::Eff => "EFF",
        }
    }

    /// Pick the format for a record
    ///
    /// The header is consulted first (`ANN`, then `EFF`); a header without
    /// either falls back to the record's own INFO keys, `ANN` by default.
    pub fn detect(header: &VcfHeader, record: &VcfRecord) -> Self {
        if header.has_info("ANN") {
            EffectFormat::Ann
        } else if header.has_info("EFF") || (record.has_info("EFF") && !record.has_info("ANN")) {
            EffectFormat::Eff
        } else {
            EffectFormat::Ann
        }
    }

    /// Resolve a sub-field name
    pub fn sub_field(self, name: &str) -> Result<SubField, SiftError> {
        let field = match self {
            EffectFormat::Ann => match name {
                "ALLELE" | "GT" | "GENOTYPE" => Some(SubField::whole(0)),
                "EFFECT" | "ANNOTATION" => Some(SubField::whole(1)),
                "IMPACT" => Some(SubField::whole(2)),
                "GENE" => Some(SubField::whole(3)),
                "GENEID" => Some(SubField::whole(4)),
                "FEATURE" => Some(SubField::whole(5)),
                "FEATUREID" | "TRID" => Some(SubField::whole(6)),
                "BIOTYPE" => Some(SubField::whole(7)),
                "RANK" | "EXID" => Some(SubField::whole(8)),
                "HGVS_C" | "HGVS_DNA" | "CODON" => Some(SubField::whole(9)),
                "HGVS_P" | "HGVS_PROT" | "AA" => Some(SubField::whole(10)),
                "CDNA_POS" | "POS_CDNA" => Some(SubField::part(11, 0)),
                "CDNA_LEN" | "LEN_CDNA" => Some(SubField::part(11, 1)),
                "CDS_POS" | "POS_CDS" => Some(SubField::part(12, 0)),
                "CDS_LEN" | "LEN_CDS" => Some(SubField::part(12, 1)),
                "AA_POS" | "POS_AA" => Some(SubField::part(13, 0)),
                "AA_LEN" | "LEN_AA" => Some(SubField::part(13, 1)),
                "DISTANCE" => Some(SubField::whole(14)),
                "ERRORS" | "WARNINGS" | "INFO" => Some(SubField::whole(15)),
                _ => None,
            },
            EffectFormat::Eff => match name {
                "EFFECT" => Some(SubField::whole(0)),
                "IMPACT" => Some(SubField::whole(1)),
                "FUNCLASS" => Some(SubField::whole(2)),
                "CODON" => Some(SubField::whole(3)),
                "AA" => Some(SubField::whole(4)),
                "AA_LEN" => Some(SubField::whole(5)),
                "GENE" => Some(SubField::whole(6)),
                "BIOTYPE" => Some(SubField::whole(7)),
                "CODING" => Some(SubField::whole(8)),
                "TRID" => Some(SubField::whole(9)),
                "RANK" | "EXID" => Some(SubField::whole(10)),
                "GT" | "GENOTYPE_NUMBER" => Some(SubField::whole(11)),
                "ERRORS" | "WARNINGS" => Some(SubField::whole(12)),
                _ => None,
            },
        };
        field.ok_or_else(|| {
            SiftError::evaluation(format!("No such subfield '{}.{}'", self.info_key(), name))
        })
    }

    /// Split the raw INFO value into entries
    pub fn parse_list(self, value: &str) -> Vec<EffectEntry> {
        split_entries(value)
            .map(|entry| match self {
                EffectFormat::Ann => EffectEntry::from_columns(entry, entry.split('|')),
                EffectFormat::Eff => {
                    // EFFECT(inner|fields)
                    let (effect, rest) = entry.split_once('(').unwrap_or((entry, ""));
                    let inner = rest.strip_suffix(')').unwrap_or(rest);
                    EffectEntry::from_columns(
                        entry,
                        std::iter::once(effect).chain(inner.split('|')),
                    )
                }
            })
            .collect()
    }
}

impl fmt::Display for EffectFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.info_key())
    }
}

impl FromStr for EffectFormat {
    type Err = SiftError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "ann" => Ok(EffectFormat::Ann),
            "eff" => Ok(EffectFormat::Eff),
            other => Err(SiftError::configuration(format!(
                "Unknown effect format '{}', expected 'ann' or 'eff'",
                other
            ))),
        }
    }
}

/// Loss-of-function style lists
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LofKind {
    Lof,
    Nmd,
}

impl LofKind {
    pub fn info_key(self) -> &'static str {
        match self {
            LofKind::Lof => "LOF",
            LofKind::Nmd => "NMD",
        }
    }

    pub fn sub_field(self, name: &str) -> Result<SubField, SiftError> {
        let column = match name {
            "GENE" => 0,
            "GENEID" => 1,
            "NUMTR" => 2,
            "PERC" => 3,
            _ => {
                return Err(SiftError::evaluation(format!(
                    "No such {} subfield '{}.{}'",
                    self.info_key(),
                    self.info_key(),
                    name
                )))
            }
        };
        Ok(SubField::whole(column))
    }

    /// Parse `(a|b|c|d),(e|f|g|h)`
    pub fn parse_list(self, value: &str) -> Vec<EffectEntry> {
        split_entries(value)
            .map(|entry| {
                let inner = entry.trim_start_matches('(').trim_end_matches(')');
                EffectEntry::from_columns(entry, inner.split('|'))
            })
            .collect()
    }
}

fn split_entries(value: &str) -> impl Iterator<Item = &str> {
    value
        .split(',')
        .map(str::trim)
        .filter(|entry| !entry.is_empty() && *entry != ".")
}

/// One entry of an effect list
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EffectEntry {
    raw: String,
    columns: Vec<String>,
}

impl EffectEntry {
    fn from_columns<'a>(raw: &str, columns: impl Iterator<Item = &'a str>) -> Self {
        Self {
            raw: raw.to_string(),
            columns: columns.map(|c| c.trim().to_string()).collect(),
        }
    }

    /// The entry as written
    pub fn raw(&self) -> &str {
        &self.raw
    }

    /// A sub-field; None when the column is absent or empty
    pub fn get(&self, field: SubField) -> Option<&str> {
        let column = self.columns.get(field.column)?.as_str();
        let value = match field.part {
            Some(part) => column.split('/').nth(part)?,
            None => column,
        };
        (!value.is_empty()).then_some(value)
    }
}
