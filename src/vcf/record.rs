//! VCF record representation
//!
//! This module provides the VCF record type the filter and annotation
//! engines operate on. Fields are kept as text; QUAL is normalized to its
//! shortest numeric form when read.

use std::collections::HashMap;
use std::fmt;

/// A single VCF record representing one variant
#[derive(Debug, Clone, PartialEq)]
pub struct VcfRecord {
    /// Chromosome name (e.g., "chr1", "1", "X", "chrM")
    pub chrom: String,

    /// 1-based position of the first base in the reference allele
    pub pos: u64,

    /// Variant identifier (e.g., rsID), None if "."
    pub id: Option<String>,

    /// Reference allele
    pub reference: String,

    /// Alternate allele(s)
    pub alternate: Vec<String>,

    /// QUAL score text, None if "."
    pub quality: Option<String>,

    /// FILTER column as written, None if "."
    pub filter: Option<String>,

    /// INFO fields in file order
    pub info: Vec<(String, InfoValue)>,

    /// FORMAT field specification (e.g., "GT:DP:GQ")
    pub format: Option<String>,

    /// Sample genotype data, one HashMap per sample
    pub samples: Vec<HashMap<String, String>>,
}

/// INFO field value
#[derive(Debug, Clone, PartialEq)]
pub enum InfoValue {
    /// Flag (presence indicates true)
    Flag,
    /// Raw value text
    String(String),
}

impl fmt::Display for InfoValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            InfoValue::Flag => Ok(()),
            InfoValue::String(v) => write!(f, "{}", v),
        }
    }
}

impl VcfRecord {
    /// Create a new VCF record with minimal required fields
    pub fn new(chrom: String, pos: u64, reference: String, alternate: Vec<String>) -> Self {
        Self {
            chrom,
            pos,
            id: None,
            reference,
            alternate,
            quality: None,
            filter: None,
            info: Vec::new(),
            format: None,
            samples: Vec::new(),
        }
    }

    /// Create a VCF record for a SNV (single nucleotide variant)
    pub fn snv(chrom: &str, pos: u64, reference: char, alternate: char) -> Self {
        Self::new(
            chrom.to_string(),
            pos,
            reference.to_string(),
            vec![alternate.to_string()],
        )
    }

    /// 0-based start coordinate
    pub fn start(&self) -> u64 {
        self.pos.saturating_sub(1)
    }

    /// Set the variant ID (e.g., rsID)
    pub fn with_id(mut self, id: &str) -> Self {
        self.id = Some(id.to_string());
        self
    }

    /// Set the quality score
    pub fn with_quality(mut self, quality: &str) -> Self {
        self.quality = Some(quality.to_string());
        self
    }

    /// Set the filter field
    pub fn with_filter(mut self, filter: &str) -> Self {
        self.filter = Some(filter.to_string());
        self
    }

    /// Add an INFO field
    pub fn with_info(mut self, key: &str, value: InfoValue) -> Self {
        self.set_info(key, value);
        self
    }

    /// Add a sample, setting the FORMAT keys from the first sample added
    pub fn with_sample(mut self, keys: &[&str], values: &[&str]) -> Self {
        if self.format.is_none() {
            self.format = Some(keys.join(":"));
        }
        let sample = keys
            .iter()
            .zip(values)
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        self.samples.push(sample);
        self
    }

    /// Get an INFO field
    pub fn get_info(&self, key: &str) -> Option<&InfoValue> {
        self.info.iter().find(|(k, _)| k == key).map(|(_, v)| v)
    }

    /// Get an INFO field value as a string
    pub fn get_info_str(&self, key: &str) -> Option<String> {
        self.get_info(key).map(|v| v.to_string())
    }

    /// Check whether an INFO key is present
    pub fn has_info(&self, key: &str) -> bool {
        self.get_info(key).is_some()
    }

    /// Set an INFO field, replacing an existing value in place
    pub fn set_info(&mut self, key: &str, value: InfoValue) {
        match self.info.iter_mut().find(|(k, _)| k == key) {
            Some((_, existing)) => *existing = value,
            None => self.info.push((key.to_string(), value)),
        }
    }

    /// Get a FORMAT value for one sample
    pub fn sample_value(&self, sample: usize, key: &str) -> Option<&str> {
        self.samples
            .get(sample)
            .and_then(|s| s.get(key))
            .map(String::as_str)
    }

    /// Parsed GT call of one sample
    pub fn genotype_call(&self, sample: usize) -> Option<GenotypeCall> {
        self.sample_value(sample, "GT").map(GenotypeCall::parse)
    }

    /// Add a filter name, replacing "." and "PASS"
    pub fn add_filter(&mut self, name: &str) {
        self.filter = match self.filter.take() {
            None => Some(name.to_string()),
            Some(f) if f == "PASS" => Some(name.to_string()),
            Some(f) => Some(format!("{};{}", f, name)),
        };
    }

    /// `chrom:pos` label used in messages
    pub fn locus(&self) -> String {
        format!("{}:{}", self.chrom, self.pos)
    }
}

impl fmt::Display for VcfRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let alternate = if self.alternate.is_empty() {
            ".".to_string()
        } else {
            self.alternate.join(",")
        };
        write!(
            f,
            "{}\t{}\t{}\t{}\t{}\t{}\t{}",
            self.chrom,
            self.pos,
            self.id.as_deref().unwrap_or("."),
            self.reference,
            alternate,
            self.quality.as_deref().unwrap_or("."),
            self.filter.as_deref().unwrap_or("."),
        )?;

        // INFO field
        if self.info.is_empty() {
            write!(f, "\t.")?;
        } else {
            let info_str: Vec<String> = self
                .info
                .iter()
                .map(|(k, v)| match v {
                    InfoValue::Flag => k.clone(),
                    InfoValue::String(s) => format!("{}={}", k, s),
                })
                .collect();
            write!(f, "\t{}", info_str.join(";"))?;
        }

        // FORMAT and samples if present
        if let Some(format) = &self.format {
            write!(f, "\t{}", format)?;
            for sample in &self.samples {
                let fields: Vec<_> = format
                    .split(':')
                    .map(|key| sample.get(key).map(|s| s.as_str()).unwrap_or("."))
                    .collect();
                write!(f, "\t{}", fields.join(":"))?;
            }
        }

        Ok(())
    }
}

/// A parsed GT value such as `0/1`, `1|1` or `./.`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GenotypeCall {
    /// Allele indices, None for a missing allele
    pub alleles: Vec<Option<u32>>,
    /// Whether the alleles are phased (`|`)
    pub phased: bool,
}

impl GenotypeCall {
    /// Parse a GT value; unparseable alleles are treated as missing
    pub fn parse(gt: &str) -> Self {
        let phased = gt.contains('|');
        let alleles = gt
            .split(['/', '|'])
            .map(|a| a.parse::<u32>().ok())
            .collect();
        Self { alleles, phased }
    }

    /// Any allele missing
    pub fn is_missing(&self) -> bool {
        self.alleles.iter().any(Option::is_none)
    }

    /// All alleles called and identical
    pub fn is_hom(&self) -> bool {
        !self.is_missing()
            && self
                .alleles
                .windows(2)
                .all(|w| w[0] == w[1])
    }

    /// Called and carrying at least two distinct alleles
    pub fn is_het(&self) -> bool {
        !self.is_missing() && !self.is_hom()
    }

    /// Carries at least one non-reference allele
    pub fn is_variant(&self) -> bool {
        self.alleles.iter().any(|a| matches!(a, Some(n) if *n > 0))
    }

    /// Called and homozygous reference
    pub fn is_ref(&self) -> bool {
        !self.is_missing() && self.alleles.iter().all(|a| *a == Some(0))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_record() {
        let record = VcfRecord::new(
            "chr1".to_string(),
            12345,
            "A".to_string(),
            vec!["G".to_string()],
        );

        assert_eq!(record.chrom, "chr1");
        assert_eq!(record.pos, 12345);
        assert_eq!(record.start(), 12344);
        assert_eq!(record.reference, "A");
        assert_eq!(record.alternate, vec!["G"]);
        assert!(record.id.is_none());
        assert!(record.quality.is_none());
    }

    #[test]
    fn test_info_order_and_replace() {
        let mut record = VcfRecord::snv("1", 100, 'A', 'G')
            .with_info("DP", InfoValue::String("10".to_string()))
            .with_info("DB", InfoValue::Flag);
        record.set_info("DP", InfoValue::String("12".to_string()));
        record.set_info("AF", InfoValue::String("0.5".to_string()));

        let keys: Vec<&str> = record.info.iter().map(|(k, _)| k.as_str()).collect();
        assert_eq!(keys, vec!["DP", "DB", "AF"]);
        assert_eq!(record.get_info_str("DP"), Some("12".to_string()));
        assert_eq!(record.get_info("DB"), Some(&InfoValue::Flag));
        assert!(!record.has_info("MQ"));
    }

    #[test]
    fn test_display() {
        let record = VcfRecord::snv("chr1", 12345, 'A', 'G')
            .with_id("rs123")
            .with_quality("30")
            .with_filter("PASS")
            .with_info("DP", InfoValue::String("100".to_string()))
            .with_info("DB", InfoValue::Flag)
            .with_sample(&["GT", "DP"], &["0/1", "12"]);

        assert_eq!(
            record.to_string(),
            "chr1\t12345\trs123\tA\tG\t30\tPASS\tDP=100;DB\tGT:DP\t0/1:12"
        );
    }

    #[test]
    fn test_display_missing_columns() {
        let record = VcfRecord::snv("2", 5, 'C', 'T');
        assert_eq!(record.to_string(), "2\t5\t.\tC\tT\t.\t.\t.");
    }

    #[test]
    fn test_add_filter() {
        let mut record = VcfRecord::snv("1", 1, 'A', 'C');
        record.add_filter("LowQ");
        assert_eq!(record.filter.as_deref(), Some("LowQ"));
        record.add_filter("Other");
        assert_eq!(record.filter.as_deref(), Some("LowQ;Other"));

        let mut passing = VcfRecord::snv("1", 1, 'A', 'C').with_filter("PASS");
        passing.add_filter("LowQ");
        assert_eq!(passing.filter.as_deref(), Some("LowQ"));
    }

    #[test]
    fn test_genotype_call() {
        let het = GenotypeCall::parse("0/1");
        assert!(het.is_het());
        assert!(het.is_variant());
        assert!(!het.is_hom());
        assert!(!het.phased);

        let hom_alt = GenotypeCall::parse("1|1");
        assert!(hom_alt.is_hom());
        assert!(hom_alt.is_variant());
        assert!(hom_alt.phased);

        let hom_ref = GenotypeCall::parse("0/0");
        assert!(hom_ref.is_ref());
        assert!(hom_ref.is_hom());
        assert!(!hom_ref.is_variant());

        let missing = GenotypeCall::parse("./.");
        assert!(missing.is_missing());
        assert!(!missing.is_hom());
        assert!(!missing.is_het());
        assert!(!missing.is_ref());
    }

    #[test]
    fn test_sample_lookup() {
        let record = VcfRecord::snv("1", 1, 'A', 'C')
            .with_sample(&["GT", "PL"], &["0/1", "10,0,20"])
            .with_sample(&["GT", "PL"], &["1/1", "30,5,0"]);
        assert_eq!(record.sample_value(1, "PL"), Some("30,5,0"));
        assert_eq!(record.sample_value(2, "PL"), None);
        assert!(record.genotype_call(1).is_some_and(|gt| gt.is_hom()));
    }
}
