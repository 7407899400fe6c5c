//! Expression filtering of a VCF stream

use std::fs;
use std::path::Path;

use log::debug;

use crate::error::SiftError;
use crate::expr::{EvalContext, Expression, ExpressionParser, NamedSet};
use crate::vcf::{EffectFormat, VcfHeader, VcfRecord};

/// Load a set file: one item per line, blank lines and `#` comments
/// skipped, named after the file stem
pub fn load_set_file<P: AsRef<Path>>(path: P) -> Result<NamedSet, SiftError> {
    let path = path.as_ref();
    let content = fs::read_to_string(path).map_err(|e| SiftError::Io {
        msg: format!("Failed to read set file '{}': {}", path.display(), e),
    })?;

    let name = path
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default();
    let items = content
        .lines()
        .map(str::trim)
        .filter(|l| !l.is_empty() && !l.starts_with('#'));

    let set = NamedSet::new(name, items);
    debug!("Loaded set '{}' with {} items", set.name, set.items.len());
    Ok(set)
}

/// Record filter built from one expression
#[derive(Debug, Clone)]
pub struct VcfFilter {
    expr: Expression,
    format: Option<EffectFormat>,
    inverse: bool,
    add_filter: Option<String>,
}

impl VcfFilter {
    pub fn new(expr: Expression) -> Self {
        Self {
            expr,
            format: None,
            inverse: false,
            add_filter: None,
        }
    }

    /// Parse an expression with the given sets and effect layout
    pub fn parse(
        text: &str,
        sets: Vec<NamedSet>,
        format: Option<EffectFormat>,
    ) -> Result<Self, SiftError> {
        let expr = ExpressionParser::new()
            .with_sets(sets)
            .with_format(format)
            .parse(text)?;
        Ok(Self::new(expr).with_format(format))
    }

    pub fn with_format(mut self, format: Option<EffectFormat>) -> Self {
        self.format = format;
        self
    }

    /// Keep the records that do not match
    pub fn with_inverse(mut self, inverse: bool) -> Self {
        self.inverse = inverse;
        self
    }

    /// Keep every record and add `name` to FILTER of the selected ones
    pub fn with_add_filter(mut self, name: Option<String>) -> Self {
        self.add_filter = name;
        self
    }

    pub fn expression(&self) -> &Expression {
        &self.expr
    }

    /// Declare the added FILTER value in the header
    pub fn annotate_header(&self, header: &mut VcfHeader) {
        if let Some(name) = &self.add_filter {
            header.add_filter(name, &format!("Filter expression: {}", self.expr));
        }
    }

    /// Evaluate the expression against a record
    ///
    /// Expressions reading `GEN.*` are evaluated per sample and match when
    /// any sample does.
    pub fn matches(&self, record: &VcfRecord, header: &VcfHeader) -> Result<bool, SiftError> {
        if self.expr.is_genotype_scoped() {
            for sample in 0..record.samples.len() {
                let mut ctx = EvalContext::for_genotype(record, header, sample).with_format(self.format);
                if self.expr.matches(&mut ctx)? {
                    return Ok(true);
                }
            }
            return Ok(false);
        }

        let mut ctx = EvalContext::new(record, header).with_format(self.format);
        self.expr.matches(&mut ctx)
    }

    /// Whether a record is selected, honouring the inverse setting
    pub fn selects(&self, record: &VcfRecord, header: &VcfHeader) -> Result<bool, SiftError> {
        Ok(self.matches(record, header)? != self.inverse)
    }

    /// Apply the filter; returns whether the record is written
    pub fn apply(&self, record: &mut VcfRecord, header: &VcfHeader) -> Result<bool, SiftError> {
        let selected = self.selects(record, header)?;
        match &self.add_filter {
            Some(name) => {
                if selected {
                    record.add_filter(name);
                }
                Ok(true)
            }
            None => Ok(selected),
        }
    }
}
