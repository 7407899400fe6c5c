//! Coordinate-sorted annotation databases
//!
//! A database is tab separated text whose last `#` header line names the
//! columns. The first two columns are the chromosome and the 1-based
//! position; the fourth column holds the alternate allele. Every column
//! after the position is addressable by name.
//!
//! ```text
//! #chr  pos(1-based)  ref  alt  SIFT_pred  GERP++_RS
//! 1     69134         A    G    D          2.31
//! ```
//!
//! Consecutive lines at the same chromosome and position are grouped into
//! one [`DatabaseRow`] holding per-allele values.

mod cursor;
mod memory;
mod tabix;

use std::collections::HashMap;
use std::io::BufRead;

use memchr::memchr_iter;

use crate::error::SiftError;

pub use cursor::{classify, find_match, CursorState, Transition, DEFAULT_MIN_JUMP};
pub use memory::MemoryDatabase;
pub use tabix::{index_path, TabixDatabase};

/// Number of data rows sampled for column type inference
pub const TYPE_SAMPLE_ROWS: usize = 1000;

/// Index of the alternate allele among the named columns
const ALT_COLUMN: usize = 1;

/// Source of database rows in coordinate order
pub trait AnnotationDatabase {
    /// Read the next row, or None when exhausted
    fn next_row(&mut self) -> Result<Option<DatabaseRow>, SiftError>;

    /// Position at the first row on `chrom` with position >= `pos`
    ///
    /// Rows read afterwards stay on `chrom`. Returns false when the
    /// chromosome is absent, leaving the database exhausted.
    fn seek(&mut self, chrom: &str, pos: u64) -> Result<bool, SiftError>;

    /// Whether seeks are served by an index
    fn is_indexed(&self) -> bool;

    /// Addressable column names (every column after the position)
    fn column_names(&self) -> &[String];

    /// Inferred column types; columns with no sampled value are absent
    fn column_types(&self) -> &HashMap<String, ColumnType>;

    /// Position of a column in each row's value list
    fn column_index(&self, name: &str) -> Option<usize> {
        self.column_names().iter().position(|c| c == name)
    }
}

impl<D: AnnotationDatabase + ?Sized> AnnotationDatabase for Box<D> {
    fn next_row(&mut self) -> Result<Option<DatabaseRow>, SiftError> {
        (**self).next_row()
    }

    fn seek(&mut self, chrom: &str, pos: u64) -> Result<bool, SiftError> {
        (**self).seek(chrom, pos)
    }

    fn is_indexed(&self) -> bool {
        (**self).is_indexed()
    }

    fn column_names(&self) -> &[String] {
        (**self).column_names()
    }

    fn column_types(&self) -> &HashMap<String, ColumnType> {
        (**self).column_types()
    }
}

/// VCF header type of a database column
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColumnType {
    Integer,
    Float,
    String,
}

impl ColumnType {
    /// Name used in `Type=` of an INFO header line
    pub fn vcf_type(self) -> &'static str {
        match self {
            ColumnType::Integer => "Integer",
            ColumnType::Float => "Float",
            ColumnType::String => "String",
        }
    }

    /// Narrowest type holding every non-empty value, or None when all are
    /// empty
    pub fn infer<'a>(values: impl IntoIterator<Item = &'a str>) -> Option<Self> {
        let mut inferred: Option<ColumnType> = None;

        for part in values
            .into_iter()
            .flat_map(|v| v.split([';', ',']))
            .filter(|p| !p.is_empty() && *p != ".")
        {
            let kind = if part.parse::<i64>().is_ok() {
                ColumnType::Integer
            } else if part.parse::<f64>().is_ok() {
                ColumnType::Float
            } else {
                return Some(ColumnType::String);
            };
            inferred = Some(match (inferred, kind) {
                (Some(ColumnType::Float), _) | (_, ColumnType::Float) => ColumnType::Float,
                _ => ColumnType::Integer,
            });
        }

        inferred
    }
}

/// Infer the type of every column from sampled rows
pub fn infer_column_types(columns: &[String], rows: &[DatabaseRow]) -> HashMap<String, ColumnType> {
    columns
        .iter()
        .enumerate()
        .filter_map(|(i, name)| {
            let values = rows
                .iter()
                .flat_map(|row| row.values.iter().filter_map(move |v| v.get(i)))
                .map(String::as_str);
            ColumnType::infer(values).map(|t| (name.clone(), t))
        })
        .collect()
}

/// All database lines at one chromosome and position
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DatabaseRow {
    pub chrom: String,
    /// 1-based position
    pub pos: u64,
    alleles: Vec<String>,
    /// Per allele, one value per column
    values: Vec<Vec<String>>,
}

impl DatabaseRow {
    pub fn new(chrom: impl Into<String>, pos: u64) -> Self {
        Self {
            chrom: chrom.into(),
            pos,
            alleles: Vec::new(),
            values: Vec::new(),
        }
    }

    /// Add the columns of one database line for an allele
    ///
    /// A repeated allele has its values appended with `,`.
    pub fn push(&mut self, allele: &str, columns: Vec<String>) {
        match self.alleles.iter().position(|a| a == allele) {
            Some(i) => {
                for (existing, value) in self.values[i].iter_mut().zip(columns) {
                    existing.push(',');
                    existing.push_str(&value);
                }
            }
            None => {
                self.alleles.push(allele.to_string());
                self.values.push(columns);
            }
        }
    }

    /// Database alleles in file order
    pub fn alleles(&self) -> &[String] {
        &self.alleles
    }

    /// Value of a column for an allele
    pub fn value(&self, allele: &str, column: usize) -> Option<&str> {
        let i = self.alleles.iter().position(|a| a == allele)?;
        self.values[i].get(column).map(String::as_str)
    }

    /// Per-allele values of a column
    pub fn column(&self, column: usize) -> impl Iterator<Item = (&str, &str)> {
        self.alleles
            .iter()
            .zip(&self.values)
            .filter_map(move |(a, v)| v.get(column).map(|v| (a.as_str(), v.as_str())))
    }

    pub fn locus(&self) -> String {
        format!("{}:{}", self.chrom, self.pos)
    }
}

/// One parsed data line
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct DatabaseLine {
    pub chrom: String,
    pub pos: u64,
    pub columns: Vec<String>,
}

impl DatabaseLine {
    /// Split a data line into chromosome, position and `width` named columns
    pub fn parse(line: &str, width: usize, line_number: usize) -> Result<Self, SiftError> {
        let bytes = line.as_bytes();
        let mut fields = Vec::with_capacity(width + 2);
        let mut start = 0;
        for tab in memchr_iter(b'\t', bytes) {
            fields.push(&line[start..tab]);
            start = tab + 1;
        }
        fields.push(&line[start..]);

        if fields.len() < 2 + ALT_COLUMN + 1 {
            return Err(SiftError::InvalidDatabase {
                msg: format!(
                    "line {}: expected at least {} columns, found {}",
                    line_number,
                    2 + ALT_COLUMN + 1,
                    fields.len()
                ),
            });
        }

        let pos = fields[1].parse::<u64>().map_err(|_| SiftError::InvalidDatabase {
            msg: format!("line {}: invalid position '{}'", line_number, fields[1]),
        })?;

        let mut columns: Vec<String> = fields[2..].iter().map(|s| s.to_string()).collect();
        columns.resize(width, String::new());

        Ok(Self {
            chrom: fields[0].to_string(),
            pos,
            columns,
        })
    }

    fn allele(&self) -> &str {
        self.columns.get(ALT_COLUMN).map_or("", String::as_str)
    }
}

/// Parse the column names of a `#` header line, without chromosome and
/// position
pub(crate) fn parse_header_line(line: &str) -> Result<Vec<String>, SiftError> {
    let names: Vec<String> = line
        .trim_start_matches('#')
        .split('\t')
        .map(|s| s.trim().to_string())
        .collect();
    if names.len() < 2 + ALT_COLUMN + 1 {
        return Err(SiftError::InvalidDatabase {
            msg: format!("header line has {} columns, expected chromosome, position, ref and alt", names.len()),
        });
    }
    Ok(names[2..].to_vec())
}

/// Groups data lines of a text stream into rows
pub(crate) struct RowReader<R> {
    inner: R,
    width: usize,
    /// Restricts rows to one chromosome after a seek
    chrom: Option<String>,
    pending: Option<DatabaseLine>,
    /// Set when a seek finds nothing to read
    exhausted: bool,
    line_number: usize,
    buf: String,
}

impl<R: BufRead> RowReader<R> {
    pub fn new(inner: R, width: usize) -> Self {
        Self {
            inner,
            width,
            chrom: None,
            pending: None,
            exhausted: false,
            line_number: 0,
            buf: String::new(),
        }
    }

    pub fn get_mut(&mut self) -> &mut R {
        &mut self.inner
    }

    /// Drop buffered state after the underlying stream was repositioned
    pub fn reset(&mut self) {
        self.chrom = None;
        self.pending = None;
        self.exhausted = false;
    }

    /// Yield no further rows until the next reset
    pub fn finish(&mut self) {
        self.reset();
        self.exhausted = true;
    }

    /// Read the header lines and return the column names with a reader
    /// positioned at the first data line
    pub fn with_header(mut inner: R) -> Result<(Vec<String>, Self), SiftError> {
        let mut header = None;
        let mut line = String::new();
        let mut line_number = 0;

        loop {
            line.clear();
            if inner.read_line(&mut line)? == 0 {
                break;
            }
            line_number += 1;
            let trimmed = line.trim_end_matches(['\n', '\r']);
            if trimmed.starts_with('#') {
                header = Some(trimmed.to_string());
                continue;
            }
            if trimmed.is_empty() {
                continue;
            }

            let Some(header) = header.as_deref() else { break };
            let columns = parse_header_line(header)?;
            let first = DatabaseLine::parse(trimmed, columns.len(), line_number)?;
            let mut reader = Self::new(inner, columns.len());
            reader.pending = Some(first);
            reader.line_number = line_number;
            return Ok((columns, reader));
        }

        match header {
            Some(header) => {
                let columns = parse_header_line(&header)?;
                let mut reader = Self::new(inner, columns.len());
                reader.line_number = line_number;
                Ok((columns, reader))
            }
            None => Err(SiftError::InvalidDatabase {
                msg: "missing '#' header line with column names".to_string(),
            }),
        }
    }

    /// Keep only rows on `chrom` at or after `pos`
    ///
    /// Lines before the target are consumed, including lines of other
    /// chromosomes ahead of the first `chrom` line. Returns whether any
    /// line of `chrom` was found.
    pub fn restrict(&mut self, chrom: &str, pos: u64) -> Result<bool, SiftError> {
        self.chrom = None;
        let mut found = false;
        loop {
            match self.next_line()? {
                Some(line) if line.chrom != chrom && !found => continue,
                Some(line) if line.chrom == chrom && line.pos < pos => found = true,
                Some(line) => {
                    found |= line.chrom == chrom;
                    self.pending = Some(line);
                    break;
                }
                None => break,
            }
        }
        self.chrom = Some(chrom.to_string());
        Ok(found)
    }

    fn next_line(&mut self) -> Result<Option<DatabaseLine>, SiftError> {
        if self.exhausted {
            return Ok(None);
        }
        let line = match self.pending.take() {
            Some(line) => line,
            None => loop {
                self.buf.clear();
                if self.inner.read_line(&mut self.buf)? == 0 {
                    return Ok(None);
                }
                self.line_number += 1;
                let trimmed = self.buf.trim_end_matches(['\n', '\r']);
                if trimmed.is_empty() || trimmed.starts_with('#') {
                    continue;
                }
                break DatabaseLine::parse(trimmed, self.width, self.line_number)?;
            },
        };

        match &self.chrom {
            Some(chrom) if *chrom != line.chrom => {
                self.pending = Some(line);
                Ok(None)
            }
            _ => Ok(Some(line)),
        }
    }

    pub fn next_row(&mut self) -> Result<Option<DatabaseRow>, SiftError> {
        let Some(first) = self.next_line()? else {
            return Ok(None);
        };

        let allele = first.allele().to_string();
        let mut row = DatabaseRow::new(first.chrom, first.pos);
        row.push(&allele, first.columns);

        while let Some(line) = self.next_line()? {
            if line.chrom == row.chrom && line.pos == row.pos {
                let allele = line.allele().to_string();
                row.push(&allele, line.columns);
            } else {
                self.pending = Some(line);
                break;
            }
        }

        Ok(Some(row))
    }
}
