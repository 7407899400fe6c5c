//! In-memory annotation database for small files and tests

use std::collections::HashMap;
use std::fs::File;
use std::io::{BufRead, BufReader, Cursor};
use std::path::Path;

use flate2::read::MultiGzDecoder;

use crate::error::SiftError;

use super::{infer_column_types, AnnotationDatabase, ColumnType, DatabaseRow, RowReader, TYPE_SAMPLE_ROWS};

/// All rows of a database held in memory
#[derive(Debug, Clone, Default)]
pub struct MemoryDatabase {
    columns: Vec<String>,
    types: HashMap<String, ColumnType>,
    rows: Vec<DatabaseRow>,
    /// Next row to return
    position: usize,
    /// End of the readable range (the seeked chromosome's last row + 1)
    limit: usize,
    seeks: usize,
}

impl MemoryDatabase {
    /// Load a database from text with a `#` header line
    pub fn from_reader<R: BufRead>(reader: R) -> Result<Self, SiftError> {
        let (columns, mut reader) = RowReader::with_header(reader)?;
        let mut rows = Vec::new();
        while let Some(row) = reader.next_row()? {
            rows.push(row);
        }

        let sample = &rows[..rows.len().min(TYPE_SAMPLE_ROWS)];
        let types = infer_column_types(&columns, sample);
        let limit = rows.len();

        Ok(Self {
            columns,
            types,
            rows,
            position: 0,
            limit,
            seeks: 0,
        })
    }

    /// Load a database from a string
    pub fn from_text(text: &str) -> Result<Self, SiftError> {
        Self::from_reader(Cursor::new(text))
    }

    /// Load a plain or gzip compressed database file
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self, SiftError> {
        let path = path.as_ref();
        let file = File::open(path).map_err(|e| SiftError::Io {
            msg: format!("Failed to open database '{}': {}", path.display(), e),
        })?;

        if path.to_string_lossy().ends_with(".gz") {
            Self::from_reader(BufReader::new(MultiGzDecoder::new(file)))
        } else {
            Self::from_reader(BufReader::new(file))
        }
    }

    /// Number of grouped rows
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Number of seeks served so far
    pub fn seeks(&self) -> usize {
        self.seeks
    }
}

impl AnnotationDatabase for MemoryDatabase {
    fn next_row(&mut self) -> Result<Option<DatabaseRow>, SiftError> {
        if self.position >= self.limit {
            return Ok(None);
        }
        let row = self.rows[self.position].clone();
        self.position += 1;
        Ok(Some(row))
    }

    fn seek(&mut self, chrom: &str, pos: u64) -> Result<bool, SiftError> {
        self.seeks += 1;

        let Some(first) = self.rows.iter().position(|r| r.chrom == chrom) else {
            self.position = self.rows.len();
            self.limit = self.rows.len();
            return Ok(false);
        };
        let end = self.rows[first..]
            .iter()
            .position(|r| r.chrom != chrom)
            .map_or(self.rows.len(), |n| first + n);

        self.position = first + self.rows[first..end].partition_point(|r| r.pos < pos);
        self.limit = end;
        Ok(true)
    }

    fn is_indexed(&self) -> bool {
        true
    }

    fn column_names(&self) -> &[String] {
        &self.columns
    }

    fn column_types(&self) -> &HashMap<String, ColumnType> {
        &self.types
    }
}
