//! Tabix-indexed, BGZF compressed databases
//!
//! With a `.tbi` next to the file, rows are read through a noodles BGZF
//! reader and a seek jumps to the smallest chunk start the index returns
//! for the target region. Without one, a seek rescans the gzip stream from
//! the start.

use std::collections::HashMap;
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::{Path, PathBuf};

use flate2::read::MultiGzDecoder;
use log::debug;
use noodles::core::region::Interval;
use noodles::core::Position;
use noodles::csi::BinningIndex;
use noodles::{bgzf, tabix};

use crate::error::SiftError;

use super::{infer_column_types, AnnotationDatabase, ColumnType, DatabaseRow, RowReader, TYPE_SAMPLE_ROWS};

/// Index path next to a database file
pub fn index_path(path: &Path) -> PathBuf {
    let mut name = path.as_os_str().to_owned();
    name.push(".tbi");
    PathBuf::from(name)
}

fn open_file(path: &Path) -> Result<File, SiftError> {
    File::open(path).map_err(|e| SiftError::Io {
        msg: format!("Failed to open database '{}': {}", path.display(), e),
    })
}

fn open_stream(path: &Path) -> Result<Box<dyn BufRead>, SiftError> {
    Ok(Box::new(BufReader::new(MultiGzDecoder::new(open_file(path)?))))
}

fn read_index(path: &Path) -> Result<tabix::Index, SiftError> {
    tabix::fs::read(path).map_err(|e| SiftError::InvalidDatabase {
        msg: format!("Failed to read tabix index '{}': {}", path.display(), e),
    })
}

enum Source {
    Indexed {
        index: tabix::Index,
        rows: RowReader<bgzf::Reader<File>>,
    },
    Unindexed(RowReader<Box<dyn BufRead>>),
}

/// Tabix-indexed database file
pub struct TabixDatabase {
    path: PathBuf,
    columns: Vec<String>,
    types: HashMap<String, ColumnType>,
    source: Source,
}

impl TabixDatabase {
    /// Open a BGZF database and its `.tbi` index when present
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self, SiftError> {
        let path = path.as_ref().to_path_buf();

        let (columns, mut sampler) = RowReader::with_header(open_stream(&path)?)?;
        let mut sample = Vec::new();
        while sample.len() < TYPE_SAMPLE_ROWS {
            match sampler.next_row()? {
                Some(row) => sample.push(row),
                None => break,
            }
        }
        let types = infer_column_types(&columns, &sample);

        let tbi = index_path(&path);
        let source = if tbi.exists() {
            let index = read_index(&tbi)?;
            let (_, rows) = RowReader::with_header(bgzf::Reader::new(open_file(&path)?))?;
            Source::Indexed { index, rows }
        } else {
            let (_, rows) = RowReader::with_header(open_stream(&path)?)?;
            Source::Unindexed(rows)
        };

        debug!(
            "Opened database '{}': {} columns, {} rows sampled, indexed: {}",
            path.display(),
            columns.len(),
            sample.len(),
            matches!(source, Source::Indexed { .. })
        );

        Ok(Self {
            path,
            columns,
            types,
            source,
        })
    }

    pub fn index(&self) -> Option<&tabix::Index> {
        match &self.source {
            Source::Indexed { index, .. } => Some(index),
            Source::Unindexed(_) => None,
        }
    }

    /// Sequence names listed in the index, in index order
    pub fn reference_names(&self) -> Vec<String> {
        self.index()
            .and_then(|index| index.header())
            .map(|header| {
                header
                    .reference_sequence_names()
                    .iter()
                    .map(|name| {
                        let name: &[u8] = name.as_ref();
                        String::from_utf8_lossy(name).into_owned()
                    })
                    .collect()
            })
            .unwrap_or_default()
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

/// Index of a sequence name in the index header
fn reference_id(index: &tabix::Index, chrom: &str) -> Option<usize> {
    index.header()?.reference_sequence_names().iter().position(|name| {
        let name: &[u8] = name.as_ref();
        name == chrom.as_bytes()
    })
}

impl AnnotationDatabase for TabixDatabase {
    fn next_row(&mut self) -> Result<Option<DatabaseRow>, SiftError> {
        match &mut self.source {
            Source::Indexed { rows, .. } => rows.next_row(),
            Source::Unindexed(rows) => rows.next_row(),
        }
    }

    fn seek(&mut self, chrom: &str, pos: u64) -> Result<bool, SiftError> {
        let (index, rows) = match &mut self.source {
            Source::Indexed { index, rows } => (index, rows),
            Source::Unindexed(rows) => {
                debug!("Unindexed seek to {}:{}, scanning from the start", chrom, pos);
                let (_, mut reader) = RowReader::with_header(open_stream(&self.path)?)?;
                let found = reader.restrict(chrom, pos)?;
                *rows = reader;
                return Ok(found);
            }
        };

        let Some(id) = reference_id(index, chrom) else {
            rows.finish();
            return Ok(false);
        };

        let start = usize::try_from(pos)
            .ok()
            .and_then(Position::new)
            .unwrap_or(Position::MIN);
        let chunks = index
            .query(id, Interval::from(start..))
            .map_err(|e| SiftError::InvalidDatabase {
                msg: format!("tabix query for {}:{} failed: {}", chrom, pos, e),
            })?;

        let Some(offset) = chunks.iter().map(|chunk| chunk.start()).min() else {
            rows.finish();
            return Ok(true);
        };

        rows.get_mut().seek(offset)?;
        rows.reset();
        rows.restrict(chrom, pos)?;
        Ok(true)
    }

    fn is_indexed(&self) -> bool {
        matches!(self.source, Source::Indexed { .. })
    }

    fn column_names(&self) -> &[String] {
        &self.columns
    }

    fn column_types(&self) -> &HashMap<String, ColumnType> {
        &self.types
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_index_path() {
        assert_eq!(
            index_path(Path::new("/data/dbNSFP.txt.gz")),
            PathBuf::from("/data/dbNSFP.txt.gz.tbi")
        );
    }

    #[test]
    fn test_unreadable_index_is_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("db.txt.gz");
        let mut writer = bgzf::Writer::new(File::create(&path).unwrap());
        std::io::Write::write_all(&mut writer, b"#chr\tpos\tref\talt\tX\n1\t1\tA\tG\t1\n").unwrap();
        writer.finish().unwrap();
        std::fs::write(index_path(&path), b"not an index").unwrap();

        let err = TabixDatabase::open(&path).err().unwrap();
        assert!(matches!(err, SiftError::InvalidDatabase { .. }));
    }
}
