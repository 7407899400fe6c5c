//! CLI utilities for ferro-sift
//!
//! This module provides testable functions used by the CLI binary.
//! The command drivers take readers and writers so they can be exercised
//! without touching the file system.

use std::fs::File;
use std::io::{self, BufRead, BufWriter, Write};
use std::path::Path;

use log::info;
use serde::Serialize;

use crate::annotate::{AnnotationEngine, AnnotationStats};
use crate::db::{AnnotationDatabase, MemoryDatabase, TabixDatabase};
use crate::error::SiftError;
use crate::filter::VcfFilter;
use crate::vcf::{VcfReader, VcfWriter};

/// Counts from a filter run
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct FilterStats {
    /// Records read
    pub total: usize,
    /// Records written
    pub written: usize,
}

/// Open an output stream; `-` or no path is stdout
pub fn output_writer(path: Option<&Path>) -> Result<Box<dyn Write>, SiftError> {
    match path {
        Some(p) if p.as_os_str() != "-" => {
            let file = File::create(p).map_err(|e| SiftError::Io {
                msg: format!("Failed to create '{}': {}", p.display(), e),
            })?;
            Ok(Box::new(BufWriter::new(file)))
        }
        _ => Ok(Box::new(BufWriter::new(io::stdout()))),
    }
}

/// Open an annotation database
///
/// Gzip files are read through their tabix index, which must exist unless
/// `index_check` is off. Plain text files are loaded into memory.
pub fn open_database(path: &Path, index_check: bool) -> Result<Box<dyn AnnotationDatabase>, SiftError> {
    if path.to_string_lossy().ends_with(".gz") {
        let db = TabixDatabase::open(path)?;
        if index_check && !db.is_indexed() {
            return Err(SiftError::missing_index(&path.to_string_lossy()));
        }
        Ok(Box::new(db))
    } else {
        Ok(Box::new(MemoryDatabase::open(path)?))
    }
}

/// Filter a VCF stream
pub fn run_filter<R: BufRead, W: Write>(
    mut reader: VcfReader<R>,
    output: W,
    filter: &VcfFilter,
) -> Result<FilterStats, SiftError> {
    filter.annotate_header(reader.header_mut());
    let header = reader.header().clone();

    let mut writer = VcfWriter::new(output);
    writer.write_header(&header)?;

    let mut stats = FilterStats::default();
    while let Some(mut record) = reader.read_record()? {
        stats.total += 1;
        if filter.apply(&mut record, &header)? {
            writer.write_record(&record)?;
            stats.written += 1;
        }
    }
    writer.flush()?;

    info!("Filtered {} records, {} written", stats.total, stats.written);
    Ok(stats)
}

/// Annotate a VCF stream from a database
///
/// The header is written only after every record source is ready, so a
/// configuration failure produces no output.
pub fn run_annotate<R: BufRead, W: Write, D: AnnotationDatabase>(
    mut reader: VcfReader<R>,
    output: W,
    engine: &mut AnnotationEngine<D>,
) -> Result<AnnotationStats, SiftError> {
    engine.annotate_header(reader.header_mut());

    let mut writer = VcfWriter::new(output);
    writer.write_header(reader.header())?;

    while let Some(mut record) = reader.read_record()? {
        engine.annotate(&mut record)?;
        writer.write_record(&record)?;
    }
    writer.flush()?;

    let stats = engine.stats().clone();
    info!(
        "Done. Annotated {} of {} records ({:.2}%)",
        stats.annotated, stats.total, stats.percent
    );
    Ok(stats)
}
