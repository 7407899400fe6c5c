//! Tabix database tests over a generated BGZF fixture
//!
//! The fixture ends a BGZF block after the header and after each group of
//! lines, and indexes every line at its virtual position, so seeks exercise
//! both block and in-block offsets.

use std::fs::File;
use std::io::Write;
use std::path::{Path, PathBuf};

use ferro_sift::annotate::{AnnotationConfig, AnnotationEngine};
use ferro_sift::cli::open_database;
use ferro_sift::db::{index_path, AnnotationDatabase, TabixDatabase};
use ferro_sift::vcf::VcfRecord;
use ferro_sift::ErrorCode;
use noodles::core::Position;
use noodles::csi::binning_index::index::reference_sequence::bin::Chunk;
use noodles::{bgzf, tabix};
use tempfile::TempDir;

const HEADER: &str = "#chr\tpos\tref\talt\tX\tY\n";
const CHR1_NEAR: &str = "1\t100\tA\tG\t5\tfoo\n1\t100\tA\tT\t6\tbar\n1\t200\tC\tT\t7\t.\n";
const CHR1_FAR: &str = "1\t20000\tG\tA\t8\tbaz\n1\t20001\tT\tC\t9\tqux\n";
const CHR2: &str = "2\t50\tA\tC\t10\tlast\n";

struct Fixture {
    _dir: TempDir,
    path: PathBuf,
}

/// Write `db.txt.gz` as three BGZF blocks and, if requested, its index
fn fixture(with_index: bool) -> Fixture {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("db.txt.gz");

    let mut writer = bgzf::Writer::new(File::create(&path).unwrap());
    writer.write_all(HEADER.as_bytes()).unwrap();
    writer.flush().unwrap();

    let mut indexer = tabix::index::Indexer::default();
    for block in [CHR1_NEAR.to_string(), format!("{}{}", CHR1_FAR, CHR2)] {
        for line in block.lines() {
            let start = writer.virtual_position();
            writeln!(writer, "{}", line).unwrap();
            let end = writer.virtual_position();

            let fields: Vec<&str> = line.split('\t').collect();
            let pos = Position::new(fields[1].parse().unwrap()).unwrap();
            indexer
                .add_record(fields[0], pos, pos, Chunk::new(start, end))
                .unwrap();
        }
        writer.flush().unwrap();
    }
    writer.finish().unwrap();

    if with_index {
        tabix::fs::write(index_path(&path), &indexer.build()).unwrap();
    }

    Fixture { _dir: dir, path }
}

fn positions(db: &mut impl AnnotationDatabase) -> Vec<(String, u64)> {
    let mut out = Vec::new();
    while let Some(row) = db.next_row().unwrap() {
        out.push((row.chrom.clone(), row.pos));
    }
    out
}

#[test]
fn test_open_reads_header_and_index() {
    let f = fixture(true);
    let db = TabixDatabase::open(&f.path).unwrap();
    assert!(db.is_indexed());
    assert!(db.index().is_some());
    assert_eq!(db.column_names(), &["ref", "alt", "X", "Y"]);
    assert_eq!(db.column_index("X"), Some(2));
    assert_eq!(db.reference_names(), vec!["1".to_string(), "2".to_string()]);
}

#[test]
fn test_sequential_read_groups_alleles() {
    let f = fixture(true);
    let mut db = TabixDatabase::open(&f.path).unwrap();

    let first = db.next_row().unwrap().unwrap();
    assert_eq!((first.chrom.as_str(), first.pos), ("1", 100));
    assert_eq!(first.value("G", 2), Some("5"));
    assert_eq!(first.value("T", 3), Some("bar"));

    let rest = positions(&mut db);
    assert_eq!(
        rest,
        vec![
            ("1".to_string(), 200),
            ("1".to_string(), 20000),
            ("1".to_string(), 20001),
            ("2".to_string(), 50),
        ]
    );
}

#[test]
fn test_seek_within_chromosome() {
    let f = fixture(true);
    let mut db = TabixDatabase::open(&f.path).unwrap();

    assert!(db.seek("1", 20001).unwrap());
    // Rows stay on the seeked chromosome
    assert_eq!(positions(&mut db), vec![("1".to_string(), 20001)]);

    assert!(db.seek("1", 150).unwrap());
    assert_eq!(db.next_row().unwrap().unwrap().pos, 200);
}

#[test]
fn test_seek_in_block_offset() {
    let f = fixture(true);
    let mut db = TabixDatabase::open(&f.path).unwrap();

    assert!(db.seek("2", 1).unwrap());
    let row = db.next_row().unwrap().unwrap();
    assert_eq!((row.chrom.as_str(), row.pos), ("2", 50));
    assert_eq!(row.value("C", 3), Some("last"));
    assert!(db.next_row().unwrap().is_none());
}

#[test]
fn test_seek_past_last_row() {
    let f = fixture(true);
    let mut db = TabixDatabase::open(&f.path).unwrap();
    assert!(db.seek("1", 30000).unwrap());
    assert!(positions(&mut db).is_empty());

    // A later seek recovers from the finished state
    assert!(db.seek("2", 50).unwrap());
    assert_eq!(positions(&mut db), vec![("2".to_string(), 50)]);
}

#[test]
fn test_seek_unknown_chromosome() {
    let f = fixture(true);
    let mut db = TabixDatabase::open(&f.path).unwrap();
    assert!(!db.seek("X", 1).unwrap());
    assert!(db.next_row().unwrap().is_none());
}

#[test]
fn test_unindexed_seek_rescans() {
    let f = fixture(false);
    let mut db = TabixDatabase::open(&f.path).unwrap();
    assert!(!db.is_indexed());
    assert!(db.reference_names().is_empty());

    assert!(db.seek("1", 20000).unwrap());
    assert_eq!(
        positions(&mut db),
        vec![("1".to_string(), 20000), ("1".to_string(), 20001)]
    );
    assert!(!db.seek("X", 1).unwrap());
}

#[test]
fn test_index_check() {
    let f = fixture(false);
    let err = open_database(&f.path, true).err().unwrap();
    assert_eq!(err.code(), Some(ErrorCode::MissingIndex));
    assert!(open_database(&f.path, false).is_ok());

    let indexed = fixture(true);
    assert!(open_database(&indexed.path, true).unwrap().is_indexed());
}

fn annotate_all(path: &Path, min_jump: u64) -> Vec<Option<String>> {
    let db = TabixDatabase::open(path).unwrap();
    let config = AnnotationConfig::new()
        .with_fields(["X"])
        .with_min_jump(min_jump)
        .with_prefix("dbNSFP_");
    let mut engine = AnnotationEngine::new(db, config).unwrap();

    [("1", 100u64, 'A', 'G'), ("1", 20001, 'T', 'C'), ("2", 50, 'A', 'C'), ("3", 7, 'G', 'A')]
        .iter()
        .map(|&(chrom, pos, r, a)| {
            let mut record = VcfRecord::snv(chrom, pos, r, a);
            engine.annotate(&mut record).unwrap();
            record.get_info_str("dbNSFP_X")
        })
        .collect()
}

#[test]
fn test_annotate_through_index() {
    let f = fixture(true);
    let expected = vec![Some("5".to_string()), Some("9".to_string()), Some("10".to_string()), None];
    // Seek path and scan path agree
    assert_eq!(annotate_all(&f.path, 100), expected);
    assert_eq!(annotate_all(&f.path, 1_000_000), expected);
}
