//! Merge join of a sorted record stream against a sorted database
//!
//! The cursor keeps the current database row between records so identical
//! positions reuse it. Small forward gaps are closed by reading rows; gaps
//! larger than the jump threshold, and chromosome changes, seek.

use log::{debug, trace};

use crate::error::SiftError;

use super::{AnnotationDatabase, DatabaseRow};

/// Default gap (in bases) above which the cursor seeks instead of scanning
pub const DEFAULT_MIN_JUMP: u64 = 100;

/// Position of the merge join between calls
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CursorState {
    /// Database row under the cursor
    pub current: Option<DatabaseRow>,
    /// Chromosome of the last row read; the database is known to be
    /// exhausted for it once reads return nothing
    pub latest_chrom: String,
}

/// Next step for a lookup given the current state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transition {
    /// No row under the cursor: read one
    Fetch,
    /// The row is at the record's position
    Matched,
    /// The row is past the record: no entry
    Passed,
    /// The row is far behind the record: seek
    Jump,
    /// The row is slightly behind the record: read the next one
    Scan,
    /// The row is on another chromosome: seek
    ChromosomeJump,
}

/// Decide the next step without touching the database
pub fn classify(state: &CursorState, chrom: &str, pos: u64, min_jump: u64) -> Transition {
    match &state.current {
        None => Transition::Fetch,
        Some(row) if row.chrom != chrom => Transition::ChromosomeJump,
        Some(row) if row.pos == pos => Transition::Matched,
        Some(row) if row.pos > pos => Transition::Passed,
        Some(row) if pos - row.pos > min_jump => Transition::Jump,
        Some(_) => Transition::Scan,
    }
}

/// Find the database row at `chrom:pos`
///
/// Returns the updated state and whether `state.current` now matches. A
/// chromosome missing from the database is not an error.
pub fn find_match<D>(
    mut state: CursorState,
    db: &mut D,
    chrom: &str,
    pos: u64,
    min_jump: u64,
) -> Result<(CursorState, bool), SiftError>
where
    D: AnnotationDatabase + ?Sized,
{
    loop {
        let transition = classify(&state, chrom, pos, min_jump);
        trace!("{}:{} {:?}", chrom, pos, transition);

        match transition {
            Transition::Matched => return Ok((state, true)),
            Transition::Passed => return Ok((state, false)),
            Transition::Fetch => {
                state.current = db.next_row()?;
                if state.current.is_none() {
                    if state.latest_chrom == chrom {
                        return Ok((state, false));
                    }
                    debug!(
                        "Database exhausted on '{}', seeking to {}:{}",
                        state.latest_chrom, chrom, pos
                    );
                    db.seek(chrom, pos)?;
                    state.current = db.next_row()?;
                    if state.current.is_none() {
                        state.latest_chrom = chrom.to_string();
                        return Ok((state, false));
                    }
                }
            }
            Transition::Jump => {
                debug!(
                    "Position jump: {} -> {}:{}",
                    state.current.as_ref().map_or_else(String::new, DatabaseRow::locus),
                    chrom,
                    pos
                );
                if !db.seek(chrom, pos)? {
                    state.current = None;
                    state.latest_chrom = chrom.to_string();
                    return Ok((state, false));
                }
                state.current = db.next_row()?;
            }
            Transition::Scan => {
                state.current = db.next_row()?;
            }
            Transition::ChromosomeJump => {
                debug!(
                    "Chromosome jump: {} -> {}:{}",
                    state.current.as_ref().map_or_else(String::new, DatabaseRow::locus),
                    chrom,
                    pos
                );
                if !db.seek(chrom, pos)? {
                    return Ok((state, false));
                }
                state.current = db.next_row()?;
            }
        }

        if let Some(row) = &state.current {
            state.latest_chrom.clone_from(&row.chrom);
        }
    }
}
