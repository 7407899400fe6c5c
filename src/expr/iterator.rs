//! Index resolution for list-valued fields
//!
//! A [`FieldIterator`] belongs to one evaluation call tree. Accessors with an
//! ANY/ALL index register a slot per [`IteratorKind`] while the owning node
//! re-evaluates its subtree; the slots advance together like an odometer so
//! effect lists and genotype arrays can be combined in one expression
//! without interfering.

use std::cmp::Ordering;

use crate::value::Value;

/// Which list an aggregate index walks
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum IteratorKind {
    /// `ANN[*]` / `EFF[*]`
    Effect,
    /// `LOF[*]`
    Lof,
    /// `NMD[*]`
    Nmd,
    /// Comma separated INFO values, `AF[*]`
    InfoVar,
    /// Samples, `GEN[*]`
    Genotype,
    /// Comma separated sample values, `GEN[0].AD[*]`
    GenotypeVar,
}

/// Aggregate index sentinels
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AggregateMode {
    Any,
    All,
    Min,
    Max,
}

impl AggregateMode {
    /// ANY and ALL re-evaluate per index; MIN and MAX pick one index
    pub fn is_iterating(self) -> bool {
        matches!(self, AggregateMode::Any | AggregateMode::All)
    }

    pub fn symbol(self) -> &'static str {
        match self {
            AggregateMode::Any => "*",
            AggregateMode::All => "?",
            AggregateMode::Min => "MIN",
            AggregateMode::Max => "MAX",
        }
    }
}

#[derive(Debug, Clone)]
struct Slot {
    kind: IteratorKind,
    mode: AggregateMode,
    upper: i64,
    current: i64,
}

/// Resolution context for aggregate indices
#[derive(Debug, Clone, Default)]
pub struct FieldIterator {
    active: bool,
    slots: Vec<Slot>,
}

impl FieldIterator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether an owner is currently iterating
    pub fn is_active(&self) -> bool {
        self.active
    }

    /// Start an aggregation owned by one node
    pub fn begin(&mut self) {
        self.active = true;
        self.slots.clear();
    }

    /// Finish the current aggregation
    pub fn end(&mut self) {
        self.active = false;
        self.slots.clear();
    }

    /// Register (or refresh) the domain `0..=upper_bound` for a kind and
    /// return the index selected for this pass
    ///
    /// Returns None when the list is empty or shorter than the selected
    /// index. Outside an active aggregation the first element is used.
    pub fn begin_aggregate(
        &mut self,
        kind: IteratorKind,
        mode: AggregateMode,
        upper_bound: i64,
    ) -> Option<usize> {
        if !self.active {
            return (upper_bound >= 0).then_some(0);
        }

        let current = match self.slots.iter_mut().find(|s| s.kind == kind) {
            Some(slot) => {
                slot.upper = upper_bound;
                slot.current
            }
            None => {
                self.slots.push(Slot {
                    kind,
                    mode,
                    upper: upper_bound,
                    current: 0,
                });
                0
            }
        };

        (current <= upper_bound).then_some(current as usize)
    }

    /// Fold mode of the aggregation: the first ANY/ALL slot registered
    pub fn mode(&self) -> Option<AggregateMode> {
        self.slots.first().map(|s| s.mode)
    }

    /// Whether a list read by the current combination is empty
    ///
    /// Inner bounds are refreshed on every pass, so an empty inner list
    /// only empties the combinations of the current outer index.
    pub fn is_empty(&self) -> bool {
        self.slots.iter().any(|s| s.upper < 0)
    }

    /// Index currently selected for a kind
    pub fn current(&self, kind: IteratorKind) -> Option<usize> {
        self.slots
            .iter()
            .find(|s| s.kind == kind)
            .map(|s| s.current as usize)
    }

    /// Move to the next index combination; false once all are exhausted
    ///
    /// The most recently registered slot turns fastest.
    pub fn advance(&mut self) -> bool {
        for slot in self.slots.iter_mut().rev() {
            if slot.current < slot.upper {
                slot.current += 1;
                return true;
            }
            slot.current = 0;
        }
        false
    }
}

/// Pick the index of the extremal numeric candidate, first one on ties
///
/// Non-numeric candidates are skipped; when none is numeric the first
/// element is selected. Returns None for an empty list.
pub fn select_extremal(mode: AggregateMode, candidates: &[Option<&str>]) -> Option<usize> {
    if candidates.is_empty() {
        return None;
    }

    let wanted = match mode {
        AggregateMode::Max => Ordering::Greater,
        _ => Ordering::Less,
    };

    let mut best: Option<(usize, Value)> = None;
    for (i, candidate) in candidates.iter().enumerate() {
        let Some(text) = candidate else { continue };
        let value = Value::from_text(text);
        if !value.is_numeric() {
            continue;
        }
        match &best {
            Some((_, current)) if value.compare(current) != wanted => {}
            _ => best = Some((i, value)),
        }
    }

    Some(best.map_or(0, |(i, _)| i))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_inactive_selects_first() {
        let mut it = FieldIterator::new();
        assert_eq!(it.begin_aggregate(IteratorKind::Effect, AggregateMode::Any, 3), Some(0));
        assert_eq!(it.begin_aggregate(IteratorKind::Effect, AggregateMode::Any, -1), None);
        assert!(it.mode().is_none());
    }

    #[test]
    fn test_single_slot_walk() {
        let mut it = FieldIterator::new();
        it.begin();
        let mut seen = vec![it.begin_aggregate(IteratorKind::Effect, AggregateMode::All, 2)];
        while it.advance() {
            seen.push(it.begin_aggregate(IteratorKind::Effect, AggregateMode::All, 2));
        }
        assert_eq!(seen, vec![Some(0), Some(1), Some(2)]);
        assert_eq!(it.mode(), Some(AggregateMode::All));
        it.end();
        assert!(!it.is_active());
    }

    #[test]
    fn test_odometer_two_kinds() {
        let mut it = FieldIterator::new();
        it.begin();
        it.begin_aggregate(IteratorKind::Genotype, AggregateMode::Any, 1);
        it.begin_aggregate(IteratorKind::GenotypeVar, AggregateMode::Any, 2);

        let mut pairs = vec![(0, 0)];
        while it.advance() {
            pairs.push((
                it.current(IteratorKind::Genotype).unwrap(),
                it.current(IteratorKind::GenotypeVar).unwrap(),
            ));
        }
        assert_eq!(pairs, vec![(0, 0), (0, 1), (0, 2), (1, 0), (1, 1), (1, 2)]);
    }

    #[test]
    fn test_empty_list() {
        let mut it = FieldIterator::new();
        it.begin();
        assert_eq!(it.begin_aggregate(IteratorKind::Effect, AggregateMode::Any, -1), None);
        assert!(it.is_empty());
        assert!(!it.advance());
    }

    #[test]
    fn test_inner_bound_follows_outer_index() {
        // Sample 0 has no values, sample 1 has two
        let bounds = [-1i64, 1];
        let mut it = FieldIterator::new();
        it.begin();

        let mut visited = Vec::new();
        loop {
            let outer = it.begin_aggregate(IteratorKind::Genotype, AggregateMode::Any, 1).unwrap();
            let inner = it.begin_aggregate(IteratorKind::GenotypeVar, AggregateMode::Any, bounds[outer]);
            visited.push((outer, inner, it.is_empty()));
            if !it.advance() {
                break;
            }
        }
        assert_eq!(
            visited,
            vec![(0, None, true), (1, Some(0), false), (1, Some(1), false)]
        );
    }

    #[test]
    fn test_select_extremal() {
        let values = [Some("3"), Some("7.5"), None, Some("x"), Some("7.5"), Some("-1")];
        assert_eq!(select_extremal(AggregateMode::Max, &values), Some(1));
        assert_eq!(select_extremal(AggregateMode::Min, &values), Some(5));
        assert_eq!(select_extremal(AggregateMode::Max, &[Some("A")]), Some(0));
        assert_eq!(select_extremal(AggregateMode::Min, &[Some("42")]), Some(0));
        assert_eq!(select_extremal(AggregateMode::Min, &[]), None);
    }
}
