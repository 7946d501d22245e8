// Reconciliation: merge pair-indexed figure classifications onto voices.
//
// Each figure classifier emits one column per voice pair, with cells like
// "0:UN" naming the voice that carries the figure. This indexer reads any
// number of those tables (sharing one axis and one set of pair columns) and
// produces one column per voice that appears in the pairs.
//
// At each row, for each pair:
//   - cells with no dissonance are ignored;
//   - if every remaining cell is `Other`, both voices of the pair are marked
//     `Other` unless they already hold a figure;
//   - otherwise each real figure goes to its voice, replacing `Other` and
//     appending to any different figure already there.
// Voices that no pair marks stay absent.

use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::align::AlignPolicy;
use crate::error::{IndexError, IndexResult};
use crate::exec::Execution;
use crate::figures::{Classification, Figure};
use crate::indexer::{
    Aligned, Contract, Indexer, IndexerKind, Strategy, apply_rowwise, log_finished, log_started,
    pair_labels,
};
use crate::table::{ColumnLabel, EventTable};

/// What one voice carries at one offset after reconciliation.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum Reconciled {
    /// Distinct figures in the order the classifiers reported them.
    Figures(Vec<Figure>),
    Other,
}

impl Reconciled {
    pub const SEPARATOR: char = ',';

    fn absorb(cell: &mut Option<Reconciled>, figure: Figure) {
        match cell {
            Some(Reconciled::Figures(figures)) => {
                if !figures.contains(&figure) {
                    figures.push(figure);
                }
            }
            _ => *cell = Some(Reconciled::Figures(vec![figure])),
        }
    }
}

impl fmt::Display for Reconciled {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Reconciled::Other => f.write_str(Classification::OTHER_LABEL),
            Reconciled::Figures(figures) => {
                for (i, figure) in figures.iter().enumerate() {
                    if i > 0 {
                        write!(f, "{}", Reconciled::SEPARATOR)?;
                    }
                    f.write_str(figure.code())?;
                }
                Ok(())
            }
        }
    }
}

impl FromStr for Reconciled {
    type Err = IndexError;

    fn from_str(text: &str) -> IndexResult<Self> {
        if text == Classification::OTHER_LABEL {
            return Ok(Reconciled::Other);
        }
        text.split(Reconciled::SEPARATOR)
            .map(|code| {
                Figure::from_code(code).ok_or_else(|| {
                    IndexError::shape("reconciliation", format!("unknown figure code '{code}'"))
                })
            })
            .collect::<IndexResult<Vec<_>>>()
            .map(Reconciled::Figures)
    }
}

impl TryFrom<String> for Reconciled {
    type Error = IndexError;

    fn try_from(text: String) -> IndexResult<Self> {
        text.parse()
    }
}

impl From<Reconciled> for String {
    fn from(reconciled: Reconciled) -> String {
        reconciled.to_string()
    }
}

pub struct ReconciliationIndexer<'a> {
    classified: Vec<&'a EventTable<Classification>>,
    pairs: Vec<(usize, usize)>,
    voices: Vec<usize>,
}

impl<'a> ReconciliationIndexer<'a> {
    pub fn new(classified: Vec<&'a EventTable<Classification>>) -> IndexResult<Self> {
        let kind = Self::KIND;
        let Some(first) = classified.first() else {
            return Err(IndexError::shape(kind.name(), "no classifier tables to reconcile"));
        };
        let axes: Vec<&dyn Aligned> = classified.iter().map(|t| *t as &dyn Aligned).collect();
        Self::CONTRACT.check_inputs(kind, &axes)?;
        if let Some(position) = classified.iter().position(|t| t.labels() != first.labels()) {
            return Err(IndexError::shape(
                kind.name(),
                format!("input {position} has different pair columns than input 0"),
            ));
        }
        let pairs = pair_labels(kind, first.labels())?;
        let voices: BTreeSet<usize> = pairs
            .iter()
            .flat_map(|&(upper, lower)| [upper, lower])
            .collect();
        Ok(ReconciliationIndexer {
            classified,
            pairs,
            voices: voices.into_iter().collect(),
        })
    }

    fn reconcile_row(&self, row: usize) -> Vec<Option<Reconciled>> {
        let mut cells: Vec<Option<Reconciled>> = vec![None; self.voices.len()];
        let column_of = |voice: usize| self.voices.binary_search(&voice).ok();
        for (c, &(upper, lower)) in self.pairs.iter().enumerate() {
            let found: Vec<Classification> = self
                .classified
                .iter()
                .filter_map(|table| table.get(row, c))
                .filter(|classification| classification.is_dissonant())
                .copied()
                .collect();
            if found.is_empty() {
                continue;
            }
            if found.iter().all(|classification| *classification == Classification::Other) {
                for voice in [upper, lower] {
                    if let Some(cell) = column_of(voice).map(|i| &mut cells[i]) {
                        cell.get_or_insert(Reconciled::Other);
                    }
                }
                continue;
            }
            for classification in found {
                let Classification::Figure { voice, figure } = classification else {
                    continue;
                };
                if let Some(i) = column_of(voice) {
                    Reconciled::absorb(&mut cells[i], figure);
                }
            }
        }
        cells
    }
}

impl Indexer for ReconciliationIndexer<'_> {
    type Value = Reconciled;
    const KIND: IndexerKind = IndexerKind::Reconciliation;
    const CONTRACT: Contract = Contract::new(Strategy::Rowwise, AlignPolicy::Strict);

    fn run(&self, exec: &Execution) -> IndexResult<EventTable<Reconciled>> {
        log_started(Self::KIND, &Self::CONTRACT);
        let labels = self.voices.iter().map(|&voice| ColumnLabel::Part(voice)).collect();
        let table = apply_rowwise(Self::KIND, self.classified[0], labels, exec, |row| {
            self.reconcile_row(row.index)
        })?;
        log_finished(Self::KIND, &Self::CONTRACT, &table);
        Ok(table)
    }
}
