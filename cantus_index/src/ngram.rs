// Interval n-grams for each voice pair.
//
// An n-gram is n consecutive vertical intervals of one pair, joined by the
// lower voice's melodic motion between them: with n = 2 the pair C4/E4 moving
// to B3/G4 gives "M3 -2 m6" (with quality on the vertical table). Where the
// lower voice holds its note across a change in the upper voice, the motion
// is the `continuer` token. N-grams touching a Rest are skipped. Each n-gram
// is written at the offset of its first vertical interval.
//
// Inputs are the vertical interval table as produced (not forward-filled, so
// its present rows are the pair's events) and the horizontal interval table
// attached to the later event, sharing one axis.

use serde::{Deserialize, Serialize};

use crate::align::AlignPolicy;
use crate::error::{IndexError, IndexResult};
use crate::exec::Execution;
use crate::indexer::{
    Aligned, Contract, Indexer, IndexerKind, Strategy, apply_columnwise, log_finished, log_started,
    pair_labels,
};
use crate::interval::IntervalCell;
use crate::table::EventTable;

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(default)]
pub struct NGramSettings {
    pub n: usize,
    pub continuer: String,
    /// Bracket vertical tokens and parenthesize horizontal ones, so that
    /// "[M3] (-2) [M6]" can be told apart when tokens are counted singly.
    pub mark_singles: bool,
}

impl Default for NGramSettings {
    fn default() -> Self {
        NGramSettings {
            n: 2,
            continuer: "_".to_string(),
            mark_singles: false,
        }
    }
}

impl NGramSettings {
    fn vertical_token(&self, token: String) -> String {
        if self.mark_singles { format!("[{token}]") } else { token }
    }

    fn horizontal_token(&self, token: String) -> String {
        if self.mark_singles { format!("({token})") } else { token }
    }
}

pub struct NGramIndexer<'a> {
    vertical: &'a EventTable<IntervalCell>,
    horizontal: &'a EventTable<IntervalCell>,
    pairs: Vec<(usize, usize)>,
    settings: NGramSettings,
}

impl<'a> NGramIndexer<'a> {
    /// `horizontal` must attach each motion to the later event: the motion
    /// read between two vertical intervals is the lower voice's cell at the
    /// second one. A table attached to the earlier event gives wrong
    /// motions without failing, so callers build it with
    /// `horiz_attach_later` set whatever the rest of their configuration
    /// says.
    pub fn new(
        vertical: &'a EventTable<IntervalCell>,
        horizontal: &'a EventTable<IntervalCell>,
        settings: NGramSettings,
    ) -> IndexResult<Self> {
        let kind = Self::KIND;
        if settings.n == 0 {
            return Err(IndexError::shape(kind.name(), "n-grams need n of at least 1"));
        }
        Self::CONTRACT.check_inputs(kind, &[vertical as &dyn Aligned, horizontal])?;
        let pairs = pair_labels(kind, vertical.labels())?;
        let beyond = pairs.iter().find(|&&(_, lower)| lower >= horizontal.width());
        if let Some(&(upper, lower)) = beyond {
            return Err(IndexError::shape(
                kind.name(),
                format!(
                    "pair {upper},{lower} has no horizontal column ({} voices)",
                    horizontal.width()
                ),
            ));
        }
        Ok(NGramIndexer {
            vertical,
            horizontal,
            pairs,
            settings,
        })
    }

    /// The n-gram over `rows` of one pair column, or `None` if it touches a
    /// rest.
    fn gram(&self, rows: &[usize], cells: &[Option<IntervalCell>], lower: usize) -> Option<String> {
        let mut tokens = Vec::with_capacity(2 * rows.len());
        for (i, &row) in rows.iter().enumerate() {
            if i > 0 {
                let motion = match self.horizontal.get(row, lower) {
                    Some(IntervalCell::Rest) => return None,
                    Some(cell) => cell.to_string(),
                    None => self.settings.continuer.clone(),
                };
                tokens.push(self.settings.horizontal_token(motion));
            }
            let vertical = cells[row].as_ref()?;
            if vertical.is_rest() {
                return None;
            }
            tokens.push(self.settings.vertical_token(vertical.to_string()));
        }
        Some(tokens.join(" "))
    }
}

impl Indexer for NGramIndexer<'_> {
    type Value = String;
    const KIND: IndexerKind = IndexerKind::NGram;
    const CONTRACT: Contract = Contract::new(Strategy::Columnwise, AlignPolicy::Strict);

    fn run(&self, exec: &Execution) -> IndexResult<EventTable<String>> {
        log_started(Self::KIND, &Self::CONTRACT);
        let n = self.settings.n;
        let table = apply_columnwise(Self::KIND, self.vertical, exec, |column| {
            let (_, lower) = self.pairs[column.index];
            let rows: Vec<usize> = column.present_rows().collect();
            let mut cells = vec![None; column.cells.len()];
            for window in rows.windows(n) {
                cells[window[0]] = self.gram(window, column.cells, lower);
            }
            Ok(cells)
        })?;
        log_finished(Self::KIND, &Self::CONTRACT, &table);
        Ok(table)
    }
}
