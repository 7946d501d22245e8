// Active-voices indexer: how many parts are sounding at each offset.
//
// By default a part counts as active at every offset from one of its notes
// until its next event (held notes count). With `attacked` set, only parts
// that start a note at that exact offset count. Rests never count.
//
// Unless `show_all` is set, rows where the count did not change from the
// previous row are dropped, so the output records only the offsets where
// the texture thickens or thins.

use serde::{Deserialize, Serialize};

use crate::align::AlignPolicy;
use crate::error::IndexResult;
use crate::exec::Execution;
use crate::indexer::{
    Contract, Indexer, IndexerKind, Strategy, apply_rowwise, log_finished, log_started,
};
use crate::score::Event;
use crate::table::{ColumnLabel, EventTable};

pub const ACTIVE_VOICES_LABEL: &str = "Active Voices";

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(default)]
pub struct ActiveVoicesSettings {
    pub attacked: bool,
    pub show_all: bool,
}

pub struct ActiveVoicesIndexer<'a> {
    notes: &'a EventTable<Event>,
    settings: ActiveVoicesSettings,
}

impl<'a> ActiveVoicesIndexer<'a> {
    pub fn new(notes: &'a EventTable<Event>, settings: ActiveVoicesSettings) -> Self {
        ActiveVoicesIndexer { notes, settings }
    }
}

impl Indexer for ActiveVoicesIndexer<'_> {
    type Value = usize;
    const KIND: IndexerKind = IndexerKind::ActiveVoices;
    const CONTRACT: Contract = Contract::new(Strategy::Rowwise, AlignPolicy::Strict);

    fn run(&self, exec: &Execution) -> IndexResult<EventTable<usize>> {
        log_started(Self::KIND, &Self::CONTRACT);
        let sustained;
        let source = if self.settings.attacked {
            self.notes
        } else {
            sustained = self.notes.forward_fill();
            &sustained
        };
        let label = ColumnLabel::Named(ACTIVE_VOICES_LABEL.to_string());
        let counts = apply_rowwise(Self::KIND, source, vec![label.clone()], exec, |row| {
            let active = row
                .cells()
                .filter(|cell| cell.is_some_and(|event| !event.is_rest()))
                .count();
            vec![Some(active)]
        })?;

        let table = if self.settings.show_all {
            counts
        } else {
            let mut offsets = Vec::new();
            let mut cells = Vec::new();
            let mut previous = None;
            for (offset, count) in counts.offsets().iter().zip(counts.column(0)) {
                if *count != previous {
                    offsets.push(*offset);
                    cells.push(*count);
                    previous = *count;
                }
            }
            EventTable::from_columns(offsets, vec![label], vec![cells])?
        };
        log_finished(Self::KIND, &Self::CONTRACT, &table);
        Ok(table)
    }
}
