// Note/rest indexer: the base table of every chain.
//
// One column per part, labelled "0", "1", ... in part order. Each event
// (note, chord or rest) sits at its own offset; the axis is the union of all
// part offsets and a part with no event at an offset is absent there.

use crate::align::AlignPolicy;
use crate::error::IndexResult;
use crate::exec::Execution;
use crate::indexer::{Contract, Indexer, IndexerKind, Strategy, log_finished, log_started};
use crate::score::{Event, Part};
use crate::table::{ColumnLabel, EventTable};

pub struct NoteRestIndexer<'a> {
    parts: &'a [Part],
}

impl<'a> NoteRestIndexer<'a> {
    pub fn new(parts: &'a [Part]) -> Self {
        NoteRestIndexer { parts }
    }
}

impl Indexer for NoteRestIndexer<'_> {
    type Value = Event;
    const KIND: IndexerKind = IndexerKind::NoteRest;
    const CONTRACT: Contract = Contract::new(Strategy::Columnwise, AlignPolicy::Strict);

    fn run(&self, _exec: &Execution) -> IndexResult<EventTable<Event>> {
        log_started(Self::KIND, &Self::CONTRACT);
        let labels = (0..self.parts.len()).map(ColumnLabel::Part).collect();
        let series = self
            .parts
            .iter()
            .map(|part| part.events().to_vec())
            .collect();
        let table = EventTable::from_series(labels, series)?;
        log_finished(Self::KIND, &Self::CONTRACT, &table);
        Ok(table)
    }
}
