// Cantus Index
//
// Indexing of polyphonic scores into aligned tables of musical features, and
// classification of contrapuntal dissonances (suspensions, neighbour and
// passing notes, nota cambiata) on top of those tables.
//
// Every analysis stage is an indexer: a typed settings record plus a declared
// shape contract, producing a fresh `EventTable` whose columns share one
// offset axis. Stages chain by reading each other's tables; nothing is
// mutated in place.
//
// Architecture:
// - error.rs: Crate-wide error taxonomy (shape, precondition, window length)
// - offset.rs: Totally ordered quarter-note timestamps
// - score.rs: Pitches, events (note, chord, rest), parts and pieces
// - table.rs: EventTable, column labels and the voice-pair catalog
// - align.rs: Union axes and strict/sustain reindexing
// - exec.rs: Serial or execution on shared rayon pools with ordered
//   reassembly
// - indexer.rs: The Indexer contract and the cellwise, columnwise, pairwise,
//   rowwise and windowed application strategies
// - noterest.rs: Parts to a note/rest table
// - interval.rs: Vertical (pairwise) and horizontal (melodic) intervals,
//   and cellwise re-rendering of a fully measured table
// - meter.rs: Meters, beat strength, measure numbers and durations
// - active_voices.rs: Count of sounding voices per offset
// - dissonance.rs: Consonance removal with the consonance-maker search,
//   per row and then across held rows
// - figures.rs: Windowed figure classifiers and the classification labels
// - reconcile.rs: Merge of pair classifications onto voices
// - ngram.rs: Vertical/horizontal interval n-grams
// - cache.rs: Caller-owned result cache keyed by input fingerprints
// - config.rs: JSON analysis settings
// - pipeline.rs: The full dissonance chain
// - midi.rs: Standard MIDI File import
//
// All analysis is deterministic: serial and parallel runs give identical
// tables.

pub mod active_voices;
pub mod align;
pub mod cache;
pub mod config;
pub mod dissonance;
pub mod error;
pub mod exec;
pub mod figures;
pub mod indexer;
pub mod interval;
pub mod meter;
pub mod midi;
pub mod ngram;
pub mod noterest;
pub mod offset;
pub mod pipeline;
pub mod reconcile;
pub mod score;
pub mod table;
