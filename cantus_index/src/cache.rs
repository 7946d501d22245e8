// Explicit result cache for indexer chains.
//
// The cache is owned by the caller and passed in wherever reuse is wanted;
// no indexer reads it implicitly. Entries are keyed by the indexer kind plus
// a fingerprint of everything the run depends on (input tables and
// settings), hashed with `FxHasher`. Equal inputs give equal keys within one
// process, so a repeated run returns a clone of the stored table.
//
// Tables of different cell types share one map as `dyn Any`; a lookup whose
// stored type does not match the requested one is treated as a miss and the
// entry is replaced.
//
// Invalidation is explicit: `invalidate(kind)` drops every entry of one
// indexer kind, `clear()` drops everything.

use std::any::Any;
use std::hash::{Hash, Hasher};

use rustc_hash::{FxHashMap, FxHasher};
use tracing::trace;

use crate::active_voices::ActiveVoicesSettings;
use crate::dissonance::DissonanceSettings;
use crate::error::IndexResult;
use crate::figures::Classification;
use crate::indexer::IndexerKind;
use crate::interval::{HorizontalSettings, IntervalCell, IntervalSettings};
use crate::meter::MeterMap;
use crate::ngram::NGramSettings;
use crate::offset::Offset;
use crate::reconcile::Reconciled;
use crate::score::{Event, Part};
use crate::table::{ColumnLabel, EventTable};

/// Anything that can contribute to a cache key.
pub trait Fingerprint {
    fn fingerprint<H: Hasher>(&self, state: &mut H);
}

macro_rules! fingerprint_by_hash {
    ($($ty:ty),* $(,)?) => {
        $(
            impl Fingerprint for $ty {
                fn fingerprint<H: Hasher>(&self, state: &mut H) {
                    self.hash(state);
                }
            }
        )*
    };
}

fingerprint_by_hash!(
    Event,
    IntervalCell,
    Classification,
    Reconciled,
    String,
    usize,
    u64,
    Offset,
    ColumnLabel,
    MeterMap,
    IntervalSettings,
    HorizontalSettings,
    DissonanceSettings,
    ActiveVoicesSettings,
    NGramSettings,
);

impl Fingerprint for f64 {
    fn fingerprint<H: Hasher>(&self, state: &mut H) {
        state.write_u64(self.to_bits());
    }
}

impl<T: Fingerprint> Fingerprint for EventTable<T> {
    fn fingerprint<H: Hasher>(&self, state: &mut H) {
        self.offsets().hash(state);
        self.labels().hash(state);
        for column in 0..self.width() {
            for cell in self.column(column) {
                cell.fingerprint(state);
            }
        }
    }
}

impl Fingerprint for Part {
    fn fingerprint<H: Hasher>(&self, state: &mut H) {
        self.name().hash(state);
        self.events().hash(state);
        self.end().hash(state);
    }
}

impl<T: Fingerprint> Fingerprint for Option<T> {
    fn fingerprint<H: Hasher>(&self, state: &mut H) {
        match self {
            Some(value) => {
                state.write_u8(1);
                value.fingerprint(state);
            }
            None => state.write_u8(0),
        }
    }
}

impl<T: Fingerprint> Fingerprint for [T] {
    fn fingerprint<H: Hasher>(&self, state: &mut H) {
        state.write_usize(self.len());
        for item in self {
            item.fingerprint(state);
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct CacheKey {
    pub kind: IndexerKind,
    pub fingerprint: u64,
}

/// Accumulates the inputs of one indexer run into a `CacheKey`.
pub struct KeyBuilder {
    kind: IndexerKind,
    hasher: FxHasher,
}

impl KeyBuilder {
    pub fn new(kind: IndexerKind) -> Self {
        KeyBuilder {
            kind,
            hasher: FxHasher::default(),
        }
    }

    pub fn input<F: Fingerprint + ?Sized>(mut self, value: &F) -> Self {
        value.fingerprint(&mut self.hasher);
        self
    }

    pub fn finish(self) -> CacheKey {
        CacheKey {
            kind: self.kind,
            fingerprint: self.hasher.finish(),
        }
    }
}

#[derive(Default)]
pub struct IndexCache {
    entries: FxHashMap<CacheKey, Box<dyn Any + Send + Sync>>,
}

impl IndexCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Return the stored table for `key`, or call `run`, store its result and
    /// return it. A failed run stores nothing.
    pub fn get_or_run<T, F>(&mut self, key: CacheKey, run: F) -> IndexResult<EventTable<T>>
    where
        T: Clone + Send + Sync + 'static,
        F: FnOnce() -> IndexResult<EventTable<T>>,
    {
        if let Some(table) = self
            .entries
            .get(&key)
            .and_then(|entry| entry.downcast_ref::<EventTable<T>>())
        {
            trace!(indexer = key.kind.name(), fingerprint = key.fingerprint, "cache hit");
            return Ok(table.clone());
        }
        trace!(indexer = key.kind.name(), fingerprint = key.fingerprint, "cache miss");
        let table = run()?;
        self.entries.insert(key, Box::new(table.clone()));
        Ok(table)
    }

    pub fn contains(&self, key: &CacheKey) -> bool {
        self.entries.contains_key(key)
    }

    /// Drop every entry produced by `kind`; returns how many were dropped.
    pub fn invalidate(&mut self, kind: IndexerKind) -> usize {
        let before = self.entries.len();
        self.entries.retain(|key, _| key.kind != kind);
        before - self.entries.len()
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
