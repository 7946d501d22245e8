// The dissonance analysis chain, from parts to reconciled figures.
//
// Stages, each an indexer consuming earlier outputs:
//   1. note/rest table from the parts
//   2. vertical intervals measured once in full, then rendered with the
//      configured settings and forward-filled
//   3. horizontal intervals
//   4. beat strength from the piece's meter map
//   5. dissonances, one simultaneity at a time
//   6. consonance makers held in from the neighbouring rows
//   7. suspension, neighbour, passing and cambiata classifiers
//   8. reconciliation onto voices
//
// Optional stages hang off the same tables: active voices and n-grams when
// their settings are present, durations and measure numbers when switched
// on. N-grams get their own rendering of the full vertical table (not
// forward-filled) and their own horizontal table, always attached to the
// later event.
//
// A classifier whose window is longer than the piece is skipped, and every
// row of its table is `NoDissonance`; only the cambiata's four-row window
// can be, since a piece shorter than three offsets already fails the
// consonance-maker stage.
//
// Every intermediate table is returned in `DissonanceAnalysis`. With an
// `IndexCache`, each stage is looked up before it runs. A stage's key is
// built from its indexer kind, the keys of the stages it reads, and its own
// settings, so changing one setting only re-runs the stages downstream of
// it. The execution mode never enters a key; serial and parallel runs give
// identical tables.

use tracing::{debug, info};

use crate::cache::{CacheKey, IndexCache, KeyBuilder};
use crate::config::AnalysisConfig;
use crate::active_voices::ActiveVoicesIndexer;
use crate::dissonance::{ConsonanceMakerIndexer, DissonanceIndexer};
use crate::error::IndexResult;
use crate::exec::Execution;
use crate::figures::{
    CambiataRule, Classification, FigureIndexer, FigureInputs, FigureRule, NeighbourRule,
    PassingRule, SuspensionRule,
};
use crate::indexer::{Indexer, IndexerKind};
use crate::interval::{
    HorizontalIntervalIndexer, HorizontalSettings, IntervalCell, IntervalIndexer,
    IntervalRenderIndexer, IntervalSettings,
};
use crate::meter::{BeatStrengthIndexer, DurationIndexer, MeasureIndexer};
use crate::ngram::NGramIndexer;
use crate::noterest::NoteRestIndexer;
use crate::reconcile::{Reconciled, ReconciliationIndexer};
use crate::score::{Event, Piece};
use crate::table::EventTable;

/// Every table the chain produced.
#[derive(Debug, Clone, PartialEq)]
pub struct DissonanceAnalysis {
    pub notes: EventTable<Event>,
    /// Forward-filled.
    pub vertical: EventTable<IntervalCell>,
    pub horizontal: EventTable<IntervalCell>,
    pub beat_strength: EventTable<f64>,
    /// Dissonances judged one row at a time.
    pub row_dissonances: EventTable<IntervalCell>,
    /// `row_dissonances` after the held consonance makers are applied; what
    /// the classifiers read.
    pub dissonances: EventTable<IntervalCell>,
    pub suspensions: EventTable<Classification>,
    pub neighbours: EventTable<Classification>,
    pub passing: EventTable<Classification>,
    pub cambiata: EventTable<Classification>,
    pub reconciled: EventTable<Reconciled>,
    pub active_voices: Option<EventTable<usize>>,
    pub ngrams: Option<EventTable<String>>,
    pub durations: Option<EventTable<f64>>,
    pub measures: Option<EventTable<u32>>,
}

impl DissonanceAnalysis {
    fn figure_inputs(&self) -> FigureInputs<'_> {
        FigureInputs {
            intervals: &self.vertical,
            dissonances: &self.dissonances,
            horizontal: &self.horizontal,
            beat_strength: &self.beat_strength,
        }
    }
}

pub struct DissonancePipeline {
    config: AnalysisConfig,
}

impl DissonancePipeline {
    pub fn new(config: AnalysisConfig) -> Self {
        DissonancePipeline { config }
    }

    pub fn config(&self) -> &AnalysisConfig {
        &self.config
    }

    pub fn run(&self, piece: &Piece) -> IndexResult<DissonanceAnalysis> {
        self.run_with(piece, None)
    }

    pub fn run_cached(
        &self,
        piece: &Piece,
        cache: &mut IndexCache,
    ) -> IndexResult<DissonanceAnalysis> {
        self.run_with(piece, Some(cache))
    }

    fn run_with(
        &self,
        piece: &Piece,
        mut cache: Option<&mut IndexCache>,
    ) -> IndexResult<DissonanceAnalysis> {
        let config = &self.config;
        let exec = &config.execution;

        let notes_key = KeyBuilder::new(IndexerKind::NoteRest)
            .input(piece.parts.as_slice())
            .finish();
        let notes = stage(&mut cache, notes_key, || NoteRestIndexer::new(&piece.parts).run(exec))?;

        let full_key = derived(IndexerKind::VerticalInterval, &[notes_key])
            .input(&IntervalSettings::full())
            .finish();
        let full = stage(&mut cache, full_key, || {
            IntervalIndexer::new(&notes, IntervalSettings::full()).run(exec)
        })?;

        let vertical_key = derived(IndexerKind::IntervalRender, &[full_key])
            .input(&config.vertical)
            .finish();
        let vertical = stage(&mut cache, vertical_key, || {
            Ok(IntervalRenderIndexer::new(&full, config.vertical).run(exec)?.forward_fill())
        })?;

        let horizontal_key = derived(IndexerKind::HorizontalInterval, &[notes_key])
            .input(&config.horizontal)
            .finish();
        let horizontal = stage(&mut cache, horizontal_key, || {
            HorizontalIntervalIndexer::new(&notes, config.horizontal).run(exec)
        })?;

        let beat_key = derived(IndexerKind::BeatStrength, &[notes_key])
            .input(&piece.meters)
            .finish();
        let beat_strength = stage(&mut cache, beat_key, || {
            BeatStrengthIndexer::new(&notes, &piece.meters).run(exec)
        })?;

        let row_key = derived(IndexerKind::Dissonance, &[vertical_key])
            .input(&config.dissonance)
            .finish();
        let row_dissonances = stage(&mut cache, row_key, || {
            DissonanceIndexer::new(&vertical, config.dissonance)?.run(exec)
        })?;

        let dissonance_key = derived(
            IndexerKind::ConsonanceMaker,
            &[vertical_key, row_key, horizontal_key],
        )
        .input(&config.dissonance)
        .finish();
        let dissonances = stage(&mut cache, dissonance_key, || {
            let settings = config.dissonance;
            ConsonanceMakerIndexer::new(&vertical, &row_dissonances, &horizontal, settings)?
                .run(exec)
        })?;

        let active_voices = match config.active_voices {
            Some(settings) => {
                let key = derived(IndexerKind::ActiveVoices, &[notes_key])
                    .input(&settings)
                    .finish();
                Some(stage(&mut cache, key, || {
                    ActiveVoicesIndexer::new(&notes, settings).run(exec)
                })?)
            }
            None => None,
        };

        let ngrams = match &config.ngram {
            Some(settings) => {
                let rendered_key = derived(IndexerKind::IntervalRender, &[full_key])
                    .input(&config.ngram_intervals)
                    .finish();
                let rendered = stage(&mut cache, rendered_key, || {
                    IntervalRenderIndexer::new(&full, config.ngram_intervals).run(exec)
                })?;
                let motion = HorizontalSettings {
                    interval: config.ngram_intervals,
                    attach_later: true,
                };
                let motion_key = derived(IndexerKind::HorizontalInterval, &[notes_key])
                    .input(&motion)
                    .finish();
                let motions = stage(&mut cache, motion_key, || {
                    HorizontalIntervalIndexer::new(&notes, motion).run(exec)
                })?;
                let key = derived(IndexerKind::NGram, &[rendered_key, motion_key])
                    .input(settings)
                    .finish();
                Some(stage(&mut cache, key, || {
                    NGramIndexer::new(&rendered, &motions, settings.clone())?.run(exec)
                })?)
            }
            None => None,
        };

        let durations = if config.durations {
            let ends = piece.ends();
            let key = derived(IndexerKind::Duration, &[notes_key])
                .input(ends.as_slice())
                .finish();
            Some(stage(&mut cache, key, || DurationIndexer::new(&notes, ends)?.run(exec))?)
        } else {
            None
        };

        let measures = if config.measures {
            let key = derived(IndexerKind::Measure, &[notes_key])
                .input(&piece.meters)
                .finish();
            Some(stage(&mut cache, key, || {
                MeasureIndexer::new(&notes, &piece.meters).run(exec)
            })?)
        } else {
            None
        };

        let mut analysis = DissonanceAnalysis {
            notes,
            vertical,
            horizontal,
            beat_strength,
            row_dissonances,
            dissonances,
            suspensions: EventTable::empty(Vec::new()),
            neighbours: EventTable::empty(Vec::new()),
            passing: EventTable::empty(Vec::new()),
            cambiata: EventTable::empty(Vec::new()),
            reconciled: EventTable::empty(Vec::new()),
            active_voices,
            ngrams,
            durations,
            measures,
        };
        let figure_parents = [vertical_key, dissonance_key, horizontal_key, beat_key];

        let (suspensions, suspension_key) =
            figure_stage::<SuspensionRule>(&mut cache, &analysis, &figure_parents, exec)?;
        let (neighbours, neighbour_key) =
            figure_stage::<NeighbourRule>(&mut cache, &analysis, &figure_parents, exec)?;
        let (passing, passing_key) =
            figure_stage::<PassingRule>(&mut cache, &analysis, &figure_parents, exec)?;
        let (cambiata, cambiata_key) =
            figure_stage::<CambiataRule>(&mut cache, &analysis, &figure_parents, exec)?;

        let reconcile_key = derived(
            IndexerKind::Reconciliation,
            &[suspension_key, neighbour_key, passing_key, cambiata_key],
        )
        .finish();
        let reconciled = stage(&mut cache, reconcile_key, || {
            let classified = vec![&suspensions, &neighbours, &passing, &cambiata];
            ReconciliationIndexer::new(classified)?.run(exec)
        })?;

        analysis.suspensions = suspensions;
        analysis.neighbours = neighbours;
        analysis.passing = passing;
        analysis.cambiata = cambiata;
        analysis.reconciled = reconciled;
        info!(
            parts = piece.parts.len(),
            offsets = analysis.notes.len(),
            "dissonance analysis finished"
        );
        Ok(analysis)
    }
}

/// Key builder seeded with the keys of the stages a stage reads.
fn derived(kind: IndexerKind, parents: &[CacheKey]) -> KeyBuilder {
    parents
        .iter()
        .fold(KeyBuilder::new(kind), |builder, parent| builder.input(&parent.fingerprint))
}

fn stage<T, F>(
    cache: &mut Option<&mut IndexCache>,
    key: CacheKey,
    run: F,
) -> IndexResult<EventTable<T>>
where
    T: Clone + Send + Sync + 'static,
    F: FnOnce() -> IndexResult<EventTable<T>>,
{
    match cache {
        Some(cache) => cache.get_or_run(key, run),
        None => run(),
    }
}

/// Run one figure classifier over the analysis so far, or fill its table
/// with `NoDissonance` when the piece is shorter than its window.
fn figure_stage<R: FigureRule>(
    cache: &mut Option<&mut IndexCache>,
    analysis: &DissonanceAnalysis,
    parents: &[CacheKey],
    exec: &Execution,
) -> IndexResult<(EventTable<Classification>, CacheKey)> {
    let key = derived(R::KIND, parents).finish();
    let rows = analysis.vertical.len();
    let table = stage(cache, key, || {
        if rows > 0 && rows < R::WINDOW.size {
            debug!(indexer = R::KIND.name(), rows, "piece shorter than window, skipped");
            let labels = analysis.vertical.labels().to_vec();
            let columns = labels
                .iter()
                .map(|_| vec![Some(Classification::NoDissonance); rows])
                .collect();
            return EventTable::from_columns(analysis.vertical.offsets().to_vec(), labels, columns);
        }
        FigureIndexer::<R>::new(analysis.figure_inputs())?.run(exec)
    })?;
    Ok((table, key))
}
