// The indexer contract and the generic application strategies.
//
// An indexer is constructed from one or more EventTables plus settings,
// validates them eagerly (so a bad chain fails before any work is done), and
// `run()` produces a new EventTable. Indexers never mutate their inputs and
// never depend on the output of their own earlier runs.
//
// Each indexer declares a `Contract`: how it walks its input (`Strategy`),
// which alignment policy it requires of that input, and the minimum number
// of rows it needs. The strategies below are the only code that iterates
// over tables; concrete indexers supply a per-cell, per-column, per-pair,
// per-row or per-window function and leave job splitting, parallelism and
// reassembly to these helpers.
//
// Windowed application always evaluates at a focus row (row 1 of the window
// for every classifier in this crate). Rows that cannot be the focus of a
// full window (the first `focus` rows and the last `size - 1 - focus`) are
// filled with a caller-supplied boundary value instead of being evaluated.

use std::fmt;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::align::{self, AlignPolicy};
use crate::error::{IndexError, IndexResult};
use crate::exec::Execution;
use crate::offset::Offset;
use crate::table::{ColumnLabel, EventTable, part_combinations};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IndexerKind {
    NoteRest,
    VerticalInterval,
    HorizontalInterval,
    IntervalRender,
    BeatStrength,
    Duration,
    Measure,
    ActiveVoices,
    Dissonance,
    ConsonanceMaker,
    Suspension,
    NeighbourNote,
    PassingNote,
    NotaCambiata,
    Reconciliation,
    NGram,
}

impl IndexerKind {
    pub fn name(self) -> &'static str {
        match self {
            IndexerKind::NoteRest => "noterest",
            IndexerKind::VerticalInterval => "vertical_interval",
            IndexerKind::HorizontalInterval => "horizontal_interval",
            IndexerKind::IntervalRender => "interval_render",
            IndexerKind::BeatStrength => "beat_strength",
            IndexerKind::Duration => "duration",
            IndexerKind::Measure => "measure",
            IndexerKind::ActiveVoices => "active_voices",
            IndexerKind::Dissonance => "dissonance",
            IndexerKind::ConsonanceMaker => "consonance_maker",
            IndexerKind::Suspension => "suspension",
            IndexerKind::NeighbourNote => "neighbour_note",
            IndexerKind::PassingNote => "passing_note",
            IndexerKind::NotaCambiata => "nota_cambiata",
            IndexerKind::Reconciliation => "reconciliation",
            IndexerKind::NGram => "ngram",
        }
    }
}

impl fmt::Display for IndexerKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Window geometry: `size` consecutive rows, evaluated at `focus`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct WindowSpec {
    pub size: usize,
    pub focus: usize,
}

impl WindowSpec {
    pub const TRIPLE: WindowSpec = WindowSpec { size: 3, focus: 1 };
    pub const QUADRUPLE: WindowSpec = WindowSpec { size: 4, focus: 1 };

    /// Boundary rows at the start of the table.
    pub fn leading(self) -> usize {
        self.focus
    }

    /// Boundary rows at the end of the table.
    pub fn trailing(self) -> usize {
        self.size - 1 - self.focus
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Strategy {
    Cellwise,
    Columnwise,
    Pairwise,
    Rowwise,
    Windowed(WindowSpec),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Contract {
    pub strategy: Strategy,
    /// What the input must look like: `Sustain` means the indexer needs a
    /// forward-filled input, `Strict` accepts tables as built.
    pub input_policy: AlignPolicy,
}

impl Contract {
    pub const fn new(strategy: Strategy, input_policy: AlignPolicy) -> Self {
        Contract {
            strategy,
            input_policy,
        }
    }

    pub fn min_rows(&self) -> usize {
        match self.strategy {
            Strategy::Windowed(spec) => spec.size,
            _ => 0,
        }
    }

    /// Validate an indexer's input tables against this contract and return
    /// their row count. Every table must share the first one's axis. Under
    /// `Sustain` the first table, the one the indexer reads as "what is
    /// sounding", must also be forward-filled. Windowed contracts need at
    /// least one full window. Single-input strict indexers satisfy this by
    /// construction and do not call it.
    pub fn check_inputs(&self, kind: IndexerKind, tables: &[&dyn Aligned]) -> IndexResult<usize> {
        let rows = check_shared_axis(kind, tables)?;
        let unfilled = tables.first().is_some_and(|table| !table.is_forward_filled());
        if self.input_policy == AlignPolicy::Sustain && unfilled {
            return Err(IndexError::precondition(
                kind.name(),
                "sustained input must be forward-filled",
            ));
        }
        self.check_rows(kind, rows)?;
        Ok(rows)
    }

    /// An empty table is always acceptable; otherwise a windowed indexer
    /// needs at least one full window.
    pub fn check_rows(&self, kind: IndexerKind, rows: usize) -> IndexResult<()> {
        let window = self.min_rows();
        if rows > 0 && rows < window {
            return Err(IndexError::WindowTooShort {
                indexer: kind.name(),
                window,
                offsets: rows,
            });
        }
        Ok(())
    }
}

pub trait Indexer {
    type Value;
    const KIND: IndexerKind;
    const CONTRACT: Contract;

    fn run(&self, exec: &Execution) -> IndexResult<EventTable<Self::Value>>;
}

pub(crate) fn log_started(kind: IndexerKind, contract: &Contract) {
    debug!(indexer = kind.name(), strategy = ?contract.strategy, "indexer started");
}

/// Log a finished run in a uniform shape.
pub(crate) fn log_finished<T>(kind: IndexerKind, contract: &Contract, table: &EventTable<T>) {
    debug!(
        indexer = kind.name(),
        strategy = ?contract.strategy,
        rows = table.len(),
        columns = table.width(),
        "indexer finished"
    );
}

/// Anything with an offset axis. Lets indexers compare axes of tables with
/// different cell types.
pub trait Aligned {
    fn axis(&self) -> &[Offset];
    fn is_forward_filled(&self) -> bool;
}

impl<T> Aligned for EventTable<T> {
    fn axis(&self) -> &[Offset] {
        self.offsets()
    }

    fn is_forward_filled(&self) -> bool {
        EventTable::is_forward_filled(self)
    }
}

/// Check that every table has the same axis as the first; returns the row
/// count.
pub fn check_shared_axis(kind: IndexerKind, tables: &[&dyn Aligned]) -> IndexResult<usize> {
    let Some(first) = tables.first() else {
        return Ok(0);
    };
    for (position, table) in tables.iter().enumerate().skip(1) {
        if table.axis() != first.axis() {
            return Err(IndexError::shape(
                kind.name(),
                format!(
                    "input {position} has {} offsets on a different axis than input 0 ({})",
                    table.axis().len(),
                    first.axis().len()
                ),
            ));
        }
    }
    Ok(first.axis().len())
}

/// Parse every label as a voice pair.
pub fn pair_labels(kind: IndexerKind, labels: &[ColumnLabel]) -> IndexResult<Vec<(usize, usize)>> {
    labels
        .iter()
        .map(|label| {
            label.pair().ok_or_else(|| {
                IndexError::shape(kind.name(), format!("column '{label}' is not a voice pair"))
            })
        })
        .collect()
}

// ── Strategies ──────────────────────────────────────────────────────────

/// Apply `f` to every cell independently. `f` sees absent cells too and may
/// turn them into values or values into absent.
pub fn apply_cellwise<T, U, F>(
    table: &EventTable<T>,
    exec: &Execution,
    f: F,
) -> IndexResult<EventTable<U>>
where
    T: Sync,
    U: Send,
    F: Fn(Option<&T>) -> Option<U> + Sync + Send,
{
    let columns: Vec<Vec<Option<U>>> = exec.map_ordered((0..table.width()).collect(), |c| {
        table.column(c).iter().map(|cell| f(cell.as_ref())).collect()
    })?;
    EventTable::from_columns(table.offsets().to_vec(), table.labels().to_vec(), columns)
}

/// Read-only view of one column for column-at-a-time indexers.
pub struct ColumnView<'a, T> {
    pub index: usize,
    pub label: &'a ColumnLabel,
    pub offsets: &'a [Offset],
    pub cells: &'a [Option<T>],
}

impl<T> ColumnView<'_, T> {
    /// Row positions holding a value.
    pub fn present_rows(&self) -> impl Iterator<Item = usize> + '_ {
        self.cells
            .iter()
            .enumerate()
            .filter_map(|(row, cell)| cell.as_ref().map(|_| row))
    }
}

/// Apply `f` to each column. `f` must return one cell per row.
pub fn apply_columnwise<T, U, F>(
    kind: IndexerKind,
    table: &EventTable<T>,
    exec: &Execution,
    f: F,
) -> IndexResult<EventTable<U>>
where
    T: Sync,
    U: Send,
    F: Fn(&ColumnView<'_, T>) -> IndexResult<Vec<Option<U>>> + Sync + Send,
{
    let columns = exec.try_map_ordered((0..table.width()).collect(), |c| {
        let view = ColumnView {
            index: c,
            label: &table.labels()[c],
            offsets: table.offsets(),
            cells: table.column(c),
        };
        let cells = f(&view)?;
        if cells.len() != table.len() {
            return Err(IndexError::shape(
                kind.name(),
                format!(
                    "column '{}' produced {} cells for {} rows",
                    view.label,
                    cells.len(),
                    table.len()
                ),
            ));
        }
        Ok(cells)
    })?;
    EventTable::from_columns(table.offsets().to_vec(), table.labels().to_vec(), columns)
}

/// Apply `f` to every voice pair (i, j), i < j, in part-combination order.
///
/// For each pair, both voices are sustained over the union of the pair's own
/// offsets, so a voice holding a note is compared against every new note of
/// the other voice. `f` receives (upper, lower) and is only called where both
/// voices have sounded. Results are placed on the input table's axis; rows
/// where neither voice of the pair moves are absent.
pub fn apply_pairwise<T, U, F>(
    table: &EventTable<T>,
    exec: &Execution,
    f: F,
) -> IndexResult<EventTable<U>>
where
    T: Clone + Sync,
    U: Send,
    F: Fn(&T, &T) -> Option<U> + Sync + Send,
{
    let pairs = part_combinations(table.width());
    let labels = pairs
        .iter()
        .map(|&(upper, lower)| ColumnLabel::Pair(upper, lower))
        .collect();
    let axis = table.offsets();
    let columns = exec.map_ordered(pairs, |(upper, lower)| {
        let upper_series: Vec<(Offset, T)> =
            table.series(upper).map(|(o, v)| (o, v.clone())).collect();
        let lower_series: Vec<(Offset, T)> =
            table.series(lower).map(|(o, v)| (o, v.clone())).collect();
        let pair_axis = align::union_axis([
            upper_series.iter().map(|(o, _)| *o).collect::<Vec<_>>(),
            lower_series.iter().map(|(o, _)| *o).collect::<Vec<_>>(),
        ]);
        let uppers = align::reindex(&upper_series, &pair_axis, AlignPolicy::Sustain);
        let lowers = align::reindex(&lower_series, &pair_axis, AlignPolicy::Sustain);
        let pair_values: Vec<(Offset, U)> = pair_axis
            .iter()
            .zip(uppers.iter().zip(&lowers))
            .filter_map(|(&offset, cells)| match cells {
                (Some(u), Some(l)) => f(u, l).map(|value| (offset, value)),
                _ => None,
            })
            .collect();
        align::place(pair_values, axis)
    })?;
    EventTable::from_columns(axis.to_vec(), labels, columns)
}

/// Read-only view of one row across all columns.
pub struct RowView<'a, T> {
    pub index: usize,
    pub offset: Offset,
    table: &'a EventTable<T>,
}

impl<'a, T> RowView<'a, T> {
    pub fn get(&self, column: usize) -> Option<&'a T> {
        self.table.get(self.index, column)
    }

    pub fn width(&self) -> usize {
        self.table.width()
    }

    pub fn cells(&self) -> impl Iterator<Item = Option<&'a T>> + '_ {
        (0..self.table.width()).map(move |c| self.table.get(self.index, c))
    }
}

/// Apply `f` to every row; `f` returns one cell per output label.
pub fn apply_rowwise<T, U, F>(
    kind: IndexerKind,
    table: &EventTable<T>,
    labels: Vec<ColumnLabel>,
    exec: &Execution,
    f: F,
) -> IndexResult<EventTable<U>>
where
    T: Sync,
    U: Send,
    F: Fn(&RowView<'_, T>) -> Vec<Option<U>> + Sync + Send,
{
    let width = labels.len();
    let rows = exec.map_ordered((0..table.len()).collect(), |index| {
        f(&RowView {
            index,
            offset: table.offsets()[index],
            table,
        })
    })?;
    transpose(kind, table.offsets().to_vec(), labels, rows, width)
}

/// Consecutive rows `start .. start + spec.size` of a shared axis.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Window {
    pub start: usize,
    pub spec: WindowSpec,
}

impl Window {
    /// Table row of window row `k`.
    pub fn row(&self, k: usize) -> usize {
        self.start + k
    }

    pub fn focus_row(&self) -> usize {
        self.start + self.spec.focus
    }
}

/// Slide a window over `axis` and evaluate `f` at every full window. `f`
/// returns one value per output label; boundary rows get `boundary` in every
/// column. An empty axis gives an empty table.
pub fn apply_windowed<U, F>(
    kind: IndexerKind,
    axis: &[Offset],
    labels: Vec<ColumnLabel>,
    spec: WindowSpec,
    boundary: U,
    exec: &Execution,
    f: F,
) -> IndexResult<EventTable<U>>
where
    U: Clone + Send,
    F: Fn(&Window) -> Vec<U> + Sync + Send,
{
    let width = labels.len();
    apply_windowed_cells(
        kind,
        axis,
        labels,
        spec,
        |_| vec![Some(boundary.clone()); width],
        exec,
        |window| f(window).into_iter().map(Some).collect(),
    )
}

/// `apply_windowed` for indexers whose cells may be absent and whose
/// boundary rows depend on the row: `edge(row)` fills each row without a
/// full window.
pub fn apply_windowed_cells<U, E, F>(
    kind: IndexerKind,
    axis: &[Offset],
    labels: Vec<ColumnLabel>,
    spec: WindowSpec,
    edge: E,
    exec: &Execution,
    f: F,
) -> IndexResult<EventTable<U>>
where
    U: Send,
    E: Fn(usize) -> Vec<Option<U>>,
    F: Fn(&Window) -> Vec<Option<U>> + Sync + Send,
{
    let rows = axis.len();
    let width = labels.len();
    if rows == 0 {
        return Ok(EventTable::empty(labels));
    }
    if rows < spec.size {
        return Err(IndexError::WindowTooShort {
            indexer: kind.name(),
            window: spec.size,
            offsets: rows,
        });
    }
    let starts: Vec<usize> = (0..=rows - spec.size).collect();
    let evaluated = exec.map_ordered(starts, |start| f(&Window { start, spec }))?;
    let row_cells: Vec<Vec<Option<U>>> = (0..spec.leading())
        .map(&edge)
        .chain(evaluated)
        .chain((rows - spec.trailing()..rows).map(&edge))
        .collect();
    transpose(kind, axis.to_vec(), labels, row_cells, width)
}

fn transpose<U>(
    kind: IndexerKind,
    offsets: Vec<Offset>,
    labels: Vec<ColumnLabel>,
    rows: Vec<Vec<Option<U>>>,
    width: usize,
) -> IndexResult<EventTable<U>> {
    let mut columns: Vec<Vec<Option<U>>> = (0..width)
        .map(|_| Vec::with_capacity(rows.len()))
        .collect();
    for (index, row) in rows.into_iter().enumerate() {
        if row.len() != width {
            return Err(IndexError::shape(
                kind.name(),
                format!("row {index} has {} cells for {width} columns", row.len()),
            ));
        }
        for (column, cell) in columns.iter_mut().zip(row) {
            column.push(cell);
        }
    }
    EventTable::from_columns(offsets, labels, columns)
}
