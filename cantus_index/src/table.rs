// EventTable: the offset-indexed, column-labelled table every indexer
// consumes and produces.
//
// Layout is column-major: `columns[c][r]` is the cell of column `c` at
// `offsets[r]`. A cell is `Option<T>`, where `None` means "nothing happens
// in this column at this offset" (absent). Absent is distinct from any
// domain value; in particular a rest is a real `Event::Rest`, never `None`.
//
// The offset axis is strictly increasing and shared by every column. Labels
// are unique. Tables are immutable once built: indexers read one table and
// build another, and the only "modifications" (`forward_fill`, `reindex`)
// return new tables.
//
// Column labels follow the part-combination convention: a single voice is
// `Part(i)` and renders as "i"; a voice pair is `Pair(i, j)` with i < j and
// renders as "i,j". The lower voice of a pair is always derivable from the
// label alone.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::align::{self, AlignPolicy};
use crate::error::{IndexError, IndexResult};
use crate::offset::Offset;

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum ColumnLabel {
    Part(usize),
    /// Upper voice index, lower voice index.
    Pair(usize, usize),
    Named(String),
}

impl ColumnLabel {
    pub const PAIR_SEPARATOR: char = ',';

    pub fn parse(text: &str) -> ColumnLabel {
        if let Some((upper, lower)) = text.split_once(Self::PAIR_SEPARATOR) {
            if let (Ok(upper), Ok(lower)) = (upper.trim().parse(), lower.trim().parse()) {
                return ColumnLabel::Pair(upper, lower);
            }
        } else if let Ok(part) = text.trim().parse() {
            return ColumnLabel::Part(part);
        }
        ColumnLabel::Named(text.to_string())
    }

    pub fn pair(&self) -> Option<(usize, usize)> {
        match *self {
            ColumnLabel::Pair(upper, lower) => Some((upper, lower)),
            _ => None,
        }
    }

    /// The lower voice of a pair label. This is the voice whose melodic
    /// motion describes the pair in n-grams and whose bass role matters for
    /// consonance-maker searches.
    pub fn lower_voice(&self) -> Option<usize> {
        self.pair().map(|(_, lower)| lower)
    }

    pub fn upper_voice(&self) -> Option<usize> {
        self.pair().map(|(upper, _)| upper)
    }
}

impl fmt::Display for ColumnLabel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ColumnLabel::Part(i) => write!(f, "{i}"),
            ColumnLabel::Pair(i, j) => write!(f, "{i}{}{j}", ColumnLabel::PAIR_SEPARATOR),
            ColumnLabel::Named(name) => f.write_str(name),
        }
    }
}

impl From<String> for ColumnLabel {
    fn from(text: String) -> Self {
        ColumnLabel::parse(&text)
    }
}

impl From<ColumnLabel> for String {
    fn from(label: ColumnLabel) -> String {
        label.to_string()
    }
}

/// Every unordered pair of `voices` voices, outer index ascending, then
/// inner index ascending: (0,1), (0,2), ..., (1,2), ...
pub fn part_combinations(voices: usize) -> Vec<(usize, usize)> {
    (0..voices)
        .flat_map(|upper| ((upper + 1)..voices).map(move |lower| (upper, lower)))
        .collect()
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EventTable<T> {
    offsets: Vec<Offset>,
    labels: Vec<ColumnLabel>,
    columns: Vec<Vec<Option<T>>>,
}

impl<T> EventTable<T> {
    /// A table with the given columns and no rows.
    pub fn empty(labels: Vec<ColumnLabel>) -> Self {
        let columns = labels.iter().map(|_| Vec::new()).collect();
        EventTable {
            offsets: Vec::new(),
            labels,
            columns,
        }
    }

    /// Assemble a table from finished columns, checking every structural
    /// invariant.
    pub fn from_columns(
        offsets: Vec<Offset>,
        labels: Vec<ColumnLabel>,
        columns: Vec<Vec<Option<T>>>,
    ) -> IndexResult<Self> {
        if labels.len() != columns.len() {
            return Err(IndexError::shape(
                "event_table",
                format!("{} labels for {} columns", labels.len(), columns.len()),
            ));
        }
        if let Some(pair) = offsets.windows(2).find(|pair| pair[1] <= pair[0]) {
            return Err(IndexError::shape(
                "event_table",
                format!("offset axis not increasing at {} -> {}", pair[0], pair[1]),
            ));
        }
        for (label, column) in labels.iter().zip(&columns) {
            if column.len() != offsets.len() {
                return Err(IndexError::shape(
                    "event_table",
                    format!(
                        "column '{label}' has {} cells for {} offsets",
                        column.len(),
                        offsets.len()
                    ),
                ));
            }
        }
        for (i, label) in labels.iter().enumerate() {
            if labels[..i].contains(label) {
                return Err(IndexError::shape(
                    "event_table",
                    format!("duplicate column label '{label}'"),
                ));
            }
        }
        Ok(EventTable {
            offsets,
            labels,
            columns,
        })
    }

    /// Build a table from one sparse series per label. The axis is the
    /// union of all series offsets and cells are placed strictly.
    pub fn from_series(
        labels: Vec<ColumnLabel>,
        series: Vec<Vec<(Offset, T)>>,
    ) -> IndexResult<Self> {
        for (label, events) in labels.iter().zip(&series) {
            if let Some(pair) = events.windows(2).find(|pair| pair[1].0 <= pair[0].0) {
                return Err(IndexError::UnorderedOffsets {
                    part: label.to_string(),
                    offset: pair[1].0.quarters(),
                    previous: pair[0].0.quarters(),
                });
            }
        }
        let axis = align::union_axis(
            series
                .iter()
                .map(|events| events.iter().map(|(offset, _)| *offset)),
        );
        let columns = series
            .into_iter()
            .map(|events| align::place(events, &axis))
            .collect();
        EventTable::from_columns(axis, labels, columns)
    }

    pub fn offsets(&self) -> &[Offset] {
        &self.offsets
    }

    pub fn labels(&self) -> &[ColumnLabel] {
        &self.labels
    }

    /// Number of rows (offsets).
    pub fn len(&self) -> usize {
        self.offsets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.offsets.is_empty()
    }

    /// Number of columns.
    pub fn width(&self) -> usize {
        self.labels.len()
    }

    pub fn column(&self, index: usize) -> &[Option<T>] {
        &self.columns[index]
    }

    pub fn column_index(&self, label: &ColumnLabel) -> Option<usize> {
        self.labels.iter().position(|l| l == label)
    }

    pub fn column_by_label(&self, label: &ColumnLabel) -> Option<&[Option<T>]> {
        self.column_index(label).map(|index| self.column(index))
    }

    pub fn get(&self, row: usize, column: usize) -> Option<&T> {
        self.columns
            .get(column)
            .and_then(|cells| cells.get(row))
            .and_then(Option::as_ref)
    }

    /// The non-absent cells of a column with their offsets.
    pub fn series(&self, column: usize) -> impl Iterator<Item = (Offset, &T)> + '_ {
        self.offsets
            .iter()
            .zip(&self.columns[column])
            .filter_map(|(offset, cell)| cell.as_ref().map(|value| (*offset, value)))
    }

    /// Row positions of the non-absent cells of a column.
    pub fn present_rows(&self, column: usize) -> Vec<usize> {
        self.columns[column]
            .iter()
            .enumerate()
            .filter_map(|(row, cell)| cell.as_ref().map(|_| row))
            .collect()
    }

    pub fn into_columns(self) -> Vec<Vec<Option<T>>> {
        self.columns
    }

    /// True when no column has an absent cell after its first present one.
    pub fn is_forward_filled(&self) -> bool {
        self.columns.iter().all(|column| {
            column
                .iter()
                .skip_while(|cell| cell.is_none())
                .all(Option::is_some)
        })
    }

    /// True when both tables share exactly the same offset axis.
    pub fn same_axis<U>(&self, other: &EventTable<U>) -> bool {
        self.offsets == other.offsets
    }
}

impl<T: Clone> EventTable<T> {
    /// Replace each absent cell with the nearest preceding value in the same
    /// column. Absent cells before a column's first value stay absent, so
    /// the operation is idempotent.
    pub fn forward_fill(&self) -> Self {
        let columns = self
            .columns
            .iter()
            .map(|column| {
                let mut last: Option<&T> = None;
                column
                    .iter()
                    .map(|cell| {
                        if let Some(value) = cell {
                            last = Some(value);
                        }
                        last.cloned()
                    })
                    .collect()
            })
            .collect();
        EventTable {
            offsets: self.offsets.clone(),
            labels: self.labels.clone(),
            columns,
        }
    }

    /// Re-express this table on `axis`, which must contain every offset of
    /// this table. Under `Strict`, new rows are absent; under `Sustain`,
    /// they carry the most recent value of each column.
    pub fn reindex(&self, axis: &[Offset], policy: AlignPolicy) -> IndexResult<Self> {
        if let Some(missing) = self.offsets.iter().find(|o| axis.binary_search(*o).is_err()) {
            return Err(IndexError::shape(
                "event_table",
                format!("target axis is missing offset {missing}"),
            ));
        }
        let columns = (0..self.width())
            .map(|c| {
                let series: Vec<(Offset, T)> = self
                    .series(c)
                    .map(|(offset, value)| (offset, value.clone()))
                    .collect();
                align::reindex(&series, axis, policy)
            })
            .collect();
        EventTable::from_columns(axis.to_vec(), self.labels.clone(), columns)
    }
}

impl<T: fmt::Display> EventTable<T> {
    /// Compact text rendering for debugging and the CLI: one line per
    /// offset, absent cells shown as ".".
    pub fn summary(&self) -> String {
        let cell_width = 10;
        let mut out = format!("{:>8} |", "offset");
        for label in &self.labels {
            out.push_str(&format!(" {:>cell_width$}", label.to_string()));
        }
        out.push('\n');
        for (row, offset) in self.offsets.iter().enumerate() {
            out.push_str(&format!("{:>8} |", offset.to_string()));
            for column in &self.columns {
                let text = match &column[row] {
                    Some(value) => value.to_string(),
                    None => ".".to_string(),
                };
                out.push_str(&format!(" {text:>cell_width$}"));
            }
            out.push('\n');
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn off(quarters: f64) -> Offset {
        Offset::new(quarters).unwrap()
    }

    fn two_voice_table() -> EventTable<u32> {
        EventTable::from_series(
            vec![ColumnLabel::Part(0), ColumnLabel::Part(1)],
            vec![
                vec![(off(0.0), 1), (off(2.0), 2)],
                vec![(off(0.0), 10), (off(1.0), 11), (off(3.0), 12)],
            ],
        )
        .unwrap()
    }

    #[test]
    fn test_pair_order_four_voices() {
        let labels: Vec<String> = part_combinations(4)
            .into_iter()
            .map(|(i, j)| ColumnLabel::Pair(i, j).to_string())
            .collect();
        assert_eq!(labels, vec!["0,1", "0,2", "0,3", "1,2", "1,3", "2,3"]);
        assert!(part_combinations(1).is_empty());
    }

    #[test]
    fn test_label_parsing() {
        assert_eq!(ColumnLabel::parse("2"), ColumnLabel::Part(2));
        assert_eq!(ColumnLabel::parse("0,3"), ColumnLabel::Pair(0, 3));
        assert_eq!(ColumnLabel::parse("0,3").lower_voice(), Some(3));
        assert_eq!(
            ColumnLabel::parse("Active Voices"),
            ColumnLabel::Named("Active Voices".to_string())
        );
    }

    #[test]
    fn test_from_series_builds_union_axis() {
        let table = two_voice_table();
        let axis: Vec<f64> = table.offsets().iter().map(|o| o.quarters()).collect();
        assert_eq!(axis, vec![0.0, 1.0, 2.0, 3.0]);
        assert_eq!(table.column(0), &[Some(1), None, Some(2), None]);
        assert_eq!(table.column(1), &[Some(10), Some(11), None, Some(12)]);
    }

    #[test]
    fn test_empty_series_gives_empty_axis() {
        let table: EventTable<u32> =
            EventTable::from_series(vec![ColumnLabel::Part(0)], vec![vec![]]).unwrap();
        assert!(table.is_empty());
        assert_eq!(table.width(), 1);
    }

    #[test]
    fn test_from_columns_validates_shape() {
        let err = EventTable::<u32>::from_columns(
            vec![off(0.0)],
            vec![ColumnLabel::Part(0), ColumnLabel::Part(1)],
            vec![vec![Some(1)]],
        )
        .unwrap_err();
        assert!(matches!(err, IndexError::Shape { .. }));

        let duplicate = EventTable::<u32>::from_columns(
            vec![off(0.0)],
            vec![ColumnLabel::Part(0), ColumnLabel::Part(0)],
            vec![vec![Some(1)], vec![Some(2)]],
        );
        assert!(duplicate.is_err());
    }

    #[test]
    fn test_forward_fill_keeps_leading_absent() {
        let table = EventTable::from_columns(
            vec![off(0.0), off(1.0), off(2.0), off(3.0)],
            vec![ColumnLabel::Part(0)],
            vec![vec![None, Some(5), None, Some(6)]],
        )
        .unwrap();
        let filled = table.forward_fill();
        assert_eq!(filled.column(0), &[None, Some(5), Some(5), Some(6)]);
        assert!(filled.is_forward_filled());
        assert!(!table.is_forward_filled());
    }

    #[test]
    fn test_forward_fill_is_idempotent() {
        let once = two_voice_table().forward_fill();
        let twice = once.forward_fill();
        assert_eq!(once, twice);
    }

    #[test]
    fn test_reindex_sustain_and_strict() {
        let table = EventTable::from_series(
            vec![ColumnLabel::Part(0)],
            vec![vec![(off(0.0), 'a'), (off(2.0), 'b')]],
        )
        .unwrap();
        let axis = [off(0.0), off(1.0), off(2.0), off(3.0)];

        let sustained = table.reindex(&axis, AlignPolicy::Sustain).unwrap();
        assert_eq!(sustained.column(0), &[Some('a'), Some('a'), Some('b'), Some('b')]);

        let strict = table.reindex(&axis, AlignPolicy::Strict).unwrap();
        assert_eq!(strict.column(0), &[Some('a'), None, Some('b'), None]);

        assert!(table.reindex(&axis[1..], AlignPolicy::Strict).is_err());
    }

    #[test]
    fn test_summary_marks_absent_cells() {
        let summary = two_voice_table().summary();
        let lines: Vec<&str> = summary.lines().collect();
        assert_eq!(lines.len(), 5);
        assert!(lines[2].trim_end().ends_with("11"));
        assert!(lines[2].contains('.'));
    }
}
