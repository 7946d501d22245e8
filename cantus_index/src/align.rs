// Alignment engine: merge offset axes and re-express series on them.
//
// Two policies decide what a column holds at an offset where it has no
// event of its own:
//
// - Strict: the cell is absent. Used when building tables from parts, where
//   "no new event here" is the meaning we want to keep.
// - Sustain: the cell repeats the most recent value (forward fill). Used
//   wherever a sounding note must be visible at every later offset until it
//   is replaced, e.g. when comparing two voices vertically.
//
// Offsets before a series' first event are absent under both policies.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use crate::offset::Offset;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AlignPolicy {
    Strict,
    Sustain,
}

/// Sorted, duplicate-free union of every input axis.
pub fn union_axis<I, J>(axes: I) -> Vec<Offset>
where
    I: IntoIterator<Item = J>,
    J: IntoIterator<Item = Offset>,
{
    axes.into_iter()
        .flatten()
        .collect::<BTreeSet<Offset>>()
        .into_iter()
        .collect()
}

/// Look up each axis offset in a sorted series.
pub fn reindex<T: Clone>(
    series: &[(Offset, T)],
    axis: &[Offset],
    policy: AlignPolicy,
) -> Vec<Option<T>> {
    let mut next = 0;
    let mut current: Option<&T> = None;
    axis.iter()
        .map(|&offset| {
            let mut exact = None;
            while next < series.len() && series[next].0 <= offset {
                current = Some(&series[next].1);
                if series[next].0 == offset {
                    exact = current;
                }
                next += 1;
            }
            match policy {
                AlignPolicy::Strict => exact.cloned(),
                AlignPolicy::Sustain => current.cloned(),
            }
        })
        .collect()
}

/// Strict placement that consumes the series instead of cloning it. Every
/// series offset must appear in `axis`; values at other offsets are dropped.
pub fn place<T>(series: Vec<(Offset, T)>, axis: &[Offset]) -> Vec<Option<T>> {
    let mut cells: Vec<Option<T>> = axis.iter().map(|_| None).collect();
    for (offset, value) in series {
        if let Ok(row) = axis.binary_search(&offset) {
            cells[row] = Some(value);
        }
    }
    cells
}
