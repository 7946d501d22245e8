// Meter, metric strength, and the per-event rhythm indexers.
//
// Beat strength follows the usual metrical hierarchy: the downbeat of a
// measure is 1.0, and each division level halves the strength. The levels
// come from the meter: a simple meter divides the measure into its beats
// (3/4 -> three beats), a compound meter first into dotted beats then into
// thirds (6/8 -> two dotted quarters, each into three eighths), and below
// the notated beat every level is binary. 4/4 therefore gives 1.0 on beat
// one, 0.5 on beat three, 0.25 on beats two and four, 0.125 on off-beat
// eighths, and so on. A position off that grid that splits some level into
// three (a triplet) takes the strength of that level's regular split, so
// triplet eighths in 4/4 weigh 0.125 like ordinary off-beat eighths.
//
// A `MeterMap` holds the meter changes of a piece. Measures are counted
// from each change's offset; offsets before the first change use the first
// meter, anchored at its offset.
//
// Measures are numbered from 1 at the first meter's anchor; anything before
// it is a pickup, measure 0. A meter change that cuts a measure short still
// counts that measure.
//
// The duration indexer gives each event the distance to the next event of
// the same part; the last event uses the part's end offset when known.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::align::AlignPolicy;
use crate::error::{IndexError, IndexResult};
use crate::exec::Execution;
use crate::indexer::{
    Contract, Indexer, IndexerKind, Strategy, apply_columnwise, log_finished, log_started,
};
use crate::offset::Offset;
use crate::score::Event;
use crate::table::EventTable;

const TOLERANCE: f64 = 1e-9;
const MAX_LEVELS: usize = 16;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Meter {
    pub numerator: u32,
    pub denominator: u32,
}

impl Meter {
    pub const COMMON: Meter = Meter {
        numerator: 4,
        denominator: 4,
    };

    pub fn new(numerator: u32, denominator: u32) -> IndexResult<Self> {
        if numerator == 0 || !denominator.is_power_of_two() {
            return Err(IndexError::InvalidMeter(format!("{numerator}/{denominator}")));
        }
        Ok(Meter {
            numerator,
            denominator,
        })
    }

    /// Measure length in quarter notes.
    pub fn measure_length(&self) -> f64 {
        f64::from(self.numerator) * 4.0 / f64::from(self.denominator)
    }

    pub fn is_compound(&self) -> bool {
        self.numerator > 3 && self.numerator % 3 == 0
    }

    /// Division factors from the whole measure down to the notated unit.
    fn divisions(&self) -> Vec<u32> {
        if self.is_compound() {
            let mut levels = prime_factors(self.numerator / 3);
            levels.push(3);
            levels
        } else {
            prime_factors(self.numerator)
        }
    }

    /// Strength of a position inside one measure, in quarter notes from the
    /// barline.
    pub fn beat_strength(&self, position: f64) -> f64 {
        let mut unit = self.measure_length();
        if is_multiple(position, unit) {
            return 1.0;
        }
        let mut strength = 1.0;
        let mut triplet = None;
        let levels = self
            .divisions()
            .into_iter()
            .chain(std::iter::repeat(2))
            .take(MAX_LEVELS);
        for factor in levels {
            let enclosing = unit;
            unit /= f64::from(factor);
            strength /= 2.0;
            if is_multiple(position, unit) {
                return strength;
            }
            if triplet.is_none() && factor != 3 && is_multiple(position, enclosing / 3.0) {
                triplet = Some(strength);
            }
        }
        // Off the regular grid: a triplet split of some level weighs like
        // that level's regular split.
        triplet.unwrap_or(strength)
    }
}

fn is_multiple(position: f64, unit: f64) -> bool {
    let ratio = position / unit;
    (ratio - ratio.round()).abs() < TOLERANCE
}

fn prime_factors(mut n: u32) -> Vec<u32> {
    let mut factors = Vec::new();
    let mut p = 2;
    while n > 1 {
        while n % p == 0 {
            factors.push(p);
            n /= p;
        }
        p += 1;
    }
    factors
}

impl fmt::Display for Meter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.numerator, self.denominator)
    }
}

impl FromStr for Meter {
    type Err = IndexError;

    fn from_str(text: &str) -> IndexResult<Self> {
        let invalid = || IndexError::InvalidMeter(text.to_string());
        let (num, den) = text.trim().split_once('/').ok_or_else(invalid)?;
        let num = num.trim().parse().map_err(|_| invalid())?;
        let den = den.trim().parse().map_err(|_| invalid())?;
        Meter::new(num, den)
    }
}

impl TryFrom<String> for Meter {
    type Error = IndexError;

    fn try_from(text: String) -> IndexResult<Self> {
        text.parse()
    }
}

impl From<Meter> for String {
    fn from(meter: Meter) -> String {
        meter.to_string()
    }
}

/// Meter changes of a piece, ordered by offset.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "Vec<(Offset, Meter)>", into = "Vec<(Offset, Meter)>")]
pub struct MeterMap {
    changes: Vec<(Offset, Meter)>,
}

impl Default for MeterMap {
    fn default() -> Self {
        MeterMap {
            changes: vec![(Offset::ZERO, Meter::COMMON)],
        }
    }
}

impl MeterMap {
    /// An empty change list means common time throughout.
    pub fn new(changes: Vec<(Offset, Meter)>) -> IndexResult<Self> {
        if changes.is_empty() {
            return Ok(MeterMap::default());
        }
        if let Some(pair) = changes.windows(2).find(|pair| pair[1].0 <= pair[0].0) {
            return Err(IndexError::UnorderedOffsets {
                part: "meter".to_string(),
                offset: pair[1].0.quarters(),
                previous: pair[0].0.quarters(),
            });
        }
        Ok(MeterMap { changes })
    }

    pub fn changes(&self) -> &[(Offset, Meter)] {
        &self.changes
    }

    /// The meter in force at `offset` and the offset it was anchored at.
    pub fn meter_at(&self, offset: Offset) -> (Offset, Meter) {
        let index = self
            .changes
            .partition_point(|(anchor, _)| *anchor <= offset)
            .saturating_sub(1);
        self.changes[index]
    }

    pub fn measure_number(&self, offset: Offset) -> u32 {
        let (first, _) = self.changes[0];
        if offset < first {
            return 0;
        }
        let mut number = 1;
        for (k, &(anchor, meter)) in self.changes.iter().enumerate() {
            let length = meter.measure_length();
            match self.changes.get(k + 1) {
                Some(&(next, _)) if next <= offset => {
                    number += (next.since(anchor) / length - TOLERANCE).ceil() as u32;
                }
                _ => return number + (offset.since(anchor) / length + TOLERANCE).floor() as u32,
            }
        }
        number
    }

    pub fn beat_strength(&self, offset: Offset) -> f64 {
        let (anchor, meter) = self.meter_at(offset);
        let position = offset.since(anchor).rem_euclid(meter.measure_length());
        meter.beat_strength(position)
    }
}

impl TryFrom<Vec<(Offset, Meter)>> for MeterMap {
    type Error = IndexError;

    fn try_from(changes: Vec<(Offset, Meter)>) -> IndexResult<Self> {
        MeterMap::new(changes)
    }
}

impl From<MeterMap> for Vec<(Offset, Meter)> {
    fn from(map: MeterMap) -> Self {
        map.changes
    }
}

/// Metric strength of each event onset.
pub struct BeatStrengthIndexer<'a> {
    notes: &'a EventTable<Event>,
    meters: &'a MeterMap,
}

impl<'a> BeatStrengthIndexer<'a> {
    pub fn new(notes: &'a EventTable<Event>, meters: &'a MeterMap) -> Self {
        BeatStrengthIndexer { notes, meters }
    }
}

impl Indexer for BeatStrengthIndexer<'_> {
    type Value = f64;
    const KIND: IndexerKind = IndexerKind::BeatStrength;
    const CONTRACT: Contract = Contract::new(Strategy::Columnwise, AlignPolicy::Strict);

    fn run(&self, exec: &Execution) -> IndexResult<EventTable<f64>> {
        log_started(Self::KIND, &Self::CONTRACT);
        let meters = self.meters;
        let table = apply_columnwise(Self::KIND, self.notes, exec, |column| {
            Ok(column
                .offsets
                .iter()
                .zip(column.cells)
                .map(|(offset, cell)| cell.as_ref().map(|_| meters.beat_strength(*offset)))
                .collect())
        })?;
        log_finished(Self::KIND, &Self::CONTRACT, &table);
        Ok(table)
    }
}

/// Measure number of each event onset.
pub struct MeasureIndexer<'a> {
    notes: &'a EventTable<Event>,
    meters: &'a MeterMap,
}

impl<'a> MeasureIndexer<'a> {
    pub fn new(notes: &'a EventTable<Event>, meters: &'a MeterMap) -> Self {
        MeasureIndexer { notes, meters }
    }
}

impl Indexer for MeasureIndexer<'_> {
    type Value = u32;
    const KIND: IndexerKind = IndexerKind::Measure;
    const CONTRACT: Contract = Contract::new(Strategy::Columnwise, AlignPolicy::Strict);

    fn run(&self, exec: &Execution) -> IndexResult<EventTable<u32>> {
        log_started(Self::KIND, &Self::CONTRACT);
        let meters = self.meters;
        let table = apply_columnwise(Self::KIND, self.notes, exec, |column| {
            Ok(column
                .offsets
                .iter()
                .zip(column.cells)
                .map(|(offset, cell)| cell.as_ref().map(|_| meters.measure_number(*offset)))
                .collect())
        })?;
        log_finished(Self::KIND, &Self::CONTRACT, &table);
        Ok(table)
    }
}

/// Length of each event in quarter notes.
pub struct DurationIndexer<'a> {
    notes: &'a EventTable<Event>,
    ends: Vec<Option<Offset>>,
}

impl<'a> DurationIndexer<'a> {
    /// `ends` holds one optional end offset per column of `notes`.
    pub fn new(notes: &'a EventTable<Event>, ends: Vec<Option<Offset>>) -> IndexResult<Self> {
        if ends.len() != notes.width() {
            return Err(IndexError::shape(
                Self::KIND.name(),
                format!("{} end offsets for {} parts", ends.len(), notes.width()),
            ));
        }
        Ok(DurationIndexer { notes, ends })
    }
}

impl Indexer for DurationIndexer<'_> {
    type Value = f64;
    const KIND: IndexerKind = IndexerKind::Duration;
    const CONTRACT: Contract = Contract::new(Strategy::Columnwise, AlignPolicy::Strict);

    fn run(&self, exec: &Execution) -> IndexResult<EventTable<f64>> {
        log_started(Self::KIND, &Self::CONTRACT);
        let table = apply_columnwise(Self::KIND, self.notes, exec, |column| {
            let rows: Vec<usize> = column.present_rows().collect();
            let mut cells = vec![None; column.cells.len()];
            for (k, &row) in rows.iter().enumerate() {
                let stop = match rows.get(k + 1) {
                    Some(&next) => Some(column.offsets[next]),
                    None => self.ends[column.index],
                };
                cells[row] = stop.map(|stop| stop.since(column.offsets[row]));
            }
            Ok(cells)
        })?;
        log_finished(Self::KIND, &Self::CONTRACT, &table);
        Ok(table)
    }
}
