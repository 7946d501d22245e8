// Dissonance indexer: keep the dissonant vertical intervals, drop the rest.
//
// Input is the forward-filled vertical interval table (simple intervals with
// quality). Each row is one simultaneity across every voice pair. A cell
// survives when its interval is dissonant; consonances, rests and absent
// cells all become absent.
//
// Consonant: P1, m3, M3, P5, m6, M6, P8 in either direction. Everything
// else is dissonant, with two context-dependent exceptions decided from the
// other pairs of the same row:
//
// - A fourth (perfect or augmented) is consonant when some voice below the
//   fourth's lower note forms a third, fifth or sixth with that lower note.
//   The search looks at pairs whose upper label is that lower note and, to
//   cover voice crossing, at pairs whose lower label is that note with a
//   descending interval. For a fourth between correctly ordered voices, if
//   that finds nothing, a unison or octave on the fourth's upper note is
//   accepted instead.
// - A rising diminished fifth is consonant when a voice below its lower note
//   forms a third, fifth or sixth with it. Only the lower-voice search
//   applies; crossed fifths are left dissonant.
//
// `ConsonanceMakerIndexer` then revisits the surviving fourths and fifths
// over a three-row window: a maker in the previous or next row still counts
// when both voices of the pair are held across that row boundary.

use serde::{Deserialize, Serialize};

use crate::align::AlignPolicy;
use crate::error::{IndexError, IndexResult};
use crate::exec::Execution;
use crate::indexer::{
    Aligned, Contract, Indexer, IndexerKind, Strategy, Window, WindowSpec, apply_rowwise,
    apply_windowed_cells, log_finished, log_started, pair_labels,
};
use crate::interval::{Interval, IntervalCell, Quality};
use crate::table::EventTable;

/// Intervals above a voice that make a fourth or fifth resting on that
/// voice consonant.
const CONSONANCE_MAKERS: [(Quality, u16); 5] = [
    (Quality::Minor, 3),
    (Quality::Major, 3),
    (Quality::Perfect, 5),
    (Quality::Minor, 6),
    (Quality::Major, 6),
];

/// Fallback makers measured from the upper note of an uncrossed fourth.
const UPPER_VOICE_MAKERS: [(Quality, u16); 2] = [(Quality::Perfect, 1), (Quality::Perfect, 8)];

pub fn is_consonant(interval: Interval) -> bool {
    match (interval.quality, interval.simple().size) {
        (Some(Quality::Perfect), 1 | 5 | 8) => true,
        (Some(Quality::Minor | Quality::Major), 3 | 6) => true,
        _ => false,
    }
}

/// Consonance test for a table cell; a rest is never a dissonance.
pub fn is_consonant_cell(cell: &IntervalCell) -> bool {
    match cell {
        IntervalCell::Interval(interval) => is_consonant(*interval),
        IntervalCell::Rest => true,
    }
}

fn is_fourth(interval: Interval) -> bool {
    interval.is(Quality::Perfect, 4) || interval.is(Quality::Augmented, 4)
}

fn matches_any(interval: Interval, makers: &[(Quality, u16)]) -> bool {
    makers.iter().any(|&(quality, size)| interval.is(quality, size))
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(default)]
pub struct DissonanceSettings {
    #[serde(rename = "special_P4")]
    pub special_fourths: bool,
    #[serde(rename = "special_d5")]
    pub special_fifths: bool,
}

impl Default for DissonanceSettings {
    fn default() -> Self {
        DissonanceSettings {
            special_fourths: true,
            special_fifths: true,
        }
    }
}

/// One simultaneity: the interval of every pair at a single offset.
struct Simultaneity<'r> {
    pairs: &'r [(usize, usize)],
    cells: Vec<Option<&'r IntervalCell>>,
}

impl Simultaneity<'_> {
    fn interval(&self, column: usize) -> Option<Interval> {
        self.cells[column].and_then(IntervalCell::interval)
    }

    /// Some pair other than `skip` has `voice` as its upper label and rises
    /// from its lower voice by one of `makers`, or (crossed) has `voice` as
    /// its lower label and falls to its upper voice by one of them.
    fn supported_from(
        &self,
        skip: usize,
        voice: usize,
        makers: &[(Quality, u16)],
        crossed: bool,
    ) -> bool {
        self.pairs.iter().enumerate().any(|(m, &(upper, lower))| {
            if m == skip {
                return false;
            }
            let Some(interval) = self.interval(m) else {
                return false;
            };
            let direct = upper == voice && !interval.descending;
            let crossing = crossed && lower == voice && interval.descending;
            (direct || crossing) && matches_any(interval, makers)
        })
    }

    fn fourth_is_consonant(&self, column: usize, fourth: Interval) -> bool {
        let (upper, lower) = self.pairs[column];
        if fourth.descending {
            // The nominal upper voice is the lower note of the fourth.
            return self.supported_from(column, upper, &CONSONANCE_MAKERS, true);
        }
        self.supported_from(column, lower, &CONSONANCE_MAKERS, true)
            || self.supported_from(column, upper, &UPPER_VOICE_MAKERS, false)
    }

    fn fifth_is_consonant(&self, column: usize, fifth: Interval) -> bool {
        let (_, lower) = self.pairs[column];
        !fifth.descending && self.supported_from(column, lower, &CONSONANCE_MAKERS, false)
    }

    fn dissonances(&self, settings: &DissonanceSettings) -> Vec<Option<IntervalCell>> {
        (0..self.cells.len())
            .map(|column| {
                let cell = self.cells[column]?;
                let interval = cell.interval()?;
                let consonant = is_consonant(interval)
                    || (settings.special_fourths
                        && is_fourth(interval)
                        && self.fourth_is_consonant(column, interval))
                    || (settings.special_fifths
                        && interval.is(Quality::Diminished, 5)
                        && self.fifth_is_consonant(column, interval));
                if consonant { None } else { Some(*cell) }
            })
            .collect()
    }
}

fn require_quality(kind: IndexerKind, intervals: &EventTable<IntervalCell>) -> IndexResult<()> {
    let missing_quality = (0..intervals.width())
        .flat_map(|c| intervals.column(c).iter().flatten())
        .filter_map(IntervalCell::interval)
        .find(|interval| interval.quality.is_none());
    match missing_quality {
        Some(interval) => Err(IndexError::precondition(
            kind.name(),
            format!("vertical intervals need quality, found '{interval}'"),
        )),
        None => Ok(()),
    }
}

#[derive(Debug)]
pub struct DissonanceIndexer<'a> {
    intervals: &'a EventTable<IntervalCell>,
    pairs: Vec<(usize, usize)>,
    settings: DissonanceSettings,
}

impl<'a> DissonanceIndexer<'a> {
    /// `intervals` must be the forward-filled vertical interval table with
    /// interval quality.
    pub fn new(
        intervals: &'a EventTable<IntervalCell>,
        settings: DissonanceSettings,
    ) -> IndexResult<Self> {
        let pairs = pair_labels(Self::KIND, intervals.labels())?;
        Self::CONTRACT.check_inputs(Self::KIND, &[intervals as &dyn Aligned])?;
        require_quality(Self::KIND, intervals)?;
        Ok(DissonanceIndexer {
            intervals,
            pairs,
            settings,
        })
    }
}

impl Indexer for DissonanceIndexer<'_> {
    type Value = IntervalCell;
    const KIND: IndexerKind = IndexerKind::Dissonance;
    const CONTRACT: Contract = Contract::new(Strategy::Rowwise, AlignPolicy::Sustain);

    fn run(&self, exec: &Execution) -> IndexResult<EventTable<IntervalCell>> {
        log_started(Self::KIND, &Self::CONTRACT);
        let labels = self.intervals.labels().to_vec();
        let table = apply_rowwise(Self::KIND, self.intervals, labels, exec, |row| {
            Simultaneity {
                pairs: &self.pairs,
                cells: row.cells().collect(),
            }
            .dissonances(&self.settings)
        })?;
        log_finished(Self::KIND, &Self::CONTRACT, &table);
        Ok(table)
    }
}

/// Held-row makers for each context-dependent interval: any third, fifth
/// or sixth for a perfect fourth, only a minor third for an augmented
/// fourth and only a major sixth for a diminished fifth.
fn held_makers(
    interval: Interval,
    settings: &DissonanceSettings,
) -> Option<&'static [(Quality, u16)]> {
    const MINOR_THIRD: [(Quality, u16); 1] = [(Quality::Minor, 3)];
    const MAJOR_SIXTH: [(Quality, u16); 1] = [(Quality::Major, 6)];
    let makers: &'static [(Quality, u16)] =
        if settings.special_fourths && interval.is(Quality::Perfect, 4) {
            &CONSONANCE_MAKERS
        } else if settings.special_fourths && interval.is(Quality::Augmented, 4) {
            &MINOR_THIRD
        } else if settings.special_fifths && interval.is(Quality::Diminished, 5) {
            &MAJOR_SIXTH
        } else {
            return None;
        };
    Some(makers)
}

/// Second pass over the dissonances: a fourth or diminished fifth that is
/// held across a row boundary is consonant when the maker sounds in the
/// neighbouring row it is held from or into.
///
/// The dissonance pass only sees one simultaneity, so a fourth whose
/// supporting third moves away (or rests) while the fourth is held comes
/// out dissonant there. This pass looks at the previous row when both voices
/// of the pair are held into the focus row, and at the next row when both
/// are held out of it. Rows without a full window keep the dissonance pass's
/// verdict.
pub struct ConsonanceMakerIndexer<'a> {
    vertical: &'a EventTable<IntervalCell>,
    dissonances: &'a EventTable<IntervalCell>,
    horizontal: &'a EventTable<IntervalCell>,
    pairs: Vec<(usize, usize)>,
    settings: DissonanceSettings,
}

impl<'a> ConsonanceMakerIndexer<'a> {
    /// `vertical` is the forward-filled table the dissonance pass read,
    /// `dissonances` its output and `horizontal` the per-voice melodic
    /// intervals attached to the later note.
    pub fn new(
        vertical: &'a EventTable<IntervalCell>,
        dissonances: &'a EventTable<IntervalCell>,
        horizontal: &'a EventTable<IntervalCell>,
        settings: DissonanceSettings,
    ) -> IndexResult<Self> {
        let kind = Self::KIND;
        Self::CONTRACT.check_inputs(kind, &[vertical as &dyn Aligned, dissonances, horizontal])?;
        if vertical.labels() != dissonances.labels() {
            return Err(IndexError::shape(
                kind.name(),
                "vertical and dissonance tables have different pair columns",
            ));
        }
        let pairs = pair_labels(kind, vertical.labels())?;
        let beyond = pairs.iter().find(|&&(_, lower)| lower >= horizontal.width());
        if let Some(&(upper, lower)) = beyond {
            return Err(IndexError::shape(
                kind.name(),
                format!(
                    "pair {upper},{lower} refers to a voice beyond the {} per-voice columns",
                    horizontal.width()
                ),
            ));
        }
        require_quality(kind, vertical)?;
        Ok(ConsonanceMakerIndexer {
            vertical,
            dissonances,
            horizontal,
            pairs,
            settings,
        })
    }

    fn simultaneity(&self, row: usize) -> Simultaneity<'_> {
        Simultaneity {
            pairs: &self.pairs,
            cells: (0..self.vertical.width())
                .map(|c| self.vertical.get(row, c))
                .collect(),
        }
    }

    /// No onset, or a repeated pitch.
    fn held(&self, row: usize, voice: usize) -> bool {
        match self.horizontal.get(row, voice) {
            None => true,
            Some(cell) => cell.interval().is_some_and(|interval| interval.size == 1),
        }
    }

    /// The pair sounds `interval` at row `sounding` and both its voices are
    /// held at row `boundary`.
    fn held_at(&self, column: usize, interval: Interval, sounding: usize, boundary: usize) -> bool {
        let (upper, lower) = self.pairs[column];
        let sounded = self
            .vertical
            .get(sounding, column)
            .and_then(IntervalCell::interval);
        sounded == Some(interval) && self.held(boundary, upper) && self.held(boundary, lower)
    }

    fn refine(&self, window: &Window, column: usize) -> Option<IntervalCell> {
        let focus = window.focus_row();
        let cell = *self.dissonances.get(focus, column)?;
        let Some(interval) = cell.interval() else {
            return Some(cell);
        };
        let Some(makers) = held_makers(interval, &self.settings) else {
            return Some(cell);
        };
        let (upper, lower) = self.pairs[column];
        let bottom = if interval.descending { upper } else { lower };
        let (previous, next) = (window.row(0), window.row(2));
        let supported = |row: usize| {
            self.simultaneity(row)
                .supported_from(column, bottom, makers, true)
        };
        let from_previous = self.held_at(column, interval, previous, focus) && supported(previous);
        let into_next = self.held_at(column, interval, next, next) && supported(next);
        let consonant = from_previous || into_next;
        if consonant { None } else { Some(cell) }
    }
}

impl Indexer for ConsonanceMakerIndexer<'_> {
    type Value = IntervalCell;
    const KIND: IndexerKind = IndexerKind::ConsonanceMaker;
    const CONTRACT: Contract =
        Contract::new(Strategy::Windowed(WindowSpec::TRIPLE), AlignPolicy::Sustain);

    fn run(&self, exec: &Execution) -> IndexResult<EventTable<IntervalCell>> {
        log_started(Self::KIND, &Self::CONTRACT);
        let width = self.dissonances.width();
        let table = apply_windowed_cells(
            Self::KIND,
            self.dissonances.offsets(),
            self.dissonances.labels().to_vec(),
            WindowSpec::TRIPLE,
            |row| (0..width).map(|c| self.dissonances.get(row, c).copied()).collect(),
            exec,
            |window| (0..width).map(|c| self.refine(window, c)).collect(),
        )?;
        log_finished(Self::KIND, &Self::CONTRACT, &table);
        Ok(table)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::offset::Offset;
    use crate::table::{ColumnLabel, part_combinations};

    /// One-row table over `voices` voices with the given interval names in
    /// part-combination order.
    fn simultaneity(voices: usize, names: &[&str]) -> EventTable<IntervalCell> {
        let pairs = part_combinations(voices);
        assert_eq!(pairs.len(), names.len());
        EventTable::from_columns(
            vec![Offset::ZERO],
            pairs.iter().map(|&(i, j)| ColumnLabel::Pair(i, j)).collect(),
            names.iter().map(|name| vec![Some(name.parse().unwrap())]).collect(),
        )
        .unwrap()
    }

    fn run(table: &EventTable<IntervalCell>, settings: DissonanceSettings) -> Vec<Option<String>> {
        let out = DissonanceIndexer::new(table, settings)
            .unwrap()
            .run(&Execution::Serial)
            .unwrap();
        (0..out.width())
            .map(|c| out.column(c)[0].map(|cell| cell.to_string()))
            .collect()
    }

    #[test]
    fn test_consonance_list() {
        for name in ["P1", "m3", "-M3", "P5", "-m6", "M6", "P8", "-P8", "M10", "P12"] {
            let interval: Interval = name.parse().unwrap();
            assert!(is_consonant(interval), "{name} should be consonant");
        }
        for name in ["M2", "-m7", "P4", "A4", "d5", "A1", "d8", "m9"] {
            let interval: Interval = name.parse().unwrap();
            assert!(!is_consonant(interval), "{name} should be dissonant");
        }
        assert!(is_consonant_cell(&IntervalCell::Rest));
    }

    #[test]
    fn test_removes_consonances_and_rests() {
        let table = simultaneity(3, &["M2", "Rest", "P5"]);
        assert_eq!(
            run(&table, DissonanceSettings::default()),
            vec![Some("M2".to_string()), None, None]
        );
    }

    #[test]
    fn test_fourth_over_third_is_consonant() {
        // Voices 0 and 1 form P4; voice 1 sits a M3 above voice 2.
        let table = simultaneity(3, &["P4", "M6", "M3"]);
        assert_eq!(run(&table, DissonanceSettings::default()), vec![None, None, None]);
    }

    #[test]
    fn test_fourth_over_bass_is_dissonant() {
        // Voice 1 is the bass of the fourth and nothing sounds below it.
        let table = simultaneity(2, &["P4"]);
        assert_eq!(run(&table, DissonanceSettings::default()), vec![Some("P4".to_string())]);
    }

    #[test]
    fn test_fourth_with_sixth_maker() {
        let table = simultaneity(3, &["P4", "m8", "m6"]);
        let out = run(&table, DissonanceSettings::default());
        assert_eq!(out[0], None, "a sixth below the fourth makes it consonant");
    }

    #[test]
    fn test_fourth_with_octave_below_stays_dissonant() {
        // Four voices: 0,2 is a P4 and 2,3 an octave; nothing else supports it.
        let table = simultaneity(4, &["M3", "P4", "M3", "M2", "M2", "P8"]);
        let out = run(&table, DissonanceSettings::default());
        assert_eq!(out[1], Some("P4".to_string()));
    }

    #[test]
    fn test_crossed_fourth_and_crossed_maker() {
        // 0,1 is -P4, so voice 0 is the fourth's lower note, and voice 2
        // sits a third below voice 0.
        let table = simultaneity(3, &["-P4", "M3", "m6"]);
        assert_eq!(run(&table, DissonanceSettings::default())[0], None);

        // 1,2 is P4 with voice 2 below. Voice 0 has crossed under voice 2:
        // 0,2 is -M3.
        let crossed_maker = simultaneity(3, &["-m6", "-M3", "P4"]);
        assert_eq!(
            run(&crossed_maker, DissonanceSettings::default()),
            vec![None, None, None]
        );
    }

    #[test]
    fn test_special_fourths_can_be_disabled() {
        let table = simultaneity(3, &["P4", "M6", "M3"]);
        let settings = DissonanceSettings {
            special_fourths: false,
            ..DissonanceSettings::default()
        };
        assert_eq!(run(&table, settings)[0], Some("P4".to_string()));
    }

    #[test]
    fn test_diminished_fifth_with_sixth_below() {
        let table = simultaneity(3, &["d5", "m7", "M6"]);
        assert_eq!(run(&table, DissonanceSettings::default())[0], None);

        let unsupported = simultaneity(3, &["d5", "m7", "P8"]);
        assert_eq!(run(&unsupported, DissonanceSettings::default())[0], Some("d5".to_string()));
    }

    #[test]
    fn test_four_voice_fourth_over_sixth_is_consonant() {
        // 0,2 is a P4 and voice 2 sits a M6 above voice 3, so the fourth is
        // supported from below even though voices 0 and 1 lie between.
        // D5, B4, A4 over C4.
        let table = simultaneity(4, &["m3", "P4", "M2", "M2", "M7", "M6"]);
        let out = run(&table, DissonanceSettings::default());
        assert_eq!(out[1], None);
        assert_eq!(out[3], Some("M2".to_string()));
    }

    /// Vertical and horizontal tables for three voices, one row per entry
    /// (`None` for a voice without an onset).
    fn held_tables(
        rows: &[[&str; 3]],
        melodic: &[[Option<&str>; 3]],
    ) -> (EventTable<IntervalCell>, EventTable<IntervalCell>) {
        let offsets: Vec<Offset> = (0..rows.len()).map(|r| Offset::from(r as u32)).collect();
        let vertical = EventTable::from_columns(
            offsets.clone(),
            part_combinations(3)
                .iter()
                .map(|&(i, j)| ColumnLabel::Pair(i, j))
                .collect(),
            (0..3)
                .map(|c| rows.iter().map(|row| Some(row[c].parse().unwrap())).collect())
                .collect(),
        )
        .unwrap();
        let horizontal = EventTable::from_columns(
            offsets,
            (0..3).map(ColumnLabel::Part).collect(),
            (0..3)
                .map(|v| melodic.iter().map(|row| row[v].map(|n| n.parse().unwrap())).collect())
                .collect(),
        )
        .unwrap();
        (vertical, horizontal)
    }

    fn refined(
        vertical: &EventTable<IntervalCell>,
        horizontal: &EventTable<IntervalCell>,
        settings: DissonanceSettings,
    ) -> Vec<Option<String>> {
        let dissonances = DissonanceIndexer::new(vertical, settings)
            .unwrap()
            .run(&Execution::Serial)
            .unwrap();
        let out = ConsonanceMakerIndexer::new(vertical, &dissonances, horizontal, settings)
            .unwrap()
            .run(&Execution::Serial)
            .unwrap();
        out.column(0).iter().map(|cell| cell.map(|c| c.to_string())).collect()
    }

    #[test]
    fn test_held_fourth_keeps_maker_from_previous_row() {
        // C5 and G4 held throughout; the bass E4 rests at row 1 and then
        // moves on. Row 1 alone shows a bare fourth.
        let (vertical, horizontal) = held_tables(
            &[
                ["P4", "M6", "M3"],
                ["P4", "Rest", "Rest"],
                ["P4", "P8", "P5"],
                ["P4", "M6", "M3"],
            ],
            &[
                [None, None, None],
                [None, None, Some("Rest")],
                [None, None, Some("Rest")],
                [None, None, Some("M3")],
            ],
        );
        let settings = DissonanceSettings::default();
        let dissonances = DissonanceIndexer::new(&vertical, settings)
            .unwrap()
            .run(&Execution::Serial)
            .unwrap();
        assert_eq!(dissonances.get(1, 0).map(|c| c.to_string()), Some("P4".to_string()));
        assert_eq!(refined(&vertical, &horizontal, settings), vec![None; 4]);
    }

    #[test]
    fn test_held_fourth_keeps_maker_from_next_row() {
        let (vertical, horizontal) = held_tables(
            &[["P4", "Rest", "Rest"], ["P4", "Rest", "Rest"], ["P4", "M6", "M3"]],
            &[[None, None, None], [None, None, None], [None, None, Some("Rest")]],
        );
        let out = refined(&vertical, &horizontal, DissonanceSettings::default());
        assert_eq!(out, vec![Some("P4".to_string()), None, None]);
    }

    #[test]
    fn test_moving_voice_loses_previous_maker() {
        // The lower voice of the fourth leaps an octave into row 1, so the
        // row 0 maker does not carry over.
        let (vertical, horizontal) = held_tables(
            &[["P4", "M6", "M3"], ["P4", "Rest", "Rest"], ["P4", "Rest", "Rest"]],
            &[[None, None, None], [None, Some("-P8"), Some("Rest")], [None, None, None]],
        );
        let out = refined(&vertical, &horizontal, DissonanceSettings::default());
        let fourth = Some("P4".to_string());
        assert_eq!(out, vec![None, fourth.clone(), fourth]);
    }

    #[test]
    fn test_held_makers_follow_settings() {
        let (vertical, horizontal) = held_tables(
            &[["P4", "M6", "M3"], ["P4", "Rest", "Rest"], ["P4", "M6", "M3"]],
            &[[None, None, None], [None, None, Some("Rest")], [None, None, Some("M3")]],
        );
        let settings = DissonanceSettings {
            special_fourths: false,
            ..DissonanceSettings::default()
        };
        assert!(refined(&vertical, &horizontal, settings).iter().all(Option::is_some));
    }

    #[test]
    fn test_held_augmented_fourth_needs_minor_third() {
        let melodic = [[None, None, None], [None, None, Some("Rest")], [None, None, None]];
        let (major, horizontal) = held_tables(
            &[["A4", "M6", "M3"], ["A4", "Rest", "Rest"], ["A4", "Rest", "Rest"]],
            &melodic,
        );
        let out = refined(&major, &horizontal, DissonanceSettings::default());
        assert_eq!(out[1], Some("A4".to_string()));

        let (minor, horizontal) = held_tables(
            &[["A4", "m6", "m3"], ["A4", "Rest", "Rest"], ["A4", "Rest", "Rest"]],
            &melodic,
        );
        assert_eq!(refined(&minor, &horizontal, DissonanceSettings::default())[1], None);
    }

    #[test]
    fn test_consonance_maker_window_and_shape() {
        let (vertical, horizontal) = held_tables(
            &[["P4", "M6", "M3"], ["P4", "Rest", "Rest"]],
            &[[None, None, None], [None, None, Some("Rest")]],
        );
        let settings = DissonanceSettings::default();
        let dissonances = DissonanceIndexer::new(&vertical, settings)
            .unwrap()
            .run(&Execution::Serial)
            .unwrap();
        let err = ConsonanceMakerIndexer::new(&vertical, &dissonances, &horizontal, settings)
            .err()
            .unwrap();
        assert!(matches!(err, IndexError::WindowTooShort { window: 3, .. }));

        let (vertical, horizontal) = held_tables(
            &[["P4", "M6", "M3"], ["P4", "Rest", "Rest"], ["P4", "M6", "M3"]],
            &[[None, None, None], [None, None, Some("Rest")], [None, None, Some("M3")]],
        );
        let dissonances = DissonanceIndexer::new(&vertical, settings)
            .unwrap()
            .run(&Execution::Serial)
            .unwrap();
        let narrow = EventTable::from_columns(
            horizontal.offsets().to_vec(),
            vec![ColumnLabel::Part(0)],
            vec![vec![None, None, None]],
        )
        .unwrap();
        let err = ConsonanceMakerIndexer::new(&vertical, &dissonances, &narrow, settings)
            .err()
            .unwrap();
        assert!(matches!(err, IndexError::Shape { .. }));
    }

    #[test]
    fn test_rejects_unfilled_input() {
        let table = EventTable::from_columns(
            vec![Offset::ZERO, Offset::from(1)],
            vec![ColumnLabel::Pair(0, 1)],
            vec![vec![Some("M3".parse().unwrap()), None]],
        )
        .unwrap();
        let err = DissonanceIndexer::new(&table, DissonanceSettings::default()).unwrap_err();
        assert!(matches!(err, IndexError::Precondition { .. }));
    }

    #[test]
    fn test_rejects_missing_quality_and_non_pairs() {
        let no_quality = simultaneity(2, &["3"]);
        assert!(DissonanceIndexer::new(&no_quality, DissonanceSettings::default()).is_err());

        let parts = EventTable::<IntervalCell>::empty(vec![ColumnLabel::Part(0)]);
        let err = DissonanceIndexer::new(&parts, DissonanceSettings::default()).unwrap_err();
        assert!(matches!(err, IndexError::Shape { .. }));
    }
}
