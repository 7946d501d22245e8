// Interval naming plus the vertical and horizontal interval indexers.
//
// An interval is measured between two spelled pitches: its generic size is
// the diatonic step distance plus one (unison = 1, third = 3, octave = 8),
// its quality comes from how far the semitone distance deviates from the
// major/perfect form of that size, and its direction is descending when the
// second pitch lies below the first. Rendered names look like "M3", "-P5",
// "A4", or without quality "3", "-5".
//
// Vertical intervals compare every voice pair (upper voice i, lower voice j,
// i < j). Both voices are sustained within the pair, so a held note in one
// voice is measured against each new note of the other. The interval goes
// from the lower voice's pitch to the upper voice's pitch, so "-M3" means
// the nominally upper voice sounds a major third below the lower one.
//
// Horizontal intervals measure each voice's motion from one event to the
// next, attached to the later event by default (settings can attach them to
// the earlier one). Anything involving a rest is the `Rest` cell.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::align::AlignPolicy;
use crate::error::{IndexError, IndexResult};
use crate::exec::Execution;
use crate::indexer::{
    Contract, Indexer, IndexerKind, Strategy, apply_cellwise, apply_columnwise, apply_pairwise,
    log_finished, log_started,
};
use crate::score::{Event, Pitch};
use crate::table::EventTable;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Quality {
    DoublyDiminished,
    Diminished,
    Minor,
    Perfect,
    Major,
    Augmented,
    DoublyAugmented,
}

impl Quality {
    const SYMBOLS: [(Quality, &'static str); 7] = [
        (Quality::DoublyDiminished, "dd"),
        (Quality::Diminished, "d"),
        (Quality::Minor, "m"),
        (Quality::Perfect, "P"),
        (Quality::Major, "M"),
        (Quality::Augmented, "A"),
        (Quality::DoublyAugmented, "AA"),
    ];

    pub fn symbol(self) -> &'static str {
        Self::SYMBOLS
            .iter()
            .find(|(quality, _)| *quality == self)
            .map_or("", |(_, symbol)| *symbol)
    }

    pub fn from_symbol(symbol: &str) -> Option<Quality> {
        Self::SYMBOLS
            .iter()
            .find(|(_, s)| *s == symbol)
            .map(|(quality, _)| *quality)
    }
}

/// Whether a generic size belongs to the perfect family (unison, fourth,
/// fifth and their octave compounds).
pub fn is_perfect_class(size: u16) -> bool {
    matches!(simple_class(size), 1 | 4 | 5)
}

/// Size reduced into 1..=7, ignoring octaves entirely.
fn simple_class(size: u16) -> u16 {
    (size.max(1) - 1) % 7 + 1
}

/// Quality from a generic size and the semitone span, clamping extreme
/// alterations to the doubly altered forms.
fn quality_of(size: u16, semitones: i32) -> Quality {
    let class = simple_class(size);
    let octaves = i32::from((size.max(1) - 1) / 7);
    let simple_semitones = semitones - 12 * octaves;
    let base = match class {
        1 => 0,
        2 => 2,
        3 => 4,
        4 => 5,
        5 => 7,
        6 => 9,
        _ => 11,
    };
    let deviation = simple_semitones - base;
    if is_perfect_class(size) {
        match deviation {
            i32::MIN..=-2 => Quality::DoublyDiminished,
            -1 => Quality::Diminished,
            0 => Quality::Perfect,
            1 => Quality::Augmented,
            _ => Quality::DoublyAugmented,
        }
    } else {
        match deviation {
            i32::MIN..=-3 => Quality::DoublyDiminished,
            -2 => Quality::Diminished,
            -1 => Quality::Minor,
            0 => Quality::Major,
            1 => Quality::Augmented,
            _ => Quality::DoublyAugmented,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Interval {
    pub descending: bool,
    pub quality: Option<Quality>,
    /// Generic size, 1 for a unison.
    pub size: u16,
}

impl Interval {
    pub fn new(descending: bool, quality: Option<Quality>, size: u16) -> Self {
        Interval {
            descending,
            quality,
            size,
        }
    }

    /// Full interval (compound, with quality) from `from` to `to`.
    pub fn between(from: Pitch, to: Pitch) -> Interval {
        let steps = to.diatonic() - from.diatonic();
        let semitones = to.midi() - from.midi();
        let descending = steps < 0 || (steps == 0 && semitones < 0);
        let (steps, semitones) = if descending {
            (-steps, -semitones)
        } else {
            (steps, semitones)
        };
        let size = steps.unsigned_abs() as u16 + 1;
        Interval::new(descending, Some(quality_of(size, semitones)), size)
    }

    /// Octave-reduced form. An octave stays an octave; larger compounds
    /// fold into 1..=7.
    pub fn simple(self) -> Interval {
        let size = if self.size == 8 { 8 } else { simple_class(self.size) };
        Interval { size, ..self }
    }

    /// Signed generic size: descending intervals are negative, and a unison
    /// is always +1.
    pub fn number(self) -> i32 {
        let size = i32::from(self.size);
        if self.descending && self.size > 1 { -size } else { size }
    }

    /// True for this quality and size in either direction, after octave
    /// reduction.
    pub fn is(self, quality: Quality, size: u16) -> bool {
        self.quality == Some(quality) && self.simple().size == size
    }
}

impl fmt::Display for Interval {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.descending {
            f.write_str("-")?;
        }
        if let Some(quality) = self.quality {
            f.write_str(quality.symbol())?;
        }
        write!(f, "{}", self.size)
    }
}

impl FromStr for Interval {
    type Err = IndexError;

    fn from_str(text: &str) -> IndexResult<Self> {
        let invalid = || IndexError::InvalidInterval(text.to_string());
        let (descending, rest) = match text.trim().strip_prefix('-') {
            Some(rest) => (true, rest),
            None => (false, text.trim()),
        };
        let digits_at = rest.find(|c: char| c.is_ascii_digit()).ok_or_else(invalid)?;
        let (symbol, digits) = rest.split_at(digits_at);
        let quality = if symbol.is_empty() {
            None
        } else {
            Some(Quality::from_symbol(symbol).ok_or_else(invalid)?)
        };
        let size: u16 = digits.parse().map_err(|_| invalid())?;
        if size == 0 {
            return Err(invalid());
        }
        Ok(Interval::new(descending, quality, size))
    }
}

impl TryFrom<String> for Interval {
    type Error = IndexError;

    fn try_from(text: String) -> IndexResult<Self> {
        text.parse()
    }
}

impl From<Interval> for String {
    fn from(interval: Interval) -> String {
        interval.to_string()
    }
}

/// A cell of an interval table: a real interval, or `Rest` when either
/// side was resting.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum IntervalCell {
    Interval(Interval),
    Rest,
}

impl IntervalCell {
    pub fn is_rest(&self) -> bool {
        matches!(self, IntervalCell::Rest)
    }

    pub fn interval(&self) -> Option<Interval> {
        match *self {
            IntervalCell::Interval(interval) => Some(interval),
            IntervalCell::Rest => None,
        }
    }
}

impl fmt::Display for IntervalCell {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            IntervalCell::Interval(interval) => write!(f, "{interval}"),
            IntervalCell::Rest => f.write_str(Event::REST_NAME),
        }
    }
}

impl FromStr for IntervalCell {
    type Err = IndexError;

    fn from_str(text: &str) -> IndexResult<Self> {
        if text.trim().eq_ignore_ascii_case(Event::REST_NAME) {
            Ok(IntervalCell::Rest)
        } else {
            text.parse().map(IntervalCell::Interval)
        }
    }
}

impl TryFrom<String> for IntervalCell {
    type Error = IndexError;

    fn try_from(text: String) -> IndexResult<Self> {
        text.parse()
    }
}

impl From<IntervalCell> for String {
    fn from(cell: IntervalCell) -> String {
        cell.to_string()
    }
}

// ── Settings ────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum IntervalSpan {
    Simple,
    #[default]
    Compound,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(default)]
pub struct IntervalSettings {
    #[serde(rename = "simple or compound")]
    pub span: IntervalSpan,
    pub quality: bool,
    pub directed: bool,
}

impl Default for IntervalSettings {
    fn default() -> Self {
        IntervalSettings {
            span: IntervalSpan::Compound,
            quality: false,
            directed: true,
        }
    }
}

impl IntervalSettings {
    /// Settings the dissonance family needs: simple, with quality, directed.
    pub fn for_dissonance() -> Self {
        IntervalSettings {
            span: IntervalSpan::Simple,
            quality: true,
            directed: true,
        }
    }

    /// Everything kept: compound, with quality, directed. Any other form can
    /// be rendered from a table measured with these settings.
    pub fn full() -> Self {
        IntervalSettings {
            span: IntervalSpan::Compound,
            quality: true,
            directed: true,
        }
    }

    /// Reduce a full interval to the form these settings ask for.
    pub fn render(&self, interval: Interval) -> Interval {
        let mut out = match self.span {
            IntervalSpan::Simple => interval.simple(),
            IntervalSpan::Compound => interval,
        };
        if !self.quality {
            out.quality = None;
        }
        if !self.directed {
            out.descending = false;
        }
        out
    }

    /// Interval from `from` to `to`, or `Rest` if either is silent.
    pub fn measure(&self, from: &Event, to: &Event) -> IntervalCell {
        match (from.lowest_pitch(), to.lowest_pitch()) {
            (Some(a), Some(b)) => IntervalCell::Interval(self.render(Interval::between(a, b))),
            _ => IntervalCell::Rest,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(default)]
pub struct HorizontalSettings {
    #[serde(flatten)]
    pub interval: IntervalSettings,
    #[serde(rename = "horiz_attach_later")]
    pub attach_later: bool,
}

impl Default for HorizontalSettings {
    fn default() -> Self {
        HorizontalSettings {
            interval: IntervalSettings::default(),
            attach_later: true,
        }
    }
}

// ── Indexers ────────────────────────────────────────────────────────────

/// Vertical intervals between every voice pair of a note/rest table.
pub struct IntervalIndexer<'a> {
    notes: &'a EventTable<Event>,
    settings: IntervalSettings,
}

impl<'a> IntervalIndexer<'a> {
    pub fn new(notes: &'a EventTable<Event>, settings: IntervalSettings) -> Self {
        IntervalIndexer { notes, settings }
    }
}

impl Indexer for IntervalIndexer<'_> {
    type Value = IntervalCell;
    const KIND: IndexerKind = IndexerKind::VerticalInterval;
    const CONTRACT: Contract = Contract::new(Strategy::Pairwise, AlignPolicy::Strict);

    fn run(&self, exec: &Execution) -> IndexResult<EventTable<IntervalCell>> {
        log_started(Self::KIND, &Self::CONTRACT);
        let settings = self.settings;
        let table = apply_pairwise(self.notes, exec, |upper, lower| {
            Some(settings.measure(lower, upper))
        })?;
        log_finished(Self::KIND, &Self::CONTRACT, &table);
        Ok(table)
    }
}

/// Melodic intervals between consecutive events of each voice.
pub struct HorizontalIntervalIndexer<'a> {
    notes: &'a EventTable<Event>,
    settings: HorizontalSettings,
}

impl<'a> HorizontalIntervalIndexer<'a> {
    pub fn new(notes: &'a EventTable<Event>, settings: HorizontalSettings) -> Self {
        HorizontalIntervalIndexer { notes, settings }
    }
}

impl Indexer for HorizontalIntervalIndexer<'_> {
    type Value = IntervalCell;
    const KIND: IndexerKind = IndexerKind::HorizontalInterval;
    const CONTRACT: Contract = Contract::new(Strategy::Columnwise, AlignPolicy::Strict);

    fn run(&self, exec: &Execution) -> IndexResult<EventTable<IntervalCell>> {
        log_started(Self::KIND, &Self::CONTRACT);
        let settings = self.settings;
        let table = apply_columnwise(Self::KIND, self.notes, exec, |column| {
            let rows: Vec<usize> = column.present_rows().collect();
            let mut cells = vec![None; column.cells.len()];
            for pair in rows.windows(2) {
                let (earlier, later) = (pair[0], pair[1]);
                if let (Some(from), Some(to)) = (&column.cells[earlier], &column.cells[later]) {
                    let target = if settings.attach_later { later } else { earlier };
                    cells[target] = Some(settings.interval.measure(from, to));
                }
            }
            Ok(cells)
        })?;
        log_finished(Self::KIND, &Self::CONTRACT, &table);
        Ok(table)
    }
}

/// Re-renders an interval table measured with `IntervalSettings::full()`
/// into another form, cell by cell. Rests and absent cells are kept as they
/// are, so the output has the input's shape and presence pattern.
pub struct IntervalRenderIndexer<'a> {
    intervals: &'a EventTable<IntervalCell>,
    settings: IntervalSettings,
}

impl<'a> IntervalRenderIndexer<'a> {
    pub fn new(intervals: &'a EventTable<IntervalCell>, settings: IntervalSettings) -> Self {
        IntervalRenderIndexer {
            intervals,
            settings,
        }
    }
}

impl Indexer for IntervalRenderIndexer<'_> {
    type Value = IntervalCell;
    const KIND: IndexerKind = IndexerKind::IntervalRender;
    const CONTRACT: Contract = Contract::new(Strategy::Cellwise, AlignPolicy::Strict);

    fn run(&self, exec: &Execution) -> IndexResult<EventTable<IntervalCell>> {
        log_started(Self::KIND, &Self::CONTRACT);
        let settings = self.settings;
        let table = apply_cellwise(self.intervals, exec, |cell| {
            cell.map(|cell| match *cell {
                IntervalCell::Interval(interval) => {
                    IntervalCell::Interval(settings.render(interval))
                }
                IntervalCell::Rest => IntervalCell::Rest,
            })
        })?;
        log_finished(Self::KIND, &Self::CONTRACT, &table);
        Ok(table)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::noterest::NoteRestIndexer;
    use crate::score::Part;
    use crate::table::ColumnLabel;

    fn iv(from: &str, to: &str) -> Interval {
        Interval::between(from.parse().unwrap(), to.parse().unwrap())
    }

    fn notes(parts: &[Part]) -> EventTable<Event> {
        NoteRestIndexer::new(parts).run(&Execution::Serial).unwrap()
    }

    #[test]
    fn test_interval_names() {
        assert_eq!(iv("C4", "E4").to_string(), "M3");
        assert_eq!(iv("E4", "C4").to_string(), "-M3");
        assert_eq!(iv("C4", "G4").to_string(), "P5");
        assert_eq!(iv("F4", "B4").to_string(), "A4");
        assert_eq!(iv("B3", "F4").to_string(), "d5");
        assert_eq!(iv("E4", "C5").to_string(), "m6");
        assert_eq!(iv("C4", "C4").to_string(), "P1");
        assert_eq!(iv("C4", "C#4").to_string(), "A1");
        assert_eq!(iv("C4", "Cb4").to_string(), "-A1");
        assert_eq!(iv("C3", "E4").to_string(), "M10");
        assert_eq!(iv("C3", "C5").to_string(), "P15");
    }

    #[test]
    fn test_simple_reduction() {
        assert_eq!(iv("C3", "E4").simple().to_string(), "M3");
        assert_eq!(iv("C4", "C5").simple().to_string(), "P8");
        assert_eq!(iv("C3", "C5").simple().to_string(), "P1");
        assert_eq!(iv("G4", "D3").simple().to_string(), "-P4");
    }

    #[test]
    fn test_number_is_signed_size() {
        assert_eq!(iv("D4", "C4").number(), -2);
        assert_eq!(iv("C4", "A4").number(), 6);
        assert_eq!(iv("C4", "C4").number(), 1);
        assert_eq!(iv("C4", "Cb4").number(), 1);
    }

    #[test]
    fn test_interval_parse_round_trip() {
        for name in ["M3", "-P4", "AA6", "dd7", "5", "-10"] {
            let parsed: Interval = name.parse().unwrap();
            assert_eq!(parsed.to_string(), name);
        }
        assert!("X3".parse::<Interval>().is_err());
        assert!("M".parse::<Interval>().is_err());
    }

    #[test]
    fn test_settings_render() {
        let full = iv("E5", "C4");
        let plain = IntervalSettings::default().render(full);
        assert_eq!(plain.to_string(), "-10");
        let undirected = IntervalSettings {
            span: IntervalSpan::Simple,
            quality: true,
            directed: false,
        };
        assert_eq!(undirected.render(full).to_string(), "M3");
    }

    #[test]
    fn test_settings_json_keys() {
        let settings: IntervalSettings =
            serde_json::from_str(r#"{"simple or compound": "simple", "quality": true}"#).unwrap();
        assert_eq!(settings.span, IntervalSpan::Simple);
        assert!(settings.quality);
        assert!(settings.directed, "missing keys keep their defaults");

        let horizontal: HorizontalSettings =
            serde_json::from_str(r#"{"horiz_attach_later": false, "quality": true}"#).unwrap();
        assert!(!horizontal.attach_later);
        assert!(horizontal.interval.quality);
    }

    #[test]
    fn test_vertical_pair_direction() {
        let parts = vec![
            Part::parse("Upper", &[(0.0, "E4"), (1.0, "C4")]).unwrap(),
            Part::parse("Lower", &[(0.0, "C4"), (1.0, "E4")]).unwrap(),
        ];
        let settings = IntervalSettings {
            quality: true,
            ..IntervalSettings::default()
        };
        let table = IntervalIndexer::new(&notes(&parts), settings)
            .run(&Execution::Serial)
            .unwrap();
        assert_eq!(table.labels(), &[ColumnLabel::Pair(0, 1)]);
        let names: Vec<String> = table.column(0).iter().map(|c| c.unwrap().to_string()).collect();
        assert_eq!(names, vec!["M3", "-M3"]);
    }

    #[test]
    fn test_vertical_rest_propagates() {
        let parts = vec![
            Part::parse("Upper", &[(0.0, "G4"), (1.0, "Rest"), (2.0, "A4")]).unwrap(),
            Part::parse("Lower", &[(0.0, "C4"), (2.0, "D4")]).unwrap(),
        ];
        let table = IntervalIndexer::new(&notes(&parts), IntervalSettings::default())
            .run(&Execution::Serial)
            .unwrap();
        assert_eq!(table.get(1, 0), Some(&IntervalCell::Rest));
        assert_eq!(table.get(2, 0).unwrap().to_string(), "5");
    }

    #[test]
    fn test_vertical_sustains_held_voice() {
        let parts = vec![
            Part::parse("Upper", &[(0.0, "C5"), (1.0, "B4"), (2.0, "A4")]).unwrap(),
            Part::parse("Lower", &[(0.0, "F4")]).unwrap(),
            Part::parse("Bass", &[(0.0, "F3"), (2.0, "D3")]).unwrap(),
        ];
        let table = IntervalIndexer::new(&notes(&parts), IntervalSettings::for_dissonance())
            .run(&Execution::parallel(2))
            .unwrap();
        let upper_lower = table.column_by_label(&ColumnLabel::Pair(0, 1)).unwrap();
        let names: Vec<String> = upper_lower.iter().map(|c| c.unwrap().to_string()).collect();
        assert_eq!(names, vec!["P5", "A4", "M3"]);
        // Voice 1 never moves after 0.0, and voice 2 only at 2.0.
        let lower_bass = table.column_by_label(&ColumnLabel::Pair(1, 2)).unwrap();
        assert_eq!(lower_bass[1], None);
        assert_eq!(lower_bass[2].unwrap().to_string(), "m3");
    }

    #[test]
    fn test_render_matches_direct_measurement() {
        let parts = vec![
            Part::parse("Upper", &[(0.0, "E5"), (1.0, "Rest"), (2.0, "A4"), (3.0, "G4")]).unwrap(),
            Part::parse("Lower", &[(0.0, "C4"), (2.0, "D4")]).unwrap(),
        ];
        let table = notes(&parts);
        let full = IntervalIndexer::new(&table, IntervalSettings::full())
            .run(&Execution::Serial)
            .unwrap();
        let names: Vec<String> = full.column(0).iter().map(|c| c.unwrap().to_string()).collect();
        assert_eq!(names, vec!["M10", "Rest", "P5", "P4"]);

        let undirected = IntervalSettings {
            directed: false,
            ..IntervalSettings::for_dissonance()
        };
        let forms = [
            IntervalSettings::default(),
            IntervalSettings::for_dissonance(),
            undirected,
        ];
        for settings in forms {
            let rendered = IntervalRenderIndexer::new(&full, settings)
                .run(&Execution::parallel(2))
                .unwrap();
            let direct = IntervalIndexer::new(&table, settings)
                .run(&Execution::Serial)
                .unwrap();
            assert_eq!(rendered, direct);
        }
    }

    #[test]
    fn test_horizontal_attach_later_and_rest() {
        let parts = vec![
            Part::parse("Tenor", &[(0.0, "C4"), (1.0, "D4"), (2.0, "Rest"), (3.0, "B3")]).unwrap(),
        ];
        let table = notes(&parts);
        let later = HorizontalIntervalIndexer::new(&table, HorizontalSettings::default())
            .run(&Execution::Serial)
            .unwrap();
        let cells: Vec<Option<String>> = later
            .column(0)
            .iter()
            .map(|c| c.map(|c| c.to_string()))
            .collect();
        assert_eq!(
            cells,
            vec![None, Some("2".to_string()), Some("Rest".to_string()), Some("Rest".to_string())]
        );

        let earlier_settings = HorizontalSettings {
            attach_later: false,
            ..HorizontalSettings::default()
        };
        let earlier = HorizontalIntervalIndexer::new(&table, earlier_settings)
            .run(&Execution::Serial)
            .unwrap();
        assert_eq!(earlier.get(0, 0).unwrap().to_string(), "2");
        assert_eq!(earlier.get(3, 0), None);
    }

    #[test]
    fn test_horizontal_descending_step() {
        let parts = vec![Part::parse("Bass", &[(0.0, "D3"), (2.0, "C3")]).unwrap()];
        let table = HorizontalIntervalIndexer::new(&notes(&parts), HorizontalSettings::default())
            .run(&Execution::Serial)
            .unwrap();
        assert_eq!(table.get(1, 0).unwrap().interval().unwrap().number(), -2);
    }
}
