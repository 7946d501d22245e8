// Dissonance figure classifiers: suspension, neighbour note, passing note
// and nota cambiata.
//
// All four share one windowed indexer, `FigureIndexer<R>`, parameterized by
// a `FigureRule` that supplies the window size and a decision table. The
// window slides over the shared offset axis of four aligned inputs:
//
//   intervals     forward-filled vertical intervals, one column per pair
//   dissonances   output of the dissonance indexer (same columns)
//   horizontal    melodic interval arriving at each onset, one per voice
//   beat_strength metric strength of each onset, one per voice
//
// Window row 0 is the preparation, row 1 the candidate dissonance (the
// focus), row 2 the resolution, and for the cambiata row 3 the note after
// the resolution. A voice with no onset at a row is holding its note, so its
// melodic motion there counts as a unison (1). Beat strength at a row is the
// upper voice's if it has an onset there, otherwise the lower voice's.
//
// Each pair column gets a `Classification`: a figure attributed to one voice
// ("0:SUSP"), the ambiguous `Other` ("o"), or `NoDissonance` ("") when the
// focus row is consonant, when a rest blocks the analysis, or at boundary
// rows that cannot be the focus of a full window.

use std::fmt;
use std::marker::PhantomData;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::align::AlignPolicy;
use crate::error::{IndexError, IndexResult};
use crate::exec::Execution;
use crate::indexer::{
    Aligned, Contract, Indexer, IndexerKind, Strategy, Window, WindowSpec, apply_windowed,
    log_finished, log_started, pair_labels,
};
use crate::interval::IntervalCell;
use crate::table::EventTable;

/// Signed vertical interval numbers that count as consonant preparations.
const CONSONANT_NUMBERS: [i32; 9] = [8, 6, 5, 3, 1, -3, -5, -6, -8];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Figure {
    Suspension,
    FakeSuspension,
    UpperNeighbour,
    LowerNeighbour,
    RisingPassing,
    DescendingPassing,
    NotaCambiata,
}

impl Figure {
    pub const ALL: [Figure; 7] = [
        Figure::Suspension,
        Figure::FakeSuspension,
        Figure::UpperNeighbour,
        Figure::LowerNeighbour,
        Figure::RisingPassing,
        Figure::DescendingPassing,
        Figure::NotaCambiata,
    ];

    pub fn code(self) -> &'static str {
        match self {
            Figure::Suspension => "SUSP",
            Figure::FakeSuspension => "FSUS",
            Figure::UpperNeighbour => "UN",
            Figure::LowerNeighbour => "LN",
            Figure::RisingPassing => "RP",
            Figure::DescendingPassing => "DP",
            Figure::NotaCambiata => "NC",
        }
    }

    pub fn from_code(code: &str) -> Option<Figure> {
        Figure::ALL.into_iter().find(|figure| figure.code() == code)
    }
}

impl fmt::Display for Figure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum Classification {
    Figure { voice: usize, figure: Figure },
    /// Dissonant, but no decision-table entry matched.
    Other,
    NoDissonance,
}

impl Classification {
    pub const OTHER_LABEL: &'static str = "o";
    pub const VOICE_SEPARATOR: char = ':';

    pub fn is_dissonant(&self) -> bool {
        !matches!(self, Classification::NoDissonance)
    }
}

impl fmt::Display for Classification {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Classification::Figure { voice, figure } => {
                write!(f, "{voice}{}{figure}", Classification::VOICE_SEPARATOR)
            }
            Classification::Other => f.write_str(Classification::OTHER_LABEL),
            Classification::NoDissonance => Ok(()),
        }
    }
}

impl FromStr for Classification {
    type Err = IndexError;

    fn from_str(text: &str) -> IndexResult<Self> {
        match text {
            "" => Ok(Classification::NoDissonance),
            Classification::OTHER_LABEL => Ok(Classification::Other),
            _ => {
                let invalid =
                    || IndexError::shape("classification", format!("unknown label '{text}'"));
                let (voice, code) = text
                    .split_once(Classification::VOICE_SEPARATOR)
                    .ok_or_else(invalid)?;
                Ok(Classification::Figure {
                    voice: voice.parse().map_err(|_| invalid())?,
                    figure: Figure::from_code(code).ok_or_else(invalid)?,
                })
            }
        }
    }
}

impl TryFrom<String> for Classification {
    type Error = IndexError;

    fn try_from(text: String) -> IndexResult<Self> {
        text.parse()
    }
}

impl From<Classification> for String {
    fn from(classification: Classification) -> String {
        classification.to_string()
    }
}

/// An interval reduced to what the decision tables compare: its signed
/// number, or a rest.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Span {
    Rest,
    Number(i32),
}

impl Span {
    pub const HELD: Span = Span::Number(1);

    fn of(cell: &IntervalCell) -> Span {
        match cell {
            IntervalCell::Interval(interval) => Span::Number(interval.number()),
            IntervalCell::Rest => Span::Rest,
        }
    }

    fn number(self) -> Option<i32> {
        match self {
            Span::Number(n) => Some(n),
            Span::Rest => None,
        }
    }
}

/// The four aligned tables every figure classifier reads.
#[derive(Debug, Clone, Copy)]
pub struct FigureInputs<'a> {
    pub intervals: &'a EventTable<IntervalCell>,
    pub dissonances: &'a EventTable<IntervalCell>,
    pub horizontal: &'a EventTable<IntervalCell>,
    pub beat_strength: &'a EventTable<f64>,
}

impl FigureInputs<'_> {
    fn validate(&self, kind: IndexerKind, contract: &Contract) -> IndexResult<Vec<(usize, usize)>> {
        contract.check_inputs(
            kind,
            &[
                self.intervals as &dyn Aligned,
                self.dissonances,
                self.horizontal,
                self.beat_strength,
            ],
        )?;
        if self.intervals.labels() != self.dissonances.labels() {
            return Err(IndexError::shape(
                kind.name(),
                "interval and dissonance tables have different pair columns",
            ));
        }
        if self.horizontal.width() != self.beat_strength.width() {
            return Err(IndexError::shape(
                kind.name(),
                format!(
                    "{} horizontal columns but {} beat-strength columns",
                    self.horizontal.width(),
                    self.beat_strength.width()
                ),
            ));
        }
        let pairs = pair_labels(kind, self.intervals.labels())?;
        let beyond = pairs
            .iter()
            .find(|&&(_, lower)| lower >= self.horizontal.width());
        if let Some(&(upper, lower)) = beyond {
            return Err(IndexError::shape(
                kind.name(),
                format!(
                    "pair {upper},{lower} refers to a voice beyond the {} per-voice columns",
                    self.horizontal.width()
                ),
            ));
        }
        Ok(pairs)
    }
}

/// One voice pair seen through one window.
pub struct PairWindow<'w, 'a> {
    inputs: &'w FigureInputs<'a>,
    window: Window,
    column: usize,
    pub upper: usize,
    pub lower: usize,
}

impl PairWindow<'_, '_> {
    /// Melodic motion of `voice` arriving at window row `k`.
    pub fn melodic(&self, voice: usize, k: usize) -> Span {
        self.inputs
            .horizontal
            .get(self.window.row(k), voice)
            .map_or(Span::HELD, Span::of)
    }

    /// Vertical interval of the pair at window row `k`.
    pub fn vertical(&self, k: usize) -> Option<Span> {
        self.inputs
            .intervals
            .get(self.window.row(k), self.column)
            .map(Span::of)
    }

    /// The dissonant interval at window row `k`, if any.
    pub fn dissonance(&self, k: usize) -> Option<Span> {
        self.inputs
            .dissonances
            .get(self.window.row(k), self.column)
            .map(Span::of)
    }

    pub fn beat(&self, k: usize) -> Option<f64> {
        let row = self.window.row(k);
        let strengths = self.inputs.beat_strength;
        strengths
            .get(row, self.upper)
            .or_else(|| strengths.get(row, self.lower))
            .copied()
    }

    fn upper_has(&self, figure: Figure) -> Classification {
        Classification::Figure {
            voice: self.upper,
            figure,
        }
    }

    fn lower_has(&self, figure: Figure) -> Classification {
        Classification::Figure {
            voice: self.lower,
            figure,
        }
    }
}

fn greater(a: Option<f64>, b: Option<f64>) -> bool {
    matches!((a, b), (Some(a), Some(b)) if a > b)
}

fn less(a: Option<f64>, b: Option<f64>) -> bool {
    matches!((a, b), (Some(a), Some(b)) if a < b)
}

fn consonant(number: Option<i32>) -> bool {
    number.is_some_and(|n| CONSONANT_NUMBERS.contains(&n))
}

fn octave_or_unison(number: Option<i32>) -> bool {
    matches!(number, Some(1 | 8 | -8))
}

/// A decision table over one pair window.
pub trait FigureRule {
    const KIND: IndexerKind;
    const WINDOW: WindowSpec;

    fn classify(window: &PairWindow<'_, '_>) -> Classification;
}

// ── Decision tables ─────────────────────────────────────────────────────
//
// Variable names follow the usual counterpoint shorthand:
//   a, b  upper voice's motion into and out of the dissonance
//   x, y  lower voice's motion into and out of the dissonance
//   d     the dissonant interval, z the vertical interval after it
//   p, c  the vertical interval before it
//   bs1..bs3  beat strength at window rows 0..2

pub struct SuspensionRule;

impl FigureRule for SuspensionRule {
    const KIND: IndexerKind = IndexerKind::Suspension;
    const WINDOW: WindowSpec = WindowSpec::TRIPLE;

    fn classify(w: &PairWindow<'_, '_>) -> Classification {
        let Some(dissonance) = w.dissonance(1) else {
            return Classification::NoDissonance;
        };
        let (a, b) = (w.melodic(w.upper, 1), w.melodic(w.upper, 2));
        let (x, y) = (w.melodic(w.lower, 1), w.melodic(w.lower, 2));
        let after = w.vertical(2);
        // The agent need not be sounding at the preparation, so only the
        // dissonance and resolution rows are checked for rests.
        if [Some(b), Some(dissonance), Some(y), after].contains(&Some(Span::Rest)) {
            return Classification::NoDissonance;
        }
        let (a, b, x, y) = (a.number(), b.number(), x.number(), y.number());
        let (d, z) = (dissonance.number(), after.and_then(Span::number));
        let (bs1, bs2, bs3) = (w.beat(0), w.beat(1), w.beat(2));
        let strong_dissonance = greater(bs2, bs3);

        // Lower voice suspended against a moving upper voice.
        let upper_resolves = match (b, d, z) {
            (Some(b), Some(d), Some(z)) => (b >= 1 && d + b == z) || d + b + 2 == z,
            _ => false,
        };
        if x == Some(1) && upper_resolves && strong_dissonance {
            return w.lower_has(Figure::Suspension);
        }

        // Fourth on a weak beat that looks like a suspension but is struck.
        let fake = matches!(a, Some(2 | -2))
            && octave_or_unison(x)
            && d == Some(4)
            && octave_or_unison(y)
            && ((b == Some(1) && z == Some(4) && greater(bs1, bs2) && greater(bs3, bs2))
                || (b == Some(-2) && z == Some(3) && greater(bs1, bs2) && bs3 == bs2));
        if fake {
            return w.upper_has(Figure::FakeSuspension);
        }

        // Upper voice suspended; the lower voice may move at the resolution,
        // including the 9-8 case and octave leaps in the bass.
        let lower_resolves = match (y, d, z) {
            (Some(y), Some(d), Some(z)) => {
                (y >= 1 && (d - y == z || (d == 2 && z == 8)))
                    || d - y - 2 == z
                    || ((y == 8 || y == -8) && d - 1 == z)
            }
            _ => false,
        };
        if a == Some(1) && lower_resolves && strong_dissonance {
            return w.upper_has(Figure::Suspension);
        }
        Classification::Other
    }
}

pub struct NeighbourRule;

impl FigureRule for NeighbourRule {
    const KIND: IndexerKind = IndexerKind::NeighbourNote;
    const WINDOW: WindowSpec = WindowSpec::TRIPLE;

    fn classify(w: &PairWindow<'_, '_>) -> Classification {
        if w.dissonance(1).is_none() {
            return Classification::NoDissonance;
        }
        let (a, x) = (w.melodic(w.upper, 1), w.melodic(w.lower, 1));
        if a == Span::Rest || x == Span::Rest {
            return Classification::NoDissonance;
        }
        // Accented dissonances are not neighbour notes.
        let (bs1, bs2, bs3) = (w.beat(0), w.beat(1), w.beat(2));
        if less(bs1, bs2) || less(bs3, bs2) {
            return Classification::NoDissonance;
        }
        let (a, x) = (a.number(), x.number());
        let (b, y) = (w.melodic(w.upper, 2).number(), w.melodic(w.lower, 2).number());
        let prepared = consonant(w.vertical(0).and_then(Span::number));

        match (a, x, b, y) {
            (Some(2), Some(1), Some(-2), _) if prepared => w.upper_has(Figure::UpperNeighbour),
            (Some(-2), Some(1), Some(2), _) if prepared => w.upper_has(Figure::LowerNeighbour),
            (Some(1), Some(2), _, Some(-2)) if prepared => w.lower_has(Figure::UpperNeighbour),
            (Some(1), Some(-2), _, Some(2)) if prepared => w.lower_has(Figure::LowerNeighbour),
            _ => Classification::Other,
        }
    }
}

pub struct PassingRule;

impl FigureRule for PassingRule {
    const KIND: IndexerKind = IndexerKind::PassingNote;
    const WINDOW: WindowSpec = WindowSpec::TRIPLE;

    fn classify(w: &PairWindow<'_, '_>) -> Classification {
        if w.dissonance(1).is_none() {
            return Classification::NoDissonance;
        }
        let (a, x) = (w.melodic(w.upper, 1), w.melodic(w.lower, 1));
        let before = w.vertical(0);
        if a == Span::Rest || x == Span::Rest || before == Some(Span::Rest) {
            return Classification::Other;
        }
        let (a, x) = (a.number(), x.number());
        let (b, y) = (w.melodic(w.upper, 2).number(), w.melodic(w.lower, 2).number());
        let prepared = consonant(before.and_then(Span::number));

        match (a, x, b, y) {
            (Some(-2), Some(1), Some(-2), _) if prepared => w.upper_has(Figure::DescendingPassing),
            (Some(2), Some(1), Some(2), _) if prepared => w.upper_has(Figure::RisingPassing),
            (Some(1), Some(-2), _, Some(-2)) if prepared => w.lower_has(Figure::DescendingPassing),
            (Some(1), Some(2), _, Some(2)) if prepared => w.lower_has(Figure::RisingPassing),
            _ => Classification::Other,
        }
    }
}

pub struct CambiataRule;

impl FigureRule for CambiataRule {
    const KIND: IndexerKind = IndexerKind::NotaCambiata;
    const WINDOW: WindowSpec = WindowSpec::QUADRUPLE;

    fn classify(w: &PairWindow<'_, '_>) -> Classification {
        if w.dissonance(1).is_none() {
            return Classification::NoDissonance;
        }
        let upper: Vec<Option<i32>> = (1..=3).map(|k| w.melodic(w.upper, k).number()).collect();
        let lower: Vec<Option<i32>> = (1..=3).map(|k| w.melodic(w.lower, k).number()).collect();
        let weak = w.beat(1).is_some_and(|strength| strength < 0.5);
        // Step down onto the dissonance, leap down a third, step back up.
        let shape = [Some(-2), Some(-3), Some(2)];
        let held = [Some(1), Some(1)];

        if weak && upper == shape && lower[..2] == held {
            w.upper_has(Figure::NotaCambiata)
        } else if weak && lower == shape && upper[..2] == held {
            w.lower_has(Figure::NotaCambiata)
        } else {
            Classification::Other
        }
    }
}

/// Windowed indexer applying rule `R` to every voice pair.
pub struct FigureIndexer<'a, R> {
    inputs: FigureInputs<'a>,
    pairs: Vec<(usize, usize)>,
    rule: PhantomData<fn() -> R>,
}

pub type SuspensionIndexer<'a> = FigureIndexer<'a, SuspensionRule>;
pub type NeighbourNoteIndexer<'a> = FigureIndexer<'a, NeighbourRule>;
pub type PassingNoteIndexer<'a> = FigureIndexer<'a, PassingRule>;
pub type NotaCambiataIndexer<'a> = FigureIndexer<'a, CambiataRule>;

impl<'a, R: FigureRule> FigureIndexer<'a, R> {
    /// Validates axes, columns, the forward-fill precondition and the
    /// minimum window length up front.
    pub fn new(inputs: FigureInputs<'a>) -> IndexResult<Self> {
        let pairs = inputs.validate(R::KIND, &Self::CONTRACT)?;
        Ok(FigureIndexer {
            inputs,
            pairs,
            rule: PhantomData,
        })
    }
}

impl<R: FigureRule> Indexer for FigureIndexer<'_, R> {
    type Value = Classification;
    const KIND: IndexerKind = R::KIND;
    const CONTRACT: Contract = Contract::new(Strategy::Windowed(R::WINDOW), AlignPolicy::Sustain);

    fn run(&self, exec: &Execution) -> IndexResult<EventTable<Classification>> {
        log_started(Self::KIND, &Self::CONTRACT);
        let intervals = self.inputs.intervals;
        let table = apply_windowed(
            Self::KIND,
            intervals.offsets(),
            intervals.labels().to_vec(),
            R::WINDOW,
            Classification::NoDissonance,
            exec,
            |window| {
                self.pairs
                    .iter()
                    .enumerate()
                    .map(|(column, &(upper, lower))| {
                        R::classify(&PairWindow {
                            inputs: &self.inputs,
                            window: *window,
                            column,
                            upper,
                            lower,
                        })
                    })
                    .collect()
            },
        )?;
        log_finished(Self::KIND, &Self::CONTRACT, &table);
        Ok(table)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dissonance::{DissonanceIndexer, DissonanceSettings};
    use crate::interval::{
        HorizontalIntervalIndexer, HorizontalSettings, IntervalIndexer, IntervalSettings,
    };
    use crate::meter::{BeatStrengthIndexer, MeterMap};
    use crate::noterest::NoteRestIndexer;
    use crate::score::Part;

    /// Owned inputs for a figure classifier, built the way the pipeline
    /// builds them.
    struct Fixture {
        intervals: EventTable<IntervalCell>,
        dissonances: EventTable<IntervalCell>,
        horizontal: EventTable<IntervalCell>,
        beats: EventTable<f64>,
    }

    impl Fixture {
        fn new(voices: &[&[(f64, &str)]]) -> Self {
            let parts: Vec<Part> = voices
                .iter()
                .enumerate()
                .map(|(i, events)| Part::parse(format!("v{i}"), events).unwrap())
                .collect();
            let exec = Execution::Serial;
            let notes = NoteRestIndexer::new(&parts).run(&exec).unwrap();
            let intervals = IntervalIndexer::new(&notes, IntervalSettings::for_dissonance())
                .run(&exec)
                .unwrap()
                .forward_fill();
            let dissonances = DissonanceIndexer::new(&intervals, DissonanceSettings::default())
                .unwrap()
                .run(&exec)
                .unwrap();
            let horizontal = HorizontalIntervalIndexer::new(&notes, HorizontalSettings::default())
                .run(&exec)
                .unwrap();
            let meters = MeterMap::default();
            let beats = BeatStrengthIndexer::new(&notes, &meters).run(&exec).unwrap();
            Fixture {
                intervals,
                dissonances,
                horizontal,
                beats,
            }
        }

        fn inputs(&self) -> FigureInputs<'_> {
            FigureInputs {
                intervals: &self.intervals,
                dissonances: &self.dissonances,
                horizontal: &self.horizontal,
                beat_strength: &self.beats,
            }
        }

        fn labels<R: FigureRule>(&self) -> Vec<String> {
            let table = FigureIndexer::<R>::new(self.inputs())
                .unwrap()
                .run(&Execution::Serial)
                .unwrap();
            table
                .column(0)
                .iter()
                .map(|cell| cell.map(|c| c.to_string()).unwrap_or_default())
                .collect()
        }
    }

    #[test]
    fn test_classification_labels() {
        let upper_neighbour = Classification::Figure {
            voice: 0,
            figure: Figure::UpperNeighbour,
        };
        assert_eq!(upper_neighbour.to_string(), "0:UN");
        assert_eq!("0:UN".parse::<Classification>().unwrap(), upper_neighbour);
        assert_eq!(Classification::Other.to_string(), "o");
        assert_eq!("".parse::<Classification>().unwrap(), Classification::NoDissonance);
        assert!("2:XX".parse::<Classification>().is_err());
    }

    #[test]
    fn test_upper_voice_suspension() {
        // 7-6 over a descending bass: the upper C5 is held while the bass
        // moves to D4, then resolves down to B4.
        let fixture = Fixture::new(&[&[(0.0, "C5"), (3.0, "B4")], &[(0.0, "E4"), (2.0, "D4")]]);
        assert_eq!(fixture.labels::<SuspensionRule>(), vec!["", "0:SUSP", ""]);
    }

    #[test]
    fn test_upper_neighbour() {
        let fixture = Fixture::new(&[&[(0.0, "E4"), (1.0, "F4"), (2.0, "E4")], &[(0.0, "C4")]]);
        assert_eq!(fixture.labels::<NeighbourRule>(), vec!["", "0:UN", ""]);
    }

    #[test]
    fn test_accented_neighbour_rejected() {
        // The dissonance lands on beat three, stronger than what follows.
        let fixture = Fixture::new(&[&[(1.0, "E4"), (2.0, "F4"), (3.0, "E4")], &[(1.0, "C4")]]);
        assert_eq!(fixture.labels::<NeighbourRule>(), vec!["", "", ""]);
    }

    #[test]
    fn test_descending_passing_in_upper_voice() {
        let fixture = Fixture::new(&[&[(0.0, "C5"), (1.0, "B4"), (2.0, "A4")], &[(0.0, "F4")]]);
        assert_eq!(fixture.labels::<PassingRule>(), vec!["", "0:DP", ""]);
    }

    #[test]
    fn test_rising_passing_in_lower_voice() {
        let fixture = Fixture::new(&[&[(0.0, "G4")], &[(0.0, "C4"), (1.0, "D4"), (2.0, "E4")]]);
        assert_eq!(fixture.labels::<PassingRule>(), vec!["", "1:RP", ""]);
    }

    #[test]
    fn test_cambiata() {
        let fixture = Fixture::new(&[
            &[(0.0, "E5"), (1.0, "D5"), (2.0, "B4"), (3.0, "C5")],
            &[(0.0, "C4")],
        ]);
        assert_eq!(fixture.labels::<CambiataRule>(), vec!["", "0:NC", "", ""]);
    }

    #[test]
    fn test_unrecognized_dissonance_is_other() {
        // Leap into a seventh: every table reports the ambiguous marker.
        let fixture = Fixture::new(&[&[(0.0, "E4"), (1.0, "B4"), (2.0, "C5")], &[(0.0, "C4")]]);
        assert_eq!(fixture.labels::<SuspensionRule>()[1], "o");
        assert_eq!(fixture.labels::<NeighbourRule>()[1], "o");
        assert_eq!(fixture.labels::<PassingRule>()[1], "o");
    }

    #[test]
    fn test_rest_at_resolution_blocks_suspension() {
        let fixture = Fixture::new(&[
            &[(0.0, "C5"), (3.0, "Rest")],
            &[(0.0, "E4"), (2.0, "D4")],
        ]);
        assert_eq!(fixture.labels::<SuspensionRule>(), vec!["", "", ""]);
    }

    #[test]
    fn test_boundary_rows_are_no_dissonance() {
        // Five offsets, dissonant everywhere: only rows 1..=3 are evaluated.
        let fixture = Fixture::new(&[
            &[(0.0, "D4"), (1.0, "E4"), (2.0, "D4"), (3.0, "E4"), (4.0, "D4")],
            &[(0.0, "C4"), (1.0, "D4"), (2.0, "C4"), (3.0, "D4"), (4.0, "C4")],
        ]);
        let labels = fixture.labels::<SuspensionRule>();
        assert_eq!(labels.len(), 5);
        assert_eq!(labels[0], "");
        assert_eq!(labels[4], "");
        assert!(labels[1..4].iter().all(|label| label == "o"));
    }

    #[test]
    fn test_cambiata_needs_four_offsets() {
        let fixture = Fixture::new(&[&[(0.0, "E4"), (1.0, "F4"), (2.0, "E4")], &[(0.0, "C4")]]);
        let err = NotaCambiataIndexer::new(fixture.inputs()).err().unwrap();
        assert!(matches!(err, IndexError::WindowTooShort { window: 4, offsets: 3, .. }));
    }

    #[test]
    fn test_rejects_misaligned_inputs() {
        let fixture = Fixture::new(&[&[(0.0, "E4"), (1.0, "F4"), (2.0, "E4")], &[(0.0, "C4")]]);
        let other = Fixture::new(&[&[(0.0, "E4"), (2.0, "F4"), (3.0, "E4")], &[(0.0, "C4")]]);
        let mixed = FigureInputs {
            beat_strength: &other.beats,
            ..fixture.inputs()
        };
        let err = SuspensionIndexer::new(mixed).err().unwrap();
        assert!(matches!(err, IndexError::Shape { .. }));
    }

    #[test]
    fn test_requires_forward_filled_intervals() {
        let fixture = Fixture::new(&[&[(0.0, "E4"), (1.0, "F4"), (2.0, "E4")], &[(0.0, "C4")]]);
        let mut columns = fixture.intervals.clone().into_columns();
        columns[0][1] = None;
        let unfilled = EventTable::from_columns(
            fixture.intervals.offsets().to_vec(),
            fixture.intervals.labels().to_vec(),
            columns,
        )
        .unwrap();
        let inputs = FigureInputs {
            intervals: &unfilled,
            ..fixture.inputs()
        };
        let err = NeighbourNoteIndexer::new(inputs).err().unwrap();
        assert!(matches!(err, IndexError::Precondition { .. }));
    }

    #[test]
    fn test_parallel_matches_serial() {
        let fixture = Fixture::new(&[
            &[(0.0, "C5"), (1.0, "B4"), (2.0, "A4"), (3.0, "G4"), (4.0, "A4")],
            &[(0.0, "F4"), (2.0, "F4"), (4.0, "F4")],
            &[(0.0, "F3"), (1.0, "G3"), (2.0, "A3"), (4.0, "D3")],
        ]);
        let indexer = PassingNoteIndexer::new(fixture.inputs()).unwrap();
        let serial = indexer.run(&Execution::Serial).unwrap();
        let parallel = indexer.run(&Execution::parallel(3)).unwrap();
        assert_eq!(serial, parallel);
    }
}
