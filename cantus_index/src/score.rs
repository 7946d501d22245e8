// Score model: pitches, events, parts and pieces.
//
// A `Piece` is a list of `Part`s (one per voice) plus a meter map. Each part
// is a strictly increasing sequence of (offset, event) pairs, where an event
// is a single pitch, a chord, or a rest. Parts carry an optional end offset
// so the last event has a duration.
//
// Pitches are spelled (step + alteration + octave), not bare MIDI numbers:
// interval naming needs the diatonic step to tell an augmented fourth from a
// diminished fifth. MIDI numbers are derived on demand, and MIDI import
// spells black keys with the fixed table in `Pitch::from_midi`.
//
// Pieces load from JSON (see `Piece::from_json_str`) or from a standard MIDI
// file via midi.rs.

use std::fmt;
use std::path::Path;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::{IndexError, IndexResult};
use crate::meter::MeterMap;
use crate::offset::Offset;

/// Diatonic step letter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Step {
    C,
    D,
    E,
    F,
    G,
    A,
    B,
}

impl Step {
    pub const ALL: [Step; 7] = [Step::C, Step::D, Step::E, Step::F, Step::G, Step::A, Step::B];

    /// Position within the octave, C = 0 through B = 6.
    pub fn index(self) -> i32 {
        self as i32
    }

    /// Semitones above C of the natural step.
    pub fn semitones(self) -> i32 {
        match self {
            Step::C => 0,
            Step::D => 2,
            Step::E => 4,
            Step::F => 5,
            Step::G => 7,
            Step::A => 9,
            Step::B => 11,
        }
    }

    pub fn letter(self) -> char {
        match self {
            Step::C => 'C',
            Step::D => 'D',
            Step::E => 'E',
            Step::F => 'F',
            Step::G => 'G',
            Step::A => 'A',
            Step::B => 'B',
        }
    }

    pub fn from_letter(letter: char) -> Option<Step> {
        Step::ALL
            .into_iter()
            .find(|step| step.letter() == letter.to_ascii_uppercase())
    }
}

/// A spelled pitch. Octave numbering follows scientific pitch notation
/// (middle C is C4 = MIDI 60).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Pitch {
    pub step: Step,
    /// Semitone alteration: +1 sharp, -1 flat, up to double accidentals.
    pub alter: i8,
    pub octave: i8,
}

impl Pitch {
    pub fn new(step: Step, alter: i8, octave: i8) -> Self {
        Pitch {
            step,
            alter,
            octave,
        }
    }

    pub fn midi(self) -> i32 {
        (i32::from(self.octave) + 1) * 12 + self.step.semitones() + i32::from(self.alter)
    }

    /// Count of diatonic steps above C0. Interval numbers are differences
    /// of this value.
    pub fn diatonic(self) -> i32 {
        i32::from(self.octave) * 7 + self.step.index()
    }

    /// Spell a MIDI note number, preferring the accidentals common in
    /// modal polyphony (F#, C#, Bb, Eb, Ab).
    pub fn from_midi(number: u8) -> Pitch {
        const SPELLING: [(Step, i8); 12] = [
            (Step::C, 0),
            (Step::C, 1),
            (Step::D, 0),
            (Step::E, -1),
            (Step::E, 0),
            (Step::F, 0),
            (Step::F, 1),
            (Step::G, 0),
            (Step::A, -1),
            (Step::A, 0),
            (Step::B, -1),
            (Step::B, 0),
        ];
        let (step, alter) = SPELLING[usize::from(number % 12)];
        Pitch::new(step, alter, (number / 12) as i8 - 1)
    }
}

impl fmt::Display for Pitch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.step.letter())?;
        let accidental = if self.alter > 0 { '#' } else { 'b' };
        for _ in 0..self.alter.unsigned_abs() {
            write!(f, "{accidental}")?;
        }
        write!(f, "{}", self.octave)
    }
}

impl FromStr for Pitch {
    type Err = IndexError;

    /// Accepts `C4`, `F#3`, `Bb2`, `B-4` and double accidentals. `-` after
    /// the step letter is a flat, so negative octaves cannot be written.
    fn from_str(text: &str) -> IndexResult<Self> {
        let invalid = || IndexError::InvalidPitch(text.to_string());
        let mut chars = text.trim().chars().peekable();
        let step = chars.next().and_then(Step::from_letter).ok_or_else(invalid)?;

        let mut alter: i8 = 0;
        while let Some(&c) = chars.peek() {
            match c {
                '#' => alter += 1,
                'b' | '-' => alter -= 1,
                _ => break,
            }
            chars.next();
            if alter.abs() > 2 {
                return Err(invalid());
            }
        }

        let octave: i8 = chars.collect::<String>().parse().map_err(|_| invalid())?;
        if !(0..=9).contains(&octave) {
            return Err(invalid());
        }
        Ok(Pitch::new(step, alter, octave))
    }
}

impl TryFrom<String> for Pitch {
    type Error = IndexError;

    fn try_from(text: String) -> IndexResult<Self> {
        text.parse()
    }
}

impl From<Pitch> for String {
    fn from(pitch: Pitch) -> String {
        pitch.to_string()
    }
}

/// What a part is doing from one offset until its next offset.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum Event {
    Note(Pitch),
    Chord(Vec<Pitch>),
    Rest,
}

impl Event {
    pub const REST_NAME: &'static str = "Rest";

    pub fn is_rest(&self) -> bool {
        matches!(self, Event::Rest)
    }

    /// The pitch used for interval measurement. A chord stands for its
    /// lowest pitch; a rest (or an empty chord) has none.
    pub fn lowest_pitch(&self) -> Option<Pitch> {
        match self {
            Event::Note(pitch) => Some(*pitch),
            Event::Chord(pitches) => pitches
                .iter()
                .copied()
                .min_by_key(|p| (p.midi(), p.diatonic())),
            Event::Rest => None,
        }
    }
}

impl fmt::Display for Event {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Event::Note(pitch) => write!(f, "{pitch}"),
            Event::Chord(pitches) => {
                let names: Vec<String> = pitches.iter().map(Pitch::to_string).collect();
                write!(f, "[{}]", names.join(" "))
            }
            Event::Rest => f.write_str(Event::REST_NAME),
        }
    }
}

impl FromStr for Event {
    type Err = IndexError;

    /// `Rest`, a single pitch name, or several pitch names separated by
    /// whitespace (optionally bracketed) for a chord.
    fn from_str(text: &str) -> IndexResult<Self> {
        let text = text.trim();
        if text.eq_ignore_ascii_case(Event::REST_NAME) {
            return Ok(Event::Rest);
        }
        let inner = text.trim_start_matches('[').trim_end_matches(']');
        let pitches = inner
            .split_whitespace()
            .map(str::parse)
            .collect::<IndexResult<Vec<Pitch>>>()?;
        match pitches.as_slice() {
            [] => Err(IndexError::InvalidPitch(text.to_string())),
            [single] => Ok(Event::Note(*single)),
            _ => Ok(Event::Chord(pitches)),
        }
    }
}

impl TryFrom<String> for Event {
    type Error = IndexError;

    fn try_from(text: String) -> IndexResult<Self> {
        text.parse()
    }
}

impl From<Event> for String {
    fn from(event: Event) -> String {
        event.to_string()
    }
}

/// One voice of a piece.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "PartFile")]
pub struct Part {
    name: String,
    events: Vec<(Offset, Event)>,
    end: Option<Offset>,
}

#[derive(Deserialize)]
struct PartFile {
    #[serde(default)]
    name: String,
    events: Vec<(Offset, Event)>,
    #[serde(default)]
    end: Option<Offset>,
}

impl TryFrom<PartFile> for Part {
    type Error = IndexError;

    fn try_from(file: PartFile) -> IndexResult<Self> {
        let part = Part::new(file.name, file.events)?;
        match file.end {
            Some(end) => part.with_end(end),
            None => Ok(part),
        }
    }
}

impl Part {
    /// Build a part, rejecting offsets that are not strictly increasing.
    pub fn new(name: impl Into<String>, events: Vec<(Offset, Event)>) -> IndexResult<Self> {
        let name = name.into();
        for pair in events.windows(2) {
            if pair[1].0 <= pair[0].0 {
                return Err(IndexError::UnorderedOffsets {
                    part: name,
                    offset: pair[1].0.quarters(),
                    previous: pair[0].0.quarters(),
                });
            }
        }
        Ok(Part {
            name,
            events,
            end: None,
        })
    }

    /// Shorthand used by fixtures: `(quarters, event name)` pairs.
    pub fn parse(name: impl Into<String>, events: &[(f64, &str)]) -> IndexResult<Self> {
        let events = events
            .iter()
            .map(|&(quarters, text)| Ok((Offset::new(quarters)?, text.parse()?)))
            .collect::<IndexResult<Vec<_>>>()?;
        Part::new(name, events)
    }

    /// Set the offset where the last event stops sounding.
    pub fn with_end(mut self, end: Offset) -> IndexResult<Self> {
        if let Some(&(last, _)) = self.events.last() {
            if end <= last {
                return Err(IndexError::UnorderedOffsets {
                    part: self.name,
                    offset: end.quarters(),
                    previous: last.quarters(),
                });
            }
        }
        self.end = Some(end);
        Ok(self)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn events(&self) -> &[(Offset, Event)] {
        &self.events
    }

    pub fn end(&self) -> Option<Offset> {
        self.end
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }
}

/// A complete piece: parts in score order (highest voice first by
/// convention) and the meter in force at each offset.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Piece {
    pub parts: Vec<Part>,
    #[serde(default)]
    pub meters: MeterMap,
}

impl Piece {
    pub fn new(parts: Vec<Part>) -> Self {
        Piece {
            parts,
            meters: MeterMap::default(),
        }
    }

    pub fn from_json_str(json: &str) -> IndexResult<Self> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn load(path: &Path) -> IndexResult<Self> {
        let json = std::fs::read_to_string(path)?;
        Piece::from_json_str(&json)
    }

    pub fn ends(&self) -> Vec<Option<Offset>> {
        self.parts.iter().map(Part::end).collect()
    }
}
