// MIDI import: Standard MIDI Files to parts.
//
// Each track that contains notes becomes one part, in track order. The part
// is named from the track's name meta event, or "Track N". Channels inside a
// track are not separated.
//
// Within a track, notes starting on the same tick are merged into one event
// (a `Chord` when more than one pitch starts there). Where a track falls
// silent before its next onset, and before its first onset, a `Rest` is
// inserted. Overlapping notes are cut at the next onset. The end of the last
// note becomes the part's end offset.
//
// Tick positions become quarter-note offsets via the header's ticks per
// quarter; SMPTE timecode timing has no quarter-note grid and is rejected.
// Time signature meta events from any track form the piece's meter map (the
// last one on a tick wins). Note-on with velocity 0 is a note-off. Stray
// note-offs and notes still sounding at the end of a track are logged and
// repaired rather than rejected.
//
// Uses the `midly` crate for SMF parsing.

use std::collections::BTreeMap;
use std::path::Path;

use midly::{MetaMessage, MidiMessage, Smf, Timing, Track, TrackEventKind};
use tracing::{debug, warn};

use crate::error::{IndexError, IndexResult};
use crate::meter::{Meter, MeterMap};
use crate::offset::Offset;
use crate::score::{Event, Part, Pitch, Piece};

/// Read and convert a MIDI file.
pub fn load_file(path: &Path) -> IndexResult<Piece> {
    let bytes = std::fs::read(path)?;
    load_parts(&bytes)
}

/// Convert an in-memory Standard MIDI File.
pub fn load_parts(bytes: &[u8]) -> IndexResult<Piece> {
    let smf = Smf::parse(bytes)?;
    let ticks_per_quarter = match smf.header.timing {
        Timing::Metrical(ticks) => ticks.as_int(),
        Timing::Timecode(..) => {
            return Err(IndexError::MidiLayout(
                "SMPTE timecode timing has no quarter-note grid".to_string(),
            ));
        }
    };
    if ticks_per_quarter == 0 {
        return Err(IndexError::MidiLayout("zero ticks per quarter note".to_string()));
    }

    let mut meters: BTreeMap<u64, Meter> = BTreeMap::new();
    let mut parts = Vec::new();
    for (index, track) in smf.tracks.iter().enumerate() {
        let scanned = scan_track(index, track, &mut meters)?;
        if scanned.notes.is_empty() {
            debug!(track = index, "skipping track without notes");
            continue;
        }
        parts.push(scanned.into_part(ticks_per_quarter)?);
    }

    let meters = MeterMap::new(
        meters
            .into_iter()
            .map(|(tick, meter)| (Offset::from_ticks(tick, ticks_per_quarter), meter))
            .collect(),
    )?;
    debug!(parts = parts.len(), meters = meters.changes().len(), "MIDI file imported");
    Ok(Piece { parts, meters })
}

#[derive(Debug, Clone, Copy)]
struct Note {
    key: u8,
    start: u64,
    end: u64,
}

struct ScannedTrack {
    name: String,
    notes: Vec<Note>,
}

fn scan_track(
    index: usize,
    track: &Track<'_>,
    meters: &mut BTreeMap<u64, Meter>,
) -> IndexResult<ScannedTrack> {
    let mut name = None;
    let mut notes = Vec::new();
    let mut sounding: Vec<(u8, u64)> = Vec::new();
    let mut tick: u64 = 0;

    for event in track {
        tick += u64::from(event.delta.as_int());
        match event.kind {
            TrackEventKind::Meta(MetaMessage::TrackName(bytes)) => {
                let text = String::from_utf8_lossy(bytes).trim().to_string();
                if !text.is_empty() {
                    name = Some(text);
                }
            }
            TrackEventKind::Meta(MetaMessage::TimeSignature(numerator, power, _, _)) => {
                let denominator = 1u32.checked_shl(u32::from(power)).ok_or_else(|| {
                    IndexError::MidiLayout(format!("time signature denominator 2^{power}"))
                })?;
                meters.insert(tick, Meter::new(u32::from(numerator), denominator)?);
            }
            TrackEventKind::Midi { message, .. } => match message {
                MidiMessage::NoteOn { key, vel } if vel.as_int() > 0 => {
                    sounding.push((key.as_int(), tick));
                }
                MidiMessage::NoteOn { key, .. } | MidiMessage::NoteOff { key, .. } => {
                    let key = key.as_int();
                    match sounding.iter().position(|&(k, _)| k == key) {
                        Some(position) => {
                            let (_, start) = sounding.remove(position);
                            notes.push(Note { key, start, end: tick });
                        }
                        None => warn!(track = index, key, tick, "note-off without note-on"),
                    }
                }
                _ => {}
            },
            _ => {}
        }
    }
    for (key, start) in sounding {
        warn!(track = index, key, start, "note still sounding at end of track");
        notes.push(Note { key, start, end: tick });
    }

    Ok(ScannedTrack {
        name: name.unwrap_or_else(|| format!("Track {index}")),
        notes,
    })
}

impl ScannedTrack {
    fn into_part(self, ticks_per_quarter: u16) -> IndexResult<Part> {
        let offset = |tick: u64| Offset::from_ticks(tick, ticks_per_quarter);
        let mut onsets: BTreeMap<u64, Vec<Note>> = BTreeMap::new();
        for note in self.notes {
            onsets.entry(note.start).or_default().push(note);
        }

        let mut events = Vec::with_capacity(onsets.len() + 1);
        let mut silent_from: u64 = 0;
        for (start, mut group) in onsets {
            if start > silent_from {
                events.push((offset(silent_from), Event::Rest));
            }
            group.sort_by_key(|note| note.key);
            group.dedup_by_key(|note| note.key);
            let event = match group.as_slice() {
                [single] => Event::Note(Pitch::from_midi(single.key)),
                _ => Event::Chord(group.iter().map(|note| Pitch::from_midi(note.key)).collect()),
            };
            events.push((offset(start), event));
            silent_from = group.iter().map(|note| note.end).max().unwrap_or(start);
        }

        let last_onset = events.last().map(|(at, _)| *at);
        let part = Part::new(self.name, events)?;
        let end = offset(silent_from);
        match last_onset {
            Some(last) if end > last => part.with_end(end),
            _ => Ok(part),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use midly::num::{u4, u7, u15, u28};
    use midly::{Format, Fps, Header, TrackEvent};

    const TPQ: u16 = 480;

    fn on(delta: u32, key: u8) -> TrackEvent<'static> {
        TrackEvent {
            delta: u28::new(delta),
            kind: TrackEventKind::Midi {
                channel: u4::new(0),
                message: MidiMessage::NoteOn {
                    key: u7::new(key),
                    vel: u7::new(80),
                },
            },
        }
    }

    fn off(delta: u32, key: u8) -> TrackEvent<'static> {
        TrackEvent {
            delta: u28::new(delta),
            kind: TrackEventKind::Midi {
                channel: u4::new(0),
                message: MidiMessage::NoteOff {
                    key: u7::new(key),
                    vel: u7::new(0),
                },
            },
        }
    }

    fn meta(delta: u32, message: MetaMessage<'static>) -> TrackEvent<'static> {
        TrackEvent {
            delta: u28::new(delta),
            kind: TrackEventKind::Meta(message),
        }
    }

    fn smf_bytes(timing: Timing, tracks: Vec<Track<'static>>) -> Vec<u8> {
        let mut smf = Smf::new(Header::new(Format::Parallel, timing));
        smf.tracks = tracks;
        let mut buf = Vec::new();
        smf.write(&mut buf).unwrap();
        buf
    }

    fn rendered(part: &Part) -> Vec<(f64, String)> {
        part.events()
            .iter()
            .map(|(offset, event)| (offset.quarters(), event.to_string()))
            .collect()
    }

    #[test]
    fn test_tracks_become_parts() {
        let conductor = vec![
            meta(0, MetaMessage::TimeSignature(3, 2, 24, 8)),
            meta(0, MetaMessage::EndOfTrack),
        ];
        let q = u32::from(TPQ);
        let soprano = vec![
            meta(0, MetaMessage::TrackName(b"Soprano")),
            on(0, 72),
            off(q, 72),
            on(q, 64),
            on(0, 67),
            off(q, 64),
            off(0, 67),
            meta(0, MetaMessage::EndOfTrack),
        ];
        let bass = vec![on(q / 2, 48), off(2 * q, 48), meta(0, MetaMessage::EndOfTrack)];
        let bytes = smf_bytes(Timing::Metrical(u15::new(TPQ)), vec![conductor, soprano, bass]);

        let piece = load_parts(&bytes).unwrap();
        assert_eq!(piece.parts.len(), 2);

        let soprano = &piece.parts[0];
        assert_eq!(soprano.name(), "Soprano");
        assert_eq!(
            rendered(soprano),
            vec![
                (0.0, "C5".to_string()),
                (1.0, "Rest".to_string()),
                (2.0, "[E4 G4]".to_string()),
            ]
        );
        assert_eq!(soprano.end(), Some(Offset::from(3)));

        let bass = &piece.parts[1];
        assert_eq!(bass.name(), "Track 2");
        assert_eq!(
            rendered(bass),
            vec![(0.0, "Rest".to_string()), (0.5, "C3".to_string())]
        );
        assert_eq!(bass.end().map(Offset::quarters), Some(2.5));

        assert_eq!(piece.meters.meter_at(Offset::ZERO).1, Meter::new(3, 4).unwrap());
    }

    #[test]
    fn test_zero_velocity_note_on_ends_note() {
        let q = u32::from(TPQ);
        let track = vec![
            on(0, 60),
            TrackEvent {
                delta: u28::new(q),
                kind: TrackEventKind::Midi {
                    channel: u4::new(0),
                    message: MidiMessage::NoteOn {
                        key: u7::new(60),
                        vel: u7::new(0),
                    },
                },
            },
            on(0, 62),
            off(q, 62),
            meta(0, MetaMessage::EndOfTrack),
        ];
        let bytes = smf_bytes(Timing::Metrical(u15::new(TPQ)), vec![track]);
        let piece = load_parts(&bytes).unwrap();
        assert_eq!(
            rendered(&piece.parts[0]),
            vec![(0.0, "C4".to_string()), (1.0, "D4".to_string())]
        );
        assert_eq!(piece.meters, MeterMap::default());
    }

    #[test]
    fn test_rejects_timecode_timing() {
        let track = vec![on(0, 60), off(100, 60), meta(0, MetaMessage::EndOfTrack)];
        let bytes = smf_bytes(Timing::Timecode(Fps::Fps25, 40), vec![track]);
        assert!(matches!(load_parts(&bytes), Err(IndexError::MidiLayout(_))));
    }

    #[test]
    fn test_rejects_garbage() {
        assert!(matches!(load_parts(b"not a midi file"), Err(IndexError::Midi(_))));
    }
}
