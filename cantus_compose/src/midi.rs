// MIDI output from finished scores.
//
// One SMF format-1 file: a tempo track, then one track per part. Tied chord
// fragments collapse into a single sustained note: a fragment with a
// tie-end emits no note-on, a fragment with a tie-start no note-off.
// Percussion notes play their instrument's unpitched sound on the drum
// channel instead of the display pitch.

use crate::error::{Error, Result};
use crate::score::Score;
use midly::num::{u4, u7, u15, u24, u28};
use midly::{Format, Header, MetaMessage, MidiMessage, Smf, Timing, Track, TrackEvent, TrackEventKind};
use std::path::Path;

/// Convert a score to MIDI and write it to a file.
pub fn write_midi(score: &Score, path: &Path) -> Result<()> {
    let smf = score_to_smf(score);
    let mut buf = Vec::new();
    smf.write_std(&mut buf).map_err(|e| Error::io(path, e))?;
    std::fs::write(path, &buf).map_err(|e| Error::io(path, e))?;
    Ok(())
}

/// Build the in-memory SMF for a score.
pub fn score_to_smf(score: &Score) -> Smf<'_> {
    let first_measure = score.parts().first().and_then(|p| p.measures().first());
    let divisions = first_measure.map_or(64, |m| m.divisions()) as u16;
    let bpm = first_measure.map_or(80, |m| m.bpm()).max(1);

    let mut smf = Smf::new(Header::new(
        Format::Parallel,
        Timing::Metrical(u15::new(divisions)),
    ));

    let mut tempo_track: Track<'_> = Vec::new();
    if !score.header().title.is_empty() {
        tempo_track.push(TrackEvent {
            delta: u28::new(0),
            kind: TrackEventKind::Meta(MetaMessage::TrackName(score.header().title.as_bytes())),
        });
    }
    let tempo = (60_000_000 / bpm).min(0x00ff_ffff);
    tempo_track.push(TrackEvent {
        delta: u28::new(0),
        kind: TrackEventKind::Meta(MetaMessage::Tempo(u24::new(tempo))),
    });
    tempo_track.push(TrackEvent {
        delta: u28::new(0),
        kind: TrackEventKind::Meta(MetaMessage::EndOfTrack),
    });
    smf.tracks.push(tempo_track);

    for part in score.parts() {
        let mut track: Track<'_> = Vec::new();
        track.push(TrackEvent {
            delta: u28::new(0),
            kind: TrackEventKind::Meta(MetaMessage::TrackName(part.instrument_name().as_bytes())),
        });

        let channel = part.instruments().first().map_or(0, |i| i.channel()) & 15;
        let program = part
            .instruments()
            .first()
            .map_or(0, |i| i.program().saturating_sub(1))
            & 127;
        track.push(TrackEvent {
            delta: u28::new(0),
            kind: TrackEventKind::Midi {
                channel: u4::new(channel),
                message: MidiMessage::ProgramChange {
                    program: u7::new(program),
                },
            },
        });

        // (tick, is_on, key, velocity); offs sort before ons at equal ticks.
        let mut events: Vec<(u32, bool, u8, u8)> = Vec::new();
        let mut tick: u32 = 0;
        for measure in part.measures() {
            for chord in measure.chords() {
                if chord.is_empty() {
                    continue;
                }
                let duration = chord.duration();
                for note in chord.notes() {
                    if note.is_pause() {
                        continue;
                    }
                    let key = match note.instrument() {
                        Some(inst) if inst.is_percussion() => inst.unpitched().saturating_sub(1),
                        _ => note.pitch(),
                    };
                    if !note.tie_end() {
                        events.push((tick, true, key, note.velocity_on()));
                    }
                    if !note.tie_start() {
                        events.push((tick + duration, false, key, note.velocity_off()));
                    }
                }
                tick += duration;
            }
        }
        events.sort_by_key(|&(t, is_on, key, _)| (t, is_on, key));

        let mut last: u32 = 0;
        for (t, is_on, key, velocity) in events {
            let delta = t - last;
            last = t;
            let message = if is_on {
                MidiMessage::NoteOn {
                    key: u7::new(key & 127),
                    vel: u7::new(velocity & 127),
                }
            } else {
                MidiMessage::NoteOff {
                    key: u7::new(key & 127),
                    vel: u7::new(velocity & 127),
                }
            };
            track.push(TrackEvent {
                delta: u28::new(delta),
                kind: TrackEventKind::Midi {
                    channel: u4::new(channel),
                    message,
                },
            });
        }

        track.push(TrackEvent {
            delta: u28::new(0),
            kind: TrackEventKind::Meta(MetaMessage::EndOfTrack),
        });
        smf.tracks.push(track);
    }

    smf
}
