// Corpus training: learning transition statistics from MIDI scores.
//
// Walks a directory of Standard MIDI Files and accumulates three labeled
// matrices: pitch spellings (plus "rest"), durations in ticks normalized to
// 64 divisions per quarter, and simultaneous-note counts. Files that fail to
// parse, or that use SMPTE timing, are skipped with a diagnostic; a single
// bad file never aborts a training run.
//
// Transition attribution uses a bounded context history per matrix: a queue
// of state buckets. Every observed state is counted as a transition from
// every state in the front bucket. The first note of a simultaneity advances
// the history; later members of the same simultaneity join the freshly
// queued bucket, so the following state is attributed to the whole chord.
// The chord-size stream runs one simultaneity behind: each new onset reports
// the size of the group that just ended.

use crate::error::{Error, Result};
use crate::matrix::NamedMatrix;
use crate::note::pitch_repr;
use std::collections::VecDeque;
use std::path::{Path, PathBuf};

/// Ticks per quarter that corpus durations are normalized to, so rhythm
/// states are comparable across files with different resolutions.
pub const NORMALIZED_DIVISIONS: u32 = 64;

/// The three matrices produced by a training run.
#[derive(Debug, Clone, Default)]
pub struct TrainedMatrices {
    pub pitch: NamedMatrix,
    pub rhythm: NamedMatrix,
    pub chord: NamedMatrix,
}

/// A queue of state buckets: the front bucket holds every predecessor state
/// the next observation should be attributed to.
#[derive(Debug, Clone, Default)]
struct ContextHistory {
    queue: VecDeque<Vec<String>>,
}

impl ContextHistory {
    /// Queue a fresh bucket holding one state.
    fn enqueue(&mut self, state: String) {
        self.queue.push_back(vec![state]);
    }

    /// Add a state to the most recently queued bucket (a chord member
    /// sharing the onset of that bucket's first state).
    fn enqueue_grouped(&mut self, state: String) {
        match self.queue.back_mut() {
            Some(bucket) => bucket.push(state),
            None => self.enqueue(state),
        }
    }

    /// Drop the front bucket, advancing the history.
    fn dequeue(&mut self) {
        self.queue.pop_front();
    }

    fn front(&self) -> &[String] {
        self.queue.front().map_or(&[], Vec::as_slice)
    }
}

/// Count `state` as a transition from every state in the front bucket,
/// growing the matrix as needed.
fn observe(matrix: &mut NamedMatrix, history: &ContextHistory, state: &str) {
    if !matrix.is_column(state) {
        matrix.add_column(state, 0.0);
    }
    if !matrix.is_row(state) {
        matrix.add_row(state, 0.0);
    }
    for predecessor in history.front() {
        *matrix.at_mut(predecessor, state) += 1.0;
    }
}

/// Train the three matrices from every MIDI file under `directory`.
pub fn train_directory(directory: &Path, recursive: bool) -> Result<TrainedMatrices> {
    if !directory.is_dir() {
        return Err(Error::NotADirectory(directory.to_path_buf()));
    }

    let mut matrices = TrainedMatrices::default();
    let mut queue: VecDeque<PathBuf> = VecDeque::new();
    queue.push_back(directory.to_path_buf());

    while let Some(dir) = queue.pop_front() {
        let mut entries: Vec<PathBuf> = std::fs::read_dir(&dir)
            .map_err(|e| Error::io(&dir, e))?
            .filter_map(|e| e.ok().map(|e| e.path()))
            .collect();
        entries.sort();

        for entry in entries {
            if entry.is_dir() {
                if recursive {
                    queue.push_back(entry);
                }
            } else if is_midi_file(&entry) {
                if let Err(e) = train_file(&entry, &mut matrices) {
                    log::warn!("skipping corpus file: {e}");
                }
            }
        }
    }
    Ok(matrices)
}

fn is_midi_file(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .is_some_and(|e| e.eq_ignore_ascii_case("mid") || e.eq_ignore_ascii_case("midi"))
}

/// Fold one score file into the matrices.
pub fn train_file(path: &Path, matrices: &mut TrainedMatrices) -> Result<()> {
    let bytes = std::fs::read(path).map_err(|e| Error::io(path, e))?;
    let score_err = |reason: String| Error::Score {
        path: path.to_path_buf(),
        reason,
    };
    let smf = midly::Smf::parse(&bytes).map_err(|e| score_err(e.to_string()))?;
    let divisions = match smf.header.timing {
        midly::Timing::Metrical(t) => t.as_int() as u32,
        midly::Timing::Timecode(..) => {
            return Err(score_err("SMPTE-timed files are not notated scores".into()));
        }
    };
    if divisions == 0 {
        return Err(score_err("zero ticks per quarter".into()));
    }

    for m in [
        &mut matrices.pitch,
        &mut matrices.rhythm,
        &mut matrices.chord,
    ] {
        if !m.is_row("begin") {
            m.add_row("begin", 0.0);
        }
    }
    let mut pitch_history = ContextHistory::default();
    let mut rhythm_history = ContextHistory::default();
    let mut chord_history = ContextHistory::default();
    pitch_history.enqueue("begin".to_string());
    rhythm_history.enqueue("begin".to_string());
    chord_history.enqueue("begin".to_string());
    let mut chord_size: u32 = 1;

    for track in &smf.tracks {
        let notes = collect_notes(track);
        let mut cursor: Option<u32> = None;

        let mut i = 0;
        while i < notes.len() {
            let onset = notes[i].onset;
            let mut group_end = i;
            while group_end < notes.len() && notes[group_end].onset == onset {
                group_end += 1;
            }

            // A silent gap before this onset is a rest.
            if let Some(cursor) = cursor {
                let gap = onset.saturating_sub(cursor);
                if gap > 0 {
                    observe(&mut matrices.pitch, &pitch_history, "rest");
                    pitch_history.enqueue("rest".to_string());
                    pitch_history.dequeue();

                    let gap_state = (NORMALIZED_DIVISIONS * gap / divisions).to_string();
                    observe(&mut matrices.rhythm, &rhythm_history, &gap_state);
                    rhythm_history.enqueue(gap_state);
                    rhythm_history.dequeue();
                }
            }

            for (member, note) in notes[i..group_end].iter().enumerate() {
                let prepr = pitch_repr(note.key);
                let rhythm_state =
                    (NORMALIZED_DIVISIONS * note.duration / divisions).to_string();
                observe(&mut matrices.pitch, &pitch_history, &prepr);
                observe(&mut matrices.rhythm, &rhythm_history, &rhythm_state);

                if member > 0 {
                    chord_size += 1;
                    pitch_history.enqueue_grouped(prepr);
                } else {
                    pitch_history.enqueue(prepr);
                    pitch_history.dequeue();
                    rhythm_history.enqueue(rhythm_state);
                    rhythm_history.dequeue();

                    let count_state = chord_size.to_string();
                    observe(&mut matrices.chord, &chord_history, &count_state);
                    chord_history.enqueue(count_state);
                    chord_history.dequeue();
                    chord_size = 1;
                }
            }

            let group_max_end = notes[i..group_end]
                .iter()
                .map(|n| n.onset + n.duration)
                .max()
                .unwrap_or(onset);
            cursor = Some(cursor.map_or(group_max_end, |c| c.max(group_max_end)));
            i = group_end;
        }
    }
    Ok(())
}

struct TimedNote {
    onset: u32,
    duration: u32,
    key: u8,
}

/// Pair note-on/note-off events into timed notes, ordered by onset then key.
fn collect_notes(track: &[midly::TrackEvent]) -> Vec<TimedNote> {
    let mut notes: Vec<TimedNote> = Vec::new();
    let mut active: Vec<VecDeque<u32>> = vec![VecDeque::new(); 128];
    let mut time: u32 = 0;

    for event in track {
        time += event.delta.as_int();
        if let midly::TrackEventKind::Midi { message, .. } = event.kind {
            match message {
                midly::MidiMessage::NoteOn { key, vel } if vel.as_int() > 0 => {
                    active[key.as_int() as usize].push_back(time);
                }
                midly::MidiMessage::NoteOn { key, .. } | midly::MidiMessage::NoteOff { key, .. } => {
                    if let Some(onset) = active[key.as_int() as usize].pop_front() {
                        if time > onset {
                            notes.push(TimedNote {
                                onset,
                                duration: time - onset,
                                key: key.as_int(),
                            });
                        }
                    }
                }
                _ => {}
            }
        }
    }
    notes.sort_by_key(|n| (n.onset, n.key));
    notes
}

#[cfg(test)]
mod tests {
    use super::*;
    use midly::num::{u4, u7, u15, u28};
    use midly::{Format, Header, MidiMessage, Smf, Timing, TrackEvent, TrackEventKind};

    fn midi_event(delta: u32, message: MidiMessage) -> TrackEvent<'static> {
        TrackEvent {
            delta: u28::new(delta),
            kind: TrackEventKind::Midi {
                channel: u4::new(0),
                message,
            },
        }
    }

    fn on(delta: u32, key: u8) -> TrackEvent<'static> {
        midi_event(
            delta,
            MidiMessage::NoteOn {
                key: u7::new(key),
                vel: u7::new(80),
            },
        )
    }

    fn off(delta: u32, key: u8) -> TrackEvent<'static> {
        midi_event(
            delta,
            MidiMessage::NoteOff {
                key: u7::new(key),
                vel: u7::new(0),
            },
        )
    }

    /// C4 quarter, then an E4+G4 quarter chord, a quarter rest, A4 quarter.
    fn sample_smf() -> Smf<'static> {
        let mut smf = Smf::new(Header::new(
            Format::SingleTrack,
            Timing::Metrical(u15::new(64)),
        ));
        let track = vec![
            on(0, 60),
            off(64, 60),
            on(0, 64),
            on(0, 67),
            off(64, 64),
            off(0, 67),
            on(64, 69),
            off(64, 69),
            TrackEvent {
                delta: u28::new(0),
                kind: TrackEventKind::Meta(midly::MetaMessage::EndOfTrack),
            },
        ];
        smf.tracks.push(track);
        smf
    }

    fn write_smf(smf: &Smf, path: &Path) {
        let mut buf = Vec::new();
        smf.write(&mut buf).unwrap();
        std::fs::write(path, &buf).unwrap();
    }

    #[test]
    fn transitions_from_single_notes_and_chords() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("sample.mid");
        write_smf(&sample_smf(), &path);

        let mut matrices = TrainedMatrices::default();
        train_file(&path, &mut matrices).unwrap();

        let p = &matrices.pitch;
        assert_eq!(p.at("begin", "C4"), 1.0);
        assert_eq!(p.at("C4", "E4"), 1.0);
        // The second chord member is attributed to the advanced bucket.
        assert_eq!(p.at("E4", "G4"), 1.0);
        // The rest is attributed to the whole chord.
        assert_eq!(p.at("E4", "rest"), 1.0);
        assert_eq!(p.at("G4", "rest"), 1.0);
        assert_eq!(p.at("rest", "A4"), 1.0);
    }

    #[test]
    fn chord_size_stream_lags_one_group() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("sample.mid");
        write_smf(&sample_smf(), &path);

        let mut matrices = TrainedMatrices::default();
        train_file(&path, &mut matrices).unwrap();

        let c = &matrices.chord;
        assert_eq!(c.at("begin", "1"), 1.0);
        // A4's onset reports the size of the E4+G4 group before it.
        assert_eq!(c.at("1", "2"), 1.0);
    }

    #[test]
    fn rhythm_states_are_normalized_tick_strings() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("sample.mid");
        write_smf(&sample_smf(), &path);

        let mut matrices = TrainedMatrices::default();
        train_file(&path, &mut matrices).unwrap();

        // Quarters at 64 divisions stay "64" after normalization.
        let r = &matrices.rhythm;
        assert!(r.is_row("64"));
        assert_eq!(r.at("begin", "64"), 1.0);
        assert!(r.at("64", "64") >= 3.0);
    }

    #[test]
    fn malformed_files_are_skipped_not_fatal() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("broken.mid"), b"not a midi file").unwrap();
        write_smf(&sample_smf(), &dir.path().join("good.mid"));
        std::fs::write(dir.path().join("notes.txt"), b"ignored").unwrap();

        let matrices = train_directory(dir.path(), true).unwrap();
        assert!(matrices.pitch.is_row("C4"), "good file must still train");
    }

    #[test]
    fn recursion_flag_controls_subdirectories() {
        let dir = tempfile::tempdir().unwrap();
        let sub = dir.path().join("sub");
        std::fs::create_dir(&sub).unwrap();
        write_smf(&sample_smf(), &sub.join("deep.mid"));

        let flat = train_directory(dir.path(), false).unwrap();
        assert!(flat.pitch.is_empty());

        let deep = train_directory(dir.path(), true).unwrap();
        assert!(deep.pitch.is_row("C4"));
    }

    #[test]
    fn non_directory_input_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("x.mid");
        write_smf(&sample_smf(), &file);
        assert!(matches!(
            train_directory(&file, true),
            Err(Error::NotADirectory(_))
        ));
    }
}
