// Measures: ordered chords under a clef, time signature, division count,
// tempo and key.
//
// A measure under construction is allowed to overflow its capacity; the
// generator fills one provisional measure per part and then calls
// `measurize` to split it into a list of exactly-full measures (plus a
// possibly shorter final one). Nothing downstream may consume an
// overflowing measure.

use crate::clef::Clef;
use crate::note::{Chord, Note};

#[derive(Debug, Clone)]
pub struct Measure {
    fifths: i32,
    clef: Clef,
    time: (u8, u8),
    notes: Vec<Chord>,
    divisions: u32,
    bpm: u32,
}

impl Default for Measure {
    fn default() -> Self {
        Measure {
            fifths: 0,
            clef: Clef::treble(),
            time: (0, 0),
            notes: Vec::new(),
            divisions: 0,
            bpm: 0,
        }
    }
}

impl Measure {
    /// An attribute-less measure: no time signature, no divisions, capacity 0.
    pub fn new() -> Self {
        Measure::default()
    }

    /// A measure with its attributes established.
    ///
    /// `time` is (beats, beat-type); the beat-type must be even and both
    /// parts nonzero. `divisions` is the tick count of a quarter note.
    pub fn with_attributes(clef: Clef, time: (u8, u8), divisions: u32, fifths: i32) -> Self {
        assert!(time.0 != 0 && time.1 != 0, "time signature parts must be nonzero");
        assert!(time.1 % 2 == 0, "beat-type must be even");
        assert!(divisions > 0, "divisions must be positive");
        Measure {
            fifths,
            clef,
            time,
            notes: Vec::new(),
            divisions,
            bpm: 80,
        }
    }

    /// A copy of this measure's attributes with no chords.
    fn empty_clone(&self) -> Measure {
        Measure {
            fifths: self.fifths,
            clef: self.clef.clone(),
            time: self.time,
            notes: Vec::new(),
            divisions: self.divisions,
            bpm: self.bpm,
        }
    }

    pub fn has_attributes(&self) -> bool {
        self.time.0 != 0 && self.time.1 != 0 && self.divisions > 0 && self.bpm != 0
    }

    pub fn fifths(&self) -> i32 {
        self.fifths
    }

    pub fn set_fifths(&mut self, fifths: i32) {
        self.fifths = fifths;
    }

    pub fn clef(&self) -> &Clef {
        &self.clef
    }

    pub fn set_clef(&mut self, clef: Clef) {
        self.clef = clef;
    }

    pub fn time(&self) -> (u8, u8) {
        self.time
    }

    pub fn set_time(&mut self, beats: u8, beat_type: u8) {
        assert!(beats != 0 && beat_type != 0, "time signature parts must be nonzero");
        assert!(beat_type % 2 == 0, "beat-type must be even");
        self.time = (beats, beat_type);
    }

    /// Common time, 4/4.
    pub fn set_common_time(&mut self) {
        self.set_time(4, 4);
    }

    /// Cut time, 2/2.
    pub fn set_cut_time(&mut self) {
        self.set_time(2, 2);
    }

    pub fn divisions(&self) -> u32 {
        self.divisions
    }

    pub fn set_divisions(&mut self, divisions: u32) {
        assert!(divisions > 0, "divisions must be positive");
        self.divisions = divisions;
    }

    /// Beats per minute, expressed in quarter notes.
    pub fn bpm(&self) -> u32 {
        self.bpm
    }

    pub fn set_bpm(&mut self, bpm: u32) {
        self.bpm = bpm;
    }

    pub fn chords(&self) -> &[Chord] {
        &self.notes
    }

    pub fn chords_mut(&mut self) -> &mut [Chord] {
        &mut self.notes
    }

    pub fn last_chord_mut(&mut self) -> Option<&mut Chord> {
        self.notes.last_mut()
    }

    pub fn append_note(&mut self, note: Note) {
        self.notes.push(Chord::from_note(note));
    }

    pub fn append_chord(&mut self, chord: Chord) {
        self.notes.push(chord);
    }

    /// Sum of the durations of all non-empty chords.
    pub fn length(&self) -> u32 {
        self.notes
            .iter()
            .filter(|c| !c.is_empty())
            .map(Chord::duration)
            .sum()
    }

    /// Tick capacity: 4 × beats × divisions / beat-type, or 0 without
    /// attributes.
    pub fn max_length(&self) -> u32 {
        if self.has_attributes() {
            4 * self.time.0 as u32 * self.divisions / self.time.1 as u32
        } else {
            0
        }
    }

    /// A measure without attributes is always considered overflowing.
    pub fn is_overflowing(&self) -> bool {
        let max = self.max_length();
        self.length() > max || max == 0
    }

    /// Split this (possibly overflowing) measure into a list of measures,
    /// each exactly full except possibly the last, preserving chord order
    /// and total duration exactly.
    ///
    /// A chord that crosses a barline is cloned into fragments: the first
    /// takes the remaining capacity, middle fragments take a full measure
    /// each, the last takes the remainder. Every fragment except the last
    /// gets a tie-start, every fragment except the first a tie-end; the
    /// first keeps the original chord's own tie-end and the last its own
    /// tie-start, so ties to content outside this measure survive.
    pub fn measurize(&self) -> Vec<Measure> {
        let mut out = vec![self.empty_clone()];
        if !self.is_overflowing() {
            out[0].notes = self.notes.clone();
            return out;
        }
        assert!(
            self.max_length() > 0 || self.notes.iter().all(Chord::is_empty),
            "cannot measurize notes without a time signature and divisions"
        );

        for chord in &self.notes {
            let cap = out.last().expect("nonempty").max_length();
            let used = out.last().expect("nonempty").length();

            if chord.duration() > 0 && used == cap {
                out.push(self.empty_clone());
            }
            let current = out.last_mut().expect("nonempty");
            let free = cap.min(current.max_length() - current.length());

            if chord.duration() <= free {
                current.notes.push(chord.clone());
                continue;
            }

            // The chord crosses at least one barline.
            let mut fragments: Vec<Chord> = Vec::new();
            let mut first = chord.clone();
            first.set_duration(free);
            fragments.push(first);
            let mut rest = chord.duration() - free;
            while rest > cap {
                let mut middle = chord.clone();
                middle.set_duration(cap);
                fragments.push(middle);
                rest -= cap;
            }
            let mut last = chord.clone();
            last.set_duration(rest);
            fragments.push(last);

            let n = fragments.len();
            for (i, fragment) in fragments.iter_mut().enumerate() {
                if i < n - 1 {
                    fragment.set_tie_start(true);
                }
                if i > 0 {
                    fragment.set_tie_end(true);
                }
            }

            for (i, fragment) in fragments.into_iter().enumerate() {
                if i > 0 {
                    out.push(self.empty_clone());
                }
                out.last_mut().expect("nonempty").notes.push(fragment);
            }
        }
        out
    }
}
