// A part: the measures of one staff plus the instrument(s) that play it.
//
// Several instruments on one part occur only for unpitched percussion
// staves, where each line of the staff maps to a different sound.

use crate::instrument::Instrument;
use crate::measure::Measure;
use crate::note::Chord;
use std::rc::Rc;

#[derive(Debug, Clone)]
pub struct Part {
    measures: Vec<Measure>,
    instruments: Vec<Rc<Instrument>>,
    instrument_name: String,
    lines: u8,
}

impl Part {
    pub fn new(instruments: Vec<Rc<Instrument>>) -> Self {
        Part {
            measures: Vec::new(),
            instruments,
            instrument_name: String::new(),
            lines: 5,
        }
    }

    pub fn add_instrument(&mut self, instrument: Rc<Instrument>) {
        self.instruments.push(instrument);
    }

    pub fn instruments(&self) -> &[Rc<Instrument>] {
        &self.instruments
    }

    pub fn measures(&self) -> &[Measure] {
        &self.measures
    }

    pub fn set_measures(&mut self, measures: Vec<Measure>) {
        self.measures = measures;
    }

    /// Set this part's measures from a single (usually overflowing)
    /// provisional measure.
    pub fn set_measures_from(&mut self, measure: &Measure) {
        self.measures = measure.measurize();
    }

    pub fn last_measure_mut(&mut self) -> Option<&mut Measure> {
        self.measures.last_mut()
    }

    /// Explicit display name; falls back to the first instrument's name.
    pub fn set_instrument_name(&mut self, name: impl Into<String>) {
        self.instrument_name = name.into();
    }

    pub fn instrument_name(&self) -> &str {
        if self.instrument_name.is_empty() {
            self.instruments.first().map_or("", |i| i.name())
        } else {
            &self.instrument_name
        }
    }

    /// Staff line count for display.
    pub fn set_lines(&mut self, lines: u8) {
        assert!(lines > 0 && lines < 10, "line count {lines} out of range");
        self.lines = lines;
    }

    pub fn lines(&self) -> u8 {
        self.lines
    }

    /// The chord sounding at an absolute tick, if any.
    ///
    /// Measures are laid out back to back at their full capacity; within the
    /// containing measure, chords are walked by duration.
    pub fn chord_at(&self, tick: u32) -> Option<&Chord> {
        let mut offset = 0u32;
        for measure in &self.measures {
            let len = measure.max_length();
            if tick < offset + len {
                let mut t = offset;
                for chord in measure.chords() {
                    if chord.is_empty() {
                        continue;
                    }
                    if tick < t + chord.duration() {
                        return Some(chord);
                    }
                    t += chord.duration();
                }
                return None;
            }
            offset += len;
        }
        None
    }

    /// Total number of chords across all measures.
    pub fn chord_count(&self) -> usize {
        self.measures.iter().map(|m| m.chords().len()).sum()
    }

    /// The nth chord of the part, counting flat across measures.
    pub fn chord_index(&self, n: usize) -> Option<&Chord> {
        let mut n = n;
        for measure in &self.measures {
            if n < measure.chords().len() {
                return Some(&measure.chords()[n]);
            }
            n -= measure.chords().len();
        }
        None
    }

    /// Convert the nth chord to a rest. Returns false when out of range.
    pub fn pause_at(&mut self, n: usize) -> bool {
        let mut n = n;
        for measure in &mut self.measures {
            if n < measure.chords().len() {
                measure.chords_mut()[n].to_pause();
                return true;
            }
            n -= measure.chords().len();
        }
        false
    }
}
