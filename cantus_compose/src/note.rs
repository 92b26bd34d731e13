// Notes and chords: the smallest units of the temporal model.
//
// A `Note` is one pitched (or paused) event with a tick duration, MIDI
// velocities, tie flags, and optional notation extras (dots, notehead,
// instrument reference). A `Chord` is an ordered group of notes struck
// together; duration and tie state are read from the first member and fanned
// out to all members on mutation.
//
// Tie relationships are carried only by the tie-start/tie-end flag pair plus
// positional adjacency in the surrounding chord sequence; there are no links
// between note objects.

use crate::error::{Error, Result};
use crate::instrument::Instrument;
use std::rc::Rc;

/// Default 'note on' strike velocity.
pub const DEFAULT_ON: u8 = 90;
/// Default 'note off' release velocity.
pub const DEFAULT_OFF: u8 = 40;

/// A pitch-shift marker for a named note.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Semitone {
    None,
    Flat,
    Sharp,
}

/// Step letters of the diatonic scale, C-first.
const STEPS: [char; 7] = ['C', 'D', 'E', 'F', 'G', 'A', 'B'];
/// Semitone offset of each step letter from C.
const STEP_OFFSETS: [u8; 7] = [0, 2, 4, 5, 7, 9, 11];

/// Notation duration names and their exponent as a power-of-two fraction of a
/// whole note (`256th` = 2^-8 … `long` = 2^2).
const DURATION_NAMES: [(&str, i32); 21] = [
    ("256th", -8),
    ("1/256", -8),
    ("128th", -7),
    ("1/128", -7),
    ("64th", -6),
    ("1/64", -6),
    ("32nd", -5),
    ("1/32", -5),
    ("16th", -4),
    ("1/16", -4),
    ("8th", -3),
    ("1/8", -3),
    ("eighth", -3),
    ("4th", -2),
    ("1/4", -2),
    ("quarter", -2),
    ("half", -1),
    ("1/2", -1),
    ("whole", 0),
    ("breve", 1),
    ("long", 2),
];

/// Exponent of a named duration as a power-of-two fraction of a whole note.
pub fn duration_exponent(name: &str) -> Option<i32> {
    DURATION_NAMES
        .iter()
        .find(|(n, _)| *n == name)
        .map(|(_, e)| *e)
}

/// Fraction of a whole note a named duration spans.
pub fn duration_fraction(name: &str) -> Option<f64> {
    duration_exponent(name).map(|e| 2f64.powi(e))
}

/// Parse a pitch name like "A4", "C#3" or "Eb-1" into its MIDI pitch.
///
/// Returns `None` for malformed names or pitches outside 0..=127.
pub fn try_pitch_from_name(name: &str) -> Option<u8> {
    let mut chars = name.chars();
    let step = chars.next()?;
    let idx = STEPS.iter().position(|&s| s == step)?;
    let rest: String = chars.collect();
    let (alter, octave_str): (i32, &str) = match rest.chars().next()? {
        'b' => (-1, &rest[1..]),
        '#' => (1, &rest[1..]),
        _ => (0, &rest[..]),
    };
    let octave: i32 = octave_str.parse().ok()?;
    if !(-1..=9).contains(&octave) {
        return None;
    }
    let value = (octave + 1) * 12 + STEP_OFFSETS[idx] as i32 + alter;
    u8::try_from(value).ok().filter(|&p| p <= 127)
}

/// Parse a pitch name, panicking on malformed input.
///
/// Only for names produced by this crate or validated configuration; corpus
/// data goes through [`try_pitch_from_name`].
pub fn pitch_from_name(name: &str) -> u8 {
    try_pitch_from_name(name)
        .unwrap_or_else(|| panic!("invalid pitch name '{name}'"))
}

/// MIDI pitch nearest to a frequency in hertz, relative to A4 = 440 Hz.
///
/// Derived from `fn = f0 * a^n` with `a = 2^(1/12)`, so
/// `n = round(log(fn/f0) / log(a))`.
pub fn pitch_from_frequency(hertz: f32) -> u8 {
    let a = 2f32.powf(1.0 / 12.0);
    let n = ((hertz / 440.0).ln() / a.ln()).round() as i32;
    (69 + n).clamp(0, 127) as u8
}

/// Flat-spelled representation of a pitch, e.g. 61 → "Db4".
pub fn pitch_repr(pitch: u8) -> String {
    let diff = pitch % 12;
    let octave = (pitch / 12) as i32 - 1;
    let idx = STEP_OFFSETS
        .iter()
        .position(|&off| diff <= off)
        .expect("offset table covers 0..=11");
    let step = STEPS[idx];
    if diff == STEP_OFFSETS[idx] {
        format!("{step}{octave}")
    } else {
        format!("{step}b{octave}")
    }
}

/// Split a pitch representation into (step letter, accidental, octave).
///
/// Panics on malformed input, mirroring [`pitch_from_name`].
pub fn split_repr(name: &str) -> (char, Semitone, i32) {
    let step = name.chars().next().expect("empty pitch name");
    assert!(STEPS.contains(&step), "invalid pitch step '{step}'");
    let rest = &name[1..];
    match rest.chars().next() {
        Some('b') => (step, Semitone::Flat, rest[1..].parse().expect("octave")),
        Some('#') => (step, Semitone::Sharp, rest[1..].parse().expect("octave")),
        _ => (step, Semitone::None, rest.parse().expect("octave")),
    }
}

/// One pitched or paused event.
#[derive(Debug, Clone)]
pub struct Note {
    pitch: u8,
    velocity_on: u8,
    velocity_off: u8,
    duration: u32,
    pause: bool,
    tie_start: bool,
    tie_end: bool,
    dots: u8,
    head: Option<String>,
    instrument: Option<Rc<Instrument>>,
}

impl Note {
    /// A note at the default strike velocities.
    pub fn new(pitch: u8, duration: u32) -> Self {
        Self::with_velocities(pitch, DEFAULT_ON, DEFAULT_OFF, duration)
    }

    /// A note struck and released at one velocity.
    pub fn with_velocity(pitch: u8, velocity: u8, duration: u32) -> Self {
        Self::with_velocities(pitch, velocity, velocity, duration)
    }

    pub fn with_velocities(pitch: u8, velocity_on: u8, velocity_off: u8, duration: u32) -> Self {
        assert!(pitch <= 127, "pitch {pitch} out of range");
        assert!(velocity_on <= 127, "velocity_on {velocity_on} out of range");
        assert!(
            velocity_off <= 127,
            "velocity_off {velocity_off} out of range"
        );
        Note {
            pitch,
            velocity_on,
            velocity_off,
            duration,
            pause: false,
            tie_start: false,
            tie_end: false,
            dots: 0,
            head: None,
            instrument: None,
        }
    }

    /// A rest: pitch 0, silent velocities.
    pub fn pause(duration: u32) -> Self {
        let mut note = Self::with_velocities(0, 0, 0, duration);
        note.pause = true;
        note
    }

    pub fn pitch(&self) -> u8 {
        self.pitch
    }

    pub fn set_pitch(&mut self, pitch: u8) {
        assert!(pitch <= 127, "pitch {pitch} out of range");
        self.pitch = pitch;
    }

    pub fn velocity_on(&self) -> u8 {
        self.velocity_on
    }

    pub fn set_velocity_on(&mut self, velocity: u8) {
        assert!(velocity <= 127, "velocity {velocity} out of range");
        self.velocity_on = velocity;
    }

    pub fn velocity_off(&self) -> u8 {
        self.velocity_off
    }

    pub fn set_velocity_off(&mut self, velocity: u8) {
        assert!(velocity <= 127, "velocity {velocity} out of range");
        self.velocity_off = velocity;
    }

    pub fn duration(&self) -> u32 {
        self.duration
    }

    pub fn set_duration(&mut self, duration: u32) {
        self.duration = duration;
    }

    pub fn is_pause(&self) -> bool {
        self.pause
    }

    pub fn is_note(&self) -> bool {
        !self.pause
    }

    /// Turn this note into a rest.
    pub fn to_pause(&mut self) {
        self.pause = true;
    }

    pub fn tie_start(&self) -> bool {
        self.tie_start
    }

    pub fn set_tie_start(&mut self, enable: bool) {
        self.tie_start = enable;
    }

    pub fn tie_end(&self) -> bool {
        self.tie_end
    }

    pub fn set_tie_end(&mut self, enable: bool) {
        self.tie_end = enable;
    }

    pub fn dots(&self) -> u8 {
        self.dots
    }

    pub fn set_dots(&mut self, dots: u8) {
        self.dots = dots;
    }

    pub fn head(&self) -> Option<&str> {
        self.head.as_deref()
    }

    pub fn set_head(&mut self, head: impl Into<String>) {
        self.head = Some(head.into());
    }

    /// Base name of the notehead, with any `-empty` style suffix removed.
    pub fn head_name(&self) -> Option<&str> {
        const FILLABLE: [&str; 4] = ["normal", "diamond", "triangle", "square"];
        let head = self.head.as_deref()?;
        Some(
            FILLABLE
                .iter()
                .find(|f| head.starts_with(*f))
                .copied()
                .unwrap_or(head),
        )
    }

    /// Whether the notehead is drawn filled.
    pub fn head_filled(&self) -> bool {
        const FILLABLE: [&str; 4] = ["normal", "diamond", "triangle", "square"];
        match self.head.as_deref() {
            Some(head) => {
                FILLABLE.iter().any(|f| head.starts_with(f)) && !head.ends_with("-empty")
            }
            None => false,
        }
    }

    pub fn instrument(&self) -> Option<&Rc<Instrument>> {
        self.instrument.as_ref()
    }

    pub fn set_instrument(&mut self, instrument: Rc<Instrument>) {
        self.instrument = Some(instrument);
    }

    /// The 3-byte MIDI message for this note.
    ///
    /// First byte is `0x9n` (note on) or `0x8n` (note off) with `n` the
    /// channel, then key, then velocity.
    pub fn message(&self, channel: u8, note_on: bool) -> [u8; 3] {
        assert!(channel < 16, "channel {channel} out of range");
        if note_on {
            [0x90 + channel, self.pitch, self.velocity_on]
        } else {
            [0x80 + channel, self.pitch, self.velocity_off]
        }
    }

    pub fn on_message(&self, channel: u8) -> [u8; 3] {
        self.message(channel, true)
    }

    pub fn off_message(&self, channel: u8) -> [u8; 3] {
        self.message(channel, false)
    }

    /// Notation type name of this note's duration for a given `divisions`.
    ///
    /// The largest contained power of two of the raw duration is mapped to a
    /// fraction of a whole note and looked up in the duration name table.
    pub fn type_name(&self, divisions: u32) -> Result<&'static str> {
        assert!(self.duration > 0, "zero-duration note has no type");
        let p2 = 1u32 << (31 - self.duration.leading_zeros());
        let whole = 4 * divisions;
        for (name, exp) in NOTATION_TYPES {
            let matches = if exp >= 0 {
                p2 == whole << exp
            } else {
                whole % (1 << -exp) == 0 && p2 == whole >> -exp
            };
            if matches {
                return Ok(name);
            }
        }
        Err(Error::UnknownDuration {
            duration: self.duration,
            divisions,
        })
    }
}

/// Canonical notation names by exponent (used for emitted type names, unlike
/// the parse table above which also accepts aliases).
const NOTATION_TYPES: [(&str, i32); 11] = [
    ("256th", -8),
    ("128th", -7),
    ("64th", -6),
    ("32nd", -5),
    ("16th", -4),
    ("eighth", -3),
    ("quarter", -2),
    ("half", -1),
    ("whole", 0),
    ("breve", 1),
    ("long", 2),
];

/// An ordered group of notes struck together.
#[derive(Debug, Clone, Default)]
pub struct Chord {
    notes: Vec<Note>,
}

impl Chord {
    pub fn new() -> Self {
        Chord { notes: Vec::new() }
    }

    pub fn from_note(note: Note) -> Self {
        Chord { notes: vec![note] }
    }

    pub fn push(&mut self, note: Note) {
        self.notes.push(note);
    }

    pub fn notes(&self) -> &[Note] {
        &self.notes
    }

    pub fn is_empty(&self) -> bool {
        self.notes.is_empty()
    }

    /// Duration of the chord, read from its first note (0 when empty).
    pub fn duration(&self) -> u32 {
        self.notes.first().map_or(0, Note::duration)
    }

    pub fn set_duration(&mut self, duration: u32) {
        for note in &mut self.notes {
            note.set_duration(duration);
        }
    }

    pub fn tie_start(&self) -> bool {
        self.notes.first().is_some_and(Note::tie_start)
    }

    pub fn set_tie_start(&mut self, enable: bool) {
        for note in &mut self.notes {
            note.set_tie_start(enable);
        }
    }

    pub fn tie_end(&self) -> bool {
        self.notes.first().is_some_and(Note::tie_end)
    }

    pub fn set_tie_end(&mut self, enable: bool) {
        for note in &mut self.notes {
            note.set_tie_end(enable);
        }
    }

    pub fn set_dots(&mut self, dots: u8) {
        for note in &mut self.notes {
            note.set_dots(dots);
        }
    }

    pub fn is_pause(&self) -> bool {
        self.notes.first().is_some_and(Note::is_pause)
    }

    /// Turn every member note into a rest.
    pub fn to_pause(&mut self) {
        for note in &mut self.notes {
            note.to_pause();
        }
    }

    pub fn contains_pitch(&self, pitch: u8) -> bool {
        self.notes.iter().any(|n| n.pitch() == pitch)
    }

    /// The lowest-pitched (root) note of the chord.
    pub fn bottom(&self) -> Option<&Note> {
        self.notes.iter().min_by_key(|n| n.pitch())
    }

    pub fn bottom_mut(&mut self) -> Option<&mut Note> {
        self.notes.iter_mut().min_by_key(|n| n.pitch())
    }

    /// Decompose this chord's raw duration into a tie-chain of fragments,
    /// each expressible as a power-of-two fraction of a whole note.
    ///
    /// The largest expressible fraction is peeled off repeatedly until the
    /// duration is exhausted. With `generate_dots`, trailing runs of exact
    /// halvings are merged into dotted fragments (at most two dots), so the
    /// fragment durations always sum to the input duration. The first
    /// fragment keeps this chord's own tie-end, the last its own tie-start.
    ///
    /// Panics if the duration is zero; fails if some remainder has no
    /// notation name at the given `divisions`.
    pub fn split_by_divisions(&self, divisions: u32, generate_dots: bool) -> Result<Vec<Chord>> {
        assert!(self.duration() > 0, "cannot split a zero-duration chord");
        let whole = 4 * divisions;

        let mut fragments: Vec<Chord> = Vec::new();
        let mut remaining = self.duration();
        while remaining > 0 {
            let piece = largest_notatable(whole, remaining).ok_or(Error::UnknownDuration {
                duration: remaining,
                divisions,
            })?;
            let mut fragment = self.clone();
            fragment.set_duration(piece);
            fragment.set_dots(0);
            fragment.set_tie_start(true);
            fragment.set_tie_end(true);
            fragments.push(fragment);
            remaining -= piece;
        }

        if generate_dots && fragments.len() > 1 {
            let mut dots: u8 = 0;
            let mut i = fragments.len() - 1;
            while i > 0 {
                if dots < 2 && fragments[i].duration() * 2 == fragments[i - 1].duration() {
                    fragments.remove(i);
                    dots += 1;
                } else {
                    apply_dots(&mut fragments[i], dots);
                    dots = 0;
                }
                i -= 1;
            }
            apply_dots(&mut fragments[0], dots);
        }

        fragments
            .first_mut()
            .expect("at least one fragment")
            .set_tie_end(self.tie_end());
        fragments
            .last_mut()
            .expect("at least one fragment")
            .set_tie_start(self.tie_start());

        Ok(fragments)
    }
}

/// Largest power-of-two fraction (or multiple) of a whole note, in ticks,
/// that fits in `remaining` and divides evenly. `None` when even the
/// smallest notatable value (a 256th) does not fit.
fn largest_notatable(whole: u32, remaining: u32) -> Option<u32> {
    for exp in (-8..=2i32).rev() {
        let value = if exp >= 0 {
            whole.checked_shl(exp as u32)?
        } else {
            let div = 1u32 << (-exp);
            if whole % div != 0 {
                continue;
            }
            whole / div
        };
        if value > 0 && value <= remaining {
            return Some(value);
        }
    }
    None
}

/// Extend a fragment by its dot tail: one dot adds half the base duration,
/// two dots add three quarters.
fn apply_dots(fragment: &mut Chord, dots: u8) {
    if dots == 0 {
        return;
    }
    let base = fragment.duration();
    let mut total = base;
    for j in 1..=dots {
        total += base >> j;
    }
    fragment.set_dots(dots);
    fragment.set_duration(total);
}
