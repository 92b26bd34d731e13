// The algorithm library: pluggable pitch, rhythm and chord-count strategies.
//
// Every strategy is a function of (engine, previous chord, concurrently
// sounding chords, options, per-voice context) → value, selected by its
// configuration name. All mutable strategy state — Markov chains, 1/f dice,
// the normalized chord-count table — lives in the per-voice `AlgoContext`
// owned by the generator, with an explicit reset when a new voice begins.

use crate::chain::MarkovChain;
use crate::config::Options;
use crate::error::{Error, Result};
use crate::note::{
    Chord, duration_exponent, pitch_repr, split_repr, try_pitch_from_name, Semitone,
};
use crate::sampling::{gaussian_index, pick_uniform, pick_weighted};
use crate::scale::Scale;
use cantus_prng::RandomEngine;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PitchAlgorithm {
    /// Uniform over the whole legal pitch set.
    Random,
    /// Uniform over the legal set restricted to the piano compass.
    RandomPiano,
    /// Uniform over the legal set inside the clef range.
    ContainStave,
    /// Standard-normal weighting over the clef range.
    Centralized,
    /// Normal weighting with a fixed domain, independent of range width.
    GaussianVoicing,
    /// Bounded random walk around the previous pitch.
    BrownianMotion,
    /// Voss-McCartney dice: long-range-correlated pink noise.
    PinkNoise,
    /// Letter-schematic accompaniment over the active chord.
    Accompaniment,
    /// Trained transition chain over pitch spellings.
    MarkovChain,
}

impl PitchAlgorithm {
    pub fn from_name(name: &str) -> Result<Self> {
        match name {
            "" | "random" => Ok(Self::Random),
            "random-piano" => Ok(Self::RandomPiano),
            "contain-stave" => Ok(Self::ContainStave),
            "centralized" => Ok(Self::Centralized),
            "gaussian-voicing" => Ok(Self::GaussianVoicing),
            "brownian-motion" => Ok(Self::BrownianMotion),
            "1/f-noise" => Ok(Self::PinkNoise),
            "accompaniment" => Ok(Self::Accompaniment),
            "markov-chain" => Ok(Self::MarkovChain),
            _ => Err(Error::UnknownAlgorithm {
                kind: "pitch",
                name: name.to_string(),
            }),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RhythmAlgorithm {
    /// One fixed named duration.
    Constant,
    /// Uniform over power-of-two durations between smallest and largest.
    Random,
    /// Bounded walk over power-of-two exponents.
    BrownianMotion,
    /// Voss-McCartney dice over the exponent span.
    PinkNoise,
    /// Trained transition chain over normalized tick counts.
    MarkovChain,
}

impl RhythmAlgorithm {
    pub fn from_name(name: &str) -> Result<Self> {
        match name {
            "" | "constant" => Ok(Self::Constant),
            "random" => Ok(Self::Random),
            "brownian-motion" => Ok(Self::BrownianMotion),
            "1/f-noise" => Ok(Self::PinkNoise),
            "markov-chain" => Ok(Self::MarkovChain),
            _ => Err(Error::UnknownAlgorithm {
                kind: "rhythm",
                name: name.to_string(),
            }),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChordAlgorithm {
    /// A fixed simultaneous-note count.
    Constant,
    /// Uniform between the configured bounds.
    Random,
    /// A configured count → weight table, auto-normalized.
    Weighted,
    /// Trained transition chain over counts.
    MarkovChain,
}

impl ChordAlgorithm {
    pub fn from_name(name: &str) -> Result<Self> {
        match name {
            "" | "constant" => Ok(Self::Constant),
            "random" => Ok(Self::Random),
            "weighted" => Ok(Self::Weighted),
            "markov-chain" => Ok(Self::MarkovChain),
            _ => Err(Error::UnknownAlgorithm {
                kind: "chord",
                name: name.to_string(),
            }),
        }
    }
}

/// The pitch material a voice draws from: a scale over the full compass, or
/// the fixed display pitches of an unpitched staff.
#[derive(Debug, Clone)]
pub enum PitchSet {
    Scale(Scale),
    Fixed(Vec<u8>),
}

impl PitchSet {
    /// The legal pitches inside an inclusive range, ascending.
    pub fn pitches_in(&self, low: u8, high: u8) -> Vec<u8> {
        match self {
            PitchSet::Scale(scale) => scale.pitches_in(low, high),
            PitchSet::Fixed(pitches) => pitches
                .iter()
                .copied()
                .filter(|&p| p >= low && p <= high)
                .collect(),
        }
    }
}

/// Read-only per-voice surroundings shared by all strategies.
pub struct VoiceEnv<'a> {
    pub pitch_set: &'a PitchSet,
    /// Inclusive pitch bounds of the governing clef.
    pub clef_range: (u8, u8),
    pub options: &'a Options,
    /// Root letter of the active scale, e.g. "C".
    pub root: &'a str,
}

impl VoiceEnv<'_> {
    fn stave_pitches(&self) -> Result<Vec<u8>> {
        let (low, high) = self.clef_range;
        non_empty(self.pitch_set.pitches_in(low, high))
    }
}

fn non_empty(pitches: Vec<u8>) -> Result<Vec<u8>> {
    if pitches.is_empty() {
        return Err(Error::Config(
            "the scale yields no pitches in the playable range".to_string(),
        ));
    }
    Ok(pitches)
}

/// Number of Voss-McCartney dice.
const NUM_DICE: usize = 3;
/// Dice state counter modulus (2^NUM_DICE).
const NUM_STATES: u8 = 8;

/// Which dice reroll at a given state: all on wrap to zero, otherwise the
/// bits that flip between consecutive counter values.
fn reroll_mask(state: u8) -> u8 {
    if state == 0 {
        (1 << NUM_DICE) - 1
    } else {
        (state - 1) ^ state
    }
}

/// Persistent dice for the 1/f-noise strategies.
#[derive(Debug, Clone, Default)]
pub struct DiceState {
    state: u8,
    /// (current value, inclusive range) per die.
    dice: Vec<(u32, u32)>,
}

impl DiceState {
    /// Reset the counter and repartition `span` (the maximum reachable sum)
    /// as evenly as possible across the dice ranges.
    fn reinit(&mut self, span: u32) {
        self.state = 0;
        let base = span / NUM_DICE as u32;
        self.dice = vec![(0, base); NUM_DICE];
        let leftover = span - base * NUM_DICE as u32;
        for i in 0..leftover as usize {
            self.dice[i % NUM_DICE].1 += 1;
        }
    }

    /// Advance the counter, reroll the masked dice and return the sum of
    /// all current dice values.
    fn roll(&mut self, engine: &mut dyn RandomEngine) -> u32 {
        let mask = reroll_mask(self.state);
        for (i, die) in self.dice.iter_mut().enumerate() {
            if mask & (1 << i) != 0 {
                die.0 = engine.uniform(0, die.1 as i64 + 1) as u32;
            }
        }
        self.state = (self.state + 1) % NUM_STATES;
        self.dice.iter().map(|d| d.0).sum()
    }
}

/// Mutable per-voice strategy state, owned by the generator and reset when a
/// new voice begins.
#[derive(Default)]
pub struct AlgoContext {
    /// True until the first event of the voice has been generated.
    pub reinit: bool,
    /// Set by the markov-chain pitch strategy when it lands on "rest".
    pub rest_pending: bool,
    /// Current absolute tick.
    pub tick: u32,
    /// Tick capacity of one measure.
    pub measure_len: u32,
    /// Active chord-progression entry, when a progression is configured.
    pub current_chord: Option<String>,
    pub pitch_chain: Option<MarkovChain>,
    pub rhythm_chain: Option<MarkovChain>,
    pub chord_chain: Option<MarkovChain>,
    pitch_dice: DiceState,
    rhythm_dice: DiceState,
    weighted_counts: Option<Vec<(u32, f64)>>,
}

impl AlgoContext {
    pub fn new() -> Self {
        AlgoContext {
            reinit: true,
            ..Default::default()
        }
    }

    /// Restart all strategy state for a fresh voice or run.
    pub fn reset(&mut self) {
        self.reinit = true;
        self.rest_pending = false;
        self.weighted_counts = None;
        for chain in [
            self.pitch_chain.as_mut(),
            self.rhythm_chain.as_mut(),
            self.chord_chain.as_mut(),
        ]
        .into_iter()
        .flatten()
        {
            chain.reset();
        }
    }
}

/// Produce the next pitch for a voice.
pub fn next_pitch(
    algo: PitchAlgorithm,
    engine: &mut dyn RandomEngine,
    prev: Option<&Chord>,
    conc: &[&Chord],
    env: &VoiceEnv,
    ctx: &mut AlgoContext,
) -> Result<u8> {
    match algo {
        PitchAlgorithm::Random => {
            let pitches = non_empty(env.pitch_set.pitches_in(0, 127))?;
            Ok(*pick_uniform(engine, &pitches))
        }
        PitchAlgorithm::RandomPiano => {
            let pitches = non_empty(env.pitch_set.pitches_in(21, 108))?;
            Ok(*pick_uniform(engine, &pitches))
        }
        PitchAlgorithm::ContainStave => {
            let pitches = env.stave_pitches()?;
            Ok(*pick_uniform(engine, &pitches))
        }
        PitchAlgorithm::Centralized => {
            let pitches = env.stave_pitches()?;
            Ok(pitches[gaussian_index(engine, pitches.len(), -3.0, 3.0, false)])
        }
        PitchAlgorithm::GaussianVoicing => {
            let pitches = env.stave_pitches()?;
            Ok(pitches[gaussian_index(engine, pitches.len(), -3.0, 3.0, true)])
        }
        PitchAlgorithm::BrownianMotion => brownian_pitch(engine, prev, env),
        PitchAlgorithm::PinkNoise => {
            let pitches = env.stave_pitches()?;
            if ctx.reinit {
                ctx.pitch_dice.reinit(pitches.len() as u32 - 1);
            }
            let sum = ctx.pitch_dice.roll(engine) as usize;
            Ok(pitches[sum])
        }
        PitchAlgorithm::Accompaniment => accompaniment_pitch(engine, conc, env, ctx),
        PitchAlgorithm::MarkovChain => {
            let chain = ctx.pitch_chain.as_mut().ok_or_else(|| {
                Error::Config("the markov-chain pitch algorithm requires pitch.chain".to_string())
            })?;
            if ctx.reinit {
                chain.reset();
            }
            let state = chain.next(engine);
            if state == "rest" {
                ctx.rest_pending = true;
                return Ok(0);
            }
            try_pitch_from_name(&state)
                .ok_or_else(|| Error::Config(format!("chain state '{state}' is not a pitch")))
        }
    }
}

/// Random walk in scale steps around a random note of the previous chord.
fn brownian_pitch(
    engine: &mut dyn RandomEngine,
    prev: Option<&Chord>,
    env: &VoiceEnv,
) -> Result<u8> {
    let pitches = env.stave_pitches()?;
    let prev_pitch = match prev {
        Some(chord) if !chord.is_empty() => {
            let notes = chord.notes();
            let pick = engine.uniform(0, notes.len() as i64) as usize;
            notes[pick].pitch()
        }
        _ => return Ok(*pick_uniform(engine, &pitches)),
    };

    // The previous pitch may have been remapped outside the scale; walk from
    // the nearest legal index instead of failing.
    let idx = pitches
        .iter()
        .position(|&p| p == prev_pitch)
        .unwrap_or_else(|| {
            pitches
                .iter()
                .enumerate()
                .min_by_key(|&(_, &p)| (p as i32 - prev_pitch as i32).abs())
                .map(|(i, _)| i)
                .expect("nonempty pitch set")
        }) as i64;

    let len = pitches.len() as i64;
    let mut low = idx + env.options.pitch.min.min(0);
    let mut high = idx + env.options.pitch.max.max(0);
    low = low.max(0);
    high = high.min(len - 1);
    let pick = if low >= high {
        low
    } else {
        engine.uniform(low, high)
    };
    Ok(pitches[pick as usize])
}

/// Resolve a chord-progression letter grammar to a chord tone.
fn accompaniment_pitch(
    engine: &mut dyn RandomEngine,
    conc: &[&Chord],
    env: &VoiceEnv,
    ctx: &AlgoContext,
) -> Result<u8> {
    match env.options.pitch.schematic.as_deref() {
        None | Some("") => {
            // No grammar configured: one random chord tone against a random
            // concurrently-sounding chord (or the scale root when alone).
            let letter = ['A', 'B', 'C'][engine.uniform(0, 3) as usize];
            let candidates: Vec<String> = conc
                .iter()
                .filter(|c| !c.is_empty() && !c.is_pause())
                .map(|c| letter_name(c.bottom().expect("nonempty chord").pitch()))
                .collect();
            let name = if candidates.is_empty() {
                env.root.to_string()
            } else {
                candidates[engine.uniform(0, candidates.len() as i64) as usize].clone()
            };
            resolve_schematic_letter(letter, &name, false, env)
        }
        Some(schematic) => {
            let name = ctx
                .current_chord
                .clone()
                .unwrap_or_else(|| env.root.to_string());
            let (name, minor) = match name.strip_suffix('m') {
                Some(stripped) if !stripped.is_empty() => (stripped.to_string(), true),
                _ => (name, false),
            };

            let slices = schematic.chars().count();
            if !slices.is_power_of_two() {
                return Err(Error::SchematicLength(slices));
            }
            let measure_len = ctx.measure_len.max(1);
            let group = (measure_len / slices as u32).max(1);
            let idx = ((ctx.tick % measure_len) / group).min(slices as u32 - 1) as usize;
            let letter = schematic.chars().nth(idx).expect("index in bounds");
            resolve_schematic_letter(letter, &name, minor, env)
        }
    }
}

/// The letter-plus-accidental part of a pitch's representation ("Db4" → "Db").
fn letter_name(pitch: u8) -> String {
    let repr = pitch_repr(pitch);
    let (step, alter, _) = split_repr(&repr);
    match alter {
        Semitone::None => step.to_string(),
        Semitone::Flat => format!("{step}b"),
        Semitone::Sharp => format!("{step}#"),
    }
}

/// Map a schematic letter (A = root, B = third, C = fifth) to the nearest
/// in-range occurrence of that tone above the chord root.
fn resolve_schematic_letter(
    letter: char,
    chord_name: &str,
    minor: bool,
    env: &VoiceEnv,
) -> Result<u8> {
    let pitches = env.stave_pitches()?;
    let root_pc = try_pitch_from_name(&format!("{chord_name}1"))
        .ok_or_else(|| Error::Config(format!("invalid chord name '{chord_name}'")))?
        % 12;
    let root = pitches
        .iter()
        .copied()
        .find(|&p| p % 12 == root_pc)
        .ok_or_else(|| Error::ChordOutOfRange(chord_name.to_string()))?;

    let offset: u16 = match letter {
        'A' => return Ok(root),
        'B' => {
            if minor {
                3
            } else {
                4
            }
        }
        'C' => 7,
        other => return Err(Error::SchematicLetter(other)),
    };
    let tone = root as u16 + offset;
    if tone <= 127 && pitches.contains(&(tone as u8)) {
        Ok(tone as u8)
    } else {
        log::warn!(
            "schematic letter '{letter}' falls outside the scale for '{chord_name}{}'; \
             using the root",
            if minor { "m" } else { "" }
        );
        Ok(root)
    }
}

/// Produce the next duration as a fraction of a whole note.
pub fn next_rhythm(
    algo: RhythmAlgorithm,
    engine: &mut dyn RandomEngine,
    prev: Option<&Chord>,
    divisions: u32,
    env: &VoiceEnv,
    ctx: &mut AlgoContext,
) -> Result<f64> {
    let opts = &env.options.rhythm;
    match algo {
        RhythmAlgorithm::Constant => Ok(crate::note::duration_fraction(&opts.duration)
            .unwrap_or(0.25)),
        RhythmAlgorithm::Random => {
            let (smallest, largest) = exponent_bounds(opts.smallest.as_str(), opts.largest.as_str())?;
            if smallest >= largest {
                return Ok(2f64.powi(smallest));
            }
            let exp = engine.uniform(smallest as i64, largest as i64) as i32;
            Ok(2f64.powi(exp))
        }
        RhythmAlgorithm::BrownianMotion => {
            let (smallest, largest) = exponent_bounds(opts.smallest.as_str(), opts.largest.as_str())?;
            let prev_exp = prev
                .filter(|c| !c.is_empty() && c.duration() > 0)
                .map(|c| {
                    let fraction = c.duration() as f64 / (4.0 * divisions as f64);
                    fraction.log2().floor() as i32
                });
            match prev_exp {
                None => {
                    if smallest >= largest {
                        return Ok(2f64.powi(smallest));
                    }
                    let exp = engine.uniform(smallest as i64, largest as i64) as i32;
                    Ok(2f64.powi(exp))
                }
                Some(prev_exp) => {
                    let low = (prev_exp as i64 + opts.min.min(0)).max(smallest as i64);
                    let high = (prev_exp as i64 + opts.max.max(0)).min(largest as i64);
                    let exp = if low >= high {
                        low
                    } else {
                        engine.uniform(low, high)
                    };
                    Ok(2f64.powi(exp as i32))
                }
            }
        }
        RhythmAlgorithm::PinkNoise => {
            let (smallest, largest) = exponent_bounds(opts.smallest.as_str(), opts.largest.as_str())?;
            if ctx.reinit {
                ctx.rhythm_dice.reinit((largest - smallest).max(0) as u32);
            }
            let sum = ctx.rhythm_dice.roll(engine) as i32;
            Ok(2f64.powi(smallest + sum))
        }
        RhythmAlgorithm::MarkovChain => {
            let chain = ctx.rhythm_chain.as_mut().ok_or_else(|| {
                Error::Config("the markov-chain rhythm algorithm requires rhythm.chain".to_string())
            })?;
            if ctx.reinit {
                chain.reset();
            }
            let state = chain.next(engine);
            let ticks: f64 = state
                .parse()
                .map_err(|_| Error::Config(format!("chain state '{state}' is not a duration")))?;
            // States are ticks at 64 divisions; a whole note is 256 of them.
            Ok(ticks / 256.0)
        }
    }
}

fn exponent_bounds(smallest: &str, largest: &str) -> Result<(i32, i32)> {
    let low = duration_exponent(smallest)
        .ok_or_else(|| Error::Config(format!("unknown duration name '{smallest}'")))?;
    let high = duration_exponent(largest)
        .ok_or_else(|| Error::Config(format!("unknown duration name '{largest}'")))?;
    Ok((low, high))
}

/// Produce the number of simultaneous notes for the next chord.
pub fn next_chord_count(
    algo: ChordAlgorithm,
    engine: &mut dyn RandomEngine,
    env: &VoiceEnv,
    ctx: &mut AlgoContext,
) -> Result<u32> {
    let opts = &env.options.chord;
    match algo {
        ChordAlgorithm::Constant => Ok(opts.amount.max(1)),
        ChordAlgorithm::Random => {
            let low = opts.min.max(1);
            let high = opts.max.max(low);
            Ok(engine.uniform(low as i64, high as i64 + 1) as u32)
        }
        ChordAlgorithm::Weighted => {
            if ctx.reinit {
                ctx.weighted_counts = None;
            }
            if ctx.weighted_counts.is_none() {
                ctx.weighted_counts = Some(normalize_weights(&opts.weights)?);
            }
            let table = ctx.weighted_counts.as_ref().expect("just built");
            let idx = pick_weighted(engine, table, |(_, w)| *w);
            Ok(table[idx].0)
        }
        ChordAlgorithm::MarkovChain => {
            let chain = ctx.chord_chain.as_mut().ok_or_else(|| {
                Error::Config("the markov-chain chord algorithm requires chord.chain".to_string())
            })?;
            if ctx.reinit {
                chain.reset();
            }
            let state = chain.next(engine);
            state
                .parse()
                .map_err(|_| Error::Config(format!("chain state '{state}' is not a count")))
        }
    }
}

/// Turn the configured count → weight table into a proper distribution.
///
/// A total above 1 is scaled down; a total below 1 has the deficit folded
/// into the single-note entry, creating it if needed. Both cases warn.
fn normalize_weights(
    weights: &std::collections::BTreeMap<String, f64>,
) -> Result<Vec<(u32, f64)>> {
    let mut table: Vec<(u32, f64)> = weights
        .iter()
        .filter_map(|(k, &v)| k.parse::<u32>().ok().map(|count| (count, v)))
        .collect();
    if table.is_empty() {
        return Err(Error::Config(
            "the weighted chord algorithm requires a count/weight table".to_string(),
        ));
    }
    table.sort_by_key(|(count, _)| *count);

    let sum: f64 = table.iter().map(|(_, w)| w).sum();
    if sum > 1.0 {
        log::warn!("chord weights sum to {sum}, normalizing");
        for (_, w) in &mut table {
            *w /= sum;
        }
    } else if sum < 1.0 {
        let deficit = 1.0 - sum;
        match table.iter_mut().find(|(count, _)| *count == 1) {
            Some((_, w)) => {
                log::warn!(
                    "chord weights sum to {sum}; raising the single-note weight by {deficit}"
                );
                *w += deficit;
            }
            None => {
                log::warn!("chord weights sum to {sum}; adding a single-note entry of {deficit}");
                table.insert(0, (1, deficit));
            }
        }
    }
    Ok(table)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{ChordOptions, Options, PitchOptions, RhythmOptions};
    use crate::matrix::NamedMatrix;
    use crate::note::Note;
    use cantus_prng::engine_by_name;

    fn c_major() -> PitchSet {
        PitchSet::Scale(Scale::from_mask("101011010101", 'C').unwrap())
    }

    fn env<'a>(pitch_set: &'a PitchSet, options: &'a Options) -> VoiceEnv<'a> {
        VoiceEnv {
            pitch_set,
            clef_range: (60, 84),
            options,
            root: "C",
        }
    }

    fn engine() -> Box<dyn cantus_prng::RandomEngine> {
        engine_by_name("xoshiro256++", 99).unwrap()
    }

    #[test]
    fn algorithm_names_resolve() {
        assert!(PitchAlgorithm::from_name("1/f-noise").is_ok());
        assert!(PitchAlgorithm::from_name("").is_ok());
        assert!(PitchAlgorithm::from_name("fibonacci").is_err());
        assert!(RhythmAlgorithm::from_name("brownian-motion").is_ok());
        assert!(RhythmAlgorithm::from_name("fibonacci").is_err());
        assert!(ChordAlgorithm::from_name("weighted").is_ok());
        assert!(ChordAlgorithm::from_name("fibonacci").is_err());
    }

    #[test]
    fn stave_bound_algorithms_stay_in_range_and_scale() {
        let set = c_major();
        let options = Options::default();
        let env = env(&set, &options);
        let mut ctx = AlgoContext::new();
        let mut e = engine();
        for algo in [
            PitchAlgorithm::ContainStave,
            PitchAlgorithm::Centralized,
            PitchAlgorithm::GaussianVoicing,
        ] {
            for _ in 0..500 {
                let p = next_pitch(algo, e.as_mut(), None, &[], &env, &mut ctx).unwrap();
                assert!((60..=84).contains(&p));
                assert!(matches!(&set, PitchSet::Scale(s) if s.contains(p)));
            }
        }
    }

    #[test]
    fn brownian_walks_within_the_window() {
        let set = c_major();
        let options = Options::default();
        let env = env(&set, &options);
        let mut e = engine();
        let legal = set.pitches_in(60, 84);

        let prev = Chord::from_note(Note::new(67, 16)); // G4, a scale member
        let prev_idx = legal.iter().position(|&p| p == 67).unwrap() as i64;
        for _ in 0..500 {
            let p = brownian_pitch(e.as_mut(), Some(&prev), &env).unwrap();
            let idx = legal.iter().position(|&x| x == p).unwrap() as i64;
            assert!((idx - prev_idx).abs() <= 3, "walk escaped the ±3 window");
        }
    }

    #[test]
    fn brownian_clamps_at_the_boundary() {
        let set = c_major();
        let options = Options::default();
        let env = env(&set, &options);
        let mut e = engine();
        let legal = set.pitches_in(60, 84);

        let prev = Chord::from_note(Note::new(legal[0], 16));
        for _ in 0..200 {
            let p = brownian_pitch(e.as_mut(), Some(&prev), &env).unwrap();
            let idx = legal.iter().position(|&x| x == p).unwrap();
            assert!(idx <= 3, "clamped walk escaped below the boundary");
        }
    }

    #[test]
    fn reroll_mask_follows_the_counter_bits() {
        // All dice on wrap; otherwise the flipped bits of state-1 → state.
        assert_eq!(reroll_mask(0), 0b111);
        assert_eq!(reroll_mask(1), 0b001);
        assert_eq!(reroll_mask(2), 0b011);
        assert_eq!(reroll_mask(3), 0b001);
        assert_eq!(reroll_mask(4), 0b111);
        assert_eq!(reroll_mask(5), 0b001);
        assert_eq!(reroll_mask(6), 0b011);
        assert_eq!(reroll_mask(7), 0b001);

        // Over one full cycle, die i rerolls 8 / 2^i times.
        for die in 0..NUM_DICE {
            let rerolls = (0..NUM_STATES)
                .filter(|&s| reroll_mask(s) & (1 << die) != 0)
                .count();
            assert_eq!(rerolls, 8 >> die, "die {die}");
        }
    }

    #[test]
    fn dice_partition_covers_the_index_space() {
        let mut dice = DiceState::default();
        dice.reinit(13);
        let ranges: Vec<u32> = dice.dice.iter().map(|d| d.1).collect();
        assert_eq!(ranges.iter().sum::<u32>(), 13);
        assert!(ranges.iter().all(|&r| (4..=5).contains(&r)), "{ranges:?}");
    }

    #[test]
    fn pink_noise_pitch_stays_legal_and_correlated() {
        let set = c_major();
        let options = Options::default();
        let env = env(&set, &options);
        let legal = set.pitches_in(60, 84);
        let mut ctx = AlgoContext::new();
        let mut e = engine();

        let mut values = Vec::new();
        for _ in 0..64 {
            let p = next_pitch(PitchAlgorithm::PinkNoise, e.as_mut(), None, &[], &env, &mut ctx)
                .unwrap();
            assert!(legal.contains(&p));
            values.push(legal.iter().position(|&x| x == p).unwrap());
            ctx.reinit = false;
        }
        // Half of all steps reroll only the smallest die, so many adjacent
        // pairs must sit closer than the full index span.
        let close_pairs = values
            .windows(2)
            .filter(|w| w[0].abs_diff(w[1]) < legal.len() / 2)
            .count();
        assert!(close_pairs > values.len() / 3, "got {close_pairs}");
    }

    #[test]
    fn accompaniment_schematic_selects_chord_tones() {
        let set = c_major();
        let options = Options {
            pitch: PitchOptions {
                schematic: Some("ACBC".to_string()),
                ..Default::default()
            },
            ..Default::default()
        };
        let env = env(&set, &options);
        let mut ctx = AlgoContext::new();
        ctx.measure_len = 256;
        ctx.current_chord = Some("C".to_string());
        let mut e = engine();

        // Slices of 64 ticks: A C B C → root, fifth, third, fifth.
        let expected = [(0, 60), (64, 67), (128, 64), (192, 67)];
        for (tick, pitch) in expected {
            ctx.tick = tick;
            let p = next_pitch(
                PitchAlgorithm::Accompaniment,
                e.as_mut(),
                None,
                &[],
                &env,
                &mut ctx,
            )
            .unwrap();
            assert_eq!(p, pitch, "tick {tick}");
        }

        // Minor chord: the third flattens.
        ctx.current_chord = Some("Am".to_string());
        ctx.tick = 128;
        let p = next_pitch(
            PitchAlgorithm::Accompaniment,
            e.as_mut(),
            None,
            &[],
            &env,
            &mut ctx,
        )
        .unwrap();
        assert_eq!(p, 72, "A4 root 69 + minor third");
    }

    #[test]
    fn schematic_length_must_be_a_power_of_two() {
        let set = c_major();
        let options = Options {
            pitch: PitchOptions {
                schematic: Some("ABC".to_string()),
                ..Default::default()
            },
            ..Default::default()
        };
        let env = env(&set, &options);
        let mut ctx = AlgoContext::new();
        ctx.measure_len = 256;
        let mut e = engine();
        assert!(matches!(
            next_pitch(
                PitchAlgorithm::Accompaniment,
                e.as_mut(),
                None,
                &[],
                &env,
                &mut ctx
            ),
            Err(Error::SchematicLength(3))
        ));
    }

    #[test]
    fn schematic_rejects_foreign_letters() {
        let set = c_major();
        let options = Options {
            pitch: PitchOptions {
                schematic: Some("AD".to_string()),
                ..Default::default()
            },
            ..Default::default()
        };
        let env = env(&set, &options);
        let mut ctx = AlgoContext::new();
        ctx.measure_len = 256;
        ctx.tick = 128;
        let mut e = engine();
        assert!(matches!(
            next_pitch(
                PitchAlgorithm::Accompaniment,
                e.as_mut(),
                None,
                &[],
                &env,
                &mut ctx
            ),
            Err(Error::SchematicLetter('D'))
        ));
    }

    #[test]
    fn markov_pitch_translates_rest_to_a_pause_marker() {
        let mut m = NamedMatrix::new();
        m.add_column("rest", 0.0);
        m.add_row("begin", 0.0);
        m.add_row("rest", 0.0);
        *m.at_mut("begin", "rest") = 1.0;
        *m.at_mut("rest", "rest") = 1.0;

        let set = c_major();
        let options = Options::default();
        let env = env(&set, &options);
        let mut ctx = AlgoContext::new();
        ctx.pitch_chain = Some(MarkovChain::from_matrix(m, "begin"));
        let mut e = engine();

        let p = next_pitch(
            PitchAlgorithm::MarkovChain,
            e.as_mut(),
            None,
            &[],
            &env,
            &mut ctx,
        )
        .unwrap();
        assert_eq!(p, 0);
        assert!(ctx.rest_pending);
    }

    #[test]
    fn constant_rhythm_reads_the_named_duration() {
        let set = c_major();
        let options = Options {
            rhythm: RhythmOptions {
                duration: "half".to_string(),
                ..Default::default()
            },
            ..Default::default()
        };
        let env = env(&set, &options);
        let mut ctx = AlgoContext::new();
        let mut e = engine();
        let rh = next_rhythm(RhythmAlgorithm::Constant, e.as_mut(), None, 64, &env, &mut ctx)
            .unwrap();
        assert_eq!(rh, 0.5);
    }

    #[test]
    fn random_rhythm_respects_bounds() {
        let set = c_major();
        let options = Options {
            rhythm: RhythmOptions {
                smallest: "16th".to_string(),
                largest: "half".to_string(),
                ..Default::default()
            },
            ..Default::default()
        };
        let env = env(&set, &options);
        let mut ctx = AlgoContext::new();
        let mut e = engine();
        for _ in 0..500 {
            let rh = next_rhythm(RhythmAlgorithm::Random, e.as_mut(), None, 64, &env, &mut ctx)
                .unwrap();
            assert!(rh >= 1.0 / 16.0);
            assert!(rh <= 0.5);
        }
    }

    #[test]
    fn brownian_rhythm_moves_in_bounded_steps() {
        let set = c_major();
        let options = Options::default();
        let env = env(&set, &options);
        let mut ctx = AlgoContext::new();
        let mut e = engine();
        // Previous chord was a quarter (64 ticks at 64 divisions).
        let prev = Chord::from_note(Note::new(60, 64));
        for _ in 0..500 {
            let rh = next_rhythm(
                RhythmAlgorithm::BrownianMotion,
                e.as_mut(),
                Some(&prev),
                64,
                &env,
                &mut ctx,
            )
            .unwrap();
            let exp = rh.log2();
            assert!((-5.0..=1.0).contains(&exp), "step escaped ±3 around -2");
        }
    }

    #[test]
    fn weighted_chord_counts_normalize_a_deficit() {
        let set = c_major();
        let mut weights = std::collections::BTreeMap::new();
        weights.insert("2".to_string(), 0.25);
        weights.insert("3".to_string(), 0.25);
        let options = Options {
            chord: ChordOptions {
                weights,
                ..Default::default()
            },
            ..Default::default()
        };
        let env = env(&set, &options);
        let mut ctx = AlgoContext::new();
        let mut e = engine();

        let mut ones = 0;
        let n = 2000;
        for _ in 0..n {
            let count =
                next_chord_count(ChordAlgorithm::Weighted, e.as_mut(), &env, &mut ctx).unwrap();
            assert!((1..=3).contains(&count));
            if count == 1 {
                ones += 1;
            }
            ctx.reinit = false;
        }
        // The missing 0.5 was folded into the single-note entry.
        let share = ones as f64 / n as f64;
        assert!((0.45..0.55).contains(&share), "got {share}");
    }

    #[test]
    fn weighted_chord_counts_require_a_table() {
        let set = c_major();
        let options = Options::default();
        let env = env(&set, &options);
        let mut ctx = AlgoContext::new();
        let mut e = engine();
        assert!(next_chord_count(ChordAlgorithm::Weighted, e.as_mut(), &env, &mut ctx).is_err());
    }

    #[test]
    fn context_reset_restores_chains_and_dice() {
        let mut m = NamedMatrix::new();
        m.add_column("A4", 0.0);
        m.add_row("begin", 0.0);
        m.add_row("A4", 0.0);
        *m.at_mut("begin", "A4") = 1.0;
        *m.at_mut("A4", "A4") = 1.0;

        let mut ctx = AlgoContext::new();
        ctx.pitch_chain = Some(MarkovChain::from_matrix(m, "begin"));
        let mut e = engine();
        ctx.pitch_chain.as_mut().unwrap().next(e.as_mut());
        ctx.reinit = false;
        ctx.rest_pending = true;

        ctx.reset();
        assert!(ctx.reinit);
        assert!(!ctx.rest_pending);
        assert_eq!(ctx.pitch_chain.as_ref().unwrap().state(), "begin");
    }
}
