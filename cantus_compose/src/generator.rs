// The generator: per-part construction of the tick-indexed event stream.
//
// Parts are generated strictly in ascending index order. At every tick the
// rhythm algorithm proposes a duration, the chord-count algorithm a number
// of simultaneous notes, and the pitch algorithm one pitch per note; a part
// may read the already-finalized chords of lower-indexed parts sounding at
// the same tick, never higher-indexed ones. Each part fills one provisional
// measure which is then measurized into the final list.

use crate::algorithms::{
    AlgoContext, ChordAlgorithm, PitchAlgorithm, PitchSet, RhythmAlgorithm, VoiceEnv,
    next_chord_count, next_pitch, next_rhythm,
};
use crate::chain::MarkovChain;
use crate::clef::Clef;
use crate::config::{Config, RhythmOptions};
use crate::error::{Error, Result};
use crate::instrument::Instrument;
use crate::matrix::split_on;
use crate::measure::Measure;
use crate::note::{Chord, Note, duration_exponent, pitch_repr, split_repr, try_pitch_from_name};
use crate::part::Part;
use crate::scale::Scale;
use crate::score::Score;
use cantus_prng::{RandomEngine, engine_by_name};
use std::collections::BTreeMap;
use std::rc::Rc;

/// Ticks per quarter note used for generated scores.
const DIVISIONS: u32 = 64;

pub struct Generator {
    config: Config,
    engine: Box<dyn RandomEngine>,
}

impl Generator {
    pub fn new(config: Config) -> Result<Self> {
        let engine = engine_by_name(&config.engine, config.seed)?;
        Ok(Generator { config, engine })
    }

    /// Compose a full score from the configuration.
    pub fn generate(&mut self) -> Result<Score> {
        let Generator { config, engine } = self;
        let engine = engine.as_mut();

        let length = config.length;
        let time = (config.style.time.beats, config.style.time.beat_type);
        let root_name = config.style.root.to_string();
        let progression: Vec<String> = if config.style.chord_progression.is_empty() {
            Vec::new()
        } else {
            split_on(&config.style.chord_progression, '-')
        };

        let mut score = Score::new(config.export.header.clone());

        for (i, part_cfg) in config.parts.iter().enumerate() {
            let generation = config.generation_for(part_cfg);
            let pitch_algo = PitchAlgorithm::from_name(generation.pitch.as_deref().unwrap_or(""))?;
            let rhythm_algo =
                RhythmAlgorithm::from_name(generation.rhythm.as_deref().unwrap_or(""))?;
            let chord_algo = ChordAlgorithm::from_name(generation.chord.as_deref().unwrap_or(""))?;
            log::debug!(
                "part {i}: pitch {pitch_algo:?}, rhythm {rhythm_algo:?}, chord {chord_algo:?}"
            );

            // Instruments and, for unpitched staves, the display maps.
            let mut instruments: Vec<Rc<Instrument>> = Vec::new();
            let mut display_heads: BTreeMap<String, String> = BTreeMap::new();
            let mut display_instruments: BTreeMap<String, Rc<Instrument>> = BTreeMap::new();
            let mut percussion = !part_cfg.instruments.is_empty();

            if percussion {
                for voice in &part_cfg.instruments {
                    let mut inst = config.instrument(&voice.instrument)?;
                    inst.set_channel(10);
                    let inst = Rc::new(inst);
                    display_heads.insert(voice.display.clone(), voice.symbol.clone());
                    display_instruments.insert(voice.display.clone(), Rc::clone(&inst));
                    instruments.push(inst);
                }
            } else {
                let name = part_cfg.instrument.as_deref().ok_or_else(|| {
                    Error::Config(format!("part {i} has neither instrument nor instruments"))
                })?;
                let mut inst = config.instrument(name)?;
                percussion = inst.is_percussion();
                if percussion {
                    inst.set_channel(10);
                    let display = part_cfg.display.clone().unwrap_or_else(|| "C4".to_string());
                    let symbol = part_cfg
                        .symbol
                        .clone()
                        .unwrap_or_else(|| "normal".to_string());
                    let inst = Rc::new(inst);
                    display_heads.insert(display.clone(), symbol);
                    display_instruments.insert(display, Rc::clone(&inst));
                    instruments.push(inst);
                } else {
                    inst.set_channel(((i + 1) % 16) as u8);
                    instruments.push(Rc::new(inst));
                }
            }

            let clef = if percussion {
                let mut clef = Clef::treble();
                clef.set_percussion(true);
                clef
            } else {
                Clef::new(
                    part_cfg.clef.sign,
                    part_cfg.clef.line,
                    part_cfg.clef.octave_change,
                )
            };
            let clef_range = clef.range();

            let mut measure =
                Measure::with_attributes(clef.clone(), time, DIVISIONS, config.style.fifths);
            measure.set_bpm(config.style.bpm);

            let mut part = Part::new(instruments);
            part.set_lines(part_cfg.lines);
            part.set_instrument_name(part_cfg.name.clone());

            let pitch_set = if percussion {
                let mut displays = Vec::new();
                for name in display_instruments.keys() {
                    let pitch = try_pitch_from_name(name).ok_or_else(|| {
                        Error::Config(format!("invalid display pitch '{name}'"))
                    })?;
                    displays.push(pitch);
                }
                displays.sort_unstable();
                displays.dedup();
                PitchSet::Fixed(displays)
            } else {
                PitchSet::Scale(Scale::from_mask(&config.style.scale, config.style.root)?)
            };

            let options = generation.options;
            let env = VoiceEnv {
                pitch_set: &pitch_set,
                clef_range,
                options: &options,
                root: &root_name,
            };
            let mut ctx = AlgoContext::new();

            // Chains are loaded and pruned here, outside the tick loop; the
            // loop itself does no file I/O.
            if pitch_algo == PitchAlgorithm::MarkovChain {
                let path = options.pitch.chain.as_ref().ok_or_else(|| {
                    Error::Config("pitch.chain is required for the markov-chain pitch algorithm"
                        .to_string())
                })?;
                let mut chain = MarkovChain::from_csv(path)?;
                let mut keep: Vec<String> = pitch_set
                    .pitches_in(clef_range.0, clef_range.1)
                    .iter()
                    .map(|&p| pitch_repr(p))
                    .collect();
                keep.push("rest".to_string());
                chain.keep(&keep);
                ctx.pitch_chain = Some(chain);
            }
            if rhythm_algo == RhythmAlgorithm::MarkovChain {
                let path = options.rhythm.chain.as_ref().ok_or_else(|| {
                    Error::Config("rhythm.chain is required for the markov-chain rhythm algorithm"
                        .to_string())
                })?;
                let mut chain = MarkovChain::from_csv(path)?;
                chain.keep(&representable_durations(&options.rhythm)?);
                ctx.rhythm_chain = Some(chain);
            }
            if chord_algo == ChordAlgorithm::MarkovChain {
                let path = options.chord.chain.as_ref().ok_or_else(|| {
                    Error::Config("chord.chain is required for the markov-chain chord algorithm"
                        .to_string())
                })?;
                let mut chain = MarkovChain::from_csv(path)?;
                let low = options.chord.min.max(1);
                let high = options.chord.max.max(low);
                let keep: Vec<String> = (low..=high).map(|c| c.to_string()).collect();
                chain.keep(&keep);
                ctx.chord_chain = Some(chain);
            }

            let mlen = measure.max_length();
            let total = length * mlen;
            let mut prev: Option<Chord> = None;
            let mut j: u32 = 0;

            while j < total {
                let conc: Vec<&Chord> = score
                    .parts()
                    .iter()
                    .take(i)
                    .filter_map(|p| p.chord_at(j))
                    .collect();
                ctx.tick = j;
                ctx.measure_len = mlen;
                ctx.current_chord = if progression.is_empty() {
                    None
                } else {
                    Some(progression[(j / mlen) as usize % progression.len()].clone())
                };

                let rh = next_rhythm(rhythm_algo, engine, prev.as_ref(), DIVISIONS, &env, &mut ctx)?;
                let mut duration = ((DIVISIONS * 4) as f64 * rh) as u32;
                duration = duration.max(1);
                if j + duration > total {
                    duration = total - j;
                }

                let count = next_chord_count(chord_algo, engine, &env, &mut ctx)?;

                let mut chord = Chord::new();
                for _ in 0..count {
                    let mut pitch = next_pitch(pitch_algo, engine, prev.as_ref(), &conc, &env, &mut ctx)?;
                    let rest = std::mem::take(&mut ctx.rest_pending);

                    // On measure-start ticks, snap pitches toward the active
                    // progression chord; a pending rest short-circuits this.
                    if !rest && !percussion && !progression.is_empty() && j % mlen == 0 {
                        let entry = &progression[(j / mlen) as usize % progression.len()];
                        let chord_root = match entry.strip_suffix('m') {
                            Some(stripped) if !stripped.is_empty() => stripped,
                            _ => entry.as_str(),
                        };
                        pitch = remap_pitch(
                            engine,
                            config.style.chance,
                            pitch,
                            chord_root,
                            clef_range,
                        );
                    }

                    if chord.contains_pitch(pitch) {
                        continue;
                    }

                    let mut note = Note::new(pitch, duration);
                    if rest {
                        note.to_pause();
                    } else if percussion {
                        let repr = pitch_repr(pitch);
                        let head = display_heads.get(&repr).ok_or_else(|| {
                            Error::Config(format!("no display entry for pitch {repr}"))
                        })?;
                        note.set_head(head.clone());
                        note.set_instrument(Rc::clone(&display_instruments[&repr]));
                    }
                    chord.push(note);
                }

                prev = Some(chord.clone());
                measure.append_chord(chord);
                j += duration;
                ctx.reinit = false;
            }

            part.set_measures_from(&measure);

            // Pull the closing note toward the tonic, unless it continues a
            // tie from the previous measure.
            if !percussion {
                if let Some(note) = part
                    .last_measure_mut()
                    .and_then(Measure::last_chord_mut)
                    .and_then(Chord::bottom_mut)
                {
                    if !note.tie_end() {
                        let remapped = remap_pitch(
                            engine,
                            config.style.chance,
                            note.pitch(),
                            &root_name,
                            clef_range,
                        );
                        note.set_pitch(remapped);
                    }
                }
            }

            // Rest injection: uniform draws over flat chord positions; a
            // draw that lands on a tied chord is discarded, not retried.
            let mut ratio = generation.rest_ratio;
            if ratio < 0.0 {
                log::warn!("rest-ratio {ratio} is negative; using its absolute value");
                ratio = ratio.abs();
            }
            let total_chords = part.chord_count();
            if ratio > 0.0 && total_chords > 0 {
                let amount = (total_chords as f32 * ratio).round() as usize;
                for _ in 0..amount {
                    let idx = engine.uniform(0, total_chords as i64) as usize;
                    let chord = part.chord_index(idx).expect("index in range");
                    if chord.tie_start() || chord.tie_end() {
                        continue;
                    }
                    part.pause_at(idx);
                }
            }

            score.add_part(part);
        }

        Ok(score)
    }
}

/// With probability `chance`, move a pitch to the nearest occurrence of the
/// target letter within the range, considering the three nearest octaves.
fn remap_pitch(
    engine: &mut dyn RandomEngine,
    chance: f64,
    pitch: u8,
    target: &str,
    range: (u8, u8),
) -> u8 {
    if engine.uniform_real(0.0, 1.0) > chance {
        return pitch;
    }
    let (_, _, octave) = split_repr(&pitch_repr(pitch));
    let mut best: Option<u8> = None;
    for o in [octave - 1, octave, octave + 1] {
        let Some(candidate) = try_pitch_from_name(&format!("{target}{o}")) else {
            continue;
        };
        if candidate < range.0 || candidate > range.1 {
            continue;
        }
        best = match best {
            None => Some(candidate),
            Some(b) if (candidate as i32 - pitch as i32).abs() < (b as i32 - pitch as i32).abs() => {
                Some(candidate)
            }
            keep => keep,
        };
    }
    best.unwrap_or(pitch)
}

/// The rhythm-chain states reachable by notation: normalized tick counts of
/// every power-of-two duration between the configured bounds.
fn representable_durations(opts: &RhythmOptions) -> Result<Vec<String>> {
    let low = duration_exponent(&opts.smallest)
        .ok_or_else(|| Error::Config(format!("unknown duration name '{}'", opts.smallest)))?;
    let high = duration_exponent(&opts.largest)
        .ok_or_else(|| Error::Config(format!("unknown duration name '{}'", opts.largest)))?;
    Ok((low..=high)
        .map(|e| {
            let ticks = if e >= 0 { 256u32 << e } else { 256u32 >> -e };
            ticks.to_string()
        })
        .collect())
}
