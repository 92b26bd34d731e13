// Typed configuration for a generation run.
//
// The configuration is one JSON document. Every recognized field is
// enumerated here with its default; algorithm option bags are split per
// family (pitch / rhythm / chord) instead of one nested dynamic tree, so a
// typo in an option name is visible instead of silently defaulting.

use crate::error::{Error, Result};
use crate::instrument::Instrument;
use crate::score::ScoreHeader;
use serde::Deserialize;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Random engine name, resolved by `cantus_prng::engine_by_name`.
    pub engine: String,
    pub seed: u64,
    /// Total length of the piece, in measures.
    pub length: u32,
    pub style: StyleConfig,
    pub export: ExportConfig,
    pub parts: Vec<PartConfig>,
    /// Global generation defaults; per-part settings override field-wise.
    pub generation: GenerationConfig,
    /// Extra instrument definitions, merged over the built-in catalog.
    pub instruments: BTreeMap<String, InstrumentDef>,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            engine: "xoshiro256++".to_string(),
            seed: 0,
            length: 10,
            style: StyleConfig::default(),
            export: ExportConfig::default(),
            parts: Vec::new(),
            generation: GenerationConfig::default(),
            instruments: BTreeMap::new(),
        }
    }
}

impl Config {
    pub fn from_file(path: &Path) -> Result<Config> {
        let text = std::fs::read_to_string(path).map_err(|e| Error::io(path, e))?;
        let config: Config = serde_json::from_str(&text)?;
        Ok(config)
    }

    /// Resolve an instrument by name: config-defined first, then the
    /// built-in catalog.
    pub fn instrument(&self, name: &str) -> Result<Instrument> {
        if let Some(def) = self.instruments.get(name) {
            return Ok(Instrument::new(name, def.channel, def.program, def.unpitched));
        }
        Instrument::standard(name)
            .ok_or_else(|| Error::Config(format!("unknown instrument '{name}'")))
    }

    /// The generation settings for one part: the part's own values where
    /// given, the global defaults elsewhere.
    pub fn generation_for(&self, part: &PartConfig) -> ResolvedGeneration {
        let base = &self.generation;
        let own = &part.generation;
        ResolvedGeneration {
            pitch: own.pitch.clone().or_else(|| base.pitch.clone()),
            rhythm: own.rhythm.clone().or_else(|| base.rhythm.clone()),
            chord: own.chord.clone().or_else(|| base.chord.clone()),
            options: own
                .options
                .clone()
                .or_else(|| base.options.clone())
                .unwrap_or_default(),
            rest_ratio: own.rest_ratio,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct StyleConfig {
    pub time: TimeConfig,
    pub bpm: u32,
    pub fifths: i32,
    /// 12-character chromatic mask, root-relative.
    pub scale: String,
    /// Root letter of the scale (A..G).
    pub root: char,
    /// Probability gate for chord-tone and tonic remapping.
    pub chance: f64,
    /// `-`-separated chord names; trailing `m` marks a minor chord.
    #[serde(rename = "chord-progression")]
    pub chord_progression: String,
}

impl Default for StyleConfig {
    fn default() -> Self {
        StyleConfig {
            time: TimeConfig::default(),
            bpm: 80,
            fifths: 0,
            scale: "101011010101".to_string(),
            root: 'C',
            chance: 0.0,
            chord_progression: String::new(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct TimeConfig {
    pub beats: u8,
    #[serde(rename = "type")]
    pub beat_type: u8,
}

impl Default for TimeConfig {
    fn default() -> Self {
        TimeConfig {
            beats: 4,
            beat_type: 4,
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct ExportConfig {
    #[serde(flatten)]
    pub header: ScoreHeader,
    /// Output SMF path; no file is written when absent.
    pub filename: Option<PathBuf>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct PartConfig {
    pub name: String,
    /// Single pitched (or percussion) instrument for this part.
    pub instrument: Option<String>,
    /// Multiple unpitched voices sharing one staff.
    pub instruments: Vec<PercussionVoice>,
    pub clef: ClefConfig,
    pub lines: u8,
    /// Display pitch and notehead for a single percussion instrument.
    pub display: Option<String>,
    pub symbol: Option<String>,
    pub generation: GenerationConfig,
}

impl Default for PartConfig {
    fn default() -> Self {
        PartConfig {
            name: String::new(),
            instrument: None,
            instruments: Vec::new(),
            clef: ClefConfig::default(),
            lines: 5,
            display: None,
            symbol: None,
            generation: GenerationConfig::default(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct PercussionVoice {
    pub instrument: String,
    /// Staff position the voice is displayed at.
    pub display: String,
    /// Notehead symbol name.
    pub symbol: String,
}

impl Default for PercussionVoice {
    fn default() -> Self {
        PercussionVoice {
            instrument: String::new(),
            display: "C4".to_string(),
            symbol: "normal".to_string(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ClefConfig {
    pub sign: char,
    pub line: u8,
    #[serde(rename = "octave-change")]
    pub octave_change: i32,
}

impl Default for ClefConfig {
    fn default() -> Self {
        ClefConfig {
            sign: 'G',
            line: 2,
            octave_change: 0,
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct GenerationConfig {
    /// Pitch algorithm name; None falls back to the global setting.
    pub pitch: Option<String>,
    pub rhythm: Option<String>,
    pub chord: Option<String>,
    /// Option bags; when absent at the part level, the global bags apply.
    pub options: Option<Options>,
    /// Fraction of this part's chords converted to rests afterwards.
    #[serde(rename = "rest-ratio")]
    pub rest_ratio: f32,
}

/// Per-part generation settings after merging with the global defaults.
#[derive(Debug, Clone, Default)]
pub struct ResolvedGeneration {
    pub pitch: Option<String>,
    pub rhythm: Option<String>,
    pub chord: Option<String>,
    pub options: Options,
    pub rest_ratio: f32,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Options {
    pub pitch: PitchOptions,
    pub rhythm: RhythmOptions,
    pub chord: ChordOptions,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct PitchOptions {
    /// Brownian-motion window, in scale steps around the previous pitch.
    pub min: i64,
    pub max: i64,
    /// Accompaniment letter grammar (A/B/C per slice).
    pub schematic: Option<String>,
    /// Transition matrix CSV for the markov-chain algorithm.
    pub chain: Option<PathBuf>,
}

impl Default for PitchOptions {
    fn default() -> Self {
        PitchOptions {
            min: -3,
            max: 3,
            schematic: None,
            chain: None,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct RhythmOptions {
    /// Named duration bounds for the stochastic rhythm algorithms.
    pub smallest: String,
    pub largest: String,
    /// Fixed duration for the constant algorithm.
    pub duration: String,
    /// Brownian-motion window, in power-of-two duration steps.
    pub min: i64,
    pub max: i64,
    pub chain: Option<PathBuf>,
}

impl Default for RhythmOptions {
    fn default() -> Self {
        RhythmOptions {
            smallest: "256th".to_string(),
            largest: "long".to_string(),
            duration: "quarter".to_string(),
            min: -3,
            max: 3,
            chain: None,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ChordOptions {
    /// Fixed note count for the constant algorithm.
    pub amount: u32,
    /// Bounds for the random algorithm.
    pub min: u32,
    pub max: u32,
    /// Count → weight table for the weighted algorithm.
    pub weights: BTreeMap<String, f64>,
    pub chain: Option<PathBuf>,
}

impl Default for ChordOptions {
    fn default() -> Self {
        ChordOptions {
            amount: 1,
            min: 1,
            max: 1,
            weights: BTreeMap::new(),
            chain: None,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct InstrumentDef {
    pub channel: u8,
    pub program: u8,
    pub unpitched: u8,
}

impl Default for InstrumentDef {
    fn default() -> Self {
        InstrumentDef {
            channel: 0,
            program: 1,
            unpitched: 0,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn minimal_config_gets_defaults() {
        let config: Config = serde_json::from_str("{}").unwrap();
        assert_eq!(config.engine, "xoshiro256++");
        assert_eq!(config.length, 10);
        assert_eq!(config.style.time.beats, 4);
        assert_eq!(config.style.scale, "101011010101");
        assert_eq!(config.style.root, 'C');
        assert!(config.parts.is_empty());
    }

    #[test]
    fn full_config_parses() {
        let text = r#"{
            "engine": "lcg64",
            "seed": 17,
            "length": 4,
            "style": {
                "time": { "beats": 3, "type": 4 },
                "bpm": 96,
                "scale": "101011010101",
                "root": "D",
                "chance": 0.4,
                "chord-progression": "D-G-A-Bm"
            },
            "export": { "title": "Nocturne", "composer": "nobody", "filename": "out.mid" },
            "generation": { "rhythm": "random" },
            "parts": [
                {
                    "name": "lead",
                    "instrument": "violin",
                    "clef": { "sign": "G", "line": 2 },
                    "generation": {
                        "pitch": "brownian-motion",
                        "options": { "pitch": { "min": -2, "max": 2 } },
                        "rest-ratio": 0.1
                    }
                },
                {
                    "instrument": "cello",
                    "clef": { "sign": "F", "line": 4, "octave-change": 0 }
                }
            ]
        }"#;
        let config: Config = serde_json::from_str(text).unwrap();
        assert_eq!(config.style.chord_progression, "D-G-A-Bm");
        assert_eq!(config.export.header.title, "Nocturne");
        assert_eq!(config.parts.len(), 2);

        let lead = config.generation_for(&config.parts[0]);
        assert_eq!(lead.pitch.as_deref(), Some("brownian-motion"));
        assert_eq!(lead.rhythm.as_deref(), Some("random"), "global fallback");
        assert_eq!(lead.options.pitch.min, -2);
        assert!((lead.rest_ratio - 0.1).abs() < 1e-6);

        let cello = config.generation_for(&config.parts[1]);
        assert_eq!(cello.pitch, None);
        assert_eq!(cello.rhythm.as_deref(), Some("random"));
        assert_eq!(cello.options.pitch.min, -3, "default options");
    }

    #[test]
    fn instrument_lookup_prefers_config_definitions() {
        let text = r#"{
            "instruments": { "violin": { "program": 99 }, "custom-box": { "unpitched": 41 } }
        }"#;
        let config: Config = serde_json::from_str(text).unwrap();
        assert_eq!(config.instrument("violin").unwrap().program(), 99);
        assert!(config.instrument("custom-box").unwrap().is_percussion());
        assert_eq!(config.instrument("cello").unwrap().program(), 43);
        assert!(config.instrument("kazoo").is_err());
    }
}
