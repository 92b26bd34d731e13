// Cantus — a stochastic score composer.
//
// The engine builds a stream of pitched/rhythmic events per instrumental
// part from a library of stochastic algorithms (uniform ranges, bounded
// random walks, 1/f "pink" noise, Gaussian-weighted sampling,
// chord-progression-aware accompaniment, Markov-chain generation), and can
// learn Markov transition statistics from a corpus of MIDI scores.
//
// Architecture, leaf first:
// - note.rs: Note/Chord values, pitch-name helpers, duration decomposition
// - clef.rs, instrument.rs: staff signs and their ranges, MIDI voices
// - measure.rs: measures, overflow splitting ("measurize")
// - part.rs, score.rs: aggregates handed read-only to the exporters
// - matrix.rs: string-labeled float matrix with CSV persistence
// - chain.rs: stateful Markov sampler over a labeled matrix
// - trainer.rs: corpus walking and transition-matrix training
// - sampling.rs: weighted/Gaussian selection over the PRNG engines
// - scale.rs: chromatic mask + root → legal pitch sets
// - config.rs: typed JSON configuration
// - algorithms.rs: the pitch/rhythm/chord-count strategy library
// - generator.rs: the per-part event-stream construction
// - midi.rs: SMF export of a finished score
//
// Generation is deterministic given (engine name, seed, configuration).

pub mod algorithms;
pub mod chain;
pub mod clef;
pub mod config;
pub mod error;
pub mod generator;
pub mod instrument;
pub mod matrix;
pub mod measure;
pub mod midi;
pub mod note;
pub mod part;
pub mod sampling;
pub mod scale;
pub mod score;
pub mod trainer;
