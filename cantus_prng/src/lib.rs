// Deterministic, portable pseudo-random engines.
//
// Every stochastic decision in the composer flows through a `RandomEngine`
// chosen by name in the configuration and seeded explicitly. All generators
// here are hand-rolled integer-arithmetic implementations, chosen for
// portability and to guarantee identical output across all platforms: given
// the same engine name, seed, and call order, the byte stream is identical
// everywhere.
//
// **Critical constraint: determinism.** Do not introduce floating-point
// arithmetic into the core generators, the stdlib RNG, or any other source of
// platform variance into this crate.

use serde::{Deserialize, Serialize};

/// Raised by [`engine_by_name`] when the requested engine does not exist.
#[derive(Debug, thiserror::Error)]
#[error("no such random engine '{0}'")]
pub struct UnknownEngine(pub String);

/// A seedable uniform random source.
///
/// The engine is threaded as `&mut dyn RandomEngine` through generation and
/// sampling code; it is never shared between call stacks, so reproducibility
/// depends only on (engine name, seed, call order).
pub trait RandomEngine {
    /// Generate the next `u64` in the sequence.
    fn next_u64(&mut self) -> u64;

    /// Re-seed the engine, restarting its sequence.
    fn seed(&mut self, seed: u64);

    /// The name this engine is registered under in [`engine_by_name`].
    fn name(&self) -> &'static str;

    /// Generate a uniform `f64` in [0, 1).
    ///
    /// Uses the upper 53 bits of a `u64` to fill the mantissa of an f64.
    fn next_f64(&mut self) -> f64 {
        (self.next_u64() >> 11) as f64 / (1u64 << 53) as f64
    }

    /// Generate a uniform integer in `[low, high)`.
    ///
    /// Uses rejection sampling to avoid modulo bias. Panics if `low >= high`.
    fn uniform(&mut self, low: i64, high: i64) -> i64 {
        assert!(low < high, "uniform: low must be less than high");
        let range = high.wrapping_sub(low) as u64;
        if range.is_power_of_two() {
            return low.wrapping_add((self.next_u64() & (range - 1)) as i64);
        }
        let threshold = range.wrapping_neg() % range; // = (2^64 - range) % range
        loop {
            let r = self.next_u64();
            if r >= threshold {
                return low.wrapping_add((r % range) as i64);
            }
        }
    }

    /// Generate a uniform `f64` in `[low, high)`.
    ///
    /// Panics if `low >= high`.
    fn uniform_real(&mut self, low: f64, high: f64) -> f64 {
        assert!(low < high, "uniform_real: low must be less than high");
        low + self.next_f64() * (high - low)
    }
}

/// Construct an engine by its configuration name.
///
/// Recognized names: `xoshiro256++` (alias `xoshiro`), `splitmix64`, `lcg64`.
pub fn engine_by_name(name: &str, seed: u64) -> Result<Box<dyn RandomEngine>, UnknownEngine> {
    match name {
        "xoshiro256++" | "xoshiro" => Ok(Box::new(Xoshiro256pp::new(seed))),
        "splitmix64" => Ok(Box::new(SplitMix64::new(seed))),
        "lcg64" => Ok(Box::new(Lcg64::new(seed))),
        _ => Err(UnknownEngine(name.to_string())),
    }
}

/// Xoshiro256++ (Blackman & Vigna, 2019), seeded via SplitMix64.
///
/// The default engine: fast, well distributed, and with a period long past
/// anything a score generation run can consume.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Xoshiro256pp {
    s: [u64; 4],
}

impl Xoshiro256pp {
    /// Create a new engine, expanding the seed into the 256-bit state with
    /// SplitMix64 as recommended by the xoshiro authors.
    pub fn new(seed: u64) -> Self {
        let mut sm = seed;
        Self {
            s: [
                splitmix64_step(&mut sm),
                splitmix64_step(&mut sm),
                splitmix64_step(&mut sm),
                splitmix64_step(&mut sm),
            ],
        }
    }
}

impl RandomEngine for Xoshiro256pp {
    fn next_u64(&mut self) -> u64 {
        let result = (self.s[0].wrapping_add(self.s[3]))
            .rotate_left(23)
            .wrapping_add(self.s[0]);

        let t = self.s[1] << 17;

        self.s[2] ^= self.s[0];
        self.s[3] ^= self.s[1];
        self.s[1] ^= self.s[2];
        self.s[0] ^= self.s[3];

        self.s[2] ^= t;
        self.s[3] = self.s[3].rotate_left(45);

        result
    }

    fn seed(&mut self, seed: u64) {
        *self = Self::new(seed);
    }

    fn name(&self) -> &'static str {
        "xoshiro256++"
    }
}

/// SplitMix64 as a standalone engine.
///
/// A tiny 64-bit state generator; weaker than xoshiro but useful when the
/// whole engine state must stay small and comparisons across engines are
/// wanted.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct SplitMix64 {
    state: u64,
}

impl SplitMix64 {
    pub fn new(seed: u64) -> Self {
        Self { state: seed }
    }
}

impl RandomEngine for SplitMix64 {
    fn next_u64(&mut self) -> u64 {
        splitmix64_step(&mut self.state)
    }

    fn seed(&mut self, seed: u64) {
        self.state = seed;
    }

    fn name(&self) -> &'static str {
        "splitmix64"
    }
}

/// 64-bit linear congruential generator (Knuth MMIX constants).
///
/// The classic fallback engine. Low bits have short periods, so the output
/// is the bit-reversed state — callers that mask low bits still get full
/// quality.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Lcg64 {
    state: u64,
}

impl Lcg64 {
    pub fn new(seed: u64) -> Self {
        Self { state: seed }
    }
}

impl RandomEngine for Lcg64 {
    fn next_u64(&mut self) -> u64 {
        self.state = self
            .state
            .wrapping_mul(6_364_136_223_846_793_005)
            .wrapping_add(1_442_695_040_888_963_407);
        self.state.reverse_bits()
    }

    fn seed(&mut self, seed: u64) {
        self.state = seed;
    }

    fn name(&self) -> &'static str {
        "lcg64"
    }
}

/// One SplitMix64 step; also used to expand seeds for xoshiro256++.
fn splitmix64_step(state: &mut u64) -> u64 {
    *state = state.wrapping_add(0x9e37_79b9_7f4a_7c15);
    let mut z = *state;
    z = (z ^ (z >> 30)).wrapping_mul(0xbf58_476d_1ce4_e5b9);
    z = (z ^ (z >> 27)).wrapping_mul(0x94d0_49bb_1331_11eb);
    z ^ (z >> 31)
}
