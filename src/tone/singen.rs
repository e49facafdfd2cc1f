//! Fixed-point sine oscillator
//!
//! Produces `A * sin(n * w)` with the second order recurrence
//! `y[n] = 2cos(w) * y[n-1] - y[n-2]`, so each sample costs one multiply.
//! The multiplier is kept in Q30 and the state carries 16 extra fraction
//! bits below the 16-bit sample range.

use std::f64::consts::PI;

const COEF_SHIFT: u32 = 30;
const STATE_SHIFT: u32 = 16;

/// Full scale amplitude for a volume of 100.
pub const FULL_SCALE: f64 = 32767.0;

/// Sine generator state
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Singen {
    m: i64,
    n0: i64,
    n1: i64,
    seed: i64,
}

impl Singen {
    /// Volumes above 100 are clamped to full scale.
    pub fn new(frequency: u32, sample_rate: u32, volume: u32) -> Self {
        let w = 2.0 * PI * frequency as f64 / sample_rate.max(1) as f64;
        let amplitude = FULL_SCALE * volume.min(100) as f64 / 100.0;

        let m = (2.0 * w.cos() * (1u64 << COEF_SHIFT) as f64).round() as i64;
        let seed = (-amplitude * w.sin() * (1u64 << STATE_SHIFT) as f64).round() as i64;

        Self {
            m,
            n0: seed,
            n1: 0,
            seed,
        }
    }

    /// Restart the waveform at phase zero.
    pub fn reset(&mut self) {
        self.n0 = self.seed;
        self.n1 = 0;
    }

    /// Current sample, then advance. The first sample after construction or
    /// [`reset`](Self::reset) is `sin(0)`.
    pub fn next_sample(&mut self) -> i32 {
        let out = (self.n1 >> STATE_SHIFT) as i32;
        let n2 = ((self.m * self.n1) >> COEF_SHIFT) - self.n0;
        self.n0 = self.n1;
        self.n1 = n2;
        out
    }
}

/// Sample generation backends
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Backend {
    Singen(Singen),
}

impl Backend {
    pub fn next_sample(&mut self) -> i32 {
        match self {
            Self::Singen(singen) => singen.next_sample(),
        }
    }

    pub fn reset(&mut self) {
        match self {
            Self::Singen(singen) => singen.reset(),
        }
    }
}
