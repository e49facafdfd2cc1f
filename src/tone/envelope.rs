//! Amplitude envelopes applied at tone segment boundaries
//!
//! A linear ramp fades a segment in over its first `length` microseconds and
//! out over its last `length` microseconds, in `k2` discrete gain steps of
//! `k1` microseconds each. All time coordinates are relative to whatever
//! reference the owning tone passes to [`Envelope::apply`].

/// Width of one gain step in microseconds.
pub const RAMP_STEP: u32 = 100;

/// Envelope shape kinds
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EnvelopeShape {
    LinearRamp,
}

/// One edge of a linear ramp
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RampDef {
    pub start: u32,
    pub end: u32,
    pub k1: u32,
    pub k2: u32,
}

impl RampDef {
    fn new(start: u32, length: u32) -> Self {
        Self {
            start,
            end: start.saturating_add(length),
            k1: RAMP_STEP,
            k2: (length / RAMP_STEP).max(1),
        }
    }

    fn contains(&self, t: u32) -> bool {
        t > self.start && t < self.end
    }
}

/// Leading and trailing ramps of a segment
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LinearRamp {
    pub up: RampDef,
    /// `None` when the segment is too short for a separate trailing ramp.
    pub down: Option<RampDef>,
}

impl LinearRamp {
    fn new(length: u32, start: u32, end: u32) -> Self {
        let up = RampDef::new(start, length);
        let down = if (end as u64) < start as u64 + 2 * length as u64 {
            None
        } else {
            Some(RampDef::new(end - length, length))
        };

        Self { up, down }
    }

    fn update(&mut self, length: u32, end: u32) {
        self.down = Some(RampDef::new(end.saturating_sub(length), length));
    }

    fn apply(&self, sample: i32, t: u32) -> i32 {
        if self.up.contains(t) {
            let k3 = (t - self.up.start) / self.up.k1;
            return scale(sample, k3, self.up.k2);
        }

        if let Some(down) = &self.down {
            if down.contains(t) {
                let k3 = (down.end - t) / down.k1;
                return scale(sample, k3, down.k2);
            }
        }

        sample
    }

    fn apply_trailing(&self, sample: i32, t: u32) -> i32 {
        match &self.down {
            Some(down) if down.contains(t) => scale(sample, (down.end - t) / down.k1, down.k2),
            _ => sample,
        }
    }
}

fn scale(sample: i32, k3: u32, k2: u32) -> i32 {
    ((sample as i64 * k3 as i64) / k2 as i64) as i32
}

/// Gain envelope exclusively owned by one tone
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Envelope {
    LinearRamp(LinearRamp),
}

impl Envelope {
    /// Build ramp geometry for a segment spanning `[start, end)` with a ramp
    /// of `length` microseconds at each edge.
    pub fn new(shape: EnvelopeShape, length: u32, start: u32, end: u32) -> Self {
        match shape {
            EnvelopeShape::LinearRamp => Self::LinearRamp(LinearRamp::new(length, start, end)),
        }
    }

    pub fn shape(&self) -> EnvelopeShape {
        match self {
            Self::LinearRamp(_) => EnvelopeShape::LinearRamp,
        }
    }

    /// Recompute the trailing ramp for a new segment end. The leading ramp
    /// never changes once created.
    pub fn update(&mut self, length: u32, end: u32) {
        match self {
            Self::LinearRamp(ramp) => ramp.update(length, end),
        }
    }

    /// Scale `sample` by the envelope gain at time `t`.
    pub fn apply(&self, sample: i32, t: u32) -> i32 {
        match self {
            Self::LinearRamp(ramp) => ramp.apply(sample, t),
        }
    }

    /// Like [`Envelope::apply`] with the leading ramp ignored.
    pub fn apply_trailing(&self, sample: i32, t: u32) -> i32 {
        match self {
            Self::LinearRamp(ramp) => ramp.apply_trailing(sample, t),
        }
    }

    pub fn has_trailing_ramp(&self) -> bool {
        match self {
            Self::LinearRamp(ramp) => ramp.down.is_some(),
        }
    }
}
