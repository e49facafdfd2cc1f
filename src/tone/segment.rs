//! Tone segments and the per-stream tone chain
//!
//! A [`Tone`] is one playable waveform fragment: a sine generator gated by a
//! cadence (`play` microseconds audible out of every `period`), active inside
//! an absolute `[start, end)` window on its stream's clock, and shaped by an
//! optional envelope at its edges. Tones created by one request share a
//! group id so that the request can be torn down as a unit.

use std::fmt;

use tracing::{debug, trace};

use crate::audio::Stream;
use crate::tone::envelope::{Envelope, EnvelopeShape};
use crate::tone::singen::{Backend, Singen};

/// Length of the fade in/out ramps in microseconds.
pub const RAMP_LENGTH: u32 = 10_000;

/// End time of a tone that plays until it is explicitly stopped.
pub const UNBOUNDED: u64 = u64::MAX;

pub type ToneId = u64;
pub type GroupId = u64;

/// Semantic tone kinds
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ToneKind {
    Dial,
    Busy,
    Congestion,
    RadioAck,
    RadioNoAnswer,
    Error,
    Wait,
    Ring,
    /// DTMF row tone sharing the indicator stream
    DtmfIndicatorLow,
    /// DTMF column tone sharing the indicator stream
    DtmfIndicatorHigh,
    DtmfLow,
    DtmfHigh,
    Note,
}

impl ToneKind {
    pub fn is_indicator(self) -> bool {
        matches!(
            self,
            Self::Dial
                | Self::Busy
                | Self::Congestion
                | Self::RadioAck
                | Self::RadioNoAnswer
                | Self::Error
                | Self::Wait
                | Self::Ring
        )
    }

    pub fn is_dtmf(self) -> bool {
        matches!(
            self,
            Self::DtmfIndicatorLow | Self::DtmfIndicatorHigh | Self::DtmfLow | Self::DtmfHigh
        )
    }

    pub fn name(self) -> &'static str {
        match self {
            Self::Dial => "dial",
            Self::Busy => "busy",
            Self::Congestion => "congestion",
            Self::RadioAck => "radio-ack",
            Self::RadioNoAnswer => "radio-no-answer",
            Self::Error => "error",
            Self::Wait => "wait",
            Self::Ring => "ring",
            Self::DtmfIndicatorLow => "dtmf-indicator-low",
            Self::DtmfIndicatorHigh => "dtmf-indicator-high",
            Self::DtmfLow => "dtmf-low",
            Self::DtmfHigh => "dtmf-high",
            Self::Note => "note",
        }
    }
}

impl fmt::Display for ToneKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Whether tones of `kind` may be chained onto a stream owned by another
/// tone class and survive when that class is interrupted. Only DTMF tones
/// are protected this way.
pub fn chainable(kind: ToneKind) -> bool {
    kind.is_dtmf()
}

/// Which part of the chain a destroy removes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Teardown {
    /// Only the targeted tone; siblings keep playing.
    Segment,
    /// The targeted tone and every tone created with it.
    Group,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ToneState {
    Pending,
    Active,
    Expired,
}

/// Parameters of a tone request. Times are microseconds; `start` is relative
/// to the stream clock at creation and a `duration` of 0 means unbounded.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ToneSpec {
    pub kind: ToneKind,
    pub frequency: u32,
    pub volume: u32,
    pub period: u32,
    pub play: u32,
    pub start: u32,
    pub duration: u32,
}

impl ToneSpec {
    /// A steady tone starting now and playing until stopped.
    pub fn continuous(kind: ToneKind, frequency: u32, volume: u32) -> Self {
        Self {
            kind,
            frequency,
            volume,
            period: 1_000_000,
            play: 1_000_000,
            start: 0,
            duration: 0,
        }
    }

    pub fn is_cadenced(&self) -> bool {
        self.period > 0 && self.play < self.period
    }
}

/// A single waveform fragment
#[derive(Debug, Clone)]
pub struct Tone {
    pub id: ToneId,
    pub group: GroupId,
    pub kind: ToneKind,
    pub frequency: u32,
    pub volume: u32,
    pub period: u32,
    pub play: u32,
    pub start: u64,
    pub end: u64,
    backend: Backend,
    envelope: Option<Envelope>,
    /// Envelope time restarts at every cadence cycle.
    relative_envelope: bool,
    /// Fade-out at the absolute end of a finite cadenced tone, which may
    /// fall inside a burst.
    tail: Option<Envelope>,
    cycle: u64,
}

impl Tone {
    fn new(id: ToneId, group: GroupId, spec: &ToneSpec, now: u64, sample_rate: u32) -> Self {
        let start = now + spec.start as u64;
        let end = match spec.duration {
            0 => UNBOUNDED,
            d => start + d as u64,
        };

        let relative_envelope = spec.is_cadenced();
        let envelope = if relative_envelope {
            Envelope::new(EnvelopeShape::LinearRamp, RAMP_LENGTH, 0, spec.play)
        } else {
            Envelope::new(EnvelopeShape::LinearRamp, RAMP_LENGTH, 0, spec.duration)
        };

        let tail = (relative_envelope && spec.duration > 0).then(|| {
            let mut tail = Envelope::new(EnvelopeShape::LinearRamp, RAMP_LENGTH, 0, spec.duration);
            tail.update(RAMP_LENGTH, spec.duration);
            tail
        });

        Self {
            id,
            group,
            kind: spec.kind,
            frequency: spec.frequency,
            volume: spec.volume,
            period: spec.period,
            play: spec.play,
            start,
            end,
            backend: Backend::Singen(Singen::new(spec.frequency, sample_rate, spec.volume)),
            envelope: Some(envelope),
            relative_envelope,
            tail,
            cycle: 0,
        }
    }

    pub fn state(&self, t: u64) -> ToneState {
        if t < self.start {
            ToneState::Pending
        } else if t < self.end {
            ToneState::Active
        } else {
            ToneState::Expired
        }
    }

    pub fn envelope(&self) -> Option<&Envelope> {
        self.envelope.as_ref()
    }

    pub fn is_unbounded(&self) -> bool {
        self.end == UNBOUNDED
    }

    /// Push a finite end `extra` microseconds later and move the trailing
    /// ramp with it. Unbounded tones are left alone.
    pub fn prolong(&mut self, extra: u32) {
        if self.is_unbounded() {
            return;
        }

        self.end = self.end.saturating_add(extra as u64);
        let length = (self.end - self.start).min(u32::MAX as u64) as u32;
        if let Some(tail) = self.tail.as_mut() {
            tail.update(RAMP_LENGTH, length);
        } else if !self.relative_envelope {
            if let Some(envelope) = self.envelope.as_mut() {
                envelope.update(RAMP_LENGTH, length);
            }
        }
        trace!("tone {} ({}) prolonged to {}", self.id, self.kind, self.end);
    }

    /// Next sample for time `t`, which must lie inside the active window.
    fn sample_at(&mut self, t: u64) -> i32 {
        let elapsed = t - self.start;

        let position = if self.relative_envelope {
            let cycle = elapsed / self.period as u64;
            if cycle != self.cycle {
                self.cycle = cycle;
                self.backend.reset();
            }

            let position = elapsed % self.period as u64;
            if position >= self.play as u64 {
                return 0;
            }
            position
        } else {
            elapsed
        };

        let mut sample = self.backend.next_sample();
        if let Some(envelope) = &self.envelope {
            sample = envelope.apply(sample, position.min(u32::MAX as u64) as u32);
        }
        if let Some(tail) = &self.tail {
            sample = tail.apply_trailing(sample, elapsed.min(u32::MAX as u64) as u32);
        }
        sample
    }
}

/// Owned list of the tones playing on one stream
#[derive(Debug, Default)]
pub struct ToneChain {
    tones: Vec<Tone>,
    next_id: ToneId,
    next_group: GroupId,
}

impl ToneChain {
    pub fn new() -> Self {
        Self::default()
    }

    /// Allocate a group id for the tones of one request.
    pub fn new_group(&mut self) -> GroupId {
        self.next_group += 1;
        self.next_group
    }

    /// Create a tone on the chain. `now` is the stream clock in microseconds.
    pub fn create(
        &mut self,
        now: u64,
        sample_rate: u32,
        group: GroupId,
        spec: &ToneSpec,
    ) -> ToneId {
        self.next_id += 1;
        let tone = Tone::new(self.next_id, group, spec, now, sample_rate);

        debug!(
            "create {} tone {}: {} Hz vol {} period {} play {} window {}..{}",
            tone.kind,
            tone.id,
            spec.frequency,
            spec.volume,
            spec.period,
            spec.play,
            tone.start,
            if tone.is_unbounded() { "stop".to_string() } else { tone.end.to_string() }
        );

        let id = tone.id;
        self.tones.push(tone);
        id
    }

    /// Remove a tone, and with [`Teardown::Group`] every tone created with it.
    /// Returns the number of tones removed.
    pub fn destroy(&mut self, id: ToneId, mode: Teardown) -> usize {
        let group = match self.get(id) {
            Some(tone) => tone.group,
            None => return 0,
        };

        let before = self.tones.len();
        match mode {
            Teardown::Segment => self.tones.retain(|t| t.id != id),
            Teardown::Group => self.tones.retain(|t| t.group != group),
        }

        let removed = before - self.tones.len();
        trace!("destroyed {} tone(s) starting at {}", removed, id);
        removed
    }

    /// Remove every tone whose kind is not chainable, preserving DTMF tones.
    pub fn retain_chainable(&mut self) -> usize {
        self.remove_where(|t| !chainable(t.kind))
    }

    pub fn remove_where<F>(&mut self, mut pred: F) -> usize
    where
        F: FnMut(&Tone) -> bool,
    {
        let before = self.tones.len();
        self.tones.retain(|t| !pred(t));
        before - self.tones.len()
    }

    pub fn clear(&mut self) -> usize {
        let removed = self.tones.len();
        self.tones.clear();
        removed
    }

    pub fn get(&self, id: ToneId) -> Option<&Tone> {
        self.tones.iter().find(|t| t.id == id)
    }

    pub fn get_mut(&mut self, id: ToneId) -> Option<&mut Tone> {
        self.tones.iter_mut().find(|t| t.id == id)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Tone> {
        self.tones.iter()
    }

    pub fn iter_mut(&mut self) -> impl Iterator<Item = &mut Tone> {
        self.tones.iter_mut()
    }

    pub fn len(&self) -> usize {
        self.tones.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tones.is_empty()
    }

    fn reap(&mut self, now: u64) -> usize {
        self.remove_where(|t| t.state(now) == ToneState::Expired)
    }
}

/// Fill one audio buffer for `stream` from its tone chain.
///
/// Every pending or active tone is visited for each sample; active ones are
/// gated by their cadence, shaped by their envelope and summed. Tones whose
/// window has elapsed by the end of the buffer are unlinked. Returns the
/// number of samples up to the last one covered by a live tone.
pub fn write_callback(stream: &mut Stream, buf: &mut [i16]) -> usize {
    let rate = stream.sample_rate().max(1) as u64;
    let position = stream.position();
    let mut produced = 0;

    for (i, out) in buf.iter_mut().enumerate() {
        let t = (position + i as u64) * 1_000_000 / rate;
        let mut acc: i32 = 0;
        let mut live = false;

        for tone in stream.tones_mut().iter_mut() {
            match tone.state(t) {
                ToneState::Pending => live = true,
                ToneState::Active => {
                    live = true;
                    acc += tone.sample_at(t);
                }
                ToneState::Expired => {}
            }
        }

        *out = acc.clamp(i16::MIN as i32, i16::MAX as i32) as i16;
        if live {
            produced = i + 1;
        }
    }

    stream.advance(buf.len() as u64);

    let now = stream.time();
    let expired = stream.tones_mut().reap(now);
    if expired > 0 {
        trace!("stream {}: {} tone(s) expired at {}", stream.name(), expired, now);
    }

    produced
}

/// Release hook for a stream's tone chain: destroys every remaining tone.
pub fn destroy_callback(chain: &mut ToneChain) -> usize {
    let removed = chain.clear();
    if removed > 0 {
        debug!("released {} tone(s) with their stream", removed);
    }
    removed
}
