//! DTMF (Dual-Tone Multi-Frequency) playback
//!
//! DTMF digits are played as a pair of protected tones. When the indicator
//! stream exists the pair is chained onto it, so an indicator tone and a
//! keypress can overlap and either one can be stopped without silencing the
//! other; otherwise the digit gets its own stream.

use tracing::{debug, trace};

use crate::audio::{AudioServer, StreamProperties};
use crate::tone::indicator::MAX_TONE_LENGTH;
use crate::tone::segment::{GroupId, ToneKind, ToneSpec};
use crate::{Error, Result};

/// RFC 4733 events below this value are DTMF digits.
pub const DTMF_MAX: u32 = 16;

pub const DTMF_STREAM: &str = "dtmf";

const LOW_FREQS: [u32; 4] = [697, 770, 852, 941];
const HIGH_FREQS: [u32; 4] = [1209, 1336, 1477, 1633];

/// Digit for an RFC 4733 event code (0-9, `*`, `#`, A-D).
pub fn event_digit(event: u32) -> Option<char> {
    match event {
        0..=9 => char::from_digit(event, 10),
        10 => Some('*'),
        11 => Some('#'),
        12..=15 => Some((b'A' + (event - 12) as u8) as char),
        _ => None,
    }
}

/// Row and column frequencies for an RFC 4733 event code.
pub fn dtmf_frequencies(event: u32) -> Option<(u32, u32)> {
    let (row, col) = match event_digit(event)? {
        '1' => (0, 0),
        '2' => (0, 1),
        '3' => (0, 2),
        'A' => (0, 3),
        '4' => (1, 0),
        '5' => (1, 1),
        '6' => (1, 2),
        'B' => (1, 3),
        '7' => (2, 0),
        '8' => (2, 1),
        '9' => (2, 2),
        'C' => (2, 3),
        '*' => (3, 0),
        '0' => (3, 1),
        '#' => (3, 2),
        'D' => (3, 3),
        _ => return None,
    };
    Some((LOW_FREQS[row], HIGH_FREQS[col]))
}

/// The DTMF generator the control plane drives
pub trait DtmfPlayer: Send {
    /// Start `event` at `volume` (0-100) for `duration` microseconds, 0 for
    /// until stopped. Replaces any digit already playing.
    fn play(
        &mut self,
        server: &mut AudioServer,
        event: u32,
        volume: u32,
        duration: u32,
    ) -> Result<()>;

    /// Stop whatever digit is playing.
    fn stop(&mut self, server: &mut AudioServer);

    /// Properties for streams created from now on.
    fn set_properties(&mut self, properties: Option<StreamProperties>);
}

#[derive(Debug, Clone)]
struct ActiveDigit {
    stream: String,
    group: GroupId,
    event: u32,
}

/// DTMF player built on the tone chain
#[derive(Debug)]
pub struct ToneDtmf {
    indicator_stream: String,
    properties: Option<StreamProperties>,
    active: Option<ActiveDigit>,
}

impl ToneDtmf {
    pub fn new(indicator_stream: &str) -> Self {
        Self {
            indicator_stream: indicator_stream.to_string(),
            properties: None,
            active: None,
        }
    }

    pub fn active_event(&self) -> Option<u32> {
        self.active.as_ref().map(|a| a.event)
    }

    /// Extend the digit already playing instead of restarting it. Returns
    /// false when there is nothing to extend.
    fn prolong(&self, server: &mut AudioServer, event: u32, duration: u32) -> bool {
        let active = match &self.active {
            Some(active) if active.event == event && duration > 0 => active,
            _ => return false,
        };
        let stream = match server.stream_find_mut(&active.stream) {
            Some(stream) => stream,
            None => return false,
        };

        let mut extended = 0;
        for tone in stream.tones_mut().iter_mut() {
            if tone.group == active.group && !tone.is_unbounded() {
                tone.prolong(duration);
                extended += 1;
            }
        }

        trace!("DTMF {}: prolonged {} tone(s) by {} us", event, extended, duration);
        extended > 0
    }
}

impl DtmfPlayer for ToneDtmf {
    fn play(
        &mut self,
        server: &mut AudioServer,
        event: u32,
        volume: u32,
        duration: u32,
    ) -> Result<()> {
        let (low, high) = dtmf_frequencies(event).ok_or(Error::UnknownEvent(event))?;

        if self.prolong(server, event, duration) {
            return Ok(());
        }
        self.stop(server);

        let on_indicator = server.stream_find(&self.indicator_stream).is_some();
        let (name, kinds) = if on_indicator {
            (
                self.indicator_stream.clone(),
                (ToneKind::DtmfIndicatorLow, ToneKind::DtmfIndicatorHigh),
            )
        } else {
            (DTMF_STREAM.to_string(), (ToneKind::DtmfLow, ToneKind::DtmfHigh))
        };

        if !on_indicator {
            server.stream_create(&name, self.properties.as_ref())?;
        }
        let stream = server
            .stream_find_mut(&name)
            .ok_or_else(|| Error::resource(format!("no stream '{}'", name)))?;

        let vol = volume.min(100) * 7 / 10;
        let group = stream.tones_mut().new_group();
        for (kind, frequency) in [(kinds.0, low), (kinds.1, high)] {
            let spec = ToneSpec {
                duration,
                ..ToneSpec::continuous(kind, frequency, vol)
            };
            stream.create_tone(group, &spec);
        }

        if !on_indicator {
            let timeout = if duration > 0 { duration as u64 } else { MAX_TONE_LENGTH };
            server.stream_set_timeout(&name, timeout)?;
        }

        debug!(
            "DTMF '{}' ({} + {} Hz) on stream '{}'",
            event_digit(event).unwrap_or('?'),
            low,
            high,
            name
        );

        self.active = Some(ActiveDigit {
            stream: name,
            group,
            event,
        });
        Ok(())
    }

    fn stop(&mut self, server: &mut AudioServer) {
        if let Some(stream) = server.stream_find_mut(&self.indicator_stream) {
            let removed = stream.tones_mut().remove_where(|t| t.kind.is_dtmf());
            if removed > 0 {
                trace!("removed {} DTMF tone(s) from '{}'", removed, self.indicator_stream);
            }
        }
        server.stream_destroy(DTMF_STREAM);
        self.active = None;
    }

    fn set_properties(&mut self, properties: Option<StreamProperties>) {
        self.properties = properties;
    }
}
