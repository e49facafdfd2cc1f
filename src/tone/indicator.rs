//! Call-progress indicator tones
//!
//! Expands a semantic indicator request (dial, busy, ring, ...) into the
//! tone segments prescribed by the configured national standard and plays
//! them on the well-known indicator stream. A new request always preempts
//! the previous indicator tone.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use tracing::{debug, error, info, trace};

use crate::audio::{AudioServer, StreamProperties};
use crate::protocols::dtmf::DtmfPlayer;
use crate::tone::segment::{ToneKind, ToneSpec};
use crate::{Error, Result};

/// Stream timeout for tones without a requested duration.
pub const MAX_TONE_LENGTH: u64 = 60 * 1_000_000;

/// Stream timeout for inherently brief patterns, so a silent stream is not
/// kept around for the full minute after they finish.
pub const MAX_SHORT_TONE_LENGTH: u64 = 5 * 1_000_000;

pub const INDICATOR_STREAM: &str = "indicator";

/// National signalling standards
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Standard {
    Cept = 1,
    Ansi = 2,
    Atnt = 3,
    Japan = 4,
}

impl Standard {
    pub const ALL: [Standard; 4] = [Self::Cept, Self::Ansi, Self::Atnt, Self::Japan];

    pub fn from_raw(raw: i32) -> Option<Self> {
        Self::ALL.into_iter().find(|s| *s as i32 == raw)
    }

    pub fn name(self) -> &'static str {
        match self {
            Self::Cept => "cept",
            Self::Ansi => "ansi",
            Self::Atnt => "atnt",
            Self::Japan => "japan",
        }
    }
}

impl fmt::Display for Standard {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Standard {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "cept" | "eu" => Ok(Self::Cept),
            "ansi" | "us" => Ok(Self::Ansi),
            "atnt" | "at&t" | "att" => Ok(Self::Atnt),
            "japan" | "jp" => Ok(Self::Japan),
            _ => Err(Error::invalid_argument(format!("unknown standard '{}'", s))),
        }
    }
}

/// How long a catalog segment plays
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Span {
    /// The duration of the request (0: until stopped).
    Requested,
    /// A fixed number of microseconds (0: until stopped).
    Fixed(u32),
}

/// One catalog entry: a tone relative to the request
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Segment {
    pub frequency: u32,
    /// Percentage of the request volume.
    pub gain: u32,
    pub period: u32,
    pub play: u32,
    pub offset: u32,
    pub span: Span,
}

impl Segment {
    fn spec(&self, kind: ToneKind, volume: u32, duration: u32) -> ToneSpec {
        ToneSpec {
            kind,
            frequency: self.frequency,
            volume: ((volume as u64 * self.gain as u64) / 100) as u32,
            period: self.period,
            play: self.play,
            start: self.offset,
            duration: match self.span {
                Span::Requested => duration,
                Span::Fixed(d) => d,
            },
        }
    }
}

/// Stream timeout policy of a pattern
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Ceiling {
    /// The request duration, or [`MAX_TONE_LENGTH`] when unbounded.
    Requested,
    Long,
    Short,
}

impl Ceiling {
    pub fn timeout(self, duration: u32) -> u64 {
        match self {
            Self::Requested if duration > 0 => duration as u64,
            Self::Requested | Self::Long => MAX_TONE_LENGTH,
            Self::Short => MAX_SHORT_TONE_LENGTH,
        }
    }
}

const fn seg(
    frequency: u32,
    gain: u32,
    period: u32,
    play: u32,
    offset: u32,
    span: Span,
) -> Segment {
    Segment {
        frequency,
        gain,
        period,
        play,
        offset,
        span,
    }
}

const UNTIL_STOPPED: Span = Span::Fixed(0);
const REQ: Span = Span::Requested;

const SILENT: [Segment; 0] = [];

const CEPT_DIAL: [Segment; 1] = [seg(425, 100, 1_000_000, 1_000_000, 0, UNTIL_STOPPED)];
const US_DIAL: [Segment; 2] = [
    seg(350, 70, 1_000_000, 1_000_000, 0, UNTIL_STOPPED),
    seg(440, 70, 1_000_000, 1_000_000, 0, UNTIL_STOPPED),
];
const JAPAN_DIAL: [Segment; 1] = [seg(400, 100, 1_000_000, 1_000_000, 0, UNTIL_STOPPED)];

const CEPT_BUSY: [Segment; 1] = [seg(425, 100, 1_000_000, 500_000, 0, REQ)];
const US_BUSY: [Segment; 2] = [
    seg(480, 70, 1_000_000, 500_000, 0, REQ),
    seg(620, 70, 1_000_000, 500_000, 0, REQ),
];
// also stands in for the Japanese tones that have no standard pattern
const JAPAN_BUSY: [Segment; 1] = [seg(400, 100, 1_000_000, 500_000, 0, REQ)];

const CEPT_CONGESTION: [Segment; 1] = [seg(425, 100, 400_000, 200_000, 0, REQ)];
const US_CONGESTION: [Segment; 2] = [
    seg(480, 70, 500_000, 250_000, 0, REQ),
    seg(620, 70, 500_000, 250_000, 0, REQ),
];

const RADIO_ACK: [Segment; 1] = [seg(425, 100, 200_000, 200_000, 0, Span::Fixed(200_000))];
const JAPAN_RADIO_ACK: [Segment; 1] = [seg(400, 100, 3_000_000, 1_000_000, 0, UNTIL_STOPPED)];

const RADIO_NO_ANSWER: [Segment; 1] = [seg(425, 100, 400_000, 200_000, 0, Span::Fixed(1_200_000))];

const ERROR: [Segment; 3] = [
    seg(900, 100, 2_000_000, 333_333, 0, REQ),
    seg(1400, 100, 2_000_000, 332_857, 333_333, REQ),
    seg(1800, 100, 2_000_000, 300_000, 666_190, REQ),
];

const CEPT_WAIT: [Segment; 2] = [
    seg(425, 100, 800_000, 200_000, 0, Span::Fixed(1_000_000)),
    seg(425, 100, 800_000, 200_000, 4_000_000, Span::Fixed(1_000_000)),
];
const ANSI_WAIT: [Segment; 3] = [
    seg(440, 100, 300_000, 300_000, 0, Span::Fixed(300_000)),
    seg(440, 100, 10_000_000, 100_000, 10_000_000, UNTIL_STOPPED),
    seg(440, 100, 10_000_000, 100_000, 10_200_000, UNTIL_STOPPED),
];
const ATNT_WAIT: [Segment; 2] = [
    seg(440, 100, 4_000_000, 200_000, 0, UNTIL_STOPPED),
    seg(440, 100, 4_000_000, 200_000, 500_000, UNTIL_STOPPED),
];

const CEPT_RING: [Segment; 1] = [seg(425, 100, 5_000_000, 1_000_000, 0, UNTIL_STOPPED)];
const US_RING: [Segment; 2] = [
    seg(440, 70, 6_000_000, 2_000_000, 0, UNTIL_STOPPED),
    seg(480, 70, 6_000_000, 2_000_000, 0, UNTIL_STOPPED),
];

/// Segments played for `kind` under `standard`. Empty for combinations the
/// standard leaves silent and for non-indicator kinds.
pub fn pattern(kind: ToneKind, standard: Standard) -> &'static [Segment] {
    use Standard::*;
    use ToneKind as K;

    match (kind, standard) {
        (K::Dial, Cept) => &CEPT_DIAL,
        (K::Dial, Ansi | Atnt) => &US_DIAL,
        (K::Dial, Japan) => &JAPAN_DIAL,

        (K::Busy, Cept) => &CEPT_BUSY,
        (K::Busy, Ansi | Atnt) => &US_BUSY,
        (K::Busy, Japan) => &JAPAN_BUSY,

        (K::Congestion, Cept) => &CEPT_CONGESTION,
        (K::Congestion, Ansi | Atnt) => &US_CONGESTION,
        (K::Congestion, Japan) => &JAPAN_BUSY,

        (K::RadioAck, Cept | Ansi | Atnt) => &RADIO_ACK,
        (K::RadioAck, Japan) => &JAPAN_RADIO_ACK,

        (K::RadioNoAnswer, Cept | Ansi | Atnt) => &RADIO_NO_ANSWER,
        (K::RadioNoAnswer, Japan) => &SILENT,

        (K::Error, Cept | Ansi | Atnt) => &ERROR,
        (K::Error, Japan) => &JAPAN_BUSY,

        (K::Wait, Cept) => &CEPT_WAIT,
        (K::Wait, Ansi) => &ANSI_WAIT,
        (K::Wait, Atnt) => &ATNT_WAIT,
        (K::Wait, Japan) => &SILENT,

        (K::Ring, Cept) => &CEPT_RING,
        (K::Ring, Ansi | Atnt) => &US_RING,
        (K::Ring, Japan) => &SILENT,

        _ => &SILENT,
    }
}

/// Stream timeout policy for `kind` under `standard`.
pub fn ceiling(kind: ToneKind, standard: Standard) -> Ceiling {
    match kind {
        ToneKind::Dial | ToneKind::Wait | ToneKind::Ring => Ceiling::Long,
        ToneKind::RadioAck if standard == Standard::Japan => Ceiling::Long,
        ToneKind::RadioAck | ToneKind::RadioNoAnswer => Ceiling::Short,
        _ => Ceiling::Requested,
    }
}

/// Indicator session state
#[derive(Debug, Clone)]
pub struct Indicator {
    standard: Standard,
    volume_scale: u32,
    properties: Option<StreamProperties>,
    stream_name: String,
}

impl Indicator {
    pub fn new(stream_name: &str) -> Self {
        Self {
            standard: Standard::Cept,
            volume_scale: 100,
            properties: None,
            stream_name: stream_name.to_string(),
        }
    }

    pub fn standard(&self) -> Standard {
        self.standard
    }

    pub fn volume_scale(&self) -> u32 {
        self.volume_scale
    }

    pub fn properties(&self) -> Option<&StreamProperties> {
        self.properties.as_ref()
    }

    pub fn stream_name(&self) -> &str {
        &self.stream_name
    }

    /// Play an indicator tone, preempting whatever indicator tone is playing.
    /// `duration` is in microseconds, 0 for the pattern's natural length.
    pub fn play(
        &self,
        server: &mut AudioServer,
        dtmf: &mut dyn DtmfPlayer,
        kind: ToneKind,
        volume: u32,
        duration: u32,
    ) -> Result<()> {
        if !kind.is_indicator() {
            error!("Invalid indicator type {}", kind);
            return Err(Error::invalid_argument(format!("{} is not an indicator tone", kind)));
        }

        if server.stream_find(&self.stream_name).is_some() {
            dtmf.stop(server);
            self.stop(server, false);
        } else if let Err(e) = server.stream_create(&self.stream_name, self.properties.as_ref()) {
            error!("Can't create stream '{}': {}", self.stream_name, e);
            return Err(e);
        }

        let volume = ((self.volume_scale as u64 * volume as u64) / 100).min(u32::MAX as u64) as u32;
        let segments = pattern(kind, self.standard);
        let timeout = ceiling(kind, self.standard).timeout(duration);

        let stream = server
            .stream_find_mut(&self.stream_name)
            .ok_or_else(|| Error::resource(format!("no stream '{}'", self.stream_name)))?;

        if segments.is_empty() {
            debug!("No {} tone under {}, staying silent", kind, self.standard);
        }

        let group = stream.tones_mut().new_group();
        for segment in segments {
            stream.create_tone(group, &segment.spec(kind, volume, duration));
        }

        server.stream_set_timeout(&self.stream_name, timeout)?;

        trace!(
            "Playing {} ({}) volume {} duration {} us timeout {} us",
            kind,
            self.standard,
            volume,
            duration,
            timeout
        );
        Ok(())
    }

    /// Stop the indicator tone. With `kill_stream` the whole stream goes,
    /// otherwise only non-chainable tones are removed and DTMF keeps playing.
    pub fn stop(&self, server: &mut AudioServer, kill_stream: bool) {
        let stream = if server.stream_find(&self.stream_name).is_some() {
            self.stream_name.as_str()
        } else {
            "<no-stream>"
        };
        trace!("Indicator stop (kill_stream={}) stream={}", kill_stream, stream);

        if kill_stream {
            server.stream_destroy(&self.stream_name);
        } else if let Some(stream) = server.stream_find_mut(&self.stream_name) {
            stream.tones_mut().retain_chainable();
        }
    }

    /// Select the national standard by its numeric code. Out-of-range values
    /// are rejected and the current standard stays in effect.
    pub fn set_standard(&mut self, raw: i32) -> Result<()> {
        match Standard::from_raw(raw) {
            Some(standard) => {
                info!("Indicator standard set to {}", standard);
                self.standard = standard;
                Ok(())
            }
            None => {
                error!("Invalid standard {}", raw);
                Err(Error::invalid_argument(format!("invalid standard {}", raw)))
            }
        }
    }

    pub fn set_properties(&mut self, props: &str) -> Result<()> {
        let parsed = props.parse::<StreamProperties>().map_err(|e| {
            error!("Invalid stream properties '{}': {}", props, e);
            e
        })?;
        self.properties = Some(parsed);
        Ok(())
    }

    pub fn set_volume(&mut self, percent: u32) {
        debug!("Indicator volume scale set to {}%", percent);
        self.volume_scale = percent;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tone::segment::Tone;

    const INDICATOR_KINDS: [ToneKind; 8] = [
        ToneKind::Dial,
        ToneKind::Busy,
        ToneKind::Congestion,
        ToneKind::RadioAck,
        ToneKind::RadioNoAnswer,
        ToneKind::Error,
        ToneKind::Wait,
        ToneKind::Ring,
    ];

    #[derive(Default)]
    struct RecordingDtmf {
        stops: usize,
    }

    impl DtmfPlayer for RecordingDtmf {
        fn play(&mut self, _: &mut AudioServer, _: u32, _: u32, _: u32) -> Result<()> {
            Ok(())
        }

        fn stop(&mut self, _: &mut AudioServer) {
            self.stops += 1;
        }

        fn set_properties(&mut self, _: Option<StreamProperties>) {}
    }

    fn indicator(standard: Standard) -> Indicator {
        let mut ind = Indicator::new(INDICATOR_STREAM);
        ind.set_standard(standard as i32).unwrap();
        ind
    }

    fn tones(server: &AudioServer) -> Vec<Tone> {
        server
            .stream_find(INDICATOR_STREAM)
            .map(|s| s.tones().iter().cloned().collect())
            .unwrap_or_default()
    }

    fn play(ind: &Indicator, server: &mut AudioServer, kind: ToneKind, volume: u32, duration: u32) {
        ind.play(server, &mut RecordingDtmf::default(), kind, volume, duration).unwrap();
    }

    #[test]
    fn test_catalog_completeness() {
        let silent = [
            (ToneKind::RadioNoAnswer, Standard::Japan),
            (ToneKind::Wait, Standard::Japan),
            (ToneKind::Ring, Standard::Japan),
        ];

        for standard in Standard::ALL {
            for kind in INDICATOR_KINDS {
                let segments = pattern(kind, standard);
                if silent.contains(&(kind, standard)) {
                    assert!(segments.is_empty(), "{} {} should be silent", kind, standard);
                    continue;
                }

                assert!(!segments.is_empty(), "{} {} has no pattern", kind, standard);
                for s in segments {
                    assert!(s.frequency > 0);
                    assert!(s.period > 0);
                    assert!(s.play > 0 && s.play <= s.period);
                }
            }
        }

        assert!(pattern(ToneKind::DtmfLow, Standard::Cept).is_empty());
    }

    #[test]
    fn test_catalog_values() {
        use Span::{Fixed, Requested};
        use Standard::*;
        use ToneKind as K;

        type Row = (u32, u32, u32, u32, u32, Span);
        const FOREVER: Span = Fixed(0);

        let cept_dial: &[Row] = &[(425, 100, 1_000_000, 1_000_000, 0, FOREVER)];
        let us_dial: &[Row] = &[
            (350, 70, 1_000_000, 1_000_000, 0, FOREVER),
            (440, 70, 1_000_000, 1_000_000, 0, FOREVER),
        ];
        let japan_dial: &[Row] = &[(400, 100, 1_000_000, 1_000_000, 0, FOREVER)];
        let cept_busy: &[Row] = &[(425, 100, 1_000_000, 500_000, 0, Requested)];
        let us_busy: &[Row] = &[
            (480, 70, 1_000_000, 500_000, 0, Requested),
            (620, 70, 1_000_000, 500_000, 0, Requested),
        ];
        let japan_busy: &[Row] = &[(400, 100, 1_000_000, 500_000, 0, Requested)];
        let cept_congestion: &[Row] = &[(425, 100, 400_000, 200_000, 0, Requested)];
        let us_congestion: &[Row] = &[
            (480, 70, 500_000, 250_000, 0, Requested),
            (620, 70, 500_000, 250_000, 0, Requested),
        ];
        let radio_ack: &[Row] = &[(425, 100, 200_000, 200_000, 0, Fixed(200_000))];
        let japan_radio_ack: &[Row] = &[(400, 100, 3_000_000, 1_000_000, 0, FOREVER)];
        let radio_no_answer: &[Row] = &[(425, 100, 400_000, 200_000, 0, Fixed(1_200_000))];
        let error: &[Row] = &[
            (900, 100, 2_000_000, 333_333, 0, Requested),
            (1400, 100, 2_000_000, 332_857, 333_333, Requested),
            (1800, 100, 2_000_000, 300_000, 666_190, Requested),
        ];
        let cept_wait: &[Row] = &[
            (425, 100, 800_000, 200_000, 0, Fixed(1_000_000)),
            (425, 100, 800_000, 200_000, 4_000_000, Fixed(1_000_000)),
        ];
        let ansi_wait: &[Row] = &[
            (440, 100, 300_000, 300_000, 0, Fixed(300_000)),
            (440, 100, 10_000_000, 100_000, 10_000_000, FOREVER),
            (440, 100, 10_000_000, 100_000, 10_200_000, FOREVER),
        ];
        let atnt_wait: &[Row] = &[
            (440, 100, 4_000_000, 200_000, 0, FOREVER),
            (440, 100, 4_000_000, 200_000, 500_000, FOREVER),
        ];
        let cept_ring: &[Row] = &[(425, 100, 5_000_000, 1_000_000, 0, FOREVER)];
        let us_ring: &[Row] = &[
            (440, 70, 6_000_000, 2_000_000, 0, FOREVER),
            (480, 70, 6_000_000, 2_000_000, 0, FOREVER),
        ];
        let silent: &[Row] = &[];

        let table: [(K, [&[Row]; 4]); 8] = [
            (K::Dial, [cept_dial, us_dial, us_dial, japan_dial]),
            (K::Busy, [cept_busy, us_busy, us_busy, japan_busy]),
            (K::Congestion, [cept_congestion, us_congestion, us_congestion, japan_busy]),
            (K::RadioAck, [radio_ack, radio_ack, radio_ack, japan_radio_ack]),
            (K::RadioNoAnswer, [radio_no_answer, radio_no_answer, radio_no_answer, silent]),
            (K::Error, [error, error, error, japan_busy]),
            (K::Wait, [cept_wait, ansi_wait, atnt_wait, silent]),
            (K::Ring, [cept_ring, us_ring, us_ring, silent]),
        ];

        for (kind, rows) in table {
            for (standard, expected) in [Cept, Ansi, Atnt, Japan].into_iter().zip(rows) {
                let actual: Vec<Row> = pattern(kind, standard)
                    .iter()
                    .map(|s| (s.frequency, s.gain, s.period, s.play, s.offset, s.span))
                    .collect();
                assert_eq!(actual, expected, "{} {}", kind, standard);
            }
        }
    }

    #[test]
    fn test_continuous_and_cadenced_patterns() {
        for standard in Standard::ALL {
            assert!(pattern(ToneKind::Dial, standard).iter().all(|s| s.play == s.period));
            for kind in [ToneKind::Busy, ToneKind::Congestion] {
                assert!(pattern(kind, standard).iter().all(|s| s.play < s.period));
            }
        }
    }

    #[test]
    fn test_japan_substitutes_busy() {
        let busy = pattern(ToneKind::Busy, Standard::Japan);
        assert_eq!(pattern(ToneKind::Congestion, Standard::Japan), busy);
        assert_eq!(pattern(ToneKind::Error, Standard::Japan), busy);
    }

    #[test]
    fn test_cept_dial() {
        let mut server = AudioServer::default();
        play(&indicator(Standard::Cept), &mut server, ToneKind::Dial, 100, 0);

        let tones = tones(&server);
        assert_eq!(tones.len(), 1);
        assert_eq!(tones[0].frequency, 425);
        assert_eq!((tones[0].period, tones[0].play), (1_000_000, 1_000_000));
        assert!(tones[0].is_unbounded());
        assert_eq!(
            server.stream_find(INDICATOR_STREAM).unwrap().timeout(),
            Some(MAX_TONE_LENGTH)
        );
    }

    #[test]
    fn test_us_dial_is_dual_tone_at_reduced_gain() {
        for standard in [Standard::Ansi, Standard::Atnt] {
            let segments = pattern(ToneKind::Dial, standard);
            assert_eq!(
                segments.iter().map(|s| (s.frequency, s.gain)).collect::<Vec<_>>(),
                vec![(350, 70), (440, 70)]
            );
        }

        let mut server = AudioServer::default();
        play(&indicator(Standard::Ansi), &mut server, ToneKind::Dial, 100, 0);
        let tones = tones(&server);
        assert_eq!(tones.len(), 2);
        assert_eq!(tones[0].group, tones[1].group);
    }

    #[test]
    fn test_error_tone_offsets() {
        let mut server = AudioServer::default();
        play(&indicator(Standard::Cept), &mut server, ToneKind::Error, 100, 3_000_000);

        let windows: Vec<(u32, u64, u64)> = tones(&server)
            .iter()
            .map(|t| (t.frequency, t.start, t.end))
            .collect();
        assert_eq!(
            windows,
            vec![
                (900, 0, 3_000_000),
                (1400, 333_333, 3_333_333),
                (1800, 666_190, 3_666_190)
            ]
        );
    }

    #[test]
    fn test_timeouts() {
        let cases = [
            (ToneKind::Busy, Standard::Cept, 2_000, 2_000),
            (ToneKind::Busy, Standard::Cept, 0, MAX_TONE_LENGTH),
            (ToneKind::Dial, Standard::Cept, 2_000, MAX_TONE_LENGTH),
            (ToneKind::RadioAck, Standard::Cept, 0, MAX_SHORT_TONE_LENGTH),
            (ToneKind::RadioAck, Standard::Japan, 0, MAX_TONE_LENGTH),
            (ToneKind::RadioNoAnswer, Standard::Japan, 0, MAX_SHORT_TONE_LENGTH),
            (ToneKind::Ring, Standard::Ansi, 2_000, MAX_TONE_LENGTH),
        ];

        for (kind, standard, duration, expected) in cases {
            let mut server = AudioServer::default();
            play(&indicator(standard), &mut server, kind, 100, duration);
            assert_eq!(
                server.stream_find(INDICATOR_STREAM).unwrap().timeout(),
                Some(expected),
                "{} {}",
                kind,
                standard
            );
        }
    }

    #[test]
    fn test_new_request_preempts_old() {
        let mut server = AudioServer::default();
        let ind = indicator(Standard::Cept);
        let mut dtmf = RecordingDtmf::default();

        ind.play(&mut server, &mut dtmf, ToneKind::Dial, 100, 0).unwrap();
        assert_eq!(dtmf.stops, 0);
        ind.play(&mut server, &mut dtmf, ToneKind::Busy, 100, 0).unwrap();
        assert_eq!(dtmf.stops, 1);

        let tones = tones(&server);
        assert_eq!(tones.len(), 1);
        assert_eq!(tones[0].kind, ToneKind::Busy);
    }

    #[test]
    fn test_volume_scale() {
        let mut server = AudioServer::default();
        let mut ind = indicator(Standard::Cept);
        ind.set_volume(50);
        play(&ind, &mut server, ToneKind::Dial, 80, 0);

        let mut samples = vec![0i16; 8000];
        server.stream_find_mut(INDICATOR_STREAM).unwrap().write(&mut samples);
        let peak = samples.iter().map(|s| (*s as i32).abs()).max().unwrap();
        // 40% of full scale
        assert!((12_950..=13_110).contains(&peak), "peak = {}", peak);
    }

    #[test]
    fn test_non_indicator_kind_is_rejected() {
        let mut server = AudioServer::default();
        let ind = indicator(Standard::Cept);
        let mut dtmf = RecordingDtmf::default();
        let result = ind.play(&mut server, &mut dtmf, ToneKind::DtmfLow, 100, 0);
        assert!(result.unwrap_err().is_argument_error());
        assert_eq!(server.stream_count(), 0);
    }

    #[test]
    fn test_stop_preserves_dtmf() {
        let mut server = AudioServer::default();
        let ind = indicator(Standard::Ansi);
        play(&ind, &mut server, ToneKind::Ring, 100, 0);

        let stream = server.stream_find_mut(INDICATOR_STREAM).unwrap();
        let spec = ToneSpec::continuous(ToneKind::DtmfIndicatorLow, 697, 70);
        let dtmf = stream.create_tone(99, &spec);
        let before = stream.tones().get(dtmf).cloned().unwrap();

        ind.stop(&mut server, false);
        let tones = tones(&server);
        assert_eq!(tones.len(), 1);
        assert_eq!(tones[0].id, before.id);
        assert_eq!(tones[0].start, before.start);
        assert_eq!(tones[0].end, before.end);

        ind.stop(&mut server, true);
        assert!(server.stream_find(INDICATOR_STREAM).is_none());
    }

    #[test]
    fn test_set_standard_validation() {
        let mut ind = Indicator::new(INDICATOR_STREAM);
        ind.set_standard(Standard::Japan as i32).unwrap();

        assert!(ind.set_standard(0).is_err());
        assert!(ind.set_standard(5).is_err());
        assert!(ind.set_standard(-1).is_err());
        assert_eq!(ind.standard(), Standard::Japan);
    }

    #[test]
    fn test_set_properties() {
        let mut ind = Indicator::new(INDICATOR_STREAM);
        ind.set_properties("media.role=phone").unwrap();
        assert!(ind.set_properties("garbage").is_err());
        assert_eq!(ind.properties().and_then(|p| p.get("media.role")), Some("phone"));

        let mut server = AudioServer::default();
        play(&ind, &mut server, ToneKind::Busy, 100, 0);
        let stream = server.stream_find(INDICATOR_STREAM).unwrap();
        assert_eq!(stream.properties(), ind.properties());
    }

    #[test]
    fn test_standard_names() {
        assert_eq!("CEPT".parse::<Standard>().unwrap(), Standard::Cept);
        assert_eq!("at&t".parse::<Standard>().unwrap(), Standard::Atnt);
        assert!("mars".parse::<Standard>().is_err());
        assert_eq!(Standard::Japan.to_string(), "japan");
    }
}
