//! Tone engine context
//!
//! Everything the control plane mutates lives here: the audio server with
//! its streams, the indicator session and the DTMF player. The daemon loop
//! owns exactly one engine and hands it to every dispatcher call.

use tracing::info;

use crate::audio::{AudioServer, PcmSink};
use crate::config::DaemonConfig;
use crate::protocols::dtmf::{DtmfPlayer, ToneDtmf};
use crate::tone::indicator::{Indicator, Standard};
use crate::tone::segment::ToneKind;
use crate::Result;

pub struct ToneEngine {
    pub server: AudioServer,
    pub indicator: Indicator,
    pub dtmf: Box<dyn DtmfPlayer>,
}

impl ToneEngine {
    pub fn new(server: AudioServer, indicator: Indicator, dtmf: Box<dyn DtmfPlayer>) -> Self {
        Self {
            server,
            indicator,
            dtmf,
        }
    }

    pub fn from_config(config: &DaemonConfig) -> Result<Self> {
        let server = AudioServer::new(config.audio.sample_rate);

        let mut indicator = Indicator::new(&config.indicator.stream);
        indicator.set_standard(config.indicator.standard as i32)?;
        indicator.set_volume(config.indicator.volume_scale);

        let mut dtmf = ToneDtmf::new(&config.indicator.stream);
        if let Some(props) = &config.indicator.properties {
            indicator.set_properties(props)?;
            dtmf.set_properties(indicator.properties().cloned());
        }

        info!(
            "Tone engine ready: {} Hz, standard {}, volume {}%",
            config.audio.sample_rate,
            indicator.standard(),
            indicator.volume_scale()
        );

        Ok(Self::new(server, indicator, Box::new(dtmf)))
    }

    pub fn standard(&self) -> Standard {
        self.indicator.standard()
    }

    /// `duration` in microseconds, 0 for the pattern's natural length.
    pub fn indicator_play(&mut self, kind: ToneKind, volume: u32, duration: u32) -> Result<()> {
        self.indicator
            .play(&mut self.server, self.dtmf.as_mut(), kind, volume, duration)
    }

    pub fn indicator_stop(&mut self, kill_stream: bool) {
        self.indicator.stop(&mut self.server, kill_stream);
    }

    pub fn dtmf_play(&mut self, event: u32, volume: u32, duration: u32) -> Result<()> {
        self.dtmf.play(&mut self.server, event, volume, duration)
    }

    pub fn dtmf_stop(&mut self) {
        self.dtmf.stop(&mut self.server);
    }

    pub fn set_standard(&mut self, raw: i32) -> Result<()> {
        self.indicator.set_standard(raw)
    }

    pub fn set_volume(&mut self, percent: u32) {
        self.indicator.set_volume(percent);
    }

    /// Properties for indicator and DTMF streams created from now on.
    pub fn set_properties(&mut self, props: &str) -> Result<()> {
        self.indicator.set_properties(props)?;
        self.dtmf.set_properties(self.indicator.properties().cloned());
        Ok(())
    }

    pub fn render(&mut self, frames: usize, sink: &mut dyn PcmSink) -> Result<()> {
        self.server.render(frames, sink)
    }
}

impl Default for ToneEngine {
    fn default() -> Self {
        let indicator = Indicator::new(crate::tone::INDICATOR_STREAM);
        let dtmf = ToneDtmf::new(indicator.stream_name());
        Self::new(AudioServer::default(), indicator, Box::new(dtmf))
    }
}
