//! Audio server context: the registry of named streams
//!
//! Owns every stream, drives their write callbacks once per render cycle and
//! retires streams whose timeout has elapsed.

pub mod sink;
pub mod stream;

use std::collections::BTreeMap;

use tracing::{debug, info, warn};

pub use sink::{MemorySink, NullSink, PcmSink, RawFileSink};
pub use stream::{Stream, StreamProperties};

use crate::{Error, Result};

pub const DEFAULT_SAMPLE_RATE: u32 = 8000;

#[derive(Debug)]
pub struct AudioServer {
    sample_rate: u32,
    streams: BTreeMap<String, Stream>,
}

impl AudioServer {
    pub fn new(sample_rate: u32) -> Self {
        Self {
            sample_rate,
            streams: BTreeMap::new(),
        }
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    pub fn stream_find(&self, name: &str) -> Option<&Stream> {
        self.streams.get(name)
    }

    pub fn stream_find_mut(&mut self, name: &str) -> Option<&mut Stream> {
        self.streams.get_mut(name)
    }

    pub fn stream_create(
        &mut self,
        name: &str,
        properties: Option<&StreamProperties>,
    ) -> Result<&mut Stream> {
        if name.is_empty() {
            return Err(Error::invalid_argument("stream name is empty"));
        }
        if self.streams.contains_key(name) {
            return Err(Error::resource(format!("stream '{}' already exists", name)));
        }

        debug!("Creating stream '{}' at {} Hz", name, self.sample_rate);
        let stream = Stream::new(name, self.sample_rate, properties.cloned());
        Ok(self.streams.entry(name.to_string()).or_insert(stream))
    }

    /// Destroy a stream and every tone on it. Returns whether it existed.
    pub fn stream_destroy(&mut self, name: &str) -> bool {
        match self.streams.remove(name) {
            Some(stream) => {
                debug!("Destroying stream '{}' with {} tone(s)", name, stream.tones().len());
                true
            }
            None => false,
        }
    }

    pub fn stream_set_timeout(&mut self, name: &str, timeout: u64) -> Result<()> {
        let stream = self
            .streams
            .get_mut(name)
            .ok_or_else(|| Error::resource(format!("no stream '{}'", name)))?;
        stream.set_timeout(timeout);
        debug!("Stream '{}' timeout set to {} us", name, timeout);
        Ok(())
    }

    pub fn parse_properties(&self, props: &str) -> Result<StreamProperties> {
        props.parse()
    }

    pub fn streams(&self) -> impl Iterator<Item = &Stream> {
        self.streams.values()
    }

    pub fn stream_count(&self) -> usize {
        self.streams.len()
    }

    /// Render `frames` samples on every stream into `sink`, then retire the
    /// streams whose timeout has elapsed.
    pub fn render(&mut self, frames: usize, sink: &mut dyn PcmSink) -> Result<()> {
        let mut buf = vec![0i16; frames];

        for (name, stream) in self.streams.iter_mut() {
            buf.fill(0);
            stream.write(&mut buf);
            if let Err(e) = sink.write(name, &buf) {
                warn!("Failed to write stream '{}': {}", name, e);
            }
        }

        let expired: Vec<String> = self
            .streams
            .values()
            .filter(|s| s.timed_out())
            .map(|s| s.name().to_string())
            .collect();

        for name in expired {
            info!("Stream '{}' timed out", name);
            self.stream_destroy(&name);
        }

        Ok(())
    }
}

impl Default for AudioServer {
    fn default() -> Self {
        Self::new(DEFAULT_SAMPLE_RATE)
    }
}
