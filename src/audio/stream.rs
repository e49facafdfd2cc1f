//! Named audio streams and their properties

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use crate::tone::segment::{self, GroupId, ToneChain, ToneId, ToneSpec};
use crate::{Error, Result};

/// Opaque stream properties, `key=value` pairs handed to the audio layer
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StreamProperties(BTreeMap<String, String>);

impl StreamProperties {
    pub fn get(&self, key: &str) -> Option<&str> {
        self.0.get(key).map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl FromStr for StreamProperties {
    type Err = Error;

    /// Pairs are separated by `,` or `;`. Blank entries are skipped.
    fn from_str(s: &str) -> Result<Self> {
        let mut props = BTreeMap::new();

        for entry in s.split([',', ';']) {
            let entry = entry.trim();
            if entry.is_empty() {
                continue;
            }

            let (key, value) = entry
                .split_once('=')
                .ok_or_else(|| Error::parse(format!("property '{}' has no value", entry)))?;
            let key = key.trim();
            if key.is_empty() {
                return Err(Error::parse(format!("property '{}' has no key", entry)));
            }

            props.insert(key.to_string(), value.trim().trim_matches('"').to_string());
        }

        Ok(Self(props))
    }
}

impl fmt::Display for StreamProperties {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut first = true;
        for (key, value) in &self.0 {
            if !first {
                f.write_str(",")?;
            }
            write!(f, "{}={}", key, value)?;
            first = false;
        }
        Ok(())
    }
}

/// A named stream owning the chain of tones playing on it
#[derive(Debug)]
pub struct Stream {
    name: String,
    sample_rate: u32,
    /// Samples written since creation.
    position: u64,
    properties: Option<StreamProperties>,
    timeout: Option<u64>,
    timeout_base: u64,
    tones: ToneChain,
}

impl Stream {
    pub fn new(name: &str, sample_rate: u32, properties: Option<StreamProperties>) -> Self {
        Self {
            name: name.to_string(),
            sample_rate,
            position: 0,
            properties,
            timeout: None,
            timeout_base: 0,
            tones: ToneChain::new(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    pub fn properties(&self) -> Option<&StreamProperties> {
        self.properties.as_ref()
    }

    pub fn position(&self) -> u64 {
        self.position
    }

    /// Stream clock in microseconds.
    pub fn time(&self) -> u64 {
        self.position * 1_000_000 / self.sample_rate.max(1) as u64
    }

    pub(crate) fn advance(&mut self, samples: u64) {
        self.position += samples;
    }

    pub fn tones(&self) -> &ToneChain {
        &self.tones
    }

    pub fn tones_mut(&mut self) -> &mut ToneChain {
        &mut self.tones
    }

    /// Create a tone starting relative to the current stream clock.
    pub fn create_tone(&mut self, group: GroupId, spec: &ToneSpec) -> ToneId {
        let now = self.time();
        self.tones.create(now, self.sample_rate, group, spec)
    }

    /// Retire the stream `timeout` microseconds from now.
    pub fn set_timeout(&mut self, timeout: u64) {
        self.timeout = Some(timeout);
        self.timeout_base = self.time();
    }

    pub fn timeout(&self) -> Option<u64> {
        self.timeout
    }

    pub fn timed_out(&self) -> bool {
        match self.timeout {
            Some(timeout) => self.time().saturating_sub(self.timeout_base) >= timeout,
            None => false,
        }
    }

    /// Fill `buf` from the tone chain, see [`segment::write_callback`].
    pub fn write(&mut self, buf: &mut [i16]) -> usize {
        segment::write_callback(self, buf)
    }
}

impl Drop for Stream {
    fn drop(&mut self) {
        segment::destroy_callback(&mut self.tones);
    }
}
