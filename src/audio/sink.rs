//! Destinations for rendered PCM

use std::collections::HashMap;
use std::fs::{File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};

use bytes::{BufMut, BytesMut};
use tracing::{debug, info};

use crate::Result;

/// Receives one buffer of 16-bit samples per stream per render cycle
pub trait PcmSink: Send {
    fn write(&mut self, stream: &str, samples: &[i16]) -> Result<()>;

    fn flush(&mut self) -> Result<()> {
        Ok(())
    }
}

/// Discards everything
#[derive(Debug, Default)]
pub struct NullSink;

impl PcmSink for NullSink {
    fn write(&mut self, _stream: &str, _samples: &[i16]) -> Result<()> {
        Ok(())
    }
}

/// Keeps every sample in memory, keyed by stream name
#[derive(Debug, Default)]
pub struct MemorySink {
    pub captured: HashMap<String, Vec<i16>>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn samples(&self, stream: &str) -> &[i16] {
        self.captured.get(stream).map(Vec::as_slice).unwrap_or(&[])
    }
}

impl PcmSink for MemorySink {
    fn write(&mut self, stream: &str, samples: &[i16]) -> Result<()> {
        self.captured
            .entry(stream.to_string())
            .or_default()
            .extend_from_slice(samples);
        Ok(())
    }
}

/// Appends raw little-endian PCM to `<dir>/<stream>.raw`
#[derive(Debug)]
pub struct RawFileSink {
    dir: PathBuf,
    files: HashMap<String, File>,
    buf: BytesMut,
}

impl RawFileSink {
    pub fn new<P: AsRef<Path>>(dir: P) -> Result<Self> {
        let dir = dir.as_ref().to_path_buf();
        std::fs::create_dir_all(&dir)?;
        info!("Writing raw PCM to {}", dir.display());

        Ok(Self {
            dir,
            files: HashMap::new(),
            buf: BytesMut::new(),
        })
    }

    pub fn path_for(&self, stream: &str) -> PathBuf {
        self.dir.join(format!("{}.raw", stream))
    }
}

impl PcmSink for RawFileSink {
    fn write(&mut self, stream: &str, samples: &[i16]) -> Result<()> {
        if !self.files.contains_key(stream) {
            let path = self.path_for(stream);
            debug!("Opening {}", path.display());
            let file = OpenOptions::new().create(true).append(true).open(path)?;
            self.files.insert(stream.to_string(), file);
        }

        self.buf.clear();
        self.buf.reserve(samples.len() * 2);
        for sample in samples {
            self.buf.put_i16_le(*sample);
        }

        if let Some(file) = self.files.get_mut(stream) {
            file.write_all(&self.buf)?;
        }
        Ok(())
    }

    fn flush(&mut self) -> Result<()> {
        for file in self.files.values_mut() {
            file.flush()?;
        }
        Ok(())
    }
}
