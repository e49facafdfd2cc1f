//! tonegend - call-progress and DTMF tone generator
//!
//! Synthesizes national call-progress tones (dial, busy, congestion, ring,
//! error, wait, radio acknowledgements) and DTMF tones on named audio
//! streams, and exposes an RFC 4733 telephone-event control surface for
//! starting and stopping them.

pub mod audio;
pub mod config;
pub mod core;
pub mod error;
pub mod protocols;
pub mod services;
pub mod tone;
pub mod utils;

pub use error::{Error, Result};

/// Daemon version information
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
pub const NAME: &str = env!("CARGO_PKG_NAME");
pub const DESCRIPTION: &str = env!("CARGO_PKG_DESCRIPTION");
