//! Utilities for the tone generator daemon

pub mod logger;

pub use logger::setup_logging;
