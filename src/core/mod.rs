//! Core tone engine and daemon event loop

pub mod daemon;
pub mod engine;

pub use daemon::{DaemonEvent, DaemonHandle, ToneDaemon};
pub use engine::ToneEngine;
