//! Network services of the tone generator daemon

pub mod control;

pub use control::{ControlRequest, ControlResponse, ControlService};
