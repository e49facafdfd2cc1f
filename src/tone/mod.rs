//! Tone synthesis: envelopes, oscillators, tone segments and the indicator
//! catalog

pub mod envelope;
pub mod indicator;
pub mod segment;
pub mod singen;

pub use envelope::{Envelope, EnvelopeShape};
pub use indicator::{Indicator, Standard, INDICATOR_STREAM};
pub use segment::{chainable, Teardown, Tone, ToneChain, ToneKind, ToneSpec, ToneState};
