//! Control protocols for the tone generator

pub mod dtmf;
pub mod rfc4733;

pub use dtmf::{DtmfPlayer, ToneDtmf};
pub use rfc4733::{Arg, Rfc4733, SenderId, ToneOwners};
