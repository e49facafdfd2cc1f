//! RFC 4733 telephone-event control plane
//!
//! Remote callers start and stop tones by telephone-event code. Codes below
//! [`DTMF_MAX`] are DTMF digits; a fixed set of higher codes select
//! call-progress indicators. The dispatcher remembers which caller started
//! each class of tone so that a bare `StopTone` silences the right one.

use std::fmt;

use serde::{Deserialize, Serialize};
use tracing::{debug, error, info, trace, warn};

use crate::core::engine::ToneEngine;
use crate::protocols::dtmf::DTMF_MAX;
use crate::tone::segment::ToneKind;
use crate::{Error, Result};

/// Longest accepted caller identity in bytes.
pub const MAX_SENDER_LEN: usize = 64;

/// Identity of a remote caller
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SenderId(String);

impl SenderId {
    /// Over-long and empty identities are rejected rather than truncated.
    pub fn new(id: &str) -> Result<Self> {
        if id.is_empty() {
            return Err(Error::invalid_argument("empty sender identity"));
        }
        if id.len() > MAX_SENDER_LEN {
            return Err(Error::invalid_argument(format!(
                "sender identity longer than {} bytes",
                MAX_SENDER_LEN
            )));
        }
        Ok(Self(id.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for SenderId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// One remote-call argument
///
/// Non-negative integers arrive as `U32`; a signed parameter accepts either
/// variant as long as the value fits.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Arg {
    U32(u32),
    I32(i32),
    Str(String),
}

impl Arg {
    pub fn as_u32(&self) -> Option<u32> {
        match self {
            Self::U32(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_i32(&self) -> Option<i32> {
        match self {
            Self::I32(v) => Some(*v),
            Self::U32(v) => i32::try_from(*v).ok(),
            Self::Str(_) => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::Str(s) => Some(s),
            _ => None,
        }
    }

    /// Whether this argument satisfies one signature code (`u`, `i` or `s`).
    pub fn matches(&self, code: char) -> bool {
        match code {
            'u' => self.as_u32().is_some(),
            'i' => self.as_i32().is_some(),
            's' => self.as_str().is_some(),
            _ => false,
        }
    }
}

impl From<u32> for Arg {
    fn from(v: u32) -> Self {
        Self::U32(v)
    }
}

impl From<i32> for Arg {
    fn from(v: i32) -> Self {
        Self::I32(v)
    }
}

impl From<&str> for Arg {
    fn from(v: &str) -> Self {
        Self::Str(v.to_string())
    }
}

type Handler = fn(&mut Rfc4733, &mut ToneEngine, &SenderId, &[Arg]) -> Result<()>;

/// A remotely callable method
pub struct MethodDef {
    pub member: &'static str,
    pub signature: &'static str,
    handler: Handler,
}

pub static METHODS: &[MethodDef] = &[
    MethodDef {
        member: "StartEventTone",
        signature: "uiu",
        handler: Rfc4733::handle_start_event_tone,
    },
    // legacy name of StartEventTone
    MethodDef {
        member: "StartNotificationTone",
        signature: "uiu",
        handler: Rfc4733::handle_start_event_tone,
    },
    MethodDef {
        member: "StopTone",
        signature: "",
        handler: Rfc4733::handle_stop_tone,
    },
    MethodDef {
        member: "StopEventTone",
        signature: "u",
        handler: Rfc4733::handle_stop_event_tone,
    },
    MethodDef {
        member: "SetStandard",
        signature: "i",
        handler: Rfc4733::handle_set_standard,
    },
    MethodDef {
        member: "SetVolume",
        signature: "u",
        handler: Rfc4733::handle_set_volume,
    },
    MethodDef {
        member: "SetProperties",
        signature: "s",
        handler: Rfc4733::handle_set_properties,
    },
];

pub fn find_method(member: &str) -> Option<&'static MethodDef> {
    METHODS.iter().find(|m| m.member == member)
}

/// Who started the current tone of each class. Last writer wins.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ToneOwners {
    pub dtmf: Option<SenderId>,
    pub indicator: Option<SenderId>,
}

/// Map a power level in dBm0 (0 down to -63) onto the linear 0-100 volume
/// scale.
pub fn linear_volume(dbm0: i32) -> u32 {
    let dbm0 = dbm0.clamp(-63, 0);
    let volume = 10f64.powf((dbm0 + 63) as f64 / 20.0) / 14.125375446;
    (volume + 0.5) as u32
}

/// Indicator selected by a non-DTMF telephone-event code.
pub fn indicator_kind(event: u32) -> Option<ToneKind> {
    match event {
        66 => Some(ToneKind::Dial),
        72 => Some(ToneKind::Busy),
        73 => Some(ToneKind::Congestion),
        256 => Some(ToneKind::RadioAck),
        257 => Some(ToneKind::RadioNoAnswer),
        74 => Some(ToneKind::Error),
        79 => Some(ToneKind::Wait),
        70 => Some(ToneKind::Ring),
        _ => None,
    }
}

/// Telephone-event dispatcher
#[derive(Debug, Default)]
pub struct Rfc4733 {
    owners: ToneOwners,
}

impl Rfc4733 {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn owners(&self) -> &ToneOwners {
        &self.owners
    }

    /// Invoke `member` on behalf of `sender`. Malformed calls are rejected
    /// before any state changes.
    pub fn call(
        &mut self,
        engine: &mut ToneEngine,
        sender: &str,
        member: &str,
        args: &[Arg],
    ) -> Result<()> {
        let result = self.dispatch(engine, sender, member, args);
        if let Err(e) = &result {
            error!("{} from '{}' failed: {}", member, sender, e);
        }
        result
    }

    fn dispatch(
        &mut self,
        engine: &mut ToneEngine,
        sender: &str,
        member: &str,
        args: &[Arg],
    ) -> Result<()> {
        let method = find_method(member).ok_or_else(|| Error::UnknownMethod(member.to_string()))?;

        let signature_ok = args.len() == method.signature.len()
            && args.iter().zip(method.signature.chars()).all(|(arg, code)| arg.matches(code));
        if !signature_ok {
            return Err(Error::invalid_argument(format!(
                "{} expects signature '{}', got {:?}",
                member, method.signature, args
            )));
        }

        let sender = SenderId::new(sender)?;
        (method.handler)(self, engine, &sender, args)
    }

    /// Start a DTMF digit or an indicator tone. `duration_ms` of 0 plays until
    /// stopped or until the class ceiling elapses.
    pub fn start_event_tone(
        &mut self,
        engine: &mut ToneEngine,
        sender: &SenderId,
        event: u32,
        dbm0: i32,
        duration_ms: u32,
    ) -> Result<()> {
        let volume = linear_volume(dbm0);
        trace!(
            "event {} volume {} dBm0 ({}) duration {} ms",
            event,
            dbm0,
            volume,
            duration_ms
        );

        if event < DTMF_MAX {
            engine.dtmf_play(event, volume, 0)?;
            if let Some(previous) = self.owners.dtmf.replace(sender.clone()) {
                warn!("Second DTMF tone requested; '{}' replaces '{}'", sender, previous);
            }
        } else {
            let kind = indicator_kind(event).ok_or(Error::UnknownEvent(event))?;
            engine.indicator_play(kind, volume, duration_ms.saturating_mul(1000))?;
            if let Some(previous) = self.owners.indicator.replace(sender.clone()) {
                warn!("Second indicator tone requested; '{}' replaces '{}'", sender, previous);
            }
        }

        Ok(())
    }

    /// Stop the class of tone `event` belongs to, whoever started it.
    pub fn stop_event_tone(&mut self, engine: &mut ToneEngine, event: u32) {
        debug!("Stop tone for event {}", event);

        if event < DTMF_MAX {
            engine.dtmf_stop();
            self.owners.dtmf = None;
        } else {
            engine.indicator_stop(true);
            self.owners.indicator = None;
        }
    }

    /// Stop the tone `sender` owns. A caller owning neither class stops both.
    pub fn stop_tone(&mut self, engine: &mut ToneEngine, sender: &SenderId) {
        if self.owners.dtmf.as_ref() == Some(sender) {
            debug!("Stop DTMF tone for '{}'", sender);
            engine.dtmf_stop();
            self.owners.dtmf = None;
        } else if self.owners.indicator.as_ref() == Some(sender) {
            debug!("Stop indicator tone for '{}'", sender);
            engine.indicator_stop(true);
            self.owners.indicator = None;
        } else {
            debug!("'{}' owns no tone, stopping DTMF and indicator tones", sender);
            engine.dtmf_stop();
            engine.indicator_stop(true);
            self.owners = ToneOwners::default();
        }
    }

    fn handle_start_event_tone(
        &mut self,
        engine: &mut ToneEngine,
        sender: &SenderId,
        args: &[Arg],
    ) -> Result<()> {
        let event = u32_arg(args, 0)?;
        let dbm0 = i32_arg(args, 1)?;
        let duration = u32_arg(args, 2)?;
        self.start_event_tone(engine, sender, event, dbm0, duration)
    }

    fn handle_stop_event_tone(
        &mut self,
        engine: &mut ToneEngine,
        _sender: &SenderId,
        args: &[Arg],
    ) -> Result<()> {
        let event = u32_arg(args, 0)?;
        self.stop_event_tone(engine, event);
        Ok(())
    }

    fn handle_stop_tone(
        &mut self,
        engine: &mut ToneEngine,
        sender: &SenderId,
        _args: &[Arg],
    ) -> Result<()> {
        self.stop_tone(engine, sender);
        Ok(())
    }

    fn handle_set_standard(
        &mut self,
        engine: &mut ToneEngine,
        sender: &SenderId,
        args: &[Arg],
    ) -> Result<()> {
        let standard = i32_arg(args, 0)?;
        info!("'{}' selects standard {}", sender, standard);
        engine.set_standard(standard)
    }

    fn handle_set_volume(
        &mut self,
        engine: &mut ToneEngine,
        _sender: &SenderId,
        args: &[Arg],
    ) -> Result<()> {
        engine.set_volume(u32_arg(args, 0)?);
        Ok(())
    }

    fn handle_set_properties(
        &mut self,
        engine: &mut ToneEngine,
        _sender: &SenderId,
        args: &[Arg],
    ) -> Result<()> {
        let props = args
            .first()
            .and_then(Arg::as_str)
            .ok_or_else(|| Error::invalid_argument("expected a string argument"))?;
        engine.set_properties(props)
    }
}

fn u32_arg(args: &[Arg], index: usize) -> Result<u32> {
    args.get(index)
        .and_then(Arg::as_u32)
        .ok_or_else(|| Error::invalid_argument(format!("argument {} is not uint32", index)))
}

fn i32_arg(args: &[Arg], index: usize) -> Result<i32> {
    args.get(index)
        .and_then(Arg::as_i32)
        .ok_or_else(|| Error::invalid_argument(format!("argument {} is not int32", index)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocols::dtmf::DTMF_STREAM;
    use crate::tone::indicator::{Standard, MAX_TONE_LENGTH};
    use crate::tone::INDICATOR_STREAM;

    fn sender(id: &str) -> SenderId {
        SenderId::new(id).unwrap()
    }

    fn start(
        rfc: &mut Rfc4733,
        engine: &mut ToneEngine,
        who: &str,
        event: u32,
        dbm0: i32,
        ms: u32,
    ) -> Result<()> {
        rfc.call(
            engine,
            who,
            "StartEventTone",
            &[Arg::U32(event), Arg::I32(dbm0), Arg::U32(ms)],
        )
    }

    fn indicator_kinds(engine: &ToneEngine) -> Vec<ToneKind> {
        engine
            .server
            .stream_find(INDICATOR_STREAM)
            .map(|s| s.tones().iter().map(|t| t.kind).collect())
            .unwrap_or_default()
    }

    #[test]
    fn test_linear_volume_boundaries() {
        assert_eq!(linear_volume(0), 100);
        assert!(linear_volume(-63) <= 1);
        assert_eq!(linear_volume(5), linear_volume(0));
        assert_eq!(linear_volume(i32::MAX), 100);
        assert_eq!(linear_volume(-64), linear_volume(-63));
        assert_eq!(linear_volume(i32::MIN), linear_volume(-63));
        assert_eq!(linear_volume(-6), 50);
        assert_eq!(linear_volume(-20), 10);
    }

    #[test]
    fn test_indicator_event_table() {
        let table = [
            (66, ToneKind::Dial),
            (72, ToneKind::Busy),
            (73, ToneKind::Congestion),
            (256, ToneKind::RadioAck),
            (257, ToneKind::RadioNoAnswer),
            (74, ToneKind::Error),
            (79, ToneKind::Wait),
            (70, ToneKind::Ring),
        ];
        for (event, kind) in table {
            assert_eq!(indicator_kind(event), Some(kind));
        }
        assert_eq!(indicator_kind(16), None);
        assert_eq!(indicator_kind(71), None);
    }

    #[test]
    fn test_sender_identity_bounds() {
        assert!(SenderId::new(":1.42").is_ok());
        assert!(SenderId::new(&"x".repeat(MAX_SENDER_LEN)).is_ok());
        assert!(SenderId::new(&"x".repeat(MAX_SENDER_LEN + 1)).unwrap_err().is_argument_error());
        assert!(SenderId::new("").is_err());
    }

    #[test]
    fn test_args_from_json() {
        let args: Vec<Arg> = serde_json::from_str(r#"[66, -10, 0, "media.role=phone"]"#).unwrap();
        assert_eq!(
            args,
            vec![Arg::U32(66), Arg::I32(-10), Arg::U32(0), Arg::from("media.role=phone")]
        );
        assert!(args[2].matches('i'));
        assert!(!args[1].matches('u'));
        assert!(!args[0].matches('s'));
    }

    #[test]
    fn test_cept_dial_end_to_end() {
        let mut engine = ToneEngine::default();
        let mut rfc = Rfc4733::new();
        assert_eq!(engine.standard(), Standard::Cept);

        start(&mut rfc, &mut engine, "a", 66, 0, 0).unwrap();

        let stream = engine.server.stream_find(INDICATOR_STREAM).unwrap();
        let tones: Vec<_> = stream.tones().iter().collect();
        assert_eq!(tones.len(), 1);
        assert_eq!(tones[0].frequency, 425);
        assert_eq!(tones[0].period, 1_000_000);
        assert_eq!(tones[0].play, 1_000_000);
        assert_eq!(tones[0].volume, 100);
        assert_eq!(stream.timeout(), Some(MAX_TONE_LENGTH));
        assert_eq!(rfc.owners().indicator, Some(sender("a")));
        assert_eq!(rfc.owners().dtmf, None);
    }

    #[test]
    fn test_legacy_method_name() {
        let mut engine = ToneEngine::default();
        let mut rfc = Rfc4733::new();
        rfc.call(
            &mut engine,
            "a",
            "StartNotificationTone",
            &[Arg::U32(72), Arg::U32(0), Arg::U32(0)],
        )
        .unwrap();
        assert_eq!(indicator_kinds(&engine), vec![ToneKind::Busy]);
    }

    #[test]
    fn test_indicator_duration_is_milliseconds() {
        let mut engine = ToneEngine::default();
        let mut rfc = Rfc4733::new();
        start(&mut rfc, &mut engine, "a", 72, 0, 1500).unwrap();

        let stream = engine.server.stream_find(INDICATOR_STREAM).unwrap();
        assert_eq!(stream.timeout(), Some(1_500_000));
        assert!(stream.tones().iter().all(|t| t.end == 1_500_000));
    }

    #[test]
    fn test_dtmf_start_plays_until_stopped() {
        let mut engine = ToneEngine::default();
        let mut rfc = Rfc4733::new();
        start(&mut rfc, &mut engine, "a", 5, 0, 40).unwrap();

        let stream = engine.server.stream_find(DTMF_STREAM).unwrap();
        assert_eq!(stream.tones().len(), 2);
        assert!(stream.tones().iter().all(|t| t.is_unbounded()));
        assert_eq!(rfc.owners().dtmf, Some(sender("a")));
    }

    #[test]
    fn test_stranger_stop_tone_stops_everything() {
        let mut engine = ToneEngine::default();
        let mut rfc = Rfc4733::new();
        start(&mut rfc, &mut engine, "a", 66, 0, 0).unwrap();
        start(&mut rfc, &mut engine, "a", 1, 0, 0).unwrap();

        rfc.call(&mut engine, "b", "StopTone", &[]).unwrap();
        assert_eq!(engine.server.stream_count(), 0);
        assert_eq!(rfc.owners(), &ToneOwners::default());
    }

    #[test]
    fn test_owner_stop_tone_stops_only_its_class() {
        let mut engine = ToneEngine::default();
        let mut rfc = Rfc4733::new();
        start(&mut rfc, &mut engine, "ind", 72, 0, 0).unwrap();
        start(&mut rfc, &mut engine, "pad", 9, 0, 0).unwrap();
        assert_eq!(
            indicator_kinds(&engine),
            vec![ToneKind::Busy, ToneKind::DtmfIndicatorLow, ToneKind::DtmfIndicatorHigh]
        );

        rfc.call(&mut engine, "pad", "StopTone", &[]).unwrap();
        assert_eq!(indicator_kinds(&engine), vec![ToneKind::Busy]);
        assert_eq!(rfc.owners().indicator, Some(sender("ind")));

        rfc.call(&mut engine, "ind", "StopTone", &[]).unwrap();
        assert!(engine.server.stream_find(INDICATOR_STREAM).is_none());
        assert_eq!(rfc.owners(), &ToneOwners::default());
    }

    #[test]
    fn test_stop_event_tone_selects_class_by_code() {
        let mut engine = ToneEngine::default();
        let mut rfc = Rfc4733::new();
        start(&mut rfc, &mut engine, "a", 70, 0, 0).unwrap();
        start(&mut rfc, &mut engine, "b", 3, 0, 0).unwrap();

        rfc.call(&mut engine, "c", "StopEventTone", &[Arg::U32(15)]).unwrap();
        assert_eq!(indicator_kinds(&engine), vec![ToneKind::Ring]);
        assert_eq!(rfc.owners().dtmf, None);

        rfc.call(&mut engine, "c", "StopEventTone", &[Arg::U32(999)]).unwrap();
        assert!(engine.server.stream_find(INDICATOR_STREAM).is_none());
        assert_eq!(rfc.owners().indicator, None);
    }

    #[test]
    fn test_last_writer_owns_slot() {
        let mut engine = ToneEngine::default();
        let mut rfc = Rfc4733::new();
        start(&mut rfc, &mut engine, "a", 66, 0, 0).unwrap();
        start(&mut rfc, &mut engine, "b", 72, 0, 0).unwrap();

        assert_eq!(rfc.owners().indicator, Some(sender("b")));
        assert_eq!(indicator_kinds(&engine), vec![ToneKind::Busy]);
    }

    #[test]
    fn test_rejected_calls_leave_state_untouched() {
        let mut engine = ToneEngine::default();
        let mut rfc = Rfc4733::new();

        let err = start(&mut rfc, &mut engine, "a", 71, 0, 0).unwrap_err();
        assert!(matches!(err, Error::UnknownEvent(71)));

        let err = rfc.call(&mut engine, "a", "StartEventTone", &[Arg::U32(66)]).unwrap_err();
        assert!(err.is_argument_error());

        let err = rfc
            .call(&mut engine, "a", "StopEventTone", &[Arg::from("66")])
            .unwrap_err();
        assert!(err.is_argument_error());

        let err = rfc.call(&mut engine, "a", "Explode", &[]).unwrap_err();
        assert!(matches!(err, Error::UnknownMethod(_)));

        let long = "x".repeat(MAX_SENDER_LEN + 1);
        assert!(start(&mut rfc, &mut engine, &long, 66, 0, 0).is_err());

        assert_eq!(engine.server.stream_count(), 0);
        assert_eq!(rfc.owners(), &ToneOwners::default());
    }

    #[test]
    fn test_configuration_methods() {
        let mut engine = ToneEngine::default();
        let mut rfc = Rfc4733::new();

        rfc.call(&mut engine, "a", "SetStandard", &[Arg::U32(4)]).unwrap();
        assert_eq!(engine.standard(), Standard::Japan);
        assert!(rfc.call(&mut engine, "a", "SetStandard", &[Arg::I32(-1)]).is_err());
        assert_eq!(engine.standard(), Standard::Japan);

        rfc.call(&mut engine, "a", "SetVolume", &[Arg::U32(30)]).unwrap();
        assert_eq!(engine.indicator.volume_scale(), 30);

        rfc.call(&mut engine, "a", "SetProperties", &[Arg::from("media.role=phone")])
            .unwrap();
        assert!(engine.indicator.properties().is_some());
    }

    #[test]
    fn test_set_properties_applies_to_dtmf_stream() {
        let mut engine = ToneEngine::default();
        let mut rfc = Rfc4733::new();

        rfc.call(&mut engine, "a", "SetProperties", &[Arg::from("media.role=phone")])
            .unwrap();
        start(&mut rfc, &mut engine, "a", 5, 0, 0).unwrap();

        let stream = engine.server.stream_find(DTMF_STREAM).unwrap();
        assert_eq!(stream.properties().and_then(|p| p.get("media.role")), Some("phone"));
    }
}
