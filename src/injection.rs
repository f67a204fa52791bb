// src/injection.rs
//! Per-channel error injection
//!
//! Pattern bursts and continuous-rate injection replace each other on a
//! channel. Channels are independent: programming or stopping one never
//! touches another.
//!
//! Every successful change is mirrored into the pending configuration so a
//! later full commit keeps the injector in the state set here.

use crate::config::ConfigurationStager;
use crate::error::{BertError, BertResult};
use crate::hal::{Command, SharedTransport};
use crate::types::{Channel, ChannelArray, ErrorStruct, InjectionState, IntoChannel};
use std::sync::Arc;

pub struct ErrorInjectionController {
    transport: SharedTransport,
    stager: Arc<ConfigurationStager>,
}

impl ErrorInjectionController {
    pub fn new(transport: SharedTransport, stager: Arc<ConfigurationStager>) -> Self {
        Self { transport, stager }
    }

    /// Inject `error.pattern` for `duration` UIs every `gap + duration` UIs
    pub fn set_pattern(&self, channel: impl IntoChannel, error: ErrorStruct) -> BertResult<()> {
        let ch = channel.into_channel()?;
        if error.duration == 0 {
            return Err(BertError::unsupported("error_duration", "burst duration must be at least one UI"));
        }

        self.transport
            .execute(Command::SetErrorPattern(ch, error))?
            .into_ack()?;
        self.mirror(ch, Some(error))?;
        tracing::info!(channel = %ch, pattern = ?error.pattern, gap = error.gap, duration = error.duration, "error pattern injection on");
        Ok(())
    }

    /// Continuous injection; returns the rate the hardware settled on
    ///
    /// Targets outside the achievable envelope are `UnsupportedOption`.
    pub fn set_rate(&self, channel: impl IntoChannel, target_rate: f64) -> BertResult<f64> {
        let ch = channel.into_channel()?;
        if !target_rate.is_finite() || target_rate <= 0.0 {
            return Err(BertError::unsupported("error_rate", format!("{} is not a positive rate", target_rate)));
        }

        let actual = self
            .transport
            .execute(Command::SetErrorRate(ch, target_rate))?
            .into_error_rate()?;
        self.mirror(ch, None)?;
        tracing::info!(channel = %ch, target_rate, actual_rate = actual, "error rate injection on");
        Ok(actual)
    }

    /// Halt injection on one channel
    pub fn stop(&self, channel: impl IntoChannel) -> BertResult<()> {
        let ch = channel.into_channel()?;
        self.transport
            .execute(Command::StopErrorInsertion(ch))?
            .into_ack()?;
        self.stager.stage("stop_error_insertion", false, |c| {
            c.channels[ch].error_enabled = false;
            Ok(())
        })?;
        tracing::info!(channel = %ch, "error injection off");
        Ok(())
    }

    /// What the injector on `channel` is doing, as reported by hardware
    pub fn state(&self, channel: impl IntoChannel) -> BertResult<InjectionState> {
        let ch = channel.into_channel()?;
        self.transport.execute(Command::ReadInjection(ch))?.into_injection()
    }

    /// Injector state of every channel
    pub fn states(&self) -> BertResult<ChannelArray<InjectionState>> {
        let mut states = ChannelArray::default();
        for ch in Channel::all() {
            states[ch] = self.state(ch)?;
        }
        Ok(states)
    }

    fn mirror(&self, ch: Channel, error: Option<ErrorStruct>) -> BertResult<()> {
        self.stager.stage("error_insertion", false, |c| {
            let settings = &mut c.channels[ch];
            if let Some(error) = error {
                settings.error = error;
            }
            settings.error_enabled = true;
            Ok(())
        })
    }
}

impl std::fmt::Debug for ErrorInjectionController {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ErrorInjectionController")
            .field("transport", &self.transport)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Status;
    use crate::hal::{BoardCapabilities, SimulatedBert};
    use crate::types::ErrorInsertionMode;

    fn controller() -> (ErrorInjectionController, Arc<ConfigurationStager>, SimulatedBert) {
        let sim = SimulatedBert::default();
        let transport = SharedTransport::new(sim.clone());
        let stager = Arc::new(ConfigurationStager::new(transport.clone(), BoardCapabilities::default()));
        (ErrorInjectionController::new(transport, Arc::clone(&stager)), stager, sim)
    }

    fn burst() -> ErrorStruct {
        ErrorStruct {
            pattern: ErrorInsertionMode::All,
            gap: 10,
            duration: 1,
        }
    }

    #[test]
    fn test_pattern_then_stop() {
        let (injection, stager, _) = controller();
        injection.set_pattern(2u8, burst()).unwrap();
        assert_eq!(injection.state(2u8).unwrap(), InjectionState::Pattern(burst()));
        assert!(stager.pending_config().channels[Channel::new(2).unwrap()].error_enabled);

        injection.stop(2u8).unwrap();
        assert_eq!(injection.state(2u8).unwrap(), InjectionState::Off);
        assert!(!stager.pending_config().channels[Channel::new(2).unwrap()].error_enabled);
    }

    #[test]
    fn test_rate_replaces_pattern() {
        let (injection, _, _) = controller();
        injection.set_pattern(1u8, burst()).unwrap();
        let actual = injection.set_rate(1u8, 1e-6).unwrap();
        assert!((actual - 1e-6).abs() / 1e-6 < 0.01);
        assert_eq!(injection.state(1u8).unwrap(), InjectionState::Rate(actual));
    }

    #[test]
    fn test_rate_outside_envelope() {
        let (injection, _, _) = controller();
        for target in [0.5, 1e-20, 0.0, f64::NAN] {
            let err = injection.set_rate(0u8, target).unwrap_err();
            assert_eq!(err.status(), Status::UnsupportedOption);
        }
        assert_eq!(injection.state(0u8).unwrap(), InjectionState::Off);
    }

    #[test]
    fn test_commit_keeps_injection() {
        let (injection, stager, sim) = controller();
        injection.set_pattern(4u8, burst()).unwrap();
        stager.set_linerate(56.0, true).unwrap();
        assert!(sim.injection_state(Channel::new(4).unwrap()).is_active());
    }

    #[test]
    fn test_zero_duration_rejected() {
        let (injection, _, sim) = controller();
        let err = injection
            .set_pattern(0u8, ErrorStruct { duration: 0, ..burst() })
            .unwrap_err();
        assert_eq!(err.status(), Status::UnsupportedOption);
        assert!(sim.command_log().is_empty());
    }
}
