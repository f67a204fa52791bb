// src/config/stager.rs
//! Staged instrument configuration
//!
//! Every setter edits a copy of the pending configuration, validates the
//! copy against the attached board and only then replaces the pending value.
//! With `apply` set, the whole pending configuration is written in one
//! transaction before the copy is kept, so a rejected write leaves the
//! pending state exactly as it was.

use crate::config::settings::{AmplitudeSettings, ConfigurationSettings, JitterSettings, NoiseSettings};
use crate::config::validation::{quantize_noise_burst_rate, validate_configuration};
use crate::error::{BertError, BertResult};
use crate::hal::{BoardCapabilities, Command, SharedTransport};
use crate::types::{
    AfeTrim, CdrDivider, ChannelMask, ClockMode, ClockSource, DspMode, FecMode, FecPattern,
    IntoChannel, Modulation, MonitorDivider, PatternConfig, PatternType, TapsMode, UserPatternWord,
};
use crate::config::constants::geometry::USER_PATTERN_WORDS;
use parking_lot::Mutex;

struct StagerState {
    pending: ConfigurationSettings,
    /// Last configuration read from or written to the hardware
    last_known: Option<ConfigurationSettings>,
}

/// Owner of the pending configuration
pub struct ConfigurationStager {
    transport: SharedTransport,
    capabilities: BoardCapabilities,
    state: Mutex<StagerState>,
}

impl ConfigurationStager {
    /// Stager starting from the default configuration
    pub fn new(transport: SharedTransport, capabilities: BoardCapabilities) -> Self {
        Self {
            transport,
            capabilities,
            state: Mutex::new(StagerState {
                pending: ConfigurationSettings::default(),
                last_known: None,
            }),
        }
    }

    /// Board the stager validates against
    pub fn capabilities(&self) -> &BoardCapabilities {
        &self.capabilities
    }

    /// Copy of the staged configuration
    pub fn pending_config(&self) -> ConfigurationSettings {
        self.state.lock().pending.clone()
    }

    /// Last configuration known to be on the hardware, if any
    pub fn last_known_config(&self) -> Option<ConfigurationSettings> {
        self.state.lock().last_known.clone()
    }

    /// Edit the pending configuration through `edit`, optionally committing
    ///
    /// Nothing changes unless `edit`, validation and (when applying) the
    /// hardware write all succeed.
    pub fn stage<F>(&self, operation: &str, apply: bool, edit: F) -> BertResult<()>
    where
        F: FnOnce(&mut ConfigurationSettings) -> BertResult<()>,
    {
        let mut state = self.state.lock();
        let mut next = state.pending.clone();
        edit(&mut next)?;
        validate_configuration(&next, &self.capabilities)?;

        if apply {
            self.write_full(operation, &next)?;
            state.last_known = Some(next.clone());
        }
        state.pending = next;
        tracing::trace!(operation, apply, "setting staged");
        Ok(())
    }

    /// Write the pending configuration unconditionally
    pub fn commit_config(&self) -> BertResult<()> {
        let mut state = self.state.lock();
        let pending = state.pending.clone();
        self.write_full("commit_config", &pending)?;
        state.last_known = Some(pending);
        Ok(())
    }

    /// Push the pending configuration in one transaction
    ///
    /// Same effect as `commit_config`; setters with `apply` set go through
    /// the same path.
    pub fn apply_configuration(&self) -> BertResult<()> {
        self.commit_config()
    }

    /// Read the hardware configuration and make it the pending one
    pub fn get_active_config(&self) -> BertResult<ConfigurationSettings> {
        let mut state = self.state.lock();
        let active = *self
            .transport
            .execute(Command::ReadConfiguration)?
            .into_configuration()?;
        if active != state.pending {
            tracing::debug!("pending configuration reconciled with hardware");
        }
        state.pending = active.clone();
        state.last_known = Some(active.clone());
        Ok(active)
    }

    /// Replace the whole configuration
    ///
    /// Without `force_update` only the field groups that differ from the last
    /// known hardware state are written; when nothing differs no command is
    /// sent at all.
    pub fn set_active_config(&self, config: ConfigurationSettings, force_update: bool) -> BertResult<()> {
        validate_configuration(&config, &self.capabilities)?;
        let mut state = self.state.lock();

        if force_update {
            self.write_full("set_active_config", &config)?;
        } else {
            let baseline = match state.last_known.take() {
                Some(known) => known,
                None => *self
                    .transport
                    .execute(Command::ReadConfiguration)?
                    .into_configuration()?,
            };
            let fields = config.diff(&baseline);
            if fields.is_empty() {
                tracing::debug!("configuration unchanged, nothing written");
            } else {
                let names: Vec<&str> = fields.iter().map(|f| f.name()).collect();
                if let Err(err) = self.transport.execute(Command::WriteFields(fields)).and_then(|r| r.into_ack()) {
                    tracing::warn!(error = %err, "partial configuration write rejected");
                    state.last_known = Some(baseline);
                    return Err(err);
                }
                tracing::info!(fields = ?names, "configuration fields written");
            }
        }

        state.pending = config.clone();
        state.last_known = Some(config);
        Ok(())
    }

    fn write_full(&self, operation: &str, config: &ConfigurationSettings) -> BertResult<()> {
        let result = self
            .transport
            .execute(Command::WriteConfiguration(Box::new(config.clone())))
            .and_then(|response| response.into_ack());
        match &result {
            Ok(()) => tracing::info!(operation, linerate_gbd = config.signal.linerate_gbd, "configuration committed"),
            Err(err) => tracing::warn!(operation, error = %err, "configuration commit rejected"),
        }
        result
    }

    fn require(&self, present: bool, option: &str, reason: &str) -> BertResult<()> {
        if present {
            Ok(())
        } else {
            Err(BertError::unsupported(option, reason))
        }
    }

    pub fn set_linerate(&self, linerate_gbd: f64, apply: bool) -> BertResult<()> {
        self.stage("set_linerate", apply, |c| {
            c.signal.linerate_gbd = linerate_gbd;
            Ok(())
        })
    }

    pub fn set_modulation(&self, modulation: Modulation, apply: bool) -> BertResult<()> {
        self.stage("set_modulation", apply, |c| {
            c.signal.modulation = modulation;
            Ok(())
        })
    }

    pub fn set_gray_mapping(&self, enabled: bool, apply: bool) -> BertResult<()> {
        self.stage("set_gray_mapping", apply, |c| {
            c.signal.gray_mapping = enabled;
            Ok(())
        })
    }

    pub fn set_precoding(&self, enabled: bool, apply: bool) -> BertResult<()> {
        self.stage("set_precoding", apply, |c| {
            c.signal.precoding = enabled;
            Ok(())
        })
    }

    pub fn set_ieee_mode(&self, enabled: bool, apply: bool) -> BertResult<()> {
        self.stage("set_ieee_mode", apply, |c| {
            c.signal.ieee_mode = enabled;
            Ok(())
        })
    }

    /// Transmit pattern of one channel
    pub fn set_tx_pattern(&self, channel: impl IntoChannel, pattern: PatternConfig, apply: bool) -> BertResult<()> {
        let ch = channel.into_channel()?;
        self.stage("set_tx_pattern", apply, |c| {
            c.channels[ch].tx_pattern = pattern;
            Ok(())
        })
    }

    /// Expected receive pattern of one channel
    pub fn set_rx_pattern(&self, channel: impl IntoChannel, pattern: PatternConfig, apply: bool) -> BertResult<()> {
        let ch = channel.into_channel()?;
        self.stage("set_rx_pattern", apply, |c| {
            c.channels[ch].rx_pattern = pattern;
            Ok(())
        })
    }

    pub fn set_tx_enabled(&self, channel: impl IntoChannel, enabled: bool, apply: bool) -> BertResult<()> {
        let ch = channel.into_channel()?;
        self.stage("set_tx_enabled", apply, |c| {
            c.channels[ch].tx_enabled = enabled;
            Ok(())
        })
    }

    pub fn set_rx_enabled(&self, channel: impl IntoChannel, enabled: bool, apply: bool) -> BertResult<()> {
        let ch = channel.into_channel()?;
        self.stage("set_rx_enabled", apply, |c| {
            c.channels[ch].rx_enabled = enabled;
            Ok(())
        })
    }

    /// Switch a channel's generator to user-defined words
    pub fn set_user_defined_pattern(
        &self,
        channel: impl IntoChannel,
        words: [UserPatternWord; USER_PATTERN_WORDS],
        apply: bool,
    ) -> BertResult<()> {
        let ch = channel.into_channel()?;
        self.require(
            self.capabilities.supports_user_patterns,
            "user_defined_pattern",
            "board has no user-defined pattern generator",
        )?;
        self.stage("set_user_defined_pattern", apply, |c| {
            let pattern = &mut c.channels[ch].tx_pattern;
            pattern.pattern = PatternType::UserDefined;
            pattern.user_defined = words;
            Ok(())
        })
    }

    pub fn set_clock_source(&self, source: ClockSource, apply: bool) -> BertResult<()> {
        self.stage("set_clock_source", apply, |c| {
            c.clock.source = source;
            Ok(())
        })
    }

    pub fn set_clock_mode(&self, mode: ClockMode, apply: bool) -> BertResult<()> {
        self.stage("set_clock_mode", apply, |c| {
            c.clock.mode = mode;
            Ok(())
        })
    }

    pub fn set_monitor_divider(&self, divider: MonitorDivider, apply: bool) -> BertResult<()> {
        self.stage("set_monitor_divider", apply, |c| {
            c.clock.monitor_divider = divider;
            Ok(())
        })
    }

    pub fn set_cdr_divider(&self, divider: CdrDivider, apply: bool) -> BertResult<()> {
        self.stage("set_cdr_divider", apply, |c| {
            c.clock.cdr_divider = divider;
            Ok(())
        })
    }

    /// Channel whose recovered clock drives the CDR output
    pub fn set_cdr_source(&self, channel: impl IntoChannel, apply: bool) -> BertResult<()> {
        let ch = channel.into_channel()?;
        self.stage("set_cdr_source", apply, |c| {
            c.clock.cdr_source = ch;
            Ok(())
        })
    }

    /// FEC mode and link pattern; the mode must run on the installed engine
    pub fn set_fec_mode(&self, mode: FecMode, pattern: FecPattern, apply: bool) -> BertResult<()> {
        self.stage("set_fec_mode", apply, |c| {
            c.fec.mode = mode;
            c.fec.pattern = pattern;
            Ok(())
        })
    }

    /// Links the FEC engine decodes
    pub fn configure_fec_links(&self, links: ChannelMask, apply: bool) -> BertResult<()> {
        let links = links.checked()?;
        self.stage("configure_fec_links", apply, |c| {
            c.fec.links = links;
            Ok(())
        })
    }

    pub fn set_taps_mode(&self, mode: TapsMode, apply: bool) -> BertResult<()> {
        self.stage("set_taps_mode", apply, |c| {
            c.taps_mode = mode;
            Ok(())
        })
    }

    pub fn set_dsp_mode(&self, channel: impl IntoChannel, mode: DspMode, apply: bool) -> BertResult<()> {
        let ch = channel.into_channel()?;
        self.stage("set_dsp_mode", apply, |c| {
            c.channels[ch].dsp_mode = mode;
            Ok(())
        })
    }

    /// Transmit amplitude and taps; returns the approximate output swing in mV
    pub fn set_amplitude(&self, channel: impl IntoChannel, amplitude: AmplitudeSettings, apply: bool) -> BertResult<i32> {
        let ch = channel.into_channel()?;
        self.stage("set_amplitude", apply, |c| {
            c.channels[ch].amplitude = amplitude;
            Ok(())
        })?;
        Ok(amplitude.approximate_output_mv())
    }

    pub fn set_ctle(&self, channel: impl IntoChannel, value: u8, apply: bool) -> BertResult<()> {
        let ch = channel.into_channel()?;
        self.stage("set_ctle", apply, |c| {
            c.channels[ch].ctle = value;
            Ok(())
        })
    }

    pub fn set_afe_trim(&self, trim: AfeTrim, apply: bool) -> BertResult<()> {
        self.stage("set_afe_trim", apply, |c| {
            c.afe_trim = trim;
            Ok(())
        })
    }

    pub fn set_shallow_loopback(&self, enabled: bool, apply: bool) -> BertResult<()> {
        self.stage("set_shallow_loopback", apply, |c| {
            c.shallow_loopback = enabled;
            Ok(())
        })
    }

    /// Whole crosstalk generator block; a disabled block is accepted on any board
    pub fn set_noise(&self, noise: NoiseSettings, apply: bool) -> BertResult<()> {
        self.stage("set_noise", apply, |c| {
            c.noise = noise;
            Ok(())
        })
    }

    pub fn set_noise_level(&self, channel: impl IntoChannel, level: u16, apply: bool) -> BertResult<()> {
        let ch = channel.into_channel()?;
        self.require(self.capabilities.has_noise_source, "noise_level", "board has no noise source")?;
        self.stage("set_noise_level", apply, |c| {
            c.noise.level[ch] = level;
            Ok(())
        })
    }

    /// Gate one aggressor into bursts; returns the rate the gate settled on
    pub fn set_noise_burst_rate(&self, channel: impl IntoChannel, burst_rate: f64, apply: bool) -> BertResult<f64> {
        let ch = channel.into_channel()?;
        self.require(self.capabilities.has_noise_source, "noise_burst_rate", "board has no noise source")?;
        let actual = quantize_noise_burst_rate(burst_rate)?;
        self.stage("set_noise_burst_rate", apply, |c| {
            c.noise.burst_rate[ch] = actual;
            Ok(())
        })?;
        tracing::debug!(channel = %ch, burst_rate, actual_rate = actual, "noise burst rate staged");
        Ok(actual)
    }

    /// PM/FM jitter sources
    pub fn set_jitter(&self, jitter: JitterSettings, apply: bool) -> BertResult<()> {
        self.stage("set_jitter", apply, |c| {
            c.jitter = jitter;
            Ok(())
        })
    }
}

impl std::fmt::Debug for ConfigurationStager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConfigurationStager")
            .field("capabilities", &self.capabilities)
            .field("synced", &self.state.lock().last_known.is_some())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Status;
    use crate::hal::SimulatedBert;
    use crate::types::{Channel, FecFamily};

    fn stager() -> (ConfigurationStager, SimulatedBert) {
        let sim = SimulatedBert::default();
        let stager = ConfigurationStager::new(SharedTransport::new(sim.clone()), BoardCapabilities::default());
        (stager, sim)
    }

    #[test]
    fn test_deferred_setter_does_not_touch_hardware() {
        let (stager, sim) = stager();
        stager.set_linerate(56.0, false).unwrap();

        assert_eq!(stager.pending_config().signal.linerate_gbd, 56.0);
        assert!(sim.command_log().is_empty());
        assert_eq!(sim.active_config().signal.linerate_gbd, 53.125);
    }

    #[test]
    fn test_apply_commits_whole_configuration() {
        let (stager, sim) = stager();
        stager.set_tx_enabled(2u8, true, false).unwrap();
        stager.set_linerate(26.5625, true).unwrap();

        let active = sim.active_config();
        assert_eq!(active.signal.linerate_gbd, 26.5625);
        assert!(active.channels[Channel::new(2).unwrap()].tx_enabled);
        assert_eq!(sim.command_log(), vec!["write_configuration"]);
    }

    #[test]
    fn test_out_of_range_channel_is_rejected() {
        let (stager, _sim) = stager();
        let before = stager.pending_config();
        let err = stager.set_ctle(8u8, 4, false).unwrap_err();
        assert_eq!(err.status(), Status::UnsupportedOption);
        assert_eq!(stager.pending_config(), before);
    }

    #[test]
    fn test_fec_links_beyond_channel_seven_rejected() {
        let (stager, sim) = stager();
        let before = stager.pending_config();
        let err = stager
            .configure_fec_links(ChannelMask::from_bits_retain(0x0300), true)
            .unwrap_err();
        assert_eq!(err.status(), Status::UnsupportedOption);
        assert_eq!(stager.pending_config(), before);
        assert!(sim.command_log().is_empty());
    }

    #[test]
    fn test_out_of_range_value_is_not_clamped() {
        let (stager, _sim) = stager();
        let err = stager.set_ctle(0u8, 40, false).unwrap_err();
        assert_eq!(err.status(), Status::UnsupportedOption);
        assert_eq!(stager.pending_config().channels[Channel::CH0].ctle, 0);
    }

    #[test]
    fn test_failed_commit_rolls_back_staged_value() {
        let (stager, sim) = stager();
        sim.fail_commits(true);

        let err = stager.set_linerate(56.0, true).unwrap_err();
        assert_eq!(err.status(), Status::Failed);
        assert_eq!(stager.pending_config().signal.linerate_gbd, 53.125);
        assert_eq!(sim.active_config().signal.linerate_gbd, 53.125);
    }

    #[test]
    fn test_fec_mode_needs_matching_engine() {
        let sim = SimulatedBert::default();
        let caps = BoardCapabilities {
            fec_family: FecFamily::Compact,
            ..BoardCapabilities::default()
        };
        let stager = ConfigurationStager::new(SharedTransport::new(sim), caps);

        let err = stager.set_fec_mode(FecMode::Kp8ToKp4_400G, FecPattern::Idle, false).unwrap_err();
        assert_eq!(err.status(), Status::UnsupportedOption);
        assert!(stager.set_fec_mode(FecMode::Kp4_100G, FecPattern::Idle, false).is_ok());
    }

    #[test]
    fn test_noise_needs_noise_source() {
        let sim = SimulatedBert::default();
        let caps = BoardCapabilities {
            has_noise_source: false,
            ..BoardCapabilities::default()
        };
        let stager = ConfigurationStager::new(SharedTransport::new(sim), caps);
        let err = stager.set_noise_level(1u8, 100, false).unwrap_err();
        assert_eq!(err.status(), Status::UnsupportedOption);
        let err = stager.set_noise_burst_rate(1u8, 0.5, false).unwrap_err();
        assert_eq!(err.status(), Status::UnsupportedOption);

        // Switching the generator off is always allowed
        stager.set_noise(NoiseSettings::default(), true).unwrap();
        let mut on = NoiseSettings::default();
        on.enabled = true;
        let err = stager.set_noise(on, false).unwrap_err();
        assert_eq!(err.status(), Status::UnsupportedOption);
    }

    #[test]
    fn test_noise_burst_rate_returns_quantized_rate() {
        let (stager, sim) = stager();
        let actual = stager.set_noise_burst_rate(3u8, 0.1, false).unwrap();
        assert_eq!(actual, 26.0 / 256.0);
        assert!(sim.command_log().is_empty());

        let ch = Channel::new(3).unwrap();
        assert_eq!(stager.pending_config().noise.burst_rate[ch], actual);
        assert_eq!(stager.set_noise_burst_rate(3u8, 0.5, true).unwrap(), 0.5);
        assert_eq!(sim.active_config().noise.burst_rate[ch], 0.5);

        let before = stager.pending_config();
        let err = stager.set_noise_burst_rate(3u8, 0.0, true).unwrap_err();
        assert_eq!(err.status(), Status::UnsupportedOption);
        assert_eq!(stager.pending_config(), before);
        assert_eq!(stager.set_noise_burst_rate(9u8, 0.5, false).unwrap_err().status(), Status::UnsupportedOption);
    }

    #[test]
    fn test_amplitude_returns_approximate_swing() {
        let (stager, _sim) = stager();
        let mut amplitude = AmplitudeSettings::default();
        amplitude.scaling_level = 80;
        assert_eq!(stager.set_amplitude(Channel::CH0, amplitude, false).unwrap(), 720);
    }

    #[test]
    fn test_get_active_config_reconciles_drift() {
        let (stager, sim) = stager();
        stager.set_linerate(56.0, false).unwrap();

        let active = stager.get_active_config().unwrap();
        assert_eq!(active, sim.active_config());
        assert_eq!(stager.pending_config(), active);
    }

    #[test]
    fn test_set_active_config_writes_only_differences() {
        let (stager, sim) = stager();
        let mut config = ConfigurationSettings::default();
        config.shallow_loopback = true;

        stager.set_active_config(config.clone(), false).unwrap();
        assert_eq!(sim.command_log(), vec!["read_configuration", "write_fields"]);
        assert!(sim.active_config().shallow_loopback);

        sim.clear_command_log();
        stager.set_active_config(config.clone(), false).unwrap();
        assert!(sim.command_log().is_empty());

        stager.set_active_config(config, true).unwrap();
        assert_eq!(sim.command_log(), vec!["write_configuration"]);
    }

    #[test]
    fn test_user_pattern_words_staged() {
        let (stager, _sim) = stager();
        let words = [
            UserPatternWord { pattern: 0xAAAA_5555_AAAA_5555, repetition: 2 },
            UserPatternWord { pattern: 0xFFFF_0000_FFFF_0000, repetition: 1 },
        ];
        stager.set_user_defined_pattern(4u8, words, false).unwrap();
        let pattern = stager.pending_config().channels[Channel::new(4).unwrap()].tx_pattern;
        assert_eq!(pattern.pattern, PatternType::UserDefined);
        assert_eq!(pattern.period_bits(), 192);
    }
}
