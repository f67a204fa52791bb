// tests/capture_integration.rs
//! Capture sessions against the simulated instrument

use bert_core::config::ManagerSettings;
use bert_core::hal::SimulatedBert;
use bert_core::types::{Channel, ChannelMask, FecMode, FecPattern, PatternConfig, PatternType};
use bert_core::{BertInstrument, CaptureState, Status};
use std::thread;
use std::time::{Duration, Instant};

fn fast_instrument(sim: &SimulatedBert) -> BertInstrument {
    let settings = ManagerSettings {
        sample_interval_ms: 5,
        monitor_settle_ms: 0,
        ..ManagerSettings::default()
    };
    BertInstrument::open(sim.clone(), settings).expect("Failed to open simulator")
}

fn configure_prbs31(instrument: &BertInstrument, channel: u8) {
    let config = instrument.config();
    let prbs31 = PatternConfig::new(PatternType::Prbs31);
    config.set_linerate(56.0, false).unwrap();
    config.set_tx_pattern(channel, prbs31, false).unwrap();
    config.set_rx_pattern(channel, prbs31, false).unwrap();
    config.set_tx_enabled(channel, true, false).unwrap();
    config.set_rx_enabled(channel, true, true).unwrap();
}

fn ch(index: u8) -> Channel {
    Channel::new(index).unwrap()
}

#[test]
fn test_prbs31_background_capture_scenario() {
    let sim = SimulatedBert::default();
    let instrument = fast_instrument(&sim);
    configure_prbs31(&instrument, 0);

    let engine = instrument.acquisition();
    engine.start_background(ChannelMask::from_raw(0b0000_0001).unwrap(), true).unwrap();

    let mut last_total = 0u64;
    let mut seen = 0usize;
    for _ in 0..5 {
        thread::sleep(Duration::from_millis(30));
        for snapshot in engine.drain(1024).unwrap() {
            let ber = &snapshot.ber;
            assert!(ber.enabled_channels[ch(0)]);
            for index in 1..8 {
                assert!(!ber.enabled_channels[ch(index)]);
                assert_eq!(ber.bit_count[ch(index)], 0);
            }
            assert!(ber.locked_channels[ch(0)]);

            let total = ber.accumulated.as_ref().unwrap().error_count[ch(0)];
            assert!(total >= last_total, "accumulated errors went from {} to {}", last_total, total);
            last_total = total;
            seen += 1;
        }
    }

    engine.stop().unwrap();
    assert!(seen > 0);
    assert_eq!(engine.status().state, CaptureState::Idle);
}

#[test]
fn test_restart_resets_accumulation() {
    let sim = SimulatedBert::default();
    let instrument = fast_instrument(&sim);
    configure_prbs31(&instrument, 0);
    instrument.injection().set_rate(0u8, 1e-4).unwrap();

    let engine = instrument.acquisition();
    engine
        .start_capture_loop_with_timeout(ChannelMask::CH0, true, Duration::from_millis(60))
        .unwrap();
    let first = engine.drain(1024).unwrap();
    let first_total = first.last().unwrap().ber.accumulated.as_ref().unwrap().total_bit_count[ch(0)];

    engine
        .start_capture_loop_with_timeout(ChannelMask::CH0, true, Duration::from_millis(60))
        .unwrap();
    let second = engine.drain(1024).unwrap();
    assert_eq!(second[0].sequence, 0);

    let restarted = second[0].ber.accumulated.as_ref().unwrap();
    assert_eq!(restarted.total_bit_count[ch(0)], second[0].ber.bit_count[ch(0)]);
    assert_eq!(restarted.error_count[ch(0)], second[0].ber.error_count[ch(0)]);
    assert!(first_total > restarted.total_bit_count[ch(0)]);
}

#[test]
fn test_interval_only_capture_has_no_totals() {
    let sim = SimulatedBert::default();
    let instrument = fast_instrument(&sim);
    configure_prbs31(&instrument, 3);

    let engine = instrument.acquisition();
    let summary = engine
        .start_capture_loop_with_timeout(ChannelMask::CH3, false, Duration::from_millis(30))
        .unwrap();
    let snapshots = engine.drain(1024).unwrap();
    assert_eq!(snapshots.len() as u64, summary.samples);
    assert!(snapshots.iter().all(|s| s.ber.accumulated.is_none()));
    assert!(snapshots.iter().all(|s| s.ber.bit_count[ch(3)] > 0));
}

#[test]
fn test_failure_surfaces_on_next_drain() {
    let sim = SimulatedBert::default();
    let instrument = fast_instrument(&sim);
    configure_prbs31(&instrument, 0);
    sim.fail_sampling_after(Some(3));

    let engine = instrument.acquisition();
    engine.start_background(ChannelMask::CH0, true).unwrap();

    let started = Instant::now();
    while engine.is_capturing() && started.elapsed() < Duration::from_secs(5) {
        thread::sleep(Duration::from_millis(2));
    }
    assert_eq!(engine.status().state, CaptureState::Idle);
    assert!(!sim.ber_running());

    let err = engine.drain(1024).unwrap_err();
    assert_eq!(err.status(), Status::Failed);
    assert_eq!(engine.drain(1024).unwrap().len(), 3);
}

#[test]
fn test_blocking_loop_reports_failure_directly() {
    let sim = SimulatedBert::default();
    let instrument = fast_instrument(&sim);
    sim.fail_sampling_after(Some(1));

    let err = instrument
        .acquisition()
        .start_capture_loop(ChannelMask::CH0, false)
        .unwrap_err();
    assert_eq!(err.status(), Status::Failed);
    assert!(instrument.acquisition().status().pending_error.is_none());
}

#[test]
fn test_configuration_interleaves_with_capture() {
    let sim = SimulatedBert::default();
    let instrument = fast_instrument(&sim);
    configure_prbs31(&instrument, 0);

    let engine = instrument.acquisition();
    engine.start_background(ChannelMask::CH0 | ChannelMask::CH1, true).unwrap();
    thread::sleep(Duration::from_millis(20));

    instrument.config().set_rx_enabled(1u8, true, true).unwrap();
    thread::sleep(Duration::from_millis(30));
    engine.stop().unwrap();

    let snapshots = engine.drain(1024).unwrap();
    assert!(!snapshots.first().unwrap().ber.locked_channels[ch(1)]);
    assert!(snapshots.last().unwrap().ber.locked_channels[ch(1)]);
    assert!(snapshots.windows(2).all(|w| w[1].sequence == w[0].sequence + 1));
}

#[test]
fn test_real_fec_report_follows_mode() {
    let sim = SimulatedBert::default();
    let instrument = fast_instrument(&sim);
    configure_prbs31(&instrument, 0);
    let config = instrument.config();
    config.configure_fec_links(ChannelMask::CH0, false).unwrap();
    config.set_fec_mode(FecMode::Kp1ToKp1_50G, FecPattern::Idle, true).unwrap();

    let engine = instrument.acquisition();
    engine
        .start_capture_loop_with_timeout(ChannelMask::CH0, true, Duration::from_millis(30))
        .unwrap();
    let snapshots = engine.drain(1024).unwrap();
    let last = snapshots.last().unwrap();

    assert!(last.real_fec.enabled);
    assert!(last.real_fec.enabled_links[0]);
    assert!(!last.real_fec.enabled_links[1]);
    assert!(last.real_fec.interval[0].codewords_processed > 0);
    assert!(last.real_fec.ser[0].symbols() <= 31);
    assert!(!last.emulator_fec.enabled);
    assert!(!last.compact_fec.enabled);
}
