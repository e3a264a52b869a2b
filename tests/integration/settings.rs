//! Builder validation and preset serialization.

use strata::prelude::*;
use strata::{Error, QuantizeMode, SwitchLocation, SyncMode};

#[test]
fn test_builder_rejects_bad_config() {
    assert!(matches!(
        StrataEngine::builder().channels(0).build(),
        Err(Error::Core(_))
    ));
    assert!(StrataEngine::builder().loops_per_track(0).build().is_err());
    assert!(StrataEngine::builder().latency(1 << 20, 0).build().is_err());
    assert!(StrataEngine::builder().sample_rate(100).build().is_err());
}

#[test]
fn test_builder_applies_config() {
    let engine = StrataEngine::builder()
        .sample_rate(48000)
        .channels(2)
        .tracks(3)
        .loops_per_track(8)
        .latency(128, 64)
        .build()
        .unwrap();
    let config = engine.config();
    assert_eq!(config.sample_rate, 48000);
    assert_eq!(config.total_latency(), 192);
    assert_eq!(engine.track_count(), 3);
    assert_eq!(engine.track(2).unwrap().loop_count(), 8);
    assert_eq!(engine.handle().track_count(), 3);
}

#[test]
fn test_builder_sanitizes_presets() {
    let engine = StrataEngine::builder()
        .preset(Preset {
            feedback: 200,
            record_threshold: 40,
            subcycles: 0,
            ..Default::default()
        })
        .build()
        .unwrap();
    let preset = engine.track(0).unwrap().preset();
    assert_eq!(preset.feedback, 127);
    assert_eq!(preset.record_threshold, 8);
    assert_eq!(preset.subcycles, 1);
}

#[test]
fn test_preset_serde_round_trip() {
    let preset = Preset {
        feedback: 100,
        quantize: QuantizeMode::Cycle,
        switch_location: SwitchLocation::Restore,
        sync_mode: SyncMode::Host,
        ..Default::default()
    };
    let json = serde_json::to_string(&preset).unwrap();
    let back: Preset = serde_json::from_str(&json).unwrap();
    assert_eq!(back, preset);
}

#[test]
fn test_preset_missing_fields_use_defaults() {
    let back: Preset = serde_json::from_str(r#"{ "feedback": 90, "quantize": "Loop" }"#).unwrap();
    assert_eq!(back.feedback, 90);
    assert_eq!(back.quantize, QuantizeMode::Loop);
    assert_eq!(back.subcycles, Preset::default().subcycles);
    assert_eq!(back.sync_mode, SyncMode::Off);
}

#[test]
fn test_config_serde_round_trip() {
    let config = EngineConfig {
        tracks: 4,
        input_latency: 300,
        ..Default::default()
    };
    let json = serde_json::to_string_pretty(&config).unwrap();
    let back: EngineConfig = serde_json::from_str(&json).unwrap();
    assert_eq!(back, config);
}

#[test]
fn test_preset_change_from_handle() {
    let mut engine = StrataEngine::builder().channels(1).tracks(2).build().unwrap();
    let handle = engine.handle();
    handle
        .set_preset(
            Some(1),
            Preset {
                quantize: QuantizeMode::Loop,
                ..Default::default()
            },
        )
        .unwrap();
    let input = vec![0.0; 32];
    let mut out = vec![0.0; 32];
    engine.process(&input, &mut out);
    assert_eq!(engine.track(0).unwrap().preset().quantize, QuantizeMode::Off);
    assert_eq!(engine.track(1).unwrap().preset().quantize, QuantizeMode::Loop);
}
