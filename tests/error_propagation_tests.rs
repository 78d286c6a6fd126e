// tests/error_propagation_tests.rs
//! Error propagation across module boundaries
//!
//! Module errors must surface as `VitalsError` with a useful context and,
//! where there is one, the original error as `source()`.

use nicu_vitals::config::{ConfigError, ConfigLoader, SystemConfig};
use nicu_vitals::error::{IntoVitalsError, VitalsErrorBuilder};
use nicu_vitals::feed::FeedError;
use nicu_vitals::trend::{TrendBufferError, TrendStore};
use nicu_vitals::{
    PatientId, PatientProfile, Sample, SampleOrigin, SignalKind, StaticProfiles, ValidationError,
    VitalsContext, VitalsError, VitalsResult,
};
use std::error::Error;
use std::sync::Arc;

fn profiles() -> Arc<StaticProfiles> {
    Arc::new(StaticProfiles::with_fallback(PatientProfile::neonatal_default()))
}

fn load_from(path: &str) -> VitalsResult<SystemConfig> {
    let config = ConfigLoader::with_paths(vec![path.into()])
        .with_env_prefix("NICU_ERROR_TEST_UNUSED_")
        .load_system_config()?;
    Ok(config)
}

#[test]
fn test_inconsistent_config_rejected_by_context() {
    let mut config = SystemConfig::default();
    config.engine.staleness_check_interval_ms = config.engine.staleness_window_ms + 1;

    let err = VitalsContext::new(config, profiles()).unwrap_err();
    match &err {
        VitalsError::Configuration { reason, context, .. } => {
            assert!(reason.contains("Staleness check interval"));
            assert_eq!(context.component, "context");
        }
        other => panic!("Expected configuration error, got: {:?}", other),
    }
    assert!(err.to_string().starts_with("[CONFIG]"));
}

#[test]
fn test_config_error_propagates_with_question_mark() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("broken.toml");
    std::fs::write(&path, "engine = [").unwrap();

    let err = load_from(path.to_str().unwrap()).unwrap_err();
    assert!(matches!(err, VitalsError::Configuration { .. }));
    assert!(err.to_string().contains("parse error"));
}

#[test]
fn test_config_error_display_lists_violations() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("config.toml");
    std::fs::write(&path, "[engine]\ntick_interval_ms = 1\npoints_per_hour = 0\n").unwrap();

    let err = ConfigLoader::with_paths(vec![path])
        .with_env_prefix("NICU_ERROR_TEST_UNUSED_")
        .load_system_config()
        .unwrap_err();

    match &err {
        ConfigError::ValidationError(violations) => {
            let fields: Vec<&str> = violations.iter().map(|v| v.field.as_str()).collect();
            assert!(fields.contains(&"engine.tick_interval_ms"));
            assert!(fields.contains(&"engine.points_per_hour"));
        }
        other => panic!("Expected validation error, got: {:?}", other),
    }
    assert!(err.to_string().contains("engine.tick_interval_ms"));
}

#[test]
fn test_buffer_error_keeps_source() {
    let store = TrendStore::new(4).unwrap();
    let patient = PatientId::new("1");
    store
        .append(&patient, SignalKind::HeartRate, Sample::new(100, 140.0, SampleOrigin::Live))
        .unwrap();

    let result: VitalsResult<_> = store
        .append(&patient, SignalKind::HeartRate, Sample::new(50, 141.0, SampleOrigin::Live))
        .map_err(|e| VitalsErrorBuilder::new("trend", "append").buffer(&patient, SignalKind::HeartRate, e));

    let err = result.unwrap_err();
    let source = err.source().expect("buffer error source");
    assert!(source.to_string().contains("older than newest"));
    assert!(matches!(
        err,
        VitalsError::Buffer {
            error: TrendBufferError::OutOfOrder { last: 100, attempted: 50 },
            ..
        }
    ));
}

#[test]
fn test_zero_capacity_store_converts() {
    fn build() -> VitalsResult<TrendStore> {
        Ok(TrendStore::new(0)?)
    }

    let err = build().unwrap_err();
    assert!(matches!(
        err,
        VitalsError::Buffer {
            error: TrendBufferError::InvalidCapacity,
            patient: None,
            ..
        }
    ));
}

#[test]
fn test_feed_error_conversion() {
    let errors = vec![
        FeedError::ConnectionFailed("refused".to_string()),
        FeedError::ConnectionLost("broker restart".to_string()),
        FeedError::Timeout(5_000),
    ];

    for feed_error in errors {
        let err: VitalsError = feed_error.clone().into();
        match &err {
            VitalsError::Feed { error, retry_count, context, .. } => {
                assert_eq!(error, &feed_error);
                assert_eq!(*retry_count, 0);
                assert_eq!(context.component, "feed");
            }
            other => panic!("Expected feed error, got: {:?}", other),
        }
        assert!(err.to_string().starts_with("[FEED]"));
    }
}

#[test]
fn test_validation_error_conversion() {
    let err: VitalsError = ValidationError::NotFinite {
        field: "generator.live_reversion".to_string(),
    }
    .into();

    assert!(matches!(err, VitalsError::Validation { .. }));
    assert!(err.source().is_some());
}

#[test]
fn test_export_error_names_path() {
    let store = TrendStore::new(4).unwrap();
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("no-such-dir").join("trend.csv");

    let err = nicu_vitals::export::export_csv(&store, &PatientId::new("1"), &path).unwrap_err();
    match &err {
        VitalsError::Export { path: Some(reported), .. } => assert!(reported.ends_with("trend.csv")),
        other => panic!("Expected export error, got: {:?}", other),
    }
}

#[test]
fn test_error_context_serializes() {
    let err = VitalsErrorBuilder::new("source", "open_view")
        .view_conflict(&PatientId::new("3"))
        .with_info("bed", "12");

    let json = serde_json::to_value(err.context()).unwrap();
    assert_eq!(json["component"], "source");
    assert_eq!(json["operation"], "open_view");
    assert_eq!(json["additional_info"]["bed"], "12");
    assert!(err.to_string().contains("Patient 3"));
}

#[test]
fn test_io_errors_wrap_as_system() {
    let result: Result<(), std::io::Error> =
        Err(std::io::Error::new(std::io::ErrorKind::PermissionDenied, "read-only volume"));

    match result.vitals_err("export", "write").unwrap_err() {
        VitalsError::System { subsystem, reason, context } => {
            assert_eq!(subsystem, "export");
            assert!(reason.contains("read-only"));
            assert_eq!(context.operation, "write");
        }
        other => panic!("Expected system error, got: {:?}", other),
    }
}

#[test]
fn test_every_error_category_has_prefix() {
    let patient = PatientId::new("5");
    let errors = vec![
        ("[CONFIG]", VitalsErrorBuilder::new("config", "load").configuration("bad")),
        ("[FEED]", FeedError::NotConnected.into()),
        (
            "[BUFFER]",
            VitalsErrorBuilder::new("trend", "append").buffer(
                &patient,
                SignalKind::SpO2,
                TrendBufferError::InvalidCapacity,
            ),
        ),
        (
            "[VALIDATION]",
            ValidationError::NotFinite {
                field: "limits.low".to_string(),
            }
            .into(),
        ),
        ("[VIEW]", VitalsErrorBuilder::new("context", "open_view").view_conflict(&patient)),
        ("[VIEW]", VitalsErrorBuilder::new("view", "pause").view_closed(&patient)),
        ("[EXPORT]", VitalsErrorBuilder::new("export", "write").export(None, "disk full")),
        (
            "[SYSTEM]",
            std::io::Error::new(std::io::ErrorKind::Other, "boom").into(),
        ),
    ];

    for (prefix, err) in errors {
        let err: VitalsError = err;
        assert!(err.to_string().starts_with(prefix), "{} lacks {}", err, prefix);
    }
}
