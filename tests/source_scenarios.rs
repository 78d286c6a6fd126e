// tests/source_scenarios.rs
//! Timer-driven scenarios for the data source controller
//!
//! All tests run on a paused clock: tokio advances time whenever every task
//! is idle, so multi-second scenarios complete instantly.

use async_trait::async_trait;
use nicu_vitals::alarm::Limits;
use nicu_vitals::feed::{in_process_channel, ChannelPublisher, FeedError, VitalsChannel};
use nicu_vitals::{
    AlarmSeverity, DataSourceState, MonitorView, PatientId, PatientProfile, ReseedOutcome,
    SampleOrigin, SignalKind, StaticProfiles, SystemConfig, TimeRange, VitalsContext, VitalsError,
};
use serde_json::json;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

fn config() -> SystemConfig {
    let mut config = SystemConfig::default();
    config.generator.seed = Some(7);
    config
}

fn context_with(config: SystemConfig) -> (VitalsContext, Arc<StaticProfiles>) {
    let profiles = Arc::new(StaticProfiles::with_fallback(PatientProfile::neonatal_default()));
    let context = VitalsContext::new(config, profiles.clone()).expect("valid config");
    (context, profiles)
}

fn context() -> VitalsContext {
    context_with(config()).0
}

fn live_view(context: &VitalsContext, patient: &str) -> (MonitorView, ChannelPublisher) {
    let (channel, publisher) = in_process_channel(16);
    let view = context
        .open_view(PatientId::new(patient), Some(Box::new(channel)))
        .expect("open view");
    (view, publisher)
}

/// Broker that accepts the TCP handshake and then never answers
struct UnresponsiveChannel {
    attempts: Arc<AtomicU64>,
}

#[async_trait]
impl VitalsChannel for UnresponsiveChannel {
    async fn connect(&mut self, _patient: &PatientId) -> Result<(), FeedError> {
        self.attempts.fetch_add(1, Ordering::SeqCst);
        std::future::pending().await
    }

    async fn recv(&mut self) -> Result<Vec<u8>, FeedError> {
        Err(FeedError::NotConnected)
    }

    async fn disconnect(&mut self) -> Result<(), FeedError> {
        Ok(())
    }

    fn is_connected(&self) -> bool {
        false
    }

    fn describe(&self) -> String {
        "unresponsive".to_string()
    }
}

async fn settle() {
    tokio::time::sleep(Duration::from_millis(1)).await;
}

async fn sleep_ms(ms: u64) {
    tokio::time::sleep(Duration::from_millis(ms)).await;
}

#[tokio::test(start_paused = true)]
async fn test_open_view_backfills_initial_range() {
    let context = context();
    let view = context.open_view(PatientId::new("1"), None).unwrap();

    let status = view.status();
    assert_eq!(status.state, DataSourceState::Simulation);
    assert_eq!(status.time_range, TimeRange::OneHour);
    assert_eq!(status.reseeds, 1);

    for kind in SignalKind::ALL {
        let samples = view.snapshot(kind);
        assert_eq!(samples.len(), 30, "{kind}");
        assert!(samples.iter().all(|s| s.origin == SampleOrigin::Backfill));
        assert!(samples.windows(2).all(|pair| pair[0].time <= pair[1].time));
    }

    view.close().await.unwrap();
}

#[tokio::test(start_paused = true)]
async fn test_simulation_ticks_within_two_seconds() {
    let context = context();
    let (channel, publisher) = in_process_channel(16);
    publisher.refuse_connections(true);
    let view = context.open_view(PatientId::new("1"), Some(Box::new(channel))).unwrap();

    sleep_ms(2_100).await;

    let status = view.status();
    assert_eq!(status.state, DataSourceState::Simulation);
    assert!(!status.connected);
    assert_eq!(status.simulated_ticks, 1);
    assert!(status.last_update_ms.is_some());

    let latest = view.latest(SignalKind::HeartRate).unwrap();
    assert_eq!(latest.origin, SampleOrigin::Simulated);
    // Buffer was already full from the backfill
    assert_eq!(view.len(SignalKind::HeartRate), 30);

    view.close().await.unwrap();
}

#[tokio::test(start_paused = true)]
async fn test_hanging_connect_does_not_stall_driver() {
    let context = context();
    let attempts = Arc::new(AtomicU64::new(0));
    let channel = UnresponsiveChannel {
        attempts: attempts.clone(),
    };
    let view = context.open_view(PatientId::new("1"), Some(Box::new(channel))).unwrap();

    // Connect timeout is 5s, the first tick is still due at 2s
    sleep_ms(2_100).await;
    let status = view.status();
    assert_eq!(status.state, DataSourceState::Simulation);
    assert_eq!(status.simulated_ticks, 1);
    assert_eq!(attempts.load(Ordering::SeqCst), 1);

    // Operator commands are served while the attempt is pending
    let started = tokio::time::Instant::now();
    view.pause().await.unwrap();
    view.resume().await.unwrap();
    assert!(started.elapsed() < Duration::from_millis(100));

    // Attempts at 0s, 8s, 16s and 24s each time out after 5s
    sleep_ms(27_900).await;
    let status = view.status();
    assert!(!status.connected);
    assert_eq!(status.state, DataSourceState::Simulation);
    assert_eq!(status.simulated_ticks, 14);
    assert_eq!(attempts.load(Ordering::SeqCst), 4);

    view.close().await.unwrap();
}

#[tokio::test(start_paused = true)]
async fn test_disable_during_pending_connect() {
    let context = context();
    let attempts = Arc::new(AtomicU64::new(0));
    let channel = UnresponsiveChannel {
        attempts: attempts.clone(),
    };
    let view = context.open_view(PatientId::new("1"), Some(Box::new(channel))).unwrap();
    settle().await;

    view.set_live_enabled(false).await.unwrap();
    assert!(!view.status().live_enabled);

    // The pending attempt times out quietly and is not retried
    sleep_ms(30_000).await;
    assert_eq!(attempts.load(Ordering::SeqCst), 1);
    assert_eq!(view.state(), DataSourceState::Simulation);

    view.close().await.unwrap();
}

#[tokio::test(start_paused = true)]
async fn test_connected_without_messages_is_stale() {
    let context = context();
    let (view, publisher) = live_view(&context, "1");

    view.wait_for_state(DataSourceState::Stale).await.unwrap();
    assert!(view.status().connected);
    assert!(publisher.is_subscribed());

    // Stale does not fall back to simulation on silence alone
    sleep_ms(30_000).await;
    let status = view.status();
    assert_eq!(status.state, DataSourceState::Stale);
    assert_eq!(status.simulated_ticks, 0);

    view.close().await.unwrap();
}

#[tokio::test(start_paused = true)]
async fn test_live_goes_stale_and_recovers() {
    let context = context();
    let (view, publisher) = live_view(&context, "1");
    view.wait_for_state(DataSourceState::Stale).await.unwrap();

    publisher
        .publish_json(&json!({"patient_id": 1, "vitals": {"hr": 150, "spo2": 97}}))
        .await
        .unwrap();
    view.wait_for_state(DataSourceState::Live).await.unwrap();

    let hr = view.latest(SignalKind::HeartRate).unwrap();
    assert_eq!(hr.value, 150.0);
    assert_eq!(hr.origin, SampleOrigin::Live);
    // Signals absent from the message keep their previous sample
    assert_eq!(view.latest(SignalKind::Temperature).unwrap().origin, SampleOrigin::Backfill);

    sleep_ms(9_000).await;
    assert_eq!(view.state(), DataSourceState::Live);

    sleep_ms(2_000).await;
    assert_eq!(view.state(), DataSourceState::Stale);
    // Last values retained while stale
    assert_eq!(view.latest(SignalKind::HeartRate).unwrap().value, 150.0);

    publisher
        .publish_json(&json!({"patientId": "1", "vitals": {"hr": 155}}))
        .await
        .unwrap();
    view.wait_for_state(DataSourceState::Live).await.unwrap();

    let status = view.status();
    assert_eq!(status.messages_accepted, 2);
    assert_eq!(status.simulated_ticks, 0);

    view.close().await.unwrap();
}

#[tokio::test(start_paused = true)]
async fn test_partial_message_keeps_valid_fields() {
    let context = context();
    let (view, publisher) = live_view(&context, "1");
    view.wait_for_state(DataSourceState::Stale).await.unwrap();

    publisher
        .publish_json(&json!({
            "patient_id": 1,
            "vitals": {"hr": 150, "spo2": null, "rr": "fast", "temp": 50.0}
        }))
        .await
        .unwrap();
    view.wait_for_state(DataSourceState::Live).await.unwrap();

    assert_eq!(view.latest(SignalKind::HeartRate).unwrap().origin, SampleOrigin::Live);
    for kind in [SignalKind::SpO2, SignalKind::RespiratoryRate, SignalKind::Temperature] {
        assert_eq!(view.latest(kind).unwrap().origin, SampleOrigin::Backfill, "{kind}");
    }

    let status = view.status();
    assert_eq!(status.messages_accepted, 1);
    assert_eq!(status.fields_dropped, 3);

    view.close().await.unwrap();
}

#[tokio::test(start_paused = true)]
async fn test_message_with_no_valid_fields_still_fresh() {
    let context = context();
    let (view, publisher) = live_view(&context, "1");
    view.wait_for_state(DataSourceState::Stale).await.unwrap();

    publisher
        .publish_json(&json!({"patient_id": 1, "vitals": {"hr": null}}))
        .await
        .unwrap();
    let status = view.wait_for_state(DataSourceState::Live).await.unwrap();
    assert_eq!(status.fields_dropped, 1);
    assert_eq!(view.latest(SignalKind::HeartRate).unwrap().origin, SampleOrigin::Backfill);

    view.close().await.unwrap();
}

#[tokio::test(start_paused = true)]
async fn test_rejected_messages_do_not_refresh() {
    let context = context();
    let (view, publisher) = live_view(&context, "1");
    view.wait_for_state(DataSourceState::Stale).await.unwrap();

    publisher.publish(b"not json".to_vec()).await.unwrap();
    publisher
        .publish_json(&json!({"patient_id": 2, "vitals": {"hr": 150}}))
        .await
        .unwrap();
    publisher.publish_json(&json!({"patient_id": 1})).await.unwrap();
    settle().await;

    let status = view.status();
    assert_eq!(status.state, DataSourceState::Stale);
    assert_eq!(status.messages_rejected, 3);
    assert_eq!(status.messages_accepted, 0);

    view.close().await.unwrap();
}

#[tokio::test(start_paused = true)]
async fn test_range_change_reseeds_once() {
    let context = context();
    let view = context.open_view(PatientId::new("1"), None).unwrap();

    let outcome = view.set_range(TimeRange::TwentyFourHours).await.unwrap();
    assert_eq!(
        outcome,
        ReseedOutcome::Committed {
            range: TimeRange::TwentyFourHours,
            points: 720
        }
    );

    let status = view.status();
    assert_eq!(status.reseeds, 2);
    assert_eq!(status.time_range, TimeRange::TwentyFourHours);

    let samples = view.snapshot(SignalKind::SpO2);
    assert_eq!(samples.len(), 720);
    assert!(samples.iter().all(|s| s.origin == SampleOrigin::Backfill));
    assert!(samples.windows(2).all(|pair| pair[0].time <= pair[1].time));
    assert!(samples.iter().all(|s| (70.0..=100.0).contains(&s.value)));

    view.close().await.unwrap();
}

#[tokio::test(start_paused = true)]
async fn test_queued_range_changes_coalesce() {
    let context = context();
    let view = context.open_view(PatientId::new("1"), None).unwrap();

    // Queued before the driver gets to run
    view.request_range(TimeRange::FourHours).unwrap();
    view.request_range(TimeRange::TwelveHours).unwrap();
    let outcome = view.set_range(TimeRange::TwentyFourHours).await.unwrap();

    assert_eq!(
        outcome,
        ReseedOutcome::Committed {
            range: TimeRange::TwentyFourHours,
            points: 720
        }
    );
    assert_eq!(view.status().reseeds, 2);
    assert_eq!(view.len(SignalKind::HeartRate), 720);

    view.close().await.unwrap();
}

#[tokio::test(start_paused = true)]
async fn test_pause_freezes_buffers() {
    let context = context();
    let view = context.open_view(PatientId::new("1"), None).unwrap();

    view.pause().await.unwrap();
    let frozen = view.snapshot(SignalKind::HeartRate);

    sleep_ms(10_000).await;
    let status = view.status();
    assert!(status.paused);
    assert_eq!(status.simulated_ticks, 0);
    assert_eq!(view.snapshot(SignalKind::HeartRate), frozen);

    // Range change while paused waits for resume
    let outcome = view.set_range(TimeRange::FourHours).await.unwrap();
    assert_eq!(outcome, ReseedOutcome::Deferred);
    assert_eq!(view.status().time_range, TimeRange::FourHours);
    assert_eq!(view.len(SignalKind::HeartRate), 30);

    view.resume().await.unwrap();
    let status = view.status();
    assert!(!status.paused);
    assert_eq!(status.reseeds, 2);
    assert_eq!(view.len(SignalKind::HeartRate), 120);

    sleep_ms(2_100).await;
    assert_eq!(view.status().simulated_ticks, 1);

    view.close().await.unwrap();
}

#[tokio::test(start_paused = true)]
async fn test_live_message_while_paused_updates_state_only() {
    let context = context();
    let (view, publisher) = live_view(&context, "1");
    view.wait_for_state(DataSourceState::Stale).await.unwrap();
    view.pause().await.unwrap();

    publisher
        .publish_json(&json!({"patient_id": 1, "vitals": {"hr": 150}}))
        .await
        .unwrap();
    view.wait_for_state(DataSourceState::Live).await.unwrap();

    assert_eq!(view.latest(SignalKind::HeartRate).unwrap().origin, SampleOrigin::Backfill);
    assert_eq!(view.status().messages_accepted, 1);

    view.close().await.unwrap();
}

#[tokio::test(start_paused = true)]
async fn test_connection_loss_falls_back_and_reconnects() {
    let context = context();
    let (view, publisher) = live_view(&context, "1");
    view.wait_for_state(DataSourceState::Stale).await.unwrap();

    publisher
        .publish_json(&json!({"patient_id": 1, "vitals": {"hr": 150}}))
        .await
        .unwrap();
    view.wait_for_state(DataSourceState::Live).await.unwrap();

    publisher.sever();
    let status = view.wait_for_state(DataSourceState::Simulation).await.unwrap();
    assert!(!status.connected);

    // Simulation resumes one tick interval after the fallback
    sleep_ms(2_100).await;
    assert!(view.status().simulated_ticks >= 1);
    assert_eq!(view.latest(SignalKind::HeartRate).unwrap().origin, SampleOrigin::Simulated);

    // Reconnect attempt after the configured delay
    view.wait_for_state(DataSourceState::Stale).await.unwrap();
    assert_eq!(publisher.connect_attempts(), 2);
    assert!(publisher.is_subscribed());

    view.close().await.unwrap();
}

#[tokio::test(start_paused = true)]
async fn test_reconnect_attempts_are_bounded() {
    let context = context();
    let (channel, publisher) = in_process_channel(16);
    publisher.refuse_connections(true);
    let view = context.open_view(PatientId::new("1"), Some(Box::new(channel))).unwrap();

    // Initial attempt plus five retries three seconds apart
    sleep_ms(20_000).await;
    assert_eq!(publisher.connect_attempts(), 6);

    sleep_ms(60_000).await;
    assert_eq!(publisher.connect_attempts(), 6);
    assert_eq!(view.state(), DataSourceState::Simulation);

    view.close().await.unwrap();
}

#[tokio::test(start_paused = true)]
async fn test_refused_then_accepted_connection() {
    let context = context();
    let (channel, publisher) = in_process_channel(16);
    publisher.refuse_connections(true);
    let view = context.open_view(PatientId::new("1"), Some(Box::new(channel))).unwrap();

    settle().await;
    assert_eq!(view.state(), DataSourceState::Simulation);

    publisher.refuse_connections(false);
    view.wait_for_state(DataSourceState::Stale).await.unwrap();
    assert_eq!(publisher.connect_attempts(), 2);

    view.close().await.unwrap();
}

#[tokio::test(start_paused = true)]
async fn test_disabled_feed_never_connects() {
    let mut config = config();
    config.feed.enabled = false;
    let (context, _) = context_with(config);
    let (view, publisher) = live_view(&context, "1");

    sleep_ms(11_000).await;
    assert_eq!(publisher.connect_attempts(), 0);
    let status = view.status();
    assert!(!status.live_enabled);
    assert_eq!(status.state, DataSourceState::Simulation);
    assert_eq!(status.simulated_ticks, 5);

    view.close().await.unwrap();
}

#[tokio::test(start_paused = true)]
async fn test_operator_toggles_live_source() {
    let context = context();
    let (view, publisher) = live_view(&context, "1");
    view.wait_for_state(DataSourceState::Stale).await.unwrap();

    view.set_live_enabled(false).await.unwrap();
    assert_eq!(view.state(), DataSourceState::Simulation);
    assert!(!publisher.is_subscribed());

    view.set_live_enabled(true).await.unwrap();
    view.wait_for_state(DataSourceState::Stale).await.unwrap();
    assert!(publisher.is_subscribed());

    view.close().await.unwrap();
}

#[tokio::test(start_paused = true)]
async fn test_second_view_for_patient_rejected() {
    let context = context();
    let view = context.open_view(PatientId::new("1"), None).unwrap();

    let conflict = context.open_view(PatientId::new("1"), None).unwrap_err();
    assert!(matches!(conflict, VitalsError::ViewConflict { .. }));

    let other = context.open_view(PatientId::new("2"), None).unwrap();
    assert_eq!(
        context.active_patients(),
        vec![PatientId::new("1"), PatientId::new("2")]
    );

    view.close().await.unwrap();
    other.close().await.unwrap();

    // Reopening after close is allowed
    let reopened = context.open_view(PatientId::new("1"), None).unwrap();
    reopened.close().await.unwrap();
}

#[tokio::test(start_paused = true)]
async fn test_close_tears_down_view() {
    let context = context();
    let store = context.store();
    let (view, publisher) = live_view(&context, "1");
    view.wait_for_state(DataSourceState::Stale).await.unwrap();

    view.close().await.unwrap();

    let patient = PatientId::new("1");
    assert!(!publisher.is_subscribed());
    assert!(!context.is_open(&patient));
    assert!(store.signals(&patient).is_empty());

    // Nothing is written after close
    sleep_ms(10_000).await;
    assert_eq!(store.len(&patient, SignalKind::HeartRate), 0);
}

#[tokio::test(start_paused = true)]
async fn test_dropped_view_releases_patient() {
    let context = context();
    let store = context.store();
    let view = context.open_view(PatientId::new("1"), None).unwrap();
    drop(view);

    // The slot stays taken until the driver itself has stopped
    let patient = PatientId::new("1");
    assert!(context.is_open(&patient));
    assert!(matches!(
        context.open_view(patient.clone(), None),
        Err(VitalsError::ViewConflict { .. })
    ));

    settle().await;
    assert!(!context.is_open(&patient));
    assert!(store.signals(&patient).is_empty());

    sleep_ms(5_000).await;
    assert!(store.signals(&patient).is_empty());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_dropped_view_on_worker_pool_stops_writing() {
    let mut config = config();
    config.engine.tick_interval_ms = 100;
    config.engine.staleness_check_interval_ms = 100;
    let (context, _) = context_with(config);
    let store = context.store();
    let patient = PatientId::new("1");

    let view = context.open_view(patient.clone(), None).unwrap();
    tokio::time::sleep(Duration::from_millis(350)).await;
    drop(view);

    tokio::time::timeout(Duration::from_secs(5), async {
        while context.is_open(&patient) {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    })
    .await
    .expect("driver releases the patient");

    assert!(store.signals(&patient).is_empty());
    tokio::time::sleep(Duration::from_millis(300)).await;
    assert!(store.signals(&patient).is_empty());

    let reopened = context.open_view(patient, None).unwrap();
    reopened.close().await.unwrap();
}

#[tokio::test(start_paused = true)]
async fn test_severity_follows_current_limits() {
    let (context, profiles) = context_with(config());
    let patient = PatientId::new("1");
    profiles.insert(patient.clone(), PatientProfile::neonatal_default());
    let view = context.open_view(patient.clone(), None).unwrap();

    // Normal acuity walks stay near baseline
    assert_eq!(view.severity(SignalKind::HeartRate), AlarmSeverity::Normal);

    profiles.update_limits(&patient, SignalKind::HeartRate, Limits::new(200.0, 210.0).unwrap());
    assert_eq!(view.severity(SignalKind::HeartRate), AlarmSeverity::Warning);

    profiles.update_limits(&patient, SignalKind::SpO2, Limits::new(99.95, 100.0).unwrap());
    assert_eq!(view.severity(SignalKind::SpO2), AlarmSeverity::Critical);
    assert_eq!(view.overall_severity(), AlarmSeverity::Critical);

    view.close().await.unwrap();
}

#[tokio::test(start_paused = true)]
async fn test_view_csv_export() {
    let context = context();
    let view = context.open_view(PatientId::new("1"), None).unwrap();

    let csv = view.to_csv_string().unwrap();
    let mut lines = csv.lines();
    assert_eq!(lines.next(), Some("time,hr,spo2,rr,temp,bp_sys,bp_dia"));
    assert_eq!(lines.count(), 30);

    view.close().await.unwrap();
}

#[test]
fn test_open_view_outside_runtime_errors() {
    let context = context();
    let result = std::thread::spawn(move || context.open_view(PatientId::new("1"), None).map(|_| ()))
        .join()
        .unwrap();
    assert!(matches!(result, Err(VitalsError::System { .. })));
}
