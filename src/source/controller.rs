// src/source/controller.rs
//! Per-view driver task arbitrating between the live feed and the generator
//!
//! One task owns every producer for its patient: live payloads, simulation
//! ticks and reseeds are all applied from the same select loop, so at most
//! one producer ever writes a (patient, signal) buffer. Subscribing is one
//! more branch of that loop and never holds up ticks or operator commands.

use crate::alarm::{evaluate, AlarmSeverity};
use crate::config::EngineConfig;
use crate::feed::{FeedConfig, FeedError, LiveFeedAdapter, VitalsChannel};
use crate::simulation::{
    PatientProfile, PatientProfileSource, SampleGenerator, WalkInput, WalkState, WalkStates,
};
use crate::source::context::ViewLease;
use crate::source::state::{DataSourceState, SourceEvent, SourceStatus};
use crate::trend::{BackfillWindow, TimeRange, TrendStore};
use crate::types::{PatientId, Sample, SignalKind};
use crate::utils::time::TimeProvider;
use std::collections::HashMap;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, oneshot, watch};
use tokio::time::{interval_at, sleep_until, Instant, Interval, MissedTickBehavior};
use tracing::{debug, info, warn};

/// Operator requests delivered to a driver
#[derive(Debug)]
pub(crate) enum ViewCommand {
    Pause(oneshot::Sender<()>),
    Resume(oneshot::Sender<()>),
    SetRange {
        range: TimeRange,
        ack: Option<oneshot::Sender<ReseedOutcome>>,
    },
    SetLiveEnabled {
        enabled: bool,
        ack: oneshot::Sender<()>,
    },
}

/// Result of a range change request
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReseedOutcome {
    /// Buffers now hold `points` backfilled samples per signal
    Committed { range: TimeRange, points: usize },
    /// A later request replaced this one before it ran
    Superseded,
    /// View is paused; the reseed runs on resume
    Deferred,
}

/// Collaborators shared by every driver of a context
pub(crate) struct DriverDeps {
    pub store: Arc<TrendStore>,
    pub profiles: Arc<dyn PatientProfileSource>,
    pub time_provider: Arc<dyn TimeProvider>,
    pub engine: EngineConfig,
    pub feed: FeedConfig,
    pub generator: SampleGenerator,
}

/// In-flight subscription; owns the channel until it resolves
type Connecting = Pin<Box<dyn Future<Output = (Box<dyn VitalsChannel>, Result<(), FeedError>)> + Send>>;

pub(crate) struct SourceController {
    patient: PatientId,
    store: Arc<TrendStore>,
    profiles: Arc<dyn PatientProfileSource>,
    time_provider: Arc<dyn TimeProvider>,
    engine: EngineConfig,
    feed: FeedConfig,
    generator: SampleGenerator,
    walks: WalkStates,
    adapter: LiveFeedAdapter,
    channel: Option<Box<dyn VitalsChannel>>,
    connecting: Option<Connecting>,

    state: DataSourceState,
    status: SourceStatus,
    status_tx: watch::Sender<SourceStatus>,
    commands: mpsc::Receiver<ViewCommand>,
    shutdown: watch::Receiver<bool>,

    sim_ticker: Interval,
    staleness_ticker: Interval,
    last_message_at: Option<Instant>,
    reconnect_remaining: u32,
    next_reconnect_at: Instant,
    pending_range: Option<TimeRange>,
    severities: HashMap<SignalKind, AlarmSeverity>,
    // Released when the driver finishes, after its last write
    _lease: ViewLease,
}

async fn recv_from(channel: Option<&mut (dyn VitalsChannel + 'static)>) -> Result<Vec<u8>, FeedError> {
    match channel {
        Some(channel) => channel.recv().await,
        None => std::future::pending().await,
    }
}

async fn connect_result(connecting: Option<&mut Connecting>) -> (Box<dyn VitalsChannel>, Result<(), FeedError>) {
    match connecting {
        Some(connecting) => connecting.await,
        None => std::future::pending().await,
    }
}

fn connect_attempt(mut channel: Box<dyn VitalsChannel>, patient: PatientId, timeout_ms: u64) -> Connecting {
    Box::pin(async move {
        let timeout = Duration::from_millis(timeout_ms);
        let result = match tokio::time::timeout(timeout, channel.connect(&patient)).await {
            Ok(result) => result,
            Err(_) => Err(FeedError::Timeout(timeout_ms)),
        };
        (channel, result)
    })
}

fn ticker(period_ms: u64) -> Interval {
    let period = Duration::from_millis(period_ms.max(1));
    let mut interval = interval_at(Instant::now() + period, period);
    interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
    interval
}

impl SourceController {
    pub(crate) fn new(
        patient: PatientId,
        deps: DriverDeps,
        channel: Option<Box<dyn VitalsChannel>>,
        commands: mpsc::Receiver<ViewCommand>,
        shutdown: watch::Receiver<bool>,
        status_tx: watch::Sender<SourceStatus>,
        lease: ViewLease,
    ) -> Self {
        let live_enabled = deps.feed.enabled && channel.is_some();
        let status = SourceStatus::new(deps.engine.initial_range, live_enabled);

        Self {
            adapter: LiveFeedAdapter::new(patient.clone(), Arc::clone(&deps.time_provider)),
            patient,
            store: deps.store,
            profiles: deps.profiles,
            time_provider: deps.time_provider,
            sim_ticker: ticker(deps.engine.tick_interval_ms),
            staleness_ticker: ticker(deps.engine.staleness_check_interval_ms),
            reconnect_remaining: deps.feed.reconnect_attempts,
            engine: deps.engine,
            feed: deps.feed,
            generator: deps.generator,
            walks: WalkStates::new(),
            channel,
            connecting: None,
            state: DataSourceState::Simulation,
            status,
            status_tx,
            commands,
            shutdown,
            last_message_at: None,
            next_reconnect_at: Instant::now(),
            pending_range: None,
            severities: HashMap::new(),
            _lease: lease,
        }
    }

    pub(crate) async fn run(mut self) {
        info!(patient = %self.patient, state = %self.state, "view driver started");

        if self.status.live_enabled {
            self.start_connect();
        }
        self.drive().await;
        self.teardown().await;
    }

    async fn drive(&mut self) {
        loop {
            let connected = self.status.connected;
            let connecting = self.connecting.is_some();
            let ticking = self.state == DataSourceState::Simulation && !self.status.paused;
            let watching = self.state == DataSourceState::Live;
            let retrying =
                self.status.live_enabled && !connected && !connecting && self.reconnect_remaining > 0;
            let reconnect_at = self.next_reconnect_at;

            tokio::select! {
                biased;

                // Any change, or the view handle going away, ends the driver
                _ = self.shutdown.changed() => break,

                (channel, result) = connect_result(self.connecting.as_mut()), if connecting => {
                    self.connecting = None;
                    self.on_connect_result(channel, result).await;
                }

                command = self.commands.recv() => match command {
                    Some(command) => self.dispatch(command).await,
                    None => break,
                },

                received = recv_from(self.channel.as_deref_mut()), if connected => {
                    match received {
                        Ok(payload) => self.on_payload(&payload),
                        Err(e) => self.on_connection_lost(e).await,
                    }
                }

                _ = self.staleness_ticker.tick(), if watching => self.check_staleness(),

                _ = self.sim_ticker.tick(), if ticking => self.on_tick(),

                _ = sleep_until(reconnect_at), if retrying => {
                    self.reconnect_remaining -= 1;
                    self.start_connect();
                }
            }
        }
    }

    /// Move the channel into a subscription attempt polled by the select loop
    fn start_connect(&mut self) {
        if let Some(channel) = self.channel.take() {
            debug!(patient = %self.patient, endpoint = %channel.describe(), "connecting live channel");
            self.connecting = Some(connect_attempt(
                channel,
                self.patient.clone(),
                self.feed.connection_timeout_ms,
            ));
        }
    }

    async fn on_connect_result(&mut self, mut channel: Box<dyn VitalsChannel>, result: Result<(), FeedError>) {
        let endpoint = channel.describe();

        if !self.status.live_enabled {
            // Switched off while the attempt was in flight
            if result.is_ok() {
                if let Err(e) = channel.disconnect().await {
                    debug!(patient = %self.patient, error = %e, "disconnect of late subscription failed");
                }
            }
            self.channel = Some(channel);
            return;
        }
        self.channel = Some(channel);

        let error = match result {
            Ok(()) => {
                info!(patient = %self.patient, endpoint = %endpoint, "live channel connected");
                self.status.connected = true;
                self.reconnect_remaining = self.feed.reconnect_attempts;
                self.last_message_at = None;
                self.apply(SourceEvent::ConnectionEstablished);
                self.publish();
                return;
            }
            Err(e) => e,
        };

        self.next_reconnect_at = Instant::now() + Duration::from_millis(self.feed.reconnect_delay_ms);
        if self.reconnect_remaining > 0 {
            warn!(
                patient = %self.patient,
                endpoint = %endpoint,
                error = %error,
                retries_left = self.reconnect_remaining,
                "live channel unavailable, running on simulation"
            );
        } else {
            warn!(
                patient = %self.patient,
                endpoint = %endpoint,
                error = %error,
                "giving up on live channel, staying in simulation"
            );
        }
        self.publish();
    }

    async fn on_connection_lost(&mut self, error: FeedError) {
        warn!(patient = %self.patient, error = %error, "live channel lost");

        if let Some(channel) = self.channel.as_deref_mut() {
            if let Err(e) = channel.disconnect().await {
                debug!(patient = %self.patient, error = %e, "disconnect after loss failed");
            }
        }

        self.status.connected = false;
        self.reconnect_remaining = self.feed.reconnect_attempts;
        self.next_reconnect_at = Instant::now() + Duration::from_millis(self.feed.reconnect_delay_ms);
        self.apply(SourceEvent::ConnectionLost);
        self.publish();
    }

    fn on_payload(&mut self, payload: &[u8]) {
        let ingested = match self.adapter.ingest(payload) {
            Ok(ingested) => ingested,
            Err(e) => {
                self.status.messages_rejected += 1;
                warn!(patient = %self.patient, error = %e, "dropping vitals message");
                self.publish();
                return;
            }
        };

        self.last_message_at = Some(Instant::now());
        self.status.messages_accepted += 1;
        self.status.fields_dropped += ingested.dropped as u64;
        self.apply(SourceEvent::MessageReceived);

        if self.status.paused {
            debug!(patient = %self.patient, "paused, live message not written");
        } else if !ingested.samples.is_empty() {
            let profile = self.profile();
            for (kind, sample) in ingested.samples {
                self.write(kind, sample, &profile);
            }
            self.status.last_update_ms = Some(self.time_provider.now_millis());
        }

        self.publish();
    }

    fn check_staleness(&mut self) {
        let window = Duration::from_millis(self.engine.staleness_window_ms);
        let expired = match self.last_message_at {
            Some(at) => at.elapsed() >= window,
            None => true,
        };

        if expired {
            self.apply(SourceEvent::StalenessExpired);
            self.publish();
        }
    }

    fn on_tick(&mut self) {
        let profile = self.profile();
        let now = self.time_provider.now_millis();

        for kind in profile.simulated_signals() {
            let input = WalkInput::from_profile(&profile, kind);
            let walk = self.walks.entry(kind).or_default();
            let sample = self.generator.tick(kind, &input, walk, now);
            self.write(kind, sample, &profile);
        }

        self.status.simulated_ticks += 1;
        self.status.last_update_ms = Some(now);
        self.publish();
    }

    fn write(&mut self, kind: SignalKind, sample: Sample, profile: &PatientProfile) {
        if let Err(e) = self.store.append(&self.patient, kind, sample) {
            warn!(patient = %self.patient, signal = %kind, error = %e, "sample rejected by trend buffer");
            return;
        }

        let severity = evaluate(kind, sample.value, profile.limits.get(kind));
        let previous = self.severities.insert(kind, severity).unwrap_or(AlarmSeverity::Normal);
        if previous != severity {
            if severity == AlarmSeverity::Normal {
                info!(patient = %self.patient, signal = %kind, value = sample.value, "alarm cleared");
            } else {
                warn!(
                    patient = %self.patient,
                    signal = %kind,
                    value = sample.value,
                    from = %previous,
                    to = %severity,
                    "alarm severity changed"
                );
            }
        }
    }

    async fn dispatch(&mut self, command: ViewCommand) {
        let mut next = Some(command);
        while let Some(command) = next.take() {
            next = match command {
                ViewCommand::SetRange { range, ack } => self.coalesce_range(range, ack),
                ViewCommand::Pause(ack) => {
                    self.set_paused(true);
                    let _ = ack.send(());
                    None
                }
                ViewCommand::Resume(ack) => {
                    self.set_paused(false);
                    let _ = ack.send(());
                    None
                }
                ViewCommand::SetLiveEnabled { enabled, ack } => {
                    self.set_live_enabled(enabled).await;
                    let _ = ack.send(());
                    None
                }
            };
        }
    }

    /// Run only the newest of consecutive range requests.
    ///
    /// Returns the first queued command that is not a range change.
    fn coalesce_range(
        &mut self,
        range: TimeRange,
        ack: Option<oneshot::Sender<ReseedOutcome>>,
    ) -> Option<ViewCommand> {
        let mut latest = (range, ack);
        let mut following = None;

        while let Ok(queued) = self.commands.try_recv() {
            match queued {
                ViewCommand::SetRange { range, ack } => {
                    debug!(patient = %self.patient, abandoned = %latest.0, replacement = %range, "range change superseded");
                    if let Some(stale) = latest.1.take() {
                        let _ = stale.send(ReseedOutcome::Superseded);
                    }
                    latest = (range, ack);
                }
                other => {
                    following = Some(other);
                    break;
                }
            }
        }

        let outcome = self.reseed(latest.0);
        if let Some(ack) = latest.1 {
            let _ = ack.send(outcome);
        }
        following
    }

    /// Replace every buffer of the patient with a backfilled window
    pub(crate) fn reseed(&mut self, range: TimeRange) -> ReseedOutcome {
        self.status.time_range = range;

        if self.status.paused {
            info!(patient = %self.patient, range = %range, "paused, reseed deferred until resume");
            self.pending_range = Some(range);
            self.publish();
            return ReseedOutcome::Deferred;
        }
        self.pending_range = None;

        let points = range.max_points(self.engine.points_per_hour);
        let window = BackfillWindow {
            end: self.time_provider.now_millis(),
            span: range.span_millis(),
        };
        let profile = self.profile();
        let ticket = self.store.begin_reseed(&self.patient);

        let mut series = Vec::new();
        let mut walks = WalkStates::new();
        for kind in profile.simulated_signals() {
            let input = WalkInput::from_profile(&profile, kind);
            let mut walk = WalkState::default();
            match self.generator.backfill(kind, &input, &mut walk, points, window) {
                Ok(samples) => {
                    series.push((kind, samples));
                    walks.insert(kind, walk);
                }
                Err(e) => warn!(patient = %self.patient, signal = %kind, error = %e, "backfill failed"),
            }
        }

        let outcome = match self.store.commit_reseed(&ticket, points, series) {
            Ok(true) => {
                self.walks = walks;
                self.severities.clear();
                self.status.reseeds += 1;
                info!(patient = %self.patient, range = %range, points, "trend buffers reseeded");
                ReseedOutcome::Committed { range, points }
            }
            Ok(false) => ReseedOutcome::Superseded,
            Err(e) => {
                warn!(patient = %self.patient, range = %range, error = %e, "reseed commit failed");
                ReseedOutcome::Superseded
            }
        };

        self.publish();
        outcome
    }

    fn set_paused(&mut self, paused: bool) {
        if self.status.paused == paused {
            return;
        }
        self.status.paused = paused;

        if paused {
            info!(patient = %self.patient, state = %self.state, "view paused by operator");
        } else {
            info!(patient = %self.patient, state = %self.state, "view resumed by operator");
            self.sim_ticker.reset();
            if let Some(range) = self.pending_range.take() {
                self.reseed(range);
            }
        }
        self.publish();
    }

    async fn set_live_enabled(&mut self, enabled: bool) {
        let has_channel = self.channel.is_some() || self.connecting.is_some();
        if !has_channel || self.status.live_enabled == enabled {
            return;
        }
        self.status.live_enabled = enabled;

        if enabled {
            info!(patient = %self.patient, "live source enabled");
            self.reconnect_remaining = self.feed.reconnect_attempts;
            self.next_reconnect_at = Instant::now();
        } else {
            info!(patient = %self.patient, "live source disabled by operator");
            if let Some(channel) = self.channel.as_deref_mut() {
                if let Err(e) = channel.disconnect().await {
                    debug!(patient = %self.patient, error = %e, "disconnect failed");
                }
            }
            self.status.connected = false;
            self.apply(SourceEvent::Disabled);
        }
        self.publish();
    }

    fn apply(&mut self, event: SourceEvent) {
        let next = self.state.on(event);
        if next == self.state {
            return;
        }

        info!(
            patient = %self.patient,
            from = %self.state,
            to = %next,
            event = ?event,
            "data source transition"
        );
        if next == DataSourceState::Simulation {
            // First synthetic tick one interval after fallback
            self.sim_ticker.reset();
        }
        if next == DataSourceState::Live {
            self.staleness_ticker.reset();
        }
        self.state = next;
        self.status.state = next;
    }

    fn profile(&self) -> PatientProfile {
        self.profiles.profile(&self.patient).unwrap_or_default()
    }

    fn publish(&self) {
        self.status_tx.send_replace(self.status.clone());
    }

    async fn teardown(&mut self) {
        // An unfinished attempt is dropped together with its channel
        self.connecting = None;
        if let Some(channel) = self.channel.as_deref_mut() {
            if let Err(e) = channel.disconnect().await {
                debug!(patient = %self.patient, error = %e, "disconnect on teardown failed");
            }
        }
        self.status.connected = false;
        self.publish();
        info!(patient = %self.patient, "view driver stopped");
    }
}
