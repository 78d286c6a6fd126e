// src/source/context.rs
//! Shared engine context owning the trend store and view registry

use crate::config::SystemConfig;
use crate::error::{VitalsError, VitalsErrorBuilder, VitalsResult};
use crate::feed::VitalsChannel;
use crate::simulation::{PatientProfileSource, SampleGenerator};
use crate::source::controller::{DriverDeps, SourceController};
use crate::source::state::SourceStatus;
use crate::source::view::MonitorView;
use crate::trend::TrendStore;
use crate::types::PatientId;
use crate::utils::time::{SystemTimeProvider, TimeProvider};
use parking_lot::Mutex;
use std::collections::HashSet;
use std::sync::Arc;
use tokio::sync::{mpsc, watch};
use tracing::info;

/// A patient's claim on the producer slot.
///
/// Owned by the view's driver. Dropping it destroys the patient's buffers and
/// frees the slot, so this only happens once the driver can no longer write.
pub(crate) struct ViewLease {
    patient: PatientId,
    store: Arc<TrendStore>,
    active: Arc<Mutex<HashSet<PatientId>>>,
}

impl Drop for ViewLease {
    fn drop(&mut self) {
        self.store.remove_patient(&self.patient);
        self.active.lock().remove(&self.patient);
        info!(patient = %self.patient, "view closed, buffers released");
    }
}

/// Entry point for embedding applications.
///
/// One context serves any number of patients; each open view gets its own
/// driver task while sharing the trend store and profile source.
pub struct VitalsContext {
    config: SystemConfig,
    store: Arc<TrendStore>,
    profiles: Arc<dyn PatientProfileSource>,
    time_provider: Arc<dyn TimeProvider>,
    active: Arc<Mutex<HashSet<PatientId>>>,
}

impl VitalsContext {
    pub fn new(config: SystemConfig, profiles: Arc<dyn PatientProfileSource>) -> VitalsResult<Self> {
        if let Err(errors) = config.validate_consistency() {
            return Err(VitalsErrorBuilder::new("context", "new").configuration(&errors.join("; ")));
        }

        let store = TrendStore::new(config.engine.initial_capacity())?;
        info!(summary = ?config.get_summary(), "vitals context created");

        Ok(Self {
            config,
            store: Arc::new(store),
            profiles,
            time_provider: Arc::new(SystemTimeProvider),
            active: Arc::new(Mutex::new(HashSet::new())),
        })
    }

    /// Replace the wall clock used to stamp samples
    pub fn with_time_provider(mut self, time_provider: Arc<dyn TimeProvider>) -> Self {
        self.time_provider = time_provider;
        self
    }

    pub fn config(&self) -> &SystemConfig {
        &self.config
    }

    pub fn store(&self) -> Arc<TrendStore> {
        Arc::clone(&self.store)
    }

    pub fn active_patients(&self) -> Vec<PatientId> {
        let mut patients: Vec<PatientId> = self.active.lock().iter().cloned().collect();
        patients.sort();
        patients
    }

    pub fn is_open(&self, patient: &PatientId) -> bool {
        self.active.lock().contains(patient)
    }

    /// Open a view on `patient`.
    ///
    /// Buffers are backfilled for the configured initial range before this
    /// returns. With `channel` set, the driver subscribes to it and falls
    /// back to simulation whenever it is unavailable. Must be called from
    /// within a tokio runtime.
    pub fn open_view(
        &self,
        patient: PatientId,
        channel: Option<Box<dyn VitalsChannel>>,
    ) -> VitalsResult<MonitorView> {
        let runtime = tokio::runtime::Handle::try_current().map_err(|e| VitalsError::System {
            subsystem: "runtime".to_string(),
            reason: e.to_string(),
            context: crate::error_context!("context", "open_view"),
        })?;

        if !self.active.lock().insert(patient.clone()) {
            return Err(VitalsErrorBuilder::new("context", "open_view").view_conflict(&patient));
        }

        let engine = &self.config.engine;
        let (command_tx, command_rx) = mpsc::channel(engine.command_queue_size);
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let (status_tx, status_rx) = watch::channel(SourceStatus::new(engine.initial_range, false));

        let deps = DriverDeps {
            store: Arc::clone(&self.store),
            profiles: Arc::clone(&self.profiles),
            time_provider: Arc::clone(&self.time_provider),
            engine: engine.clone(),
            feed: self.config.feed.clone(),
            generator: SampleGenerator::new(self.config.generator.clone()),
        };

        let lease = ViewLease {
            patient: patient.clone(),
            store: Arc::clone(&self.store),
            active: Arc::clone(&self.active),
        };
        let mut controller = SourceController::new(
            patient.clone(),
            deps,
            channel,
            command_rx,
            shutdown_rx,
            status_tx,
            lease,
        );
        controller.reseed(engine.initial_range);
        let task = runtime.spawn(controller.run());

        info!(patient = %patient, range = %engine.initial_range, "view opened");

        Ok(MonitorView::new(
            patient,
            command_tx,
            status_rx,
            shutdown_tx,
            task,
            Arc::clone(&self.store),
            Arc::clone(&self.profiles),
        ))
    }

    /// Open a view subscribed to the configured Redis feed
    #[cfg(feature = "redis")]
    pub fn open_redis_view(&self, patient: PatientId) -> VitalsResult<MonitorView> {
        let channel = crate::feed::RedisChannel::new(self.config.feed.clone());
        self.open_view(patient, Some(Box::new(channel)))
    }
}

impl std::fmt::Debug for VitalsContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("VitalsContext")
            .field("config", &self.config)
            .field("active", &self.active_patients())
            .finish()
    }
}
