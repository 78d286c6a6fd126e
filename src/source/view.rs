// src/source/view.rs
//! Operator-facing handle on one open patient view

use crate::alarm::{evaluate_latest, worst, AlarmSeverity};
use crate::error::{VitalsError, VitalsErrorBuilder, VitalsResult};
use crate::export;
use crate::simulation::PatientProfileSource;
use crate::source::controller::{ReseedOutcome, ViewCommand};
use crate::source::state::{DataSourceState, SourceStatus};
use crate::trend::{TimeRange, TrendStats, TrendStore};
use crate::types::{PatientId, Sample, SignalKind};
use std::path::Path;
use std::sync::Arc;
use tokio::sync::{mpsc, oneshot, watch};
use tokio::task::JoinHandle;
use tracing::debug;

/// Handle returned by [`crate::VitalsContext::open_view`].
///
/// Reads go straight to the shared trend store; control requests are queued
/// to the view's driver task. Dropping the handle without [`close`] signals
/// the driver to stop; the patient stays registered until it has.
///
/// [`close`]: MonitorView::close
pub struct MonitorView {
    patient: PatientId,
    commands: mpsc::Sender<ViewCommand>,
    status: watch::Receiver<SourceStatus>,
    shutdown: watch::Sender<bool>,
    task: Option<JoinHandle<()>>,
    store: Arc<TrendStore>,
    profiles: Arc<dyn PatientProfileSource>,
}

impl MonitorView {
    pub(crate) fn new(
        patient: PatientId,
        commands: mpsc::Sender<ViewCommand>,
        status: watch::Receiver<SourceStatus>,
        shutdown: watch::Sender<bool>,
        task: JoinHandle<()>,
        store: Arc<TrendStore>,
        profiles: Arc<dyn PatientProfileSource>,
    ) -> Self {
        Self {
            patient,
            commands,
            status,
            shutdown,
            task: Some(task),
            store,
            profiles,
        }
    }

    pub fn patient(&self) -> &PatientId {
        &self.patient
    }

    /// Stop appending from either producer; state tracking continues
    pub async fn pause(&self) -> VitalsResult<()> {
        let (ack, done) = oneshot::channel();
        self.send(ViewCommand::Pause(ack)).await?;
        self.ack(done).await
    }

    pub async fn resume(&self) -> VitalsResult<()> {
        let (ack, done) = oneshot::channel();
        self.send(ViewCommand::Resume(ack)).await?;
        self.ack(done).await
    }

    /// Change the trend window and wait for the reseed to settle
    pub async fn set_range(&self, range: TimeRange) -> VitalsResult<ReseedOutcome> {
        let (ack, done) = oneshot::channel();
        self.send(ViewCommand::SetRange {
            range,
            ack: Some(ack),
        })
        .await?;
        self.ack(done).await
    }

    /// Queue a range change without waiting for it
    pub fn request_range(&self, range: TimeRange) -> VitalsResult<()> {
        self.commands
            .try_send(ViewCommand::SetRange { range, ack: None })
            .map_err(|e| match e {
                mpsc::error::TrySendError::Full(_) => VitalsError::System {
                    subsystem: "view".to_string(),
                    reason: format!("command queue full for patient {}", self.patient),
                    context: crate::error_context!("view", "request_range"),
                },
                mpsc::error::TrySendError::Closed(_) => self.closed("request_range"),
            })
    }

    /// Switch the live source on or off for this view
    pub async fn set_live_enabled(&self, enabled: bool) -> VitalsResult<()> {
        let (ack, done) = oneshot::channel();
        self.send(ViewCommand::SetLiveEnabled { enabled, ack }).await?;
        self.ack(done).await
    }

    pub fn status(&self) -> SourceStatus {
        self.status.borrow().clone()
    }

    pub fn state(&self) -> DataSourceState {
        self.status.borrow().state
    }

    /// Watch receiver for status changes
    pub fn subscribe(&self) -> watch::Receiver<SourceStatus> {
        self.status.clone()
    }

    /// Resolve once the view reaches `state`
    pub async fn wait_for_state(&self, state: DataSourceState) -> VitalsResult<SourceStatus> {
        let mut status = self.status.clone();
        let reached = status
            .wait_for(|current| current.state == state)
            .await
            .map_err(|_| self.closed("wait_for_state"))?;
        Ok(reached.clone())
    }

    pub fn stats(&self, kind: SignalKind) -> TrendStats {
        self.store.stats(&self.patient, kind)
    }

    pub fn latest(&self, kind: SignalKind) -> Option<Sample> {
        self.store.latest(&self.patient, kind)
    }

    pub fn snapshot(&self, kind: SignalKind) -> Vec<Sample> {
        self.store.snapshot(&self.patient, kind)
    }

    pub fn len(&self, kind: SignalKind) -> usize {
        self.store.len(&self.patient, kind)
    }

    pub fn is_empty(&self, kind: SignalKind) -> bool {
        self.len(kind) == 0
    }

    /// Alarm severity of the newest sample against the current limits
    pub fn severity(&self, kind: SignalKind) -> AlarmSeverity {
        let profile = self.profiles.profile(&self.patient).unwrap_or_default();
        evaluate_latest(kind, self.latest(kind), &profile.limits)
    }

    pub fn severities(&self) -> Vec<(SignalKind, AlarmSeverity)> {
        let profile = self.profiles.profile(&self.patient).unwrap_or_default();
        SignalKind::ALL
            .into_iter()
            .map(|kind| (kind, evaluate_latest(kind, self.latest(kind), &profile.limits)))
            .collect()
    }

    /// Worst severity across every signal
    pub fn overall_severity(&self) -> AlarmSeverity {
        worst(self.severities().into_iter().map(|(_, severity)| severity))
    }

    pub fn to_csv_string(&self) -> VitalsResult<String> {
        export::to_csv_string(&self.store, &self.patient)
    }

    /// Write the current buffers as CSV
    pub fn export_csv(&self, path: impl AsRef<Path>) -> VitalsResult<usize> {
        export::export_csv(&self.store, &self.patient, path.as_ref())
    }

    /// Stop the driver and destroy the patient's buffers.
    ///
    /// Returns once the driver has finished; nothing is written afterwards.
    pub async fn close(mut self) -> VitalsResult<()> {
        let _ = self.shutdown.send(true);

        let joined = match self.task.take() {
            Some(task) => task.await,
            None => Ok(()),
        };

        joined.map_err(|e| VitalsError::System {
            subsystem: "view".to_string(),
            reason: format!("driver for patient {} failed: {}", self.patient, e),
            context: crate::error_context!("view", "close"),
        })
    }

    async fn send(&self, command: ViewCommand) -> VitalsResult<()> {
        self.commands
            .send(command)
            .await
            .map_err(|_| self.closed("send_command"))
    }

    async fn ack<T>(&self, done: oneshot::Receiver<T>) -> VitalsResult<T> {
        done.await.map_err(|_| self.closed("await_ack"))
    }

    fn closed(&self, operation: &str) -> VitalsError {
        VitalsErrorBuilder::new("view", operation).view_closed(&self.patient)
    }
}

impl Drop for MonitorView {
    fn drop(&mut self) {
        // The driver releases the patient itself once it has stopped
        if self.task.take().is_some() {
            debug!(patient = %self.patient, "view dropped without close, stopping driver");
            let _ = self.shutdown.send(true);
        }
    }
}

impl std::fmt::Debug for MonitorView {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MonitorView")
            .field("patient", &self.patient)
            .field("status", &*self.status.borrow())
            .finish()
    }
}
