// src/trend/store.rs
//! Per-patient trend buffer ownership

use crate::trend::trend_buffer::{AppendOutcome, TrendBuffer, TrendBufferError, TrendStats};
use crate::types::{PatientId, Sample, SignalKind};
use parking_lot::{Mutex, RwLock};
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tracing::debug;

type BufferKey = (PatientId, SignalKind);

/// Owns every trend buffer, one lock per (patient, signal)
#[derive(Debug)]
pub struct TrendStore {
    buffers: RwLock<HashMap<BufferKey, Arc<Mutex<TrendBuffer>>>>,
    capacities: RwLock<HashMap<PatientId, usize>>,
    // Latest ticket per patient; epochs are store-wide so a removed entry
    // can never be matched by a ticket issued before the removal
    epochs: Mutex<HashMap<PatientId, u64>>,
    next_epoch: AtomicU64,
    default_capacity: usize,

    // Atomic counters for metrics
    samples_appended: AtomicU64,
    samples_evicted: AtomicU64,
    samples_rejected: AtomicU64,
    reseeds_committed: AtomicU64,
    reseeds_discarded: AtomicU64,
}

/// Store-wide counters
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StoreMetrics {
    pub buffers: usize,
    pub samples_appended: u64,
    pub samples_evicted: u64,
    pub samples_rejected: u64,
    pub reseeds_committed: u64,
    pub reseeds_discarded: u64,
}

/// Claim on the next reseed of a patient's buffers.
///
/// Only the most recently issued ticket can commit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReseedTicket {
    patient: PatientId,
    epoch: u64,
}

impl ReseedTicket {
    pub fn patient(&self) -> &PatientId {
        &self.patient
    }

    pub fn epoch(&self) -> u64 {
        self.epoch
    }
}

impl TrendStore {
    /// Create a store whose lazily created buffers hold `default_capacity` samples
    pub fn new(default_capacity: usize) -> Result<Self, TrendBufferError> {
        if default_capacity == 0 {
            return Err(TrendBufferError::InvalidCapacity);
        }

        Ok(Self {
            buffers: RwLock::new(HashMap::new()),
            capacities: RwLock::new(HashMap::new()),
            epochs: Mutex::new(HashMap::new()),
            next_epoch: AtomicU64::new(1),
            default_capacity,
            samples_appended: AtomicU64::new(0),
            samples_evicted: AtomicU64::new(0),
            samples_rejected: AtomicU64::new(0),
            reseeds_committed: AtomicU64::new(0),
            reseeds_discarded: AtomicU64::new(0),
        })
    }

    /// Append to the (patient, signal) buffer, creating it on first use
    pub fn append(
        &self,
        patient: &PatientId,
        kind: SignalKind,
        sample: Sample,
    ) -> Result<AppendOutcome, TrendBufferError> {
        let buffer = self.buffer_or_create(patient, kind)?;
        let result = buffer.lock().append(sample);

        match &result {
            Ok(outcome) => {
                self.samples_appended.fetch_add(1, Ordering::Relaxed);
                self.samples_evicted.fetch_add(outcome.evicted as u64, Ordering::Relaxed);
            }
            Err(_) => {
                self.samples_rejected.fetch_add(1, Ordering::Relaxed);
            }
        }

        result
    }

    /// Start a reseed, superseding any reseed already in flight for the patient
    pub fn begin_reseed(&self, patient: &PatientId) -> ReseedTicket {
        let epoch = self.next_epoch.fetch_add(1, Ordering::Relaxed);
        self.epochs.lock().insert(patient.clone(), epoch);

        ReseedTicket {
            patient: patient.clone(),
            epoch,
        }
    }

    /// Whether the ticket is still the latest for its patient
    pub fn is_current(&self, ticket: &ReseedTicket) -> bool {
        self.epochs.lock().get(&ticket.patient) == Some(&ticket.epoch)
    }

    /// Replace every buffer of the ticket's patient with prepared series.
    ///
    /// Returns `Ok(false)` when the ticket has been superseded; the series is
    /// dropped in that case. Signals absent from `series` are cleared.
    pub fn commit_reseed(
        &self,
        ticket: &ReseedTicket,
        max_points: usize,
        series: Vec<(SignalKind, Vec<Sample>)>,
    ) -> Result<bool, TrendBufferError> {
        if max_points == 0 {
            return Err(TrendBufferError::InvalidCapacity);
        }

        let epochs = self.epochs.lock();
        if epochs.get(&ticket.patient) != Some(&ticket.epoch) {
            drop(epochs);
            self.reseeds_discarded.fetch_add(1, Ordering::Relaxed);
            debug!(patient = %ticket.patient, epoch = ticket.epoch, "discarding superseded backfill");
            return Ok(false);
        }

        let mut prepared = Vec::with_capacity(series.len());
        for (kind, samples) in series {
            let mut buffer = TrendBuffer::new(max_points)?;
            buffer.replace(max_points, samples)?;
            prepared.push((kind, buffer));
        }

        let mut buffers = self.buffers.write();
        buffers.retain(|(patient, _), _| patient != &ticket.patient);
        for (kind, buffer) in prepared {
            buffers.insert((ticket.patient.clone(), kind), Arc::new(Mutex::new(buffer)));
        }
        self.capacities.write().insert(ticket.patient.clone(), max_points);
        drop(buffers);
        drop(epochs);

        self.reseeds_committed.fetch_add(1, Ordering::Relaxed);
        Ok(true)
    }

    /// Statistics for one buffer; zero-valued when the buffer does not exist
    pub fn stats(&self, patient: &PatientId, kind: SignalKind) -> TrendStats {
        self.buffer(patient, kind)
            .map(|buffer| buffer.lock().stats())
            .unwrap_or_default()
    }

    pub fn latest(&self, patient: &PatientId, kind: SignalKind) -> Option<Sample> {
        self.buffer(patient, kind).and_then(|buffer| buffer.lock().latest())
    }

    /// Copy of one buffer, oldest first
    pub fn snapshot(&self, patient: &PatientId, kind: SignalKind) -> Vec<Sample> {
        self.buffer(patient, kind)
            .map(|buffer| buffer.lock().to_vec())
            .unwrap_or_default()
    }

    pub fn len(&self, patient: &PatientId, kind: SignalKind) -> usize {
        self.buffer(patient, kind)
            .map(|buffer| buffer.lock().len())
            .unwrap_or(0)
    }

    /// Capacity new buffers for this patient are created with
    pub fn capacity(&self, patient: &PatientId) -> usize {
        self.capacities
            .read()
            .get(patient)
            .copied()
            .unwrap_or(self.default_capacity)
    }

    /// Signals that currently have a buffer for the patient
    pub fn signals(&self, patient: &PatientId) -> Vec<SignalKind> {
        let mut kinds: Vec<SignalKind> = self
            .buffers
            .read()
            .keys()
            .filter(|(p, _)| p == patient)
            .map(|(_, kind)| *kind)
            .collect();
        kinds.sort();
        kinds
    }

    /// Destroy every buffer belonging to the patient
    pub fn remove_patient(&self, patient: &PatientId) {
        self.buffers.write().retain(|(p, _), _| p != patient);
        self.capacities.write().remove(patient);
        // Outstanding tickets no longer match anything
        self.epochs.lock().remove(patient);
    }

    pub fn metrics(&self) -> StoreMetrics {
        StoreMetrics {
            buffers: self.buffers.read().len(),
            samples_appended: self.samples_appended.load(Ordering::Relaxed),
            samples_evicted: self.samples_evicted.load(Ordering::Relaxed),
            samples_rejected: self.samples_rejected.load(Ordering::Relaxed),
            reseeds_committed: self.reseeds_committed.load(Ordering::Relaxed),
            reseeds_discarded: self.reseeds_discarded.load(Ordering::Relaxed),
        }
    }

    fn buffer(&self, patient: &PatientId, kind: SignalKind) -> Option<Arc<Mutex<TrendBuffer>>> {
        self.buffers.read().get(&(patient.clone(), kind)).cloned()
    }

    fn buffer_or_create(
        &self,
        patient: &PatientId,
        kind: SignalKind,
    ) -> Result<Arc<Mutex<TrendBuffer>>, TrendBufferError> {
        if let Some(buffer) = self.buffer(patient, kind) {
            return Ok(buffer);
        }

        let capacity = self.capacity(patient);
        let mut buffers = self.buffers.write();
        let buffer = match buffers.get(&(patient.clone(), kind)) {
            Some(existing) => existing.clone(),
            None => {
                let created = Arc::new(Mutex::new(TrendBuffer::new(capacity)?));
                buffers.insert((patient.clone(), kind), created.clone());
                created
            }
        };
        Ok(buffer)
    }
}
