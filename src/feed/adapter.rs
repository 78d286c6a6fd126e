// src/feed/adapter.rs
//! Live feed adapter: validates inbound payloads and stamps them as samples

use crate::feed::types::{DroppedField, FeedError, FieldRejection, VitalReadings, VitalsMessage};
use crate::types::{PatientId, Sample, SignalKind};
use crate::utils::time::TimeProvider;
use serde_json::{Map, Value};
use std::sync::Arc;
use tracing::{debug, warn};

/// Per-view adapter bound to one patient
pub struct LiveFeedAdapter {
    patient: PatientId,
    time_provider: Arc<dyn TimeProvider>,
}

/// Samples accepted from one message
#[derive(Debug, Clone, PartialEq)]
pub struct Ingested {
    pub samples: Vec<(SignalKind, Sample)>,
    pub dropped: usize,
}

impl LiveFeedAdapter {
    pub fn new(patient: PatientId, time_provider: Arc<dyn TimeProvider>) -> Self {
        Self { patient, time_provider }
    }

    pub fn patient(&self) -> &PatientId {
        &self.patient
    }

    /// Parse and check the payload belongs to this adapter's patient.
    ///
    /// A message without a patient id is accepted; the subscription topic
    /// is already per patient.
    pub fn parse(&self, payload: &[u8]) -> Result<VitalsMessage, FeedError> {
        let message = parse_message(payload, &self.patient)?;
        if message.patient_id != self.patient {
            return Err(FeedError::PatientMismatch {
                expected: self.patient.to_string(),
                received: message.patient_id.to_string(),
            });
        }
        Ok(message)
    }

    /// Turn accepted readings into live samples stamped with arrival time
    pub fn stamp(&self, message: &VitalsMessage) -> Vec<(SignalKind, Sample)> {
        let now = self.time_provider.now_millis();
        message
            .readings
            .present()
            .map(|(kind, value)| (kind, Sample::live(now, value)))
            .collect()
    }

    /// Parse, validate and stamp one payload
    pub fn ingest(&self, payload: &[u8]) -> Result<Ingested, FeedError> {
        let message = self.parse(payload)?;

        for dropped in &message.dropped {
            debug!(
                patient = %self.patient,
                signal = %dropped.kind,
                reason = ?dropped.reason,
                "dropping vitals field"
            );
        }

        Ok(Ingested {
            samples: self.stamp(&message),
            dropped: message.dropped.len(),
        })
    }
}

/// Validate a raw payload into a typed message.
///
/// Whole-message failures are errors; individual bad fields are recorded in
/// `dropped` and left as `None`.
pub fn parse_message(payload: &[u8], default_patient: &PatientId) -> Result<VitalsMessage, FeedError> {
    let value: Value =
        serde_json::from_slice(payload).map_err(|e| FeedError::Malformed(format!("invalid JSON: {}", e)))?;

    let object = value
        .as_object()
        .ok_or_else(|| FeedError::Malformed("payload is not a JSON object".to_string()))?;

    let patient_id = match field(object, "patient_id", "patientId") {
        None | Some(Value::Null) => default_patient.clone(),
        Some(Value::String(id)) => PatientId::new(id.as_str()),
        Some(Value::Number(id)) => PatientId::new(id.to_string()),
        Some(other) => {
            return Err(FeedError::Malformed(format!(
                "patient id has unsupported type {}",
                json_type(other)
            )))
        }
    };

    let vitals = object
        .get("vitals")
        .and_then(Value::as_object)
        .ok_or_else(|| FeedError::Malformed("missing vitals object".to_string()))?;

    let mut readings = VitalReadings::default();
    let mut dropped = Vec::new();

    for kind in SignalKind::ALL {
        let Some(raw) = vitals.get(kind.wire_key()) else {
            continue;
        };

        match validate_field(kind, raw) {
            Ok(value) => readings.set(kind, Some(value)),
            Err(reason) => dropped.push(DroppedField { kind, reason }),
        }
    }

    Ok(VitalsMessage {
        patient_id,
        camera_id: field(object, "camera_id", "cameraId")
            .and_then(Value::as_str)
            .map(str::to_string),
        readings,
        confidence: object.get("confidence").and_then(Value::as_f64),
        timestamp: object.get("timestamp").and_then(Value::as_str).map(str::to_string),
        monitor_type: object.get("monitor_type").and_then(Value::as_str).map(str::to_string),
        dropped,
    })
}

fn field<'a>(object: &'a Map<String, Value>, snake: &str, camel: &str) -> Option<&'a Value> {
    object.get(snake).or_else(|| object.get(camel))
}

fn validate_field(kind: SignalKind, raw: &Value) -> Result<f64, FieldRejection> {
    match raw {
        Value::Null => Err(FieldRejection::Null),
        Value::Number(number) => {
            let value = number
                .as_f64()
                .ok_or_else(|| FieldRejection::NotNumeric(number.to_string()))?;
            if kind.is_physiological(value) {
                Ok(value)
            } else {
                warn!(signal = %kind, value, "vitals field outside physiological range");
                Err(FieldRejection::OutOfRange(value))
            }
        }
        other => Err(FieldRejection::NotNumeric(json_type(other).to_string())),
    }
}

fn json_type(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}
