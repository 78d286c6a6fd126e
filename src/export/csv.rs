// src/export/csv.rs
//! CSV export of a patient's trend buffers
//!
//! One row per sample index (oldest first), a `time` column, then one value
//! column per signal in [`SignalKind::ALL`] order. Signals whose buffer is
//! shorter than the longest one leave their cell blank.

use crate::error::{VitalsErrorBuilder, VitalsResult};
use crate::trend::TrendStore;
use crate::types::{PatientId, Sample, SignalKind};
use std::fs::File;
use std::io::Write;
use std::path::Path;
use tracing::info;

/// Header row: `time` followed by the signal wire keys
pub fn header() -> Vec<&'static str> {
    std::iter::once("time")
        .chain(SignalKind::ALL.iter().map(|kind| kind.wire_key()))
        .collect()
}

/// Write prepared columns; returns the number of data rows
pub fn write_rows<W: Write>(columns: &[(SignalKind, Vec<Sample>)], writer: W) -> VitalsResult<usize> {
    let mut out = csv::Writer::from_writer(writer);
    let failed = |e: csv::Error| VitalsErrorBuilder::new("export", "write_rows").export(None, &e.to_string());

    out.write_record(header()).map_err(failed)?;

    let rows = columns.iter().map(|(_, samples)| samples.len()).max().unwrap_or(0);
    for index in 0..rows {
        let time = columns
            .iter()
            .find_map(|(_, samples)| samples.get(index))
            .map(|sample| sample.time.to_string())
            .unwrap_or_default();

        let mut record = Vec::with_capacity(SignalKind::ALL.len() + 1);
        record.push(time);
        for kind in SignalKind::ALL {
            let cell = columns
                .iter()
                .find(|(column, _)| *column == kind)
                .and_then(|(_, samples)| samples.get(index))
                .map(|sample| sample.value.to_string())
                .unwrap_or_default();
            record.push(cell);
        }
        out.write_record(&record).map_err(failed)?;
    }

    out.flush()
        .map_err(|e| VitalsErrorBuilder::new("export", "flush").export(None, &e.to_string()))?;
    Ok(rows)
}

/// Snapshot every signal of `patient` and write it as CSV
pub fn write_csv<W: Write>(store: &TrendStore, patient: &PatientId, writer: W) -> VitalsResult<usize> {
    let columns: Vec<(SignalKind, Vec<Sample>)> = SignalKind::ALL
        .into_iter()
        .map(|kind| (kind, store.snapshot(patient, kind)))
        .collect();
    write_rows(&columns, writer)
}

pub fn to_csv_string(store: &TrendStore, patient: &PatientId) -> VitalsResult<String> {
    let mut out = Vec::new();
    write_csv(store, patient, &mut out)?;
    String::from_utf8(out)
        .map_err(|e| VitalsErrorBuilder::new("export", "to_csv_string").export(None, &e.to_string()))
}

/// Export to a file, replacing it if present
pub fn export_csv(store: &TrendStore, patient: &PatientId, path: &Path) -> VitalsResult<usize> {
    let shown = path.display().to_string();
    let file = File::create(path)
        .map_err(|e| VitalsErrorBuilder::new("export", "create").export(Some(&shown), &e.to_string()))?;

    let rows = write_csv(store, patient, file)?;
    info!(patient = %patient, path = %shown, rows, "trend buffers exported");
    Ok(rows)
}
