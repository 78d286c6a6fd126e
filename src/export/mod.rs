// src/export/mod.rs
//! Report export of trend buffers

pub mod csv;

pub use self::csv::{export_csv, header, to_csv_string, write_csv, write_rows};
