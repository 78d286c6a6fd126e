// src/source/mod.rs
//! Data source control: which producer feeds each patient's trend buffers

pub mod context;
pub(crate) mod controller;
pub mod state;
pub mod view;

pub use context::VitalsContext;
pub use controller::ReseedOutcome;
pub use state::{DataSourceState, SourceEvent, SourceStatus};
pub use view::MonitorView;
