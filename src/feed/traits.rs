// src/feed/traits.rs
//! Messaging channel abstraction for live vitals

use crate::feed::types::FeedError;
use crate::types::PatientId;
use async_trait::async_trait;

/// Subscription to a per-patient vitals channel
#[async_trait]
pub trait VitalsChannel: Send {
    /// Subscribe to the patient's vitals topic
    async fn connect(&mut self, patient: &PatientId) -> Result<(), FeedError>;

    /// Wait for the next raw payload.
    ///
    /// Must be cancel safe: the controller drops this future whenever another
    /// event wins the select.
    async fn recv(&mut self) -> Result<Vec<u8>, FeedError>;

    /// Unsubscribe; idempotent
    async fn disconnect(&mut self) -> Result<(), FeedError>;

    fn is_connected(&self) -> bool;

    /// Human readable endpoint for logs
    fn describe(&self) -> String;
}
