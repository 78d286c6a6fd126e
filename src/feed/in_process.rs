// src/feed/in_process.rs
//! In-process vitals channel backed by a tokio mpsc queue

use crate::feed::traits::VitalsChannel;
use crate::feed::types::FeedError;
use crate::types::PatientId;
use async_trait::async_trait;
use serde::Serialize;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::{mpsc, Notify};

#[derive(Debug, Default)]
struct Shared {
    refuse_connections: AtomicBool,
    connected: AtomicBool,
    connect_attempts: AtomicU64,
    sever_generation: AtomicU64,
    severed: Notify,
}

/// Subscriber half handed to a view
pub struct InProcessChannel {
    rx: mpsc::Receiver<Vec<u8>>,
    shared: Arc<Shared>,
    patient: Option<PatientId>,
    subscribed: bool,
    generation: u64,
}

/// Publisher half kept by the embedding application or test
#[derive(Clone)]
pub struct ChannelPublisher {
    tx: mpsc::Sender<Vec<u8>>,
    shared: Arc<Shared>,
}

/// Create a connected pair with room for `capacity` queued payloads
pub fn in_process_channel(capacity: usize) -> (InProcessChannel, ChannelPublisher) {
    let (tx, rx) = mpsc::channel(capacity.max(1));
    let shared = Arc::new(Shared::default());

    (
        InProcessChannel {
            rx,
            shared: Arc::clone(&shared),
            patient: None,
            subscribed: false,
            generation: 0,
        },
        ChannelPublisher { tx, shared },
    )
}

impl ChannelPublisher {
    /// Queue a raw payload
    pub async fn publish(&self, payload: impl Into<Vec<u8>>) -> Result<(), FeedError> {
        self.tx.send(payload.into()).await.map_err(|_| FeedError::Closed)
    }

    /// Serialize and queue a message
    pub async fn publish_json<T: Serialize>(&self, message: &T) -> Result<(), FeedError> {
        let payload = serde_json::to_vec(message).map_err(|e| FeedError::Malformed(e.to_string()))?;
        self.publish(payload).await
    }

    /// Make subsequent `connect` calls fail
    pub fn refuse_connections(&self, refuse: bool) {
        self.shared.refuse_connections.store(refuse, Ordering::Relaxed);
    }

    /// Drop the live subscription as a broker outage would
    pub fn sever(&self) {
        if self.shared.connected.swap(false, Ordering::AcqRel) {
            self.shared.sever_generation.fetch_add(1, Ordering::AcqRel);
            self.shared.severed.notify_one();
        }
    }

    pub fn is_subscribed(&self) -> bool {
        self.shared.connected.load(Ordering::Acquire)
    }

    pub fn connect_attempts(&self) -> u64 {
        self.shared.connect_attempts.load(Ordering::Relaxed)
    }
}

#[async_trait]
impl VitalsChannel for InProcessChannel {
    async fn connect(&mut self, patient: &PatientId) -> Result<(), FeedError> {
        self.shared.connect_attempts.fetch_add(1, Ordering::Relaxed);

        if self.shared.refuse_connections.load(Ordering::Relaxed) {
            return Err(FeedError::ConnectionFailed("connection refused".to_string()));
        }

        self.patient = Some(patient.clone());
        self.generation = self.shared.sever_generation.load(Ordering::Acquire);
        self.subscribed = true;
        self.shared.connected.store(true, Ordering::Release);
        Ok(())
    }

    async fn recv(&mut self) -> Result<Vec<u8>, FeedError> {
        if !self.subscribed {
            return Err(FeedError::NotConnected);
        }

        loop {
            if self.shared.sever_generation.load(Ordering::Acquire) != self.generation {
                self.subscribed = false;
                return Err(FeedError::ConnectionLost("severed by publisher".to_string()));
            }

            tokio::select! {
                biased;
                // Stale permits only cost one extra generation check
                _ = self.shared.severed.notified() => continue,
                payload = self.rx.recv() => {
                    return match payload {
                        Some(payload) => Ok(payload),
                        None => {
                            self.subscribed = false;
                            self.shared.connected.store(false, Ordering::Release);
                            Err(FeedError::Closed)
                        }
                    };
                }
            }
        }
    }

    async fn disconnect(&mut self) -> Result<(), FeedError> {
        self.subscribed = false;
        self.shared.connected.store(false, Ordering::Release);
        self.patient = None;
        Ok(())
    }

    fn is_connected(&self) -> bool {
        self.subscribed
    }

    fn describe(&self) -> String {
        match &self.patient {
            Some(patient) => format!("in-process://patient/{}", patient),
            None => "in-process://unsubscribed".to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_publish_and_receive() {
        let (mut channel, publisher) = in_process_channel(4);
        channel.connect(&PatientId::new("1")).await.unwrap();
        assert!(publisher.is_subscribed());

        publisher.publish(b"{}".to_vec()).await.unwrap();
        assert_eq!(channel.recv().await.unwrap(), b"{}".to_vec());
    }

    #[tokio::test]
    async fn test_refused_connection() {
        let (mut channel, publisher) = in_process_channel(4);
        publisher.refuse_connections(true);
        assert!(matches!(
            channel.connect(&PatientId::new("1")).await,
            Err(FeedError::ConnectionFailed(_))
        ));
        assert!(!channel.is_connected());
        assert_eq!(publisher.connect_attempts(), 1);
    }

    #[tokio::test]
    async fn test_sever_and_reconnect() {
        let (mut channel, publisher) = in_process_channel(4);
        let patient = PatientId::new("1");
        channel.connect(&patient).await.unwrap();

        publisher.sever();
        assert!(channel.recv().await.unwrap_err().is_disconnect());
        assert!(matches!(channel.recv().await, Err(FeedError::NotConnected)));

        channel.connect(&patient).await.unwrap();
        publisher.publish(b"x".to_vec()).await.unwrap();
        assert_eq!(channel.recv().await.unwrap(), b"x".to_vec());
    }

    #[tokio::test]
    async fn test_publisher_dropped_closes() {
        let (mut channel, publisher) = in_process_channel(4);
        channel.connect(&PatientId::new("1")).await.unwrap();
        drop(publisher);
        assert_eq!(channel.recv().await, Err(FeedError::Closed));
    }
}
