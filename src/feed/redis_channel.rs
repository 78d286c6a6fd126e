// src/feed/redis_channel.rs
//! Redis pub/sub vitals channel

use crate::feed::config::FeedConfig;
use crate::feed::traits::VitalsChannel;
use crate::feed::types::FeedError;
use crate::types::PatientId;
use async_trait::async_trait;
use futures::stream::{BoxStream, StreamExt};
use std::time::Duration;
use tracing::{debug, info};

/// Pattern subscription to `nicu/<unit>/patient/<id>/vitals/*`
pub struct RedisChannel {
    config: FeedConfig,
    topic: Option<String>,
    messages: Option<BoxStream<'static, redis::Msg>>,
}

impl RedisChannel {
    pub fn new(config: FeedConfig) -> Self {
        Self {
            config,
            topic: None,
            messages: None,
        }
    }

    /// Open a connection and pattern-subscribe; borrows nothing from the channel
    async fn subscribe(url: String, topic: String) -> Result<BoxStream<'static, redis::Msg>, FeedError> {
        let client =
            redis::Client::open(url.as_str()).map_err(|e| FeedError::ConnectionFailed(e.to_string()))?;

        let connection = client
            .get_async_connection()
            .await
            .map_err(|e| FeedError::ConnectionFailed(e.to_string()))?;

        let mut pubsub = connection.into_pubsub();
        pubsub
            .psubscribe(topic.as_str())
            .await
            .map_err(|e| FeedError::ConnectionFailed(e.to_string()))?;

        Ok(pubsub.into_on_message().boxed())
    }
}

#[async_trait]
impl VitalsChannel for RedisChannel {
    async fn connect(&mut self, patient: &PatientId) -> Result<(), FeedError> {
        let topic = self.config.topic_pattern(patient);
        let timeout_ms = self.config.connection_timeout_ms;
        let subscription = Self::subscribe(self.config.redis_url.clone(), topic.clone());

        let messages = tokio::time::timeout(Duration::from_millis(timeout_ms), subscription)
            .await
            .map_err(|_| FeedError::Timeout(timeout_ms))??;

        info!(topic = %topic, url = %self.config.redis_url, "subscribed to vitals topic");
        self.messages = Some(messages);
        self.topic = Some(topic);
        Ok(())
    }

    async fn recv(&mut self) -> Result<Vec<u8>, FeedError> {
        let messages = self.messages.as_mut().ok_or(FeedError::NotConnected)?;

        match messages.next().await {
            Some(message) => {
                debug!(channel = message.get_channel_name(), "vitals message received");
                Ok(message.get_payload_bytes().to_vec())
            }
            None => {
                self.messages = None;
                Err(FeedError::ConnectionLost("redis pub/sub stream ended".to_string()))
            }
        }
    }

    async fn disconnect(&mut self) -> Result<(), FeedError> {
        // Dropping the stream closes the subscriber connection
        self.messages = None;
        self.topic = None;
        Ok(())
    }

    fn is_connected(&self) -> bool {
        self.messages.is_some()
    }

    fn describe(&self) -> String {
        match &self.topic {
            Some(topic) => format!("{} {}", self.config.redis_url, topic),
            None => self.config.redis_url.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_recv_before_connect() {
        let mut channel = RedisChannel::new(FeedConfig::default());
        assert!(!channel.is_connected());
        assert_eq!(channel.recv().await, Err(FeedError::NotConnected));
    }

    #[test]
    fn test_connect_future_is_send() {
        fn assert_send<T: Send>(_: &T) {}

        let mut channel = RedisChannel::new(FeedConfig::default());
        let patient = PatientId::new("1");
        let connect = channel.connect(&patient);
        assert_send(&connect);
    }

    #[tokio::test]
    async fn test_invalid_url_fails_to_connect() {
        let config = FeedConfig {
            redis_url: "redis://[::1".to_string(),
            ..Default::default()
        };
        let mut channel = RedisChannel::new(config);
        assert!(channel.connect(&PatientId::new("1")).await.is_err());
    }
}
