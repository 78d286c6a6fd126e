// src/feed/mod.rs
//! Live vitals feed: channel abstraction, message validation and transports

pub mod adapter;
pub mod config;
pub mod in_process;
#[cfg(feature = "redis")]
pub mod redis_channel;
pub mod traits;
pub mod types;

pub use adapter::{parse_message, Ingested, LiveFeedAdapter};
pub use config::FeedConfig;
pub use in_process::{in_process_channel, ChannelPublisher, InProcessChannel};
#[cfg(feature = "redis")]
pub use redis_channel::RedisChannel;
pub use traits::VitalsChannel;
pub use types::{DroppedField, FeedError, FieldRejection, VitalReadings, VitalsMessage};
