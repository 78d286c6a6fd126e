// src/config/constants.rs
//! System-wide configuration constants

/// Data source controller timing
pub mod engine {
    pub const DEFAULT_STALENESS_WINDOW_MS: u64 = 10_000;
    pub const MIN_STALENESS_WINDOW_MS: u64 = 1_000;
    pub const MAX_STALENESS_WINDOW_MS: u64 = 300_000;

    pub const DEFAULT_TICK_INTERVAL_MS: u64 = 2_000;
    pub const MIN_TICK_INTERVAL_MS: u64 = 100;
    pub const MAX_TICK_INTERVAL_MS: u64 = 60_000;

    pub const DEFAULT_STALENESS_CHECK_INTERVAL_MS: u64 = 1_000;

    pub const DEFAULT_COMMAND_QUEUE_SIZE: usize = 32;
}

/// Trend buffer sizing
pub mod trend {
    pub const DEFAULT_POINTS_PER_HOUR: usize = 30;
    pub const MIN_POINTS_PER_HOUR: usize = 1;
    pub const MAX_POINTS_PER_HOUR: usize = 3_600;
}

/// Random-walk generator tuning
pub mod generator {
    /// Mean reversion per steady-state tick
    pub const LIVE_REVERSION_FACTOR: f64 = 0.05;
    /// Mean reversion per backfill step; faster convergence while populating a window
    pub const BACKFILL_REVERSION_FACTOR: f64 = 0.1;
    pub const LIVE_JITTER_SCALE: f64 = 0.5;
    pub const BACKFILL_JITTER_SCALE: f64 = 1.0;
    pub const DEFAULT_EXCURSION_PROBABILITY: f64 = 0.025;
    pub const MAX_REVERSION_FACTOR: f64 = 1.0;
}

/// Live feed connection handling
pub mod feed {
    pub const DEFAULT_REDIS_URL: &str = "redis://127.0.0.1:6379/";
    pub const DEFAULT_UNIT: &str = "unit-a";
    pub const DEFAULT_CONNECTION_TIMEOUT_MS: u64 = 5_000;
    pub const DEFAULT_RECONNECT_ATTEMPTS: u32 = 5;
    pub const MAX_RECONNECT_ATTEMPTS: u32 = 100;
    pub const DEFAULT_RECONNECT_DELAY_MS: u64 = 3_000;
    pub const DEFAULT_CHANNEL_CAPACITY: usize = 256;
}

/// File system paths
pub mod paths {
    pub const SYSTEM_CONFIG_PATH: &str = "/etc/nicu-vitals/config.toml";
    pub const USER_CONFIG_DIR: &str = ".config/nicu-vitals";
    pub const LOCAL_CONFIG_FILE: &str = "config.toml";
    pub const DEFAULT_CONFIG_FILE: &str = "config/default.toml";
    pub const ENV_PREFIX: &str = "NICU_";
    /// Separates section from field in environment overrides
    pub const ENV_SEPARATOR: &str = "__";
}
