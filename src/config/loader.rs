// src/config/loader.rs
//! Layered configuration loader with validation and hot reload

use crate::config::{constants::paths, schema_validator::SchemaValidator, schema_validator::SchemaViolation, SystemConfig};
use parking_lot::RwLock;
use std::path::{Path, PathBuf};
use std::sync::{mpsc, Arc};
use std::thread;
use std::time::{Duration, SystemTime};
use tracing::{info, warn};

/// Configuration loader with hot reload capabilities
pub struct ConfigLoader {
    config_paths: Vec<PathBuf>,
    schema_validator: SchemaValidator,
    current_config: Arc<RwLock<SystemConfig>>,
    env_prefix: String,
    change_notifier: Option<mpsc::Sender<SystemConfig>>,
    _file_watcher: Option<notify::RecommendedWatcher>,
}

/// Configuration loading errors
#[derive(Debug)]
pub enum ConfigError {
    FileNotFound(String),
    ParseError(String),
    ValidationError(Vec<SchemaViolation>),
    Inconsistent(Vec<String>),
    IoError(String),
    WatcherError(String),
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigError::FileNotFound(path) => write!(f, "Configuration file not found: {}", path),
            ConfigError::ParseError(msg) => write!(f, "Configuration parse error: {}", msg),
            ConfigError::ValidationError(errors) => {
                write!(f, "Configuration validation errors: ")?;
                for error in errors {
                    write!(f, "\n  {}", error)?;
                }
                Ok(())
            }
            ConfigError::Inconsistent(errors) => write!(f, "Inconsistent configuration: {}", errors.join("; ")),
            ConfigError::IoError(msg) => write!(f, "IO error: {}", msg),
            ConfigError::WatcherError(msg) => write!(f, "File watcher error: {}", msg),
        }
    }
}

impl std::error::Error for ConfigError {}

impl From<std::io::Error> for ConfigError {
    fn from(err: std::io::Error) -> Self {
        ConfigError::IoError(err.to_string())
    }
}

impl From<toml::de::Error> for ConfigError {
    fn from(err: toml::de::Error) -> Self {
        ConfigError::ParseError(err.to_string())
    }
}

impl ConfigLoader {
    /// Loader over the standard search paths
    pub fn new() -> Self {
        Self::with_paths(Self::discover_config_paths())
    }

    /// Create loader with custom paths, lowest precedence first
    pub fn with_paths(paths: Vec<PathBuf>) -> Self {
        Self {
            config_paths: paths,
            schema_validator: SchemaValidator::new(),
            current_config: Arc::new(RwLock::new(SystemConfig::default())),
            env_prefix: paths::ENV_PREFIX.to_string(),
            change_notifier: None,
            _file_watcher: None,
        }
    }

    /// Use a different environment variable prefix
    pub fn with_env_prefix(mut self, prefix: &str) -> Self {
        self.env_prefix = prefix.to_string();
        self
    }

    pub fn config_paths(&self) -> &[PathBuf] {
        &self.config_paths
    }

    /// Load system configuration with validation
    pub fn load_system_config(&mut self) -> Result<SystemConfig, ConfigError> {
        let config = self.load_and_merge_configs()?;
        *self.current_config.write() = config.clone();
        info!(summary = ?config.get_summary(), "configuration loaded");
        Ok(config)
    }

    /// Get current configuration
    pub fn get_current_config(&self) -> SystemConfig {
        self.current_config.read().clone()
    }

    /// Watch the config files and invoke `callback` with each valid reload
    pub fn enable_hot_reload(
        &mut self,
        callback: impl Fn(SystemConfig) + Send + 'static,
    ) -> Result<(), ConfigError> {
        let (tx, rx) = mpsc::channel();
        self.change_notifier = Some(tx.clone());

        let config_ref = Arc::clone(&self.current_config);
        thread::spawn(move || {
            while let Ok(new_config) = rx.recv() {
                *config_ref.write() = new_config.clone();
                callback(new_config);
            }
        });

        self.setup_file_watcher(tx)?;
        Ok(())
    }

    /// Reload configuration manually
    pub fn reload(&mut self) -> Result<SystemConfig, ConfigError> {
        let config = self.load_and_merge_configs()?;
        *self.current_config.write() = config.clone();

        if let Some(ref notifier) = self.change_notifier {
            let _ = notifier.send(config.clone());
        }

        Ok(config)
    }

    /// Validate configuration without loading
    pub fn validate_config_file<P: AsRef<Path>>(&self, path: P) -> Result<(), ConfigError> {
        let content = std::fs::read_to_string(path)?;
        let toml_value: toml::Value = toml::from_str(&content)?;

        self.schema_validator
            .validate_config(&toml_value)
            .map_err(ConfigError::ValidationError)?;

        self.schema_validator
            .validate_dependencies(&toml_value)
            .map_err(ConfigError::ValidationError)?;

        Ok(())
    }

    /// Export current configuration to file
    pub fn export_config<P: AsRef<Path>>(&self, path: P) -> Result<(), ConfigError> {
        let config = self.get_current_config();
        let toml_content =
            toml::to_string_pretty(&config).map_err(|e| ConfigError::ParseError(e.to_string()))?;

        std::fs::write(path, toml_content)?;
        Ok(())
    }

    /// Get configuration file modification times
    pub fn get_config_timestamps(&self) -> Vec<(PathBuf, Option<SystemTime>)> {
        self.config_paths
            .iter()
            .map(|path| {
                let timestamp = std::fs::metadata(path).and_then(|meta| meta.modified()).ok();
                (path.clone(), timestamp)
            })
            .collect()
    }

    fn load_and_merge_configs(&self) -> Result<SystemConfig, ConfigError> {
        let mut merged_config = toml::Value::Table(toml::value::Table::new());

        let default_config = toml::Value::try_from(SystemConfig::default())
            .map_err(|e| ConfigError::ParseError(e.to_string()))?;
        merge_toml_values(&mut merged_config, default_config);

        for config_path in &self.config_paths {
            match load_config_file(config_path) {
                Ok(file_config) => merge_toml_values(&mut merged_config, file_config),
                // Every layer is optional
                Err(ConfigError::FileNotFound(_)) => continue,
                Err(e) => return Err(e),
            }
        }

        self.apply_environment_overrides(&mut merged_config);

        self.schema_validator
            .validate_config(&merged_config)
            .map_err(ConfigError::ValidationError)?;

        self.schema_validator
            .validate_dependencies(&merged_config)
            .map_err(ConfigError::ValidationError)?;

        let config: SystemConfig = merged_config
            .try_into()
            .map_err(|e| ConfigError::ParseError(format!("Failed to deserialize config: {}", e)))?;

        config.validate_consistency().map_err(ConfigError::Inconsistent)?;
        Ok(config)
    }

    /// `NICU_ENGINE__TICK_INTERVAL_MS=500` sets `engine.tick_interval_ms`
    fn apply_environment_overrides(&self, config: &mut toml::Value) {
        for (key, value) in std::env::vars() {
            let Some(stripped) = key.strip_prefix(&self.env_prefix) else {
                continue;
            };

            let config_key = stripped.to_lowercase().replace(paths::ENV_SEPARATOR, ".");
            if !config_key.contains('.') {
                continue;
            }

            set_nested_value(config, &config_key, parse_env_value(&value));
        }
    }

    fn setup_file_watcher(&mut self, tx: mpsc::Sender<SystemConfig>) -> Result<(), ConfigError> {
        use notify::{DebouncedEvent, RecursiveMode, Watcher};
        use std::collections::HashSet;

        let (watch_tx, watch_rx) = mpsc::channel();
        let mut watcher = notify::watcher(watch_tx, Duration::from_millis(500))
            .map_err(|e| ConfigError::WatcherError(e.to_string()))?;

        let mut watched_paths = HashSet::new();
        for path in &self.config_paths {
            if let Some(parent) = path.parent() {
                let parent = if parent.as_os_str().is_empty() { Path::new(".") } else { parent };
                if parent.exists() && watched_paths.insert(parent.to_path_buf()) {
                    if let Err(e) = watcher.watch(parent, RecursiveMode::NonRecursive) {
                        warn!(path = %parent.display(), error = %e, "cannot watch config directory");
                    }
                }
            }
        }

        let config_paths = self.config_paths.clone();
        let env_prefix = self.env_prefix.clone();

        thread::spawn(move || {
            while let Ok(event) = watch_rx.recv() {
                let changed = match event {
                    DebouncedEvent::Write(path) | DebouncedEvent::Create(path) => path,
                    _ => continue,
                };

                if !config_paths.iter().any(|p| same_file(p, &changed)) {
                    continue;
                }

                let loader = ConfigLoader::with_paths(config_paths.clone()).with_env_prefix(&env_prefix);
                match loader.load_and_merge_configs() {
                    Ok(new_config) => {
                        info!(path = %changed.display(), "configuration reloaded");
                        if tx.send(new_config).is_err() {
                            break;
                        }
                    }
                    Err(e) => warn!(path = %changed.display(), error = %e, "rejected configuration reload"),
                }
            }
        });

        self._file_watcher = Some(watcher);
        Ok(())
    }

    fn discover_config_paths() -> Vec<PathBuf> {
        let mut config_paths = vec![PathBuf::from(paths::SYSTEM_CONFIG_PATH)];

        if let Some(home_dir) = dirs::home_dir() {
            config_paths.push(home_dir.join(paths::USER_CONFIG_DIR).join("config.toml"));
        }

        config_paths.push(PathBuf::from(paths::DEFAULT_CONFIG_FILE));
        config_paths.push(PathBuf::from(paths::LOCAL_CONFIG_FILE));
        config_paths
    }
}

impl Default for ConfigLoader {
    fn default() -> Self {
        Self::new()
    }
}

fn load_config_file(path: &Path) -> Result<toml::Value, ConfigError> {
    if !path.exists() {
        return Err(ConfigError::FileNotFound(path.display().to_string()));
    }

    let content = std::fs::read_to_string(path)?;
    Ok(toml::from_str(&content)?)
}

fn merge_toml_values(base: &mut toml::Value, overlay: toml::Value) {
    match (base, overlay) {
        (toml::Value::Table(base_table), toml::Value::Table(overlay_table)) => {
            for (key, value) in overlay_table {
                if let Some(base_value) = base_table.get_mut(&key) {
                    merge_toml_values(base_value, value);
                } else {
                    base_table.insert(key, value);
                }
            }
        }
        (base_value, overlay_value) => {
            *base_value = overlay_value;
        }
    }
}

fn parse_env_value(value: &str) -> toml::Value {
    if let Ok(int_val) = value.parse::<i64>() {
        toml::Value::Integer(int_val)
    } else if let Ok(float_val) = value.parse::<f64>() {
        toml::Value::Float(float_val)
    } else if let Ok(bool_val) = value.parse::<bool>() {
        toml::Value::Boolean(bool_val)
    } else {
        toml::Value::String(value.to_string())
    }
}

fn set_nested_value(config: &mut toml::Value, path: &str, value: toml::Value) {
    let Some((parents, leaf)) = path.rsplit_once('.') else {
        return;
    };

    let mut current = config;
    for part in parents.split('.') {
        let toml::Value::Table(table) = current else {
            return;
        };
        current = table
            .entry(part.to_string())
            .or_insert_with(|| toml::Value::Table(toml::value::Table::new()));
    }

    if let toml::Value::Table(table) = current {
        table.insert(leaf.to_string(), value);
    }
}

fn same_file(configured: &Path, changed: &Path) -> bool {
    configured == changed
        || match (configured.canonicalize(), changed.canonicalize()) {
            (Ok(a), Ok(b)) => a == b,
            _ => false,
        }
}

mod dirs {
    use std::path::PathBuf;

    pub fn home_dir() -> Option<PathBuf> {
        #[cfg(target_os = "windows")]
        {
            std::env::var_os("USERPROFILE").map(PathBuf::from)
        }
        #[cfg(not(target_os = "windows"))]
        {
            std::env::var_os("HOME").map(PathBuf::from)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn test_config_loader_creation() {
        let loader = ConfigLoader::new();
        assert!(!loader.config_paths().is_empty());
    }

    #[test]
    fn test_missing_files_yield_defaults() {
        let mut loader = ConfigLoader::with_paths(vec![PathBuf::from("/nonexistent/nicu.toml")])
            .with_env_prefix("NICU_LOADER_TEST_UNUSED_");
        let config = loader.load_system_config().unwrap();
        assert_eq!(config, SystemConfig::default());
    }

    #[test]
    fn test_config_file_validation() {
        let loader = ConfigLoader::new();

        let mut temp_file = NamedTempFile::new().unwrap();
        writeln!(
            temp_file,
            r#"
[engine]
tick_interval_ms = 1000
initial_range = "4h"

[feed]
enabled = false
        "#
        )
        .unwrap();

        assert!(loader.validate_config_file(temp_file.path()).is_ok());
    }

    #[test]
    fn test_invalid_config_validation() {
        let loader = ConfigLoader::new();

        let mut temp_file = NamedTempFile::new().unwrap();
        writeln!(
            temp_file,
            r#"
[engine]
staleness_window_ms = 50  # Too short
        "#
        )
        .unwrap();

        assert!(loader.validate_config_file(temp_file.path()).is_err());
    }

    #[test]
    fn test_set_nested_value() {
        let mut value = toml::Value::Table(toml::value::Table::new());
        set_nested_value(&mut value, "engine.tick_interval_ms", toml::Value::Integer(500));
        assert_eq!(
            value.get("engine").and_then(|e| e.get("tick_interval_ms")),
            Some(&toml::Value::Integer(500))
        );
    }

    #[test]
    fn test_parse_env_value() {
        assert_eq!(parse_env_value("42"), toml::Value::Integer(42));
        assert_eq!(parse_env_value("0.5"), toml::Value::Float(0.5));
        assert_eq!(parse_env_value("false"), toml::Value::Boolean(false));
        assert_eq!(parse_env_value("4h"), toml::Value::String("4h".to_string()));
    }

    #[test]
    fn test_config_export() {
        let loader = ConfigLoader::with_paths(Vec::new());
        let temp_file = NamedTempFile::new().unwrap();

        assert!(loader.export_config(temp_file.path()).is_ok());

        let content = std::fs::read_to_string(temp_file.path()).unwrap();
        assert!(content.contains("[engine]"));
        assert!(content.contains("[generator]"));
    }
}
