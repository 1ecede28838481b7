//! Configuration for jobflow-daemon

use jobflow_controller::ControllerConfig;
use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

/// Main daemon configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DaemonConfig {
    /// Server configuration
    #[serde(default)]
    pub server: ServerConfig,

    /// Workflow controller tuning
    #[serde(default)]
    pub controller: ControllerConfig,

    /// Local cluster behaviour
    #[serde(default)]
    pub cluster: ClusterConfig,

    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Server configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Listen address
    #[serde(default = "default_listen_addr")]
    pub listen_addr: SocketAddr,

    /// Enable CORS
    #[serde(default = "default_true")]
    pub enable_cors: bool,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            listen_addr: default_listen_addr(),
            enable_cors: true,
        }
    }
}

/// Local cluster configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClusterConfig {
    /// Directory of manifests applied at startup
    #[serde(default)]
    pub manifests_dir: Option<PathBuf>,

    /// Mark created jobs complete after `job_completion_millis`
    #[serde(default = "default_true")]
    pub simulate_job_completion: bool,

    /// Simulated job run time in milliseconds
    #[serde(default = "default_job_completion_millis")]
    pub job_completion_millis: u64,
}

impl Default for ClusterConfig {
    fn default() -> Self {
        Self {
            manifests_dir: None,
            simulate_job_completion: true,
            job_completion_millis: default_job_completion_millis(),
        }
    }
}

impl ClusterConfig {
    pub fn job_completion_delay(&self) -> Duration {
        Duration::from_millis(self.job_completion_millis)
    }
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log level
    #[serde(default = "default_log_level")]
    pub level: String,

    /// JSON format
    #[serde(default)]
    pub json: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            json: false,
        }
    }
}

// Default value helpers
fn default_true() -> bool {
    true
}

fn default_listen_addr() -> SocketAddr {
    SocketAddr::from(([127, 0, 0, 1], 8080))
}

fn default_job_completion_millis() -> u64 {
    2000
}

fn default_log_level() -> String {
    "info".to_string()
}

impl DaemonConfig {
    /// Load configuration from file
    pub fn load(path: Option<&str>) -> Result<Self, config::ConfigError> {
        let mut builder = config::Config::builder();

        // Add default configuration
        builder = builder.add_source(config::Config::try_from(&DaemonConfig::default())?);

        // Add file configuration if provided
        if let Some(path) = path {
            builder = builder.add_source(config::File::with_name(path).required(false));
        }

        // Environment variables such as JOBFLOW_CONTROLLER__WORKERS
        builder = builder.add_source(
            config::Environment::with_prefix("JOBFLOW")
                .prefix_separator("_")
                .separator("__")
                .try_parsing(true),
        );

        builder.build()?.try_deserialize()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = DaemonConfig::default();
        assert_eq!(config.server.listen_addr.port(), 8080);
        assert_eq!(config.controller.workers, 5);
        assert!(config.cluster.simulate_job_completion);
        assert!(config.cluster.manifests_dir.is_none());
    }

    #[test]
    fn test_cluster_defaults() {
        let config = ClusterConfig::default();
        assert_eq!(config.job_completion_delay(), Duration::from_millis(2000));
    }

    #[test]
    fn test_partial_file_keeps_defaults() {
        let config: DaemonConfig = serde_json::from_str(
            r#"{"controller": {"workers": 2}, "cluster": {"simulate_job_completion": false}}"#,
        )
        .unwrap();
        assert_eq!(config.controller.workers, 2);
        assert_eq!(config.controller.expectations_ttl_secs, 300);
        assert!(!config.cluster.simulate_job_completion);
        assert_eq!(config.cluster.job_completion_millis, 2000);
    }
}
