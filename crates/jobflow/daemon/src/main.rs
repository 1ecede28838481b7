//! Jobflow Daemon
//!
//! Runs the workflow controller against an in-process cluster and serves:
//! - REST API for workflows, jobs and controller events
//! - Optional simulated job completion for local experiments

use clap::Parser;
use jobflow_daemon::error::{DaemonError, DaemonResult};
use jobflow_daemon::config::LoggingConfig;
use jobflow_daemon::{DaemonConfig, Server};
use std::path::PathBuf;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Jobflow Daemon CLI
#[derive(Parser)]
#[command(name = "jobflowd")]
#[command(about = "Jobflow Daemon - workflow controller and API server", long_about = None)]
#[command(version)]
struct Cli {
    /// Configuration file path
    #[arg(short, long, env = "JOBFLOW_CONFIG")]
    config: Option<String>,

    /// Listen address
    #[arg(short, long, env = "JOBFLOW_LISTEN_ADDR")]
    listen: Option<String>,

    /// Number of reconcile workers
    #[arg(short, long, env = "JOBFLOW_WORKERS")]
    workers: Option<usize>,

    /// Directory of manifests to apply at startup
    #[arg(short, long, env = "JOBFLOW_MANIFESTS")]
    manifests: Option<PathBuf>,

    /// Log level; overrides `logging.level` from the config file
    #[arg(long, env = "JOBFLOW_LOG_LEVEL")]
    log_level: Option<String>,

    /// Enable JSON logging; overrides `logging.json` from the config file
    #[arg(long, env = "JOBFLOW_LOG_JSON")]
    json: bool,
}

impl Cli {
    /// Layer command-line flags over the loaded configuration
    fn apply_to(&self, config: &mut DaemonConfig) -> DaemonResult<()> {
        if let Some(listen) = &self.listen {
            config.server.listen_addr = listen
                .parse()
                .map_err(|e| DaemonError::Config(format!("Invalid listen address: {}", e)))?;
        }
        if let Some(workers) = self.workers {
            if workers == 0 {
                return Err(DaemonError::Config("workers must be at least 1".to_string()));
            }
            config.controller.workers = workers;
        }
        if let Some(dir) = &self.manifests {
            config.cluster.manifests_dir = Some(dir.clone());
        }
        if let Some(level) = &self.log_level {
            config.logging.level = level.clone();
        }
        if self.json {
            config.logging.json = true;
        }
        Ok(())
    }
}

fn init_tracing(logging: &LoggingConfig) {
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| logging.level.clone().into());

    if logging.json {
        tracing_subscriber::registry()
            .with(env_filter)
            .with(tracing_subscriber::fmt::layer().json())
            .init();
    } else {
        tracing_subscriber::registry()
            .with(env_filter)
            .with(tracing_subscriber::fmt::layer())
            .init();
    }
}

#[tokio::main]
async fn main() -> DaemonResult<()> {
    let cli = Cli::parse();

    // Load configuration, then let flags override it
    let mut config = DaemonConfig::load(cli.config.as_deref())
        .map_err(|e| DaemonError::Config(e.to_string()))?;
    cli.apply_to(&mut config)?;

    init_tracing(&config.logging);

    println!(
        r#"
   _       _      __ _
  (_) ___ | |__  / _| | _____      __
  | |/ _ \| '_ \| |_| |/ _ \ \ /\ / /
  | | (_) | |_) |  _| | (_) \ V  V /
 _/ |\___/|_.__/|_| |_|\___/ \_/\_/
|__/

  Workflow controller
  Version: {}
  Workers: {}
  Listening: {}
"#,
        env!("CARGO_PKG_VERSION"),
        config.controller.workers,
        config.server.listen_addr
    );

    // Create and run server
    let server = Server::new(config)?;
    server.run().await
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(args: &[&str]) -> Cli {
        Cli::try_parse_from(std::iter::once("jobflowd").chain(args.iter().copied())).unwrap()
    }

    #[test]
    fn test_file_logging_kept_without_flags() {
        let mut config = DaemonConfig::default();
        config.logging.level = "debug".to_string();
        config.logging.json = true;

        parse(&[]).apply_to(&mut config).unwrap();
        assert_eq!(config.logging.level, "debug");
        assert!(config.logging.json);
    }

    #[test]
    fn test_flags_override_config() {
        let mut config = DaemonConfig::default();
        parse(&["--log-level", "trace", "--json", "-w", "3", "-l", "0.0.0.0:9000"])
            .apply_to(&mut config)
            .unwrap();

        assert_eq!(config.logging.level, "trace");
        assert!(config.logging.json);
        assert_eq!(config.controller.workers, 3);
        assert_eq!(config.server.listen_addr.port(), 9000);
    }

    #[test]
    fn test_zero_workers_rejected() {
        let mut config = DaemonConfig::default();
        let result = parse(&["-w", "0"]).apply_to(&mut config);
        assert!(matches!(result, Err(DaemonError::Config(_))));
    }
}
