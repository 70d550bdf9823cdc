//! Purpose: Startup configuration for the sidecar (logging policy and node runtime).
//! Exports: `SidecarConfig`, `RuntimeConfig`.
//! Role: Read once by `startup`; never consulted again after the sidecar is built.
//! Invariants: JSON with defaults for every field; unknown fields are rejected.
//! Notes: Boundary checks are fixed; see `boundary_env`.
use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{Error, ErrorKind};
use crate::logging::LogPolicy;

#[derive(Clone, Debug, Default, Eq, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SidecarConfig {
    pub logging: LogPolicy,
    pub runtime: RuntimeConfig,
}

impl SidecarConfig {
    pub fn from_json_str(input: &str) -> Result<Self, Error> {
        let config: SidecarConfig = serde_json::from_str(input).map_err(|err| {
            Error::new(ErrorKind::Usage)
                .with_message("invalid sidecar config")
                .with_source(err)
        })?;
        config.runtime.validate()?;
        Ok(config)
    }

    pub fn from_path(path: &Path) -> Result<Self, Error> {
        let text = std::fs::read_to_string(path).map_err(|err| {
            Error::new(ErrorKind::Usage)
                .with_message(format!("failed to read config {}", path.display()))
                .with_source(err)
        })?;
        Self::from_json_str(&text)
    }
}

#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct RuntimeConfig {
    /// Worker threads for the node runtime; `None` uses one per core.
    pub worker_threads: Option<usize>,
    pub thread_name: String,
    pub shutdown_timeout_ms: u64,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            worker_threads: None,
            thread_name: "f3-sidecar".to_string(),
            shutdown_timeout_ms: 5_000,
        }
    }
}

impl RuntimeConfig {
    pub fn validate(&self) -> Result<(), Error> {
        if self.worker_threads == Some(0) {
            return Err(Error::new(ErrorKind::Usage).with_message("worker_threads must be at least 1"));
        }
        if self.thread_name.trim().is_empty() {
            return Err(Error::new(ErrorKind::Usage).with_message("thread_name is empty"));
        }
        if self.shutdown_timeout_ms == 0 {
            return Err(Error::new(ErrorKind::Usage).with_message("shutdown_timeout_ms must be positive"));
        }
        Ok(())
    }

    pub fn shutdown_timeout(&self) -> Duration {
        Duration::from_millis(self.shutdown_timeout_ms)
    }

    pub fn build(&self) -> Result<tokio::runtime::Runtime, Error> {
        self.validate()?;
        let mut builder = tokio::runtime::Builder::new_multi_thread();
        builder.enable_all().thread_name(self.thread_name.clone());
        if let Some(threads) = self.worker_threads {
            builder.worker_threads(threads);
        }
        builder.build().map_err(|err| {
            Error::new(ErrorKind::Internal)
                .with_message("failed to start runtime")
                .with_source(err)
        })
    }
}
