//! Purpose: Process initialization in a fixed order, and the process-wide sidecar slot.
//! Exports: `Startup`, `init_process`, `process_sidecar`, `abort_on_config_error`.
//! Role: Boundary checks, then logging policy, then sidecar construction.
//! Invariants: Each stage completes before the next begins; the sidecar is built last.
//! Invariants: A logging policy failure aborts the process before the sidecar is reachable.
//! Invariants: The process slot is written at most once and read-only afterwards.
use std::sync::OnceLock;

use crate::boundary_env;
use crate::config::SidecarConfig;
use crate::error::{Error, ErrorKind};
use crate::logging::{LogBackend, TracingBackend, apply_policy};
use crate::node::{FinalityNode, Sidecar};

static PROCESS_SIDECAR: OnceLock<Sidecar> = OnceLock::new();

#[derive(Clone, Debug, Default)]
pub struct Startup {
    config: SidecarConfig,
}

impl Startup {
    pub fn new(config: SidecarConfig) -> Self {
        Self { config }
    }

    pub fn run(self, node: impl FinalityNode) -> Sidecar {
        let mut backend = TracingBackend::default();
        self.run_with(&mut backend, move || node)
    }

    /// Same sequence as `run`, with the logging backend injected and the node built lazily.
    pub fn run_with<B, N, F>(self, backend: &mut B, make_node: F) -> Sidecar
    where
        B: LogBackend + ?Sized,
        N: FinalityNode,
        F: FnOnce() -> N,
    {
        boundary_env::configure();

        if let Err(err) = apply_policy(backend, &self.config.logging) {
            abort_on_config_error(&err);
        }

        let sidecar = Sidecar::new(make_node(), self.config.runtime);
        tracing::debug!(?sidecar, "sidecar constructed");
        sidecar
    }
}

/// Runs `Startup` once for this process and publishes the result.
pub fn init_process(config: SidecarConfig, node: impl FinalityNode) -> Result<&'static Sidecar, Error> {
    let mut constructed = false;
    let sidecar = PROCESS_SIDECAR.get_or_init(|| {
        constructed = true;
        Startup::new(config).run(node)
    });
    if !constructed {
        return Err(Error::new(ErrorKind::AlreadyInitialized)
            .with_message("sidecar was already initialized for this process"));
    }
    Ok(sidecar)
}

pub fn process_sidecar() -> Option<&'static Sidecar> {
    PROCESS_SIDECAR.get()
}

/// Terminates the process on a startup configuration bug. Never returns.
pub fn abort_on_config_error(err: &Error) -> ! {
    eprintln!("f3-sidecar: fatal startup configuration error: {err}");
    std::process::abort()
}
