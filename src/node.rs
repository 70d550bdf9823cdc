//! Purpose: The long-lived handle that owns the embedded finality node.
//! Exports: `FinalityNode`, `Sidecar`, `NodeState`.
//! Role: Only legal entry point for starting the node; owns its root cancellation token.
//! Invariants: One `run` at a time; a second concurrent call is rejected, never queued.
//! Invariants: Once cancelled the sidecar never runs again.
//! Invariants: Collaborator errors and panics are collapsed into `Error`, never unwound to callers.
use std::panic::{self, AssertUnwindSafe};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Instant;

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

use crate::config::RuntimeConfig;
use crate::error::{BoxError, Error, ErrorKind};
use crate::params::StartParams;

/// The embedded node. Runs until it finishes, fails, or `cancel` fires.
#[async_trait]
pub trait FinalityNode: Send + Sync + 'static {
    async fn run(&self, cancel: CancellationToken, params: StartParams) -> Result<(), BoxError>;
}

#[async_trait]
impl<T: FinalityNode + ?Sized> FinalityNode for Arc<T> {
    async fn run(&self, cancel: CancellationToken, params: StartParams) -> Result<(), BoxError> {
        (**self).run(cancel, params).await
    }
}

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum NodeState {
    Idle,
    Running,
    Terminated,
    Cancelled,
}

impl NodeState {
    pub fn code(self) -> i32 {
        match self {
            NodeState::Idle => 0,
            NodeState::Running => 1,
            NodeState::Terminated => 2,
            NodeState::Cancelled => 3,
        }
    }
}

pub struct Sidecar {
    node: Box<dyn FinalityNode>,
    root: CancellationToken,
    runtime: RuntimeConfig,
    state: Mutex<NodeState>,
}

impl Sidecar {
    pub fn new(node: impl FinalityNode, runtime: RuntimeConfig) -> Self {
        Self {
            node: Box::new(node),
            root: CancellationToken::new(),
            runtime,
            state: Mutex::new(NodeState::Idle),
        }
    }

    pub fn state(&self) -> NodeState {
        *self.lock_state()
    }

    pub fn cancellation_token(&self) -> CancellationToken {
        self.root.clone()
    }

    /// Asks the node to stop. A running `run` returns once the node unwinds.
    pub fn cancel(&self) {
        self.root.cancel();
        let mut state = self.lock_state();
        if *state != NodeState::Running {
            *state = NodeState::Cancelled;
        }
        tracing::info!(state = ?*state, "cancellation requested");
    }

    /// Runs the node on a dedicated runtime, blocking the calling thread until it returns.
    ///
    /// Must not be called from inside an async context; the runtime is driven with `block_on`.
    pub fn run(&self, params: StartParams) -> Result<(), Error> {
        self.enter_running()?;
        tracing::info!(
            rpc_endpoint = %params.rpc_endpoint(),
            f3_rpc_endpoint = %params.f3_rpc_endpoint(),
            initial_power_table = params.initial_power_table(),
            bootstrap_epoch = params.bootstrap_epoch(),
            finality = params.finality_depth(),
            db = %params.db_path().display(),
            manifest_server = params.manifest_server(),
            "starting finality node"
        );
        let started = Instant::now();
        let result = self.drive(params);
        let state = self.leave_running();
        match &result {
            Ok(()) => {
                tracing::info!(?state, elapsed = ?started.elapsed(), "finality node exited")
            }
            Err(err) => {
                tracing::warn!(?state, kind = ?err.kind(), error = %err, "finality node failed")
            }
        }
        result
    }

    fn drive(&self, params: StartParams) -> Result<(), Error> {
        let token = self.root.child_token();
        let runtime_config = &self.runtime;
        let node = self.node.as_ref();
        let outcome = panic::catch_unwind(AssertUnwindSafe(|| {
            let runtime = runtime_config.build()?;
            let result = runtime.block_on(node.run(token, params));
            runtime.shutdown_timeout(runtime_config.shutdown_timeout());
            result.map_err(|err| {
                Error::new(ErrorKind::Node)
                    .with_message("node run failed")
                    .with_boxed_source(err)
            })
        }));
        match outcome {
            Ok(result) => result,
            Err(payload) => Err(Error::new(ErrorKind::Internal)
                .with_message(format!("node panicked: {}", panic_message(payload.as_ref())))),
        }
    }

    fn enter_running(&self) -> Result<(), Error> {
        let mut state = self.lock_state();
        if self.root.is_cancelled() {
            *state = NodeState::Cancelled;
        }
        match *state {
            NodeState::Idle | NodeState::Terminated => {
                *state = NodeState::Running;
                Ok(())
            }
            NodeState::Running => {
                Err(Error::new(ErrorKind::AlreadyRunning).with_message("node is already running"))
            }
            NodeState::Cancelled => {
                Err(Error::new(ErrorKind::Cancelled).with_message("node has been cancelled"))
            }
        }
    }

    fn leave_running(&self) -> NodeState {
        let mut state = self.lock_state();
        *state = if self.root.is_cancelled() {
            NodeState::Cancelled
        } else {
            NodeState::Terminated
        };
        *state
    }

    fn lock_state(&self) -> MutexGuard<'_, NodeState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl std::fmt::Debug for Sidecar {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Sidecar")
            .field("state", &self.state())
            .field("cancelled", &self.root.is_cancelled())
            .field("runtime", &self.runtime)
            .finish_non_exhaustive()
    }
}

fn panic_message(payload: &(dyn std::any::Any + Send)) -> &str {
    if let Some(message) = payload.downcast_ref::<&str>() {
        message
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message
    } else {
        "non-string panic payload"
    }
}

#[cfg(test)]
mod tests {
    use super::{FinalityNode, NodeState, Sidecar};
    use crate::config::RuntimeConfig;
    use crate::error::{BoxError, ErrorKind};
    use crate::params::StartParams;
    use async_trait::async_trait;
    use tokio_util::sync::CancellationToken;

    struct Immediate(Result<(), &'static str>);

    #[async_trait]
    impl FinalityNode for Immediate {
        async fn run(
            &self,
            _cancel: CancellationToken,
            _params: StartParams,
        ) -> Result<(), BoxError> {
            self.0.map_err(BoxError::from)
        }
    }

    fn params() -> StartParams {
        StartParams::new(
            "127.0.0.1:2345",
            "127.0.0.1:23456",
            "bafy2bzacepowertable",
            0,
            900,
            "/tmp/f3-db",
            "12D3KooWManifest",
        )
        .expect("params")
    }

    fn small_runtime() -> RuntimeConfig {
        RuntimeConfig {
            worker_threads: Some(1),
            ..RuntimeConfig::default()
        }
    }

    #[test]
    fn new_sidecar_is_idle_with_live_token() {
        let sidecar = Sidecar::new(Immediate(Ok(())), small_runtime());
        assert_eq!(sidecar.state(), NodeState::Idle);
        assert!(!sidecar.cancellation_token().is_cancelled());
    }

    #[test]
    fn clean_exit_terminates_and_allows_another_run() {
        let sidecar = Sidecar::new(Immediate(Ok(())), small_runtime());
        sidecar.run(params()).expect("clean exit");
        assert_eq!(sidecar.state(), NodeState::Terminated);
        sidecar.run(params()).expect("second run");
        assert_eq!(sidecar.state(), NodeState::Terminated);
    }

    #[test]
    fn finished_run_can_be_retried() {
        let sidecar = Sidecar::new(Immediate(Err("rpc unreachable")), small_runtime());
        let err = sidecar.run(params()).expect_err("node error");
        assert_eq!(err.kind(), ErrorKind::Node);
        assert!(err.to_string().contains("rpc unreachable"));
        assert_eq!(sidecar.state(), NodeState::Terminated);

        let err = sidecar.run(params()).expect_err("still failing");
        assert_eq!(err.kind(), ErrorKind::Node);
    }

    #[test]
    fn cancelled_sidecar_refuses_to_run() {
        let sidecar = Sidecar::new(Immediate(Ok(())), small_runtime());
        sidecar.cancel();
        assert_eq!(sidecar.state(), NodeState::Cancelled);
        let err = sidecar.run(params()).expect_err("cancelled");
        assert_eq!(err.kind(), ErrorKind::Cancelled);
    }

    #[test]
    fn state_codes_are_stable() {
        let codes: Vec<i32> = [
            NodeState::Idle,
            NodeState::Running,
            NodeState::Terminated,
            NodeState::Cancelled,
        ]
        .into_iter()
        .map(NodeState::code)
        .collect();
        assert_eq!(codes, vec![0, 1, 2, 3]);
    }
}
