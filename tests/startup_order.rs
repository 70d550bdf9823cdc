// Startup stage ordering, observed through an instrumented backend and node factory.
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use f3_sidecar::boundary_env::{self, RUNTIME_DEBUG_VAR};
use f3_sidecar::logging::{LogBackend, LogLevel};
use f3_sidecar::{BoxError, Error, FinalityNode, NodeState, SidecarConfig, StartParams, Startup};
use tokio_util::sync::CancellationToken;

type Journal = Arc<Mutex<Vec<String>>>;

fn note(journal: &Journal, stage: &str) {
    let configured = boundary_env::is_configured();
    journal
        .lock()
        .expect("journal")
        .push(format!("{stage}:{configured}"));
}

struct ObservingBackend {
    journal: Journal,
}

impl LogBackend for ObservingBackend {
    fn set_all(&mut self, level: LogLevel) {
        note(&self.journal, &format!("set_all={}", level.as_str()));
    }

    fn set_level(&mut self, _subsystem: &str, _level: LogLevel) -> Result<(), Error> {
        Ok(())
    }

    fn install(&mut self) -> Result<(), Error> {
        note(&self.journal, "install");
        Ok(())
    }
}

struct IdleNode;

#[async_trait]
impl FinalityNode for IdleNode {
    async fn run(&self, _cancel: CancellationToken, _params: StartParams) -> Result<(), BoxError> {
        Ok(())
    }
}

#[test]
fn boundary_checks_precede_logging_which_precedes_the_sidecar() {
    // SAFETY: this test binary has a single test; no other thread reads the environment.
    unsafe {
        std::env::set_var(RUNTIME_DEBUG_VAR, "cgocheck=0,gctrace=1,cgocheck=1");
    }
    assert!(!boundary_env::is_configured());

    let journal: Journal = Arc::default();
    let mut backend = ObservingBackend {
        journal: journal.clone(),
    };
    let factory_journal = journal.clone();
    let sidecar = Startup::new(SidecarConfig::default()).run_with(&mut backend, move || {
        note(&factory_journal, "node");
        IdleNode
    });

    assert_eq!(
        *journal.lock().unwrap(),
        vec!["set_all=info:true", "install:true", "node:true"]
    );
    assert_eq!(
        std::env::var(RUNTIME_DEBUG_VAR).unwrap(),
        "gctrace=1,invalidptr=0,cgocheck=0"
    );
    assert_eq!(sidecar.state(), NodeState::Idle);
    assert!(!sidecar.cancellation_token().is_cancelled());
}
