//! Purpose: Lifecycle bridge between a foreign host process and an embedded F3 finality node.
//! Exports: `abi` (C boundary), `startup` (process init), `node` (`Sidecar`, `FinalityNode`),
//! `params`, `config`, `logging`, `boundary_env`, `error`.
//! Role: rlib for the crate that supplies the node; cdylib/staticlib for the host.
//! Invariants: Initialization order is boundary checks, logging policy, then the sidecar.
//! Invariants: The host only sees booleans and state codes; detail stays in the logs.
pub mod abi;
pub mod boundary_env;
pub mod config;
pub mod error;
pub mod logging;
pub mod node;
pub mod params;
pub mod startup;

pub use config::{RuntimeConfig, SidecarConfig};
pub use error::{BoxError, Error, ErrorKind};
pub use node::{FinalityNode, NodeState, Sidecar};
pub use params::{Endpoint, StartParams};
pub use startup::{Startup, init_process, process_sidecar};
