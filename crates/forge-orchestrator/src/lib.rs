//! The orchestration facade (C9): wires the device catalog, firmware
//! manifest, SSH pool, and workflow engine into the standard
//! provisioning pipeline and exposes `StartProvision`/`Cancel`/`Status`/
//! `Subscribe` to whatever drives it (CLI, API layer).
//!
//! This crate is the only writer of `MachineRecord` (`forge-workflow` is
//! the only writer of `Workflow`/`Step`); every step body here reads and
//! writes the shared `WorkflowContext` scratchpad by way of
//! [`deps::SharedDeps`].

mod config;
mod deps;
mod endpoint_lock;
mod error;
mod facade;
mod options;
mod plan;
mod steps;

pub use config::AppConfig;
pub use error::OrchestratorError;
pub use facade::Orchestrator;
pub use options::ProvisionOptions;

pub use forge_workflow::Event;
