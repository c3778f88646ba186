//! The workflow engine: runs a [`forge_core::Workflow`]'s steps in order,
//! retrying transient failures, enforcing per-step timeouts, cooperating
//! with cancellation, and publishing progress on a broadcast bus.
//!
//! This crate is the only writer of `Workflow`/`Step` state; callers
//! (the orchestration facade) assemble a [`StepSpec`] list and a
//! `Workflow` shell and hand both to [`WorkflowEngine::run`].

mod bus;
mod engine;
mod reporter;
mod retry;
mod step;

pub use bus::{Event, ProgressBus};
pub use engine::{WorkflowEngine, CANCEL_GRACE};
pub use reporter::Reporter;
pub use step::{SkipPredicate, StepBody, StepSpec, DEFAULT_STEP_TIMEOUT, FIRMWARE_STEP_TIMEOUT};
