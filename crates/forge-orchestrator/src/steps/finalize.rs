//! `Finalize`: the workflow's last step.
//!
//! The actual `MachineRecord` status transition happens in
//! [`crate::facade::Orchestrator::start_provision`] once the engine
//! returns a terminal `Workflow`, since that is the one place that
//! already knows whether the run as a whole succeeded — by the time this
//! step runs, an earlier `.non_critical()` BIOS failure may already have
//! doomed the workflow to `Failed` even though every step from here on
//! reports `Succeeded`.

use std::sync::Arc;

use async_trait::async_trait;
use forge_core::{ForgeError, MachineId, StepStatus, WorkflowContext};
use forge_workflow::{Reporter, StepBody};
use tokio::sync::Mutex;
use tokio_util::sync::CancellationToken;

pub struct FinalizeStep {
    pub machine_id: MachineId,
}

#[async_trait]
impl StepBody for FinalizeStep {
    async fn run(&self, _ctx: Arc<Mutex<WorkflowContext>>, reporter: Reporter, _cancel: CancellationToken) -> Result<(), ForgeError> {
        reporter.substep("finalize", StepStatus::Succeeded, format!("provisioning steps complete for {}", self.machine_id));
        Ok(())
    }
}
