//! `Commission`: hands the machine to MaaS and waits for it to accept the
//! commissioning request. Getting an IP back is a separate step
//! ([`crate::steps::get_ip`]) since MaaS may take a while to boot the host.

use std::sync::Arc;

use async_trait::async_trait;
use forge_core::{ForgeError, MachineId, StepStatus, WorkflowContext};
use forge_workflow::{Reporter, StepBody};
use tokio::sync::Mutex;
use tokio_util::sync::CancellationToken;

use crate::deps::SharedDeps;

pub struct CommissionStep {
    pub machine_id: MachineId,
    pub deps: Arc<SharedDeps>,
}

#[async_trait]
impl StepBody for CommissionStep {
    async fn run(&self, _ctx: Arc<Mutex<WorkflowContext>>, reporter: Reporter, _cancel: CancellationToken) -> Result<(), ForgeError> {
        self.deps.maas.commission(&self.machine_id).await?;
        reporter.substep("commission", StepStatus::Succeeded, "MaaS accepted the commissioning request");
        Ok(())
    }
}
