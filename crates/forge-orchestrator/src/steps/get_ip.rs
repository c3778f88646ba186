//! `GetServerIp`: polls MaaS for the host's IP once commissioning has
//! booted it, and records the SSH endpoint every later step reads through
//! [`crate::deps::ssh_host`].

use std::sync::Arc;

use async_trait::async_trait;
use forge_core::{ForgeError, MachineId, StepStatus, WorkflowContext};
use forge_workflow::{Reporter, StepBody};
use tokio::sync::Mutex;
use tokio_util::sync::CancellationToken;

use crate::deps::{SharedDeps, SSH_HOST_KEY};

pub struct GetServerIpStep {
    pub machine_id: MachineId,
    pub deps: Arc<SharedDeps>,
}

#[async_trait]
impl StepBody for GetServerIpStep {
    async fn run(&self, ctx: Arc<Mutex<WorkflowContext>>, reporter: Reporter, _cancel: CancellationToken) -> Result<(), ForgeError> {
        let ip = self.deps.maas.get_ip(&self.machine_id).await?;
        let ssh_port = 22;
        {
            let mut guard = ctx.lock().await;
            guard.file_paths.insert(SSH_HOST_KEY.to_string(), format!("{ip}:{ssh_port}"));
        }
        reporter.substep("get_ip", StepStatus::Succeeded, format!("ssh target is {ip}:{ssh_port}"));
        Ok(())
    }
}
