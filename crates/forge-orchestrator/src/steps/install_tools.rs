//! `InstallVendorTools`: installs whatever vendor CLI the BIOS/firmware
//! steps need, in-band over SSH, before they run.
//!
//! Under `ToolPolicy::HardRequire` a failed install is fatal (this step's
//! default `critical: true` stands). Under `ToolPolicy::DegradeToDummy`
//! (the config default) a failed install sets `ctx.degraded` and lets the
//! workflow continue — `PullBios`/`MergeAndPushBios` read that flag and
//! fail their own step without attempting a connection to a tool that
//! isn't there.

use std::sync::Arc;

use async_trait::async_trait;
use forge_core::{ForgeError, MachineId, StepStatus, WorkflowContext};
use forge_toolchain::{ToolInstaller, ToolPolicy};
use forge_workflow::{Reporter, StepBody};
use tokio::sync::Mutex;
use tokio_util::sync::CancellationToken;

use crate::deps::{self, SharedDeps};

pub struct InstallVendorToolsStep {
    pub machine_id: MachineId,
    pub deps: Arc<SharedDeps>,
}

#[async_trait]
impl StepBody for InstallVendorToolsStep {
    async fn run(&self, ctx: Arc<Mutex<WorkflowContext>>, reporter: Reporter, _cancel: CancellationToken) -> Result<(), ForgeError> {
        let (host, credential, device) = {
            let guard = ctx.lock().await;
            let host = deps::ssh_host(&guard)?;
            let credential = deps::resolve_ssh_credential(&self.deps, &guard).await?;
            let device_type = guard
                .device_type
                .clone()
                .ok_or_else(|| ForgeError::Internal("install-tools step ran before a device type was resolved".to_string()))?;
            let device = self
                .deps
                .catalog
                .get(&device_type)
                .cloned()
                .ok_or_else(|| ForgeError::Internal(format!("device type {device_type} is missing from the catalog")))?;
            (host, credential, device)
        };

        let vendor = deps::bmc_vendor_of(&device);
        let tools = forge_toolchain::VendorTool::for_vendor(vendor);
        if tools.is_empty() {
            reporter.substep("install", StepStatus::Succeeded, format!("{vendor} requires no vendor tool"));
            return Ok(());
        }

        let installer = ToolInstaller {
            pool: &self.deps.pool,
            host,
            user: &credential.username,
            password: &credential.password,
        };

        for tool in tools {
            let urls = self.deps.config.tool_mirror_urls(tool);
            match installer.ensure_installed(tool, &urls).await {
                Ok(()) => {
                    reporter.substep("install", StepStatus::Succeeded, format!("{} installed", tool.binary_name()));
                }
                Err(err) => {
                    let forge_err: ForgeError = err.into();
                    match self.deps.config.tool_policy {
                        ToolPolicy::HardRequire => return Err(forge_err),
                        ToolPolicy::DegradeToDummy => {
                            reporter.substep(
                                "install",
                                StepStatus::Failed,
                                format!("{}: {forge_err}", tool.binary_name()),
                            );
                            ctx.lock().await.degraded = true;
                        }
                    }
                }
            }
        }

        Ok(())
    }
}
