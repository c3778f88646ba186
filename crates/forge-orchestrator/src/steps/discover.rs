//! `DiscoverHardware`: runs the SSH-based hardware probe against the
//! freshly commissioned host and resolves a `device_type` against the
//! registry.
//!
//! Device-type resolution is either an operator override
//! (`ProvisionOptions.device_type`) or the top registry match, and only
//! the latter is gated by `AppConfig.min_match_confidence` — the open
//! question on confidence thresholds this project resolves by making the
//! cutoff a config value rather than a constant (see `DESIGN.md`).

use std::sync::Arc;

use async_trait::async_trait;
use forge_core::{ForgeError, MachineId, StepStatus, WorkflowContext};
use forge_workflow::{Reporter, StepBody};
use tokio::sync::Mutex;
use tokio_util::sync::CancellationToken;

use crate::deps::{self, SharedDeps, BMC_HOST_KEY};

pub struct DiscoverHardwareStep {
    pub machine_id: MachineId,
    pub deps: Arc<SharedDeps>,
    pub device_type_override: Option<String>,
}

#[async_trait]
impl StepBody for DiscoverHardwareStep {
    async fn run(&self, ctx: Arc<Mutex<WorkflowContext>>, reporter: Reporter, _cancel: CancellationToken) -> Result<(), ForgeError> {
        let (host, credential) = {
            let guard = ctx.lock().await;
            let host = deps::ssh_host(&guard)?;
            let credential = deps::resolve_ssh_credential(&self.deps, &guard).await?;
            (host, credential)
        };

        let discoverer = forge_discovery::Discoverer::new(&self.deps.pool, host, &credential.username, &credential.password);
        let report = discoverer.discover().await.map_err(ForgeError::from)?;

        if !report.is_usable() {
            return Err(ForgeError::Internal(format!(
                "discovery for {} produced no usable manufacturer/product identity",
                self.machine_id
            )));
        }
        for warning in &report.warnings {
            reporter.substep("discover", StepStatus::Succeeded, format!("warning: {warning}"));
        }

        let device_type = match &self.device_type_override {
            Some(explicit) => {
                reporter.substep("device-type", StepStatus::Succeeded, format!("operator-selected {explicit}"));
                explicit.clone()
            }
            None => {
                let candidates = self.deps.catalog.match_hardware(&report);
                let top = candidates.first().ok_or_else(|| {
                    ForgeError::Internal(format!("no device type in the catalog matches {}", self.machine_id))
                })?;
                if top.confidence < self.deps.config.min_match_confidence {
                    return Err(ForgeError::Internal(format!(
                        "best device-type match {} has confidence {:.2}, below the {:.2} threshold; requires operator confirmation",
                        top.device_type, top.confidence, self.deps.config.min_match_confidence
                    )));
                }
                reporter.substep(
                    "device-type",
                    StepStatus::Succeeded,
                    format!("matched {} at confidence {:.2}", top.device_type, top.confidence),
                );
                top.device_type.clone()
            }
        };

        let bmc_ip = report.ipmi.as_ref().filter(|ipmi| !ipmi.ip.is_empty()).map(|ipmi| ipmi.ip.clone());

        {
            let mut guard = ctx.lock().await;
            guard.device_type = Some(device_type);
            if let Some(bmc_ip) = bmc_ip {
                guard.file_paths.insert(BMC_HOST_KEY.to_string(), bmc_ip);
            }
            guard.hardware_report = Some(report);
        }

        reporter.substep("discover", StepStatus::Succeeded, "hardware report collected");
        Ok(())
    }
}
