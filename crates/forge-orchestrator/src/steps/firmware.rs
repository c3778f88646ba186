//! `FirmwareUpdates`: plans and applies firmware changes against the
//! hardware report `DiscoverHardware` already produced.
//!
//! Skipped entirely when the plan comes back empty — an already
//! up-to-date machine leaves no trace of this step beyond a `Succeeded`
//! substep. Each planned update's target (`forge_firmware::UpdateMethod`)
//! picks its own version-readback strategy: Redfish components are
//! re-queried from `UpdateService/FirmwareInventory`, vendor-tool
//! components are asked with `<tool> --version` the same way
//! `forge_toolchain::VendorTool::binary_name` documents probing them.

use std::net::SocketAddr;
use std::sync::Arc;

use async_trait::async_trait;
use forge_bmc::{RedfishClient, RedfishConfig};
use forge_core::{ForgeError, MachineId, StepStatus, WorkflowContext};
use forge_firmware::{apply_update, plan_updates, FirmwareError, Update, UpdateMethod, UpdatePolicy, UpdateTarget, VersionReader};
use forge_secrets::Credential;
use forge_toolchain::VendorTool;
use forge_workflow::{Reporter, StepBody};
use tokio::sync::Mutex;
use tokio_util::sync::CancellationToken;

use crate::deps::{self, SharedDeps};

struct RedfishVersionReader<'a> {
    client: &'a RedfishClient,
}

#[async_trait]
impl VersionReader for RedfishVersionReader<'_> {
    async fn read_version(&self, component: &str) -> Result<String, FirmwareError> {
        let body = self.client.firmware_inventory_member(component).await?;
        body.get("Version").and_then(serde_json::Value::as_str).map(str::to_string).ok_or_else(|| {
            FirmwareError::NotApplied {
                component: component.to_string(),
                expected: "a Version field".to_string(),
                got: "missing from the Redfish response".to_string(),
            }
        })
    }
}

struct SshVersionReader<'a> {
    pool: &'a forge_ssh::SshPool,
    host: SocketAddr,
    user: &'a str,
    password: &'a str,
    tool: VendorTool,
}

#[async_trait]
impl VersionReader for SshVersionReader<'_> {
    async fn read_version(&self, _component: &str) -> Result<String, FirmwareError> {
        let cmd = format!("{} --version", self.tool.binary_name());
        let result = self.pool.exec(self.host, self.user, self.password, &cmd, None).await?;
        Ok(result.stdout.trim().to_string())
    }
}

pub struct FirmwareUpdatesStep {
    pub machine_id: MachineId,
    pub deps: Arc<SharedDeps>,
    pub policy: UpdatePolicy,
}

impl FirmwareUpdatesStep {
    async fn apply_one(
        &self,
        update: &Update,
        host: SocketAddr,
        ssh_credential: &Credential,
        redfish: Option<&RedfishClient>,
        tool: Option<VendorTool>,
    ) -> Result<(), ForgeError> {
        match update.method {
            UpdateMethod::Redfish => {
                let client = redfish.ok_or_else(|| {
                    ForgeError::Internal(format!("{} needs Redfish but no BMC address/credential was resolved", update.component))
                })?;
                let target = UpdateTarget::Redfish(client);
                let reader = RedfishVersionReader { client };
                apply_update(update, &target, &reader).await.map_err(ForgeError::from)
            }
            UpdateMethod::VendorTool => {
                let tool = tool.ok_or_else(|| {
                    ForgeError::Internal(format!("{} has no vendor tool installed for this device's vendor", update.component))
                })?;
                let target = UpdateTarget::VendorTool {
                    pool: &self.deps.pool,
                    host,
                    user: &ssh_credential.username,
                    password: &ssh_credential.password,
                    tool,
                };
                let reader = SshVersionReader {
                    pool: &self.deps.pool,
                    host,
                    user: &ssh_credential.username,
                    password: &ssh_credential.password,
                    tool,
                };
                apply_update(update, &target, &reader).await.map_err(ForgeError::from)
            }
        }
    }
}

#[async_trait]
impl StepBody for FirmwareUpdatesStep {
    async fn run(&self, ctx: Arc<Mutex<WorkflowContext>>, reporter: Reporter, _cancel: CancellationToken) -> Result<(), ForgeError> {
        let (host, ssh_credential, bmc_host, ipmi_credential, device_type, hardware) = {
            let guard = ctx.lock().await;
            let host = deps::ssh_host(&guard)?;
            let ssh_credential = deps::resolve_ssh_credential(&self.deps, &guard).await?;
            let bmc_host = deps::bmc_host(&guard).map(str::to_string);
            let ipmi_credential = deps::resolve_ipmi_credential(&self.deps, &guard).await.ok();
            let device_type = guard
                .device_type
                .clone()
                .ok_or_else(|| ForgeError::Internal("firmware step ran before a device type was resolved".to_string()))?;
            let hardware = guard
                .hardware_report
                .clone()
                .ok_or_else(|| ForgeError::Internal("firmware step ran before discovery produced a hardware report".to_string()))?;
            (host, ssh_credential, bmc_host, ipmi_credential, device_type, hardware)
        };

        let device = self
            .deps
            .catalog
            .get(&device_type)
            .cloned()
            .ok_or_else(|| ForgeError::Internal(format!("device type {device_type} is missing from the catalog")))?;

        let updates = plan_updates(&hardware, &device_type, &self.deps.firmware_manifest, self.policy);
        if updates.is_empty() {
            reporter.substep("plan", StepStatus::Succeeded, "no firmware updates pending");
            return Ok(());
        }
        reporter.substep("plan", StepStatus::Succeeded, format!("{} update(s) planned", updates.len()));

        let redfish = match (&bmc_host, &ipmi_credential) {
            (Some(bmc_host), Some(ipmi_credential)) => Some(
                RedfishClient::new(RedfishConfig {
                    base_url: format!("https://{bmc_host}"),
                    username: ipmi_credential.username.clone(),
                    password: ipmi_credential.password.clone(),
                    tls_verify: self.deps.config.redfish_tls_verify,
                })
                .map_err(ForgeError::from)?,
            ),
            _ => None,
        };
        let tool = VendorTool::for_vendor(deps::bmc_vendor_of(&device)).first().copied();

        for update in &updates {
            self.apply_one(update, host, &ssh_credential, redfish.as_ref(), tool).await?;
            reporter.substep("apply", StepStatus::Succeeded, format!("{} updated to {}", update.component, update.target_version));
        }

        Ok(())
    }
}
