//! `PullBios` and `MergeAndPushBios`: the two workflow steps wrapping
//! `forge_bios::apply_bios`, plus the vendor-adapter construction they
//! share.
//!
//! `MergeAndPushBios` is `.non_critical()` (see
//! [`crate::plan::build_step_specs`]): a BIOS failure here must not stop
//! `ConfigureIpmi`/`Finalize` from running, per the spec's
//! tool-degradation scenario.

use std::collections::HashSet;
use std::net::SocketAddr;
use std::sync::Arc;

use async_trait::async_trait;
use bmc_vendor::BMCVendor;
use forge_bios::{BiosResult, VendorAdapter};
use forge_bmc::{RedfishClient, RedfishConfig};
use forge_core::{BiosTemplate, DeviceType, DownloadAttempt, ErrorContext, ForgeError, StepStatus, WorkflowContext};
use forge_secrets::Credential;
use forge_workflow::{Reporter, StepBody};
use tokio::sync::Mutex;
use tokio_util::sync::CancellationToken;

use crate::deps::{self, SharedDeps};

/// The resolved inputs every BIOS-pipeline step needs before it can build
/// a vendor adapter: the SSH target, the device's catalog entry, and
/// (Dell only) a BMC address and IPMI credential for Redfish auth.
struct BiosStepInputs {
    host: SocketAddr,
    ssh_credential: Credential,
    bmc_host: Option<String>,
    ipmi_credential: Option<Credential>,
    device: DeviceType,
}

async fn resolve_inputs(deps: &SharedDeps, ctx: &WorkflowContext) -> Result<BiosStepInputs, ForgeError> {
    let host = deps::ssh_host(ctx)?;
    let ssh_credential = deps::resolve_ssh_credential(deps, ctx).await?;
    let bmc_host = deps::bmc_host(ctx).map(str::to_string);
    let ipmi_credential = deps::resolve_ipmi_credential(deps, ctx).await.ok();
    let device_type = ctx
        .device_type
        .clone()
        .ok_or_else(|| ForgeError::Internal("BIOS step ran before a device type was resolved".to_string()))?;
    let device = deps
        .catalog
        .get(&device_type)
        .cloned()
        .ok_or_else(|| ForgeError::Internal(format!("device type {device_type} is missing from the catalog")))?;
    Ok(BiosStepInputs { host, ssh_credential, bmc_host, ipmi_credential, device })
}

fn load_template(deps: &SharedDeps, device: &DeviceType) -> Result<BiosTemplate, ForgeError> {
    let path = deps.config.device_catalog_dir.join(&device.bios_template_ref);
    let raw = std::fs::read_to_string(&path)
        .map_err(|source| ForgeError::Internal(format!("reading BIOS template {}: {source}", path.display())))?;
    serde_yaml::from_str(&raw).map_err(|source| ForgeError::Internal(format!("parsing BIOS template {}: {source}", path.display())))
}

fn build_redfish(deps: &SharedDeps, inputs: &BiosStepInputs) -> Result<RedfishClient, ForgeError> {
    let bmc_host = inputs
        .bmc_host
        .as_deref()
        .ok_or_else(|| ForgeError::Internal("Dell BIOS adapter needs a discovered BMC address".to_string()))?;
    let ipmi_credential = inputs
        .ipmi_credential
        .as_ref()
        .ok_or_else(|| ForgeError::Internal("Dell BIOS adapter needs an IPMI credential for Redfish auth".to_string()))?;
    RedfishClient::new(RedfishConfig {
        base_url: format!("https://{bmc_host}"),
        username: ipmi_credential.username.clone(),
        password: ipmi_credential.password.clone(),
        tls_verify: deps.config.redfish_tls_verify,
    })
    .map_err(ForgeError::from)
}

async fn pull_live_count(deps: &SharedDeps, inputs: &BiosStepInputs) -> Result<usize, ForgeError> {
    match deps::bmc_vendor_of(&inputs.device) {
        BMCVendor::Supermicro => {
            let adapter = forge_bios::SupermicroAdapter {
                pool: &deps.pool,
                host: inputs.host,
                user: &inputs.ssh_credential.username,
                password: &inputs.ssh_credential.password,
            };
            Ok(adapter.pull().await.map_err(ForgeError::from)?.len())
        }
        BMCVendor::Hpe => {
            let adapter = forge_bios::HpeAdapter {
                pool: &deps.pool,
                host: inputs.host,
                user: &inputs.ssh_credential.username,
                password: &inputs.ssh_credential.password,
            };
            Ok(adapter.pull().await.map_err(ForgeError::from)?.len())
        }
        BMCVendor::Dell => {
            let redfish = build_redfish(deps, inputs)?;
            let adapter = forge_bios::DellAdapter { redfish: &redfish, system_id: "1" };
            Ok(adapter.pull().await.map_err(ForgeError::from)?.len())
        }
        other => Err(ForgeError::Internal(format!("{other} has no BIOS adapter"))),
    }
}

async fn push_template(
    deps: &SharedDeps,
    inputs: &BiosStepInputs,
    template: &BiosTemplate,
    preserve_list: &HashSet<String>,
    dry_run: bool,
) -> Result<BiosResult, ForgeError> {
    match deps::bmc_vendor_of(&inputs.device) {
        BMCVendor::Supermicro => {
            let adapter = forge_bios::SupermicroAdapter {
                pool: &deps.pool,
                host: inputs.host,
                user: &inputs.ssh_credential.username,
                password: &inputs.ssh_credential.password,
            };
            forge_bios::apply_bios(&adapter, template, preserve_list, dry_run).await.map_err(ForgeError::from)
        }
        BMCVendor::Hpe => {
            let adapter = forge_bios::HpeAdapter {
                pool: &deps.pool,
                host: inputs.host,
                user: &inputs.ssh_credential.username,
                password: &inputs.ssh_credential.password,
            };
            forge_bios::apply_bios(&adapter, template, preserve_list, dry_run).await.map_err(ForgeError::from)
        }
        BMCVendor::Dell => {
            let redfish = build_redfish(deps, inputs)?;
            let adapter = forge_bios::DellAdapter { redfish: &redfish, system_id: "1" };
            forge_bios::apply_bios(&adapter, template, preserve_list, dry_run).await.map_err(ForgeError::from)
        }
        other => Err(ForgeError::Internal(format!("{other} has no BIOS adapter"))),
    }
}

pub struct PullBiosStep {
    pub deps: Arc<SharedDeps>,
}

#[async_trait]
impl StepBody for PullBiosStep {
    async fn run(&self, ctx: Arc<Mutex<WorkflowContext>>, reporter: Reporter, _cancel: CancellationToken) -> Result<(), ForgeError> {
        if ctx.lock().await.degraded {
            reporter.substep("pull", StepStatus::Succeeded, "skipped: toolchain is degraded, nothing to pull");
            return Ok(());
        }

        let guard = ctx.lock().await;
        let inputs = resolve_inputs(&self.deps, &guard).await?;
        drop(guard);
        let count = pull_live_count(&self.deps, &inputs).await?;
        reporter.substep("pull", StepStatus::Succeeded, format!("pulled {count} live settings"));
        Ok(())
    }
}

pub struct MergeAndPushBiosStep {
    pub deps: Arc<SharedDeps>,
    pub preserve_list: HashSet<String>,
    pub dry_run: bool,
}

#[async_trait]
impl StepBody for MergeAndPushBiosStep {
    async fn run(&self, ctx: Arc<Mutex<WorkflowContext>>, reporter: Reporter, _cancel: CancellationToken) -> Result<(), ForgeError> {
        if ctx.lock().await.degraded {
            reporter.substep(
                "push",
                StepStatus::Failed,
                "vendor tool unavailable; BIOS was not configured for this host",
            );
            return Err(ForgeError::ToolUnavailable {
                tool: "vendor BIOS tool".to_string(),
                attempts: Vec::<DownloadAttempt>::new(),
                context: ErrorContext::default(),
            });
        }

        let guard = ctx.lock().await;
        let inputs = resolve_inputs(&self.deps, &guard).await?;
        drop(guard);
        let template = load_template(&self.deps, &inputs.device)?;

        let result = push_template(&self.deps, &inputs, &template, &self.preserve_list, self.dry_run).await?;

        match result {
            BiosResult::NoChange => reporter.substep("push", StepStatus::Succeeded, "no change needed"),
            BiosResult::Planned { delta } => {
                reporter.substep("push", StepStatus::Succeeded, format!("dry run: {} settings would change", delta.len()))
            }
            BiosResult::Applied { delta } => reporter.substep("push", StepStatus::Succeeded, format!("applied {} settings", delta.len())),
            BiosResult::Degraded { reason } => reporter.substep("push", StepStatus::Failed, reason),
        }
        Ok(())
    }
}
