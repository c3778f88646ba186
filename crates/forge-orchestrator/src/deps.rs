//! The collaborators every concrete step needs, assembled once by
//! [`crate::facade::Orchestrator`] and shared (via `Arc`) across every
//! workflow it runs.

use std::net::SocketAddr;
use std::sync::Arc;

use forge_core::{ForgeError, WorkflowContext};
use forge_secrets::{Credential, SecretResolver};

use crate::config::AppConfig;

/// `WorkflowContext.file_paths` key the `GetServerIp` step writes the
/// host's SSH address (`ip:port`) under.
pub const SSH_HOST_KEY: &str = "ssh_host";
/// `WorkflowContext.file_paths` key the `DiscoverHardware` step writes
/// the BMC's out-of-band address under, once discovery finds it.
pub const BMC_HOST_KEY: &str = "bmc_host";

pub struct SharedDeps {
    pub config: AppConfig,
    pub pool: forge_ssh::SshPool,
    pub catalog: forge_registry::DeviceCatalog,
    pub firmware_manifest: forge_firmware::FirmwareManifest,
    pub secrets: Arc<dyn SecretResolver>,
    pub maas: Arc<dyn forge_core::MaasClient>,
    pub store: Arc<dyn forge_core::StateStore>,
}

/// `VendorTool::for_vendor` keys off `bmc_vendor::BMCVendor`; the catalog
/// only carries the vendor as a free-form string, so this is the one
/// place that string gets interpreted.
pub fn bmc_vendor_of(device: &forge_core::DeviceType) -> bmc_vendor::BMCVendor {
    bmc_vendor::BMCVendor::from(device.vendor.as_str())
}

pub fn ssh_host(ctx: &WorkflowContext) -> Result<SocketAddr, ForgeError> {
    ctx.file_paths
        .get(SSH_HOST_KEY)
        .and_then(|raw| raw.parse().ok())
        .ok_or_else(|| ForgeError::Internal("workflow context is missing the SSH host".to_string()))
}

pub fn bmc_host(ctx: &WorkflowContext) -> Option<&str> {
    ctx.file_paths.get(BMC_HOST_KEY).map(String::as_str)
}

pub async fn resolve_ssh_credential(deps: &SharedDeps, ctx: &WorkflowContext) -> Result<Credential, ForgeError> {
    let credential_ref = ctx
        .ssh_credential
        .ok_or_else(|| ForgeError::Internal("workflow context is missing an SSH credential".to_string()))?;
    deps.secrets
        .resolve(credential_ref)
        .await
        .map_err(|err| ForgeError::Internal(format!("resolving ssh credential: {err}")))
}

pub async fn resolve_ipmi_credential(deps: &SharedDeps, ctx: &WorkflowContext) -> Result<Credential, ForgeError> {
    let credential_ref = ctx
        .ipmi_credential
        .ok_or_else(|| ForgeError::Internal("workflow context is missing an IPMI credential".to_string()))?;
    deps.secrets
        .resolve(credential_ref)
        .await
        .map_err(|err| ForgeError::Internal(format!("resolving ipmi credential: {err}")))
}
