//! `Update`: one planned firmware change, and `apply_update`: applies it
//! via Redfish or the matching vendor tool, then confirms the resulting
//! component version.

use std::net::SocketAddr;

use crate::error::FirmwareError;
use crate::manifest::{ManifestEntry, UpdateMethod};

#[derive(Debug, Clone, PartialEq)]
pub struct Update {
    pub component: String,
    pub current_version: Option<String>,
    pub target_version: String,
    pub method: UpdateMethod,
    pub artifact_url: String,
    pub checksum: String,
}

impl Update {
    pub fn from_manifest_entry(entry: &ManifestEntry, current_version: Option<&str>) -> Self {
        Self {
            component: entry.component.clone(),
            current_version: current_version.map(str::to_string),
            target_version: entry.version.clone(),
            method: entry.method,
            artifact_url: entry.url.clone(),
            checksum: entry.sha256.clone(),
        }
    }
}

/// Re-reads a component's version after an update has been applied, so
/// [`apply_update`] can confirm it actually stuck — the firmware analog of
/// `forge_bios`'s post-verify pull.
#[async_trait::async_trait]
pub trait VersionReader: Send + Sync {
    async fn read_version(&self, component: &str) -> Result<String, FirmwareError>;
}

/// How `apply_update` reaches the target: a Redfish client for
/// `UpdateMethod::Redfish` (the BMC fetches `artifact_url` itself), or an
/// SSH handle plus the already-installed vendor tool for
/// `UpdateMethod::VendorTool`.
pub enum UpdateTarget<'a> {
    Redfish(&'a forge_bmc::RedfishClient),
    VendorTool {
        pool: &'a forge_ssh::SshPool,
        host: SocketAddr,
        user: &'a str,
        password: &'a str,
        tool: forge_toolchain::VendorTool,
    },
}

const STAGING_PATH: &str = "/tmp/forge-firmware-update.bin";

/// Applies `update` through `target` and confirms the result with
/// `version_reader`. A failed post-apply version check is
/// `FirmwareError::NotApplied`, which the workflow engine treats as
/// non-transient.
pub async fn apply_update(
    update: &Update,
    target: &UpdateTarget<'_>,
    version_reader: &dyn VersionReader,
) -> Result<(), FirmwareError> {
    match target {
        UpdateTarget::Redfish(client) => {
            client.simple_update(&update.artifact_url).await?;
        }
        UpdateTarget::VendorTool { pool, host, user, password, tool } => {
            apply_via_vendor_tool(update, pool, *host, user, password, *tool).await?;
        }
    }

    let observed = version_reader.read_version(&update.component).await?;
    if observed != update.target_version {
        return Err(FirmwareError::NotApplied {
            component: update.component.clone(),
            expected: update.target_version.clone(),
            got: observed,
        });
    }
    Ok(())
}

/// Downloads the artifact onto the target host, verifies its checksum
/// remotely, then hands it to the vendor tool — the same curl/validate
/// shape `forge_toolchain::ToolInstaller` uses for the tool binaries
/// themselves.
async fn apply_via_vendor_tool(
    update: &Update,
    pool: &forge_ssh::SshPool,
    host: SocketAddr,
    user: &str,
    password: &str,
    tool: forge_toolchain::VendorTool,
) -> Result<(), FirmwareError> {
    let download_cmd = format!(
        "curl -fsSL -o {STAGING_PATH} '{}' && echo '{}  {STAGING_PATH}' | sha256sum -c -",
        update.artifact_url, update.checksum
    );
    exec_checked(pool, host, user, password, &download_cmd).await?;

    let apply_cmd = format!("{} --update_firmware {STAGING_PATH}", tool.binary_name());
    exec_checked(pool, host, user, password, &apply_cmd).await?;
    Ok(())
}

async fn exec_checked(
    pool: &forge_ssh::SshPool,
    host: SocketAddr,
    user: &str,
    password: &str,
    cmd: &str,
) -> Result<forge_ssh::CommandResult, FirmwareError> {
    let result = pool.exec(host, user, password, cmd, None).await?;
    if result.exit_status != 0 {
        return Err(FirmwareError::Ssh(forge_ssh::SshError::RemoteNonZero {
            host: host.to_string(),
            cmd: cmd.to_string(),
            exit_status: result.exit_status,
            stderr: result.stderr,
        }));
    }
    Ok(result)
}
