//! `AppConfig`: the single explicit configuration object threaded into
//! every constructor this crate builds, replacing ambient globals with
//! values loaded once at startup from a TOML file plus `FORGE_`-prefixed
//! environment overrides.

use std::collections::BTreeMap;
use std::path::PathBuf;
use std::time::Duration;

use figment::providers::{Env, Format, Serialized, Toml};
use figment::Figment;
use forge_toolchain::ToolPolicy;
use serde::{Deserialize, Serialize};
use url::Url;

use crate::error::OrchestratorError;

fn default_max_concurrent_workflows() -> usize {
    16
}

fn default_ssh_user() -> String {
    "root".to_string()
}

fn default_ssh_timeout() -> Duration {
    Duration::from_secs(60)
}

fn default_progress_bus_capacity() -> usize {
    256
}

fn default_tool_policy() -> ToolPolicy {
    ToolPolicy::DegradeToDummy
}

fn default_redfish_tls_verify() -> bool {
    true
}

fn default_firmware_policy() -> forge_firmware::UpdatePolicy {
    forge_firmware::UpdatePolicy::Recommended
}

/// Below this confidence, `DiscoverHardware` will not auto-select a
/// device type; the workflow fails rather than guess, per the open
/// question on confidence thresholds (see `DESIGN.md`).
fn default_min_match_confidence() -> f64 {
    0.5
}

/// Thread this into every adapter/pipeline constructor rather than
/// reaching for a process-wide singleton; the SSH pool and progress bus
/// are the only values this crate still shares across workflows, and
/// both are handed out explicitly by [`crate::facade::Orchestrator`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    #[serde(default = "default_max_concurrent_workflows")]
    pub max_concurrent_workflows: usize,

    #[serde(default = "default_ssh_user")]
    pub ssh_user: String,

    #[serde(default = "default_ssh_timeout", with = "humantime_serde")]
    pub ssh_default_timeout: Duration,

    #[serde(default = "default_redfish_tls_verify")]
    pub redfish_tls_verify: bool,

    #[serde(default)]
    pub bios_dry_run: bool,

    #[serde(default = "default_firmware_policy")]
    pub firmware_policy: forge_firmware::UpdatePolicy,

    #[serde(default = "default_tool_policy")]
    pub tool_policy: ToolPolicy,

    pub device_catalog_dir: PathBuf,

    pub firmware_manifest_path: PathBuf,

    /// Download mirrors per vendor binary, consumed by
    /// `forge_toolchain::ToolInstaller::ensure_installed`.
    #[serde(default)]
    pub tool_mirrors: BTreeMap<String, Vec<String>>,

    #[serde(default = "default_progress_bus_capacity")]
    pub progress_bus_capacity: usize,

    #[serde(default = "default_min_match_confidence")]
    pub min_match_confidence: f64,
}

impl AppConfig {
    /// Loads defaults, then `path` (if it exists), then `FORGE_`-prefixed
    /// environment variables, in that precedence order.
    pub fn load(path: Option<&std::path::Path>) -> Result<Self, OrchestratorError> {
        let mut figment = Figment::new().merge(Serialized::defaults(Self::skeleton()));
        if let Some(path) = path {
            figment = figment.merge(Toml::file(path));
        }
        figment = figment.merge(Env::prefixed("FORGE_").split("__"));
        figment
            .extract()
            .map_err(|source| OrchestratorError::Config { source })
    }

    /// A value satisfying every `#[serde(default = ...)]` field, used
    /// only as the figment's base layer; `device_catalog_dir` and
    /// `firmware_manifest_path` still have to come from the file or
    /// environment, or extraction fails with a clear missing-field error.
    fn skeleton() -> serde_json::Value {
        serde_json::json!({
            "max_concurrent_workflows": default_max_concurrent_workflows(),
            "ssh_user": default_ssh_user(),
            "redfish_tls_verify": default_redfish_tls_verify(),
            "bios_dry_run": false,
            "tool_policy": "DegradeToDummy",
            "progress_bus_capacity": default_progress_bus_capacity(),
            "min_match_confidence": default_min_match_confidence(),
        })
    }

    pub fn tool_mirror_urls(&self, tool: forge_toolchain::VendorTool) -> Vec<Url> {
        self.tool_mirrors
            .get(tool.binary_name())
            .into_iter()
            .flatten()
            .filter_map(|raw| Url::parse(raw).ok())
            .collect()
    }
}
