//! `ProvisionOptions`: the per-call overrides `StartProvision` accepts on
//! top of the device-type catalog and `AppConfig` defaults.

use std::collections::BTreeSet;
use std::net::IpAddr;

use forge_core::WorkflowKind;
use forge_firmware::UpdatePolicy;
use forge_secrets::CredentialRef;

/// Caller-supplied parameters for one `StartProvision` call. `ssh_credential`
/// is the only required field; everything else either has a sensible
/// default or is resolved from discovery/the catalog once the workflow is
/// running.
#[derive(Debug, Clone)]
pub struct ProvisionOptions {
    pub kind: WorkflowKind,
    /// Operator override for the device type DiscoverHardware would
    /// otherwise infer from the registry match. Bypasses the confidence
    /// threshold entirely.
    pub device_type: Option<String>,
    pub ipmi_ip: Option<IpAddr>,
    pub ssh_credential: CredentialRef,
    pub ipmi_credential: Option<CredentialRef>,
    pub dry_run_bios: bool,
    pub preserve_list: BTreeSet<String>,
    /// `None` defers to `kind`/`AppConfig` for whether `FirmwareUpdates`
    /// runs at all; `Some` both forces it on and picks the policy.
    pub firmware_policy: Option<UpdatePolicy>,
    /// If set, `ConfigureIpmi` rotates the BMC admin password to this
    /// value and stores the new credential via `SecretResolver::store`.
    pub new_ipmi_password: Option<String>,
    /// Fail immediately with `EndpointBusy` instead of waiting when
    /// another workflow already owns this machine's endpoint.
    pub require_exclusive: bool,
}

impl ProvisionOptions {
    pub fn new(ssh_credential: CredentialRef) -> Self {
        Self {
            kind: WorkflowKind::Commission,
            device_type: None,
            ipmi_ip: None,
            ssh_credential,
            ipmi_credential: None,
            dry_run_bios: false,
            preserve_list: BTreeSet::new(),
            firmware_policy: None,
            new_ipmi_password: None,
            require_exclusive: false,
        }
    }

    pub fn with_kind(mut self, kind: WorkflowKind) -> Self {
        self.kind = kind;
        self
    }
}
