//! `build_step_specs`: assembles the ordered `StepSpec` list for one
//! `ProvisionOptions.kind`.
//!
//! The four `WorkflowKind`s each need a different subset of the standard
//! eight-step provisioning pipeline (`Commission → GetServerIp →
//! DiscoverHardware → InstallVendorTools → PullBios → MergeAndPushBios →
//! [FirmwareUpdates] → ConfigureIpmi → Finalize`); which steps apply is
//! fully known from `options.kind`/`options.firmware_policy` before the
//! workflow starts, so the list is built statically here rather than via
//! `StepSpec::skip_when` — that hook stays available for a future
//! condition that genuinely can't be known until a step has already run.

use std::sync::Arc;

use forge_core::{MachineId, WorkflowKind};
use forge_firmware::UpdatePolicy;
use forge_workflow::{StepSpec, FIRMWARE_STEP_TIMEOUT};

use crate::deps::SharedDeps;
use crate::options::ProvisionOptions;
use crate::steps::{bios, commission, discover, finalize, firmware, get_ip, install_tools, ipmi};

pub fn build_step_specs(machine_id: MachineId, options: &ProvisionOptions, deps: Arc<SharedDeps>) -> Vec<StepSpec> {
    match options.kind {
        WorkflowKind::Commission => {
            let mut specs = vec![
                commission_spec(machine_id.clone(), deps.clone()),
                get_ip_spec(machine_id.clone(), deps.clone()),
                discover_spec(machine_id.clone(), deps.clone(), options.device_type.clone()),
                install_tools_spec(machine_id.clone(), deps.clone()),
                pull_bios_spec(deps.clone()),
                merge_push_bios_spec(deps.clone(), options),
            ];
            if let Some(policy) = options.firmware_policy {
                specs.push(firmware_spec(machine_id.clone(), deps.clone(), policy));
            }
            specs.push(ipmi_spec(machine_id.clone(), deps.clone(), options));
            specs.push(finalize_spec(machine_id));
            specs
        }
        WorkflowKind::BiosOnly => vec![
            get_ip_spec(machine_id.clone(), deps.clone()),
            discover_spec(machine_id.clone(), deps.clone(), options.device_type.clone()),
            install_tools_spec(machine_id.clone(), deps.clone()),
            pull_bios_spec(deps.clone()),
            merge_push_bios_spec(deps.clone(), options),
            finalize_spec(machine_id),
        ],
        WorkflowKind::FirmwareFirst => {
            let policy = options.firmware_policy.unwrap_or(deps.config.firmware_policy);
            vec![
                get_ip_spec(machine_id.clone(), deps.clone()),
                discover_spec(machine_id.clone(), deps.clone(), options.device_type.clone()),
                install_tools_spec(machine_id.clone(), deps.clone()),
                firmware_spec(machine_id.clone(), deps.clone(), policy),
                pull_bios_spec(deps.clone()),
                merge_push_bios_spec(deps.clone(), options),
                finalize_spec(machine_id),
            ]
        }
        WorkflowKind::IpmiOnly => vec![ipmi_spec(machine_id.clone(), deps, options), finalize_spec(machine_id)],
    }
}

fn commission_spec(machine_id: MachineId, deps: Arc<SharedDeps>) -> StepSpec {
    StepSpec::new(
        "Commission",
        "hand the machine to MaaS and accept the commissioning request",
        Arc::new(commission::CommissionStep { machine_id, deps }),
    )
    .with_max_retries(3)
}

fn get_ip_spec(machine_id: MachineId, deps: Arc<SharedDeps>) -> StepSpec {
    StepSpec::new(
        "GetServerIp",
        "poll MaaS for the commissioned host's IP",
        Arc::new(get_ip::GetServerIpStep { machine_id, deps }),
    )
    .with_max_retries(5)
}

fn discover_spec(machine_id: MachineId, deps: Arc<SharedDeps>, device_type_override: Option<String>) -> StepSpec {
    StepSpec::new(
        "DiscoverHardware",
        "probe the host over SSH and resolve its device type",
        Arc::new(discover::DiscoverHardwareStep { machine_id, deps, device_type_override }),
    )
    .with_max_retries(2)
}

fn install_tools_spec(machine_id: MachineId, deps: Arc<SharedDeps>) -> StepSpec {
    StepSpec::new(
        "InstallVendorTools",
        "install the vendor CLI the BIOS/firmware steps need",
        Arc::new(install_tools::InstallVendorToolsStep { machine_id, deps }),
    )
}

fn pull_bios_spec(deps: Arc<SharedDeps>) -> StepSpec {
    StepSpec::new("PullBios", "pull the host's live BIOS settings", Arc::new(bios::PullBiosStep { deps }))
}

fn merge_push_bios_spec(deps: Arc<SharedDeps>, options: &ProvisionOptions) -> StepSpec {
    StepSpec::new(
        "MergeAndPushBios",
        "merge the device template against the live pull and push the delta",
        Arc::new(bios::MergeAndPushBiosStep {
            deps,
            preserve_list: options.preserve_list.iter().cloned().collect(),
            dry_run: options.dry_run_bios,
        }),
    )
    .non_critical()
}

fn firmware_spec(machine_id: MachineId, deps: Arc<SharedDeps>, policy: UpdatePolicy) -> StepSpec {
    StepSpec::new(
        "FirmwareUpdates",
        "plan and apply pending firmware updates",
        Arc::new(firmware::FirmwareUpdatesStep { machine_id, deps, policy }),
    )
    .with_timeout(FIRMWARE_STEP_TIMEOUT)
    .with_max_retries(1)
}

fn ipmi_spec(machine_id: MachineId, deps: Arc<SharedDeps>, options: &ProvisionOptions) -> StepSpec {
    StepSpec::new(
        "ConfigureIpmi",
        "confirm BMC reachability and optionally rotate its admin password",
        Arc::new(ipmi::ConfigureIpmiStep { machine_id, deps, new_password: options.new_ipmi_password.clone() }),
    )
    .with_max_retries(2)
}

fn finalize_spec(machine_id: MachineId) -> StepSpec {
    StepSpec::new("Finalize", "record provisioning as complete", Arc::new(finalize::FinalizeStep { machine_id }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use forge_registry::DeviceCatalog;
    use forge_secrets::{CredentialRef, InMemorySecretResolver};
    use std::sync::Arc as StdArc;

    fn deps_for_test() -> Arc<SharedDeps> {
        let tmp = tempfile::tempdir().unwrap();
        std::fs::write(tmp.path().join("catalog.yaml"), "device_types: []\n").unwrap();
        let catalog = DeviceCatalog::load_dir(tmp.path()).unwrap();

        let config = crate::config::AppConfig {
            max_concurrent_workflows: 16,
            ssh_user: "root".to_string(),
            ssh_default_timeout: std::time::Duration::from_secs(60),
            redfish_tls_verify: true,
            bios_dry_run: false,
            firmware_policy: UpdatePolicy::Recommended,
            tool_policy: forge_toolchain::ToolPolicy::DegradeToDummy,
            device_catalog_dir: tmp.path().to_path_buf(),
            firmware_manifest_path: tmp.path().join("firmware.yaml"),
            tool_mirrors: Default::default(),
            progress_bus_capacity: 64,
            min_match_confidence: 0.5,
        };

        StdArc::new(SharedDeps {
            config,
            pool: forge_ssh::SshPool::new(),
            catalog,
            firmware_manifest: forge_firmware::FirmwareManifest::default(),
            secrets: StdArc::new(InMemorySecretResolver::new()),
            maas: StdArc::new(forge_core::traits::MockMaasClient::new()),
            store: StdArc::new(forge_core::InMemoryStateStore::new()),
        })
    }

    #[test]
    fn commission_kind_omits_firmware_without_a_policy() {
        let deps = deps_for_test();
        let options = ProvisionOptions::new(CredentialRef::new());
        let specs = build_step_specs(MachineId::new("abc"), &options, deps);
        let names: Vec<&str> = specs.iter().map(|s| s.name.as_str()).collect();
        assert_eq!(
            names,
            vec!["Commission", "GetServerIp", "DiscoverHardware", "InstallVendorTools", "PullBios", "MergeAndPushBios", "ConfigureIpmi", "Finalize"]
        );
    }

    #[test]
    fn commission_kind_includes_firmware_when_a_policy_is_requested() {
        let deps = deps_for_test();
        let mut options = ProvisionOptions::new(CredentialRef::new());
        options.firmware_policy = Some(UpdatePolicy::Latest);
        let specs = build_step_specs(MachineId::new("abc"), &options, deps);
        assert!(specs.iter().any(|s| s.name == "FirmwareUpdates"));
    }

    #[test]
    fn ipmi_only_kind_is_a_two_step_workflow() {
        let deps = deps_for_test();
        let options = ProvisionOptions::new(CredentialRef::new()).with_kind(WorkflowKind::IpmiOnly);
        let specs = build_step_specs(MachineId::new("abc"), &options, deps);
        let names: Vec<&str> = specs.iter().map(|s| s.name.as_str()).collect();
        assert_eq!(names, vec!["ConfigureIpmi", "Finalize"]);
    }

    #[test]
    fn merge_and_push_bios_is_non_critical() {
        let deps = deps_for_test();
        let options = ProvisionOptions::new(CredentialRef::new());
        let specs = build_step_specs(MachineId::new("abc"), &options, deps);
        let push = specs.iter().find(|s| s.name == "MergeAndPushBios").unwrap();
        assert!(!push.critical);
    }
}
