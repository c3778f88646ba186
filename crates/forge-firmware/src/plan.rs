//! `PlanUpdates`: compares discovered component versions against the
//! manifest and orders the result by dependency priority (BMC first,
//! then BIOS, then NICs/storage, then everything else).

use forge_core::HardwareReport;

use crate::manifest::{FirmwareManifest, ManifestEntry};
use crate::policy::UpdatePolicy;
use crate::update::Update;

fn priority(component: &str) -> u8 {
    let lower = component.to_lowercase();
    if lower.contains("bmc") || lower.contains("ilo") || lower.contains("idrac") {
        0
    } else if lower.contains("bios") {
        1
    } else if lower.contains("nic") || lower.contains("storage") || lower.contains("raid") {
        2
    } else {
        3
    }
}

/// Compares `hardware`'s discovered versions against `manifest` entries
/// for `device_type`, keeping only components the policy allows and whose
/// manifest version differs from what was discovered, then orders the
/// result by dependency priority. Ties within a priority tier keep
/// manifest order, so a deterministic, human-authored ordering survives.
pub fn plan_updates(
    hardware: &HardwareReport,
    device_type: &str,
    manifest: &FirmwareManifest,
    policy: UpdatePolicy,
) -> Vec<Update> {
    let mut updates: Vec<Update> = manifest
        .for_device_type(device_type)
        .filter(|entry| policy.allows(entry))
        .filter(|entry| current_version(hardware, entry) != Some(entry.version.as_str()))
        .map(|entry| Update::from_manifest_entry(entry, current_version(hardware, entry)))
        .collect();

    updates.sort_by_key(|update| priority(&update.component));
    updates
}

fn current_version<'a>(hardware: &'a HardwareReport, entry: &ManifestEntry) -> Option<&'a str> {
    let lower = entry.component.to_lowercase();
    if lower.contains("bmc") {
        hardware.ipmi.as_ref().map(|_| hardware.system.bios_version.as_str())
    } else if lower.contains("bios") {
        Some(hardware.system.bios_version.as_str())
    } else {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::manifest::UpdateMethod;
    use forge_core::SystemInfo;

    fn manifest_entry(component: &str, version: &str) -> ManifestEntry {
        ManifestEntry {
            device_type: "s2.c2.large".to_string(),
            component: component.to_string(),
            version: version.to_string(),
            url: format!("https://example.com/{component}.bin"),
            sha256: "deadbeef".to_string(),
            method: UpdateMethod::Redfish,
            advisory: None,
        }
    }

    #[test]
    fn orders_bmc_before_bios_before_others() {
        let manifest = FirmwareManifest {
            entries: vec![
                manifest_entry("NicFirmware", "2.0"),
                manifest_entry("Bios", "3.0"),
                manifest_entry("Bmc", "1.5"),
            ],
        };
        let hardware = HardwareReport {
            system: SystemInfo {
                bios_version: "1.0".to_string(),
                ..Default::default()
            },
            ..Default::default()
        };

        let updates = plan_updates(&hardware, "s2.c2.large", &manifest, UpdatePolicy::Latest);
        assert_eq!(updates[0].component, "Bmc");
        assert_eq!(updates[1].component, "Bios");
        assert_eq!(updates[2].component, "NicFirmware");
    }

    #[test]
    fn skips_components_already_at_the_manifest_version() {
        let manifest = FirmwareManifest {
            entries: vec![manifest_entry("Bios", "1.0")],
        };
        let hardware = HardwareReport {
            system: SystemInfo {
                bios_version: "1.0".to_string(),
                ..Default::default()
            },
            ..Default::default()
        };
        let updates = plan_updates(&hardware, "s2.c2.large", &manifest, UpdatePolicy::Latest);
        assert!(updates.is_empty());
    }
}
