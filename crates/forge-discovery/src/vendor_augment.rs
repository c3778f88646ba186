//! Vendor-specific enrichment run after base discovery: a
//! manufacturer-dispatched set of extra commands whose failures are always
//! non-fatal warnings, never escalated — unlike the base command set and
//! IPMI probe in [`crate::discovery`].

use std::collections::BTreeMap;

use bmc_vendor::BMCVendor;
use forge_core::SystemInfo;

use crate::discovery::Discoverer;
use crate::error::DiscoveryError;

fn enrichment_commands(vendor: BMCVendor) -> Vec<(&'static str, &'static str)> {
    match vendor {
        BMCVendor::Supermicro => vec![("bios_info", "sumtool --show_bios_info")],
        BMCVendor::Hpe => vec![("storage_info", "ssacli ctrl all show")],
        BMCVendor::Dell => vec![("storage_info", "racadm get storage.controller")],
        BMCVendor::Lenovo | BMCVendor::Nvidia | BMCVendor::Liteon | BMCVendor::Unknown => Vec::new(),
    }
}

pub(crate) async fn augment(
    discoverer: &Discoverer<'_>,
    system: &SystemInfo,
    warnings: &mut Vec<String>,
) -> Result<BTreeMap<String, String>, DiscoveryError> {
    let vendor = BMCVendor::from_udev_dmi(&system.manufacturer);
    let mut extras = BTreeMap::new();

    for (key, cmd) in enrichment_commands(vendor) {
        match discoverer.exec(cmd).await {
            Ok(result) if result.exit_status == 0 => {
                extras.insert(key.to_string(), result.stdout.trim().to_string());
            }
            Ok(result) => warnings.push(format!(
                "vendor enrichment `{cmd}` exited {}: {}",
                result.exit_status,
                result.stderr.trim()
            )),
            Err(err) => warnings.push(format!("vendor enrichment `{cmd}` failed: {err}")),
        }
    }

    Ok(extras)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn supermicro_gets_bios_info_enrichment() {
        let commands = enrichment_commands(BMCVendor::Supermicro);
        assert_eq!(commands, vec![("bios_info", "sumtool --show_bios_info")]);
    }

    #[test]
    fn unknown_vendor_gets_no_enrichment() {
        assert!(enrichment_commands(BMCVendor::Unknown).is_empty());
    }
}
