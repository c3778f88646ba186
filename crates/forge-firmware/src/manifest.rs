//! The firmware manifest: a YAML document listing every known component
//! version for every device type, loaded once and queried per plan.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum UpdateMethod {
    Redfish,
    VendorTool,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ManifestEntry {
    pub device_type: String,
    pub component: String,
    pub version: String,
    pub url: String,
    pub sha256: String,
    pub method: UpdateMethod,
    #[serde(default)]
    pub advisory: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FirmwareManifest {
    pub entries: Vec<ManifestEntry>,
}

impl FirmwareManifest {
    pub fn for_device_type<'a>(&'a self, device_type: &'a str) -> impl Iterator<Item = &'a ManifestEntry> {
        self.entries.iter().filter(move |entry| entry.device_type == device_type)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_manifest_yaml() {
        let yaml = r#"
entries:
  - device_type: s2.c2.large
    component: BMC
    version: "3.2"
    url: https://example.com/bmc-3.2.bin
    sha256: deadbeef
    method: Redfish
    advisory: CVE-2024-0001
"#;
        let manifest: FirmwareManifest = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(manifest.entries.len(), 1);
        assert_eq!(manifest.entries[0].method, UpdateMethod::Redfish);
    }
}
