//! The on-disk device-type catalog: a directory of YAML documents loaded
//! once at startup, validated fail-fast, and queried by fuzzy match.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use forge_core::DeviceType;

use crate::error::RegistryError;
use crate::matcher::{match_hardware, MatchCandidate};

/// A catalog document: a flat list of [`DeviceType`] entries plus the
/// directory their `bios_template_ref`/`firmware_policy_ref` paths are
/// resolved against.
#[derive(Debug, Clone, serde::Deserialize)]
struct CatalogFile {
    device_types: Vec<DeviceType>,
}

#[derive(Debug, Clone)]
pub struct DeviceCatalog {
    entries: BTreeMap<String, DeviceType>,
}

impl DeviceCatalog {
    /// Loads every `*.yaml`/`*.yml` file directly under `dir`, merges their
    /// `device_types` lists, and checks that every `bios_template_ref` and
    /// `firmware_policy_ref` resolves to an existing file relative to `dir`.
    /// A missing template file is a load-time error, never a runtime
    /// surprise when a workflow reaches the BIOS step.
    pub fn load_dir(dir: impl AsRef<Path>) -> Result<Self, RegistryError> {
        let dir = dir.as_ref();
        let mut entries = BTreeMap::new();

        let mut paths: Vec<PathBuf> = fs::read_dir(dir)
            .map_err(|source| RegistryError::Read {
                path: dir.to_path_buf(),
                source,
            })?
            .filter_map(|entry| entry.ok().map(|e| e.path()))
            .filter(|path| {
                matches!(
                    path.extension().and_then(|ext| ext.to_str()),
                    Some("yaml") | Some("yml")
                )
            })
            .collect();
        paths.sort();

        for path in paths {
            let raw = fs::read_to_string(&path).map_err(|source| RegistryError::Read {
                path: path.clone(),
                source,
            })?;
            let file: CatalogFile = serde_yaml::from_str(&raw).map_err(|source| RegistryError::Parse {
                path: path.clone(),
                source,
            })?;

            for device_type in file.device_types {
                Self::check_template_ref(dir, &device_type.id, &device_type.bios_template_ref)?;
                Self::check_template_ref(dir, &device_type.id, &device_type.firmware_policy_ref)?;
                entries.insert(device_type.id.clone(), device_type);
            }
        }

        Ok(Self { entries })
    }

    fn check_template_ref(dir: &Path, device_type: &str, reference: &str) -> Result<(), RegistryError> {
        let resolved = dir.join(reference);
        if !resolved.is_file() {
            return Err(RegistryError::MissingTemplateRef {
                device_type: device_type.to_string(),
                path: resolved,
            });
        }
        Ok(())
    }

    pub fn get(&self, device_type: &str) -> Option<&DeviceType> {
        self.entries.get(device_type)
    }

    pub fn all(&self) -> impl Iterator<Item = &DeviceType> {
        self.entries.values()
    }

    pub fn match_hardware(&self, hardware: &forge_core::HardwareReport) -> Vec<MatchCandidate> {
        let catalog: Vec<DeviceType> = self.entries.values().cloned().collect();
        match_hardware(&catalog, hardware)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn write_file(dir: &Path, name: &str, contents: &str) -> PathBuf {
        let path = dir.join(name);
        let mut file = fs::File::create(&path).unwrap();
        file.write_all(contents.as_bytes()).unwrap();
        path
    }

    #[test]
    fn loads_catalog_and_validates_template_refs() {
        let tmp = tempfile::tempdir().unwrap();
        write_file(tmp.path(), "bios.yaml", "device_type: s2.c2.large\nsettings: []\n");
        write_file(tmp.path(), "firmware.yaml", "components: []\n");
        write_file(
            tmp.path(),
            "catalog.yaml",
            r#"
device_types:
  - id: s2.c2.large
    vendor: Supermicro
    motherboard: X12SPi-TF
    cpu_sockets: 2
    memory_slots: 16
    storage_bays: 8
    bios_template_ref: bios.yaml
    firmware_policy_ref: firmware.yaml
    detection_hints:
      motherboard: X12SPi-TF
"#,
        );

        let catalog = DeviceCatalog::load_dir(tmp.path()).unwrap();
        assert!(catalog.get("s2.c2.large").is_some());
    }

    #[test]
    fn missing_template_ref_fails_fast_at_load_time() {
        let tmp = tempfile::tempdir().unwrap();
        write_file(
            tmp.path(),
            "catalog.yaml",
            r#"
device_types:
  - id: s2.c2.large
    vendor: Supermicro
    motherboard: X12SPi-TF
    cpu_sockets: 2
    memory_slots: 16
    storage_bays: 8
    bios_template_ref: missing-bios.yaml
    firmware_policy_ref: missing-firmware.yaml
    detection_hints: {}
"#,
        );

        let result = DeviceCatalog::load_dir(tmp.path());
        assert!(matches!(result, Err(RegistryError::MissingTemplateRef { .. })));
    }
}
