//! Fuzzy `HardwareReport -> DeviceType` matching. The rule order and
//! confidence values are fixed; the mapping from `HardwareReport` fields
//! onto each rule's inputs is an implementation choice, recorded in
//! `DESIGN.md`.

use forge_core::{DeviceType, HardwareReport};

#[derive(Debug, Clone, PartialEq)]
pub struct MatchCandidate {
    pub device_type: String,
    pub confidence: f64,
}

const MEMORY_TIER_BYTES: u64 = 64 * 1024 * 1024 * 1024;

fn memory_tier(total_bytes: u64) -> u64 {
    total_bytes / MEMORY_TIER_BYTES
}

/// Returns every candidate with a nonzero confidence, in descending
/// confidence order, with the tie-break applied: prefer a matching
/// `storage_bays` count (approximated here as the discovered storage
/// controller count — see `DESIGN.md`), else lexicographic `device_type`.
pub fn match_hardware(catalog: &[DeviceType], hardware: &HardwareReport) -> Vec<MatchCandidate> {
    let mut candidates: Vec<MatchCandidate> = catalog
        .iter()
        .filter_map(|entry| confidence_for(entry, hardware).map(|confidence| MatchCandidate {
            device_type: entry.id.clone(),
            confidence,
        }))
        .collect();

    let discovered_bays = hardware.storage_controllers.len() as u32;
    candidates.sort_by(|a, b| {
        b.confidence
            .partial_cmp(&a.confidence)
            .unwrap_or(std::cmp::Ordering::Equal)
            .then_with(|| {
                let a_entry = catalog.iter().find(|e| e.id == a.device_type);
                let b_entry = catalog.iter().find(|e| e.id == b.device_type);
                let a_bay_match = a_entry.is_some_and(|e| e.storage_bays == discovered_bays);
                let b_bay_match = b_entry.is_some_and(|e| e.storage_bays == discovered_bays);
                b_bay_match.cmp(&a_bay_match)
            })
            .then_with(|| a.device_type.cmp(&b.device_type))
    });

    candidates
}

fn confidence_for(entry: &DeviceType, hardware: &HardwareReport) -> Option<f64> {
    let hints = &entry.detection_hints;

    // Rule 1: exact motherboard string match.
    if let Some(motherboard) = &hints.motherboard {
        if !motherboard.is_empty() && motherboard == &hardware.system.product {
            return Some(1.0);
        }
    }

    let cpu_family_matches = hints
        .cpu_family
        .as_ref()
        .is_some_and(|family| !family.is_empty() && hardware.cpu.model.contains(family.as_str()));

    // Rule 2: motherboard family (prefix) + CPU family match.
    if let Some(family) = &hints.motherboard_family {
        if !family.is_empty()
            && hardware.system.product.starts_with(family.as_str())
            && cpu_family_matches
        {
            return Some(0.8);
        }
    }

    // Rule 3: CPU family + memory tier + socket count.
    let memory_tier_matches = hints
        .memory_tier_bytes
        .is_some_and(|tier_bytes| memory_tier(tier_bytes) == memory_tier(hardware.memory.total_bytes));
    let sockets_match = entry.cpu_sockets == hardware.cpu.sockets;
    if cpu_family_matches && memory_tier_matches && sockets_match {
        return Some(0.6);
    }

    // Rule 4: manufacturer-only.
    if let Some(manufacturer) = &hints.manufacturer {
        if !manufacturer.is_empty()
            && manufacturer.eq_ignore_ascii_case(&hardware.system.manufacturer)
        {
            return Some(0.3);
        }
    }

    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use forge_core::{CpuInfo, DetectionHints, MemoryInfo, SystemInfo};

    fn hardware(manufacturer: &str, product: &str, cpu_model: &str, sockets: u32, total_bytes: u64) -> HardwareReport {
        HardwareReport {
            system: SystemInfo {
                manufacturer: manufacturer.into(),
                product: product.into(),
                ..Default::default()
            },
            cpu: CpuInfo {
                model: cpu_model.into(),
                sockets,
                cores_total: sockets * 16,
            },
            memory: MemoryInfo {
                total_bytes,
                dimms: vec![],
            },
            ..Default::default()
        }
    }

    fn device(id: &str, hints: DetectionHints) -> DeviceType {
        DeviceType {
            id: id.into(),
            vendor: "Supermicro".into(),
            motherboard: "X12SPi-TF".into(),
            cpu_sockets: 2,
            memory_slots: 16,
            storage_bays: 8,
            bios_template_ref: "x.yaml".into(),
            firmware_policy_ref: "x.yaml".into(),
            detection_hints: hints,
        }
    }

    #[test]
    fn exact_motherboard_match_wins_with_full_confidence() {
        let catalog = vec![device(
            "s2.c2.large",
            DetectionHints {
                motherboard: Some("X12SPi-TF".into()),
                ..Default::default()
            },
        )];
        let hw = hardware("Supermicro", "X12SPi-TF", "Xeon Gold 6348", 2, 256 * 1024 * 1024 * 1024);
        let matches = match_hardware(&catalog, &hw);
        assert_eq!(matches[0].confidence, 1.0);
    }

    #[test]
    fn manufacturer_only_is_the_lowest_confidence_tier() {
        let catalog = vec![device(
            "generic.supermicro",
            DetectionHints {
                manufacturer: Some("Supermicro".into()),
                ..Default::default()
            },
        )];
        let hw = hardware("Supermicro", "Unknown-Board", "Some CPU", 1, 32 * 1024 * 1024 * 1024);
        let matches = match_hardware(&catalog, &hw);
        assert_eq!(matches[0].confidence, 0.3);
    }

    #[test]
    fn no_matching_rule_yields_no_candidate() {
        let catalog = vec![device(
            "s2.c2.large",
            DetectionHints {
                manufacturer: Some("Dell".into()),
                ..Default::default()
            },
        )];
        let hw = hardware("Supermicro", "X12SPi-TF", "Xeon Gold 6348", 2, 256 * 1024 * 1024 * 1024);
        assert!(match_hardware(&catalog, &hw).is_empty());
    }

    #[test]
    fn match_is_deterministic_under_fixed_input() {
        let catalog = vec![
            device("b.device", DetectionHints { manufacturer: Some("Supermicro".into()), ..Default::default() }),
            device("a.device", DetectionHints { manufacturer: Some("Supermicro".into()), ..Default::default() }),
        ];
        let hw = hardware("Supermicro", "X", "Y", 1, 1);
        let first = match_hardware(&catalog, &hw);
        let second = match_hardware(&catalog, &hw);
        assert_eq!(first, second);
        // Lexicographic tie-break since neither has a matching storage_bays count.
        assert_eq!(first[0].device_type, "a.device");
    }
}
