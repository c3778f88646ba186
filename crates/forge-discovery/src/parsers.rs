//! Defensive parsers over a fixed, ordered set of commands (`dmidecode`,
//! `ip`, `/proc/cpuinfo`, `/proc/meminfo`). Every parser treats a missing
//! field as an empty default, never an error: discovery is best-effort.

use std::collections::{BTreeMap, HashSet};

use forge_core::{CpuInfo, MemoryInfo, NicInfo, SystemInfo};
use regex::Regex;

/// Parses the `Keyword: Value` block `dmidecode -t system` emits.
pub fn parse_dmidecode_system(stdout: &str) -> SystemInfo {
    let fields = colon_fields(stdout);
    SystemInfo {
        manufacturer: fields.get("Manufacturer").cloned().unwrap_or_default(),
        product: fields.get("Product Name").cloned().unwrap_or_default(),
        serial: fields.get("Serial Number").cloned().unwrap_or_default(),
        uuid: fields.get("UUID").cloned().unwrap_or_default(),
        bios_version: String::new(),
        bios_date: String::new(),
    }
}

/// Parses `dmidecode -t bios` and fills in the two fields
/// [`parse_dmidecode_system`] leaves blank.
pub fn apply_dmidecode_bios(system: &mut SystemInfo, stdout: &str) {
    let fields = colon_fields(stdout);
    if let Some(version) = fields.get("Version") {
        system.bios_version = version.clone();
    }
    if let Some(date) = fields.get("Release Date") {
        system.bios_date = date.clone();
    }
}

/// `dmidecode -t memory`: one DIMM entry per non-empty `Locator`/`Size`
/// pair where the module is actually populated.
pub fn parse_dmidecode_memory_dimms(stdout: &str) -> Vec<String> {
    let mut dimms = Vec::new();
    let mut locator: Option<String> = None;
    let mut size: Option<String> = None;

    for line in stdout.lines() {
        let line = line.trim();
        if let Some(value) = line.strip_prefix("Locator:") {
            locator = Some(value.trim().to_string());
        } else if let Some(value) = line.strip_prefix("Size:") {
            size = Some(value.trim().to_string());
        } else if line.is_empty() {
            if let (Some(loc), Some(sz)) = (locator.take(), size.take()) {
                if sz != "No Module Installed" {
                    dimms.push(format!("{loc}: {sz}"));
                }
            }
        }
    }
    dimms
}

/// `/proc/cpuinfo`: socket count is the number of distinct `physical id`
/// values; total cores is the number of `processor` entries.
pub fn parse_proc_cpuinfo(stdout: &str) -> CpuInfo {
    let pattern = colon_pattern();
    let mut model = String::new();
    let mut physical_ids = HashSet::new();
    let mut processor_count = 0u32;

    for line in stdout.lines() {
        if let Some(caps) = pattern.captures(line) {
            let key = caps[1].trim();
            let value = caps[2].trim();
            match key {
                "model name" if model.is_empty() => model = value.to_string(),
                "physical id" => {
                    physical_ids.insert(value.to_string());
                }
                "processor" => processor_count += 1,
                _ => {}
            }
        }
    }

    CpuInfo {
        model,
        sockets: physical_ids.len().max(1) as u32,
        cores_total: processor_count,
    }
}

/// `/proc/meminfo`: `MemTotal` is reported in kB.
pub fn parse_proc_meminfo(stdout: &str) -> MemoryInfo {
    let fields = colon_fields(stdout);
    let total_bytes = fields
        .get("MemTotal")
        .and_then(|value| value.split_whitespace().next())
        .and_then(|kb| kb.parse::<u64>().ok())
        .map(|kb| kb * 1024)
        .unwrap_or(0);

    MemoryInfo {
        total_bytes,
        dimms: Vec::new(),
    }
}

/// `ip -o addr show` (the `-o` one-line-per-address form keeps this a
/// simple per-line parse): interface name, inet address, and link state.
/// MACs come from a separate `ip -o link show` pass since `addr show`
/// does not report them per-address.
pub fn parse_ip_addr(addr_stdout: &str, link_stdout: &str) -> Vec<NicInfo> {
    let macs = parse_ip_link_macs(link_stdout);
    let mut nics: BTreeMap<String, NicInfo> = BTreeMap::new();

    for line in addr_stdout.lines() {
        let fields: Vec<&str> = line.split_whitespace().collect();
        if fields.len() < 4 || fields[2] != "inet" {
            continue;
        }
        let name = fields[1].trim_end_matches(':').to_string();
        let ip = fields[3].split('/').next().unwrap_or_default().to_string();
        let entry = nics.entry(name.clone()).or_insert_with(|| NicInfo {
            name: name.clone(),
            mac: macs.get(&name).cloned().unwrap_or_default(),
            ip: String::new(),
            state: String::new(),
        });
        entry.ip = ip;
    }

    for (name, mac) in &macs {
        nics.entry(name.clone()).or_insert_with(|| NicInfo {
            name: name.clone(),
            mac: mac.clone(),
            ip: String::new(),
            state: String::new(),
        });
    }

    for line in link_stdout.lines() {
        let fields: Vec<&str> = line.split_whitespace().collect();
        if fields.len() < 3 {
            continue;
        }
        let name = fields[1].trim_end_matches(':').to_string();
        if let Some(nic) = nics.get_mut(&name) {
            if line.contains("state UP") {
                nic.state = "UP".to_string();
            } else if line.contains("state DOWN") {
                nic.state = "DOWN".to_string();
            }
        }
    }

    nics.into_values().filter(|nic| nic.name != "lo").collect()
}

fn parse_ip_link_macs(link_stdout: &str) -> BTreeMap<String, String> {
    let mut macs = BTreeMap::new();
    let mut current_name: Option<String> = None;
    for line in link_stdout.lines() {
        let trimmed = line.trim_start();
        if !line.starts_with(' ') && !line.starts_with('\t') {
            let fields: Vec<&str> = trimmed.split_whitespace().collect();
            if fields.len() >= 2 {
                current_name = Some(fields[1].trim_end_matches(':').to_string());
            }
        } else if let Some(name) = &current_name {
            if let Some(rest) = trimmed.strip_prefix("link/ether ") {
                if let Some(mac) = rest.split_whitespace().next() {
                    macs.insert(name.clone(), mac.to_string());
                }
            }
        }
    }
    macs
}

/// `ipmitool lan print <channel>`, parsed the same `Key : Value` way as
/// the other `dmidecode`/`/proc` blocks.
pub fn parse_lan_print(stdout: &str) -> BTreeMap<String, String> {
    colon_fields(stdout)
}

/// The `Key:␣Value` shape every `dmidecode`/`/proc`/`ipmitool lan print`
/// block shares, captured the same way the teacher's `flint` query parser
/// pulls `Field:␣Value` pairs out of tool output — one `Regex` per field
/// rather than hand-rolled splitting.
fn colon_pattern() -> Regex {
    Regex::new(r"^\s*([^:]+?)\s*:\s*(.*?)\s*$").expect("static colon-field pattern")
}

/// Shared helper: turns a `Key: Value` or `Key:  Value` block into a map,
/// keeping only the first occurrence of each key and skipping blank lines.
fn colon_fields(stdout: &str) -> BTreeMap<String, String> {
    let pattern = colon_pattern();
    let mut fields = BTreeMap::new();
    for line in stdout.lines() {
        if let Some(caps) = pattern.captures(line) {
            let key = caps[1].trim().to_string();
            if key.is_empty() {
                continue;
            }
            fields.entry(key).or_insert_with(|| caps[2].trim().to_string());
        }
    }
    fields
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_dmidecode_system_block() {
        let stdout = "\
Handle 0x0001
    Manufacturer: Supermicro
    Product Name: X12SPi-TF
    Serial Number: S123456
    UUID: 11111111-2222-3333-4444-555555555555
";
        let system = parse_dmidecode_system(stdout);
        assert_eq!(system.manufacturer, "Supermicro");
        assert_eq!(system.product, "X12SPi-TF");
        assert_eq!(system.serial, "S123456");
    }

    #[test]
    fn missing_fields_are_empty_not_errors() {
        let system = parse_dmidecode_system("garbage output\nwith no colons on some lines");
        assert_eq!(system.manufacturer, "");
        assert_eq!(system.product, "");
    }

    #[test]
    fn cpuinfo_socket_count_is_distinct_physical_ids() {
        let stdout = "\
processor\t: 0
physical id\t: 0
model name\t: Intel(R) Xeon(R) Gold

processor\t: 1
physical id\t: 0
model name\t: Intel(R) Xeon(R) Gold

processor\t: 2
physical id\t: 1
model name\t: Intel(R) Xeon(R) Gold
";
        let cpu = parse_proc_cpuinfo(stdout);
        assert_eq!(cpu.sockets, 2);
        assert_eq!(cpu.cores_total, 3);
        assert_eq!(cpu.model, "Intel(R) Xeon(R) Gold");
    }

    #[test]
    fn meminfo_converts_kb_to_bytes() {
        let memory = parse_proc_meminfo("MemTotal:       16384000 kB\nMemFree: 100 kB");
        assert_eq!(memory.total_bytes, 16384000 * 1024);
    }

    #[test]
    fn ip_addr_merges_mac_from_link_show() {
        let link = "2: eth0: <BROADCAST,MULTICAST,UP> mtu 1500\n    link/ether aa:bb:cc:dd:ee:ff brd ff:ff:ff:ff:ff:ff\n";
        let addr = "2: eth0    inet 10.0.0.5/24 brd 10.0.0.255 scope global eth0\n";
        let nics = parse_ip_addr(addr, link);
        assert_eq!(nics.len(), 1);
        assert_eq!(nics[0].mac, "aa:bb:cc:dd:ee:ff");
        assert_eq!(nics[0].ip, "10.0.0.5");
        assert_eq!(nics[0].state, "UP");
    }

    #[test]
    fn dmidecode_memory_skips_unpopulated_slots() {
        let stdout = "\
Locator: DIMM_A1
Size: 32 GB

Locator: DIMM_A2
Size: No Module Installed

";
        let dimms = parse_dmidecode_memory_dimms(stdout);
        assert_eq!(dimms, vec!["DIMM_A1: 32 GB".to_string()]);
    }
}
