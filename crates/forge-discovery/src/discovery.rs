//! Hardware discovery: a fixed, ordered set of SSH commands against the
//! freshly commissioned host, reduced to a [`HardwareReport`].

use std::net::SocketAddr;
use std::time::Duration;

use forge_core::{HardwareReport, IpmiInfo};

use crate::error::DiscoveryError;
use crate::{parsers, vendor_augment};

const DEFAULT_COMMAND_TIMEOUT: Duration = Duration::from_secs(30);
const BASE_COMMANDS: [&str; 7] = [
    "dmidecode -t system",
    "dmidecode -t bios",
    "dmidecode -t memory",
    "cat /proc/cpuinfo",
    "cat /proc/meminfo",
    "ip -o addr show",
    "ip -o link show",
];

pub struct Discoverer<'a> {
    pool: &'a forge_ssh::SshPool,
    host: SocketAddr,
    user: &'a str,
    password: &'a str,
    command_timeout: Duration,
}

impl<'a> Discoverer<'a> {
    pub fn new(pool: &'a forge_ssh::SshPool, host: SocketAddr, user: &'a str, password: &'a str) -> Self {
        Self {
            pool,
            host,
            user,
            password,
            command_timeout: DEFAULT_COMMAND_TIMEOUT,
        }
    }

    pub(crate) async fn exec(&self, cmd: &str) -> Result<forge_ssh::CommandResult, DiscoveryError> {
        self.pool
            .exec(self.host, self.user, self.password, cmd, Some(self.command_timeout))
            .await
            .map_err(DiscoveryError::Ssh)
    }

    /// Runs the base command set concurrently (safe to parallelize, unlike
    /// the IPMI channel probe below), then the sequential IPMI probe,
    /// storage enumeration, and vendor-specific enrichment.
    pub async fn discover(&self) -> Result<HardwareReport, DiscoveryError> {
        let futures = BASE_COMMANDS.iter().map(|cmd| self.exec(cmd));
        let results = futures::future::join_all(futures).await;

        let mut warnings = Vec::new();
        let mut outputs = Vec::with_capacity(results.len());
        for (cmd, result) in BASE_COMMANDS.iter().zip(results) {
            let command_result = result?;
            if command_result.exit_status != 0 {
                warnings.push(format!(
                    "`{cmd}` exited {}: {}",
                    command_result.exit_status,
                    command_result.stderr.trim()
                ));
            }
            outputs.push(command_result.stdout);
        }

        let mut system = parsers::parse_dmidecode_system(&outputs[0]);
        parsers::apply_dmidecode_bios(&mut system, &outputs[1]);

        let mut memory = parsers::parse_proc_meminfo(&outputs[4]);
        memory.dimms = parsers::parse_dmidecode_memory_dimms(&outputs[2]);

        let cpu = parsers::parse_proc_cpuinfo(&outputs[3]);
        let nics = parsers::parse_ip_addr(&outputs[5], &outputs[6]);

        let ipmi = self.discover_ipmi(&mut warnings).await?;
        let storage_controllers = self.discover_storage(&mut warnings).await?;
        let vendor_extras = vendor_augment::augment(self, &system, &mut warnings).await?;

        Ok(HardwareReport {
            system,
            cpu,
            memory,
            nics,
            ipmi,
            storage_controllers,
            vendor_extras,
            warnings,
        })
    }

    /// Tries IPMI LAN channel 1 then 8, sequentially — not safely
    /// parallelizable on all vendors' `ipmitool` builds. If neither
    /// responds, `ipmi` is `None` and a warning is appended, never a hard
    /// failure.
    async fn discover_ipmi(&self, warnings: &mut Vec<String>) -> Result<Option<IpmiInfo>, DiscoveryError> {
        for channel in [1u8, 8u8] {
            let cmd = format!("ipmitool lan print {channel}");
            let result = self.exec(&cmd).await?;
            if result.exit_status != 0 {
                continue;
            }
            let fields = parsers::parse_lan_print(&result.stdout);
            if fields.is_empty() {
                continue;
            }
            return Ok(Some(IpmiInfo {
                channel,
                ip: fields.get("IP Address").cloned().unwrap_or_default(),
                netmask: fields.get("Subnet Mask").cloned().unwrap_or_default(),
                gateway: fields.get("Default Gateway IP").cloned().unwrap_or_default(),
                mac: fields.get("MAC Address").cloned().unwrap_or_default(),
                vlan: fields
                    .get("802.1q VLAN ID")
                    .and_then(|value| value.trim_start_matches("Disabled").parse().ok()),
            }));
        }
        warnings.push("IPMI did not respond on lan channel 1 or 8".to_string());
        Ok(None)
    }

    async fn discover_storage(&self, warnings: &mut Vec<String>) -> Result<Vec<String>, DiscoveryError> {
        let result = self.exec("lspci").await?;
        if result.exit_status != 0 {
            warnings.push("lspci unavailable; storage controllers not enumerated".to_string());
            return Ok(Vec::new());
        }
        Ok(result
            .stdout
            .lines()
            .filter(|line| {
                let lower = line.to_lowercase();
                lower.contains("raid") || lower.contains("sas") || lower.contains("scsi controller")
            })
            .map(str::to_string)
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn base_commands_cover_the_expected_set() {
        assert!(BASE_COMMANDS.contains(&"dmidecode -t system"));
        assert!(BASE_COMMANDS.contains(&"cat /proc/cpuinfo"));
        assert!(BASE_COMMANDS.contains(&"cat /proc/meminfo"));
    }
}
