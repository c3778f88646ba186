//! The `ipmitool -I lanplus` adapter.
//!
//! Unlike `forge-discovery`'s in-band `lan print` probe (which runs
//! `ipmitool` over SSH against the target host's own local BMC device),
//! this adapter runs `ipmitool` as a local process against a remote BMC
//! over UDP/623 lanplus — no SSH session is involved.

use std::collections::HashMap;
use std::process::Stdio;
use std::time::Duration;

use tokio::process::Command;

use crate::error::BmcError;
use crate::types::BmcInfo;

const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

pub struct IpmiConfig {
    pub host: String,
    pub user: String,
    pub password: String,
    pub timeout: Duration,
}

impl IpmiConfig {
    pub fn new(host: impl Into<String>, user: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            host: host.into(),
            user: user.into(),
            password: password.into(),
            timeout: DEFAULT_TIMEOUT,
        }
    }
}

/// A thin, stateless wrapper around `ipmitool -I lanplus` invocations.
/// Each call spawns its own process; there is no connection to pool
/// (unlike `forge_ssh`'s transport).
pub struct IpmiAdapter {
    config: IpmiConfig,
}

impl IpmiAdapter {
    pub fn new(config: IpmiConfig) -> Self {
        Self { config }
    }

    async fn run(&self, args: &[&str]) -> Result<String, BmcError> {
        let mut command = Command::new("ipmitool");
        command
            .arg("-I")
            .arg("lanplus")
            .arg("-H")
            .arg(&self.config.host)
            .arg("-U")
            .arg(&self.config.user)
            .arg("-P")
            .arg(&self.config.password)
            .args(args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());

        let child = command.spawn().map_err(BmcError::Spawn)?;
        let output = tokio::time::timeout(self.config.timeout, child.wait_with_output())
            .await
            .map_err(|_| BmcError::Timeout {
                host: self.config.host.clone(),
                elapsed: self.config.timeout.into(),
            })?
            .map_err(BmcError::Spawn)?;

        if !output.status.success() {
            return Err(BmcError::NonZero {
                host: self.config.host.clone(),
                exit_code: output.status.code().unwrap_or(-1),
                stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
            });
        }

        Ok(String::from_utf8_lossy(&output.stdout).into_owned())
    }

    /// `ipmitool lan print <channel>`, parsed into a `key: value` map. The
    /// caller (discovery/registration flow) tries channel 1 then 8 and
    /// merges the results.
    pub async fn lan_print(&self, channel: u8) -> Result<HashMap<String, String>, BmcError> {
        let channel_str = channel.to_string();
        let stdout = self.run(&["lan", "print", &channel_str]).await?;
        Ok(parse_lan_print(&stdout))
    }

    pub async fn user_list(&self, channel: u8) -> Result<String, BmcError> {
        let channel_str = channel.to_string();
        self.run(&["user", "list", &channel_str]).await
    }

    pub async fn user_set_password(&self, user_id: u32, new_password: &str) -> Result<(), BmcError> {
        let user_id_str = user_id.to_string();
        self.run(&["user", "set", "password", &user_id_str, new_password])
            .await?;
        Ok(())
    }

    pub async fn lan_set_ip(
        &self,
        channel: u8,
        ip_address: &str,
        netmask: &str,
        default_gateway: &str,
    ) -> Result<(), BmcError> {
        let channel_str = channel.to_string();
        self.run(&["lan", "set", &channel_str, "ipaddr", ip_address])
            .await?;
        self.run(&["lan", "set", &channel_str, "netmask", netmask])
            .await?;
        self.run(&["lan", "set", &channel_str, "defgw", "ipaddr", default_gateway])
            .await?;
        Ok(())
    }

    pub async fn chassis_status(&self) -> Result<String, BmcError> {
        self.run(&["chassis", "status"]).await
    }

    /// Collapses a `lan print` response into the unified [`BmcInfo`] shape.
    pub async fn bmc_info(&self, channel: u8) -> Result<BmcInfo, BmcError> {
        let fields = self.lan_print(channel).await?;
        Ok(BmcInfo {
            vendor: bmc_vendor::BMCVendor::Unknown,
            model: String::new(),
            bmc_version: String::new(),
            bios_version: String::new(),
            mac: fields.get("MAC Address").cloned().unwrap_or_default(),
            ip: fields.get("IP Address").cloned().unwrap_or_default(),
        })
    }
}

fn parse_lan_print(stdout: &str) -> HashMap<String, String> {
    let mut fields = HashMap::new();
    for line in stdout.lines() {
        if let Some((key, value)) = line.split_once(':') {
            fields.insert(key.trim().to_string(), value.trim().to_string());
        }
    }
    fields
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_lan_print_key_value_lines() {
        let stdout = "\
Set in Progress         : Set Complete
IP Address Source       : Static
IP Address              : 10.0.0.5
Subnet Mask             : 255.255.255.0
MAC Address              : aa:bb:cc:dd:ee:ff
";
        let fields = parse_lan_print(stdout);
        assert_eq!(fields.get("IP Address").unwrap(), "10.0.0.5");
        assert_eq!(fields.get("MAC Address").unwrap(), "aa:bb:cc:dd:ee:ff");
    }

    #[test]
    fn ignores_lines_without_a_colon() {
        let fields = parse_lan_print("garbage line with no colon\nKey: value");
        assert_eq!(fields.len(), 1);
        assert_eq!(fields.get("Key").unwrap(), "value");
    }
}
