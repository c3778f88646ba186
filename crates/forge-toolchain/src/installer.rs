//! The vendor tool installer: probe, multi-URL download + validate,
//! install, verify — with graceful degradation left to the caller via
//! [`ToolPolicy`](crate::tool::ToolPolicy).

use std::net::SocketAddr;
use std::time::Duration;

use backon::{ExponentialBuilder, Retryable};
use forge_core::DownloadAttempt;
use url::Url;

use crate::error::ToolchainError;
use crate::tool::VendorTool;

const DOWNLOAD_TIMEOUT: Duration = Duration::from_secs(30);
const MIN_PAYLOAD_BYTES: u64 = 1024 * 1024;
const ACCEPTABLE_MAGIC: &[&str] = &["gzip", "tar archive", "rpm"];

pub struct ToolInstaller<'a> {
    pub pool: &'a forge_ssh::SshPool,
    pub host: SocketAddr,
    pub user: &'a str,
    pub password: &'a str,
}

impl<'a> ToolInstaller<'a> {
    /// Runs the full probe/download/install/verify flow for `tool`. On
    /// total failure returns [`ToolchainError::ToolUnavailable`] carrying
    /// every URL's failure reason so the caller can log a remediation hint.
    pub async fn ensure_installed(&self, tool: VendorTool, urls: &[Url]) -> Result<(), ToolchainError> {
        if self.probe(tool).await? {
            return Ok(());
        }

        let mut attempts = Vec::new();
        for url in urls {
            match self.try_install_from(tool, url).await {
                Ok(()) => return Ok(()),
                Err(failure) => attempts.push(DownloadAttempt {
                    url: url.to_string(),
                    failure,
                }),
            }
        }

        Err(ToolchainError::ToolUnavailable {
            tool: tool.binary_name().to_string(),
            attempts,
        })
    }

    async fn probe(&self, tool: VendorTool) -> Result<bool, ToolchainError> {
        let cmd = format!("which {}", tool.binary_name());
        let result = self.exec(&cmd).await?;
        Ok(result.exit_status == 0)
    }

    /// One URL's worth of download + validate, retried up to 3 times.
    /// Returns `Ok(())` once install + verify succeed, or
    /// a human-readable failure reason otherwise (never an error that would
    /// abort the whole installer — that's reserved for SSH transport
    /// failures, which do bubble as `Err`).
    async fn try_install_from(&self, tool: VendorTool, url: &Url) -> Result<(), String> {
        let staging_path = format!("/tmp/{}.pkg", tool.binary_name());

        let download = || self.download_and_validate(url, &staging_path);
        let outcome = download
            .retry(ExponentialBuilder::default().with_max_times(3))
            .await;

        outcome?;

        self.install(tool, &staging_path)
            .await
            .map_err(|err| err.to_string())?;

        self.verify(tool).await.map_err(|err| err.to_string())
    }

    async fn download_and_validate(&self, url: &Url, staging_path: &str) -> Result<(), String> {
        let download_cmd = format!(
            "curl -fsSL --max-time {} -o {staging_path} '{url}'",
            DOWNLOAD_TIMEOUT.as_secs(),
        );
        self.exec_checked(&download_cmd)
            .await
            .map_err(|err| format!("download failed: {err}"))?;

        let size_cmd = format!("stat -c%s {staging_path}");
        let size_output = self
            .exec_checked(&size_cmd)
            .await
            .map_err(|err| format!("stat failed: {err}"))?;
        let size: u64 = size_output
            .stdout
            .trim()
            .parse()
            .map_err(|_| "could not parse payload size".to_string())?;
        if size < MIN_PAYLOAD_BYTES {
            return Err(format!("payload too small ({size} bytes)"));
        }

        let magic_cmd = format!("file -b {staging_path}");
        let magic_output = self
            .exec_checked(&magic_cmd)
            .await
            .map_err(|err| format!("file(1) failed: {err}"))?;
        let magic = magic_output.stdout.to_lowercase();
        if !ACCEPTABLE_MAGIC.iter().any(|accepted| magic.contains(accepted)) {
            return Err(format!("unrecognized payload type: {}", magic_output.stdout.trim()));
        }

        let test_extract_cmd = format!("tar -tzf {staging_path} >/dev/null");
        self.exec_checked(&test_extract_cmd)
            .await
            .map_err(|err| format!("test-extract failed: {err}"))?;

        Ok(())
    }

    async fn install(&self, tool: VendorTool, staging_path: &str) -> Result<(), ToolchainError> {
        let install_dir = tool.install_dir();
        let bin = tool.binary_name();
        let extract_cmd = format!("mkdir -p {install_dir} && tar -xzf {staging_path} -C {install_dir}");
        self.exec_checked(&extract_cmd).await?;

        let symlink_cmd = format!(
            "ln -sf \"$(find {install_dir} -name {bin} -type f | head -1)\" /usr/local/bin/{bin}"
        );
        self.exec_checked(&symlink_cmd).await?;
        Ok(())
    }

    async fn verify(&self, tool: VendorTool) -> Result<(), ToolchainError> {
        let cmd = format!("{} --version", tool.binary_name());
        self.exec_checked(&cmd).await?;
        Ok(())
    }

    async fn exec(&self, cmd: &str) -> Result<forge_ssh::CommandResult, ToolchainError> {
        self.pool
            .exec(self.host, self.user, self.password, cmd, None)
            .await
            .map_err(ToolchainError::Ssh)
    }

    /// `exec` plus a nonzero-exit check: `forge_ssh` reports only
    /// transport-level failures as `Err`, so a command that ran but failed
    /// remotely must be checked explicitly.
    async fn exec_checked(&self, cmd: &str) -> Result<forge_ssh::CommandResult, ToolchainError> {
        let result = self.exec(cmd).await?;
        if result.exit_status != 0 {
            return Err(ToolchainError::Ssh(forge_ssh::SshError::RemoteNonZero {
                host: self.host.to_string(),
                cmd: cmd.to_string(),
                exit_status: result.exit_status,
                stderr: result.stderr.clone(),
            }));
        }
        Ok(result)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_payloads_smaller_than_one_mebibyte() {
        assert!(MIN_PAYLOAD_BYTES == 1024 * 1024);
    }

    #[test]
    fn acceptable_magic_covers_gzip_tar_and_rpm() {
        assert!(ACCEPTABLE_MAGIC.contains(&"gzip"));
        assert!(ACCEPTABLE_MAGIC.contains(&"rpm"));
    }
}
