//! `ConfigureIpmi`: confirms the BMC is reachable over `ipmitool lanplus`
//! and, when the caller asked for it, rotates the admin password.

use std::sync::Arc;

use async_trait::async_trait;
use forge_bmc::{IpmiAdapter, IpmiConfig};
use forge_core::{ForgeError, MachineId, StepStatus, WorkflowContext};
use forge_workflow::{Reporter, StepBody};
use tokio::sync::Mutex;
use tokio_util::sync::CancellationToken;

use crate::deps::{self, SharedDeps};

pub struct ConfigureIpmiStep {
    pub machine_id: MachineId,
    pub deps: Arc<SharedDeps>,
    /// `Some` rotates the BMC admin password to this value once
    /// connectivity is confirmed; `None` only checks reachability.
    pub new_password: Option<String>,
}

/// Parses `ipmitool user list <channel>` output (`ID  Name  ...`) looking
/// for the row matching `username`. Defensive like
/// `forge_discovery`'s parsers: a row this project doesn't understand is
/// skipped, not an error.
fn find_user_id(user_list: &str, username: &str) -> Option<u32> {
    user_list.lines().skip(1).find_map(|line| {
        let mut columns = line.split_whitespace();
        let id: u32 = columns.next()?.parse().ok()?;
        let name = columns.next()?;
        (name == username).then_some(id)
    })
}

#[async_trait]
impl StepBody for ConfigureIpmiStep {
    async fn run(&self, ctx: Arc<Mutex<WorkflowContext>>, reporter: Reporter, _cancel: CancellationToken) -> Result<(), ForgeError> {
        let (bmc_host, credential) = {
            let guard = ctx.lock().await;
            let bmc_host = deps::bmc_host(&guard)
                .map(str::to_string)
                .ok_or_else(|| ForgeError::Internal("ConfigureIpmi ran without a discovered or operator-supplied BMC address".to_string()))?;
            let credential = deps::resolve_ipmi_credential(&self.deps, &guard).await?;
            (bmc_host, credential)
        };

        let adapter = IpmiAdapter::new(IpmiConfig::new(bmc_host.clone(), credential.username.clone(), credential.password.clone()));
        adapter.chassis_status().await.map_err(ForgeError::from)?;
        reporter.substep("reachability", StepStatus::Succeeded, format!("{bmc_host} responds to IPMI"));

        let Some(new_password) = &self.new_password else {
            return Ok(());
        };

        let user_list = adapter.user_list(1).await.map_err(ForgeError::from)?;
        let user_id = find_user_id(&user_list, &credential.username).ok_or_else(|| {
            ForgeError::Internal(format!("{bmc_host} has no IPMI user named `{}`", credential.username))
        })?;
        adapter.user_set_password(user_id, new_password).await.map_err(ForgeError::from)?;

        let new_ref = self
            .deps
            .secrets
            .store(forge_secrets::Credential {
                username: credential.username.clone(),
                password: new_password.clone(),
            })
            .await
            .map_err(|err| ForgeError::Internal(format!("storing rotated IPMI credential: {err}")))?;
        ctx.lock().await.ipmi_credential = Some(new_ref);

        reporter.substep("password-rotate", StepStatus::Succeeded, format!("rotated the password for user `{}`", credential.username));
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::find_user_id;

    #[test]
    fn finds_the_row_matching_the_username() {
        let output = "\
ID  Name             Callin  Link Auth  IPMI Msg   Channel Priv Limit
1   (Empty User)     true    false      false      NO ACCESS
2   admin            false   false      true       ADMINISTRATOR
";
        assert_eq!(find_user_id(output, "admin"), Some(2));
        assert_eq!(find_user_id(output, "nobody"), None);
    }
}
