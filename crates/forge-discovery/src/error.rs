use forge_core::{ErrorContext, ForgeError};

#[derive(Debug, thiserror::Error)]
pub enum DiscoveryError {
    #[error(transparent)]
    Ssh(#[from] forge_ssh::SshError),
}

impl From<DiscoveryError> for ForgeError {
    fn from(err: DiscoveryError) -> Self {
        let DiscoveryError::Ssh(ssh_err) = err;
        let context = ErrorContext::default();
        match ssh_err {
            forge_ssh::SshError::ConnectError { host, source } => ForgeError::ConnectError {
                host,
                context,
                source: Box::new(source),
            },
            forge_ssh::SshError::AuthError { host, .. } => ForgeError::AuthError { host, context },
            forge_ssh::SshError::TimeoutError { host, elapsed } => ForgeError::TimeoutError {
                detail: format!("ssh call to {host} after {elapsed}"),
                context,
            },
            forge_ssh::SshError::RemoteNonZero {
                host,
                cmd,
                exit_status,
                stderr,
            } => ForgeError::RemoteNonZero {
                cmd: format!("{cmd} on {host}"),
                exit_code: exit_status as i32,
                stderr,
                context,
            },
            forge_ssh::SshError::Transport { host, source } => ForgeError::ConnectError {
                host,
                context,
                source: Box::new(source),
            },
        }
    }
}
