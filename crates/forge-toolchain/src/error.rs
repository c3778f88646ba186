use forge_core::{DownloadAttempt, ErrorContext, ForgeError};

#[derive(Debug, thiserror::Error)]
pub enum ToolchainError {
    #[error(transparent)]
    Ssh(#[from] forge_ssh::SshError),

    #[error("{tool} unavailable after exhausting {} download URLs", attempts.len())]
    ToolUnavailable {
        tool: String,
        attempts: Vec<DownloadAttempt>,
    },
}

impl From<ToolchainError> for ForgeError {
    fn from(err: ToolchainError) -> Self {
        match err {
            ToolchainError::Ssh(ssh_err) => ssh_to_forge(ssh_err),
            ToolchainError::ToolUnavailable { tool, attempts } => ForgeError::ToolUnavailable {
                tool,
                attempts,
                context: ErrorContext::default(),
            },
        }
    }
}

fn ssh_to_forge(err: forge_ssh::SshError) -> ForgeError {
    let context = ErrorContext::default();
    match err {
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
