use forge_core::{ErrorContext, ForgeError};

#[derive(Debug, thiserror::Error)]
pub enum FirmwareError {
    #[error("ssh error applying firmware update: {0}")]
    Ssh(#[from] forge_ssh::SshError),

    #[error("bmc error applying firmware update: {0}")]
    Bmc(#[from] forge_bmc::BmcError),

    #[error("toolchain error applying firmware update: {0}")]
    Toolchain(#[from] forge_toolchain::ToolchainError),

    #[error("update for `{component}` did not apply: expected version `{expected}`, observed `{got}`")]
    NotApplied {
        component: String,
        expected: String,
        got: String,
    },
}

impl From<FirmwareError> for ForgeError {
    fn from(err: FirmwareError) -> Self {
        let context = ErrorContext::default();
        match err {
            FirmwareError::Ssh(ssh_err) => ssh_to_forge(ssh_err, context),
            FirmwareError::Bmc(bmc_err) => bmc_err.into(),
            FirmwareError::Toolchain(toolchain_err) => toolchain_err.into(),
            FirmwareError::NotApplied { component, expected, got } => {
                ForgeError::NotApplied { name: component, expected, got, context }
            }
        }
    }
}

fn ssh_to_forge(err: forge_ssh::SshError, context: ErrorContext) -> ForgeError {
    match err {
        forge_ssh::SshError::ConnectError { host, source } => {
            ForgeError::ConnectError { host, context, source: Box::new(source) }
        }
        forge_ssh::SshError::AuthError { host, .. } => ForgeError::AuthError { host, context },
        forge_ssh::SshError::TimeoutError { host, elapsed } => ForgeError::TimeoutError {
            detail: format!("ssh op against {host} after {elapsed}"),
            context,
        },
        forge_ssh::SshError::RemoteNonZero { host, cmd, exit_status, stderr } => ForgeError::RemoteNonZero {
            cmd: format!("{host}: {cmd}"),
            exit_code: exit_status as i32,
            stderr,
            context,
        },
        forge_ssh::SshError::Transport { host, source } => {
            ForgeError::ConnectError { host, context, source: Box::new(source) }
        }
    }
}
