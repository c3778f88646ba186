use forge_core::{ErrorContext, ForgeError};

#[derive(Debug, thiserror::Error)]
pub enum BiosError {
    #[error("ssh error pulling/pushing bios config: {0}")]
    Ssh(#[from] forge_ssh::SshError),

    #[error("bmc error pulling/pushing bios config: {0}")]
    Bmc(#[from] forge_bmc::BmcError),

    #[error("failed to parse vendor xml: {0}")]
    XmlParse(String),

    #[error("failed to parse vendor json: {0}")]
    JsonParse(#[from] serde_json::Error),

    #[error("malformed vendor response: {0}")]
    MalformedResponse(String),

    #[error("unknown setting `{name}` has no vendor schema entry")]
    UnknownSetting { name: String },

    #[error("invalid value `{value}` for setting `{name}`")]
    InvalidValue { name: String, value: String },

    #[error("setting `{name}` did not apply: expected `{expected}`, observed `{got}`")]
    NotApplied {
        name: String,
        expected: String,
        got: String,
    },
}

impl From<BiosError> for ForgeError {
    fn from(err: BiosError) -> Self {
        let context = ErrorContext::default();
        match err {
            BiosError::Ssh(ssh_err) => ssh_to_forge(ssh_err, context),
            BiosError::Bmc(bmc_err) => bmc_err.into(),
            BiosError::XmlParse(detail) => ForgeError::Internal(format!("xml parse: {detail}")),
            BiosError::JsonParse(source) => ForgeError::Internal(format!("json parse: {source}")),
            BiosError::MalformedResponse(detail) => ForgeError::Internal(detail),
            BiosError::UnknownSetting { name } => ForgeError::UnknownSetting { name, context },
            BiosError::InvalidValue { name, value } => ForgeError::InvalidValue { name, value, context },
            BiosError::NotApplied { name, expected, got } => {
                ForgeError::NotApplied { name, expected, got, context }
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
        forge_ssh::SshError::TimeoutError { host, elapsed } => {
            ForgeError::TimeoutError { detail: format!("ssh op against {host} after {elapsed}"), context }
        }
        forge_ssh::SshError::RemoteNonZero { host, cmd, exit_status, stderr } => {
            ForgeError::RemoteNonZero { cmd: format!("{host}: {cmd}"), exit_code: exit_status as i32, stderr, context }
        }
        forge_ssh::SshError::Transport { host, source } => {
            ForgeError::ConnectError { host, context, source: Box::new(source) }
        }
    }
}
