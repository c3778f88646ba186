//! The error taxonomy shared by every crate in the workspace.
//!
//! Each crate defines its own narrower error type close to the operation
//! that fails (`SshError`, `BmcError`, ...) and converts it into
//! [`ForgeError`] at its boundary with `#[from]`: narrow error per crate,
//! widened at the call boundary.

use serde::{Deserialize, Serialize};

use crate::ids::{MachineId, WorkflowId};

/// Context attached to an error as it crosses a crate boundary: which
/// machine/workflow/step/substep was in flight when it happened.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct ErrorContext {
    pub machine_id: Option<MachineId>,
    pub workflow_id: Option<WorkflowId>,
    pub step: Option<String>,
    pub substep: Option<String>,
}

impl ErrorContext {
    pub fn for_step(machine_id: MachineId, workflow_id: WorkflowId, step: impl Into<String>) -> Self {
        Self {
            machine_id: Some(machine_id),
            workflow_id: Some(workflow_id),
            step: Some(step.into()),
            substep: None,
        }
    }

    pub fn with_substep(mut self, substep: impl Into<String>) -> Self {
        self.substep = Some(substep.into());
        self
    }
}

/// A single download attempt recorded while a [`ForgeError::ToolUnavailable`]
/// was being assembled, for `forge-toolchain`'s multi-URL installer.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct DownloadAttempt {
    pub url: String,
    pub failure: String,
}

/// The error taxonomy shared by every adapter crate, widened at each crate
/// boundary from that crate's own narrower error enum.
///
/// [`ForgeError::is_transient`] is the single source of truth for what the
/// workflow engine is allowed to retry; everything else terminates the step.
#[derive(Debug, thiserror::Error)]
pub enum ForgeError {
    #[error("failed to connect to {host}: {source}")]
    ConnectError {
        host: String,
        context: ErrorContext,
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    #[error("authentication failed for {host}")]
    AuthError { host: String, context: ErrorContext },

    #[error("operation timed out: {detail}")]
    TimeoutError { detail: String, context: ErrorContext },

    #[error("command `{cmd}` exited with status {exit_code}: {stderr}")]
    RemoteNonZero {
        cmd: String,
        exit_code: i32,
        stderr: String,
        context: ErrorContext,
    },

    #[error("vendor tool {tool} unavailable after {} attempts", attempts.len())]
    ToolUnavailable {
        tool: String,
        attempts: Vec<DownloadAttempt>,
        context: ErrorContext,
    },

    #[error("unknown BIOS setting {name}")]
    UnknownSetting { name: String, context: ErrorContext },

    #[error("invalid value `{value}` for setting {name}")]
    InvalidValue {
        name: String,
        value: String,
        context: ErrorContext,
    },

    #[error("setting {name} did not apply: expected `{expected}`, observed `{got}`")]
    NotApplied {
        name: String,
        expected: String,
        got: String,
        context: ErrorContext,
    },

    #[error("endpoint {endpoint} is busy with another workflow")]
    EndpointBusy { endpoint: String },

    #[error("operation cancelled")]
    Cancelled { context: ErrorContext },

    #[error("internal error: {0}")]
    Internal(String),
}

impl ForgeError {
    /// Transient errors are worth retrying at the workflow level;
    /// everything else represents a condition that retrying will not fix.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            ForgeError::ConnectError { .. } | ForgeError::TimeoutError { .. }
        )
    }

    pub fn context(&self) -> Option<&ErrorContext> {
        match self {
            ForgeError::ConnectError { context, .. }
            | ForgeError::AuthError { context, .. }
            | ForgeError::TimeoutError { context, .. }
            | ForgeError::RemoteNonZero { context, .. }
            | ForgeError::ToolUnavailable { context, .. }
            | ForgeError::UnknownSetting { context, .. }
            | ForgeError::InvalidValue { context, .. }
            | ForgeError::NotApplied { context, .. }
            | ForgeError::Cancelled { context, .. } => Some(context),
            ForgeError::EndpointBusy { .. } | ForgeError::Internal(_) => None,
        }
    }

    /// A short, user-facing remediation hint surfaced in a workflow's final
    /// event.
    pub fn remediation_hint(&self) -> &'static str {
        match self {
            ForgeError::ConnectError { .. } => "verify the host is reachable and SSH is up",
            ForgeError::AuthError { .. } => "verify the commissioning SSH key/user",
            ForgeError::TimeoutError { .. } => "the operation exceeded its deadline; consider retrying manually",
            ForgeError::RemoteNonZero { .. } => "inspect the remote command's stderr",
            ForgeError::ToolUnavailable { .. } => "check the vendor tool download mirrors",
            ForgeError::UnknownSetting { .. } | ForgeError::InvalidValue { .. } => {
                "fix the BIOS template for this device type"
            }
            ForgeError::NotApplied { .. } => "the BMC rejected or silently dropped the setting",
            ForgeError::EndpointBusy { .. } => "another workflow already owns this endpoint",
            ForgeError::Cancelled { .. } => "cancelled by operator",
            ForgeError::Internal(_) => "this is a bug; check the logs",
        }
    }
}

/// The structured, serializable projection of a [`ForgeError`] stored on a
/// terminal [`crate::model::Workflow`] / [`crate::model::Step`].
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct StructuredError {
    pub kind: String,
    pub message: String,
    pub remediation_hint: String,
    pub context: ErrorContext,
}

impl From<&ForgeError> for StructuredError {
    fn from(err: &ForgeError) -> Self {
        Self {
            kind: error_kind(err).to_string(),
            message: err.to_string(),
            remediation_hint: err.remediation_hint().to_string(),
            context: err.context().cloned().unwrap_or_default(),
        }
    }
}

fn error_kind(err: &ForgeError) -> &'static str {
    match err {
        ForgeError::ConnectError { .. } => "ConnectError",
        ForgeError::AuthError { .. } => "AuthError",
        ForgeError::TimeoutError { .. } => "TimeoutError",
        ForgeError::RemoteNonZero { .. } => "RemoteNonZero",
        ForgeError::ToolUnavailable { .. } => "ToolUnavailable",
        ForgeError::UnknownSetting { .. } => "UnknownSetting",
        ForgeError::InvalidValue { .. } => "InvalidValue",
        ForgeError::NotApplied { .. } => "NotApplied",
        ForgeError::EndpointBusy { .. } => "EndpointBusy",
        ForgeError::Cancelled { .. } => "Cancelled",
        ForgeError::Internal(_) => "Internal",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn connect_and_timeout_are_transient() {
        let ctx = ErrorContext::default();
        assert!(
            ForgeError::ConnectError {
                host: "h".into(),
                context: ctx.clone(),
                source: Box::new(std::io::Error::other("x")),
            }
            .is_transient()
        );
        assert!(
            ForgeError::TimeoutError {
                detail: "d".into(),
                context: ctx,
            }
            .is_transient()
        );
    }

    #[test]
    fn unknown_setting_is_not_transient() {
        let err = ForgeError::UnknownSetting {
            name: "Foo".into(),
            context: ErrorContext::default(),
        };
        assert!(!err.is_transient());
    }

    #[test]
    fn structured_error_carries_remediation_hint() {
        let err = ForgeError::NotApplied {
            name: "BootMode".into(),
            expected: "Uefi".into(),
            got: "Legacy".into(),
            context: ErrorContext::default(),
        };
        let structured = StructuredError::from(&err);
        assert_eq!(structured.kind, "NotApplied");
        assert!(!structured.remediation_hint.is_empty());
    }
}
