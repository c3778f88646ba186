use forge_core::{ErrorContext, ForgeError};

#[derive(Debug, thiserror::Error)]
pub enum BmcError {
    #[error("failed to spawn ipmitool: {0}")]
    Spawn(#[source] std::io::Error),

    #[error("ipmitool against {host} timed out after {elapsed}")]
    Timeout { host: String, elapsed: humantime::Duration },

    #[error("ipmitool against {host} exited with status {exit_code}: {stderr}")]
    NonZero {
        host: String,
        exit_code: i32,
        stderr: String,
    },

    #[error("could not parse ipmitool output for `{field}`")]
    Parse { field: String },

    #[error("redfish request to {url} failed: {source}")]
    RedfishRequest {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("redfish task {task_id} at {url} ended in state {state}")]
    RedfishTaskFailed {
        task_id: String,
        url: String,
        state: String,
    },

    #[error("redfish task {task_id} did not complete within {elapsed}")]
    RedfishTaskTimeout { task_id: String, elapsed: humantime::Duration },
}

impl From<BmcError> for ForgeError {
    fn from(err: BmcError) -> Self {
        let context = ErrorContext::default();
        match err {
            BmcError::Spawn(source) => ForgeError::ConnectError {
                host: "localhost".to_string(),
                context,
                source: Box::new(source),
            },
            BmcError::Timeout { host, elapsed } => ForgeError::TimeoutError {
                detail: format!("ipmitool against {host} after {elapsed}"),
                context,
            },
            BmcError::NonZero {
                host,
                exit_code,
                stderr,
            } => ForgeError::RemoteNonZero {
                cmd: format!("ipmitool -H {host}"),
                exit_code,
                stderr,
                context,
            },
            BmcError::Parse { field } => {
                ForgeError::Internal(format!("could not parse ipmitool field `{field}`"))
            }
            BmcError::RedfishRequest { url, source } => ForgeError::ConnectError {
                host: url,
                context,
                source: Box::new(source),
            },
            BmcError::RedfishTaskFailed { task_id, url, state } => ForgeError::RemoteNonZero {
                cmd: format!("redfish task {task_id} at {url}"),
                exit_code: -1,
                stderr: format!("task ended in state {state}"),
                context,
            },
            BmcError::RedfishTaskTimeout { task_id, elapsed } => ForgeError::TimeoutError {
                detail: format!("redfish task {task_id} after {elapsed}"),
                context,
            },
        }
    }
}
