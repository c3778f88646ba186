//! Errors raised by the facade itself, as opposed to `ForgeError`, which
//! every adapter crate's narrower error widens into and which is what a
//! running workflow's steps actually fail with.

#[derive(Debug, thiserror::Error)]
pub enum OrchestratorError {
    #[error("failed to load configuration: {source}")]
    Config {
        #[from]
        source: figment::Error,
    },

    #[error("failed to load device catalog: {0}")]
    Catalog(#[from] forge_registry::RegistryError),

    #[error("failed to read firmware manifest at {path}: {source}")]
    FirmwareManifestRead {
        path: std::path::PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse firmware manifest at {path}: {source}")]
    FirmwareManifestParse {
        path: std::path::PathBuf,
        #[source]
        source: serde_yaml::Error,
    },

    #[error("workflow {0} not found")]
    WorkflowNotFound(forge_core::WorkflowId),

    #[error(transparent)]
    Forge(#[from] forge_core::ForgeError),
}
