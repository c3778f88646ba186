//! Shared data model, error taxonomy, and external-collaborator traits for
//! the bare-metal provisioning workspace.
//!
//! This crate owns no behavior of its own beyond the small helpers on its
//! types (`HardwareReport::is_usable`, `ForgeError::is_transient`, ...);
//! every mutation path is owned by the crate whose component the field
//! belongs to (`forge-workflow` for `Workflow`/`Step`, `forge-orchestrator`
//! for `MachineRecord`).

pub mod error;
pub mod ids;
pub mod model;
pub mod traits;

pub use error::{DownloadAttempt, ErrorContext, ForgeError, StructuredError};
pub use ids::{MachineId, WorkflowId};
pub use model::{
    BiosTemplate, CpuInfo, DetectionHints, DeviceType, HardwareReport, IpmiInfo, MachineRecord,
    MachineStatus, MemoryInfo, NicInfo, SettingRule, Step, StepStatus, Substep, SystemInfo,
    Workflow, WorkflowContext, WorkflowKind, WorkflowState,
};
pub use traits::{InMemoryStateStore, MaasClient, StateStore};
