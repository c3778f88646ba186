//! The shared data model: `MachineRecord`, `Workflow`, `Step`,
//! `HardwareReport`, `DeviceType`, `BiosTemplate`.
//!
//! All of these are plain data; the behavior that mutates them lives in
//! `forge-workflow` (the only writer of `Workflow`/`Step`) and
//! `forge-orchestrator` (the only writer of `MachineRecord`).

use std::collections::BTreeMap;
use std::net::IpAddr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::StructuredError;
use crate::ids::{MachineId, WorkflowId};
use forge_secrets::CredentialRef;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum MachineStatus {
    Discovered,
    Commissioning,
    BiosPending,
    FirmwarePending,
    Ready,
    Failed,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct MachineRecord {
    pub machine_id: MachineId,
    pub device_type: Option<String>,
    pub ip_address: Option<IpAddr>,
    pub ipmi_ip: Option<IpAddr>,
    pub vendor: Option<String>,
    pub status: MachineStatus,
    pub last_workflow_id: Option<WorkflowId>,
    pub rack_location: Option<String>,
}

impl MachineRecord {
    /// A freshly observed machine, known only by its MaaS identifier.
    pub fn new(machine_id: MachineId) -> Self {
        Self {
            machine_id,
            device_type: None,
            ip_address: None,
            ipmi_ip: None,
            vendor: None,
            status: MachineStatus::Discovered,
            last_workflow_id: None,
            rack_location: None,
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum WorkflowKind {
    Commission,
    BiosOnly,
    FirmwareFirst,
    IpmiOnly,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum WorkflowState {
    Pending,
    Running,
    Cancelling,
    Succeeded,
    Failed,
    Cancelled,
}

impl WorkflowState {
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            WorkflowState::Succeeded | WorkflowState::Failed | WorkflowState::Cancelled
        )
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum StepStatus {
    Pending,
    Running,
    Succeeded,
    Failed,
    Skipped,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Substep {
    pub name: String,
    pub status: StepStatus,
    pub message: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Step {
    pub name: String,
    pub description: String,
    pub status: StepStatus,
    pub substeps: Vec<Substep>,
    pub retries_used: u32,
    pub started_at: Option<DateTime<Utc>>,
    pub ended_at: Option<DateTime<Utc>>,
    pub error: Option<StructuredError>,
}

impl Step {
    pub fn new(name: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
            status: StepStatus::Pending,
            substeps: Vec::new(),
            retries_used: 0,
            started_at: None,
            ended_at: None,
            error: None,
        }
    }
}

/// The scratchpad a workflow's steps read from and write to. Once
/// [`hardware_report`](WorkflowContext::hardware_report) is set it is
/// read-only for the remainder of the workflow.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct WorkflowContext {
    pub hardware_report: Option<HardwareReport>,
    pub device_type: Option<String>,
    pub file_paths: BTreeMap<String, String>,
    pub ipmi_credential: Option<CredentialRef>,
    pub ssh_credential: Option<CredentialRef>,
    pub degraded: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Workflow {
    pub id: WorkflowId,
    pub machine_id: MachineId,
    pub kind: WorkflowKind,
    pub steps: Vec<Step>,
    pub current_step_index: usize,
    pub state: WorkflowState,
    pub started_at: Option<DateTime<Utc>>,
    pub ended_at: Option<DateTime<Utc>>,
    pub context: WorkflowContext,
    pub error: Option<StructuredError>,
}

impl Workflow {
    pub fn new(machine_id: MachineId, kind: WorkflowKind, steps: Vec<Step>) -> Self {
        Self {
            id: WorkflowId::new(),
            machine_id,
            kind,
            steps,
            current_step_index: 0,
            state: WorkflowState::Pending,
            started_at: None,
            ended_at: None,
            context: WorkflowContext::default(),
            error: None,
        }
    }

    pub fn current_step(&self) -> Option<&Step> {
        self.steps.get(self.current_step_index)
    }

    pub fn current_step_mut(&mut self) -> Option<&mut Step> {
        self.steps.get_mut(self.current_step_index)
    }
}

// --- HardwareReport -----------------------------------------------------

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct SystemInfo {
    pub manufacturer: String,
    pub product: String,
    pub serial: String,
    pub uuid: String,
    pub bios_version: String,
    pub bios_date: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct CpuInfo {
    pub model: String,
    pub sockets: u32,
    pub cores_total: u32,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct MemoryInfo {
    pub total_bytes: u64,
    pub dimms: Vec<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct NicInfo {
    pub name: String,
    pub mac: String,
    pub ip: String,
    pub state: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct IpmiInfo {
    pub channel: u8,
    pub ip: String,
    pub netmask: String,
    pub gateway: String,
    pub mac: String,
    pub vlan: Option<u16>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct HardwareReport {
    pub system: SystemInfo,
    pub cpu: CpuInfo,
    pub memory: MemoryInfo,
    pub nics: Vec<NicInfo>,
    pub ipmi: Option<IpmiInfo>,
    pub storage_controllers: Vec<String>,
    pub vendor_extras: BTreeMap<String, String>,
    /// Non-fatal issues accumulated during discovery: a missing IPMI
    /// channel response, a vendor enrichment command that failed, etc.
    pub warnings: Vec<String>,
}

impl HardwareReport {
    /// Discovery is best-effort: a step completes as long as these two
    /// fields are populated.
    pub fn is_usable(&self) -> bool {
        !self.system.manufacturer.is_empty() && !self.system.product.is_empty()
    }
}

// --- Device-type registry -----------------------------------------------

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct DetectionHints {
    pub motherboard: Option<String>,
    pub motherboard_family: Option<String>,
    pub cpu_family: Option<String>,
    pub manufacturer: Option<String>,
    pub memory_tier_bytes: Option<u64>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct DeviceType {
    pub id: String,
    pub vendor: String,
    pub motherboard: String,
    pub cpu_sockets: u32,
    pub memory_slots: u32,
    pub storage_bays: u32,
    pub bios_template_ref: String,
    pub firmware_policy_ref: String,
    pub detection_hints: DetectionHints,
}

// --- BIOS template --------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct SettingRule {
    pub name: String,
    pub target_value: String,
    #[serde(default = "default_true")]
    pub required: bool,
    #[serde(default)]
    pub preserve_if_present: bool,
    /// Optional enum domain this setting's value is validated against,
    /// where the template declares one.
    #[serde(default)]
    pub allowed_values: Option<Vec<String>>,
}

fn default_true() -> bool {
    true
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct BiosTemplate {
    pub device_type: String,
    pub settings: Vec<SettingRule>,
    #[serde(default)]
    pub vendor_specific_prologue: BTreeMap<String, String>,
    #[serde(default)]
    pub vendor_specific_epilogue: BTreeMap<String, String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hardware_report_usable_requires_manufacturer_and_product() {
        let mut report = HardwareReport::default();
        assert!(!report.is_usable());
        report.system.manufacturer = "Supermicro".into();
        assert!(!report.is_usable());
        report.system.product = "X12".into();
        assert!(report.is_usable());
    }

    #[test]
    fn workflow_state_terminal_set() {
        assert!(WorkflowState::Succeeded.is_terminal());
        assert!(WorkflowState::Failed.is_terminal());
        assert!(WorkflowState::Cancelled.is_terminal());
        assert!(!WorkflowState::Running.is_terminal());
    }

    #[test]
    fn bios_template_parses_from_yaml() {
        let yaml = r#"
device_type: a1.c5.large
settings:
  - name: BootMode
    target_value: Uefi
  - name: HyperThreading
    target_value: Enabled
    preserve_if_present: false
"#;
        let template: BiosTemplate = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(template.device_type, "a1.c5.large");
        assert_eq!(template.settings.len(), 2);
        assert!(template.settings[0].required);
    }
}
