//! The trait boundaries for the two external collaborators this crate tree
//! treats as opaque: the machine-provisioning service
//! (`MaasClient`) and the persistence backend (`StateStore`).
//!
//! Production implementations of both (the real MaaS integration and a
//! durable store) live outside this workspace; only in-memory test doubles
//! live here.

use std::collections::BTreeMap;
use std::sync::RwLock;

use async_trait::async_trait;

use crate::error::ForgeError;
use crate::ids::{MachineId, WorkflowId};
use crate::model::{MachineRecord, MachineStatus, Workflow};

/// MaaS operations consumed by the orchestration facade.
#[cfg_attr(feature = "test-util", mockall::automock)]
#[async_trait]
pub trait MaasClient: Send + Sync {
    async fn list_machines(&self) -> Result<Vec<MachineId>, ForgeError>;
    async fn get_machine(&self, machine_id: &MachineId) -> Result<MachineRecord, ForgeError>;
    async fn commission(&self, machine_id: &MachineId) -> Result<(), ForgeError>;
    async fn get_ip(&self, machine_id: &MachineId) -> Result<std::net::IpAddr, ForgeError>;
    async fn set_status(&self, machine_id: &MachineId, status: MachineStatus) -> Result<(), ForgeError>;
}

/// The persistence interface `Workflow`/`MachineRecord` snapshots go
/// through. Schema versioning and forward-only migrations are a concern of
/// the concrete backend, not this trait.
#[cfg_attr(feature = "test-util", mockall::automock)]
#[async_trait]
pub trait StateStore: Send + Sync {
    async fn save_machine(&self, record: &MachineRecord) -> Result<(), ForgeError>;
    async fn load_machine(&self, machine_id: &MachineId) -> Result<Option<MachineRecord>, ForgeError>;
    async fn save_workflow(&self, workflow: &Workflow) -> Result<(), ForgeError>;
    async fn load_workflow(&self, workflow_id: &WorkflowId) -> Result<Option<Workflow>, ForgeError>;
    async fn list_active_workflows(&self) -> Result<Vec<Workflow>, ForgeError>;
}

/// An in-memory [`StateStore`] for tests. Not a supported production
/// backend; a durable store is left to the integrating application.
#[derive(Default)]
pub struct InMemoryStateStore {
    machines: RwLock<BTreeMap<MachineId, MachineRecord>>,
    workflows: RwLock<BTreeMap<WorkflowId, Workflow>>,
}

impl InMemoryStateStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl StateStore for InMemoryStateStore {
    async fn save_machine(&self, record: &MachineRecord) -> Result<(), ForgeError> {
        self.machines
            .write()
            .map_err(|_| ForgeError::Internal("machine store lock poisoned".into()))?
            .insert(record.machine_id.clone(), record.clone());
        Ok(())
    }

    async fn load_machine(&self, machine_id: &MachineId) -> Result<Option<MachineRecord>, ForgeError> {
        Ok(self
            .machines
            .read()
            .map_err(|_| ForgeError::Internal("machine store lock poisoned".into()))?
            .get(machine_id)
            .cloned())
    }

    async fn save_workflow(&self, workflow: &Workflow) -> Result<(), ForgeError> {
        self.workflows
            .write()
            .map_err(|_| ForgeError::Internal("workflow store lock poisoned".into()))?
            .insert(workflow.id, workflow.clone());
        Ok(())
    }

    async fn load_workflow(&self, workflow_id: &WorkflowId) -> Result<Option<Workflow>, ForgeError> {
        Ok(self
            .workflows
            .read()
            .map_err(|_| ForgeError::Internal("workflow store lock poisoned".into()))?
            .get(workflow_id)
            .cloned())
    }

    async fn list_active_workflows(&self) -> Result<Vec<Workflow>, ForgeError> {
        Ok(self
            .workflows
            .read()
            .map_err(|_| ForgeError::Internal("workflow store lock poisoned".into()))?
            .values()
            .filter(|workflow| !workflow.state.is_terminal())
            .cloned()
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::WorkflowKind;

    #[tokio::test]
    async fn in_memory_store_round_trips_machine() {
        let store = InMemoryStateStore::new();
        let record = MachineRecord::new(MachineId::new("abc"));
        store.save_machine(&record).await.unwrap();
        let loaded = store.load_machine(&record.machine_id).await.unwrap();
        assert_eq!(loaded, Some(record));
    }

    #[tokio::test]
    async fn list_active_workflows_excludes_terminal() {
        let store = InMemoryStateStore::new();
        let mut done = Workflow::new(MachineId::new("a"), WorkflowKind::Commission, vec![]);
        done.state = crate::model::WorkflowState::Succeeded;
        let mut running = Workflow::new(MachineId::new("b"), WorkflowKind::Commission, vec![]);
        running.state = crate::model::WorkflowState::Running;

        store.save_workflow(&done).await.unwrap();
        store.save_workflow(&running).await.unwrap();

        let active = store.list_active_workflows().await.unwrap();
        assert_eq!(active.len(), 1);
        assert_eq!(active[0].id, running.id);
    }
}
