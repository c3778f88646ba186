//! `Orchestrator`: the public facade. Assembles `SharedDeps` once at
//! construction and exposes the four operations an external caller
//! (CLI, API layer) drives a provisioning run through: `start_provision`,
//! `cancel`, `status`, `subscribe`.

use std::collections::HashMap;
use std::sync::Arc;

use forge_core::{MachineId, MachineRecord, MachineStatus, StateStore, Workflow, WorkflowContext, WorkflowId, WorkflowState};
use forge_registry::DeviceCatalog;
use forge_secrets::SecretResolver;
use forge_workflow::{Event, ProgressBus, WorkflowEngine};
use futures::{Stream, StreamExt};
use tokio::sync::{Mutex, Semaphore};
use tokio_stream::wrappers::BroadcastStream;
use tokio_util::sync::CancellationToken;

use crate::config::AppConfig;
use crate::deps::{SharedDeps, BMC_HOST_KEY};
use crate::endpoint_lock::EndpointLocks;
use crate::error::OrchestratorError;
use crate::options::ProvisionOptions;
use crate::plan::build_step_specs;

/// A workflow this process has started and not yet forgotten: its
/// cancellation handle, so `cancel` can signal it without going back
/// through `StateStore` (whose snapshot always lags the live run by one
/// step). Entries accumulate for the life of the process rather than
/// being pruned on completion — acceptable for the scale this facade
/// targets (`max_concurrent_workflows` in the tens), not a design this
/// crate would keep at fleet scale.
struct RunningWorkflow {
    cancel: CancellationToken,
}

pub struct Orchestrator {
    deps: Arc<SharedDeps>,
    engine: Arc<WorkflowEngine>,
    bus: ProgressBus,
    endpoint_locks: Arc<EndpointLocks>,
    running: Mutex<HashMap<WorkflowId, RunningWorkflow>>,
    concurrency: Arc<Semaphore>,
}

impl Orchestrator {
    pub fn new(
        config: AppConfig,
        pool: forge_ssh::SshPool,
        secrets: Arc<dyn SecretResolver>,
        maas: Arc<dyn forge_core::MaasClient>,
        store: Arc<dyn StateStore>,
    ) -> Result<Self, OrchestratorError> {
        let catalog = DeviceCatalog::load_dir(&config.device_catalog_dir)?;
        let firmware_manifest = load_firmware_manifest(&config.firmware_manifest_path)?;
        let bus = ProgressBus::with_capacity(config.progress_bus_capacity);
        let concurrency = Arc::new(Semaphore::new(config.max_concurrent_workflows));
        let deps = Arc::new(SharedDeps { config, pool, catalog, firmware_manifest, secrets, maas, store });

        Ok(Self {
            deps,
            engine: Arc::new(WorkflowEngine::new(bus.clone())),
            bus,
            endpoint_locks: Arc::new(EndpointLocks::new()),
            running: Mutex::new(HashMap::new()),
            concurrency,
        })
    }

    /// Builds the step list for `options.kind`, persists the new
    /// `MachineRecord`/`Workflow` rows, and spawns the run on its own
    /// task. Returns as soon as the workflow is recorded as `Running`;
    /// callers observe progress via `subscribe`/poll `status`.
    ///
    /// Serializes against any other workflow already running against the
    /// same endpoint (`options.ipmi_ip`, or the machine's last-known IP).
    /// `options.require_exclusive` fails immediately with `EndpointBusy`;
    /// otherwise this call waits for the busy endpoint to free up before
    /// the new workflow is recorded and spawned.
    pub async fn start_provision(&self, machine_id: MachineId, options: ProvisionOptions) -> Result<WorkflowId, OrchestratorError> {
        let endpoint = self.endpoint_for(&machine_id, &options).await?;
        let endpoint_guard = if options.require_exclusive {
            self.endpoint_locks.try_acquire(&endpoint)?
        } else {
            self.endpoint_locks.acquire(&endpoint).await
        };

        let mut record = self.deps.store.load_machine(&machine_id).await?.unwrap_or_else(|| MachineRecord::new(machine_id.clone()));

        let mut context = WorkflowContext { ssh_credential: Some(options.ssh_credential), ipmi_credential: options.ipmi_credential, ..Default::default() };
        if let Some(ipmi_ip) = options.ipmi_ip {
            context.file_paths.insert(BMC_HOST_KEY.to_string(), ipmi_ip.to_string());
        }

        let specs = build_step_specs(machine_id.clone(), &options, self.deps.clone());
        let steps = WorkflowEngine::build_steps(&specs);
        let mut workflow = Workflow::new(machine_id.clone(), options.kind, steps);
        workflow.context = context;
        let workflow_id = workflow.id;

        record.last_workflow_id = Some(workflow_id);
        self.deps.store.save_machine(&record).await?;
        self.deps.store.save_workflow(&workflow).await?;

        let cancel = CancellationToken::new();
        let engine = self.engine.clone();
        let deps = self.deps.clone();
        let task_cancel = cancel.clone();
        let permit = self.concurrency.clone().acquire_owned().await.expect("semaphore is never closed");

        tokio::spawn(async move {
            let _permit = permit;
            let _endpoint_guard = endpoint_guard;
            let finished = engine.run(workflow, &specs, deps.store.as_ref(), task_cancel).await;
            settle_machine_status(&deps, &finished).await;
        });

        self.running.lock().await.insert(workflow_id, RunningWorkflow { cancel });
        Ok(workflow_id)
    }

    /// Signals cooperative cancellation. Returns once the signal is
    /// sent, not once the workflow has actually reached a terminal
    /// state — poll `status` for that.
    pub async fn cancel(&self, workflow_id: WorkflowId) -> Result<(), OrchestratorError> {
        let running = self.running.lock().await;
        let entry = running.get(&workflow_id).ok_or(OrchestratorError::WorkflowNotFound(workflow_id))?;
        entry.cancel.cancel();
        Ok(())
    }

    pub async fn status(&self, workflow_id: WorkflowId) -> Result<Workflow, OrchestratorError> {
        self.deps.store.load_workflow(&workflow_id).await?.ok_or(OrchestratorError::WorkflowNotFound(workflow_id))
    }

    /// A stream of every event the progress bus carries, across every
    /// workflow this facade is running; callers filter by
    /// `Event::workflow_id` themselves. A subscriber that falls behind
    /// the bus's bounded capacity silently misses events rather than
    /// stalling the workflows publishing them.
    pub fn subscribe(&self) -> impl Stream<Item = Event> {
        BroadcastStream::new(self.bus.subscribe()).filter_map(|item| async move { item.ok() })
    }

    async fn endpoint_for(&self, machine_id: &MachineId, options: &ProvisionOptions) -> Result<String, OrchestratorError> {
        if let Some(ipmi_ip) = options.ipmi_ip {
            return Ok(ipmi_ip.to_string());
        }
        if let Some(record) = self.deps.store.load_machine(machine_id).await? {
            if let Some(ip) = record.ip_address.or(record.ipmi_ip) {
                return Ok(ip.to_string());
            }
        }
        Ok(machine_id.to_string())
    }
}

/// Once the engine returns a terminal `Workflow`, this is the only place
/// that writes `MachineRecord.status` — by construction the one point
/// that already knows the run's overall outcome, including a fatal error
/// raised by a `.non_critical()` step further back in the list.
///
/// A cancelled run leaves `MachineRecord.status` exactly as it was before
/// `start_provision` — cancellation isn't a verdict on the machine's
/// condition, just an aborted attempt to change it.
async fn settle_machine_status(deps: &SharedDeps, finished: &Workflow) {
    let new_status = match finished.state {
        WorkflowState::Succeeded => MachineStatus::Ready,
        WorkflowState::Cancelled => return,
        _ => MachineStatus::Failed,
    };
    match deps.store.load_machine(&finished.machine_id).await {
        Ok(Some(mut record)) => {
            record.status = new_status;
            record.last_workflow_id = Some(finished.id);
            if let Err(err) = deps.store.save_machine(&record).await {
                tracing::warn!(machine_id = %finished.machine_id, %err, "failed to persist machine status after workflow completion");
            }
        }
        Ok(None) => tracing::warn!(machine_id = %finished.machine_id, "workflow finished for a machine with no stored record"),
        Err(err) => tracing::warn!(machine_id = %finished.machine_id, %err, "failed to load machine record after workflow completion"),
    }
}

fn load_firmware_manifest(path: &std::path::Path) -> Result<forge_firmware::FirmwareManifest, OrchestratorError> {
    let raw = std::fs::read_to_string(path).map_err(|source| OrchestratorError::FirmwareManifestRead { path: path.to_path_buf(), source })?;
    serde_yaml::from_str(&raw).map_err(|source| OrchestratorError::FirmwareManifestParse { path: path.to_path_buf(), source })
}
