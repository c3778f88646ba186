//! Exercises the real `Orchestrator` facade end to end: real
//! `WorkflowEngine`, real `DeviceCatalog`/`AppConfig`/`SshPool`, a faked
//! `MaasClient`, and an in-memory `StateStore`. `DiscoverHardware`'s SSH
//! probe has nothing reachable to connect to, so these scenarios all stop
//! there — validating the facade's sequencing, retry/terminal-state
//! handling, and per-endpoint serialization without requiring an actual
//! commissioned host.

use std::net::IpAddr;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use forge_core::traits::MockMaasClient;
use forge_core::{InMemoryStateStore, MachineId, MachineRecord, MachineStatus, StateStore, StepStatus, WorkflowState};
use forge_orchestrator::{AppConfig, Orchestrator, OrchestratorError, ProvisionOptions};
use forge_secrets::{Credential, CredentialRef, InMemorySecretResolver, SecretResolver};
use forge_ssh::SshPool;

fn empty_catalog_dir() -> tempfile::TempDir {
    let tmp = tempfile::tempdir().unwrap();
    std::fs::write(tmp.path().join("catalog.yaml"), "device_types: []\n").unwrap();
    tmp
}

fn config_for(dir: &Path) -> AppConfig {
    let toml_path = dir.join("forge.toml");
    std::fs::write(
        &toml_path,
        format!(
            "device_catalog_dir = \"{}\"\nfirmware_manifest_path = \"{}\"\n",
            dir.display(),
            dir.join("firmware.yaml").display(),
        ),
    )
    .unwrap();
    std::fs::write(dir.join("firmware.yaml"), "entries: []\n").unwrap();
    AppConfig::load(Some(&toml_path)).unwrap()
}

async fn orchestrator_for(dir: &Path) -> (Orchestrator, CredentialRef) {
    let (orchestrator, ssh_credential, _store) = orchestrator_with_store(dir).await;
    (orchestrator, ssh_credential)
}

async fn orchestrator_with_store(dir: &Path) -> (Orchestrator, CredentialRef, Arc<InMemoryStateStore>) {
    let config = config_for(dir);
    let secrets = Arc::new(InMemorySecretResolver::new());
    let ssh_credential = secrets
        .store(Credential { username: "ubuntu".to_string(), password: "unused".to_string() })
        .await
        .unwrap();

    let mut maas = MockMaasClient::new();
    maas.expect_commission().returning(|_| Ok(()));
    maas.expect_get_ip().returning(|_| Ok("127.0.0.1".parse::<IpAddr>().unwrap()));

    let store = Arc::new(InMemoryStateStore::new());
    let orchestrator = Orchestrator::new(config, SshPool::new(), secrets, Arc::new(maas), store.clone()).unwrap();

    (orchestrator, ssh_credential, store)
}

/// Polls `status` until the workflow reaches a terminal state or
/// `deadline` elapses.
async fn wait_for_terminal(orchestrator: &Orchestrator, workflow_id: forge_core::WorkflowId, deadline: Duration) -> forge_core::Workflow {
    let start = tokio::time::Instant::now();
    loop {
        let workflow = orchestrator.status(workflow_id).await.unwrap();
        if workflow.state.is_terminal() {
            return workflow;
        }
        if start.elapsed() > deadline {
            panic!("workflow did not reach a terminal state within {deadline:?}: {workflow:?}");
        }
        tokio::time::sleep(Duration::from_millis(50)).await;
    }
}

/// The `Commission` kind's first two steps (`Commission`, `GetServerIp`)
/// go through the faked `MaasClient` and succeed; `DiscoverHardware`
/// then fails to connect to a host nothing is listening on. Since
/// `DiscoverHardware` is critical, the workflow ends `Failed` without
/// ever starting `InstallVendorTools` onward — `ConnectError` is
/// transient, so this also exercises the engine's retry loop for real.
#[tokio::test]
async fn unreachable_host_fails_discovery_and_halts_the_pipeline() {
    let dir = empty_catalog_dir();
    let (orchestrator, ssh_credential) = orchestrator_for(dir.path()).await;

    let options = ProvisionOptions::new(ssh_credential);
    let workflow_id = orchestrator.start_provision(MachineId::new("machine-a"), options).await.unwrap();

    let workflow = wait_for_terminal(&orchestrator, workflow_id, Duration::from_secs(30)).await;

    assert_eq!(workflow.state, WorkflowState::Failed);
    assert_eq!(workflow.steps[0].name, "Commission");
    assert_eq!(workflow.steps[0].status, StepStatus::Succeeded);
    assert_eq!(workflow.steps[1].name, "GetServerIp");
    assert_eq!(workflow.steps[1].status, StepStatus::Succeeded);
    assert_eq!(workflow.steps[2].name, "DiscoverHardware");
    assert_eq!(workflow.steps[2].status, StepStatus::Failed);
    assert!(workflow.steps[2].retries_used > 0, "a ConnectError should have been retried");
    assert_eq!(workflow.steps[3].status, StepStatus::Pending, "no step after a critical failure starts");
    assert!(workflow.error.is_some());
}

/// A second `StartProvision` against the same endpoint while the first
/// is still running fails immediately with `EndpointBusy` when the
/// caller asked for exclusivity — it does not queue behind the first.
#[tokio::test]
async fn duplicate_provision_on_the_same_endpoint_is_busy() {
    let dir = empty_catalog_dir();
    let (orchestrator, ssh_credential) = orchestrator_for(dir.path()).await;

    let ipmi_ip: IpAddr = "10.99.0.5".parse().unwrap();
    let mut first_options = ProvisionOptions::new(ssh_credential);
    first_options.ipmi_ip = Some(ipmi_ip);
    first_options.require_exclusive = true;

    let first = orchestrator.start_provision(MachineId::new("machine-b"), first_options).await;
    assert!(first.is_ok());

    let mut second_options = ProvisionOptions::new(CredentialRef::new());
    second_options.ipmi_ip = Some(ipmi_ip);
    second_options.require_exclusive = true;

    let second = orchestrator.start_provision(MachineId::new("machine-c"), second_options).await;
    assert!(matches!(second, Err(OrchestratorError::Forge(forge_core::ForgeError::EndpointBusy { .. }))));
}

/// `Cancel` on an unknown workflow id is a clean error, not a panic; on a
/// real running workflow it is safe to call more than once.
#[tokio::test]
async fn cancel_is_idempotent_and_rejects_unknown_workflows() {
    let dir = empty_catalog_dir();
    let (orchestrator, ssh_credential) = orchestrator_for(dir.path()).await;

    let unknown = forge_core::WorkflowId::new();
    assert!(matches!(orchestrator.cancel(unknown).await, Err(OrchestratorError::WorkflowNotFound(_))));

    let options = ProvisionOptions::new(ssh_credential);
    let workflow_id = orchestrator.start_provision(MachineId::new("machine-d"), options).await.unwrap();

    orchestrator.cancel(workflow_id).await.unwrap();
    orchestrator.cancel(workflow_id).await.unwrap();
}

/// `IpmiOnly` is a two-step workflow (`ConfigureIpmi`, `Finalize`); with
/// no BMC address ever recorded in the context it fails fast on the
/// first step rather than hanging, and `Finalize` never starts.
#[tokio::test]
async fn ipmi_only_without_a_bmc_address_fails_on_the_first_step() {
    let dir = empty_catalog_dir();
    let (orchestrator, ssh_credential) = orchestrator_for(dir.path()).await;

    let mut options = ProvisionOptions::new(ssh_credential).with_kind(forge_core::WorkflowKind::IpmiOnly);
    options.ipmi_credential = None;

    let workflow_id = orchestrator.start_provision(MachineId::new("machine-e"), options).await.unwrap();
    let workflow = wait_for_terminal(&orchestrator, workflow_id, Duration::from_secs(10)).await;

    assert_eq!(workflow.state, WorkflowState::Failed);
    assert_eq!(workflow.steps[0].name, "ConfigureIpmi");
    assert_eq!(workflow.steps[0].status, StepStatus::Failed);
    assert_eq!(workflow.steps[1].status, StepStatus::Pending);
}

/// A cancelled workflow must not overwrite `MachineRecord.status` — only
/// `Succeeded`/`Failed` settle the machine's status; `Cancelled` leaves it
/// exactly as it was before the run started.
#[tokio::test]
async fn cancelling_a_workflow_leaves_the_machine_status_untouched() {
    let dir = empty_catalog_dir();
    let (orchestrator, ssh_credential, store) = orchestrator_with_store(dir.path()).await;

    let machine_id = MachineId::new("machine-f");
    let mut record = MachineRecord::new(machine_id.clone());
    record.status = MachineStatus::Ready;
    store.save_machine(&record).await.unwrap();

    let options = ProvisionOptions::new(ssh_credential);
    let workflow_id = orchestrator.start_provision(machine_id.clone(), options).await.unwrap();
    orchestrator.cancel(workflow_id).await.unwrap();

    let workflow = wait_for_terminal(&orchestrator, workflow_id, Duration::from_secs(30)).await;
    assert_eq!(workflow.state, WorkflowState::Cancelled);

    let settled = store.load_machine(&machine_id).await.unwrap().unwrap();
    assert_eq!(settled.status, MachineStatus::Ready, "cancellation must not overwrite prior machine status");
}
