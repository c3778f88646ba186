//! The workflow executor: one call to [`WorkflowEngine::run`] drives a
//! [`Workflow`] through its steps sequentially, applying retries,
//! per-step timeouts, cooperative cancellation, progress publication, and
//! snapshotting after every transition.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use forge_core::{ForgeError, StateStore, Step, StepStatus, Substep, Workflow, WorkflowContext, WorkflowId, WorkflowState};
use tokio_util::sync::CancellationToken;

use crate::bus::{Event, ProgressBus};
use crate::reporter::Reporter;
use crate::retry::backoff_for;
use crate::step::StepSpec;

/// How long the engine waits, after signalling cancellation, for a step
/// to wrap up on its own before moving on and marking the workflow
/// `Cancelled` regardless. The step's own future is never forcibly
/// killed — if it outlives this grace period it keeps running detached.
pub const CANCEL_GRACE: Duration = Duration::from_secs(30);

enum StepOutcome {
    Success,
    Failed(ForgeError),
    Cancelled,
}

/// Stateless beyond the bus it publishes on; one instance is shared
/// across every concurrently running workflow.
pub struct WorkflowEngine {
    bus: ProgressBus,
}

impl WorkflowEngine {
    pub fn new(bus: ProgressBus) -> Self {
        Self { bus }
    }

    /// Builds the `Workflow.steps` data (names/descriptions, all
    /// `Pending`) from `specs`, in the same order `run` will execute
    /// them in.
    pub fn build_steps(specs: &[StepSpec]) -> Vec<Step> {
        specs.iter().map(|spec| Step::new(spec.name.clone(), spec.description.clone())).collect()
    }

    /// Runs `workflow` to a terminal state against `specs`, persisting a
    /// snapshot to `store` after every step/workflow transition.
    /// `specs` must be the same list (same order, same names) used to
    /// build `workflow.steps`.
    pub async fn run(
        &self,
        mut workflow: Workflow,
        specs: &[StepSpec],
        store: &dyn StateStore,
        cancel: CancellationToken,
    ) -> Workflow {
        workflow.state = WorkflowState::Running;
        workflow.started_at = Some(Utc::now());
        self.persist(store, &workflow).await;

        let ctx = Arc::new(tokio::sync::Mutex::new(std::mem::take(&mut workflow.context)));
        let mut cancelled = false;

        for (index, spec) in specs.iter().enumerate() {
            workflow.current_step_index = index;

            if cancel.is_cancelled() {
                cancelled = true;
                break;
            }

            let should_skip = {
                let guard = ctx.lock().await;
                spec.skip_when.as_ref().is_some_and(|predicate| predicate(&guard))
            };
            if should_skip {
                workflow.steps[index].status = StepStatus::Skipped;
                self.persist(store, &workflow).await;
                continue;
            }

            self.bus.publish(Event::StepStart { workflow_id: workflow.id, step: spec.name.clone() });
            workflow.steps[index].status = StepStatus::Running;
            workflow.steps[index].started_at = Some(Utc::now());
            self.persist(store, &workflow).await;

            let (outcome, substeps, retries_used) =
                self.run_step_with_retries(spec, workflow.id, ctx.clone(), cancel.clone()).await;

            workflow.steps[index].ended_at = Some(Utc::now());
            workflow.steps[index].substeps = substeps;
            workflow.steps[index].retries_used = retries_used;

            match outcome {
                StepOutcome::Success => {
                    workflow.steps[index].status = StepStatus::Succeeded;
                    self.bus.publish(Event::StepEnd {
                        workflow_id: workflow.id,
                        step: spec.name.clone(),
                        status: StepStatus::Succeeded,
                        error: None,
                    });
                    self.persist(store, &workflow).await;
                }
                StepOutcome::Cancelled => {
                    workflow.steps[index].status = StepStatus::Failed;
                    self.bus.publish(Event::StepEnd {
                        workflow_id: workflow.id,
                        step: spec.name.clone(),
                        status: StepStatus::Failed,
                        error: None,
                    });
                    self.persist(store, &workflow).await;
                    cancelled = true;
                    break;
                }
                StepOutcome::Failed(err) => {
                    let structured = forge_core::StructuredError::from(&err);
                    workflow.steps[index].status = StepStatus::Failed;
                    workflow.steps[index].error = Some(structured.clone());
                    self.bus.publish(Event::StepEnd {
                        workflow_id: workflow.id,
                        step: spec.name.clone(),
                        status: StepStatus::Failed,
                        error: Some(structured.clone()),
                    });
                    // The first fatal error wins, whether it came from a
                    // critical or a non-critical step; a later step's
                    // success never displaces it.
                    if workflow.error.is_none() {
                        workflow.error = Some(structured);
                    }

                    if spec.critical {
                        workflow.context = ctx.lock().await.clone();
                        workflow.state = WorkflowState::Failed;
                        workflow.ended_at = Some(Utc::now());
                        self.persist(store, &workflow).await;
                        self.bus.publish(Event::WorkflowEnd {
                            workflow_id: workflow.id,
                            state: workflow.state,
                            error: workflow.error.clone(),
                        });
                        return workflow;
                    }

                    self.persist(store, &workflow).await;
                }
            }
        }

        workflow.context = ctx.lock().await.clone();
        workflow.state = if cancelled {
            WorkflowState::Cancelled
        } else if workflow.error.is_some() {
            WorkflowState::Failed
        } else {
            WorkflowState::Succeeded
        };
        workflow.ended_at = Some(Utc::now());
        self.persist(store, &workflow).await;
        self.bus.publish(Event::WorkflowEnd {
            workflow_id: workflow.id,
            state: workflow.state,
            error: workflow.error.clone(),
        });
        workflow
    }

    async fn persist(&self, store: &dyn StateStore, workflow: &Workflow) {
        if let Err(err) = store.save_workflow(workflow).await {
            tracing::warn!(workflow_id = %workflow.id, %err, "failed to persist workflow snapshot");
        }
    }

    /// Runs one step to completion, retrying transient failures with the
    /// engine's backoff policy up to `spec.max_retries` times.
    async fn run_step_with_retries(
        &self,
        spec: &StepSpec,
        workflow_id: WorkflowId,
        ctx: Arc<tokio::sync::Mutex<WorkflowContext>>,
        cancel: CancellationToken,
    ) -> (StepOutcome, Vec<Substep>, u32) {
        let mut attempt = 0u32;
        loop {
            let (outcome, substeps) = self.run_step_once(spec, workflow_id, ctx.clone(), cancel.clone()).await;

            let retry = match &outcome {
                StepOutcome::Failed(err) if err.is_transient() && attempt < spec.max_retries => true,
                _ => false,
            };

            if !retry {
                return (outcome, substeps, attempt);
            }

            attempt += 1;
            let delay = backoff_for(attempt);
            tracing::info!(step = %spec.name, attempt, delay_secs = delay.as_secs(), "retrying transient step failure");
            tokio::time::sleep(delay).await;
        }
    }

    /// One attempt: spawns the step so a cancellation-grace timeout can
    /// abandon (not abort) it without holding a borrow across the await.
    async fn run_step_once(
        &self,
        spec: &StepSpec,
        workflow_id: WorkflowId,
        ctx: Arc<tokio::sync::Mutex<WorkflowContext>>,
        cancel: CancellationToken,
    ) -> (StepOutcome, Vec<Substep>) {
        let (reporter, substeps_handle) = Reporter::new(workflow_id, spec.name.clone(), self.bus.clone());
        let body = spec.body.clone();
        let timeout = spec.timeout;
        let step_name = spec.name.clone();
        let task_cancel = cancel.clone();

        let handle = tokio::spawn(async move { tokio::time::timeout(timeout, body.run(ctx, reporter, task_cancel)).await });
        tokio::pin!(handle);

        let outcome = loop {
            tokio::select! {
                joined = &mut handle => {
                    break Self::outcome_from_join(joined, &step_name, timeout);
                }
                () = cancel.cancelled() => {
                    tracing::info!(step = %step_name, "cancellation signalled; waiting up to {:?} for step to finish", CANCEL_GRACE);
                    match tokio::time::timeout(CANCEL_GRACE, &mut handle).await {
                        Ok(joined) => break Self::outcome_from_join(joined, &step_name, timeout),
                        Err(_) => {
                            tracing::warn!(step = %step_name, "step did not finish within cancellation grace period; abandoning it in the background");
                            break StepOutcome::Cancelled;
                        }
                    }
                }
            }
        };

        let substeps = substeps_handle.lock().expect("substep log lock poisoned").clone();
        (outcome, substeps)
    }

    fn outcome_from_join(
        joined: Result<Result<Result<(), ForgeError>, tokio::time::error::Elapsed>, tokio::task::JoinError>,
        step_name: &str,
        timeout: Duration,
    ) -> StepOutcome {
        match joined {
            Ok(Ok(Ok(()))) => StepOutcome::Success,
            Ok(Ok(Err(err))) => StepOutcome::Failed(err),
            Ok(Err(_elapsed)) => StepOutcome::Failed(ForgeError::TimeoutError {
                detail: format!("step `{step_name}` exceeded its {timeout:?} timeout"),
                context: forge_core::ErrorContext::default(),
            }),
            Err(join_err) => StepOutcome::Failed(ForgeError::Internal(format!("step `{step_name}` task panicked: {join_err}"))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use forge_core::{InMemoryStateStore, MachineId, WorkflowKind};
    use std::sync::atomic::{AtomicU32, Ordering};

    struct AlwaysSucceeds;

    #[async_trait]
    impl crate::step::StepBody for AlwaysSucceeds {
        async fn run(
            &self,
            _ctx: Arc<tokio::sync::Mutex<WorkflowContext>>,
            reporter: Reporter,
            _cancel: CancellationToken,
        ) -> Result<(), ForgeError> {
            reporter.substep("work", StepStatus::Succeeded, "done");
            Ok(())
        }
    }

    struct FailsNTimesThenSucceeds {
        remaining_failures: AtomicU32,
    }

    #[async_trait]
    impl crate::step::StepBody for FailsNTimesThenSucceeds {
        async fn run(
            &self,
            _ctx: Arc<tokio::sync::Mutex<WorkflowContext>>,
            _reporter: Reporter,
            _cancel: CancellationToken,
        ) -> Result<(), ForgeError> {
            if self.remaining_failures.fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| (n > 0).then_some(n - 1)).is_ok() {
                return Err(ForgeError::TimeoutError {
                    detail: "transient".to_string(),
                    context: forge_core::ErrorContext::default(),
                });
            }
            Ok(())
        }
    }

    struct NeverReturns;

    #[async_trait]
    impl crate::step::StepBody for NeverReturns {
        async fn run(
            &self,
            _ctx: Arc<tokio::sync::Mutex<WorkflowContext>>,
            _reporter: Reporter,
            cancel: CancellationToken,
        ) -> Result<(), ForgeError> {
            cancel.cancelled().await;
            std::future::pending::<()>().await;
            Ok(())
        }
    }

    struct Fails;

    #[async_trait]
    impl crate::step::StepBody for Fails {
        async fn run(
            &self,
            _ctx: Arc<tokio::sync::Mutex<WorkflowContext>>,
            _reporter: Reporter,
            _cancel: CancellationToken,
        ) -> Result<(), ForgeError> {
            Err(ForgeError::UnknownSetting {
                name: "Foo".to_string(),
                context: forge_core::ErrorContext::default(),
            })
        }
    }

    fn workflow_for(specs: &[StepSpec]) -> Workflow {
        let steps = WorkflowEngine::build_steps(specs);
        Workflow::new(MachineId::new("abc"), WorkflowKind::Commission, steps)
    }

    #[tokio::test]
    async fn happy_path_succeeds_and_advances_every_step() {
        let specs = vec![
            StepSpec::new("Commission", "commission", Arc::new(AlwaysSucceeds)),
            StepSpec::new("DiscoverHardware", "discover", Arc::new(AlwaysSucceeds)),
        ];
        let workflow = workflow_for(&specs);
        let engine = WorkflowEngine::new(ProgressBus::new());
        let store = InMemoryStateStore::new();

        let result = engine.run(workflow, &specs, &store, CancellationToken::new()).await;

        assert_eq!(result.state, WorkflowState::Succeeded);
        assert!(result.steps.iter().all(|step| step.status == StepStatus::Succeeded));
        assert_eq!(result.steps[0].substeps.len(), 1);
    }

    #[tokio::test]
    async fn non_transient_failure_terminates_the_workflow() {
        let specs = vec![
            StepSpec::new("PullBios", "pull", Arc::new(Fails)).with_max_retries(5),
            StepSpec::new("ConfigureIpmi", "ipmi", Arc::new(AlwaysSucceeds)),
        ];
        let workflow = workflow_for(&specs);
        let engine = WorkflowEngine::new(ProgressBus::new());
        let store = InMemoryStateStore::new();

        let result = engine.run(workflow, &specs, &store, CancellationToken::new()).await;

        assert_eq!(result.state, WorkflowState::Failed);
        assert_eq!(result.steps[0].status, StepStatus::Failed);
        assert_eq!(result.steps[0].retries_used, 0, "non-transient errors are not retried");
        assert_eq!(result.steps[1].status, StepStatus::Pending, "no step after a failure starts");
    }

    #[tokio::test]
    async fn transient_failure_is_retried_until_it_succeeds() {
        let specs = vec![StepSpec::new(
            "DiscoverHardware",
            "discover",
            Arc::new(FailsNTimesThenSucceeds { remaining_failures: AtomicU32::new(2) }),
        )
        .with_max_retries(5)];
        let workflow = workflow_for(&specs);
        let engine = WorkflowEngine::new(ProgressBus::new());
        let store = InMemoryStateStore::new();

        let result = tokio::time::timeout(
            Duration::from_secs(10),
            engine.run(workflow, &specs, &store, CancellationToken::new()),
        )
        .await
        .unwrap();

        assert_eq!(result.state, WorkflowState::Succeeded);
        assert_eq!(result.steps[0].retries_used, 2);
    }

    #[tokio::test(start_paused = true)]
    async fn cancellation_abandons_a_stuck_step_after_the_grace_period() {
        let specs = vec![StepSpec::new("DiscoverHardware", "discover", Arc::new(NeverReturns))];
        let workflow = workflow_for(&specs);
        let engine = WorkflowEngine::new(ProgressBus::new());
        let store = InMemoryStateStore::new();
        let cancel = CancellationToken::new();

        let cancel_clone = cancel.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(1)).await;
            cancel_clone.cancel();
        });

        let result = engine.run(workflow, &specs, &store, cancel).await;

        assert_eq!(result.state, WorkflowState::Cancelled);
        assert_eq!(result.steps[0].status, StepStatus::Failed);
    }

    #[tokio::test]
    async fn non_critical_failure_lets_the_workflow_keep_running() {
        let specs = vec![
            StepSpec::new("PullBios", "pull", Arc::new(AlwaysSucceeds)),
            StepSpec::new("MergeAndPushBios", "push", Arc::new(Fails)).non_critical(),
            StepSpec::new("ConfigureIpmi", "ipmi", Arc::new(AlwaysSucceeds)),
        ];
        let workflow = workflow_for(&specs);
        let engine = WorkflowEngine::new(ProgressBus::new());
        let store = InMemoryStateStore::new();

        let result = engine.run(workflow, &specs, &store, CancellationToken::new()).await;

        assert_eq!(result.state, WorkflowState::Failed, "a fatal error anywhere still fails the workflow");
        assert_eq!(result.steps[0].status, StepStatus::Succeeded);
        assert_eq!(result.steps[1].status, StepStatus::Failed);
        assert_eq!(result.steps[2].status, StepStatus::Succeeded, "later steps still run after a non-critical failure");
        assert!(result.error.is_some());
    }

    #[tokio::test]
    async fn skip_when_predicate_marks_a_step_skipped() {
        let specs = vec![StepSpec::new("FirmwareUpdates", "firmware", Arc::new(AlwaysSucceeds))
            .with_skip_when(Box::new(|_ctx| true))];
        let workflow = workflow_for(&specs);
        let engine = WorkflowEngine::new(ProgressBus::new());
        let store = InMemoryStateStore::new();

        let result = engine.run(workflow, &specs, &store, CancellationToken::new()).await;

        assert_eq!(result.state, WorkflowState::Succeeded);
        assert_eq!(result.steps[0].status, StepStatus::Skipped);
    }
}
