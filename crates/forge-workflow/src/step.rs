//! The step function contract: what a workflow step actually runs, and
//! how it's assembled into a [`StepSpec`] with its retry/timeout/skip
//! policy.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use forge_core::{ForgeError, WorkflowContext};
use tokio_util::sync::CancellationToken;

use crate::reporter::Reporter;

/// 15 minutes, per the workflow engine's default per-step timeout.
pub const DEFAULT_STEP_TIMEOUT: Duration = Duration::from_secs(15 * 60);
/// 60 minutes: firmware steps get a longer budget to stream an artifact
/// and poll a BMC-mediated install to completion.
pub const FIRMWARE_STEP_TIMEOUT: Duration = Duration::from_secs(60 * 60);

/// The body of one workflow step.
///
/// `ctx` is shared (not owned) because a step that is abandoned past its
/// cancellation grace period keeps running detached; the engine still
/// needs a consistent view of whatever it wrote before abandonment.
#[async_trait]
pub trait StepBody: Send + Sync {
    async fn run(
        &self,
        ctx: Arc<tokio::sync::Mutex<WorkflowContext>>,
        reporter: Reporter,
        cancel: CancellationToken,
    ) -> Result<(), ForgeError>;
}

/// A predicate over the workflow's scratchpad deciding whether a step is
/// skipped entirely — e.g. `BiosOnly` workflows skip `FirmwareUpdates`.
pub type SkipPredicate = Box<dyn Fn(&WorkflowContext) -> bool + Send + Sync>;

/// One step's identity, function, and execution policy. Built once per
/// workflow `kind` by the orchestration facade; the engine turns a list
/// of these into the `Workflow.steps` data and then runs them in order.
pub struct StepSpec {
    pub name: String,
    pub description: String,
    pub max_retries: u32,
    pub timeout: Duration,
    pub skip_when: Option<SkipPredicate>,
    /// Non-critical steps (the BIOS pipeline under a `DegradeToDummy`
    /// tool policy, for instance) record a `Failed` status and the
    /// workflow's first fatal error but do not stop the engine from
    /// running the remaining steps; the workflow still ends `Failed`
    /// once every step has run. Critical (the default) stops the
    /// workflow at the failing step, per the usual semantics.
    pub critical: bool,
    pub body: Arc<dyn StepBody>,
}

impl StepSpec {
    pub fn new(name: impl Into<String>, description: impl Into<String>, body: Arc<dyn StepBody>) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
            max_retries: 0,
            timeout: DEFAULT_STEP_TIMEOUT,
            skip_when: None,
            critical: true,
            body,
        }
    }

    pub fn with_max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = max_retries;
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_skip_when(mut self, predicate: SkipPredicate) -> Self {
        self.skip_when = Some(predicate);
        self
    }

    /// Marks this step non-critical: a failure here is recorded but
    /// does not stop the engine from proceeding to the next step.
    pub fn non_critical(mut self) -> Self {
        self.critical = false;
        self
    }
}
