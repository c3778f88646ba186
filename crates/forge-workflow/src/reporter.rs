//! The fine-grained progress handle a running step is given: publishing a
//! substep both appends it to the step's own record and puts it on the
//! progress bus.

use std::sync::{Arc, Mutex};

use forge_core::{StepStatus, Substep, WorkflowId};

use crate::bus::{Event, ProgressBus};

#[derive(Clone)]
pub struct Reporter {
    workflow_id: WorkflowId,
    step: String,
    bus: ProgressBus,
    substeps: Arc<Mutex<Vec<Substep>>>,
}

impl Reporter {
    /// Returns the reporter plus the shared substep log the engine reads
    /// back once the step's future settles.
    pub(crate) fn new(workflow_id: WorkflowId, step: impl Into<String>, bus: ProgressBus) -> (Self, Arc<Mutex<Vec<Substep>>>) {
        let substeps = Arc::new(Mutex::new(Vec::new()));
        let reporter = Self {
            workflow_id,
            step: step.into(),
            bus,
            substeps: substeps.clone(),
        };
        (reporter, substeps)
    }

    pub fn substep(&self, name: impl Into<String>, status: StepStatus, message: impl Into<String>) {
        let name = name.into();
        let message = message.into();
        self.substeps.lock().expect("substep log lock poisoned").push(Substep {
            name: name.clone(),
            status,
            message: message.clone(),
        });
        self.bus.publish(Event::StepSubstep {
            workflow_id: self.workflow_id,
            step: self.step.clone(),
            substep: name,
            status,
            message,
        });
    }
}
