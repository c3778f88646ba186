//! The progress bus: a bounded, non-blocking publish/subscribe channel
//! consumers (the web layer, in the reference system) subscribe to
//! instead of polling `Status` in a loop.

use forge_core::{StepStatus, StructuredError, WorkflowId, WorkflowState};

const DEFAULT_CAPACITY: usize = 256;

/// One of the four facade event shapes from the external-interfaces spec:
/// `step.start`, `step.substep`, `step.end`, `workflow.end`.
#[derive(Debug, Clone)]
pub enum Event {
    StepStart {
        workflow_id: WorkflowId,
        step: String,
    },
    StepSubstep {
        workflow_id: WorkflowId,
        step: String,
        substep: String,
        status: StepStatus,
        message: String,
    },
    StepEnd {
        workflow_id: WorkflowId,
        step: String,
        status: StepStatus,
        error: Option<StructuredError>,
    },
    WorkflowEnd {
        workflow_id: WorkflowId,
        state: WorkflowState,
        error: Option<StructuredError>,
    },
}

impl Event {
    pub fn workflow_id(&self) -> WorkflowId {
        match self {
            Event::StepStart { workflow_id, .. }
            | Event::StepSubstep { workflow_id, .. }
            | Event::StepEnd { workflow_id, .. }
            | Event::WorkflowEnd { workflow_id, .. } => *workflow_id,
        }
    }
}

/// A `tokio::sync::broadcast`-backed bus. Publishing never awaits: a
/// lagging or absent subscriber just misses events rather than stalling
/// the workflow that's publishing them.
#[derive(Clone)]
pub struct ProgressBus {
    sender: tokio::sync::broadcast::Sender<Event>,
}

impl ProgressBus {
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_CAPACITY)
    }

    pub fn with_capacity(capacity: usize) -> Self {
        let (sender, _receiver) = tokio::sync::broadcast::channel(capacity);
        Self { sender }
    }

    pub fn subscribe(&self) -> tokio::sync::broadcast::Receiver<Event> {
        self.sender.subscribe()
    }

    /// Never blocks. `send` only errors when there are currently zero
    /// receivers, which is an unsubscribed bus, not a failure worth
    /// surfacing.
    pub fn publish(&self, event: Event) {
        let _ = self.sender.send(event);
    }
}

impl Default for ProgressBus {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;

    #[test]
    fn publish_without_subscribers_does_not_panic() {
        let bus = ProgressBus::new();
        bus.publish(Event::StepStart {
            workflow_id: WorkflowId(Uuid::nil()),
            step: "DiscoverHardware".to_string(),
        });
    }

    #[tokio::test]
    async fn subscriber_receives_published_event() {
        let bus = ProgressBus::new();
        let mut receiver = bus.subscribe();
        let workflow_id = WorkflowId(Uuid::nil());
        bus.publish(Event::StepStart { workflow_id, step: "Commission".to_string() });

        let event = receiver.recv().await.unwrap();
        assert_eq!(event.workflow_id(), workflow_id);
    }
}
