use serde::Serialize;

use crate::envelope::Status;
use crate::types::RunId;

/// Progress events published by the orchestrator.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum RunEvent {
    /// Run accepted and about to execute its first step.
    RunStarted {
        run_id: RunId,
        bundle: String,
        steps: usize,
    },
    /// A top-level step is about to be dispatched.
    StepStarted {
        /// 1-based position among the bundle's top-level steps.
        index: usize,
        total: usize,
        name: String,
    },
    /// A step's guard evaluated false.
    StepSkipped { name: String },
    /// A step produced its envelope.
    StepFinished {
        name: String,
        status: Status,
        duration_ms: u64,
    },
    /// Every step ran without a failure.
    RunComplete {
        run_id: RunId,
        steps: usize,
        duration_ms: u64,
    },
    /// The run halted.
    RunFailed {
        run_id: RunId,
        step: Option<String>,
        error: String,
    },
}

/// Event bus using tokio broadcast channel.
/// All subscribers receive all events.
pub struct EventBus {
    tx: tokio::sync::broadcast::Sender<RunEvent>,
}

impl EventBus {
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = tokio::sync::broadcast::channel(capacity);
        Self { tx }
    }

    pub fn publish(&self, event: RunEvent) {
        // Ignore error if no receivers
        let _ = self.tx.send(event);
    }

    pub fn subscribe(&self) -> tokio::sync::broadcast::Receiver<RunEvent> {
        self.tx.subscribe()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(256)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_publish_subscribe() {
        let bus = EventBus::default();
        let mut rx = bus.subscribe();
        bus.publish(RunEvent::StepSkipped { name: "lint".into() });

        match rx.recv().await.unwrap() {
            RunEvent::StepSkipped { name } => assert_eq!(name, "lint"),
            other => panic!("unexpected event: {:?}", other),
        }
    }

    #[test]
    fn test_publish_without_subscribers() {
        let bus = EventBus::new(4);
        bus.publish(RunEvent::StepSkipped { name: "x".into() });
    }

    #[test]
    fn test_event_serialization() {
        let event = RunEvent::StepFinished {
            name: "build".into(),
            status: Status::Partial,
            duration_ms: 12,
        };
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["event"], "step_finished");
        assert_eq!(json["status"], "partial");
    }
}
