use std::collections::HashMap;
use std::sync::Arc;
use std::time::Instant;

use tracing::{debug, error, info, warn};

use baton_core::bundle::Bundle;
use baton_core::error::BatonError;
use baton_core::event::{EventBus, RunEvent};
use baton_core::traits::OutputSink;
use baton_core::types::RunId;
use baton_core::{Envelope, ErrorCode, Status};

use crate::condition;
use crate::context::Context;
use crate::dispatcher::Dispatcher;

/// Lifecycle of a run: Pending, then Running, then Completed or Failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunState {
    Pending,
    Running,
    Completed,
    Failed,
}

impl RunState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, RunState::Completed | RunState::Failed)
    }

    /// Whether `next` is a legal successor of this state.
    pub fn can_advance_to(&self, next: RunState) -> bool {
        matches!(
            (self, next),
            (RunState::Pending, RunState::Running)
                | (RunState::Pending, RunState::Failed)
                | (RunState::Running, RunState::Completed)
                | (RunState::Running, RunState::Failed)
        )
    }

    fn advance(&mut self, next: RunState) {
        debug_assert!(self.can_advance_to(next), "illegal transition {:?} -> {:?}", self, next);
        debug!(from = ?self, to = ?next, "Run state changed");
        *self = next;
    }
}

/// Everything known about a finished run.
#[derive(Debug)]
pub struct RunReport {
    pub run_id: RunId,
    pub bundle: String,
    pub state: RunState,
    /// Run-level envelope: Success, or the Failure that halted the run.
    pub summary: Envelope,
    /// Inputs and every recorded step envelope.
    pub context: Context,
    /// Error that halted the run, if any.
    pub error: Option<BatonError>,
}

impl RunReport {
    pub fn succeeded(&self) -> bool {
        self.state == RunState::Completed
    }
}

/// Executes bundles step by step.
pub struct Orchestrator {
    dispatcher: Dispatcher,
    event_bus: Arc<EventBus>,
}

impl Orchestrator {
    pub fn new(dispatcher: Dispatcher, event_bus: Arc<EventBus>) -> Self {
        Self {
            dispatcher,
            event_bus,
        }
    }

    pub fn event_bus(&self) -> &Arc<EventBus> {
        &self.event_bus
    }

    /// Run a bundle to completion or to its first failing step.
    ///
    /// Steps run strictly in declaration order. A step whose guard is false
    /// is recorded as Skipped. Any step ending in Failure halts the run; a
    /// Partial step does not.
    pub async fn run(
        &self,
        run_id: RunId,
        bundle: &Bundle,
        inputs: HashMap<String, String>,
        sink: &dyn OutputSink,
    ) -> RunReport {
        let start = Instant::now();
        let total = bundle.steps.len();
        let mut state = RunState::Pending;

        let resolved = match bundle.resolve_inputs(inputs.clone()) {
            Ok(resolved) => resolved,
            Err(e) => {
                warn!(bundle = %bundle.name, error = %e, "Rejected run inputs");
                return self.abort(run_id, bundle, state, Context::new(inputs), e, start);
            }
        };
        let ctx = Context::new(resolved);

        if let Err(e) = sink.prepare().await {
            error!(location = %sink.location(), error = %e, "Cannot prepare output location");
            let e = match e {
                BatonError::Workspace(_) => e,
                other => BatonError::Workspace(other.to_string()),
            };
            return self.abort(run_id, bundle, state, ctx, e, start);
        }

        state.advance(RunState::Running);
        info!(run_id = %run_id, bundle = %bundle.name, steps = total, location = %sink.location(), "Run started");
        self.event_bus.publish(RunEvent::RunStarted {
            run_id: run_id.clone(),
            bundle: bundle.name.clone(),
            steps: total,
        });

        let mut executed = 0usize;
        for (index, step) in bundle.steps.iter().enumerate() {
            self.event_bus.publish(RunEvent::StepStarted {
                index: index + 1,
                total,
                name: step.name.clone(),
            });

            if let Some(guard) = &step.guard {
                if !condition::evaluate(guard, &ctx) {
                    info!(step = %step.name, guard = %guard, "Step skipped");
                    ctx.set_result(step.name.as_str(), Envelope::skipped());
                    self.event_bus.publish(RunEvent::StepSkipped {
                        name: step.name.clone(),
                    });
                    continue;
                }
            }

            info!(step = %step.name, kind = step.kind.label(), "[{}/{}] Running step", index + 1, total);
            let envelope = match self.dispatcher.dispatch(step, &ctx, sink).await {
                Ok(envelope) => envelope,
                Err(e) => {
                    error!(step = %step.name, error = %e, "Step aborted");
                    Envelope::from_error(&e).build()
                }
            };
            executed += 1;

            let status = envelope.status();
            let duration_ms = envelope.duration_ms();
            let failure = envelope.error().cloned();
            ctx.set_result(step.name.as_str(), envelope);
            self.event_bus.publish(RunEvent::StepFinished {
                name: step.name.clone(),
                status,
                duration_ms,
            });

            if status == Status::Failure {
                let (code, message) = match failure {
                    Some(err) => (err.code, err.message),
                    None => (ErrorCode::Internal, "step failed".to_string()),
                };
                error!(step = %step.name, code = %code, error = %message, "Run halted");
                let err = BatonError::StepFailed {
                    step: step.name.clone(),
                    code,
                    message,
                };
                return self.fail(
                    run_id,
                    bundle,
                    state,
                    ctx,
                    err,
                    Some(step.name.clone()),
                    executed,
                    start,
                );
            }
            info!(step = %step.name, status = %status, duration_ms, "Step finished");
        }

        state.advance(RunState::Completed);
        let duration = start.elapsed();
        info!(
            run_id = %run_id,
            executed,
            duration_ms = duration.as_millis() as u64,
            "Run complete"
        );
        self.event_bus.publish(RunEvent::RunComplete {
            run_id: run_id.clone(),
            steps: total,
            duration_ms: duration.as_millis() as u64,
        });

        RunReport {
            summary: Envelope::success()
                .result("steps", total)
                .result("executed", executed)
                .result("run_id", run_id.as_str())
                .result("bundle", bundle.name.as_str())
                .duration(duration)
                .build(),
            run_id,
            bundle: bundle.name.clone(),
            state,
            context: ctx,
            error: None,
        }
    }

    /// Halt before any step ran.
    fn abort(
        &self,
        run_id: RunId,
        bundle: &Bundle,
        state: RunState,
        ctx: Context,
        err: BatonError,
        start: Instant,
    ) -> RunReport {
        self.fail(run_id, bundle, state, ctx, err, None, 0, start)
    }

    #[allow(clippy::too_many_arguments)]
    fn fail(
        &self,
        run_id: RunId,
        bundle: &Bundle,
        mut state: RunState,
        ctx: Context,
        err: BatonError,
        step: Option<String>,
        executed: usize,
        start: Instant,
    ) -> RunReport {
        state.advance(RunState::Failed);
        self.event_bus.publish(RunEvent::RunFailed {
            run_id: run_id.clone(),
            step,
            error: err.to_string(),
        });

        let summary = Envelope::from_error(&err)
            .result("steps", bundle.steps.len())
            .result("executed", executed)
            .result("run_id", run_id.as_str())
            .result("bundle", bundle.name.as_str())
            .duration(start.elapsed())
            .build();

        RunReport {
            run_id,
            bundle: bundle.name.clone(),
            state,
            summary,
            context: ctx,
            error: Some(err),
        }
    }
}
