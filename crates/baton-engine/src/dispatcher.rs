use std::sync::Arc;

use futures::future::BoxFuture;
use tracing::debug;

use baton_core::bundle::{Conditional, Step, StepKind};
use baton_core::config::EngineConfig;
use baton_core::error::Result;
use baton_core::traits::OutputSink;
use baton_core::Envelope;
use baton_tools::ToolRegistry;

use crate::condition;
use crate::context::Context;
use crate::executor::{MergeExecutor, ParallelExecutor, ToolExecutor, VoteExecutor};

/// Routes each step to the executor for its shape.
pub struct Dispatcher {
    tool: ToolExecutor,
}

impl Dispatcher {
    pub fn new(tools: Arc<ToolRegistry>, config: &EngineConfig) -> Self {
        Self {
            tool: ToolExecutor::new(tools, config.workdir_input.clone()),
        }
    }

    /// Run a step, honoring its guard.
    ///
    /// A step whose guard evaluates false is not dispatched and yields a
    /// Skipped envelope.
    pub fn execute<'a>(
        &'a self,
        step: &'a Step,
        ctx: &'a Context,
        sink: &'a dyn OutputSink,
    ) -> BoxFuture<'a, Result<Envelope>> {
        Box::pin(async move {
            if let Some(guard) = &step.guard {
                if !condition::evaluate(guard, ctx) {
                    debug!(step = %step.name, guard = %guard, "Guard false, skipping");
                    return Ok(Envelope::skipped());
                }
            }
            self.dispatch(step, ctx, sink).await
        })
    }

    /// Run a step by shape, ignoring its guard.
    ///
    /// The caller records the returned envelope under the step's name.
    pub fn dispatch<'a>(
        &'a self,
        step: &'a Step,
        ctx: &'a Context,
        sink: &'a dyn OutputSink,
    ) -> BoxFuture<'a, Result<Envelope>> {
        Box::pin(async move {
            let save = step.save.as_deref();
            match &step.kind {
                StepKind::Conditional(branch) => self.branch(&step.name, branch, ctx, sink).await,
                StepKind::Parallel(steps) => {
                    ParallelExecutor.execute(self, steps, ctx, sink).await
                }
                StepKind::Merge(def) => {
                    MergeExecutor.execute(&step.name, def, save, ctx, sink).await
                }
                StepKind::Vote(def) => VoteExecutor.execute(&step.name, def, save, ctx, sink).await,
                StepKind::Tool(spec) => {
                    self.tool.execute(&step.name, spec, save, ctx, sink).await
                }
            }
        })
    }

    /// Evaluate the branch expression and run the chosen branch.
    /// With no `else` branch, a false expression yields Skipped.
    async fn branch(
        &self,
        name: &str,
        branch: &Conditional,
        ctx: &Context,
        sink: &dyn OutputSink,
    ) -> Result<Envelope> {
        let taken = condition::evaluate(&branch.expr, ctx);
        debug!(step = %name, expr = %branch.expr, taken, "Evaluated branch");
        match (taken, &branch.otherwise) {
            (true, _) => self.execute(&branch.then, ctx, sink).await,
            (false, Some(otherwise)) => self.execute(otherwise, ctx, sink).await,
            (false, None) => Ok(Envelope::skipped()),
        }
    }
}
