use std::time::Instant;

use futures::future::join_all;
use tracing::{error, info};

use baton_core::bundle::Step;
use baton_core::error::Result;
use baton_core::traits::OutputSink;
use baton_core::{Envelope, Status};

use crate::context::Context;
use crate::dispatcher::Dispatcher;

/// Runs sub-steps concurrently and aggregates their statuses.
pub struct ParallelExecutor;

impl ParallelExecutor {
    /// Dispatch every branch at once and wait for all of them.
    ///
    /// Each branch's envelope is recorded under the branch's own name. The
    /// aggregate is Success only when every branch succeeded. When a branch
    /// returns a hard error, all branches still run to completion and the
    /// first error in declaration order is returned.
    pub async fn execute(
        &self,
        dispatcher: &Dispatcher,
        steps: &[Step],
        ctx: &Context,
        sink: &dyn OutputSink,
    ) -> Result<Envelope> {
        let start = Instant::now();
        info!(branches = steps.len(), "Starting parallel branches");

        let branches = steps.iter().map(|branch| async move {
            let outcome = dispatcher.execute(branch, ctx, sink).await;
            let envelope = match &outcome {
                Ok(envelope) => envelope.clone(),
                Err(e) => {
                    error!(step = %branch.name, error = %e, "Parallel branch failed");
                    Envelope::from_error(e).build()
                }
            };
            ctx.set_result(branch.name.as_str(), envelope);
            outcome.err()
        });

        if let Some(err) = join_all(branches).await.into_iter().flatten().next() {
            return Err(err);
        }

        let names: Vec<&str> = steps.iter().map(|s| s.name.as_str()).collect();
        let statuses = ctx.statuses(&names);
        let count = |status: Status| statuses.iter().filter(|s| **s == Some(status)).count();
        let completed = count(Status::Success);

        let builder = if completed == steps.len() {
            Envelope::success()
        } else {
            Envelope::partial()
        };
        Ok(builder
            .result("steps", steps.len())
            .result("completed", completed)
            .result("failed", count(Status::Failure))
            .result("skipped", count(Status::Skipped))
            .duration(start.elapsed())
            .build())
    }
}
