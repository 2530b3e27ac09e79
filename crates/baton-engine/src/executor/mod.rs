//! Step executors, one per step shape.

pub mod merge;
pub mod parallel;
pub mod tool;
pub mod vote;

pub use merge::MergeExecutor;
pub use parallel::ParallelExecutor;
pub use tool::ToolExecutor;
pub use vote::VoteExecutor;

use baton_core::envelope::value_text;
use baton_core::{Envelope, Status};
use serde_json::Value;
use tracing::warn;

use crate::context::Context;

/// Envelopes of the named sources that can contribute to an aggregate.
///
/// Sources that never ran, were skipped, or failed are left out with a
/// warning. Order follows `names`.
pub(crate) fn gather_sources(ctx: &Context, step: &str, names: &[String]) -> Vec<(String, Envelope)> {
    let mut sources = Vec::with_capacity(names.len());
    for name in names {
        match ctx.get_result(name) {
            None => warn!(step = %step, source = %name, "Source has no recorded result"),
            Some(env) if matches!(env.status(), Status::Skipped | Status::Failure) => {
                warn!(step = %step, source = %name, status = %env.status(), "Excluding source");
            }
            Some(env) => sources.push((name.clone(), env)),
        }
    }
    sources
}

/// The items a source contributes to a merge.
///
/// A JSON array output (or a string holding one) gives its elements;
/// any other string gives its non-empty trimmed lines.
pub(crate) fn source_items(envelope: &Envelope) -> Vec<String> {
    match envelope.result_value("output") {
        None | Some(Value::Null) => Vec::new(),
        Some(Value::Array(items)) => items.iter().map(value_text).collect(),
        Some(Value::String(text)) => match serde_json::from_str::<Vec<Value>>(text.trim()) {
            Ok(items) => items.iter().map(value_text).collect(),
            Err(_) => text
                .lines()
                .map(str::trim)
                .filter(|line| !line.is_empty())
                .map(String::from)
                .collect(),
        },
        Some(other) => vec![value_text(other)],
    }
}
