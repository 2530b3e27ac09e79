use std::collections::{BTreeSet, HashSet};
use std::time::Instant;

use serde_json::{json, Value};
use tracing::{info, warn};

use baton_core::bundle::{MergeDef, MergeStrategy};
use baton_core::error::Result;
use baton_core::traits::OutputSink;
use baton_core::{Envelope, ErrorCode};

use super::{gather_sources, source_items};
use crate::context::Context;

/// Combines the outputs of earlier steps into one list.
pub struct MergeExecutor;

impl MergeExecutor {
    pub async fn execute(
        &self,
        step: &str,
        def: &MergeDef,
        save: Option<&str>,
        ctx: &Context,
        sink: &dyn OutputSink,
    ) -> Result<Envelope> {
        let start = Instant::now();
        let sources = gather_sources(ctx, step, &def.inputs);
        if sources.is_empty() {
            warn!(step = %step, "Merge has no usable sources");
            return Ok(Envelope::failure(
                ErrorCode::SourcesMissing,
                format!("no usable sources among [{}]", def.inputs.join(", ")),
            )
            .duration(start.elapsed())
            .build());
        }

        let items = merge_items(
            sources.iter().map(|(_, envelope)| source_items(envelope)),
            def.strategy,
        );
        let names: Vec<&str> = sources.iter().map(|(name, _)| name.as_str()).collect();

        let payload = json!({
            "strategy": def.strategy.as_str(),
            "sources": names,
            "output": items,
        });
        let output_ref = sink.write_output(step, &payload).await?;

        let mut builder = Envelope::success()
            .output_ref(output_ref)
            .result(
                "output",
                Value::Array(items.iter().cloned().map(Value::String).collect()),
            )
            .result("sources", sources.len())
            .result("items", items.len())
            .result("strategy", def.strategy.as_str());
        if let Some(file_name) = save {
            let saved = sink.save(file_name, &items.join("\n")).await?;
            builder = builder.result("saved", saved);
        }

        info!(
            step = %step,
            strategy = def.strategy.as_str(),
            sources = sources.len(),
            items = items.len(),
            "Merge finished"
        );
        Ok(builder.duration(start.elapsed()).build())
    }
}

/// Apply a merge strategy to per-source item lists, in source order.
pub fn merge_items<I>(per_source: I, strategy: MergeStrategy) -> Vec<String>
where
    I: IntoIterator<Item = Vec<String>>,
{
    let all = per_source.into_iter().flatten();
    match strategy {
        MergeStrategy::Concat => all.collect(),
        MergeStrategy::Union => all.collect::<BTreeSet<_>>().into_iter().collect(),
        MergeStrategy::Dedupe => {
            let mut seen = HashSet::new();
            all.filter(|item| seen.insert(item.clone())).collect()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use baton_core::Status;
    use baton_test_utils::MemorySink;

    fn lists() -> Vec<Vec<String>> {
        vec![
            vec!["b".into(), "a".into()],
            vec!["a".into(), "c".into(), "b".into()],
        ]
    }

    #[test]
    fn test_concat() {
        assert_eq!(
            merge_items(lists(), MergeStrategy::Concat),
            vec!["b", "a", "a", "c", "b"]
        );
    }

    #[test]
    fn test_union_sorted() {
        assert_eq!(merge_items(lists(), MergeStrategy::Union), vec!["a", "b", "c"]);
    }

    #[test]
    fn test_dedupe_first_seen() {
        assert_eq!(merge_items(lists(), MergeStrategy::Dedupe), vec!["b", "a", "c"]);
    }

    fn def(inputs: &[&str], strategy: MergeStrategy) -> MergeDef {
        MergeDef {
            inputs: inputs.iter().map(|s| s.to_string()).collect(),
            strategy,
        }
    }

    #[tokio::test]
    async fn test_merge_records_and_saves() {
        let ctx = Context::default();
        ctx.set_result("a", Envelope::success().result("output", "x\ny").build());
        ctx.set_result("b", Envelope::partial().result("output", "y\nz\n").build());
        let sink = MemorySink::new();

        let env = MergeExecutor
            .execute("m", &def(&["a", "b"], MergeStrategy::Dedupe), Some("all.txt"), &ctx, &sink)
            .await
            .unwrap();

        assert_eq!(env.status(), Status::Success);
        assert_eq!(env.result_value("output"), Some(&json!(["x", "y", "z"])));
        assert_eq!(env.result_value("sources"), Some(&json!(2)));
        assert_eq!(env.result_value("items"), Some(&json!(3)));
        assert_eq!(env.result_value("strategy"), Some(&json!("dedupe")));
        assert_eq!(sink.saved("all.txt").as_deref(), Some("x\ny\nz"));
        assert_eq!(sink.output("m").unwrap()["sources"], json!(["a", "b"]));
    }

    #[tokio::test]
    async fn test_excluded_sources() {
        let ctx = Context::default();
        ctx.set_result("ok", Envelope::success().result("output", "1").build());
        ctx.set_result("gone", Envelope::skipped());

        let env = MergeExecutor
            .execute("m", &def(&["gone", "ok", "never"], MergeStrategy::Concat), None, &ctx, &MemorySink::new())
            .await
            .unwrap();
        assert_eq!(env.result_value("output"), Some(&json!(["1"])));
        assert_eq!(env.result_value("sources"), Some(&json!(1)));
    }

    #[tokio::test]
    async fn test_no_usable_sources() {
        let ctx = Context::default();
        ctx.set_result("a", Envelope::failure(ErrorCode::ExecFailed, "x").build());

        let env = MergeExecutor
            .execute("m", &def(&["a", "b"], MergeStrategy::Union), None, &ctx, &MemorySink::new())
            .await
            .unwrap();
        assert_eq!(env.status(), Status::Failure);
        assert_eq!(env.error().unwrap().code, ErrorCode::SourcesMissing);
    }
}
