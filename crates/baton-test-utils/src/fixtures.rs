use std::collections::HashMap;
use std::sync::Arc;

use baton_core::bundle::{Bundle, InputDef, MergeStrategy, Step};
use baton_tools::ToolRegistry;

use crate::mock_tool::MockTool;

/// Build an input map from literal pairs.
pub fn inputs(pairs: &[(&str, &str)]) -> HashMap<String, String> {
    pairs
        .iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect()
}

/// A registry holding exactly the given mocks.
pub fn registry_with(tools: &[Arc<MockTool>]) -> ToolRegistry {
    let mut registry = ToolRegistry::new();
    for tool in tools {
        registry.register_arc(tool.clone());
    }
    registry
}

/// Two parallel reviews merged with dedupe, then a summary gated on both.
pub fn review_bundle() -> Bundle {
    Bundle::new(
        "review",
        vec![InputDef::required("codebase")],
        vec![
            Step::parallel(
                "reviews",
                vec![
                    Step::tool("review_a", "alpha", "Review ${inputs.codebase}"),
                    Step::tool("review_b", "beta", "Review ${inputs.codebase}"),
                ],
            ),
            Step::merge("findings", &["review_a", "review_b"], MergeStrategy::Dedupe)
                .with_save("findings.txt"),
            Step::tool("summary", "alpha", "Summarize ${steps.findings.result.output}")
                .with_guard("${steps.reviews.status} == success"),
        ],
    )
    .expect("fixture bundle is valid")
}
