//! Bundle data model.
//!
//! A bundle JSON file defines a named workflow:
//!
//! ```json
//! {
//!   "name": "review",
//!   "inputs": [{ "name": "codebase", "required": true }],
//!   "steps": [
//!     { "name": "reviews", "parallel": [
//!       { "name": "claude_review", "tool": "claude", "task": "Review ${inputs.codebase}" },
//!       { "name": "codex_review",  "tool": "codex",  "task": "Review ${inputs.codebase}" }
//!     ]},
//!     { "name": "combined", "merge": { "inputs": ["claude_review", "codex_review"], "strategy": "dedupe" } }
//!   ]
//! }
//! ```
//!
//! On the wire a step is a flat record with optional fields. It is converted
//! into [`Step`], whose [`StepKind`] holds exactly one shape; a record with
//! zero or several shapes populated is rejected when the bundle is built.

use std::collections::{HashMap, HashSet};
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::error::{BatonError, Result};

/// A declared bundle input.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InputDef {
    pub name: String,
    #[serde(default)]
    pub required: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default: Option<String>,
}

impl InputDef {
    pub fn required(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            required: true,
            description: None,
            default: None,
        }
    }

    pub fn optional(name: impl Into<String>) -> Self {
        Self {
            required: false,
            ..Self::required(name)
        }
    }

    pub fn with_default(mut self, default: impl Into<String>) -> Self {
        self.default = Some(default.into());
        self
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }
}

/// How a merge step combines its sources.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MergeStrategy {
    /// Ordered concatenation.
    Concat,
    /// Set union, sorted.
    Union,
    /// Set union in first-seen order.
    Dedupe,
}

impl MergeStrategy {
    pub fn as_str(&self) -> &'static str {
        match self {
            MergeStrategy::Concat => "concat",
            MergeStrategy::Union => "union",
            MergeStrategy::Dedupe => "dedupe",
        }
    }
}

/// How a vote step picks a winner.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VoteStrategy {
    Majority,
    Unanimous,
    Ranked,
}

impl VoteStrategy {
    pub fn as_str(&self) -> &'static str {
        match self {
            VoteStrategy::Majority => "majority",
            VoteStrategy::Unanimous => "unanimous",
            VoteStrategy::Ranked => "ranked",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MergeDef {
    pub inputs: Vec<String>,
    pub strategy: MergeStrategy,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VoteDef {
    pub inputs: Vec<String>,
    pub strategy: VoteStrategy,
}

/// Single external tool invocation.
#[derive(Debug, Clone, PartialEq)]
pub struct ToolStep {
    pub tool: String,
    pub model: Option<String>,
    /// Task template, resolved against the run context at dispatch time.
    pub task: String,
}

/// Branch on a run-time condition.
#[derive(Debug, Clone, PartialEq)]
pub struct Conditional {
    pub expr: String,
    pub then: Box<Step>,
    pub otherwise: Option<Box<Step>>,
}

/// The shape of a step. Exactly one per step.
#[derive(Debug, Clone, PartialEq)]
pub enum StepKind {
    Tool(ToolStep),
    Parallel(Vec<Step>),
    Merge(MergeDef),
    Vote(VoteDef),
    Conditional(Conditional),
}

impl StepKind {
    pub fn label(&self) -> &str {
        match self {
            StepKind::Tool(t) => &t.tool,
            StepKind::Parallel(_) => "parallel",
            StepKind::Merge(_) => "merge",
            StepKind::Vote(_) => "vote",
            StepKind::Conditional(_) => "conditional",
        }
    }
}

/// One unit of work within a bundle.
#[derive(Debug, Clone, PartialEq)]
pub struct Step {
    /// Unique within the bundle; the context key for this step's envelope.
    pub name: String,
    /// Guard: the step is skipped when this evaluates false.
    /// Never set on conditional steps, which carry their own expression.
    pub guard: Option<String>,
    /// File name to persist this step's output under, if any.
    pub save: Option<String>,
    pub kind: StepKind,
}

impl Step {
    fn with_kind(name: impl Into<String>, kind: StepKind) -> Self {
        Self {
            name: name.into(),
            guard: None,
            save: None,
            kind,
        }
    }

    pub fn tool(name: impl Into<String>, tool: impl Into<String>, task: impl Into<String>) -> Self {
        Self::with_kind(
            name,
            StepKind::Tool(ToolStep {
                tool: tool.into(),
                model: None,
                task: task.into(),
            }),
        )
    }

    pub fn parallel(name: impl Into<String>, steps: Vec<Step>) -> Self {
        Self::with_kind(name, StepKind::Parallel(steps))
    }

    pub fn merge(name: impl Into<String>, inputs: &[&str], strategy: MergeStrategy) -> Self {
        Self::with_kind(
            name,
            StepKind::Merge(MergeDef {
                inputs: inputs.iter().map(|s| s.to_string()).collect(),
                strategy,
            }),
        )
    }

    pub fn vote(name: impl Into<String>, inputs: &[&str], strategy: VoteStrategy) -> Self {
        Self::with_kind(
            name,
            StepKind::Vote(VoteDef {
                inputs: inputs.iter().map(|s| s.to_string()).collect(),
                strategy,
            }),
        )
    }

    pub fn conditional(
        name: impl Into<String>,
        expr: impl Into<String>,
        then: Step,
        otherwise: Option<Step>,
    ) -> Self {
        Self::with_kind(
            name,
            StepKind::Conditional(Conditional {
                expr: expr.into(),
                then: Box::new(then),
                otherwise: otherwise.map(Box::new),
            }),
        )
    }

    /// Set the guard expression.
    pub fn with_guard(mut self, expr: impl Into<String>) -> Self {
        self.guard = Some(expr.into());
        self
    }

    /// Set the model override (tool steps only).
    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        if let StepKind::Tool(ref mut t) = self.kind {
            t.model = Some(model.into());
        }
        self
    }

    /// Set the save hint.
    pub fn with_save(mut self, file_name: impl Into<String>) -> Self {
        self.save = Some(file_name.into());
        self
    }
}

/// Flat wire form of a step.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RawStep {
    pub name: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub task: Option<String>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub parallel: Vec<RawStep>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub merge: Option<MergeDef>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub vote: Option<VoteDef>,

    #[serde(default, rename = "if", skip_serializing_if = "Option::is_none")]
    pub condition: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub then: Option<Box<RawStep>>,
    #[serde(default, rename = "else", skip_serializing_if = "Option::is_none")]
    pub otherwise: Option<Box<RawStep>>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub save: Option<String>,
}

impl TryFrom<RawStep> for Step {
    type Error = BatonError;

    fn try_from(raw: RawStep) -> Result<Self> {
        let mut shapes = Vec::new();
        if raw.tool.is_some() {
            shapes.push("tool");
        }
        if !raw.parallel.is_empty() {
            shapes.push("parallel");
        }
        if raw.merge.is_some() {
            shapes.push("merge");
        }
        if raw.vote.is_some() {
            shapes.push("vote");
        }
        if raw.then.is_some() {
            shapes.push("then");
        }

        if shapes.len() > 1 {
            return Err(BatonError::InvalidBundle(format!(
                "step '{}' mixes shapes: {}",
                raw.name,
                shapes.join(", ")
            )));
        }
        if raw.otherwise.is_some() && raw.then.is_none() {
            return Err(BatonError::InvalidBundle(format!(
                "step '{}' has 'else' without 'then'",
                raw.name
            )));
        }
        if raw.model.is_some() && raw.tool.is_none() {
            return Err(BatonError::InvalidBundle(format!(
                "step '{}' sets 'model' without 'tool'",
                raw.name
            )));
        }

        let (kind, guard) = if let Some(tool) = raw.tool {
            let task = raw.task.ok_or_else(|| {
                BatonError::InvalidBundle(format!("tool step '{}' has no 'task'", raw.name))
            })?;
            let kind = StepKind::Tool(ToolStep {
                tool,
                model: raw.model,
                task,
            });
            (kind, raw.condition)
        } else if !raw.parallel.is_empty() {
            let steps = raw
                .parallel
                .into_iter()
                .map(Step::try_from)
                .collect::<Result<Vec<_>>>()?;
            (StepKind::Parallel(steps), raw.condition)
        } else if let Some(merge) = raw.merge {
            (StepKind::Merge(merge), raw.condition)
        } else if let Some(vote) = raw.vote {
            (StepKind::Vote(vote), raw.condition)
        } else if let Some(then) = raw.then {
            let expr = raw.condition.ok_or_else(|| {
                BatonError::InvalidBundle(format!(
                    "conditional step '{}' has no 'if' expression",
                    raw.name
                ))
            })?;
            let otherwise = match raw.otherwise {
                Some(o) => Some(Box::new(Step::try_from(*o)?)),
                None => None,
            };
            let kind = StepKind::Conditional(Conditional {
                expr,
                then: Box::new(Step::try_from(*then)?),
                otherwise,
            });
            (kind, None)
        } else {
            return Err(BatonError::InvalidBundle(format!(
                "step '{}' has no tool, parallel, merge, vote, or then",
                raw.name
            )));
        };

        Ok(Step {
            name: raw.name,
            guard,
            save: raw.save,
            kind,
        })
    }
}

impl From<Step> for RawStep {
    fn from(step: Step) -> Self {
        let mut raw = RawStep {
            name: step.name,
            condition: step.guard,
            save: step.save,
            ..Default::default()
        };
        match step.kind {
            StepKind::Tool(t) => {
                raw.tool = Some(t.tool);
                raw.model = t.model;
                raw.task = Some(t.task);
            }
            StepKind::Parallel(steps) => {
                raw.parallel = steps.into_iter().map(RawStep::from).collect();
            }
            StepKind::Merge(m) => raw.merge = Some(m),
            StepKind::Vote(v) => raw.vote = Some(v),
            StepKind::Conditional(c) => {
                raw.condition = Some(c.expr);
                raw.then = Some(Box::new(RawStep::from(*c.then)));
                raw.otherwise = c.otherwise.map(|o| Box::new(RawStep::from(*o)));
            }
        }
        raw
    }
}

/// Flat wire form of a bundle.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RawBundle {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub inputs: Vec<InputDef>,
    pub steps: Vec<RawStep>,
}

/// A validated workflow definition.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "RawBundle", into = "RawBundle")]
pub struct Bundle {
    pub name: String,
    pub description: Option<String>,
    pub inputs: Vec<InputDef>,
    pub steps: Vec<Step>,
    /// Where the bundle was loaded from, if it came from a file.
    pub source_path: Option<PathBuf>,
}

impl TryFrom<RawBundle> for Bundle {
    type Error = BatonError;

    fn try_from(raw: RawBundle) -> Result<Self> {
        let steps = raw
            .steps
            .into_iter()
            .map(Step::try_from)
            .collect::<Result<Vec<_>>>()?;
        let mut bundle = Bundle::new(raw.name, raw.inputs, steps)?;
        bundle.description = raw.description;
        Ok(bundle)
    }
}

impl From<Bundle> for RawBundle {
    fn from(bundle: Bundle) -> Self {
        RawBundle {
            name: bundle.name,
            description: bundle.description,
            inputs: bundle.inputs,
            steps: bundle.steps.into_iter().map(RawStep::from).collect(),
        }
    }
}

impl Bundle {
    /// Build and validate a bundle.
    pub fn new(name: impl Into<String>, inputs: Vec<InputDef>, steps: Vec<Step>) -> Result<Self> {
        let bundle = Self {
            name: name.into(),
            description: None,
            inputs,
            steps,
            source_path: None,
        };
        bundle.validate()?;
        Ok(bundle)
    }

    /// Parse a bundle from JSON.
    pub fn from_json(json: &str) -> Result<Self> {
        serde_json::from_str(json)
            .map_err(|e| BatonError::InvalidBundle(e.to_string()))
    }

    pub fn to_json_pretty(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Check structural invariants.
    pub fn validate(&self) -> Result<()> {
        if self.name.trim().is_empty() {
            return Err(BatonError::InvalidBundle("bundle name is empty".into()));
        }
        if self.steps.is_empty() {
            return Err(BatonError::InvalidBundle(format!(
                "bundle '{}' has no steps",
                self.name
            )));
        }

        let mut input_names = HashSet::new();
        for input in &self.inputs {
            if input.name.trim().is_empty() {
                return Err(BatonError::InvalidBundle("input name is empty".into()));
            }
            if !input_names.insert(input.name.as_str()) {
                return Err(BatonError::InvalidBundle(format!(
                    "duplicate input '{}'",
                    input.name
                )));
            }
        }

        let mut seen = HashSet::new();
        for step in &self.steps {
            validate_step(step, &mut seen)?;
        }
        Ok(())
    }

    /// Apply defaults to the supplied inputs and check required ones.
    ///
    /// Inputs that were supplied but not declared are passed through.
    pub fn resolve_inputs(
        &self,
        supplied: HashMap<String, String>,
    ) -> Result<HashMap<String, String>> {
        let mut resolved = supplied;
        for input in &self.inputs {
            if resolved.contains_key(&input.name) {
                continue;
            }
            match (&input.default, input.required) {
                (Some(default), _) => {
                    resolved.insert(input.name.clone(), default.clone());
                }
                (None, true) => return Err(BatonError::MissingInput(input.name.clone())),
                (None, false) => {}
            }
        }
        Ok(resolved)
    }

    /// Total number of steps including nested ones.
    pub fn step_count(&self) -> usize {
        fn count(step: &Step) -> usize {
            1 + match &step.kind {
                StepKind::Parallel(steps) => steps.iter().map(count).sum(),
                StepKind::Conditional(c) => {
                    count(&c.then) + c.otherwise.as_deref().map(count).unwrap_or(0)
                }
                _ => 0,
            }
        }
        self.steps.iter().map(count).sum()
    }
}

fn validate_step<'a>(step: &'a Step, seen: &mut HashSet<&'a str>) -> Result<()> {
    if step.name.trim().is_empty() {
        return Err(BatonError::InvalidBundle("step name is empty".into()));
    }
    if !seen.insert(step.name.as_str()) {
        return Err(BatonError::InvalidBundle(format!(
            "duplicate step name '{}'",
            step.name
        )));
    }
    if let Some(ref save) = step.save {
        validate_file_name(save).map_err(|reason| {
            BatonError::InvalidBundle(format!("step '{}': save '{}' {}", step.name, save, reason))
        })?;
    }

    match &step.kind {
        StepKind::Tool(t) => {
            if t.tool.trim().is_empty() {
                return Err(BatonError::InvalidBundle(format!(
                    "step '{}' has an empty tool",
                    step.name
                )));
            }
            if t.task.trim().is_empty() {
                return Err(BatonError::InvalidBundle(format!(
                    "step '{}' has an empty task",
                    step.name
                )));
            }
        }
        StepKind::Parallel(steps) => {
            if steps.is_empty() {
                return Err(BatonError::InvalidBundle(format!(
                    "parallel step '{}' has no sub-steps",
                    step.name
                )));
            }
            for sub in steps {
                validate_step(sub, seen)?;
            }
        }
        StepKind::Merge(MergeDef { inputs, .. }) | StepKind::Vote(VoteDef { inputs, .. }) => {
            if inputs.is_empty() {
                return Err(BatonError::InvalidBundle(format!(
                    "step '{}' lists no sources",
                    step.name
                )));
            }
        }
        StepKind::Conditional(c) => {
            if step.guard.is_some() {
                return Err(BatonError::InvalidBundle(format!(
                    "conditional step '{}' cannot also carry a guard",
                    step.name
                )));
            }
            if c.expr.trim().is_empty() {
                return Err(BatonError::InvalidBundle(format!(
                    "conditional step '{}' has an empty expression",
                    step.name
                )));
            }
            validate_step(&c.then, seen)?;
            if let Some(ref otherwise) = c.otherwise {
                validate_step(otherwise, seen)?;
            }
        }
    }
    Ok(())
}

/// A save hint must be a plain file name inside the job directory.
fn validate_file_name(name: &str) -> std::result::Result<(), &'static str> {
    if name.is_empty() {
        return Err("is empty");
    }
    if name.starts_with('.') {
        return Err("must not start with '.'");
    }
    if name.contains('/') || name.contains('\\') {
        return Err("must not contain path separators");
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_minimal_bundle() {
        let json = r#"{
            "name": "hello",
            "steps": [{ "name": "greet", "tool": "claude", "task": "Say hi" }]
        }"#;
        let bundle = Bundle::from_json(json).unwrap();
        assert_eq!(bundle.name, "hello");
        assert_eq!(bundle.steps.len(), 1);
        match &bundle.steps[0].kind {
            StepKind::Tool(t) => {
                assert_eq!(t.tool, "claude");
                assert_eq!(t.task, "Say hi");
                assert!(t.model.is_none());
            }
            other => panic!("expected tool step, got {:?}", other),
        }
    }

    #[test]
    fn test_parse_all_shapes() {
        let json = r#"{
            "name": "full",
            "description": "every shape",
            "inputs": [
                { "name": "codebase", "required": true },
                { "name": "depth", "default": "2" }
            ],
            "steps": [
                { "name": "fan", "parallel": [
                    { "name": "a", "tool": "claude", "task": "A", "model": "opus" },
                    { "name": "b", "tool": "codex", "task": "B", "if": "${inputs.depth} > 1" }
                ]},
                { "name": "merged", "merge": { "inputs": ["a", "b"], "strategy": "dedupe" } },
                { "name": "picked", "vote": { "inputs": ["a", "b"], "strategy": "majority" }, "save": "pick.txt" },
                { "name": "branch", "if": "${steps.picked.status} == success",
                  "then": { "name": "yes", "tool": "gemini", "task": "ok" },
                  "else": { "name": "no", "tool": "gemini", "task": "not ok" } }
            ]
        }"#;
        let bundle = Bundle::from_json(json).unwrap();
        assert_eq!(bundle.description.as_deref(), Some("every shape"));
        assert_eq!(bundle.steps.len(), 4);
        assert_eq!(bundle.step_count(), 8);

        match &bundle.steps[0].kind {
            StepKind::Parallel(subs) => {
                assert_eq!(subs.len(), 2);
                assert_eq!(subs[1].guard.as_deref(), Some("${inputs.depth} > 1"));
            }
            other => panic!("expected parallel, got {:?}", other),
        }
        assert!(matches!(
            bundle.steps[1].kind,
            StepKind::Merge(MergeDef { strategy: MergeStrategy::Dedupe, .. })
        ));
        assert_eq!(bundle.steps[2].save.as_deref(), Some("pick.txt"));
        match &bundle.steps[3].kind {
            StepKind::Conditional(c) => {
                assert_eq!(c.expr, "${steps.picked.status} == success");
                assert_eq!(c.then.name, "yes");
                assert_eq!(c.otherwise.as_ref().unwrap().name, "no");
            }
            other => panic!("expected conditional, got {:?}", other),
        }
        assert!(bundle.steps[3].guard.is_none());
    }

    #[test]
    fn test_reject_mixed_shapes() {
        let json = r#"{
            "name": "bad",
            "steps": [{ "name": "x", "tool": "claude", "task": "t",
                        "merge": { "inputs": ["a"], "strategy": "concat" } }]
        }"#;
        let err = Bundle::from_json(json).unwrap_err();
        assert!(err.to_string().contains("mixes shapes"), "{}", err);
    }

    #[test]
    fn test_reject_empty_step() {
        let json = r#"{ "name": "bad", "steps": [{ "name": "x" }] }"#;
        let err = Bundle::from_json(json).unwrap_err();
        assert!(err.to_string().contains("has no tool"), "{}", err);
    }

    #[test]
    fn test_reject_empty_task() {
        let err = Bundle::new("b", vec![], vec![Step::tool("s", "echo", "  ")]).unwrap_err();
        assert!(err.to_string().contains("empty task"), "{}", err);

        let json = r#"{ "name": "b", "steps": [{ "name": "s", "tool": "echo" }] }"#;
        let err = Bundle::from_json(json).unwrap_err();
        assert!(err.to_string().contains("has no 'task'"), "{}", err);

        let json = r#"{ "name": "b", "steps": [{ "name": "s", "tool": "echo", "task": "" }] }"#;
        assert!(Bundle::from_json(json).is_err());
    }

    #[test]
    fn test_reject_else_without_then() {
        let json = r#"{
            "name": "bad",
            "steps": [{ "name": "x", "if": "true",
                        "else": { "name": "y", "tool": "claude", "task": "t" } }]
        }"#;
        assert!(Bundle::from_json(json).is_err());
    }

    #[test]
    fn test_reject_unknown_strategy() {
        let json = r#"{
            "name": "bad",
            "steps": [{ "name": "x", "vote": { "inputs": ["a"], "strategy": "loudest" } }]
        }"#;
        assert!(Bundle::from_json(json).is_err());
    }

    #[test]
    fn test_reject_duplicate_names_in_branches() {
        let steps = vec![
            Step::tool("a", "claude", "one"),
            Step::parallel(
                "fan",
                vec![Step::tool("b", "claude", "two"), Step::tool("a", "codex", "three")],
            ),
        ];
        let err = Bundle::new("dupes", vec![], steps).unwrap_err();
        assert!(err.to_string().contains("duplicate step name 'a'"));
    }

    #[test]
    fn test_reject_bad_save_hint() {
        let step = Step::tool("a", "claude", "t").with_save("../escape.txt");
        assert!(Bundle::new("b", vec![], vec![step]).is_err());

        let step = Step::tool("a", "claude", "t").with_save(".hidden");
        assert!(Bundle::new("b", vec![], vec![step]).is_err());

        let step = Step::tool("a", "claude", "t").with_save("report.md");
        assert!(Bundle::new("b", vec![], vec![step]).is_ok());
    }

    #[test]
    fn test_reject_empty_sources() {
        let step = Step::merge("m", &[], MergeStrategy::Concat);
        assert!(Bundle::new("b", vec![], vec![step]).is_err());
    }

    #[test]
    fn test_resolve_inputs() {
        let bundle = Bundle::new(
            "b",
            vec![
                InputDef::required("codebase"),
                InputDef::required("task").with_default("review"),
                InputDef::optional("extra"),
            ],
            vec![Step::tool("a", "claude", "${inputs.task}")],
        )
        .unwrap();

        let mut supplied = HashMap::new();
        supplied.insert("codebase".to_string(), "/src".to_string());
        let resolved = bundle.resolve_inputs(supplied).unwrap();
        assert_eq!(resolved["codebase"], "/src");
        assert_eq!(resolved["task"], "review");
        assert!(!resolved.contains_key("extra"));

        let err = bundle.resolve_inputs(HashMap::new()).unwrap_err();
        assert!(matches!(err, BatonError::MissingInput(ref n) if n == "codebase"));
    }

    #[test]
    fn test_json_roundtrip_preserves_shape() {
        let bundle = Bundle::new(
            "rt",
            vec![],
            vec![
                Step::tool("a", "claude", "t").with_model("opus").with_guard("true"),
                Step::conditional("c", "1 < 2", Step::tool("d", "codex", "x"), None),
            ],
        )
        .unwrap();
        let json = bundle.to_json_pretty().unwrap();
        assert!(json.contains("\"if\": \"1 < 2\""));
        let parsed = Bundle::from_json(&json).unwrap();
        assert_eq!(parsed, bundle);
    }
}
