use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard, OnceLock};

use baton_core::{value_text, Envelope, Status};
use regex::{Captures, Regex};
use tracing::warn;

fn template_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"\$\{([^}]+)\}").expect("valid regex"))
}

/// Shared state of one run.
///
/// Inputs are fixed when the run starts. Step envelopes are recorded as
/// steps finish, possibly from several parallel branches at once, so the
/// result map sits behind a mutex. Every read and write takes that lock.
#[derive(Debug, Default)]
pub struct Context {
    inputs: HashMap<String, String>,
    steps: Mutex<HashMap<String, Envelope>>,
    variables: HashMap<String, String>,
}

impl Context {
    pub fn new(inputs: HashMap<String, String>) -> Self {
        Self {
            inputs,
            steps: Mutex::new(HashMap::new()),
            variables: HashMap::new(),
        }
    }

    pub fn inputs(&self) -> &HashMap<String, String> {
        &self.inputs
    }

    pub fn input(&self, name: &str) -> Option<&str> {
        self.inputs.get(name).map(String::as_str)
    }

    /// Reserved namespace. Nothing reads it yet.
    pub fn variables(&self) -> &HashMap<String, String> {
        &self.variables
    }

    fn results(&self) -> MutexGuard<'_, HashMap<String, Envelope>> {
        // A panicking writer cannot leave a half-inserted entry behind.
        self.steps.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Record a step's envelope. Later writes replace earlier ones.
    pub fn set_result(&self, name: impl Into<String>, envelope: Envelope) {
        let name = name.into();
        let mut results = self.results();
        if results.contains_key(&name) {
            warn!(step = %name, "Overwriting recorded step result");
        }
        results.insert(name, envelope);
    }

    pub fn get_result(&self, name: &str) -> Option<Envelope> {
        self.results().get(name).cloned()
    }

    pub fn has_result(&self, name: &str) -> bool {
        self.results().contains_key(name)
    }

    /// Statuses of the named steps, read under a single lock acquisition.
    pub fn statuses(&self, names: &[&str]) -> Vec<Option<Status>> {
        let results = self.results();
        names
            .iter()
            .map(|name| results.get(*name).map(Envelope::status))
            .collect()
    }

    /// Copy of every recorded envelope.
    pub fn snapshot(&self) -> HashMap<String, Envelope> {
        self.results().clone()
    }

    /// Number of recorded step envelopes.
    pub fn len(&self) -> usize {
        self.results().len()
    }

    pub fn is_empty(&self) -> bool {
        self.results().is_empty()
    }

    /// Substitute `${...}` references in a single pass.
    ///
    /// Supported references:
    /// - `${inputs.<name>}`
    /// - `${steps.<name>.output_ref}`
    /// - `${steps.<name>.status}`
    /// - `${steps.<name>.result}` (compact JSON)
    /// - `${steps.<name>.result.<key>}`
    ///
    /// Anything unresolvable is left in place verbatim. Substituted text is
    /// never scanned again, so a value containing `${...}` stays literal.
    pub fn resolve(&self, template: &str) -> String {
        if !template.contains("${") {
            return template.to_string();
        }
        let results = self.results();
        template_pattern()
            .replace_all(template, |caps: &Captures<'_>| {
                self.lookup(&caps[1], &results)
                    .unwrap_or_else(|| caps[0].to_string())
            })
            .into_owned()
    }

    fn lookup(&self, reference: &str, results: &HashMap<String, Envelope>) -> Option<String> {
        let parts: Vec<&str> = reference.split('.').collect();
        match parts.as_slice() {
            ["inputs", name] => self.inputs.get(*name).cloned(),
            ["steps", name, field, rest @ ..] => {
                let envelope = results.get(*name)?;
                match (*field, rest) {
                    ("output_ref", []) => Some(envelope.output_ref().unwrap_or_default().to_string()),
                    ("status", []) => Some(envelope.status().as_str().to_string()),
                    ("result", []) => serde_json::to_string(envelope.result()).ok(),
                    // Everything after `result.` names one top-level key, dots
                    // included. Nested values are not traversed.
                    ("result", key) => envelope.result_value(&key.join(".")).map(value_text),
                    _ => None,
                }
            }
            _ => None,
        }
    }
}
