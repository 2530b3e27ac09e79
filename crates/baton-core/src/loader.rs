use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use std::sync::OnceLock;

use regex::Regex;
use tracing::{debug, warn};

use crate::bundle::Bundle;
use crate::config::AppConfig;
use crate::error::{BatonError, Result};

/// Bundles compiled into the binary: (name, JSON).
const BUILTIN_BUNDLES: &[(&str, &str)] = &[
    ("consensus", include_str!("../bundles/consensus.json")),
    ("review", include_str!("../bundles/review.json")),
];

const MAX_NAME_LEN: usize = 100;

fn name_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"^[a-zA-Z0-9][a-zA-Z0-9_-]*$").expect("valid regex"))
}

/// Check that a bundle name is safe to use as a file name.
pub fn validate_bundle_name(name: &str) -> Result<()> {
    if name.is_empty() {
        return Err(BatonError::InvalidBundle("invalid bundle name: empty".into()));
    }
    if name.len() > MAX_NAME_LEN {
        return Err(BatonError::InvalidBundle(format!(
            "invalid bundle name: too long (max {} chars)",
            MAX_NAME_LEN
        )));
    }
    if !name_pattern().is_match(name) {
        return Err(BatonError::InvalidBundle(
            "invalid bundle name: must contain only alphanumeric, hyphens, underscores".into(),
        ));
    }
    Ok(())
}

/// Finds bundles in the user bundle directory, then among the built-ins.
pub struct BundleLoader {
    user_dir: PathBuf,
}

impl BundleLoader {
    pub fn new(user_dir: impl Into<PathBuf>) -> Self {
        Self {
            user_dir: user_dir.into(),
        }
    }

    pub fn from_config(config: &AppConfig) -> Self {
        Self::new(config.bundles_dir())
    }

    /// Load a bundle by name. User bundles shadow built-ins.
    pub fn load(&self, name: &str) -> Result<Bundle> {
        validate_bundle_name(name)?;

        let user_path = self.user_dir.join(format!("{}.json", name));
        if user_path.is_file() {
            debug!(path = %user_path.display(), "Loading user bundle");
            return self.load_path(&user_path);
        }

        let (_, json) = BUILTIN_BUNDLES
            .iter()
            .find(|(builtin, _)| *builtin == name)
            .ok_or_else(|| BatonError::BundleNotFound(name.to_string()))?;

        debug!(bundle = %name, "Loading built-in bundle");
        Bundle::from_json(json).map_err(|e| {
            BatonError::InvalidBundle(format!("built-in bundle {}: {}", name, e))
        })
    }

    /// Load a bundle from an explicit file path.
    pub fn load_path(&self, path: &Path) -> Result<Bundle> {
        let content = std::fs::read_to_string(path)
            .map_err(|_| BatonError::BundleNotFound(path.display().to_string()))?;
        let mut bundle = Bundle::from_json(&content).map_err(|e| {
            BatonError::InvalidBundle(format!("{}: {}", path.display(), e))
        })?;
        bundle.source_path = Some(path.to_path_buf());
        Ok(bundle)
    }

    /// Load by name, or by path when the argument looks like a file.
    pub fn resolve(&self, name_or_path: &str) -> Result<Bundle> {
        let path = Path::new(name_or_path);
        if name_or_path.ends_with(".json") || path.components().count() > 1 {
            self.load_path(path)
        } else {
            self.load(name_or_path)
        }
    }

    /// Names of all available bundles, sorted.
    pub fn list(&self) -> Vec<String> {
        let mut names: BTreeSet<String> = BUILTIN_BUNDLES
            .iter()
            .map(|(name, _)| name.to_string())
            .collect();

        match std::fs::read_dir(&self.user_dir) {
            Ok(entries) => {
                for entry in entries.flatten() {
                    let path = entry.path();
                    if path.extension().and_then(|e| e.to_str()) != Some("json") {
                        continue;
                    }
                    if let Some(stem) = path.file_stem().and_then(|s| s.to_str()) {
                        if validate_bundle_name(stem).is_ok() {
                            names.insert(stem.to_string());
                        } else {
                            warn!(path = %path.display(), "Ignoring bundle with invalid name");
                        }
                    }
                }
            }
            Err(e) => {
                debug!(path = %self.user_dir.display(), error = %e, "Cannot read bundle directory");
            }
        }

        names.into_iter().collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    #[test]
    fn test_rejects_path_traversal() {
        let loader = BundleLoader::new("/nonexistent");
        for name in [
            "../../../etc/passwd",
            "..\\..\\windows\\system32",
            "foo/../bar",
            "./hidden",
            "foo/bar",
            ".hidden",
        ] {
            let err = loader.load(name).unwrap_err();
            assert!(
                err.to_string().contains("invalid bundle name"),
                "{} gave {}",
                name,
                err
            );
        }
    }

    #[test]
    fn test_validate_bundle_name() {
        for (name, valid) in [
            ("compete", true),
            ("security-review", true),
            ("red_team", true),
            ("a", true),
            ("", false),
            ("foo/bar", false),
            ("-leading", false),
        ] {
            assert_eq!(validate_bundle_name(name).is_ok(), valid, "{}", name);
        }
        assert!(validate_bundle_name(&"a".repeat(100)).is_ok());
        assert!(validate_bundle_name(&"a".repeat(101)).is_err());
    }

    #[test]
    fn test_builtins_parse() {
        let loader = BundleLoader::new("/nonexistent");
        for (name, _) in BUILTIN_BUNDLES {
            let bundle = loader.load(name).unwrap();
            assert_eq!(&bundle.name, name);
        }
    }

    #[test]
    fn test_unknown_bundle() {
        let loader = BundleLoader::new("/nonexistent");
        let err = loader.load("does-not-exist").unwrap_err();
        assert!(matches!(err, BatonError::BundleNotFound(_)));
    }

    #[test]
    fn test_user_bundle_shadows_builtin() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(
            dir.path().join("review.json"),
            r#"{ "name": "review", "description": "mine",
                 "steps": [{ "name": "only", "tool": "echo", "task": "hi" }] }"#,
        )
        .unwrap();

        let loader = BundleLoader::new(dir.path());
        let bundle = loader.load("review").unwrap();
        assert_eq!(bundle.description.as_deref(), Some("mine"));
        assert_eq!(bundle.source_path.as_deref(), Some(dir.path().join("review.json").as_path()));
    }

    #[test]
    fn test_list_merges_and_sorts() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("alpha.json"), "{}").unwrap();
        fs::write(dir.path().join("review.json"), "{}").unwrap();
        fs::write(dir.path().join("notes.txt"), "").unwrap();

        let names = BundleLoader::new(dir.path()).list();
        assert_eq!(names, vec!["alpha", "consensus", "review"]);
    }

    #[test]
    fn test_resolve_path() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("custom.json");
        fs::write(
            &path,
            r#"{ "name": "custom", "steps": [{ "name": "s", "tool": "echo", "task": "x" }] }"#,
        )
        .unwrap();

        let loader = BundleLoader::new("/nonexistent");
        let bundle = loader.resolve(path.to_str().unwrap()).unwrap();
        assert_eq!(bundle.name, "custom");
        assert!(loader.resolve("consensus").is_ok());
    }

    #[test]
    fn test_invalid_user_bundle() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("broken.json"), r#"{ "name": "broken", "steps": [] }"#).unwrap();
        let err = BundleLoader::new(dir.path()).load("broken").unwrap_err();
        assert!(matches!(err, BatonError::InvalidBundle(_)));
    }
}
