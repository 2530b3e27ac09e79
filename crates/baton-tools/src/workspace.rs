use std::path::{Path, PathBuf};

use futures::future::BoxFuture;
use sha2::{Digest, Sha256};
use tracing::debug;

use baton_core::error::{BatonError, Result};
use baton_core::traits::OutputSink;
use baton_core::types::RunId;

/// On-disk job directory for one run.
///
/// ```text
/// <jobs_dir>/<run_id>/
///   outputs/<escaped step name>.json
///   <save hint files>
///   run.jsonl
/// ```
pub struct Workspace {
    job_dir: PathBuf,
}

impl Workspace {
    pub fn new(jobs_dir: &Path, run_id: &RunId) -> Self {
        Self::at(jobs_dir.join(run_id.as_str()))
    }

    /// Use an explicit job directory.
    pub fn at(job_dir: impl Into<PathBuf>) -> Self {
        Self {
            job_dir: job_dir.into(),
        }
    }

    pub fn job_dir(&self) -> &Path {
        &self.job_dir
    }

    pub fn outputs_dir(&self) -> PathBuf {
        self.job_dir.join("outputs")
    }

    pub fn output_path(&self, step: &str) -> PathBuf {
        self.outputs_dir()
            .join(format!("{}.json", escape_step_name(step)))
    }

    pub fn run_log_path(&self) -> PathBuf {
        self.job_dir.join("run.jsonl")
    }
}

/// Longest escaped stem written as-is. Longer stems are shortened.
const MAX_STEM_LEN: usize = 200;

/// Map a step name onto a file stem.
///
/// ASCII alphanumerics, `-` and `_` pass through; every other byte becomes
/// `%XX`. `%` itself is escaped, so distinct names never share a stem.
/// A stem over [`MAX_STEM_LEN`] bytes is cut and suffixed with `~` and a
/// SHA-256 prefix of the full name. Short stems never contain a bare `~`.
pub fn escape_step_name(name: &str) -> String {
    let mut escaped = String::with_capacity(name.len());
    for byte in name.bytes() {
        if byte.is_ascii_alphanumeric() || byte == b'-' || byte == b'_' {
            escaped.push(byte as char);
        } else {
            escaped.push_str(&format!("%{:02X}", byte));
        }
    }
    if escaped.len() <= MAX_STEM_LEN {
        return escaped;
    }

    let digest = Sha256::digest(name.as_bytes());
    let suffix: String = digest[..8].iter().map(|b| format!("{:02x}", b)).collect();
    // Escaped text is pure ASCII, so any byte index is a char boundary.
    escaped.truncate(MAX_STEM_LEN - suffix.len() - 1);
    escaped.push('~');
    escaped.push_str(&suffix);
    escaped
}

fn workspace_err(action: &str, path: &Path, e: std::io::Error) -> BatonError {
    BatonError::Workspace(format!("cannot {} {}: {}", action, path.display(), e))
}

impl OutputSink for Workspace {
    fn prepare(&self) -> BoxFuture<'_, Result<()>> {
        Box::pin(async move {
            let outputs = self.outputs_dir();
            tokio::fs::create_dir_all(&outputs)
                .await
                .map_err(|e| workspace_err("create", &outputs, e))?;
            debug!(job_dir = %self.job_dir.display(), "Prepared job directory");
            Ok(())
        })
    }

    fn write_output<'a>(
        &'a self,
        step: &'a str,
        payload: &'a serde_json::Value,
    ) -> BoxFuture<'a, Result<String>> {
        Box::pin(async move {
            let path = self.output_path(step);
            let body = serde_json::to_vec_pretty(payload)?;
            tokio::fs::write(&path, body)
                .await
                .map_err(|e| workspace_err("write", &path, e))?;
            Ok(path.display().to_string())
        })
    }

    fn save<'a>(&'a self, file_name: &'a str, content: &'a str) -> BoxFuture<'a, Result<String>> {
        Box::pin(async move {
            if file_name.is_empty()
                || file_name.starts_with('.')
                || file_name.contains(|c: char| c == '/' || c == '\\')
            {
                return Err(BatonError::Workspace(format!(
                    "invalid save file name: {:?}",
                    file_name
                )));
            }
            let path = self.job_dir.join(file_name);
            tokio::fs::write(&path, content)
                .await
                .map_err(|e| workspace_err("write", &path, e))?;
            Ok(path.display().to_string())
        })
    }

    fn location(&self) -> String {
        self.job_dir.display().to_string()
    }
}
