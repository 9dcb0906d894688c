use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::backend::{AudioBackend, Backends};
use crate::media::MediaFile;
use crate::workspace::Workspace;

/// Joins the trimmed clips, in order, into the final file
pub struct Concatenator {
    backends: Backends,
    workspace: Workspace,
}

impl Concatenator {
    pub fn new(backends: Backends, workspace: Workspace) -> Self {
        Self {
            backends,
            workspace,
        }
    }

    /// Merge `files` into `output`
    ///
    /// Tries the primary backend, then the merge fallback. Returns whether the
    /// output file exists afterwards; errors are logged, never returned.
    pub async fn concatenate(&self, files: &[MediaFile], output: &Path) -> bool {
        if files.is_empty() {
            tracing::error!("Merge failed: nothing to merge");
            return false;
        }

        let inputs: Vec<PathBuf> = files.iter().map(|f| f.path.clone()).collect();

        // An older file at the same path must not pass for this run's output
        if output.is_file() {
            if let Err(e) = fs_err::remove_file(output) {
                tracing::error!("Merge failed: {}", e);
                return false;
            }
        }

        tracing::info!("Merging {} clips into {}", inputs.len(), output.display());

        if self.attempt(&self.backends.primary, &inputs, output).await {
            return true;
        }

        if let Some(fallback) = &self.backends.merge_fallback {
            tracing::info!("Retrying merge with the {} backend", fallback.name());
            if self.attempt(fallback, &inputs, output).await {
                return true;
            }
        }

        // A backend that died mid-write may have left part of the output behind
        if output.exists() {
            if let Err(e) = fs_err::remove_file(output) {
                tracing::warn!("{}", e);
            }
        }

        tracing::error!("Merge failed");
        false
    }

    async fn attempt(&self, backend: &Arc<dyn AudioBackend>, inputs: &[PathBuf], output: &Path) -> bool {
        match backend.concatenate(inputs, output, &self.workspace).await {
            Ok(()) if output.is_file() => {
                tracing::info!("Merged with {}: {}", backend.name(), output.display());
                true
            }
            Ok(()) => {
                tracing::warn!("{} reported success but {} is missing", backend.name(), output.display());
                false
            }
            Err(e) => {
                tracing::warn!("{} merge failed: {}", backend.name(), e);
                false
            }
        }
    }
}
