use std::path::PathBuf;
use std::sync::Arc;

use crate::backend::{AudioBackend, TARGET_EXTENSION};
use crate::media::{MediaFile, MediaStage, Stage, StageReport};
use crate::workspace::Workspace;
use crate::{MashupError, Result};

/// Cuts every clip down to its first `seconds`
pub struct Trimmer {
    backend: Arc<dyn AudioBackend>,
    workspace: Workspace,
}

impl Trimmer {
    pub fn new(backend: Arc<dyn AudioBackend>, workspace: Workspace) -> Self {
        Self { backend, workspace }
    }

    pub fn output_for(&self, ordinal: usize) -> PathBuf {
        self.workspace
            .path_for(&format!("cut_{}.{}", ordinal, TARGET_EXTENSION))
    }

    /// Clips shorter than `seconds` come through whole
    pub async fn trim(&self, files: &[MediaFile], seconds: u32) -> StageReport {
        let mut report = StageReport::new(Stage::Trim);

        for (index, file) in files.iter().enumerate() {
            tracing::info!("Trimming audio {}/{} to {}s", index + 1, files.len(), seconds);
            let result = self.trim_one(file, seconds).await;
            report.record(file.ordinal, result);
        }

        tracing::info!("{}", report.summary());
        report
    }

    async fn trim_one(&self, file: &MediaFile, seconds: u32) -> Result<MediaFile> {
        if seconds == 0 {
            return Err(MashupError::InvalidRequest(
                "clip duration must be greater than zero".to_string(),
            ));
        }

        let output = self.output_for(file.ordinal);
        self.workspace.track(&output);

        self.backend.trim(file.path(), &output, seconds).await?;

        if !output.is_file() {
            return Err(MashupError::MissingOutput(output));
        }
        Ok(file.advance(output, MediaStage::Trimmed))
    }
}
