use std::path::PathBuf;
use std::sync::Arc;

use crate::backend::{AudioBackend, TARGET_EXTENSION};
use crate::media::{MediaFile, MediaStage, Stage, StageReport};
use crate::workspace::Workspace;
use crate::{MashupError, Result};

/// Converts every fetched file to MP3
pub struct Transcoder {
    backend: Arc<dyn AudioBackend>,
    workspace: Workspace,
}

impl Transcoder {
    pub fn new(backend: Arc<dyn AudioBackend>, workspace: Workspace) -> Self {
        Self { backend, workspace }
    }

    pub fn output_for(&self, ordinal: usize) -> PathBuf {
        self.workspace
            .path_for(&format!("audio_{}.{}", ordinal, TARGET_EXTENSION))
    }

    pub async fn transcode(&self, files: &[MediaFile]) -> StageReport {
        let mut report = StageReport::new(Stage::Transcode);

        for (index, file) in files.iter().enumerate() {
            tracing::info!("Converting video {}/{} to audio", index + 1, files.len());
            let result = self.transcode_one(file).await;
            report.record(file.ordinal, result);
        }

        tracing::info!("{}", report.summary());
        report
    }

    async fn transcode_one(&self, file: &MediaFile) -> Result<MediaFile> {
        let output = self.output_for(file.ordinal);
        // Tracked before the backend runs so a half-written file is swept too
        self.workspace.track(&output);

        self.backend.transcode(file.path(), &output).await?;

        if !output.is_file() {
            return Err(MashupError::MissingOutput(output));
        }
        Ok(file.advance(output, MediaStage::Transcoded))
    }
}
