use anyhow::{Context, Result};
use std::io::Write;
use std::path::{Path, PathBuf};
use zip::write::FileOptions;
use zip::{CompressionMethod, ZipWriter};

/// Write a zip archive holding `source` under its base name
pub fn zip_output(source: &Path, archive: &Path) -> Result<PathBuf> {
    let name = source
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .with_context(|| format!("{} has no file name", source.display()))?;
    let content = fs_err::read(source)?;

    let file = fs_err::File::create(archive)?;
    let mut writer = ZipWriter::new(file);
    let options = FileOptions::default().compression_method(CompressionMethod::Deflated);

    writer
        .start_file(name.as_str(), options)
        .context("Failed to start zip entry")?;
    writer.write_all(&content)?;
    writer.finish().context("Failed to finish zip archive")?;

    tracing::info!("Packaged {} into {}", name, archive.display());
    Ok(archive.to_path_buf())
}
