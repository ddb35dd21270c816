use anyhow::{Context, Result};
use std::fs::{self, File};
use std::io::Write;
use std::path::{Path, PathBuf};
use zip::write::FileOptions;
use zip::{CompressionMethod, ZipWriter};

/// Writes `images` into a flat zip at `archive`, one entry per file name.
pub fn write_archive(archive: &Path, images: &[PathBuf]) -> Result<usize> {
    if let Some(parent) = archive.parent().filter(|parent| !parent.as_os_str().is_empty()) {
        fs::create_dir_all(parent)
            .with_context(|| format!("failed to create directory: {}", parent.display()))?;
    }
    let file = File::create(archive)
        .with_context(|| format!("failed to create archive: {}", archive.display()))?;
    let mut writer = ZipWriter::new(file);
    // PNG data is already compressed.
    let options = FileOptions::default().compression_method(CompressionMethod::Stored);

    let mut written = 0usize;
    for image in images {
        let Some(name) = image.file_name().map(|name| name.to_string_lossy().to_string()) else {
            continue;
        };
        let data =
            fs::read(image).with_context(|| format!("failed to read image: {}", image.display()))?;
        writer
            .start_file(name, options)
            .with_context(|| "failed to write zip entry")?;
        writer
            .write_all(&data)
            .with_context(|| "failed to write zip entry data")?;
        written += 1;
    }
    writer.finish().with_context(|| "failed to finish archive")?;
    Ok(written)
}
