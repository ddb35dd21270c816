use anyhow::{Context, Result};
use std::fs;
use std::path::{Path, PathBuf};

const BASE_DIR_ENV: &str = "MANGAQUICK_RUST_DIR";

/// Files of one page under the work directory, keyed by the page's base name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageLayout {
    name: String,
    work_dir: PathBuf,
}

impl PageLayout {
    pub fn new(work_dir: &Path, name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            work_dir: work_dir.to_path_buf(),
        }
    }

    /// Layout for `page`, named after its file stem.
    pub fn for_page(work_dir: &Path, page: &Path) -> Option<Self> {
        let stem = page.file_stem()?.to_string_lossy().to_string();
        if stem.is_empty() {
            return None;
        }
        Some(Self::new(work_dir, stem))
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn segmentation_root(work_dir: &Path) -> PathBuf {
        work_dir.join("segmentation")
    }

    pub fn inpainting_root(work_dir: &Path) -> PathBuf {
        work_dir.join("inpainting")
    }

    pub fn translated_root(work_dir: &Path) -> PathBuf {
        work_dir.join("translated")
    }

    pub fn segmentation_dir(&self) -> PathBuf {
        Self::segmentation_root(&self.work_dir).join(&self.name)
    }

    pub fn source_image(&self) -> PathBuf {
        self.segmentation_dir().join(format!("{}.png", self.name))
    }

    pub fn mask(&self) -> PathBuf {
        self.segmentation_dir().join(format!("{}_mask.png", self.name))
    }

    pub fn regions(&self) -> PathBuf {
        self.segmentation_dir()
            .join(format!("{}_regions.json", self.name))
    }

    /// Inpainters name their output after the mask they consumed.
    pub fn inpainted_image(&self) -> PathBuf {
        Self::inpainting_root(&self.work_dir)
            .join(&self.name)
            .join(format!("{}_mask.png", self.name))
    }

    pub fn translated_image(&self) -> PathBuf {
        Self::translated_root(&self.work_dir).join(format!("{}.png", self.name))
    }

    pub fn ensure_dirs(&self) -> Result<()> {
        for dir in [
            self.segmentation_dir(),
            Self::inpainting_root(&self.work_dir),
            Self::translated_root(&self.work_dir),
        ] {
            fs::create_dir_all(&dir)
                .with_context(|| format!("failed to create directory: {}", dir.display()))?;
        }
        Ok(())
    }
}

/// `~/.mangaquick-rust`, or `$MANGAQUICK_RUST_DIR` when set.
pub(crate) fn settings_dir() -> Option<PathBuf> {
    if let Some(dir) = std::env::var(BASE_DIR_ENV)
        .ok()
        .and_then(|value| normalize_dir(&value))
    {
        return Some(dir);
    }
    home_join(".mangaquick-rust")
}

pub(crate) fn normalize_dir(value: &str) -> Option<PathBuf> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return None;
    }
    Some(PathBuf::from(expand_tilde(trimmed)))
}

fn home_join(suffix: &str) -> Option<PathBuf> {
    std::env::var("HOME").ok().and_then(|home| {
        let home = home.trim();
        if home.is_empty() {
            None
        } else {
            Some(Path::new(home).join(suffix))
        }
    })
}

fn expand_tilde(value: &str) -> String {
    if value != "~" && !value.starts_with("~/") {
        return value.to_string();
    }
    match std::env::var("HOME") {
        Ok(home) if !home.trim().is_empty() => format!("{}{}", home.trim(), &value[1..]),
        _ => value.to_string(),
    }
}
