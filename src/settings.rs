use anyhow::{Context, Result, anyhow};
use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};

use crate::paths;

const DEFAULT_SETTINGS_TOML: &str = include_str!("../settings.toml");

#[derive(Debug, Clone, PartialEq)]
pub struct Settings {
    pub dilation_iterations: u32,
    pub tolerance: u32,
    pub masks_dir: PathBuf,
    pub font_path: Option<PathBuf>,
    pub font_size: u32,
    pub min_font_size: u32,
    pub provider: String,
    pub target_lang: String,
    pub model: Option<String>,
    pub url: Option<String>,
    pub strip_parenthetical: bool,
    pub ocr_languages: String,
    pub ocr_psm: u32,
    pub crop_padding: u32,
    pub inpaint_command: Vec<String>,
    pub work_dir: PathBuf,
    pub archive: PathBuf,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            dilation_iterations: 3,
            tolerance: 5,
            masks_dir: PathBuf::from("masks"),
            font_path: None,
            font_size: 15,
            min_font_size: 8,
            provider: "deepl".to_string(),
            target_lang: "EN-US".to_string(),
            model: None,
            url: None,
            strip_parenthetical: true,
            ocr_languages: "jpn".to_string(),
            ocr_psm: 6,
            crop_padding: 15,
            inpaint_command: Vec::new(),
            work_dir: PathBuf::from("prediction"),
            archive: PathBuf::from("translated.zip"),
        }
    }
}

#[derive(Debug, Default, Deserialize)]
struct SettingsFile {
    detection: Option<DetectionSettings>,
    injection: Option<InjectionSettings>,
    translation: Option<TranslationSettings>,
    ocr: Option<OcrSettings>,
    inpainting: Option<InpaintingSettings>,
    output: Option<OutputSettings>,
}

#[derive(Debug, Default, Deserialize)]
struct DetectionSettings {
    dilation_iterations: Option<u32>,
    tolerance: Option<u32>,
    masks_dir: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct InjectionSettings {
    font_path: Option<String>,
    font_size: Option<u32>,
    min_font_size: Option<u32>,
}

#[derive(Debug, Default, Deserialize)]
struct TranslationSettings {
    provider: Option<String>,
    target_lang: Option<String>,
    model: Option<String>,
    url: Option<String>,
    strip_parenthetical: Option<bool>,
}

#[derive(Debug, Default, Deserialize)]
struct OcrSettings {
    languages: Option<String>,
    psm: Option<u32>,
    crop_padding: Option<u32>,
}

#[derive(Debug, Default, Deserialize)]
struct InpaintingSettings {
    command: Option<Vec<String>>,
}

#[derive(Debug, Default, Deserialize)]
struct OutputSettings {
    work_dir: Option<String>,
    archive: Option<String>,
}

pub fn load_settings(extra_path: Option<&Path>) -> Result<Settings> {
    let mut settings = Settings::default();
    let defaults: SettingsFile =
        toml::from_str(DEFAULT_SETTINGS_TOML).context("failed to parse built-in settings")?;
    settings.merge(defaults);
    ensure_home_settings_file()?;

    let mut ordered_paths = vec![
        PathBuf::from("settings.toml"),
        PathBuf::from("settings.local.toml"),
    ];

    if let Some(home) = paths::settings_dir() {
        ordered_paths.push(home.join("settings.toml"));
        ordered_paths.push(home.join("settings.local.toml"));
    }

    if let Some(extra) = extra_path {
        if !extra.exists() {
            return Err(anyhow!("settings file not found: {}", extra.display()));
        }
        ordered_paths.push(extra.to_path_buf());
    }

    for path in ordered_paths {
        if path.exists() {
            let content = fs::read_to_string(&path)
                .with_context(|| format!("failed to read settings: {}", path.display()))?;
            let parsed: SettingsFile = toml::from_str(&content)
                .with_context(|| format!("failed to parse settings: {}", path.display()))?;
            settings.merge(parsed);
        }
    }

    Ok(settings)
}

impl Settings {
    fn merge(&mut self, incoming: SettingsFile) {
        if let Some(detection) = incoming.detection {
            if let Some(iterations) = detection.dilation_iterations {
                self.dilation_iterations = iterations;
            }
            if let Some(tolerance) = detection.tolerance {
                self.tolerance = tolerance;
            }
            if let Some(dir) = detection.masks_dir.as_deref().and_then(paths::normalize_dir) {
                self.masks_dir = dir;
            }
        }
        if let Some(injection) = incoming.injection {
            if let Some(path) = injection.font_path.as_deref().and_then(paths::normalize_dir) {
                self.font_path = Some(path);
            }
            if let Some(size) = injection.font_size.filter(|size| *size > 0) {
                self.font_size = size;
            }
            if let Some(size) = injection.min_font_size.filter(|size| *size > 0) {
                self.min_font_size = size;
            }
        }
        if let Some(translation) = incoming.translation {
            if let Some(provider) = non_blank(translation.provider) {
                self.provider = provider;
            }
            if let Some(lang) = non_blank(translation.target_lang) {
                self.target_lang = lang;
            }
            if let Some(model) = non_blank(translation.model) {
                self.model = Some(model);
            }
            if let Some(url) = non_blank(translation.url) {
                self.url = Some(url);
            }
            if let Some(strip) = translation.strip_parenthetical {
                self.strip_parenthetical = strip;
            }
        }
        if let Some(ocr) = incoming.ocr {
            if let Some(languages) = non_blank(ocr.languages) {
                self.ocr_languages = languages;
            }
            if let Some(psm) = ocr.psm {
                self.ocr_psm = psm;
            }
            if let Some(padding) = ocr.crop_padding {
                self.crop_padding = padding;
            }
        }
        if let Some(inpainting) = incoming.inpainting {
            if let Some(command) = inpainting.command {
                self.inpaint_command = command;
            }
        }
        if let Some(output) = incoming.output {
            if let Some(dir) = output.work_dir.as_deref().and_then(paths::normalize_dir) {
                self.work_dir = dir;
            }
            if let Some(archive) = output.archive.as_deref().and_then(paths::normalize_dir) {
                self.archive = archive;
            }
        }
    }
}

fn non_blank(value: Option<String>) -> Option<String> {
    value.filter(|value| !value.trim().is_empty())
}

fn ensure_home_settings_file() -> Result<()> {
    let Some(home) = paths::settings_dir() else {
        return Ok(());
    };
    fs::create_dir_all(&home)
        .with_context(|| format!("failed to create settings directory: {}", home.display()))?;
    let path = home.join("settings.toml");
    if !path.exists() {
        fs::write(&path, DEFAULT_SETTINGS_TOML)
            .with_context(|| format!("failed to write settings: {}", path.display()))?;
    }
    Ok(())
}
