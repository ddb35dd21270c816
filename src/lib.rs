use anyhow::{Context, Result, anyhow};
use std::path::{Path, PathBuf};
use tracing::warn;

pub mod collaborators;
pub mod contrast;
pub mod error;
pub mod geometry;
pub mod logging;
pub mod paths;
pub mod pipeline;
pub mod providers;
pub mod regions;
pub mod settings;
pub mod typeset;

mod test_util;

pub use error::CoreError;
pub use geometry::{OperatorRect, Rect};
pub use pipeline::{BatchState, BatchSummary, Collaborators, Pipeline, PipelineOptions, Stage};
pub use regions::RegionList;
pub use settings::Settings;

use collaborators::{
    CommandInpainter, CopyInpainter, Inpainter, MaskFileSegmenter, TesseractRecognizer,
};
use providers::{ProviderKind, ProviderOptions};
use typeset::{FALLBACK_FAMILIES, FontSpec, Typesetter, TypesetFont};

/// Command line overrides on top of the layered settings.
#[derive(Debug, Clone, Default)]
pub struct Config {
    pub pages: Vec<PathBuf>,
    pub lang: Option<String>,
    pub dilation: Option<u32>,
    pub font: Option<PathBuf>,
    pub font_size: Option<u32>,
    pub masks: Option<PathBuf>,
    pub edits: Option<PathBuf>,
    pub work_dir: Option<PathBuf>,
    pub output: Option<PathBuf>,
    pub translator: Option<String>,
    pub key: Option<String>,
    pub settings_path: Option<String>,
}

pub async fn run(config: Config) -> Result<BatchSummary> {
    if config.pages.is_empty() {
        return Err(anyhow!("no pages given"));
    }
    let settings_path = config.settings_path.as_deref().map(Path::new);
    let mut settings = settings::load_settings(settings_path)?;
    apply_overrides(&mut settings, &config);

    let kind = ProviderKind::parse(&settings.provider)?;
    let translator = providers::build_backend(
        kind,
        &ProviderOptions {
            key: config.key.clone(),
            model: settings.model.clone(),
            url: settings.url.clone(),
        },
    )
    .with_context(|| format!("failed to set up translator '{}'", kind.as_str()))?;

    let inpainter: Box<dyn Inpainter> = match CommandInpainter::from_command(&settings.inpaint_command)
    {
        Some(command) => Box::new(command),
        None => Box::new(CopyInpainter),
    };

    let collaborators = Collaborators {
        segmenter: Box::new(MaskFileSegmenter::new(settings.masks_dir.clone())),
        recognizer: Box::new(
            TesseractRecognizer::new(settings.ocr_languages.clone(), settings.ocr_psm)
                .with_padding(settings.crop_padding),
        ),
        translator,
        inpainter,
    };

    let typesetter = load_typesetter(&settings)?;
    let pipeline = Pipeline::new(collaborators, PipelineOptions::from_settings(&settings));
    let mut batch = BatchState::new(&settings.work_dir, &config.pages)?;
    pipeline
        .run(
            &mut batch,
            config.edits.as_deref(),
            &typesetter,
            &settings.archive,
        )
        .await
}

fn apply_overrides(settings: &mut Settings, config: &Config) {
    if let Some(lang) = config.lang.as_ref().filter(|lang| !lang.trim().is_empty()) {
        settings.target_lang = lang.clone();
    }
    if let Some(dilation) = config.dilation {
        settings.dilation_iterations = dilation;
    }
    if let Some(font) = &config.font {
        settings.font_path = Some(font.clone());
    }
    if let Some(size) = config.font_size.filter(|size| *size > 0) {
        settings.font_size = size;
    }
    if let Some(masks) = &config.masks {
        settings.masks_dir = masks.clone();
    }
    if let Some(dir) = &config.work_dir {
        settings.work_dir = dir.clone();
    }
    if let Some(output) = &config.output {
        settings.archive = output.clone();
    }
    if let Some(translator) = &config.translator {
        settings.provider = translator.clone();
    }
}

/// An explicit font file must load; without one a system face is tried and
/// width estimates are the last resort.
fn load_typesetter(settings: &Settings) -> Result<Typesetter> {
    let spec = FontSpec::new(settings.font_path.clone(), settings.font_size);
    if spec.path.is_some() {
        let font = TypesetFont::load(spec, FALLBACK_FAMILIES)?;
        return Ok(Typesetter::new(font, settings.min_font_size));
    }
    match TypesetFont::load(spec, FALLBACK_FAMILIES) {
        Ok(font) => Ok(Typesetter::new(font, settings.min_font_size)),
        Err(err) => {
            warn!("{}; falling back to estimated text metrics", err);
            Ok(Typesetter::estimated(
                settings.font_size,
                settings.min_font_size,
            ))
        }
    }
}
