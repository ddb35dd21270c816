//! Drives a batch of pages from detection to the packaged archive.

mod package;
mod progress;
mod report;
mod state;

use anyhow::{Context, Result, anyhow};
use futures_util::future::join_all;
use image::RgbImage;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

use crate::collaborators::{
    Inpainter, Segmenter, TextRecognizer, TranslationBackend, TranslationContext,
};
use crate::error::CoreError;
use crate::geometry::{OperatorRect, Rect};
use crate::paths::PageLayout;
use crate::providers::strip_parenthetical;
use crate::regions::{
    self, RegionList, Reconciliation, clear_region, paint_region, read_canvas_document,
    restore_region,
    save_mask, write_region_list,
};
use crate::settings::Settings;
use crate::typeset::Typesetter;

pub use package::write_archive;
pub use progress::{LogProgress, NoProgress, ProgressSink, percent};
pub use report::{BatchSummary, PageOutcome};
pub use state::{BatchState, PageFailure, PageSlot, Stage};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PipelineOptions {
    pub dilation_iterations: u32,
    pub tolerance: u32,
    pub target_lang: String,
    pub strip_parenthetical: bool,
}

impl PipelineOptions {
    pub fn from_settings(settings: &Settings) -> Self {
        Self {
            dilation_iterations: settings.dilation_iterations,
            tolerance: settings.tolerance,
            target_lang: settings.target_lang.clone(),
            strip_parenthetical: settings.strip_parenthetical,
        }
    }
}

impl Default for PipelineOptions {
    fn default() -> Self {
        Self::from_settings(&Settings::default())
    }
}

/// The external models a pipeline calls out to.
pub struct Collaborators {
    pub segmenter: Box<dyn Segmenter>,
    pub recognizer: Box<dyn TextRecognizer>,
    pub translator: Box<dyn TranslationBackend>,
    pub inpainter: Box<dyn Inpainter>,
}

pub struct Pipeline {
    collaborators: Collaborators,
    options: PipelineOptions,
    progress: Box<dyn ProgressSink>,
}

impl Pipeline {
    pub fn new(collaborators: Collaborators, options: PipelineOptions) -> Self {
        Self {
            collaborators,
            options,
            progress: Box::new(LogProgress::new()),
        }
    }

    pub fn with_progress(mut self, progress: Box<dyn ProgressSink>) -> Self {
        self.progress = progress;
        self
    }

    pub fn options(&self) -> &PipelineOptions {
        &self.options
    }

    /// Loads every page, asks the segmenter for its mask and extracts regions.
    pub async fn detect(&self, batch: &mut BatchState) -> Result<()> {
        batch.require(Stage::Detecting)?;
        self.progress.stage_started(Stage::Detecting, batch.live_count());
        let tasks = batch.live_pages_mut().map(|slot| async move {
            let result = self.detect_page(slot).await;
            self.finish_page(slot, Stage::Detecting, result);
        });
        join_all(tasks).await;
        self.progress.stage_finished(Stage::Detecting);
        Ok(())
    }

    async fn detect_page(&self, slot: &mut PageSlot) -> Result<()> {
        slot.layout.ensure_dirs()?;
        let source = load_source(slot.input.clone(), slot.layout.source_image()).await?;

        let mut mask = self
            .collaborators
            .segmenter
            .segment(slot.name(), &source)
            .await?;
        let regions = regions::extract(&mut mask, self.options.dilation_iterations);
        info!("{}: {} region(s) detected", slot.name(), regions.len());

        slot.source = Some(source);
        slot.mask = Some(mask);
        slot.regions = regions;
        persist_detection(slot)
    }

    /// Applies one round of operator edits to `page`.
    ///
    /// Machine regions the operator kept keep their mask pixels except where
    /// they overlap a rejected region. Rectangles the operator drew are
    /// painted in and everything else is cleared. The
    /// page's regions become the kept and drawn rectangles until the next
    /// [`Pipeline::redetect`].
    pub fn apply_edits(
        &self,
        batch: &mut BatchState,
        page: &str,
        operator: &[OperatorRect],
    ) -> Result<Reconciliation> {
        batch.advance(Stage::Editing)?;
        let result = self.apply_page_edits(batch, page, operator);
        batch.advance(Stage::Detecting)?;
        result
    }

    fn apply_page_edits(
        &self,
        batch: &mut BatchState,
        page: &str,
        operator: &[OperatorRect],
    ) -> Result<Reconciliation> {
        let slot = live_page(batch, page)?;
        let mask = slot
            .mask
            .as_mut()
            .ok_or_else(|| anyhow!("page '{}' has not been detected", page))?;

        let original = mask.clone();
        let outcome = regions::reconcile(&slot.regions, operator, mask, self.options.tolerance);
        for region in &outcome.resolved {
            restore_region(mask, &original, region);
        }
        // Rejected boxes win where they overlap a kept one.
        for region in outcome.remaining.iter() {
            clear_region(mask, region);
        }
        let drawn: Vec<Rect> = outcome
            .unmatched_operator
            .iter()
            .filter_map(|index| operator.get(*index).and_then(OperatorRect::to_rect))
            .collect();
        for region in &drawn {
            paint_region(mask, region);
        }

        let mut kept = outcome.resolved.clone();
        kept.extend(drawn);
        slot.regions = RegionList::new(kept);
        slot.edit_rounds += 1;
        debug!(
            "{}: edit round {} kept {} region(s), dropped {}",
            page,
            slot.edit_rounds,
            slot.regions.len(),
            outcome.remaining.len()
        );
        persist_detection(slot)?;
        Ok(outcome)
    }

    /// Reads `<edits_dir>/<name>.json` for every page that has one and applies it.
    pub fn apply_edit_files(&self, batch: &mut BatchState, edits_dir: &Path) -> Result<usize> {
        let names: Vec<String> = batch
            .pages()
            .iter()
            .filter(|page| page.is_live())
            .map(|page| page.name().to_string())
            .collect();
        let mut applied = 0usize;
        for name in names {
            let path = edits_dir.join(format!("{}.json", name));
            if !path.is_file() {
                continue;
            }
            let edit = read_canvas_document(&path)
                .and_then(|document| self.apply_edits(batch, &name, &document.objects));
            match edit {
                Ok(_) => applied += 1,
                Err(err) => {
                    if let Some(slot) = batch.page_mut(&name) {
                        slot.fail(Stage::Editing, format!("{:#}", err));
                    }
                }
            }
        }
        Ok(applied)
    }

    /// Re-extracts regions from the page's current mask.
    pub fn redetect(&self, batch: &mut BatchState, page: &str, iterations: u32) -> Result<usize> {
        batch.require(Stage::Detecting)?;
        let slot = live_page(batch, page)?;
        let mask = slot
            .mask
            .as_mut()
            .ok_or_else(|| anyhow!("page '{}' has not been detected", page))?;
        slot.regions = regions::extract(mask, iterations);
        persist_detection(slot)?;
        Ok(slot.regions.len())
    }

    pub async fn recognize(&self, batch: &mut BatchState) -> Result<()> {
        batch.advance(Stage::Recognizing)?;
        self.progress.stage_started(Stage::Recognizing, batch.live_count());
        let tasks = batch.live_pages_mut().map(|slot| async move {
            let result = self.recognize_page(slot).await;
            self.finish_page(slot, Stage::Recognizing, result);
        });
        join_all(tasks).await;
        self.progress.stage_finished(Stage::Recognizing);
        Ok(())
    }

    async fn recognize_page(&self, slot: &mut PageSlot) -> Result<()> {
        let source = slot
            .source
            .as_ref()
            .ok_or_else(|| anyhow!("page has no source image"))?;
        let texts = self
            .collaborators
            .recognizer
            .recognize(source, &slot.regions)
            .await?;
        if texts.len() != slot.regions.len() {
            return Err(CoreError::input(format!(
                "recognizer returned {} text(s) for {} region(s)",
                texts.len(),
                slot.regions.len()
            ))
            .into());
        }
        slot.texts = texts;
        Ok(())
    }

    /// Translates each page's regions in order, carrying the page context.
    pub async fn translate(&self, batch: &mut BatchState) -> Result<()> {
        batch.advance(Stage::Translating)?;
        self.progress.stage_started(Stage::Translating, batch.live_count());
        let tasks = batch.live_pages_mut().map(|slot| async move {
            let result = self.translate_page(slot).await;
            self.finish_page(slot, Stage::Translating, result);
        });
        join_all(tasks).await;
        self.progress.stage_finished(Stage::Translating);
        Ok(())
    }

    async fn translate_page(&self, slot: &mut PageSlot) -> Result<()> {
        let translator = &self.collaborators.translator;
        let mut context = TranslationContext::for_page(&slot.texts);
        let mut translations = Vec::with_capacity(slot.texts.len());
        for text in &slot.texts {
            let text = text.trim();
            if text.is_empty() {
                translations.push(String::new());
                continue;
            }
            let translated = translator
                .translate(text, &self.options.target_lang, &context)
                .await?;
            let translated = if self.options.strip_parenthetical {
                strip_parenthetical(&translated)
            } else {
                translated.trim().to_string()
            };
            debug!("{}: {} => {}", translator.name(), text, translated);
            context.remember(text, &translated);
            translations.push(translated);
        }
        slot.translations = translations;
        Ok(())
    }

    /// Runs the inpainter once over the whole segmentation directory.
    pub async fn inpaint(&self, batch: &mut BatchState) -> Result<()> {
        batch.advance(Stage::Inpainting)?;
        let total = batch.live_count();
        if total == 0 {
            return Ok(());
        }
        self.progress.stage_started(Stage::Inpainting, total);
        let input = PageLayout::segmentation_root(batch.work_dir());
        let output = PageLayout::inpainting_root(batch.work_dir());
        let result = self.collaborators.inpainter.inpaint(&input, &output).await;
        for slot in batch.live_pages_mut() {
            let page_result = match &result {
                Err(err) => Err(anyhow!("{}", err)),
                Ok(()) if !slot.layout.inpainted_image().is_file() => Err(anyhow!(
                    "inpainter wrote no image at {}",
                    slot.layout.inpainted_image().display()
                )),
                Ok(()) => Ok(()),
            };
            self.finish_page(slot, Stage::Inpainting, page_result);
        }
        self.progress.stage_finished(Stage::Inpainting);
        Ok(())
    }

    /// Draws each page's translations onto its inpainted image.
    pub fn inject(&self, batch: &mut BatchState, typesetter: &Typesetter) -> Result<()> {
        batch.advance(Stage::Injecting)?;
        self.progress.stage_started(Stage::Injecting, batch.live_count());
        for slot in batch.live_pages_mut() {
            let result = inject_page_slot(slot, typesetter);
            self.finish_page(slot, Stage::Injecting, result);
        }
        self.progress.stage_finished(Stage::Injecting);
        Ok(())
    }

    /// Zips the translated images of every surviving page into `archive`.
    pub fn package(&self, batch: &mut BatchState, archive: &Path) -> Result<Option<PathBuf>> {
        batch.advance(Stage::Packaged)?;
        let images: Vec<PathBuf> = batch
            .pages()
            .iter()
            .filter(|page| page.is_live())
            .map(|page| page.layout.translated_image())
            .collect();
        if images.is_empty() {
            return Ok(None);
        }
        let written = write_archive(archive, &images)?;
        info!("packaged {} page(s) into {}", written, archive.display());
        Ok(Some(archive.to_path_buf()))
    }

    /// Every stage in order. Edited pages are re-detected without dilation.
    pub async fn run(
        &self,
        batch: &mut BatchState,
        edits_dir: Option<&Path>,
        typesetter: &Typesetter,
        archive: &Path,
    ) -> Result<BatchSummary> {
        self.detect(batch).await?;
        if let Some(dir) = edits_dir {
            self.apply_edit_files(batch, dir)?;
            let edited: Vec<String> = batch
                .pages()
                .iter()
                .filter(|page| page.is_live() && page.edit_rounds > 0)
                .map(|page| page.name().to_string())
                .collect();
            for name in edited {
                if let Err(err) = self.redetect(batch, &name, 0) {
                    if let Some(slot) = batch.page_mut(&name) {
                        slot.fail(Stage::Detecting, format!("{:#}", err));
                    }
                }
            }
        }
        self.recognize(batch).await?;
        self.translate(batch).await?;
        self.inpaint(batch).await?;
        self.inject(batch, typesetter)?;
        let archive = self.package(batch, archive)?;
        Ok(BatchSummary::from_batch(batch, archive))
    }

    fn finish_page(&self, slot: &mut PageSlot, stage: Stage, result: Result<()>) {
        match result {
            Ok(()) => self.progress.page_done(stage, slot.name()),
            Err(err) => slot.fail(stage, format!("{:#}", err)),
        }
    }
}

fn live_page<'b>(batch: &'b mut BatchState, page: &str) -> Result<&'b mut PageSlot> {
    let slot = batch
        .page_mut(page)
        .ok_or_else(|| anyhow!("unknown page '{}'", page))?;
    if let Some(failure) = &slot.failure {
        return Err(anyhow!(
            "page '{}' already failed while {}",
            page,
            failure.stage
        ));
    }
    Ok(slot)
}

/// Decodes the page and stores the copy the inpainter reads, off the async workers.
async fn load_source(input: PathBuf, copy: PathBuf) -> Result<RgbImage> {
    tokio::task::spawn_blocking(move || -> Result<RgbImage> {
        let source = image::open(&input)
            .with_context(|| format!("failed to open page: {}", input.display()))?
            .to_rgb8();
        source
            .save(&copy)
            .with_context(|| format!("failed to write {}", copy.display()))?;
        Ok(source)
    })
    .await
    .map_err(|err| anyhow!("page loading task failed: {}", err))?
}

fn persist_detection(slot: &PageSlot) -> Result<()> {
    if let Some(mask) = &slot.mask {
        save_mask(mask, &slot.layout.mask())?;
    }
    write_region_list(&slot.layout.regions(), &slot.regions)
}

fn inject_page_slot(slot: &mut PageSlot, typesetter: &Typesetter) -> Result<()> {
    let source = slot
        .source
        .as_ref()
        .ok_or_else(|| anyhow!("page has no source image"))?;
    let inpainted = slot.layout.inpainted_image();
    let mut target = image::open(&inpainted)
        .with_context(|| format!("failed to open inpainted image: {}", inpainted.display()))?
        .to_rgb8();
    let injections = typesetter.inject(&mut target, source, &slot.regions, &slot.translations)?;
    let output = slot.layout.translated_image();
    target
        .save(&output)
        .with_context(|| format!("failed to write {}", output.display()))?;
    slot.injected = injections.len();
    Ok(())
}
