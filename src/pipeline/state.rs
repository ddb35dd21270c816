use anyhow::{Result, anyhow};
use image::{GrayImage, RgbImage};
use serde::Serialize;
use std::collections::HashSet;
use std::fmt;
use std::path::{Path, PathBuf};
use tracing::warn;

use crate::paths::PageLayout;
use crate::regions::RegionList;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    Detecting,
    Editing,
    Recognizing,
    Translating,
    Inpainting,
    Injecting,
    Packaged,
}

impl Stage {
    pub fn as_str(&self) -> &'static str {
        match self {
            Stage::Detecting => "detecting",
            Stage::Editing => "editing",
            Stage::Recognizing => "recognizing",
            Stage::Translating => "translating",
            Stage::Inpainting => "inpainting",
            Stage::Injecting => "injecting",
            Stage::Packaged => "packaged",
        }
    }

    /// Detection and editing alternate until the operator is done; every other
    /// stage moves strictly forward.
    pub fn can_advance_to(self, next: Stage) -> bool {
        use Stage::*;
        matches!(
            (self, next),
            (Detecting, Editing)
                | (Editing, Detecting)
                | (Detecting, Recognizing)
                | (Recognizing, Translating)
                | (Translating, Inpainting)
                | (Inpainting, Injecting)
                | (Injecting, Packaged)
        )
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PageFailure {
    pub stage: Stage,
    pub message: String,
}

/// Everything the pipeline knows about one page.
#[derive(Debug, Clone)]
pub struct PageSlot {
    pub input: PathBuf,
    pub layout: PageLayout,
    pub source: Option<RgbImage>,
    pub mask: Option<GrayImage>,
    pub regions: RegionList,
    pub texts: Vec<String>,
    pub translations: Vec<String>,
    pub edit_rounds: u32,
    pub injected: usize,
    pub failure: Option<PageFailure>,
}

impl PageSlot {
    fn new(input: PathBuf, layout: PageLayout) -> Self {
        Self {
            input,
            layout,
            source: None,
            mask: None,
            regions: RegionList::default(),
            texts: Vec::new(),
            translations: Vec::new(),
            edit_rounds: 0,
            injected: 0,
            failure: None,
        }
    }

    pub fn name(&self) -> &str {
        self.layout.name()
    }

    pub fn is_live(&self) -> bool {
        self.failure.is_none()
    }

    /// Records the first failure of the page; later stages skip it.
    pub fn fail(&mut self, stage: Stage, message: impl fmt::Display) {
        if self.failure.is_some() {
            return;
        }
        let message = message.to_string();
        warn!("page '{}' failed while {}: {}", self.name(), stage, message);
        self.failure = Some(PageFailure { stage, message });
    }
}

/// One batch of pages moving through the stages together.
#[derive(Debug, Clone)]
pub struct BatchState {
    stage: Stage,
    work_dir: PathBuf,
    pages: Vec<PageSlot>,
}

impl BatchState {
    pub fn new(work_dir: &Path, inputs: &[PathBuf]) -> Result<Self> {
        if inputs.is_empty() {
            return Err(anyhow!("no pages given"));
        }
        let mut seen = HashSet::new();
        let mut pages = Vec::with_capacity(inputs.len());
        for input in inputs {
            let layout = PageLayout::for_page(work_dir, input)
                .ok_or_else(|| anyhow!("cannot name page: {}", input.display()))?;
            if !seen.insert(layout.name().to_string()) {
                return Err(anyhow!(
                    "two pages share the name '{}'; page names must be unique",
                    layout.name()
                ));
            }
            pages.push(PageSlot::new(input.clone(), layout));
        }
        Ok(Self {
            stage: Stage::Detecting,
            work_dir: work_dir.to_path_buf(),
            pages,
        })
    }

    pub fn stage(&self) -> Stage {
        self.stage
    }

    pub fn work_dir(&self) -> &Path {
        &self.work_dir
    }

    pub fn pages(&self) -> &[PageSlot] {
        &self.pages
    }

    pub fn page(&self, name: &str) -> Option<&PageSlot> {
        self.pages.iter().find(|page| page.name() == name)
    }

    pub fn page_mut(&mut self, name: &str) -> Option<&mut PageSlot> {
        self.pages.iter_mut().find(|page| page.name() == name)
    }

    pub fn live_pages_mut(&mut self) -> impl Iterator<Item = &mut PageSlot> {
        self.pages.iter_mut().filter(|page| page.is_live())
    }

    pub fn live_count(&self) -> usize {
        self.pages.iter().filter(|page| page.is_live()).count()
    }

    pub(crate) fn require(&self, stage: Stage) -> Result<()> {
        if self.stage != stage {
            return Err(anyhow!(
                "batch is {}, expected it to be {}",
                self.stage,
                stage
            ));
        }
        Ok(())
    }

    pub(crate) fn advance(&mut self, next: Stage) -> Result<()> {
        if !self.stage.can_advance_to(next) {
            return Err(anyhow!("cannot move batch from {} to {}", self.stage, next));
        }
        self.stage = next;
        Ok(())
    }
}
