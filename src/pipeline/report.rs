use serde::Serialize;
use std::fmt;
use std::path::PathBuf;

use super::state::{BatchState, PageFailure, Stage};

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PageOutcome {
    pub name: String,
    pub regions: usize,
    pub injected: usize,
    pub edit_rounds: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub output: Option<PathBuf>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub failure: Option<PageFailure>,
}

/// Per-page result of a batch run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BatchSummary {
    pub stage: Stage,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub archive: Option<PathBuf>,
    pub pages: Vec<PageOutcome>,
}

impl BatchSummary {
    pub fn from_batch(batch: &BatchState, archive: Option<PathBuf>) -> Self {
        let injected_stage = matches!(batch.stage(), Stage::Injecting | Stage::Packaged);
        let pages = batch
            .pages()
            .iter()
            .map(|page| PageOutcome {
                name: page.name().to_string(),
                regions: page.regions.len(),
                injected: page.injected,
                edit_rounds: page.edit_rounds,
                output: (injected_stage && page.is_live())
                    .then(|| page.layout.translated_image()),
                failure: page.failure.clone(),
            })
            .collect();
        Self {
            stage: batch.stage(),
            archive,
            pages,
        }
    }

    pub fn failed(&self) -> usize {
        self.pages.iter().filter(|page| page.failure.is_some()).count()
    }

    pub fn all_failed(&self) -> bool {
        !self.pages.is_empty() && self.failed() == self.pages.len()
    }
}

impl fmt::Display for BatchSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for page in &self.pages {
            match &page.failure {
                Some(failure) => writeln!(
                    f,
                    "{}: failed while {}: {}",
                    page.name, failure.stage, failure.message
                )?,
                None => writeln!(
                    f,
                    "{}: {} region(s), {} translated",
                    page.name, page.regions, page.injected
                )?,
            }
        }
        write!(
            f,
            "{} of {} page(s) done",
            self.pages.len() - self.failed(),
            self.pages.len()
        )?;
        if let Some(archive) = &self.archive {
            write!(f, ", archive: {}", archive.display())?;
        }
        Ok(())
    }
}
