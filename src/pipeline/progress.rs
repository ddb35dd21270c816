use std::sync::atomic::{AtomicUsize, Ordering};
use tracing::info;

use super::state::Stage;

/// Receives stage progress from the pipeline.
pub trait ProgressSink: Send + Sync {
    fn stage_started(&self, stage: Stage, total: usize);
    fn page_done(&self, stage: Stage, page: &str);
    fn stage_finished(&self, stage: Stage);
}

/// Percentage after the page at `index` (0-based) of `total` completes.
pub fn percent(index: usize, total: usize) -> usize {
    if total == 0 {
        return 100;
    }
    100 * (index + 1) / total
}

/// Reports progress through `tracing`.
#[derive(Debug, Default)]
pub struct LogProgress {
    done: AtomicUsize,
    total: AtomicUsize,
}

impl LogProgress {
    pub fn new() -> Self {
        Self::default()
    }
}

impl ProgressSink for LogProgress {
    fn stage_started(&self, stage: Stage, total: usize) {
        self.done.store(0, Ordering::SeqCst);
        self.total.store(total, Ordering::SeqCst);
        info!("{}: {} page(s)", stage, total);
    }

    fn page_done(&self, stage: Stage, page: &str) {
        let index = self.done.fetch_add(1, Ordering::SeqCst);
        let total = self.total.load(Ordering::SeqCst);
        info!("{}: {} done ({}%)", stage, page, percent(index, total));
    }

    fn stage_finished(&self, stage: Stage) {
        info!("{}: finished", stage);
    }
}

/// Discards progress.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoProgress;

impl ProgressSink for NoProgress {
    fn stage_started(&self, _stage: Stage, _total: usize) {}

    fn page_done(&self, _stage: Stage, _page: &str) {}

    fn stage_finished(&self, _stage: Stage) {}
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn percent_counts_the_finished_page() {
        assert_eq!(percent(0, 4), 25);
        assert_eq!(percent(3, 4), 100);
        assert_eq!(percent(0, 3), 33);
        assert_eq!(percent(0, 0), 100);
    }

    #[test]
    fn log_progress_resets_per_stage() {
        let progress = LogProgress::new();
        progress.stage_started(Stage::Recognizing, 2);
        progress.page_done(Stage::Recognizing, "p1");
        progress.page_done(Stage::Recognizing, "p2");
        assert_eq!(progress.done.load(Ordering::SeqCst), 2);

        progress.stage_started(Stage::Translating, 2);
        assert_eq!(progress.done.load(Ordering::SeqCst), 0);
    }
}
