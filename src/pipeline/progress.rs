// file: src/pipeline/progress.rs
// description: progress tracking and statistics reporting for batch ingestion
// reference: uses indicatif for progress bars and tracks ingestion metrics

use crate::pipeline::ingest::IngestReport;
use indicatif::{MultiProgress, ProgressBar, ProgressDrawTarget, ProgressStyle};
use serde::Serialize;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::time::Instant;

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct IngestStats {
    pub files_ingested: usize,
    pub files_failed: usize,
    pub tables_stored: usize,
    pub tables_failed: usize,
    pub rows_inserted: usize,
    pub total_bytes_processed: u64,
    pub duration_secs: u64,
}

impl IngestStats {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn files_per_second(&self) -> f64 {
        if self.duration_secs == 0 {
            return 0.0;
        }
        self.files_ingested as f64 / self.duration_secs as f64
    }

    pub fn success_rate(&self) -> f64 {
        let total = self.files_ingested + self.files_failed;
        if total == 0 {
            return 0.0;
        }
        (self.files_ingested as f64 / total as f64) * 100.0
    }
}

pub struct ProgressTracker {
    main_bar: ProgressBar,
    detail_bar: ProgressBar,
    files_ingested: Arc<AtomicUsize>,
    files_failed: Arc<AtomicUsize>,
    tables_stored: Arc<AtomicUsize>,
    tables_failed: Arc<AtomicUsize>,
    rows_inserted: Arc<AtomicUsize>,
    bytes_processed: Arc<AtomicU64>,
    start_time: Instant,
}

impl ProgressTracker {
    pub fn with_color(total_files: usize, colored: bool) -> Self {
        Self::build(MultiProgress::new(), total_files, colored)
    }

    /// Tracks counts without drawing anything.
    pub fn hidden(total_files: usize) -> Self {
        Self::build(
            MultiProgress::with_draw_target(ProgressDrawTarget::hidden()),
            total_files,
            false,
        )
    }

    fn build(multi_progress: MultiProgress, total_files: usize, colored: bool) -> Self {
        let main_bar = create_progress_bar(&multi_progress, total_files as u64, colored);
        let detail_bar = create_detail_bar(&multi_progress);

        Self {
            main_bar,
            detail_bar,
            files_ingested: Arc::new(AtomicUsize::new(0)),
            files_failed: Arc::new(AtomicUsize::new(0)),
            tables_stored: Arc::new(AtomicUsize::new(0)),
            tables_failed: Arc::new(AtomicUsize::new(0)),
            rows_inserted: Arc::new(AtomicUsize::new(0)),
            bytes_processed: Arc::new(AtomicU64::new(0)),
            start_time: Instant::now(),
        }
    }

    /// Records a finished document. A document counts as failed when none of
    /// its tables could be stored.
    pub fn record_report(&self, report: &IngestReport, bytes: u64) {
        let stored = report.stored_count();
        let failed = report.failed_count();

        self.tables_stored.fetch_add(stored, Ordering::SeqCst);
        self.tables_failed.fetch_add(failed, Ordering::SeqCst);
        self.rows_inserted
            .fetch_add(report.rows_inserted(), Ordering::SeqCst);
        self.bytes_processed.fetch_add(bytes, Ordering::SeqCst);

        if failed > 0 && stored == 0 {
            self.inc_files_failed();
        } else {
            self.inc_files_ingested();
        }
    }

    pub fn inc_files_ingested(&self) {
        self.files_ingested.fetch_add(1, Ordering::SeqCst);
        self.main_bar.inc(1);
        self.update_detail_bar();
    }

    pub fn inc_files_failed(&self) {
        self.files_failed.fetch_add(1, Ordering::SeqCst);
        self.main_bar.inc(1);
        self.update_detail_bar();
    }

    pub fn set_message(&self, message: String) {
        self.main_bar.set_message(message);
    }

    pub fn finish(&self) {
        self.main_bar.finish_with_message("Ingestion complete");
        self.detail_bar.finish_and_clear();
    }

    pub fn get_stats(&self) -> IngestStats {
        IngestStats {
            files_ingested: self.files_ingested.load(Ordering::SeqCst),
            files_failed: self.files_failed.load(Ordering::SeqCst),
            tables_stored: self.tables_stored.load(Ordering::SeqCst),
            tables_failed: self.tables_failed.load(Ordering::SeqCst),
            rows_inserted: self.rows_inserted.load(Ordering::SeqCst),
            total_bytes_processed: self.bytes_processed.load(Ordering::SeqCst),
            duration_secs: self.start_time.elapsed().as_secs(),
        }
    }

    fn update_detail_bar(&self) {
        let message = format!(
            "Tables: {} | Rows: {} | Failed files: {}",
            self.tables_stored.load(Ordering::SeqCst),
            self.rows_inserted.load(Ordering::SeqCst),
            self.files_failed.load(Ordering::SeqCst)
        );

        self.detail_bar.set_message(message);
    }
}

impl Drop for ProgressTracker {
    fn drop(&mut self) {
        self.finish();
    }
}

fn create_progress_bar(multi_progress: &MultiProgress, total: u64, colored: bool) -> ProgressBar {
    let bar = multi_progress.add(ProgressBar::new(total));
    let style = if colored {
        ProgressStyle::default_bar()
            .template(
                "{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} ({eta}) {msg}",
            )
            .map(|style| style.progress_chars("█▓▒░"))
    } else {
        ProgressStyle::default_bar()
            .template("{spinner} [{elapsed_precise}] [{bar:40}] {pos}/{len} ({eta}) {msg}")
            .map(|style| style.progress_chars("=>-"))
    };
    bar.set_style(style.unwrap_or_else(|_| ProgressStyle::default_bar()));
    bar
}

fn create_detail_bar(multi_progress: &MultiProgress) -> ProgressBar {
    let bar = multi_progress.add(ProgressBar::new(0));
    if let Ok(style) = ProgressStyle::default_bar().template("{msg}") {
        bar.set_style(style);
    }
    bar
}
