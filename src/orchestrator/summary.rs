//! End-of-run summary shared by every stage.

use crate::pipeline::{AnnotationSummary, FeatureSummary, ImportSummary, MergeSummary, Outcome};

use super::Stage;

#[derive(Debug, Clone)]
pub enum StageReport {
    Merge(MergeSummary),
    Annotate(AnnotationSummary),
    Features(FeatureSummary),
    Import(ImportSummary),
}

impl StageReport {
    pub fn describe(&self) -> String {
        match self {
            Self::Merge(m) => format!(
                "{} + {} rows written to destination in {} batches",
                m.rows_a, m.rows_b, m.batches
            ),
            Self::Annotate(a) => format!(
                "{:?}: {} rows evaluated into {} over {} batches, {} empty, {} invalid, {} still NULL",
                a.outcome,
                a.rows_processed,
                a.column,
                a.iterations,
                a.skipped_empty,
                a.skipped_invalid,
                a.remaining_null
            ),
            Self::Features(f) => format!(
                "{:?}: {} rows encoded over {} batches, {} columns added, {} still NULL",
                f.outcome, f.rows_processed, f.iterations, f.columns_added, f.remaining_null
            ),
            Self::Import(i) => format!(
                "{} rows inserted from {} records ({} duplicates, {} malformed)",
                i.rows_inserted, i.records_read, i.duplicates, i.malformed
            ),
        }
    }

    pub fn stalled(&self) -> bool {
        match self {
            Self::Annotate(a) => a.outcome == Outcome::Stalled,
            Self::Features(f) => f.outcome == Outcome::Stalled,
            _ => false,
        }
    }
}

#[derive(Debug, Clone)]
pub struct RunSummary {
    pub stage: Stage,
    pub db_path: String,
    pub started_utc: chrono::DateTime<chrono::Utc>,
    pub ended_utc: chrono::DateTime<chrono::Utc>,
    pub duration_secs: f64,
    pub mem_used_start_mb: u64,
    pub mem_used_end_mb: u64,
    pub report: StageReport,
}

impl RunSummary {
    pub fn log(&self) {
        log::info!(
            "{} finished on {} in {:.1}s ({} .. {})",
            self.stage.label(),
            self.db_path,
            self.duration_secs,
            self.started_utc.to_rfc3339(),
            self.ended_utc.to_rfc3339()
        );
        log::info!("{}", self.report.describe());
        log::info!(
            "Memory used: start {} MB, end {} MB (delta {:+} MB)",
            self.mem_used_start_mb,
            self.mem_used_end_mb,
            self.mem_used_end_mb as i64 - self.mem_used_start_mb as i64
        );
        if self.report.stalled() {
            log::warn!("Stopped without progress; rerun after fixing the rows reported above");
        }
    }
}

/// Collects timing and memory around a stage run.
#[derive(Debug, Clone)]
pub struct SummaryBuilder {
    stage: Stage,
    db_path: String,
    started_utc: chrono::DateTime<chrono::Utc>,
    ended_utc: chrono::DateTime<chrono::Utc>,
    mem_used_start_mb: u64,
    mem_used_end_mb: u64,
}

impl SummaryBuilder {
    pub fn new(stage: Stage, db_path: &str) -> Self {
        let now = chrono::Utc::now();
        Self {
            stage,
            db_path: db_path.to_string(),
            started_utc: now,
            ended_utc: now,
            mem_used_start_mb: 0,
            mem_used_end_mb: 0,
        }
    }

    pub fn with_timestamps(
        mut self,
        started: chrono::DateTime<chrono::Utc>,
        ended: chrono::DateTime<chrono::Utc>,
    ) -> Self {
        self.started_utc = started;
        self.ended_utc = ended;
        self
    }

    pub fn with_memory(mut self, start_mb: u64, end_mb: u64) -> Self {
        self.mem_used_start_mb = start_mb;
        self.mem_used_end_mb = end_mb;
        self
    }

    pub fn build(self, report: StageReport) -> RunSummary {
        let duration_secs = (self.ended_utc - self.started_utc).num_milliseconds() as f64 / 1000.0;
        RunSummary {
            stage: self.stage,
            db_path: self.db_path,
            started_utc: self.started_utc,
            ended_utc: self.ended_utc,
            duration_secs,
            mem_used_start_mb: self.mem_used_start_mb,
            mem_used_end_mb: self.mem_used_end_mb,
            report,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builder_computes_duration() {
        let start = chrono::Utc::now();
        let end = start + chrono::Duration::milliseconds(2_500);
        let summary = SummaryBuilder::new(Stage::Import, "x.db")
            .with_timestamps(start, end)
            .with_memory(100, 80)
            .build(StageReport::Import(ImportSummary::default()));
        assert!((summary.duration_secs - 2.5).abs() < 1e-9);
        assert!(!summary.report.stalled());
        assert!(summary.report.describe().starts_with("0 rows inserted"));
    }
}
