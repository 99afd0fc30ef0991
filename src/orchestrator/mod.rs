//! Runs one stage against the configured database and reports on it.

pub mod summary;

use anyhow::Result;

use crate::config::AppConfig;
use crate::db::make_pool;
use crate::metrics::memory_stats_mb;
use crate::pipeline::{add_feature_columns, annotate_with_uci, import_csv, merge_and_shuffle};

use summary::{RunSummary, StageReport, SummaryBuilder};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Merge,
    Annotate,
    Features,
    Import,
}

impl Stage {
    pub fn label(&self) -> &'static str {
        match self {
            Self::Merge => "merge",
            Self::Annotate => "annotate",
            Self::Features => "features",
            Self::Import => "import",
        }
    }
}

pub async fn run_stage(cfg: &AppConfig, stage: Stage) -> Result<RunSummary> {
    let started = chrono::Utc::now();
    let mem_start = memory_stats_mb();
    log::info!(
        "Starting {} on {} (mem used {} MB, avail {} MB)",
        stage.label(),
        cfg.database.path.display(),
        mem_start.used_mb,
        mem_start.avail_mb
    );

    let pool = make_pool(&cfg.database).await?;
    let on_progress = |_: &crate::metrics::ProgressUpdate| {};
    let result = match stage {
        Stage::Merge => merge_and_shuffle(&pool, &cfg.merge, on_progress)
            .await
            .map(StageReport::Merge),
        Stage::Annotate => annotate_with_uci(&pool, &cfg.annotate, &cfg.engine, on_progress)
            .await
            .map(StageReport::Annotate),
        Stage::Features => add_feature_columns(&pool, &cfg.features, on_progress)
            .await
            .map(StageReport::Features),
        Stage::Import => import_csv(&pool, &cfg.import, on_progress)
            .await
            .map(StageReport::Import),
    };
    pool.close().await;
    let report = result?;

    let summary = SummaryBuilder::new(stage, &cfg.database.path.display().to_string())
        .with_timestamps(started, chrono::Utc::now())
        .with_memory(mem_start.used_mb, memory_stats_mb().used_mb)
        .build(report);
    summary.log();
    Ok(summary)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{FeaturesConfig, ImportConfig, MergeConfig};
    use crate::db::{count_rows, make_pool};
    use crate::error::DbError;
    use crate::pipeline::Outcome;
    use crate::test_support::{START_FEN, temp_db_config, temp_db_path};

    #[tokio::test]
    async fn import_then_features_then_merge() {
        let db = temp_db_config("orchestrate");
        let csv_path = temp_db_path("orchestrate_src").with_extension("csv");
        std::fs::write(
            &csv_path,
            format!("fen,eval\n{},+20\n8/8/8/8/8/8/8/K6k b - - 0 1,0\n", START_FEN),
        )
        .unwrap();

        let mut cfg = AppConfig {
            database: db.clone(),
            import: ImportConfig {
                csv_path: csv_path.clone(),
                table: "training_dataset".into(),
                ..ImportConfig::default()
            },
            features: FeaturesConfig::default(),
            ..AppConfig::default()
        };
        let summary = run_stage(&cfg, Stage::Import).await.unwrap();
        assert!(matches!(summary.report, StageReport::Import(ref i) if i.rows_inserted == 2));

        // later stages must not create the file
        cfg.database.create_if_missing = false;
        let summary = run_stage(&cfg, Stage::Features).await.unwrap();
        match summary.report {
            StageReport::Features(f) => {
                assert_eq!(f.outcome, Outcome::Completed);
                assert_eq!(f.rows_processed, 2);
            }
            other => panic!("unexpected report {:?}", other),
        }

        cfg.import.table = "testing_dataset".into();
        cfg.database.create_if_missing = true;
        run_stage(&cfg, Stage::Import).await.unwrap();
        cfg.database.create_if_missing = false;
        cfg.merge = MergeConfig {
            batch_size_a: 1,
            batch_size_b: 1,
            ..MergeConfig::default()
        };
        // schemas differ once features were added to one side only
        assert!(run_stage(&cfg, Stage::Merge).await.is_err());

        cfg.features.table = "testing_dataset".into();
        run_stage(&cfg, Stage::Features).await.unwrap();
        let summary = run_stage(&cfg, Stage::Merge).await.unwrap();
        assert!(matches!(summary.report, StageReport::Merge(ref m) if m.rows_written == 4));

        let pool = make_pool(&db).await.unwrap();
        assert_eq!(count_rows(&pool, "merged_shuffled_dataset").await.unwrap(), 4);
        let _ = std::fs::remove_file(csv_path);
    }

    #[tokio::test]
    async fn missing_database_fails_before_any_stage_work() {
        let cfg = AppConfig {
            database: crate::config::DatabaseConfig {
                path: temp_db_path("orchestrate_missing"),
                ..Default::default()
            },
            ..AppConfig::default()
        };
        let err = run_stage(&cfg, Stage::Annotate).await.unwrap_err();
        assert!(matches!(
            err.downcast_ref::<DbError>(),
            Some(DbError::Connection(_))
        ));
    }
}
