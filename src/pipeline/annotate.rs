//! Incremental engine annotation of a position table.
//!
//! The evaluation column is both the result slot and the work marker: a row is
//! pending exactly while that column is NULL. A legitimate `0.0` evaluation is
//! done work. Writes are committed once per batch, so a crash only loses the
//! batch in flight and those rows are still NULL on the next run.

use anyhow::Result;
use sqlx::SqlitePool;

use crate::config::{AnnotateConfig, EngineConfig};
use crate::db::schema::{
    count_nulls, ensure_nullable_column, fetch_pending_positions, require_column, update_row,
    validate_ident,
};
use crate::metrics::{ProgressTracker, ProgressUpdate};
use crate::models::SqlValue;
use crate::pipeline::guard::{Outcome, ProgressGuard};
use crate::position::Position;
use crate::uci::{Evaluator, UciEngine};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AnnotationSummary {
    pub outcome: Outcome,
    pub column: String,
    pub iterations: usize,
    pub rows_processed: u64,
    pub skipped_empty: u64,
    pub skipped_invalid: u64,
    /// NULL evaluations left in the table after the run.
    pub remaining_null: i64,
}

/// Start the configured UCI engine and annotate `cfg.table` with it.
///
/// The table and position column are checked before the engine starts, and
/// the engine starts before anything is written.
pub async fn annotate_with_uci(
    pool: &SqlitePool,
    cfg: &AnnotateConfig,
    engine_cfg: &EngineConfig,
    on_progress: impl FnMut(&ProgressUpdate),
) -> Result<AnnotationSummary> {
    require_column(pool, &cfg.table, &cfg.fen_column).await?;
    let engine = UciEngine::start(engine_cfg).await?;
    annotate_table(pool, cfg, engine_cfg, engine, on_progress).await
}

/// Annotate with an already running evaluator, which is shut down on every exit path.
pub async fn annotate_table<E: Evaluator>(
    pool: &SqlitePool,
    cfg: &AnnotateConfig,
    engine_cfg: &EngineConfig,
    mut engine: E,
    on_progress: impl FnMut(&ProgressUpdate),
) -> Result<AnnotationSummary> {
    let result = drive(pool, cfg, engine_cfg, &mut engine, on_progress).await;
    if let Err(e) = engine.shutdown().await {
        log::warn!("Engine shutdown failed: {}", e);
    }
    result
}

async fn drive<E: Evaluator>(
    pool: &SqlitePool,
    cfg: &AnnotateConfig,
    engine_cfg: &EngineConfig,
    engine: &mut E,
    mut on_progress: impl FnMut(&ProgressUpdate),
) -> Result<AnnotationSummary> {
    let table = cfg.table.as_str();
    let column = cfg.column_name(engine_cfg.depth);
    validate_ident(&column)?;
    require_column(pool, table, &cfg.fen_column).await?;
    ensure_nullable_column(pool, table, &column, "REAL").await?;

    let pending = count_nulls(pool, table, &column).await?;
    log::info!(
        "Annotating {}.{} at depth {}: {} rows pending, batch {}",
        table,
        column,
        engine_cfg.depth,
        pending,
        cfg.batch_size
    );

    let mut guard = ProgressGuard::new(cfg.max_stalled_iterations);
    let mut tracker = ProgressTracker::new("annotate", Some(pending as u64));
    let limit = cfg.batch_size.max(1) as i64;
    let mut after_rowid = 0i64;
    let mut iterations = 0usize;
    let mut processed = 0u64;
    let mut skipped_empty = 0u64;
    let mut skipped_invalid = 0u64;

    let outcome = loop {
        let rows =
            fetch_pending_positions(pool, table, &cfg.fen_column, &column, after_rowid, limit)
                .await?;
        let Some(last) = rows.last() else {
            break Outcome::Completed;
        };
        if guard.is_stalled() {
            log::warn!(
                "No progress in {} consecutive batches; stopping with rows still pending",
                guard.stalled_iterations()
            );
            break Outcome::Stalled;
        }
        after_rowid = last.rowid;
        iterations += 1;

        let mut evaluated: Vec<(i64, f64)> = Vec::with_capacity(rows.len());
        for row in &rows {
            let Some(fen) = row
                .fen
                .as_deref()
                .map(str::trim)
                .filter(|s| !s.is_empty())
            else {
                skipped_empty += 1;
                continue;
            };
            let position = match Position::from_fen(fen) {
                Ok(p) => p,
                Err(e) => {
                    log::warn!("Invalid FEN (rowid={}): {} ({})", row.rowid, fen, e);
                    skipped_invalid += 1;
                    continue;
                }
            };
            let score = engine.evaluate(&position, engine_cfg.depth).await?;
            let value = score.white_pov(position.side_to_move(), engine_cfg.mate_score);
            evaluated.push((row.rowid, f64::from(value)));
        }

        let mut tx = pool.begin().await?;
        for (rowid, value) in evaluated {
            processed +=
                update_row(&mut tx, table, vec![(column.as_str(), SqlValue::Real(value))], rowid)
                    .await?;
        }
        tx.commit().await?;

        guard.record(processed);
        let update = tracker.batch_done(processed);
        on_progress(&update);
    };

    let remaining_null = count_nulls(pool, table, &column).await?;
    match outcome {
        Outcome::Completed => log::info!(
            "Annotation complete: {} rows evaluated, {} left NULL ({} empty, {} invalid)",
            processed,
            remaining_null,
            skipped_empty,
            skipped_invalid
        ),
        Outcome::Stalled => log::warn!(
            "Annotation stalled: {} rows evaluated, {} still NULL",
            processed,
            remaining_null
        ),
    }
    Ok(AnnotationSummary {
        outcome,
        column,
        iterations,
        rows_processed: processed,
        skipped_empty,
        skipped_invalid,
        remaining_null,
    })
}
