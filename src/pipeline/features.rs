//! Fills the per-position feature columns consumed by network training.
//!
//! `info` doubles as the work marker: a row is pending while it is NULL. All
//! fourteen columns are written together, so a non-NULL `info` means the row
//! is complete.

use anyhow::Result;
use sqlx::SqlitePool;

use crate::config::FeaturesConfig;
use crate::db::schema::{
    count_nulls, ensure_nullable_column, fetch_pending_positions, require_column, update_row,
};
use crate::metrics::{ProgressTracker, ProgressUpdate};
use crate::models::SqlValue;
use crate::pipeline::guard::{Outcome, ProgressGuard};
use crate::position::{PIECE_CHARS, Position};

pub const EN_PASSANT_COLUMN: &str = "en_passant_bitboard";
pub const INFO_COLUMN: &str = "info";

/// The twelve piece columns, `w_P_bitboard` .. `b_k_bitboard`, in bitboard order.
pub fn piece_columns() -> Vec<String> {
    PIECE_CHARS
        .iter()
        .enumerate()
        .map(|(i, c)| {
            let side = if i < 6 { 'w' } else { 'b' };
            format!("{}_{}_bitboard", side, c)
        })
        .collect()
}

pub fn feature_columns() -> Vec<String> {
    let mut cols = piece_columns();
    cols.push(EN_PASSANT_COLUMN.to_string());
    cols.push(INFO_COLUMN.to_string());
    cols
}

/// Feature values in [`feature_columns`] order.
///
/// SQLite integers are signed, so each `u64` is stored with the same bits as an
/// `i64`; a piece on a8 makes the value negative.
pub fn feature_values(position: &Position) -> Vec<SqlValue> {
    position
        .bitboards()
        .into_iter()
        .chain([position.en_passant_bitboard(), position.info()])
        .map(|bits| SqlValue::Integer(bits as i64))
        .collect()
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FeatureSummary {
    pub outcome: Outcome,
    pub columns_added: usize,
    pub iterations: usize,
    pub rows_processed: u64,
    pub skipped_empty: u64,
    pub skipped_invalid: u64,
    pub remaining_null: i64,
}

pub async fn add_feature_columns(
    pool: &SqlitePool,
    cfg: &FeaturesConfig,
    mut on_progress: impl FnMut(&ProgressUpdate),
) -> Result<FeatureSummary> {
    let table = cfg.table.as_str();
    require_column(pool, table, &cfg.fen_column).await?;

    let columns = feature_columns();
    let mut columns_added = 0;
    for col in &columns {
        if ensure_nullable_column(pool, table, col, "INTEGER").await? {
            columns_added += 1;
        }
    }

    let pending = count_nulls(pool, table, INFO_COLUMN).await?;
    log::info!(
        "Computing features for {}: {} rows pending, {} columns added",
        table,
        pending,
        columns_added
    );

    let mut guard = ProgressGuard::new(cfg.max_stalled_iterations);
    let mut tracker = ProgressTracker::new("features", Some(pending as u64));
    let limit = cfg.batch_size.max(1) as i64;
    let mut after_rowid = 0i64;
    let mut iterations = 0usize;
    let mut processed = 0u64;
    let mut skipped_empty = 0u64;
    let mut skipped_invalid = 0u64;

    let outcome = loop {
        let rows =
            fetch_pending_positions(pool, table, &cfg.fen_column, INFO_COLUMN, after_rowid, limit)
                .await?;
        let Some(last) = rows.last() else {
            break Outcome::Completed;
        };
        if guard.is_stalled() {
            log::warn!(
                "No feature rows written in {} consecutive batches; stopping",
                guard.stalled_iterations()
            );
            break Outcome::Stalled;
        }
        after_rowid = last.rowid;
        iterations += 1;

        let mut tx = pool.begin().await?;
        for row in &rows {
            let Some(fen) = row.fen.as_deref().map(str::trim).filter(|s| !s.is_empty()) else {
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
            let assignments = columns
                .iter()
                .map(String::as_str)
                .zip(feature_values(&position))
                .collect();
            processed += update_row(&mut tx, table, assignments, row.rowid).await?;
        }
        tx.commit().await?;

        guard.record(processed);
        on_progress(&tracker.batch_done(processed));
    };

    let remaining_null = count_nulls(pool, table, INFO_COLUMN).await?;
    log::info!(
        "Feature pass {:?}: {} rows written, {} still without features",
        outcome,
        processed,
        remaining_null
    );
    Ok(FeatureSummary {
        outcome,
        columns_added,
        iterations,
        rows_processed: processed,
        skipped_empty,
        skipped_invalid,
        remaining_null,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::table_columns;
    use crate::test_support::{AFTER_E4_FEN, START_FEN, exec, test_pool};
    use sqlx::Row;

    fn cfg(batch_size: usize) -> FeaturesConfig {
        FeaturesConfig {
            table: "positions".into(),
            fen_column: "fen".into(),
            batch_size,
            max_stalled_iterations: 1,
        }
    }

    #[test]
    fn column_names_follow_piece_order() {
        let cols = feature_columns();
        assert_eq!(cols.len(), 14);
        assert_eq!(cols[0], "w_P_bitboard");
        assert_eq!(cols[5], "w_K_bitboard");
        assert_eq!(cols[6], "b_p_bitboard");
        assert_eq!(cols[11], "b_k_bitboard");
        assert_eq!(cols[12], "en_passant_bitboard");
        assert_eq!(cols[13], "info");
    }

    #[test]
    fn values_keep_the_high_bit() {
        let p = Position::from_fen(START_FEN).unwrap();
        let values = feature_values(&p);
        assert_eq!(values[0], SqlValue::Integer(0xFF00));
        // rooks on a8 and h8
        assert_eq!(values[9], SqlValue::Integer(((1u64 << 63) | (1u64 << 56)) as i64));
        assert_eq!(values[12], SqlValue::Integer(0));
        assert_eq!(values[13], SqlValue::Integer(15));
    }

    #[tokio::test]
    async fn fills_features_and_resumes() {
        let pool = test_pool("features_fill").await;
        exec(&pool, "CREATE TABLE positions (fen TEXT, eval TEXT)").await;
        exec(
            &pool,
            &format!(
                "INSERT INTO positions VALUES ('{}', '10'), ('garbage', '0'), ('{}', '-5')",
                START_FEN, AFTER_E4_FEN
            ),
        )
        .await;

        let mut batches = 0;
        let summary = add_feature_columns(&pool, &cfg(2), |_| batches += 1)
            .await
            .unwrap();
        assert_eq!(summary.outcome, Outcome::Completed);
        assert_eq!(summary.columns_added, 14);
        assert_eq!(summary.rows_processed, 2);
        assert_eq!(summary.skipped_invalid, 1);
        assert_eq!(summary.remaining_null, 1);
        assert_eq!(batches, 2);
        assert_eq!(table_columns(&pool, "positions").await.unwrap().len(), 16);

        let row = sqlx::query(
            "SELECT w_K_bitboard, b_k_bitboard, en_passant_bitboard, info FROM positions WHERE _rowid_ = 3",
        )
        .fetch_one(&pool)
        .await
        .unwrap();
        assert_eq!(row.get::<i64, _>(0), 1 << 3);
        assert_eq!(row.get::<i64, _>(1), 1 << 59);
        assert_eq!(row.get::<i64, _>(2), 1 << 19);
        assert_eq!(row.get::<i64, _>(3), 31);

        let again = add_feature_columns(&pool, &cfg(2), |_| {}).await.unwrap();
        assert_eq!(again.columns_added, 0);
        assert_eq!(again.rows_processed, 0);
        assert_eq!(again.iterations, 1);
        assert_eq!(again.outcome, Outcome::Completed);
    }
}
