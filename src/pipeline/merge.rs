//! Chunked merge-shuffle of two source tables into a fresh destination table.
//!
//! Rows are pulled from both sources through keyset cursors advancing in
//! lockstep. Every step concatenates whatever each cursor yielded, permutes
//! that combined batch with a seeded RNG and appends it to the destination.
//!
//! The shuffle is local to each combined batch. Two rows from opposite ends of
//! the inputs never end up next to each other; only order within a window is
//! randomized.

use anyhow::Result;
use rand::SeedableRng;
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use sqlx::SqlitePool;
use std::sync::Arc;

use crate::config::MergeConfig;
use crate::db::schema::{
    count_rows, create_table_like, drop_table_if_exists, fetch_rows_chunk_keyset, insert_rows,
    require_table, validate_ident,
};
use crate::error::MergeError;
use crate::metrics::{ProgressTracker, ProgressUpdate};
use crate::models::{DynRow, RowBatch};

/// Paginated reader over one source table, ordered by rowid.
#[derive(Debug)]
pub struct SourceCursor {
    table: String,
    columns: Arc<[String]>,
    batch_size: i64,
    last_rowid: i64,
    exhausted: bool,
}

impl SourceCursor {
    pub fn new(table: &str, columns: Arc<[String]>, batch_size: usize) -> Self {
        Self {
            table: table.to_string(),
            columns,
            batch_size: batch_size.max(1) as i64,
            last_rowid: 0,
            exhausted: false,
        }
    }

    /// Next page, or `None` once the table has no further rows.
    pub async fn next_batch(&mut self, pool: &SqlitePool) -> Result<Option<RowBatch>> {
        if self.exhausted {
            return Ok(None);
        }
        let batch = fetch_rows_chunk_keyset(
            pool,
            &self.table,
            &self.columns,
            self.last_rowid,
            self.batch_size,
        )
        .await?;
        if (batch.len() as i64) < self.batch_size {
            self.exhausted = true;
        }
        match batch.last_rowid() {
            Some(id) => {
                self.last_rowid = id;
                Ok(Some(batch))
            }
            None => {
                self.exhausted = true;
                Ok(None)
            }
        }
    }

    pub fn is_exhausted(&self) -> bool {
        self.exhausted
    }
}

/// Seeded permutation source; one per run so reruns repeat every batch order.
pub struct BatchShuffler {
    rng: StdRng,
}

impl BatchShuffler {
    pub fn new(seed: u64) -> Self {
        Self {
            rng: StdRng::seed_from_u64(seed),
        }
    }

    pub fn shuffle(&mut self, rows: &mut [DynRow]) {
        rows.shuffle(&mut self.rng);
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MergeSummary {
    pub rows_a: i64,
    pub rows_b: i64,
    pub rows_written: u64,
    pub batches: usize,
}

fn same_column_set(a: &[String], b: &[String]) -> bool {
    let mut a = a.to_vec();
    let mut b = b.to_vec();
    a.sort();
    b.sort();
    a == b
}

/// Rebuild `cfg.destination` from `cfg.source_a` and `cfg.source_b`.
///
/// The destination is dropped first; nothing else may read it while this runs.
pub async fn merge_and_shuffle(
    pool: &SqlitePool,
    cfg: &MergeConfig,
    mut on_progress: impl FnMut(&ProgressUpdate),
) -> Result<MergeSummary> {
    validate_ident(&cfg.source_a)?;
    validate_ident(&cfg.source_b)?;
    validate_ident(&cfg.destination)?;
    if cfg.destination == cfg.source_a || cfg.destination == cfg.source_b {
        return Err(MergeError::DestinationIsSource(cfg.destination.clone()).into());
    }

    let cols_a = require_table(pool, &cfg.source_a).await?;
    let cols_b = require_table(pool, &cfg.source_b).await?;
    if !same_column_set(&cols_a, &cols_b) {
        return Err(MergeError::SchemaMismatch {
            a: cfg.source_a.clone(),
            b: cfg.source_b.clone(),
        }
        .into());
    }
    // Both cursors read in A's column order so combined rows line up.
    let columns: Arc<[String]> = cols_a.into();

    let rows_a = count_rows(pool, &cfg.source_a).await?;
    let rows_b = count_rows(pool, &cfg.source_b).await?;
    let expected = rows_a + rows_b;
    log::info!(
        "Merging {} ({} rows, batch {}) + {} ({} rows, batch {}) into {} (seed {})",
        cfg.source_a,
        rows_a,
        cfg.batch_size_a,
        cfg.source_b,
        rows_b,
        cfg.batch_size_b,
        cfg.destination,
        cfg.seed
    );

    drop_table_if_exists(pool, &cfg.destination).await?;
    create_table_like(pool, &cfg.destination, &cfg.source_a).await?;

    let mut cursor_a = SourceCursor::new(&cfg.source_a, Arc::clone(&columns), cfg.batch_size_a);
    let mut cursor_b = SourceCursor::new(&cfg.source_b, Arc::clone(&columns), cfg.batch_size_b);
    let mut shuffler = BatchShuffler::new(cfg.seed);
    let mut tracker = ProgressTracker::new("merge", Some(expected as u64));
    let mut rows_written = 0u64;
    let mut batches = 0usize;

    loop {
        let a = cursor_a.next_batch(pool).await?;
        let b = cursor_b.next_batch(pool).await?;
        if a.is_none() && b.is_none() {
            break;
        }

        let mut combined: Vec<DynRow> = Vec::with_capacity(
            a.as_ref().map_or(0, |x| x.len()) + b.as_ref().map_or(0, |x| x.len()),
        );
        combined.extend(a.into_iter().flat_map(|x| x.rows));
        combined.extend(b.into_iter().flat_map(|x| x.rows));
        shuffler.shuffle(&mut combined);

        let mut tx = pool.begin().await?;
        rows_written += insert_rows(&mut tx, &cfg.destination, &columns, combined).await?;
        tx.commit().await?;
        batches += 1;

        let update = tracker.batch_done(rows_written);
        on_progress(&update);
    }

    let actual = count_rows(pool, &cfg.destination).await?;
    if actual != expected {
        return Err(MergeError::CountMismatch { expected, actual }.into());
    }
    log::info!(
        "Merge complete: {} rows in {} batches written to {}",
        rows_written,
        batches,
        cfg.destination
    );
    Ok(MergeSummary {
        rows_a,
        rows_b,
        rows_written,
        batches,
    })
}
