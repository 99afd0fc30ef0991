//! Loads a `fen,eval` CSV export into a fresh position table.

use anyhow::{Context, Result};
use sqlx::SqlitePool;

use crate::config::ImportConfig;
use crate::db::schema::validate_ident;
use crate::metrics::{ProgressTracker, ProgressUpdate};

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ImportSummary {
    pub records_read: u64,
    pub rows_inserted: u64,
    /// Positions already present in the table.
    pub duplicates: u64,
    /// Records with fewer than two fields.
    pub malformed: u64,
}

pub async fn import_csv(
    pool: &SqlitePool,
    cfg: &ImportConfig,
    mut on_progress: impl FnMut(&ProgressUpdate),
) -> Result<ImportSummary> {
    validate_ident(&cfg.table)?;
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(cfg.has_headers)
        .flexible(true)
        .from_path(&cfg.csv_path)
        .with_context(|| format!("Failed to open {}", cfg.csv_path.display()))?;

    sqlx::query(&format!(
        "CREATE TABLE IF NOT EXISTS \"{}\" (fen TEXT PRIMARY KEY, eval TEXT)",
        cfg.table
    ))
    .execute(pool)
    .await
    .with_context(|| format!("Failed to create {}", cfg.table))?;

    let insert = format!(
        "INSERT OR IGNORE INTO \"{}\" (fen, eval) VALUES (?, ?)",
        cfg.table
    );
    let commit_every = cfg.commit_every.max(1) as u64;
    let mut tracker = ProgressTracker::new("import", None);
    let mut summary = ImportSummary::default();
    let mut pending = 0u64;
    let mut tx = pool.begin().await?;

    for record in reader.records() {
        let record = record
            .with_context(|| format!("Failed to read {}", cfg.csv_path.display()))?;
        summary.records_read += 1;
        let (Some(fen), Some(eval)) = (record.get(0), record.get(1)) else {
            log::warn!(
                "Skipping record {} with {} field(s)",
                summary.records_read,
                record.len()
            );
            summary.malformed += 1;
            continue;
        };
        let affected = sqlx::query(&insert)
            .bind(fen)
            .bind(eval)
            .execute(&mut *tx)
            .await
            .with_context(|| format!("Failed to insert into {}", cfg.table))?
            .rows_affected();
        if affected == 0 {
            summary.duplicates += 1;
        }
        summary.rows_inserted += affected;

        pending += 1;
        if pending >= commit_every {
            tx.commit().await?;
            on_progress(&tracker.batch_done(summary.records_read));
            tx = pool.begin().await?;
            pending = 0;
        }
    }
    tx.commit().await?;
    if pending > 0 {
        on_progress(&tracker.batch_done(summary.records_read));
    }

    log::info!(
        "Imported {} rows into {} ({} records, {} duplicates, {} malformed)",
        summary.rows_inserted,
        cfg.table,
        summary.records_read,
        summary.duplicates,
        summary.malformed
    );
    Ok(summary)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::count_rows;
    use crate::test_support::{temp_db_path, test_pool};

    #[tokio::test]
    async fn imports_with_duplicates_ignored() {
        let pool = test_pool("import").await;
        let csv_path = temp_db_path("import_src").with_extension("csv");
        std::fs::write(
            &csv_path,
            "FEN,Evaluation\n\
             8/8/8/8/8/8/8/K6k w - - 0 1,+12\n\
             8/8/8/8/8/8/8/K6k b - - 0 1,#-3\n\
             8/8/8/8/8/8/8/K6k w - - 0 1,+99\n\
             lonely\n",
        )
        .unwrap();
        let cfg = ImportConfig {
            csv_path: csv_path.clone(),
            table: "evaluations".into(),
            has_headers: true,
            commit_every: 2,
        };

        let mut commits = 0;
        let summary = import_csv(&pool, &cfg, |_| commits += 1).await.unwrap();
        assert_eq!(
            summary,
            ImportSummary {
                records_read: 4,
                rows_inserted: 2,
                duplicates: 1,
                malformed: 1,
            }
        );
        assert_eq!(commits, 2);
        assert_eq!(count_rows(&pool, "evaluations").await.unwrap(), 2);

        let first: String =
            sqlx::query_scalar("SELECT eval FROM evaluations WHERE fen = '8/8/8/8/8/8/8/K6k w - - 0 1'")
                .fetch_one(&pool)
                .await
                .unwrap();
        assert_eq!(first, "+12");

        // a second import of the same file adds nothing
        let again = import_csv(&pool, &cfg, |_| {}).await.unwrap();
        assert_eq!(again.rows_inserted, 0);
        assert_eq!(again.duplicates, 3);
        let _ = std::fs::remove_file(csv_path);
    }
}
