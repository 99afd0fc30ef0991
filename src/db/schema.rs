use anyhow::{Context, Result};
use sqlx::query::Query;
use sqlx::sqlite::{SqliteArguments, SqliteRow};
use sqlx::{Sqlite, SqliteConnection, SqlitePool, Row, TypeInfo, ValueRef};

use crate::error::DbError;
use crate::models::{DynRow, PendingPosition, RowBatch, SqlValue};

pub fn is_valid_ident(name: &str) -> bool {
    !name.is_empty() && name.chars().all(|c| c.is_ascii_alphanumeric() || c == '_')
}

pub fn validate_ident(name: &str) -> Result<(), DbError> {
    if !is_valid_ident(name) {
        return Err(DbError::InvalidIdent(name.to_string()));
    }
    Ok(())
}

/// Double-quote an identifier read back from the catalog.
pub fn quote_ident(name: &str) -> String {
    format!("\"{}\"", name.replace('"', "\"\""))
}

/// Column names in declaration order; empty when the table does not exist.
pub async fn table_columns(pool: &SqlitePool, table: &str) -> Result<Vec<String>> {
    validate_ident(table)?;
    let names = sqlx::query_scalar("SELECT name FROM pragma_table_info(?) ORDER BY cid")
        .bind(table)
        .fetch_all(pool)
        .await
        .with_context(|| format!("Failed to query columns for {}", table))?;
    Ok(names)
}

/// Column names of an existing table, or `DbError::MissingTable`.
pub async fn require_table(pool: &SqlitePool, table: &str) -> Result<Vec<String>> {
    let cols = table_columns(pool, table).await?;
    if cols.is_empty() {
        return Err(DbError::MissingTable(table.to_string()).into());
    }
    Ok(cols)
}

pub async fn require_column(pool: &SqlitePool, table: &str, column: &str) -> Result<()> {
    validate_ident(column)?;
    let cols = require_table(pool, table).await?;
    if !cols.iter().any(|c| c == column) {
        return Err(DbError::MissingColumn {
            table: table.to_string(),
            column: column.to_string(),
        }
        .into());
    }
    Ok(())
}

/// Add `column` as a nullable column of `sql_type` unless it already exists.
///
/// Returns `true` when the column was created by this call.
pub async fn ensure_nullable_column(
    pool: &SqlitePool,
    table: &str,
    column: &str,
    sql_type: &str,
) -> Result<bool> {
    validate_ident(column)?;
    validate_ident(sql_type)?;
    let cols = require_table(pool, table).await?;
    if cols.iter().any(|c| c == column) {
        return Ok(false);
    }
    log::info!("Column '{}' does not exist on {}; creating it", column, table);
    sqlx::query(&format!(
        "ALTER TABLE \"{}\" ADD COLUMN \"{}\" {}",
        table, column, sql_type
    ))
    .execute(pool)
    .await
    .with_context(|| format!("Failed to add column {}.{}", table, column))?;
    Ok(true)
}

pub async fn count_rows(pool: &SqlitePool, table: &str) -> Result<i64> {
    validate_ident(table)?;
    let n: i64 = sqlx::query_scalar(&format!("SELECT COUNT(*) FROM \"{}\"", table))
        .fetch_one(pool)
        .await
        .with_context(|| format!("Failed to count rows of {}", table))?;
    Ok(n)
}

pub async fn count_nulls(pool: &SqlitePool, table: &str, column: &str) -> Result<i64> {
    validate_ident(table)?;
    validate_ident(column)?;
    let n: i64 = sqlx::query_scalar(&format!(
        "SELECT COUNT(*) FROM \"{}\" WHERE \"{}\" IS NULL",
        table, column
    ))
    .fetch_one(pool)
    .await
    .with_context(|| format!("Failed to count NULL {}.{}", table, column))?;
    Ok(n)
}

pub async fn drop_table_if_exists(pool: &SqlitePool, table: &str) -> Result<()> {
    validate_ident(table)?;
    sqlx::query(&format!("DROP TABLE IF EXISTS \"{}\"", table))
        .execute(pool)
        .await
        .with_context(|| format!("Failed to drop {}", table))?;
    Ok(())
}

/// Create an empty `dest` with the column layout of `src`.
pub async fn create_table_like(pool: &SqlitePool, dest: &str, src: &str) -> Result<()> {
    validate_ident(dest)?;
    validate_ident(src)?;
    sqlx::query(&format!(
        "CREATE TABLE \"{}\" AS SELECT * FROM \"{}\" WHERE 0",
        dest, src
    ))
    .execute(pool)
    .await
    .with_context(|| format!("Failed to create {} from {}", dest, src))?;
    Ok(())
}

fn decode_value(row: &SqliteRow, idx: usize) -> Result<SqlValue> {
    let raw = row.try_get_raw(idx)?;
    if raw.is_null() {
        return Ok(SqlValue::Null);
    }
    let storage = raw.type_info().name().to_string();
    let v = match storage.as_str() {
        "INTEGER" => SqlValue::Integer(row.try_get_unchecked(idx)?),
        "REAL" => SqlValue::Real(row.try_get_unchecked(idx)?),
        "TEXT" => SqlValue::Text(row.try_get_unchecked(idx)?),
        _ => SqlValue::Blob(row.try_get_unchecked(idx)?),
    };
    Ok(v)
}

/// Next page of `table` after `last_rowid`, in rowid order.
pub async fn fetch_rows_chunk_keyset(
    pool: &SqlitePool,
    table: &str,
    columns: &[String],
    last_rowid: i64,
    limit: i64,
) -> Result<RowBatch> {
    validate_ident(table)?;
    let select = columns
        .iter()
        .map(|c| quote_ident(c))
        .collect::<Vec<_>>()
        .join(", ");
    let sql = format!(
        "SELECT _rowid_ AS row_id, {select} FROM \"{table}\" WHERE _rowid_ > ? ORDER BY _rowid_ LIMIT ?"
    );
    let rows = sqlx::query(&sql)
        .bind(last_rowid)
        .bind(limit)
        .fetch_all(pool)
        .await
        .with_context(|| format!("Failed to fetch chunk of {} after rowid {}", table, last_rowid))?;

    let mut out = Vec::with_capacity(rows.len());
    for r in rows {
        let rowid: i64 = r.try_get(0)?;
        let mut values = Vec::with_capacity(columns.len());
        for idx in 1..=columns.len() {
            values.push(decode_value(&r, idx)?);
        }
        out.push(DynRow { rowid, values });
    }
    Ok(RowBatch { rows: out })
}

fn bind_value<'q>(
    q: Query<'q, Sqlite, SqliteArguments<'q>>,
    v: SqlValue,
) -> Query<'q, Sqlite, SqliteArguments<'q>> {
    match v {
        SqlValue::Null => q.bind(Option::<i64>::None),
        SqlValue::Integer(i) => q.bind(i),
        SqlValue::Real(f) => q.bind(f),
        SqlValue::Text(s) => q.bind(s),
        SqlValue::Blob(b) => q.bind(b),
    }
}

/// Append rows to `table` in the given order, on the caller's connection.
pub async fn insert_rows(
    conn: &mut SqliteConnection,
    table: &str,
    columns: &[String],
    rows: Vec<DynRow>,
) -> Result<u64> {
    validate_ident(table)?;
    let names = columns
        .iter()
        .map(|c| quote_ident(c))
        .collect::<Vec<_>>()
        .join(", ");
    let marks = vec!["?"; columns.len()].join(", ");
    let sql = format!("INSERT INTO \"{}\" ({}) VALUES ({})", table, names, marks);

    let mut written = 0u64;
    for row in rows {
        let mut q = sqlx::query(&sql);
        for v in row.values {
            q = bind_value(q, v);
        }
        written += q
            .execute(&mut *conn)
            .await
            .with_context(|| format!("Failed to insert into {}", table))?
            .rows_affected();
    }
    Ok(written)
}

/// Up to `limit` rows after `after_rowid` whose `sentinel` column is still NULL.
pub async fn fetch_pending_positions(
    pool: &SqlitePool,
    table: &str,
    fen_column: &str,
    sentinel: &str,
    after_rowid: i64,
    limit: i64,
) -> Result<Vec<PendingPosition>> {
    validate_ident(table)?;
    validate_ident(fen_column)?;
    validate_ident(sentinel)?;
    let sql = format!(
        "SELECT _rowid_ AS row_id, \"{fen_column}\" AS fen FROM \"{table}\" \
         WHERE \"{sentinel}\" IS NULL AND _rowid_ > ? ORDER BY _rowid_ LIMIT ?"
    );
    let rows = sqlx::query(&sql)
        .bind(after_rowid)
        .bind(limit)
        .fetch_all(pool)
        .await
        .with_context(|| format!("Failed to select pending rows of {}", table))?;

    let mut out = Vec::with_capacity(rows.len());
    for r in rows {
        out.push(PendingPosition {
            rowid: r.try_get("row_id")?,
            fen: r.try_get::<Option<String>, _>("fen").ok().flatten(),
        });
    }
    Ok(out)
}

/// `UPDATE table SET col = value, ... WHERE _rowid_ = rowid`; returns rows affected.
pub async fn update_row(
    conn: &mut SqliteConnection,
    table: &str,
    assignments: Vec<(&str, SqlValue)>,
    rowid: i64,
) -> Result<u64> {
    validate_ident(table)?;
    let mut set = Vec::with_capacity(assignments.len());
    for (col, _) in &assignments {
        validate_ident(col)?;
        set.push(format!("\"{}\" = ?", col));
    }
    let sql = format!(
        "UPDATE \"{}\" SET {} WHERE _rowid_ = ?",
        table,
        set.join(", ")
    );
    let mut q = sqlx::query(&sql);
    for (_, v) in assignments {
        q = bind_value(q, v);
    }
    let res = q
        .bind(rowid)
        .execute(&mut *conn)
        .await
        .with_context(|| format!("Failed to update {} rowid {}", table, rowid))?;
    Ok(res.rows_affected())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{exec, test_pool};

    #[test]
    fn ident_rules() {
        assert!(is_valid_ident("training_dataset"));
        assert!(is_valid_ident("stock_d10"));
        assert!(!is_valid_ident(""));
        assert!(!is_valid_ident("a b"));
        assert!(!is_valid_ident("t\"; DROP"));
        assert_eq!(quote_ident("we\"ird"), "\"we\"\"ird\"");
    }

    #[tokio::test]
    async fn add_column_is_idempotent() {
        let pool = test_pool("schema_add").await;
        exec(&pool, "CREATE TABLE t (fen TEXT PRIMARY KEY, eval TEXT)").await;

        assert!(ensure_nullable_column(&pool, "t", "stock_d10", "REAL").await.unwrap());
        assert!(!ensure_nullable_column(&pool, "t", "stock_d10", "REAL").await.unwrap());

        let cols = table_columns(&pool, "t").await.unwrap();
        assert_eq!(cols, vec!["fen", "eval", "stock_d10"]);
        // the added column must accept NULL so it can serve as the pending marker
        exec(&pool, "INSERT INTO t (fen, eval) VALUES ('a', '0')").await;
        assert_eq!(count_nulls(&pool, "t", "stock_d10").await.unwrap(), 1);
    }

    #[tokio::test]
    async fn missing_table_is_reported() {
        let pool = test_pool("schema_missing").await;
        assert!(table_columns(&pool, "nope").await.unwrap().is_empty());
        let err = require_table(&pool, "nope").await.unwrap_err();
        assert!(matches!(
            err.downcast_ref::<DbError>(),
            Some(DbError::MissingTable(_))
        ));
        let err = ensure_nullable_column(&pool, "nope", "x", "REAL")
            .await
            .unwrap_err();
        assert!(err.downcast_ref::<DbError>().is_some());
    }

    #[tokio::test]
    async fn keyset_pages_end_with_short_batch() {
        let pool = test_pool("schema_keyset").await;
        exec(&pool, "CREATE TABLE t (fen TEXT, eval REAL, raw BLOB)").await;
        exec(
            &pool,
            "INSERT INTO t VALUES ('a', 1.5, NULL), ('b', NULL, x'00ff'), ('c', 3, NULL)",
        )
        .await;
        let cols = vec!["fen".to_string(), "eval".into(), "raw".into()];

        let first = fetch_rows_chunk_keyset(&pool, "t", &cols, 0, 2).await.unwrap();
        assert_eq!(first.len(), 2);
        assert_eq!(
            first.rows[1].values,
            vec![
                SqlValue::Text("b".into()),
                SqlValue::Null,
                SqlValue::Blob(vec![0x00, 0xff])
            ]
        );
        let after = first.last_rowid().unwrap();
        let second = fetch_rows_chunk_keyset(&pool, "t", &cols, after, 2).await.unwrap();
        assert_eq!(second.len(), 1);
        // REAL affinity stores the integer literal as a real
        assert_eq!(second.rows[0].values[1], SqlValue::Real(3.0));
        let third = fetch_rows_chunk_keyset(&pool, "t", &cols, second.last_rowid().unwrap(), 2)
            .await
            .unwrap();
        assert!(third.is_empty());
    }

    #[tokio::test]
    async fn pending_rows_skip_filled_sentinels() {
        let pool = test_pool("schema_pending").await;
        exec(&pool, "CREATE TABLE t (fen TEXT, score REAL)").await;
        exec(
            &pool,
            "INSERT INTO t VALUES ('a', NULL), ('b', 0.0), (NULL, NULL), ('d', NULL)",
        )
        .await;

        let rows = fetch_pending_positions(&pool, "t", "fen", "score", 0, 10)
            .await
            .unwrap();
        let fens: Vec<_> = rows.iter().map(|r| r.fen.clone()).collect();
        assert_eq!(fens, vec![Some("a".into()), None, Some("d".into())]);

        let later = fetch_pending_positions(&pool, "t", "fen", "score", rows[0].rowid, 10)
            .await
            .unwrap();
        assert_eq!(later.len(), 2);

        let mut conn = pool.acquire().await.unwrap();
        let n = update_row(&mut conn, "t", vec![("score", SqlValue::Real(0.0))], rows[0].rowid)
            .await
            .unwrap();
        assert_eq!(n, 1);
        drop(conn);
        assert_eq!(count_nulls(&pool, "t", "score").await.unwrap(), 2);
        assert_eq!(count_rows(&pool, "t").await.unwrap(), 4);
    }
}
