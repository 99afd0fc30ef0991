/// A single SQLite cell, tagged with the storage class it was read with.
#[derive(Debug, Clone, PartialEq)]
pub enum SqlValue {
    Null,
    Integer(i64),
    Real(f64),
    Text(String),
    Blob(Vec<u8>),
}

/// One row pulled through a keyset cursor.
#[derive(Debug, Clone, PartialEq)]
pub struct DynRow {
    pub rowid: i64,
    pub values: Vec<SqlValue>,
}

/// A bounded, ordered group of rows read with one column list.
///
/// Only ever lives between a read and the matching write.
#[derive(Debug, Clone)]
pub struct RowBatch {
    pub rows: Vec<DynRow>,
}

impl RowBatch {
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn last_rowid(&self) -> Option<i64> {
        self.rows.last().map(|r| r.rowid)
    }
}

/// A row whose sentinel column is still NULL.
///
/// `fen` is `None` both for SQL NULL and for cells that are not text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingPosition {
    pub rowid: i64,
    pub fen: Option<String>,
}
