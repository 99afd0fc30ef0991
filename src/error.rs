use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("missing required field: {field}")]
    MissingField { field: &'static str },
    #[error("invalid value for {field}: {reason}")]
    InvalidValue { field: &'static str, reason: String },
}

#[derive(Debug, Error)]
pub enum DbError {
    #[error("connection error: {0}")]
    Connection(String),
    #[error("invalid identifier: {0:?}")]
    InvalidIdent(String),
    #[error("table not found: {0}")]
    MissingTable(String),
    #[error("column {column} not found in table {table}")]
    MissingColumn { table: String, column: String },
}

#[derive(Debug, Error)]
pub enum MergeError {
    #[error("destination table {0} must differ from both source tables")]
    DestinationIsSource(String),
    #[error("source tables {a} and {b} have different columns")]
    SchemaMismatch { a: String, b: String },
    #[error("destination holds {actual} rows, expected {expected}")]
    CountMismatch { expected: i64, actual: i64 },
}

#[derive(Debug, Error)]
pub enum EngineError {
    #[error("failed to start engine {path}: {source}")]
    Spawn {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("engine handshake failed: {0}")]
    Handshake(String),
    #[error("engine did not answer within {0:?}")]
    Timeout(std::time::Duration),
    #[error("engine protocol error: {0}")]
    Protocol(String),
    #[error("engine process exited unexpectedly")]
    Exited,
    #[error("engine i/o error: {0}")]
    Io(#[from] std::io::Error),
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum FenError {
    #[error("empty position")]
    Empty,
    #[error("expected 8 ranks, found {0}")]
    RankCount(usize),
    #[error("rank {rank} describes {files} files")]
    RankWidth { rank: usize, files: usize },
    #[error("unexpected piece character {0:?}")]
    Piece(char),
    #[error("invalid side to move {0:?}")]
    Turn(String),
    #[error("invalid castling field {0:?}")]
    Castling(String),
    #[error("invalid en passant square {0:?}")]
    EnPassant(String),
    #[error("invalid move counter {0:?}")]
    Counter(String),
    #[error("unexpected trailing field {0:?}")]
    Trailing(String),
    #[error("expected exactly one {king:?}, found {count}")]
    KingCount { king: char, count: u32 },
    #[error("pawn on the first or last rank")]
    PawnOnBackRank,
}
