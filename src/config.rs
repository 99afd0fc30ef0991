use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

use crate::db::schema::is_valid_ident;
use crate::error::ConfigError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum JournalMode {
    #[default]
    Wal,
    Delete,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum SyncMode {
    #[default]
    Normal,
    Full,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    pub path: PathBuf,
    /// Only the bulk import may create a fresh database file.
    pub create_if_missing: bool,
    pub journal_mode: JournalMode,
    pub sync_mode: SyncMode,
    pub busy_timeout_ms: u64,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            path: PathBuf::from("data/chess_evals.db"),
            create_if_missing: false,
            journal_mode: JournalMode::Wal,
            sync_mode: SyncMode::Normal,
            busy_timeout_ms: 5_000,
        }
    }
}

impl DatabaseConfig {
    pub fn busy_timeout(&self) -> Duration {
        Duration::from_millis(self.busy_timeout_ms)
    }
}

#[derive(Clone, Serialize, Deserialize, Debug)]
pub struct MergeConfig {
    pub source_a: String,
    pub source_b: String,
    pub destination: String,
    /// Rows pulled from `source_a` per step; sized to its share of the final table.
    pub batch_size_a: usize,
    pub batch_size_b: usize,
    pub seed: u64,
}

impl Default for MergeConfig {
    fn default() -> Self {
        Self {
            source_a: "training_dataset".into(),
            source_b: "testing_dataset".into(),
            destination: "merged_shuffled_dataset".into(),
            batch_size_a: 80_000,
            batch_size_b: 20_000,
            seed: 42,
        }
    }
}

#[derive(Clone, Serialize, Deserialize, Debug)]
pub struct EngineConfig {
    pub path: PathBuf,
    #[serde(default)]
    pub args: Vec<String>,
    pub depth: u32,
    /// Magnitude stored for any forced mate, signed from White's side.
    pub mate_score: i32,
    pub handshake_timeout_ms: u64,
    /// Upper bound on one `go depth` search; unbounded when unset.
    #[serde(default)]
    pub search_timeout_ms: Option<u64>,
    pub quit_timeout_ms: u64,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            path: PathBuf::from("stockfish"),
            args: Vec::new(),
            depth: 10,
            mate_score: 2000,
            handshake_timeout_ms: 10_000,
            search_timeout_ms: None,
            quit_timeout_ms: 2_000,
        }
    }
}

impl EngineConfig {
    pub fn handshake_timeout(&self) -> Duration {
        Duration::from_millis(self.handshake_timeout_ms)
    }

    pub fn search_timeout(&self) -> Option<Duration> {
        self.search_timeout_ms.map(Duration::from_millis)
    }

    pub fn quit_timeout(&self) -> Duration {
        Duration::from_millis(self.quit_timeout_ms)
    }
}

#[derive(Clone, Serialize, Deserialize, Debug)]
pub struct AnnotateConfig {
    pub table: String,
    pub fen_column: String,
    /// Defaults to `stock_d{depth}` when unset.
    pub column: Option<String>,
    pub batch_size: usize,
    pub max_stalled_iterations: u32,
}

impl Default for AnnotateConfig {
    fn default() -> Self {
        Self {
            table: "training_dataset".into(),
            fen_column: "fen".into(),
            column: None,
            batch_size: 10_000,
            max_stalled_iterations: 1,
        }
    }
}

impl AnnotateConfig {
    pub fn column_name(&self, depth: u32) -> String {
        self.column
            .clone()
            .unwrap_or_else(|| format!("stock_d{}", depth))
    }
}

#[derive(Clone, Serialize, Deserialize, Debug)]
pub struct FeaturesConfig {
    pub table: String,
    pub fen_column: String,
    pub batch_size: usize,
    pub max_stalled_iterations: u32,
}

impl Default for FeaturesConfig {
    fn default() -> Self {
        Self {
            table: "training_dataset".into(),
            fen_column: "fen".into(),
            batch_size: 500,
            max_stalled_iterations: 1,
        }
    }
}

#[derive(Clone, Serialize, Deserialize, Debug)]
pub struct ImportConfig {
    pub csv_path: PathBuf,
    pub table: String,
    pub has_headers: bool,
    pub commit_every: usize,
}

impl Default for ImportConfig {
    fn default() -> Self {
        Self {
            csv_path: PathBuf::from("data/chessData.csv"),
            table: "evaluations".into(),
            has_headers: true,
            commit_every: 50_000,
        }
    }
}

#[derive(Clone, Serialize, Deserialize, Debug, Default)]
pub struct AppConfig {
    pub database: DatabaseConfig,
    #[serde(default)]
    pub merge: MergeConfig,
    #[serde(default)]
    pub engine: EngineConfig,
    #[serde(default)]
    pub annotate: AnnotateConfig,
    #[serde(default)]
    pub features: FeaturesConfig,
    #[serde(default)]
    pub import: ImportConfig,
}

fn check_ident(field: &'static str, name: &str) -> Result<(), ConfigError> {
    if name.trim().is_empty() {
        return Err(ConfigError::MissingField { field });
    }
    if !is_valid_ident(name) {
        return Err(ConfigError::InvalidValue {
            field,
            reason: format!("{:?} is not a plain [A-Za-z0-9_] identifier", name),
        });
    }
    Ok(())
}

fn check_batch(field: &'static str, size: usize) -> Result<(), ConfigError> {
    if size == 0 {
        return Err(ConfigError::InvalidValue {
            field,
            reason: "must be > 0".into(),
        });
    }
    Ok(())
}

impl AppConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.database.path.as_os_str().is_empty() {
            return Err(ConfigError::MissingField {
                field: "database.path",
            });
        }

        check_ident("merge.source_a", &self.merge.source_a)?;
        check_ident("merge.source_b", &self.merge.source_b)?;
        check_ident("merge.destination", &self.merge.destination)?;
        check_batch("merge.batch_size_a", self.merge.batch_size_a)?;
        check_batch("merge.batch_size_b", self.merge.batch_size_b)?;

        if self.engine.path.as_os_str().is_empty() {
            return Err(ConfigError::MissingField {
                field: "engine.path",
            });
        }
        if self.engine.depth == 0 {
            return Err(ConfigError::InvalidValue {
                field: "engine.depth",
                reason: "must be > 0".into(),
            });
        }
        if self.engine.search_timeout_ms == Some(0) {
            return Err(ConfigError::InvalidValue {
                field: "engine.search_timeout_ms",
                reason: "must be > 0 when set".into(),
            });
        }
        if self.engine.mate_score <= 0 {
            return Err(ConfigError::InvalidValue {
                field: "engine.mate_score",
                reason: format!("{} must be positive", self.engine.mate_score),
            });
        }

        check_ident("annotate.table", &self.annotate.table)?;
        check_ident("annotate.fen_column", &self.annotate.fen_column)?;
        check_ident(
            "annotate.column",
            &self.annotate.column_name(self.engine.depth),
        )?;
        check_batch("annotate.batch_size", self.annotate.batch_size)?;
        if self.annotate.max_stalled_iterations == 0 {
            return Err(ConfigError::InvalidValue {
                field: "annotate.max_stalled_iterations",
                reason: "must be >= 1".into(),
            });
        }

        check_ident("features.table", &self.features.table)?;
        check_ident("features.fen_column", &self.features.fen_column)?;
        check_batch("features.batch_size", self.features.batch_size)?;
        if self.features.max_stalled_iterations == 0 {
            return Err(ConfigError::InvalidValue {
                field: "features.max_stalled_iterations",
                reason: "must be >= 1".into(),
            });
        }

        check_ident("import.table", &self.import.table)?;
        check_batch("import.commit_every", self.import.commit_every)?;
        Ok(())
    }
}
