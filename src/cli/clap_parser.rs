use crate::config::{
    AnnotateConfig, AppConfig, DatabaseConfig, EngineConfig, FeaturesConfig, ImportConfig,
    JournalMode, MergeConfig, SyncMode,
};
use crate::error::ConfigError;
use crate::orchestrator::Stage;
use clap::{Args, Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

#[derive(Copy, Clone, Eq, PartialEq, ValueEnum, Debug)]
pub enum JournalOpt {
    Wal,
    Delete,
}

impl From<JournalOpt> for JournalMode {
    fn from(j: JournalOpt) -> Self {
        match j {
            JournalOpt::Wal => JournalMode::Wal,
            JournalOpt::Delete => JournalMode::Delete,
        }
    }
}

#[derive(Parser, Debug)]
#[command(
    name = "chess_data_prep",
    version,
    about = "Prepare labeled chess position datasets stored in SQLite",
    disable_help_subcommand = true
)]
pub struct Cli {
    /// SQLite database file (env: CHESS_PREP_DB)
    #[arg(
        long = "db",
        value_name = "PATH",
        env = "CHESS_PREP_DB",
        default_value = "data/chess_evals.db",
        global = true
    )]
    pub db: PathBuf,
    /// Journal mode (env: CHESS_PREP_JOURNAL)
    #[arg(long, value_enum, env = "CHESS_PREP_JOURNAL", default_value_t = JournalOpt::Wal, global = true)]
    pub journal: JournalOpt,
    /// Use synchronous=FULL instead of NORMAL (env: CHESS_PREP_SYNC_FULL)
    #[arg(long = "sync-full", env = "CHESS_PREP_SYNC_FULL", global = true)]
    pub sync_full: bool,
    /// SQLite busy timeout in milliseconds
    #[arg(
        long = "busy-timeout-ms",
        env = "CHESS_PREP_BUSY_TIMEOUT_MS",
        default_value_t = 5_000,
        global = true
    )]
    pub busy_timeout_ms: u64,
    /// Env file loaded before arguments are read (default: ./.env)
    #[arg(long = "env-file", value_name = "PATH", global = true)]
    pub env_file: Option<PathBuf>,
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Merge two tables into a new one, shuffling each combined batch
    Merge(MergeArgs),
    /// Fill the evaluation column with engine scores
    Annotate(AnnotateArgs),
    /// Fill bitboard, en passant and info columns
    Features(FeaturesArgs),
    /// Load a fen,eval CSV into a table
    Import(ImportArgs),
    /// Write a commented .env template
    EnvTemplate {
        #[arg(value_name = "PATH", default_value = ".env.template")]
        path: PathBuf,
    },
}

#[derive(Args, Debug)]
pub struct MergeArgs {
    #[arg(long = "source-a", env = "CHESS_PREP_SOURCE_A", default_value = "training_dataset")]
    pub source_a: String,
    #[arg(long = "source-b", env = "CHESS_PREP_SOURCE_B", default_value = "testing_dataset")]
    pub source_b: String,
    /// Dropped and recreated on every run
    #[arg(
        long,
        env = "CHESS_PREP_DESTINATION",
        default_value = "merged_shuffled_dataset"
    )]
    pub destination: String,
    #[arg(long = "batch-a", env = "CHESS_PREP_BATCH_A", default_value_t = 80_000)]
    pub batch_a: usize,
    #[arg(long = "batch-b", env = "CHESS_PREP_BATCH_B", default_value_t = 20_000)]
    pub batch_b: usize,
    #[arg(long, env = "CHESS_PREP_SEED", default_value_t = 42)]
    pub seed: u64,
}

#[derive(Args, Debug)]
pub struct AnnotateArgs {
    #[arg(long, env = "CHESS_PREP_ANNOTATE_TABLE", default_value = "training_dataset")]
    pub table: String,
    #[arg(long = "fen-column", env = "CHESS_PREP_FEN_COLUMN", default_value = "fen")]
    pub fen_column: String,
    /// Evaluation column (default: stock_d<DEPTH>)
    #[arg(long, env = "CHESS_PREP_EVAL_COLUMN")]
    pub column: Option<String>,
    #[arg(long = "batch-size", env = "CHESS_PREP_ANNOTATE_BATCH", default_value_t = 10_000)]
    pub batch_size: usize,
    /// Consecutive batches without progress before giving up
    #[arg(long = "max-stalled", env = "CHESS_PREP_MAX_STALLED", default_value_t = 1)]
    pub max_stalled: u32,
    /// UCI engine executable
    #[arg(long, env = "CHESS_PREP_ENGINE", default_value = "stockfish")]
    pub engine: PathBuf,
    #[arg(long, env = "CHESS_PREP_DEPTH", default_value_t = 10)]
    pub depth: u32,
    #[arg(long = "mate-score", env = "CHESS_PREP_MATE_SCORE", default_value_t = 2000)]
    pub mate_score: i32,
    #[arg(long = "handshake-ms", env = "CHESS_PREP_HANDSHAKE_MS", default_value_t = 10_000)]
    pub handshake_ms: u64,
    /// Abort the run if one search takes longer than this
    #[arg(long = "search-timeout-ms", env = "CHESS_PREP_SEARCH_TIMEOUT_MS")]
    pub search_timeout_ms: Option<u64>,
}

#[derive(Args, Debug)]
pub struct FeaturesArgs {
    #[arg(long, env = "CHESS_PREP_FEATURES_TABLE", default_value = "training_dataset")]
    pub table: String,
    #[arg(long = "fen-column", env = "CHESS_PREP_FEN_COLUMN", default_value = "fen")]
    pub fen_column: String,
    #[arg(long = "batch-size", env = "CHESS_PREP_FEATURES_BATCH", default_value_t = 500)]
    pub batch_size: usize,
    #[arg(long = "max-stalled", env = "CHESS_PREP_MAX_STALLED", default_value_t = 1)]
    pub max_stalled: u32,
}

#[derive(Args, Debug)]
pub struct ImportArgs {
    #[arg(value_name = "CSV", env = "CHESS_PREP_CSV", default_value = "data/chessData.csv")]
    pub csv: PathBuf,
    #[arg(long, env = "CHESS_PREP_IMPORT_TABLE", default_value = "evaluations")]
    pub table: String,
    /// Treat the first record as data
    #[arg(long = "no-headers")]
    pub no_headers: bool,
    #[arg(long = "commit-every", env = "CHESS_PREP_COMMIT_EVERY", default_value_t = 50_000)]
    pub commit_every: usize,
}

impl Cli {
    pub fn stage(&self) -> Option<Stage> {
        match self.command {
            Command::Merge(_) => Some(Stage::Merge),
            Command::Annotate(_) => Some(Stage::Annotate),
            Command::Features(_) => Some(Stage::Features),
            Command::Import(_) => Some(Stage::Import),
            Command::EnvTemplate { .. } => None,
        }
    }

    pub fn to_app_config(&self) -> Result<AppConfig, ConfigError> {
        let mut cfg = AppConfig {
            database: DatabaseConfig {
                path: self.db.clone(),
                create_if_missing: matches!(self.command, Command::Import(_)),
                journal_mode: self.journal.into(),
                sync_mode: if self.sync_full {
                    SyncMode::Full
                } else {
                    SyncMode::Normal
                },
                busy_timeout_ms: self.busy_timeout_ms,
            },
            ..AppConfig::default()
        };

        match &self.command {
            Command::Merge(a) => {
                cfg.merge = MergeConfig {
                    source_a: a.source_a.clone(),
                    source_b: a.source_b.clone(),
                    destination: a.destination.clone(),
                    batch_size_a: a.batch_a,
                    batch_size_b: a.batch_b,
                    seed: a.seed,
                };
            }
            Command::Annotate(a) => {
                cfg.engine = EngineConfig {
                    path: a.engine.clone(),
                    depth: a.depth,
                    mate_score: a.mate_score,
                    handshake_timeout_ms: a.handshake_ms,
                    search_timeout_ms: a.search_timeout_ms,
                    ..EngineConfig::default()
                };
                cfg.annotate = AnnotateConfig {
                    table: a.table.clone(),
                    fen_column: a.fen_column.clone(),
                    column: a.column.clone(),
                    batch_size: a.batch_size,
                    max_stalled_iterations: a.max_stalled,
                };
            }
            Command::Features(a) => {
                cfg.features = FeaturesConfig {
                    table: a.table.clone(),
                    fen_column: a.fen_column.clone(),
                    batch_size: a.batch_size,
                    max_stalled_iterations: a.max_stalled,
                };
            }
            Command::Import(a) => {
                cfg.import = ImportConfig {
                    csv_path: a.csv.clone(),
                    table: a.table.clone(),
                    has_headers: !a.no_headers,
                    commit_every: a.commit_every,
                };
            }
            Command::EnvTemplate { .. } => {}
        }
        cfg.validate()?;
        Ok(cfg)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    fn parse(args: &[&str]) -> Cli {
        Cli::try_parse_from(std::iter::once("chess_data_prep").chain(args.iter().copied()))
            .unwrap()
    }

    #[test]
    fn command_definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn merge_flags_reach_config() {
        let cli = parse(&["--db", "x.db", "merge", "--seed", "7", "--batch-b", "5"]);
        assert_eq!(cli.stage(), Some(Stage::Merge));
        let cfg = cli.to_app_config().unwrap();
        assert_eq!(cfg.database.path, PathBuf::from("x.db"));
        assert!(!cfg.database.create_if_missing);
        assert_eq!(cfg.merge.seed, 7);
        assert_eq!(cfg.merge.batch_size_b, 5);
        assert_eq!(cfg.merge.batch_size_a, 80_000);
    }

    #[test]
    fn annotate_column_follows_depth() {
        let cli = parse(&["annotate", "--depth", "14", "--engine", "/opt/sf", "--db", "y.db"]);
        let cfg = cli.to_app_config().unwrap();
        assert_eq!(cfg.annotate.column_name(cfg.engine.depth), "stock_d14");
        assert_eq!(cfg.engine.path, PathBuf::from("/opt/sf"));
        assert_eq!(cfg.database.path, PathBuf::from("y.db"));
        assert_eq!(cfg.engine.search_timeout_ms, None);

        let cfg = parse(&["annotate", "--search-timeout-ms", "1500"])
            .to_app_config()
            .unwrap();
        assert_eq!(cfg.engine.search_timeout(), Some(std::time::Duration::from_millis(1500)));
    }

    #[test]
    fn only_import_creates_the_database() {
        let cfg = parse(&["import", "in.csv", "--no-headers"])
            .to_app_config()
            .unwrap();
        assert!(cfg.database.create_if_missing);
        assert!(!cfg.import.has_headers);
        assert_eq!(cfg.import.csv_path, PathBuf::from("in.csv"));
    }

    #[test]
    fn invalid_values_are_config_errors() {
        let cli = parse(&["annotate", "--max-stalled", "0"]);
        assert!(matches!(
            cli.to_app_config(),
            Err(ConfigError::InvalidValue { .. })
        ));
        let cli = parse(&["merge", "--destination", "bad name"]);
        assert!(cli.to_app_config().is_err());
        assert!(parse(&["env-template"]).stage().is_none());
    }
}
