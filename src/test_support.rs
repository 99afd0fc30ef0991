use std::path::PathBuf;
use std::sync::atomic::{AtomicUsize, Ordering};

use sqlx::SqlitePool;

use crate::config::{DatabaseConfig, EngineConfig};
use crate::db::make_pool;

static NEXT_DB: AtomicUsize = AtomicUsize::new(0);

pub fn temp_db_path(tag: &str) -> PathBuf {
    let n = NEXT_DB.fetch_add(1, Ordering::SeqCst);
    let nanos = std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap()
        .as_nanos();
    std::env::temp_dir().join(format!(
        "chess_prep_{}_{}_{}_{}.db",
        tag,
        std::process::id(),
        n,
        nanos
    ))
}

pub fn temp_db_config(tag: &str) -> DatabaseConfig {
    DatabaseConfig {
        path: temp_db_path(tag),
        create_if_missing: true,
        ..DatabaseConfig::default()
    }
}

pub async fn test_pool(tag: &str) -> SqlitePool {
    make_pool(&temp_db_config(tag)).await.unwrap()
}

pub async fn exec(pool: &SqlitePool, sql: &str) {
    sqlx::query(sql).execute(pool).await.unwrap();
}

pub const START_FEN: &str = "rnbqkbnr/pppppppp/8/8/8/8/PPPPPPPP/RNBQKBNR w KQkq - 0 1";
pub const AFTER_E4_FEN: &str = "rnbqkbnr/pppppppp/8/8/4P3/8/PPPP1PPP/RNBQKBNR b KQkq e3 0 1";

/// A `/bin/sh` UCI engine: `cp 35` for White to move, `mate -2` for Black to move.
const SCRIPTED_ENGINE: &str = r#"
while IFS= read -r line; do
  case "$line" in
    uci) echo "id name ScriptFish 1"; echo "uciok" ;;
    isready) echo "readyok" ;;
    "position fen "*) fen="${line#position fen }" ;;
    go*)
      case "$fen" in
        *" b "*) echo "info depth 1 score mate -2 pv a7a6"; echo "bestmove a7a6" ;;
        *) echo "info depth 1 score cp 10 lowerbound"; echo "info depth 2 score cp 35 nodes 100 pv e2e4"; echo "bestmove e2e4" ;;
      esac ;;
    quit) exit 0 ;;
  esac
done
"#;

pub fn scripted_engine_config() -> EngineConfig {
    EngineConfig {
        path: PathBuf::from("/bin/sh"),
        args: vec!["-c".into(), SCRIPTED_ENGINE.into()],
        handshake_timeout_ms: 5_000,
        ..EngineConfig::default()
    }
}
