use anyhow::{Context, Result};
use std::collections::HashMap;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

/// Parse `KEY=value` lines; blank lines and `#` comments are skipped and
/// surrounding quotes are stripped from values.
pub fn parse_env_content(content: &str) -> HashMap<String, String> {
    let mut map = HashMap::new();
    for (idx, line) in content.lines().enumerate() {
        let s = line.trim();
        if s.is_empty() || s.starts_with('#') {
            continue;
        }
        let Some((key, val)) = s.split_once('=') else {
            eprintln!(
                "Warning: ignoring .env line {} without '=': {}",
                idx + 1,
                line
            );
            continue;
        };
        let val = val.trim();
        let val = if val.len() >= 2
            && ((val.starts_with('"') && val.ends_with('"'))
                || (val.starts_with('\'') && val.ends_with('\'')))
        {
            &val[1..val.len() - 1]
        } else {
            val
        };
        map.insert(key.trim().to_string(), val.to_string());
    }
    map
}

/// Load an env file into the process environment without overriding
/// variables that are already set. A missing file is not an error.
pub fn load_env_file(path: &Path) -> Result<HashMap<String, String>> {
    if !path.exists() {
        return Ok(HashMap::new());
    }
    let content = fs::read_to_string(path)
        .with_context(|| format!("Failed to read {}", path.display()))?;
    let map = parse_env_content(&content);
    for (k, v) in &map {
        if std::env::var_os(k).is_none() {
            // called once from main before the runtime starts other threads
            unsafe {
                std::env::set_var(k, v);
            }
        }
    }
    Ok(map)
}

/// `--env-file` has to be honoured before clap reads env fallbacks, so it is
/// picked out of the raw arguments.
pub fn env_file_arg<I: IntoIterator<Item = String>>(args: I) -> Option<PathBuf> {
    let mut it = args.into_iter();
    while let Some(a) = it.next() {
        if a == "--env-file" {
            return it.next().map(PathBuf::from);
        }
        if let Some(p) = a.strip_prefix("--env-file=") {
            return Some(PathBuf::from(p));
        }
    }
    None
}

/// Write a commented `.env` template listing every supported variable.
pub fn write_env_template(path: &Path) -> Result<()> {
    let mut f = fs::File::create(path)
        .with_context(|| format!("Failed to create {}", path.display()))?;
    let template = r#"# chess_data_prep environment template
# Copy this file to .env; variables already set in the environment win.

# Database
CHESS_PREP_DB=data/chess_evals.db
#CHESS_PREP_JOURNAL=wal
#CHESS_PREP_SYNC_FULL=false
#CHESS_PREP_BUSY_TIMEOUT_MS=5000
#CHESS_PREP_POOL_SIZE=4
#CHESS_PREP_ACQUIRE_MS=30000

# merge
#CHESS_PREP_SOURCE_A=training_dataset
#CHESS_PREP_SOURCE_B=testing_dataset
#CHESS_PREP_DESTINATION=merged_shuffled_dataset
#CHESS_PREP_BATCH_A=80000
#CHESS_PREP_BATCH_B=20000
#CHESS_PREP_SEED=42

# annotate
CHESS_PREP_ENGINE=stockfish
#CHESS_PREP_DEPTH=10
#CHESS_PREP_MATE_SCORE=2000
#CHESS_PREP_HANDSHAKE_MS=10000
#CHESS_PREP_SEARCH_TIMEOUT_MS=60000
#CHESS_PREP_ANNOTATE_TABLE=training_dataset
#CHESS_PREP_FEN_COLUMN=fen
#CHESS_PREP_EVAL_COLUMN=stock_d10
#CHESS_PREP_ANNOTATE_BATCH=10000
#CHESS_PREP_MAX_STALLED=1

# features
#CHESS_PREP_FEATURES_TABLE=training_dataset
#CHESS_PREP_FEATURES_BATCH=500

# import
#CHESS_PREP_CSV=data/chessData.csv
#CHESS_PREP_IMPORT_TABLE=evaluations
#CHESS_PREP_COMMIT_EVERY=50000

# Logging
#RUST_LOG=info,sqlx=warn
"#;
    f.write_all(template.as_bytes())?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_quotes_and_comments() {
        let map = parse_env_content(
            "# comment\n\nCHESS_PREP_DB = \"data/x.db\"\nCHESS_PREP_ENGINE='sf'\nbroken line\nEMPTY=\n",
        );
        assert_eq!(map.get("CHESS_PREP_DB").map(String::as_str), Some("data/x.db"));
        assert_eq!(map.get("CHESS_PREP_ENGINE").map(String::as_str), Some("sf"));
        assert_eq!(map.get("EMPTY").map(String::as_str), Some(""));
        assert_eq!(map.len(), 3);
    }

    #[test]
    fn finds_env_file_flag() {
        let args = |v: &[&str]| v.iter().map(|s| s.to_string()).collect::<Vec<_>>();
        assert_eq!(
            env_file_arg(args(&["bin", "--env-file", "prod.env", "merge"])),
            Some(PathBuf::from("prod.env"))
        );
        assert_eq!(
            env_file_arg(args(&["bin", "--env-file=a.env"])),
            Some(PathBuf::from("a.env"))
        );
        assert_eq!(env_file_arg(args(&["bin", "merge"])), None);
    }

    #[test]
    fn template_round_trips_through_parser() {
        let path = std::env::temp_dir().join(format!("chess_prep_env_{}.template", std::process::id()));
        write_env_template(&path).unwrap();
        let map = parse_env_content(&std::fs::read_to_string(&path).unwrap());
        assert_eq!(map.get("CHESS_PREP_ENGINE").map(String::as_str), Some("stockfish"));
        assert!(map.contains_key("CHESS_PREP_DB"));
        let _ = std::fs::remove_file(path);
    }
}
