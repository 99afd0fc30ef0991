use std::process::ExitCode;

use clap::Parser;

use chess_data_prep::cli::{Cli, Command};
use chess_data_prep::error::ConfigError;
use chess_data_prep::logging::init_tracing_from_env;
use chess_data_prep::orchestrator::run_stage;
use chess_data_prep::util::envfile::{env_file_arg, load_env_file, write_env_template};

const EXIT_FAILURE: u8 = 1;
const EXIT_CONFIG: u8 = 2;

fn main() -> ExitCode {
    // env files first so RUST_LOG and the CHESS_PREP_* fallbacks see them
    let env_path = env_file_arg(std::env::args()).unwrap_or_else(|| ".env".into());
    if let Err(e) = load_env_file(&env_path) {
        eprintln!("Warning: {:#}", e);
    }
    init_tracing_from_env();

    let cli = Cli::parse();
    if let Command::EnvTemplate { path } = &cli.command {
        return match write_env_template(path) {
            Ok(()) => {
                log::info!("Wrote {}", path.display());
                ExitCode::SUCCESS
            }
            Err(e) => {
                log::error!("{:#}", e);
                ExitCode::from(EXIT_FAILURE)
            }
        };
    }

    let cfg = match cli.to_app_config() {
        Ok(cfg) => cfg,
        Err(e) => return config_failure(&e),
    };
    let Some(stage) = cli.stage() else {
        return ExitCode::SUCCESS;
    };
    let rt = match tokio::runtime::Builder::new_multi_thread().enable_all().build() {
        Ok(rt) => rt,
        Err(e) => {
            log::error!("Failed to start async runtime: {}", e);
            return ExitCode::from(EXIT_FAILURE);
        }
    };
    match rt.block_on(run_stage(&cfg, stage)) {
        Ok(_) => ExitCode::SUCCESS,
        Err(e) => match e.downcast_ref::<ConfigError>() {
            Some(ce) => config_failure(ce),
            None => {
                log::error!("{} failed: {:#}", stage.label(), e);
                ExitCode::from(EXIT_FAILURE)
            }
        },
    }
}

fn config_failure(e: &ConfigError) -> ExitCode {
    log::error!("Configuration error: {}", e);
    ExitCode::from(EXIT_CONFIG)
}
