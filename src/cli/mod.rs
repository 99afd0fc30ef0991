//! Command-line surface: one subcommand per stage, every flag with a
//! `CHESS_PREP_*` environment fallback.

mod clap_parser;

pub use clap_parser::{
    AnnotateArgs, Cli, Command, FeaturesArgs, ImportArgs, JournalOpt, MergeArgs,
};
