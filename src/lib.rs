pub mod cli;
pub mod config;
pub mod db;
pub mod error;
pub mod logging;
pub mod metrics;
pub mod models;
pub mod orchestrator;
pub mod pipeline;
pub mod position;
pub mod uci;
pub mod util;

#[cfg(test)]
mod test_support;
