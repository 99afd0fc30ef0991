use std::process::Stdio;
use std::time::Duration;

use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader, Lines};
use tokio::process::{Child, ChildStdin, ChildStdout, Command};

use super::{Evaluator, Score, parse_info_score};
use crate::config::EngineConfig;
use crate::error::EngineError;
use crate::position::Position;

/// A UCI engine subprocess, started once and owned by a single caller.
///
/// The child is killed if this handle is dropped without [`Evaluator::shutdown`].
pub struct UciEngine {
    child: Child,
    stdin: ChildStdin,
    lines: Lines<BufReader<ChildStdout>>,
    name: Option<String>,
    search_timeout: Option<Duration>,
    quit_timeout: Duration,
}

impl UciEngine {
    pub async fn start(cfg: &EngineConfig) -> Result<Self, EngineError> {
        let path = cfg.path.display().to_string();
        let mut child = Command::new(&cfg.path)
            .args(&cfg.args)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::null())
            .kill_on_drop(true)
            .spawn()
            .map_err(|source| EngineError::Spawn {
                path: path.clone(),
                source,
            })?;
        let stdin = child
            .stdin
            .take()
            .ok_or_else(|| EngineError::Handshake("stdin not captured".into()))?;
        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| EngineError::Handshake("stdout not captured".into()))?;

        let mut engine = Self {
            child,
            stdin,
            lines: BufReader::new(stdout).lines(),
            name: None,
            search_timeout: cfg.search_timeout(),
            quit_timeout: cfg.quit_timeout(),
        };

        let limit = cfg.handshake_timeout();
        tokio::time::timeout(limit, engine.handshake())
            .await
            .map_err(|_| EngineError::Timeout(limit))??;
        log::info!(
            "Engine ready: {} ({})",
            engine.name.as_deref().unwrap_or("unnamed"),
            path
        );
        Ok(engine)
    }

    async fn handshake(&mut self) -> Result<(), EngineError> {
        self.send("uci").await?;
        loop {
            let line = self.read_line().await?;
            if let Some(name) = line.strip_prefix("id name ") {
                self.name = Some(name.trim().to_string());
            } else if line.trim() == "uciok" {
                break;
            }
        }
        self.send("isready").await?;
        self.wait_for("readyok").await
    }

    async fn send(&mut self, cmd: &str) -> Result<(), EngineError> {
        log::trace!("engine <- {}", cmd);
        self.stdin.write_all(cmd.as_bytes()).await?;
        self.stdin.write_all(b"\n").await?;
        self.stdin.flush().await?;
        Ok(())
    }

    async fn read_line(&mut self) -> Result<String, EngineError> {
        match self.lines.next_line().await? {
            Some(line) => {
                log::trace!("engine -> {}", line);
                Ok(line)
            }
            None => Err(EngineError::Exited),
        }
    }

    async fn wait_for(&mut self, token: &str) -> Result<(), EngineError> {
        loop {
            if self.read_line().await?.trim() == token {
                return Ok(());
            }
        }
    }

    async fn search(&mut self, position: &Position, depth: u32) -> Result<Score, EngineError> {
        self.send(&format!("position fen {}", position.to_fen()))
            .await?;
        self.send(&format!("go depth {}", depth)).await?;

        let mut exact = None;
        let mut bound = None;
        loop {
            let line = self.read_line().await?;
            if line.starts_with("bestmove") {
                break;
            }
            if let Some(info) = parse_info_score(&line) {
                if info.exact {
                    exact = Some(info.score);
                } else {
                    bound = Some(info.score);
                }
            }
        }
        exact
            .or(bound)
            .ok_or_else(|| EngineError::Protocol("no score reported before bestmove".into()))
    }
}

impl Evaluator for UciEngine {
    async fn evaluate(&mut self, position: &Position, depth: u32) -> Result<Score, EngineError> {
        let Some(limit) = self.search_timeout else {
            return self.search(position, depth).await;
        };
        match tokio::time::timeout(limit, self.search(position, depth)).await {
            Ok(result) => result,
            Err(_) => {
                log::warn!(
                    "Engine gave no bestmove within {:?} for {}",
                    limit,
                    position.to_fen()
                );
                Err(EngineError::Timeout(limit))
            }
        }
    }

    async fn shutdown(mut self) -> Result<(), EngineError> {
        if let Err(e) = self.send("quit").await {
            log::debug!("engine quit not delivered: {}", e);
        }
        match tokio::time::timeout(self.quit_timeout, self.child.wait()).await {
            Ok(status) => {
                let status = status?;
                log::debug!("engine exited: {}", status);
            }
            Err(_) => {
                log::warn!(
                    "engine ignored quit for {:?}; killing it",
                    self.quit_timeout
                );
                self.child.kill().await?;
            }
        }
        Ok(())
    }
}
