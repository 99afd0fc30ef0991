//! Evaluation engine seam and the UCI protocol pieces that do not need a process.

pub mod process;

pub use process::UciEngine;

use crate::error::EngineError;
use crate::position::{Color, Position};

/// Engine score as reported, relative to the side to move.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Score {
    Centipawns(i32),
    /// Mate in N moves; negative when the side to move gets mated, 0 when it already is.
    Mate(i32),
}

impl Score {
    /// Signed value from White's point of view, with every mate collapsed to
    /// `±mate_score`.
    pub fn white_pov(self, side_to_move: Color, mate_score: i32) -> i32 {
        let relative = match self {
            Score::Centipawns(cp) => cp,
            Score::Mate(n) if n > 0 => mate_score,
            Score::Mate(_) => -mate_score,
        };
        match side_to_move {
            Color::White => relative,
            Color::Black => -relative,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InfoScore {
    pub score: Score,
    /// `false` for `lowerbound` / `upperbound` reports.
    pub exact: bool,
}

/// Extract the primary-line score from a UCI `info` line.
pub fn parse_info_score(line: &str) -> Option<InfoScore> {
    let tokens: Vec<&str> = line.split_whitespace().collect();
    if tokens.first() != Some(&"info") {
        return None;
    }
    if let Some(i) = tokens.iter().position(|t| *t == "multipv") {
        if tokens.get(i + 1).and_then(|v| v.parse::<u32>().ok()) != Some(1) {
            return None;
        }
    }
    let i = tokens.iter().position(|t| *t == "score")?;
    let value: i32 = tokens.get(i + 2)?.parse().ok()?;
    let score = match *tokens.get(i + 1)? {
        "cp" => Score::Centipawns(value),
        "mate" => Score::Mate(value),
        _ => return None,
    };
    let exact = !matches!(
        tokens.get(i + 3),
        Some(&"lowerbound") | Some(&"upperbound")
    );
    Some(InfoScore { score, exact })
}

/// A long-lived, strictly request/response evaluator.
///
/// Owners must call [`Evaluator::shutdown`] on every exit path.
#[allow(async_fn_in_trait)]
pub trait Evaluator {
    async fn evaluate(&mut self, position: &Position, depth: u32) -> Result<Score, EngineError>;

    async fn shutdown(self) -> Result<(), EngineError>
    where
        Self: Sized;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_centipawn_and_mate_lines() {
        assert_eq!(
            parse_info_score("info depth 10 seldepth 14 multipv 1 score cp -37 nodes 9000 pv e7e5"),
            Some(InfoScore {
                score: Score::Centipawns(-37),
                exact: true
            })
        );
        assert_eq!(
            parse_info_score("info depth 5 score mate 3 pv h5f7"),
            Some(InfoScore {
                score: Score::Mate(3),
                exact: true
            })
        );
        assert_eq!(
            parse_info_score("info depth 7 score cp 12 lowerbound nodes 10"),
            Some(InfoScore {
                score: Score::Centipawns(12),
                exact: false
            })
        );
    }

    #[test]
    fn ignores_lines_without_primary_score() {
        assert_eq!(parse_info_score("info string NNUE evaluation enabled"), None);
        assert_eq!(parse_info_score("info depth 3 currmove e2e4"), None);
        assert_eq!(parse_info_score("info depth 9 multipv 2 score cp 5"), None);
        assert_eq!(parse_info_score("bestmove e2e4 ponder e7e5"), None);
        assert_eq!(parse_info_score("info score wdl 1 2 3"), None);
    }

    #[test]
    fn white_pov_flips_for_black_and_collapses_mates() {
        assert_eq!(Score::Centipawns(40).white_pov(Color::White, 2000), 40);
        assert_eq!(Score::Centipawns(40).white_pov(Color::Black, 2000), -40);
        assert_eq!(Score::Centipawns(0).white_pov(Color::Black, 2000), 0);
        assert_eq!(Score::Mate(4).white_pov(Color::White, 2000), 2000);
        assert_eq!(Score::Mate(-1).white_pov(Color::White, 2000), -2000);
        assert_eq!(Score::Mate(2).white_pov(Color::Black, 2000), -2000);
        // side to move is already mated
        assert_eq!(Score::Mate(0).white_pov(Color::White, 2000), -2000);
        assert_eq!(Score::Mate(0).white_pov(Color::Black, 2000), 2000);
    }
}
