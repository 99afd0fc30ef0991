//! FEN parsing and the compact feature encoding stored next to each position.
//!
//! Squares are numbered the way the training tools expect: bit 63 is a8, bit 56
//! is h8, bit 7 is a1 and bit 0 is h1.

use crate::error::FenError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Color {
    White,
    Black,
}

/// Piece letters in bitboard order: white `PNBRQK`, then black `pnbrqk`.
pub const PIECE_CHARS: [char; 12] = ['P', 'N', 'B', 'R', 'Q', 'K', 'p', 'n', 'b', 'r', 'q', 'k'];

pub const CASTLE_WHITE_KING: u8 = 1 << 0;
pub const CASTLE_WHITE_QUEEN: u8 = 1 << 1;
pub const CASTLE_BLACK_KING: u8 = 1 << 2;
pub const CASTLE_BLACK_QUEEN: u8 = 1 << 3;
const INFO_BLACK_TO_MOVE: u64 = 1 << 4;

#[inline]
fn square(rank: usize, file: usize) -> u8 {
    (rank * 8 + (7 - file)) as u8
}

fn parse_square(s: &str) -> Option<(usize, usize)> {
    let b = s.as_bytes();
    if b.len() != 2 {
        return None;
    }
    let file = b[0].checked_sub(b'a').filter(|f| *f < 8)?;
    let rank = b[1].checked_sub(b'1').filter(|r| *r < 8)?;
    Some((rank as usize, file as usize))
}

const BACK_RANKS: u64 = 0xFF00_0000_0000_00FF;

/// Reject boards an engine cannot search: each side needs exactly one king and
/// no pawn may stand on rank 1 or 8.
fn check_board(pieces: &[u64; 12]) -> Result<(), FenError> {
    for (idx, side) in [(5, 'K'), (11, 'k')] {
        let count = pieces[idx].count_ones();
        if count != 1 {
            return Err(FenError::KingCount { king: side, count });
        }
    }
    if (pieces[0] | pieces[6]) & BACK_RANKS != 0 {
        return Err(FenError::PawnOnBackRank);
    }
    Ok(())
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Position {
    pieces: [u64; 12],
    side_to_move: Color,
    castling: u8,
    en_passant: Option<u8>,
    halfmove_clock: u32,
    fullmove_number: u32,
}

impl Position {
    /// Parse a FEN record. Fields after the placement are optional and default
    /// to `w - - 0 1`.
    pub fn from_fen(fen: &str) -> Result<Self, FenError> {
        let mut fields = fen.split_whitespace();
        let placement = fields.next().ok_or(FenError::Empty)?;

        let ranks: Vec<&str> = placement.split('/').collect();
        if ranks.len() != 8 {
            return Err(FenError::RankCount(ranks.len()));
        }
        let mut pieces = [0u64; 12];
        for (i, text) in ranks.iter().enumerate() {
            let rank = 7 - i;
            let mut file = 0usize;
            for c in text.chars() {
                if let Some(d) = c.to_digit(10) {
                    if d == 0 || d > 8 {
                        return Err(FenError::Piece(c));
                    }
                    file += d as usize;
                } else {
                    let idx = PIECE_CHARS
                        .iter()
                        .position(|p| *p == c)
                        .ok_or(FenError::Piece(c))?;
                    if file >= 8 {
                        return Err(FenError::RankWidth {
                            rank: rank + 1,
                            files: file + 1,
                        });
                    }
                    pieces[idx] |= 1u64 << square(rank, file);
                    file += 1;
                }
            }
            if file != 8 {
                return Err(FenError::RankWidth {
                    rank: rank + 1,
                    files: file,
                });
            }
        }

        let side_to_move = match fields.next() {
            None | Some("w") => Color::White,
            Some("b") => Color::Black,
            Some(other) => return Err(FenError::Turn(other.to_string())),
        };

        let castling = match fields.next() {
            None | Some("-") => 0,
            Some(text) => {
                let mut bits = 0u8;
                for c in text.chars() {
                    let bit = match c {
                        'K' => CASTLE_WHITE_KING,
                        'Q' => CASTLE_WHITE_QUEEN,
                        'k' => CASTLE_BLACK_KING,
                        'q' => CASTLE_BLACK_QUEEN,
                        _ => return Err(FenError::Castling(text.to_string())),
                    };
                    if bits & bit != 0 {
                        return Err(FenError::Castling(text.to_string()));
                    }
                    bits |= bit;
                }
                bits
            }
        };

        let en_passant = match fields.next() {
            None | Some("-") => None,
            Some(text) => match parse_square(text) {
                Some((rank, file)) if rank == 2 || rank == 5 => Some(square(rank, file)),
                _ => return Err(FenError::EnPassant(text.to_string())),
            },
        };

        let halfmove_clock = match fields.next() {
            None => 0,
            Some(text) => text
                .parse::<u32>()
                .map_err(|_| FenError::Counter(text.to_string()))?,
        };
        let fullmove_number = match fields.next() {
            None => 1,
            Some(text) => text
                .parse::<u32>()
                .map_err(|_| FenError::Counter(text.to_string()))?,
        };
        if let Some(extra) = fields.next() {
            return Err(FenError::Trailing(extra.to_string()));
        }
        check_board(&pieces)?;

        Ok(Self {
            pieces,
            side_to_move,
            castling,
            en_passant,
            halfmove_clock,
            fullmove_number,
        })
    }

    pub fn side_to_move(&self) -> Color {
        self.side_to_move
    }

    pub fn castling(&self) -> u8 {
        self.castling
    }

    /// Twelve piece bitboards in [`PIECE_CHARS`] order.
    pub fn bitboards(&self) -> [u64; 12] {
        self.pieces
    }

    pub fn en_passant_bitboard(&self) -> u64 {
        self.en_passant.map_or(0, |sq| 1u64 << sq)
    }

    /// Castling rights in bits 0..=3 (`K`, `Q`, `k`, `q`), bit 4 set when Black moves.
    pub fn info(&self) -> u64 {
        let mut info = u64::from(self.castling);
        if self.side_to_move == Color::Black {
            info |= INFO_BLACK_TO_MOVE;
        }
        info
    }

    fn piece_at(&self, rank: usize, file: usize) -> Option<char> {
        let bit = 1u64 << square(rank, file);
        self.pieces
            .iter()
            .position(|bb| bb & bit != 0)
            .map(|idx| PIECE_CHARS[idx])
    }

    pub fn to_fen(&self) -> String {
        let mut out = String::with_capacity(90);
        for rank in (0..8).rev() {
            let mut empty = 0;
            for file in 0..8 {
                match self.piece_at(rank, file) {
                    Some(c) => {
                        if empty > 0 {
                            out.push(char::from(b'0' + empty));
                            empty = 0;
                        }
                        out.push(c);
                    }
                    None => empty += 1,
                }
            }
            if empty > 0 {
                out.push(char::from(b'0' + empty));
            }
            if rank > 0 {
                out.push('/');
            }
        }

        out.push(' ');
        out.push(match self.side_to_move {
            Color::White => 'w',
            Color::Black => 'b',
        });

        out.push(' ');
        if self.castling == 0 {
            out.push('-');
        } else {
            for (bit, c) in [
                (CASTLE_WHITE_KING, 'K'),
                (CASTLE_WHITE_QUEEN, 'Q'),
                (CASTLE_BLACK_KING, 'k'),
                (CASTLE_BLACK_QUEEN, 'q'),
            ] {
                if self.castling & bit != 0 {
                    out.push(c);
                }
            }
        }

        out.push(' ');
        match self.en_passant {
            None => out.push('-'),
            Some(sq) => {
                let rank = usize::from(sq / 8);
                let file = 7 - usize::from(sq % 8);
                out.push(char::from(b'a' + file as u8));
                out.push(char::from(b'1' + rank as u8));
            }
        }

        out.push_str(&format!(" {} {}", self.halfmove_clock, self.fullmove_number));
        out
    }
}
