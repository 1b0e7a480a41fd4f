//! Practice-hash board parsing (spec.md GLOSSARY / 7's ASCII hash form):
//! a 16-character hex string, one nibble per square, x-major, the same
//! encoding `interface.cpp`'s `board_to_hash`/`hash_to_board` use. Also
//! accepts a plain decimal `u64`, matching the meta file's format.
use anyhow::{Context, Result};

use solver2048_core::Board;

pub fn parse_board(input: &str) -> Result<Board> {
    if input.len() == 16 && input.bytes().all(|b| b.is_ascii_hexdigit()) {
        let mut board = Board::new(0);
        let mut chars = input.chars();
        for x in 0..4 {
            for y in 0..4 {
                let c = chars.next().expect("16 characters checked above");
                let value = c.to_digit(16).expect("hex digit checked above") as u8;
                board = board.set_tile(x, y, value);
            }
        }
        return Ok(board);
    }

    let raw: u64 = input
        .parse()
        .with_context(|| format!("'{input}' is neither a 16-character hash nor a decimal u64"))?;
    Ok(Board::new(raw))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hash_round_trips_through_get_tile() {
        let board = parse_board("0123456789abcdef").unwrap();
        assert_eq!(board.get_tile(0, 0), 0);
        assert_eq!(board.get_tile(0, 1), 1);
        assert_eq!(board.get_tile(3, 3), 0xf);
    }

    #[test]
    fn decimal_input_is_accepted() {
        let board = parse_board("0").unwrap();
        assert_eq!(board.0, 0);
    }

    #[test]
    fn rejects_garbage_input() {
        assert!(parse_board("not-a-board").is_err());
    }
}
