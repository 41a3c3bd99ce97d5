//! Board identification from board-list output
//!
//! The board-list tool prints free text, one attached device per line.
//! Matching is done against a fixed, ordered table of [`BoardMapping`]s:
//! the first mapping (in priority order) whose token appears on any line
//! wins. Output matching nothing yields `None`; the caller then falls back
//! to the configured default board instead of failing.

use crate::config::BoardMapping;

/// Find the highest-priority board mentioned in `output`
pub fn match_board<'a>(output: &str, boards: &'a [BoardMapping]) -> Option<&'a BoardMapping> {
    boards.iter().find(|board| {
        !board.token.is_empty() && output.lines().any(|line| line.contains(&board.token))
    })
}
