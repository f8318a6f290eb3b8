//! Subsequence matcher that scores how a typed query relates to a name.
//!
//! The rank is an integer where lower is better:
//!
//! ```text
//! -1          query equals the name
//! 0..100      query occurs contiguously, rank = chars in front of it
//! 100 + gaps  query letters are scattered, rank grows with the skipped chars
//! ```
//!
//! Positions are char offsets into the lower-cased name, so a UI can
//! highlight the matched letters.

use serde::{Deserialize, Serialize};

/// Base penalty for a scattered match, so it always sinks below a contiguous one.
pub const SCATTERED_PENALTY: i32 = 100;

/// Rank reserved for a query that is the whole name.
pub const EXACT_MATCH: i32 = -1;

/// How a query matched a name.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MatchResult {
    /// Lower is better, `-1` is an exact match.
    pub rank: i32,
    /// Strictly increasing char offsets into the lower-cased name.
    pub matched_positions: Vec<usize>,
}

/// Normalize text for matching.
pub fn normalize(text: &str) -> String {
    text.to_lowercase()
}

/// Score `query` against `name`.
///
/// `query` must already be normalized. Returns `None` when the query is not a
/// subsequence of the name.
pub fn match_name(name: &str, query: &str) -> Option<MatchResult> {
    let name: Vec<char> = normalize(name).chars().collect();
    let query: Vec<char> = query.chars().collect();

    if let Some(index) = find_contiguous(&name, &query) {
        let rank = if index == 0 && query.len() == name.len() {
            EXACT_MATCH
        } else {
            i32::try_from(index).unwrap_or(i32::MAX)
        };
        return Some(MatchResult {
            rank,
            matched_positions: (index..index + query.len()).collect(),
        });
    }

    match_scattered(&name, &query)
}

/// Whether every char of `query` occurs in `name`, in order.
///
/// Both sides must already be normalized.
pub fn is_subsequence(name: &str, query: &str) -> bool {
    let mut name_chars = name.chars();
    query.chars().all(|q| name_chars.any(|n| n == q))
}

fn find_contiguous(name: &[char], query: &[char]) -> Option<usize> {
    if query.is_empty() {
        return Some(0);
    }
    if query.len() > name.len() {
        return None;
    }
    name.windows(query.len()).position(|window| window == query)
}

/// Lockstep walk: each skipped name char costs one point on top of the
/// scattered penalty. Running off the end of the name means no match.
fn match_scattered(name: &[char], query: &[char]) -> Option<MatchResult> {
    let mut rank = SCATTERED_PENALTY;
    let mut positions = Vec::with_capacity(query.len());
    let mut cursor = 0usize;

    for &query_char in query {
        loop {
            let name_char = *name.get(cursor)?;
            if name_char == query_char {
                break;
            }
            rank = rank.saturating_add(1);
            cursor += 1;
        }
        positions.push(cursor);
        cursor += 1;
    }

    Some(MatchResult {
        rank,
        matched_positions: positions,
    })
}
