//! Search result types and the ranker.
//!
//! Candidate sources pre-filter their universe to names that contain the
//! query as a subsequence and return them in order of desirability. The
//! ranker scores every survivor with the matcher and stable-sorts by rank,
//! so equally ranked candidates keep the source's order.

use serde::{Deserialize, Serialize};
use tokio_util::sync::CancellationToken;

use super::matcher::{self, MatchResult};
use crate::error::RankResult;
use crate::services::commands::CommandCode;

/// A subject that can be matched against a query.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Candidate {
    /// Display name, used for matching
    pub name: String,
    /// Stable identifier (e.g. a package or desktop entry id)
    pub subject_id: String,
}

impl Candidate {
    pub fn new(name: impl Into<String>, subject_id: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            subject_id: subject_id.into(),
        }
    }
}

/// Anything with a name the matcher can score.
pub trait Matchable {
    fn match_text(&self) -> &str;
}

impl Matchable for Candidate {
    fn match_text(&self) -> &str {
        &self.name
    }
}

/// A source of candidates for the ranker.
pub trait CandidateSource: Send + Sync {
    /// Candidates whose name contains `query` as a case-insensitive
    /// subsequence, in the order ties should resolve to.
    fn candidates_matching(&self, query: &str) -> RankResult<Vec<Candidate>>;
}

/// An item together with how it matched.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Ranked<T> {
    pub item: T,
    pub matched: MatchResult,
}

/// What a search result points at.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum ResultKind {
    /// An installed application
    App { subject_id: String },

    /// A debug command typed into the search box
    Command { code: CommandCode },
}

/// Search results that appear in the launcher.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SearchResult {
    pub name: String,
    pub rank: i32,
    pub matched_positions: Vec<usize>,
    pub kind: ResultKind,
}

impl SearchResult {
    pub fn from_app(ranked: Ranked<Candidate>) -> Self {
        Self {
            name: ranked.item.name,
            rank: ranked.matched.rank,
            matched_positions: ranked.matched.matched_positions,
            kind: ResultKind::App {
                subject_id: ranked.item.subject_id,
            },
        }
    }

    pub fn from_command(ranked: Ranked<CommandCode>) -> Self {
        Self {
            name: ranked.item.name().to_string(),
            rank: ranked.matched.rank,
            matched_positions: ranked.matched.matched_positions,
            kind: ResultKind::Command { code: ranked.item },
        }
    }

    /// The subject id for app results.
    pub fn subject_id(&self) -> Option<&str> {
        match &self.kind {
            ResultKind::App { subject_id } => Some(subject_id),
            ResultKind::Command { .. } => None,
        }
    }
}

/// Build the case-insensitive "scattered" LIKE pattern `%q1%q2%...%`.
///
/// `%`, `_` and `\` in the query are escaped with `\`, so the pattern must
/// be used with `ESCAPE '\'`.
pub fn like_pattern(query: &str) -> String {
    let mut pattern = String::with_capacity(query.len() * 3 + 1);
    pattern.push('%');
    for c in query.chars() {
        if matches!(c, '%' | '_' | '\\') {
            pattern.push('\\');
        }
        pattern.push(c);
        pattern.push('%');
    }
    pattern
}

/// Scores candidates against a query and orders them.
pub struct Ranker;

impl Ranker {
    /// Rank `items` against `query`.
    pub fn rank<T: Matchable>(items: Vec<T>, query: &str) -> Vec<Ranked<T>> {
        Self::rank_cancellable(items, query, &CancellationToken::new()).unwrap_or_default()
    }

    /// Rank `items` against `query`, polling `cancel` between items.
    ///
    /// Returns `None` once cancelled; the partial work is thrown away.
    /// Items that turn out not to contain the query are dropped.
    pub fn rank_cancellable<T: Matchable>(
        items: Vec<T>,
        query: &str,
        cancel: &CancellationToken,
    ) -> Option<Vec<Ranked<T>>> {
        let query = matcher::normalize(query);
        let mut ranked = Vec::with_capacity(items.len());

        for item in items {
            if cancel.is_cancelled() {
                return None;
            }
            if let Some(matched) = matcher::match_name(item.match_text(), &query) {
                ranked.push(Ranked { item, matched });
            }
        }

        // sort_by_key is stable: equal ranks keep the source order
        ranked.sort_by_key(|r| r.matched.rank);
        Some(ranked)
    }

    /// Fetch candidates from `source` and rank them.
    pub fn search(
        source: &dyn CandidateSource,
        query: &str,
        cancel: &CancellationToken,
    ) -> RankResult<Option<Vec<Ranked<Candidate>>>> {
        let candidates = source.candidates_matching(query)?;
        tracing::debug!("Found {} candidates for {:?}", candidates.len(), query);
        Ok(Self::rank_cancellable(candidates, query, cancel))
    }
}

/// A plain list of candidates, filtered in memory.
impl CandidateSource for Vec<Candidate> {
    fn candidates_matching(&self, query: &str) -> RankResult<Vec<Candidate>> {
        let query = matcher::normalize(query);
        Ok(self
            .iter()
            .filter(|c| matcher::is_subsequence(&matcher::normalize(&c.name), &query))
            .cloned()
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn names(ranked: &[Ranked<Candidate>]) -> Vec<&str> {
        ranked.iter().map(|r| r.item.name.as_str()).collect()
    }

    #[test]
    fn test_rank_orders_by_match_quality() {
        let candidates = vec![
            Candidate::new("Messages", "org.messages"),
            Candidate::new("Google Maps", "org.maps"),
            Candidate::new("Maps", "app.maps"),
            Candidate::new("Mail Apps", "org.mailapps"),
        ];

        // "Messages" has no p and is dropped, "Mail Apps" only matches scattered
        let ranked = Ranker::rank(candidates, "maps");
        assert_eq!(names(&ranked), vec!["Maps", "Google Maps", "Mail Apps"]);
        assert_eq!(ranked[0].matched.rank, -1);
        assert_eq!(ranked[1].matched.rank, 7);
        assert_eq!(ranked[2].matched.rank, 105);
    }

    #[test]
    fn test_rank_is_stable_for_equal_ranks() {
        let candidates = vec![
            Candidate::new("Camera", "b.camera"),
            Candidate::new("Calendar", "a.calendar"),
            Candidate::new("Calculator", "c.calculator"),
        ];

        let ranked = Ranker::rank(candidates, "ca");
        assert!(ranked.iter().all(|r| r.matched.rank == 0));
        assert_eq!(names(&ranked), vec!["Camera", "Calendar", "Calculator"]);
    }

    #[test]
    fn test_rank_normalizes_query() {
        let ranked = Ranker::rank(vec![Candidate::new("Clock", "clock")], "CLO");
        assert_eq!(ranked.len(), 1);
        assert_eq!(ranked[0].matched.matched_positions, vec![0, 1, 2]);
    }

    #[test]
    fn test_rank_drops_non_matching() {
        let ranked = Ranker::rank(vec![Candidate::new("Clock", "clock")], "xyz");
        assert!(ranked.is_empty());
    }

    #[test]
    fn test_cancelled_rank_returns_none() {
        let cancel = CancellationToken::new();
        cancel.cancel();
        let result =
            Ranker::rank_cancellable(vec![Candidate::new("Clock", "clock")], "c", &cancel);
        assert!(result.is_none());
    }

    #[test]
    fn test_search_uses_source_filter() {
        let source = vec![
            Candidate::new("Settings", "settings"),
            Candidate::new("Store", "store"),
            Candidate::new("Camera", "camera"),
        ];

        let ranked = Ranker::search(&source, "stg", &CancellationToken::new())
            .unwrap()
            .unwrap();
        assert_eq!(names(&ranked), vec!["Settings"]);
        assert!(ranked[0].matched.rank > 100);
    }

    #[test]
    fn test_like_pattern() {
        assert_eq!(like_pattern("cal"), "%c%a%l%");
        assert_eq!(like_pattern(""), "%");
        assert_eq!(like_pattern("5%_"), "%5%\\%%\\_%");
    }

    #[test]
    fn test_search_result_kinds() {
        let app = SearchResult::from_app(Ranked {
            item: Candidate::new("Maps", "app.maps"),
            matched: MatchResult {
                rank: 0,
                matched_positions: vec![0],
            },
        });
        assert_eq!(app.subject_id(), Some("app.maps"));

        let command = SearchResult::from_command(Ranked {
            item: CommandCode::ExportDatabase,
            matched: MatchResult {
                rank: 0,
                matched_positions: vec![0],
            },
        });
        assert_eq!(command.subject_id(), None);
        assert_eq!(command.name, "/export database");
        assert!(matches!(
            command.kind,
            ResultKind::Command {
                code: CommandCode::ExportDatabase
            }
        ));
    }
}
