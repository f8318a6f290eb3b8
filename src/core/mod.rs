//! Core engine module - matching, ranking and search orchestration.
//!
//! Nothing in here touches storage directly:
//! - [`matcher`] scores a single name against a query
//! - [`search`] ranks candidate lists and defines the result types
//! - [`session`] runs searches in the background and delivers the results

pub mod matcher;
pub mod search;
pub mod session;

pub use matcher::MatchResult;
pub use search::{Candidate, CandidateSource, Ranker, ResultKind, SearchResult};
pub use session::{SearchSession, SearchSnapshot, SnapshotConsumer};
