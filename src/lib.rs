//! launchrank - the relevance engine of a keyboard-driven launcher.
//!
//! As the user types, launchrank ranks installed applications (and a few
//! debug commands) against the query. With an empty query it predicts what
//! the user is likely to open next, from how often and *when* each
//! application was picked before.
//!
//! # Architecture
//!
//! - [`core`] - Fuzzy matcher, ranker and the background search session
//! - [`services`] - SQLite-backed usage scores, daily decay, subject index
//! - [`registry`] - Host-provided list of installed subjects
//! - [`engine`] - [`RelevanceEngine`], tying the above together
//! - [`config`] - Configuration loading and management
//!
//! # Example
//!
//! ```ignore
//! use std::sync::Arc;
//! use launchrank::{Config, RelevanceEngine, StaticRegistry};
//!
//! let registry = Arc::new(StaticRegistry::new(installed_apps()));
//! let engine = RelevanceEngine::open(Config::load(), registry)?;
//! engine.reindex()?;
//!
//! let session = engine.search_session(runtime.handle().clone(), Arc::new(|snapshot| {
//!     show(snapshot.results);
//! }));
//! session.search("cal");
//!
//! engine.record_choice("org.gnome.Calendar");
//! ```

pub mod config;
pub mod core;
pub mod engine;
pub mod registry;
pub mod services;

mod error;

// Re-export commonly used types for convenience
pub use config::Config;
pub use core::search::{Candidate, CandidateSource, ResultKind, SearchResult};
pub use core::session::{SearchSession, SearchSnapshot, SnapshotConsumer};
pub use engine::{CommandOutcome, RelevanceEngine};
pub use error::{RankError, RankResult};
pub use registry::{StaticRegistry, SubjectRegistry};
pub use services::commands::CommandCode;
pub use services::most_used::MostUsed;
