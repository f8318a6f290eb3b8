//! Background search orchestration.
//!
//! A session owns one "slot" for in-flight work. Every new request cancels
//! whatever is running and takes the slot over; results are handed to the
//! consumer only if the request that produced them still owns the slot.
//! The ownership check and the delivery happen under the same lock as the
//! takeover, so a superseded result can never reach the consumer once a
//! newer request has started.

use std::sync::{Arc, Mutex};

use chrono::NaiveDateTime;
use serde::Serialize;
use tokio::runtime::Handle;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use super::search::{CandidateSource, Ranker, ResultKind, SearchResult};
use crate::error::RankResult;
use crate::services::commands::CommandCatalog;
use crate::services::most_used::MostUsedQuery;

/// One delivery to the consumer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SearchSnapshot {
    /// The query that produced the results (empty for most-used listings)
    pub query: String,
    pub results: Vec<SearchResult>,
}

/// Receives search results.
///
/// Called from a blocking worker thread while the session's slot is locked,
/// so it must not call back into the session.
pub type SnapshotConsumer = Arc<dyn Fn(SearchSnapshot) + Send + Sync>;

#[derive(Default)]
struct Slot {
    generation: u64,
    cancel: CancellationToken,
    task: Option<JoinHandle<()>>,
}

/// Runs searches off the caller's thread, one at a time.
pub struct SearchSession {
    runtime: Handle,
    apps: Arc<dyn CandidateSource>,
    commands: CommandCatalog,
    most_used: Arc<MostUsedQuery>,
    consumer: SnapshotConsumer,
    slot: Arc<Mutex<Slot>>,
}

impl SearchSession {
    pub fn new(
        runtime: Handle,
        apps: Arc<dyn CandidateSource>,
        commands: CommandCatalog,
        most_used: Arc<MostUsedQuery>,
        consumer: SnapshotConsumer,
    ) -> Self {
        Self {
            runtime,
            apps,
            commands,
            most_used,
            consumer,
            slot: Arc::new(Mutex::new(Slot::default())),
        }
    }

    /// Rank apps and commands against `query` in the background.
    ///
    /// An empty query only cancels the running search; nothing is delivered.
    pub fn search(&self, query: &str) {
        let Some((generation, cancel)) = self.supersede() else {
            return;
        };
        if query.is_empty() {
            return;
        }

        let apps = Arc::clone(&self.apps);
        let commands = self.commands.clone();
        let query = query.to_string();
        self.start(generation, cancel.clone(), move || {
            let results = rank_everything(apps.as_ref(), &commands, &query, &cancel)?;
            Ok(results.map(|results| SearchSnapshot { query, results }))
        });
    }

    /// Deliver the most used subjects for the current time.
    pub fn most_used(&self, limit: Option<usize>) {
        self.most_used_at(chrono::Local::now().naive_local(), limit);
    }

    /// Deliver the most used subjects for `now`, with `rank` set to the score.
    pub fn most_used_at(&self, now: NaiveDateTime, limit: Option<usize>) {
        let Some((generation, cancel)) = self.supersede() else {
            return;
        };

        let query = Arc::clone(&self.most_used);
        self.start(generation, cancel.clone(), move || {
            let Some(subjects) = query.try_most_used(now, limit, &cancel)? else {
                return Ok(None);
            };
            let results = subjects
                .into_iter()
                .map(|subject| SearchResult {
                    name: subject.name,
                    rank: i32::try_from(subject.score).unwrap_or(i32::MAX),
                    matched_positions: Vec::new(),
                    kind: ResultKind::App {
                        subject_id: subject.subject_id,
                    },
                })
                .collect();
            Ok(Some(SearchSnapshot {
                query: String::new(),
                results,
            }))
        });
    }

    /// Cancel whatever is in flight without starting anything new.
    pub fn cancel(&self) {
        self.supersede();
    }

    /// Whether a background job is still running.
    pub fn is_busy(&self) -> bool {
        self.slot
            .lock()
            .map(|slot| slot.task.as_ref().is_some_and(|task| !task.is_finished()))
            .unwrap_or(false)
    }

    /// Take over the slot: cancel and detach the current job.
    fn supersede(&self) -> Option<(u64, CancellationToken)> {
        let mut slot = match self.slot.lock() {
            Ok(slot) => slot,
            Err(e) => {
                tracing::error!("Search slot poisoned: {}", e);
                return None;
            }
        };
        slot.cancel.cancel();
        // Dropping the handle detaches the job; it sees the cancelled token
        slot.task = None;
        slot.generation += 1;
        slot.cancel = CancellationToken::new();
        Some((slot.generation, slot.cancel.clone()))
    }

    fn start<F>(&self, generation: u64, cancel: CancellationToken, job: F)
    where
        F: FnOnce() -> RankResult<Option<SearchSnapshot>> + Send + 'static,
    {
        let slot = Arc::clone(&self.slot);
        let consumer = Arc::clone(&self.consumer);

        let task = self.runtime.spawn_blocking(move || {
            let snapshot = match job() {
                Ok(Some(snapshot)) => snapshot,
                Ok(None) => return,
                Err(e) => {
                    tracing::warn!("Search failed: {}", e);
                    return;
                }
            };

            let Ok(current) = slot.lock() else {
                return;
            };
            if current.generation != generation || cancel.is_cancelled() {
                tracing::debug!("Dropping superseded results for {:?}", snapshot.query);
                return;
            }
            // Delivered while holding the lock so a newer search can't start in between
            consumer(snapshot);
        });

        if let Ok(mut current) = self.slot.lock() {
            if current.generation == generation {
                current.task = Some(task);
            }
        }
    }
}

impl Drop for SearchSession {
    fn drop(&mut self) {
        self.cancel();
    }
}

/// Apps first, then commands, stable-sorted by rank together.
fn rank_everything(
    apps: &dyn CandidateSource,
    commands: &CommandCatalog,
    query: &str,
    cancel: &CancellationToken,
) -> RankResult<Option<Vec<SearchResult>>> {
    let Some(ranked_apps) = Ranker::search(apps, query, cancel)? else {
        return Ok(None);
    };
    let Some(ranked_commands) =
        Ranker::rank_cancellable(commands.commands_matching(query), query, cancel)
    else {
        return Ok(None);
    };

    let mut results: Vec<SearchResult> = ranked_apps
        .into_iter()
        .map(SearchResult::from_app)
        .chain(ranked_commands.into_iter().map(SearchResult::from_command))
        .collect();
    results.sort_by_key(|r| r.rank);
    Ok(Some(results))
}
