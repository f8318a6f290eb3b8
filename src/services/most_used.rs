//! "What's likely now": the most used subjects for the current moment.
//!
//! Candidates come from two kinds of buckets: the time-of-week bucket for
//! the current five-minute slot, and the all-time bucket. A subject may show
//! up in both, so twice the requested number of rows is read and each
//! subject is kept at its best score. Subjects that no longer exist are
//! skipped; cleaning them up is left to whoever learns about the removal.

use std::collections::HashSet;
use std::sync::Arc;

use chrono::NaiveDateTime;
use rusqlite::params;
use serde::{Deserialize, Serialize};
use tokio_util::sync::CancellationToken;

use super::database::Database;
use super::slots::{WeekSlot, ALL_TIME};
use crate::error::RankResult;
use crate::registry::SubjectRegistry;

/// A subject predicted for the current moment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MostUsed {
    pub subject_id: String,
    /// Label as currently reported by the registry
    pub name: String,
    pub score: i64,
}

/// Read path over the usage table.
pub struct MostUsedQuery {
    db: Arc<Database>,
    registry: Arc<dyn SubjectRegistry>,
}

impl MostUsedQuery {
    pub fn new(db: Arc<Database>, registry: Arc<dyn SubjectRegistry>) -> Self {
        Self { db, registry }
    }

    /// Up to `limit` subjects (all of them for `None`), best first.
    ///
    /// Storage failures degrade to an empty list.
    pub fn most_used(&self, now: NaiveDateTime, limit: Option<usize>) -> Vec<MostUsed> {
        match self.try_most_used(now, limit, &CancellationToken::new()) {
            Ok(results) => results.unwrap_or_default(),
            Err(e) => {
                tracing::warn!("Failed to look up most used subjects: {}", e);
                Vec::new()
            }
        }
    }

    /// Like [`most_used`](Self::most_used), but reports storage failures and
    /// polls `cancel` between rows. Returns `Ok(None)` once cancelled.
    pub fn try_most_used(
        &self,
        now: NaiveDateTime,
        limit: Option<usize>,
        cancel: &CancellationToken,
    ) -> RankResult<Option<Vec<MostUsed>>> {
        if limit == Some(0) {
            return Ok(Some(Vec::new()));
        }

        let rows = self.top_rows(WeekSlot::at(now), limit)?;

        let mut seen = HashSet::new();
        let mut results = Vec::new();
        for (subject_id, score) in rows {
            if cancel.is_cancelled() {
                return Ok(None);
            }
            if limit.is_some_and(|limit| results.len() >= limit) {
                break;
            }
            // Rows come best-first, so a repeat is the lower score
            if seen.contains(&subject_id) {
                continue;
            }
            let Some(name) = self.registry.resolve_label(&subject_id) else {
                continue;
            };
            seen.insert(subject_id.clone());
            results.push(MostUsed {
                subject_id,
                name,
                score,
            });
        }

        Ok(Some(results))
    }

    /// Raw `(subject_id, score)` rows for `slot` and the all-time bucket.
    fn top_rows(&self, slot: WeekSlot, limit: Option<usize>) -> RankResult<Vec<(String, i64)>> {
        // LIMIT -1 means no limit in SQLite
        let row_limit = limit
            .and_then(|l| i64::try_from(l.saturating_mul(2)).ok())
            .unwrap_or(-1);

        let conn = self.db.lock()?;
        let mut stmt = conn.prepare(
            "SELECT subject_id, score FROM usage
             WHERE (time_slot = ?1 AND day = ?2) OR (time_slot = ?3 AND day = ?3)
             ORDER BY score DESC, subject_id
             LIMIT ?4",
        )?;
        let rows = stmt.query_map(params![slot.slot, slot.day, ALL_TIME, row_limit], |row| {
            Ok((row.get(0)?, row.get(1)?))
        })?;
        let rows = rows.collect::<Result<Vec<_>, _>>()?;
        Ok(rows)
    }
}
