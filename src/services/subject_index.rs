//! Cached, popularity-ordered index of searchable subjects.
//!
//! Asking the host for every installed subject can be slow, so searches run
//! against a copy kept in the database. A rebuild writes the fresh list to a
//! side table and swaps it in at the end; searches keep using the old table
//! until then. The index is stored most-used first, so when the ranker sees
//! two equally good matches the more popular one stays on top.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use chrono::NaiveDateTime;
use rusqlite::params;

use super::database::Database;
use super::most_used::MostUsedQuery;
use crate::core::matcher;
use crate::core::search::{like_pattern, Candidate, CandidateSource};
use crate::error::RankResult;
use crate::registry::SubjectRegistry;

/// The searchable subject index.
pub struct SubjectIndex {
    db: Arc<Database>,
}

impl SubjectIndex {
    pub fn new(db: Arc<Database>) -> Self {
        Self { db }
    }

    /// Rebuild the index from `registry`, most used subjects (as of `now`) first.
    ///
    /// Returns the number of indexed subjects.
    pub fn rebuild(
        &self,
        registry: &dyn SubjectRegistry,
        most_used: &MostUsedQuery,
        now: NaiveDateTime,
    ) -> RankResult<usize> {
        tracing::debug!("Updating subject index");

        let installed = registry.list_candidates();
        let popular = most_used.most_used(now, None);

        let by_id: HashMap<&str, &Candidate> = installed
            .iter()
            .map(|c| (c.subject_id.as_str(), c))
            .collect();

        let mut ordered = Vec::with_capacity(installed.len());
        let mut placed = HashSet::new();
        for entry in &popular {
            if let Some(&candidate) = by_id.get(entry.subject_id.as_str()) {
                if placed.insert(candidate.subject_id.as_str()) {
                    ordered.push(candidate.clone());
                }
            }
        }
        for candidate in &installed {
            if placed.insert(candidate.subject_id.as_str()) {
                ordered.push(candidate.clone());
            }
        }

        self.replace_with(&ordered)?;

        tracing::info!("Indexed {} subjects", ordered.len());
        Ok(ordered.len())
    }

    /// Write `subjects` to the side table and swap it in.
    ///
    /// Both steps share one lock and one transaction, so overlapping rebuilds
    /// can't swap in each other's half-written side table.
    fn replace_with(&self, subjects: &[Candidate]) -> RankResult<()> {
        let mut conn = self.db.lock()?;
        let tx = conn.transaction()?;
        tx.execute("DELETE FROM subjects_dirty", [])?;
        {
            let mut stmt = tx.prepare(
                "INSERT OR REPLACE INTO subjects_dirty (subject_id, name) VALUES (?1, ?2)",
            )?;
            for candidate in subjects {
                stmt.execute(params![candidate.subject_id, candidate.name])?;
            }
        }
        tx.execute_batch(
            "DROP TABLE subjects;
             ALTER TABLE subjects_dirty RENAME TO subjects;
             CREATE TABLE subjects_dirty (
                 subject_id TEXT PRIMARY KEY,
                 name TEXT NOT NULL
             );",
        )?;
        tx.commit()?;
        Ok(())
    }

    /// Drop a subject from the index.
    pub fn remove(&self, subject_id: &str) -> RankResult<()> {
        let conn = self.db.lock()?;
        conn.execute("DELETE FROM subjects WHERE subject_id = ?1", params![subject_id])?;
        Ok(())
    }

    /// Every indexed subject in index order.
    pub fn all(&self) -> RankResult<Vec<Candidate>> {
        self.select("SELECT name, subject_id FROM subjects ORDER BY rowid", None)
    }

    /// Number of indexed subjects.
    pub fn len(&self) -> RankResult<usize> {
        let conn = self.db.lock()?;
        let count: i64 = conn.query_row("SELECT COUNT(*) FROM subjects", [], |row| row.get(0))?;
        Ok(usize::try_from(count).unwrap_or(0))
    }

    pub fn is_empty(&self) -> RankResult<bool> {
        Ok(self.len()? == 0)
    }

    fn select(&self, sql: &str, pattern: Option<&str>) -> RankResult<Vec<Candidate>> {
        let conn = self.db.lock()?;
        let mut stmt = conn.prepare(sql)?;
        let map = |row: &rusqlite::Row<'_>| -> rusqlite::Result<Candidate> {
            Ok(Candidate::new(row.get::<_, String>(0)?, row.get::<_, String>(1)?))
        };
        let candidates = match pattern {
            Some(pattern) => stmt.query_map(params![pattern], map)?.collect::<Result<Vec<_>, _>>()?,
            None => stmt.query_map([], map)?.collect::<Result<Vec<_>, _>>()?,
        };
        Ok(candidates)
    }
}

impl CandidateSource for SubjectIndex {
    /// SQLite's LIKE only folds ASCII case, so a query with other letters
    /// is filtered in memory instead.
    fn candidates_matching(&self, query: &str) -> RankResult<Vec<Candidate>> {
        if query.is_ascii() {
            return self.select(
                "SELECT DISTINCT name, subject_id FROM subjects
                 WHERE name LIKE ?1 ESCAPE '\\'
                 ORDER BY rowid",
                Some(&like_pattern(query)),
            );
        }

        let query = matcher::normalize(query);
        let mut candidates = self.all()?;
        candidates.retain(|c| matcher::is_subsequence(&matcher::normalize(&c.name), &query));
        Ok(candidates)
    }
}
