//! Time-of-week usage scores.
//!
//! Each choice of a subject is credited twice: a small flat amount to the
//! subject's all-time bucket, and a large amount to the five-minute slot of
//! the week it happened in. Exact-timing repeats are rare, so the week
//! credit spills over to the neighbouring slots with a diminishing score:
//! "usually opens at 8:05" then also counts at 8:00 and at 8:10.
//!
//! Scores only ever grow here; [`DecayScheduler`] shrinks them once a day.

use std::sync::Arc;

use chrono::NaiveDateTime;
use rusqlite::{params, Connection};
use serde::{Deserialize, Serialize};

use super::database::{get_metadata, keys, set_metadata, Database};
use super::decay::{DecayOutcome, DecayScheduler};
use super::slots::{WeekSlot, ALL_TIME};
use crate::config::ScoringConfig;
use crate::error::RankResult;

/// One row of the usage table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UsageBucket {
    pub subject_id: String,
    /// Days since Sunday, or -1 for the all-time bucket
    pub day: i64,
    /// Five-minute slot of the day, or -1 for the all-time bucket
    pub time_slot: i64,
    pub score: i64,
}

impl UsageBucket {
    pub fn is_all_time(&self) -> bool {
        self.day == ALL_TIME && self.time_slot == ALL_TIME
    }
}

/// A raw choice event, only kept while raw collection is switched on.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawChoice {
    pub subject_id: String,
    /// Local wall-clock time, `YYYY-MM-DD HH:MM:SS`
    pub chosen_at: String,
}

/// Records choices and keeps the per-bucket scores.
pub struct UsageStore {
    db: Arc<Database>,
    scoring: ScoringConfig,
    decay: DecayScheduler,
}

impl UsageStore {
    pub fn new(db: Arc<Database>, scoring: ScoringConfig) -> Self {
        let decay = DecayScheduler::new(&scoring);
        Self { db, scoring, decay }
    }

    /// Record that `subject_id` was chosen at `now`.
    ///
    /// Storage failures are logged and swallowed: a lost choice only means
    /// the ranking doesn't change.
    pub fn record_choice(&self, subject_id: &str, now: NaiveDateTime) {
        if let Err(e) = self.try_record_choice(subject_id, now) {
            tracing::warn!("Failed to record choice of {}: {}", subject_id, e);
        }
    }

    /// Record a choice, reporting storage failures.
    ///
    /// Runs the decay sweep first, then applies every bucket increment in
    /// one transaction. The writer lock is held across both.
    pub fn try_record_choice(&self, subject_id: &str, now: NaiveDateTime) -> RankResult<()> {
        let mut conn = self.db.lock()?;

        let tx = conn.transaction()?;
        self.decay.sweep(&tx, now.date())?;
        tx.commit()?;

        let tx = conn.transaction()?;
        upsert(&tx, subject_id, ALL_TIME, ALL_TIME, self.scoring.all_time_weight)?;

        let origin = WeekSlot::at(now);
        let spread = self.scoring.spillover_slots;
        for offset in -spread..=spread {
            let target = origin.shifted(offset);
            let bonus = self.scoring.week_weight - self.scoring.spillover_step * offset.abs();
            upsert(&tx, subject_id, target.day, target.slot, bonus)?;
        }

        if raw_collection_enabled(&tx)? {
            tx.execute(
                "INSERT INTO usage_raw (subject_id, chosen_at) VALUES (?1, ?2)",
                params![subject_id, now.format("%Y-%m-%d %H:%M:%S").to_string()],
            )?;
        }
        tx.commit()?;

        tracing::debug!("Logged the choice of {}", subject_id);
        Ok(())
    }

    /// Run the decay sweep without recording anything.
    pub fn maybe_decay(&self, now: NaiveDateTime) -> RankResult<DecayOutcome> {
        self.decay.maybe_decay(&self.db, now.date())
    }

    /// Forget everything about a subject that is permanently gone.
    pub fn remove_subject(&self, subject_id: &str) -> RankResult<()> {
        let mut conn = self.db.lock()?;
        let tx = conn.transaction()?;
        tx.execute("DELETE FROM usage WHERE subject_id = ?1", params![subject_id])?;
        tx.execute("DELETE FROM usage_raw WHERE subject_id = ?1", params![subject_id])?;
        tx.commit()?;

        tracing::info!("Removed {} from usage data", subject_id);
        Ok(())
    }

    /// All buckets of a subject, all-time bucket first.
    pub fn buckets_for(&self, subject_id: &str) -> RankResult<Vec<UsageBucket>> {
        let conn = self.db.lock()?;
        query_buckets(
            &conn,
            "SELECT subject_id, day, time_slot, score FROM usage
             WHERE subject_id = ?1 ORDER BY day, time_slot",
            params![subject_id],
        )
    }

    /// Every bucket in the table.
    pub fn all_buckets(&self) -> RankResult<Vec<UsageBucket>> {
        let conn = self.db.lock()?;
        query_buckets(
            &conn,
            "SELECT subject_id, day, time_slot, score FROM usage
             ORDER BY subject_id, day, time_slot",
            params![],
        )
    }

    /// The stored decay checkpoint as `(day_of_year, year)`.
    pub fn decay_checkpoint(&self) -> RankResult<(Option<i64>, Option<i64>)> {
        let conn = self.db.lock()?;
        Ok((
            get_metadata(&conn, keys::LAST_DECAY)?,
            get_metadata(&conn, keys::LAST_DECAY_YEAR)?,
        ))
    }

    /// Whether raw choices are being logged.
    pub fn collects_raw_choices(&self) -> RankResult<bool> {
        let conn = self.db.lock()?;
        raw_collection_enabled(&conn)
    }

    /// Switch the raw choice log on or off.
    pub fn set_collect_raw_choices(&self, enabled: bool) -> RankResult<()> {
        let conn = self.db.lock()?;
        set_metadata(&conn, keys::COLLECT_RAW, i64::from(enabled))?;
        tracing::info!("Raw choice collection {}", if enabled { "enabled" } else { "disabled" });
        Ok(())
    }

    /// Set the raw log flag unless the database already has one.
    pub(crate) fn init_collect_raw_choices(&self, enabled: bool) -> RankResult<()> {
        let conn = self.db.lock()?;
        conn.execute(
            "INSERT OR IGNORE INTO metadata (field, content) VALUES (?1, ?2)",
            params![keys::COLLECT_RAW, i64::from(enabled)],
        )?;
        Ok(())
    }

    /// The raw choice log, oldest first.
    pub fn raw_choices(&self) -> RankResult<Vec<RawChoice>> {
        let conn = self.db.lock()?;
        let mut stmt =
            conn.prepare("SELECT subject_id, chosen_at FROM usage_raw ORDER BY rowid")?;
        let rows = stmt.query_map([], |row| {
            Ok(RawChoice {
                subject_id: row.get(0)?,
                chosen_at: row.get(1)?,
            })
        })?;
        let choices = rows.collect::<Result<Vec<_>, _>>()?;
        Ok(choices)
    }
}

/// Add `bonus` to a bucket, creating it at zero if needed.
fn upsert(conn: &Connection, subject_id: &str, day: i64, slot: i64, bonus: i64) -> RankResult<()> {
    conn.execute(
        "INSERT INTO usage (subject_id, day, time_slot, score) VALUES (?1, ?2, ?3, ?4)
         ON CONFLICT(subject_id, day, time_slot) DO UPDATE SET score = score + excluded.score",
        params![subject_id, day, slot, bonus],
    )?;
    Ok(())
}

fn raw_collection_enabled(conn: &Connection) -> RankResult<bool> {
    Ok(get_metadata(conn, keys::COLLECT_RAW)?.unwrap_or(0) != 0)
}

fn query_buckets<P: rusqlite::Params>(
    conn: &Connection,
    sql: &str,
    params: P,
) -> RankResult<Vec<UsageBucket>> {
    let mut stmt = conn.prepare(sql)?;
    let rows = stmt.query_map(params, |row| {
        Ok(UsageBucket {
            subject_id: row.get(0)?,
            day: row.get(1)?,
            time_slot: row.get(2)?,
            score: row.get(3)?,
        })
    })?;
    let buckets = rows.collect::<Result<Vec<_>, _>>()?;
    Ok(buckets)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use std::collections::HashMap;

    fn at(y: i32, m: u32, d: u32, h: u32, min: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(y, m, d)
            .unwrap()
            .and_hms_opt(h, min, 0)
            .unwrap()
    }

    fn store() -> UsageStore {
        UsageStore::new(
            Arc::new(Database::open_in_memory().unwrap()),
            ScoringConfig::default(),
        )
    }

    fn week_scores(store: &UsageStore, subject_id: &str) -> HashMap<(i64, i64), i64> {
        store
            .buckets_for(subject_id)
            .unwrap()
            .into_iter()
            .filter(|b| !b.is_all_time())
            .map(|b| ((b.day, b.time_slot), b.score))
            .collect()
    }

    fn all_time_score(store: &UsageStore, subject_id: &str) -> Option<i64> {
        store
            .buckets_for(subject_id)
            .unwrap()
            .into_iter()
            .find(|b| b.is_all_time())
            .map(|b| b.score)
    }

    #[test]
    fn test_spillover_is_symmetric() {
        let store = store();
        // Wednesday 2024-06-05 12:00 -> day 3, slot 144
        store.try_record_choice("maps", at(2024, 6, 5, 12, 0)).unwrap();

        let scores = week_scores(&store, "maps");
        assert_eq!(scores.len(), 11);
        for offset in -5i64..=5 {
            assert_eq!(
                scores.get(&(3, 144 + offset)),
                Some(&(300 - 5 * offset.abs())),
                "offset {}",
                offset
            );
        }
        assert_eq!(all_time_score(&store, "maps"), Some(10));
    }

    #[test]
    fn test_spillover_carries_into_previous_day() {
        let store = store();
        // Sunday 2024-06-02 00:10 -> day 0, slot 2
        store.try_record_choice("alarm", at(2024, 6, 2, 0, 10)).unwrap();

        let scores = week_scores(&store, "alarm");
        assert_eq!(scores.len(), 11);
        assert_eq!(scores.get(&(0, 0)), Some(&290));
        assert_eq!(scores.get(&(0, 7)), Some(&275));
        // Slots before midnight land on Saturday
        assert_eq!(scores.get(&(6, 287)), Some(&285));
        assert_eq!(scores.get(&(6, 285)), Some(&275));
        assert_eq!(scores.get(&(6, 284)), None);
    }

    #[test]
    fn test_spillover_carries_into_next_day() {
        let store = store();
        // Saturday 2024-06-08 23:55 -> day 6, slot 287
        store.try_record_choice("alarm", at(2024, 6, 8, 23, 55)).unwrap();

        let scores = week_scores(&store, "alarm");
        assert_eq!(scores.get(&(6, 287)), Some(&300));
        assert_eq!(scores.get(&(0, 0)), Some(&295));
        assert_eq!(scores.get(&(0, 4)), Some(&275));
    }

    #[test]
    fn test_repeated_choices_accumulate() {
        let store = store();
        let now = at(2024, 6, 5, 12, 0);
        store.try_record_choice("maps", now).unwrap();
        store.try_record_choice("maps", now).unwrap();

        assert_eq!(all_time_score(&store, "maps"), Some(20));
        assert_eq!(week_scores(&store, "maps").get(&(3, 144)), Some(&600));
    }

    #[test]
    fn test_choice_on_later_day_decays_first() {
        let store = store();
        store.try_record_choice("maps", at(2024, 6, 5, 12, 0)).unwrap();
        store.try_record_choice("maps", at(2024, 6, 6, 12, 0)).unwrap();

        // 10 decayed to 9, then +10
        assert_eq!(all_time_score(&store, "maps"), Some(19));
        // Wednesday's centre slot decayed once: 300 -> 270
        assert_eq!(week_scores(&store, "maps").get(&(3, 144)), Some(&270));
        assert_eq!(week_scores(&store, "maps").get(&(4, 144)), Some(&300));
    }

    #[test]
    fn test_remove_subject() {
        let store = store();
        let now = at(2024, 6, 5, 12, 0);
        store.set_collect_raw_choices(true).unwrap();
        store.try_record_choice("maps", now).unwrap();
        store.try_record_choice("clock", now).unwrap();

        store.remove_subject("maps").unwrap();
        assert!(store.buckets_for("maps").unwrap().is_empty());
        assert_eq!(store.buckets_for("clock").unwrap().len(), 12);
        let raw = store.raw_choices().unwrap();
        assert_eq!(raw.len(), 1);
        assert_eq!(raw[0].subject_id, "clock");
    }

    #[test]
    fn test_raw_choices_only_when_enabled() {
        let store = store();
        store.try_record_choice("maps", at(2024, 6, 5, 12, 0)).unwrap();
        assert!(store.raw_choices().unwrap().is_empty());

        store.set_collect_raw_choices(true).unwrap();
        assert!(store.collects_raw_choices().unwrap());
        store.try_record_choice("maps", at(2024, 6, 5, 12, 1)).unwrap();

        let raw = store.raw_choices().unwrap();
        assert_eq!(
            raw,
            vec![RawChoice {
                subject_id: "maps".to_string(),
                chosen_at: "2024-06-05 12:01:00".to_string(),
            }]
        );
    }

    #[test]
    fn test_init_collect_raw_keeps_existing_flag() {
        let store = store();
        store.set_collect_raw_choices(false).unwrap();
        store.init_collect_raw_choices(true).unwrap();
        assert!(!store.collects_raw_choices().unwrap());
    }

    #[test]
    fn test_custom_weights() {
        let scoring = ScoringConfig {
            all_time_weight: 1,
            week_weight: 50,
            spillover_slots: 1,
            spillover_step: 10,
            ..ScoringConfig::default()
        };
        let store = UsageStore::new(Arc::new(Database::open_in_memory().unwrap()), scoring);
        store.try_record_choice("maps", at(2024, 6, 5, 12, 0)).unwrap();

        let scores = week_scores(&store, "maps");
        assert_eq!(scores.len(), 3);
        assert_eq!(scores.get(&(3, 143)), Some(&40));
        assert_eq!(scores.get(&(3, 144)), Some(&50));
        assert_eq!(all_time_score(&store, "maps"), Some(1));
    }

    /// Makes every write to `time_slot` 147 fail.
    fn fail_writes_to_slot_147(store: &UsageStore) {
        store
            .db
            .lock()
            .unwrap()
            .execute_batch(
                "CREATE TRIGGER fail_insert BEFORE INSERT ON usage WHEN NEW.time_slot = 147
                 BEGIN SELECT RAISE(ABORT, 'slot 147 is read-only'); END;
                 CREATE TRIGGER fail_update BEFORE UPDATE ON usage WHEN NEW.time_slot = 147
                 BEGIN SELECT RAISE(ABORT, 'slot 147 is read-only'); END;",
            )
            .unwrap();
    }

    #[test]
    fn test_failed_upsert_rolls_back_whole_choice() {
        let store = store();
        store.set_collect_raw_choices(true).unwrap();
        fail_writes_to_slot_147(&store);

        // 12:00 is slot 144, so slot 147 is written partway through the spillover
        let result = store.try_record_choice("maps", at(2024, 6, 5, 12, 0));
        assert!(result.is_err());
        assert!(store.all_buckets().unwrap().is_empty());
        assert!(store.raw_choices().unwrap().is_empty());
    }

    #[test]
    fn test_failed_upsert_keeps_existing_scores() {
        let store = store();
        store.try_record_choice("maps", at(2024, 6, 5, 12, 0)).unwrap();
        let before = store.all_buckets().unwrap();

        fail_writes_to_slot_147(&store);
        // Soft variant swallows the error
        store.record_choice("maps", at(2024, 6, 5, 12, 0));

        assert_eq!(store.all_buckets().unwrap(), before);
        assert_eq!(all_time_score(&store, "maps"), Some(10));
    }
}
