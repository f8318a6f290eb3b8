//! Daily decay of usage scores.
//!
//! Every score shrinks by a constant factor once per elapsed calendar day,
//! and rows that fall below a floor are pruned. A subject that is no longer
//! chosen drops out of the table in a bit under a month. The sweep is
//! driven by dates, not timers: it runs opportunistically before every
//! recorded choice and catches up on all the days it missed.

use chrono::{Datelike, NaiveDate};
use rusqlite::{params, Connection, Transaction};

use super::database::{get_metadata, keys, set_metadata, Database};
use crate::config::ScoringConfig;
use crate::error::RankResult;

/// What a call to [`DecayScheduler::maybe_decay`] did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DecayOutcome {
    /// No checkpoint existed; it was set to today without decaying.
    Initialized,
    /// The checkpoint is today (or in the future); nothing to do.
    UpToDate,
    /// `days` decay steps were applied and `pruned` rows deleted.
    Decayed { days: i64, pruned: usize },
}

/// Applies the daily decay sweep to the usage table.
#[derive(Debug, Clone)]
pub struct DecayScheduler {
    factor: f64,
    prune_below: i64,
}

impl DecayScheduler {
    pub fn new(scoring: &ScoringConfig) -> Self {
        Self {
            factor: scoring.decay_factor,
            prune_below: scoring.prune_below,
        }
    }

    /// Decay once per calendar day elapsed since the last sweep.
    ///
    /// The decay steps and the checkpoint update commit together, so an
    /// interrupted sweep leaves both untouched and the next call redoes it.
    pub fn maybe_decay(&self, db: &Database, today: NaiveDate) -> RankResult<DecayOutcome> {
        let mut conn = db.lock()?;
        let tx = conn.transaction()?;
        let outcome = self.sweep(&tx, today)?;
        tx.commit()?;
        Ok(outcome)
    }

    /// Run the sweep inside a caller-owned transaction.
    pub(crate) fn sweep(&self, tx: &Transaction<'_>, today: NaiveDate) -> RankResult<DecayOutcome> {
        let Some(last) = last_decay_date(tx, today)? else {
            write_checkpoint(tx, today)?;
            tracing::debug!("Decay checkpoint initialized to {}", today);
            return Ok(DecayOutcome::Initialized);
        };

        let days = (today - last).num_days();
        if days <= 0 {
            return Ok(DecayOutcome::UpToDate);
        }

        let mut pruned = 0;
        for _ in 0..days {
            tx.execute(
                "UPDATE usage SET score = CAST(round(score * ?1) AS INTEGER)",
                params![self.factor],
            )?;
            pruned += tx.execute(
                "DELETE FROM usage WHERE score < ?1",
                params![self.prune_below],
            )?;

            // Further steps can't change an empty table
            let remaining: i64 = tx.query_row("SELECT COUNT(*) FROM usage", [], |row| row.get(0))?;
            if remaining == 0 {
                break;
            }
        }

        write_checkpoint(tx, today)?;
        tracing::info!("Decayed usage scores for {} days, pruned {} rows", days, pruned);
        Ok(DecayOutcome::Decayed { days, pruned })
    }
}

/// The date of the last sweep, if there was one.
///
/// A checkpoint without a year is taken to be the latest date with that
/// day-of-year that is not after `today`.
fn last_decay_date(conn: &Connection, today: NaiveDate) -> RankResult<Option<NaiveDate>> {
    let Some(day_of_year) = get_metadata(conn, keys::LAST_DECAY)? else {
        return Ok(None);
    };
    let day_of_year = u32::try_from(day_of_year).unwrap_or(1);

    let date = match get_metadata(conn, keys::LAST_DECAY_YEAR)? {
        Some(year) => {
            let year = i32::try_from(year).unwrap_or(today.year());
            from_year_day(year, day_of_year)
        }
        None => {
            let this_year = from_year_day(today.year(), day_of_year);
            if this_year > today {
                from_year_day(today.year() - 1, day_of_year)
            } else {
                this_year
            }
        }
    };
    Ok(Some(date))
}

/// Day 366 of a non-leap year clamps to December 31st.
fn from_year_day(year: i32, day_of_year: u32) -> NaiveDate {
    NaiveDate::from_yo_opt(year, day_of_year)
        .or_else(|| NaiveDate::from_ymd_opt(year, 12, 31))
        .unwrap_or(NaiveDate::MIN)
}

fn write_checkpoint(conn: &Connection, today: NaiveDate) -> RankResult<()> {
    set_metadata(conn, keys::LAST_DECAY, i64::from(today.ordinal()))?;
    set_metadata(conn, keys::LAST_DECAY_YEAR, i64::from(today.year()))?;
    Ok(())
}
