//! Five-minute time-of-week slots.
//!
//! Usage is bucketed by `(day, time_slot)`: the day of the week counted from
//! Sunday (0..=6) and the five-minute slot within that day (0..=287). The
//! pair `(-1, -1)` is the all-time bucket.

use chrono::{Datelike, NaiveDateTime, Timelike};

/// Five-minute slots per day.
pub const SLOTS_PER_DAY: i64 = 24 * 12;

/// Days per week.
pub const DAYS_PER_WEEK: i64 = 7;

/// Minutes covered by one slot.
pub const SLOT_MINUTES: u32 = 5;

/// Day/slot value of the all-time bucket.
pub const ALL_TIME: i64 = -1;

/// A position on the weekly clock.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct WeekSlot {
    /// Days since Sunday, 0..=6
    pub day: i64,
    /// Five-minute slot of the day, 0..=287
    pub slot: i64,
}

impl WeekSlot {
    /// The slot containing `now`.
    pub fn at(now: NaiveDateTime) -> Self {
        let minute_of_day = now.hour() * 60 + now.minute();
        Self {
            day: i64::from(now.weekday().num_days_from_sunday()),
            slot: i64::from(minute_of_day / SLOT_MINUTES),
        }
    }

    /// Move `offset` slots along the weekly clock, carrying across midnight
    /// and wrapping around the week.
    pub fn shifted(self, offset: i64) -> Self {
        let week = SLOTS_PER_DAY * DAYS_PER_WEEK;
        let position = (self.day * SLOTS_PER_DAY + self.slot + offset).rem_euclid(week);
        Self {
            day: position / SLOTS_PER_DAY,
            slot: position % SLOTS_PER_DAY,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn at(y: i32, m: u32, d: u32, h: u32, min: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(y, m, d)
            .unwrap()
            .and_hms_opt(h, min, 0)
            .unwrap()
    }

    #[test]
    fn test_slot_boundaries() {
        // 2024-06-02 is a Sunday
        assert_eq!(WeekSlot::at(at(2024, 6, 2, 0, 0)), WeekSlot { day: 0, slot: 0 });
        assert_eq!(WeekSlot::at(at(2024, 6, 2, 0, 4)), WeekSlot { day: 0, slot: 0 });
        assert_eq!(WeekSlot::at(at(2024, 6, 2, 0, 5)), WeekSlot { day: 0, slot: 1 });
        assert_eq!(WeekSlot::at(at(2024, 6, 8, 23, 59)), WeekSlot { day: 6, slot: 287 });
        assert_eq!(WeekSlot::at(at(2024, 6, 3, 8, 7)), WeekSlot { day: 1, slot: 97 });
    }

    #[test]
    fn test_shift_within_day() {
        let slot = WeekSlot { day: 3, slot: 100 };
        assert_eq!(slot.shifted(5), WeekSlot { day: 3, slot: 105 });
        assert_eq!(slot.shifted(-5), WeekSlot { day: 3, slot: 95 });
    }

    #[test]
    fn test_shift_across_midnight() {
        let early = WeekSlot { day: 2, slot: 2 };
        assert_eq!(early.shifted(-3), WeekSlot { day: 1, slot: 287 });

        let late = WeekSlot { day: 2, slot: 286 };
        assert_eq!(late.shifted(3), WeekSlot { day: 3, slot: 1 });
    }

    #[test]
    fn test_shift_wraps_week() {
        let sunday = WeekSlot { day: 0, slot: 0 };
        assert_eq!(sunday.shifted(-1), WeekSlot { day: 6, slot: 287 });

        let saturday = WeekSlot { day: 6, slot: 287 };
        assert_eq!(saturday.shifted(1), WeekSlot { day: 0, slot: 0 });
    }
}
