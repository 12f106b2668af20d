//! Calendar-day rules for the shared counters and the streak.
//!
//! Every comparison happens on civil dates of one configured UTC offset so that two partners
//! in different timezones agree on when "today" starts.

use std::time::SystemTime;

use time::{Date, OffsetDateTime, UtcOffset};

use crate::dao::models::{CoupleEntity, GameKind};

/// Units restored by the daily reset.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Allotment {
    /// Daily questions per day.
    pub daily: u32,
    /// Tickets per day for the other games.
    pub tickets: u32,
}

impl Default for Allotment {
    fn default() -> Self {
        Self {
            daily: 1,
            tickets: 3,
        }
    }
}

/// Counter a session of the given kind draws from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Resource {
    /// `daily_remaining`.
    Daily,
    /// `tickets_remaining`.
    Ticket,
}

impl From<GameKind> for Resource {
    fn from(kind: GameKind) -> Self {
        match kind {
            GameKind::Daily => Resource::Daily,
            _ => Resource::Ticket,
        }
    }
}

/// Civil date of `now` in the canonical offset.
pub fn civil_date(now: SystemTime, offset: UtcOffset) -> Date {
    OffsetDateTime::from(now).to_offset(offset).date()
}

/// Restore both counters when `record` was last reset before `today`.
///
/// Idempotent for a given `today`, and never moves `last_reset_date` backwards.
pub fn reset(record: &CoupleEntity, today: Date, allotment: Allotment) -> CoupleEntity {
    let mut next = record.clone();
    if record.last_reset_date < today {
        next.daily_remaining = allotment.daily;
        next.tickets_remaining = allotment.tickets;
        next.last_reset_date = today;
    }
    next
}

/// Take one unit of `resource`. Returns `false`, leaving the record untouched, when none is left.
pub fn consume(record: &mut CoupleEntity, resource: Resource) -> bool {
    let counter = match resource {
        Resource::Daily => &mut record.daily_remaining,
        Resource::Ticket => &mut record.tickets_remaining,
    };
    match counter.checked_sub(1) {
        Some(left) => {
            *counter = left;
            true
        }
        None => false,
    }
}

/// Count a completed daily question towards the streak.
pub fn advance_streak(record: &mut CoupleEntity, today: Date) {
    match record.last_streak_date {
        Some(last) if last == today => return,
        Some(last) if last.next_day() == Some(today) => record.streak += 1,
        _ => record.streak = 1,
    }
    record.last_streak_date = Some(today);
}
