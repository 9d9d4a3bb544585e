//! Time slot arithmetic for recurring reminders.
//!
//! Slots are anchored on the wall clock: a 30 minute series lands on `:00`
//! and `:30`, a 15 minute series on the quarter hours. After the first slot
//! every following one is a fixed number of elapsed minutes later, so a
//! daylight-saving change shifts later slots by the size of the change.

use chrono::{DateTime, Duration, FixedOffset, NaiveDateTime, NaiveTime, TimeZone, Timelike};

use crate::TimeSlot;

/// Slots closer than this are never submitted.
pub const MIN_LEAD_SECONDS: i64 = 60;

/// Slots further out than this (30 days) are never submitted.
pub const MAX_LEAD_SECONDS: i64 = 30 * 24 * 60 * 60;

const MINUTES_PER_DAY: u64 = 24 * 60;

/// First instant after `now` whose minute-of-hour is the next multiple of
/// `interval_minutes`.
///
/// When the rounded wall-clock time is not strictly after `now` (it wrapped
/// past midnight) the slot moves to the same time on the following day.
pub fn first_aligned_slot<Tz: TimeZone>(interval_minutes: u32, now: &DateTime<Tz>) -> DateTime<Tz> {
    let interval = interval_minutes.max(1);
    let next_minute = (now.minute() + 1).div_ceil(interval) * interval;

    let mut hour = now.hour();
    let mut minute = next_minute;
    if minute >= 60 {
        hour = (hour + 1) % 24;
        minute %= 60;
    }

    let naive = now.date_naive().and_time(NaiveTime::MIN)
        + Duration::hours(i64::from(hour))
        + Duration::minutes(i64::from(minute));

    let tz = now.timezone();
    let candidate = resolve_local(&tz, naive);
    if candidate <= *now {
        resolve_local(&tz, naive + Duration::days(1))
    } else {
        candidate
    }
}

/// Number of slots of `interval_minutes` that fit in `horizon_days`.
pub fn slot_count(interval_minutes: u32, horizon_days: u32) -> usize {
    (u64::from(horizon_days) * MINUTES_PER_DAY)
        .checked_div(u64::from(interval_minutes))
        .unwrap_or(0) as usize
}

/// Instant of slot `index` in a series starting at `first`.
pub fn slot_instant<Tz: TimeZone>(
    first: &DateTime<Tz>,
    index: usize,
    interval_minutes: u32,
) -> DateTime<Tz> {
    first.clone() + Duration::minutes(index as i64 * i64::from(interval_minutes))
}

/// Slot `index` of a series, measured against the submission instant `now`.
pub fn plan_slot(
    first: &DateTime<FixedOffset>,
    index: usize,
    interval_minutes: u32,
    now: &DateTime<FixedOffset>,
) -> TimeSlot {
    let target = slot_instant(first, index, interval_minutes);
    TimeSlot {
        index,
        target,
        seconds_from_now: (target - *now).num_seconds(),
    }
}

/// Whether a slot is far enough ahead, but not too far, to be submitted.
pub fn within_lead_window(seconds_from_now: i64) -> bool {
    (MIN_LEAD_SECONDS..=MAX_LEAD_SECONDS).contains(&seconds_from_now)
}

/// Map a local wall-clock time onto the zone. Ambiguous times take the
/// earlier instant; times inside a gap move forward by an hour.
fn resolve_local<Tz: TimeZone>(tz: &Tz, naive: NaiveDateTime) -> DateTime<Tz> {
    tz.from_local_datetime(&naive)
        .earliest()
        .or_else(|| tz.from_local_datetime(&(naive + Duration::hours(1))).earliest())
        .unwrap_or_else(|| tz.from_utc_datetime(&naive))
}
