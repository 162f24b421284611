use chrono::{Duration, NaiveDate};

/// 1-based program week containing `today`. Days before the start count as
/// week 1.
pub fn week_index(start: NaiveDate, today: NaiveDate) -> u32 {
    let days = (today - start).num_days();
    if days < 0 {
        return 1;
    }
    u32::try_from(days / 7 + 1).unwrap_or(u32::MAX)
}

/// First day of a 1-based program week
pub fn week_start(start: NaiveDate, week: u32) -> NaiveDate {
    start + Duration::weeks(i64::from(week.max(1) - 1))
}

/// Program week for today, falling back to week 1 when no start date is set
pub fn current_week(start: Option<NaiveDate>, today: NaiveDate) -> u32 {
    start.map(|s| week_index(s, today)).unwrap_or(1)
}
