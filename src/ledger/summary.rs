use std::collections::BTreeSet;

use super::types::AllocationRecord;
use crate::allocation::AllocationConfig;

/// Share of the weekly cap above which usage is flagged
pub const WARNING_THRESHOLD: f64 = 0.8;

/// Budget overview for one program week
#[derive(Debug, Clone, PartialEq)]
pub struct WeekSummary {
    pub week: u32,
    pub allocations: usize,
    pub points_awarded: u64,
    pub cost_cents: u64,
    pub cap_cents: u64,
}

impl WeekSummary {
    pub fn remaining_cents(&self) -> u64 {
        self.cap_cents.saturating_sub(self.cost_cents)
    }

    /// Percent of the weekly cap spent. A zero cap counts as fully used.
    pub fn percent_used(&self) -> f64 {
        if self.cap_cents == 0 {
            return 100.0;
        }
        self.cost_cents as f64 / self.cap_cents as f64 * 100.0
    }

    pub fn near_cap(&self) -> bool {
        self.percent_used() > WARNING_THRESHOLD * 100.0
    }
}

pub fn summarize_week(records: &[AllocationRecord], week: u32, config: &AllocationConfig) -> WeekSummary {
    let in_week: Vec<&AllocationRecord> = records.iter().filter(|r| r.week_index == week).collect();
    WeekSummary {
        week,
        allocations: in_week.len(),
        points_awarded: in_week.iter().map(|r| r.points_awarded).sum(),
        cost_cents: in_week.iter().map(|r| r.cost_cents).sum(),
        cap_cents: config.max_weekly_budget_cents.max(0) as u64,
    }
}

/// Totals for one participant
#[derive(Debug, Clone, PartialEq)]
pub struct UserSummary {
    pub user_id: String,
    pub allocations: usize,
    pub points_awarded: u64,
    pub cost_cents: u64,
}

pub fn summarize_user(records: &[AllocationRecord], user_id: &str) -> UserSummary {
    let mine: Vec<&AllocationRecord> = records.iter().filter(|r| r.user_id == user_id).collect();
    UserSummary {
        user_id: user_id.to_string(),
        allocations: mine.len(),
        points_awarded: mine.iter().map(|r| r.points_awarded).sum(),
        cost_cents: mine.iter().map(|r| r.cost_cents).sum(),
    }
}

/// Summaries for every week that has at least one record, oldest first
pub fn summarize_all_weeks(records: &[AllocationRecord], config: &AllocationConfig) -> Vec<WeekSummary> {
    let weeks: BTreeSet<u32> = records.iter().map(|r| r.week_index).collect();
    weeks
        .into_iter()
        .map(|week| summarize_week(records, week, config))
        .collect()
}
