use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::allocation::{AllocationMethod, Difficulty, TaskCategory};

pub const LEDGER_VERSION: u32 = 1;

/// One awarded task completion. Records are append-only.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AllocationRecord {
    pub user_id: String,
    pub task_id: String,
    pub category: TaskCategory,
    pub difficulty: Difficulty,
    pub points_awarded: u64,
    pub cost_cents: u64,
    pub week_index: u32,
    pub method: AllocationMethod,
    pub recorded_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LedgerState {
    pub version: u32,
    #[serde(default)]
    pub records: Vec<AllocationRecord>,
}

impl Default for LedgerState {
    fn default() -> Self {
        Self::new()
    }
}

impl LedgerState {
    pub fn new() -> Self {
        Self {
            version: LEDGER_VERSION,
            records: Vec::new(),
        }
    }

    pub fn append(&mut self, record: AllocationRecord) {
        self.records.push(record);
    }

    /// Cents charged against one program week
    pub fn week_usage_cents(&self, week: u32) -> u64 {
        self.records
            .iter()
            .filter(|r| r.week_index == week)
            .map(|r| r.cost_cents)
            .sum()
    }

    /// Cents charged across the whole program
    pub fn total_spent_cents(&self) -> u64 {
        self.records.iter().map(|r| r.cost_cents).sum()
    }
}

#[cfg(test)]
pub(crate) fn sample_record(week: u32, cost_cents: u64) -> AllocationRecord {
    AllocationRecord {
        user_id: "user-1".to_string(),
        task_id: format!("task-{}-{}", week, cost_cents),
        category: TaskCategory::PulseSurvey,
        difficulty: Difficulty::Intermediate,
        points_awarded: cost_cents,
        cost_cents,
        week_index: week,
        method: AllocationMethod::Manual,
        recorded_at: Utc::now(),
    }
}
