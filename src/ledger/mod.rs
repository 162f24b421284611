pub mod storage;
pub mod summary;
pub mod types;

pub use storage::{
    get_ledger_path, load_ledger_state, lock_ledger, save_ledger_state, JsonLedger, LedgerLock,
};
pub use summary::{
    summarize_all_weeks, summarize_user, summarize_week, UserSummary, WeekSummary,
};
pub use types::{AllocationRecord, LedgerState};

use anyhow::Result;

/// Append-only sink for awarded allocations.
///
/// Usage totals are rebuilt from the records; implementations may override
/// the provided methods with something cheaper.
pub trait Ledger {
    /// Keep other writers out until the returned guard is dropped. Ledgers
    /// shared only within one process return `None`.
    fn acquire_lock(&self) -> Result<Option<LedgerLock>> {
        Ok(None)
    }

    fn record_allocation(&mut self, record: &AllocationRecord) -> Result<()>;

    fn records(&self) -> Result<Vec<AllocationRecord>>;

    fn week_usage_cents(&self, week: u32) -> Result<u64> {
        Ok(self
            .records()?
            .iter()
            .filter(|r| r.week_index == week)
            .map(|r| r.cost_cents)
            .sum())
    }

    fn program_spent_cents(&self) -> Result<u64> {
        Ok(self.records()?.iter().map(|r| r.cost_cents).sum())
    }

    /// Points balance of one participant
    fn user_points(&self, user_id: &str) -> Result<u64> {
        Ok(self
            .records()?
            .iter()
            .filter(|r| r.user_id == user_id)
            .map(|r| r.points_awarded)
            .sum())
    }

    fn allocations_in_week(&self, week: u32) -> Result<Vec<AllocationRecord>> {
        Ok(self
            .records()?
            .into_iter()
            .filter(|r| r.week_index == week)
            .collect())
    }
}

/// In-process ledger, for tests and embedding.
#[derive(Debug, Clone, Default)]
pub struct MemoryLedger {
    state: LedgerState,
}

impl MemoryLedger {
    pub fn new() -> Self {
        Self::default()
    }
}

impl Ledger for MemoryLedger {
    fn record_allocation(&mut self, record: &AllocationRecord) -> Result<()> {
        self.state.append(record.clone());
        Ok(())
    }

    fn records(&self) -> Result<Vec<AllocationRecord>> {
        Ok(self.state.records.clone())
    }

    fn week_usage_cents(&self, week: u32) -> Result<u64> {
        Ok(self.state.week_usage_cents(week))
    }

    fn program_spent_cents(&self) -> Result<u64> {
        Ok(self.state.total_spent_cents())
    }
}
