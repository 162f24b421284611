use chrono::{DateTime, Utc};
use std::sync::{Mutex, MutexGuard, PoisonError};
use thiserror::Error;

use crate::allocation::{
    allocate_detailed, AllocationError, AllocationOutcome, AllocationRequest, Difficulty,
    TaskCategory,
};
use crate::ledger::{AllocationRecord, Ledger};
use crate::settings::{load_allocation_config, SettingsStore};

/// A participant finished a task and should be paid for it.
#[derive(Debug, Clone, PartialEq)]
pub struct CompletionEvent {
    pub user_id: String,
    pub task_id: String,
    pub category: TaskCategory,
    pub difficulty: Option<Difficulty>,
    pub week_index: u32,
}

#[derive(Debug, Error)]
pub enum AwardError {
    #[error(transparent)]
    Allocation(#[from] AllocationError),

    #[error("{0:#}")]
    Settings(anyhow::Error),

    #[error("failed to read ledger: {0:#}")]
    LedgerRead(anyhow::Error),

    #[error("failed to lock ledger: {0:#}")]
    LedgerLock(anyhow::Error),

    /// The award was computed but not stored. Its cost stays reserved
    /// until `record` is passed to [`Allocator::replay`] or
    /// [`Allocator::discard_pending`].
    #[error("failed to record allocation for task {}: {error:#}", .record.task_id)]
    LedgerWrite {
        record: Box<AllocationRecord>,
        error: anyhow::Error,
    },
}

impl AwardError {
    /// The computed record, when the failure happened after pricing
    pub fn pending_record(&self) -> Option<&AllocationRecord> {
        match self {
            AwardError::LedgerWrite { record, .. } => Some(record),
            _ => None,
        }
    }
}

struct Collaborators<S, L> {
    settings: S,
    ledger: L,
    /// Awards whose ledger write failed, counted as spent until settled
    pending: Vec<AllocationRecord>,
}

impl<S, L> Collaborators<S, L> {
    fn settle(&mut self, record: &AllocationRecord) -> bool {
        match self.pending.iter().position(|p| p == record) {
            Some(index) => {
                self.pending.remove(index);
                true
            }
            None => false,
        }
    }
}

/// Serializes awards against a settings store and ledger.
///
/// Reading the week's usage, pricing the completion and appending the record
/// happen under one lock, so concurrent completions cannot jointly overshoot
/// the weekly cap. File-backed ledgers are also locked on disk, which extends
/// this to allocators in other processes.
pub struct Allocator<S, L> {
    inner: Mutex<Collaborators<S, L>>,
}

impl<S: SettingsStore, L: Ledger> Allocator<S, L> {
    pub fn new(settings: S, ledger: L) -> Self {
        Self {
            inner: Mutex::new(Collaborators {
                settings,
                ledger,
                pending: Vec::new(),
            }),
        }
    }

    pub fn award(&self, event: &CompletionEvent) -> Result<AllocationRecord, AwardError> {
        let mut guard = self.lock();
        let _held = guard.ledger.acquire_lock().map_err(AwardError::LedgerLock)?;
        award_locked(&mut guard, event, Utc::now()).map(|(record, _)| record)
    }

    /// Award, retrying only the ledger write. The engine runs once; every
    /// retry appends the same record.
    pub fn award_with_retry(
        &self,
        event: &CompletionEvent,
        max_attempts: u32,
    ) -> Result<AllocationRecord, AwardError> {
        let mut guard = self.lock();
        let _held = guard.ledger.acquire_lock().map_err(AwardError::LedgerLock)?;
        let mut last = match award_locked(&mut guard, event, Utc::now()) {
            Ok((record, _)) => return Ok(record),
            Err(AwardError::LedgerWrite { record, error }) => (record, error),
            Err(other) => return Err(other),
        };

        for attempt in 2..=max_attempts {
            tracing::warn!(
                task_id = %last.0.task_id,
                attempt,
                error = %last.1,
                "ledger write failed, replaying allocation"
            );
            match guard.ledger.record_allocation(&last.0) {
                Ok(()) => {
                    guard.settle(&last.0);
                    return Ok(*last.0);
                }
                Err(error) => last.1 = error,
            }
        }

        Err(AwardError::LedgerWrite {
            record: last.0,
            error: last.1,
        })
    }

    /// Store a record produced by an earlier award whose write failed.
    pub fn replay(&self, record: &AllocationRecord) -> Result<(), AwardError> {
        let mut guard = self.lock();
        let _held = guard.ledger.acquire_lock().map_err(AwardError::LedgerLock)?;
        guard
            .ledger
            .record_allocation(record)
            .map_err(|error| AwardError::LedgerWrite {
                record: Box::new(record.clone()),
                error,
            })?;
        guard.settle(record);
        tracing::info!(task_id = %record.task_id, "allocation replayed");
        Ok(())
    }

    /// Give up on an unwritten award and release its reserved cost.
    /// Returns false if the record was not pending.
    pub fn discard_pending(&self, record: &AllocationRecord) -> bool {
        let discarded = self.lock().settle(record);
        if discarded {
            tracing::warn!(
                task_id = %record.task_id,
                cost_cents = record.cost_cents,
                "pending allocation discarded"
            );
        }
        discarded
    }

    /// Awards computed but not yet stored, oldest first
    pub fn pending_records(&self) -> Vec<AllocationRecord> {
        self.lock().pending.clone()
    }

    /// Run `f` with shared access to the settings store and ledger
    pub fn inspect<R>(&self, f: impl FnOnce(&S, &L) -> R) -> R {
        let guard = self.lock();
        f(&guard.settings, &guard.ledger)
    }

    pub fn into_parts(self) -> (S, L) {
        let inner = self.inner.into_inner().unwrap_or_else(PoisonError::into_inner);
        (inner.settings, inner.ledger)
    }

    fn lock(&self) -> MutexGuard<'_, Collaborators<S, L>> {
        // Stores hold no in-memory invariants a panicking award could break
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

fn award_locked<S: SettingsStore, L: Ledger>(
    c: &mut Collaborators<S, L>,
    event: &CompletionEvent,
    now: DateTime<Utc>,
) -> Result<(AllocationRecord, AllocationOutcome), AwardError> {
    let config = load_allocation_config(&c.settings).map_err(settings_error)?;
    let pending_in_week: u64 = c
        .pending
        .iter()
        .filter(|r| r.week_index == event.week_index)
        .map(|r| r.cost_cents)
        .sum();
    let pending_total: u64 = c.pending.iter().map(|r| r.cost_cents).sum();

    let weekly_used = c
        .ledger
        .week_usage_cents(event.week_index)
        .map_err(AwardError::LedgerRead)?
        + pending_in_week;
    let program_spent = c
        .ledger
        .program_spent_cents()
        .map_err(AwardError::LedgerRead)?
        + pending_total;

    let request = AllocationRequest {
        task_category: event.category,
        difficulty: event.difficulty,
        current_week_index: event.week_index,
        weekly_budget_used_cents: weekly_used,
        program_spent_cents: program_spent,
    };
    let outcome = allocate_detailed(&config, &request)?;

    let record = AllocationRecord {
        user_id: event.user_id.clone(),
        task_id: event.task_id.clone(),
        category: event.category,
        difficulty: request.effective_difficulty(),
        points_awarded: outcome.result.points_awarded,
        cost_cents: outcome.result.cost_cents,
        week_index: event.week_index,
        method: outcome.method,
        recorded_at: now,
    };

    if let Err(error) = c.ledger.record_allocation(&record) {
        c.pending.push(record.clone());
        return Err(AwardError::LedgerWrite {
            record: Box::new(record),
            error,
        });
    }

    tracing::info!(
        user_id = %record.user_id,
        task_id = %record.task_id,
        week = record.week_index,
        points = record.points_awarded,
        cost_cents = record.cost_cents,
        capped = outcome.capped,
        "points awarded"
    );

    Ok((record, outcome))
}

fn settings_error(err: anyhow::Error) -> AwardError {
    match err.downcast::<AllocationError>() {
        Ok(invalid) => AwardError::Allocation(invalid),
        Err(err) => AwardError::Settings(err),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ledger::{JsonLedger, MemoryLedger};
    use crate::settings::schema::{AUTO_ALLOCATE_POINTS, MAX_BUDGET_PER_WEEK, POINTS_PER_DOLLAR};
    use crate::settings::MemorySettingsStore;
    use std::sync::{Arc, Barrier};
    use std::thread;

    fn event(task_id: &str, category: TaskCategory, week: u32) -> CompletionEvent {
        CompletionEvent {
            user_id: "user-1".to_string(),
            task_id: task_id.to_string(),
            category,
            difficulty: None,
            week_index: week,
        }
    }

    fn manual_settings(weekly_cap_dollars: &str) -> MemorySettingsStore {
        MemorySettingsStore::with_settings(&[
            (AUTO_ALLOCATE_POINTS, "false"),
            (POINTS_PER_DOLLAR, "100"),
            (MAX_BUDGET_PER_WEEK, weekly_cap_dollars),
        ])
    }

    /// Fails the first `failures` writes, then behaves like a MemoryLedger
    struct FlakyLedger {
        inner: MemoryLedger,
        failures: u32,
        write_attempts: u32,
    }

    impl FlakyLedger {
        fn new(failures: u32) -> Self {
            Self {
                inner: MemoryLedger::new(),
                failures,
                write_attempts: 0,
            }
        }
    }

    impl Ledger for FlakyLedger {
        fn record_allocation(&mut self, record: &AllocationRecord) -> anyhow::Result<()> {
            self.write_attempts += 1;
            if self.failures > 0 {
                self.failures -= 1;
                anyhow::bail!("disk full");
            }
            self.inner.record_allocation(record)
        }

        fn records(&self) -> anyhow::Result<Vec<AllocationRecord>> {
            self.inner.records()
        }
    }

    #[test]
    fn test_award_records_allocation() {
        let allocator = Allocator::new(manual_settings("1000"), MemoryLedger::new());
        let record = allocator
            .award(&event("survey-1", TaskCategory::PulseSurvey, 1))
            .unwrap();

        assert_eq!(record.points_awarded, 500);
        assert_eq!(record.cost_cents, 500);
        assert_eq!(record.method, crate::allocation::AllocationMethod::Manual);

        let (_, ledger) = allocator.into_parts();
        assert_eq!(ledger.records().unwrap(), vec![record]);
    }

    #[test]
    fn test_award_uses_recorded_weekly_usage() {
        // $8 cap: the second survey only gets the remaining 300 cents
        let allocator = Allocator::new(manual_settings("8"), MemoryLedger::new());
        let first = allocator.award(&event("a", TaskCategory::PulseSurvey, 1)).unwrap();
        let second = allocator.award(&event("b", TaskCategory::PulseSurvey, 1)).unwrap();
        let third = allocator.award(&event("c", TaskCategory::PulseSurvey, 1)).unwrap();
        let next_week = allocator.award(&event("d", TaskCategory::PulseSurvey, 2)).unwrap();

        assert_eq!(first.cost_cents, 500);
        assert_eq!(second.cost_cents, 300);
        assert_eq!(second.points_awarded, 300);
        assert_eq!(third.points_awarded, 0);
        assert_eq!(next_week.points_awarded, 500);
    }

    #[test]
    fn test_invalid_settings_surface_as_allocation_error() {
        let settings = MemorySettingsStore::with_settings(&[(POINTS_PER_DOLLAR, "0")]);
        let allocator = Allocator::new(settings, MemoryLedger::new());
        let err = allocator
            .award(&event("a", TaskCategory::CheckIn, 1))
            .unwrap_err();
        assert!(matches!(
            err,
            AwardError::Allocation(AllocationError::InvalidConfig(_))
        ));
    }

    #[test]
    fn test_week_zero_rejected_without_recording() {
        let allocator = Allocator::new(manual_settings("1000"), MemoryLedger::new());
        let err = allocator
            .award(&event("a", TaskCategory::CheckIn, 0))
            .unwrap_err();
        assert!(matches!(
            err,
            AwardError::Allocation(AllocationError::InvalidRequest(_))
        ));
        assert!(allocator.inspect(|_, ledger| ledger.records().unwrap().is_empty()));
    }

    #[test]
    fn test_failed_write_returns_record_for_replay() {
        let allocator = Allocator::new(manual_settings("1000"), FlakyLedger::new(1));
        let err = allocator
            .award(&event("survey-1", TaskCategory::PulseSurvey, 1))
            .unwrap_err();

        let pending = err.pending_record().cloned().unwrap();
        assert_eq!(pending.points_awarded, 500);

        allocator.replay(&pending).unwrap();
        let records = allocator.inspect(|_, ledger| ledger.records().unwrap());
        assert_eq!(records, vec![pending]);
    }

    #[test]
    fn test_retry_replays_same_record() {
        let allocator = Allocator::new(manual_settings("1000"), FlakyLedger::new(2));
        let record = allocator
            .award_with_retry(&event("survey-1", TaskCategory::PulseSurvey, 1), 3)
            .unwrap();
        assert!(allocator.pending_records().is_empty());

        let (_, ledger) = allocator.into_parts();
        assert_eq!(ledger.write_attempts, 3);
        assert_eq!(ledger.records().unwrap(), vec![record]);
        assert_eq!(ledger.week_usage_cents(1).unwrap(), 500);
    }

    #[test]
    fn test_retry_gives_up_after_max_attempts() {
        let allocator = Allocator::new(manual_settings("1000"), FlakyLedger::new(5));
        let err = allocator
            .award_with_retry(&event("survey-1", TaskCategory::PulseSurvey, 1), 2)
            .unwrap_err();

        assert!(err.pending_record().is_some());
        assert!(err.to_string().contains("disk full"));
        let (_, ledger) = allocator.into_parts();
        assert_eq!(ledger.write_attempts, 2);
        assert!(ledger.records().unwrap().is_empty());
    }

    #[test]
    fn test_concurrent_awards_respect_weekly_cap() {
        // $50 cap, 80 check-ins worth $1 each from 8 threads
        let allocator = Arc::new(Allocator::new(manual_settings("50"), MemoryLedger::new()));

        let handles: Vec<_> = (0..8)
            .map(|t| {
                let allocator = Arc::clone(&allocator);
                thread::spawn(move || {
                    for i in 0..10 {
                        let task = format!("check-in-{}-{}", t, i);
                        allocator
                            .award(&event(&task, TaskCategory::CheckIn, 1))
                            .unwrap();
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }

        let (used, records) = allocator.inspect(|_, ledger| {
            (ledger.week_usage_cents(1).unwrap(), ledger.records().unwrap())
        });
        assert_eq!(records.len(), 80);
        assert_eq!(used, 5_000);
        assert_eq!(records.iter().filter(|r| r.points_awarded > 0).count(), 50);
    }

    #[test]
    fn test_unwritten_award_keeps_its_cost_reserved() {
        // $5 cap: the failed survey still holds the whole week
        let allocator = Allocator::new(manual_settings("5"), FlakyLedger::new(1));
        let err = allocator
            .award(&event("a", TaskCategory::PulseSurvey, 1))
            .unwrap_err();
        let pending = err.pending_record().cloned().unwrap();
        assert_eq!(allocator.pending_records(), vec![pending.clone()]);

        let second = allocator.award(&event("b", TaskCategory::PulseSurvey, 1)).unwrap();
        assert_eq!(second.points_awarded, 0);
        assert_eq!(second.cost_cents, 0);

        allocator.replay(&pending).unwrap();
        assert!(allocator.pending_records().is_empty());
        let used = allocator.inspect(|_, ledger| ledger.week_usage_cents(1).unwrap());
        assert_eq!(used, 500);
    }

    #[test]
    fn test_unwritten_award_counts_toward_program_spend() {
        // One week, one user, $22 total: 2200 cents against a 1100 reference
        let settings = MemorySettingsStore::with_settings(&[
            ("total_budget", "22"),
            ("program_length_weeks", "1"),
            ("expected_users_per_week", "1"),
        ]);
        let allocator = Allocator::new(settings, FlakyLedger::new(1));
        let err = allocator
            .award(&event("a", TaskCategory::PulseSurvey, 1))
            .unwrap_err();
        assert_eq!(err.pending_record().unwrap().cost_cents, 1000);

        // 1200 cents left once the unwritten award is counted: x1.09
        let second = allocator.award(&event("b", TaskCategory::PulseSurvey, 1)).unwrap();
        assert_eq!(second.points_awarded, 545);
    }

    #[test]
    fn test_discarded_award_releases_budget() {
        let allocator = Allocator::new(manual_settings("5"), FlakyLedger::new(1));
        let err = allocator
            .award(&event("a", TaskCategory::PulseSurvey, 1))
            .unwrap_err();
        let pending = err.pending_record().cloned().unwrap();

        assert!(allocator.discard_pending(&pending));
        assert!(!allocator.discard_pending(&pending));

        let next = allocator.award(&event("b", TaskCategory::PulseSurvey, 1)).unwrap();
        assert_eq!(next.points_awarded, 500);
    }

    #[test]
    fn test_separate_allocators_share_file_ledger() {
        // Each thread stands in for its own CLI process
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("ledger.json");
        let barrier = Arc::new(Barrier::new(8));

        let handles: Vec<_> = (0..8)
            .map(|t| {
                let path = path.clone();
                let barrier = Arc::clone(&barrier);
                thread::spawn(move || {
                    let allocator = Allocator::new(manual_settings("5"), JsonLedger::new(path));
                    barrier.wait();
                    allocator
                        .award(&event(&format!("survey-{}", t), TaskCategory::PulseSurvey, 1))
                        .unwrap()
                })
            })
            .collect();
        let awarded: Vec<AllocationRecord> =
            handles.into_iter().map(|h| h.join().unwrap()).collect();

        let ledger = JsonLedger::new(path);
        assert_eq!(ledger.records().unwrap().len(), 8);
        assert_eq!(ledger.week_usage_cents(1).unwrap(), 500);
        assert_eq!(awarded.iter().filter(|r| r.points_awarded > 0).count(), 1);
    }

    #[test]
    fn test_auto_mode_paces_on_program_spend() {
        let settings = MemorySettingsStore::new(); // Defaults: auto allocation on
        let allocator = Allocator::new(settings, MemoryLedger::new());
        let record = allocator
            .award(&event("survey-1", TaskCategory::PulseSurvey, 1))
            .unwrap();
        assert_eq!(record.method, crate::allocation::AllocationMethod::Automated);
        assert_eq!(record.points_awarded, 758);
    }
}
