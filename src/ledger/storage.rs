use super::types::{AllocationRecord, LedgerState, LEDGER_VERSION};
use super::Ledger;
use anyhow::{Context, Result};
use atomic_write_file::AtomicWriteFile;
use fs2::FileExt;
use std::fs::{self, File, OpenOptions};
use std::path::{Path, PathBuf};

/// Get the default ledger file path (~/.config/pulse-points/ledger.json)
pub fn get_ledger_path() -> Result<PathBuf> {
    Ok(crate::settings::get_data_dir()?.join("ledger.json"))
}

/// Load ledger state from a JSON file
///
/// If the file doesn't exist, returns a new empty state.
/// If the file exists but has an unsupported version, returns an error.
pub fn load_ledger_state(path: &Path) -> Result<LedgerState> {
    if !path.exists() {
        return Ok(LedgerState::new());
    }

    let file = File::open(path)
        .with_context(|| format!("Failed to open ledger file at {}", path.display()))?;

    let state: LedgerState = serde_json::from_reader(file).context("Failed to load ledger")?;

    if state.version != LEDGER_VERSION {
        anyhow::bail!("Unsupported ledger version: {}", state.version);
    }

    Ok(state)
}

/// Save ledger state to a JSON file atomically
///
/// Uses atomic-write-file so the ledger is never left half-written.
/// Creates the parent directory if it doesn't exist.
pub fn save_ledger_state(path: &Path, state: &LedgerState) -> Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create directory {}", parent.display()))?;
    }

    let mut file = AtomicWriteFile::open(path)
        .with_context(|| format!("Failed to open atomic write file at {}", path.display()))?;

    serde_json::to_writer_pretty(&mut file, state).context("Failed to serialize ledger")?;

    file.commit().context("Failed to save ledger")?;

    Ok(())
}

/// Exclusive hold on a file-backed ledger. Released when dropped.
#[derive(Debug)]
pub struct LedgerLock {
    file: File,
}

impl Drop for LedgerLock {
    fn drop(&mut self) {
        let _ = FileExt::unlock(&self.file);
    }
}

/// Take the exclusive lock guarding a ledger file, blocking until other
/// holders (in this or another process) release it.
///
/// The lock lives in a sibling `.lock` file so the ledger itself can still
/// be replaced atomically while it is held.
pub fn lock_ledger(path: &Path) -> Result<LedgerLock> {
    let lock_path = path.with_extension("lock");
    if let Some(parent) = lock_path.parent() {
        fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create directory {}", parent.display()))?;
    }

    let file = OpenOptions::new()
        .create(true)
        .truncate(false)
        .write(true)
        .open(&lock_path)
        .with_context(|| format!("Failed to open lock file at {}", lock_path.display()))?;
    file.lock_exclusive()
        .with_context(|| format!("Failed to lock {}", lock_path.display()))?;

    Ok(LedgerLock { file })
}

/// Ledger persisted as a single versioned JSON document.
#[derive(Debug, Clone)]
pub struct JsonLedger {
    path: PathBuf,
}

impl JsonLedger {
    pub fn new(path: PathBuf) -> Self {
        Self { path }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Ledger for JsonLedger {
    fn acquire_lock(&self) -> Result<Option<LedgerLock>> {
        lock_ledger(&self.path).map(Some)
    }

    fn record_allocation(&mut self, record: &AllocationRecord) -> Result<()> {
        let mut state = load_ledger_state(&self.path)?;
        state.append(record.clone());
        save_ledger_state(&self.path, &state)
    }

    fn records(&self) -> Result<Vec<AllocationRecord>> {
        Ok(load_ledger_state(&self.path)?.records)
    }

    fn week_usage_cents(&self, week: u32) -> Result<u64> {
        Ok(load_ledger_state(&self.path)?.week_usage_cents(week))
    }

    fn program_spent_cents(&self) -> Result<u64> {
        Ok(load_ledger_state(&self.path)?.total_spent_cents())
    }
}
