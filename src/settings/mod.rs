pub mod schema;
pub mod store;

pub use schema::{
    config_to_settings, default_value, is_known_key, known_keys, parse_allocation_config,
    DEFAULTS,
};
pub use store::{FileSettingsStore, MemorySettingsStore, SettingsStore};

use anyhow::{Context, Result};
use chrono::NaiveDate;
use std::path::PathBuf;
use thiserror::Error;

use crate::allocation::{validate_config, AllocationConfig, AllocationError};

/// The settings store could not be read. Surfaced separately from
/// malformed values so callers can tell the two apart.
#[derive(Debug, Error)]
#[error("Failed to read settings: {0:#}")]
pub struct SettingsReadError(pub anyhow::Error);

/// Get the data directory path (~/.config/pulse-points/)
pub fn get_data_dir() -> Result<PathBuf> {
    let home = dirs::home_dir().context("Could not determine home directory")?;
    Ok(home.join(".config").join("pulse-points"))
}

/// Get the default settings file path (~/.config/pulse-points/settings.yaml)
pub fn get_settings_path() -> Result<PathBuf> {
    Ok(get_data_dir()?.join("settings.yaml"))
}

/// Read the allocation config from a settings store.
///
/// # Errors
///
/// Returns a [`SettingsReadError`] if the store cannot be read, or an
/// [`AllocationError::InvalidConfig`] (reachable through `downcast_ref`) if
/// any stored value is malformed.
pub fn load_allocation_config(store: &dyn SettingsStore) -> Result<AllocationConfig> {
    let settings = store.all_settings().map_err(SettingsReadError)?;
    let config = parse_allocation_config(&settings)?;
    Ok(config)
}

/// Replace the stored allocation config as one update.
///
/// Invalid configs are rejected before anything is written.
pub fn save_allocation_config(
    store: &mut dyn SettingsStore,
    config: &AllocationConfig,
) -> Result<()> {
    validate_config(config).map_err(AllocationError::InvalidConfig)?;
    store
        .put_settings(&config_to_settings(config))
        .context("Failed to save allocation settings")?;
    tracing::info!(
        auto_allocate = config.auto_allocate,
        points_per_dollar = config.points_per_dollar,
        max_weekly_budget_cents = config.max_weekly_budget_cents,
        "allocation settings saved"
    );
    Ok(())
}

/// Change one setting, refusing values that would leave the stored config
/// unusable. Returns the config as it stands after the update.
pub fn update_setting(
    store: &mut dyn SettingsStore,
    key: &str,
    value: &str,
) -> Result<AllocationConfig> {
    if !is_known_key(key) {
        let known: Vec<&str> = known_keys().collect();
        return Err(AllocationError::invalid_config(format!(
            "Unknown setting '{}'. Known settings: {}",
            key,
            known.join(", ")
        ))
        .into());
    }

    let mut candidate = store.all_settings().map_err(SettingsReadError)?;
    candidate.insert(key.to_string(), value.trim().to_string());
    let config = parse_allocation_config(&candidate)?;

    store
        .put_setting(key, value.trim())
        .with_context(|| format!("Failed to save setting '{}'", key))?;
    tracing::info!(key, value = value.trim(), "setting updated");
    Ok(config)
}

/// Store defaults for every key that has no value yet. Existing values are
/// left alone. Returns the keys that were written.
pub fn write_defaults(store: &mut dyn SettingsStore) -> Result<Vec<String>> {
    let existing = store.all_settings().map_err(SettingsReadError)?;
    let missing: Vec<(String, String)> = DEFAULTS
        .iter()
        .filter(|(key, _)| !existing.contains_key(*key))
        .map(|(key, value)| (key.to_string(), value.to_string()))
        .collect();

    if !missing.is_empty() {
        store
            .put_settings(&missing)
            .context("Failed to write default settings")?;
    }

    Ok(missing.into_iter().map(|(key, _)| key).collect())
}

/// The configured program start date, if one is set.
pub fn load_program_start(store: &dyn SettingsStore) -> Result<Option<NaiveDate>> {
    match store
        .get_setting(schema::PROGRAM_START_DATE)
        .map_err(SettingsReadError)?
    {
        None => Ok(None),
        Some(raw) => schema::parse_start_date(&raw)
            .map(Some)
            .map_err(|e| {
                AllocationError::invalid_config(format!("{}: {}", schema::PROGRAM_START_DATE, e))
                    .into()
            }),
    }
}
