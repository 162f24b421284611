use anyhow::{Context, Result};
use atomic_write_file::AtomicWriteFile;
use serde::Deserialize;
use std::collections::BTreeMap;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

/// Key-value store for administrative settings. Values are strings.
pub trait SettingsStore {
    fn get_setting(&self, key: &str) -> Result<Option<String>>;

    /// Write several settings as one update. Readers see all or none.
    fn put_settings(&mut self, pairs: &[(String, String)]) -> Result<()>;

    fn all_settings(&self) -> Result<BTreeMap<String, String>>;

    fn put_setting(&mut self, key: &str, value: &str) -> Result<()> {
        self.put_settings(&[(key.to_string(), value.to_string())])
    }
}

/// Settings kept in a flat YAML map on disk.
///
/// Every update rewrites the whole file atomically, so a crash mid-save
/// leaves the previous settings intact.
#[derive(Debug, Clone)]
pub struct FileSettingsStore {
    path: PathBuf,
}

impl FileSettingsStore {
    pub fn new(path: PathBuf) -> Self {
        Self { path }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn load(&self) -> Result<BTreeMap<String, String>> {
        if !self.path.exists() {
            return Ok(BTreeMap::new());
        }

        let content = fs::read_to_string(&self.path)
            .with_context(|| format!("Failed to read settings file at {}", self.path.display()))?;

        if content.trim().is_empty() {
            return Ok(BTreeMap::new());
        }

        let raw: BTreeMap<String, RawValue> =
            serde_saphyr::from_str(&content).with_context(|| {
                format!(
                    "Failed to parse settings: invalid YAML in {}",
                    self.path.display()
                )
            })?;

        Ok(raw
            .into_iter()
            .map(|(key, value)| (key, value.into_string()))
            .collect())
    }

    fn save(&self, settings: &BTreeMap<String, String>) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create directory {}", parent.display()))?;
        }

        let yaml = serde_saphyr::to_string(settings)
            .map_err(|e| anyhow::anyhow!("Failed to serialize settings: {}", e))?;

        let mut file = AtomicWriteFile::open(&self.path).with_context(|| {
            format!("Failed to open atomic write file at {}", self.path.display())
        })?;
        file.write_all(yaml.as_bytes())
            .context("Failed to write settings")?;
        file.commit().context("Failed to save settings")?;

        Ok(())
    }
}

impl SettingsStore for FileSettingsStore {
    fn get_setting(&self, key: &str) -> Result<Option<String>> {
        Ok(self.load()?.remove(key))
    }

    fn put_settings(&mut self, pairs: &[(String, String)]) -> Result<()> {
        let mut settings = self.load()?;
        for (key, value) in pairs {
            settings.insert(key.clone(), value.clone());
        }
        self.save(&settings)
    }

    fn all_settings(&self) -> Result<BTreeMap<String, String>> {
        self.load()
    }
}

/// Hand-edited files may hold bare numbers and booleans; they are read back
/// as their text.
#[derive(Deserialize)]
#[serde(untagged)]
enum RawValue {
    Text(String),
    Bool(bool),
    Int(i64),
    Float(f64),
}

impl RawValue {
    fn into_string(self) -> String {
        match self {
            RawValue::Text(s) => s,
            RawValue::Bool(b) => b.to_string(),
            RawValue::Int(i) => i.to_string(),
            RawValue::Float(f) => f.to_string(),
        }
    }
}

/// In-process settings, for tests and embedding.
#[derive(Debug, Clone, Default)]
pub struct MemorySettingsStore {
    settings: BTreeMap<String, String>,
}

impl MemorySettingsStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_settings(pairs: &[(&str, &str)]) -> Self {
        Self {
            settings: pairs
                .iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect(),
        }
    }
}

impl SettingsStore for MemorySettingsStore {
    fn get_setting(&self, key: &str) -> Result<Option<String>> {
        Ok(self.settings.get(key).cloned())
    }

    fn put_settings(&mut self, pairs: &[(String, String)]) -> Result<()> {
        for (key, value) in pairs {
            self.settings.insert(key.clone(), value.clone());
        }
        Ok(())
    }

    fn all_settings(&self) -> Result<BTreeMap<String, String>> {
        Ok(self.settings.clone())
    }
}
