//! registry: named caches (root directory + default encoder).
//!
//! Backing file: <user_dir>/image_banks.json
//! ```text
//! {
//!   "default": { "cache_path": "<output_dir>/_persistence", "encoder": "webp" }
//! }
//! ```
//! If the file is absent on first access it is created with the single
//! `default` entry. The bank engine never writes it afterwards.

use anyhow::{Context, Result};
use log::{debug, info, warn};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};

use crate::config::PersistConfig;
use crate::error::BankError;

pub const BANK_CONF_FILE: &str = "image_banks.json";
pub const DEFAULT_CACHE_NAME: &str = "default";
pub const DEFAULT_CACHE_SUBDIR: &str = "_persistence";

/// One registry entry. Both fields are optional on disk so that a partially
/// filled entry can be reported precisely.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CacheEntry {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cache_path: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub encoder: Option<String>,
}

/// Entry as found on disk: parsed, or the reason it could not be.
type StoredEntry = std::result::Result<CacheEntry, String>;

/// In-memory view of the registry file, loaded once and shared by reference.
///
/// Entries are validated one by one: a malformed entry is reported as a
/// configuration error only when that cache is looked up.
#[derive(Debug, Clone)]
pub struct CacheRegistry {
    path: PathBuf,
    default_encoder: String,
    caches: BTreeMap<String, StoredEntry>,
}

impl CacheRegistry {
    /// Open the registry described by `cfg`, creating the file with the
    /// default entry on first run.
    pub fn open(cfg: &PersistConfig) -> Result<Self> {
        let path = cfg.registry_path();
        if !path.is_file() {
            init_registry_file(&path, cfg)?;
        }
        Self::load(&path, &cfg.default_encoder)
    }

    /// Load an existing registry file (no first-run initialization).
    pub fn load(path: &Path, default_encoder: &str) -> Result<Self> {
        let bytes = fs::read(path).with_context(|| format!("read {}", path.display()))?;
        let doc: Value = serde_json::from_slice(&bytes).map_err(|e| {
            BankError::config(format!("cache registry {} is not valid JSON: {}", path.display(), e))
        })?;
        let Value::Object(entries) = doc else {
            return Err(BankError::config(format!(
                "cache registry {} must be a JSON object of caches",
                path.display()
            ))
            .into());
        };

        let caches: BTreeMap<String, StoredEntry> = entries
            .into_iter()
            .map(|(name, v)| {
                let parsed = if v.is_object() {
                    serde_json::from_value::<CacheEntry>(v).map_err(|e| e.to_string())
                } else {
                    Err(format!("expected an object, got {}", v))
                };
                if let Err(reason) = &parsed {
                    warn!("cache '{}' in {} is invalid: {}", name, path.display(), reason);
                }
                (name, parsed)
            })
            .collect();
        debug!(
            "cache registry {}: {} cache(s)",
            path.display(),
            caches.len()
        );
        Ok(Self {
            path: path.to_path_buf(),
            default_encoder: default_encoder.to_string(),
            caches,
        })
    }

    /// Build a registry directly from entries (no file behind it).
    pub fn from_entries<I>(entries: I, default_encoder: &str) -> Self
    where
        I: IntoIterator<Item = (String, CacheEntry)>,
    {
        Self {
            path: PathBuf::new(),
            default_encoder: default_encoder.to_string(),
            caches: entries.into_iter().map(|(k, e)| (k, Ok(e))).collect(),
        }
    }

    /// Registry backed by a single cache root (handy for tools/tests).
    pub fn single(cache_name: &str, cache_root: &Path, encoder: &str) -> Self {
        Self::from_entries(
            [(
                cache_name.to_string(),
                CacheEntry {
                    cache_path: Some(cache_root.to_string_lossy().into_owned()),
                    encoder: Some(encoder.to_string()),
                },
            )],
            encoder,
        )
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Sorted list of configured cache names.
    pub fn cache_names(&self) -> Vec<String> {
        self.caches.keys().cloned().collect()
    }

    fn entry(&self, cache_name: &str) -> Result<&CacheEntry> {
        match self.caches.get(cache_name) {
            Some(Ok(entry)) => Ok(entry),
            Some(Err(reason)) => Err(BankError::config(format!(
                "cache '{}' in {} is invalid: {}",
                cache_name,
                self.path.display(),
                reason
            ))
            .into()),
            None => Err(BankError::config(format!(
                "cache named '{}' does not exist in {}",
                cache_name,
                self.path.display()
            ))
            .into()),
        }
    }

    /// Root directory of `cache_name`.
    pub fn get_cache_root(&self, cache_name: &str) -> Result<PathBuf> {
        let entry = self.entry(cache_name)?;
        match entry.cache_path.as_deref() {
            Some(p) if !p.is_empty() => Ok(PathBuf::from(p)),
            _ => Err(BankError::config(format!(
                "'cache_path' has not been set for cache '{}' in {}",
                cache_name,
                self.path.display()
            ))
            .into()),
        }
    }

    /// Encoder name of `cache_name`; falls back to the default encoder.
    pub fn get_cache_encoder(&self, cache_name: &str) -> Result<String> {
        let entry = self.entry(cache_name)?;
        Ok(entry
            .encoder
            .as_deref()
            .filter(|e| !e.is_empty())
            .unwrap_or(&self.default_encoder)
            .to_string())
    }

    pub fn default_encoder(&self) -> &str {
        &self.default_encoder
    }
}

/// Write the first-run registry: one `default` cache under <output_dir>.
fn init_registry_file(path: &Path, cfg: &PersistConfig) -> Result<()> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent)
                .with_context(|| format!("create {}", parent.display()))?;
        }
    }

    let mut conf = BTreeMap::new();
    conf.insert(
        DEFAULT_CACHE_NAME.to_string(),
        CacheEntry {
            cache_path: Some(
                cfg.output_dir
                    .join(DEFAULT_CACHE_SUBDIR)
                    .to_string_lossy()
                    .into_owned(),
            ),
            encoder: Some(cfg.default_encoder.clone()),
        },
    );

    let json = serde_json::to_string_pretty(&conf).context("serialize cache registry")?;
    let mut f = OpenOptions::new()
        .create(true)
        .write(true)
        .truncate(true)
        .open(path)
        .with_context(|| format!("create {}", path.display()))?;
    f.write_all(json.as_bytes())?;
    f.flush()?;

    info!("created cache registry {}", path.display());
    Ok(())
}
