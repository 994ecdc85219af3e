//! Answer cache
//!
//! One JSON file per dataset fingerprint, named `{base}_{fingerprint}`. The
//! whole store is loaded on open and rewritten on every insert. A file that
//! cannot be read or parsed is treated as an empty store.

use serde::Serialize;
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

use crate::answer::AnswerEntry;

/// Cache validity of a lookup
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum EntryStatus {
    Fresh,
    StaleImage,
    StaleError,
    Missing,
}

impl EntryStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            EntryStatus::Fresh => "fresh",
            EntryStatus::StaleImage => "stale_image",
            EntryStatus::StaleError => "stale_error",
            EntryStatus::Missing => "missing",
        }
    }
}

/// Classify an optional entry. Error-shaped results win over chart
/// references; chart references are only reusable when `allow_image` is set.
pub fn classify(entry: Option<&AnswerEntry>, allow_image: bool) -> EntryStatus {
    match entry {
        None => EntryStatus::Missing,
        Some(e) if e.result.is_error_shaped() => EntryStatus::StaleError,
        Some(e) if e.result.references_chart() && !allow_image => EntryStatus::StaleImage,
        Some(_) => EntryStatus::Fresh,
    }
}

/// Path of the namespace file for a fingerprint
pub fn namespace_path(base: &Path, fingerprint: &str) -> PathBuf {
    let name = base
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    base.with_file_name(format!("{}_{}", name, fingerprint))
}

/// Persistent question -> answer store for one dataset
#[derive(Debug)]
pub struct AnswerCache {
    base: PathBuf,
    path: PathBuf,
    entries: BTreeMap<String, AnswerEntry>,
}

impl AnswerCache {
    /// Open the namespace for `fingerprint` under `base`, loading any
    /// persisted entries.
    pub fn open(base: impl Into<PathBuf>, fingerprint: &str) -> Self {
        let base = base.into();
        let path = namespace_path(&base, fingerprint);
        let entries = load_entries(&path);
        debug!("Opened answer cache {} ({} entries)", path.display(), entries.len());
        Self { base, path, entries }
    }

    /// Namespace handle that never touches the persisted file on open.
    pub fn detached(base: impl Into<PathBuf>, fingerprint: &str) -> Self {
        let base = base.into();
        let path = namespace_path(&base, fingerprint);
        Self {
            base,
            path,
            entries: BTreeMap::new(),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn get(&self, question: &str) -> Option<&AnswerEntry> {
        self.entries.get(question)
    }

    pub fn status(&self, question: &str, allow_image: bool) -> EntryStatus {
        classify(self.get(question), allow_image)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Store an entry and rewrite the namespace file.
    ///
    /// Error-shaped entries are skipped. Returns whether the entry was stored.
    pub fn put(&mut self, question: &str, entry: AnswerEntry) -> std::io::Result<bool> {
        if classify(Some(&entry), true) == EntryStatus::StaleError {
            debug!("Not caching error-shaped answer for {:?}", question);
            return Ok(false);
        }

        self.entries.insert(question.to_string(), entry);
        self.persist()?;
        Ok(true)
    }

    fn persist(&self) -> std::io::Result<()> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }
        let json = serde_json::to_string_pretty(&self.entries)?;
        fs::write(&self.path, json)?;
        debug!("Persisted {} entries to {}", self.entries.len(), self.path.display());
        Ok(())
    }

    /// Drop every entry and remove this namespace's file.
    pub fn clear(&mut self) -> std::io::Result<()> {
        self.entries.clear();
        if self.path.exists() {
            fs::remove_file(&self.path)?;
            info!("Removed answer cache {}", self.path.display());
        }
        Ok(())
    }

    /// Remove every namespace file sharing this cache's base name, across all
    /// fingerprints. Returns the number of files removed.
    pub fn clear_all(&mut self) -> std::io::Result<usize> {
        self.entries.clear();

        let dir = match self.base.parent() {
            Some(p) if !p.as_os_str().is_empty() => p.to_path_buf(),
            _ => PathBuf::from("."),
        };
        let prefix = format!(
            "{}_",
            self.base
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_default()
        );

        if !dir.exists() {
            return Ok(0);
        }

        let mut removed = 0;
        for entry in fs::read_dir(&dir)? {
            let entry = entry?;
            let name = entry.file_name().to_string_lossy().into_owned();
            if name.starts_with(&prefix) && entry.file_type()?.is_file() {
                fs::remove_file(entry.path())?;
                removed += 1;
            }
        }

        info!("Removed {} answer cache file(s) matching {}*", removed, prefix);
        Ok(removed)
    }

    /// Copy of the in-memory store
    pub fn snapshot(&self) -> BTreeMap<String, AnswerEntry> {
        self.entries.clone()
    }
}

fn load_entries(path: &Path) -> BTreeMap<String, AnswerEntry> {
    if !path.exists() {
        return BTreeMap::new();
    }

    let content = match fs::read_to_string(path) {
        Ok(c) => c,
        Err(e) => {
            warn!("Unreadable answer cache {}, starting empty: {}", path.display(), e);
            return BTreeMap::new();
        }
    };

    match serde_json::from_str(&content) {
        Ok(entries) => entries,
        Err(e) => {
            warn!("Corrupt answer cache {}, starting empty: {}", path.display(), e);
            BTreeMap::new()
        }
    }
}
