//! Durable cross-step answer store.
//!
//! The store is one JSON document mapping a group key (e.g. `welcome`,
//! `submit-steps`) to a group document of field values. Steps read their
//! defaults from their group and shallow-merge validated answers back into it.

use serde_json::{Map, Value};
use std::collections::BTreeMap;
use std::fs::{self, File};
use std::io::Write;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{debug, warn};

/// Field name to value mapping for one group
pub type Document = Map<String, Value>;

/// Whole persisted layout: group key to group document
pub type WizardDocument = BTreeMap<String, Document>;

/// Group written by the welcome steps (language, region, consent flags)
pub const WELCOME_GROUP: &str = "welcome";
/// Group written by recording and questionnaire steps
pub const SUBMIT_GROUP: &str = "submit-steps";

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Read/update/reset access to the wizard document.
///
/// Every mutation is durable by the time it returns `Ok`.
pub trait StateStore {
    /// Group document, or `None` when the group was never written
    fn read(&self, group: &str) -> Option<Document>;

    /// Shallow-merge `partial` into `group`, creating the group if absent
    fn update(&mut self, group: &str, partial: Document) -> Result<(), StoreError>;

    /// Replace the whole document with the empty document
    fn reset(&mut self) -> Result<(), StoreError>;

    /// Copy of the whole document
    fn snapshot(&self) -> WizardDocument;
}

fn merge_into(doc: &mut WizardDocument, group: &str, partial: Document) {
    let target = doc.entry(group.to_string()).or_default();
    for (key, value) in partial {
        target.insert(key, value);
    }
}

/// In-memory store, used by tests and dry runs
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    doc: WizardDocument,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl StateStore for MemoryStore {
    fn read(&self, group: &str) -> Option<Document> {
        self.doc.get(group).cloned()
    }

    fn update(&mut self, group: &str, partial: Document) -> Result<(), StoreError> {
        merge_into(&mut self.doc, group, partial);
        Ok(())
    }

    fn reset(&mut self) -> Result<(), StoreError> {
        self.doc.clear();
        Ok(())
    }

    fn snapshot(&self) -> WizardDocument {
        self.doc.clone()
    }
}

/// Store persisted as a single JSON file
#[derive(Debug)]
pub struct FileStore {
    doc: WizardDocument,
    path: PathBuf,
}

impl FileStore {
    /// Load the store from `path`, starting empty if the file is missing.
    ///
    /// A file that no longer parses (e.g. written by an older release) is
    /// discarded with a warning rather than blocking the wizard.
    pub fn open(path: impl Into<PathBuf>) -> Result<Self, StoreError> {
        let path = path.into();
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }

        let doc = if path.exists() {
            let contents = fs::read(&path)?;
            match serde_json::from_slice::<WizardDocument>(&contents) {
                Ok(doc) => doc,
                Err(e) => {
                    warn!(path = %path.display(), error = %e, "Discarding unreadable wizard state");
                    WizardDocument::new()
                }
            }
        } else {
            WizardDocument::new()
        };

        debug!(path = %path.display(), groups = doc.len(), "Opened wizard store");
        Ok(Self { doc, path })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Write via a sibling temp file and rename so a crash never leaves a torn file
    fn persist(&self, doc: &WizardDocument) -> Result<(), StoreError> {
        let contents = serde_json::to_string_pretty(doc)?;
        let tmp = self.path.with_extension("json.tmp");
        let mut file = File::create(&tmp)?;
        file.write_all(contents.as_bytes())?;
        file.sync_all()?;
        drop(file);
        fs::rename(&tmp, &self.path)?;
        Ok(())
    }
}

impl StateStore for FileStore {
    fn read(&self, group: &str) -> Option<Document> {
        self.doc.get(group).cloned()
    }

    fn update(&mut self, group: &str, partial: Document) -> Result<(), StoreError> {
        let mut next = self.doc.clone();
        merge_into(&mut next, group, partial);
        self.persist(&next)?;
        self.doc = next;
        debug!(group, "Store updated");
        Ok(())
    }

    fn reset(&mut self) -> Result<(), StoreError> {
        let empty = WizardDocument::new();
        self.persist(&empty)?;
        self.doc = empty;
        debug!("Store reset");
        Ok(())
    }

    fn snapshot(&self) -> WizardDocument {
        self.doc.clone()
    }
}
