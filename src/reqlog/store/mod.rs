//! # Storage layer
//!
//! The [`DocStore`] trait is the port surface consumed by every caller
//! (CLI, embedding applications): list a directory, read, write, append,
//! backup, probe writability. Two implementations:
//!
//! - [`fs::FileStore`]: production file-based storage. One markdown file
//!   per document, a single `.bak` backup slot next to it, and lexical
//!   `~` expansion against a configured base directory.
//! - [`memory::InMemoryStore`]: in-memory storage for testing, honoring
//!   the same observable contract (including the backup slot).
//!
//! ## Concurrency model
//!
//! Single writer per path. There is no locking, no atomic rename and no
//! compare-and-swap: concurrent appends to the same path can lose updates
//! (last write wins) and clobber the backup slot. The backup is a
//! one-deep recovery convenience, not a durability guarantee.
//!
//! Time is injected through the [`Clock`] capability so append timestamps
//! are deterministic in tests.

use chrono::{DateTime, Utc};
use std::path::{Path, PathBuf};

use crate::error::Result;
use crate::model::{DocMeta, Document, ItemDraft};

pub mod fs;
pub mod memory;

/// Extension of document files, without the dot.
pub const DOC_FILE_EXT: &str = "md";

/// Appended to the full filename of a document to name its backup slot.
pub const BACKUP_SUFFIX: &str = ".bak";

/// Time source injected into mutating operations.
pub trait Clock {
    fn now(&self) -> DateTime<Utc>;
}

/// Production clock.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// A clock pinned to one instant, for deterministic tests.
#[derive(Debug, Clone, Copy)]
pub struct FixedClock(pub DateTime<Utc>);

impl Clock for FixedClock {
    fn now(&self) -> DateTime<Utc> {
        self.0
    }
}

/// Abstract interface for document storage at caller-supplied paths.
pub trait DocStore {
    /// Enumerate request-log documents in one directory (non-recursive),
    /// newest `updated_at` first. Files that are not recognizable
    /// request-log documents are skipped, never failing the listing;
    /// a missing directory yields an empty result.
    fn list(&self, dir: &Path) -> Result<Vec<DocMeta>>;

    /// Read and decode one document.
    fn read(&self, path: &Path) -> Result<Document>;

    /// Persist a document, creating parent directories as needed. When a
    /// file already exists at `path` its current content goes to the
    /// backup slot first; a first write never touches the slot.
    fn write(&mut self, path: &Path, doc: &Document) -> Result<()>;

    /// Read the document, assign the next item id, stamp the draft with
    /// `clock.now()`, recompute derived state and write back (which backs
    /// up the pre-append version). Fails with `NotFound` if the document
    /// does not exist; append never creates.
    fn append(&mut self, path: &Path, draft: ItemDraft, clock: &dyn Clock) -> Result<Document>;

    /// Copy `path` into its backup slot, clobbering any prior backup.
    /// At most one backup exists per document; only the immediately
    /// preceding version is ever recoverable.
    fn backup(&mut self, path: &Path) -> Result<PathBuf>;

    /// Whether a write to `path` would be permitted. For a missing file
    /// this probes the nearest existing ancestor directory. Total: any
    /// error resolves to `false`.
    fn is_writable(&self, path: &Path) -> bool;
}

/// Backup slot path for a document: the same filename with
/// [`BACKUP_SUFFIX`] appended (`x.md` → `x.md.bak`).
pub fn backup_path(path: &Path) -> PathBuf {
    let mut os = path.as_os_str().to_os_string();
    os.push(BACKUP_SUFFIX);
    PathBuf::from(os)
}
