use std::collections::HashMap;
use std::path::{Path, PathBuf};

use super::{backup_path, Clock, DocStore};
use crate::error::{ReqlogError, Result};
use crate::ids;
use crate::model::{DocMeta, Document, Item, ItemDraft};

/// In-memory storage for testing. Does NOT persist data, but mirrors the
/// observable contract of the file store, including the one-deep backup
/// slot and append-never-creates.
#[derive(Default)]
pub struct InMemoryStore {
    docs: HashMap<PathBuf, Document>,
    backups: HashMap<PathBuf, Document>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// The backed-up (pre-overwrite) version for a path, if any.
    pub fn backed_up(&self, path: &Path) -> Option<&Document> {
        self.backups.get(path)
    }
}

impl DocStore for InMemoryStore {
    fn list(&self, dir: &Path) -> Result<Vec<DocMeta>> {
        let mut metas: Vec<DocMeta> = self
            .docs
            .iter()
            .filter(|(path, _)| path.parent() == Some(dir))
            .map(|(path, doc)| DocMeta {
                path: path.clone(),
                doc_id: doc.doc_id.clone(),
                title: doc.title.clone(),
                item_count: doc.item_count,
                updated_at: doc.updated_at,
            })
            .collect();
        metas.sort_by(|a, b| b.updated_at.cmp(&a.updated_at));
        Ok(metas)
    }

    fn read(&self, path: &Path) -> Result<Document> {
        self.docs
            .get(path)
            .cloned()
            .ok_or_else(|| ReqlogError::NotFound(path.to_path_buf()))
    }

    fn write(&mut self, path: &Path, doc: &Document) -> Result<()> {
        if let Some(previous) = self.docs.get(path) {
            self.backups.insert(path.to_path_buf(), previous.clone());
        }
        self.docs.insert(path.to_path_buf(), doc.clone());
        Ok(())
    }

    fn append(&mut self, path: &Path, draft: ItemDraft, clock: &dyn Clock) -> Result<Document> {
        let mut doc = self.read(path)?;
        let number = ids::next_item_number(&doc.items);
        let id = ids::generate_item_id(&doc.doc_id, number)?;
        doc.push_item(Item::from_draft(draft, id, clock.now()));
        doc.updated_at = clock.now();
        self.write(path, &doc)?;
        Ok(doc)
    }

    fn backup(&mut self, path: &Path) -> Result<PathBuf> {
        let doc = self.read(path)?;
        self.backups.insert(path.to_path_buf(), doc);
        Ok(backup_path(path))
    }

    fn is_writable(&self, _path: &Path) -> bool {
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::FixedClock;
    use chrono::{TimeZone, Utc};

    #[test]
    fn honors_the_single_backup_slot() {
        let now = Utc.with_ymd_and_hms(2025, 1, 1, 0, 0, 0).unwrap();
        let path = PathBuf::from("/logs/REQ-20250101-app.md");
        let mut store = InMemoryStore::new();

        store
            .write(&path, &Document::new("REQ-20250101-app", "one", "", now))
            .unwrap();
        assert!(store.backed_up(&path).is_none());

        store
            .write(&path, &Document::new("REQ-20250101-app", "two", "", now))
            .unwrap();
        store
            .write(&path, &Document::new("REQ-20250101-app", "three", "", now))
            .unwrap();
        assert_eq!(store.backed_up(&path).unwrap().title, "two");
    }

    #[test]
    fn append_matches_file_store_semantics() {
        let now = Utc.with_ymd_and_hms(2025, 1, 1, 0, 0, 0).unwrap();
        let later = FixedClock(Utc.with_ymd_and_hms(2025, 1, 2, 0, 0, 0).unwrap());
        let path = PathBuf::from("/logs/REQ-20250101-app.md");
        let mut store = InMemoryStore::new();

        let err = store
            .append(&path, ItemDraft::default(), &later)
            .unwrap_err();
        assert!(matches!(err, ReqlogError::NotFound(_)));

        store
            .write(&path, &Document::new("REQ-20250101-app", "App", "", now))
            .unwrap();
        let doc = store.append(&path, ItemDraft::default(), &later).unwrap();
        assert_eq!(doc.items[0].id, "REQ-20250101-app-01");
        assert_eq!(doc.updated_at, later.0);
        assert_eq!(store.backed_up(&path).unwrap().item_count, 0);
    }
}
