use std::fs;
use std::path::{Path, PathBuf};

use tracing::{debug, warn};

use super::{backup_path, Clock, DocStore, DOC_FILE_EXT};
use crate::codec;
use crate::error::{ReqlogError, Result};
use crate::ids;
use crate::model::{DocMeta, Document, Item, ItemDraft};

/// Production file-based store.
///
/// Paths may use a single leading `~` (`~` or `~/rest`) which expands
/// lexically to `base_dir` on every call. There is no `~user` form; that
/// shorthand is a configuration convenience, not shell semantics.
pub struct FileStore {
    base_dir: PathBuf,
}

impl FileStore {
    pub fn new(base_dir: PathBuf) -> Self {
        Self { base_dir }
    }

    pub fn base_dir(&self) -> &Path {
        &self.base_dir
    }

    fn expand(&self, path: &Path) -> PathBuf {
        match path.to_str() {
            Some("~") => self.base_dir.clone(),
            Some(s) if s.starts_with("~/") => self.base_dir.join(&s[2..]),
            _ => path.to_path_buf(),
        }
    }
}

fn dir_writable(path: &Path) -> bool {
    fs::metadata(path)
        .map(|meta| !meta.permissions().readonly())
        .unwrap_or(false)
}

impl DocStore for FileStore {
    fn list(&self, dir: &Path) -> Result<Vec<DocMeta>> {
        let dir = self.expand(dir);
        if !dir.exists() {
            return Ok(Vec::new());
        }

        let mut metas = Vec::new();
        for entry in fs::read_dir(&dir)? {
            let path = entry?.path();
            if !path.is_file()
                || path.extension().and_then(|ext| ext.to_str()) != Some(DOC_FILE_EXT)
            {
                continue;
            }
            match self.read(&path) {
                Ok(doc) => metas.push(DocMeta {
                    path: path.clone(),
                    doc_id: doc.doc_id,
                    title: doc.title,
                    item_count: doc.item_count,
                    updated_at: doc.updated_at,
                }),
                Err(ReqlogError::NotRequestLog(_)) => {
                    debug!(path = %path.display(), "skipping file without a document id");
                }
                Err(err) => {
                    warn!(path = %path.display(), error = %err, "skipping unreadable document");
                }
            }
        }

        metas.sort_by(|a, b| b.updated_at.cmp(&a.updated_at));
        Ok(metas)
    }

    fn read(&self, path: &Path) -> Result<Document> {
        let path = self.expand(path);
        if !path.exists() {
            return Err(ReqlogError::NotFound(path));
        }
        let text = fs::read_to_string(&path)?;
        codec::parse(&text).map_err(|err| match err {
            codec::ParseError::NotRequestLog => ReqlogError::NotRequestLog(path.clone()),
            codec::ParseError::Malformed(reason) => ReqlogError::Parse {
                path: path.clone(),
                reason,
            },
        })
    }

    fn write(&mut self, path: &Path, doc: &Document) -> Result<()> {
        let path = self.expand(path);
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() && !parent.exists() {
                fs::create_dir_all(parent)?;
            }
        }
        // Backup is a side effect of overwriting only; a first write
        // leaves the slot untouched.
        if path.exists() {
            self.backup(&path)?;
        }
        fs::write(&path, codec::serialize(doc))?;
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
        let path = self.expand(path);
        if !path.exists() {
            return Err(ReqlogError::NotFound(path));
        }
        let backup = backup_path(&path);
        fs::copy(&path, &backup)?;
        Ok(backup)
    }

    fn is_writable(&self, path: &Path) -> bool {
        let path = self.expand(path);
        if path.is_file() {
            return fs::OpenOptions::new().write(true).open(&path).is_ok();
        }
        if path.is_dir() {
            return dir_writable(&path);
        }
        for ancestor in path.ancestors().skip(1) {
            let probe = if ancestor.as_os_str().is_empty() {
                Path::new(".")
            } else {
                ancestor
            };
            if probe.exists() {
                return dir_writable(probe);
            }
        }
        false
    }
}
