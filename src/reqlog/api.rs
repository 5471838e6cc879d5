//! # API facade
//!
//! Thin entry point over the store and the query engine, generic over
//! [`DocStore`] so the same surface runs against the file store in
//! production and the in-memory store in tests. Returns structured
//! results only; printing, exit codes and terminal concerns live in the
//! binary.

use std::path::{Path, PathBuf};

use tracing::warn;

use crate::error::{ReqlogError, Result};
use crate::ids;
use crate::model::{DocMeta, Document, ItemDraft};
use crate::query::{self, SearchMatch, SearchOptions};
use crate::store::{Clock, DocStore, DOC_FILE_EXT};

pub struct ReqlogApi<S: DocStore> {
    store: S,
}

impl<S: DocStore> ReqlogApi<S> {
    pub fn new(store: S) -> Self {
        Self { store }
    }

    /// Create a new document for `project` in `dir` and persist it. The
    /// document id is derived from the project slug and today's date;
    /// refuses to clobber an existing file at the target path.
    pub fn create(
        &mut self,
        dir: &Path,
        project: &str,
        title: &str,
        clock: &dyn Clock,
    ) -> Result<(PathBuf, Document)> {
        let now = clock.now();
        let doc_id = ids::generate_doc_id(project, now.date_naive())?;
        let path = dir.join(format!("{}.{}", doc_id, DOC_FILE_EXT));

        match self.store.read(&path) {
            Err(ReqlogError::NotFound(_)) => {}
            Ok(_) | Err(_) => {
                return Err(ReqlogError::InvalidInput(format!(
                    "refusing to overwrite existing file {}",
                    path.display()
                )));
            }
        }

        let title = if title.is_empty() { project } else { title };
        let doc = Document::new(doc_id, title, project, now);
        self.store.write(&path, &doc)?;
        Ok((path, doc))
    }

    pub fn list(&self, dir: &Path) -> Result<Vec<DocMeta>> {
        self.store.list(dir)
    }

    pub fn read(&self, path: &Path) -> Result<Document> {
        self.store.read(path)
    }

    pub fn append(&mut self, path: &Path, draft: ItemDraft, clock: &dyn Clock) -> Result<Document> {
        self.store.append(path, draft, clock)
    }

    pub fn backup(&mut self, path: &Path) -> Result<PathBuf> {
        self.store.backup(path)
    }

    pub fn is_writable(&self, path: &Path) -> bool {
        self.store.is_writable(path)
    }

    /// Load every document listed in `dir` and run one query over them,
    /// in listing order (newest first). Documents that disappear or break
    /// between listing and reading are skipped like `list` skips them.
    pub fn search(
        &self,
        dir: &Path,
        query_str: &str,
        opts: &SearchOptions,
    ) -> Result<Vec<SearchMatch>> {
        let metas = self.store.list(dir)?;
        let mut docs: Vec<(PathBuf, Document)> = Vec::with_capacity(metas.len());
        for meta in metas {
            match self.store.read(&meta.path) {
                Ok(doc) => docs.push((meta.path, doc)),
                Err(err) => {
                    warn!(path = %meta.path.display(), error = %err, "skipping document during search");
                }
            }
        }
        Ok(query::search_documents(&docs, query_str, opts))
    }
}
