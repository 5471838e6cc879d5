use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// One captured record inside a document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Item {
    pub id: String,
    pub title: String,
    pub item_type: String,
    pub domain: String,
    pub context: String,
    pub priority: String,
    pub status: String,
    pub tags: Vec<String>,
    pub notes: String,
    pub created_at: DateTime<Utc>,
}

/// An item as supplied by a caller, before the store assigns an id
/// and a creation timestamp.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ItemDraft {
    pub title: String,
    pub item_type: String,
    pub domain: String,
    pub context: String,
    pub priority: String,
    pub status: String,
    pub tags: Vec<String>,
    pub notes: String,
}

impl Item {
    pub fn from_draft(draft: ItemDraft, id: String, created_at: DateTime<Utc>) -> Self {
        Self {
            id,
            title: draft.title,
            item_type: draft.item_type,
            domain: draft.domain,
            context: draft.context,
            priority: draft.priority,
            status: draft.status,
            tags: draft.tags,
            notes: draft.notes,
            created_at,
        }
    }
}

/// Denormalized index entry, one per item, kept in lockstep with `items`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ItemIndexEntry {
    pub id: String,
    pub item_type: String,
    pub title: String,
}

/// The unit of persistence, one per backing file.
///
/// `items_index`, `tags` and `item_count` are derived from `items` and are
/// recomputed via [`Document::rebuild_derived`], never hand-edited.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Document {
    pub doc_id: String,
    pub title: String,
    pub project_id: String,
    pub items: Vec<Item>,
    pub items_index: Vec<ItemIndexEntry>,
    pub tags: Vec<String>,
    pub item_count: usize,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Document {
    pub fn new(
        doc_id: impl Into<String>,
        title: impl Into<String>,
        project_id: impl Into<String>,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            doc_id: doc_id.into(),
            title: title.into(),
            project_id: project_id.into(),
            items: Vec::new(),
            items_index: Vec::new(),
            tags: Vec::new(),
            item_count: 0,
            created_at: now,
            updated_at: now,
        }
    }

    /// Append an item and recompute all derived state.
    pub fn push_item(&mut self, item: Item) {
        self.items.push(item);
        self.rebuild_derived();
    }

    /// Recompute `items_index`, `tags` and `item_count` from `items`.
    pub fn rebuild_derived(&mut self) {
        self.items_index = self
            .items
            .iter()
            .map(|item| ItemIndexEntry {
                id: item.id.clone(),
                item_type: item.item_type.clone(),
                title: item.title.clone(),
            })
            .collect();
        self.item_count = self.items.len();

        let mut tags: Vec<String> = self
            .items
            .iter()
            .flat_map(|item| item.tags.iter().cloned())
            .collect();
        tags.sort();
        tags.dedup();
        self.tags = tags;
    }
}

/// Listing metadata for one document, cheap enough to show in a table
/// without holding the items in memory.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DocMeta {
    pub path: PathBuf,
    pub doc_id: String,
    pub title: String,
    pub item_count: usize,
    pub updated_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn draft(title: &str, tags: &[&str]) -> ItemDraft {
        ItemDraft {
            title: title.to_string(),
            item_type: "bug".to_string(),
            tags: tags.iter().map(|t| t.to_string()).collect(),
            ..Default::default()
        }
    }

    #[test]
    fn push_item_keeps_index_in_lockstep() {
        let now = Utc::now();
        let mut doc = Document::new("REQ-20250101-app", "App", "app", now);
        doc.push_item(Item::from_draft(
            draft("First", &["b", "a"]),
            "REQ-20250101-app-01".to_string(),
            now,
        ));
        doc.push_item(Item::from_draft(
            draft("Second", &["a", "c"]),
            "REQ-20250101-app-02".to_string(),
            now,
        ));

        assert_eq!(doc.item_count, 2);
        assert_eq!(doc.items_index.len(), doc.items.len());
        assert_eq!(doc.items_index[1].id, "REQ-20250101-app-02");
        assert_eq!(doc.items_index[1].title, "Second");
    }

    #[test]
    fn tags_are_sorted_and_deduplicated() {
        let now = Utc::now();
        let mut doc = Document::new("REQ-20250101-app", "App", "app", now);
        doc.push_item(Item::from_draft(
            draft("First", &["zeta", "api"]),
            "REQ-20250101-app-01".to_string(),
            now,
        ));
        doc.push_item(Item::from_draft(
            draft("Second", &["api", "auth"]),
            "REQ-20250101-app-02".to_string(),
            now,
        ));

        assert_eq!(doc.tags, vec!["api", "auth", "zeta"]);
    }
}
