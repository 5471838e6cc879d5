//! Query language and matcher.
//!
//! A query string is whitespace-tokenized (single or double quotes keep a
//! span together), each token classified by prefix (`tag:`/`tags:`,
//! `type:`, `status:`, anything else is free text) and all components are
//! AND-combined: an item matches only if every component matches.
//! Matching is case-insensitive under one of three modes; free-text
//! matches carry a bounded excerpt window for highlighting.
//!
//! Parsing never fails. An unrecognized prefix is free text, an empty or
//! whitespace-only query has zero components and therefore matches
//! nothing.

use serde::Serialize;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use crate::model::{Document, Item};

/// How query values are compared against item fields.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum MatchMode {
    /// Case-insensitive equality.
    Full,
    /// Case-insensitive prefix match.
    Starts,
    /// Case-insensitive substring match.
    #[default]
    Contains,
}

impl FromStr for MatchMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "full" => Ok(MatchMode::Full),
            "starts" => Ok(MatchMode::Starts),
            "contains" => Ok(MatchMode::Contains),
            other => Err(format!("unknown match mode {:?}", other)),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum QueryComponent {
    Tag(String),
    Type(String),
    Status(String),
    Text(String),
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Query {
    pub components: Vec<QueryComponent>,
}

impl Query {
    /// Parse a raw query string. Total: anything unparseable degrades to a
    /// free-text component, and tokens left empty after prefix stripping
    /// are dropped.
    pub fn parse(input: &str) -> Self {
        let components = tokenize(input)
            .into_iter()
            .filter_map(classify)
            .collect();
        Self { components }
    }

    pub fn is_empty(&self) -> bool {
        self.components.is_empty()
    }
}

fn tokenize(input: &str) -> Vec<String> {
    let mut tokens = Vec::new();
    let mut current = String::new();
    let mut quote: Option<char> = None;
    for ch in input.chars() {
        match quote {
            Some(q) if ch == q => quote = None,
            Some(_) => current.push(ch),
            None if ch == '\'' || ch == '"' => quote = Some(ch),
            None if ch.is_whitespace() => {
                if !current.is_empty() {
                    tokens.push(std::mem::take(&mut current));
                }
            }
            None => current.push(ch),
        }
    }
    if !current.is_empty() {
        tokens.push(current);
    }
    tokens
}

fn classify(token: String) -> Option<QueryComponent> {
    // "tags:" before "tag:", which is a prefix of it
    let component = if let Some(value) = token.strip_prefix("tags:") {
        QueryComponent::Tag(value.to_string())
    } else if let Some(value) = token.strip_prefix("tag:") {
        QueryComponent::Tag(value.to_string())
    } else if let Some(value) = token.strip_prefix("type:") {
        QueryComponent::Type(value.to_string())
    } else if let Some(value) = token.strip_prefix("status:") {
        QueryComponent::Status(value.to_string())
    } else {
        QueryComponent::Text(token)
    };
    match &component {
        QueryComponent::Tag(v)
        | QueryComponent::Type(v)
        | QueryComponent::Status(v)
        | QueryComponent::Text(v) => {
            if v.is_empty() {
                return None;
            }
        }
    }
    Some(component)
}

#[derive(Debug, Clone, Serialize)]
pub struct SearchOptions {
    pub mode: MatchMode,
    /// Global result limit, `0` meaning unlimited.
    pub limit: usize,
    /// Characters of context kept on each side of a free-text match.
    pub context_radius: usize,
}

impl Default for SearchOptions {
    fn default() -> Self {
        Self {
            mode: MatchMode::default(),
            limit: 0,
            context_radius: 30,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum MatchField {
    Tag,
    Type,
    Status,
    Title,
    Notes,
}

/// Context window around a free-text match, pre-ellipsized for display.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Excerpt {
    pub before: String,
    pub matched: String,
    pub after: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FieldMatch {
    pub field: MatchField,
    pub excerpt: Option<Excerpt>,
}

#[derive(Debug, Clone, Serialize)]
pub struct SearchMatch {
    pub doc_id: String,
    pub doc_path: PathBuf,
    pub item: Item,
    pub matched_fields: Vec<FieldMatch>,
}

fn matches_str(mode: MatchMode, haystack: &str, needle: &str) -> bool {
    let haystack = haystack.to_lowercase();
    let needle = needle.to_lowercase();
    match mode {
        MatchMode::Full => haystack == needle,
        MatchMode::Starts => haystack.starts_with(&needle),
        MatchMode::Contains => haystack.contains(&needle),
    }
}

/// Match `needle` against the lowercase expansion of `hay[start..]`.
/// Returns the end byte offset in the original text. The match must
/// consume whole characters of the haystack.
fn match_at(hay: &[(usize, char)], start: usize, needle: &[char]) -> Option<usize> {
    let mut ni = 0;
    for &(byte, ch) in &hay[start..] {
        for low in ch.to_lowercase() {
            if ni >= needle.len() || low != needle[ni] {
                return None;
            }
            ni += 1;
        }
        if ni == needle.len() {
            return Some(byte + ch.len_utf8());
        }
    }
    None
}

/// Byte span of the first case-insensitive match of `needle` in
/// `haystack`, under the given mode.
fn match_span(mode: MatchMode, haystack: &str, needle: &str) -> Option<(usize, usize)> {
    if needle.is_empty() {
        return None;
    }
    let needle: Vec<char> = needle.to_lowercase().chars().collect();
    let hay: Vec<(usize, char)> = haystack.char_indices().collect();
    match mode {
        MatchMode::Full => match match_at(&hay, 0, &needle) {
            Some(end) if end == haystack.len() => Some((0, end)),
            _ => None,
        },
        MatchMode::Starts => match_at(&hay, 0, &needle).map(|end| (0, end)),
        MatchMode::Contains => (0..hay.len())
            .find_map(|start| match_at(&hay, start, &needle).map(|end| (hay[start].0, end))),
    }
}

fn build_excerpt(text: &str, start: usize, end: usize, radius: usize) -> Excerpt {
    let before_full = &text[..start];
    let after_full = &text[end..];

    let before_chars: Vec<char> = before_full.chars().collect();
    let before = if before_chars.len() > radius {
        let kept: String = before_chars[before_chars.len() - radius..].iter().collect();
        format!("…{}", kept)
    } else {
        before_full.to_string()
    };

    let after_chars: Vec<char> = after_full.chars().collect();
    let after = if after_chars.len() > radius {
        let kept: String = after_chars[..radius].iter().collect();
        format!("{}…", kept)
    } else {
        after_full.to_string()
    };

    Excerpt {
        before,
        matched: text[start..end].to_string(),
        after,
    }
}

fn component_match(item: &Item, component: &QueryComponent, opts: &SearchOptions) -> Option<FieldMatch> {
    match component {
        QueryComponent::Tag(value) => item
            .tags
            .iter()
            .any(|tag| matches_str(opts.mode, tag, value))
            .then_some(FieldMatch {
                field: MatchField::Tag,
                excerpt: None,
            }),
        QueryComponent::Type(value) => matches_str(opts.mode, &item.item_type, value)
            .then_some(FieldMatch {
                field: MatchField::Type,
                excerpt: None,
            }),
        QueryComponent::Status(value) => matches_str(opts.mode, &item.status, value)
            .then_some(FieldMatch {
                field: MatchField::Status,
                excerpt: None,
            }),
        QueryComponent::Text(value) => {
            // Title first, then notes; first match wins per item.
            if let Some((start, end)) = match_span(opts.mode, &item.title, value) {
                return Some(FieldMatch {
                    field: MatchField::Title,
                    excerpt: Some(build_excerpt(&item.title, start, end, opts.context_radius)),
                });
            }
            match_span(opts.mode, &item.notes, value).map(|(start, end)| FieldMatch {
                field: MatchField::Notes,
                excerpt: Some(build_excerpt(&item.notes, start, end, opts.context_radius)),
            })
        }
    }
}

fn search_into(
    doc: &Document,
    doc_path: &Path,
    query: &Query,
    opts: &SearchOptions,
    budget: &mut usize,
    out: &mut Vec<SearchMatch>,
) {
    if query.is_empty() {
        return;
    }
    for item in &doc.items {
        if *budget == 0 {
            return;
        }
        let mut matched_fields = Vec::with_capacity(query.components.len());
        let all_matched = query.components.iter().all(|component| {
            match component_match(item, component, opts) {
                Some(field) => {
                    matched_fields.push(field);
                    true
                }
                None => false,
            }
        });
        if all_matched {
            out.push(SearchMatch {
                doc_id: doc.doc_id.clone(),
                doc_path: doc_path.to_path_buf(),
                item: item.clone(),
                matched_fields,
            });
            *budget -= 1;
        }
    }
}

/// Scan one document's items in order, stopping at the result limit.
pub fn search_document(
    doc: &Document,
    doc_path: &Path,
    query: &Query,
    opts: &SearchOptions,
) -> Vec<SearchMatch> {
    let mut budget = if opts.limit == 0 { usize::MAX } else { opts.limit };
    let mut out = Vec::new();
    search_into(doc, doc_path, query, opts, &mut budget, &mut out);
    out
}

/// Parse the query once and scan documents in the order given, carrying
/// one shared remaining budget so the limit is global, not per-document.
pub fn search_documents(
    docs: &[(PathBuf, Document)],
    query_str: &str,
    opts: &SearchOptions,
) -> Vec<SearchMatch> {
    let query = Query::parse(query_str);
    let mut budget = if opts.limit == 0 { usize::MAX } else { opts.limit };
    let mut out = Vec::new();
    for (path, doc) in docs {
        if budget == 0 {
            break;
        }
        search_into(doc, path, &query, opts, &mut budget, &mut out);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::ItemDraft;
    use chrono::{TimeZone, Utc};

    fn item(id: &str, title: &str, status: &str, tags: &[&str], notes: &str) -> Item {
        Item::from_draft(
            ItemDraft {
                title: title.to_string(),
                item_type: "bug".to_string(),
                status: status.to_string(),
                tags: tags.iter().map(|t| t.to_string()).collect(),
                notes: notes.to_string(),
                ..Default::default()
            },
            id.to_string(),
            Utc.with_ymd_and_hms(2025, 1, 1, 0, 0, 0).unwrap(),
        )
    }

    fn doc_with_items(items: Vec<Item>) -> Document {
        let now = Utc.with_ymd_and_hms(2025, 1, 1, 0, 0, 0).unwrap();
        let mut doc = Document::new("REQ-20250101-app", "App", "app", now);
        for it in items {
            doc.push_item(it);
        }
        doc
    }

    #[test]
    fn parse_classifies_prefixes() {
        let query = Query::parse("tag:api tags:auth type:bug status:triage login rate:limit");
        assert_eq!(
            query.components,
            vec![
                QueryComponent::Tag("api".into()),
                QueryComponent::Tag("auth".into()),
                QueryComponent::Type("bug".into()),
                QueryComponent::Status("triage".into()),
                QueryComponent::Text("login".into()),
                QueryComponent::Text("rate:limit".into()),
            ]
        );
    }

    #[test]
    fn parse_honors_quotes() {
        let query = Query::parse(r#"tag:"api gateway" 'login button'"#);
        assert_eq!(
            query.components,
            vec![
                QueryComponent::Tag("api gateway".into()),
                QueryComponent::Text("login button".into()),
            ]
        );
    }

    #[test]
    fn parse_drops_empty_tokens() {
        assert!(Query::parse("").is_empty());
        assert!(Query::parse("   \t ").is_empty());
        assert!(Query::parse("tag: status:").is_empty());
    }

    #[test]
    fn empty_query_matches_nothing() {
        let doc = doc_with_items(vec![item("REQ-20250101-app-01", "Login", "", &[], "")]);
        let matches =
            search_documents(&[(PathBuf::from("a.md"), doc)], "   ", &SearchOptions::default());
        assert!(matches.is_empty());
    }

    #[test]
    fn components_are_and_combined() {
        let doc = doc_with_items(vec![
            item("REQ-20250101-app-01", "Unrelated", "done", &[], ""),
            item("REQ-20250101-app-02", "Other", "", &["api"], ""),
            item("REQ-20250101-app-03", "Login page", "done", &["api"], ""),
            item(
                "REQ-20250101-app-04",
                "Login broken",
                "triage",
                &["api", "web"],
                "",
            ),
        ]);
        let matches = search_document(
            &doc,
            Path::new("a.md"),
            &Query::parse("tag:api status:triage login"),
            &SearchOptions::default(),
        );
        assert_eq!(matches.len(), 1);
        assert_eq!(matches[0].item.id, "REQ-20250101-app-04");
        assert_eq!(matches[0].matched_fields.len(), 3);
    }

    #[test]
    fn matching_is_case_insensitive() {
        let doc = doc_with_items(vec![item("REQ-20250101-app-01", "Login", "", &[], "")]);
        let matches = search_document(
            &doc,
            Path::new("a.md"),
            &Query::parse("type:BUG"),
            &SearchOptions::default(),
        );
        assert_eq!(matches.len(), 1);
        assert_eq!(matches[0].matched_fields[0].field, MatchField::Type);
    }

    #[test]
    fn title_wins_over_notes() {
        let doc = doc_with_items(vec![item(
            "REQ-20250101-app-01",
            "Login page",
            "",
            &[],
            "login mentioned here too",
        )]);
        let matches = search_document(
            &doc,
            Path::new("a.md"),
            &Query::parse("login"),
            &SearchOptions::default(),
        );
        assert_eq!(matches[0].matched_fields[0].field, MatchField::Title);
    }

    #[test]
    fn match_modes_differ() {
        let doc = doc_with_items(vec![item("REQ-20250101-app-01", "x", "triaged", &[], "")]);
        let mk = |mode| SearchOptions {
            mode,
            ..Default::default()
        };
        let hit = |query: &str, mode| {
            !search_document(&doc, Path::new("a.md"), &Query::parse(query), &mk(mode)).is_empty()
        };

        assert!(!hit("status:triage", MatchMode::Full));
        assert!(hit("status:triaged", MatchMode::Full));
        assert!(hit("status:triage", MatchMode::Starts));
        assert!(!hit("status:riage", MatchMode::Starts));
        assert!(hit("status:riage", MatchMode::Contains));
    }

    #[test]
    fn excerpt_windows_are_bounded_with_ellipses() {
        let notes = format!("{}NEEDLE{}", "a".repeat(50), "b".repeat(50));
        let doc = doc_with_items(vec![item("REQ-20250101-app-01", "x", "", &[], &notes)]);
        let matches = search_document(
            &doc,
            Path::new("a.md"),
            &Query::parse("needle"),
            &SearchOptions::default(),
        );
        let excerpt = matches[0].matched_fields[0].excerpt.as_ref().unwrap();
        assert_eq!(excerpt.matched, "NEEDLE");
        assert_eq!(excerpt.before, format!("…{}", "a".repeat(30)));
        assert_eq!(excerpt.after, format!("{}…", "b".repeat(30)));
    }

    #[test]
    fn short_fields_are_not_ellipsized() {
        let doc = doc_with_items(vec![item("REQ-20250101-app-01", "fix login now", "", &[], "")]);
        let matches = search_document(
            &doc,
            Path::new("a.md"),
            &Query::parse("login"),
            &SearchOptions::default(),
        );
        let excerpt = matches[0].matched_fields[0].excerpt.as_ref().unwrap();
        assert_eq!(excerpt.before, "fix ");
        assert_eq!(excerpt.matched, "login");
        assert_eq!(excerpt.after, " now");
    }

    #[test]
    fn limit_is_shared_across_documents() {
        let doc_a = doc_with_items(vec![
            item("REQ-20250101-app-01", "login a", "", &[], ""),
            item("REQ-20250101-app-02", "login b", "", &[], ""),
        ]);
        let mut doc_b = Document::new(
            "REQ-20250102-app",
            "B",
            "app",
            Utc.with_ymd_and_hms(2025, 1, 2, 0, 0, 0).unwrap(),
        );
        doc_b.push_item(item("REQ-20250102-app-01", "login c", "", &[], ""));

        let docs = vec![
            (PathBuf::from("a.md"), doc_a),
            (PathBuf::from("b.md"), doc_b),
        ];
        let opts = SearchOptions {
            limit: 2,
            ..Default::default()
        };
        let matches = search_documents(&docs, "login", &opts);
        assert_eq!(matches.len(), 2);
        assert_eq!(matches[0].doc_path, PathBuf::from("a.md"));
        assert_eq!(matches[1].item.id, "REQ-20250101-app-02");

        let unlimited = search_documents(&docs, "login", &SearchOptions::default());
        assert_eq!(unlimited.len(), 3);
    }
}
