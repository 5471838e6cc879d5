//! Identifier scheme for documents and items.
//!
//! Document ids look like `REQ-20250712-checkout`, item ids append a
//! zero-padded two-digit number: `REQ-20250712-checkout-01`. Parsing is
//! total (returns `Option`) so callers can use it as a filter predicate;
//! generation validates its inputs and fails with `InvalidInput`.

use chrono::NaiveDate;
use once_cell::sync::Lazy;
use regex::Regex;

use crate::error::{ReqlogError, Result};
use crate::model::Item;

pub const DOC_ID_PREFIX: &str = "REQ";

static DOC_ID_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^REQ-(\d{4})(\d{2})(\d{2})-([a-z0-9]+(?:-[a-z0-9]+)*)$").unwrap());

static ITEM_ID_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^(REQ-\d{8}-[a-z0-9]+(?:-[a-z0-9]+)*)-(\d{2})$").unwrap());

/// A successfully parsed document id.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedDocId {
    pub date: NaiveDate,
    pub slug: String,
}

/// A successfully parsed item id.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedItemId {
    pub doc_id: String,
    pub number: u8,
}

/// Normalize free text into a slug: lowercase, whitespace/underscore runs
/// become a single hyphen, everything outside `[a-z0-9-]` is stripped,
/// repeated hyphens collapse, leading/trailing hyphens are trimmed.
/// May return an empty string.
pub fn slugify(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut pending_hyphen = false;
    for ch in text.to_lowercase().chars() {
        if ch.is_whitespace() || ch == '_' || ch == '-' {
            pending_hyphen = true;
        } else if ch.is_ascii_alphanumeric() {
            if pending_hyphen && !out.is_empty() {
                out.push('-');
            }
            pending_hyphen = false;
            out.push(ch);
        }
        // anything else is stripped without starting or ending a run
    }
    out
}

/// Neutralize user text before it is embedded in a filesystem path.
///
/// Strips control characters, path separators and `..` sequences, then
/// applies [`slugify`]. The output never contains a separator or a
/// traversal token.
pub fn sanitize_path_segment(text: &str) -> String {
    let cleaned: String = text
        .chars()
        .filter(|c| !c.is_control() && *c != '/' && *c != '\\')
        .collect();
    slugify(&cleaned.replace("..", ""))
}

pub fn generate_doc_id(project: &str, date: NaiveDate) -> Result<String> {
    let slug = slugify(project);
    if slug.is_empty() {
        return Err(ReqlogError::InvalidInput(format!(
            "project identifier {:?} yields an empty slug",
            project
        )));
    }
    Ok(format!(
        "{}-{}-{}",
        DOC_ID_PREFIX,
        date.format("%Y%m%d"),
        slug
    ))
}

pub fn generate_item_id(doc_id: &str, n: u8) -> Result<String> {
    if parse_doc_id(doc_id).is_none() {
        return Err(ReqlogError::InvalidInput(format!(
            "{:?} is not a valid document id",
            doc_id
        )));
    }
    if !(1..=99).contains(&n) {
        return Err(ReqlogError::InvalidInput(format!(
            "item number {} is outside 1..=99",
            n
        )));
    }
    Ok(format!("{}-{:02}", doc_id, n))
}

/// Parse a document id. Returns `None` on any mismatch, including
/// calendar-invalid dates such as February 31st.
pub fn parse_doc_id(id: &str) -> Option<ParsedDocId> {
    let caps = DOC_ID_RE.captures(id)?;
    let year: i32 = caps[1].parse().ok()?;
    let month: u32 = caps[2].parse().ok()?;
    let day: u32 = caps[3].parse().ok()?;
    let date = NaiveDate::from_ymd_opt(year, month, day)?;
    Some(ParsedDocId {
        date,
        slug: caps[4].to_string(),
    })
}

/// Parse an item id. Returns `None` on any mismatch; the embedded
/// document id must itself be valid.
pub fn parse_item_id(id: &str) -> Option<ParsedItemId> {
    let caps = ITEM_ID_RE.captures(id)?;
    let doc_id = caps[1].to_string();
    parse_doc_id(&doc_id)?;
    let number: u8 = caps[2].parse().ok()?;
    if number == 0 {
        return None;
    }
    Some(ParsedItemId { doc_id, number })
}

/// Next free item number for an append: max of the parseable item-id
/// numbers plus one, or 1 when nothing parses. Guarantees uniqueness under
/// single-writer append-only usage, not contiguity.
pub fn next_item_number(items: &[Item]) -> u8 {
    items
        .iter()
        .filter_map(|item| parse_item_id(&item.id))
        .map(|parsed| parsed.number)
        .max()
        .map(|max| max + 1)
        .unwrap_or(1)
}
