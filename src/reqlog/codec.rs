//! Canonical text encoding of a [`Document`].
//!
//! The on-disk format is a markdown file with a structured header (document
//! identity, timestamps, aggregated tags, item count, item index) followed
//! by one `###` block per item. The header's aggregate fields and the
//! whole `## Index` section are derived from the body: [`serialize`]
//! regenerates them every time and [`parse`] ignores them, so a stale
//! header can never leak into memory.
//!
//! `serialize` and `parse` are mutual inverses for any document this crate
//! produces, with empty optional fields normalized to omitted lines. Body
//! text lines that start with `#` or `\` are written with a leading
//! backslash so free text cannot be mistaken for structure.
//!
//! The grammar is the backward-compatibility contract for existing files.
//! Unknown header fields, unknown `##` sections and unknown `####`
//! subsections are skipped on parse, not rejected.

use chrono::{DateTime, Utc};
use thiserror::Error;

use crate::ids::{parse_doc_id, parse_item_id};
use crate::model::{Document, Item};

#[derive(Error, Debug)]
pub enum ParseError {
    /// The text has no header line carrying a valid document id. Used by
    /// directory listing to skip foreign files without failing the call.
    #[error("no request log document identifier found")]
    NotRequestLog,

    /// Recognizable as a request log document, but structurally broken.
    #[error("{0}")]
    Malformed(String),
}

fn malformed(reason: impl Into<String>) -> ParseError {
    ParseError::Malformed(reason.into())
}

/// Split a `**Key**: value` line into key and value.
fn parse_field(line: &str) -> Option<(&str, &str)> {
    let rest = line.strip_prefix("**")?;
    let (key, value) = rest.split_once("**:")?;
    Some((key, value.strip_prefix(' ').unwrap_or(value)))
}

fn is_heading(line: &str) -> bool {
    line.starts_with("## ") || line.starts_with("### ") || line.starts_with("#### ")
}

fn escape_body_line(line: &str, out: &mut String) {
    if line.starts_with('#') || line.starts_with('\\') {
        out.push('\\');
    }
    out.push_str(line);
    out.push('\n');
}

fn unescape_body_line(line: &str) -> &str {
    line.strip_prefix('\\').unwrap_or(line)
}

pub fn serialize(doc: &Document) -> String {
    let mut out = String::new();

    out.push_str(&format!("# {}\n\n", doc.title));
    out.push_str(&format!("**Document**: {}\n", doc.doc_id));
    if !doc.project_id.is_empty() {
        out.push_str(&format!("**Project**: {}\n", doc.project_id));
    }
    out.push_str(&format!("**Created**: {}\n", doc.created_at.to_rfc3339()));
    out.push_str(&format!("**Updated**: {}\n", doc.updated_at.to_rfc3339()));
    out.push_str(&format!("**Items**: {}\n", doc.items.len()));

    // Aggregates are recomputed from the body, never copied from the
    // possibly stale header fields.
    let mut tags: Vec<&str> = doc
        .items
        .iter()
        .flat_map(|item| item.tags.iter().map(String::as_str))
        .collect();
    tags.sort_unstable();
    tags.dedup();
    if !tags.is_empty() {
        out.push_str(&format!("**Tags**: {}\n", tags.join(", ")));
    }

    if doc.items.is_empty() {
        return out;
    }

    out.push_str("\n## Index\n\n");
    for item in &doc.items {
        out.push_str(&format!(
            "- {} [{}] {}\n",
            item.id, item.item_type, item.title
        ));
    }

    out.push_str("\n## Items\n");
    for item in &doc.items {
        serialize_item(item, &mut out);
    }

    out
}

fn serialize_item(item: &Item, out: &mut String) {
    out.push_str(&format!("\n### {}: {}\n\n", item.id, item.title));
    if !item.item_type.is_empty() {
        out.push_str(&format!("**Type**: {}\n", item.item_type));
    }
    if !item.domain.is_empty() {
        out.push_str(&format!("**Domain**: {}\n", item.domain));
    }
    if !item.priority.is_empty() {
        out.push_str(&format!("**Priority**: {}\n", item.priority));
    }
    if !item.status.is_empty() {
        out.push_str(&format!("**Status**: {}\n", item.status));
    }
    if !item.tags.is_empty() {
        out.push_str(&format!("**Tags**: {}\n", item.tags.join(", ")));
    }
    out.push_str(&format!("**Created**: {}\n", item.created_at.to_rfc3339()));

    if !item.context.is_empty() {
        out.push_str("\n#### Context\n\n");
        for line in item.context.lines() {
            escape_body_line(line, out);
        }
    }
    if !item.notes.is_empty() {
        out.push_str("\n#### Notes\n\n");
        for line in item.notes.lines() {
            escape_body_line(line, out);
        }
    }
}

pub fn parse(text: &str) -> Result<Document, ParseError> {
    // Recognizability comes first: without a valid document id anywhere in
    // the text this is some other markdown file, not a broken one of ours.
    let recognizable = text.lines().any(|line| {
        parse_field(line)
            .map(|(key, value)| key == "Document" && parse_doc_id(value).is_some())
            .unwrap_or(false)
    });
    if !recognizable {
        return Err(ParseError::NotRequestLog);
    }

    let lines: Vec<&str> = text.lines().collect();
    let mut pos = 0;

    // Title heading.
    while pos < lines.len() && lines[pos].trim().is_empty() {
        pos += 1;
    }
    let title = match lines.get(pos).and_then(|line| line.strip_prefix("# ")) {
        Some(rest) => rest.to_string(),
        None => return Err(malformed("missing title heading")),
    };
    pos += 1;

    // Header fields, up to the first section heading.
    let mut doc_id: Option<String> = None;
    let mut project_id = String::new();
    let mut created_at: Option<DateTime<Utc>> = None;
    let mut updated_at: Option<DateTime<Utc>> = None;
    while pos < lines.len() && !lines[pos].starts_with("## ") {
        if let Some((key, value)) = parse_field(lines[pos]) {
            match key {
                "Document" => {
                    if parse_doc_id(value).is_none() {
                        return Err(malformed(format!("invalid document id {:?}", value)));
                    }
                    doc_id = Some(value.to_string());
                }
                "Project" => project_id = value.to_string(),
                "Created" => created_at = Some(parse_timestamp("Created", value)?),
                "Updated" => updated_at = Some(parse_timestamp("Updated", value)?),
                // Items, Tags and anything unknown are regenerated or skipped.
                _ => {}
            }
        }
        pos += 1;
    }
    let doc_id = doc_id.ok_or_else(|| malformed("document id missing from header"))?;
    let created_at = created_at.ok_or_else(|| malformed("header missing **Created**"))?;
    let updated_at = updated_at.ok_or_else(|| malformed("header missing **Updated**"))?;

    // Sections. The index is derived state and skipped wholesale.
    let mut items: Vec<Item> = Vec::new();
    while pos < lines.len() {
        let line = lines[pos];
        if let Some(section) = line.strip_prefix("## ") {
            pos += 1;
            if section.trim() == "Items" {
                parse_items(&lines, &mut pos, &doc_id, &mut items)?;
            } else {
                while pos < lines.len() && !lines[pos].starts_with("## ") {
                    pos += 1;
                }
            }
        } else if line.trim().is_empty() {
            pos += 1;
        } else {
            return Err(malformed(format!("unexpected line outside sections: {:?}", line)));
        }
    }

    let mut doc = Document::new(doc_id, title, project_id, created_at);
    doc.updated_at = updated_at;
    doc.items = items;
    doc.rebuild_derived();
    Ok(doc)
}

fn parse_timestamp(key: &str, value: &str) -> Result<DateTime<Utc>, ParseError> {
    DateTime::parse_from_rfc3339(value)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| malformed(format!("invalid **{}** timestamp {:?}: {}", key, value, e)))
}

fn parse_items(
    lines: &[&str],
    pos: &mut usize,
    doc_id: &str,
    items: &mut Vec<Item>,
) -> Result<(), ParseError> {
    while *pos < lines.len() {
        let line = lines[*pos];
        if line.starts_with("## ") {
            return Ok(());
        }
        if line.trim().is_empty() {
            *pos += 1;
            continue;
        }
        let heading = line
            .strip_prefix("### ")
            .ok_or_else(|| malformed(format!("unexpected line in items section: {:?}", line)))?;
        let (id, title) = heading
            .split_once(": ")
            .map(|(id, title)| (id, title.to_string()))
            .unwrap_or((heading.trim_end_matches(':'), String::new()));
        let parsed = parse_item_id(id)
            .ok_or_else(|| malformed(format!("invalid item id {:?}", id)))?;
        if parsed.doc_id != doc_id {
            return Err(malformed(format!(
                "item {} does not belong to document {}",
                id, doc_id
            )));
        }
        *pos += 1;
        items.push(parse_item_block(lines, pos, id.to_string(), title)?);
    }
    Ok(())
}

fn parse_item_block(
    lines: &[&str],
    pos: &mut usize,
    id: String,
    title: String,
) -> Result<Item, ParseError> {
    let mut item_type = String::new();
    let mut domain = String::new();
    let mut priority = String::new();
    let mut status = String::new();
    let mut tags: Vec<String> = Vec::new();
    let mut context = String::new();
    let mut notes = String::new();
    let mut created_at: Option<DateTime<Utc>> = None;

    while *pos < lines.len() {
        let line = lines[*pos];
        if line.starts_with("## ") || line.starts_with("### ") {
            break;
        }
        if let Some(subsection) = line.strip_prefix("#### ") {
            *pos += 1;
            let body = capture_body(lines, pos);
            match subsection.trim() {
                "Context" => context = body,
                "Notes" => notes = body,
                _ => {}
            }
            continue;
        }
        if line.trim().is_empty() {
            *pos += 1;
            continue;
        }
        if let Some((key, value)) = parse_field(line) {
            match key {
                "Type" => item_type = value.to_string(),
                "Domain" => domain = value.to_string(),
                "Priority" => priority = value.to_string(),
                "Status" => status = value.to_string(),
                "Tags" => {
                    tags = value
                        .split(',')
                        .map(|tag| tag.trim().to_string())
                        .filter(|tag| !tag.is_empty())
                        .collect();
                }
                "Created" => created_at = Some(parse_timestamp("Created", value)?),
                _ => {}
            }
            *pos += 1;
            continue;
        }
        return Err(malformed(format!("unexpected line in item {}: {:?}", id, line)));
    }

    let created_at =
        created_at.ok_or_else(|| malformed(format!("item {} missing **Created**", id)))?;

    Ok(Item {
        id,
        title,
        item_type,
        domain,
        context,
        priority,
        status,
        tags,
        notes,
        created_at,
    })
}

/// Collect free-text lines until the next heading, trimming blank edges
/// and undoing the leading-backslash escape.
fn capture_body(lines: &[&str], pos: &mut usize) -> String {
    let mut body: Vec<&str> = Vec::new();
    while *pos < lines.len() && !is_heading(lines[*pos]) {
        body.push(unescape_body_line(lines[*pos]));
        *pos += 1;
    }
    while body.first().is_some_and(|line| line.trim().is_empty()) {
        body.remove(0);
    }
    while body.last().is_some_and(|line| line.trim().is_empty()) {
        body.pop();
    }
    body.join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::ItemDraft;
    use chrono::TimeZone;

    fn fixed_time(secs: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 7, 12, 8, 30, secs).unwrap()
    }

    fn sample_doc() -> Document {
        let now = fixed_time(0);
        let mut doc = Document::new("REQ-20250712-checkout", "Checkout capture", "checkout", now);
        doc.push_item(Item::from_draft(
            ItemDraft {
                title: "Card declined twice".into(),
                item_type: "bug".into(),
                domain: "payments".into(),
                context: "EU cards only.\nSeen on staging.".into(),
                priority: "high".into(),
                status: "triage".into(),
                tags: vec!["api".into(), "payments".into()],
                notes: "Repros with test card 4000 0000.".into(),
            },
            "REQ-20250712-checkout-01".into(),
            now,
        ));
        doc.push_item(Item::from_draft(
            ItemDraft {
                title: "Add retry metrics".into(),
                item_type: "task".into(),
                ..Default::default()
            },
            "REQ-20250712-checkout-02".into(),
            fixed_time(5),
        ));
        doc.updated_at = fixed_time(5);
        doc
    }

    #[test]
    fn round_trips_a_full_document() {
        let doc = sample_doc();
        let text = serialize(&doc);
        let parsed = parse(&text).unwrap();
        assert_eq!(parsed, doc);
    }

    #[test]
    fn round_trips_an_empty_document() {
        let doc = Document::new("REQ-20250712-checkout", "Checkout capture", "", fixed_time(0));
        let parsed = parse(&serialize(&doc)).unwrap();
        assert_eq!(parsed, doc);
    }

    #[test]
    fn round_trips_body_text_that_looks_like_structure() {
        let now = fixed_time(0);
        let mut doc = Document::new("REQ-20250712-app", "App", "app", now);
        doc.push_item(Item::from_draft(
            ItemDraft {
                title: "Tricky".into(),
                notes: "#### Notes\n### REQ-20250712-app-09: fake\n\\already escaped\nplain".into(),
                ..Default::default()
            },
            "REQ-20250712-app-01".into(),
            now,
        ));
        let parsed = parse(&serialize(&doc)).unwrap();
        assert_eq!(parsed.items[0].notes, doc.items[0].notes);
        assert_eq!(parsed, doc);
    }

    #[test]
    fn empty_optional_fields_are_omitted_and_normalized() {
        let doc = sample_doc();
        let text = serialize(&doc);
        // the second item carries no domain/priority/status/tags
        let second = text.split("### REQ-20250712-checkout-02").nth(1).unwrap();
        assert!(!second.contains("**Domain**"));
        assert!(!second.contains("**Tags**"));

        let parsed = parse(&text).unwrap();
        assert_eq!(parsed.items[1].domain, "");
        assert_eq!(parsed.items[1].tags, Vec::<String>::new());
    }

    #[test]
    fn header_aggregates_are_regenerated_not_trusted() {
        let mut text = serialize(&sample_doc());
        text = text.replace("**Items**: 2", "**Items**: 99");
        text = text.replace(
            "- REQ-20250712-checkout-02 [task] Add retry metrics",
            "- REQ-20250712-checkout-77 [junk] Stale index line",
        );
        let parsed = parse(&text).unwrap();
        assert_eq!(parsed.item_count, 2);
        assert_eq!(parsed.items_index[1].id, "REQ-20250712-checkout-02");
        assert_eq!(parsed.tags, vec!["api", "payments"]);
    }

    #[test]
    fn foreign_markdown_is_not_a_request_log() {
        let err = parse("# Meeting notes\n\nJust some prose.\n").unwrap_err();
        assert!(matches!(err, ParseError::NotRequestLog));

        let err = parse("").unwrap_err();
        assert!(matches!(err, ParseError::NotRequestLog));

        // A document field with an invalid id does not count.
        let err = parse("# X\n\n**Document**: REQ-20250231-app\n").unwrap_err();
        assert!(matches!(err, ParseError::NotRequestLog));
    }

    #[test]
    fn recognizable_but_broken_documents_are_malformed() {
        // No title heading.
        let err = parse("**Document**: REQ-20250712-app\n").unwrap_err();
        assert!(matches!(err, ParseError::Malformed(_)));

        // Bad timestamp.
        let text = "# X\n\n**Document**: REQ-20250712-app\n**Created**: yesterday\n**Updated**: 2025-07-12T08:30:00+00:00\n";
        let err = parse(text).unwrap_err();
        assert!(matches!(err, ParseError::Malformed(_)));

        // Garbage where an item heading should be.
        let text = serialize(&sample_doc()).replace(
            "### REQ-20250712-checkout-02: Add retry metrics",
            "random prose line",
        );
        let err = parse(&text).unwrap_err();
        assert!(matches!(err, ParseError::Malformed(_)));
    }

    #[test]
    fn items_must_belong_to_the_document() {
        let text = serialize(&sample_doc()).replace(
            "### REQ-20250712-checkout-02",
            "### REQ-20250712-other-02",
        );
        let err = parse(&text).unwrap_err();
        match err {
            ParseError::Malformed(reason) => assert!(reason.contains("does not belong")),
            other => panic!("expected Malformed, got {:?}", other),
        }
    }

    #[test]
    fn unknown_header_fields_and_sections_are_skipped() {
        let doc = sample_doc();
        let mut text = serialize(&doc);
        text = text.replace(
            "**Created**:",
            "**Reviewer**: someone\n**Created**:",
        );
        text.push_str("\n## Appendix\n\nfuture section\n");
        let parsed = parse(&text).unwrap();
        assert_eq!(parsed, doc);
    }
}
