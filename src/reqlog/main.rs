use chrono::Utc;
use clap::Parser;
use colored::*;
use directories::ProjectDirs;
use reqlog::api::ReqlogApi;
use reqlog::config::ReqlogConfig;
use reqlog::error::{ReqlogError, Result};
use reqlog::model::{DocMeta, Document, ItemDraft};
use reqlog::query::{MatchField, MatchMode, SearchMatch, SearchOptions};
use reqlog::store::fs::FileStore;
use reqlog::store::SystemClock;
use std::path::PathBuf;
use unicode_width::UnicodeWidthStr;

mod args;
use args::{Cli, Commands};

fn main() {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    if let Err(e) = run() {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}

struct AppContext {
    api: ReqlogApi<FileStore>,
    dir: PathBuf,
    config: ReqlogConfig,
    config_dir: PathBuf,
    json: bool,
}

fn run() -> Result<()> {
    let cli = Cli::parse();
    let mut ctx = init_context(&cli)?;

    match cli.command {
        Commands::New { project, title } => handle_new(&mut ctx, project, title),
        Commands::Add {
            path,
            title,
            item_type,
            domain,
            priority,
            status,
            tags,
            context,
            notes,
        } => {
            let draft = ItemDraft {
                title,
                item_type: item_type.unwrap_or_default(),
                domain: domain.unwrap_or_default(),
                context: context.unwrap_or_default(),
                priority: priority.unwrap_or_default(),
                status: status.unwrap_or_default(),
                tags,
                notes: notes.unwrap_or_default(),
            };
            handle_add(&mut ctx, path, draft)
        }
        Commands::List => handle_list(&ctx),
        Commands::View { path } => handle_view(&ctx, path),
        Commands::Search { terms, mode, limit } => handle_search(&ctx, terms, mode, limit),
        Commands::Backup { path } => handle_backup(&mut ctx, path),
        Commands::Check { path } => handle_check(&ctx, path),
        Commands::Config { key, value } => handle_config(&mut ctx, key, value),
    }
}

/// Config and data directories. `REQLOG_HOME` overrides both, which is how
/// the integration tests keep the binary away from the real home.
fn app_dirs() -> (PathBuf, PathBuf) {
    if let Ok(home) = std::env::var("REQLOG_HOME") {
        let home = PathBuf::from(home);
        return (home.clone(), home);
    }
    match ProjectDirs::from("com", "reqlog", "reqlog") {
        Some(dirs) => (
            dirs.config_dir().to_path_buf(),
            dirs.data_dir().to_path_buf(),
        ),
        None => (PathBuf::from("."), PathBuf::from(".")),
    }
}

fn init_context(cli: &Cli) -> Result<AppContext> {
    let (config_dir, data_dir) = app_dirs();
    let config = ReqlogConfig::load(&config_dir).unwrap_or_default();

    let base_dir = if config.base_dir.as_os_str().is_empty() {
        data_dir
    } else {
        config.base_dir.clone()
    };
    let dir = cli.dir.clone().unwrap_or_else(|| base_dir.clone());
    let api = ReqlogApi::new(FileStore::new(base_dir));

    Ok(AppContext {
        api,
        dir,
        config,
        config_dir,
        json: cli.json,
    })
}

fn handle_new(ctx: &mut AppContext, project: String, title: Option<String>) -> Result<()> {
    let dir = ctx.dir.clone();
    let (path, doc) = ctx
        .api
        .create(&dir, &project, title.as_deref().unwrap_or(""), &SystemClock)?;
    if ctx.json {
        println!("{}", serde_json::to_string_pretty(&doc)?);
    } else {
        println!("{} {}", "Created".green(), path.display());
    }
    Ok(())
}

fn handle_add(ctx: &mut AppContext, path: PathBuf, draft: ItemDraft) -> Result<()> {
    if draft.title.is_empty() {
        return Err(ReqlogError::InvalidInput("item title cannot be empty".into()));
    }
    let doc = ctx.api.append(&path, draft, &SystemClock)?;
    if ctx.json {
        println!("{}", serde_json::to_string_pretty(&doc)?);
        return Ok(());
    }
    match doc.items.last() {
        Some(item) => println!("{} {} ({})", "Added".green(), item.id, path.display()),
        None => println!("{} {}", "Added to".green(), path.display()),
    }
    Ok(())
}

fn handle_list(ctx: &AppContext) -> Result<()> {
    let metas = ctx.api.list(&ctx.dir)?;
    if ctx.json {
        println!("{}", serde_json::to_string_pretty(&metas)?);
    } else {
        print_metas(&metas);
    }
    Ok(())
}

fn handle_view(ctx: &AppContext, path: PathBuf) -> Result<()> {
    let doc = ctx.api.read(&path)?;
    if ctx.json {
        println!("{}", serde_json::to_string_pretty(&doc)?);
    } else {
        print_document(&doc);
    }
    Ok(())
}

fn handle_search(ctx: &AppContext, terms: Vec<String>, mode: String, limit: usize) -> Result<()> {
    let mode: MatchMode = mode
        .parse()
        .map_err(ReqlogError::InvalidInput)?;
    let opts = SearchOptions {
        mode,
        limit,
        context_radius: ctx.config.excerpt_radius,
    };
    // Shell quoting already grouped multi-word terms into single argv
    // entries; re-quote those so the query tokenizer keeps them together.
    let query = terms
        .iter()
        .map(|term| {
            if term.chars().any(char::is_whitespace) {
                format!("\"{}\"", term)
            } else {
                term.clone()
            }
        })
        .collect::<Vec<_>>()
        .join(" ");
    let matches = ctx.api.search(&ctx.dir, &query, &opts)?;
    if ctx.json {
        println!("{}", serde_json::to_string_pretty(&matches)?);
    } else {
        print_matches(&matches);
    }
    Ok(())
}

fn handle_backup(ctx: &mut AppContext, path: PathBuf) -> Result<()> {
    let backup = ctx.api.backup(&path)?;
    println!("{} {}", "Backed up to".green(), backup.display());
    Ok(())
}

fn handle_check(ctx: &AppContext, path: PathBuf) -> Result<()> {
    let writable = ctx.api.is_writable(&path);
    if ctx.json {
        println!(
            "{}",
            serde_json::json!({ "path": path, "writable": writable })
        );
    } else if writable {
        println!("{} is writable", path.display());
    } else {
        println!("{} is {}", path.display(), "not writable".red());
    }
    Ok(())
}

fn handle_config(ctx: &mut AppContext, key: Option<String>, value: Option<String>) -> Result<()> {
    match (key.as_deref(), value) {
        (None, _) => {
            println!("base-dir = {}", ctx.config.base_dir.display());
            println!("excerpt-radius = {}", ctx.config.excerpt_radius);
        }
        (Some("base-dir"), None) => println!("base-dir = {}", ctx.config.base_dir.display()),
        (Some("base-dir"), Some(v)) => {
            ctx.config.base_dir = PathBuf::from(v);
            ctx.config.save(&ctx.config_dir)?;
            println!("base-dir = {}", ctx.config.base_dir.display());
        }
        (Some("excerpt-radius"), None) => {
            println!("excerpt-radius = {}", ctx.config.excerpt_radius)
        }
        (Some("excerpt-radius"), Some(v)) => {
            let radius: usize = v.parse().map_err(|_| {
                ReqlogError::InvalidInput(format!("excerpt-radius must be a number, got {:?}", v))
            })?;
            ctx.config.excerpt_radius = radius;
            ctx.config.save(&ctx.config_dir)?;
            println!("excerpt-radius = {}", ctx.config.excerpt_radius);
        }
        (Some(other), _) => println!("Unknown config key: {}", other),
    }
    Ok(())
}

const LINE_WIDTH: usize = 100;
const TIME_WIDTH: usize = 14;

fn print_metas(metas: &[DocMeta]) {
    if metas.is_empty() {
        println!("No documents found.");
        return;
    }

    let id_width = metas.iter().map(|m| m.doc_id.width()).max().unwrap_or(0);
    for meta in metas {
        let id_padding = id_width.saturating_sub(meta.doc_id.width());
        let count = format!("{:>2} items", meta.item_count);
        let time_ago = format_time_ago(meta.updated_at);

        let fixed = id_width + 2 + count.width() + 2 + TIME_WIDTH;
        let available = LINE_WIDTH.saturating_sub(fixed);
        let title = truncate_to_width(&meta.title, available);
        let title_padding = available.saturating_sub(title.width());

        println!(
            "{}{}  {}{}  {} {}",
            meta.doc_id.yellow(),
            " ".repeat(id_padding),
            title,
            " ".repeat(title_padding),
            count.dimmed(),
            time_ago.dimmed()
        );
    }
}

fn print_document(doc: &Document) {
    println!("{} {}", doc.doc_id.yellow(), doc.title.bold());
    if !doc.project_id.is_empty() {
        println!("{}", format!("project: {}", doc.project_id).dimmed());
    }
    if !doc.tags.is_empty() {
        println!("{}", format!("tags: {}", doc.tags.join(", ")).dimmed());
    }
    println!(
        "{}",
        format!(
            "{} item{}, updated {}",
            doc.item_count,
            if doc.item_count == 1 { "" } else { "s" },
            format_time_ago(doc.updated_at).trim_start()
        )
        .dimmed()
    );

    for item in &doc.items {
        println!();
        println!("{} {}", item.id.yellow(), item.title.bold());

        let classification: Vec<String> = [
            ("type", &item.item_type),
            ("domain", &item.domain),
            ("priority", &item.priority),
            ("status", &item.status),
        ]
        .iter()
        .filter(|(_, value)| !value.is_empty())
        .map(|(name, value)| format!("{}: {}", name, value))
        .collect();
        if !classification.is_empty() {
            println!("    {}", classification.join("  ").dimmed());
        }
        if !item.tags.is_empty() {
            println!("    {}", format!("tags: {}", item.tags.join(", ")).dimmed());
        }
        if !item.context.is_empty() {
            for line in item.context.lines() {
                println!("    {}", line);
            }
        }
        if !item.notes.is_empty() {
            for line in item.notes.lines() {
                println!("    {}", line);
            }
        }
    }
}

fn field_name(field: MatchField) -> &'static str {
    match field {
        MatchField::Tag => "tag",
        MatchField::Type => "type",
        MatchField::Status => "status",
        MatchField::Title => "title",
        MatchField::Notes => "notes",
    }
}

fn print_matches(matches: &[SearchMatch]) {
    if matches.is_empty() {
        println!("No matches.");
        return;
    }

    for m in matches {
        println!(
            "{} {} {}",
            m.item.id.yellow(),
            m.item.title.bold(),
            format!("({})", m.doc_path.display()).dimmed()
        );
        for fm in &m.matched_fields {
            match &fm.excerpt {
                Some(excerpt) => println!(
                    "    {}: {}{}{}",
                    field_name(fm.field),
                    excerpt.before.dimmed(),
                    excerpt.matched.bold(),
                    excerpt.after.dimmed()
                ),
                None => println!("    {}", format!("matched {}", field_name(fm.field)).dimmed()),
            }
        }
    }
}

fn truncate_to_width(s: &str, max_width: usize) -> String {
    use unicode_width::UnicodeWidthChar;

    let mut result = String::new();
    let mut current_width = 0;

    for c in s.chars() {
        let char_width = c.width().unwrap_or(0);
        if current_width + char_width > max_width.saturating_sub(1) {
            result.push('…');
            return result;
        }
        result.push(c);
        current_width += char_width;
    }

    result
}

fn format_time_ago(timestamp: chrono::DateTime<Utc>) -> String {
    let now = Utc::now();
    let duration = now.signed_duration_since(timestamp);

    let formatter = timeago::Formatter::new();
    let time_str = formatter.convert(duration.to_std().unwrap_or_default());

    format!("{:>width$}", time_str, width = TIME_WIDTH)
}
