use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "reqlog")]
#[command(version)]
#[command(about = "File-based capture log for bug reports, enhancements and tasks", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Directory holding the documents (defaults to the configured base directory)
    #[arg(short, long, global = true)]
    pub dir: Option<PathBuf>,

    /// Print results as JSON instead of formatted text
    #[arg(long, global = true)]
    pub json: bool,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Create a new document for a project
    #[command(alias = "n")]
    New {
        /// Project identifier (slugged into the document id)
        project: String,

        /// Document title (defaults to the project identifier)
        #[arg(short, long)]
        title: Option<String>,
    },

    /// Append an item to an existing document
    #[command(alias = "a")]
    Add {
        /// Path to the document file (a leading ~ expands to the base directory)
        path: PathBuf,

        /// Item title
        #[arg(short, long)]
        title: String,

        /// Item type (e.g. bug, enhancement, task)
        #[arg(short = 'T', long = "type")]
        item_type: Option<String>,

        /// Affected domain
        #[arg(long)]
        domain: Option<String>,

        /// Priority
        #[arg(short, long)]
        priority: Option<String>,

        /// Status
        #[arg(short, long)]
        status: Option<String>,

        /// Tag, repeatable
        #[arg(long = "tag")]
        tags: Vec<String>,

        /// Where/how the request came up
        #[arg(short, long)]
        context: Option<String>,

        /// Free-form notes
        #[arg(long)]
        notes: Option<String>,
    },

    /// List the documents in a directory
    #[command(alias = "ls")]
    List,

    /// Print one document
    #[command(alias = "v")]
    View {
        /// Path to the document file
        path: PathBuf,
    },

    /// Search items across the documents in a directory
    Search {
        /// Query terms (tag:x, type:x, status:x, free text; quotes group words)
        #[arg(required = true, num_args = 1..)]
        terms: Vec<String>,

        /// Comparison mode: full, starts or contains
        #[arg(short, long, default_value = "contains")]
        mode: String,

        /// Stop after this many matches across all documents (0 = unlimited)
        #[arg(short, long, default_value_t = 0)]
        limit: usize,
    },

    /// Copy a document into its backup slot
    Backup {
        /// Path to the document file
        path: PathBuf,
    },

    /// Check whether a path could be written
    Check {
        /// Path to probe (the file does not have to exist)
        path: PathBuf,
    },

    /// Get or set configuration
    Config {
        /// Configuration key (base-dir, excerpt-radius)
        key: Option<String>,

        /// Value to set (if omitted, prints current value)
        value: Option<String>,
    },
}
