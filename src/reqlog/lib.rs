//! # Reqlog Architecture
//!
//! Reqlog is a **UI-agnostic capture-log library**. The CLI that ships in
//! this crate is one client of the library, not the other way round, and
//! the same core serves embedding applications directly.
//!
//! ## Layers
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │  CLI Layer (args.rs, wired by main.rs)                      │
//! │  - Parses arguments, formats output, handles terminal I/O   │
//! │  - The ONLY place that knows about stdout/stderr/exit codes │
//! └─────────────────────────────────────────────────────────────┘
//!                              │
//!                              ▼
//! ┌─────────────────────────────────────────────────────────────┐
//! │  API Layer (api.rs)                                         │
//! │  - Thin facade over the store and query engine              │
//! │  - Returns structured Result types                          │
//! └─────────────────────────────────────────────────────────────┘
//!                              │
//!                              ▼
//! ┌─────────────────────────────────────────────────────────────┐
//! │  Storage Layer (store/) + Codec (codec.rs)                  │
//! │  - Abstract DocStore trait                                  │
//! │  - FileStore (production), InMemoryStore (testing)          │
//! │  - codec owns the on-disk text format                      │
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Key invariants
//!
//! - Document and item identifiers ([`ids`]) are globally parseable and
//!   never collide under single-writer, append-only usage.
//! - [`codec`] serialize/parse round-trip exactly; derived header state
//!   (tag union, item count, item index) is regenerated, never trusted.
//! - The store keeps one backup slot per document, written only when an
//!   existing file is overwritten.
//! - [`query`] parsing is total; components AND-combine.
//!
//! From `api.rs` inward, code never writes to stdout/stderr, never calls
//! `std::process::exit`, and never assumes a terminal.
//!
//! ## Module Overview
//!
//! - [`api`]: The API facade—entry point for all operations
//! - [`model`]: Core data types (`Document`, `Item`, `ItemDraft`)
//! - [`ids`]: Identifier generation and parsing
//! - [`codec`]: Canonical text encoding of documents
//! - [`store`]: Storage abstraction and implementations
//! - [`query`]: Query language and matcher
//! - [`config`]: Configuration management
//! - [`error`]: Error types

pub mod api;
pub mod codec;
pub mod config;
pub mod error;
pub mod ids;
pub mod model;
pub mod query;
pub mod store;
