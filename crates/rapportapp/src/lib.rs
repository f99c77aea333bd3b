//! # Rapport Architecture
//!
//! `rapportapp` is the storage core of the Rapport-Tool, a small
//! incident-reporting tool: users file reports ("Meldungen") with up to three
//! photos and attach remediation notes ("Massnahmen") to them.
//!
//! The data lives in plain files, either on local disk or in a folder on a
//! remote file host, and the library makes that look like a small record
//! store. It is UI-agnostic: the bundled `rapport` binary is one client, an
//! HTTP server would be another.
//!
//! ## Layers
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │  Client (CLI, HTTP handlers, ...)                           │
//! │  - Parses input, authenticates, renders output              │
//! └─────────────────────────────────────────────────────────────┘
//!                              │
//!                              ▼
//! ┌─────────────────────────────────────────────────────────────┐
//! │  API Layer (api.rs)                                         │
//! │  - Thin facade over commands and storage primitives         │
//! └─────────────────────────────────────────────────────────────┘
//!                              │
//!                              ▼
//! ┌─────────────────────────────────────────────────────────────┐
//! │  Command Layer (commands/*.rs)                              │
//! │  - Validation, identifiers, slot bookkeeping, locking       │
//! └─────────────────────────────────────────────────────────────┘
//!                              │
//!                              ▼
//! ┌─────────────────────────────────────────────────────────────┐
//! │  Storage Layer (store/, photo.rs, ident.rs)                 │
//! │  - StorageBackend trait: FsBackend, DriveBackend, MemBackend│
//! │  - Namespace resolver, record store, document store         │
//! │  - Photo pipeline, identifier generator                     │
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## On-Disk Layout
//!
//! ```text
//! <root>/
//! ├── DB/      users.json  rapporte.json  massnahmen.json  meldungen.json
//! ├── MELD/    250101-000.json  250101-001.json  ...
//! └── FOTOS/   250101-000-1a2b3c4d.jpg  250101-000-m-5e6f7a8b.jpg  ...
//! ```
//!
//! Collections are JSON arrays; with the CSV mirror on, each gets a `.csv`
//! twin. Every report has a detail document in `MELD/` and an entry in the
//! `meldungen` index; the two are reconciled on every save.
//!
//! ## Consistency Model
//!
//! - Every read goes to the backend; collection contents are never cached.
//! - Writes replace whole files. A document save and its index update are two
//!   writes; a failure in between leaves the document ahead of the index
//!   until the next save of that report.
//! - Read-modify-write spans hold a per-collection lock. This serializes
//!   writers inside one process, not across processes.
//!
//! ## Asynchrony
//!
//! Every storage operation is `async` and may suspend on disk or network
//! I/O. Image decoding and encoding run on the blocking thread pool.
//!
//! ## Module Overview
//!
//! - [`api`]: The facade clients talk to
//! - [`commands`]: Business operations
//! - [`store`]: Backends and the record and document stores
//! - [`photo`]: Photo normalization and storage
//! - [`ident`]: Report identifier generation
//! - [`model`]: Rows, collections, identifiers
//! - [`config`]: Layered configuration
//! - [`error`]: Error types

pub mod api;
pub mod commands;
pub mod config;
pub mod error;
pub mod ident;
pub mod model;
pub mod photo;
pub mod store;

#[cfg(any(test, feature = "test_utils"))]
pub mod test_utils;

pub use api::RapportApi;
pub use config::RapportConfig;
pub use error::{RapportError, Result, ValidationError};
