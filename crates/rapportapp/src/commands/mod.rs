//! # Command Layer
//!
//! The business operations of the Rapport-Tool, composed from the stores.
//! Each command lives in its own submodule as plain async functions.
//!
//! ## Role and Responsibilities
//!
//! Commands:
//! - Validate input before anything is persisted
//! - Hold the collection lock around their read-modify-write spans
//! - Return structured [`CmdResult`]s, never strings for a terminal
//!
//! They take the current user and the current time as arguments. Nothing in
//! here reads a clock, a session or an environment variable, which keeps the
//! tests deterministic.
//!
//! ## Command Modules
//!
//! - [`init`]: Resolve the namespace, report the backend in use
//! - [`reports`]: Create, list and show reports
//! - [`photos`]: Attach a photo to a report's next free slot
//! - [`massnahmen`]: Remediation notes of a report
//! - [`users`]: Seed accounts, authenticate, list users

use crate::model::Row;
use serde::Serialize;

pub mod init;
pub mod massnahmen;
pub mod photos;
pub mod reports;
pub mod users;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageLevel {
    Info,
    Success,
    Warning,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CmdMessage {
    pub level: MessageLevel,
    pub content: String,
}

impl CmdMessage {
    pub fn info(content: impl Into<String>) -> Self {
        Self {
            level: MessageLevel::Info,
            content: content.into(),
        }
    }

    pub fn success(content: impl Into<String>) -> Self {
        Self {
            level: MessageLevel::Success,
            content: content.into(),
        }
    }

    pub fn warning(content: impl Into<String>) -> Self {
        Self {
            level: MessageLevel::Warning,
            content: content.into(),
        }
    }
}

/// Structured outcome of a command.
///
/// - `affected_rows`: rows the command created or changed
/// - `listed_rows`: rows to display
/// - `messages`: what happened, for the client to render
#[derive(Debug, Default, Clone, Serialize)]
pub struct CmdResult {
    pub affected_rows: Vec<Row>,
    pub listed_rows: Vec<Row>,
    pub messages: Vec<CmdMessage>,
}

impl CmdResult {
    pub fn add_message(&mut self, message: CmdMessage) {
        self.messages.push(message);
    }

    pub fn with_affected_rows(mut self, rows: Vec<Row>) -> Self {
        self.affected_rows = rows;
        self
    }

    pub fn with_listed_rows(mut self, rows: Vec<Row>) -> Self {
        self.listed_rows = rows;
        self
    }
}
