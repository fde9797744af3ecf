//! Minimal PIM parsing: just enough to find an item's uid and modification time.
//!
//! Content is never rewritten; the parsed item carries it verbatim.

mod parser;
mod timestamp;

pub use parser::{parse_calendar, parse_tasks, parse_vcard};
pub use timestamp::parse_timestamp;

use thiserror::Error;

use crate::models::CollectionType;

/// A contact, event or task reduced to what migration needs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PimItem {
    /// `None` when the content has no usable UID property
    pub uid: Option<String>,
    /// Raw last-modified value (`REV` or `LAST-MODIFIED`)
    pub last_modified: Option<String>,
    pub content: String,
}

impl PimItem {
    /// Last-modified time in Unix ms, when present and parseable.
    #[must_use]
    pub fn mtime(&self) -> Option<i64> {
        self.last_modified.as_deref().and_then(parse_timestamp)
    }
}

/// Reasons content could not be read as the expected item type
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ParseError {
    #[error("content is empty")]
    Empty,

    #[error("expected BEGIN:{0}")]
    UnexpectedStart(&'static str),

    #[error("no {0} component found")]
    MissingComponent(&'static str),

    #[error("component {0} is not terminated")]
    Unterminated(String),
}

/// Parser plugin for one collection type.
pub trait PimParser {
    fn collection_type(&self) -> CollectionType;

    fn parse(&self, content: &str) -> Result<PimItem, ParseError>;
}

#[derive(Debug, Clone, Copy)]
struct VCardParser;

#[derive(Debug, Clone, Copy)]
struct EventParser;

#[derive(Debug, Clone, Copy)]
struct TaskParser;

impl PimParser for VCardParser {
    fn collection_type(&self) -> CollectionType {
        CollectionType::AddressBook
    }

    fn parse(&self, content: &str) -> Result<PimItem, ParseError> {
        parse_vcard(content)
    }
}

impl PimParser for EventParser {
    fn collection_type(&self) -> CollectionType {
        CollectionType::Calendar
    }

    fn parse(&self, content: &str) -> Result<PimItem, ParseError> {
        parse_calendar(content)
    }
}

impl PimParser for TaskParser {
    fn collection_type(&self) -> CollectionType {
        CollectionType::Tasks
    }

    fn parse(&self, content: &str) -> Result<PimItem, ParseError> {
        parse_tasks(content)
    }
}

/// Parser for the given collection type.
#[must_use]
pub fn parser_for(kind: CollectionType) -> &'static dyn PimParser {
    match kind {
        CollectionType::AddressBook => &VCardParser,
        CollectionType::Calendar => &EventParser,
        CollectionType::Tasks => &TaskParser,
    }
}
