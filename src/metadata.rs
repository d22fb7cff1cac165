//! Page metadata extraction from the opening `<html>` tag.
//!
//! Line 2 of every document carries the page-level attributes, in a fixed
//! order:
//!
//! ```text
//! <html flavour="ghtml" lang="en" canonical="https://…" title="…" header="…" description="…">
//! ```
//!
//! The tag is read by a small cursor-based scanner rather than one large
//! pattern, so a failure names the exact attribute that broke
//! ([`MetadataFault`]).
//!
//! ## Hard and Soft Failures
//!
//! - **Hard**: the tag cannot be parsed at all. No metadata is produced.
//! - **Soft**: every field parsed, but stray text surrounds the tag. The
//!   metadata is returned *together with* a [`MetadataError::StrayContent`]
//!   warning, see [`Flagged`].
//!
//! ## Attribute Values
//!
//! A value runs up to the `"` that precedes the next attribute, or the `">`
//! closing the tag, so `title="say "hi""` is read as `say "hi"`. Values must
//! be non-empty; `lang` must be exactly two lowercase ASCII letters.

use crate::compile::Flagged;
use serde::Serialize;
use std::fmt;
use thiserror::Error;

/// Attribute names of the opening tag, in the order they must appear.
pub const ATTRIBUTES: [&str; 6] = [
    "flavour",
    "lang",
    "canonical",
    "title",
    "header",
    "description",
];

const TAG_START: &str = "<html";
const FLAVOUR: &str = "ghtml";

/// Page-level attributes of one document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PageMetadata {
    /// Two lowercase letters, e.g. `en`.
    pub lang: String,
    pub canonical: String,
    pub title: String,
    pub header: String,
    pub description: String,
}

/// What exactly is wrong with an opening tag.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MetadataFault {
    MissingTag,
    UnexpectedFlavour(String),
    MissingAttribute(&'static str),
    UnterminatedAttribute(&'static str),
    EmptyAttribute(&'static str),
    InvalidLanguage(String),
    UnclosedTag,
}

impl fmt::Display for MetadataFault {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::MissingTag => write!(f, "no <html tag found"),
            Self::UnexpectedFlavour(found) => {
                write!(f, "flavour must be \"{FLAVOUR}\", found \"{found}\"")
            }
            Self::MissingAttribute(name) => write!(f, "missing or misplaced {name} attribute"),
            Self::UnterminatedAttribute(name) => write!(f, "unterminated {name} attribute"),
            Self::EmptyAttribute(name) => write!(f, "empty {name} attribute"),
            Self::InvalidLanguage(found) => {
                write!(f, "lang must be two lowercase letters, found \"{found}\"")
            }
            Self::UnclosedTag => write!(f, "tag is not closed with >"),
        }
    }
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum MetadataError {
    #[error(
        "file \"{path}\" does not appear to be a valid HTML file of G-HTML flavour ({fault} in opening <html> tag \"{line}\")"
    )]
    InvalidMetadataTag {
        path: String,
        line: String,
        fault: MetadataFault,
    },
    #[error(
        "file \"{path}\" has unexpected content before or after its opening <html> tag: \"{line}\""
    )]
    StrayContent {
        path: String,
        line: String,
        leading: String,
        trailing: String,
    },
}

/// Extract [`PageMetadata`] from the opening-tag line.
///
/// `path` is a diagnostic label only; it may be something like `<inline>`.
pub fn extract_metadata(
    line: &str,
    path: &str,
) -> Result<Flagged<PageMetadata, MetadataError>, MetadataError> {
    let start = line.find(TAG_START).ok_or_else(|| invalid(line, path, MetadataFault::MissingTag))?;
    let leading = &line[..start];
    let (metadata, trailing) =
        scan_tag(&line[start + TAG_START.len()..]).map_err(|fault| invalid(line, path, fault))?;

    if leading.is_empty() && trailing.is_empty() {
        Ok(Flagged::clean(metadata))
    } else {
        let warning = MetadataError::StrayContent {
            path: path.to_string(),
            line: line.to_string(),
            leading: leading.to_string(),
            trailing: trailing.to_string(),
        };
        Ok(Flagged::warned(metadata, warning))
    }
}

fn invalid(line: &str, path: &str, fault: MetadataFault) -> MetadataError {
    MetadataError::InvalidMetadataTag {
        path: path.to_string(),
        line: line.to_string(),
        fault,
    }
}

/// Scan the attributes following `<html`. Returns the metadata and whatever
/// follows the closing `>`.
fn scan_tag(rest: &str) -> Result<(PageMetadata, &str), MetadataFault> {
    let mut cursor = Cursor { rest };

    let flavour = cursor.attribute(0)?;
    if flavour != FLAVOUR {
        return Err(MetadataFault::UnexpectedFlavour(flavour.to_string()));
    }
    let lang = cursor.attribute(1)?;
    if !is_language_code(lang) {
        return Err(MetadataFault::InvalidLanguage(lang.to_string()));
    }
    let canonical = cursor.attribute(2)?;
    let title = cursor.attribute(3)?;
    let header = cursor.attribute(4)?;
    let description = cursor.attribute(5)?;

    let trailing = cursor
        .rest
        .strip_prefix('>')
        .ok_or(MetadataFault::UnclosedTag)?;

    let metadata = PageMetadata {
        lang: lang.to_string(),
        canonical: canonical.to_string(),
        title: title.to_string(),
        header: header.to_string(),
        description: description.to_string(),
    };
    Ok((metadata, trailing))
}

fn is_language_code(value: &str) -> bool {
    value.len() == 2 && value.bytes().all(|b| b.is_ascii_lowercase())
}

struct Cursor<'a> {
    rest: &'a str,
}

impl<'a> Cursor<'a> {
    /// Consume ` name="value"` for `ATTRIBUTES[index]` and return `value`.
    ///
    /// A value ends at the first `"` that is followed by the next attribute
    /// (or by `>` for the last one), so values may contain quotes. Without
    /// such a boundary the first `"` ends it.
    fn attribute(&mut self, index: usize) -> Result<&'a str, MetadataFault> {
        let name = ATTRIBUTES[index];
        let after = self
            .rest
            .strip_prefix(' ')
            .and_then(|r| r.strip_prefix(name))
            .and_then(|r| r.strip_prefix("=\""))
            .ok_or(MetadataFault::MissingAttribute(name))?;
        let boundary = match ATTRIBUTES.get(index + 1) {
            Some(next) => format!("\" {next}=\""),
            None => "\">".to_string(),
        };
        let end = after
            .find(&boundary)
            .or_else(|| after.find('"'))
            .ok_or(MetadataFault::UnterminatedAttribute(name))?;
        let value = &after[..end];
        if value.is_empty() {
            return Err(MetadataFault::EmptyAttribute(name));
        }
        self.rest = &after[end + 1..];
        Ok(value)
    }
}
