//! Document model and envelope validation.
//!
//! A G-HTML document is plain text with a fixed envelope around its content:
//!
//! ```text
//! <!DOCTYPE ghtml-v0.1 "home">                     ← line 1: dialect marker
//! <html flavour="ghtml" lang="en" canonical="…" …> ← line 2: page metadata
//! Hello world                                      ← lines 3..N-1: content
//! </html>                                          ← line N: closing tag
//! ```
//!
//! Every line between the two header lines and the closing tag is a
//! *meaningful* line. A document needs at least one of them.
//!
//! ## Line Splitting
//!
//! Lines are split on `\n`, and a `\r` preceding a `\n` is dropped. A single
//! trailing newline directly after `</html>` is ignored, so files saved by
//! ordinary editors end with `</html>` as their last line. Any other trailing
//! newline leaves an empty last line, which fails the closing-tag check.
//!
//! ## Check Order
//!
//! [`validate`] checks the DOCTYPE first, then the opening tag, then the
//! meaningful-line count, then the closing tag. A broken DOCTYPE is therefore
//! reported as such no matter what the rest of the document looks like.

use serde::Serialize;
use thiserror::Error;

/// Every G-HTML v0 DOCTYPE starts with this.
pub const DOCTYPE_PREFIX: &str = "<!DOCTYPE ghtml-v0.";
/// Every G-HTML opening tag starts with this.
pub const OPENING_TAG_PREFIX: &str = "<html flavour=\"ghtml\" lang=\"";
/// The last line of every document.
pub const CLOSING_TAG: &str = "</html>";
/// DOCTYPE, opening tag and closing tag.
pub const ENVELOPE_LINES: usize = 3;
/// 1-based number of the first content line.
pub const FIRST_CONTENT_LINE: usize = 3;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum StructureError {
    #[error(
        "file \"{path}\" does not appear to be a valid G-HTML v0 file (missing, wrong-versioned, or invalid DOCTYPE declaration - found \"{line}\" on line #1 instead)"
    )]
    MalformedDoctype { path: String, line: String },
    #[error(
        "file \"{path}\" does not appear to be a valid HTML file of G-HTML flavour (missing, misattributed, or invalid opening <html> tag - found \"{line}\" on line #2 instead)"
    )]
    MalformedOpeningTag { path: String, line: String },
    #[error(
        "file \"{path}\" does not appear to be a valid HTML file (missing or invalid closing </html> tag - found \"{line}\" on line #{line_number}, the last one, instead)"
    )]
    MalformedClosingTag {
        path: String,
        line_number: usize,
        line: String,
    },
    #[error(
        "file \"{path}\" does not appear to have any content (got {meaningful} meaningful lines after discounting the DOCTYPE, opening and closing tags)"
    )]
    EmptyDocument { path: String, meaningful: isize },
}

impl StructureError {
    /// 1-based line number the error points at, if it points at one.
    pub fn line_number(&self) -> Option<usize> {
        match self {
            Self::MalformedDoctype { .. } => Some(1),
            Self::MalformedOpeningTag { .. } => Some(2),
            Self::MalformedClosingTag { line_number, .. } => Some(*line_number),
            Self::EmptyDocument { .. } => None,
        }
    }
}

/// The raw lines of one input file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Document<'a> {
    lines: Vec<&'a str>,
}

impl<'a> Document<'a> {
    pub fn parse(text: &'a str) -> Self {
        let body = match text.strip_suffix('\n') {
            Some(body) if body.strip_suffix('\r').unwrap_or(body).ends_with(CLOSING_TAG) => body,
            _ => text,
        };
        let lines = body
            .split('\n')
            .map(|line| line.strip_suffix('\r').unwrap_or(line))
            .collect();
        Self { lines }
    }

    pub fn lines(&self) -> &[&'a str] {
        &self.lines
    }

    /// Total lines minus the three envelope lines. Negative for truncated input.
    pub fn meaningful_lines(&self) -> isize {
        self.lines.len() as isize - ENVELOPE_LINES as isize
    }

    /// Content lines paired with their 1-based line numbers.
    pub fn content_lines(&self) -> impl Iterator<Item = (usize, &'a str)> + '_ {
        let end = self.lines.len().saturating_sub(1);
        let start = (FIRST_CONTENT_LINE - 1).min(end);
        self.lines[start..end]
            .iter()
            .enumerate()
            .map(|(offset, line)| (FIRST_CONTENT_LINE + offset, *line))
    }
}

/// Version information carried by the DOCTYPE line.
///
/// `<!DOCTYPE ghtml-v0.1 "home">` → revision `"1"`, label `"home"`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Doctype {
    pub revision: String,
    pub label: String,
}

impl Doctype {
    /// Full dialect version, e.g. `0.1`.
    pub fn version(&self) -> String {
        format!("0.{}", self.revision)
    }
}

/// A document that passed [`validate`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Envelope<'a> {
    pub doctype: Doctype,
    /// Line 2, verbatim. Input for the metadata extractor.
    pub opening_tag: &'a str,
}

/// Check the three structural anchors of a document.
///
/// `path` is a diagnostic label only.
pub fn validate<'a>(document: &Document<'a>, path: &str) -> Result<Envelope<'a>, StructureError> {
    let lines = document.lines();
    let empty = || StructureError::EmptyDocument {
        path: path.to_string(),
        meaningful: document.meaningful_lines(),
    };

    let first = lines.first().copied().unwrap_or_default();
    let doctype = parse_doctype(first).ok_or_else(|| StructureError::MalformedDoctype {
        path: path.to_string(),
        line: first.to_string(),
    })?;

    let opening_tag = lines.get(1).copied().ok_or_else(empty)?;
    if !is_opening_tag(opening_tag) {
        return Err(StructureError::MalformedOpeningTag {
            path: path.to_string(),
            line: opening_tag.to_string(),
        });
    }

    if document.meaningful_lines() <= 0 {
        return Err(empty());
    }

    let last = lines[lines.len() - 1];
    if last != CLOSING_TAG {
        return Err(StructureError::MalformedClosingTag {
            path: path.to_string(),
            line_number: lines.len(),
            line: last.to_string(),
        });
    }

    Ok(Envelope {
        doctype,
        opening_tag,
    })
}

/// Parse `<!DOCTYPE ghtml-v0.<TOKEN> "<QUOTED>">`.
pub fn parse_doctype(line: &str) -> Option<Doctype> {
    let rest = line.strip_prefix(DOCTYPE_PREFIX)?;
    let (revision, rest) = rest.split_once(" \"")?;
    if revision.is_empty() || revision.contains(char::is_whitespace) {
        return None;
    }
    let label = rest.strip_suffix("\">")?;
    if label.contains('"') {
        return None;
    }
    Some(Doctype {
        revision: revision.to_string(),
        label: label.to_string(),
    })
}

/// Shallow shape check of line 2. Field-level parsing is the metadata
/// extractor's job.
pub fn is_opening_tag(line: &str) -> bool {
    line.starts_with(OPENING_TAG_PREFIX)
        && line.contains("\" canonical=\"")
        && line.contains("\" title=\"")
        && line.contains("\" description=\"")
        && line.ends_with("\">")
}
