//! Per-line content processing.
//!
//! Each content line of a document goes through the same pipeline:
//!
//! 1. **Interpolation**: `%NAME%` tokens are replaced with values from an
//!    [`Environment`] snapshot. One pass, values are never re-expanded.
//! 2. **Typed view**: markup tags (`<tag attr="value">`, `</tag>`) are
//!    stripped and every escape sequence (`&name;`) collapses to one
//!    placeholder character. What is left is what a reader sees typed out.
//! 3. **Readability guard**: more than [`READABLE_LINE_LIMIT`] typed
//!    characters produces a [`LineTooLong`] warning. The line is still
//!    rendered.
//! 4. **Rendering**: the interpolated line is wrapped in one step of the
//!    terminal typing animation.
//!
//! ## Fragment Shape
//!
//! ```text
//! first content line:  <p class="termtxt-default">&nbsp;$&nbsp;</p><p class="termtxt-default typing-animator">TEXT</p><p class="termtxt-default typing-animator">_</p>
//! every other line:    <br><p class="termtxt-default">&nbsp;</p><p class="termtxt-default typing-animator">TEXT</p><p class="termtxt-default typing-animator">_</p>
//! ```
//!
//! Each fragment is preceded by a newline and the configured indentation.

use crate::compile::Flagged;
use crate::config::SiteConfig;
use crate::document::FIRST_CONTENT_LINE;
use maud::{PreEscaped, html};
use regex::{Captures, NoExpand, Regex};
use serde::Serialize;
use std::borrow::Cow;
use std::collections::BTreeMap;
use std::sync::LazyLock;
use thiserror::Error;

/// Typed characters that still read comfortably on a phone screen.
pub const READABLE_LINE_LIMIT: usize = 54;

/// `<tag attr="value">` or `</tag>`.
static TAG_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"<(\S+?) (\S+?)="(.*?)">|</(\S+?)>"#).unwrap());

/// `%NAME%`.
static VARIABLE_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"%(\S+?)%").unwrap());

/// `&name;`.
static ESCAPE_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"&(\S+?);").unwrap());

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum LineError {
    #[error(
        "environment variable \"{name}\" not set (while processing {path} at line #{line_number} - contents: \"{line}\")"
    )]
    UnresolvedVariable {
        name: String,
        path: String,
        line_number: usize,
        line: String,
    },
}

/// Soft failure: the line rendered, but is too long to read on mobile.
#[derive(Error, Debug, Clone, PartialEq, Eq, Serialize)]
#[error(
    "line of length {typed_length} is too long to be readable on mobile - over {limit} typed characters (while processing {path} at line #{line_number} - contents: \"{line}\")"
)]
pub struct LineTooLong {
    pub typed_length: usize,
    pub limit: usize,
    pub path: String,
    pub line_number: usize,
    pub line: String,
}

/// Result of processing one content line.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LineRecord {
    /// Visible characters after tag stripping and escape collapsing.
    pub typed_length: usize,
    /// Byte length of `fragment`.
    pub byte_length: usize,
    pub fragment: String,
    /// Whether this is the first content line (line 3 of the document).
    pub is_first: bool,
    /// Pieces of the typed view split on single spaces. Runs of spaces and
    /// an empty line still count.
    pub word_count: usize,
}

/// Knobs for the line processor.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LineOptions {
    /// Emitted after the newline that precedes every fragment.
    pub indentation: String,
    pub max_typed_chars: usize,
    /// Stands in for each `&name;` when counting typed characters.
    pub escape_placeholder: char,
}

impl LineOptions {
    pub fn from_site_config(config: &SiteConfig) -> Self {
        Self {
            indentation: config.lines.indentation.clone(),
            max_typed_chars: config.lines.max_typed_chars,
            escape_placeholder: config.lines.placeholder(),
        }
    }
}

impl Default for LineOptions {
    fn default() -> Self {
        Self::from_site_config(&SiteConfig::default())
    }
}

/// Immutable snapshot of the variables available to `%NAME%` tokens.
///
/// Taken once per invocation and passed explicitly, so line processing never
/// reads process state.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Environment {
    vars: BTreeMap<String, String>,
}

impl Environment {
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot the process environment. Non-UTF-8 entries are skipped.
    pub fn from_process() -> Self {
        std::env::vars_os()
            .filter_map(|(k, v)| Some((k.into_string().ok()?, v.into_string().ok()?)))
            .collect()
    }

    pub fn with(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.vars.insert(name.into(), value.into());
        self
    }

    /// Layer `vars` on top, replacing existing values.
    pub fn overlay(mut self, vars: &BTreeMap<String, String>) -> Self {
        self.vars
            .extend(vars.iter().map(|(k, v)| (k.clone(), v.clone())));
        self
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        self.vars.get(name).map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.vars.len()
    }

    pub fn is_empty(&self) -> bool {
        self.vars.is_empty()
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for Environment {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self {
            vars: iter.into_iter().map(|(k, v)| (k.into(), v.into())).collect(),
        }
    }
}

/// Process one content line.
///
/// `line_number` is 1-based and counts the envelope, so the first content
/// line is number 3. `path` is a diagnostic label only.
pub fn process_line(
    line: &str,
    path: &str,
    line_number: usize,
    env: &Environment,
    options: &LineOptions,
) -> Result<Flagged<LineRecord, LineTooLong>, LineError> {
    let expanded = interpolate(line, env).map_err(|name| LineError::UnresolvedVariable {
        name,
        path: path.to_string(),
        line_number,
        line: line.to_string(),
    })?;

    let typed = typed_view(&expanded, options.escape_placeholder);
    let typed_length = typed.chars().count();
    let is_first = line_number == FIRST_CONTENT_LINE;
    let fragment = render_fragment(&expanded, &options.indentation, is_first);

    let record = LineRecord {
        typed_length,
        byte_length: fragment.len(),
        fragment,
        is_first,
        word_count: count_words(&typed),
    };

    if typed_length > options.max_typed_chars {
        let warning = LineTooLong {
            typed_length,
            limit: options.max_typed_chars,
            path: path.to_string(),
            line_number,
            line: line.to_string(),
        };
        Ok(Flagged::warned(record, warning))
    } else {
        Ok(Flagged::clean(record))
    }
}

/// Replace every `%NAME%` with its value.
///
/// Fails with the first unresolved name, in line order.
pub fn interpolate<'a>(line: &'a str, env: &Environment) -> Result<Cow<'a, str>, String> {
    if let Some(missing) = VARIABLE_RE
        .captures_iter(line)
        .map(|caps| caps.get(1).map_or("", |m| m.as_str()))
        .find(|name| env.get(name).is_none())
    {
        return Err(missing.to_string());
    }
    Ok(VARIABLE_RE.replace_all(line, |caps: &Captures<'_>| {
        env.get(&caps[1]).unwrap_or_default().to_string()
    }))
}

/// The line as a reader sees it typed out.
pub fn typed_view(line: &str, placeholder: char) -> String {
    let stripped = TAG_RE.replace_all(line, "");
    let placeholder = placeholder.to_string();
    ESCAPE_RE
        .replace_all(&stripped, NoExpand(&placeholder))
        .into_owned()
}

fn count_words(typed: &str) -> usize {
    typed.split(' ').count()
}

fn render_fragment(text: &str, indentation: &str, is_first: bool) -> String {
    let prompt = if is_first { "&nbsp;$&nbsp;" } else { "&nbsp;" };
    let markup = html! {
        @if !is_first {
            br;
        }
        p class="termtxt-default" { (PreEscaped(prompt)) }
        p class="termtxt-default typing-animator" { (PreEscaped(text)) }
        p class="termtxt-default typing-animator" { "_" }
    };
    format!("\n{indentation}{}", markup.into_string())
}
