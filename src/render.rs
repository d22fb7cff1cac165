//! Page rendering: combining metadata, rendered lines and the HTML shell.
//!
//! The compiler hands every [`PageRenderer`] the same inputs: the page
//! metadata, the ordered line records, and the shared [`TemplateData`]. The
//! renderer decides the final format.
//!
//! ## Placeholder Templates
//!
//! [`PlaceholderRenderer`] fills `{{ slot }}` markers in the template text:
//!
//! | Slot | Value |
//! |------|-------|
//! | `lang` `canonical` `title` `header` `description` | metadata, HTML-escaped |
//! | `content` | every line fragment, in order (required) |
//! | `line_count` | number of content lines |
//! | `word_count` | total words |
//! | `typed_chars` | total typed characters |
//!
//! Whitespace inside the braces is ignored. Unknown slots are errors, and so
//! is a template without a `content` slot, since the page body would be
//! silently dropped.
//!
//! ```text
//! <html lang="{{ lang }}">
//!   <head><title>{{ title }}</title><link rel="canonical" href="{{ canonical }}"></head>
//!   <body><h1>{{ header }}</h1>{{ content }}</body>
//! </html>
//! ```

use crate::line::LineRecord;
use crate::metadata::PageMetadata;
use maud::html;
use std::fs;
use std::path::Path;
use thiserror::Error;

const OPEN: &str = "{{";
const CLOSE: &str = "}}";

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RenderError {
    #[error("template \"{template}\" has no {{{{ content }}}} slot")]
    MissingContentSlot { template: String },
    #[error("template \"{template}\" uses unknown slot \"{slot}\"")]
    UnknownPlaceholder { template: String, slot: String },
    #[error("template \"{template}\" has an unterminated slot at byte {offset}")]
    UnterminatedPlaceholder { template: String, offset: usize },
}

/// The HTML shell shared by every document of one invocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TemplateData {
    /// Display name, usually the template's path.
    pub name: String,
    pub content: String,
}

impl TemplateData {
    pub fn new(name: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            content: content.into(),
        }
    }

    /// Read a template file. The name is the path as given.
    pub fn load(path: &Path) -> std::io::Result<Self> {
        let content = fs::read_to_string(path)?;
        Ok(Self::new(path.display().to_string(), content))
    }
}

/// Inputs of one render call.
#[derive(Debug, Clone, Copy)]
pub struct Page<'a> {
    pub metadata: &'a PageMetadata,
    pub lines: &'a [LineRecord],
}

impl Page<'_> {
    pub fn word_count(&self) -> usize {
        self.lines.iter().map(|l| l.word_count).sum()
    }

    pub fn typed_chars(&self) -> usize {
        self.lines.iter().map(|l| l.typed_length).sum()
    }

    /// All fragments, concatenated in order.
    pub fn content(&self) -> String {
        let mut out = String::with_capacity(self.lines.iter().map(|l| l.byte_length).sum());
        for line in self.lines {
            out.push_str(&line.fragment);
        }
        out
    }
}

/// Turns a compiled page into final output text.
pub trait PageRenderer {
    fn render(&self, page: &Page<'_>, template: &TemplateData) -> Result<String, RenderError>;
}

/// Fills `{{ slot }}` markers in the template.
#[derive(Debug, Clone, Copy, Default)]
pub struct PlaceholderRenderer;

impl PageRenderer for PlaceholderRenderer {
    fn render(&self, page: &Page<'_>, template: &TemplateData) -> Result<String, RenderError> {
        let source = template.content.as_str();
        let mut out = String::with_capacity(source.len() + page.content().len());
        let mut rest = source;
        let mut has_content = false;

        while let Some(start) = rest.find(OPEN) {
            out.push_str(&rest[..start]);
            let inner = &rest[start + OPEN.len()..];
            let end = inner
                .find(CLOSE)
                .ok_or_else(|| RenderError::UnterminatedPlaceholder {
                    template: template.name.clone(),
                    offset: source.len() - rest.len() + start,
                })?;

            let slot = inner[..end].trim();
            match slot {
                "lang" => out.push_str(&escape(&page.metadata.lang)),
                "canonical" => out.push_str(&escape(&page.metadata.canonical)),
                "title" => out.push_str(&escape(&page.metadata.title)),
                "header" => out.push_str(&escape(&page.metadata.header)),
                "description" => out.push_str(&escape(&page.metadata.description)),
                "content" => {
                    has_content = true;
                    out.push_str(&page.content());
                }
                "line_count" => out.push_str(&page.lines.len().to_string()),
                "word_count" => out.push_str(&page.word_count().to_string()),
                "typed_chars" => out.push_str(&page.typed_chars().to_string()),
                other => {
                    return Err(RenderError::UnknownPlaceholder {
                        template: template.name.clone(),
                        slot: other.to_string(),
                    });
                }
            }
            rest = &inner[end + CLOSE.len()..];
        }
        out.push_str(rest);

        if !has_content {
            return Err(RenderError::MissingContentSlot {
                template: template.name.clone(),
            });
        }
        Ok(out)
    }
}

fn escape(value: &str) -> String {
    html! { (value) }.into_string()
}
