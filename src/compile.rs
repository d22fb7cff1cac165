//! Document compilation.
//!
//! Orchestrates the core stages over one document:
//!
//! ```text
//! bytes ─▶ Document::parse ─▶ validate ─▶ extract_metadata ─▶ process_line × N ─▶ PageRenderer
//! ```
//!
//! Structural errors, unparseable metadata and unresolved variables abort the
//! document. Soft failures (stray content around the opening tag, lines that
//! are too long) are collected as [`Warning`]s, in document order, and returned
//! next to the output. Nothing here logs or prints.

use crate::document::{Doctype, Document, StructureError, validate};
use crate::line::{Environment, LineError, LineOptions, LineRecord, LineTooLong, process_line};
use crate::metadata::{MetadataError, PageMetadata, extract_metadata};
use crate::render::{Page, PageRenderer, PlaceholderRenderer, RenderError, TemplateData};
use serde::{Serialize, Serializer};
use std::fmt;
use thiserror::Error;

/// A value that may come with a non-blocking warning.
///
/// Hard failures are the `Err` side of the surrounding `Result` and carry no
/// data. A `Flagged` is always usable; `warning` says whether it is suspect.
#[derive(Debug, Clone, PartialEq, Eq)]
#[must_use]
pub struct Flagged<T, W> {
    pub value: T,
    pub warning: Option<W>,
}

impl<T, W> Flagged<T, W> {
    pub fn clean(value: T) -> Self {
        Self {
            value,
            warning: None,
        }
    }

    pub fn warned(value: T, warning: W) -> Self {
        Self {
            value,
            warning: Some(warning),
        }
    }

    pub fn is_clean(&self) -> bool {
        self.warning.is_none()
    }

    pub fn into_parts(self) -> (T, Option<W>) {
        (self.value, self.warning)
    }
}

#[derive(Error, Debug)]
pub enum CompileError {
    #[error("file \"{path}\" is not valid UTF-8: {source}")]
    Encoding {
        path: String,
        #[source]
        source: std::str::Utf8Error,
    },
    #[error(transparent)]
    Structure(#[from] StructureError),
    #[error(transparent)]
    Metadata(#[from] MetadataError),
    #[error(transparent)]
    Line(#[from] LineError),
    #[error(transparent)]
    Render(#[from] RenderError),
}

/// A soft failure collected while compiling.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Warning {
    Metadata(MetadataError),
    LineTooLong(LineTooLong),
}

impl fmt::Display for Warning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Metadata(err) => write!(f, "{err}"),
            Self::LineTooLong(err) => write!(f, "{err}"),
        }
    }
}

impl Serialize for Warning {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

/// Everything learned about a document, short of rendering it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Analysis {
    pub doctype: Doctype,
    pub metadata: PageMetadata,
    /// One record per meaningful line, in document order.
    pub lines: Vec<LineRecord>,
    pub warnings: Vec<Warning>,
}

impl Analysis {
    pub fn word_count(&self) -> usize {
        self.lines.iter().map(|l| l.word_count).sum()
    }

    pub fn typed_chars(&self) -> usize {
        self.lines.iter().map(|l| l.typed_length).sum()
    }

    pub fn page(&self) -> Page<'_> {
        Page {
            metadata: &self.metadata,
            lines: &self.lines,
        }
    }
}

/// A rendered document and the analysis it was rendered from.
#[derive(Debug, Clone)]
pub struct Compiled {
    pub output: Vec<u8>,
    pub analysis: Analysis,
}

impl Compiled {
    pub fn warnings(&self) -> &[Warning] {
        &self.analysis.warnings
    }
}

/// Compiles documents with one environment snapshot, one set of line options
/// and one renderer. Holds no mutable state, so one instance can be shared
/// across threads.
#[derive(Debug, Clone)]
pub struct Compiler<R = PlaceholderRenderer> {
    env: Environment,
    options: LineOptions,
    renderer: R,
}

impl Compiler<PlaceholderRenderer> {
    pub fn new(env: Environment, options: LineOptions) -> Self {
        Self::with_renderer(env, options, PlaceholderRenderer)
    }
}

impl<R: PageRenderer> Compiler<R> {
    pub fn with_renderer(env: Environment, options: LineOptions, renderer: R) -> Self {
        Self {
            env,
            options,
            renderer,
        }
    }

    pub fn options(&self) -> &LineOptions {
        &self.options
    }

    /// Validate and process a document without rendering it.
    ///
    /// `path` is a diagnostic label only.
    pub fn analyze(&self, raw: &[u8], path: &str) -> Result<Analysis, CompileError> {
        let text = std::str::from_utf8(raw).map_err(|source| CompileError::Encoding {
            path: path.to_string(),
            source,
        })?;
        let document = Document::parse(text);
        let envelope = validate(&document, path)?;

        let mut warnings = Vec::new();
        let (metadata, warning) = extract_metadata(envelope.opening_tag, path)?.into_parts();
        warnings.extend(warning.map(Warning::Metadata));

        let mut lines = Vec::with_capacity(document.meaningful_lines().max(0) as usize);
        for (line_number, line) in document.content_lines() {
            let (record, warning) =
                process_line(line, path, line_number, &self.env, &self.options)?.into_parts();
            warnings.extend(warning.map(Warning::LineTooLong));
            lines.push(record);
        }

        Ok(Analysis {
            doctype: envelope.doctype,
            metadata,
            lines,
            warnings,
        })
    }

    /// Compile one document into final output bytes.
    pub fn compile(
        &self,
        raw: &[u8],
        template: &TemplateData,
        path: &str,
    ) -> Result<Compiled, CompileError> {
        let analysis = self.analyze(raw, path)?;
        let rendered = self.renderer.render(&analysis.page(), template)?;
        Ok(Compiled {
            output: rendered.into_bytes(),
            analysis,
        })
    }
}
