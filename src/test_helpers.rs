//! Shared test utilities for the ghtml test suite.
//!
//! Provides a canonical document envelope, builders for in-memory documents
//! and templates, and an isolated copy of the on-disk fixtures.
//!
//! # Usage
//!
//! ```rust
//! use crate::test_helpers::*;
//!
//! let text = document(&["Hello world", "second line"]);
//! let tmp = setup_fixtures();
//! let site = tmp.path().join("site");
//! let shell = tmp.path().join("template.html");
//! ```

use crate::render::TemplateData;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use tempfile::TempDir;
use walkdir::WalkDir;

// =========================================================================
// Documents
// =========================================================================

pub const DOCTYPE: &str = r#"<!DOCTYPE ghtml-v0.1 "test">"#;

pub const OPENING_TAG: &str = r#"<html flavour="ghtml" lang="en" canonical="https://x/y" title="T" header="H" description="D">"#;

/// Wrap content lines in the standard envelope. No trailing newline.
pub fn document(content: &[&str]) -> String {
    let mut lines = Vec::with_capacity(content.len() + 3);
    lines.push(DOCTYPE);
    lines.push(OPENING_TAG);
    lines.extend_from_slice(content);
    lines.push("</html>");
    lines.join("\n")
}

/// A template named `template.html`.
pub fn template(content: &str) -> TemplateData {
    TemplateData::new("template.html", content)
}

// =========================================================================
// Fixture setup
// =========================================================================

pub fn fixtures_dir() -> PathBuf {
    Path::new(env!("CARGO_MANIFEST_DIR")).join("fixtures")
}

/// A private copy of `fixtures/` (`site/` and `template.html`) in a temp dir.
/// Build tests write their output next to it.
pub fn setup_fixtures() -> TempDir {
    let tmp = TempDir::new().unwrap();
    copy_tree(&fixtures_dir(), tmp.path()).unwrap();
    tmp
}

/// Mirror the tree below `src` into `dst`, directories before their files.
fn copy_tree(src: &Path, dst: &Path) -> io::Result<()> {
    for entry in WalkDir::new(src).min_depth(1) {
        let entry = entry?;
        let relative = entry.path().strip_prefix(src).map_err(io::Error::other)?;
        let target = dst.join(relative);
        if entry.file_type().is_dir() {
            fs::create_dir_all(&target)?;
        } else {
            fs::copy(entry.path(), &target)?;
        }
    }
    Ok(())
}
