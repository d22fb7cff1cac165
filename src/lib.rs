//! # ghtml
//!
//! A compiler for G-HTML, a tiny line-oriented HTML dialect for pages that
//! look like a terminal session. Each content line of a document becomes one
//! "typed" line on the page, with environment variables expanded and the
//! prompt drawn in front of it.
//!
//! ```text
//! <!DOCTYPE ghtml-v0.1 "terminal">
//! <html flavour="ghtml" lang="en" canonical="https://…" title="…" header="…" description="…">
//! Hello %USER%
//! Type <a href="/help.html">help</a> for more.
//! </html>
//! ```
//!
//! # Architecture: Pure Core, Thin Driver
//!
//! ```text
//! bytes ─▶ document ─▶ metadata ─▶ line × N ─▶ render ─▶ bytes
//!          (validate)   (line 2)   (lines 3..N-1)  (template)
//! ```
//!
//! The core (`document`, `metadata`, `line`, `compile`, `render`) is a set of
//! pure functions over strings. It never touches the filesystem, never reads
//! the process environment and never logs. Everything with side effects lives
//! in [`batch`] and the binary, so the whole compiler can be unit-tested on
//! in-memory documents.
//!
//! # Module Map
//!
//! | Module | Role |
//! |--------|------|
//! | [`document`] | Line split, meaningful-line count, structural validation of the envelope |
//! | [`metadata`] | Page attributes from the opening `<html>` tag |
//! | [`line`] | Per-line variable expansion, typed-length measure, HTML fragment |
//! | [`compile`] | Runs the stages over one document, collects warnings |
//! | [`render`] | Template seam: [`render::PageRenderer`] and the `{{ slot }}` renderer |
//! | [`config`] | `ghtml.toml` loading, merging over stock defaults, validation |
//! | [`batch`] | File and directory-tree driver: walk, mirror paths, parallel compile |
//! | [`output`] | CLI output formatting for `build` and `check` |
//!
//! # Design Decisions
//!
//! ## Hard and Soft Failures
//!
//! A broken envelope, unparseable metadata or an undefined variable stops the
//! document: there is nothing sensible to emit. Stray text around the opening
//! tag and lines too long to read on a phone are *soft*: the output is still
//! produced, and the problem travels next to it as a [`compile::Warning`].
//! Every stage that can fail softly returns a [`compile::Flagged`] inside its
//! `Result`, so neither channel can be forgotten.
//!
//! ## Environment Snapshot
//!
//! Variables are read from the process environment once per invocation into a
//! [`line::Environment`] and passed down explicitly. Config `[variables]` are
//! layered on top. Expansion is a single pass: values are never re-scanned, so
//! a value containing `%OTHER%` stays literal.
//!
//! ## Maud for Fragments
//!
//! Line fragments and escaped metadata are produced with
//! [Maud](https://maud.lambda.xyz/). The line text itself is already HTML and
//! is inserted pre-escaped; only metadata slots go through escaping.
//!
//! ## Never Overwrite
//!
//! Output files are opened with `create_new`. A second run into the same
//! directory fails on the first existing file instead of silently replacing
//! content, which makes stale or misplaced output directories obvious.

pub mod batch;
pub mod compile;
pub mod config;
pub mod document;
pub mod line;
pub mod metadata;
pub mod output;
pub mod render;

#[cfg(test)]
pub(crate) mod test_helpers;
