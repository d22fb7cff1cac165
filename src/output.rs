//! CLI output formatting for `build` and `check`.
//!
//! # Information-First Display
//!
//! Every document is shown by its page title and positional index first, with
//! filesystem paths and statistics as indented context lines. Warnings sit
//! directly under the document they belong to.
//!
//! # Output Format
//!
//! ## Build
//!
//! ```text
//! Compiling 3 files (directory tree)
//! 001 Home → site/index.html
//!     Source: content/index.ghtml
//!     3 lines, 14 words
//! 002 Zweite Notiz → site/notes/second.html
//!     Source: content/notes/second.ghtml
//!     2 lines, 12 words
//!     warning: line of length 66 is too long to be readable on mobile - over 54 typed characters (…)
//!
//! Compiled 3 files: 7 lines, 38 words, 1 warning
//! ```
//!
//! Build events arrive in completion order, so indices count completed files.
//!
//! ## Check
//!
//! ```text
//! 001 Home [en]
//!     Source: content/index.ghtml
//!     Description: A small terminal-style home page
//!     3 lines, 14 words, typed lengths 24 25 32
//!
//! Checked 3 files: 7 lines, 38 words, 1 warning
//! ```
//!
//! # Architecture
//!
//! Each command has a `format_*` function (returns `Vec<String>`) for
//! testability and a `print_*` wrapper that writes to stdout. Format functions
//! are pure: no I/O, no side effects.

use crate::batch::{BuildEvent, BuildSummary, FileReport, Mode};
use crate::compile::Warning;

const DESCRIPTION_WIDTH: usize = 60;

// ============================================================================
// Shared display helpers
// ============================================================================

/// Format a 1-based positional index as 3-digit zero-padded.
fn format_index(pos: usize) -> String {
    format!("{:0>3}", pos)
}

/// Return indentation string: 4 spaces per depth level.
fn indent(depth: usize) -> String {
    "    ".repeat(depth)
}

/// `1 file`, `2 files`.
fn plural(count: usize, noun: &str) -> String {
    match count {
        1 => format!("1 {noun}"),
        n => format!("{n} {noun}s"),
    }
}

/// Truncate text to `max` characters, appending `...` if truncated.
fn truncate(text: &str, max: usize) -> String {
    match text.char_indices().nth(max) {
        Some((cut, _)) => format!("{}...", &text[..cut]),
        None => text.to_string(),
    }
}

fn mode_label(mode: Mode) -> &'static str {
    match mode {
        Mode::SingleFile => "single file",
        Mode::DirectoryTree => "directory tree",
    }
}

fn stats_line(report: &FileReport) -> String {
    format!(
        "{}{}, {}",
        indent(1),
        plural(report.line_count, "line"),
        plural(report.word_count, "word")
    )
}

fn warning_lines(warnings: &[Warning]) -> impl Iterator<Item = String> + '_ {
    warnings
        .iter()
        .map(|warning| format!("{}warning: {warning}", indent(1)))
}

fn totals(verb: &str, summary: &BuildSummary) -> String {
    format!(
        "{verb} {}: {}, {}, {}",
        plural(summary.reports.len(), "file"),
        plural(summary.line_count(), "line"),
        plural(summary.word_count(), "word"),
        plural(summary.warning_count(), "warning"),
    )
}

// ============================================================================
// Build
// ============================================================================

/// Format one build event. `position` is the 1-based completion index for
/// compiled files.
pub fn format_build_event(event: &BuildEvent, position: usize) -> Vec<String> {
    match event {
        BuildEvent::Started { mode, files } => vec![format!(
            "Compiling {} ({})",
            plural(*files, "file"),
            mode_label(*mode)
        )],
        BuildEvent::FileCompiled(report) => format_compiled_file(report, position),
    }
}

fn format_compiled_file(report: &FileReport, position: usize) -> Vec<String> {
    let header = match &report.output {
        Some(output) => format!(
            "{} {} → {}",
            format_index(position),
            report.metadata.title,
            output.display()
        ),
        None => format!("{} {}", format_index(position), report.metadata.title),
    };
    let mut lines = vec![
        header,
        format!("{}Source: {}", indent(1), report.source.display()),
        stats_line(report),
    ];
    lines.extend(warning_lines(&report.warnings));
    lines
}

/// Closing line of a successful build.
pub fn format_build_summary(summary: &BuildSummary) -> Vec<String> {
    vec![String::new(), totals("Compiled", summary)]
}

pub fn print_build_event(event: &BuildEvent, position: usize) {
    for line in format_build_event(event, position) {
        println!("{}", line);
    }
}

pub fn print_build_summary(summary: &BuildSummary) {
    for line in format_build_summary(summary) {
        println!("{}", line);
    }
}

// ============================================================================
// Check
// ============================================================================

/// Format a full `check` report, in walk order.
pub fn format_check_report(summary: &BuildSummary) -> Vec<String> {
    let mut lines = Vec::new();
    for (i, report) in summary.reports.iter().enumerate() {
        let typed: Vec<String> = report.typed_lengths.iter().map(usize::to_string).collect();
        lines.push(format!(
            "{} {} [{}]",
            format_index(i + 1),
            report.metadata.title,
            report.metadata.lang
        ));
        lines.push(format!("{}Source: {}", indent(1), report.source.display()));
        lines.push(format!(
            "{}Description: {}",
            indent(1),
            truncate(&report.metadata.description, DESCRIPTION_WIDTH)
        ));
        lines.push(format!("{}, typed lengths {}", stats_line(report), typed.join(" ")));
        lines.extend(warning_lines(&report.warnings));
    }
    lines.push(String::new());
    lines.push(totals("Checked", summary));
    lines
}

pub fn print_check_report(summary: &BuildSummary) {
    for line in format_check_report(summary) {
        println!("{}", line);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::line::LineTooLong;
    use crate::metadata::PageMetadata;
    use std::path::PathBuf;

    fn report(title: &str, output: Option<&str>, warnings: Vec<Warning>) -> FileReport {
        FileReport {
            source: PathBuf::from("content/page.ghtml"),
            output: output.map(PathBuf::from),
            metadata: PageMetadata {
                lang: "en".to_string(),
                canonical: "https://x/".to_string(),
                title: title.to_string(),
                header: "~".to_string(),
                description: "Short".to_string(),
            },
            line_count: 2,
            word_count: 5,
            typed_chars: 20,
            typed_lengths: vec![12, 8],
            bytes_written: 300,
            warnings,
        }
    }

    fn too_long() -> Warning {
        Warning::LineTooLong(LineTooLong {
            typed_length: 60,
            limit: 54,
            path: "content/page.ghtml".to_string(),
            line_number: 4,
            line: "x".repeat(60),
        })
    }

    // =========================================================================
    // Helpers
    // =========================================================================

    #[test]
    fn format_index_pads_to_three() {
        assert_eq!(format_index(1), "001");
        assert_eq!(format_index(42), "042");
        assert_eq!(format_index(1234), "1234");
    }

    #[test]
    fn indent_levels() {
        assert_eq!(indent(0), "");
        assert_eq!(indent(2), "        ");
    }

    #[test]
    fn plural_forms() {
        assert_eq!(plural(0, "file"), "0 files");
        assert_eq!(plural(1, "file"), "1 file");
        assert_eq!(plural(3, "word"), "3 words");
    }

    #[test]
    fn truncate_short_and_exact() {
        assert_eq!(truncate("hello", 10), "hello");
        assert_eq!(truncate("hello", 5), "hello");
        assert_eq!(truncate("", 3), "");
    }

    #[test]
    fn truncate_long_respects_char_boundaries() {
        assert_eq!(truncate("hello world", 5), "hello...");
        assert_eq!(truncate("äöüäöü", 3), "äöü...");
    }

    // =========================================================================
    // Build
    // =========================================================================

    #[test]
    fn started_event_names_mode() {
        let lines = format_build_event(
            &BuildEvent::Started {
                mode: Mode::DirectoryTree,
                files: 3,
            },
            0,
        );
        assert_eq!(lines, vec!["Compiling 3 files (directory tree)"]);
    }

    #[test]
    fn compiled_event_shows_title_then_context() {
        let event = BuildEvent::FileCompiled(report("Home", Some("site/index.html"), vec![]));
        let lines = format_build_event(&event, 1);
        assert_eq!(
            lines,
            vec![
                "001 Home → site/index.html",
                "    Source: content/page.ghtml",
                "    2 lines, 5 words",
            ]
        );
    }

    #[test]
    fn compiled_event_lists_warnings() {
        let event = BuildEvent::FileCompiled(report("Home", Some("o"), vec![too_long()]));
        let lines = format_build_event(&event, 2);
        assert_eq!(lines.len(), 4);
        assert!(lines[3].starts_with("    warning: "));
        assert!(lines[3].contains("content/page.ghtml"));
    }

    #[test]
    fn build_summary_totals() {
        let summary = BuildSummary {
            mode: Mode::DirectoryTree,
            reports: vec![
                report("A", Some("a"), vec![too_long()]),
                report("B", Some("b"), vec![]),
            ],
        };
        assert_eq!(
            format_build_summary(&summary),
            vec![
                String::new(),
                "Compiled 2 files: 4 lines, 10 words, 1 warning".to_string()
            ]
        );
    }

    // =========================================================================
    // Check
    // =========================================================================

    #[test]
    fn check_report_shows_language_and_lengths() {
        let summary = BuildSummary {
            mode: Mode::SingleFile,
            reports: vec![report("Home", None, vec![])],
        };
        let lines = format_check_report(&summary);
        assert_eq!(
            lines,
            vec![
                "001 Home [en]",
                "    Source: content/page.ghtml",
                "    Description: Short",
                "    2 lines, 5 words, typed lengths 12 8",
                "",
                "Checked 1 file: 2 lines, 5 words, 0 warnings",
            ]
        );
    }

    #[test]
    fn check_report_truncates_descriptions() {
        let mut long = report("Home", None, vec![]);
        long.metadata.description = "d".repeat(80);
        let summary = BuildSummary {
            mode: Mode::SingleFile,
            reports: vec![long],
        };
        let lines = format_check_report(&summary);
        assert_eq!(lines[2], format!("    Description: {}...", "d".repeat(60)));
    }
}
