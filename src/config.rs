//! Compiler configuration.
//!
//! Handles loading, validating, and merging `ghtml.toml`. Stock defaults are
//! serialized to a TOML table and the user's file is merged on top of it, key
//! by key, so a config file only needs the values it wants to change.
//!
//! ## Configuration Options
//!
//! ```toml
//! # All options are optional - defaults shown below
//!
//! [lines]
//! max_typed_chars = 54       # Readability limit per content line
//! indentation = "    "       # Emitted before every rendered line
//! escape_placeholder = "#"   # Counts as one typed char per &name;
//!
//! [variables]                # Extra %NAME% values, override the environment
//! # SITE_NAME = "example"
//!
//! [output]
//! # extension = "html"       # Rewrite output extensions (default: keep)
//! deny_warnings = false      # Fail the build on soft failures
//!
//! [processing]
//! # max_processes = 4        # Parallel workers (default: CPU cores)
//! ```
//!
//! Unknown keys are rejected to catch typos early.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::Path;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),
    #[error("Config validation error: {0}")]
    Validation(String),
}

/// Configuration loaded from `ghtml.toml`.
///
/// All fields have defaults. Unknown keys are rejected.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SiteConfig {
    /// Line processing settings.
    pub lines: LinesConfig,
    /// Extra variables for `%NAME%` interpolation.
    pub variables: BTreeMap<String, String>,
    /// Output file settings.
    pub output: OutputConfig,
    /// Parallel processing settings.
    pub processing: ProcessingConfig,
}

impl SiteConfig {
    /// Validate config values are within acceptable ranges.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.lines.max_typed_chars == 0 {
            return Err(ConfigError::Validation(
                "lines.max_typed_chars must be greater than 0".into(),
            ));
        }
        if self.lines.escape_placeholder.chars().count() != 1 {
            return Err(ConfigError::Validation(
                "lines.escape_placeholder must be exactly one character".into(),
            ));
        }
        if !self.lines.indentation.chars().all(char::is_whitespace) {
            return Err(ConfigError::Validation(
                "lines.indentation must contain only whitespace".into(),
            ));
        }
        if let Some(ext) = &self.output.extension {
            if ext.is_empty() || ext.starts_with('.') {
                return Err(ConfigError::Validation(
                    "output.extension must be non-empty and written without a leading dot".into(),
                ));
            }
        }
        if let Some(name) = self.variables.keys().find(|k| !is_variable_name(k)) {
            return Err(ConfigError::Validation(format!(
                "variables.{name}: names must not be empty or contain whitespace or %"
            )));
        }
        Ok(())
    }
}

fn is_variable_name(name: &str) -> bool {
    !name.is_empty() && !name.chars().any(|c| c.is_whitespace() || c == '%')
}

/// Line processing settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct LinesConfig {
    /// Typed characters allowed per line before a readability warning.
    pub max_typed_chars: usize,
    /// Whitespace emitted after the newline preceding each rendered line.
    pub indentation: String,
    /// Single character counted for each `&name;` escape.
    pub escape_placeholder: String,
}

impl LinesConfig {
    /// The placeholder as a `char`. Falls back to `#` for an unvalidated empty value.
    pub fn placeholder(&self) -> char {
        self.escape_placeholder.chars().next().unwrap_or('#')
    }
}

impl Default for LinesConfig {
    fn default() -> Self {
        Self {
            max_typed_chars: crate::line::READABLE_LINE_LIMIT,
            indentation: "    ".to_string(),
            escape_placeholder: "#".to_string(),
        }
    }
}

/// Output file settings.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct OutputConfig {
    /// Extension given to every output file in directory mode. `None` keeps
    /// the source file name unchanged.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub extension: Option<String>,
    /// Treat soft failures as a failed build.
    pub deny_warnings: bool,
}

/// Parallel processing settings.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ProcessingConfig {
    /// Maximum number of parallel compile workers.
    /// When absent, defaults to the number of CPU cores.
    /// Values larger than the core count are clamped down.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_processes: Option<usize>,
}

/// Resolve the effective thread count from config.
///
/// - `None` → use all available cores
/// - `Some(n)` → use `min(n, cores)` (user can constrain down, not up)
pub fn effective_threads(config: &ProcessingConfig) -> usize {
    let cores = std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(1);
    config
        .max_processes
        .map(|n| n.clamp(1, cores))
        .unwrap_or(cores)
}

// =============================================================================
// Config loading, merging, and validation
// =============================================================================

/// Built-in settings as a TOML table: the base every `ghtml.toml` is laid on.
pub fn stock_defaults_value() -> toml::Value {
    toml::Value::try_from(SiteConfig::default()).expect("default config must serialize")
}

/// Lay user settings over `defaults`.
///
/// Sections such as `[lines]` or `[variables]` merge per key, so a file may
/// set `max_typed_chars` alone and keep the stock `indentation`. Anything
/// that is not a table on both sides is taken from `user` as is.
pub fn merge_toml(defaults: toml::Value, user: toml::Value) -> toml::Value {
    use toml::Value::Table;

    match (defaults, user) {
        (Table(mut section), Table(user_section)) => {
            for (key, value) in user_section {
                let value = match section.remove(&key) {
                    Some(stock) => merge_toml(stock, value),
                    None => value,
                };
                section.insert(key, value);
            }
            Table(section)
        }
        (_, value) => value,
    }
}

/// Read a config file as a raw TOML value.
pub fn load_raw_config(path: &Path) -> Result<toml::Value, ConfigError> {
    let content = fs::read_to_string(path)?;
    Ok(toml::from_str(&content)?)
}

/// Merge an optional overlay onto a base value, then deserialize and validate.
pub fn resolve_config(
    base: toml::Value,
    overlay: Option<toml::Value>,
) -> Result<SiteConfig, ConfigError> {
    let merged = match overlay {
        Some(ov) => merge_toml(base, ov),
        None => base,
    };
    let config: SiteConfig = merged.try_into()?;
    config.validate()?;
    Ok(config)
}

/// Load config from `path`, or stock defaults when no path is given.
///
/// An explicitly named file must exist.
pub fn load_config(path: Option<&Path>) -> Result<SiteConfig, ConfigError> {
    let overlay = path.map(load_raw_config).transpose()?;
    resolve_config(stock_defaults_value(), overlay)
}

/// Returns a fully-commented stock `ghtml.toml` with all keys and explanations.
///
/// Used by the `gen-config` CLI command.
pub fn stock_config_toml() -> &'static str {
    r##"# G-HTML Compiler Configuration
# =============================
# All settings are optional. Remove or comment out any you don't need.
# Values shown below are the defaults.
#
# Pass this file with `ghtml --config ghtml.toml <command>`.
# Unknown keys will cause an error.

# ---------------------------------------------------------------------------
# Content lines
# ---------------------------------------------------------------------------
[lines]
# Typed characters (after stripping tags and collapsing &escapes;) allowed
# per content line. Longer lines still render but are reported as warnings.
max_typed_chars = 54

# Whitespace written before every rendered line, to line up with the
# template's own indentation.
indentation = "    "

# Every &name; escape counts as this single character.
escape_placeholder = "#"

# ---------------------------------------------------------------------------
# Variables
# ---------------------------------------------------------------------------
# Values for %NAME% tokens. These override process environment variables
# of the same name.
[variables]
# SITE_NAME = "example"

# ---------------------------------------------------------------------------
# Output
# ---------------------------------------------------------------------------
[output]
# Extension for output files when compiling a directory tree.
# Omit to keep source file names unchanged.
# extension = "html"

# Fail the build when any warning (e.g. a too-long line) is reported.
deny_warnings = false

# ---------------------------------------------------------------------------
# Processing
# ---------------------------------------------------------------------------
[processing]
# Maximum parallel compile workers.
# Omit or comment out to auto-detect (= number of CPU cores).
# max_processes = 4
"##
}
