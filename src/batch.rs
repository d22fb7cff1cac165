//! Batch driver: compiling a file or a whole content tree.
//!
//! ## Modes
//!
//! The kind of filesystem entry behind the content argument picks the mode:
//!
//! - **Single file**: the document is compiled to exactly the output path.
//! - **Directory tree**: every file below the content directory is compiled
//!   to the same root-relative path below the output directory.
//!
//! ```text
//! content/                     site/
//! ├── index.ghtml        →     ├── index.ghtml   (or index.html with output.extension)
//! └── notes/                   └── notes/
//!     └── first.ghtml    →         └── first.ghtml
//! ```
//!
//! If the output already exists it must be the same kind of entry as the
//! content. Output files are always created fresh: an existing file is never
//! overwritten, and missing parent directories are created.
//!
//! ## Parallel Processing
//!
//! The tree is walked first, then files are compiled in parallel with
//! [rayon](https://docs.rs/rayon). Each worker reads, compiles and writes its
//! own file; only the template and the [`Compiler`] are shared, read-only.
//! The first error stops the run. Files already written stay on disk.

use crate::compile::{Analysis, CompileError, Compiler, Warning};
use crate::metadata::PageMetadata;
use crate::render::{PageRenderer, TemplateData};
use log::{debug, info};
use rayon::prelude::*;
use serde::Serialize;
use std::fs::{self, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::mpsc::Sender;
use thiserror::Error;
use walkdir::WalkDir;

#[derive(Error, Debug)]
pub enum BatchError {
    #[error("{}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("the template ({}) cannot be a directory", .0.display())]
    TemplateIsDirectory(PathBuf),
    #[error(
        "filesystem type (file vs directory) of the output {} must match that of the content {}",
        output.display(),
        content.display()
    )]
    TypeMismatch { content: PathBuf, output: PathBuf },
    #[error("refusing to overwrite existing output file {}", .0.display())]
    OutputExists(PathBuf),
    #[error("directory walk failed: {0}")]
    Walk(#[from] walkdir::Error),
    #[error(transparent)]
    Compile(#[from] CompileError),
    #[error("{count} warning(s) reported while warnings are denied")]
    WarningsDenied { count: usize },
}

fn io_error(path: &Path) -> impl FnOnce(io::Error) -> BatchError + '_ {
    move |source| BatchError::Io {
        path: path.to_path_buf(),
        source,
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Mode {
    SingleFile,
    DirectoryTree,
}

/// One source file and where its output goes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Job {
    pub source: PathBuf,
    pub output: PathBuf,
}

/// Driver options that are not part of compilation itself.
#[derive(Debug, Clone, Default)]
pub struct BuildOptions {
    /// Extension for output files in directory mode. `None` mirrors names.
    pub extension: Option<String>,
    /// Fail after the run if any warning was reported.
    pub deny_warnings: bool,
}

/// What happened to one file.
#[derive(Debug, Clone, Serialize)]
pub struct FileReport {
    pub source: PathBuf,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub output: Option<PathBuf>,
    pub metadata: PageMetadata,
    pub line_count: usize,
    pub word_count: usize,
    pub typed_chars: usize,
    /// Typed length per content line, in order.
    pub typed_lengths: Vec<usize>,
    pub bytes_written: usize,
    pub warnings: Vec<Warning>,
}

impl FileReport {
    fn new(source: PathBuf, output: Option<PathBuf>, analysis: Analysis, bytes: usize) -> Self {
        Self {
            source,
            output,
            line_count: analysis.lines.len(),
            word_count: analysis.word_count(),
            typed_chars: analysis.typed_chars(),
            typed_lengths: analysis.lines.iter().map(|l| l.typed_length).collect(),
            bytes_written: bytes,
            metadata: analysis.metadata,
            warnings: analysis.warnings,
        }
    }
}

/// Progress events streamed while a run is in flight.
#[derive(Debug, Clone)]
pub enum BuildEvent {
    Started { mode: Mode, files: usize },
    FileCompiled(FileReport),
}

/// Result of a whole run.
#[derive(Debug, Clone, Serialize)]
pub struct BuildSummary {
    pub mode: Mode,
    /// Reports in walk order.
    pub reports: Vec<FileReport>,
}

impl BuildSummary {
    pub fn warning_count(&self) -> usize {
        self.reports.iter().map(|r| r.warnings.len()).sum()
    }

    pub fn line_count(&self) -> usize {
        self.reports.iter().map(|r| r.line_count).sum()
    }

    pub fn word_count(&self) -> usize {
        self.reports.iter().map(|r| r.word_count).sum()
    }

    fn deny_warnings(self, deny: bool) -> Result<Self, BatchError> {
        match self.warning_count() {
            count if deny && count > 0 => Err(BatchError::WarningsDenied { count }),
            _ => Ok(self),
        }
    }
}

/// Load the template, rejecting directories.
pub fn load_template(path: &Path) -> Result<TemplateData, BatchError> {
    let meta = fs::metadata(path).map_err(io_error(path))?;
    if meta.is_dir() {
        return Err(BatchError::TemplateIsDirectory(path.to_path_buf()));
    }
    TemplateData::load(path).map_err(io_error(path))
}

/// Resolve the mode and the list of jobs for `content` → `output`.
pub fn plan(
    content: &Path,
    output: &Path,
    extension: Option<&str>,
) -> Result<(Mode, Vec<Job>), BatchError> {
    let content_is_dir = fs::metadata(content).map_err(io_error(content))?.is_dir();
    match fs::metadata(output) {
        Ok(meta) if meta.is_dir() != content_is_dir => {
            return Err(BatchError::TypeMismatch {
                content: content.to_path_buf(),
                output: output.to_path_buf(),
            });
        }
        Ok(_) => {}
        Err(e) if e.kind() == io::ErrorKind::NotFound => {}
        Err(e) => return Err(io_error(output)(e)),
    }

    if !content_is_dir {
        let job = Job {
            source: content.to_path_buf(),
            output: output.to_path_buf(),
        };
        return Ok((Mode::SingleFile, vec![job]));
    }

    let jobs = discover(content)?
        .into_iter()
        .map(|source| {
            let output = mirror_path(content, &source, output, extension);
            Job { source, output }
        })
        .collect();
    Ok((Mode::DirectoryTree, jobs))
}

/// All files below `root`, sorted by path. A file `root` yields itself.
pub fn discover(root: &Path) -> Result<Vec<PathBuf>, BatchError> {
    let mut files = Vec::new();
    for entry in WalkDir::new(root).sort_by_file_name() {
        let entry = entry?;
        if entry.file_type().is_file() {
            files.push(entry.into_path());
        }
    }
    Ok(files)
}

/// Map `source` (somewhere below `content_root`) to the same relative
/// location below `output_root`.
pub fn mirror_path(
    content_root: &Path,
    source: &Path,
    output_root: &Path,
    extension: Option<&str>,
) -> PathBuf {
    let relative = source.strip_prefix(content_root).unwrap_or(source);
    let mut target = output_root.join(relative);
    if let Some(ext) = extension {
        target.set_extension(ext);
    }
    target
}

/// Create `path` (and its parents) and write `bytes`. Never overwrites.
pub fn write_exclusive(path: &Path, bytes: &[u8]) -> Result<(), BatchError> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent).map_err(io_error(parent))?;
    }
    let mut file = OpenOptions::new()
        .write(true)
        .create_new(true)
        .open(path)
        .map_err(|e| match e.kind() {
            io::ErrorKind::AlreadyExists => BatchError::OutputExists(path.to_path_buf()),
            _ => io_error(path)(e),
        })?;
    file.write_all(bytes).map_err(io_error(path))
}

/// Compile `content` into `output` using the template at `template_path`.
///
/// Events are sent as files complete, in completion order. Returned reports
/// are in walk order.
pub fn build<R: PageRenderer + Sync>(
    compiler: &Compiler<R>,
    content: &Path,
    template_path: &Path,
    output: &Path,
    options: &BuildOptions,
    events: Option<Sender<BuildEvent>>,
) -> Result<BuildSummary, BatchError> {
    let template = load_template(template_path)?;
    let (mode, jobs) = plan(content, output, options.extension.as_deref())?;
    info!(
        "compiling {} file(s) from {} into {}",
        jobs.len(),
        content.display(),
        output.display()
    );
    if let Some(tx) = &events {
        tx.send(BuildEvent::Started {
            mode,
            files: jobs.len(),
        })
        .ok();
    }

    let reports = jobs
        .par_iter()
        .map(|job| {
            let report = compile_job(compiler, &template, job)?;
            if let Some(tx) = &events {
                tx.send(BuildEvent::FileCompiled(report.clone())).ok();
            }
            Ok(report)
        })
        .collect::<Result<Vec<_>, BatchError>>()?;

    BuildSummary { mode, reports }.deny_warnings(options.deny_warnings)
}

fn compile_job<R: PageRenderer>(
    compiler: &Compiler<R>,
    template: &TemplateData,
    job: &Job,
) -> Result<FileReport, BatchError> {
    debug!("{} -> {}", job.source.display(), job.output.display());
    let raw = fs::read(&job.source).map_err(io_error(&job.source))?;
    let label = job.source.display().to_string();
    let compiled = compiler.compile(&raw, template, &label)?;
    write_exclusive(&job.output, &compiled.output)?;
    Ok(FileReport::new(
        job.source.clone(),
        Some(job.output.clone()),
        compiled.analysis,
        compiled.output.len(),
    ))
}

/// Validate and analyse every document below `content` without writing.
pub fn check<R: PageRenderer + Sync>(
    compiler: &Compiler<R>,
    content: &Path,
    deny_warnings: bool,
) -> Result<BuildSummary, BatchError> {
    let mode = if fs::metadata(content).map_err(io_error(content))?.is_dir() {
        Mode::DirectoryTree
    } else {
        Mode::SingleFile
    };
    let sources = discover(content)?;
    info!("checking {} file(s) in {}", sources.len(), content.display());

    let reports = sources
        .par_iter()
        .map(|source| {
            debug!("checking {}", source.display());
            let raw = fs::read(source).map_err(io_error(source))?;
            let analysis = compiler.analyze(&raw, &source.display().to_string())?;
            Ok(FileReport::new(source.clone(), None, analysis, 0))
        })
        .collect::<Result<Vec<_>, BatchError>>()?;

    BuildSummary { mode, reports }.deny_warnings(deny_warnings)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::line::{Environment, LineOptions};
    use crate::test_helpers::*;
    use tempfile::TempDir;

    fn compiler() -> Compiler {
        Compiler::new(Environment::new(), LineOptions::default())
    }

    // =========================================================================
    // Path mirroring
    // =========================================================================

    #[test]
    fn mirror_path_keeps_relative_layout() {
        let out = mirror_path(
            Path::new("content"),
            Path::new("content/notes/first.ghtml"),
            Path::new("site"),
            None,
        );
        assert_eq!(out, PathBuf::from("site/notes/first.ghtml"));
    }

    #[test]
    fn mirror_path_rewrites_extension() {
        let out = mirror_path(
            Path::new("content"),
            Path::new("content/index.ghtml"),
            Path::new("site"),
            Some("html"),
        );
        assert_eq!(out, PathBuf::from("site/index.html"));
    }

    #[test]
    fn mirror_path_handles_dot_prefixed_roots() {
        let out = mirror_path(
            Path::new("./content"),
            Path::new("./content/a/b.ghtml"),
            Path::new("out"),
            None,
        );
        assert_eq!(out, PathBuf::from("out/a/b.ghtml"));

        let out = mirror_path(Path::new("."), Path::new("./b.ghtml"), Path::new("out"), None);
        assert_eq!(out, PathBuf::from("out/b.ghtml"));
    }

    // =========================================================================
    // Planning
    // =========================================================================

    #[test]
    fn plan_single_file() {
        let tmp = TempDir::new().unwrap();
        let source = tmp.path().join("page.ghtml");
        fs::write(&source, document(&["x"])).unwrap();
        let output = tmp.path().join("out/page.html");

        let (mode, jobs) = plan(&source, &output, Some("ignored")).unwrap();
        assert_eq!(mode, Mode::SingleFile);
        assert_eq!(jobs, vec![Job { source, output }]);
    }

    #[test]
    fn plan_tree_is_sorted_and_mirrored() {
        let tmp = setup_fixtures();
        let content = tmp.path().join("site");
        let output = tmp.path().join("out");

        let (mode, jobs) = plan(&content, &output, None).unwrap();
        assert_eq!(mode, Mode::DirectoryTree);
        let outputs: Vec<_> = jobs
            .iter()
            .map(|j| j.output.strip_prefix(&output).unwrap().to_path_buf())
            .collect();
        assert_eq!(
            outputs,
            vec![
                PathBuf::from("index.ghtml"),
                PathBuf::from("notes/first.ghtml"),
                PathBuf::from("notes/second.ghtml"),
            ]
        );
    }

    #[test]
    fn plan_rejects_file_output_for_directory_content() {
        let tmp = setup_fixtures();
        let output = tmp.path().join("taken.html");
        fs::write(&output, "").unwrap();

        let err = plan(&tmp.path().join("site"), &output, None).unwrap_err();
        assert!(matches!(err, BatchError::TypeMismatch { .. }));
    }

    #[test]
    fn plan_rejects_directory_output_for_file_content() {
        let tmp = setup_fixtures();
        let err = plan(
            &tmp.path().join("site/index.ghtml"),
            &tmp.path().join("site/notes"),
            None,
        )
        .unwrap_err();
        assert!(matches!(err, BatchError::TypeMismatch { .. }));
    }

    #[test]
    fn plan_missing_content_is_io_error() {
        let tmp = TempDir::new().unwrap();
        let err = plan(&tmp.path().join("nope"), &tmp.path().join("out"), None).unwrap_err();
        assert!(matches!(err, BatchError::Io { .. }));
    }

    // =========================================================================
    // Writing
    // =========================================================================

    #[test]
    fn write_exclusive_creates_parents() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("a/b/c.html");
        write_exclusive(&path, b"hello").unwrap();
        assert_eq!(fs::read(&path).unwrap(), b"hello");
    }

    #[test]
    fn write_exclusive_never_overwrites() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("c.html");
        fs::write(&path, "original").unwrap();

        let err = write_exclusive(&path, b"new").unwrap_err();
        assert!(matches!(err, BatchError::OutputExists(_)));
        assert_eq!(fs::read_to_string(&path).unwrap(), "original");
    }

    #[test]
    fn load_template_rejects_directory() {
        let tmp = TempDir::new().unwrap();
        let err = load_template(tmp.path()).unwrap_err();
        assert!(matches!(err, BatchError::TemplateIsDirectory(_)));
    }

    // =========================================================================
    // Build
    // =========================================================================

    #[test]
    fn build_tree_writes_every_file() {
        let tmp = setup_fixtures();
        let output = tmp.path().join("out");
        let summary = build(
            &compiler(),
            &tmp.path().join("site"),
            &tmp.path().join("template.html"),
            &output,
            &BuildOptions {
                extension: Some("html".to_string()),
                deny_warnings: false,
            },
            None,
        )
        .unwrap();

        assert_eq!(summary.mode, Mode::DirectoryTree);
        assert_eq!(summary.reports.len(), 3);
        for rel in ["index.html", "notes/first.html", "notes/second.html"] {
            let html = fs::read_to_string(output.join(rel)).unwrap();
            assert!(html.contains("typing-animator"), "{rel} was not rendered");
        }
        let index = fs::read_to_string(output.join("index.html")).unwrap();
        assert!(index.contains("<title>Home</title>"));
    }

    #[test]
    fn build_reports_soft_failures() {
        let tmp = setup_fixtures();
        let summary = build(
            &compiler(),
            &tmp.path().join("site"),
            &tmp.path().join("template.html"),
            &tmp.path().join("out"),
            &BuildOptions::default(),
            None,
        )
        .unwrap();

        // notes/second.ghtml carries one over-long line.
        assert_eq!(summary.warning_count(), 1);
        let second = &summary.reports[2];
        assert!(second.source.ends_with("notes/second.ghtml"));
        assert!(matches!(second.warnings[0], Warning::LineTooLong(_)));
    }

    #[test]
    fn build_denies_warnings_when_asked() {
        let tmp = setup_fixtures();
        let err = build(
            &compiler(),
            &tmp.path().join("site"),
            &tmp.path().join("template.html"),
            &tmp.path().join("out"),
            &BuildOptions {
                extension: None,
                deny_warnings: true,
            },
            None,
        )
        .unwrap_err();
        assert!(matches!(err, BatchError::WarningsDenied { count: 1 }));
    }

    #[test]
    fn build_single_file() {
        let tmp = setup_fixtures();
        let output = tmp.path().join("single/index.html");
        let summary = build(
            &compiler(),
            &tmp.path().join("site/index.ghtml"),
            &tmp.path().join("template.html"),
            &output,
            &BuildOptions::default(),
            None,
        )
        .unwrap();

        assert_eq!(summary.mode, Mode::SingleFile);
        assert_eq!(
            summary.reports[0].bytes_written,
            fs::metadata(&output).unwrap().len() as usize
        );
    }

    #[test]
    fn build_fails_on_existing_output_file() {
        let tmp = setup_fixtures();
        let output = tmp.path().join("out");
        fs::create_dir_all(output.join("notes")).unwrap();
        fs::write(output.join("notes/first.ghtml"), "keep me").unwrap();

        let err = build(
            &compiler(),
            &tmp.path().join("site"),
            &tmp.path().join("template.html"),
            &output,
            &BuildOptions::default(),
            None,
        )
        .unwrap_err();
        assert!(matches!(err, BatchError::OutputExists(_)));
        assert_eq!(
            fs::read_to_string(output.join("notes/first.ghtml")).unwrap(),
            "keep me"
        );
    }

    #[test]
    fn build_fails_fast_on_invalid_document() {
        let tmp = setup_fixtures();
        fs::write(tmp.path().join("site/broken.ghtml"), "<!DOCTYPE html>").unwrap();

        let err = build(
            &compiler(),
            &tmp.path().join("site"),
            &tmp.path().join("template.html"),
            &tmp.path().join("out"),
            &BuildOptions::default(),
            None,
        )
        .unwrap_err();
        assert!(matches!(err, BatchError::Compile(CompileError::Structure(_))));
    }

    #[test]
    fn build_streams_events() {
        let tmp = setup_fixtures();
        let (tx, rx) = std::sync::mpsc::channel();
        build(
            &compiler(),
            &tmp.path().join("site"),
            &tmp.path().join("template.html"),
            &tmp.path().join("out"),
            &BuildOptions::default(),
            Some(tx),
        )
        .unwrap();

        let events: Vec<BuildEvent> = rx.iter().collect();
        assert!(matches!(
            events[0],
            BuildEvent::Started {
                mode: Mode::DirectoryTree,
                files: 3
            }
        ));
        let compiled = events
            .iter()
            .filter(|e| matches!(e, BuildEvent::FileCompiled(_)))
            .count();
        assert_eq!(compiled, 3);
    }

    // =========================================================================
    // Check
    // =========================================================================

    #[test]
    fn check_writes_nothing() {
        let tmp = setup_fixtures();
        let before = discover(tmp.path()).unwrap();
        let summary = check(&compiler(), &tmp.path().join("site"), false).unwrap();
        assert_eq!(summary.reports.len(), 3);
        assert!(summary.reports.iter().all(|r| r.output.is_none()));
        assert_eq!(discover(tmp.path()).unwrap(), before);
    }

    #[test]
    fn check_single_file() {
        let tmp = setup_fixtures();
        let summary = check(&compiler(), &tmp.path().join("site/index.ghtml"), false).unwrap();
        assert_eq!(summary.mode, Mode::SingleFile);
        assert_eq!(summary.reports[0].metadata.title, "Home");
    }

    #[test]
    fn check_denies_warnings_when_asked() {
        let tmp = setup_fixtures();
        let err = check(&compiler(), &tmp.path().join("site"), true).unwrap_err();
        assert!(matches!(err, BatchError::WarningsDenied { count: 1 }));
    }
}
