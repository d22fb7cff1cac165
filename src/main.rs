use clap::{Parser, Subcommand};
use ghtml::batch::{self, BuildOptions};
use ghtml::compile::Compiler;
use ghtml::config::{self, SiteConfig};
use ghtml::line::{Environment, LineOptions};
use ghtml::output;
use std::path::{Path, PathBuf};
use std::process::ExitCode;

#[derive(Parser)]
#[command(name = "ghtml")]
#[command(about = "Compiler for G-HTML terminal-style pages")]
#[command(long_about = "\
Compiler for G-HTML terminal-style pages

Every G-HTML document has a fixed envelope. Each line between the opening
and closing tag becomes one typed line on the rendered page.

  <!DOCTYPE ghtml-v0.1 \"terminal\">
  <html flavour=\"ghtml\" lang=\"en\" canonical=\"…\" title=\"…\" header=\"…\" description=\"…\">
  Hello %USER%, welcome.               # %NAME% expands from the environment
  Type <a href=\"/help.html\">help</a>.  # tags are not counted as typed text
  </html>

Content may be a single file or a directory. Directory trees are mirrored
into the output directory. Existing output files are never overwritten.

The template is an HTML file with {{ slot }} markers: lang, canonical,
title, header, description, content (required), line_count, word_count,
typed_chars.

Run 'ghtml gen-config' to generate a documented ghtml.toml.")]
#[command(version)]
struct Cli {
    /// Config file (defaults apply when omitted)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

/// Shared flags for commands that report soft failures.
#[derive(clap::Args, Clone)]
struct WarningArgs {
    /// Fail if any document produced a warning
    #[arg(long)]
    deny_warnings: bool,
}

#[derive(Subcommand)]
enum Command {
    /// Compile a document or a directory of documents
    Build {
        /// Document file or content directory
        content: PathBuf,
        /// HTML template with {{ slot }} markers
        template: PathBuf,
        /// Output file (for a document) or directory (for a content directory)
        output: PathBuf,
        #[command(flatten)]
        warnings: WarningArgs,
    },
    /// Validate documents and show line statistics without writing anything
    Check {
        /// Document file or content directory
        content: PathBuf,
        /// Print the reports as JSON
        #[arg(long)]
        json: bool,
        #[command(flatten)]
        warnings: WarningArgs,
    },
    /// Print a stock ghtml.toml with all options documented
    GenConfig,
}

fn main() -> ExitCode {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn")).init();

    match run(Cli::parse()) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("error: {err}");
            ExitCode::FAILURE
        }
    }
}

fn run(cli: Cli) -> Result<(), Box<dyn std::error::Error>> {
    match cli.command {
        Command::GenConfig => {
            print!("{}", config::stock_config_toml());
        }
        Command::Build {
            content,
            template,
            output: destination,
            warnings,
        } => {
            let (site_config, compiler) = prepare(cli.config.as_deref())?;
            let options = BuildOptions {
                extension: site_config.output.extension.clone(),
                deny_warnings: warnings.deny_warnings || site_config.output.deny_warnings,
            };
            let (tx, rx) = std::sync::mpsc::channel();
            let printer = std::thread::spawn(move || {
                let mut compiled = 0;
                for event in rx {
                    if let batch::BuildEvent::FileCompiled(_) = event {
                        compiled += 1;
                    }
                    output::print_build_event(&event, compiled);
                }
            });
            let result = batch::build(
                &compiler,
                &content,
                &template,
                &destination,
                &options,
                Some(tx),
            );
            printer
                .join()
                .map_err(|_| "output printer thread panicked")?;
            output::print_build_summary(&result?);
        }
        Command::Check {
            content,
            json,
            warnings,
        } => {
            let (site_config, compiler) = prepare(cli.config.as_deref())?;
            let deny = warnings.deny_warnings || site_config.output.deny_warnings;
            let summary = batch::check(&compiler, &content, deny)?;
            if json {
                println!("{}", serde_json::to_string_pretty(&summary)?);
            } else {
                output::print_check_report(&summary);
            }
        }
    }

    Ok(())
}

/// Load config, size the worker pool, and snapshot the process environment
/// once, with config variables on top.
fn prepare(path: Option<&Path>) -> Result<(SiteConfig, Compiler), config::ConfigError> {
    let site_config = config::load_config(path)?;
    init_thread_pool(&site_config.processing);
    let env = Environment::from_process().overlay(&site_config.variables);
    let compiler = Compiler::new(env, LineOptions::from_site_config(&site_config));
    Ok((site_config, compiler))
}

/// Size rayon's global pool, where each task compiles one document.
/// `[processing] max_processes` can lower the worker count, never raise it
/// past the core count.
fn init_thread_pool(processing: &config::ProcessingConfig) {
    let threads = config::effective_threads(processing);
    rayon::ThreadPoolBuilder::new()
        .num_threads(threads)
        .build_global()
        .ok();
}
