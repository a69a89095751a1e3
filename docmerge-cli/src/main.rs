//! Command-line front end: run a merge job end to end, check PDFs, or merge
//! a single pair of files.

use std::path::{Path, PathBuf};
use std::process::ExitCode;

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use docmerge::{
    load_config, Config, IntegrityChecker, JobService, JobState, PdfMerger, Position, Submission,
    UploadedFile,
};
use tokio::sync::broadcast::error::RecvError;
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "docmerge", version, about = "Merge a converted office document into PDFs")]
struct Cli {
    /// Configuration file (JSON). Defaults to <config dir>/docmerge/config.json
    /// when that file exists, otherwise built-in defaults.
    #[arg(long, global = true, env = "DOCMERGE_CONFIG")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Convert a document and merge it into every given PDF, writing a zip.
    Run {
        #[arg(long)]
        document: PathBuf,

        #[arg(long = "pdf", required = true)]
        pdfs: Vec<PathBuf>,

        /// append, prepend or replace (unknown values mean append)
        #[arg(long)]
        position: Option<String>,

        /// Where to write the archive. Defaults to the configured download name.
        #[arg(long, short)]
        output: Option<PathBuf>,
    },
    /// Check that PDFs open and every page is readable.
    Check {
        #[arg(required = true)]
        files: Vec<PathBuf>,
    },
    /// Merge one overlay PDF into one base PDF.
    Merge {
        base: PathBuf,
        overlay: PathBuf,
        dest: PathBuf,

        #[arg(long, default_value = "append")]
        position: Position,
    },
}

/// `RUST_LOG` filtered output on stderr; `log` records from the library are
/// routed through the same subscriber.
fn init_logging() -> Result<()> {
    tracing_log::LogTracer::init().context("Failed to install log bridge")?;
    let subscriber = tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .finish();
    tracing::subscriber::set_global_default(subscriber)
        .context("Failed to install tracing subscriber")?;
    Ok(())
}

fn default_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|p| p.join("docmerge").join("config.json"))
}

fn resolve_config(explicit: Option<&Path>) -> Result<Config> {
    if let Some(path) = explicit {
        return load_config(path)
            .with_context(|| format!("Failed to load config from {}", path.display()));
    }
    match default_config_path() {
        Some(path) if path.is_file() => {
            log::info!("Using config {}", path.display());
            load_config(&path).with_context(|| format!("Failed to load {}", path.display()))
        }
        _ => Ok(Config::default()),
    }
}

fn read_upload(path: &Path) -> Result<UploadedFile> {
    let bytes = std::fs::read(path).with_context(|| format!("Cannot read {}", path.display()))?;
    let filename = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    Ok(UploadedFile::new(filename, bytes))
}

async fn run_job(
    config: Config,
    document: &Path,
    pdfs: &[PathBuf],
    position: Option<String>,
    output: Option<PathBuf>,
) -> Result<bool> {
    let service = JobService::new(config).context("Invalid configuration")?;
    let submission = Submission {
        document: read_upload(document)?,
        pdfs: pdfs.iter().map(|p| read_upload(p)).collect::<Result<_>>()?,
        position,
    };

    let mut events = service.subscribe();
    let job_id = service.submit(submission).await?;
    println!("Job {}", job_id);

    loop {
        match events.recv().await {
            Ok(event) if event.job_id == job_id => {
                println!("[{:>3}%] {}", event.progress, event.message);
                if event.is_terminal() {
                    break;
                }
            }
            Ok(_) => {}
            Err(RecvError::Lagged(skipped)) => {
                log::debug!("Skipped {} progress events", skipped);
                if service.poll(&job_id).is_some_and(|v| v.state != JobState::Processing) {
                    break;
                }
            }
            Err(RecvError::Closed) => break,
        }
    }

    let job = service
        .job(&job_id)
        .context("Job disappeared before it finished")?;
    for failed in &job.failed_files {
        println!("  failed: {} ({})", failed.filename, failed.reason);
    }

    let succeeded = job.state == JobState::Completed;
    if succeeded {
        let archive = service.fetch(&job_id).await?;
        let dest = output.unwrap_or_else(|| PathBuf::from(&archive.download_name));
        std::fs::write(&dest, &archive.bytes)
            .with_context(|| format!("Cannot write {}", dest.display()))?;
        println!("Wrote {}", dest.display());
    }

    service.purge(&job_id).await;
    Ok(succeeded)
}

fn check_files(files: &[PathBuf]) -> bool {
    let checker = IntegrityChecker::new();
    let mut all_valid = true;
    for file in files {
        match checker.check(file) {
            docmerge::Integrity::Valid { pages } => {
                println!("{}: valid ({} pages)", file.display(), pages)
            }
            docmerge::Integrity::Invalid { reason } => {
                all_valid = false;
                println!("{}: invalid ({})", file.display(), reason)
            }
        }
    }
    all_valid
}

#[tokio::main]
async fn main() -> Result<ExitCode> {
    let cli = Cli::parse();
    init_logging()?;

    let ok = match cli.command {
        Command::Run {
            document,
            pdfs,
            position,
            output,
        } => {
            let config = resolve_config(cli.config.as_deref())?;
            run_job(config, &document, &pdfs, position, output).await?
        }
        Command::Check { files } => check_files(&files),
        Command::Merge {
            base,
            overlay,
            dest,
            position,
        } => {
            let summary = PdfMerger::new().merge(&base, &overlay, &dest, position)?;
            let integrity = IntegrityChecker::new().check(&dest);
            if !integrity.is_valid() {
                bail!("Merged output {} failed validation: {:?}", dest.display(), integrity);
            }
            println!("Wrote {} ({} pages)", dest.display(), summary.pages);
            true
        }
    };

    Ok(if ok { ExitCode::SUCCESS } else { ExitCode::FAILURE })
}
