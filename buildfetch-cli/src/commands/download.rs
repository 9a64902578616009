//! Download command.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use console::style;
use dialoguer::Confirm;
use indicatif::{ProgressBar, ProgressStyle};
use tokio_util::sync::CancellationToken;
use tracing::warn;

use buildfetch::{DownloadError, DownloaderConfig, FileOutcome, ProgressCallback, ProgressUpdate};

use super::common::{build_downloader, format_size, SourceArgs};
use crate::error::CliError;

const BAR_TEMPLATE: &str =
    "{spinner:.blue} [{elapsed_precise}] {wide_bar:.cyan/blue} {bytes}/{total_bytes} ({bytes_per_sec}, {eta}) {msg}";

/// Arguments for the download command.
pub struct DownloadArgs {
    pub source: SourceArgs,
    pub out: PathBuf,
    pub concurrency: Option<usize>,
    pub cache_dir: Option<PathBuf>,
    pub yes: bool,
    pub files: Vec<String>,
}

/// Download files of a build with a progress bar. Ctrl+C cancels.
pub async fn run(mut config: DownloaderConfig, args: DownloadArgs) -> Result<(), CliError> {
    if let Some(concurrency) = args.concurrency {
        config = config.with_concurrency(concurrency);
    }
    if let Some(dir) = args.cache_dir.clone() {
        config = config.with_cache_dir(dir);
    }

    let downloader = build_downloader(config, &args.source)?;
    let manifest = downloader.manifest(false).await?;

    let files: Vec<String> = if args.files.is_empty() {
        manifest.file_names().map(str::to_string).collect()
    } else {
        args.files.clone()
    };
    for name in files.iter().filter(|n| manifest.file(n).is_none()) {
        warn!(file = %name, "Not in manifest");
    }
    let total = manifest.total_size(files.iter().map(String::as_str));

    println!(
        "Downloading {} files ({}) to {}",
        files.len(),
        style(format_size(total)).bold(),
        args.out.display()
    );
    if !args.yes && !confirm("Continue?")? {
        return Err(CliError::Cancelled);
    }

    let cancel = CancellationToken::new();
    let handler_token = cancel.clone();
    ctrlc::set_handler(move || {
        eprintln!();
        eprintln!("Cancelling download...");
        handler_token.cancel();
    })
    .map_err(|e| CliError::Config(format!("Failed to set signal handler: {}", e)))?;

    let bar = progress_bar(total);
    let outcomes = downloader
        .download(&files, &args.out, Some(progress_callback(&bar)), cancel.clone())
        .await?;
    bar.finish_and_clear();

    report(&outcomes);
    let failed = outcomes.iter().filter(|o| !o.is_ok()).count();
    if cancel.is_cancelled() {
        Err(CliError::Cancelled)
    } else if failed > 0 {
        Err(CliError::Incomplete {
            failed,
            total: outcomes.len(),
        })
    } else {
        Ok(())
    }
}

fn confirm(prompt: &str) -> Result<bool, CliError> {
    Confirm::new()
        .with_prompt(prompt)
        .default(true)
        .interact()
        .map_err(|e| CliError::Prompt(e.to_string()))
}

fn progress_bar(total: u64) -> ProgressBar {
    let bar = ProgressBar::new(total);
    if let Ok(style) = ProgressStyle::with_template(BAR_TEMPLATE) {
        bar.set_style(style);
    }
    bar.enable_steady_tick(Duration::from_millis(120));
    bar
}

fn progress_callback(bar: &ProgressBar) -> ProgressCallback {
    let bar = bar.clone();
    Arc::new(move |update: &ProgressUpdate| {
        bar.set_position(update.total_bytes);
        bar.set_message(update.file.clone());
    })
}

fn report(outcomes: &[FileOutcome]) {
    let ok = outcomes.iter().filter(|o| o.is_ok()).count();
    println!(
        "{} {} of {} files downloaded",
        style("✓").green(),
        ok,
        outcomes.len()
    );

    for outcome in outcomes {
        match &outcome.result {
            Ok(_) => {}
            Err(DownloadError::Cancelled) => {
                println!("  {} {} (cancelled)", style("-").yellow(), outcome.name)
            }
            Err(e) => println!("  {} {}: {}", style("✗").red(), outcome.name, e),
        }
    }
}
