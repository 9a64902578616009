//! BuildFetch CLI - Command-line interface
//!
//! Lists saved manifests, browses build file lists and downloads builds
//! through the `buildfetch` library.

mod commands;
mod error;

use std::path::PathBuf;
use std::process::ExitCode;

use clap::{ArgAction, Parser, Subcommand};
use console::style;

use buildfetch::{init_logging, LoggingConfig};

use commands::common::{load_config, SourceArgs};
use commands::download::DownloadArgs;
use commands::files::FilesArgs;
use error::CliError;

#[derive(Debug, Parser)]
#[command(name = "buildfetch", version, about = "Browse and download chunked CDN builds")]
struct Cli {
    /// Path to config.ini (default: <config dir>/buildfetch/config.ini)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Increase log verbosity (-v, -vv)
    #[arg(short, long, action = ArgAction::Count, global = true)]
    verbose: u8,

    /// Also write logs to a daily rolling file in this directory
    #[arg(long, global = true)]
    log_dir: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// List saved manifests
    Saved,

    /// List the files of a build
    Files {
        #[command(flatten)]
        source: SourceArgs,

        /// Only list files whose name contains this text
        #[arg(long)]
        filter: Option<String>,
    },

    /// Download files of a build
    Download {
        #[command(flatten)]
        source: SourceArgs,

        /// Output directory
        #[arg(long, short)]
        out: PathBuf,

        /// Parallel chunk fetches per file
        #[arg(long, short = 'j')]
        concurrency: Option<usize>,

        /// Persistent chunk cache directory
        #[arg(long)]
        cache_dir: Option<PathBuf>,

        /// Skip the confirmation prompt
        #[arg(long, short)]
        yes: bool,

        /// Files to download (default: all)
        files: Vec<String>,
    },
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    let mut logging = LoggingConfig::verbose(cli.verbose);
    if let Some(dir) = cli.log_dir.clone() {
        logging = logging.with_log_dir(dir);
    }
    let _guard = match init_logging(&logging) {
        Ok(guard) => Some(guard),
        Err(e) => {
            eprintln!("{} {}", style("warning:").yellow(), e);
            None
        }
    };

    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("{} {}", style("error:").red().bold(), e);
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> Result<(), CliError> {
    let config = load_config(cli.config.as_deref())?;

    match cli.command {
        Commands::Saved => commands::saved::run(&config),
        Commands::Files { source, filter } => {
            commands::files::run(config, FilesArgs { source, filter }).await
        }
        Commands::Download {
            source,
            out,
            concurrency,
            cache_dir,
            yes,
            files,
        } => {
            commands::download::run(
                config,
                DownloadArgs {
                    source,
                    out,
                    concurrency,
                    cache_dir,
                    yes,
                    files,
                },
            )
            .await
        }
    }
}
