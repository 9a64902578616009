//! File listing for a build.

use console::style;

use buildfetch::DownloaderConfig;

use super::common::{build_downloader, format_size, SourceArgs};
use crate::error::CliError;

/// Arguments for the files command.
pub struct FilesArgs {
    pub source: SourceArgs,
    pub filter: Option<String>,
}

/// List the files of a build with their sizes.
pub async fn run(config: DownloaderConfig, args: FilesArgs) -> Result<(), CliError> {
    let downloader = build_downloader(config, &args.source)?;
    let manifest = downloader.manifest(false).await?;

    if let Some(version) = &manifest.build_version {
        println!("Build: {}", style(version).bold());
    }

    let mut count = 0usize;
    let mut total = 0u64;
    for (name, file) in &manifest.files {
        if let Some(filter) = &args.filter {
            if !name.contains(filter.as_str()) {
                continue;
            }
        }
        count += 1;
        total += file.len();
        println!("{:>12}  {}", format_size(file.len()), name);
    }

    println!();
    println!("{} files, {}", count, style(format_size(total)).bold());
    Ok(())
}
