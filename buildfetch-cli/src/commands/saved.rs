//! Saved manifest listing.

use console::style;

use buildfetch::DownloaderConfig;

use crate::error::CliError;

/// Print the saved manifest table.
pub fn run(config: &DownloaderConfig) -> Result<(), CliError> {
    if config.saved_manifests.is_empty() {
        println!("No saved manifests configured.");
        return Ok(());
    }

    let width = config
        .saved_manifests
        .keys()
        .map(String::len)
        .max()
        .unwrap_or(0);

    println!("{}", style("Saved manifests").bold());
    for (name, id) in &config.saved_manifests {
        println!("  {:<width$}  {}", style(name).cyan(), id, width = width);
    }
    Ok(())
}
