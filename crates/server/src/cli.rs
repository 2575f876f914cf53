use std::path::PathBuf;

use clap::Parser;

#[derive(Parser)]
#[command(about, version)]
pub(crate) struct Cli {
    /// Path to the configuration file.
    #[arg(long)]
    pub config: Option<PathBuf>,
}
