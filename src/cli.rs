use std::path::PathBuf;

use clap::{Parser, Subcommand};

#[derive(Parser)]
#[clap(author, version, about, long_about = None)]
pub struct Cli {
    #[clap(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    #[clap(
        about = "Upload files to the project's remote target over SFTP",
        name = "up",
        display_order = 1
    )]
    Up {
        #[clap(num_args = 1.., required = true, help = "Local files to upload")]
        files: Vec<PathBuf>,
        #[clap(short, long, help = "Print verbose diagnostic logs for debugging")]
        verbose: bool,
        #[clap(long, help = "Emit a single-line JSON summary")]
        json: bool,
        #[clap(short, long, help = "Suppress per-file status lines")]
        quiet: bool,
    },
    #[clap(
        about = "Resolve and validate the nearest sftp.json without connecting",
        name = "check",
        display_order = 2
    )]
    Check {
        #[clap(default_value = ".", help = "File or directory to resolve from")]
        path: PathBuf,
    },
}
