use clap::Parser;

use upsync::cli::{Cli, Commands};

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    match cli.command {
        Commands::Up { files, verbose, json, quiet } => {
            // keep the appender guard alive until the process exits
            let _guard = if verbose { upsync::util::init_verbose_logging() } else { None };
            upsync::commands::handle_up(files, json, quiet)
        }
        Commands::Check { path } => upsync::commands::handle_check(path),
    }
}
