//! modkit - fetch, unpack and publish mod packages

use anyhow::Result;
use clap::Parser;
use tracing_subscriber::EnvFilter;

use modkit_cli::cmd;
use modkit_cli::{Cli, Commands};

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let quiet = cli.quiet;

    match cli.command {
        Commands::Install {
            urls,
            dest,
            checksum,
            filename,
            required,
            case_fix,
            no_case_fix,
        } => {
            let opts = cmd::install::InstallArgs {
                urls,
                dest,
                checksum,
                filename,
                required,
                case_fix: cmd::case_override(case_fix, no_case_fix),
            };
            cmd::install::install(opts, quiet).await
        }
        Commands::Extract {
            archive,
            out,
            overwrite,
            entries,
        } => cmd::extract::extract(&archive, &out, overwrite, entries),
        Commands::Probe { path } => cmd::probe::probe(&path),
        Commands::Merge {
            src,
            dest,
            case_fix,
            no_case_fix,
        } => cmd::merge::merge(&src, &dest, cmd::case_override(case_fix, no_case_fix)),
        Commands::Resolve { path } => {
            cmd::resolve::resolve(&path);
            Ok(())
        }
        Commands::Hash { files } => cmd::hash::hash(&files),
        Commands::Publish { release, artifacts } => {
            cmd::publish::publish(&release, &artifacts, quiet).await
        }
    }
}
