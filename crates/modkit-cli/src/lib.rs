//! modkit - fetch, unpack and publish mod packages
#![allow(missing_docs)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::doc_markdown)]
//!
//! # Overview
//!
//! `modkit install` downloads an archive from one of its mirrors, checks it,
//! unpacks it with an external 7-Zip compatible tool and merges the result
//! into a mod folder. Names that only differ in case are folded onto the
//! casing already on disk, so packages built on case-insensitive systems
//! install cleanly everywhere.
//!
//! # Directory Layout
//!
//! ```text
//! ~/.modkit/
//! ├── config.toml # api_url, token, seven_zip, case_fix
//! └── tmp/        # Per-install scratch directories
//! ```

pub mod cmd;
pub mod ui;

pub use modkit_core::USER_AGENT;
pub use modkit_core::paths::*;

use clap::{Parser, Subcommand};
use modkit_core::tree::CaseFix;
use std::path::PathBuf;

#[derive(Debug, Parser)]
#[command(name = "modkit")]
#[command(author, version, about = "modkit - fetch, unpack and publish mod packages")]
pub struct Cli {
    /// Suppress progress output
    #[arg(short, long, global = true)]
    pub quiet: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Download an archive and install its contents into a folder
    Install {
        /// Mirror URLs serving the same archive
        #[arg(required = true)]
        urls: Vec<String>,
        /// Destination folder
        #[arg(long)]
        dest: PathBuf,
        /// Expected SHA256 of the archive
        #[arg(long)]
        checksum: Option<String>,
        /// Local archive name (decides single or two-pass extraction)
        #[arg(long)]
        filename: Option<String>,
        /// Files that must be present in the archive
        #[arg(long = "require")]
        required: Vec<String>,
        /// Case folding policy: off, top-level or recursive
        #[arg(long, value_name = "POLICY")]
        case_fix: Option<CaseFix>,
        /// Same as --case-fix off
        #[arg(long, conflicts_with = "case_fix")]
        no_case_fix: bool,
    },
    /// Extract an archive with the configured tool
    Extract {
        /// Archive to unpack
        archive: PathBuf,
        /// Output directory
        out: PathBuf,
        /// Overwrite existing files without prompting
        #[arg(short = 'y', long)]
        overwrite: bool,
        /// Only extract these entries
        entries: Vec<String>,
    },
    /// Check whether the extraction tool recognises a file as an archive
    Probe {
        /// File to check
        path: PathBuf,
    },
    /// Move a directory tree into another, folding case-variant names
    Merge {
        /// Source tree (files are moved out of it)
        src: PathBuf,
        /// Destination tree
        dest: PathBuf,
        /// Case folding policy: off, top-level or recursive
        #[arg(long, value_name = "POLICY")]
        case_fix: Option<CaseFix>,
        /// Same as --case-fix off
        #[arg(long, conflicts_with = "case_fix")]
        no_case_fix: bool,
    },
    /// Print the on-disk casing of a path
    Resolve {
        /// Path to resolve
        path: PathBuf,
    },
    /// Compute SHA256 hash of a file
    Hash {
        /// Files to hash
        #[arg(required = true)]
        files: Vec<PathBuf>,
    },
    /// Upload release artifacts and create the release
    Publish {
        /// JSON file describing the release
        #[arg(long)]
        release: PathBuf,
        /// Artifacts as field=path pairs
        #[arg(required = true)]
        artifacts: Vec<String>,
    },
}
