// ecert-cache — CLI Module
//
// Command-line interface using clap derive macros.
// Subcommands: init, path, get, show, list, purge.

mod commands;

use std::path::PathBuf;

use clap::{Parser, Subcommand};

use crate::store::STORE_DIR_ENV;

pub use commands::execute;

/// ecert-cache — Local enrollment certificate cache for validator nodes.
#[derive(Parser, Debug)]
#[command(name = "ecert-cache")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Directory holding the certificate store.
    #[arg(long, global = true, env = STORE_DIR_ENV)]
    pub store_dir: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Create the store directory, database file, and table if missing.
    Init,

    /// Print the resolved store file path.
    Path,

    /// Return an identity's certificate, fetching and caching it on a miss.
    Get {
        /// The identity, as UTF-8 text (or base64 with --base64).
        identity: String,

        /// Treat IDENTITY as base64-encoded raw bytes.
        #[arg(long)]
        base64: bool,

        /// On a miss, read the certificate from this file.
        #[arg(long, conflicts_with = "fetch_cmd", required_unless_present = "fetch_cmd")]
        cert_file: Option<PathBuf>,

        /// On a miss, run the command given after `--` with the base64
        /// identity appended and use its stdout as the certificate.
        #[arg(last = true, value_name = "FETCH_CMD")]
        fetch_cmd: Vec<String>,

        /// Write the certificate bytes to this file.
        #[arg(long)]
        out: Option<PathBuf>,
    },

    /// Show a cached certificate without fetching.
    Show {
        /// The identity, as UTF-8 text (or base64 with --base64).
        identity: String,

        /// Treat IDENTITY as base64-encoded raw bytes.
        #[arg(long)]
        base64: bool,
    },

    /// List cached certificates.
    List {
        /// Emit JSON instead of a table.
        #[arg(long)]
        json: bool,
    },

    /// Remove the entire store directory.
    Purge,
}
