use clap::{Parser, Subcommand};
use std::path::PathBuf;

use archive_browser::config::{DEFAULT_ARCHIVE_URL, DEFAULT_JOYSTICK_DEVICE, DEFAULT_STALL_TIMEOUT_SECS};

#[derive(Parser, Debug)]
#[command(name = "archive-browser")]
#[command(author, version, about = "Browse and download files from remote archives", long_about = None)]
pub struct Args {
    /// Directory holding collections.json, keys.txt, controls.json and the cache (default: executable directory)
    #[arg(long, global = true)]
    pub home: Option<PathBuf>,

    /// Root directory for downloads (default: /roms if present, else current directory)
    #[arg(long, global = true)]
    pub storage_root: Option<PathBuf>,

    /// Base URL of the registry metadata and download endpoints
    #[arg(long, global = true, default_value = DEFAULT_ARCHIVE_URL)]
    pub archive_url: String,

    /// Joystick device
    #[arg(long, global = true, default_value = DEFAULT_JOYSTICK_DEVICE)]
    pub device: PathBuf,

    /// Accept any TLS certificate (for devices with an outdated trust store)
    #[arg(long, global = true)]
    pub insecure: bool,

    /// Abort a download when no data arrives for this many seconds
    #[arg(long, global = true, default_value_t = DEFAULT_STALL_TIMEOUT_SECS)]
    pub stall_timeout: u64,

    /// Increase log verbosity (-v for debug, -vv for trace)
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    pub verbose: u8,

    /// Only log errors
    #[arg(short, long, global = true)]
    pub quiet: bool,

    #[command(subcommand)]
    pub command: Option<Command>,
}

#[derive(Subcommand, Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// Interactive joystick browser (default)
    Browse,

    /// Print the listing of a collection
    List {
        /// Collection name from collections.json
        collection: String,

        /// Ignore the cached listing and fetch again
        #[arg(short, long)]
        refresh: bool,

        /// Only show entries whose name contains this text
        #[arg(short, long)]
        search: Option<String>,
    },

    /// Download one entry of a collection
    Download {
        /// Collection name from collections.json
        collection: String,

        /// Entry name, as listed or as its decoded file name
        name: String,
    },

    /// Map joystick buttons again
    Calibrate,
}

impl Args {
    pub fn log_level(&self) -> &'static str {
        if self.quiet {
            return "error";
        }
        match self.verbose {
            0 => "info",
            1 => "debug",
            _ => "trace",
        }
    }
}
