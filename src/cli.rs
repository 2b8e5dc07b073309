use std::path::PathBuf;

use clap::{Parser, Subcommand};

#[derive(Debug, Parser, Clone)]
#[clap(author, version, about, long_about = None)]
pub struct CLI {
    #[command(subcommand)]
    pub(crate) command: NodeseaCommand,
}

#[derive(Debug, Subcommand, Clone, PartialEq)]
pub enum NodeseaCommand {
    /// Resolve, download, verify and extract a Node.js runtime. Prints the
    /// path of the extracted `node` binary
    Fetch {
        /// Exact version, semver range, nightly tag, or file:// URL.
        /// Defaults to the config's nodeVersion, then to 22.11.0
        specifier: Option<String>,
        /// Path of the sea config file
        #[clap(short = 's', long = "sea-config")]
        config: Option<PathBuf>,
        /// Target platform (linux, darwin, win32). Defaults to the current platform
        #[clap(short, long)]
        platform: Option<String>,
        /// Cache directory. Defaults to the per-user cache
        #[clap(long)]
        cache_dir: Option<PathBuf>,
        /// Re-attempts after a failed download
        #[clap(long)]
        retries: Option<u32>,
    },
    /// Resolve a specifier to a concrete release without downloading
    Resolve {
        specifier: String,
    },
    /// Remove all cached archives and extracted runtimes
    Clean {
        /// Cache directory. Defaults to the per-user cache
        #[clap(long)]
        cache_dir: Option<PathBuf>,
    },
}
