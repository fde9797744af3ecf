use std::path::PathBuf;

use clap::{Parser, Subcommand, ValueEnum};

#[derive(Parser)]
#[command(name = "ledgerlift")]
#[command(about = "Replay encrypted PIM journals and migrate them into revisioned collections")]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Optional path to the config file
    #[arg(long, global = true, value_name = "PATH")]
    pub config: Option<PathBuf>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Migrate a legacy export into a destination database
    Migrate {
        /// Legacy export JSON file
        #[arg(value_name = "EXPORT")]
        export: PathBuf,
        /// Hex-encoded derived key (falls back to LEDGERLIFT_DERIVED_KEY)
        #[arg(long, value_name = "HEX")]
        derived_key: Option<String>,
        /// Destination database file
        #[arg(long, value_name = "PATH")]
        destination: Option<PathBuf>,
        /// Revisions per uploaded batch
        #[arg(long, value_name = "N")]
        chunk_size: Option<usize>,
        /// Only migrate this journal (repeatable)
        #[arg(long = "journal", value_name = "UID")]
        journals: Vec<String>,
        /// Replay and batch everything in memory without writing
        #[arg(long)]
        dry_run: bool,
        /// Output the final report as JSON
        #[arg(long)]
        json: bool,
    },
    /// Show the journals of a legacy export
    Inspect {
        /// Legacy export JSON file
        #[arg(value_name = "EXPORT")]
        export: PathBuf,
        /// Hex-encoded derived key; enables collection info and chain checks
        #[arg(long, value_name = "HEX")]
        derived_key: Option<String>,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// List collections in a destination database
    Collections {
        /// Destination database file
        #[arg(long, value_name = "PATH")]
        destination: Option<PathBuf>,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Check that a URL hosts a supported destination server
    Probe {
        /// Server base URL (defaults to server_url from the config file)
        #[arg(value_name = "URL")]
        url: Option<String>,
    },
    /// Generate shell completion scripts
    Completions {
        /// Target shell
        #[arg(value_enum)]
        shell: CompletionShell,
        /// Optional output path (stdout when omitted)
        #[arg(short, long, value_name = "PATH")]
        output: Option<PathBuf>,
    },
}

#[derive(Clone, Copy, Debug, Eq, PartialEq, ValueEnum)]
pub enum CompletionShell {
    Bash,
    Zsh,
    Fish,
}
