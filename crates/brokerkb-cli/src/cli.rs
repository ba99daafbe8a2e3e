use std::path::PathBuf;

use clap::{Parser, Subcommand, ValueEnum};

#[derive(Parser)]
#[command(name = "brokerkb")]
#[command(about = "Sync loan-broker cases into the Dify knowledge base")]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Optional path to the case database (falls back to BROKERKB_DB_PATH)
    #[arg(long, global = true, value_name = "PATH")]
    pub db_path: Option<PathBuf>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Push every unsynced case to Dify
    Sync {
        /// Output the report as JSON
        #[arg(long)]
        json: bool,
    },
    /// Show sync counts and the most recent attempts
    Status {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Inspect or sync individual cases
    Case {
        #[command(subcommand)]
        command: CaseCommands,
    },
}

#[derive(Subcommand)]
pub enum CaseCommands {
    /// Sync a single case
    Sync {
        /// Case ID or unique ID prefix
        id: String,
    },
    /// Show a case with its sync history
    Show {
        /// Case ID or unique ID prefix
        id: String,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// List recent cases
    List {
        /// Number of cases to show
        #[arg(short, long, default_value = "20")]
        limit: usize,
        /// Only show cases in this sync state
        #[arg(long, value_enum)]
        state: Option<SyncStateFilter>,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Export a case as the Markdown document sent to Dify
    Export {
        /// Case ID or unique ID prefix
        id: String,
        /// Optional output path (stdout when omitted)
        #[arg(short, long, value_name = "PATH")]
        output: Option<PathBuf>,
    },
}

#[derive(Clone, Copy, Debug, Eq, PartialEq, ValueEnum)]
pub enum SyncStateFilter {
    Synced,
    Pending,
}

impl SyncStateFilter {
    pub const fn is_synced(self) -> bool {
        matches!(self, Self::Synced)
    }
}
