//! CLI definitions using clap.

use clap::{Parser, Subcommand};
use std::path::PathBuf;

pub mod commands;

/// Stride - progress tracking and rewards for plan-based content
#[derive(Parser, Debug)]
#[command(name = "stride", author, version, about, long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Database path (default: ~/.stride/data/stride.db)
    #[arg(long, global = true, env = "STRIDE_DB")]
    pub db: Option<PathBuf>,

    /// Actor name for audit trail
    #[arg(long, global = true, env = "STRIDE_ACTOR")]
    pub actor: Option<String>,

    /// Output as JSON (for service integration)
    #[arg(long, global = true)]
    pub json: bool,

    /// Increase logging verbosity (-v, -vv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Quiet mode (no output except errors)
    #[arg(short, long, global = true)]
    pub quiet: bool,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Plan progress tracking
    Progress {
        #[command(subcommand)]
        command: ProgressCommands,
    },

    /// Dispatch a gamification event (start, complete, check-in)
    Dispatch {
        /// User id
        user: String,

        /// Action type (plan_started, plan_completed, daily_check_in)
        action: String,

        /// Content type (diet, exercise, habit, ...)
        content_type: String,

        /// Content id
        content_id: String,
    },

    /// Show a user's activity streak
    Streak {
        /// User id
        user: String,
    },

    /// Show a user's recent reward ledger entries
    Ledger {
        /// User id
        user: String,

        /// Maximum entries to show
        #[arg(long, default_value = "20")]
        limit: u32,
    },
}

#[derive(Subcommand, Debug)]
pub enum ProgressCommands {
    /// Start tracking a plan (idempotent)
    Start {
        /// User id
        user: String,

        /// Content type (diet, exercise, habit, ...)
        content_type: String,

        /// Content id
        content_id: String,

        /// Comma-separated item ids, as supplied by the content service
        #[arg(long, value_delimiter = ',', required = true)]
        items: Vec<String>,
    },

    /// Toggle an item's completion
    Toggle {
        /// User id
        user: String,

        /// Content type
        content_type: String,

        /// Content id
        content_id: String,

        /// Item id to flip
        item_id: String,
    },

    /// Complete a plan, checking off any remaining items (idempotent)
    Complete {
        /// User id
        user: String,

        /// Content type
        content_type: String,

        /// Content id
        content_id: String,
    },

    /// Show progress for a plan
    Show {
        /// User id
        user: String,

        /// Content type
        content_type: String,

        /// Content id
        content_id: String,
    },
}
