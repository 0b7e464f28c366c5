//! CLI argument parsing for the multidrop-worker binary.

use clap::{Parser, Subcommand};
use uuid::Uuid;

#[derive(Parser)]
#[command(name = "multidrop-worker", about = "Multi-drop route management worker")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Command>,
}

#[derive(Subcommand)]
pub enum Command {
    /// Start the worker server (default if no subcommand given)
    Serve,
    /// Run database migrations and exit
    Migrate,
    /// Print a signed admin token for operational scripts
    IssueToken {
        /// Admin user id placed in the token subject
        #[arg(long)]
        user_id: Uuid,
        /// Admin email address
        #[arg(long)]
        email: String,
        /// Token lifetime in hours
        #[arg(long, default_value_t = 1)]
        ttl_hours: usize,
    },
}
