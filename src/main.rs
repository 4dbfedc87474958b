//! depot CLI.
//!
//! `depot serve` runs the HTTP server; every other command operates on the
//! configured stores directly and exits.

mod commands;

use std::path::PathBuf;

use anyhow::Result;
use clap::{Parser, Subcommand};

use depot::{Config, Depot, logging};

#[derive(Parser, Debug)]
#[command(name = "depot")]
#[command(version, about = "Permission-aware artifact storage")]
struct Cli {
    /// Config file (defaults to ~/.depot/depot.toml when present)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Run the HTTP server with the scheduled clean
    Serve {
        /// Override server.bind
        #[arg(short, long)]
        bind: Option<String>,
    },

    /// Remove expired artifacts according to each directory's TTL
    Clean {
        /// Use this TTL in days for every directory instead of its own
        #[arg(long)]
        ttl: Option<i64>,

        /// Also remove permanent artifacts
        #[arg(long)]
        purge_permanent: bool,
    },

    /// Remove every artifact older than one TTL, ignoring directory policy
    Purge {
        /// TTL in days (defaults to retention.purge_default_ttl_days)
        #[arg(long)]
        ttl: Option<i64>,

        /// Also remove permanent artifacts
        #[arg(long)]
        include_permanent: bool,
    },

    /// Manage directories
    Dir {
        #[command(subcommand)]
        action: DirAction,
    },

    /// Manage user accounts
    User {
        #[command(subcommand)]
        action: UserAction,
    },

    /// Manage lookup tokens
    Token {
        #[command(subcommand)]
        action: TokenAction,
    },

    /// Inspect share links
    Share {
        #[command(subcommand)]
        action: ShareAction,
    },
}

#[derive(Subcommand, Debug)]
pub enum DirAction {
    /// Create a directory
    Create {
        /// Absolute path, e.g. /pub/debian
        path: String,

        /// Owning user
        #[arg(long, conflicts_with = "group")]
        user: Option<String>,

        /// Owning group
        #[arg(long)]
        group: Option<String>,

        /// Readable by anonymous callers
        #[arg(long)]
        public: bool,

        /// TTL in days (0 keeps artifacts forever)
        #[arg(long)]
        ttl: Option<i64>,

        /// Quota in bytes
        #[arg(long)]
        quota: Option<u64>,
    },

    /// Change a directory's policy
    Update {
        path: String,

        /// New owning user
        #[arg(long, conflicts_with_all = ["group", "anonymous"])]
        user: Option<String>,

        /// New owning group
        #[arg(long, conflicts_with = "anonymous")]
        group: Option<String>,

        /// Drop the owner
        #[arg(long)]
        anonymous: bool,

        /// Set the public flag
        #[arg(long)]
        public: Option<bool>,

        /// TTL in days
        #[arg(long)]
        ttl: Option<i64>,

        /// Quota in bytes
        #[arg(long)]
        quota: Option<u64>,
    },

    /// Delete a directory with all its artifacts
    Delete { path: String },

    /// List every directory
    List,
}

#[derive(Subcommand, Debug)]
pub enum UserAction {
    /// Add a user
    Add {
        name: String,

        /// Group memberships
        #[arg(short, long)]
        group: Vec<String>,
    },

    /// List users
    List,

    /// Mark a user active
    Activate { name: String },

    /// Mark a user inactive
    Deactivate { name: String },

    /// Add a user to a group
    AddGroup { name: String, group: String },

    /// Remove a user from a group
    RemoveGroup { name: String, group: String },
}

#[derive(Subcommand, Debug)]
pub enum TokenAction {
    /// Create a lookup token for a user
    Create {
        user: String,

        /// Free-form note
        #[arg(short, long, default_value = "")]
        description: String,
    },

    /// List a user's tokens
    List { user: String },

    /// Delete one of a user's tokens
    Delete { user: String, secret: String },
}

#[derive(Subcommand, Debug)]
pub enum ShareAction {
    /// List shares created by a user
    List { user: String },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let mut config = Config::load(cli.config.as_deref())?;
    if let Commands::Serve { bind: Some(bind) } = &cli.command {
        config.server.bind.clone_from(bind);
    }
    let validation = config.validate()?;

    logging::init(&config.logging);
    for warning in &validation.warnings {
        tracing::warn!("{warning}");
    }

    let depot = Depot::from_config(&config)?;

    match cli.command {
        Commands::Serve { .. } => commands::serve::execute(depot, &config).await,
        Commands::Clean {
            ttl,
            purge_permanent,
        } => commands::retention::clean(&depot, ttl, purge_permanent),
        Commands::Purge {
            ttl,
            include_permanent,
        } => {
            let ttl = ttl.unwrap_or(config.retention.purge_default_ttl_days);
            commands::retention::purge(&depot, ttl, include_permanent)
        },
        Commands::Dir { action } => commands::dir::execute(&depot, action),
        Commands::User { action } => commands::user::execute(&depot, action),
        Commands::Token { action } => commands::token::execute(&depot, action),
        Commands::Share { action } => commands::share::execute(&depot, action),
    }
}
