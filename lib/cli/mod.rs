use crate::build_info;
use crate::config::DEFAULT_CONFIG_PATH;
use clap::{Args, Parser, Subcommand};
use std::net::SocketAddr;
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(
    name = "vod_sync",
    about = "Syncs IPTV VOD metadata into the search service",
    version = build_info::VERSION_WITH_COMMIT,
    long_version = build_info::VERSION_WITH_COMMIT
)]
pub struct Cli {
    #[arg(long, global = true, default_value = DEFAULT_CONFIG_PATH)]
    /// Path to the TOML configuration file
    pub config: PathBuf,

    #[arg(long = "log-level", global = true)]
    /// Overrides `[logging] level` from the config file
    pub log_level: Option<String>,

    #[arg(long = "metrics-bind", global = true)]
    /// Serve /health and /metrics on this address while the command runs
    pub metrics_bind: Option<SocketAddr>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// Refresh catalog data in the search service
    Update {
        #[command(subcommand)]
        target: UpdateTarget,
    },
    /// Search indexed catalog data
    Query {
        #[command(subcommand)]
        target: QueryTarget,
    },
    /// Send free-text sentences to the embed endpoint
    Embed {
        #[arg(required = true)]
        sentences: Vec<String>,
    },
}

#[derive(Subcommand, Debug, Clone, PartialEq, Eq)]
pub enum UpdateTarget {
    /// Re-fetch every VOD category and stream and index it
    Vod,
}

#[derive(Subcommand, Debug, Clone, PartialEq, Eq)]
pub enum QueryTarget {
    /// Query indexed VOD records
    Vod(QueryArgs),
}

#[derive(Args, Debug, Clone, PartialEq, Eq)]
pub struct QueryArgs {
    #[arg(long)]
    /// Record property to search, e.g. `title` or `plot`
    pub property: String,
    #[arg(long)]
    pub query: String,
    #[arg(long = "top-k", default_value_t = 10)]
    pub top_k: usize,
}

impl Command {
    /// Label used for the logging context and run id.
    pub fn name(&self) -> &'static str {
        match self {
            Self::Update {
                target: UpdateTarget::Vod,
            } => "update_vod",
            Self::Query {
                target: QueryTarget::Vod(_),
            } => "query_vod",
            Self::Embed { .. } => "embed",
        }
    }
}

pub fn parse_args() -> Cli {
    Cli::parse()
}
