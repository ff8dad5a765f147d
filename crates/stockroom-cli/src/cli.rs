use std::path::PathBuf;

use clap::{Args, Parser, Subcommand, ValueEnum};

#[derive(Parser)]
#[command(name = "stockroom")]
#[command(about = "Manage a product catalog that keeps working offline")]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Optional path to local database file
    #[arg(long, global = true, value_name = "PATH")]
    pub db_path: Option<PathBuf>,

    /// Do not contact the backend; writes are queued for a later sync
    #[arg(long, global = true)]
    pub offline: bool,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Create a new product
    #[command(alias = "new")]
    Add {
        /// Product name
        name: Vec<String>,
        #[command(flatten)]
        fields: ProductFields,
    },
    /// List products
    #[command(alias = "ls")]
    List {
        /// Include records waiting for a remote delete
        #[arg(long)]
        all: bool,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Show a single product
    Show {
        /// Product ID (temporary IDs are followed after sync)
        id: String,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Change fields of an existing product
    #[command(alias = "edit")]
    Update {
        /// Product ID
        id: String,
        /// New product name
        #[arg(long)]
        name: Option<String>,
        #[command(flatten)]
        fields: ProductFields,
        /// Remove the product image
        #[arg(long, conflicts_with = "image")]
        clear_image: bool,
        /// Mark the product as active
        #[arg(long, conflicts_with = "disabled")]
        enabled: bool,
    },
    /// Delete a product
    #[command(alias = "rm")]
    Delete {
        /// Product ID
        id: String,
    },
    /// Replay queued edits and pull the remote catalog
    Sync {
        /// Output the cycle report as JSON
        #[arg(long)]
        json: bool,
    },
    /// Show sync status
    Status {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Inspect operations the backend rejected
    Failures {
        #[command(subcommand)]
        command: Option<FailureCommands>,
    },
    /// Keep syncing in the foreground until Ctrl-C
    Watch {
        /// Seconds between backend reachability checks
        #[arg(long, default_value = "15", value_name = "SECONDS")]
        probe_interval: u64,
    },
    /// Configure the backend connection
    Config {
        #[command(subcommand)]
        command: ConfigCommands,
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

/// Product fields shared by `add` and `update`
#[derive(Args, Debug, Default, Clone)]
pub struct ProductFields {
    /// Product description
    #[arg(short, long)]
    pub description: Option<String>,
    /// Unit price
    #[arg(short, long)]
    pub price: Option<f64>,
    /// Units in stock
    #[arg(short, long)]
    pub stock: Option<i64>,
    /// Image URL
    #[arg(short, long)]
    pub image: Option<String>,
    /// Mark the product as inactive
    #[arg(long)]
    pub disabled: bool,
}

#[derive(Clone, Copy, Debug, Eq, PartialEq, ValueEnum)]
pub enum CompletionShell {
    Bash,
    Zsh,
    Fish,
}

#[derive(Subcommand)]
pub enum FailureCommands {
    /// List rejected operations
    List {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Queue a rejected operation again
    Retry {
        /// Failure ID
        id: i64,
    },
    /// Drop a rejected operation
    Discard {
        /// Failure ID
        id: i64,
    },
}

#[derive(Subcommand)]
pub enum ConfigCommands {
    /// Create or update the config file
    Init {
        /// Backend API base URL (e.g. <https://api.example.com/api>)
        #[arg(long, value_name = "URL")]
        api_url: Option<String>,
        /// Bearer token sent to the backend
        #[arg(long, value_name = "TOKEN")]
        token: Option<String>,
        /// Remote collection name
        #[arg(long, value_name = "NAME")]
        collection: Option<String>,
        /// Per-request timeout in seconds
        #[arg(long, value_name = "SECONDS")]
        timeout: Option<u64>,
        /// Automatic sync interval in seconds (0 disables it)
        #[arg(long, value_name = "SECONDS")]
        sync_interval: Option<u64>,
    },
    /// Print the effective configuration
    Show {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
}
