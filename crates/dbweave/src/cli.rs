//! Clap derive structures for the `dbweave` CLI.

use clap::{Args, Parser, Subcommand, ValueEnum};

// ── Top-Level CLI ────────────────────────────────────────────────────

/// dbweave -- browse and administer a dbweave server from the terminal
#[derive(Debug, Parser)]
#[command(
    name = "dbweave",
    version,
    about = "Browse database navigators and administer a dbweave server",
    propagate_version = true,
    subcommand_required = true,
    arg_required_else_help = true
)]
pub struct Cli {
    #[command(flatten)]
    pub global: GlobalOpts,

    #[command(subcommand)]
    pub command: Command,
}

// ── Global Options ───────────────────────────────────────────────────

#[derive(Debug, Args)]
pub struct GlobalOpts {
    /// Server profile to use
    #[arg(long, short = 'p', env = "DBWEAVE_PROFILE", global = true)]
    pub profile: Option<String>,

    /// Server URL (overrides profile)
    #[arg(long, short = 's', env = "DBWEAVE_SERVER", global = true)]
    pub server: Option<String>,

    /// Username to log in with (overrides profile)
    #[arg(long, short = 'u', env = "DBWEAVE_USERNAME", global = true)]
    pub username: Option<String>,

    /// Output format
    #[arg(
        long,
        short = 'o',
        env = "DBWEAVE_OUTPUT",
        default_value = "table",
        global = true
    )]
    pub output: OutputFormat,

    /// When to use color output
    #[arg(long, default_value = "auto", global = true)]
    pub color: ColorMode,

    /// Increase verbosity (-v, -vv, -vvv)
    #[arg(long, short = 'v', action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Suppress non-error output
    #[arg(long, short = 'q', global = true)]
    pub quiet: bool,

    /// Skip confirmation prompts
    #[arg(long, short = 'y', global = true)]
    pub yes: bool,

    /// Accept self-signed TLS certificates
    #[arg(long, short = 'k', env = "DBWEAVE_INSECURE", global = true)]
    pub insecure: bool,

    /// Request timeout in seconds
    #[arg(long, env = "DBWEAVE_TIMEOUT", global = true)]
    pub timeout: Option<u64>,
}

// ── Output & Color Enums ─────────────────────────────────────────────

#[derive(Debug, Clone, ValueEnum)]
pub enum OutputFormat {
    /// Pretty table (default, interactive)
    Table,
    /// Pretty-printed JSON
    Json,
    /// Compact single-line JSON
    JsonCompact,
    /// YAML
    Yaml,
    /// Plain text, one value per line (scripting)
    Plain,
}

#[derive(Debug, Clone, ValueEnum)]
pub enum ColorMode {
    /// Auto-detect (color if terminal is interactive)
    Auto,
    /// Always emit color codes
    Always,
    /// Never emit color codes
    Never,
}

// ── Top-Level Command Enum ───────────────────────────────────────────

#[derive(Debug, Subcommand)]
pub enum Command {
    /// List navigator children, optionally descending several levels
    #[command(alias = "ls")]
    Tree(TreeArgs),

    /// Inspect and change individual navigator nodes
    #[command(alias = "n")]
    Node(NodeArgs),

    /// Session, permissions, user and server configuration
    Session(SessionArgs),

    /// Run the first-time server configuration wizard
    Wizard(WizardArgs),

    /// Stream server events
    Events(EventsArgs),

    /// Manage CLI configuration and profiles
    Config(ConfigArgs),

    /// Generate shell completions
    Completions(CompletionsArgs),
}

// ── Tree ─────────────────────────────────────────────────────────────

#[derive(Debug, Args)]
pub struct TreeArgs {
    /// Parent node id (root when omitted)
    #[arg(default_value = "")]
    pub node: String,

    /// Levels to descend below the parent
    #[arg(long, short = 'd', default_value = "1")]
    pub depth: u32,

    /// Fetch every page instead of only the first
    #[arg(long, short = 'a')]
    pub all: bool,
}

// ── Node ─────────────────────────────────────────────────────────────

#[derive(Debug, Args)]
pub struct NodeArgs {
    #[command(subcommand)]
    pub command: NodeCommand,
}

#[derive(Debug, Subcommand)]
pub enum NodeCommand {
    /// Show a node's metadata
    Info {
        /// Node id
        id: String,

        /// Include object properties
        #[arg(long)]
        details: bool,
    },

    /// Show the ancestor chain of a node
    Path {
        /// Node id
        id: String,
    },

    /// Show the database object behind a node
    Object {
        /// Node ids
        #[arg(required = true)]
        ids: Vec<String>,
    },

    /// Rename a node
    Rename {
        /// Node id
        id: String,

        /// New name
        name: String,
    },

    /// Delete nodes
    #[command(alias = "rm")]
    Delete {
        /// Node ids
        #[arg(required = true)]
        ids: Vec<String>,
    },

    /// Move nodes into a folder
    #[command(alias = "mv")]
    Move {
        /// Node ids
        #[arg(required = true)]
        ids: Vec<String>,

        /// Target folder node id
        #[arg(long)]
        to: String,
    },
}

// ── Session ──────────────────────────────────────────────────────────

#[derive(Debug, Args)]
pub struct SessionArgs {
    #[command(subcommand)]
    pub command: SessionCommand,
}

#[derive(Debug, Subcommand)]
pub enum SessionCommand {
    /// Show session state
    Show,

    /// Keep the session alive
    Touch,

    /// List the session's permissions
    Permissions,

    /// Show the active user
    Whoami,

    /// Log in and show the resulting user
    Login {
        /// Auth provider id
        #[arg(long, default_value = "local")]
        provider: String,
    },

    /// Log out
    Logout,

    /// Show the server configuration
    ServerConfig,

    /// Locally persisted session preferences
    Locale {
        /// New locale; omit to show the current one
        locale: Option<String>,

        /// Forget the stored locale
        #[arg(long, conflicts_with = "locale")]
        clear: bool,
    },
}

// ── Wizard ───────────────────────────────────────────────────────────

#[derive(Debug, Args)]
pub struct WizardArgs {
    #[command(subcommand)]
    pub command: WizardCommand,
}

#[derive(Debug, Subcommand)]
pub enum WizardCommand {
    /// List wizard steps and their progress
    Status,

    /// Mark a step as finished
    FinishStep {
        /// Step name
        step: String,
    },

    /// Set the server configuration and complete the wizard
    Finish(WizardFinishArgs),

    /// Forget recorded progress
    Reset,
}

#[derive(Debug, Args)]
pub struct WizardFinishArgs {
    /// Display name for the server
    #[arg(long)]
    pub server_name: Option<String>,

    /// Public server URL
    #[arg(long)]
    pub server_url: Option<String>,

    /// Administrator account name
    #[arg(long)]
    pub admin_name: Option<String>,

    /// Prompt for an administrator password
    #[arg(long, requires = "admin_name")]
    pub admin_password: bool,

    /// Allow anonymous access
    #[arg(long)]
    pub anonymous: Option<bool>,
}

// ── Events ───────────────────────────────────────────────────────────

#[derive(Debug, Args)]
pub struct EventsArgs {
    /// Topics to subscribe to (default: all)
    #[arg(long = "topic", short = 't', value_delimiter = ',')]
    pub topics: Vec<String>,

    /// Stop after this many events
    #[arg(long, short = 'n')]
    pub count: Option<usize>,
}

// ── Config ───────────────────────────────────────────────────────────

#[derive(Debug, Args)]
pub struct ConfigArgs {
    #[command(subcommand)]
    pub command: ConfigCommand,
}

#[derive(Debug, Subcommand)]
pub enum ConfigCommand {
    /// Add or replace a profile
    Add {
        /// Profile name
        name: String,

        /// Server base URL
        #[arg(long)]
        server: String,

        /// Username for login
        #[arg(long)]
        username: Option<String>,

        /// Auth provider id
        #[arg(long, default_value = "local")]
        provider: String,

        /// Make this the default profile
        #[arg(long)]
        default: bool,
    },

    /// Display current resolved configuration
    Show,

    /// List configured profiles
    Profiles,

    /// Set the default profile
    Use {
        /// Profile name to set as default
        name: String,
    },

    /// Store a profile's password in the system keyring
    SetPassword,

    /// Print the config file path
    Path,
}

// ── Completions ──────────────────────────────────────────────────────

#[derive(Debug, Args)]
pub struct CompletionsArgs {
    /// Shell to generate completions for
    pub shell: clap_complete::Shell,
}
