use clap::{Args, Parser, Subcommand, ValueEnum};
use clap_complete::Shell;
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "rgsync")]
#[command(author = "Alberto Cavalcante")]
#[command(version)]
#[command(about = "Declarative resource group management for StarRocks", long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Verbosity level
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Suppress non-essential output
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Config file (default: ~/.config/rgsync/config.toml)
    #[arg(long, global = true, value_name = "FILE")]
    pub config: Option<PathBuf>,

    #[command(flatten)]
    pub connection: ConnectionArgs,

    #[command(subcommand)]
    pub command: Command,
}

/// Connection flags. Each one overrides the config file and environment.
#[derive(Args, Default)]
pub struct ConnectionArgs {
    /// Frontend host
    #[arg(long, global = true)]
    pub host: Option<String>,

    /// Frontend query port
    #[arg(long, global = true)]
    pub port: Option<u16>,

    /// Login user
    #[arg(short = 'u', long, global = true)]
    pub username: Option<String>,

    /// Login password
    #[arg(long, global = true, hide = true)]
    pub password: Option<String>,
}

#[derive(Subcommand)]
pub enum Command {
    /// Show what apply would change
    Plan(PlanArgs),

    /// Converge resource groups to the manifest
    Apply(ApplyArgs),

    /// Show the observed state of a resource group
    Show(ShowArgs),

    /// Render an existing resource group as a manifest entry
    Import(ImportArgs),

    /// Drop a resource group
    Destroy(DestroyArgs),

    /// Generate shell completions
    Completions {
        /// Shell to generate completions for
        #[arg(value_enum)]
        shell: Shell,
    },
}

#[derive(Clone, Copy, ValueEnum)]
pub enum StrategyArg {
    /// Alter the group in place
    InPlace,
    /// Drop and recreate the group
    Recreate,
}

impl From<StrategyArg> for rgkit::Strategy {
    fn from(value: StrategyArg) -> Self {
        match value {
            StrategyArg::InPlace => Self::InPlace,
            StrategyArg::Recreate => Self::Recreate,
        }
    }
}

#[derive(Args)]
pub struct PlanArgs {
    /// Manifest file
    #[arg(short, long, value_name = "FILE", default_value = "resource_groups.toml")]
    pub file: PathBuf,

    /// Convergence strategy (default: from config, else in-place)
    #[arg(short, long, value_enum)]
    pub strategy: Option<StrategyArg>,

    /// Only consider these resource groups
    #[arg(short, long, value_delimiter = ',')]
    pub target: Vec<String>,
}

#[derive(Args)]
pub struct ApplyArgs {
    #[command(flatten)]
    pub plan: PlanArgs,

    /// Show what would change without running anything
    #[arg(long)]
    pub dry_run: bool,

    /// Skip confirmation prompt
    #[arg(short, long)]
    pub yes: bool,
}

#[derive(Args)]
pub struct ShowArgs {
    /// Resource group name
    pub name: String,

    /// Print JSON instead of a table
    #[arg(long)]
    pub json: bool,
}

#[derive(Args)]
pub struct ImportArgs {
    /// Resource group name
    pub name: String,

    /// Append the entry to this manifest instead of printing it
    #[arg(short, long, value_name = "FILE")]
    pub output: Option<PathBuf>,
}

#[derive(Args)]
pub struct DestroyArgs {
    /// Resource group name
    pub name: String,

    /// Skip confirmation prompt
    #[arg(short, long)]
    pub yes: bool,
}
