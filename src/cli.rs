use clap::{Parser, Subcommand};
use clap_complete::Shell;

#[derive(Parser)]
#[command(name = "n8nform")]
#[command(author = "Alberto Cavalcante")]
#[command(version)]
#[command(about = "Declarative management of n8n projects, users, variables and tags", long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Verbosity level
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Suppress non-essential output
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Manifest file
    #[arg(short, long, global = true, env = "N8NFORM_CONFIG", default_value = crate::config::DEFAULT_MANIFEST)]
    pub config: String,

    /// State file (default: <manifest stem>.state.json next to the manifest)
    #[arg(long, global = true)]
    pub state: Option<String>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand)]
pub enum Command {
    /// Show what apply would change
    Plan(PlanArgs),

    /// Make the remote side match the manifest
    Apply(ApplyArgs),

    /// Re-read every tracked resource and drop the ones deleted remotely
    Refresh(RefreshArgs),

    /// Start tracking an existing remote entity
    Import {
        /// Address to import into (kind.name)
        address: String,

        /// Remote id (project_id/user_id for project_user)
        id: String,
    },

    /// Inspect or edit tracked state
    #[command(subcommand)]
    State(StateCommand),

    /// Show one existing remote entity, found by id or name
    Show(ShowArgs),

    /// List existing remote entities of a kind
    List(ListArgs),

    /// List supported resource kinds and their attributes
    Kinds,

    /// Generate shell completions
    Completions {
        /// Shell to generate completions for
        #[arg(value_enum)]
        shell: Shell,
    },
}

// ============================================================================
// Plan / Apply
// ============================================================================

#[derive(Parser)]
pub struct PlanArgs {
    /// Only plan a kind or a single resource (e.g. "project" or "project.infra")
    #[arg(short, long)]
    pub target: Option<String>,

    /// Use tracked state as-is instead of reading it back first
    #[arg(long)]
    pub no_refresh: bool,

    /// Number of resources read back in parallel
    #[arg(short, long, default_value = "4")]
    pub jobs: usize,
}

#[derive(Parser)]
pub struct RefreshArgs {
    /// Number of resources read back in parallel
    #[arg(short, long, default_value = "4")]
    pub jobs: usize,
}

#[derive(Parser)]
pub struct ApplyArgs {
    /// Only apply a kind or a single resource (e.g. "project" or "project.infra")
    #[arg(short, long)]
    pub target: Option<String>,

    /// Show what would be done without making changes
    #[arg(short = 'n', long)]
    pub dry_run: bool,

    /// Skip the confirmation prompt
    #[arg(short, long)]
    pub yes: bool,

    /// Number of resources reconciled in parallel
    #[arg(short, long, default_value = "4")]
    pub jobs: usize,

    /// Use tracked state as-is instead of reading it back first
    #[arg(long)]
    pub no_refresh: bool,
}

// ============================================================================
// Show / List
// ============================================================================

#[derive(Parser)]
pub struct ShowArgs {
    /// Resource kind (see `n8nform kinds`)
    pub kind: String,

    /// Remote id (project_id/user_id for project_user); wins over --name
    #[arg(long, required_unless_present = "name")]
    pub id: Option<String>,

    /// Name, key or email, depending on the kind
    #[arg(long)]
    pub name: Option<String>,

    /// Project to look in, for project_user
    #[arg(short, long)]
    pub project: Option<String>,
}

#[derive(Parser)]
pub struct ListArgs {
    /// Resource kind (see `n8nform kinds`)
    pub kind: String,

    /// Project to list, for project_user
    #[arg(short, long)]
    pub project: Option<String>,
}

// ============================================================================
// State Commands
// ============================================================================

#[derive(Subcommand)]
pub enum StateCommand {
    /// List tracked addresses
    List,

    /// Show the tracked attributes of one resource
    Show {
        /// Address (kind.name)
        address: String,
    },

    /// Stop tracking a resource without deleting it remotely
    Rm {
        /// Address (kind.name)
        address: String,
    },
}
