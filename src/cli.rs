use clap::{Args, Parser, Subcommand, ValueEnum};
use clap_complete::Shell;
use converge::RequestedState;
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "azrm")]
#[command(author = "Alberto Cavalcante")]
#[command(version)]
#[command(about = "Reconcile Azure resources with a desired state", long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Verbosity level
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Suppress non-essential output
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Settings file (default: ~/.config/azrm/config.toml)
    #[arg(long, global = true, env = "AZRM_CONFIG")]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand)]
pub enum Command {
    /// Bring a resource to the state described in a request file
    Apply(ApplyArgs),

    /// Show what apply would change, without changing anything
    Diff(DiffArgs),

    /// Read resources of a kind (by name, or the whole resource group)
    Facts(FactsArgs),

    /// List resource kinds, or show one kind's parameters
    Kinds {
        /// Kind to describe
        kind: Option<String>,
    },

    /// Generate shell completions
    Completions {
        /// Shell to generate completions for
        #[arg(value_enum)]
        shell: Shell,
    },
}

// ============================================================================
// Apply / Diff
// ============================================================================

#[derive(Debug, Args)]
pub struct ApplyArgs {
    /// Request file (TOML, or JSON by extension)
    pub file: PathBuf,

    /// Decide only; report what would change
    #[arg(long)]
    pub check: bool,

    /// Override the requested state from the file
    #[arg(long, value_parser = parse_state)]
    pub state: Option<RequestedState>,

    /// Output format
    #[arg(long, value_enum, default_value_t = OutputFormat::Text)]
    pub format: OutputFormat,

    /// Skip the confirmation prompt before deleting
    #[arg(short, long)]
    pub yes: bool,
}

#[derive(Debug, Args)]
pub struct DiffArgs {
    /// Request file (TOML, or JSON by extension)
    pub file: PathBuf,

    /// Override the requested state from the file
    #[arg(long, value_parser = parse_state)]
    pub state: Option<RequestedState>,
}

fn parse_state(raw: &str) -> Result<RequestedState, String> {
    raw.parse()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    Text,
    Json,
}

// ============================================================================
// Facts
// ============================================================================

#[derive(Debug, Args)]
pub struct FactsArgs {
    /// Kind name or ARM type (see `azrm kinds`)
    pub kind: String,

    /// Resource group
    #[arg(short = 'g', long)]
    pub resource_group: String,

    /// Resource name; lists the resource group when omitted
    #[arg(short, long)]
    pub name: Option<String>,

    /// Parent resource (server name for database kinds)
    #[arg(long)]
    pub parent: Option<String>,

    /// Keep resources carrying this tag (`key` or `key:value`, repeatable)
    #[arg(long = "tag", value_name = "KEY[:VALUE]")]
    pub tags: Vec<String>,

    /// Output format
    #[arg(long, value_enum, default_value_t = OutputFormat::Text)]
    pub format: OutputFormat,
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_is_well_formed() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_apply_flags() {
        let cli = Cli::parse_from([
            "azrm", "-vv", "apply", "plan.toml", "--check", "--state", "absent", "--format", "json",
        ]);
        assert_eq!(cli.verbose, 2);
        let Command::Apply(args) = cli.command else {
            panic!("expected apply");
        };
        assert!(args.check);
        assert_eq!(args.state, Some(RequestedState::Absent));
        assert_eq!(args.format, OutputFormat::Json);
        assert!(!args.yes);
    }

    #[test]
    fn test_rejects_unknown_state() {
        assert!(Cli::try_parse_from(["azrm", "apply", "plan.toml", "--state", "gone"]).is_err());
    }

    #[test]
    fn test_facts_tags_repeat() {
        let cli = Cli::parse_from([
            "azrm", "facts", "key_vault", "-g", "rg1", "--tag", "env:dev", "--tag", "owner",
        ]);
        let Command::Facts(args) = cli.command else {
            panic!("expected facts");
        };
        assert_eq!(args.resource_group, "rg1");
        assert_eq!(args.tags, vec!["env:dev", "owner"]);
        assert_eq!(args.name, None);
    }
}
