//! All the clap stuff for parsing/documenting the cli

use camino::Utf8PathBuf;
use clap::{
    builder::{PossibleValuesParser, TypedValueParser},
    Args, Parser, Subcommand,
};
use tracing::level_filters::LevelFilter;

#[derive(Parser)]
#[clap(version, about, long_about = None)]
#[clap(propagate_version = true)]
/// Manage per-project downloadable binary tools.
pub struct Cli {
    /// Subcommand to run
    #[clap(subcommand)]
    pub command: Commands,

    /// How verbose logging should be (log level)
    #[clap(long)]
    #[clap(default_value_t = LevelFilter::WARN)]
    #[clap(value_parser = PossibleValuesParser::new(["off", "error", "warn", "info", "debug", "trace"]).map(|s| s.parse::<LevelFilter>().expect("possible values are valid")))]
    #[clap(help_heading = "GLOBAL OPTIONS", global = true)]
    pub verbose: LevelFilter,

    /// Path of the config file (default: binfetch.yml)
    #[clap(long)]
    #[clap(help_heading = "GLOBAL OPTIONS", global = true)]
    pub config: Option<Utf8PathBuf>,
}

/// The subcommands
#[derive(Subcommand)]
pub enum Commands {
    /// Synthesize a dependency from a forge release and add it to the config
    #[clap(disable_version_flag = true)]
    Add(AddArgs),
    /// Check that every dependency resolves on every declared system
    #[clap(disable_version_flag = true)]
    Validate,
    /// Print the JSON schema of the config file
    #[clap(disable_version_flag = true)]
    ConfigSchema,
}

/// Arguments for `binfetch add`
#[derive(Args)]
pub struct AddArgs {
    /// Name the tool should get in the config
    pub name: String,

    /// The forge repository, as org/name
    pub repo: String,

    /// Release tag to use instead of the latest release
    #[clap(long)]
    pub tag: Option<String>,

    /// Token for the forge API (avoids rate limits, allows private repos)
    #[clap(long, env = "GITHUB_TOKEN", hide_env_values = true)]
    pub token: Option<String>,

    /// Never prompt; take the first archive entry that qualifies
    #[clap(long)]
    pub yes: bool,
}
