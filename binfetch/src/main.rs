#![deny(missing_docs)]

//! CLI binary interface for binfetch

use binfetch::archive::{FirstCandidate, HttpCandidateSource, PromptCandidate, SelectCandidate};
use binfetch::checksum::HttpHasher;
use binfetch::config;
use binfetch::net::{self, ClientSettings};
use binfetch::release::GithubClient;
use camino::Utf8PathBuf;
use clap::Parser;
use console::Term;

use crate::cli::{AddArgs, Cli, Commands};

mod cli;

fn main() -> miette::Result<()> {
    let cli = Cli::parse();
    tracing_subscriber::fmt()
        .with_max_level(cli.verbose)
        .with_writer(std::io::stderr)
        .init();

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .worker_threads(1)
        .enable_all()
        .build()
        .expect("initializing tokio runtime failed");
    let _guard = runtime.enter();

    match &cli.command {
        Commands::Add(args) => runtime.block_on(cmd_add(&cli, args)),
        Commands::Validate => cmd_validate(&cli),
        Commands::ConfigSchema => cmd_config_schema(),
    }
}

fn config_path(cli: &Cli) -> Utf8PathBuf {
    cli.config
        .clone()
        .unwrap_or_else(|| Utf8PathBuf::from(config::DEFAULT_CONFIG_PATH))
}

async fn cmd_add(cli: &Cli, args: &AddArgs) -> Result<(), miette::Report> {
    let path = config_path(cli);
    let mut cfg = config::load_or_default(&path)?;

    let client = net::create_client(&ClientSettings::new())?;
    let github = GithubClient::new(client.clone(), args.token.clone());
    let release = github.query_release(&args.repo, args.tag.as_deref()).await?;

    let source = HttpCandidateSource::new(client.clone(), args.name.clone())?;
    let selector: &dyn SelectCandidate = if args.yes {
        &FirstCandidate
    } else {
        &PromptCandidate
    };
    let hasher = HttpHasher::new(client);
    binfetch::add_dependency(
        &mut cfg,
        &args.name,
        &release.version,
        release.homepage.as_deref(),
        release.description.as_deref(),
        &release.urls,
        &source,
        selector,
        &hasher,
    )
    .await?;

    config::save_config(&path, &cfg)?;
    let out = Term::stdout();
    out.write_line(&format!(
        "added {} {} to {path}",
        args.name, release.version
    ))
    .ok();
    Ok(())
}

fn cmd_validate(cli: &Cli) -> Result<(), miette::Report> {
    let path = config_path(cli);
    let cfg = config::load_config(&path)?;
    config::validate_config(&cfg)?;
    let out = Term::stdout();
    out.write_line(&format!("{path} is valid")).ok();
    Ok(())
}

fn cmd_config_schema() -> Result<(), miette::Report> {
    let schema = schemars::schema_for!(binfetch::schema::Config);
    let json = serde_json::to_string_pretty(&schema)
        .expect("config schema should always serialize");
    println!("{json}");
    Ok(())
}
