use anyhow::Result;
use civiclink::api::ApiClient;
use civiclink::cli::{self, Command};
use civiclink::config;
use civiclink::session::{FileStorage, SessionStore};
use clap::Parser;
use std::sync::Arc;

#[derive(Parser, Debug)]
#[command(name = "civiclink")]
#[command(about = "Report, triage and administer civic issues")]
#[command(version)]
struct Args {
    /// Initialize configuration
    #[arg(long)]
    init: bool,

    /// Path to config file
    #[arg(long, short)]
    config: Option<std::path::PathBuf>,

    #[command(subcommand)]
    command: Option<Command>,
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    let args = Args::parse();

    // Logs go to stderr so command output stays pipeable
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("civiclink=info".parse()?),
        )
        .init();

    if args.init {
        config::init_wizard().await?;
        return Ok(());
    }

    let Some(command) = args.command else {
        anyhow::bail!("No command given. Run `civiclink --help` for usage.");
    };

    let config = config::load(args.config.as_deref())?;
    let storage = FileStorage::new(config::session_storage_path(&config)?);
    let session = Arc::new(SessionStore::new(ApiClient::from_config(&config), Arc::new(storage)));
    session.restore().await;

    cli::run(&config, session, command).await
}
