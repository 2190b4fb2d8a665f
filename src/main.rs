//! messenger-cli - log in, load contacts, then chat from the terminal

use anyhow::Context;
use clap::Parser;
use messenger_cli::config::Config;
use messenger_cli::contacts::ContactDirectory;
use messenger_cli::credentials::Credentials;
use messenger_cli::gateway::GatewayClient;
use messenger_cli::repl::Repl;
use messenger_cli::router::Router;
use messenger_cli::session::Authenticator;
use std::path::PathBuf;
use tokio::io::BufReader;
use tracing::info;
use tracing_subscriber::EnvFilter;

/// Terminal chat client
#[derive(Parser)]
#[command(name = "messenger-cli", version)]
#[command(about = "Receive messages and reply from a small REPL")]
struct Cli {
    /// JSON file with {"email", "password", ...}; prompts when omitted
    credentials: Option<PathBuf>,
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Logs go to stderr so they never interleave with the REPL on stdout
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let config = Config::from_env()?;

    let credentials = match &cli.credentials {
        Some(path) => Credentials::load_file(path)?,
        None => Credentials::prompt()?,
    };

    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .context("starting async runtime")?;

    let result = runtime.block_on(run(config, credentials));

    // Stdin reads sit on a blocking thread; don't wait for one more line
    runtime.shutdown_background();
    result
}

async fn run(config: Config, credentials: Credentials) -> anyhow::Result<()> {
    let client = GatewayClient::new(&config)?;
    let session = client
        .authenticate(&credentials)
        .await
        .with_context(|| format!("logging in as {}", credentials.email))?;
    println!("Logged in as {}", session.account());

    println!("Fetching user details...");
    let directory = ContactDirectory::load(session.as_ref())
        .await
        .context("fetching friends list")?;
    info!("Directory ready with {} contacts", directory.len());

    println!("Listening for incoming messages...");
    let router = Router::new(directory, &config);
    let repl = Repl::new(router, session, &config, std::io::stdout());
    repl.run(BufReader::new(tokio::io::stdin())).await?;

    Ok(())
}
