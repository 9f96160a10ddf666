use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use cdp_adapter::ChromiumBrowser;
use clap::{Args, Parser, Subcommand};
use soulpilot_cli::app::{self, Engine};
use soulpilot_cli::runtime::{init_logging, init_metrics, load_config};
use soulpilot_cli::Config;
use soulpilot_core_types::SessionId;
use tracing::{error, info};

const VERSION: &str = concat!(
    env!("CARGO_PKG_VERSION"),
    " (",
    env!("GIT_HASH"),
    " ",
    env!("BUILD_DATE"),
    ")"
);

#[derive(Parser)]
#[command(name = "soulpilot")]
#[command(about = "Resolve page elements and run browser actions")]
#[command(version = VERSION)]
struct Cli {
    /// Configuration file path
    #[arg(short, long, value_name = "FILE", global = true)]
    config: Option<PathBuf>,

    /// Log level (overrides the configured level)
    #[arg(short, long, global = true)]
    log_level: Option<String>,

    /// Enable debug mode
    #[arg(short, long, global = true)]
    debug: bool,

    /// Emit logs as JSON
    #[arg(long, global = true)]
    json_logs: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run an automation request file
    Run(RunArgs),
    /// Print the queries a selector compiles to
    Compile(CompileArgs),
    /// Open a page and resolve one selector on it
    Resolve(ResolveArgs),
}

#[derive(Args)]
struct RunArgs {
    /// JSON request file
    #[arg(short, long, value_name = "FILE")]
    request: PathBuf,

    /// Named session to run in
    #[arg(short, long)]
    session: Option<String>,

    /// Pretty-print the result
    #[arg(long)]
    pretty: bool,
}

#[derive(Args)]
struct CompileArgs {
    /// Selector JSON or shorthand, or @file
    #[arg(short, long)]
    selector: String,
}

#[derive(Args)]
struct ResolveArgs {
    #[arg(short, long)]
    url: String,

    /// Selector JSON or shorthand, or @file
    #[arg(short, long)]
    selector: String,
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    match execute(cli).await {
        Ok(true) => ExitCode::SUCCESS,
        Ok(false) => ExitCode::FAILURE,
        Err(err) => {
            error!("{err:#}");
            eprintln!("Error: {err:#}");
            ExitCode::FAILURE
        }
    }
}

async fn execute(cli: Cli) -> Result<bool> {
    let loaded = load_config(cli.config.as_deref()).await?;
    let logging = &loaded.config.logging;
    let level = cli.log_level.as_deref().unwrap_or(&logging.level);
    init_logging(level, cli.debug, cli.json_logs || logging.json)?;
    loaded.announce();
    let _metrics = init_metrics();

    info!(version = VERSION, config = ?loaded.path, "Starting SoulPilot");
    let config = loaded.config;

    match cli.command {
        Commands::Run(args) => cmd_run(args, &config).await,
        Commands::Compile(args) => cmd_compile(args).await,
        Commands::Resolve(args) => cmd_resolve(args, &config).await,
    }
}

async fn cmd_run(args: RunArgs, config: &Config) -> Result<bool> {
    let request = app::read_request(&args.request, &config.actions).await?;
    let browser = launch(config).await?;
    let engine = Engine::new(browser.clone(), config);

    let result = engine.run(&request, args.session.map(SessionId::from)).await;
    engine.shutdown().await;
    browser.shutdown().await;

    println!("{}", app::render(&result, args.pretty)?);
    Ok(result.success)
}

async fn cmd_compile(args: CompileArgs) -> Result<bool> {
    let selector = app::read_selector(&args.selector).await?;
    println!("{}", app::render(&app::compile_plan(&selector), true)?);
    Ok(true)
}

async fn cmd_resolve(args: ResolveArgs, config: &Config) -> Result<bool> {
    let selector = app::read_selector(&args.selector).await?;
    let browser = launch(config).await?;
    let engine = Engine::new(browser.clone(), config);

    let timeout = Duration::from_millis(config.actions.default_timeout_ms);
    let outcome = engine.resolve(&args.url, &selector, timeout).await;
    engine.shutdown().await;
    browser.shutdown().await;

    let result = outcome?;
    println!("{}", app::render(&result, true)?);
    Ok(result.found)
}

async fn launch(config: &Config) -> Result<Arc<ChromiumBrowser>> {
    let browser = ChromiumBrowser::launch(&config.browser)
        .await
        .context("Failed to launch Chromium")?;
    Ok(Arc::new(browser))
}
