use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use contextgpt::config::Config;
use contextgpt::llm::{ChatClient, ClientOption};
use contextgpt::UrlAnalyzer;
use std::path::PathBuf;
use std::time::Duration;
use tracing::{error, info, level_filters::LevelFilter};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

#[derive(Parser, Debug)]
#[command(name = "contextgpt", version, about = "Ask a chat model, optionally with web pages as context")]
struct Cli {
    /// Config file (defaults to $CONTEXTGPT_CONFIG or ./contextgpt.toml)
    #[arg(short, long, global = true, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Override the API base URL
    #[arg(long, global = true)]
    base_url: Option<String>,

    /// Override the request timeout in seconds
    #[arg(long, global = true)]
    timeout_secs: Option<u64>,

    /// Emit logs as JSON
    #[arg(long, global = true)]
    json_logs: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Ask a question without any context
    Ask { question: String },
    /// Answer a question using the pages listed in a URL file
    Analyze {
        question: String,
        #[arg(short, long, value_name = "FILE")]
        urls: Option<PathBuf>,
    },
    /// Print the context collected from a URL file
    Context {
        #[arg(short, long, value_name = "FILE")]
        urls: Option<PathBuf>,
    },
}

fn init_tracing(json: bool) -> Result<()> {
    let env_filter = EnvFilter::builder()
        .with_default_directive(LevelFilter::INFO.into())
        .from_env_lossy()
        .add_directive("contextgpt=debug".parse()?);

    let registry = tracing_subscriber::registry().with(env_filter);
    if json {
        registry
            .with(fmt::layer().json().with_writer(std::io::stderr))
            .init();
    } else {
        registry.with(fmt::layer().with_writer(std::io::stderr)).init();
    }
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.json_logs)?;

    run(cli).await.map_err(|e| {
        match e.downcast_ref::<contextgpt::Error>() {
            Some(err) => error!(error_code = err.error_code(), message = %err, "Command failed"),
            None => error!(message = %format!("{:#}", e), "Command failed"),
        }
        e
    })
}

async fn run(cli: Cli) -> Result<()> {
    let config = match &cli.config {
        Some(path) => {
            let mut cfg = Config::load(path)?;
            cfg.apply_env_overrides()?;
            cfg
        }
        None => Config::load_auto()?,
    };

    let mut options = config.client_options();
    if let Some(base_url) = cli.base_url.clone() {
        options.push(ClientOption::BaseUrl(base_url));
    }
    if let Some(secs) = cli.timeout_secs {
        options.push(ClientOption::Timeout(Duration::from_secs(secs)));
    }

    let api_key = config
        .key_source()?
        .resolve()
        .await
        .context("Failed to load API key")?;
    let client = ChatClient::new(api_key, options)?;
    info!(
        "Using chat completion API at {} (timeout {:?})",
        client.base_url(),
        client.timeout()
    );

    match cli.command {
        Command::Ask { question } => {
            let answer = client.create_chat_completion(&question).await?;
            println!("Answer: {}", answer);
        }
        Command::Analyze { question, urls } => {
            let urls = urls.unwrap_or_else(|| config.analyzer.urls_file.clone());
            let analyzer = UrlAnalyzer::new(&client, urls);
            info!("Answering with context from {}", analyzer.urls_file().display());
            let answer = analyzer.analyze(&question).await?;
            println!("Answer: {}", answer);
        }
        Command::Context { urls } => {
            let urls = urls.unwrap_or_else(|| config.analyzer.urls_file.clone());
            let analyzer = UrlAnalyzer::new(&client, urls);
            let list = analyzer.load_urls().await?;
            let bundle = analyzer.collect_context(&list).await?;
            info!(
                "Collected {} pages, skipped {}",
                bundle.fetched, bundle.skipped
            );
            print!("{}", bundle.content);
        }
    }

    Ok(())
}
