/*
[INPUT]:  CLI arguments, YAML configuration file, OS shutdown signals
[OUTPUT]: REST responses or periodic stream snapshots on stdout
[POS]:    Binary entry point
[UPDATE]: When changing CLI flags, subcommands, or shutdown handling
*/

mod config;

use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result, anyhow, bail};
use bybit_connector::{BybitClient, BybitWebSocket, ConnectionState, Credentials, Params};
use clap::{Parser, Subcommand};
use reqwest::Method;
use serde_json::Value;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use crate::config::CliConfig;

#[derive(Parser, Debug)]
#[command(name = "bybit-cli", version, about = "Bybit REST and stream client")]
struct Cli {
    #[arg(long = "config", value_name = "PATH")]
    config_path: Option<PathBuf>,
    #[arg(long = "log-level", value_name = "LEVEL", default_value = "info")]
    log_level: String,
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Print the exchange server time
    Time,
    /// Call a REST path with key=value parameters
    Get {
        /// Request path, e.g. /v2/public/tickers
        path: String,
        #[arg(long = "param", short = 'p', value_name = "KEY=VALUE", value_parser = parse_param)]
        params: Vec<(String, Value)>,
        /// Send as a POST with a JSON body
        #[arg(long)]
        post: bool,
        /// Sign the request with BYBIT_API_KEY / BYBIT_API_SECRET
        #[arg(long)]
        private: bool,
    },
    /// Stream the configured subscriptions and print fetched data
    Stream {
        /// Stop after this many prints
        #[arg(long)]
        rounds: Option<u32>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Cli::parse();
    init_tracing(&args.log_level)?;

    let config = match &args.config_path {
        Some(path) => {
            info!(config_path = %path.display(), "loading configuration");
            CliConfig::from_file(path).context("load config")?
        }
        None => CliConfig::default(),
    };
    info!(market = %config.market, testnet = config.testnet, "configuration loaded");

    match args.command {
        Command::Time => {
            let client = build_client(&config, false)?;
            print_json(&client.server_time().await.context("query server time")?)?;
        }
        Command::Get {
            path,
            params,
            post,
            private,
        } => {
            let client = build_client(&config, private)?;
            let method = if post { Method::POST } else { Method::GET };
            let params: Params = params.into_iter().collect();
            let body = client
                .execute(method, &path, params, private)
                .await
                .with_context(|| format!("request {path}"))?;
            print_json(&body)?;
        }
        Command::Stream { rounds } => run_stream(&config, rounds).await?,
    }

    Ok(())
}

fn init_tracing(log_level: &str) -> Result<()> {
    let filter = EnvFilter::try_new(log_level).context("invalid log level")?;
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .try_init()
        .map_err(|err| anyhow!(err))
        .context("initialize tracing subscriber")?;
    Ok(())
}

fn parse_param(raw: &str) -> std::result::Result<(String, Value), String> {
    let (key, value) = raw
        .split_once('=')
        .ok_or_else(|| format!("expected KEY=VALUE, got '{raw}'"))?;
    if key.is_empty() {
        return Err(format!("empty parameter name in '{raw}'"));
    }
    // Numbers and booleans go over the wire typed; anything else is a string.
    let value = serde_json::from_str::<Value>(value)
        .ok()
        .filter(|v| v.is_number() || v.is_boolean())
        .unwrap_or_else(|| Value::String(value.to_string()));
    Ok((key.to_string(), value))
}

fn build_client(config: &CliConfig, private: bool) -> Result<BybitClient> {
    let client_config = config.client_config();
    let base_url = config
        .client
        .base_url
        .clone()
        .unwrap_or_else(|| config.market.rest_url(config.testnet).to_string());
    let client = BybitClient::with_config_and_base_url(config.market, client_config, &base_url)
        .context("create http client")?;
    if !private {
        return Ok(client);
    }
    let credentials = Credentials::from_env()
        .context("private request requires BYBIT_API_KEY and BYBIT_API_SECRET")?;
    Ok(client.with_credentials(credentials))
}

fn print_json(value: &Value) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

async fn run_stream(config: &CliConfig, rounds: Option<u32>) -> Result<()> {
    if config.stream.subscriptions.is_empty() {
        bail!("stream requires at least one entry under stream.subscriptions");
    }
    let stream_config = config.stream_config(Credentials::from_env())?;
    let ws = BybitWebSocket::connect(stream_config)
        .await
        .context("connect stream")?;
    info!(url = ws.url(), "stream started");

    let shutdown = CancellationToken::new();
    setup_signal_handlers(shutdown.clone());

    let period = Duration::from_secs(config.stream.print_interval_secs.max(1));
    let mut ticker = tokio::time::interval(period);
    ticker.tick().await;
    let mut printed = 0u32;
    loop {
        tokio::select! {
            _ = shutdown.cancelled() => {
                info!("shutdown signal received");
                break;
            }
            _ = ticker.tick() => {}
        }

        let state = ws.state();
        if state == ConnectionState::Errored {
            warn!("stream gave up; exiting");
            break;
        }
        println!("--- state={state:?}");
        for subscription in ws.subscriptions() {
            let data = ws.fetch_subscription(subscription).unwrap_or_default();
            println!("{subscription}: {} entries", data.len());
            for entry in data.iter().rev().take(3) {
                println!("  {entry}");
            }
        }

        printed += 1;
        if rounds.is_some_and(|limit| printed >= limit) {
            break;
        }
    }

    ws.exit().await;
    info!("stream closed");
    Ok(())
}

fn setup_signal_handlers(shutdown: CancellationToken) {
    let shutdown_clone = shutdown.clone();
    tokio::spawn(async move {
        if let Err(err) = tokio::signal::ctrl_c().await {
            warn!(error = %err, "failed to install SIGINT handler");
            return;
        }
        info!("received SIGINT");
        shutdown_clone.cancel();
    });

    #[cfg(unix)]
    {
        use tokio::signal::unix::{SignalKind, signal};

        tokio::spawn(async move {
            match signal(SignalKind::terminate()) {
                Ok(mut stream) => {
                    stream.recv().await;
                    info!("received SIGTERM");
                    shutdown.cancel();
                }
                Err(err) => {
                    warn!(error = %err, "failed to install SIGTERM handler");
                }
            }
        });
    }
}
