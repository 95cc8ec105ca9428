//! TAK gateway CLI binary.
//!
//! Streaming Cursor-on-Target client for TAK servers.
//!
//! # Commands
//!
//! - `connect` - Connect and stream decoded events to stdout
//! - `send` - Send one CoT document and exit

use std::io::Read;
use std::path::PathBuf;

use anyhow::{bail, Context};
use clap::{Parser, Subcommand};
use tak::{Config, CotEvent, Session, SessionEvent, VERSION};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "takgw")]
#[command(version = VERSION)]
#[command(about = "TAK gateway - streaming Cursor-on-Target client", long_about = None)]
struct Cli {
    /// Config file path (default: <config dir>/takgw/config.toml)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Server URL, e.g. ssl://tak.example.com:8089
    #[arg(short, long, global = true)]
    url: Option<String>,

    /// PEM client certificate path
    #[arg(long, global = true)]
    cert: Option<PathBuf>,

    /// PEM client private key path
    #[arg(long, global = true)]
    key: Option<PathBuf>,

    /// Verify the server certificate against this PEM CA bundle
    #[arg(long, global = true)]
    ca: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Connect and stream decoded events to stdout
    Connect {
        /// Print raw XML instead of one summary line per event
        #[arg(long)]
        raw: bool,
    },

    /// Send one CoT document and exit
    Send {
        /// XML input (or - for stdin)
        input: Option<String>,

        /// Input file path
        #[arg(short, long)]
        file: Option<PathBuf>,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .init();

    let cli = Cli::parse();
    let config = resolve_config(&cli)?;

    match cli.command {
        Commands::Connect { raw } => connect(config, raw).await,
        Commands::Send { ref input, ref file } => {
            let xml = resolve_input(input.as_deref(), file.as_deref())?;
            send(config, &xml).await
        }
    }
}

/// Layer configuration: file, then environment, then CLI flags.
fn resolve_config(cli: &Cli) -> anyhow::Result<Config> {
    let mut config = match &cli.config {
        Some(path) => Config::from_file(path)
            .with_context(|| format!("loading config from {}", path.display()))?,
        None => match Config::default_path() {
            Some(path) if path.exists() => Config::from_file(&path)
                .with_context(|| format!("loading config from {}", path.display()))?,
            _ => Config::default(),
        },
    };

    config = config.merge(Config::from_env());

    if let Some(url) = &cli.url {
        config.server.url = url.clone();
    }
    if let Some(cert) = &cli.cert {
        config.auth.cert = Some(cert.clone());
    }
    if let Some(key) = &cli.key {
        config.auth.key = Some(key.clone());
    }
    if let Some(ca) = &cli.ca {
        config.auth.ca = Some(ca.clone());
        config.server.verify_certificate = true;
    }

    Ok(config)
}

/// Read input from an argument, a file, or stdin.
fn resolve_input(input: Option<&str>, file: Option<&std::path::Path>) -> anyhow::Result<String> {
    match (input, file) {
        (Some("-"), _) | (None, None) => {
            let mut buf = String::new();
            std::io::stdin()
                .read_to_string(&mut buf)
                .context("reading stdin")?;
            Ok(buf)
        }
        (Some(text), _) => Ok(text.to_string()),
        (None, Some(path)) => std::fs::read_to_string(path)
            .with_context(|| format!("reading {}", path.display())),
    }
}

async fn connect(config: Config, raw: bool) -> anyhow::Result<()> {
    let endpoint = config.endpoint()?;
    let tls = config.tls_config()?;

    let mut session = Session::connect(endpoint, tls).await?;
    let mut events = session.events();
    let mut version_seen = false;

    while let Some(event) = events.recv().await {
        match event {
            SessionEvent::Connected => {
                eprintln!("connected to {}", config.server.url);
            }
            SessionEvent::Document(cot) => {
                if !version_seen {
                    if let Some(version) = session.server_version() {
                        eprintln!("server version {version}");
                        version_seen = true;
                    }
                }
                if raw {
                    println!("{cot}");
                } else {
                    println!("{} {}", cot.event_type(), cot.uid().unwrap_or("-"));
                }
            }
            SessionEvent::Error(e) => bail!("session failed: {e}"),
            SessionEvent::Closed => {
                eprintln!("connection closed");
                break;
            }
        }
    }

    Ok(())
}

async fn send(config: Config, xml: &str) -> anyhow::Result<()> {
    let event = CotEvent::from_xml(xml.trim()).context("parsing document")?;

    let endpoint = config.endpoint()?;
    let tls = config.tls_config()?;

    let mut session = Session::connect(endpoint, tls).await?;
    let mut events = session.events();

    session.write(&event).await?;
    session.close().await;

    // Wait for the shutdown to complete so the write is actually flushed
    while let Some(ev) = events.recv().await {
        match ev {
            SessionEvent::Closed => break,
            SessionEvent::Error(e) => bail!("session failed: {e}"),
            SessionEvent::Connected | SessionEvent::Document(_) => {}
        }
    }

    eprintln!("sent {} ({})", event.uid().unwrap_or("-"), event.event_type());
    Ok(())
}
