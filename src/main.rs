//! Tunnelgate CLI - inspect identifiers and configuration, dry-run dispatch

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};
use tunnelgate_lib::auth::{InMemorySessionStore, Session, StaticUserContext};
use tunnelgate_lib::control::TunnelDispatcher;
use tunnelgate_lib::loopback::LoopbackTarget;
use tunnelgate_lib::proto::{TargetKind, TunnelRequest, AUTH_TOKEN_PARAM, ID_PARAM};
use tunnelgate_lib::GatewayConfig;

/// Tunnelgate - request-to-tunnel dispatch for remote-session gateways
#[derive(Parser, Debug)]
#[command(name = "tunnelgate")]
#[command(about = "Tunnelgate - request-to-tunnel dispatch for remote-session gateways")]
#[command(version)]
struct Cli {
    /// Log level (trace, debug, info, warn, error)
    #[arg(long, global = true, default_value = "info", env = "TUNNELGATE_LOG")]
    log_level: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Parse a target identifier such as "c/room42"
    Resolve {
        /// Prefixed target identifier
        identifier: String,

        /// Configuration file providing the prefix table
        #[arg(long, env = "TUNNELGATE_CONFIG")]
        config: Option<PathBuf>,
    },

    /// Validate a configuration file and print the effective settings
    CheckConfig {
        #[arg(long, env = "TUNNELGATE_CONFIG")]
        config: PathBuf,
    },

    /// Print a configuration template
    Template,

    /// Dispatch a tunnel to an in-memory loopback target and close it again
    #[command(long_about = r#"
Create a throwaway session whose only target is a loopback target named by
the identifier, dispatch a tunnel to it, print the resulting connection and
close the tunnel through the monitored close path.

EXAMPLES:
  tunnelgate dispatch c/room42 --width 1280 --height 720
  tunnelgate dispatch g/ops --config tunnelgate.yml
    "#)]
    Dispatch {
        /// Prefixed target identifier
        identifier: String,

        #[arg(long, env = "TUNNELGATE_CONFIG")]
        config: Option<PathBuf>,

        /// Optimal screen width in pixels
        #[arg(long)]
        width: Option<u32>,

        /// Optimal screen height in pixels
        #[arg(long)]
        height: Option<u32>,

        /// Optimal resolution in DPI
        #[arg(long)]
        dpi: Option<u32>,
    },
}

fn setup_logging(log_level: &str) {
    let filter = EnvFilter::try_new(log_level).unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::registry()
        .with(fmt::layer().with_target(true).with_thread_ids(false))
        .with(filter)
        .init();
}

fn load_config(path: Option<&Path>) -> Result<GatewayConfig> {
    match path {
        Some(path) => GatewayConfig::load(path)
            .with_context(|| format!("Failed to load config file: {:?}", path)),
        None => GatewayConfig::from_env().context("Invalid environment override"),
    }
}

fn resolve(identifier: &str, config: Option<&Path>) -> Result<()> {
    let config = load_config(config)?;
    let table = config.identifier_table()?;
    let reference = table
        .parse(identifier)
        .with_context(|| format!("Cannot resolve identifier {:?}", identifier))?;

    println!("kind: {}", reference.kind);
    println!("id:   {}", reference.id);
    Ok(())
}

fn check_config(path: &Path) -> Result<()> {
    let config = GatewayConfig::load(path)
        .with_context(|| format!("Failed to load config file: {:?}", path))?;
    let dispatcher = config.build_dispatcher_config()?;

    println!("Configuration OK: {}", path.display());
    println!("  clipboard integration: {}", dispatcher.clipboard_integration);
    match config.session_timeout() {
        Some(timeout) => println!("  session timeout:       {}s", timeout.as_secs()),
        None => println!("  session timeout:       disabled"),
    }
    println!("  identifier prefixes:");
    for (prefix, kind) in dispatcher.identifiers.entries() {
        println!("    {:<8} {}", prefix, kind);
    }
    Ok(())
}

async fn dispatch(
    identifier: &str,
    config: Option<&Path>,
    width: Option<u32>,
    height: Option<u32>,
    dpi: Option<u32>,
) -> Result<()> {
    let config = load_config(config)?;
    let dispatcher_config = config.build_dispatcher_config()?;
    let reference = dispatcher_config
        .identifiers
        .parse(identifier)
        .with_context(|| format!("Cannot resolve identifier {:?}", identifier))?;

    let target = Arc::new(LoopbackTarget::new(&reference.id, format!("Loopback {}", reference.id)));
    let user = match reference.kind {
        TargetKind::Connection => StaticUserContext::new("local").with_connection(target.clone()),
        TargetKind::ConnectionGroup => StaticUserContext::new("local").with_group(target.clone()),
    };

    let mut session = Session::new(Arc::new(user));
    if config.clipboard_integration {
        session = session.with_clipboard(Default::default());
    }

    let store: Arc<InMemorySessionStore> = Arc::new(config.build_session_store());
    let (token, session) = store.create_session(session);
    let dispatcher = TunnelDispatcher::new(store.clone(), dispatcher_config);

    let mut request = TunnelRequest::new()
        .with_parameter(AUTH_TOKEN_PARAM, token.as_str())
        .with_parameter(ID_PARAM, identifier);
    for (name, value) in [("width", width), ("height", height), ("dpi", dpi)] {
        if let Some(value) = value {
            request.add_parameter(name, value.to_string());
        }
    }

    let Some(tunnel) = dispatcher
        .create_tunnel(&request)
        .await
        .context("Dispatch failed")?
    else {
        println!("Connection canceled by listener");
        return Ok(());
    };

    for connection in session.all_active_connections() {
        println!("tunnel:  {}", connection.tunnel_uuid);
        println!("target:  {} ({})", connection.target, connection.target_name);
        println!("user:    {}", connection.username);
        println!("started: {}", connection.started_at.to_rfc3339());
    }

    tunnel.close().await.context("Failed to close tunnel")?;
    info!(remaining = session.tunnel_count(), "Tunnel closed");

    store.invalidate(&token).await;
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    setup_logging(&cli.log_level);

    debug!(
        version = env!("CARGO_PKG_VERSION"),
        git_hash = env!("GIT_HASH"),
        built = env!("BUILD_TIME"),
        "tunnelgate starting"
    );

    match cli.command {
        Commands::Resolve { identifier, config } => resolve(&identifier, config.as_deref()),
        Commands::CheckConfig { config } => check_config(&config),
        Commands::Template => {
            print!("{}", GatewayConfig::template());
            Ok(())
        }
        Commands::Dispatch {
            identifier,
            config,
            width,
            height,
            dpi,
        } => dispatch(&identifier, config.as_deref(), width, height, dpi).await,
    }
}
