//! Data plane device entry point.
//!
//! Loads the runtime config and a graph description, runs the graph, and
//! serves clock sync. Commands are read from stdin until EOF.

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::io::BufRead;
use std::net::{SocketAddr, SocketAddrV4};
use std::path::PathBuf;
use synapse_dataplane::clock::{TimeSyncClient, TimeSyncServer};
use synapse_dataplane::config::DataPlaneConfig;
use synapse_dataplane::pipeline::{Config, Device};

#[derive(Debug, Parser)]
#[command(name = "synapse-dataplane", version, about = "NDTP data plane device")]
struct Cli {
    /// Runtime config file (TOML); the platform default when omitted
    #[arg(short, long)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Run a device (the default)
    Run {
        /// Graph description (JSON); overrides `device.graph`
        #[arg(short, long)]
        graph: Option<PathBuf>,

        /// Do not serve clock sync
        #[arg(long)]
        no_time_sync: bool,
    },
    /// Print the effective runtime config as TOML
    ShowConfig,
    /// Run one clock sync burst against a device and print the offset
    Sync {
        /// Time sync server address; `time_sync.host:port` when omitted
        server: Option<SocketAddr>,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    let config = DataPlaneConfig::load_or_default(cli.config.as_deref())
        .context("loading runtime config")?;
    let _log_guard = synapse_dataplane::logging::init(&config.logging)?;

    match cli.command.unwrap_or(Command::Run {
        graph: None,
        no_time_sync: false,
    }) {
        Command::Run {
            graph,
            no_time_sync,
        } => run(&config, graph, no_time_sync),
        Command::ShowConfig => {
            print!("{}", config.to_toml_string()?);
            Ok(())
        }
        Command::Sync { server } => sync(&config, server),
    }
}

fn run(config: &DataPlaneConfig, graph: Option<PathBuf>, no_time_sync: bool) -> Result<()> {
    tracing::info!("Starting device '{}' ({})", config.device.name, config.device.serial);

    let mut time_sync = if config.time_sync.enabled && !no_time_sync {
        let addr = SocketAddrV4::new(config.time_sync.host, config.time_sync.port);
        let mut server = TimeSyncServer::bind(addr.into())
            .with_context(|| format!("binding time sync server on {}", addr))?;
        server.start()?;
        Some(server)
    } else {
        None
    };

    let mut device = Device::from_config(config);
    if let Some(path) = graph.or_else(|| config.device.graph.clone()) {
        let graph = Config::load(&path).with_context(|| format!("loading graph {:?}", path))?;
        let status = device.configure(graph);
        if !status.is_ok() {
            tracing::warn!("Configure: {}", status);
        }
        let status = device.start();
        if !status.is_ok() {
            anyhow::bail!("start failed: {}", status);
        }
    } else {
        tracing::info!("No graph given; waiting for commands");
    }

    let stdin = std::io::stdin();
    for line in stdin.lock().lines() {
        let line = line?;
        match line.trim() {
            "" => {}
            "start" => println!("{}", device.start()),
            "stop" => println!("{}", device.stop()),
            "info" => println!("{}", serde_json::to_string_pretty(&device.info())?),
            "quit" | "exit" => break,
            other => match other.strip_prefix("configure ") {
                Some(path) => match Config::load(path.trim()) {
                    Ok(graph) => println!("{}", device.configure(graph)),
                    Err(e) => println!("error: {}", e),
                },
                None => println!("commands: start, stop, info, configure <graph.json>, quit"),
            },
        }
    }

    device.stop();
    if let Some(server) = time_sync.as_mut() {
        server.stop();
    }
    tracing::info!("Shutdown complete");
    Ok(())
}

fn sync(config: &DataPlaneConfig, server: Option<SocketAddr>) -> Result<()> {
    let server = server.unwrap_or_else(|| {
        SocketAddr::V4(SocketAddrV4::new(config.time_sync.host, config.time_sync.port))
    });
    let mut client = TimeSyncClient::new(server, &config.time_sync)?;
    let sample = client
        .sync_once()
        .with_context(|| format!("syncing with {}", server))?;
    println!(
        "offset {} ns, rtt {} ns, synced now {}",
        sample.offset_ns,
        sample.rtt_ns,
        client.now_ns()
    );
    Ok(())
}
