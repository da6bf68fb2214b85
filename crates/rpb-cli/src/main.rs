//! RPB CLI - run Remote Protocol Bridge nodes from the command line
//!
//! Load a configuration document, start every node and print the observed
//! traffic until Ctrl+C.

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use colored::Colorize;
use rpb_core::{EngineConfig, IdAllocator, ObjectId, ProtocolRole};
use rpb_engine::Engine;
use serde::Serialize;
use std::net::IpAddr;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::info;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

mod config;
mod logger;

use config::OscEndpoint;
use logger::TracingLogger;

/// RPB - Remote Protocol Bridge
#[derive(Parser)]
#[command(name = "rpb")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Log level (trace, debug, info, warn, error)
    #[arg(short, long, global = true, default_value = "info")]
    log_level: String,

    /// Output logs as JSON
    #[arg(long, global = true)]
    json_logs: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the nodes of a configuration file
    Run {
        /// Configuration file (.toml or .json)
        #[arg(env = "RPB_CONFIG")]
        config: PathBuf,

        /// Do not print observed traffic
        #[arg(long)]
        quiet: bool,
    },

    /// Validate a configuration file and summarize it
    Check {
        /// Configuration file (.toml or .json)
        config: PathBuf,
    },

    /// Bridge two OSC peers without a configuration file
    Bypass {
        /// Address of the role A peer
        #[arg(long, default_value = "127.0.0.1")]
        a_ip: IpAddr,

        /// Port the role A peer listens on
        #[arg(long)]
        a_send: u16,

        /// Local port for role A traffic
        #[arg(long)]
        a_listen: u16,

        /// Address of the role B peer
        #[arg(long, default_value = "127.0.0.1")]
        b_ip: IpAddr,

        /// Port the role B peer listens on
        #[arg(long)]
        b_send: u16,

        /// Local port for role B traffic
        #[arg(long)]
        b_listen: u16,
    },

    /// List the remote object catalogue
    Objects {
        /// Print as JSON
        #[arg(long)]
        json: bool,
    },

    /// Show version and system info
    Info,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    setup_logging(&cli.log_level, cli.json_logs)?;

    match cli.command {
        Commands::Run { config, quiet } => {
            let document = config::load(&config)?;
            println!(
                "{} Running {} node(s) from {}",
                "RPB".cyan().bold(),
                document.nodes.len(),
                config.display()
            );
            run_engine(&document, !quiet).await?;
        }

        Commands::Check { config } => {
            let document = config::load(&config)?;
            print_summary(&document);
            println!("{} {} is valid", "OK".green().bold(), config.display());
        }

        Commands::Bypass {
            a_ip,
            a_send,
            a_listen,
            b_ip,
            b_send,
            b_listen,
        } => {
            let ids = IdAllocator::default();
            let document = config::quick_bypass(
                &ids,
                OscEndpoint {
                    ip: a_ip,
                    send_port: a_send,
                    listen_port: a_listen,
                },
                OscEndpoint {
                    ip: b_ip,
                    send_port: b_send,
                    listen_port: b_listen,
                },
            )?;
            println!(
                "{} Bypassing {}:{} <-> {}:{}",
                "RPB".cyan().bold(),
                a_ip,
                a_send,
                b_ip,
                b_send
            );
            run_engine(&document, true).await?;
        }

        Commands::Objects { json } => print_objects(json)?,

        Commands::Info => print_info(),
    }

    Ok(())
}

fn setup_logging(level: &str, json: bool) -> Result<()> {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(level))
        .context("Failed to parse log level")?;

    if json {
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().json())
            .init();
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().with_target(false).compact())
            .init();
    }

    Ok(())
}

async fn run_engine(document: &EngineConfig, print_traffic: bool) -> Result<()> {
    let (shutdown_tx, mut shutdown_rx) = mpsc::channel::<()>(1);
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("Received shutdown signal");
        }
        let _ = shutdown_tx.send(()).await;
    });

    let engine = Engine::new();
    if print_traffic {
        engine.set_logging_target(Some(Arc::new(TracingLogger)));
    }
    engine
        .set_state(document)
        .context("Failed to apply configuration")?;
    engine.start().context("Failed to start nodes")?;

    for id in engine.node_ids() {
        println!(
            "  {} {} ({}): A {:?} / B {:?}",
            "node".green(),
            id.0,
            engine.node_mode(id).unwrap_or("?"),
            engine.protocol_ids(id, ProtocolRole::A).unwrap_or_default(),
            engine.protocol_ids(id, ProtocolRole::B).unwrap_or_default(),
        );
    }
    println!("{} Bridging, press Ctrl+C to stop", "OK".green().bold());

    shutdown_rx.recv().await;

    // stopping joins the receive threads
    tokio::task::spawn_blocking(move || engine.stop())
        .await
        .context("Shutdown task failed")?
        .context("Failed to stop nodes")?;
    println!("{}", "Bridge stopped".yellow());
    Ok(())
}

fn print_summary(document: &EngineConfig) {
    println!(
        "{} {} node(s), logging {}",
        "RPB".cyan().bold(),
        document.nodes.len(),
        if document.logging_enabled { "on" } else { "off" }
    );
    for node in &document.nodes {
        println!("  {} {} ({})", "node".green(), node.id.0, node.handling.mode_name());
        for protocol in node.protocols() {
            let endpoint = match (protocol.ip_address, protocol.client_port, protocol.host_port) {
                (Some(ip), Some(send), Some(listen)) => format!("{}:{} <- :{}", ip, send, listen),
                (_, _, Some(listen)) => format!("<- :{}", listen),
                _ => protocol
                    .input_device
                    .clone()
                    .unwrap_or_else(|| "-".to_string()),
            };
            println!(
                "    {} {} {:<15} {}",
                protocol.role,
                protocol.id,
                protocol.protocol_type.to_string(),
                endpoint
            );
        }
    }
}

#[derive(Serialize)]
struct ObjectRow {
    id: ObjectId,
    name: &'static str,
    osc_address: &'static str,
    value_type: String,
    value_count: Option<u16>,
    channel: bool,
    record: bool,
    bridgeable: bool,
}

impl ObjectRow {
    fn new(object: ObjectId) -> Self {
        Self {
            id: object,
            name: object.name(),
            osc_address: rpb_bridge::osc::address_of(object),
            value_type: object.value_type().to_string(),
            value_count: object.value_count(),
            channel: object.needs_channel(),
            record: object.needs_record(),
            bridgeable: object.is_bridgeable(),
        }
    }
}

fn print_objects(json: bool) -> Result<()> {
    let rows: Vec<ObjectRow> = ObjectId::ALL.into_iter().map(ObjectRow::new).collect();
    if json {
        println!("{}", serde_json::to_string_pretty(&rows)?);
        return Ok(());
    }

    for row in rows {
        let addressing = match (row.channel, row.record) {
            (true, true) => "/ch/rec",
            (true, false) => "/ch",
            _ => "",
        };
        let name = format!("{:<42}", row.name);
        let name = if row.bridgeable {
            name.normal()
        } else {
            name.dimmed()
        };
        println!(
            "{} {:<7} {:<3} {}{}",
            name,
            row.value_type,
            row.value_count.map_or("n".to_string(), |c| c.to_string()),
            row.osc_address.yellow(),
            addressing
        );
    }
    Ok(())
}

fn print_info() {
    println!("{}", "RPB - Remote Protocol Bridge".cyan().bold());
    println!();
    println!("Version:    {}", env!("CARGO_PKG_VERSION"));
    println!("Platform:   {}", std::env::consts::OS);
    println!("Arch:       {}", std::env::consts::ARCH);
    println!();
    println!("{}", "Supported Protocols:".green());
    println!("  - OSC (Open Sound Control, d&b DS100 address space)");
    println!("  - RTTrPM (Real-Time Tracking Protocol, motion)");
    println!("  - MIDI (input, observed only)");
    println!("  - Device control (placeholder)");
    println!();
    println!("{}", "Handling modes:".green());
    for mode in [
        "bypass",
        "forward_a_only",
        "reverse_b_only",
        "remap_position_xy_to_xy",
        "mux_channels",
        "mux_channels_with_filter",
        "value_change_filter",
        "device_simulation",
    ] {
        println!("  - {}", mode);
    }
    if let Ok(ports) = rpb_bridge::midi::list_input_ports() {
        if !ports.is_empty() {
            println!();
            println!("{}", "MIDI inputs:".green());
            for port in ports {
                println!("  - {}", port);
            }
        }
    }
    println!();
    println!("{}", "Examples:".green());
    println!("  rpb check bridge.toml                          # Validate a configuration");
    println!("  rpb run bridge.toml                            # Run its nodes");
    println!("  rpb bypass --a-send 9001 --a-listen 9000 \\");
    println!("             --b-send 9101 --b-listen 9100      # Quick OSC bypass");
}
