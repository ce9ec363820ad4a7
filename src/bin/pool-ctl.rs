//! Development tool for poking a nodejs-PoolController instance by hand.
//!
//! Usage:
//!   cargo run --bin pool-ctl -- snapshot
//!   cargo run --bin pool-ctl -- watch
//!   cargo run --bin pool-ctl -- circuit 6 on
//!   cargo run --bin pool-ctl -- setpoint 1 84
//!   cargo run --bin pool-ctl -- heat-mode 1 "Solar Preferred"

use clap::{Parser, Subcommand, ValueEnum};
use pool_controller_bridge::config::{Config, ControllerConfig};
use pool_controller_bridge::connection::{ConnectionManager, RestClient};
use serde_json::{Value, json};
use tokio::sync::mpsc;

#[derive(Parser)]
#[command(name = "pool-ctl")]
#[command(about = "Development tool for talking to a nodejs-PoolController instance")]
struct Cli {
    /// Controller host
    #[arg(long, env = "NJSPC_HOST", default_value = "127.0.0.1")]
    host: String,

    /// Controller port
    #[arg(long, env = "NJSPC_PORT", default_value_t = 4200)]
    port: u16,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Clone, Copy, ValueEnum)]
enum Switch {
    On,
    Off,
}

impl Switch {
    fn is_on(self) -> bool {
        matches!(self, Self::On)
    }
}

#[derive(Subcommand)]
enum Commands {
    /// Print the full controller state (`state/all`)
    Snapshot,
    /// Print push events as they arrive until Ctrl+C
    Watch,
    /// Switch an auxiliary circuit
    Circuit { id: u32, state: Switch },
    /// Switch a feature
    Feature { id: u32, state: Switch },
    /// Set a body's heat setpoint
    Setpoint {
        body: u32,
        heat: f64,
        /// Also set the cooling setpoint
        #[arg(long)]
        cool: Option<f64>,
    },
    /// Set a body's heat mode by its description (e.g. "Heater")
    HeatMode { body: u32, mode: String },
    /// Enable or disable a schedule
    Schedule { id: u32, state: Switch },
}

async fn put(rest: &RestClient, path: &str, payload: Value) -> Result<(), Box<dyn std::error::Error>> {
    println!("PUT {} {}", path, payload);
    rest.try_command(path, &payload).await?;
    println!("OK");
    Ok(())
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    let controller = ControllerConfig {
        host: cli.host,
        port: cli.port,
        ..Config::default().controller
    };
    let rest = RestClient::new(&controller)?;

    match cli.command {
        Commands::Snapshot => {
            let state = rest.try_fetch("state/all").await?;
            println!("{}", serde_json::to_string_pretty(&state)?);
        }
        Commands::Watch => {
            env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
                .format_timestamp_millis()
                .init();
            let config = Config {
                controller,
                ..Config::default()
            };
            let (tx, mut rx) = mpsc::channel(64);
            let manager = ConnectionManager::new(config, tx)?;
            manager.connect();
            println!("Watching {} (Ctrl+C to stop)", rest.base_url());
            loop {
                tokio::select! {
                    envelope = rx.recv() => match envelope {
                        Some(envelope) => println!("{:?}", envelope),
                        None => break,
                    },
                    _ = tokio::signal::ctrl_c() => break,
                }
            }
            manager.disconnect().await;
        }
        Commands::Circuit { id, state } => {
            put(&rest, "state/circuit/setState", json!({"id": id, "state": state.is_on()})).await?;
        }
        Commands::Feature { id, state } => {
            put(&rest, "state/feature/setState", json!({"id": id, "state": state.is_on()})).await?;
        }
        Commands::Setpoint { body, heat, cool } => {
            let mut payload = json!({"id": body, "heatSetpoint": heat});
            if let Some(cool) = cool {
                payload["coolSetpoint"] = json!(cool);
            }
            put(&rest, "state/body/setPoint", payload).await?;
        }
        Commands::HeatMode { body, mode } => {
            let modes = rest.heat_modes(body).await;
            let Some(val) = modes
                .iter()
                .find(|m| m.desc.as_deref() == Some(mode.as_str()))
                .and_then(|m| m.val)
            else {
                eprintln!("Unknown heat mode {:?} for body {}", mode, body);
                let known: Vec<_> = modes.iter().filter_map(|m| m.desc.as_deref()).collect();
                eprintln!("Available: {}", known.join(", "));
                std::process::exit(2);
            };
            put(&rest, "state/body/heatMode", json!({"id": body, "mode": val})).await?;
        }
        Commands::Schedule { id, state } => {
            put(&rest, "config/schedule", json!({"id": id, "disabled": !state.is_on()})).await?;
        }
    }

    Ok(())
}
