//! feeder-sim : rejoue des scénarios de télémétrie poteau sur un broker MQTT
//!
//! ```text
//! feeder-sim sample --repeat 10 --interval-ms 2000
//! feeder-sim fault --pole 3 --fault-type short --voltage 0
//! feeder-sim neutral --pole 4
//! feeder-sim outage
//! feeder-sim clear
//! ```

use anyhow::{bail, Result};
use clap::{Parser, Subcommand};
use feeder_devkit::mqtt_stub::publish_payloads;
use feeder_devkit::Scenario;
use log::{info, warn};
use rumqttc::{AsyncClient, Event, Incoming, MqttOptions};
use tokio::time::{sleep, timeout, Duration};

#[derive(Parser, Debug)]
#[command(name = "feeder-sim")]
#[command(version)]
#[command(about = "Publish simulated pole telemetry for the feeder kernel")]
struct Cli {
    #[command(subcommand)]
    command: Command,

    /// Broker MQTT
    #[arg(long, default_value = "127.0.0.1", global = true)]
    host: String,

    #[arg(long, default_value_t = 1883, global = true)]
    port: u16,

    /// Préfixe des topics poteaux
    #[arg(long, default_value = "scada/poles", global = true)]
    prefix: String,

    /// Poteaux dans l'ordre du départ, source en tête
    #[arg(long, value_delimiter = ',', default_value = "5,4,3,2,1", global = true)]
    poles: Vec<u32>,
}

#[derive(Subcommand, Debug, Clone, PartialEq)]
enum Command {
    /// Relevés OK aléatoires sur tous les poteaux
    Sample {
        #[arg(long, default_value_t = 1)]
        repeat: u32,
        #[arg(long, default_value_t = 1000)]
        interval_ms: u64,
    },
    /// Défaut sur un poteau
    Fault {
        #[arg(long, default_value_t = 4)]
        pole: u32,
        #[arg(long, default_value = "Overvoltage")]
        fault_type: String,
        #[arg(long, default_value_t = 270.0)]
        voltage: f64,
    },
    /// Neutre coupé (WARNING)
    Neutral {
        #[arg(long)]
        pole: u32,
    },
    /// Perte de la source
    Outage,
    /// Retour à la normale
    Clear,
}

#[tokio::main]
async fn main() -> Result<()> {
    env_logger::init();
    let cli = Cli::parse();
    if cli.poles.is_empty() {
        bail!("--poles must list at least the source");
    }

    let client_id = format!("feeder-sim-{}", std::process::id());
    let mut options = MqttOptions::new(client_id, &cli.host, cli.port);
    options.set_keep_alive(Duration::from_secs(30));
    let (client, mut eventloop) = AsyncClient::new(options, 100);

    let (scenario, repeat, interval) = match cli.command.clone() {
        Command::Sample { repeat, interval_ms } => (Scenario::SampleData, repeat.max(1), interval_ms),
        Command::Fault { pole, fault_type, voltage } => (Scenario::Fault { pole, fault_type, voltage }, 1, 0),
        Command::Neutral { pole } => (Scenario::NeutralBreak { pole }, 1, 0),
        Command::Outage => (Scenario::SourceOutage, 1, 0),
        Command::Clear => (Scenario::AllClear, 1, 0),
    };

    info!("🚀 {} on {}:{} ({} round(s))", scenario.name(), cli.host, cli.port, repeat);

    for round in 0..repeat {
        let payloads = scenario.payloads(&cli.poles, chrono::Utc::now().timestamp_millis());
        let sent = publish_payloads(&client, &cli.prefix, &payloads).await?;
        wait_for_acks(&mut eventloop, sent).await?;
        info!("✅ round {}: {} payload(s) acknowledged", round + 1, sent);

        if round + 1 < repeat {
            sleep(Duration::from_millis(interval)).await;
        }
    }

    client.disconnect().await.ok();
    Ok(())
}

/// Fait tourner la boucle MQTT jusqu'à `expected` PubAck (QoS 1)
async fn wait_for_acks(eventloop: &mut rumqttc::EventLoop, expected: usize) -> Result<()> {
    let mut acked = 0;
    let drive = async {
        while acked < expected {
            match eventloop.poll().await {
                Ok(Event::Incoming(Incoming::PubAck(_))) => acked += 1,
                Ok(_) => {}
                Err(e) => {
                    warn!("⚠️ MQTT connection error: {}. Retrying...", e);
                    sleep(Duration::from_secs(1)).await;
                }
            }
        }
    };
    if timeout(Duration::from_secs(10), drive).await.is_err() {
        bail!("broker did not acknowledge {} payload(s) within 10s", expected);
    }
    Ok(())
}
