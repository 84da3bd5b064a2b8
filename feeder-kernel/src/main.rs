/*!
 * FEEDER KERNEL - Point d'entrée du serveur
 *
 * RÔLE : bootstrap complet : config YAML, client MQTT partagé, moteur (tâche
 * unique), listener télémétrie, publication health et API HTTP.
 */

use anyhow::{Context, Result};
use std::sync::Arc;
use tokio::net::TcpListener;
use tracing::info;
use tracing_subscriber::EnvFilter;

use feeder_kernel::actor::spawn_engine;
use feeder_kernel::bus::BusSink;
use feeder_kernel::config::load_config;
use feeder_kernel::engine::FeederEngine;
use feeder_kernel::health::HealthTracker;
use feeder_kernel::http::{build_router, AppState};
use feeder_kernel::mqtt::{create_mqtt_client, spawn_mqtt_listener};
use feeder_kernel::sinks::{Sinks, TracingLogSink};

#[tokio::main]
async fn main() -> Result<()> {
    // .env optionnel (FEEDER_API_KEY, FEEDER_KERNEL_CONFIG, RUST_LOG)
    dotenvy::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("feeder_kernel=info")))
        .init();

    let cfg = load_config().await.context("Failed to load feeder config")?;

    let (mqtt_client, eventloop) = create_mqtt_client(&cfg.mqtt);

    // le dashboard écoute le bus; le journal part aussi dans les logs
    let bus = Arc::new(BusSink::new(mqtt_client.clone(), &cfg.mqtt.notify_prefix));
    let sinks = Sinks { renderer: bus.clone(), chart: bus.clone(), log: Arc::new(TracingLogSink), alert: bus };

    let engine = FeederEngine::from_config(&cfg, sinks).context("Invalid feeder topology")?;
    let health = HealthTracker::new(engine.topology().len());
    info!(
        nodes = engine.topology().len(),
        source = engine.topology().source().name.as_str(),
        "feeder topology loaded"
    );

    let (handle, _engine_task) = spawn_engine(engine, health.clone());

    spawn_mqtt_listener(
        mqtt_client.clone(),
        eventloop,
        cfg.mqtt.telemetry_topic.clone(),
        handle.clone(),
        health.clone(),
    );
    health.spawn_health_publisher(mqtt_client.clone(), &cfg.mqtt.notify_prefix);

    let app_state = AppState {
        engine: handle,
        health,
        mqtt: mqtt_client,
        command_topic: cfg.mqtt.command_topic.clone(),
    };
    let app = build_router(app_state);

    let listener = TcpListener::bind(&cfg.http.bind)
        .await
        .with_context(|| format!("Failed to bind {}", cfg.http.bind))?;
    info!(addr = %cfg.http.bind, "feeder kernel listening");
    axum::serve(listener, app).await.context("HTTP server failed")?;

    Ok(())
}
