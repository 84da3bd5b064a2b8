/*!
 * MQTT - Client partagé, listener télémétrie et commandes sortantes
 *
 * FONCTIONNEMENT :
 * - Un seul AsyncClient pour tout le kernel (listener, bus sinks, health, commandes)
 * - La boucle `eventloop.poll()` tourne dans le listener : c'est elle qui
 *   transmet aussi les publications des autres composants
 * - Ré-abonnement à chaque ConnAck (le broker oublie les abonnements d'une
 *   session non persistante)
 */

use anyhow::Context;
use rumqttc::{AsyncClient, Event, EventLoop, Incoming, MqttOptions, QoS};
use std::time::Duration;
use tokio::task::{self, JoinHandle};
use uuid::Uuid;

use crate::actor::EngineHandle;
use crate::config::MqttConf;
use crate::health::HealthTracker;
use crate::models::{now_ms, SubstationToggle};

pub fn create_mqtt_client(cfg: &MqttConf) -> (AsyncClient, EventLoop) {
    // suffixe unique : deux kernels sur le même broker ne doivent pas s'éjecter
    let client_id = format!("{}-{}", cfg.client_id, &Uuid::new_v4().simple().to_string()[..8]);
    let mut opts = MqttOptions::new(client_id, &cfg.host, cfg.port);
    opts.set_keep_alive(Duration::from_secs(15));
    opts.set_clean_session(true);
    AsyncClient::new(opts, 64)
}

pub fn spawn_mqtt_listener(
    client: AsyncClient,
    mut eventloop: EventLoop,
    telemetry_topic: String,
    engine: EngineHandle,
    health: HealthTracker,
) -> JoinHandle<()> {
    task::spawn(async move {
        loop {
            match eventloop.poll().await {
                Ok(Event::Incoming(Incoming::ConnAck(_))) => {
                    health.mark_mqtt_connected();
                    match client.try_subscribe(telemetry_topic.as_str(), QoS::AtLeastOnce) {
                        Ok(()) => tracing::info!(topic = %telemetry_topic, "subscribed to telemetry"),
                        Err(e) => tracing::error!(topic = %telemetry_topic, error = %e, "telemetry subscribe failed"),
                    }
                }
                Ok(Event::Incoming(Incoming::Publish(p))) if topic_matches(&telemetry_topic, &p.topic) => {
                    tracing::trace!(topic = %p.topic, bytes = p.payload.len(), "telemetry received");
                    if engine.ingest(p.payload.to_vec(), now_ms()).await.is_err() {
                        tracing::error!("feeder engine stopped, MQTT listener exiting");
                        return;
                    }
                }
                Ok(Event::Incoming(Incoming::Disconnect)) => health.mark_mqtt_disconnected(),
                Ok(_) => {}
                Err(e) => {
                    tracing::warn!(error = %e, "MQTT connection error, retrying in 2s");
                    health.increment_reconnects();
                    tokio::time::sleep(Duration::from_secs(2)).await;
                }
            }
        }
    })
}

/// Publie la commande `substation_toggle` vers le terrain
pub async fn publish_command(client: &AsyncClient, topic: &str, command: &SubstationToggle) -> anyhow::Result<()> {
    let payload = serde_json::to_vec(command).context("serialize substation command")?;
    client
        .publish(topic, QoS::AtLeastOnce, false, payload)
        .await
        .with_context(|| format!("publish command on {topic}"))?;
    tracing::info!(topic, substation_id = command.substation_id, status = ?command.status, "command published");
    Ok(())
}

/// Filtre MQTT avec jokers `+` (un niveau) et `#` (tous les niveaux restants)
pub fn topic_matches(filter: &str, topic: &str) -> bool {
    let mut levels = topic.split('/');
    for part in filter.split('/') {
        match part {
            "#" => return true,
            "+" => {
                if levels.next().is_none() {
                    return false;
                }
            }
            literal => {
                if levels.next() != Some(literal) {
                    return false;
                }
            }
        }
    }
    levels.next().is_none()
}
