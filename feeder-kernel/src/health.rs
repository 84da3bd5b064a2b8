/*!
 * HEALTH - Santé du kernel feeder
 *
 * Compteurs atomiques (événements acceptés / rejetés, reconnexions MQTT) mis à
 * jour par la tâche moteur et le listener, publiés toutes les 30s sur
 * `{prefix}/kernel/health@v1` et exposés par GET /system/health.
 */

use parking_lot::Mutex;
use rumqttc::{AsyncClient, QoS};
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU32, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::task;

use crate::models::{Status, SystemStatus};

/// État du lien broker vu par le listener
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LinkStatus {
    Connecting,
    Connected,
    Disconnected,
    Reconnecting,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct KernelHealth {
    pub uptime_seconds: u64,
    pub nodes_tracked: u32,
    pub events_accepted: u64,
    pub events_rejected: u64,
    pub system_status: SystemStatus,
    pub memory_usage_mb: f32,
    pub mqtt_status: LinkStatus,
    pub mqtt_reconnects: u32,
}

#[derive(Clone)]
pub struct HealthTracker {
    start_time: Instant,
    nodes_tracked: u32,
    events_accepted: Arc<AtomicU64>,
    events_rejected: Arc<AtomicU64>,
    mqtt_reconnects: Arc<AtomicU32>,
    mqtt_status: Arc<Mutex<LinkStatus>>,
    system_status: Arc<Mutex<SystemStatus>>,
}

impl HealthTracker {
    pub fn new(nodes_tracked: usize) -> Self {
        Self {
            start_time: Instant::now(),
            nodes_tracked: nodes_tracked as u32,
            events_accepted: Arc::new(AtomicU64::new(0)),
            events_rejected: Arc::new(AtomicU64::new(0)),
            mqtt_reconnects: Arc::new(AtomicU32::new(0)),
            mqtt_status: Arc::new(Mutex::new(LinkStatus::Connecting)),
            system_status: Arc::new(Mutex::new(Status::Ok)),
        }
    }

    pub fn record_accepted(&self, status: SystemStatus) {
        self.events_accepted.fetch_add(1, Ordering::Relaxed);
        *self.system_status.lock() = status;
    }

    pub fn record_rejected(&self) {
        self.events_rejected.fetch_add(1, Ordering::Relaxed);
    }

    /// Statut recalculé hors télémétrie (reset, bascule sous-station)
    pub fn set_system_status(&self, status: SystemStatus) {
        *self.system_status.lock() = status;
    }

    pub fn mark_mqtt_connected(&self) {
        *self.mqtt_status.lock() = LinkStatus::Connected;
    }

    pub fn mark_mqtt_disconnected(&self) {
        *self.mqtt_status.lock() = LinkStatus::Disconnected;
    }

    pub fn increment_reconnects(&self) {
        self.mqtt_reconnects.fetch_add(1, Ordering::Relaxed);
        *self.mqtt_status.lock() = LinkStatus::Reconnecting;
    }

    pub fn get_health(&self) -> KernelHealth {
        KernelHealth {
            uptime_seconds: self.start_time.elapsed().as_secs(),
            nodes_tracked: self.nodes_tracked,
            events_accepted: self.events_accepted.load(Ordering::Relaxed),
            events_rejected: self.events_rejected.load(Ordering::Relaxed),
            system_status: *self.system_status.lock(),
            memory_usage_mb: get_memory_usage_mb(),
            mqtt_status: *self.mqtt_status.lock(),
            mqtt_reconnects: self.mqtt_reconnects.load(Ordering::Relaxed),
        }
    }

    /// Démarre la publication périodique du health sur le client MQTT partagé
    pub fn spawn_health_publisher(&self, client: AsyncClient, notify_prefix: &str) {
        let tracker = self.clone();
        let topic = format!("{notify_prefix}/kernel/health@v1");

        task::spawn(async move {
            let mut interval = tokio::time::interval(Duration::from_secs(30));
            loop {
                interval.tick().await;
                let health = tracker.get_health();
                let payload = match serde_json::to_string(&health) {
                    Ok(payload) => payload,
                    Err(e) => {
                        tracing::error!(error = %e, "failed to serialize kernel health");
                        continue;
                    }
                };
                match client.publish(topic.as_str(), QoS::AtLeastOnce, false, payload).await {
                    Ok(()) => tracing::debug!(
                        uptime = health.uptime_seconds,
                        accepted = health.events_accepted,
                        status = %health.system_status,
                        "published kernel health"
                    ),
                    Err(e) => tracing::warn!(error = %e, "failed to publish kernel health"),
                }
            }
        });
    }
}

fn get_memory_usage_mb() -> f32 {
    #[cfg(target_os = "linux")]
    {
        let rss_kb = std::fs::read_to_string("/proc/self/status").ok().and_then(|status| {
            status
                .lines()
                .find(|line| line.starts_with("VmRSS:"))
                .and_then(|line| line.split_whitespace().nth(1))
                .and_then(|kb| kb.parse::<u64>().ok())
        });
        if let Some(kb) = rss_kb {
            return kb as f32 / 1024.0;
        }
    }
    0.0
}
