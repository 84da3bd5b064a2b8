/*!
 * ACTOR - Propriétaire unique du moteur
 *
 * RÔLE : une seule tâche tokio possède le `FeederEngine`. Le listener MQTT et les
 * handlers HTTP lui envoient des `EngineCommand` via un canal mpsc; les requêtes
 * reçoivent leur réponse par `oneshot`. Les événements sont donc traités un par
 * un, dans l'ordre d'arrivée, sans verrou sur l'état.
 */

use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;

use crate::engine::FeederEngine;
use crate::error::{EngineClosed, IngestError};
use crate::event_log::LogEntry;
use crate::health::HealthTracker;
use crate::models::{SubstationToggle, SystemStatus, TelemetryEvent};
use crate::series::{Sample, Series};
use crate::snapshot::FeederSnapshot;
use crate::topology::NodeId;

const CHANNEL_CAPACITY: usize = 256;

type Reply<T> = oneshot::Sender<T>;

#[derive(Debug, Clone, PartialEq, serde::Serialize)]
pub struct NodeSeries {
    pub node: NodeId,
    pub voltage: Vec<Sample>,
    pub current: Vec<Sample>,
}

pub enum EngineCommand {
    /// Payload MQTT brut; `reply` absent pour le flux scada
    Ingest { payload: Vec<u8>, received_at: i64, reply: Option<Reply<Result<SystemStatus, IngestError>>> },
    Telemetry { event: TelemetryEvent, reply: Reply<Result<SystemStatus, IngestError>> },
    Reset { now: i64, reply: Reply<SystemStatus> },
    /// `online: None` inverse l'état courant
    ToggleSource { online: Option<bool>, now: i64, reply: Reply<SubstationToggle> },
    ClearSeries { reply: Reply<()> },
    Snapshot { reply: Reply<FeederSnapshot> },
    Events { limit: usize, reply: Reply<Vec<LogEntry>> },
    Series { node: NodeId, reply: Reply<Option<NodeSeries>> },
}

#[derive(Clone)]
pub struct EngineHandle {
    tx: mpsc::Sender<EngineCommand>,
}

impl EngineHandle {
    /// Envoi sans attente de réponse (listener MQTT)
    pub async fn ingest(&self, payload: Vec<u8>, received_at: i64) -> Result<(), EngineClosed> {
        self.tx
            .send(EngineCommand::Ingest { payload, received_at, reply: None })
            .await
            .map_err(|_| EngineClosed)
    }

    pub async fn ingest_and_wait(
        &self,
        payload: Vec<u8>,
        received_at: i64,
    ) -> Result<Result<SystemStatus, IngestError>, EngineClosed> {
        self.request(|reply| EngineCommand::Ingest { payload, received_at, reply: Some(reply) }).await
    }

    pub async fn apply(&self, event: TelemetryEvent) -> Result<Result<SystemStatus, IngestError>, EngineClosed> {
        self.request(|reply| EngineCommand::Telemetry { event, reply }).await
    }

    pub async fn reset(&self, now: i64) -> Result<SystemStatus, EngineClosed> {
        self.request(|reply| EngineCommand::Reset { now, reply }).await
    }

    pub async fn toggle_source(&self, online: Option<bool>, now: i64) -> Result<SubstationToggle, EngineClosed> {
        self.request(|reply| EngineCommand::ToggleSource { online, now, reply }).await
    }

    pub async fn clear_series(&self) -> Result<(), EngineClosed> {
        self.request(|reply| EngineCommand::ClearSeries { reply }).await
    }

    pub async fn snapshot(&self) -> Result<FeederSnapshot, EngineClosed> {
        self.request(|reply| EngineCommand::Snapshot { reply }).await
    }

    pub async fn events(&self, limit: usize) -> Result<Vec<LogEntry>, EngineClosed> {
        self.request(|reply| EngineCommand::Events { limit, reply }).await
    }

    pub async fn series(&self, node: NodeId) -> Result<Option<NodeSeries>, EngineClosed> {
        self.request(|reply| EngineCommand::Series { node, reply }).await
    }

    async fn request<T>(&self, build: impl FnOnce(Reply<T>) -> EngineCommand) -> Result<T, EngineClosed> {
        let (tx, rx) = oneshot::channel();
        self.tx.send(build(tx)).await.map_err(|_| EngineClosed)?;
        rx.await.map_err(|_| EngineClosed)
    }
}

/// Lance la tâche moteur; elle s'arrête quand tous les handles sont droppés
pub fn spawn_engine(engine: FeederEngine, health: HealthTracker) -> (EngineHandle, JoinHandle<()>) {
    let (tx, rx) = mpsc::channel(CHANNEL_CAPACITY);
    let task = tokio::spawn(run(engine, health, rx));
    (EngineHandle { tx }, task)
}

async fn run(mut engine: FeederEngine, health: HealthTracker, mut rx: mpsc::Receiver<EngineCommand>) {
    tracing::info!(nodes = engine.topology().len(), "feeder engine started");

    while let Some(command) = rx.recv().await {
        match command {
            EngineCommand::Ingest { payload, received_at, reply } => {
                let result = engine.ingest_payload(&payload, received_at);
                track(&health, &result);
                if let Some(reply) = reply {
                    let _ = reply.send(result);
                }
            }
            EngineCommand::Telemetry { event, reply } => {
                let result = engine.apply(event);
                track(&health, &result);
                let _ = reply.send(result);
            }
            EngineCommand::Reset { now, reply } => {
                let status = engine.reset(now);
                health.set_system_status(status);
                let _ = reply.send(status);
            }
            EngineCommand::ToggleSource { online, now, reply } => {
                let online = online.unwrap_or(!engine.store().source_online);
                let command = engine.set_source_online(online, now);
                health.set_system_status(engine.status());
                let _ = reply.send(command);
            }
            EngineCommand::ClearSeries { reply } => {
                engine.clear_series();
                let _ = reply.send(());
            }
            EngineCommand::Snapshot { reply } => {
                let _ = reply.send(engine.snapshot());
            }
            EngineCommand::Events { limit, reply } => {
                let _ = reply.send(engine.log().recent(limit));
            }
            EngineCommand::Series { node, reply } => {
                let series = engine.series().contains(node).then(|| NodeSeries {
                    node,
                    voltage: engine.samples(node, Series::Voltage),
                    current: engine.samples(node, Series::Current),
                });
                let _ = reply.send(series);
            }
        }
    }

    tracing::info!("feeder engine stopped");
}

fn track(health: &HealthTracker, result: &Result<SystemStatus, IngestError>) {
    match result {
        Ok(status) => health.record_accepted(*status),
        Err(_) => health.record_rejected(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::FeederConfig;
    use crate::models::Status;
    use crate::sinks::Sinks;

    fn spawn() -> (EngineHandle, HealthTracker) {
        let engine = FeederEngine::from_config(&FeederConfig::default(), Sinks::noop()).unwrap();
        let health = HealthTracker::new(5);
        let (handle, _task) = spawn_engine(engine, health.clone());
        (handle, health)
    }

    #[tokio::test]
    async fn test_commands_are_processed_in_order() {
        let (handle, health) = spawn();

        handle.ingest(br#"{"pole_id": 3, "status": "FAULT", "fault_type": "short"}"#.to_vec(), 1).await.unwrap();
        handle.ingest(b"garbage".to_vec(), 2).await.unwrap();

        // la requête passe après les deux ingestions dans le même canal
        let snapshot = handle.snapshot().await.unwrap();
        assert_eq!(snapshot.status, Status::Fault);

        let h = health.get_health();
        assert_eq!(h.events_accepted, 1);
        assert_eq!(h.events_rejected, 1);
        assert_eq!(h.system_status, Status::Fault);
    }

    #[tokio::test]
    async fn test_ingest_and_wait_reports_rejection() {
        let (handle, _) = spawn();
        let result = handle.ingest_and_wait(br#"{"pole_id": 77}"#.to_vec(), 1).await.unwrap();
        assert_eq!(result, Err(IngestError::UnknownNode(77)));

        let events = handle.events(10).await.unwrap();
        assert_eq!(events.len(), 1);
    }

    #[tokio::test]
    async fn test_toggle_without_target_flips_state() {
        let (handle, health) = spawn();

        let off = handle.toggle_source(None, 10).await.unwrap();
        assert_eq!(off, SubstationToggle::new(5, false, 10));
        assert_eq!(health.get_health().system_status, Status::Warning);

        let on = handle.toggle_source(None, 11).await.unwrap();
        assert_eq!(on, SubstationToggle::new(5, true, 11));
        assert_eq!(handle.reset(12).await.unwrap(), Status::Ok);
    }

    #[tokio::test]
    async fn test_series_query() {
        let (handle, _) = spawn();
        let event = TelemetryEvent::new(4, Status::Ok, "Normal", 5).with_readings(Some(229.5), Some(51.0));
        handle.apply(event).await.unwrap().unwrap();

        let series = handle.series(4).await.unwrap().unwrap();
        assert_eq!(series.voltage, vec![Sample { timestamp: 5, value: 229.5 }]);
        assert_eq!(series.current.len(), 1);
        assert!(handle.series(99).await.unwrap().is_none());

        handle.clear_series().await.unwrap();
        assert!(handle.series(4).await.unwrap().unwrap().voltage.is_empty());
    }
}
