/*!
 * SINKS - Collaborateurs notifiés en fin de transition
 *
 * RÔLE :
 * Le moteur ne connaît ni la carte, ni les graphiques, ni le transport. Il pousse
 * ses effets de bord vers quatre interfaces injectées : Renderer, ChartSink,
 * LogSink et AlertSink.
 *
 * FONCTIONNEMENT :
 * - Appels synchrones, "fire-and-forget" : aucune méthode ne retourne d'erreur,
 *   une implémentation qui échoue loggue et continue
 * - `Sinks` = bundle d'Arc partagé par le moteur
 * - `BusSink` (bus.rs) publie sur MQTT, `TracingLogSink` écrit dans tracing,
 *   `RecordingSink` enregistre tout pour les tests
 */

use parking_lot::Mutex;
use serde::Serialize;
use std::sync::Arc;

use crate::event_log::{LogEntry, Severity};
use crate::series::Series;
use crate::topology::{EdgeId, NodeId};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct NodeStyleOpts {
    pub border_only: bool,
    pub include_edges: bool,
}

/// Surface de rendu cartographique (poteaux + lignes)
pub trait Renderer: Send + Sync {
    /// Couleur d'un poteau; `border_only` ne touche que le contour
    fn set_node_style(&self, node: NodeId, color: &str, opts: NodeStyleOpts);

    /// Couleur (et trait optionnel) d'un groupe de tronçons
    fn set_edge_style(&self, edges: &[EdgeId], color: &str, weight: Option<f32>, opacity: Option<f32>);

    fn set_fault_marker(&self, node: NodeId, icon: &str);

    fn clear_fault_marker(&self, node: NodeId);
}

pub trait ChartSink: Send + Sync {
    fn append_sample(&self, node: NodeId, series: Series, timestamp: i64, value: f64);
}

pub trait LogSink: Send + Sync {
    fn append(&self, entry: &LogEntry);
}

pub trait AlertSink: Send + Sync {
    fn show(&self, message: &str, duration_ms: u64);
}

#[derive(Clone)]
pub struct Sinks {
    pub renderer: Arc<dyn Renderer>,
    pub chart: Arc<dyn ChartSink>,
    pub log: Arc<dyn LogSink>,
    pub alert: Arc<dyn AlertSink>,
}

impl Sinks {
    pub fn noop() -> Self {
        Self::uniform(Arc::new(NoopSink))
    }

    /// Un seul objet qui implémente les quatre rôles
    pub fn uniform<S>(sink: Arc<S>) -> Self
    where
        S: Renderer + ChartSink + LogSink + AlertSink + 'static,
    {
        Self { renderer: sink.clone(), chart: sink.clone(), log: sink.clone(), alert: sink }
    }
}

pub struct NoopSink;

impl Renderer for NoopSink {
    fn set_node_style(&self, _node: NodeId, _color: &str, _opts: NodeStyleOpts) {}
    fn set_edge_style(&self, _edges: &[EdgeId], _color: &str, _weight: Option<f32>, _opacity: Option<f32>) {}
    fn set_fault_marker(&self, _node: NodeId, _icon: &str) {}
    fn clear_fault_marker(&self, _node: NodeId) {}
}

impl ChartSink for NoopSink {
    fn append_sample(&self, _node: NodeId, _series: Series, _timestamp: i64, _value: f64) {}
}

impl LogSink for NoopSink {
    fn append(&self, _entry: &LogEntry) {}
}

impl AlertSink for NoopSink {
    fn show(&self, _message: &str, _duration_ms: u64) {}
}

/// Journal opérateur recopié dans tracing, niveau selon la sévérité
pub struct TracingLogSink;

impl LogSink for TracingLogSink {
    fn append(&self, entry: &LogEntry) {
        match entry.severity {
            Severity::Info => tracing::info!(pole_id = ?entry.origin, "{}", entry.message),
            Severity::Warn => tracing::warn!(pole_id = ?entry.origin, "{}", entry.message),
            Severity::Fault => tracing::error!(pole_id = ?entry.origin, "{}", entry.message),
        }
    }
}

/// Appel reçu par un `RecordingSink`
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "call", rename_all = "snake_case")]
pub enum SinkCall {
    NodeStyle { node: NodeId, color: String, border_only: bool },
    EdgeStyle { edges: Vec<EdgeId>, color: String, weight: Option<f32>, opacity: Option<f32> },
    SetMarker { node: NodeId, icon: String },
    ClearMarker { node: NodeId },
    Sample { node: NodeId, series: Series, timestamp: i64, value: f64 },
    Log { severity: Severity, message: String },
    Alert { message: String, duration_ms: u64 },
}

/// Enregistre chaque notification, pour les tests
#[derive(Default)]
pub struct RecordingSink {
    calls: Mutex<Vec<SinkCall>>,
}

impl RecordingSink {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn calls(&self) -> Vec<SinkCall> {
        self.calls.lock().clone()
    }

    pub fn take(&self) -> Vec<SinkCall> {
        std::mem::take(&mut *self.calls.lock())
    }

    pub fn alerts(&self) -> Vec<String> {
        self.calls
            .lock()
            .iter()
            .filter_map(|c| match c {
                SinkCall::Alert { message, .. } => Some(message.clone()),
                _ => None,
            })
            .collect()
    }

    fn push(&self, call: SinkCall) {
        self.calls.lock().push(call);
    }
}

impl Renderer for RecordingSink {
    fn set_node_style(&self, node: NodeId, color: &str, opts: NodeStyleOpts) {
        self.push(SinkCall::NodeStyle { node, color: color.to_string(), border_only: opts.border_only });
    }

    fn set_edge_style(&self, edges: &[EdgeId], color: &str, weight: Option<f32>, opacity: Option<f32>) {
        self.push(SinkCall::EdgeStyle { edges: edges.to_vec(), color: color.to_string(), weight, opacity });
    }

    fn set_fault_marker(&self, node: NodeId, icon: &str) {
        self.push(SinkCall::SetMarker { node, icon: icon.to_string() });
    }

    fn clear_fault_marker(&self, node: NodeId) {
        self.push(SinkCall::ClearMarker { node });
    }
}

impl ChartSink for RecordingSink {
    fn append_sample(&self, node: NodeId, series: Series, timestamp: i64, value: f64) {
        self.push(SinkCall::Sample { node, series, timestamp, value });
    }
}

impl LogSink for RecordingSink {
    fn append(&self, entry: &LogEntry) {
        self.push(SinkCall::Log { severity: entry.severity, message: entry.message.clone() });
    }
}

impl AlertSink for RecordingSink {
    fn show(&self, message: &str, duration_ms: u64) {
        self.push(SinkCall::Alert { message: message.to_string(), duration_ms });
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_uniform_routes_every_role_to_one_sink() {
        let recorder = RecordingSink::new();
        let sinks = Sinks::uniform(recorder.clone());

        sinks.renderer.set_fault_marker(3, "./assets/caution.svg");
        sinks.chart.append_sample(3, Series::Voltage, 1, 230.0);
        sinks.log.append(&LogEntry::new(1, Severity::Info, "hello", None));
        sinks.alert.show("boom", 5000);

        let calls = recorder.take();
        assert_eq!(calls.len(), 4);
        assert_eq!(calls[0], SinkCall::SetMarker { node: 3, icon: "./assets/caution.svg".into() });
        assert_eq!(recorder.calls().len(), 0);
    }

    #[test]
    fn test_alerts_filter() {
        let recorder = RecordingSink::new();
        recorder.show("first", 5000);
        recorder.clear_fault_marker(1);
        recorder.show("second", 5000);
        assert_eq!(recorder.alerts(), vec!["first".to_string(), "second".to_string()]);
    }
}
