/*!
 * ENGINE - Moteur de classification et de propagation des défauts
 *
 * RÔLE :
 * Transforme un événement de télémétrie d'un poteau en mise à jour cohérente de
 * tout le départ : statut de chaque noeud, style de chaque noeud et tronçon,
 * statut système, journal et historiques.
 *
 * FONCTIONNEMENT :
 * - `apply` est synchrone et s'exécute jusqu'au bout (un seul écrivain, voir actor.rs)
 * - Le store est cloné avant la transition; les sinks ne reçoivent que le diff
 * - Précédence : coupure source > surtension/sous-tension globale > défaut franc
 *   > neutre > warning local > normal
 *
 * Les sinks sont notifiés en dernier et ne peuvent pas faire échouer la transition.
 */

use crate::classifier::classify_event;
use crate::config::{FeederConfig, Palette};
use crate::error::{ConfigError, IngestError};
use crate::event_log::{EventLog, LogEntry, Severity};
use crate::models::{parse_payload, FaultKind, Status, SubstationToggle, SystemStatus, TelemetryEvent};
use crate::series::{Sample, Series, TimeSeriesBuffer};
use crate::sinks::{NodeStyleOpts, Sinks};
use crate::snapshot::FeederSnapshot;
use crate::status;
use crate::store::{EdgeStyle, NodeStateStore, NodeStyle, Overlay, Paint};
use crate::topology::{EdgeId, NodeId, NodeSpec, TopologyGraph};

#[derive(Debug, Clone)]
pub struct EngineSettings {
    pub reject_stale: bool,
    pub alert_duration_ms: u64,
    pub fault_icon: String,
    pub palette: Palette,
}

impl EngineSettings {
    pub fn from_config(cfg: &FeederConfig) -> Self {
        Self {
            reject_stale: cfg.engine.reject_stale,
            alert_duration_ms: cfg.engine.alert_duration_ms,
            fault_icon: cfg.engine.fault_icon.clone(),
            palette: cfg.palette.clone(),
        }
    }
}

impl Default for EngineSettings {
    fn default() -> Self {
        Self::from_config(&FeederConfig::default())
    }
}

/// Résultat d'une transition : l'entrée de journal et l'alerte éventuelle
struct Transition {
    severity: Severity,
    message: String,
    alert: Option<String>,
}

impl Transition {
    fn log(severity: Severity, message: String) -> Self {
        Self { severity, message, alert: None }
    }

    fn alert(severity: Severity, message: String, alert: String) -> Self {
        Self { severity, message, alert: Some(alert) }
    }
}

pub struct FeederEngine {
    topology: TopologyGraph,
    store: NodeStateStore,
    series: TimeSeriesBuffer,
    log: EventLog,
    settings: EngineSettings,
    sinks: Sinks,
    status: SystemStatus,
}

impl FeederEngine {
    pub fn new(
        topology: TopologyGraph,
        settings: EngineSettings,
        series_capacity: usize,
        log_capacity: usize,
        sinks: Sinks,
    ) -> Self {
        let store = NodeStateStore::new(&topology);
        let series = TimeSeriesBuffer::new(&topology, series_capacity);
        Self { topology, store, series, log: EventLog::new(log_capacity), settings, sinks, status: Status::Ok }
    }

    pub fn from_config(cfg: &FeederConfig, sinks: Sinks) -> Result<Self, ConfigError> {
        let topology = cfg.validate()?;
        Ok(Self::new(
            topology,
            EngineSettings::from_config(cfg),
            cfg.buffers.series_capacity,
            cfg.buffers.log_capacity,
            sinks,
        ))
    }

    pub fn topology(&self) -> &TopologyGraph {
        &self.topology
    }

    pub fn store(&self) -> &NodeStateStore {
        &self.store
    }

    pub fn status(&self) -> SystemStatus {
        self.status
    }

    pub fn log(&self) -> &EventLog {
        &self.log
    }

    pub fn series(&self) -> &TimeSeriesBuffer {
        &self.series
    }

    pub fn settings(&self) -> &EngineSettings {
        &self.settings
    }

    pub fn dominant_fault(&self) -> FaultKind {
        status::dominant_fault(&self.store)
    }

    pub fn snapshot(&self) -> FeederSnapshot {
        FeederSnapshot::capture(&self.topology, &self.store, &self.settings.palette)
    }

    pub fn samples(&self, node: NodeId, series: Series) -> Vec<Sample> {
        self.series.samples(node, series)
    }

    /// Décode un payload MQTT brut puis l'applique. Un JSON invalide est rejeté
    /// comme n'importe quel événement invalide (warning, aucune mutation).
    pub fn ingest_payload(&mut self, payload: &[u8], received_at: i64) -> Result<SystemStatus, IngestError> {
        match parse_payload(payload, received_at) {
            Ok(event) => self.apply(event),
            Err(err) => {
                self.reject(&err, None, received_at);
                Err(err)
            }
        }
    }

    /// Transition principale : un événement → nouvel état du réseau
    pub fn apply(&mut self, event: TelemetryEvent) -> Result<SystemStatus, IngestError> {
        let position = match self.locate(&event) {
            Ok(position) => position,
            Err(err) => {
                self.reject(&err, event.node_id, event.timestamp);
                return Err(err);
            }
        };

        let before = self.store.clone();
        let spec = self.topology.node_at(position).clone();
        let kind = classify_event(spec.role, &event);

        let node = self.store.node_at_mut(position);
        node.telemetry.merge(&event);
        node.status = kind.derived_status(event.status);
        node.fault_kind = kind.clone();

        let transition = match &kind {
            FaultKind::SourceOutage => self.apply_source_outage(&spec),
            FaultKind::HardFault(hard) => self.apply_hard_fault(&spec, hard.label()),
            FaultKind::NeutralFault => self.apply_neutral(&spec),
            FaultKind::GlobalOvervoltage(v) => self.apply_global(&spec, Overlay::Overvoltage, &kind, *v),
            FaultKind::GlobalUndervoltage(v) => self.apply_global(&spec, Overlay::Undervoltage, &kind, *v),
            FaultKind::LocalWarning => self.apply_local_warning(&spec),
            FaultKind::Normal => self.apply_normal(&spec),
        };

        self.status = status::resolve(&self.store);
        tracing::debug!(pole_id = spec.id, kind = %kind, status = %self.status, "telemetry applied");

        self.notify_styles(&before);
        self.push_samples(spec.id, &event);
        self.record(event.timestamp, Some(spec.id), transition);

        Ok(self.status)
    }

    fn locate(&self, event: &TelemetryEvent) -> Result<usize, IngestError> {
        let id = event.node_id.ok_or(IngestError::MissingNode)?;
        let position = self.topology.position(id).ok_or(IngestError::UnknownNode(id))?;

        let last_seen = self.store.node_at(position).telemetry.timestamp;
        if self.settings.reject_stale && event.timestamp < last_seen {
            return Err(IngestError::Stale { node: id, timestamp: event.timestamp, last_seen });
        }
        Ok(position)
    }

    fn reject(&mut self, err: &IngestError, origin: Option<NodeId>, timestamp: i64) {
        tracing::warn!(pole_id = ?origin, error = %err, "telemetry rejected");
        self.record(timestamp, origin, Transition::log(Severity::Warn, format!("Rejected telemetry: {err}")));
    }

    /// Coupure de la source : tout le départ hors tension
    fn apply_source_outage(&mut self, source: &NodeSpec) -> Transition {
        self.store.reset_styles();
        self.store.set_node_style(source.position, NodeStyle::filled(Paint::Fault));
        for position in self.topology.downstream_range(source.position) {
            self.store.set_node_style(position, NodeStyle::filled(Paint::Off));
        }
        self.store.set_all_edges(EdgeStyle::painted(Paint::Off));

        let message = format!("{} offline: all poles disconnected", source.name);
        Transition::alert(Severity::Fault, message.clone(), message)
    }

    /// Défaut franc : l'aval est coupé, l'amont garde son style
    fn apply_hard_fault(&mut self, origin: &NodeSpec, label: &str) -> Transition {
        self.store.clear_overlays(|_| true);
        self.store.set_node_style(origin.position, NodeStyle::filled(Paint::Fault).with_marker());
        for position in self.topology.downstream_range(origin.position) {
            self.store.set_node_style(position, NodeStyle::filled(Paint::Off));
        }
        // seuls les tronçons aval sont repeints; l'amont garde son style (ex. coupure source)
        for edge in self.topology.downstream_edges(origin.position) {
            self.store.set_edge_style(edge, EdgeStyle::painted(Paint::Off));
        }

        let message = format!("{label} at {}", origin.name);
        Transition::alert(Severity::Fault, message.clone(), message)
    }

    /// Neutre coupé : l'aval reste alimenté mais dégradé (warning, pas off)
    fn apply_neutral(&mut self, origin: &NodeSpec) -> Transition {
        self.store.clear_overlays(|o| o.is_global());
        self.store.set_node_style(origin.position, NodeStyle::filled(Paint::Neutral).with_overlay(Overlay::Neutral));

        let degraded = NodeStyle::filled(Paint::Warning).with_overlay(Overlay::Neutral);
        for position in self.topology.downstream_range(origin.position) {
            self.store.set_node_style(position, degraded);
        }
        let line = EdgeStyle::painted(Paint::Warning).with_overlay(Overlay::Neutral);
        for edge in self.topology.downstream_edges(origin.position) {
            self.store.set_edge_style(edge, line);
        }

        let message = format!("Neutral Fault at {}", origin.name);
        Transition::alert(Severity::Warn, message.clone(), message)
    }

    /// Surtension / sous-tension : condition globale, pas de propagation le long de la chaîne.
    /// Repart toujours d'un réseau vierge pour ne jamais superposer deux overlays.
    fn apply_global(&mut self, origin: &NodeSpec, overlay: Overlay, kind: &FaultKind, voltage: Option<f64>) -> Transition {
        self.store.reset_styles();

        let pole = NodeStyle::border(overlay.paint()).with_overlay(overlay);
        for spec in self.topology.nodes().iter().filter(|n| n.position != 0) {
            self.store.set_node_style(spec.position, pole);
        }
        self.store.set_node_style(origin.position, pole.with_marker());
        self.store.set_all_edges(overlay.edge_style());

        let extra = voltage.map(|v| format!(" ({v}V)")).unwrap_or_default();
        let label = kind.label();
        Transition::alert(
            Severity::Warn,
            format!("{label} condition across network{extra}, origin {}", origin.name),
            format!("{label} detected, propagating from {}{extra}", origin.name),
        )
    }

    fn apply_local_warning(&mut self, origin: &NodeSpec) -> Transition {
        let mut style = self.store.node_at(origin.position).style;
        style.paint = Paint::Warning;
        style.border_only = true;
        self.store.set_node_style(origin.position, style);

        Transition::log(Severity::Warn, format!("Warning @ {}", origin.name))
    }

    /// Retour à la normale du poteau, puis balayage global : si plus rien de
    /// bloquant n'est actif, tout le réseau revient à la baseline.
    fn apply_normal(&mut self, origin: &NodeSpec) -> Transition {
        self.store.set_node_style(origin.position, NodeStyle::BASELINE);

        if status::blocks_recovery(&self.store) {
            return Transition::log(Severity::Info, format!("OK @ {}", origin.name));
        }
        self.store.reset_styles();
        Transition::log(Severity::Info, "All clear, system normal.".to_string())
    }

    /// Opérateur : remise à zéro complète (télémétrie, styles, journal)
    pub fn reset(&mut self, now: i64) -> SystemStatus {
        let before = std::mem::replace(&mut self.store, NodeStateStore::new(&self.topology));
        self.log.clear();
        self.status = status::resolve(&self.store);

        self.notify_styles(&before);
        self.record(now, None, Transition::log(Severity::Info, "System Reset".to_string()));
        tracing::info!("feeder state reset by operator");
        self.status
    }

    /// Opérateur : mise hors/en ligne de la sous-station. Retourne la commande
    /// `substation_toggle` à publier vers le terrain.
    pub fn set_source_online(&mut self, online: bool, now: i64) -> SubstationToggle {
        let before = self.store.clone();
        let source = self.topology.source().clone();

        self.store.source_online = online;
        self.store.reset_styles();
        let transition = if online {
            let message = format!("{} brought back online", source.name);
            Transition::alert(Severity::Info, message.clone(), message)
        } else {
            for spec in self.topology.nodes() {
                self.store.set_node_style(spec.position, NodeStyle::filled(Paint::Off));
            }
            self.store.set_all_edges(EdgeStyle::painted(Paint::Off));
            let message = format!("{} taken offline", source.name);
            Transition::alert(Severity::Warn, message.clone(), message)
        };

        self.status = status::resolve(&self.store);
        self.notify_styles(&before);
        self.record(now, Some(source.id), transition);
        tracing::info!(substation_id = source.id, online, "substation toggled by operator");

        SubstationToggle::new(source.id, online, now)
    }

    pub fn clear_series(&mut self) {
        self.series.clear();
    }

    fn push_samples(&mut self, node: NodeId, event: &TelemetryEvent) {
        for (series, value) in [(Series::Voltage, event.voltage), (Series::Current, event.current)] {
            if let Some(value) = value {
                if self.series.append(node, series, event.timestamp, Some(value)) {
                    self.sinks.chart.append_sample(node, series, event.timestamp, value);
                }
            }
        }
    }

    fn record(&mut self, timestamp: i64, origin: Option<NodeId>, transition: Transition) {
        let entry = LogEntry::new(timestamp, transition.severity, transition.message, origin);
        self.sinks.log.append(&entry);
        self.log.append(entry);

        if let Some(alert) = transition.alert {
            self.sinks.alert.show(&alert, self.settings.alert_duration_ms);
        }
    }

    /// Pousse au renderer uniquement ce qui a changé depuis `before`
    fn notify_styles(&self, before: &NodeStateStore) {
        let renderer = &self.sinks.renderer;
        let palette = &self.settings.palette;

        for (prev, node) in before.nodes().iter().zip(self.store.nodes()) {
            let (old, new) = (prev.style, node.style);
            if (old.paint, old.border_only, old.overlay) != (new.paint, new.border_only, new.overlay) {
                let opts = NodeStyleOpts { border_only: new.border_only, include_edges: false };
                renderer.set_node_style(node.id, palette.color(new.paint), opts);
            }
            match (old.fault_marker, new.fault_marker) {
                (false, true) => renderer.set_fault_marker(node.id, &self.settings.fault_icon),
                (true, false) => renderer.clear_fault_marker(node.id),
                _ => {}
            }
        }

        let mut groups: Vec<(EdgeStyle, Vec<EdgeId>)> = Vec::new();
        for (prev, edge) in before.edges().iter().zip(self.store.edges()) {
            if prev.style == edge.style {
                continue;
            }
            match groups.iter_mut().find(|(style, _)| *style == edge.style) {
                Some((_, ids)) => ids.push(edge.edge.id),
                None => groups.push((edge.style, vec![edge.edge.id])),
            }
        }
        for (style, ids) in groups {
            renderer.set_edge_style(&ids, palette.color(style.paint), Some(style.weight), Some(style.opacity));
        }
    }
}
