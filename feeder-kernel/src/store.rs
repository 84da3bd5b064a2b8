/*!
 * STORE - État dérivé courant de chaque poteau et tronçon
 *
 * RÔLE : source de vérité unique, possédée par le moteur. Les noeuds sont rangés
 * dans un Vec indexé par position topologique (même ordre que TopologyGraph).
 *
 * Les styles sont des jetons de sévérité (`Paint`) et non des couleurs : la palette
 * de la config fait la traduction au moment de notifier le renderer.
 */

use serde::Serialize;
use serde_json::Value;

use crate::models::{FaultKind, Status, TelemetryEvent};
use crate::topology::{Edge, EdgeId, NodeId, TopologyGraph};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Paint {
    Ok,
    Warning,
    Neutral,
    Fault,
    Off,
    Overvoltage,
    Undervoltage,
}

/// Classe de style posée par une condition qui se propage.
/// Effacer un overlay remet le noeud/tronçon concerné à la baseline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Overlay {
    Neutral,
    Overvoltage,
    Undervoltage,
}

impl Overlay {
    pub fn is_global(&self) -> bool {
        matches!(self, Overlay::Overvoltage | Overlay::Undervoltage)
    }

    pub fn paint(&self) -> Paint {
        match self {
            Overlay::Neutral => Paint::Warning,
            Overlay::Overvoltage => Paint::Overvoltage,
            Overlay::Undervoltage => Paint::Undervoltage,
        }
    }

    /// Trait des lignes sous condition globale
    pub fn edge_style(&self) -> EdgeStyle {
        let (weight, opacity) = match self {
            Overlay::Overvoltage => (5.0, 0.95),
            Overlay::Undervoltage => (4.0, 0.8),
            Overlay::Neutral => (EdgeStyle::BASELINE.weight, EdgeStyle::BASELINE.opacity),
        };
        EdgeStyle { paint: self.paint(), weight, opacity, overlay: Some(*self) }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct NodeStyle {
    pub paint: Paint,
    pub border_only: bool,
    pub fault_marker: bool,
    pub overlay: Option<Overlay>,
}

impl NodeStyle {
    pub const BASELINE: NodeStyle =
        NodeStyle { paint: Paint::Ok, border_only: false, fault_marker: false, overlay: None };

    pub fn filled(paint: Paint) -> Self {
        NodeStyle { paint, ..Self::BASELINE }
    }

    pub fn border(paint: Paint) -> Self {
        NodeStyle { paint, border_only: true, ..Self::BASELINE }
    }

    pub fn with_marker(mut self) -> Self {
        self.fault_marker = true;
        self
    }

    pub fn with_overlay(mut self, overlay: Overlay) -> Self {
        self.overlay = Some(overlay);
        self
    }
}

impl Default for NodeStyle {
    fn default() -> Self {
        Self::BASELINE
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct EdgeStyle {
    pub paint: Paint,
    pub weight: f32,
    pub opacity: f32,
    pub overlay: Option<Overlay>,
}

impl EdgeStyle {
    pub const BASELINE: EdgeStyle = EdgeStyle { paint: Paint::Ok, weight: 4.0, opacity: 0.85, overlay: None };

    pub fn painted(paint: Paint) -> Self {
        EdgeStyle { paint, ..Self::BASELINE }
    }

    pub fn with_overlay(mut self, overlay: Overlay) -> Self {
        self.overlay = Some(overlay);
        self
    }
}

impl Default for EdgeStyle {
    fn default() -> Self {
        Self::BASELINE
    }
}

/// Dernières mesures connues d'un poteau (last-write-wins champ par champ)
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Telemetry {
    pub voltage: Option<f64>,
    pub current: Option<f64>,
    pub breaker_status: Option<String>,
    pub fault_code: Option<Value>,
    pub fault_type: String,
    pub timestamp: i64,
}

impl Default for Telemetry {
    fn default() -> Self {
        Self {
            voltage: None,
            current: None,
            breaker_status: None,
            fault_code: None,
            fault_type: "Normal".to_string(),
            timestamp: 0,
        }
    }
}

impl Telemetry {
    /// Les champs absents de l'événement gardent leur valeur précédente
    pub fn merge(&mut self, event: &TelemetryEvent) {
        if event.voltage.is_some() {
            self.voltage = event.voltage;
        }
        if event.current.is_some() {
            self.current = event.current;
        }
        if let Some(breaker) = &event.breaker_status {
            self.breaker_status = Some(breaker.clone());
        }
        if let Some(code) = &event.fault_code {
            self.fault_code = Some(code.clone());
        }
        self.fault_type = event.fault_type.clone();
        self.timestamp = event.timestamp;
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NodeState {
    pub id: NodeId,
    pub telemetry: Telemetry,
    pub status: Status,
    pub fault_kind: FaultKind,
    pub style: NodeStyle,
}

impl NodeState {
    fn new(id: NodeId) -> Self {
        Self {
            id,
            telemetry: Telemetry::default(),
            status: Status::Ok,
            fault_kind: FaultKind::Normal,
            style: NodeStyle::BASELINE,
        }
    }

    /// Condition encore active qui empêche le retour global au vert
    pub fn blocks_recovery(&self) -> bool {
        self.status == Status::Fault || (self.status == Status::Warning && self.fault_kind.is_propagating())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EdgeState {
    pub edge: Edge,
    pub style: EdgeStyle,
}

#[derive(Debug, Clone, PartialEq)]
pub struct NodeStateStore {
    nodes: Vec<NodeState>,
    edges: Vec<EdgeState>,
    pub source_online: bool,
}

impl NodeStateStore {
    pub fn new(topology: &TopologyGraph) -> Self {
        Self {
            nodes: topology.nodes().iter().map(|n| NodeState::new(n.id)).collect(),
            edges: topology
                .edges()
                .iter()
                .map(|e| EdgeState { edge: *e, style: EdgeStyle::BASELINE })
                .collect(),
            source_online: true,
        }
    }

    pub fn nodes(&self) -> &[NodeState] {
        &self.nodes
    }

    pub fn edges(&self) -> &[EdgeState] {
        &self.edges
    }

    pub fn node_at(&self, position: usize) -> &NodeState {
        &self.nodes[position]
    }

    pub fn node_at_mut(&mut self, position: usize) -> &mut NodeState {
        &mut self.nodes[position]
    }

    pub fn set_node_style(&mut self, position: usize, style: NodeStyle) {
        self.nodes[position].style = style;
    }

    pub fn set_edge_style(&mut self, edge: EdgeId, style: EdgeStyle) {
        if let Some(state) = self.edges.get_mut(edge) {
            state.style = style;
        }
    }

    pub fn set_all_edges(&mut self, style: EdgeStyle) {
        for edge in &mut self.edges {
            edge.style = style;
        }
    }

    /// Tout le réseau visuel revient à la baseline (statuts et télémétrie intacts)
    pub fn reset_styles(&mut self) {
        for node in &mut self.nodes {
            node.style = NodeStyle::BASELINE;
        }
        self.set_all_edges(EdgeStyle::BASELINE);
    }

    /// Remet à la baseline chaque noeud/tronçon portant un overlay accepté par `pred`
    pub fn clear_overlays(&mut self, pred: impl Fn(Overlay) -> bool) {
        for node in &mut self.nodes {
            if node.style.overlay.is_some_and(&pred) {
                node.style = NodeStyle::BASELINE;
            }
        }
        for edge in &mut self.edges {
            if edge.style.overlay.is_some_and(&pred) {
                edge.style = EdgeStyle::BASELINE;
            }
        }
    }

    /// Overlay global visible (au plus un à la fois)
    pub fn active_global_overlay(&self) -> Option<Overlay> {
        self.edges
            .iter()
            .filter_map(|e| e.style.overlay)
            .chain(self.nodes.iter().filter_map(|n| n.style.overlay))
            .find(Overlay::is_global)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::topology::NodeSpec;

    fn store() -> NodeStateStore {
        let topo = TopologyGraph::new(vec![
            NodeSpec::source(5, "Substation"),
            NodeSpec::downstream(4, "Pole 4", 1),
            NodeSpec::downstream(3, "Pole 3", 2),
        ])
        .unwrap();
        NodeStateStore::new(&topo)
    }

    #[test]
    fn test_new_store_is_baseline() {
        let store = store();
        assert_eq!(store.nodes().len(), 3);
        assert_eq!(store.edges().len(), 2);
        assert!(store.source_online);
        assert!(store.nodes().iter().all(|n| n.style == NodeStyle::BASELINE && n.status == Status::Ok));
        assert!(store.edges().iter().all(|e| e.style == EdgeStyle::BASELINE));
    }

    #[test]
    fn test_merge_keeps_omitted_fields() {
        let mut telemetry = Telemetry::default();
        telemetry.merge(
            &TelemetryEvent::new(4, Status::Ok, "Normal", 10).with_readings(Some(230.0), Some(50.0)).with_breaker("CLOSED"),
        );
        telemetry.merge(&TelemetryEvent::new(4, Status::Fault, "short", 20).with_readings(None, Some(110.0)));

        assert_eq!(telemetry.voltage, Some(230.0));
        assert_eq!(telemetry.current, Some(110.0));
        assert_eq!(telemetry.breaker_status.as_deref(), Some("CLOSED"));
        assert_eq!(telemetry.fault_type, "short");
        assert_eq!(telemetry.timestamp, 20);
    }

    #[test]
    fn test_clear_overlays_only_touches_matching() {
        let mut store = store();
        store.set_node_style(1, NodeStyle::border(Paint::Overvoltage).with_overlay(Overlay::Overvoltage));
        store.set_node_style(2, NodeStyle::filled(Paint::Warning).with_overlay(Overlay::Neutral));
        store.set_edge_style(0, Overlay::Overvoltage.edge_style());
        store.set_edge_style(1, EdgeStyle::painted(Paint::Off));
        assert_eq!(store.active_global_overlay(), Some(Overlay::Overvoltage));

        store.clear_overlays(|o| o.is_global());

        assert_eq!(store.node_at(1).style, NodeStyle::BASELINE);
        assert_eq!(store.node_at(2).style.overlay, Some(Overlay::Neutral));
        assert_eq!(store.edges()[0].style, EdgeStyle::BASELINE);
        assert_eq!(store.edges()[1].style.paint, Paint::Off);
        assert_eq!(store.active_global_overlay(), None);
    }

    #[test]
    fn test_overlay_edge_weights() {
        let over = Overlay::Overvoltage.edge_style();
        assert_eq!((over.weight, over.opacity), (5.0, 0.95));
        let under = Overlay::Undervoltage.edge_style();
        assert_eq!((under.weight, under.opacity), (4.0, 0.8));
        assert_eq!(under.paint, Paint::Undervoltage);
    }

    #[test]
    fn test_blocks_recovery() {
        let mut node = NodeState::new(1);
        assert!(!node.blocks_recovery());
        node.status = Status::Warning;
        node.fault_kind = FaultKind::LocalWarning;
        assert!(!node.blocks_recovery());
        node.fault_kind = FaultKind::NeutralFault;
        assert!(node.blocks_recovery());
        node.status = Status::Fault;
        node.fault_kind = FaultKind::Normal;
        assert!(node.blocks_recovery());
    }
}
