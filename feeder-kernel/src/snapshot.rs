//! Vues sérialisables de l'état du départ (API HTTP, tests).

use serde::Serialize;

use crate::config::Palette;
use crate::models::{FaultKind, Status, SystemStatus};
use crate::status;
use crate::store::{EdgeStyle, NodeState, NodeStateStore, NodeStyle, Telemetry};
use crate::topology::{EdgeId, NodeId, NodeSpec, Role, TopologyGraph};

#[derive(Debug, Clone, Serialize)]
pub struct NodeView {
    pub id: NodeId,
    pub name: String,
    pub position: usize,
    pub role: Role,
    pub status: Status,
    pub fault_kind: FaultKind,
    pub telemetry: Telemetry,
    pub style: NodeStyle,
    pub color: String,
}

impl NodeView {
    pub fn new(spec: &NodeSpec, state: &NodeState, palette: &Palette) -> Self {
        Self {
            id: spec.id,
            name: spec.name.clone(),
            position: spec.position,
            role: spec.role,
            status: state.status,
            fault_kind: state.fault_kind.clone(),
            telemetry: state.telemetry.clone(),
            style: state.style,
            color: palette.color(state.style.paint).to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct EdgeView {
    pub id: EdgeId,
    pub upstream: NodeId,
    pub downstream: NodeId,
    pub style: EdgeStyle,
    pub color: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct FeederSnapshot {
    pub status: SystemStatus,
    pub dominant_fault: FaultKind,
    pub source_online: bool,
    pub nodes: Vec<NodeView>,
    pub edges: Vec<EdgeView>,
}

impl FeederSnapshot {
    pub fn capture(topology: &TopologyGraph, store: &NodeStateStore, palette: &Palette) -> Self {
        let nodes = topology
            .nodes()
            .iter()
            .zip(store.nodes())
            .map(|(spec, state)| NodeView::new(spec, state, palette))
            .collect();

        let edges = store
            .edges()
            .iter()
            .map(|e| EdgeView {
                id: e.edge.id,
                upstream: e.edge.upstream,
                downstream: e.edge.downstream,
                style: e.style,
                color: palette.color(e.style.paint).to_string(),
            })
            .collect();

        Self {
            status: status::resolve(store),
            dominant_fault: status::dominant_fault(store),
            source_online: store.source_online,
            nodes,
            edges,
        }
    }

    pub fn node(&self, id: NodeId) -> Option<&NodeView> {
        self.nodes.iter().find(|n| n.id == id)
    }
}
