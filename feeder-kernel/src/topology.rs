/*!
 * TOPOLOGY - Description statique du départ (feeder) radial
 *
 * RÔLE : une sous-station (source, position 0) puis une chaîne ordonnée de
 * poteaux vers l'aval. Chaque tronçon relie deux positions consécutives.
 *
 * FONCTIONNEMENT :
 * - Construit une seule fois depuis la config, immuable ensuite
 * - Table id → position pour les lookups, tout le reste est indexé par position
 * - Le tronçon `i` relie les positions `i` et `i + 1`
 */

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::ops::Range;

use crate::error::TopologyError;

/// Identifiant de poteau (pole_id du contrat MQTT)
pub type NodeId = u32;
/// Index de tronçon, égal à la position de son extrémité amont
pub type EdgeId = usize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Source,
    #[default]
    Downstream,
}

/// Entrée de config : un noeud du départ
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NodeSpec {
    pub id: NodeId,
    pub name: String,
    pub position: usize,
    #[serde(default)]
    pub role: Role,
}

impl NodeSpec {
    pub fn source(id: NodeId, name: &str) -> Self {
        Self { id, name: name.to_string(), position: 0, role: Role::Source }
    }

    pub fn downstream(id: NodeId, name: &str, position: usize) -> Self {
        Self { id, name: name.to_string(), position, role: Role::Downstream }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Edge {
    pub id: EdgeId,
    pub upstream: NodeId,
    pub downstream: NodeId,
}

impl Edge {
    pub fn touches(&self, node: NodeId) -> bool {
        self.upstream == node || self.downstream == node
    }
}

#[derive(Debug, Clone)]
pub struct TopologyGraph {
    nodes: Vec<NodeSpec>,
    edges: Vec<Edge>,
    index: HashMap<NodeId, usize>,
}

impl TopologyGraph {
    /// Valide la liste ordonnée et construit le graphe.
    ///
    /// Règles : liste non vide, exactement une source placée en position 0,
    /// positions contiguës et strictement croissantes dans l'ordre donné, ids uniques.
    pub fn new(specs: Vec<NodeSpec>) -> Result<Self, TopologyError> {
        if specs.is_empty() {
            return Err(TopologyError::Empty);
        }

        let sources = specs.iter().filter(|n| n.role == Role::Source).count();
        if sources != 1 {
            return Err(TopologyError::SourceCount(sources));
        }

        let mut index = HashMap::with_capacity(specs.len());
        for (expected, node) in specs.iter().enumerate() {
            if node.role == Role::Source && node.position != 0 {
                return Err(TopologyError::SourceNotFirst { id: node.id, position: node.position });
            }
            if node.position != expected {
                return Err(TopologyError::NonContiguous {
                    id: node.id,
                    expected,
                    found: node.position,
                });
            }
            if index.insert(node.id, expected).is_some() {
                return Err(TopologyError::DuplicateId(node.id));
            }
        }

        let edges = specs
            .windows(2)
            .enumerate()
            .map(|(id, pair)| Edge { id, upstream: pair[0].id, downstream: pair[1].id })
            .collect();

        Ok(Self { nodes: specs, edges, index })
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn nodes(&self) -> &[NodeSpec] {
        &self.nodes
    }

    pub fn edges(&self) -> &[Edge] {
        &self.edges
    }

    pub fn source(&self) -> &NodeSpec {
        &self.nodes[0]
    }

    pub fn position(&self, id: NodeId) -> Option<usize> {
        self.index.get(&id).copied()
    }

    pub fn contains(&self, id: NodeId) -> bool {
        self.index.contains_key(&id)
    }

    pub fn node_at(&self, position: usize) -> &NodeSpec {
        &self.nodes[position]
    }

    pub fn node(&self, id: NodeId) -> Option<&NodeSpec> {
        self.position(id).map(|p| &self.nodes[p])
    }

    pub fn is_source(&self, id: NodeId) -> bool {
        self.source().id == id
    }

    /// Ids strictement en aval, du plus proche au plus lointain (vide pour le dernier poteau)
    pub fn downstream(&self, id: NodeId) -> Vec<NodeId> {
        match self.position(id) {
            Some(p) => self.nodes[self.downstream_range(p)].iter().map(|n| n.id).collect(),
            None => Vec::new(),
        }
    }

    pub fn downstream_range(&self, position: usize) -> Range<usize> {
        (position + 1).min(self.nodes.len())..self.nodes.len()
    }

    /// Tronçons dont au moins une extrémité est en aval de `position`
    pub fn downstream_edges(&self, position: usize) -> Range<EdgeId> {
        position.min(self.edges.len())..self.edges.len()
    }

    /// Tronçons reliés au noeud (0, 1 ou 2 sur une chaîne)
    pub fn edges_touching(&self, id: NodeId) -> Vec<EdgeId> {
        self.edges.iter().filter(|e| e.touches(id)).map(|e| e.id).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn feeder() -> TopologyGraph {
        TopologyGraph::new(vec![
            NodeSpec::source(5, "Substation"),
            NodeSpec::downstream(4, "Pole 4", 1),
            NodeSpec::downstream(3, "Pole 3", 2),
            NodeSpec::downstream(2, "Pole 2", 3),
            NodeSpec::downstream(1, "Pole 1", 4),
        ])
        .unwrap()
    }

    #[test]
    fn test_downstream_follows_positions() {
        let topo = feeder();
        assert_eq!(topo.downstream(5), vec![4, 3, 2, 1]);
        assert_eq!(topo.downstream(3), vec![2, 1]);
        assert!(topo.downstream(1).is_empty());
        assert!(topo.downstream(99).is_empty());
    }

    #[test]
    fn test_edges_connect_consecutive_nodes() {
        let topo = feeder();
        assert_eq!(topo.edges().len(), 4);
        assert_eq!(topo.edges()[0], Edge { id: 0, upstream: 5, downstream: 4 });
        assert_eq!(topo.edges_touching(5), vec![0]);
        assert_eq!(topo.edges_touching(3), vec![1, 2]);
        assert_eq!(topo.edges_touching(1), vec![3]);
        assert_eq!(topo.downstream_edges(2), 2..4);
        assert_eq!(topo.downstream_edges(4), 4..4);
    }

    #[test]
    fn test_single_node_feeder() {
        let topo = TopologyGraph::new(vec![NodeSpec::source(1, "Substation")]).unwrap();
        assert!(topo.edges().is_empty());
        assert!(topo.downstream(1).is_empty());
        assert_eq!(topo.downstream_edges(0), 0..0);
    }

    #[test]
    fn test_rejects_empty() {
        assert_eq!(TopologyGraph::new(vec![]).unwrap_err(), TopologyError::Empty);
    }

    #[test]
    fn test_rejects_missing_or_extra_source() {
        let none = vec![NodeSpec::downstream(1, "Pole 1", 0)];
        assert_eq!(TopologyGraph::new(none).unwrap_err(), TopologyError::SourceCount(0));

        let two = vec![NodeSpec::source(1, "A"), NodeSpec { role: Role::Source, ..NodeSpec::downstream(2, "B", 1) }];
        assert_eq!(TopologyGraph::new(two).unwrap_err(), TopologyError::SourceCount(2));
    }

    #[test]
    fn test_rejects_source_not_first() {
        let specs = vec![
            NodeSpec::downstream(1, "Pole 1", 0),
            NodeSpec { role: Role::Source, ..NodeSpec::downstream(2, "Substation", 1) },
        ];
        assert_eq!(
            TopologyGraph::new(specs).unwrap_err(),
            TopologyError::SourceNotFirst { id: 2, position: 1 }
        );
    }

    #[test]
    fn test_rejects_gaps_and_duplicates() {
        let gap = vec![NodeSpec::source(5, "S"), NodeSpec::downstream(4, "P4", 2)];
        assert_eq!(
            TopologyGraph::new(gap).unwrap_err(),
            TopologyError::NonContiguous { id: 4, expected: 1, found: 2 }
        );

        let dup = vec![NodeSpec::source(5, "S"), NodeSpec::downstream(5, "P", 1)];
        assert_eq!(TopologyGraph::new(dup).unwrap_err(), TopologyError::DuplicateId(5));
    }
}
