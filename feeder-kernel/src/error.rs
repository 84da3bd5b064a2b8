use thiserror::Error;

use crate::topology::NodeId;

/// Topologie invalide : fatal, le kernel refuse de démarrer
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TopologyError {
    #[error("topology has no nodes")]
    Empty,
    #[error("expected exactly one source node, found {0}")]
    SourceCount(usize),
    #[error("source node {id} must be at position 0, found at {position}")]
    SourceNotFirst { id: NodeId, position: usize },
    #[error("node {id} declares position {found}, expected {expected}")]
    NonContiguous { id: NodeId, expected: usize, found: usize },
    #[error("duplicate node id {0}")]
    DuplicateId(NodeId),
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("cannot read config {path}: {source}")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("invalid config YAML: {0}")]
    Yaml(#[from] serde_yaml::Error),
    #[error("invalid topology: {0}")]
    Topology(#[from] TopologyError),
    #[error("invalid {field}: {reason}")]
    Invalid { field: &'static str, reason: String },
}

/// Télémétrie rejetée : récupérée localement, l'événement est ignoré
#[derive(Debug, Clone, PartialEq, Error)]
pub enum IngestError {
    #[error("payload is not valid telemetry JSON: {0}")]
    Malformed(String),
    #[error("telemetry without pole_id")]
    MissingNode,
    #[error("pole {0} is not part of the feeder topology")]
    UnknownNode(NodeId),
    #[error("stale telemetry for pole {node}: {timestamp} older than {last_seen}")]
    Stale { node: NodeId, timestamp: i64, last_seen: i64 },
}

/// La tâche moteur est arrêtée (canal fermé)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("feeder engine task is not running")]
pub struct EngineClosed;
