use serde::{Deserialize, Serialize};
use std::path::Path;
use tokio::fs;

use crate::error::ConfigError;
use crate::event_log::DEFAULT_LOG_CAPACITY;
use crate::series::DEFAULT_SERIES_CAPACITY;
use crate::store::Paint;
use crate::topology::{NodeSpec, TopologyGraph};

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
#[serde(default)]
pub struct FeederConfig {
    pub topology: Vec<NodeSpec>,
    pub buffers: BufferConf,
    pub palette: Palette,
    pub engine: EngineConf,
    pub mqtt: MqttConf,
    pub http: HttpConf,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
#[serde(default)]
pub struct BufferConf {
    pub series_capacity: usize,
    pub log_capacity: usize,
}

/// Correspondance sévérité → couleur envoyée au renderer
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
#[serde(default)]
pub struct Palette {
    pub ok: String,
    pub warning: String,
    pub neutral: String,
    pub fault: String,
    pub off: String,
    pub overvoltage: String,
    pub undervoltage: String,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
#[serde(default)]
pub struct EngineConf {
    /// Refuser un événement plus ancien que le dernier vu pour ce poteau
    pub reject_stale: bool,
    pub alert_duration_ms: u64,
    pub fault_icon: String,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
#[serde(default)]
pub struct MqttConf {
    pub host: String,
    pub port: u16,
    pub client_id: String,
    pub telemetry_topic: String,
    pub command_topic: String,
    /// Préfixe des topics de notification (render, chart, alerts, health)
    pub notify_prefix: String,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
#[serde(default)]
pub struct HttpConf {
    pub bind: String,
}

impl Default for FeederConfig {
    fn default() -> Self {
        Self {
            topology: default_topology(),
            buffers: BufferConf::default(),
            palette: Palette::default(),
            engine: EngineConf::default(),
            mqtt: MqttConf::default(),
            http: HttpConf::default(),
        }
    }
}

/// Départ de démonstration : sous-station 5 puis poteaux 4 → 1
pub fn default_topology() -> Vec<NodeSpec> {
    let mut nodes = vec![NodeSpec::source(5, "Substation")];
    for (position, id) in (1..=4u32).rev().enumerate() {
        nodes.push(NodeSpec::downstream(id, &format!("Pole {id}"), position + 1));
    }
    nodes
}

impl Default for BufferConf {
    fn default() -> Self {
        Self { series_capacity: DEFAULT_SERIES_CAPACITY, log_capacity: DEFAULT_LOG_CAPACITY }
    }
}

impl Default for Palette {
    fn default() -> Self {
        Self {
            ok: "#4caf50".into(),
            warning: "#ffc107".into(),
            neutral: "#b58900".into(),
            fault: "#f44336".into(),
            off: "#9e9e9e".into(),
            overvoltage: "#00bfff".into(),
            undervoltage: "#1e90ff".into(),
        }
    }
}

impl Palette {
    pub fn color(&self, paint: Paint) -> &str {
        match paint {
            Paint::Ok => &self.ok,
            Paint::Warning => &self.warning,
            Paint::Neutral => &self.neutral,
            Paint::Fault => &self.fault,
            Paint::Off => &self.off,
            Paint::Overvoltage => &self.overvoltage,
            Paint::Undervoltage => &self.undervoltage,
        }
    }
}

impl Default for EngineConf {
    fn default() -> Self {
        Self { reject_stale: false, alert_duration_ms: 5000, fault_icon: "./assets/caution.svg".into() }
    }
}

impl Default for MqttConf {
    fn default() -> Self {
        Self {
            host: "localhost".into(),
            port: 1883,
            client_id: "feeder-kernel".into(),
            telemetry_topic: "scada/poles/#".into(),
            command_topic: "scada/commands".into(),
            notify_prefix: "feeder".into(),
        }
    }
}

impl Default for HttpConf {
    fn default() -> Self {
        Self { bind: "0.0.0.0:8080".into() }
    }
}

impl FeederConfig {
    pub fn from_yaml_str(txt: &str) -> Result<Self, ConfigError> {
        if txt.trim().is_empty() {
            return Ok(Self::default());
        }
        let cfg: FeederConfig = serde_yaml::from_str(txt)?;
        cfg.validate()?;
        Ok(cfg)
    }

    /// Vérifie les bornes et construit la topologie (erreurs fatales au démarrage)
    pub fn validate(&self) -> Result<TopologyGraph, ConfigError> {
        if self.buffers.series_capacity == 0 {
            return Err(ConfigError::Invalid { field: "buffers.series_capacity", reason: "must be > 0".into() });
        }
        if self.buffers.log_capacity == 0 {
            return Err(ConfigError::Invalid { field: "buffers.log_capacity", reason: "must be > 0".into() });
        }
        if self.mqtt.telemetry_topic.trim().is_empty() {
            return Err(ConfigError::Invalid { field: "mqtt.telemetry_topic", reason: "must not be empty".into() });
        }
        Ok(TopologyGraph::new(self.topology.clone())?)
    }
}

pub async fn load_config() -> Result<FeederConfig, ConfigError> {
    let path = std::env::var("FEEDER_KERNEL_CONFIG").unwrap_or_else(|_| "feeder.yaml".into());
    if !Path::new(&path).exists() {
        tracing::warn!(%path, "no feeder config file, using built-in five-pole feeder");
        return Ok(FeederConfig::default());
    }

    let txt = fs::read_to_string(&path).await.map_err(|source| ConfigError::Read { path: path.clone(), source })?;
    let cfg = FeederConfig::from_yaml_str(&txt)?;
    tracing::info!(%path, nodes = cfg.topology.len(), "feeder config loaded");
    Ok(cfg)
}
