/*!
 * FEEDER KERNEL - Classification et propagation des défauts sur un départ radial
 *
 * RÔLE : la télémétrie des poteaux (MQTT `scada/poles/#` ou POST /telemetry) est
 * classée, propagée en aval de la topologie et résumée en un statut système.
 * Le rendu, les graphiques, le journal et les alertes sont des sinks injectés.
 *
 * ORGANISATION :
 * - topology / classifier / store / status : le cœur pur, sans I/O
 * - engine : machine de transitions sur l'état des nœuds
 * - actor : tâche unique propriétaire du moteur
 * - mqtt / bus / http / health : surfaces réseau du kernel
 */

pub mod actor;
pub mod bus;
pub mod classifier;
pub mod config;
pub mod engine;
pub mod error;
pub mod event_log;
pub mod health;
pub mod http;
pub mod models;
pub mod mqtt;
pub mod series;
pub mod sinks;
pub mod snapshot;
pub mod status;
pub mod store;
pub mod topology;

pub use engine::{EngineSettings, FeederEngine};
pub use error::{ConfigError, IngestError, TopologyError};
pub use models::{FaultKind, HardFault, Status, TelemetryEvent};
pub use topology::{NodeSpec, TopologyGraph};
