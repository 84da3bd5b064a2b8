/*!
Payloads de télémétrie poteau

Reproduit le contrat publié par les poteaux sur `scada/poles/{id}` :
`pole_id`, `status`, `fault_type`, mesures optionnelles, `breaker_status`, `timestamp` (ms).
*/

use anyhow::Result;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PolePayload {
    pub pole_id: u32,
    pub status: String,
    pub fault_type: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub voltage: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub current: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub breaker_status: Option<String>,
    pub timestamp: i64,
}

impl PolePayload {
    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        Ok(serde_json::to_vec(self)?)
    }

    pub fn to_json(&self) -> serde_json::Value {
        serde_json::json!(self)
    }
}

/// Topic de publication d'un poteau (`scada/poles` + `/4`)
pub fn pole_topic(prefix: &str, pole_id: u32) -> String {
    format!("{}/{}", prefix.trim_end_matches('/'), pole_id)
}

/// Builder fluide : `TelemetryBuilder::fault(3, "short").voltage(0.0).build()`
#[derive(Debug, Clone)]
pub struct TelemetryBuilder {
    payload: PolePayload,
}

impl TelemetryBuilder {
    pub fn new(pole_id: u32, status: &str, fault_type: &str) -> Self {
        Self {
            payload: PolePayload {
                pole_id,
                status: status.to_string(),
                fault_type: fault_type.to_string(),
                voltage: None,
                current: None,
                breaker_status: None,
                timestamp: chrono::Utc::now().timestamp_millis(),
            },
        }
    }

    pub fn ok(pole_id: u32) -> Self {
        Self::new(pole_id, "OK", "Normal").breaker("CLOSED")
    }

    pub fn warning(pole_id: u32, fault_type: &str) -> Self {
        Self::new(pole_id, "WARNING", fault_type)
    }

    pub fn fault(pole_id: u32, fault_type: &str) -> Self {
        Self::new(pole_id, "FAULT", fault_type)
    }

    pub fn voltage(mut self, volts: f64) -> Self {
        self.payload.voltage = Some(volts);
        self
    }

    pub fn current(mut self, amps: f64) -> Self {
        self.payload.current = Some(amps);
        self
    }

    pub fn breaker(mut self, state: &str) -> Self {
        self.payload.breaker_status = Some(state.to_string());
        self
    }

    pub fn at(mut self, timestamp: i64) -> Self {
        self.payload.timestamp = timestamp;
        self
    }

    pub fn build(self) -> PolePayload {
        self.payload
    }

    /// Raccourci pour les tests : JSON sérialisé prêt à ingérer
    pub fn bytes(self) -> Vec<u8> {
        // PolePayload ne contient que des types JSON natifs
        serde_json::to_vec(&self.payload).unwrap_or_default()
    }
}
