/*!
 * MODELS - Types métier partagés du kernel feeder
 *
 * RÔLE : statut opérationnel, classification des défauts, format wire de la
 * télémétrie entrante (scada/poles/#) et de la commande sortante substation_toggle.
 *
 * Les messages MQTT arrivent en JSON "souple" (nombres en string, champs absents,
 * casse variable) : `TelemetryIn` accepte tout ça, `TelemetryEvent` est la forme
 * normalisée consommée par le moteur.
 */

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use time::OffsetDateTime;

use crate::error::IngestError;
use crate::topology::NodeId;

/// Horloge murale en millisecondes epoch (format des timestamps MQTT)
pub fn now_ms() -> i64 {
    (OffsetDateTime::now_utc().unix_timestamp_nanos() / 1_000_000) as i64
}

/// Statut rapporté par un poteau, et statut agrégé du réseau
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Status {
    #[default]
    Ok,
    Warning,
    Fault,
}

/// Le statut système n'a pas de stockage propre, c'est le même domaine de valeurs
pub type SystemStatus = Status;

impl Status {
    /// Parse insensible à la casse; toute valeur inconnue retombe sur OK
    pub fn parse(raw: &str) -> Status {
        match raw.trim().to_ascii_uppercase().as_str() {
            "FAULT" => Status::Fault,
            "WARNING" => Status::Warning,
            _ => Status::Ok,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Status::Ok => "OK",
            Status::Warning => "WARNING",
            Status::Fault => "FAULT",
        }
    }
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Origine d'un défaut franc (court-circuit, terre, ou label inconnu conservé tel quel)
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum HardFault {
    ShortCircuit,
    LineToGround,
    Unrecognized(String),
}

impl HardFault {
    pub fn label(&self) -> &str {
        match self {
            HardFault::ShortCircuit => "Short Circuit Fault",
            HardFault::LineToGround => "Line-to-Ground Fault",
            HardFault::Unrecognized(raw) => raw,
        }
    }
}

/// Classification normalisée d'un événement de télémétrie.
///
/// L'ordre de précédence (du plus fort au plus faible) est
/// SourceOutage > surtension/sous-tension globale > HardFault > NeutralFault
/// > LocalWarning > Normal, voir [`FaultKind::precedence`].
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", content = "detail", rename_all = "snake_case")]
pub enum FaultKind {
    Normal,
    LocalWarning,
    NeutralFault,
    HardFault(HardFault),
    /// Tension mesurée au point d'origine, si numérique
    GlobalOvervoltage(Option<f64>),
    GlobalUndervoltage(Option<f64>),
    SourceOutage,
}

impl FaultKind {
    pub fn precedence(&self) -> u8 {
        match self {
            FaultKind::Normal => 0,
            FaultKind::LocalWarning => 1,
            FaultKind::NeutralFault => 2,
            FaultKind::HardFault(_) => 3,
            FaultKind::GlobalOvervoltage(_) | FaultKind::GlobalUndervoltage(_) => 4,
            FaultKind::SourceOutage => 5,
        }
    }

    /// Statut retenu pour le poteau : un neutre coupé reste dégradé (WARNING)
    /// même reporté en FAULT; les autres classes gardent le statut reçu.
    pub fn derived_status(&self, reported: Status) -> Status {
        match self {
            FaultKind::NeutralFault => Status::Warning,
            _ => reported,
        }
    }

    /// Conditions dont l'effet dépasse le poteau d'origine et bloque le retour au vert
    pub fn is_propagating(&self) -> bool {
        matches!(
            self,
            FaultKind::NeutralFault | FaultKind::GlobalOvervoltage(_) | FaultKind::GlobalUndervoltage(_)
        )
    }

    pub fn label(&self) -> &str {
        match self {
            FaultKind::Normal => "Normal",
            FaultKind::LocalWarning => "Warning",
            FaultKind::NeutralFault => "Neutral Fault",
            FaultKind::HardFault(hard) => hard.label(),
            FaultKind::GlobalOvervoltage(_) => "Overvoltage",
            FaultKind::GlobalUndervoltage(_) => "Undervoltage",
            FaultKind::SourceOutage => "Source Outage",
        }
    }
}

impl fmt::Display for FaultKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Message brut tel que publié par les poteaux (contrat scada/poles)
#[derive(Debug, Clone, Default, Deserialize)]
pub struct TelemetryIn {
    #[serde(default)]
    pub pole_id: Option<Value>,
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default, alias = "faultType")]
    pub fault_type: Option<String>,
    #[serde(default)]
    pub voltage: Option<Value>,
    #[serde(default)]
    pub current: Option<Value>,
    #[serde(default)]
    pub breaker_status: Option<Value>,
    #[serde(default)]
    pub fault_code: Option<Value>,
    #[serde(default)]
    pub timestamp: Option<Value>,
}

/// Événement normalisé, entrée du moteur de propagation
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TelemetryEvent {
    pub node_id: Option<NodeId>,
    pub status: Status,
    pub fault_type: String,
    pub voltage: Option<f64>,
    pub current: Option<f64>,
    pub breaker_status: Option<String>,
    pub fault_code: Option<Value>,
    pub timestamp: i64,
}

impl TelemetryEvent {
    pub fn new(node_id: NodeId, status: Status, fault_type: &str, timestamp: i64) -> Self {
        Self {
            node_id: Some(node_id),
            status,
            fault_type: fault_type.to_string(),
            voltage: None,
            current: None,
            breaker_status: None,
            fault_code: None,
            timestamp,
        }
    }

    pub fn with_readings(mut self, voltage: Option<f64>, current: Option<f64>) -> Self {
        self.voltage = voltage;
        self.current = current;
        self
    }

    pub fn with_breaker(mut self, breaker_status: &str) -> Self {
        self.breaker_status = Some(breaker_status.to_string());
        self
    }
}

impl TelemetryIn {
    /// Normalise le message; `received_at` sert de timestamp par défaut
    pub fn into_event(self, received_at: i64) -> TelemetryEvent {
        let fault_type = self
            .fault_type
            .map(|t| t.trim().to_string())
            .filter(|t| !t.is_empty())
            .unwrap_or_else(|| "Normal".to_string());

        TelemetryEvent {
            node_id: self.pole_id.as_ref().and_then(parse_node_id),
            status: self.status.as_deref().map(Status::parse).unwrap_or_default(),
            fault_type,
            voltage: self.voltage.as_ref().and_then(parse_reading),
            current: self.current.as_ref().and_then(parse_reading),
            breaker_status: self.breaker_status.as_ref().and_then(value_to_text),
            fault_code: self.fault_code.filter(|v| !v.is_null()),
            timestamp: self.timestamp.as_ref().and_then(parse_timestamp).unwrap_or(received_at),
        }
    }
}

/// Décode un payload MQTT brut en événement normalisé
pub fn parse_payload(payload: &[u8], received_at: i64) -> Result<TelemetryEvent, IngestError> {
    let raw: TelemetryIn =
        serde_json::from_slice(payload).map_err(|e| IngestError::Malformed(e.to_string()))?;
    Ok(raw.into_event(received_at))
}

fn parse_node_id(value: &Value) -> Option<NodeId> {
    match value {
        Value::Number(n) => n
            .as_u64()
            .or_else(|| n.as_f64().filter(|f| f.fract() == 0.0 && *f >= 0.0).map(|f| f as u64))
            .and_then(|id| NodeId::try_from(id).ok()),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

/// Tension/courant : nombre JSON ou string numérique ("231.4"); le reste est inconnu
fn parse_reading(value: &Value) -> Option<f64> {
    let reading = match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse::<f64>().ok(),
        _ => None,
    };
    reading.filter(|v| v.is_finite())
}

fn parse_timestamp(value: &Value) -> Option<i64> {
    match value {
        Value::Number(n) => n.as_i64().or_else(|| n.as_f64().map(|f| f as i64)),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

fn value_to_text(value: &Value) -> Option<String> {
    match value {
        Value::Null => None,
        Value::String(s) => Some(s.clone()),
        other => Some(other.to_string()),
    }
}

/// État demandé pour la sous-station (commande opérateur)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum SourceState {
    Online,
    Offline,
}

/// Commande sortante publiée sur le topic de commandes
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SubstationToggle {
    pub command: String,
    pub substation_id: NodeId,
    pub status: SourceState,
    pub timestamp: i64,
}

impl SubstationToggle {
    pub fn new(substation_id: NodeId, online: bool, timestamp: i64) -> Self {
        Self {
            command: "substation_toggle".to_string(),
            substation_id,
            status: if online { SourceState::Online } else { SourceState::Offline },
            timestamp,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_parse_is_case_insensitive() {
        assert_eq!(Status::parse("fault"), Status::Fault);
        assert_eq!(Status::parse(" Warning "), Status::Warning);
        assert_eq!(Status::parse("ok"), Status::Ok);
        assert_eq!(Status::parse("garbage"), Status::Ok);
    }

    #[test]
    fn test_payload_defaults() {
        let event = parse_payload(br#"{"pole_id": 3}"#, 1_000).unwrap();
        assert_eq!(event.node_id, Some(3));
        assert_eq!(event.status, Status::Ok);
        assert_eq!(event.fault_type, "Normal");
        assert_eq!(event.voltage, None);
        assert_eq!(event.timestamp, 1_000);
    }

    #[test]
    fn test_payload_accepts_loose_json() {
        let payload = br#"{
            "pole_id": "4",
            "status": "warning",
            "faultType": "NeutralFault",
            "voltage": "231.5",
            "current": 55,
            "breaker_status": "CLOSED",
            "fault_code": 17,
            "timestamp": 1700000000000
        }"#;
        let event = parse_payload(payload, 0).unwrap();
        assert_eq!(event.node_id, Some(4));
        assert_eq!(event.status, Status::Warning);
        assert_eq!(event.fault_type, "NeutralFault");
        assert_eq!(event.voltage, Some(231.5));
        assert_eq!(event.current, Some(55.0));
        assert_eq!(event.breaker_status.as_deref(), Some("CLOSED"));
        assert_eq!(event.fault_code, Some(serde_json::json!(17)));
        assert_eq!(event.timestamp, 1_700_000_000_000);
    }

    #[test]
    fn test_unparseable_readings_are_unknown() {
        let event = parse_payload(br#"{"pole_id": 1, "voltage": "---", "current": null}"#, 0).unwrap();
        assert_eq!(event.voltage, None);
        assert_eq!(event.current, None);
    }

    #[test]
    fn test_missing_or_invalid_pole_id() {
        assert_eq!(parse_payload(br#"{"status": "FAULT"}"#, 0).unwrap().node_id, None);
        assert_eq!(parse_payload(br#"{"pole_id": "abc"}"#, 0).unwrap().node_id, None);
        assert_eq!(parse_payload(br#"{"pole_id": -2}"#, 0).unwrap().node_id, None);
    }

    #[test]
    fn test_malformed_payload() {
        let err = parse_payload(b"not json", 0).unwrap_err();
        assert!(matches!(err, IngestError::Malformed(_)));
    }

    #[test]
    fn test_fault_kind_precedence_order() {
        let ordered = [
            FaultKind::Normal,
            FaultKind::LocalWarning,
            FaultKind::NeutralFault,
            FaultKind::HardFault(HardFault::ShortCircuit),
            FaultKind::GlobalOvervoltage(None),
            FaultKind::SourceOutage,
        ];
        for pair in ordered.windows(2) {
            assert!(pair[0].precedence() < pair[1].precedence());
        }
        assert_eq!(
            FaultKind::GlobalUndervoltage(Some(180.0)).precedence(),
            FaultKind::GlobalOvervoltage(None).precedence()
        );
    }

    #[test]
    fn test_neutral_fault_is_never_derived_as_fault() {
        assert_eq!(FaultKind::NeutralFault.derived_status(Status::Fault), Status::Warning);
        assert_eq!(FaultKind::NeutralFault.derived_status(Status::Warning), Status::Warning);
        assert_eq!(FaultKind::HardFault(HardFault::ShortCircuit).derived_status(Status::Fault), Status::Fault);
        assert_eq!(FaultKind::GlobalOvervoltage(None).derived_status(Status::Fault), Status::Fault);
        assert_eq!(FaultKind::LocalWarning.derived_status(Status::Warning), Status::Warning);
    }

    #[test]
    fn test_substation_toggle_wire_format() {
        let cmd = SubstationToggle::new(5, false, 42);
        let json = serde_json::to_value(&cmd).unwrap();
        assert_eq!(
            json,
            serde_json::json!({
                "command": "substation_toggle",
                "substation_id": 5,
                "status": "OFFLINE",
                "timestamp": 42
            })
        );
    }
}
