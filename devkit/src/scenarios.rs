/*!
Scénarios de télémétrie

Séquences de payloads rejouables contre un kernel (MQTT ou POST /telemetry).
Les poteaux sont donnés dans l'ordre du départ, source en tête : `[5, 4, 3, 2, 1]`.
*/

use rand::Rng;

use crate::telemetry::{PolePayload, TelemetryBuilder};

pub const DEFAULT_FEEDER: [u32; 5] = [5, 4, 3, 2, 1];

#[derive(Debug, Clone, PartialEq)]
pub enum Scenario {
    /// Un relevé OK par poteau, tension 220-240V et courant 50-70A
    SampleData,
    /// Défaut simulé sur un poteau (par défaut : surtension FAULT 270V / 110A, disjoncteur ouvert)
    Fault { pole: u32, fault_type: String, voltage: f64 },
    /// Neutre coupé signalé en WARNING
    NeutralBreak { pole: u32 },
    /// La source elle-même passe en FAULT
    SourceOutage,
    /// Retour à la normale de tous les poteaux
    AllClear,
}

impl Scenario {
    pub fn simulated_fault(pole: u32) -> Self {
        Scenario::Fault { pole, fault_type: "Overvoltage".to_string(), voltage: 270.0 }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Scenario::SampleData => "sample-data",
            Scenario::Fault { .. } => "fault",
            Scenario::NeutralBreak { .. } => "neutral-break",
            Scenario::SourceOutage => "source-outage",
            Scenario::AllClear => "all-clear",
        }
    }

    /// Payloads du scénario, tous horodatés à `now`
    pub fn payloads(&self, poles: &[u32], now: i64) -> Vec<PolePayload> {
        match self {
            Scenario::SampleData => {
                let mut rng = rand::thread_rng();
                poles
                    .iter()
                    .map(|&pole| {
                        TelemetryBuilder::ok(pole)
                            .voltage(round1(220.0 + rng.gen_range(0.0..20.0)))
                            .current(round1(50.0 + rng.gen_range(0.0..20.0)))
                            .at(now)
                            .build()
                    })
                    .collect()
            }
            Scenario::Fault { pole, fault_type, voltage } => vec![TelemetryBuilder::fault(*pole, fault_type)
                .voltage(*voltage)
                .current(110.0)
                .breaker("OPEN")
                .at(now)
                .build()],
            Scenario::NeutralBreak { pole } => {
                vec![TelemetryBuilder::warning(*pole, "neutral break").breaker("CLOSED").at(now).build()]
            }
            Scenario::SourceOutage => poles
                .first()
                .map(|&source| TelemetryBuilder::fault(source, "Substation Fault").voltage(0.0).at(now).build())
                .into_iter()
                .collect(),
            Scenario::AllClear => poles.iter().map(|&pole| TelemetryBuilder::ok(pole).at(now).build()).collect(),
        }
    }
}

fn round1(value: f64) -> f64 {
    (value * 10.0).round() / 10.0
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sample_data_ranges() {
        let payloads = Scenario::SampleData.payloads(&DEFAULT_FEEDER, 42);
        assert_eq!(payloads.len(), 5);
        for (payload, pole) in payloads.iter().zip(DEFAULT_FEEDER) {
            assert_eq!(payload.pole_id, pole);
            assert_eq!(payload.status, "OK");
            assert_eq!(payload.timestamp, 42);
            let v = payload.voltage.unwrap();
            let c = payload.current.unwrap();
            assert!((220.0..=240.0).contains(&v), "voltage {v}");
            assert!((50.0..=70.0).contains(&c), "current {c}");
        }
    }

    #[test]
    fn test_simulated_fault_defaults() {
        let payloads = Scenario::simulated_fault(4).payloads(&DEFAULT_FEEDER, 1);
        assert_eq!(payloads.len(), 1);
        let fault = &payloads[0];
        assert_eq!(fault.pole_id, 4);
        assert_eq!(fault.status, "FAULT");
        assert_eq!(fault.fault_type, "Overvoltage");
        assert_eq!(fault.voltage, Some(270.0));
        assert_eq!(fault.breaker_status.as_deref(), Some("OPEN"));
    }

    #[test]
    fn test_source_outage_targets_first_pole() {
        let payloads = Scenario::SourceOutage.payloads(&DEFAULT_FEEDER, 1);
        assert_eq!(payloads.len(), 1);
        assert_eq!(payloads[0].pole_id, 5);
        assert!(Scenario::SourceOutage.payloads(&[], 1).is_empty());
    }
}
