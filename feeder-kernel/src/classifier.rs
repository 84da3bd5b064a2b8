/*!
 * CLASSIFIER - Normalisation des libellés de défaut
 *
 * Fonction pure (statut, fault_type brut) → FaultKind. Les synonymes sont une table
 * statique, comparés après trim + minuscules. Un FAULT au libellé inconnu n'est pas
 * une erreur : il devient un HardFault qui garde le libellé d'origine pour l'affichage.
 */

use crate::models::{FaultKind, HardFault, Status, TelemetryEvent};
use crate::topology::Role;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum FaultLabel {
    ShortCircuit,
    LineToGround,
    Neutral,
    Overvoltage,
    Undervoltage,
}

const SYNONYMS: &[(&str, FaultLabel)] = &[
    ("short", FaultLabel::ShortCircuit),
    ("line fault", FaultLabel::ShortCircuit),
    ("linetoground", FaultLabel::LineToGround),
    ("neutralfault", FaultLabel::Neutral),
    ("neutral break", FaultLabel::Neutral),
    ("overvoltage", FaultLabel::Overvoltage),
    ("undervoltage", FaultLabel::Undervoltage),
];

fn lookup(raw: &str) -> Option<FaultLabel> {
    let key = raw.trim().to_lowercase();
    SYNONYMS.iter().find(|(synonym, _)| *synonym == key).map(|(_, label)| *label)
}

pub fn classify(status: Status, raw_fault_type: &str) -> FaultKind {
    match (status, lookup(raw_fault_type)) {
        (Status::Ok, _) => FaultKind::Normal,

        (_, Some(FaultLabel::Overvoltage)) => FaultKind::GlobalOvervoltage(None),
        (_, Some(FaultLabel::Undervoltage)) => FaultKind::GlobalUndervoltage(None),
        (_, Some(FaultLabel::Neutral)) => FaultKind::NeutralFault,

        // un court-circuit annoncé en WARNING reste local
        (Status::Warning, _) => FaultKind::LocalWarning,

        (Status::Fault, Some(FaultLabel::ShortCircuit)) => FaultKind::HardFault(HardFault::ShortCircuit),
        (Status::Fault, Some(FaultLabel::LineToGround)) => FaultKind::HardFault(HardFault::LineToGround),
        (Status::Fault, None) => {
            FaultKind::HardFault(HardFault::Unrecognized(raw_fault_type.trim().to_string()))
        }
    }
}

/// Classification complète d'un événement : un FAULT à la source est une coupure
/// de la source, et les conditions globales emportent la tension mesurée.
pub fn classify_event(role: Role, event: &TelemetryEvent) -> FaultKind {
    if role == Role::Source && event.status == Status::Fault {
        return FaultKind::SourceOutage;
    }

    match classify(event.status, &event.fault_type) {
        FaultKind::GlobalOvervoltage(_) => FaultKind::GlobalOvervoltage(event.voltage),
        FaultKind::GlobalUndervoltage(_) => FaultKind::GlobalUndervoltage(event.voltage),
        other => other,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ok_is_always_normal() {
        assert_eq!(classify(Status::Ok, "Normal"), FaultKind::Normal);
        assert_eq!(classify(Status::Ok, "short"), FaultKind::Normal);
        assert_eq!(classify(Status::Ok, "Overvoltage"), FaultKind::Normal);
    }

    #[test]
    fn test_synonyms_are_case_insensitive() {
        assert_eq!(classify(Status::Fault, "SHORT"), FaultKind::HardFault(HardFault::ShortCircuit));
        assert_eq!(classify(Status::Fault, "Line Fault"), FaultKind::HardFault(HardFault::ShortCircuit));
        assert_eq!(classify(Status::Fault, "LineToGround"), FaultKind::HardFault(HardFault::LineToGround));
        assert_eq!(classify(Status::Fault, " Neutral Break "), FaultKind::NeutralFault);
        assert_eq!(classify(Status::Fault, "NeutralFault"), FaultKind::NeutralFault);
    }

    #[test]
    fn test_global_kinds_for_warning_and_fault() {
        for status in [Status::Warning, Status::Fault] {
            assert_eq!(classify(status, "overvoltage"), FaultKind::GlobalOvervoltage(None));
            assert_eq!(classify(status, "Undervoltage"), FaultKind::GlobalUndervoltage(None));
        }
    }

    #[test]
    fn test_warning_without_propagating_type_is_local() {
        assert_eq!(classify(Status::Warning, "Normal"), FaultKind::LocalWarning);
        assert_eq!(classify(Status::Warning, "short"), FaultKind::LocalWarning);
        assert_eq!(classify(Status::Warning, "whatever"), FaultKind::LocalWarning);
        assert_eq!(classify(Status::Warning, "neutral break"), FaultKind::NeutralFault);
    }

    #[test]
    fn test_unrecognized_fault_keeps_label() {
        assert_eq!(
            classify(Status::Fault, "Arc Flash"),
            FaultKind::HardFault(HardFault::Unrecognized("Arc Flash".into()))
        );
        assert_eq!(classify(Status::Fault, "Arc Flash").label(), "Arc Flash");
    }

    #[test]
    fn test_source_fault_is_outage() {
        let event = TelemetryEvent::new(5, Status::Fault, "short", 0);
        assert_eq!(classify_event(Role::Source, &event), FaultKind::SourceOutage);
        assert_eq!(
            classify_event(Role::Downstream, &event),
            FaultKind::HardFault(HardFault::ShortCircuit)
        );

        let warning = TelemetryEvent::new(5, Status::Warning, "Normal", 0);
        assert_eq!(classify_event(Role::Source, &warning), FaultKind::LocalWarning);
    }

    #[test]
    fn test_global_kind_carries_voltage() {
        let event = TelemetryEvent::new(4, Status::Fault, "Overvoltage", 0).with_readings(Some(270.0), None);
        assert_eq!(classify_event(Role::Downstream, &event), FaultKind::GlobalOvervoltage(Some(270.0)));
    }
}
