//! Statut agrégé du réseau, recalculé après chaque événement accepté (jamais mis en cache).

use crate::models::{FaultKind, Status, SystemStatus};
use crate::store::NodeStateStore;

/// FAULT si un poteau est FAULT, sinon WARNING si un poteau est WARNING
/// (propagé ou local) ou si la sous-station a été mise hors ligne, sinon OK.
///
/// Un poteau en surtension reporté en FAULT donne donc un système FAULT :
/// c'est le statut du poteau qui compte, pas la classe de l'overlay.
/// Exception : un neutre coupé est stocké en WARNING même reçu en FAULT
/// (voir `FaultKind::derived_status`), il ne fait jamais passer le système en FAULT.
pub fn resolve(store: &NodeStateStore) -> SystemStatus {
    let nodes = store.nodes();
    if nodes.iter().any(|n| n.status == Status::Fault) {
        Status::Fault
    } else if !store.source_online || nodes.iter().any(|n| n.status == Status::Warning) {
        Status::Warning
    } else {
        Status::Ok
    }
}

/// Condition active de plus forte précédence (Normal si rien d'actif)
pub fn dominant_fault(store: &NodeStateStore) -> FaultKind {
    store
        .nodes()
        .iter()
        .map(|n| &n.fault_kind)
        .fold(&FaultKind::Normal, |best, kind| if kind.precedence() > best.precedence() { kind } else { best })
        .clone()
}

/// Vrai tant qu'une condition empêche le retour global à la baseline
pub fn blocks_recovery(store: &NodeStateStore) -> bool {
    !store.source_online || store.nodes().iter().any(|n| n.blocks_recovery())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::HardFault;
    use crate::topology::{NodeSpec, TopologyGraph};

    fn store() -> NodeStateStore {
        let topo = TopologyGraph::new(vec![
            NodeSpec::source(5, "Substation"),
            NodeSpec::downstream(4, "Pole 4", 1),
            NodeSpec::downstream(3, "Pole 3", 2),
        ])
        .unwrap();
        NodeStateStore::new(&topo)
    }

    fn set(store: &mut NodeStateStore, position: usize, status: Status, kind: FaultKind) {
        let node = store.node_at_mut(position);
        node.status = status;
        node.fault_kind = kind;
    }

    #[test]
    fn test_all_ok() {
        let store = store();
        assert_eq!(resolve(&store), Status::Ok);
        assert_eq!(dominant_fault(&store), FaultKind::Normal);
        assert!(!blocks_recovery(&store));
    }

    #[test]
    fn test_fault_wins_over_warning() {
        let mut store = store();
        set(&mut store, 1, Status::Warning, FaultKind::LocalWarning);
        assert_eq!(resolve(&store), Status::Warning);
        assert!(!blocks_recovery(&store));

        set(&mut store, 2, Status::Fault, FaultKind::HardFault(HardFault::ShortCircuit));
        assert_eq!(resolve(&store), Status::Fault);
        assert!(blocks_recovery(&store));
    }

    #[test]
    fn test_fault_status_overvoltage_is_fault() {
        let mut store = store();
        set(&mut store, 1, Status::Fault, FaultKind::GlobalOvervoltage(Some(270.0)));
        assert_eq!(resolve(&store), Status::Fault);

        set(&mut store, 1, Status::Warning, FaultKind::GlobalOvervoltage(Some(260.0)));
        assert_eq!(resolve(&store), Status::Warning);
        assert!(blocks_recovery(&store));
    }

    #[test]
    fn test_source_offline_is_at_least_warning() {
        let mut store = store();
        store.source_online = false;
        assert_eq!(resolve(&store), Status::Warning);
        assert!(blocks_recovery(&store));
    }

    #[test]
    fn test_dominant_fault_by_precedence() {
        let mut store = store();
        set(&mut store, 1, Status::Fault, FaultKind::NeutralFault);
        set(&mut store, 2, Status::Fault, FaultKind::HardFault(HardFault::LineToGround));
        assert_eq!(dominant_fault(&store), FaultKind::HardFault(HardFault::LineToGround));

        set(&mut store, 0, Status::Fault, FaultKind::SourceOutage);
        assert_eq!(dominant_fault(&store), FaultKind::SourceOutage);
    }
}
