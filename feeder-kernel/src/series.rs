/*!
 * SERIES - Historique borné tension/courant par poteau
 *
 * Deux files FIFO par noeud (voltage, current), capacité fixe (50 par défaut).
 * Au-delà de la capacité on évince par la tête : la plus ancienne valeur part.
 */

use serde::{Deserialize, Serialize};
use std::collections::{HashMap, VecDeque};
use std::fmt;

use crate::topology::{NodeId, TopologyGraph};

pub const DEFAULT_SERIES_CAPACITY: usize = 50;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Series {
    Voltage,
    Current,
}

impl Series {
    pub fn as_str(&self) -> &'static str {
        match self {
            Series::Voltage => "voltage",
            Series::Current => "current",
        }
    }
}

impl fmt::Display for Series {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Sample {
    pub timestamp: i64,
    pub value: f64,
}

#[derive(Debug, Clone, Default)]
struct NodeSeries {
    voltage: VecDeque<Sample>,
    current: VecDeque<Sample>,
}

impl NodeSeries {
    fn get(&self, series: Series) -> &VecDeque<Sample> {
        match series {
            Series::Voltage => &self.voltage,
            Series::Current => &self.current,
        }
    }

    fn get_mut(&mut self, series: Series) -> &mut VecDeque<Sample> {
        match series {
            Series::Voltage => &mut self.voltage,
            Series::Current => &mut self.current,
        }
    }
}

#[derive(Debug, Clone)]
pub struct TimeSeriesBuffer {
    capacity: usize,
    slots: HashMap<NodeId, NodeSeries>,
}

impl TimeSeriesBuffer {
    pub fn new(topology: &TopologyGraph, capacity: usize) -> Self {
        Self {
            capacity,
            slots: topology.nodes().iter().map(|n| (n.id, NodeSeries::default())).collect(),
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Ajoute un échantillon; retourne false (sans rien toucher) si la valeur
    /// est absente ou non finie, ou si le poteau est inconnu.
    pub fn append(&mut self, node: NodeId, series: Series, timestamp: i64, value: Option<f64>) -> bool {
        let Some(value) = value.filter(|v| v.is_finite()) else {
            return false;
        };
        let Some(slot) = self.slots.get_mut(&node) else {
            return false;
        };

        let queue = slot.get_mut(series);
        queue.push_back(Sample { timestamp, value });
        while queue.len() > self.capacity {
            queue.pop_front();
        }
        true
    }

    /// Échantillons du plus ancien au plus récent (vide si poteau inconnu)
    pub fn samples(&self, node: NodeId, series: Series) -> Vec<Sample> {
        self.slots
            .get(&node)
            .map(|slot| slot.get(series).iter().copied().collect())
            .unwrap_or_default()
    }

    pub fn len(&self, node: NodeId, series: Series) -> usize {
        self.slots.get(&node).map_or(0, |slot| slot.get(series).len())
    }

    pub fn contains(&self, node: NodeId) -> bool {
        self.slots.contains_key(&node)
    }

    pub fn clear(&mut self) {
        for slot in self.slots.values_mut() {
            slot.voltage.clear();
            slot.current.clear();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::topology::NodeSpec;

    fn buffer(capacity: usize) -> TimeSeriesBuffer {
        let topo =
            TopologyGraph::new(vec![NodeSpec::source(5, "Substation"), NodeSpec::downstream(4, "Pole 4", 1)]).unwrap();
        TimeSeriesBuffer::new(&topo, capacity)
    }

    #[test]
    fn test_capacity_evicts_oldest() {
        let mut buf = buffer(DEFAULT_SERIES_CAPACITY);
        for i in 0..60 {
            assert!(buf.append(4, Series::Voltage, i, Some(200.0 + i as f64)));
        }

        let samples = buf.samples(4, Series::Voltage);
        assert_eq!(samples.len(), 50);
        assert_eq!(samples.first().unwrap().timestamp, 10);
        assert_eq!(samples.last().unwrap().value, 259.0);
        assert_eq!(buf.len(4, Series::Current), 0);
    }

    #[test]
    fn test_non_numeric_is_noop() {
        let mut buf = buffer(3);
        assert!(!buf.append(4, Series::Current, 0, None));
        assert!(!buf.append(4, Series::Current, 0, Some(f64::NAN)));
        assert!(!buf.append(4, Series::Current, 0, Some(f64::INFINITY)));
        assert!(!buf.append(99, Series::Current, 0, Some(1.0)));
        assert_eq!(buf.len(4, Series::Current), 0);
        assert!(buf.samples(99, Series::Current).is_empty());
    }

    #[test]
    fn test_series_are_independent() {
        let mut buf = buffer(3);
        buf.append(5, Series::Voltage, 1, Some(230.0));
        buf.append(4, Series::Voltage, 1, Some(231.0));
        buf.append(4, Series::Current, 1, Some(55.0));

        assert_eq!(buf.len(5, Series::Voltage), 1);
        assert_eq!(buf.len(5, Series::Current), 0);
        assert_eq!(buf.samples(4, Series::Current), vec![Sample { timestamp: 1, value: 55.0 }]);

        buf.clear();
        assert_eq!(buf.len(4, Series::Voltage), 0);
        assert!(buf.contains(4));
    }
}
