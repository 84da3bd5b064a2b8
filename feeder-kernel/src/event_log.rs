use serde::Serialize;
use std::collections::VecDeque;

use crate::topology::NodeId;

pub const DEFAULT_LOG_CAPACITY: usize = 500;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Info,
    Warn,
    Fault,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LogEntry {
    pub timestamp: i64,
    pub severity: Severity,
    pub message: String,
    pub origin: Option<NodeId>,
}

impl LogEntry {
    pub fn new(timestamp: i64, severity: Severity, message: impl Into<String>, origin: Option<NodeId>) -> Self {
        Self { timestamp, severity, message: message.into(), origin }
    }
}

/// Journal des transitions, anneau borné : la plus ancienne entrée est évincée en premier
#[derive(Debug, Clone)]
pub struct EventLog {
    capacity: usize,
    entries: VecDeque<LogEntry>,
}

impl EventLog {
    pub fn new(capacity: usize) -> Self {
        Self { capacity, entries: VecDeque::with_capacity(capacity.min(1024)) }
    }

    pub fn append(&mut self, entry: LogEntry) {
        if self.entries.len() >= self.capacity {
            self.entries.pop_front();
        }
        self.entries.push_back(entry);
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn iter(&self) -> impl Iterator<Item = &LogEntry> {
        self.entries.iter()
    }

    pub fn last(&self) -> Option<&LogEntry> {
        self.entries.back()
    }

    /// Les `n` entrées les plus récentes, dans l'ordre chronologique
    pub fn recent(&self, n: usize) -> Vec<LogEntry> {
        let skip = self.entries.len().saturating_sub(n);
        self.entries.iter().skip(skip).cloned().collect()
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }
}

impl Default for EventLog {
    fn default() -> Self {
        Self::new(DEFAULT_LOG_CAPACITY)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ring_evicts_oldest() {
        let mut log = EventLog::new(3);
        for i in 0..5 {
            log.append(LogEntry::new(i, Severity::Info, format!("entry {i}"), None));
        }
        assert_eq!(log.len(), 3);
        let messages: Vec<_> = log.iter().map(|e| e.message.as_str()).collect();
        assert_eq!(messages, vec!["entry 2", "entry 3", "entry 4"]);
    }

    #[test]
    fn test_recent_and_clear() {
        let mut log = EventLog::default();
        assert_eq!(log.capacity(), 500);
        log.append(LogEntry::new(1, Severity::Warn, "a", Some(4)));
        log.append(LogEntry::new(2, Severity::Fault, "b", Some(3)));
        log.append(LogEntry::new(3, Severity::Info, "c", None));

        let recent = log.recent(2);
        assert_eq!(recent.len(), 2);
        assert_eq!(recent[0].message, "b");
        assert_eq!(recent[1].message, "c");
        assert_eq!(log.recent(10).len(), 3);

        log.clear();
        assert!(log.is_empty());
    }

    #[test]
    fn test_severity_serializes_lowercase() {
        let entry = LogEntry::new(7, Severity::Warn, "x", Some(2));
        let json = serde_json::to_value(&entry).unwrap();
        assert_eq!(json["severity"], "warn");
        assert_eq!(json["origin"], 2);
    }
}
