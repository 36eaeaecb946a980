//! Bounded append-only log ring, shared by `ClusterRuntime` and `Session`
//! (spec.md 3: "bounded ring of cluster-level log lines (cap 500)").
//!
//! Grounded on the teacher's small-focused-struct style (`VolumeTracker`'s
//! `VecDeque` window in `volume_tracker.rs`) rather than inlining bound
//! checks at every call site.

use std::collections::VecDeque;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum LogLevel {
    Info,
    Warn,
    Error,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogLine {
    pub at: DateTime<Utc>,
    pub level: LogLevel,
    pub message: String,
}

/// Fixed-capacity FIFO ring. Pushing past capacity evicts the oldest entry.
#[derive(Debug, Clone, Default)]
pub struct LogRing {
    cap: usize,
    lines: VecDeque<LogLine>,
}

impl LogRing {
    pub fn new(cap: usize) -> Self {
        Self { cap, lines: VecDeque::with_capacity(cap.min(64)) }
    }

    pub fn push(&mut self, level: LogLevel, message: impl Into<String>) {
        if self.lines.len() >= self.cap {
            self.lines.pop_front();
        }
        self.lines.push_back(LogLine { at: Utc::now(), level, message: message.into() });
    }

    pub fn info(&mut self, message: impl Into<String>) {
        self.push(LogLevel::Info, message);
    }

    pub fn warn(&mut self, message: impl Into<String>) {
        self.push(LogLevel::Warn, message);
    }

    pub fn error(&mut self, message: impl Into<String>) {
        self.push(LogLevel::Error, message);
    }

    pub fn snapshot(&self) -> Vec<LogLine> {
        self.lines.iter().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.lines.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn caps_at_capacity_and_drops_oldest() {
        let mut ring = LogRing::new(3);
        ring.info("a");
        ring.info("b");
        ring.info("c");
        ring.info("d");
        let snap = ring.snapshot();
        assert_eq!(snap.len(), 3);
        assert_eq!(snap[0].message, "b");
        assert_eq!(snap[2].message, "d");
    }

    #[test]
    fn empty_ring_has_zero_len() {
        let ring = LogRing::new(500);
        assert!(ring.is_empty());
        assert_eq!(ring.len(), 0);
    }
}
