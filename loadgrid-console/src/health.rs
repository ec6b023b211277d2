use crate::protocol::FrameReport;
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU32, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Instant;
use time::OffsetDateTime;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConnectionHealth {
    pub uptime_seconds: u64,
    pub endpoint: String,
    pub status: String,
    pub reconnects: u32,
    pub frames_applied: u64,
    pub frames_dropped: u64,
    pub envelopes_skipped: u64,
    pub resyncs: u64,
    pub last_frame_at: Option<String>,
}

/// Suivi de la connexion au plan de contrôle, partagé entre la tâche
/// transport et le rendu.
#[derive(Clone)]
pub struct ConnectionTracker {
    start_time: Instant,
    endpoint: Arc<parking_lot::Mutex<String>>,
    status: Arc<parking_lot::Mutex<String>>,
    reconnects: Arc<AtomicU32>,
    frames_applied: Arc<AtomicU64>,
    frames_dropped: Arc<AtomicU64>,
    envelopes_skipped: Arc<AtomicU64>,
    resyncs: Arc<AtomicU64>,
    last_frame_at: Arc<parking_lot::Mutex<Option<OffsetDateTime>>>,
}

impl ConnectionTracker {
    pub fn new() -> Self {
        Self {
            start_time: Instant::now(),
            endpoint: Arc::new(parking_lot::Mutex::new(String::new())),
            status: Arc::new(parking_lot::Mutex::new("connecting".to_string())),
            reconnects: Arc::new(AtomicU32::new(0)),
            frames_applied: Arc::new(AtomicU64::new(0)),
            frames_dropped: Arc::new(AtomicU64::new(0)),
            envelopes_skipped: Arc::new(AtomicU64::new(0)),
            resyncs: Arc::new(AtomicU64::new(0)),
            last_frame_at: Arc::new(parking_lot::Mutex::new(None)),
        }
    }

    pub fn set_endpoint(&self, endpoint: &str) {
        *self.endpoint.lock() = endpoint.to_string();
    }

    pub fn mark_connected(&self) {
        *self.status.lock() = "connected".to_string();
    }

    pub fn mark_disconnected(&self) {
        *self.status.lock() = "disconnected".to_string();
    }

    pub fn increment_reconnects(&self) {
        self.reconnects.fetch_add(1, Ordering::Relaxed);
        *self.status.lock() = "reconnecting".to_string();
    }

    pub fn record_frame(&self, report: &FrameReport) {
        self.frames_applied.fetch_add(1, Ordering::Relaxed);
        self.envelopes_skipped.fetch_add(report.skipped as u64, Ordering::Relaxed);
        self.resyncs.fetch_add(report.resyncs as u64, Ordering::Relaxed);
        *self.last_frame_at.lock() = Some(OffsetDateTime::now_utc());
    }

    pub fn record_dropped_frame(&self) {
        self.frames_dropped.fetch_add(1, Ordering::Relaxed);
        *self.last_frame_at.lock() = Some(OffsetDateTime::now_utc());
    }

    pub fn get_health(&self) -> ConnectionHealth {
        let last = *self.last_frame_at.lock();
        let last_frame_at =
            last.and_then(|ts| ts.format(&time::format_description::well_known::Rfc3339).ok());

        ConnectionHealth {
            uptime_seconds: self.start_time.elapsed().as_secs(),
            endpoint: self.endpoint.lock().clone(),
            status: self.status.lock().clone(),
            reconnects: self.reconnects.load(Ordering::Relaxed),
            frames_applied: self.frames_applied.load(Ordering::Relaxed),
            frames_dropped: self.frames_dropped.load(Ordering::Relaxed),
            envelopes_skipped: self.envelopes_skipped.load(Ordering::Relaxed),
            resyncs: self.resyncs.load(Ordering::Relaxed),
            last_frame_at,
        }
    }
}

impl Default for ConnectionTracker {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_transitions() {
        let tracker = ConnectionTracker::new();
        assert_eq!(tracker.get_health().status, "connecting");

        tracker.mark_connected();
        assert_eq!(tracker.get_health().status, "connected");

        tracker.mark_disconnected();
        tracker.increment_reconnects();
        let health = tracker.get_health();
        assert_eq!(health.status, "reconnecting");
        assert_eq!(health.reconnects, 1);
    }

    #[test]
    fn test_frame_counters() {
        let tracker = ConnectionTracker::new();
        assert!(tracker.get_health().last_frame_at.is_none());

        tracker.record_frame(&FrameReport { applied: 3, skipped: 1, resyncs: 1 });
        tracker.record_frame(&FrameReport { applied: 1, skipped: 0, resyncs: 0 });
        tracker.record_dropped_frame();

        let health = tracker.get_health();
        assert_eq!(health.frames_applied, 2);
        assert_eq!(health.frames_dropped, 1);
        assert_eq!(health.envelopes_skipped, 1);
        assert_eq!(health.resyncs, 1);
        assert!(health.last_frame_at.is_some());
    }
}
