//! Observability and Metrics
//!
//! Atomic counters for the command endpoint and the status notifier.
//! One `Metrics` value lives in the server context and is shared by every
//! connection task.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Instant;
use tracing::{debug, info};

/// Metrics collector for protocol operations
#[derive(Debug)]
pub struct Metrics {
    /// Total connections accepted by the command endpoint
    pub connections_total: AtomicU64,
    /// Currently open command connections
    pub connections_active: AtomicU64,
    /// Commands routed to a registered handler
    pub commands_dispatched: AtomicU64,
    /// Commands whose handler replied with an empty error
    pub commands_succeeded: AtomicU64,
    /// Commands whose handler failed (reply carries the message)
    pub commands_failed: AtomicU64,
    /// Unknown tokens, missing or corrupt payloads
    pub protocol_errors: AtomicU64,
    /// Status notifications acknowledged by the companion server
    pub notifications_sent: AtomicU64,
    /// Status notifications that were not acknowledged
    pub notifications_failed: AtomicU64,
    /// Acknowledged notifications whose local status marker could not be saved
    pub status_updates_failed: AtomicU64,
    /// Licenses built and signed
    pub licenses_issued: AtomicU64,
    start_time: Instant,
}

impl Metrics {
    /// Create a new metrics collector
    pub fn new() -> Self {
        Self {
            connections_total: AtomicU64::new(0),
            connections_active: AtomicU64::new(0),
            commands_dispatched: AtomicU64::new(0),
            commands_succeeded: AtomicU64::new(0),
            commands_failed: AtomicU64::new(0),
            protocol_errors: AtomicU64::new(0),
            notifications_sent: AtomicU64::new(0),
            notifications_failed: AtomicU64::new(0),
            status_updates_failed: AtomicU64::new(0),
            licenses_issued: AtomicU64::new(0),
            start_time: Instant::now(),
        }
    }

    pub fn connection_established(&self) {
        self.connections_total.fetch_add(1, Ordering::Relaxed);
        self.connections_active.fetch_add(1, Ordering::Relaxed);
    }

    pub fn connection_closed(&self) {
        self.connections_active.fetch_sub(1, Ordering::Relaxed);
    }

    pub fn command_dispatched(&self) {
        self.commands_dispatched.fetch_add(1, Ordering::Relaxed);
    }

    pub fn command_succeeded(&self) {
        self.commands_succeeded.fetch_add(1, Ordering::Relaxed);
    }

    pub fn command_failed(&self) {
        self.commands_failed.fetch_add(1, Ordering::Relaxed);
    }

    pub fn protocol_error(&self) {
        self.protocol_errors.fetch_add(1, Ordering::Relaxed);
    }

    pub fn notification_sent(&self) {
        self.notifications_sent.fetch_add(1, Ordering::Relaxed);
    }

    pub fn notification_failed(&self) {
        self.notifications_failed.fetch_add(1, Ordering::Relaxed);
    }

    pub fn status_update_failed(&self) {
        self.status_updates_failed.fetch_add(1, Ordering::Relaxed);
    }

    pub fn license_issued(&self) {
        self.licenses_issued.fetch_add(1, Ordering::Relaxed);
    }

    /// Get current metrics snapshot
    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            connections_total: self.connections_total.load(Ordering::Relaxed),
            connections_active: self.connections_active.load(Ordering::Relaxed),
            commands_dispatched: self.commands_dispatched.load(Ordering::Relaxed),
            commands_succeeded: self.commands_succeeded.load(Ordering::Relaxed),
            commands_failed: self.commands_failed.load(Ordering::Relaxed),
            protocol_errors: self.protocol_errors.load(Ordering::Relaxed),
            notifications_sent: self.notifications_sent.load(Ordering::Relaxed),
            notifications_failed: self.notifications_failed.load(Ordering::Relaxed),
            status_updates_failed: self.status_updates_failed.load(Ordering::Relaxed),
            licenses_issued: self.licenses_issued.load(Ordering::Relaxed),
            uptime_seconds: self.start_time.elapsed().as_secs(),
        }
    }

    /// Log current metrics
    pub fn log_metrics(&self) {
        let snapshot = self.snapshot();
        info!(
            connections_total = snapshot.connections_total,
            connections_active = snapshot.connections_active,
            commands_dispatched = snapshot.commands_dispatched,
            commands_succeeded = snapshot.commands_succeeded,
            commands_failed = snapshot.commands_failed,
            protocol_errors = snapshot.protocol_errors,
            notifications_sent = snapshot.notifications_sent,
            notifications_failed = snapshot.notifications_failed,
            status_updates_failed = snapshot.status_updates_failed,
            licenses_issued = snapshot.licenses_issued,
            uptime_seconds = snapshot.uptime_seconds,
            "License server metrics snapshot"
        );
    }
}

impl Default for Metrics {
    fn default() -> Self {
        Self::new()
    }
}

/// Snapshot of metrics at a point in time
#[derive(Debug, Clone)]
pub struct MetricsSnapshot {
    pub connections_total: u64,
    pub connections_active: u64,
    pub commands_dispatched: u64,
    pub commands_succeeded: u64,
    pub commands_failed: u64,
    pub protocol_errors: u64,
    pub notifications_sent: u64,
    pub notifications_failed: u64,
    pub status_updates_failed: u64,
    pub licenses_issued: u64,
    pub uptime_seconds: u64,
}

/// Timer for measuring operation duration
pub struct Timer {
    start: Instant,
    operation: &'static str,
}

impl Timer {
    /// Start timing an operation
    pub fn start(operation: &'static str) -> Self {
        Self {
            start: Instant::now(),
            operation,
        }
    }
}

impl Drop for Timer {
    fn drop(&mut self) {
        let duration = self.start.elapsed();
        debug!(
            operation = self.operation,
            duration_ms = duration.as_millis(),
            "Operation completed"
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_connection_counters() {
        let metrics = Metrics::new();
        metrics.connection_established();
        metrics.connection_established();
        metrics.connection_closed();

        let snapshot = metrics.snapshot();
        assert_eq!(snapshot.connections_total, 2);
        assert_eq!(snapshot.connections_active, 1);
    }

    #[test]
    fn test_command_outcomes() {
        let metrics = Metrics::new();
        metrics.command_dispatched();
        metrics.command_succeeded();
        metrics.command_dispatched();
        metrics.command_failed();
        metrics.protocol_error();

        let snapshot = metrics.snapshot();
        assert_eq!(snapshot.commands_dispatched, 2);
        assert_eq!(snapshot.commands_succeeded, 1);
        assert_eq!(snapshot.commands_failed, 1);
        assert_eq!(snapshot.protocol_errors, 1);
    }
}
