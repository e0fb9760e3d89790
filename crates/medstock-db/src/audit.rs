//! # Audit Sinks
//!
//! Concrete [`AuditSink`] implementations for the storage layer.
//!
//! The ledger's contract is "emit one structured event per committed
//! purchase or sale". Persisting the activity log belongs to the
//! surrounding application; the default sink here forwards events to
//! `tracing` so they land wherever the host's subscriber routes them.

use medstock_core::{AuditEvent, AuditSink};
use tracing::info;

/// Default sink: structured tracing events.
///
/// Fields mirror [`AuditEvent`], so an env-filter on
/// `medstock_db::audit` captures the full ledger trail.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingAuditSink;

impl AuditSink for TracingAuditSink {
    fn record(&self, event: AuditEvent) {
        info!(
            event_type = %event.event_type,
            staff_id = %event.staff_id,
            user_id = %event.user_id,
            payload = %event.payload,
            "ledger audit event"
        );
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
