//! # Audit Events
//!
//! Structured events emitted after every committed ledger write.
//!
//! The audit sink itself is a collaborator owned by the surrounding
//! application (activity-log persistence is out of scope); this module
//! defines the event shape and the seam it is delivered through.
//! medstock-db ships a tracing-backed default sink.

use serde::{Deserialize, Serialize};
use serde_json::json;

use crate::allocator::AllocationLine;
use crate::types::Actor;

// =============================================================================
// Audit Event
// =============================================================================

/// A structured log event for one committed ledger operation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuditEvent {
    /// Event discriminator: "purchase_recorded" or "sale_recorded".
    pub event_type: String,
    /// Staff member who performed the operation.
    pub staff_id: String,
    /// Login account the operation ran under.
    pub user_id: String,
    /// Structured event detail.
    pub payload: serde_json::Value,
}

impl AuditEvent {
    /// Event emitted after a purchase commits.
    pub fn purchase_recorded(
        actor: &Actor,
        medicine_id: &str,
        batch_id: &str,
        quantity: i64,
        invoice_number: &str,
    ) -> Self {
        AuditEvent {
            event_type: "purchase_recorded".to_string(),
            staff_id: actor.staff_id.clone(),
            user_id: actor.user_id.clone(),
            payload: json!({
                "medicine_id": medicine_id,
                "batch_id": batch_id,
                "quantity": quantity,
                "invoice_number": invoice_number,
            }),
        }
    }

    /// Event emitted after a sale commits, carrying the batch-level
    /// allocation for traceability.
    pub fn sale_recorded(
        actor: &Actor,
        sale_id: &str,
        patient_id: &str,
        medicine_id: &str,
        quantity: i64,
        allocations: &[AllocationLine],
    ) -> Self {
        let lines: Vec<serde_json::Value> = allocations
            .iter()
            .map(|line| {
                json!({
                    "batch_id": line.batch_id,
                    "quantity_taken": line.quantity_taken,
                    "unit_cost_cents": line.unit_cost_cents,
                })
            })
            .collect();

        AuditEvent {
            event_type: "sale_recorded".to_string(),
            staff_id: actor.staff_id.clone(),
            user_id: actor.user_id.clone(),
            payload: json!({
                "sale_id": sale_id,
                "patient_id": patient_id,
                "medicine_id": medicine_id,
                "quantity": quantity,
                "allocations": lines,
            }),
        }
    }
}

// =============================================================================
// Audit Sink
// =============================================================================

/// Where committed-operation events are delivered.
///
/// Implementations must be cheap and infallible from the ledger's
/// point of view: the write has already committed by the time the
/// event is emitted, so a sink that needs durability has to buffer
/// internally rather than fail the operation.
pub trait AuditSink: Send + Sync {
    fn record(&self, event: AuditEvent);
}

/// Sink that drops every event. Useful for tests and tooling that
/// does not care about the audit trail.
#[derive(Debug, Clone, Copy, Default)]
pub struct NullAuditSink;

impl AuditSink for NullAuditSink {
    fn record(&self, _event: AuditEvent) {}
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_purchase_event_payload() {
        let actor = Actor::new("staff-1", "user-1");
        let event = AuditEvent::purchase_recorded(&actor, "med-1", "batch-1", 100, "INV-7");

        assert_eq!(event.event_type, "purchase_recorded");
        assert_eq!(event.staff_id, "staff-1");
        assert_eq!(event.payload["quantity"], 100);
        assert_eq!(event.payload["invoice_number"], "INV-7");
    }

    #[test]
    fn test_sale_event_carries_allocations() {
        let actor = Actor::new("staff-1", "user-1");
        let lines = vec![
            AllocationLine {
                batch_id: "a".to_string(),
                quantity_taken: 10,
                unit_cost_cents: 500,
            },
            AllocationLine {
                batch_id: "b".to_string(),
                quantity_taken: 5,
                unit_cost_cents: 600,
            },
        ];
        let event = AuditEvent::sale_recorded(&actor, "sale-1", "pat-1", "med-1", 15, &lines);

        assert_eq!(event.event_type, "sale_recorded");
        let allocations = event.payload["allocations"].as_array().unwrap();
        assert_eq!(allocations.len(), 2);
        assert_eq!(allocations[0]["batch_id"], "a");
        assert_eq!(allocations[1]["quantity_taken"], 5);
    }
}
