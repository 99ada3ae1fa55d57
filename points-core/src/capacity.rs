//! Event capacity tracking
//!
//! `current_attendees <= max_attendees` is guarded by the store's compare-and-increment.
//! Each successful reservation leaves a hold keyed by the redemption attempt; the hold is
//! consumed when the registration is written, or released on compensation.

use crate::{
    actor::StoreHandle,
    types::{EventId, RegistrationId, SlotReservation},
    Result,
};

/// Seats left on an event
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Availability {
    /// Capacity
    pub max_attendees: u32,
    /// Reserved seats (registrations plus in-flight holds)
    pub current_attendees: u32,
    /// Seats still open
    pub remaining: u32,
}

/// Capacity tracker
#[derive(Clone)]
pub struct CapacityTracker {
    store: StoreHandle,
}

impl CapacityTracker {
    /// Create tracker over a store handle
    pub fn new(store: StoreHandle) -> Self {
        Self { store }
    }

    /// Take one slot for `attempt` if any is open.
    ///
    /// Exactly one of several concurrent callers racing for the last slot gets `Reserved`.
    pub async fn try_reserve_slot(
        &self,
        event_id: &EventId,
        attempt: &RegistrationId,
    ) -> Result<SlotReservation> {
        let outcome = self.store.try_reserve_slot(*event_id, *attempt).await?;
        tracing::debug!(event_id = %event_id, attempt = %attempt, ?outcome, "Slot reservation");
        Ok(outcome)
    }

    /// Give back the slot held by `attempt` (floor 0). Returns whether a hold existed.
    pub async fn release_slot(&self, event_id: &EventId, attempt: &RegistrationId) -> Result<bool> {
        let released = self.store.release_slot(*event_id, *attempt).await?;
        if released {
            tracing::debug!(event_id = %event_id, attempt = %attempt, "Slot released");
        }
        Ok(released)
    }

    /// Current counters, `None` for unknown events
    pub fn availability(&self, event_id: &EventId) -> Result<Option<Availability>> {
        Ok(self
            .store
            .reader()
            .event(event_id)?
            .map(|event| Availability {
                max_attendees: event.max_attendees,
                current_attendees: event.current_attendees,
                remaining: event.remaining(),
            }))
    }
}
