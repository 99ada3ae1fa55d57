//! Storage layer
//!
//! [`Store`] is the repository every component is built on. Each mutation it exposes is one
//! atomic conditional operation: the check and the write commit together or not at all, so no
//! caller ever performs read-modify-write across two storage calls.
//!
//! Uniqueness is enforced here, not by callers:
//!
//! - one registration per `(user, event)`
//! - one registration per reservation code
//! - one slot hold per `(event, attempt)`
//!
//! Two implementations share the contract: [`RocksStore`] (persistent) and [`MemoryStore`]
//! (tests, local development).

use crate::{
    error::Result,
    types::{
        AccountBalance, AdminAction, Event, EventId, EventUpdate, LedgerEntry, Member,
        MembershipStatus, Posting, Registration, RegistrationId, ReservationCode,
        RollbackOutcome, RollbackRequest, SlotReservation, UserId,
    },
};

mod memory;
mod rocks;

pub use memory::MemoryStore;
pub use rocks::{RocksStore, StorageStats};

/// Repository for balances, ledger entries, events, registrations and membership
pub trait Store: Send + Sync {
    // Ledger

    /// Create a zero balance if none exists; return the current row either way
    fn open_account(&self, user_id: &UserId) -> Result<AccountBalance>;

    /// Balance row, `None` if the user never had one
    fn account(&self, user_id: &UserId) -> Result<Option<AccountBalance>>;

    /// Append an entry and apply it to the balance (atomic).
    ///
    /// Fails with `InsufficientFunds` and writes nothing if the balance would go negative.
    /// `SPENT` entries with a reference are remembered so [`Store::rollback_redemption`] can
    /// refund them. An audit record, if present, is written in the same batch.
    fn post_entry(&self, posting: Posting) -> Result<AccountBalance>;

    /// Entries for a user, newest first
    fn entries(&self, user_id: &UserId, limit: Option<usize>) -> Result<Vec<LedgerEntry>>;

    /// Undo the effects of an unfinished redemption attempt (atomic, idempotent).
    ///
    /// No-op if the attempt's registration exists. Otherwise releases its slot hold and
    /// refunds its recorded spend, whichever of the two happened.
    fn rollback_redemption(&self, request: &RollbackRequest) -> Result<RollbackOutcome>;

    // Events

    /// Insert a new event; fails with `EventExists` on a duplicate ID. An audit record, if
    /// present, is written in the same batch.
    fn insert_event(&self, event: &Event, audit: Option<AdminAction>) -> Result<()>;

    /// Event by ID
    fn event(&self, event_id: &EventId) -> Result<Option<Event>>;

    /// All events, ordered by event date
    fn events(&self) -> Result<Vec<Event>>;

    /// Apply an edit to an event (atomic). Never touches `current_attendees`.
    ///
    /// Fails with `CapacityBelowAttendees` if the new capacity is below the slots already taken.
    fn update_event(
        &self,
        event_id: &EventId,
        update: &EventUpdate,
        audit: Option<AdminAction>,
    ) -> Result<Event>;

    /// Remove an event that nobody holds a slot for (atomic).
    ///
    /// Fails with `EventInUse` while registrations or holds reference it.
    fn delete_event(&self, event_id: &EventId, audit: Option<AdminAction>) -> Result<Event>;

    /// Compare-and-increment `current_attendees` and record a hold for the attempt.
    ///
    /// Repeating the call for an attempt that already holds a slot returns `Reserved`
    /// without taking a second slot.
    fn try_reserve_slot(
        &self,
        event_id: &EventId,
        attempt: &RegistrationId,
    ) -> Result<SlotReservation>;

    /// Drop the attempt's hold and decrement (floor 0). Returns whether a hold existed.
    fn release_slot(&self, event_id: &EventId, attempt: &RegistrationId) -> Result<bool>;

    /// Holds not yet converted into registrations
    fn open_holds(&self, event_id: &EventId) -> Result<usize>;

    // Registrations

    /// Insert a registration, consuming the hold for `registration.id`.
    ///
    /// Fails with `RegistrationConflict`, `DuplicateReservationCode` or `HoldNotFound`.
    fn insert_registration(&self, registration: &Registration) -> Result<()>;

    /// Registration by ID
    fn registration(&self, id: &RegistrationId) -> Result<Option<Registration>>;

    /// Registration for a `(user, event)` pair
    fn registration_for(
        &self,
        user_id: &UserId,
        event_id: &EventId,
    ) -> Result<Option<Registration>>;

    /// A user's registrations, newest first
    fn registrations_for_user(&self, user_id: &UserId) -> Result<Vec<Registration>>;

    /// An event's registrations, newest first
    fn registrations_for_event(&self, event_id: &EventId) -> Result<Vec<Registration>>;

    /// Whether a code is already assigned
    fn code_exists(&self, code: &ReservationCode) -> Result<bool>;

    // Membership and audit

    /// Upsert a member's status
    fn set_member_status(&self, user_id: &UserId, status: MembershipStatus) -> Result<Member>;

    /// Member by user ID
    fn member(&self, user_id: &UserId) -> Result<Option<Member>>;

    /// Admin audit log, newest first
    fn admin_actions(&self, limit: usize) -> Result<Vec<AdminAction>>;
}

/// Newest-first ordering for registration listings
pub(crate) fn sort_newest_first(registrations: &mut [Registration]) {
    registrations.sort_by(|a, b| {
        b.registered_at
            .cmp(&a.registered_at)
            .then_with(|| b.id.cmp(&a.id))
    });
}
