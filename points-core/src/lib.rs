//! Membership Points Core
//!
//! Points ledger and event-capacity reservations for a membership club.
//!
//! # Architecture
//!
//! - **Single Writer**: every mutation goes through one store actor; reads go straight to
//!   the store
//! - **Atomic conditional writes**: each check-and-mutate is one storage operation
//! - **Saga with compensation**: a redemption that fails after reserving a slot releases it
//!   and refunds its debit
//!
//! # Invariants
//!
//! - Non-negative balances: no entry is ever accepted that takes a balance below zero
//! - Conservation: a balance equals the sum of its entries
//! - Deterministic replay: the same entries always give the same balance
//! - Capacity: `current_attendees <= max_attendees`, and it equals registrations plus
//!   in-flight holds
//! - One registration per `(user, event)`; reservation codes are unique

#![forbid(unsafe_code)]
#![warn(missing_docs, rust_2018_idioms, clippy::all)]

pub mod actor;
pub mod admin;
pub mod capacity;
pub mod codes;
pub mod config;
pub mod error;
pub mod events;
pub mod ledger;
pub mod membership;
pub mod metrics;
pub mod redemption;
pub mod service;
pub mod storage;
pub mod types;

// Re-exports
pub use admin::{AdjustPointsRequest, AdjustPointsResponse, AdminService};
pub use capacity::{Availability, CapacityTracker};
pub use codes::ReservationCodeGenerator;
pub use config::Config;
pub use error::{Error, RedeemError, Result};
pub use events::{EventCatalog, EventListing, NewEvent};
pub use ledger::Ledger;
pub use membership::{MembershipService, SubscriptionGrant};
pub use redemption::{RedeemRequest, RedemptionCoordinator, RedemptionReceipt};
pub use service::PointsCore;
pub use types::{
    AccountBalance, AdminAction, AdminActionKind, AdminTarget, AuthContext, EntryKind, Event,
    EventId, EventStatus, EventUpdate, LedgerEntry, MembershipStatus, Points, Registration,
    RegistrationId, ReservationCode, Role, UserId,
};
