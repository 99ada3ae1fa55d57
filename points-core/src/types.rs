//! Core types for the points ledger
//!
//! All persisted types are designed for:
//! - Deterministic serialization (bincode)
//! - Integer arithmetic (points are whole units, never fractional)
//! - Time-ordered identifiers (UUIDv7) so keys sort by creation time

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

use crate::error::{Error, Result};

/// Point quantity. Balances and costs are never negative.
pub type Points = u64;

/// User identifier, as issued by the authentication collaborator
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct UserId(String);

impl UserId {
    /// Create new user ID
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Get as string
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Length-prefixed key bytes, safe to use as a composite key prefix
    pub(crate) fn key_prefix(&self) -> Vec<u8> {
        let bytes = self.0.as_bytes();
        let mut key = Vec::with_capacity(bytes.len() + 4);
        key.extend_from_slice(&(bytes.len() as u32).to_be_bytes());
        key.extend_from_slice(bytes);
        key
    }
}

impl fmt::Display for UserId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

macro_rules! uuid_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        pub struct $name(Uuid);

        impl $name {
            /// Mint a new time-ordered identifier
            pub fn new() -> Self {
                Self(Uuid::now_v7())
            }

            /// Wrap an existing UUID
            pub fn from_uuid(id: Uuid) -> Self {
                Self(id)
            }

            /// Parse from the canonical hyphenated form
            pub fn parse(s: &str) -> Option<Self> {
                Uuid::parse_str(s).ok().map(Self)
            }

            /// Underlying UUID
            pub fn as_uuid(&self) -> &Uuid {
                &self.0
            }

            /// Key bytes (16 bytes, big-endian, sortable by creation time)
            pub fn as_bytes(&self) -> &[u8; 16] {
                self.0.as_bytes()
            }
        }

        impl Default for $name {
            fn default() -> Self {
                Self::new()
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }
    };
}

uuid_id!(
    /// Event identifier
    EventId
);

uuid_id!(
    /// Registration identifier. Also used as the redemption attempt id, so slot holds and
    /// debits made on behalf of an attempt can be found and compensated by it.
    RegistrationId
);

/// Kind of a ledger movement
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(u8)]
pub enum EntryKind {
    /// Points added (subscription payments, bonuses)
    Earned = 1,
    /// Points redeemed
    Spent = 2,
    /// Manual correction or compensating refund
    Adjusted = 3,
}

impl EntryKind {
    /// Stable name used in exports and logs
    pub fn as_str(&self) -> &'static str {
        match self {
            EntryKind::Earned => "EARNED",
            EntryKind::Spent => "SPENT",
            EntryKind::Adjusted => "ADJUSTED",
        }
    }
}

impl fmt::Display for EntryKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Immutable, append-only record of a point movement
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LedgerEntry {
    /// Unique entry ID (UUIDv7 for time-ordering)
    pub entry_id: Uuid,

    /// Owner of the balance this entry moved
    pub user_id: UserId,

    /// Signed amount: positive adds to the balance, negative removes from it
    pub amount: i64,

    /// Movement kind
    pub kind: EntryKind,

    /// Human-readable description
    pub description: String,

    /// Optional link to the thing that caused the movement (subscription, registration, admin)
    pub reference_id: Option<String>,

    /// Creation timestamp
    pub created_at: DateTime<Utc>,
}

impl LedgerEntry {
    fn new(
        user_id: UserId,
        amount: i64,
        kind: EntryKind,
        description: impl Into<String>,
        reference_id: Option<String>,
    ) -> Self {
        Self {
            entry_id: Uuid::now_v7(),
            user_id,
            amount,
            kind,
            description: description.into(),
            reference_id,
            created_at: Utc::now(),
        }
    }

    /// Entry crediting `amount` points
    pub fn earned(
        user_id: UserId,
        amount: Points,
        description: impl Into<String>,
        reference_id: Option<String>,
    ) -> Result<Self> {
        let amount = signed(amount)?;
        Ok(Self::new(user_id, amount, EntryKind::Earned, description, reference_id))
    }

    /// Entry spending `amount` points (stored as a negative amount)
    pub fn spent(
        user_id: UserId,
        amount: Points,
        description: impl Into<String>,
        reference_id: Option<String>,
    ) -> Result<Self> {
        let amount = signed(amount)?;
        Ok(Self::new(user_id, -amount, EntryKind::Spent, description, reference_id))
    }

    /// Signed manual adjustment
    pub fn adjusted(
        user_id: UserId,
        amount: i64,
        description: impl Into<String>,
        reference_id: Option<String>,
    ) -> Self {
        Self::new(user_id, amount, EntryKind::Adjusted, description, reference_id)
    }
}

fn signed(amount: Points) -> Result<i64> {
    i64::try_from(amount)
        .map_err(|_| Error::InvalidAmount(format!("{} exceeds the largest ledger amount", amount)))
}

/// Per-user balance (derived from ledger entries, persisted for fast reads)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccountBalance {
    /// Owner
    pub user_id: UserId,

    /// Spendable points
    pub balance: Points,

    /// Sum of all positive movements
    pub total_earned: Points,

    /// Sum of all negative movements
    pub total_spent: Points,

    /// Last mutation timestamp
    pub last_updated: DateTime<Utc>,
}

impl AccountBalance {
    /// Zero balance (also the answer for users that never had an account row)
    pub fn empty(user_id: UserId, at: DateTime<Utc>) -> Self {
        Self {
            user_id,
            balance: 0,
            total_earned: 0,
            total_spent: 0,
            last_updated: at,
        }
    }

    /// Apply entry to derive the new balance.
    ///
    /// Rejects any entry that would drive the balance below zero; on error `self` is untouched.
    pub fn apply(&mut self, entry: &LedgerEntry) -> Result<()> {
        if entry.user_id != self.user_id {
            return Err(Error::InvalidInput(
                "Entry user_id does not match account".to_string(),
            ));
        }

        let magnitude = entry.amount.unsigned_abs();
        let sign_ok = match entry.kind {
            EntryKind::Earned => entry.amount > 0,
            EntryKind::Spent => entry.amount < 0,
            EntryKind::Adjusted => entry.amount != 0,
        };
        if !sign_ok {
            return Err(Error::InvalidAmount(format!(
                "{} entry cannot carry amount {}",
                entry.kind, entry.amount
            )));
        }

        let balance = if entry.amount > 0 {
            self.balance
                .checked_add(magnitude)
                .ok_or_else(|| Error::InvariantViolation("balance overflow".to_string()))?
        } else {
            if self.balance < magnitude {
                return Err(Error::InsufficientFunds {
                    user_id: self.user_id.clone(),
                    balance: self.balance,
                    requested: magnitude,
                });
            }
            self.balance - magnitude
        };

        if entry.amount > 0 {
            self.total_earned = self.total_earned.saturating_add(magnitude);
        } else {
            self.total_spent = self.total_spent.saturating_add(magnitude);
        }
        self.balance = balance;
        self.last_updated = entry.created_at;

        Ok(())
    }

    /// `balance == total_earned - total_spent`
    pub fn is_consistent(&self) -> bool {
        self.total_earned.checked_sub(self.total_spent) == Some(self.balance)
    }
}

/// Event lifecycle status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(u8)]
pub enum EventStatus {
    /// Open for registration
    Upcoming = 1,
    /// In progress
    Ongoing = 2,
    /// Finished
    Completed = 3,
    /// Called off
    Cancelled = 4,
}

impl EventStatus {
    /// Stable name
    pub fn as_str(&self) -> &'static str {
        match self {
            EventStatus::Upcoming => "UPCOMING",
            EventStatus::Ongoing => "ONGOING",
            EventStatus::Completed => "COMPLETED",
            EventStatus::Cancelled => "CANCELLED",
        }
    }
}

/// Point-redeemable event
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Event {
    /// Event ID
    pub id: EventId,

    /// Title shown to members
    pub title: String,

    /// Longer description
    pub description: Option<String>,

    /// Venue
    pub location: Option<String>,

    /// When the event takes place
    pub event_date: DateTime<Utc>,

    /// Price in points
    pub points_cost: Points,

    /// Capacity, always positive
    pub max_attendees: u32,

    /// Reserved slots, never above `max_attendees`
    pub current_attendees: u32,

    /// Lifecycle status
    pub status: EventStatus,

    /// Created timestamp
    pub created_at: DateTime<Utc>,
}

impl Event {
    /// Slots still open
    pub fn remaining(&self) -> u32 {
        self.max_attendees.saturating_sub(self.current_attendees)
    }

    /// Whether one more attendee fits
    pub fn has_open_slot(&self) -> bool {
        self.current_attendees < self.max_attendees
    }

    /// Only upcoming events accept registrations
    pub fn accepts_registrations(&self) -> bool {
        self.status == EventStatus::Upcoming
    }
}

/// Back-office edit of an event. Unset fields are left alone; the attendee count is not
/// editable.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventUpdate {
    /// New title
    #[serde(default)]
    pub title: Option<String>,
    /// New description
    #[serde(default)]
    pub description: Option<String>,
    /// New venue
    #[serde(default)]
    pub location: Option<String>,
    /// New date
    #[serde(default)]
    pub event_date: Option<DateTime<Utc>>,
    /// New price
    #[serde(default)]
    pub points_cost: Option<Points>,
    /// New capacity, never below the slots already taken
    #[serde(default)]
    pub max_attendees: Option<u32>,
    /// New lifecycle status
    #[serde(default)]
    pub status: Option<EventStatus>,
}

impl EventUpdate {
    /// Status change only
    pub fn status(status: EventStatus) -> Self {
        Self {
            status: Some(status),
            ..Self::default()
        }
    }

    /// Names of the fields this update sets
    pub fn changed_fields(&self) -> Vec<&'static str> {
        [
            ("title", self.title.is_some()),
            ("description", self.description.is_some()),
            ("location", self.location.is_some()),
            ("event_date", self.event_date.is_some()),
            ("points_cost", self.points_cost.is_some()),
            ("max_attendees", self.max_attendees.is_some()),
            ("status", self.status.is_some()),
        ]
        .into_iter()
        .filter_map(|(name, set)| set.then_some(name))
        .collect()
    }

    /// Checks that need no stored state
    pub fn validate(&self) -> Result<()> {
        if self.changed_fields().is_empty() {
            return Err(Error::InvalidInput("no fields to update".to_string()));
        }
        if self.title.as_deref().is_some_and(|t| t.trim().is_empty()) {
            return Err(Error::InvalidInput("title is required".to_string()));
        }
        if self.max_attendees == Some(0) {
            return Err(Error::InvalidInput(
                "max_attendees must be positive".to_string(),
            ));
        }
        Ok(())
    }

    /// Apply to `event`. Nothing changes if any check fails.
    pub fn apply(&self, event: &mut Event) -> Result<()> {
        self.validate()?;
        if let Some(max_attendees) = self.max_attendees {
            if max_attendees < event.current_attendees {
                return Err(Error::CapacityBelowAttendees {
                    event_id: event.id,
                    max_attendees,
                    current_attendees: event.current_attendees,
                });
            }
            event.max_attendees = max_attendees;
        }
        if let Some(title) = &self.title {
            event.title = title.trim().to_string();
        }
        if let Some(description) = &self.description {
            event.description = Some(description.clone());
        }
        if let Some(location) = &self.location {
            event.location = Some(location.clone());
        }
        if let Some(event_date) = self.event_date {
            event.event_date = event_date;
        }
        if let Some(points_cost) = self.points_cost {
            event.points_cost = points_cost;
        }
        if let Some(status) = self.status {
            event.status = status;
        }
        Ok(())
    }
}

/// Registration status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(u8)]
pub enum RegistrationStatus {
    /// Seat held
    Registered = 1,
    /// Member showed up
    Attended = 2,
    /// Registration withdrawn
    Cancelled = 3,
}

/// Human-typable reservation code of the shape `PREFIX-XXXXXXXX`
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ReservationCode(String);

impl ReservationCode {
    /// Code alphabet
    pub const ALPHABET: &'static [u8; 36] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZ0123456789";

    /// Parse a code typed by a person. Case-insensitive; normalised to uppercase.
    pub fn parse(s: &str) -> Option<Self> {
        let normalised = s.trim().to_ascii_uppercase();
        let (prefix, body) = normalised.split_once('-')?;
        if prefix.is_empty() || body.is_empty() {
            return None;
        }
        let valid = |part: &str| part.bytes().all(|b| Self::ALPHABET.contains(&b));
        if !valid(prefix) || !valid(body) {
            return None;
        }
        Some(Self(normalised))
    }

    pub(crate) fn from_parts(prefix: &str, body: &str) -> Self {
        Self(format!("{}-{}", prefix, body))
    }

    /// Get as string
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Characters after the prefix separator
    pub fn body(&self) -> &str {
        self.0.split_once('-').map(|(_, body)| body).unwrap_or("")
    }
}

impl fmt::Display for ReservationCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// One member's seat at one event
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Registration {
    /// Registration ID
    pub id: RegistrationId,

    /// Member
    pub user_id: UserId,

    /// Event
    pub event_id: EventId,

    /// Points debited for this seat
    pub points_spent: Points,

    /// Unique code, immutable once assigned
    pub reservation_code: ReservationCode,

    /// Status
    pub status: RegistrationStatus,

    /// Created timestamp
    pub registered_at: DateTime<Utc>,
}

/// Result of a capacity compare-and-increment
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SlotReservation {
    /// Slot taken; a hold now exists for the attempt
    Reserved,
    /// No slot left
    Full,
    /// Unknown event
    NotFound,
}

/// Membership status, flipped by the billing collaborator
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(u8)]
pub enum MembershipStatus {
    /// Signed up, subscription not yet confirmed
    Pending = 1,
    /// Paying member
    ActiveMember = 2,
    /// Disabled
    Inactive = 3,
    /// Registered user without a subscription
    Guest = 4,
}

impl MembershipStatus {
    /// Whether the member may redeem points
    pub fn is_active(&self) -> bool {
        matches!(self, MembershipStatus::ActiveMember)
    }
}

/// Caller role
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Role {
    /// Regular user
    User,
    /// Back-office operator
    Admin,
    /// Operator with every permission
    SuperAdmin,
}

impl Role {
    /// Parse the role claim. The identity provider emits mixed spellings (`admin`, `ADMIN`).
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "user" | "USER" => Some(Role::User),
            "admin" | "ADMIN" => Some(Role::Admin),
            "SUPER_ADMIN" | "super_admin" => Some(Role::SuperAdmin),
            _ => None,
        }
    }

    /// Whether the role may use back-office operations
    pub fn is_admin(&self) -> bool {
        matches!(self, Role::Admin | Role::SuperAdmin)
    }
}

/// Identity handed to the core per request. Trusted as-is.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthContext {
    /// Caller
    pub user_id: UserId,
    /// Role claim
    pub role: Role,
    /// Membership claim
    pub membership_status: MembershipStatus,
}

impl AuthContext {
    /// Regular member context
    pub fn member(user_id: UserId, membership_status: MembershipStatus) -> Self {
        Self {
            user_id,
            role: Role::User,
            membership_status,
        }
    }

    /// Admin context
    pub fn admin(user_id: UserId) -> Self {
        Self {
            user_id,
            role: Role::Admin,
            membership_status: MembershipStatus::ActiveMember,
        }
    }

    /// `Forbidden` unless the caller holds an admin role
    pub fn require_admin(&self) -> Result<()> {
        if self.role.is_admin() {
            Ok(())
        } else {
            Err(Error::Forbidden("admin role required".to_string()))
        }
    }
}

/// Persisted membership record
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Member {
    /// Member
    pub user_id: UserId,
    /// Current status
    pub status: MembershipStatus,
    /// Last change
    pub updated_at: DateTime<Utc>,
}

/// Back-office action kinds
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AdminActionKind {
    /// Manual point adjustment
    AdjustPoints,
    /// Event published
    CreateEvent,
    /// Event fields or status changed
    UpdateEvent,
    /// Event removed
    DeleteEvent,
}

impl AdminActionKind {
    /// Stable name
    pub fn as_str(&self) -> &'static str {
        match self {
            AdminActionKind::AdjustPoints => "ADJUST_POINTS",
            AdminActionKind::CreateEvent => "CREATE_EVENT",
            AdminActionKind::UpdateEvent => "UPDATE_EVENT",
            AdminActionKind::DeleteEvent => "DELETE_EVENT",
        }
    }
}

/// What a back-office action touched
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum AdminTarget {
    /// A member's account
    User(UserId),
    /// An event
    Event(EventId),
}

/// Append-only audit record of a back-office action
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AdminAction {
    /// Record ID (UUIDv7)
    pub id: Uuid,
    /// Operator
    pub admin_id: UserId,
    /// Action
    pub action: AdminActionKind,
    /// Affected account or event
    pub target: AdminTarget,
    /// Signed amount applied; 0 for event actions
    pub amount: i64,
    /// Operator-supplied reason, or a summary of the change
    pub reason: String,
    /// Balance after the action. Filled in by the store in the same write as the entry.
    pub resulting_balance: Points,
    /// Created timestamp
    pub created_at: DateTime<Utc>,
}

impl AdminAction {
    /// Audit record of an event change
    pub fn for_event(
        admin_id: UserId,
        action: AdminActionKind,
        event_id: EventId,
        reason: impl Into<String>,
    ) -> Self {
        Self {
            id: Uuid::now_v7(),
            admin_id,
            action,
            target: AdminTarget::Event(event_id),
            amount: 0,
            reason: reason.into(),
            resulting_balance: 0,
            created_at: Utc::now(),
        }
    }

    /// Affected member, for point actions
    pub fn target_user(&self) -> Option<&UserId> {
        match &self.target {
            AdminTarget::User(user_id) => Some(user_id),
            AdminTarget::Event(_) => None,
        }
    }
}

/// Ledger mutation submitted to the store
#[derive(Debug, Clone)]
pub struct Posting {
    /// Entry to append
    pub entry: LedgerEntry,
    /// Audit record committed together with the entry
    pub audit: Option<AdminAction>,
}

/// Compensation for a redemption attempt that did not complete
#[derive(Debug, Clone)]
pub struct RollbackRequest {
    /// Attempt (and would-be registration) ID
    pub attempt: RegistrationId,
    /// Member
    pub user_id: UserId,
    /// Event
    pub event_id: EventId,
    /// Description of the refund entry, if one is needed
    pub refund_description: String,
}

/// What a rollback actually undid
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct RollbackOutcome {
    /// The registration exists; nothing was undone
    pub already_committed: bool,
    /// A slot hold was released
    pub slot_released: bool,
    /// Points returned to the member
    pub refunded: Option<Points>,
}
