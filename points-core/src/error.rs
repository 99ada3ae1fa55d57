//! Error types for the points core

use thiserror::Error;

use crate::types::{EventId, Points, ReservationCode, UserId};

/// Result type for storage and ledger operations
pub type Result<T> = std::result::Result<T, Error>;

/// Storage and ledger errors
#[derive(Error, Debug)]
pub enum Error {
    /// Storage error (RocksDB)
    #[error("Storage error: {0}")]
    Storage(String),

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] bincode::Error),

    /// Amount is zero, has the wrong sign, or overflows
    #[error("Invalid amount: {0}")]
    InvalidAmount(String),

    /// Malformed request
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Debit larger than the balance
    #[error("Insufficient funds for {user_id}: balance {balance}, requested {requested}")]
    InsufficientFunds {
        /// Account owner
        user_id: UserId,
        /// Balance at the time of the attempt
        balance: Points,
        /// Amount that was requested
        requested: Points,
    },

    /// Event not found
    #[error("Event not found: {0}")]
    EventNotFound(EventId),

    /// Event already exists
    #[error("Event already exists: {0}")]
    EventExists(EventId),

    /// Capacity change below the slots already taken
    #[error(
        "Event {event_id} has {current_attendees} attendees; capacity cannot drop to {max_attendees}"
    )]
    CapacityBelowAttendees {
        /// Event
        event_id: EventId,
        /// Requested capacity
        max_attendees: u32,
        /// Slots taken
        current_attendees: u32,
    },

    /// Event still referenced by registrations or slot holds
    #[error("Event {event_id} has {registrations} registrations and {holds} pending holds")]
    EventInUse {
        /// Event
        event_id: EventId,
        /// Registrations for the event
        registrations: usize,
        /// Holds not yet converted
        holds: usize,
    },

    /// Unique (user, event) constraint violated
    #[error("User {user_id} is already registered for event {event_id}")]
    RegistrationConflict {
        /// Member
        user_id: UserId,
        /// Event
        event_id: EventId,
    },

    /// Unique reservation code constraint violated
    #[error("Reservation code already assigned: {0}")]
    DuplicateReservationCode(ReservationCode),

    /// Registration written without a matching slot hold
    #[error("No slot hold for attempt {attempt} on event {event_id}")]
    HoldNotFound {
        /// Event
        event_id: EventId,
        /// Attempt ID
        attempt: String,
    },

    /// Caller lacks the role the operation needs
    #[error("Forbidden: {0}")]
    Forbidden(String),

    /// Invariant violation (negative balance, overbooking, etc.)
    #[error("Invariant violation: {0}")]
    InvariantViolation(String),

    /// Concurrency error (actor mailbox closed, etc.)
    #[error("Concurrency error: {0}")]
    Concurrency(String),

    /// Storage request did not complete in time. Its effect is unknown.
    #[error("Storage request timed out after {0} ms")]
    Timeout(u64),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<rocksdb::Error> for Error {
    fn from(err: rocksdb::Error) -> Self {
        Error::Storage(err.to_string())
    }
}

/// Typed failure of a redemption attempt
#[derive(Error, Debug)]
pub enum RedeemError {
    /// Caller has no active membership
    #[error("Active membership required")]
    MembershipRequired,

    /// Event missing or not open for registration
    #[error("Event {0} is not available for registration")]
    EventNotAvailable(EventId),

    /// Caller already holds a registration for the event
    #[error("Already registered for event {0}")]
    AlreadyRegistered(EventId),

    /// Balance below the event price
    #[error("Insufficient points: balance {balance}, required {required}")]
    InsufficientPoints {
        /// Balance when the attempt was rejected
        balance: Points,
        /// Event price
        required: Points,
    },

    /// No slot left
    #[error("Event {0} is at full capacity")]
    EventFull(EventId),

    /// No unique code found within the attempt budget
    #[error("Could not generate a unique reservation code after {attempts} attempts")]
    CodeGenerationExhausted {
        /// Candidates tried
        attempts: u32,
    },

    /// Request failed boundary validation
    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    /// Unexpected storage failure
    #[error(transparent)]
    Storage(#[from] Error),
}

impl RedeemError {
    /// Stable message for display to the member
    pub fn message(&self) -> &'static str {
        match self {
            RedeemError::MembershipRequired => "Active membership required",
            RedeemError::EventNotAvailable(_) => "Event is not available for registration",
            RedeemError::AlreadyRegistered(_) => "You are already registered for this event",
            RedeemError::InsufficientPoints { .. } => "Insufficient points",
            RedeemError::EventFull(_) => "Event is at full capacity",
            RedeemError::CodeGenerationExhausted { .. } => {
                "Could not issue a reservation code, please try again"
            }
            RedeemError::InvalidRequest(_) => "Invalid request",
            RedeemError::Storage(_) => "Internal server error",
        }
    }

    /// Routine outcomes that should not page anyone
    pub fn is_expected(&self) -> bool {
        !matches!(
            self,
            RedeemError::Storage(_) | RedeemError::CodeGenerationExhausted { .. }
        )
    }

    /// Short label for metrics
    pub fn outcome(&self) -> &'static str {
        match self {
            RedeemError::MembershipRequired => "membership_required",
            RedeemError::EventNotAvailable(_) => "event_not_available",
            RedeemError::AlreadyRegistered(_) => "already_registered",
            RedeemError::InsufficientPoints { .. } => "insufficient_points",
            RedeemError::EventFull(_) => "event_full",
            RedeemError::CodeGenerationExhausted { .. } => "code_generation_exhausted",
            RedeemError::InvalidRequest(_) => "invalid_request",
            RedeemError::Storage(_) => "storage_error",
        }
    }
}
