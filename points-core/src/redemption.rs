//! Redemption coordinator
//!
//! Turns points into a seat at an event. Each attempt runs strictly in order:
//!
//! ```text
//! CHECK_MEMBERSHIP -> CHECK_EVENT_STATUS -> CHECK_NOT_ALREADY_REGISTERED -> CHECK_BALANCE
//!   -> RESERVE_CAPACITY -> DEBIT_POINTS -> GENERATE_CODE -> CREATE_REGISTRATION -> DONE
//! ```
//!
//! The four checks have no side effects. From `RESERVE_CAPACITY` on, every failure (timeouts
//! included) is followed by one `rollback_redemption` for the attempt before the error is
//! returned: the slot hold is released and any debit is refunded with an `ADJUSTED` entry.
//! The attempt id doubles as the registration id, so the rollback can tell a finished
//! registration from an unfinished one and never undoes the former.

use crate::{
    actor::StoreHandle,
    capacity::CapacityTracker,
    codes::ReservationCodeGenerator,
    error::RedeemError,
    ledger::Ledger,
    metrics::Metrics,
    types::{
        AuthContext, Event, EventId, Points, Registration, RegistrationId, RegistrationStatus,
        ReservationCode, RollbackOutcome, RollbackRequest, SlotReservation, UserId,
    },
    Error,
};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Instant;

/// Redemption request body as received
#[derive(Debug, Deserialize)]
struct RawRedeemRequest {
    event_id: Option<String>,
}

/// Validated redemption request. The member comes from the [`AuthContext`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RedeemRequest {
    /// Event to register for
    pub event_id: EventId,
}

impl RedeemRequest {
    /// Request for `event_id`
    pub fn new(event_id: EventId) -> Self {
        Self { event_id }
    }

    /// Parse and validate a JSON body `{"event_id": "..."}`
    pub fn from_json(body: &str) -> Result<Self, RedeemError> {
        let raw: RawRedeemRequest = serde_json::from_str(body)
            .map_err(|e| RedeemError::InvalidRequest(format!("Malformed request body: {}", e)))?;

        let event_id = raw
            .event_id
            .map(|id| id.trim().to_string())
            .filter(|id| !id.is_empty())
            .ok_or_else(|| RedeemError::InvalidRequest("Event ID is required".to_string()))?;

        let event_id = EventId::parse(&event_id).ok_or_else(|| {
            RedeemError::InvalidRequest(format!("Event ID is malformed: {}", event_id))
        })?;

        Ok(Self { event_id })
    }
}

/// Successful redemption
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RedemptionReceipt {
    /// New registration
    pub registration_id: RegistrationId,
    /// Code the member shows at the door
    pub reservation_code: ReservationCode,
    /// Points debited
    pub points_spent: Points,
    /// Balance after the debit
    pub new_balance: Points,
}

/// Redemption coordinator
#[derive(Clone)]
pub struct RedemptionCoordinator {
    store: StoreHandle,
    ledger: Ledger,
    capacity: CapacityTracker,
    codes: Arc<ReservationCodeGenerator>,
    metrics: Metrics,
}

impl RedemptionCoordinator {
    /// Create coordinator
    pub fn new(
        store: StoreHandle,
        ledger: Ledger,
        capacity: CapacityTracker,
        codes: Arc<ReservationCodeGenerator>,
        metrics: Metrics,
    ) -> Self {
        Self {
            store,
            ledger,
            capacity,
            codes,
            metrics,
        }
    }

    /// Redeem points for a seat at `request.event_id`
    pub async fn redeem(
        &self,
        auth: &AuthContext,
        request: &RedeemRequest,
    ) -> Result<RedemptionReceipt, RedeemError> {
        let started = Instant::now();
        let result = self.run(auth, request.event_id).await;

        let outcome = match &result {
            Ok(_) => "success",
            Err(e) => e.outcome(),
        };
        self.metrics
            .record_redemption(outcome, started.elapsed().as_secs_f64());

        match &result {
            Ok(receipt) => tracing::info!(
                user_id = %auth.user_id,
                event_id = %request.event_id,
                registration_id = %receipt.registration_id,
                amount = receipt.points_spent,
                balance = receipt.new_balance,
                "Redemption completed"
            ),
            Err(e) if e.is_expected() => tracing::info!(
                user_id = %auth.user_id,
                event_id = %request.event_id,
                outcome,
                "Redemption rejected: {}",
                e
            ),
            Err(e) => tracing::error!(
                user_id = %auth.user_id,
                event_id = %request.event_id,
                outcome,
                error = %e,
                "Redemption failed"
            ),
        }

        result
    }

    async fn run(
        &self,
        auth: &AuthContext,
        event_id: EventId,
    ) -> Result<RedemptionReceipt, RedeemError> {
        let user_id = &auth.user_id;
        let reader = self.store.reader();

        // CHECK_MEMBERSHIP
        if !auth.membership_status.is_active() {
            return Err(RedeemError::MembershipRequired);
        }

        // CHECK_EVENT_STATUS
        let event = match reader.event(&event_id)? {
            Some(event) if event.accepts_registrations() => event,
            _ => return Err(RedeemError::EventNotAvailable(event_id)),
        };

        // CHECK_NOT_ALREADY_REGISTERED
        if reader.registration_for(user_id, &event_id)?.is_some() {
            return Err(RedeemError::AlreadyRegistered(event_id));
        }

        // CHECK_BALANCE
        let balance = self.ledger.get_balance(user_id)?;
        if balance < event.points_cost {
            return Err(RedeemError::InsufficientPoints {
                balance,
                required: event.points_cost,
            });
        }

        let attempt = RegistrationId::new();

        // RESERVE_CAPACITY
        let result = match self.capacity.try_reserve_slot(&event_id, &attempt).await {
            Ok(SlotReservation::Reserved) => self.complete(user_id, &event, attempt).await,
            Ok(SlotReservation::Full) => return Err(RedeemError::EventFull(event_id)),
            Ok(SlotReservation::NotFound) => return Err(RedeemError::EventNotAvailable(event_id)),
            // Effect unknown; a hold may exist
            Err(e) => Err(RedeemError::from(e)),
        };

        match result {
            Ok(receipt) => Ok(receipt),
            Err(cause) => {
                let outcome = self.compensate(user_id, &event, attempt, &cause).await;
                match outcome {
                    // The registration landed after all (a timed-out write that still applied)
                    Some(outcome) if outcome.already_committed => {
                        self.recover_receipt(user_id, attempt).ok_or(cause)
                    }
                    _ => Err(cause),
                }
            }
        }
    }

    /// DEBIT_POINTS, GENERATE_CODE and CREATE_REGISTRATION for a reserved slot
    async fn complete(
        &self,
        user_id: &UserId,
        event: &Event,
        attempt: RegistrationId,
    ) -> Result<RedemptionReceipt, RedeemError> {
        let cost = event.points_cost;

        // DEBIT_POINTS
        let new_balance = if cost > 0 {
            let description = format!("Event registration: {}", event.title);
            match self
                .ledger
                .debit(user_id, cost, &description, Some(attempt.to_string()))
                .await
            {
                Ok(account) => account.balance,
                Err(Error::InsufficientFunds { balance, .. }) => {
                    return Err(RedeemError::InsufficientPoints {
                        balance,
                        required: cost,
                    })
                }
                Err(e) => return Err(e.into()),
            }
        } else {
            self.ledger.get_balance(user_id)?
        };

        // GENERATE_CODE + CREATE_REGISTRATION
        let mut codes = self.codes.attempts();
        loop {
            let Some(reservation_code) = codes.next_unique(self.store.reader())? else {
                return Err(RedeemError::CodeGenerationExhausted {
                    attempts: codes.tried(),
                });
            };

            let registration = Registration {
                id: attempt,
                user_id: user_id.clone(),
                event_id: event.id,
                points_spent: cost,
                reservation_code: reservation_code.clone(),
                status: RegistrationStatus::Registered,
                registered_at: Utc::now(),
            };

            match self.store.insert_registration(registration).await {
                Ok(()) => {
                    return Ok(RedemptionReceipt {
                        registration_id: attempt,
                        reservation_code,
                        points_spent: cost,
                        new_balance,
                    })
                }
                Err(Error::DuplicateReservationCode(code)) => {
                    tracing::debug!(code = %code, "Reservation code taken at write time, retrying");
                }
                Err(Error::RegistrationConflict { .. }) => {
                    return Err(RedeemError::AlreadyRegistered(event.id))
                }
                Err(e) => return Err(e.into()),
            }
        }
    }

    /// Undo whatever the attempt did. Failures are logged for reconciliation, never returned.
    async fn compensate(
        &self,
        user_id: &UserId,
        event: &Event,
        attempt: RegistrationId,
        cause: &RedeemError,
    ) -> Option<RollbackOutcome> {
        let request = RollbackRequest {
            attempt,
            user_id: user_id.clone(),
            event_id: event.id,
            refund_description: format!("Refund: registration for {} not completed", event.title),
        };

        match self.store.rollback_redemption(request).await {
            Ok(outcome) => {
                self.metrics.record_compensation(true);
                if let Some(refund) = outcome.refunded {
                    self.metrics
                        .record_movement(i64::try_from(refund).unwrap_or(i64::MAX));
                }
                tracing::info!(
                    user_id = %user_id,
                    event_id = %event.id,
                    registration_id = %attempt,
                    slot_released = outcome.slot_released,
                    refunded = outcome.refunded.unwrap_or(0),
                    already_committed = outcome.already_committed,
                    cause = cause.outcome(),
                    "Redemption compensated"
                );
                Some(outcome)
            }
            Err(e) => {
                self.metrics.record_compensation(false);
                tracing::error!(
                    user_id = %user_id,
                    event_id = %event.id,
                    registration_id = %attempt,
                    amount = event.points_cost,
                    cause = %cause,
                    error = %e,
                    "Compensation failed, manual reconciliation required"
                );
                None
            }
        }
    }

    fn recover_receipt(
        &self,
        user_id: &UserId,
        attempt: RegistrationId,
    ) -> Option<RedemptionReceipt> {
        let registration = self.store.reader().registration(&attempt).ok().flatten()?;
        let new_balance = self.ledger.get_balance(user_id).ok()?;
        tracing::warn!(
            user_id = %user_id,
            registration_id = %attempt,
            "Registration committed after its request timed out"
        );
        Some(RedemptionReceipt {
            registration_id: registration.id,
            reservation_code: registration.reservation_code,
            points_spent: registration.points_spent,
            new_balance,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::actor::spawn_store_actor;
    use crate::config::{HistoryConfig, ReservationConfig, StoreConfig};
    use crate::storage::{contract, MemoryStore, Store};
    use crate::types::{
        AccountBalance, AdminAction, EntryKind, EventStatus, EventUpdate, LedgerEntry, Member,
        MembershipStatus, Posting,
    };
    use std::time::Duration;

    struct Fixture {
        store: Arc<MemoryStore>,
        coordinator: RedemptionCoordinator,
        metrics: Metrics,
    }

    fn fixture() -> Fixture {
        fixture_with(ReservationCodeGenerator::new(ReservationConfig::default()))
    }

    fn fixture_with(codes: ReservationCodeGenerator) -> Fixture {
        let store = Arc::new(MemoryStore::new());
        let handle = spawn_store_actor(store.clone(), &StoreConfig::default());
        let metrics = Metrics::new().unwrap();
        let ledger = Ledger::new(handle.clone(), metrics.clone(), HistoryConfig::default());
        let coordinator = RedemptionCoordinator::new(
            handle.clone(),
            ledger,
            CapacityTracker::new(handle),
            Arc::new(codes),
            metrics.clone(),
        );
        Fixture {
            store,
            coordinator,
            metrics,
        }
    }

    /// Which write the backend sits on past the request timeout
    #[derive(Clone, Copy, PartialEq, Eq)]
    enum Stall {
        Debit,
        Registration,
    }

    const STALL_TIMEOUT_MS: u64 = 200;
    const STALL: Duration = Duration::from_millis(300);

    /// Backend whose stalled write still commits, just after the caller gave up
    struct StallingStore {
        inner: Arc<MemoryStore>,
        stall: Stall,
    }

    impl Store for StallingStore {
        fn open_account(&self, user_id: &UserId) -> crate::Result<AccountBalance> {
            self.inner.open_account(user_id)
        }
        fn account(&self, user_id: &UserId) -> crate::Result<Option<AccountBalance>> {
            self.inner.account(user_id)
        }
        fn post_entry(&self, posting: Posting) -> crate::Result<AccountBalance> {
            if self.stall == Stall::Debit && posting.entry.kind == EntryKind::Spent {
                std::thread::sleep(STALL);
            }
            self.inner.post_entry(posting)
        }
        fn entries(&self, user_id: &UserId, limit: Option<usize>) -> crate::Result<Vec<LedgerEntry>> {
            self.inner.entries(user_id, limit)
        }
        fn rollback_redemption(&self, request: &RollbackRequest) -> crate::Result<RollbackOutcome> {
            self.inner.rollback_redemption(request)
        }
        fn insert_event(&self, event: &Event, audit: Option<AdminAction>) -> crate::Result<()> {
            self.inner.insert_event(event, audit)
        }
        fn event(&self, event_id: &EventId) -> crate::Result<Option<Event>> {
            self.inner.event(event_id)
        }
        fn events(&self) -> crate::Result<Vec<Event>> {
            self.inner.events()
        }
        fn update_event(
            &self,
            event_id: &EventId,
            update: &EventUpdate,
            audit: Option<AdminAction>,
        ) -> crate::Result<Event> {
            self.inner.update_event(event_id, update, audit)
        }
        fn delete_event(&self, event_id: &EventId, audit: Option<AdminAction>) -> crate::Result<Event> {
            self.inner.delete_event(event_id, audit)
        }
        fn try_reserve_slot(
            &self,
            event_id: &EventId,
            attempt: &RegistrationId,
        ) -> crate::Result<SlotReservation> {
            self.inner.try_reserve_slot(event_id, attempt)
        }
        fn release_slot(&self, event_id: &EventId, attempt: &RegistrationId) -> crate::Result<bool> {
            self.inner.release_slot(event_id, attempt)
        }
        fn open_holds(&self, event_id: &EventId) -> crate::Result<usize> {
            self.inner.open_holds(event_id)
        }
        fn insert_registration(&self, registration: &Registration) -> crate::Result<()> {
            if self.stall == Stall::Registration {
                std::thread::sleep(STALL);
            }
            self.inner.insert_registration(registration)
        }
        fn registration(&self, id: &RegistrationId) -> crate::Result<Option<Registration>> {
            self.inner.registration(id)
        }
        fn registration_for(
            &self,
            user_id: &UserId,
            event_id: &EventId,
        ) -> crate::Result<Option<Registration>> {
            self.inner.registration_for(user_id, event_id)
        }
        fn registrations_for_user(&self, user_id: &UserId) -> crate::Result<Vec<Registration>> {
            self.inner.registrations_for_user(user_id)
        }
        fn registrations_for_event(&self, event_id: &EventId) -> crate::Result<Vec<Registration>> {
            self.inner.registrations_for_event(event_id)
        }
        fn code_exists(&self, code: &ReservationCode) -> crate::Result<bool> {
            self.inner.code_exists(code)
        }
        fn set_member_status(
            &self,
            user_id: &UserId,
            status: MembershipStatus,
        ) -> crate::Result<Member> {
            self.inner.set_member_status(user_id, status)
        }
        fn member(&self, user_id: &UserId) -> crate::Result<Option<Member>> {
            self.inner.member(user_id)
        }
        fn admin_actions(&self, limit: usize) -> crate::Result<Vec<AdminAction>> {
            self.inner.admin_actions(limit)
        }
    }

    fn stalling_fixture(stall: Stall) -> Fixture {
        let store = Arc::new(MemoryStore::new());
        let backend = Arc::new(StallingStore {
            inner: store.clone(),
            stall,
        });
        let config = StoreConfig {
            request_timeout_ms: STALL_TIMEOUT_MS,
            ..StoreConfig::default()
        };
        let handle = spawn_store_actor(backend, &config);
        let metrics = Metrics::new().unwrap();
        let ledger = Ledger::new(handle.clone(), metrics.clone(), HistoryConfig::default());
        let coordinator = RedemptionCoordinator::new(
            handle.clone(),
            ledger,
            CapacityTracker::new(handle),
            Arc::new(ReservationCodeGenerator::new(ReservationConfig::default())),
            metrics.clone(),
        );
        Fixture {
            store,
            coordinator,
            metrics,
        }
    }

    fn member(name: &str) -> AuthContext {
        AuthContext::member(UserId::new(name), MembershipStatus::ActiveMember)
    }

    async fn fund(fx: &Fixture, name: &str, amount: u64) {
        fx.coordinator
            .ledger
            .credit(&UserId::new(name), amount, "Monthly subscription", None)
            .await
            .unwrap();
    }

    #[test]
    fn test_request_from_json() {
        let id = EventId::new();
        let request = RedeemRequest::from_json(&format!(r#"{{"event_id":"{}"}}"#, id)).unwrap();
        assert_eq!(request.event_id, id);

        for body in [r#"{}"#, r#"{"event_id":""}"#, r#"{"event_id":"nope"}"#, "not json"] {
            assert!(matches!(
                RedeemRequest::from_json(body),
                Err(RedeemError::InvalidRequest(_))
            ));
        }
    }

    #[tokio::test]
    async fn test_membership_required() {
        let fx = fixture();
        let event = contract::event(5, 10);
        fx.store.insert_event(&event, None).unwrap();

        let guest = AuthContext::member(UserId::new("guest"), MembershipStatus::Guest);
        let err = fx
            .coordinator
            .redeem(&guest, &RedeemRequest::new(event.id))
            .await
            .unwrap_err();
        assert!(matches!(err, RedeemError::MembershipRequired));
        assert_eq!(err.message(), "Active membership required");
    }

    #[tokio::test]
    async fn test_event_must_be_upcoming() {
        let fx = fixture();
        let mut event = contract::event(5, 10);
        event.status = EventStatus::Completed;
        fx.store.insert_event(&event, None).unwrap();
        fund(&fx, "alice", 100).await;

        for event_id in [event.id, EventId::new()] {
            let err = fx
                .coordinator
                .redeem(&member("alice"), &RedeemRequest::new(event_id))
                .await
                .unwrap_err();
            assert!(matches!(err, RedeemError::EventNotAvailable(_)));
        }
    }

    #[tokio::test]
    async fn test_successful_redemption() {
        let fx = fixture();
        let event = contract::event(3, 40);
        fx.store.insert_event(&event, None).unwrap();
        fund(&fx, "bob", 100).await;

        let receipt = fx
            .coordinator
            .redeem(&member("bob"), &RedeemRequest::new(event.id))
            .await
            .unwrap();
        assert_eq!(receipt.points_spent, 40);
        assert_eq!(receipt.new_balance, 60);
        assert!(receipt.reservation_code.as_str().starts_with("RES-"));

        let registration = fx.store.registration(&receipt.registration_id).unwrap().unwrap();
        assert_eq!(registration.reservation_code, receipt.reservation_code);
        assert_eq!(fx.store.event(&event.id).unwrap().unwrap().current_attendees, 1);
        assert_eq!(fx.store.open_holds(&event.id).unwrap(), 0);

        let entries = fx.store.entries(&UserId::new("bob"), None).unwrap();
        assert_eq!(entries[0].description, "Event registration: Members Night");
        assert_eq!(
            entries[0].reference_id.as_deref(),
            Some(receipt.registration_id.to_string().as_str())
        );
        assert_eq!(
            fx.metrics
                .redemptions_total
                .with_label_values(&["success"])
                .get(),
            1
        );
    }

    #[tokio::test]
    async fn test_free_event_skips_debit() {
        let fx = fixture();
        let event = contract::event(3, 0);
        fx.store.insert_event(&event, None).unwrap();

        let receipt = fx
            .coordinator
            .redeem(&member("carol"), &RedeemRequest::new(event.id))
            .await
            .unwrap();
        assert_eq!(receipt.points_spent, 0);
        assert_eq!(receipt.new_balance, 0);
        assert!(fx.store.entries(&UserId::new("carol"), None).unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_event_full() {
        let fx = fixture();
        let event = contract::event(1, 0);
        fx.store.insert_event(&event, None).unwrap();

        fx.coordinator
            .redeem(&member("dave"), &RedeemRequest::new(event.id))
            .await
            .unwrap();
        let err = fx
            .coordinator
            .redeem(&member("erin"), &RedeemRequest::new(event.id))
            .await
            .unwrap_err();
        assert!(matches!(err, RedeemError::EventFull(_)));
        assert!(err.is_expected());
    }

    #[tokio::test]
    async fn test_code_exhaustion_is_compensated() {
        let config = ReservationConfig {
            max_attempts: 1,
            fallback_attempts: 0,
            ..ReservationConfig::default()
        };
        let fx = fixture_with(ReservationCodeGenerator::with_seed(config.clone(), 7));

        // Occupy the only code the coordinator's generator will offer
        let taken = ReservationCodeGenerator::with_seed(config, 7).candidate(8);
        let other = contract::event(1, 0);
        fx.store.insert_event(&other, None).unwrap();
        let id = RegistrationId::new();
        fx.store.try_reserve_slot(&other.id, &id).unwrap();
        let mut holder = contract::registration(id, &UserId::new("holder"), &other.id, "RES-0");
        holder.reservation_code = taken;
        fx.store.insert_registration(&holder).unwrap();

        let event = contract::event(2, 25);
        fx.store.insert_event(&event, None).unwrap();
        fund(&fx, "frank", 100).await;

        let err = fx
            .coordinator
            .redeem(&member("frank"), &RedeemRequest::new(event.id))
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            RedeemError::CodeGenerationExhausted { attempts: 1 }
        ));

        let frank = UserId::new("frank");
        let account = fx.store.account(&frank).unwrap().unwrap();
        assert_eq!(account.balance, 100);
        assert!(account.is_consistent());
        assert_eq!(fx.store.event(&event.id).unwrap().unwrap().current_attendees, 0);
        assert_eq!(fx.store.open_holds(&event.id).unwrap(), 0);
        assert!(fx.store.registration_for(&frank, &event.id).unwrap().is_none());
        assert_eq!(fx.metrics.compensations_total.get(), 1);
        assert_eq!(fx.metrics.compensation_failures_total.get(), 0);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_timed_out_debit_is_compensated() {
        let fx = stalling_fixture(Stall::Debit);
        let event = contract::event(1, 40);
        fx.store.insert_event(&event, None).unwrap();
        fund(&fx, "nora", 100).await;

        let err = fx
            .coordinator
            .redeem(&member("nora"), &RedeemRequest::new(event.id))
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            RedeemError::Storage(Error::Timeout(STALL_TIMEOUT_MS))
        ));

        // The debit landed after the timeout; the rollback queued behind it refunded it
        let nora = UserId::new("nora");
        let account = fx.store.account(&nora).unwrap().unwrap();
        assert_eq!(account.balance, 100);
        assert!(account.is_consistent());
        let entries = fx.store.entries(&nora, None).unwrap();
        assert_eq!(entries.len(), 3);
        assert_eq!(entries[0].kind, EntryKind::Adjusted);
        assert_eq!(entries[0].amount, 40);

        assert_eq!(fx.store.event(&event.id).unwrap().unwrap().current_attendees, 0);
        assert_eq!(fx.store.open_holds(&event.id).unwrap(), 0);
        assert!(fx.store.registration_for(&nora, &event.id).unwrap().is_none());
        assert_eq!(fx.metrics.compensations_total.get(), 1);
        assert_eq!(fx.metrics.compensation_failures_total.get(), 0);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_registration_committed_after_timeout_is_reported() {
        let fx = stalling_fixture(Stall::Registration);
        let event = contract::event(1, 40);
        fx.store.insert_event(&event, None).unwrap();
        fund(&fx, "omar", 100).await;

        let receipt = fx
            .coordinator
            .redeem(&member("omar"), &RedeemRequest::new(event.id))
            .await
            .unwrap();
        assert_eq!(receipt.points_spent, 40);
        assert_eq!(receipt.new_balance, 60);

        let omar = UserId::new("omar");
        let registration = fx.store.registration_for(&omar, &event.id).unwrap().unwrap();
        assert_eq!(registration.id, receipt.registration_id);
        assert_eq!(registration.reservation_code, receipt.reservation_code);
        assert_eq!(fx.store.account(&omar).unwrap().unwrap().balance, 60);
        assert_eq!(fx.store.event(&event.id).unwrap().unwrap().current_attendees, 1);
        assert_eq!(fx.store.open_holds(&event.id).unwrap(), 0);
        assert_eq!(fx.store.registrations_for_event(&event.id).unwrap().len(), 1);
    }
}
