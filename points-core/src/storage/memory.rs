//! In-memory store
//!
//! Same contract as the RocksDB store. One mutex guards every table, so each trait method is
//! a single atomic step.

use std::collections::{HashMap, HashSet};

use chrono::Utc;
use parking_lot::Mutex;

use super::{sort_newest_first, Store};
use crate::{
    error::{Error, Result},
    types::{
        AccountBalance, AdminAction, EntryKind, Event, EventId, EventUpdate, LedgerEntry, Member,
        MembershipStatus, Points, Posting, Registration, RegistrationId, ReservationCode,
        RollbackOutcome, RollbackRequest, SlotReservation, UserId,
    },
};

#[derive(Default)]
struct Tables {
    balances: HashMap<UserId, AccountBalance>,
    /// Per-user entries in commit order
    entries: HashMap<UserId, Vec<LedgerEntry>>,
    events: HashMap<EventId, Event>,
    registrations: HashMap<RegistrationId, Registration>,
    by_user_event: HashMap<(UserId, EventId), RegistrationId>,
    by_code: HashMap<ReservationCode, RegistrationId>,
    holds: HashSet<(EventId, RegistrationId)>,
    spent_refs: HashMap<(UserId, String), Points>,
    admin_log: Vec<AdminAction>,
    members: HashMap<UserId, Member>,
}

impl Tables {
    fn apply(&mut self, posting: Posting) -> Result<AccountBalance> {
        let Posting { entry, audit } = posting;

        let mut account = self
            .balances
            .get(&entry.user_id)
            .cloned()
            .unwrap_or_else(|| AccountBalance::empty(entry.user_id.clone(), entry.created_at));
        account.apply(&entry)?;

        if entry.kind == EntryKind::Spent {
            if let Some(reference) = &entry.reference_id {
                *self
                    .spent_refs
                    .entry((entry.user_id.clone(), reference.clone()))
                    .or_insert(0) += entry.amount.unsigned_abs();
            }
        }
        if let Some(mut audit) = audit {
            audit.resulting_balance = account.balance;
            self.admin_log.push(audit);
        }

        self.balances.insert(account.user_id.clone(), account.clone());
        self.entries
            .entry(entry.user_id.clone())
            .or_default()
            .push(entry);

        Ok(account)
    }

    fn release(&mut self, event_id: &EventId, attempt: &RegistrationId) -> bool {
        if !self.holds.remove(&(*event_id, *attempt)) {
            return false;
        }
        if let Some(event) = self.events.get_mut(event_id) {
            event.current_attendees = event.current_attendees.saturating_sub(1);
        }
        true
    }
}

/// In-memory [`Store`]
#[derive(Default)]
pub struct MemoryStore {
    tables: Mutex<Tables>,
}

impl MemoryStore {
    /// Empty store
    pub fn new() -> Self {
        Self::default()
    }
}

impl Store for MemoryStore {
    fn open_account(&self, user_id: &UserId) -> Result<AccountBalance> {
        let mut tables = self.tables.lock();
        let account = tables
            .balances
            .entry(user_id.clone())
            .or_insert_with(|| AccountBalance::empty(user_id.clone(), Utc::now()));
        Ok(account.clone())
    }

    fn account(&self, user_id: &UserId) -> Result<Option<AccountBalance>> {
        Ok(self.tables.lock().balances.get(user_id).cloned())
    }

    fn post_entry(&self, posting: Posting) -> Result<AccountBalance> {
        self.tables.lock().apply(posting)
    }

    fn entries(&self, user_id: &UserId, limit: Option<usize>) -> Result<Vec<LedgerEntry>> {
        let tables = self.tables.lock();
        let entries = tables
            .entries
            .get(user_id)
            .map(|entries| {
                entries
                    .iter()
                    .rev()
                    .take(limit.unwrap_or(usize::MAX))
                    .cloned()
                    .collect()
            })
            .unwrap_or_default();
        Ok(entries)
    }

    fn rollback_redemption(&self, request: &RollbackRequest) -> Result<RollbackOutcome> {
        let mut tables = self.tables.lock();

        if tables.registrations.contains_key(&request.attempt) {
            return Ok(RollbackOutcome {
                already_committed: true,
                ..RollbackOutcome::default()
            });
        }

        let mut outcome = RollbackOutcome::default();

        let reference = request.attempt.to_string();
        let spent_key = (request.user_id.clone(), reference.clone());
        if let Some(amount) = tables.spent_refs.get(&spent_key).copied() {
            let refund = LedgerEntry::adjusted(
                request.user_id.clone(),
                i64::try_from(amount)
                    .map_err(|_| Error::InvariantViolation("refund overflow".to_string()))?,
                request.refund_description.clone(),
                Some(reference),
            );
            tables.apply(Posting {
                entry: refund,
                audit: None,
            })?;
            tables.spent_refs.remove(&spent_key);
            outcome.refunded = Some(amount);
        }
        outcome.slot_released = tables.release(&request.event_id, &request.attempt);

        Ok(outcome)
    }

    fn insert_event(&self, event: &Event, audit: Option<AdminAction>) -> Result<()> {
        let mut tables = self.tables.lock();
        if tables.events.contains_key(&event.id) {
            return Err(Error::EventExists(event.id));
        }
        tables.events.insert(event.id, event.clone());
        tables.admin_log.extend(audit);
        Ok(())
    }

    fn event(&self, event_id: &EventId) -> Result<Option<Event>> {
        Ok(self.tables.lock().events.get(event_id).cloned())
    }

    fn events(&self) -> Result<Vec<Event>> {
        let mut events: Vec<Event> = self.tables.lock().events.values().cloned().collect();
        events.sort_by(|a, b| a.event_date.cmp(&b.event_date).then_with(|| a.id.cmp(&b.id)));
        Ok(events)
    }

    fn update_event(
        &self,
        event_id: &EventId,
        update: &EventUpdate,
        audit: Option<AdminAction>,
    ) -> Result<Event> {
        let mut tables = self.tables.lock();
        let event = tables
            .events
            .get_mut(event_id)
            .ok_or(Error::EventNotFound(*event_id))?;

        let mut updated = event.clone();
        update.apply(&mut updated)?;
        *event = updated.clone();
        tables.admin_log.extend(audit);
        Ok(updated)
    }

    fn delete_event(&self, event_id: &EventId, audit: Option<AdminAction>) -> Result<Event> {
        let mut tables = self.tables.lock();
        if !tables.events.contains_key(event_id) {
            return Err(Error::EventNotFound(*event_id));
        }

        let registrations = tables
            .registrations
            .values()
            .filter(|r| &r.event_id == event_id)
            .count();
        let holds = tables.holds.iter().filter(|(id, _)| id == event_id).count();
        if registrations > 0 || holds > 0 {
            return Err(Error::EventInUse {
                event_id: *event_id,
                registrations,
                holds,
            });
        }

        let event = tables
            .events
            .remove(event_id)
            .ok_or(Error::EventNotFound(*event_id))?;
        tables.admin_log.extend(audit);
        Ok(event)
    }

    fn try_reserve_slot(
        &self,
        event_id: &EventId,
        attempt: &RegistrationId,
    ) -> Result<SlotReservation> {
        let mut tables = self.tables.lock();
        if tables.holds.contains(&(*event_id, *attempt)) {
            return Ok(SlotReservation::Reserved);
        }
        let Some(event) = tables.events.get_mut(event_id) else {
            return Ok(SlotReservation::NotFound);
        };
        if !event.has_open_slot() {
            return Ok(SlotReservation::Full);
        }
        event.current_attendees += 1;
        tables.holds.insert((*event_id, *attempt));
        Ok(SlotReservation::Reserved)
    }

    fn release_slot(&self, event_id: &EventId, attempt: &RegistrationId) -> Result<bool> {
        Ok(self.tables.lock().release(event_id, attempt))
    }

    fn open_holds(&self, event_id: &EventId) -> Result<usize> {
        let tables = self.tables.lock();
        Ok(tables.holds.iter().filter(|(id, _)| id == event_id).count())
    }

    fn insert_registration(&self, registration: &Registration) -> Result<()> {
        let mut tables = self.tables.lock();
        let pair = (registration.user_id.clone(), registration.event_id);

        if tables.by_user_event.contains_key(&pair) {
            return Err(Error::RegistrationConflict {
                user_id: registration.user_id.clone(),
                event_id: registration.event_id,
            });
        }
        if tables.by_code.contains_key(&registration.reservation_code) {
            return Err(Error::DuplicateReservationCode(
                registration.reservation_code.clone(),
            ));
        }
        if !tables
            .holds
            .remove(&(registration.event_id, registration.id))
        {
            return Err(Error::HoldNotFound {
                event_id: registration.event_id,
                attempt: registration.id.to_string(),
            });
        }

        tables.by_user_event.insert(pair, registration.id);
        tables
            .by_code
            .insert(registration.reservation_code.clone(), registration.id);
        tables
            .registrations
            .insert(registration.id, registration.clone());
        Ok(())
    }

    fn registration(&self, id: &RegistrationId) -> Result<Option<Registration>> {
        Ok(self.tables.lock().registrations.get(id).cloned())
    }

    fn registration_for(
        &self,
        user_id: &UserId,
        event_id: &EventId,
    ) -> Result<Option<Registration>> {
        let tables = self.tables.lock();
        Ok(tables
            .by_user_event
            .get(&(user_id.clone(), *event_id))
            .and_then(|id| tables.registrations.get(id))
            .cloned())
    }

    fn registrations_for_user(&self, user_id: &UserId) -> Result<Vec<Registration>> {
        let mut registrations: Vec<Registration> = self
            .tables
            .lock()
            .registrations
            .values()
            .filter(|r| &r.user_id == user_id)
            .cloned()
            .collect();
        sort_newest_first(&mut registrations);
        Ok(registrations)
    }

    fn registrations_for_event(&self, event_id: &EventId) -> Result<Vec<Registration>> {
        let mut registrations: Vec<Registration> = self
            .tables
            .lock()
            .registrations
            .values()
            .filter(|r| &r.event_id == event_id)
            .cloned()
            .collect();
        sort_newest_first(&mut registrations);
        Ok(registrations)
    }

    fn code_exists(&self, code: &ReservationCode) -> Result<bool> {
        Ok(self.tables.lock().by_code.contains_key(code))
    }

    fn set_member_status(&self, user_id: &UserId, status: MembershipStatus) -> Result<Member> {
        let member = Member {
            user_id: user_id.clone(),
            status,
            updated_at: Utc::now(),
        };
        self.tables
            .lock()
            .members
            .insert(user_id.clone(), member.clone());
        Ok(member)
    }

    fn member(&self, user_id: &UserId) -> Result<Option<Member>> {
        Ok(self.tables.lock().members.get(user_id).cloned())
    }

    fn admin_actions(&self, limit: usize) -> Result<Vec<AdminAction>> {
        Ok(self
            .tables
            .lock()
            .admin_log
            .iter()
            .rev()
            .take(limit)
            .cloned()
            .collect())
    }
}
