//! Storage layer using RocksDB
//!
//! # Column Families
//!
//! - `balances` - Per-user balance rows (key: user)
//! - `entries` - Append-only ledger (key: user || commit sequence || entry_id)
//! - `events` - Events with their attendee counters (key: event_id)
//! - `registrations` - Registrations (key: registration_id)
//! - `indices` - Unique and secondary indices for registrations
//! - `holds` - Slot holds not yet converted into registrations (key: event_id || attempt)
//! - `spent_refs` - Spend recorded per redemption attempt (key: user || reference)
//! - `admin_log` - Admin audit trail (key: commit sequence || action_id)
//! - `members` - Membership status (key: user)
//!
//! Every mutation takes the write lock, reads what it needs to check, and commits one
//! `WriteBatch`. Reads go straight to the DB.
//!
//! Ledger and audit keys carry a commit sequence rather than a timestamp, so iteration order
//! is commit order and replaying a user's entries in key order never overdraws.

use crate::{
    config::Config,
    error::{Error, Result},
    types::{
        AccountBalance, AdminAction, EntryKind, Event, EventId, EventUpdate, LedgerEntry, Member,
        MembershipStatus, Points, Posting, Registration, RegistrationId, ReservationCode,
        RollbackOutcome, RollbackRequest, SlotReservation, UserId,
    },
};
use chrono::Utc;
use parking_lot::Mutex;
use rocksdb::{
    ColumnFamily, ColumnFamilyDescriptor, DBCompactionStyle, Direction, IteratorMode, Options,
    WriteBatch, WriteOptions, DB,
};
use serde::de::DeserializeOwned;
use std::sync::Arc;

use super::{sort_newest_first, Store};

/// Column family names
const CF_BALANCES: &str = "balances";
const CF_ENTRIES: &str = "entries";
const CF_EVENTS: &str = "events";
const CF_REGISTRATIONS: &str = "registrations";
const CF_INDICES: &str = "indices";
const CF_HOLDS: &str = "holds";
const CF_SPENT_REFS: &str = "spent_refs";
const CF_ADMIN_LOG: &str = "admin_log";
const CF_MEMBERS: &str = "members";

const COLUMN_FAMILIES: [&str; 9] = [
    CF_BALANCES,
    CF_ENTRIES,
    CF_EVENTS,
    CF_REGISTRATIONS,
    CF_INDICES,
    CF_HOLDS,
    CF_SPENT_REFS,
    CF_ADMIN_LOG,
    CF_MEMBERS,
];

/// Index prefixes in `indices`
const IDX_USER_EVENT: &[u8] = b"ue";
const IDX_CODE: &[u8] = b"cd";
const IDX_USER_REG: &[u8] = b"ur";
const IDX_EVENT_REG: &[u8] = b"er";

/// Last commit sequence, in `indices`
const SEQUENCE_KEY: &[u8] = b"sq";

/// Persistent [`Store`] backed by RocksDB
pub struct RocksStore {
    db: Arc<DB>,
    sync_writes: bool,
    /// Serializes mutations; holds the last commit sequence handed out
    write_lock: Mutex<u64>,
}

impl RocksStore {
    /// Open or create database
    pub fn open(config: &Config) -> Result<Self> {
        let path = &config.data_dir;

        std::fs::create_dir_all(path)?;

        let mut db_opts = Options::default();
        db_opts.create_if_missing(true);
        db_opts.create_missing_column_families(true);

        db_opts.set_write_buffer_size(config.rocksdb.write_buffer_size_mb * 1024 * 1024);
        db_opts.set_max_write_buffer_number(config.rocksdb.max_write_buffer_number);
        db_opts.set_max_background_jobs(config.rocksdb.max_background_jobs);
        db_opts.set_compaction_style(DBCompactionStyle::Level);

        if config.rocksdb.enable_statistics {
            db_opts.enable_statistics();
        }

        let cf_descriptors: Vec<_> = COLUMN_FAMILIES
            .iter()
            .map(|name| ColumnFamilyDescriptor::new(*name, Self::cf_options(name)))
            .collect();

        let db = DB::open_cf_descriptors(&db_opts, path, cf_descriptors)?;

        tracing::info!(
            "Opened RocksDB at {:?} with {} column families",
            path,
            COLUMN_FAMILIES
                .iter()
                .filter(|name| db.cf_handle(name).is_some())
                .count()
        );

        let mut store = Self {
            db: Arc::new(db),
            sync_writes: config.rocksdb.sync_writes,
            write_lock: Mutex::new(0),
        };
        let sequence: u64 = store.get(CF_INDICES, SEQUENCE_KEY)?.unwrap_or(0);
        *store.write_lock.get_mut() = sequence;

        Ok(store)
    }

    fn cf_options(name: &str) -> Options {
        let mut opts = Options::default();
        match name {
            // Append-only and rarely read back
            CF_ENTRIES | CF_ADMIN_LOG => {
                opts.set_compression_type(rocksdb::DBCompressionType::Zstd);
            }
            // Point lookups on every redemption
            CF_INDICES | CF_HOLDS | CF_SPENT_REFS => {
                opts.set_compression_type(rocksdb::DBCompressionType::Lz4);
                let mut block_opts = rocksdb::BlockBasedOptions::default();
                block_opts.set_bloom_filter(10.0, false);
                opts.set_block_based_table_factory(&block_opts);
            }
            _ => {
                opts.set_compression_type(rocksdb::DBCompressionType::Lz4);
            }
        }
        opts
    }

    fn cf_handle(&self, name: &str) -> Result<&ColumnFamily> {
        self.db
            .cf_handle(name)
            .ok_or_else(|| Error::Storage(format!("Column family {} not found", name)))
    }

    fn get<T: DeserializeOwned>(&self, cf: &str, key: &[u8]) -> Result<Option<T>> {
        let cf = self.cf_handle(cf)?;
        match self.db.get_cf(cf, key)? {
            Some(value) => Ok(Some(bincode::deserialize(&value)?)),
            None => Ok(None),
        }
    }

    fn exists(&self, cf: &str, key: &[u8]) -> Result<bool> {
        let cf = self.cf_handle(cf)?;
        Ok(self.db.get_pinned_cf(cf, key)?.is_some())
    }

    /// Keys under `prefix`, ascending
    fn scan_prefix(&self, cf: &str, prefix: &[u8]) -> Result<Vec<(Box<[u8]>, Box<[u8]>)>> {
        let cf = self.cf_handle(cf)?;
        let mut items = Vec::new();
        for item in self
            .db
            .iterator_cf(cf, IteratorMode::From(prefix, Direction::Forward))
        {
            let (key, value) = item?;
            if !key.starts_with(prefix) {
                break;
            }
            items.push((key, value));
        }
        Ok(items)
    }

    fn commit(&self, batch: WriteBatch) -> Result<()> {
        let mut write_opts = WriteOptions::default();
        write_opts.set_sync(self.sync_writes);
        self.db.write_opt(batch, &write_opts)?;
        Ok(())
    }

    // Staging helpers. Callers hold the write lock.

    fn stage_posting(
        &self,
        batch: &mut WriteBatch,
        sequence: &mut u64,
        posting: Posting,
    ) -> Result<AccountBalance> {
        let Posting { entry, audit } = posting;
        let user_key = entry.user_id.key_prefix();

        let mut account = self
            .get::<AccountBalance>(CF_BALANCES, &user_key)?
            .unwrap_or_else(|| AccountBalance::empty(entry.user_id.clone(), entry.created_at));
        account.apply(&entry)?;

        let seq = self.next_sequence(batch, sequence)?;
        batch.put_cf(
            self.cf_handle(CF_BALANCES)?,
            &user_key,
            bincode::serialize(&account)?,
        );
        batch.put_cf(
            self.cf_handle(CF_ENTRIES)?,
            Self::entry_key(&entry, seq),
            bincode::serialize(&entry)?,
        );

        if entry.kind == EntryKind::Spent {
            if let Some(reference) = &entry.reference_id {
                let key = Self::spent_ref_key(&entry.user_id, reference);
                let spent: Points = self.get(CF_SPENT_REFS, &key)?.unwrap_or(0);
                let total = spent.saturating_add(entry.amount.unsigned_abs());
                batch.put_cf(
                    self.cf_handle(CF_SPENT_REFS)?,
                    &key,
                    bincode::serialize(&total)?,
                );
            }
        }

        if let Some(mut audit) = audit {
            audit.resulting_balance = account.balance;
            self.stage_audit(batch, seq, &audit)?;
        }

        Ok(account)
    }

    /// Hand out the next commit sequence and persist it with the batch
    fn next_sequence(&self, batch: &mut WriteBatch, sequence: &mut u64) -> Result<u64> {
        *sequence += 1;
        batch.put_cf(
            self.cf_handle(CF_INDICES)?,
            SEQUENCE_KEY,
            bincode::serialize(&*sequence)?,
        );
        Ok(*sequence)
    }

    fn stage_audit(&self, batch: &mut WriteBatch, seq: u64, audit: &AdminAction) -> Result<()> {
        let mut key = seq.to_be_bytes().to_vec();
        key.extend_from_slice(audit.id.as_bytes());
        batch.put_cf(self.cf_handle(CF_ADMIN_LOG)?, &key, bincode::serialize(audit)?);
        Ok(())
    }

    /// Audit record for an event mutation, under its own commit sequence
    fn stage_event_audit(
        &self,
        batch: &mut WriteBatch,
        sequence: &mut u64,
        audit: Option<AdminAction>,
    ) -> Result<()> {
        if let Some(audit) = audit {
            let seq = self.next_sequence(batch, sequence)?;
            self.stage_audit(batch, seq, &audit)?;
        }
        Ok(())
    }

    fn stage_release(
        &self,
        batch: &mut WriteBatch,
        event_id: &EventId,
        attempt: &RegistrationId,
    ) -> Result<bool> {
        let hold_key = Self::hold_key(event_id, attempt);
        if !self.exists(CF_HOLDS, &hold_key)? {
            return Ok(false);
        }
        batch.delete_cf(self.cf_handle(CF_HOLDS)?, &hold_key);

        if let Some(mut event) = self.get::<Event>(CF_EVENTS, event_id.as_bytes())? {
            event.current_attendees = event.current_attendees.saturating_sub(1);
            batch.put_cf(
                self.cf_handle(CF_EVENTS)?,
                event_id.as_bytes(),
                bincode::serialize(&event)?,
            );
        }
        Ok(true)
    }

    // Key helpers

    fn entry_key(entry: &LedgerEntry, sequence: u64) -> Vec<u8> {
        let mut key = entry.user_id.key_prefix();
        key.extend_from_slice(&sequence.to_be_bytes());
        key.extend_from_slice(entry.entry_id.as_bytes());
        key
    }

    fn hold_key(event_id: &EventId, attempt: &RegistrationId) -> Vec<u8> {
        let mut key = event_id.as_bytes().to_vec();
        key.extend_from_slice(attempt.as_bytes());
        key
    }

    fn spent_ref_key(user_id: &UserId, reference: &str) -> Vec<u8> {
        let mut key = user_id.key_prefix();
        key.extend_from_slice(reference.as_bytes());
        key
    }

    fn index_key_user_event(user_id: &UserId, event_id: &EventId) -> Vec<u8> {
        let mut key = IDX_USER_EVENT.to_vec();
        key.extend_from_slice(&user_id.key_prefix());
        key.extend_from_slice(event_id.as_bytes());
        key
    }

    fn index_key_code(code: &ReservationCode) -> Vec<u8> {
        let mut key = IDX_CODE.to_vec();
        key.extend_from_slice(code.as_str().as_bytes());
        key
    }

    fn index_key_user_registration(user_id: &UserId, id: Option<&RegistrationId>) -> Vec<u8> {
        let mut key = IDX_USER_REG.to_vec();
        key.extend_from_slice(&user_id.key_prefix());
        if let Some(id) = id {
            key.extend_from_slice(id.as_bytes());
        }
        key
    }

    fn index_key_event_registration(event_id: &EventId, id: Option<&RegistrationId>) -> Vec<u8> {
        let mut key = IDX_EVENT_REG.to_vec();
        key.extend_from_slice(event_id.as_bytes());
        if let Some(id) = id {
            key.extend_from_slice(id.as_bytes());
        }
        key
    }

    /// Registrations named by the trailing 16 bytes of index keys under `prefix`
    fn registrations_by_index(&self, prefix: &[u8]) -> Result<Vec<Registration>> {
        let mut registrations = Vec::new();
        for (key, _) in self.scan_prefix(CF_INDICES, prefix)? {
            let id_bytes = key
                .get(key.len().saturating_sub(16)..)
                .filter(|bytes| bytes.len() == 16)
                .ok_or_else(|| Error::Storage("Malformed registration index key".to_string()))?;
            if let Some(registration) = self.get::<Registration>(CF_REGISTRATIONS, id_bytes)? {
                registrations.push(registration);
            }
        }
        sort_newest_first(&mut registrations);
        Ok(registrations)
    }

    // Statistics

    /// Get storage statistics
    pub fn get_stats(&self) -> Result<StorageStats> {
        Ok(StorageStats {
            total_accounts: self.approximate_count(self.cf_handle(CF_BALANCES)?)?,
            total_entries: self.approximate_count(self.cf_handle(CF_ENTRIES)?)?,
            total_events: self.approximate_count(self.cf_handle(CF_EVENTS)?)?,
            total_registrations: self.approximate_count(self.cf_handle(CF_REGISTRATIONS)?)?,
        })
    }

    fn approximate_count(&self, cf: &ColumnFamily) -> Result<u64> {
        let prop = self
            .db
            .property_int_value_cf(cf, "rocksdb.estimate-num-keys")?
            .unwrap_or(0);

        Ok(prop)
    }

    /// Flush memtables to disk (graceful shutdown)
    pub fn flush(&self) -> Result<()> {
        self.db.flush()?;
        tracing::info!("RocksDB flushed");
        Ok(())
    }
}

impl Store for RocksStore {
    fn open_account(&self, user_id: &UserId) -> Result<AccountBalance> {
        let _guard = self.write_lock.lock();
        let key = user_id.key_prefix();
        if let Some(account) = self.get::<AccountBalance>(CF_BALANCES, &key)? {
            return Ok(account);
        }

        let account = AccountBalance::empty(user_id.clone(), Utc::now());
        let mut batch = WriteBatch::default();
        batch.put_cf(self.cf_handle(CF_BALANCES)?, &key, bincode::serialize(&account)?);
        self.commit(batch)?;

        tracing::debug!(user_id = %user_id, "Account opened");
        Ok(account)
    }

    fn account(&self, user_id: &UserId) -> Result<Option<AccountBalance>> {
        self.get(CF_BALANCES, &user_id.key_prefix())
    }

    fn post_entry(&self, posting: Posting) -> Result<AccountBalance> {
        let mut sequence = self.write_lock.lock();
        let mut batch = WriteBatch::default();
        let account = self.stage_posting(&mut batch, &mut sequence, posting)?;
        self.commit(batch)?;
        Ok(account)
    }

    fn entries(&self, user_id: &UserId, limit: Option<usize>) -> Result<Vec<LedgerEntry>> {
        let cf = self.cf_handle(CF_ENTRIES)?;
        let prefix = user_id.key_prefix();
        let mut upper = prefix.clone();
        upper.extend_from_slice(&[0xFF; 25]);

        let mut entries = Vec::new();
        for item in self
            .db
            .iterator_cf(cf, IteratorMode::From(upper.as_slice(), Direction::Reverse))
        {
            if limit.is_some_and(|limit| entries.len() >= limit) {
                break;
            }
            let (key, value) = item?;
            if !key.starts_with(&prefix) {
                break;
            }
            entries.push(bincode::deserialize(&value)?);
        }
        Ok(entries)
    }

    fn rollback_redemption(&self, request: &RollbackRequest) -> Result<RollbackOutcome> {
        let mut sequence = self.write_lock.lock();

        if self.exists(CF_REGISTRATIONS, request.attempt.as_bytes())? {
            return Ok(RollbackOutcome {
                already_committed: true,
                ..RollbackOutcome::default()
            });
        }

        let mut batch = WriteBatch::default();
        let mut outcome = RollbackOutcome {
            slot_released: self.stage_release(&mut batch, &request.event_id, &request.attempt)?,
            ..RollbackOutcome::default()
        };

        let reference = request.attempt.to_string();
        let spent_key = Self::spent_ref_key(&request.user_id, &reference);
        if let Some(amount) = self.get::<Points>(CF_SPENT_REFS, &spent_key)? {
            let refund = LedgerEntry::adjusted(
                request.user_id.clone(),
                i64::try_from(amount)
                    .map_err(|_| Error::InvariantViolation("refund overflow".to_string()))?,
                request.refund_description.clone(),
                Some(reference),
            );
            self.stage_posting(
                &mut batch,
                &mut sequence,
                Posting {
                    entry: refund,
                    audit: None,
                },
            )?;
            batch.delete_cf(self.cf_handle(CF_SPENT_REFS)?, &spent_key);
            outcome.refunded = Some(amount);
        }

        self.commit(batch)?;
        Ok(outcome)
    }

    fn insert_event(&self, event: &Event, audit: Option<AdminAction>) -> Result<()> {
        let mut sequence = self.write_lock.lock();
        if self.exists(CF_EVENTS, event.id.as_bytes())? {
            return Err(Error::EventExists(event.id));
        }

        let mut batch = WriteBatch::default();
        batch.put_cf(
            self.cf_handle(CF_EVENTS)?,
            event.id.as_bytes(),
            bincode::serialize(event)?,
        );
        self.stage_event_audit(&mut batch, &mut sequence, audit)?;
        self.commit(batch)?;

        tracing::debug!(event_id = %event.id, title = %event.title, "Event stored");
        Ok(())
    }

    fn event(&self, event_id: &EventId) -> Result<Option<Event>> {
        self.get(CF_EVENTS, event_id.as_bytes())
    }

    fn events(&self) -> Result<Vec<Event>> {
        let cf = self.cf_handle(CF_EVENTS)?;
        let mut events = Vec::new();
        for item in self.db.iterator_cf(cf, IteratorMode::Start) {
            let (_, value) = item?;
            events.push(bincode::deserialize::<Event>(&value)?);
        }
        events.sort_by(|a, b| a.event_date.cmp(&b.event_date).then_with(|| a.id.cmp(&b.id)));
        Ok(events)
    }

    fn update_event(
        &self,
        event_id: &EventId,
        update: &EventUpdate,
        audit: Option<AdminAction>,
    ) -> Result<Event> {
        let mut sequence = self.write_lock.lock();
        let mut event = self
            .get::<Event>(CF_EVENTS, event_id.as_bytes())?
            .ok_or(Error::EventNotFound(*event_id))?;
        update.apply(&mut event)?;

        let mut batch = WriteBatch::default();
        batch.put_cf(
            self.cf_handle(CF_EVENTS)?,
            event_id.as_bytes(),
            bincode::serialize(&event)?,
        );
        self.stage_event_audit(&mut batch, &mut sequence, audit)?;
        self.commit(batch)?;
        Ok(event)
    }

    fn delete_event(&self, event_id: &EventId, audit: Option<AdminAction>) -> Result<Event> {
        let mut sequence = self.write_lock.lock();
        let event = self
            .get::<Event>(CF_EVENTS, event_id.as_bytes())?
            .ok_or(Error::EventNotFound(*event_id))?;

        let registrations = self
            .scan_prefix(CF_INDICES, &Self::index_key_event_registration(event_id, None))?
            .len();
        let holds = self.scan_prefix(CF_HOLDS, event_id.as_bytes())?.len();
        if registrations > 0 || holds > 0 {
            return Err(Error::EventInUse {
                event_id: *event_id,
                registrations,
                holds,
            });
        }

        let mut batch = WriteBatch::default();
        batch.delete_cf(self.cf_handle(CF_EVENTS)?, event_id.as_bytes());
        self.stage_event_audit(&mut batch, &mut sequence, audit)?;
        self.commit(batch)?;

        tracing::debug!(event_id = %event_id, title = %event.title, "Event deleted");
        Ok(event)
    }

    fn try_reserve_slot(
        &self,
        event_id: &EventId,
        attempt: &RegistrationId,
    ) -> Result<SlotReservation> {
        let _guard = self.write_lock.lock();
        let hold_key = Self::hold_key(event_id, attempt);
        if self.exists(CF_HOLDS, &hold_key)? {
            return Ok(SlotReservation::Reserved);
        }

        let Some(mut event) = self.get::<Event>(CF_EVENTS, event_id.as_bytes())? else {
            return Ok(SlotReservation::NotFound);
        };
        if !event.has_open_slot() {
            return Ok(SlotReservation::Full);
        }
        event.current_attendees += 1;

        let mut batch = WriteBatch::default();
        batch.put_cf(
            self.cf_handle(CF_EVENTS)?,
            event_id.as_bytes(),
            bincode::serialize(&event)?,
        );
        batch.put_cf(self.cf_handle(CF_HOLDS)?, &hold_key, b"");
        self.commit(batch)?;

        Ok(SlotReservation::Reserved)
    }

    fn release_slot(&self, event_id: &EventId, attempt: &RegistrationId) -> Result<bool> {
        let _guard = self.write_lock.lock();
        let mut batch = WriteBatch::default();
        let released = self.stage_release(&mut batch, event_id, attempt)?;
        if released {
            self.commit(batch)?;
        }
        Ok(released)
    }

    fn open_holds(&self, event_id: &EventId) -> Result<usize> {
        Ok(self.scan_prefix(CF_HOLDS, event_id.as_bytes())?.len())
    }

    fn insert_registration(&self, registration: &Registration) -> Result<()> {
        let _guard = self.write_lock.lock();

        let user_event_key =
            Self::index_key_user_event(&registration.user_id, &registration.event_id);
        if self.exists(CF_INDICES, &user_event_key)? {
            return Err(Error::RegistrationConflict {
                user_id: registration.user_id.clone(),
                event_id: registration.event_id,
            });
        }
        let code_key = Self::index_key_code(&registration.reservation_code);
        if self.exists(CF_INDICES, &code_key)? {
            return Err(Error::DuplicateReservationCode(
                registration.reservation_code.clone(),
            ));
        }
        let hold_key = Self::hold_key(&registration.event_id, &registration.id);
        if !self.exists(CF_HOLDS, &hold_key)? {
            return Err(Error::HoldNotFound {
                event_id: registration.event_id,
                attempt: registration.id.to_string(),
            });
        }

        let mut batch = WriteBatch::default();
        let id = registration.id.as_bytes();

        batch.put_cf(
            self.cf_handle(CF_REGISTRATIONS)?,
            id,
            bincode::serialize(registration)?,
        );
        batch.delete_cf(self.cf_handle(CF_HOLDS)?, &hold_key);

        let cf_indices = self.cf_handle(CF_INDICES)?;
        batch.put_cf(cf_indices, &user_event_key, id);
        batch.put_cf(cf_indices, &code_key, id);
        batch.put_cf(
            cf_indices,
            Self::index_key_user_registration(&registration.user_id, Some(&registration.id)),
            b"",
        );
        batch.put_cf(
            cf_indices,
            Self::index_key_event_registration(&registration.event_id, Some(&registration.id)),
            b"",
        );

        self.commit(batch)?;
        Ok(())
    }

    fn registration(&self, id: &RegistrationId) -> Result<Option<Registration>> {
        self.get(CF_REGISTRATIONS, id.as_bytes())
    }

    fn registration_for(
        &self,
        user_id: &UserId,
        event_id: &EventId,
    ) -> Result<Option<Registration>> {
        let cf = self.cf_handle(CF_INDICES)?;
        match self
            .db
            .get_cf(cf, Self::index_key_user_event(user_id, event_id))?
        {
            Some(id) => self.get(CF_REGISTRATIONS, &id),
            None => Ok(None),
        }
    }

    fn registrations_for_user(&self, user_id: &UserId) -> Result<Vec<Registration>> {
        self.registrations_by_index(&Self::index_key_user_registration(user_id, None))
    }

    fn registrations_for_event(&self, event_id: &EventId) -> Result<Vec<Registration>> {
        self.registrations_by_index(&Self::index_key_event_registration(event_id, None))
    }

    fn code_exists(&self, code: &ReservationCode) -> Result<bool> {
        self.exists(CF_INDICES, &Self::index_key_code(code))
    }

    fn set_member_status(&self, user_id: &UserId, status: MembershipStatus) -> Result<Member> {
        let _guard = self.write_lock.lock();
        let member = Member {
            user_id: user_id.clone(),
            status,
            updated_at: Utc::now(),
        };

        let mut batch = WriteBatch::default();
        batch.put_cf(
            self.cf_handle(CF_MEMBERS)?,
            user_id.key_prefix(),
            bincode::serialize(&member)?,
        );
        self.commit(batch)?;
        Ok(member)
    }

    fn member(&self, user_id: &UserId) -> Result<Option<Member>> {
        self.get(CF_MEMBERS, &user_id.key_prefix())
    }

    fn admin_actions(&self, limit: usize) -> Result<Vec<AdminAction>> {
        let cf = self.cf_handle(CF_ADMIN_LOG)?;
        let mut actions = Vec::new();
        for item in self.db.iterator_cf(cf, IteratorMode::End) {
            if actions.len() >= limit {
                break;
            }
            let (_, value) = item?;
            actions.push(bincode::deserialize(&value)?);
        }
        Ok(actions)
    }
}

/// Storage statistics
#[derive(Debug, Clone)]
pub struct StorageStats {
    /// Balance rows
    pub total_accounts: u64,
    /// Ledger entries
    pub total_entries: u64,
    /// Events
    pub total_events: u64,
    /// Registrations
    pub total_registrations: u64,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::contract;
    use tempfile::TempDir;
    use uuid::Uuid;

    fn test_config(dir: &TempDir) -> Config {
        let mut config = Config::default();
        config.data_dir = dir.path().join(Uuid::new_v4().to_string());
        config.rocksdb.sync_writes = false;
        config
    }

    #[test]
    fn test_storage_open() {
        let temp = TempDir::new().unwrap();
        let store = RocksStore::open(&test_config(&temp)).unwrap();
        for name in COLUMN_FAMILIES {
            assert!(store.db.cf_handle(name).is_some());
        }
    }

    #[test]
    fn test_rocks_store_contract() {
        let temp = TempDir::new().unwrap();
        contract::run_all(|| RocksStore::open(&test_config(&temp)).unwrap());
    }

    #[test]
    fn test_state_survives_reopen() {
        let temp = TempDir::new().unwrap();
        let config = test_config(&temp);
        let alice = UserId::new("alice");
        let event = contract::event(3, 20);
        let attempt = RegistrationId::new();

        {
            let store = RocksStore::open(&config).unwrap();
            store
                .post_entry(Posting {
                    entry: LedgerEntry::earned(alice.clone(), 75, "Monthly subscription", None)
                        .unwrap(),
                    audit: None,
                })
                .unwrap();
            store.insert_event(&event, None).unwrap();
            store.try_reserve_slot(&event.id, &attempt).unwrap();
            store
                .insert_registration(&contract::registration(
                    attempt,
                    &alice,
                    &event.id,
                    "RES-PERSIST1",
                ))
                .unwrap();
            store.flush().unwrap();
        }

        let store = RocksStore::open(&config).unwrap();
        assert_eq!(store.account(&alice).unwrap().unwrap().balance, 75);
        assert_eq!(store.entries(&alice, None).unwrap().len(), 1);
        assert_eq!(store.event(&event.id).unwrap().unwrap().current_attendees, 1);
        assert!(store
            .code_exists(&ReservationCode::parse("res-persist1").unwrap())
            .unwrap());
        assert_eq!(
            store.registration_for(&alice, &event.id).unwrap().unwrap().id,
            attempt
        );
    }

    #[test]
    fn test_user_prefixes_do_not_overlap() {
        let temp = TempDir::new().unwrap();
        let store = RocksStore::open(&test_config(&temp)).unwrap();
        for (user, amount) in [("ab", 1u64), ("abc", 2), ("b", 3)] {
            store
                .post_entry(Posting {
                    entry: LedgerEntry::earned(UserId::new(user), amount, "credit", None).unwrap(),
                    audit: None,
                })
                .unwrap();
        }

        let entries = store.entries(&UserId::new("ab"), None).unwrap();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].amount, 1);
    }

    #[test]
    fn test_stats() {
        let temp = TempDir::new().unwrap();
        let store = RocksStore::open(&test_config(&temp)).unwrap();
        store.insert_event(&contract::event(1, 1), None).unwrap();
        store.db.flush().unwrap();

        let stats = store.get_stats().unwrap();
        assert!(stats.total_events <= 1);
    }
}
