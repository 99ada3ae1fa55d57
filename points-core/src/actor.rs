//! Actor-based concurrency for storage mutations
//!
//! Every mutation goes through one writer task:
//! - Mutations are applied in mailbox (FIFO) order
//! - Bounded mailbox gives backpressure
//! - Each request is bounded by `store.request_timeout_ms`
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────┐
//! │  Ledger / CapacityTracker / RedemptionCoordinator    │
//! └─────────────────────┬────────────────────────────────┘
//!                       │
//!                       ▼
//! ┌──────────────────────────────────────────────────────┐
//! │               StoreHandle (Clone)                     │
//! │   mutations → mailbox          reads → Arc<dyn Store> │
//! └─────────────────────┬────────────────────────────────┘
//!                       │
//!                       │ mpsc::channel (bounded)
//!                       ▼
//! ┌──────────────────────────────────────────────────────┐
//! │              StoreActor (Single Task)                 │
//! │     one atomic conditional Store call per message     │
//! └───────────────────────────────────────────────────────┘
//! ```
//!
//! A request that times out may still be applied later. Anything enqueued after it (a
//! compensating rollback, for instance) observes its effect.

use crate::config::StoreConfig;
use crate::error::{Error, Result};
use crate::storage::Store;
use crate::types::{
    AccountBalance, AdminAction, Event, EventId, EventUpdate, Member, MembershipStatus, Posting,
    Registration, RegistrationId, RollbackOutcome, RollbackRequest, SlotReservation, UserId,
};
use parking_lot::Mutex;
use std::sync::Arc;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tokio::time::Duration;

/// Message sent to the store actor
pub enum StoreMessage {
    /// Create a zero balance if missing
    OpenAccount {
        /// Account owner
        user_id: UserId,
        /// Reply channel
        response: oneshot::Sender<Result<AccountBalance>>,
    },

    /// Append a ledger entry
    PostEntry {
        /// Entry and optional audit record
        posting: Posting,
        /// Reply channel
        response: oneshot::Sender<Result<AccountBalance>>,
    },

    /// Compensate an unfinished redemption
    RollbackRedemption {
        /// Attempt to undo
        request: RollbackRequest,
        /// Reply channel
        response: oneshot::Sender<Result<RollbackOutcome>>,
    },

    /// Insert an event
    InsertEvent {
        /// New event
        event: Event,
        /// Audit record written with it
        audit: Option<AdminAction>,
        /// Reply channel
        response: oneshot::Sender<Result<()>>,
    },

    /// Edit an event
    UpdateEvent {
        /// Event to edit
        event_id: EventId,
        /// Fields to change
        update: EventUpdate,
        /// Audit record written with it
        audit: Option<AdminAction>,
        /// Reply channel
        response: oneshot::Sender<Result<Event>>,
    },

    /// Remove an unreferenced event
    DeleteEvent {
        /// Event to remove
        event_id: EventId,
        /// Audit record written with it
        audit: Option<AdminAction>,
        /// Reply channel
        response: oneshot::Sender<Result<Event>>,
    },

    /// Compare-and-increment attendee count
    TryReserveSlot {
        /// Event
        event_id: EventId,
        /// Attempt taking the slot
        attempt: RegistrationId,
        /// Reply channel
        response: oneshot::Sender<Result<SlotReservation>>,
    },

    /// Drop a slot hold
    ReleaseSlot {
        /// Event
        event_id: EventId,
        /// Attempt holding the slot
        attempt: RegistrationId,
        /// Reply channel
        response: oneshot::Sender<Result<bool>>,
    },

    /// Insert a registration
    InsertRegistration {
        /// Registration, keyed by its attempt id
        registration: Registration,
        /// Reply channel
        response: oneshot::Sender<Result<()>>,
    },

    /// Upsert membership status
    SetMemberStatus {
        /// Member
        user_id: UserId,
        /// New status
        status: MembershipStatus,
        /// Reply channel
        response: oneshot::Sender<Result<Member>>,
    },

    /// Shutdown actor
    Shutdown,
}

/// Actor that applies storage mutations one at a time
pub struct StoreActor {
    /// Storage backend
    store: Arc<dyn Store>,

    /// Mailbox for incoming messages
    mailbox: mpsc::Receiver<StoreMessage>,
}

impl StoreActor {
    /// Create new actor
    pub fn new(store: Arc<dyn Store>, mailbox: mpsc::Receiver<StoreMessage>) -> Self {
        Self { store, mailbox }
    }

    /// Run the actor event loop
    pub async fn run(mut self) {
        while let Some(msg) = self.mailbox.recv().await {
            if matches!(msg, StoreMessage::Shutdown) {
                tracing::debug!("Store actor shutting down");
                break;
            }
            self.handle_message(msg);
        }
    }

    /// Handle a single message. A dropped response channel means the caller gave up
    /// (timeout); the mutation is still applied.
    fn handle_message(&self, msg: StoreMessage) {
        match msg {
            StoreMessage::OpenAccount { user_id, response } => {
                let _ = response.send(self.store.open_account(&user_id));
            }

            StoreMessage::PostEntry { posting, response } => {
                let _ = response.send(self.store.post_entry(posting));
            }

            StoreMessage::RollbackRedemption { request, response } => {
                let _ = response.send(self.store.rollback_redemption(&request));
            }

            StoreMessage::InsertEvent {
                event,
                audit,
                response,
            } => {
                let _ = response.send(self.store.insert_event(&event, audit));
            }

            StoreMessage::UpdateEvent {
                event_id,
                update,
                audit,
                response,
            } => {
                let _ = response.send(self.store.update_event(&event_id, &update, audit));
            }

            StoreMessage::DeleteEvent {
                event_id,
                audit,
                response,
            } => {
                let _ = response.send(self.store.delete_event(&event_id, audit));
            }

            StoreMessage::TryReserveSlot {
                event_id,
                attempt,
                response,
            } => {
                let _ = response.send(self.store.try_reserve_slot(&event_id, &attempt));
            }

            StoreMessage::ReleaseSlot {
                event_id,
                attempt,
                response,
            } => {
                let _ = response.send(self.store.release_slot(&event_id, &attempt));
            }

            StoreMessage::InsertRegistration {
                registration,
                response,
            } => {
                let _ = response.send(self.store.insert_registration(&registration));
            }

            StoreMessage::SetMemberStatus {
                user_id,
                status,
                response,
            } => {
                let _ = response.send(self.store.set_member_status(&user_id, status));
            }

            StoreMessage::Shutdown => {
                // Handled in main loop
            }
        }
    }
}

/// Handle for sending mutations to the actor and reading the store directly
#[derive(Clone)]
pub struct StoreHandle {
    sender: mpsc::Sender<StoreMessage>,
    store: Arc<dyn Store>,
    request_timeout: Duration,
    /// Actor task, taken by the first `shutdown`
    task: Arc<Mutex<Option<JoinHandle<()>>>>,
}

impl StoreHandle {
    /// Create new handle
    pub fn new(
        sender: mpsc::Sender<StoreMessage>,
        store: Arc<dyn Store>,
        request_timeout: Duration,
    ) -> Self {
        Self {
            sender,
            store,
            request_timeout,
            task: Arc::new(Mutex::new(None)),
        }
    }

    fn with_task(self, task: JoinHandle<()>) -> Self {
        *self.task.lock() = Some(task);
        self
    }

    /// Read access. Reads are not serialized behind mutations.
    pub fn reader(&self) -> &dyn Store {
        self.store.as_ref()
    }

    async fn request<T>(
        &self,
        make: impl FnOnce(oneshot::Sender<Result<T>>) -> StoreMessage,
    ) -> Result<T> {
        let (tx, rx) = oneshot::channel();
        let exchange = async {
            self.sender
                .send(make(tx))
                .await
                .map_err(|_| Error::Concurrency("Actor mailbox closed".to_string()))?;

            rx.await
                .map_err(|_| Error::Concurrency("Response channel closed".to_string()))?
        };

        match tokio::time::timeout(self.request_timeout, exchange).await {
            Ok(result) => result,
            Err(_) => Err(Error::Timeout(self.request_timeout.as_millis() as u64)),
        }
    }

    /// Create a zero balance if missing
    pub async fn open_account(&self, user_id: UserId) -> Result<AccountBalance> {
        self.request(|response| StoreMessage::OpenAccount { user_id, response })
            .await
    }

    /// Append a ledger entry
    pub async fn post_entry(&self, posting: Posting) -> Result<AccountBalance> {
        self.request(|response| StoreMessage::PostEntry { posting, response })
            .await
    }

    /// Compensate an unfinished redemption
    pub async fn rollback_redemption(&self, request: RollbackRequest) -> Result<RollbackOutcome> {
        self.request(|response| StoreMessage::RollbackRedemption { request, response })
            .await
    }

    /// Insert an event with its audit record
    pub async fn insert_event(&self, event: Event, audit: Option<AdminAction>) -> Result<()> {
        self.request(|response| StoreMessage::InsertEvent {
            event,
            audit,
            response,
        })
        .await
    }

    /// Edit an event with its audit record
    pub async fn update_event(
        &self,
        event_id: EventId,
        update: EventUpdate,
        audit: Option<AdminAction>,
    ) -> Result<Event> {
        self.request(|response| StoreMessage::UpdateEvent {
            event_id,
            update,
            audit,
            response,
        })
        .await
    }

    /// Remove an unreferenced event with its audit record
    pub async fn delete_event(
        &self,
        event_id: EventId,
        audit: Option<AdminAction>,
    ) -> Result<Event> {
        self.request(|response| StoreMessage::DeleteEvent {
            event_id,
            audit,
            response,
        })
        .await
    }

    /// Compare-and-increment attendee count for an attempt
    pub async fn try_reserve_slot(
        &self,
        event_id: EventId,
        attempt: RegistrationId,
    ) -> Result<SlotReservation> {
        self.request(|response| StoreMessage::TryReserveSlot {
            event_id,
            attempt,
            response,
        })
        .await
    }

    /// Drop a slot hold
    pub async fn release_slot(&self, event_id: EventId, attempt: RegistrationId) -> Result<bool> {
        self.request(|response| StoreMessage::ReleaseSlot {
            event_id,
            attempt,
            response,
        })
        .await
    }

    /// Insert a registration
    pub async fn insert_registration(&self, registration: Registration) -> Result<()> {
        self.request(|response| StoreMessage::InsertRegistration {
            registration,
            response,
        })
        .await
    }

    /// Upsert membership status
    pub async fn set_member_status(
        &self,
        user_id: UserId,
        status: MembershipStatus,
    ) -> Result<Member> {
        self.request(|response| StoreMessage::SetMemberStatus {
            user_id,
            status,
            response,
        })
        .await
    }

    /// Shutdown actor. Returns once every message queued before the call has been applied
    /// and the actor has released the store.
    pub async fn shutdown(&self) -> Result<()> {
        self.sender
            .send(StoreMessage::Shutdown)
            .await
            .map_err(|_| Error::Concurrency("Actor mailbox closed".to_string()))?;

        let task = self.task.lock().take();
        if let Some(task) = task {
            task.await
                .map_err(|e| Error::Concurrency(format!("Store actor failed: {}", e)))?;
        }
        Ok(())
    }
}

/// Spawn the store actor
pub fn spawn_store_actor(store: Arc<dyn Store>, config: &StoreConfig) -> StoreHandle {
    let (tx, rx) = mpsc::channel(config.mailbox_capacity);
    let actor = StoreActor::new(store.clone(), rx);

    let task = tokio::spawn(async move {
        actor.run().await;
    });

    StoreHandle::new(tx, store, config.request_timeout()).with_task(task)
}
