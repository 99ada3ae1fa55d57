//! Event catalog
//!
//! Back-office edits, plus the read side members see. Attendee counts are never written
//! here; only the capacity tracker moves them. Every back-office change is committed
//! together with its audit record.

use crate::{
    actor::StoreHandle,
    capacity::{Availability, CapacityTracker},
    types::{
        AdminAction, AdminActionKind, AuthContext, Event, EventId, EventStatus, EventUpdate,
        Points, Registration, UserId,
    },
    Error, Result,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

/// Fields of a new event
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct NewEvent {
    /// Title shown to members
    pub title: String,
    /// Longer description
    #[serde(default)]
    pub description: Option<String>,
    /// Venue
    #[serde(default)]
    pub location: Option<String>,
    /// When the event takes place
    pub event_date: DateTime<Utc>,
    /// Price in points; 0 for free events
    pub points_cost: Points,
    /// Capacity
    pub max_attendees: u32,
}

impl NewEvent {
    fn validate(&self) -> Result<()> {
        if self.title.trim().is_empty() {
            return Err(Error::InvalidInput("title is required".to_string()));
        }
        if self.max_attendees == 0 {
            return Err(Error::InvalidInput(
                "max_attendees must be positive".to_string(),
            ));
        }
        Ok(())
    }
}

/// Event as listed to a member
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EventListing {
    /// The event
    #[serde(flatten)]
    pub event: Event,
    /// Whether the member already holds a registration
    pub is_registered: bool,
}

/// Event catalog
#[derive(Clone)]
pub struct EventCatalog {
    store: StoreHandle,
    capacity: CapacityTracker,
}

impl EventCatalog {
    /// Create catalog
    pub fn new(store: StoreHandle, capacity: CapacityTracker) -> Self {
        Self { store, capacity }
    }

    /// Publish a new `UPCOMING` event with no attendees
    pub async fn create_event(&self, admin: &AuthContext, new: NewEvent) -> Result<Event> {
        admin.require_admin()?;
        new.validate()?;

        let now = Utc::now();
        let event = Event {
            id: EventId::new(),
            title: new.title.trim().to_string(),
            description: new.description,
            location: new.location,
            event_date: new.event_date,
            points_cost: new.points_cost,
            max_attendees: new.max_attendees,
            current_attendees: 0,
            status: EventStatus::Upcoming,
            created_at: now,
        };
        let audit = AdminAction::for_event(
            admin.user_id.clone(),
            AdminActionKind::CreateEvent,
            event.id,
            event.title.clone(),
        );
        self.store.insert_event(event.clone(), Some(audit)).await?;

        tracing::info!(
            admin_id = %admin.user_id,
            event_id = %event.id,
            points_cost = event.points_cost,
            max_attendees = event.max_attendees,
            "Event created"
        );
        Ok(event)
    }

    /// Edit an event's fields. Capacity never drops below the slots already taken.
    pub async fn update_event(
        &self,
        admin: &AuthContext,
        event_id: &EventId,
        update: EventUpdate,
    ) -> Result<Event> {
        admin.require_admin()?;
        update.validate()?;

        let changes = update.changed_fields().join(", ");
        let audit = AdminAction::for_event(
            admin.user_id.clone(),
            AdminActionKind::UpdateEvent,
            *event_id,
            format!("Changed {}", changes),
        );
        let event = self
            .store
            .update_event(*event_id, update, Some(audit))
            .await?;

        tracing::info!(
            admin_id = %admin.user_id,
            event_id = %event_id,
            changes = %changes,
            status = event.status.as_str(),
            "Event updated"
        );
        Ok(event)
    }

    /// Move an event through its lifecycle
    pub async fn set_status(
        &self,
        admin: &AuthContext,
        event_id: &EventId,
        status: EventStatus,
    ) -> Result<Event> {
        self.update_event(admin, event_id, EventUpdate::status(status))
            .await
    }

    /// Remove an event nobody has registered for or holds a slot on
    pub async fn delete_event(&self, admin: &AuthContext, event_id: &EventId) -> Result<Event> {
        admin.require_admin()?;
        let title = self
            .event(event_id)?
            .map(|event| event.title)
            .unwrap_or_default();
        let audit = AdminAction::for_event(
            admin.user_id.clone(),
            AdminActionKind::DeleteEvent,
            *event_id,
            title,
        );
        let event = self.store.delete_event(*event_id, Some(audit)).await?;

        tracing::info!(
            admin_id = %admin.user_id,
            event_id = %event_id,
            title = %event.title,
            "Event deleted"
        );
        Ok(event)
    }

    /// Event by ID
    pub fn event(&self, event_id: &EventId) -> Result<Option<Event>> {
        self.store.reader().event(event_id)
    }

    /// Events by date; cancelled ones only when asked for
    pub fn list(&self, include_cancelled: bool) -> Result<Vec<Event>> {
        let mut events = self.store.reader().events()?;
        if !include_cancelled {
            events.retain(|event| event.status != EventStatus::Cancelled);
        }
        Ok(events)
    }

    /// Events a member can see, each flagged with whether the member is registered
    pub fn list_for(&self, auth: &AuthContext) -> Result<Vec<EventListing>> {
        let registered: HashSet<EventId> = self
            .user_registrations(&auth.user_id)?
            .into_iter()
            .map(|registration| registration.event_id)
            .collect();

        Ok(self
            .list(false)?
            .into_iter()
            .map(|event| EventListing {
                is_registered: registered.contains(&event.id),
                event,
            })
            .collect())
    }

    /// Seats left
    pub fn availability(&self, event_id: &EventId) -> Result<Option<Availability>> {
        self.capacity.availability(event_id)
    }

    /// Attendee list, newest first
    pub fn registrations(
        &self,
        admin: &AuthContext,
        event_id: &EventId,
    ) -> Result<Vec<Registration>> {
        admin.require_admin()?;
        self.store.reader().registrations_for_event(event_id)
    }

    /// The caller's own registrations, newest first
    pub fn my_registrations(&self, auth: &AuthContext) -> Result<Vec<Registration>> {
        self.user_registrations(&auth.user_id)
    }

    /// A user's registrations, newest first
    pub fn user_registrations(&self, user_id: &UserId) -> Result<Vec<Registration>> {
        self.store.reader().registrations_for_user(user_id)
    }
}
