//! Service wiring
//!
//! [`PointsCore`] owns the store, the store actor and every component built on them.

use crate::{
    actor::{spawn_store_actor, StoreHandle},
    admin::AdminService,
    capacity::CapacityTracker,
    codes::ReservationCodeGenerator,
    config::Config,
    events::EventCatalog,
    ledger::Ledger,
    membership::MembershipService,
    metrics::Metrics,
    redemption::RedemptionCoordinator,
    storage::{MemoryStore, RocksStore, StorageStats, Store},
    Error, Result,
};
use std::sync::Arc;

/// Points ledger and event reservation core
#[derive(Clone)]
pub struct PointsCore {
    handle: StoreHandle,
    rocks: Option<Arc<RocksStore>>,
    ledger: Ledger,
    capacity: CapacityTracker,
    redemption: RedemptionCoordinator,
    admin: AdminService,
    membership: MembershipService,
    events: EventCatalog,
    metrics: Metrics,
    config: Config,
}

impl PointsCore {
    /// Open the RocksDB store under `config.data_dir` and start the store actor
    pub async fn open(config: Config) -> Result<Self> {
        config.validate()?;
        let rocks = Arc::new(RocksStore::open(&config)?);
        tracing::info!(data_dir = %config.data_dir.display(), "Points store opened");
        Self::assemble(rocks.clone(), Some(rocks), config)
    }

    /// Volatile store, for tests and local development
    pub fn in_memory(config: Config) -> Result<Self> {
        config.validate()?;
        Self::assemble(Arc::new(MemoryStore::new()), None, config)
    }

    fn assemble(
        store: Arc<dyn Store>,
        rocks: Option<Arc<RocksStore>>,
        config: Config,
    ) -> Result<Self> {
        let metrics = Metrics::new().map_err(|e| Error::Config(e.to_string()))?;
        let handle = spawn_store_actor(store, &config.store);

        let ledger = Ledger::new(handle.clone(), metrics.clone(), config.history.clone());
        let capacity = CapacityTracker::new(handle.clone());
        let codes = Arc::new(ReservationCodeGenerator::new(config.reservation.clone()));
        let redemption = RedemptionCoordinator::new(
            handle.clone(),
            ledger.clone(),
            capacity.clone(),
            codes,
            metrics.clone(),
        );
        let admin = AdminService::new(ledger.clone(), handle.clone(), config.history.clone());
        let membership = MembershipService::new(handle.clone(), ledger.clone());
        let events = EventCatalog::new(handle.clone(), capacity.clone());

        Ok(Self {
            handle,
            rocks,
            ledger,
            capacity,
            redemption,
            admin,
            membership,
            events,
            metrics,
            config,
        })
    }

    /// Balances and history
    pub fn ledger(&self) -> &Ledger {
        &self.ledger
    }

    /// Event capacity
    pub fn capacity(&self) -> &CapacityTracker {
        &self.capacity
    }

    /// Point redemption
    pub fn redemption(&self) -> &RedemptionCoordinator {
        &self.redemption
    }

    /// Admin adjustments and audit log
    pub fn admin(&self) -> &AdminService {
        &self.admin
    }

    /// Membership hooks
    pub fn membership(&self) -> &MembershipService {
        &self.membership
    }

    /// Event catalog
    pub fn events(&self) -> &EventCatalog {
        &self.events
    }

    /// Metrics registry
    pub fn metrics(&self) -> &Metrics {
        &self.metrics
    }

    /// Active configuration
    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Read access to the underlying store
    pub fn store(&self) -> &dyn Store {
        self.handle.reader()
    }

    /// Approximate record counts, `None` for the in-memory store
    pub fn storage_stats(&self) -> Result<Option<StorageStats>> {
        self.rocks.as_ref().map(|rocks| rocks.get_stats()).transpose()
    }

    /// Drain and stop the store actor, then flush storage
    pub async fn shutdown(self) -> Result<()> {
        self.handle.shutdown().await?;
        if let Some(rocks) = &self.rocks {
            rocks.flush()?;
        }
        tracing::info!("Points core shut down");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::UserId;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_in_memory_core() {
        let core = PointsCore::in_memory(Config::default()).unwrap();
        let user = UserId::new("alice");

        core.ledger().credit(&user, 10, "bonus", None).await.unwrap();
        assert_eq!(core.ledger().get_balance(&user).unwrap(), 10);
        assert!(core.storage_stats().unwrap().is_none());
        core.shutdown().await.unwrap();
    }

    #[tokio::test]
    async fn test_open_rocks_core() {
        let dir = TempDir::new().unwrap();
        let config = Config {
            data_dir: dir.path().join("points"),
            ..Config::default()
        };

        let core = PointsCore::open(config).await.unwrap();
        let user = UserId::new("bob");
        core.membership().enroll(&user).await.unwrap();
        core.ledger().credit(&user, 25, "bonus", None).await.unwrap();

        assert_eq!(core.ledger().get_balance(&user).unwrap(), 25);
        assert!(core.storage_stats().unwrap().is_some());
        core.shutdown().await.unwrap();
    }

    #[test]
    fn test_invalid_config_rejected() {
        let mut config = Config::default();
        config.store.mailbox_capacity = 0;
        assert!(matches!(
            PointsCore::in_memory(config),
            Err(Error::Config(_))
        ));
    }
}
