//! The unified cache manager.
//!
//! One [`UnifiedCacheManager`] per process fronts the authoritative query
//! service with the L1 and L2 tiers and keeps them coherent with CDC
//! events. Handles are cheap to clone and share one set of tiers.

pub mod admin;
mod invalidation;
mod read;
mod tiers;
mod views;

use std::sync::atomic::AtomicBool;
use std::sync::{Arc, Weak};

use parking_lot::Mutex;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use orgcache_core::config::cache::CacheConfig;
use orgcache_core::error::AppError;
use orgcache_core::events::CdcEvent;
use orgcache_core::result::AppResult;
use orgcache_core::traits::{DistributedCache, OrganizationQuery};

use crate::bus::CacheEventBus;
use crate::consistency::ConsistencyChecker;
use crate::keys::CacheKeyManager;
use crate::l1::{L1Cache, spawn_sweeper};
use crate::updater::SmartCacheUpdater;

use self::views::ViewRegistry;

pub use admin::CacheStats;

/// Multi-tier cache in front of an [`OrganizationQuery`].
#[derive(Debug, Clone)]
pub struct UnifiedCacheManager {
    inner: Arc<ManagerInner>,
}

#[derive(Debug)]
struct ManagerInner {
    config: CacheConfig,
    keys: CacheKeyManager,
    l1: Arc<L1Cache>,
    l2: Arc<dyn DistributedCache>,
    l3: Arc<dyn OrganizationQuery>,
    bus: Arc<CacheEventBus>,
    updater: SmartCacheUpdater,
    checker: ConsistencyChecker,
    views: ViewRegistry,
    shutdown: watch::Sender<bool>,
    closed: AtomicBool,
    tasks: Mutex<Vec<JoinHandle<()>>>,
}

impl UnifiedCacheManager {
    /// Build the manager and start its event listener and L1 sweeper.
    ///
    /// Must be called inside a Tokio runtime.
    pub fn new(
        config: CacheConfig,
        l2: Arc<dyn DistributedCache>,
        l3: Arc<dyn OrganizationQuery>,
    ) -> AppResult<Self> {
        if config.namespace.trim().is_empty() {
            return Err(AppError::configuration("cache.namespace must not be empty"));
        }
        if config.l1_max_size == 0 {
            return Err(AppError::configuration(
                "cache.l1_max_size must be greater than zero",
            ));
        }

        let l1 = Arc::new(L1Cache::new(config.l1_max_size, config.l1_ttl()));
        let bus = Arc::new(CacheEventBus::new(config.event_buffer_size));
        let checker = ConsistencyChecker::new(Arc::clone(&l1), Arc::clone(&l2))
            .with_l2_timeout(config.l2_timeout());
        let (shutdown, shutdown_rx) = watch::channel(false);
        let events = bus.subscribe();

        let inner = Arc::new(ManagerInner {
            keys: CacheKeyManager::new(config.namespace.clone()),
            views: ViewRegistry::new(config.max_tracked_views),
            l1,
            l2,
            l3,
            bus,
            updater: SmartCacheUpdater::new(),
            checker,
            shutdown,
            closed: AtomicBool::new(false),
            tasks: Mutex::new(Vec::new()),
            config,
        });

        let mut tasks = vec![spawn_event_listener(Arc::downgrade(&inner), events)];
        if let Some(interval) = inner.config.sweep_interval() {
            tasks.push(spawn_sweeper(&inner.l1, interval, shutdown_rx));
        }
        *inner.tasks.lock() = tasks;

        info!(
            namespace = %inner.config.namespace,
            l1_max_size = inner.config.l1_max_size,
            l1_ttl_seconds = inner.config.l1_ttl_seconds,
            l2_ttl_seconds = inner.config.l2_ttl_seconds,
            write_through = inner.config.write_through,
            consistency_mode = %inner.config.consistency_mode,
            "Unified cache manager initialized"
        );

        Ok(Self { inner })
    }

    pub fn config(&self) -> &CacheConfig {
        &self.inner.config
    }

    pub fn key_manager(&self) -> &CacheKeyManager {
        &self.inner.keys
    }

    /// The in-process tier.
    pub fn l1(&self) -> &Arc<L1Cache> {
        &self.inner.l1
    }

    /// The shared tier.
    pub fn l2(&self) -> &Arc<dyn DistributedCache> {
        &self.inner.l2
    }

    /// Bus that feeds the background event listener.
    pub fn event_bus(&self) -> &Arc<CacheEventBus> {
        &self.inner.bus
    }
}

/// Apply events from the bus until it closes or the manager is dropped.
fn spawn_event_listener(
    inner: Weak<ManagerInner>,
    mut events: mpsc::Receiver<CdcEvent>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        while let Some(event) = events.recv().await {
            let Some(inner) = inner.upgrade() else { break };
            let manager = UnifiedCacheManager { inner };
            if let Err(e) = manager.handle_cdc_event(&event).await {
                warn!(
                    event_id = %event.event_id,
                    tenant_id = %event.tenant_id,
                    error = %e,
                    "Failed to apply CDC event"
                );
            }
        }
        debug!("CDC event listener stopped");
    })
}
