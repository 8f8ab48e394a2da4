//! # orgcache-cache
//!
//! The multi-tier cache coherence engine for OrgCache:
//!
//! - **L1**: bounded in-process LRU with per-entry TTL ([`l1`])
//! - **L2**: shared tier, Redis via the [redis](https://crates.io/crates/redis)
//!   crate or in-process via [moka](https://crates.io/crates/moka)
//! - **L3**: the authoritative [`OrganizationQuery`](orgcache_core::traits::OrganizationQuery)
//!
//! [`UnifiedCacheManager`] reads through the tiers and keeps them coherent
//! with CDC events, patching cached list views where that is safe.

pub mod bus;
pub mod consistency;
pub mod entry;
pub mod keys;
pub mod l1;
pub mod manager;
#[cfg(feature = "memory")]
pub mod memory;
pub mod provider;
#[cfg(feature = "redis-backend")]
pub mod redis;
pub mod updater;

pub use bus::CacheEventBus;
pub use consistency::{ConsistencyChecker, ConsistencyReport};
pub use entry::CacheEntry;
pub use keys::{CacheKeyManager, EntityKind};
pub use l1::L1Cache;
pub use manager::{CacheStats, UnifiedCacheManager};
pub use provider::DistributedCacheProvider;
pub use updater::SmartCacheUpdater;
