//! In-process distributed-tier provider.

pub mod store;

pub use store::MemoryCacheProvider;
