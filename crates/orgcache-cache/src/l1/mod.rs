//! In-process (L1) cache tier.

pub mod lru;
pub mod sweeper;

pub use lru::{L1Cache, L1Stats};
pub use sweeper::spawn_sweeper;
