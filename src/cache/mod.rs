//! Cache Module
//!
//! Provides the concurrent, pinnable object cache: elements, the two bucket
//! flavours, the bucket table itself, the sweep enumerator and the
//! collaborator traits.

mod bucket;
mod element;
mod enumerator;
mod stats;
mod store;
mod strategy;
mod unique_bucket;


// Re-export public types
pub use bucket::{ArrayBucket, Bucket};
pub use element::{Element, ElementRef};
pub use enumerator::CacheElementEnumerator;
pub use stats::CacheStats;
pub use store::ObjectCache;
pub use strategy::{DiscardLock, DiscardStrategy, EvictionStrategy, FaultStrategy};
pub use unique_bucket::UniqueBucket;
