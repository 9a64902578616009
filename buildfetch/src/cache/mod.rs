//! Content cache for chunk objects.
//!
//! Chunk objects are content-addressed and never change, so a cache entry is
//! valid forever and nothing here evicts or invalidates.
//!
//! - [`Cache`]: key-value trait with byte values
//! - [`DiskCache`]: one file per entry below a root directory
//! - [`MemoryCache`]: in-process cache backed by moka
//! - [`CachingTransport`]: a [`Transport`](crate::transport::Transport)
//!   decorator serving chunk GETs from a cache

mod disk;
mod memory;
mod traits;
mod transport;

pub use disk::DiskCache;
pub use memory::MemoryCache;
pub use traits::{Cache, CacheError, CacheResult};
pub use transport::{cache_key, CachingTransport};
