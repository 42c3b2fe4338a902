//! Time-indexed field store.

pub mod cache;
pub mod config;
pub mod index;
pub mod temporal;

pub use cache::TimeKey;
pub use config::{CachePolicy, StoreConfig};
pub use index::{BlobLocation, EntryMetadata, SystemMetadata};
pub use temporal::TemporalField;
