//! # Vanish Store (vanish_store)
//!
//! The registry that owns every uploaded buffer, reaps expired ones in the background and
//! enforces the download flow.
//!
//! ## Features
//!
//! * **BufferStore**: a name-keyed map with per-store and per-buffer locking
//! * **Expiry sweep**: a cancellable background task that snapshots due names and destroys
//!   them one at a time
//! * **Delivery**: limit check, integrity check, decryption and download accounting in a
//!   fixed order, with at most `download_limit` deliveries even under contention
//! * **VaultService**: owns the store and its sweep, and tears both down deterministically
//!
//! ## Important Notes
//!
//! * Nothing is ever written to disk. Shutting the service down destroys every buffer
//! * Handles returned by the store do not keep buffers alive
//!
//! ## Related Components
//!
//! * `vanish_crypt`: the buffers themselves
//! * `vanish_types`: errors, clock and input parsing

#![deny(
    trivial_numeric_casts,
    unused_extern_crates,
    unused_import_braces,
    variant_size_differences,
    unused_features,
    unused_results
)]

/// Convenient imports for external use
pub mod prelude {
    pub use crate::config::StoreConfig;
    pub use crate::delivery::{serve_download, serve_download_async, Delivered};
    pub use crate::names::{NameSource, SillyNames};
    pub use crate::service::VaultService;
    pub use crate::store::BufferStore;
    pub use vanish_crypt::prelude::*;
    pub use vanish_types::prelude::*;
}

/// Store and service settings
pub mod config;
/// The download flow
pub mod delivery;
/// Name generation for new uploads
pub mod names;
/// Service lifecycle
pub mod service;
/// The registry
pub mod store;
mod sweep;
