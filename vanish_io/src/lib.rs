//! Synchronization and runtime primitives used across the vanish workspace.
//!
//! The store and every buffer synchronize through `parking_lot` locks: none of them is
//! ever held across an `.await`, so the cheaper synchronous locks are the right fit.
//! The only suspension point in the core is the expiry sweep's inter-cycle wait, which
//! uses the `tokio` runtime and a `tokio_util` cancellation token re-exported here so
//! that dependants agree on one runtime version.

pub mod locks;

pub use locks::*;

#[cfg(feature = "deadlock-detection")]
pub use parking_lot::deadlock;

pub use tokio;
pub use tokio_util;
pub use tokio_util::sync::CancellationToken;
