//! Types shared by every crate of the vanish workspace: the error taxonomy, the wall
//! clock abstraction consulted for expirations, and parsers for the loosely-typed
//! upload inputs (expiration durations and download limits).

#![deny(
    trivial_numeric_casts,
    unused_extern_crates,
    unused_import_braces,
    variant_size_differences,
    unused_features,
    unused_results
)]

pub mod prelude {
    pub use crate::clock::{Clock, ManualClock, SharedClock, SystemClock};
    pub use crate::errors::Error;
    pub use crate::utils::{parse_download_limit, parse_duration, parse_expiration};
}

pub mod clock;
pub mod errors;
pub mod utils;
