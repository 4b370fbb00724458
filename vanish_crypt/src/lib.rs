//! # Vanish Secure Buffers (vanish_crypt)
//!
//! Everything that touches a payload lives here: pinning and scrubbing of memory,
//! passphrase-based authenticated encryption, streaming integrity checksums, and the
//! [`SecureBuffer`](secure_buffer::SecureBuffer) entity that composes them with download
//! accounting and expiration.
//!
//! ## Important Notes
//!
//! * Payloads are pinned on a best-effort basis. A refused pin is logged and the buffer is
//!   held unpinned, but it is still scrubbed when destroyed
//! * Memory is always overwritten with zeros before its pin is released
//! * Decryption failures never reveal whether the passphrase or the ciphertext was wrong
//! * The passphrase-to-key derivation is a single unsalted SHA3-256 hash. Changing it would
//!   invalidate previously issued links
//!
//! ## Related Components
//!
//! * `vanish_types`: error taxonomy, clock and input parsing
//! * `vanish_store`: the registry that owns buffers and reaps them

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
    pub use crate::codec::{decrypt, encrypt};
    pub use crate::hardening::disable_core_dumps;
    pub use crate::integrity::{digest, verify, Checksum};
    pub use crate::secure_buffer::sec_bytes::SecBytes;
    pub use crate::secure_buffer::{
        BufferHandle, BufferLifecycle, DownloadSlot, DownloadStatus, SecureBuffer,
        SecureBufferBuilder,
    };
    pub use crate::secure_memory::{PlatformMemory, ScrubOnlyMemory, SecureMemory};
}

/// AES-256-GCM sealing under a passphrase-derived key
pub mod codec;
/// Process-level protections
pub mod hardening;
/// Streaming checksums and constant-time comparison
pub mod integrity;
/// For secure byte handling
pub mod secure_buffer;
/// Memory locking and scrubbing
pub mod secure_memory;
