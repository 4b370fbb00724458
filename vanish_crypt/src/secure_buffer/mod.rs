/// The in-memory representation of one upload
pub mod buffer;
/// Sealing of uploads into buffers
pub mod builder;
/// Short-lived references handed out by a store
pub mod handle;
/// Pinned containers for passphrases and plaintext
pub mod sec_bytes;

pub use buffer::{BufferLifecycle, DownloadStatus, SecureBuffer};
pub use builder::SecureBufferBuilder;
pub use handle::{BufferHandle, DownloadSlot};
