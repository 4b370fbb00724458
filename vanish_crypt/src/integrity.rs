//! Payload checksums
//!
//! The checksum guards against accidental corruption of a stored payload, not against a
//! malicious owner, so a fast fixed-width hash (XXH64) is enough. The payload is fed to
//! the hasher one fixed-size chunk at a time through a pinned staging region, which
//! bounds the extra memory to a single chunk regardless of payload size.
//!
//! Comparison against the stored checksum is constant-time even though the checksum is
//! not a secret.

use crate::secure_buffer::sec_bytes::SecBytes;
use std::fmt::{Debug, Display, Formatter};
use std::hash::Hasher;
use twox_hash::XxHash64;

/// Width of a [`Checksum`] in bytes
pub const CHECKSUM_LEN: usize = 8;
/// Bytes hashed per step
pub const DIGEST_CHUNK_LEN: usize = 4096;
const CHECKSUM_SEED: u64 = 0;

/// Fixed-width digest of a payload
#[derive(Copy, Clone)]
pub struct Checksum([u8; CHECKSUM_LEN]);

impl Checksum {
    /// The checksum held by a destroyed buffer
    pub const fn zeroed() -> Self {
        Self([0u8; CHECKSUM_LEN])
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }
}

impl PartialEq for Checksum {
    fn eq(&self, other: &Self) -> bool {
        const_time_compare(&self.0, &other.0)
    }
}

impl Eq for Checksum {}

impl Display for Checksum {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        for byte in self.0 {
            write!(f, "{byte:02x}")?;
        }
        Ok(())
    }
}

impl Debug for Checksum {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "Checksum({self})")
    }
}

/// Computes the checksum of `bytes`, streaming them through a pinned chunk
pub fn digest(bytes: &[u8]) -> Checksum {
    let mut hasher = XxHash64::with_seed(CHECKSUM_SEED);
    let mut staging = SecBytes::zeroed(DIGEST_CHUNK_LEN.min(bytes.len()));

    for chunk in bytes.chunks(DIGEST_CHUNK_LEN) {
        let window = &mut staging.as_mut()[..chunk.len()];
        window.copy_from_slice(chunk);
        hasher.write(window);
    }

    Checksum(hasher.finish().to_le_bytes())
}

/// Recomputes the checksum of `bytes` and compares it against `expected` in constant time
pub fn verify(bytes: &[u8], expected: &Checksum) -> bool {
    digest(bytes) == *expected
}

/// Compares two byte slices without short-circuiting on the first difference
pub fn const_time_compare(this: &[u8], other: &[u8]) -> bool {
    let mut count = 0;
    let this_len = this.len();

    // Only loop this_len times to prevent length-adjustment attacks that may leak
    // the length of the secret
    for idx in 0..this_len {
        let val_this = this.get(idx);
        let val_other = other.get(idx);
        match (val_this, val_other) {
            (Some(a), Some(b)) => count += (a == b) as usize,
            _ => {
                // Black box to not optimize away this branch
                let _ = std::hint::black_box(count);
            }
        }
    }

    count == this.len() && count == other.len()
}
