use crate::secure_memory::{PlatformMemory, SecureMemory};
use std::fmt::{Debug, Formatter};
use std::ops::Deref;
use zeroize::Zeroize;

/// A pinned, scrub-on-drop container for short-lived secrets: passphrases, decrypted
/// plaintext and the staging chunk used while hashing.
///
/// The allocation never grows after construction, so the pinned range stays valid for
/// the whole lifetime of the value.
pub struct SecBytes {
    inner: Vec<u8>,
    pinned: bool,
}

impl SecBytes {
    /// Creates an unpinned, empty container
    pub fn empty() -> Self {
        Self {
            inner: Vec::new(),
            pinned: false,
        }
    }

    /// A pinned region of `len` zero bytes
    pub fn zeroed(len: usize) -> Self {
        Self::from(vec![0u8; len])
    }

    pub fn len(&self) -> usize {
        self.inner.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.is_empty()
    }

    /// Whether the OS accepted the pin request
    pub fn is_pinned(&self) -> bool {
        self.pinned
    }

    fn lock(&mut self) {
        match PlatformMemory.pin(&self.inner) {
            Ok(()) => self.pinned = !self.inner.is_empty(),
            Err(err) => {
                log::debug!(target: "vanish", "Unable to pin {} secret bytes: {err}", self.inner.len());
                self.pinned = false;
            }
        }
    }

    fn scrub(&mut self) {
        if self.pinned {
            if let Err(err) = PlatformMemory.unpin_and_scrub(&mut self.inner) {
                log::debug!(target: "vanish", "Unable to unpin secret bytes: {err}");
            }
            self.pinned = false;
        }

        // also wipes spare capacity, then truncates
        self.inner.zeroize();
    }
}

impl Deref for SecBytes {
    type Target = [u8];

    fn deref(&self) -> &Self::Target {
        &self.inner
    }
}

impl AsRef<[u8]> for SecBytes {
    fn as_ref(&self) -> &[u8] {
        &self.inner
    }
}

impl AsMut<[u8]> for SecBytes {
    fn as_mut(&mut self) -> &mut [u8] {
        &mut self.inner
    }
}

impl From<Vec<u8>> for SecBytes {
    fn from(inner: Vec<u8>) -> Self {
        let mut this = Self {
            inner,
            pinned: false,
        };
        this.lock();
        this
    }
}

impl From<&[u8]> for SecBytes {
    fn from(this: &[u8]) -> Self {
        Self::from(this.to_vec())
    }
}

impl From<&str> for SecBytes {
    fn from(this: &str) -> Self {
        Self::from(this.as_bytes())
    }
}

impl From<String> for SecBytes {
    fn from(this: String) -> Self {
        Self::from(this.into_bytes())
    }
}

impl Drop for SecBytes {
    fn drop(&mut self) {
        self.scrub();
    }
}

impl Debug for SecBytes {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "***SECRET***")
    }
}

impl<T: AsRef<[u8]>> PartialEq<T> for SecBytes {
    fn eq(&self, other: &T) -> bool {
        self.as_ref() == other.as_ref()
    }
}

impl Clone for SecBytes {
    fn clone(&self) -> Self {
        Self::from(self.as_ref())
    }
}
