use crate::integrity::Checksum;
use crate::secure_buffer::buffer::{DownloadStatus, SecureBuffer};
use crate::secure_buffer::sec_bytes::SecBytes;
use chrono::{DateTime, Utc};
use std::sync::{Arc, Weak};
use std::time::Duration;
use vanish_types::errors::Error;

/// A short-lived reference to a registered buffer.
///
/// The handle does not keep the buffer alive: once the store destroys it, every call
/// on the handle fails with [`Error::NotFound`]. Re-fetch the handle from the store
/// rather than keeping it across an `.await`.
#[derive(Clone, Debug)]
pub struct BufferHandle {
    name: String,
    inner: Weak<SecureBuffer>,
}

impl BufferHandle {
    pub fn new(buffer: &Arc<SecureBuffer>) -> Self {
        Self {
            name: buffer.name().to_string(),
            inner: Arc::downgrade(buffer),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    fn buffer(&self) -> Result<Arc<SecureBuffer>, Error> {
        self.inner
            .upgrade()
            .filter(|buffer| !buffer.is_destroyed())
            .ok_or_else(|| Error::NotFound(self.name.clone()))
    }

    /// False once the buffer has been destroyed
    pub fn is_live(&self) -> bool {
        self.buffer().is_ok()
    }

    pub fn is_encrypted(&self) -> Result<bool, Error> {
        Ok(self.buffer()?.is_encrypted())
    }

    pub fn len(&self) -> Result<usize, Error> {
        Ok(self.buffer()?.len())
    }

    pub fn downloads(&self) -> Result<u64, Error> {
        Ok(self.buffer()?.downloads())
    }

    pub fn download_limit(&self) -> Result<Option<u64>, Error> {
        Ok(self.buffer()?.download_limit())
    }

    pub fn expires_at(&self) -> Result<Option<DateTime<Utc>>, Error> {
        Ok(self.buffer()?.expires_at())
    }

    pub fn checksum(&self) -> Result<Checksum, Error> {
        Ok(self.buffer()?.checksum())
    }

    pub fn is_expired(&self) -> Result<bool, Error> {
        Ok(self.buffer()?.is_expired())
    }

    pub fn limit_reached(&self) -> Result<bool, Error> {
        Ok(self.buffer()?.limit_reached())
    }

    pub fn set_expiration(&self, input: &str) -> Result<(), Error> {
        self.buffer()?.set_expiration(input)
    }

    pub fn set_expiration_after(&self, after: Duration) -> Result<(), Error> {
        self.buffer()?.set_expiration_after(after)
    }

    pub fn set_download_limit(&self, limit: u64) -> Result<(), Error> {
        self.buffer()?.set_download_limit(limit)
    }

    pub fn validate_checksum(&self) -> Result<bool, Error> {
        self.buffer()?.validate_checksum()
    }

    pub fn verify_integrity(&self) -> Result<(), Error> {
        self.buffer()?.verify_integrity()
    }

    pub fn read_payload(&self) -> Result<SecBytes, Error> {
        self.buffer()?.read_payload()
    }

    pub fn decrypt(&self, passphrase: &[u8]) -> Result<SecBytes, Error> {
        self.buffer()?.decrypt(passphrase)
    }

    pub fn record_download(&self) -> Result<DownloadStatus, Error> {
        self.buffer()?.record_download()
    }

    /// Passes the download-limit check and reserves one delivery. Concurrent callers can
    /// never hold more slots than the limit permits
    pub fn begin_download(&self) -> Result<DownloadSlot, Error> {
        self.buffer()?.reserve_download()?;
        Ok(DownloadSlot {
            name: self.name.clone(),
            inner: self.inner.clone(),
            settled: false,
        })
    }

    #[cfg(any(test, feature = "test-hooks"))]
    pub fn corrupt_byte(&self, index: usize) -> Result<(), Error> {
        self.buffer()?.corrupt_byte(index)
    }
}

/// A reserved delivery. Dropping it without calling [`DownloadSlot::complete`] returns
/// the reservation, so a failed delivery is not counted
#[derive(Debug)]
pub struct DownloadSlot {
    name: String,
    inner: Weak<SecureBuffer>,
    settled: bool,
}

impl DownloadSlot {
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Counts the delivery
    pub fn complete(mut self) -> Result<DownloadStatus, Error> {
        self.settled = true;
        match self.inner.upgrade() {
            Some(buffer) => buffer.complete_download(),
            None => Err(Error::NotFound(self.name.clone())),
        }
    }
}

impl Drop for DownloadSlot {
    fn drop(&mut self) {
        if !self.settled {
            if let Some(buffer) = self.inner.upgrade() {
                buffer.release_download();
            }
        }
    }
}
