use crate::codec;
use crate::integrity::{self, Checksum};
use crate::secure_buffer::sec_bytes::SecBytes;
use crate::secure_memory::SharedMemory;
use chrono::{DateTime, Utc};
use std::fmt::{Debug, Formatter};
use std::time::Duration;
use vanish_io::RwLock;
use vanish_types::clock::SharedClock;
use vanish_types::errors::Error;
use vanish_types::utils::parse_duration;
use zeroize::Zeroize;

/// Where a buffer is in its life
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum BufferLifecycle {
    /// Registered and servable
    Active,
    /// Its download limit was reached; waiting to be reaped
    Expired,
    /// Terminal. The payload is scrubbed and the metadata cleared
    Destroyed,
}

/// Outcome of a successful download
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum DownloadStatus {
    /// More downloads are permitted. `remaining` is `None` for unlimited buffers
    Continue { remaining: Option<u64> },
    /// That was the final permitted download; the buffer must be destroyed now
    LimitReached,
}

pub(crate) struct BufferState {
    pub(crate) payload: Vec<u8>,
    pub(crate) pinned: bool,
    pub(crate) checksum: Checksum,
    pub(crate) encrypted: bool,
    pub(crate) downloads: u64,
    /// downloads in flight that have passed the limit check but not yet completed
    pub(crate) reserved: u64,
    pub(crate) download_limit: Option<u64>,
    pub(crate) expires_at: Option<DateTime<Utc>>,
    pub(crate) lifecycle: BufferLifecycle,
}

impl BufferState {
    fn limit_reached(&self) -> bool {
        matches!(self.download_limit, Some(limit) if self.downloads >= limit)
    }

    fn is_expired(&self, now: DateTime<Utc>) -> bool {
        matches!(self.expires_at, Some(expires_at) if now >= expires_at)
    }

    fn status(&self) -> DownloadStatus {
        match self.download_limit {
            Some(limit) if self.downloads >= limit => DownloadStatus::LimitReached,
            Some(limit) => DownloadStatus::Continue {
                remaining: Some(limit - self.downloads),
            },
            None => DownloadStatus::Continue { remaining: None },
        }
    }
}

/// A named payload with its integrity checksum, download counters and expiration.
///
/// Every field sits behind one per-buffer lock: mutations (expiration, download
/// accounting, destruction) are serialized, while readers (expiry checks, checksum
/// verification, decryption) may run concurrently with each other. A reader therefore
/// observes either the live payload or the fully destroyed state, never a partially
/// scrubbed one.
///
/// Buffers are created by [`SecureBufferBuilder`](crate::secure_buffer::SecureBufferBuilder).
pub struct SecureBuffer {
    name: String,
    state: RwLock<BufferState>,
    clock: SharedClock,
    memory: SharedMemory,
}

impl SecureBuffer {
    pub(crate) fn assemble(
        name: String,
        state: BufferState,
        clock: SharedClock,
        memory: SharedMemory,
    ) -> Self {
        Self {
            name,
            state: RwLock::new(state),
            clock,
            memory,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn lifecycle(&self) -> BufferLifecycle {
        self.state.read().lifecycle
    }

    pub fn is_destroyed(&self) -> bool {
        self.lifecycle() == BufferLifecycle::Destroyed
    }

    pub fn is_encrypted(&self) -> bool {
        self.state.read().encrypted
    }

    /// Whether the payload bytes are currently pinned in memory
    pub fn is_pinned(&self) -> bool {
        self.state.read().pinned
    }

    pub fn len(&self) -> usize {
        self.state.read().payload.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn downloads(&self) -> u64 {
        self.state.read().downloads
    }

    /// `None` when downloads are unlimited
    pub fn download_limit(&self) -> Option<u64> {
        self.state.read().download_limit
    }

    pub fn expires_at(&self) -> Option<DateTime<Utc>> {
        self.state.read().expires_at
    }

    pub fn checksum(&self) -> Checksum {
        self.state.read().checksum
    }

    /// Parses `input` (e.g. `"10m"`, `"1h30m"`) and expires the buffer that long from now
    pub fn set_expiration(&self, input: &str) -> Result<(), Error> {
        let after = parse_duration(input)?;
        self.set_expiration_after(after)
    }

    pub fn set_expiration_after(&self, after: Duration) -> Result<(), Error> {
        let expires_at = expiry_from(self.clock.now(), after)?;
        let mut state = self.state.write();
        self.ensure_live(&state)?;
        state.expires_at = Some(expires_at);
        log::trace!(target: "vanish", "Buffer {} expires at {expires_at}", self.name);
        Ok(())
    }

    /// Caps the number of downloads. Zero removes the cap
    pub fn set_download_limit(&self, limit: u64) -> Result<(), Error> {
        let mut state = self.state.write();
        self.ensure_live(&state)?;
        state.download_limit = (limit != 0).then_some(limit);
        if state.limit_reached() {
            state.lifecycle = BufferLifecycle::Expired;
        }
        Ok(())
    }

    /// True once the expiration timestamp has passed. Buffers without one never expire
    pub fn is_expired(&self) -> bool {
        let now = self.clock.now();
        self.state.read().is_expired(now)
    }

    /// True once the buffer has served its final permitted download
    pub fn limit_reached(&self) -> bool {
        self.state.read().limit_reached()
    }

    /// Whether the sweep should destroy this buffer: it has expired, reached its download
    /// limit, or was destroyed without being removed from its store
    pub fn is_due_for_reap(&self) -> bool {
        let now = self.clock.now();
        let state = self.state.read();
        state.lifecycle != BufferLifecycle::Active
            || state.is_expired(now)
            || state.limit_reached()
    }

    /// Recomputes the payload checksum and compares it with the stored one
    pub fn validate_checksum(&self) -> Result<bool, Error> {
        let state = self.state.read();
        self.ensure_live(&state)?;
        Ok(integrity::verify(&state.payload, &state.checksum))
    }

    /// Like [`Self::validate_checksum`], but a mismatch is an [`Error::Integrity`]
    pub fn verify_integrity(&self) -> Result<(), Error> {
        if self.validate_checksum()? {
            Ok(())
        } else {
            Err(Error::Integrity(self.name.clone()))
        }
    }

    /// Runs `f` against the stored payload (ciphertext, for encrypted buffers) while the
    /// buffer is guaranteed not to be destroyed
    pub fn with_payload<F, R>(&self, f: F) -> Result<R, Error>
    where
        F: FnOnce(&[u8]) -> R,
    {
        let state = self.state.read();
        self.ensure_live(&state)?;
        Ok(f(&state.payload))
    }

    /// Copies the stored payload into a pinned container
    pub fn read_payload(&self) -> Result<SecBytes, Error> {
        self.with_payload(|payload| SecBytes::from(payload))
    }

    /// Decrypts the payload of an encrypted buffer
    pub fn decrypt(&self, passphrase: &[u8]) -> Result<SecBytes, Error> {
        let state = self.state.read();
        self.ensure_live(&state)?;
        if !state.encrypted {
            return Err(Error::validation(format!(
                "buffer {} is not encrypted",
                self.name
            )));
        }

        codec::decrypt(&state.payload, passphrase)
    }

    /// Counts one completed delivery. Fails with [`Error::LimitReached`] if the limit was
    /// already reached, so at most `download_limit` deliveries are ever counted
    pub fn record_download(&self) -> Result<DownloadStatus, Error> {
        let mut state = self.state.write();
        self.ensure_live(&state)?;
        if let Some(limit) = state.download_limit {
            if state.downloads + state.reserved >= limit {
                return Err(Error::LimitReached(self.name.clone()));
            }
        }

        Ok(self.count_download(&mut state))
    }

    /// Passes the limit check and holds a slot for an in-flight delivery. Settled with
    /// [`Self::complete_download`] or [`Self::release_download`]
    pub(crate) fn reserve_download(&self) -> Result<(), Error> {
        let mut state = self.state.write();
        self.ensure_live(&state)?;
        if let Some(limit) = state.download_limit {
            if state.downloads + state.reserved >= limit {
                return Err(Error::LimitReached(self.name.clone()));
            }
        }

        state.reserved += 1;
        Ok(())
    }

    pub(crate) fn complete_download(&self) -> Result<DownloadStatus, Error> {
        let mut state = self.state.write();
        self.ensure_live(&state)?;
        state.reserved = state.reserved.saturating_sub(1);
        Ok(self.count_download(&mut state))
    }

    pub(crate) fn release_download(&self) {
        let mut state = self.state.write();
        state.reserved = state.reserved.saturating_sub(1);
    }

    fn count_download(&self, state: &mut BufferState) -> DownloadStatus {
        state.downloads += 1;
        let status = state.status();
        if status == DownloadStatus::LimitReached {
            state.lifecycle = BufferLifecycle::Expired;
            log::trace!(target: "vanish", "Buffer {} reached its download limit", self.name);
        }

        status
    }

    /// Scrubs the payload, clears every field and marks the buffer destroyed. Calling
    /// this on a destroyed buffer does nothing.
    ///
    /// The buffer is always fully cleared. An `Err` only reports that the pinned region
    /// could not be released
    pub fn destroy(&self) -> Result<(), Error> {
        let mut state = self.state.write();
        if state.lifecycle == BufferLifecycle::Destroyed {
            return Ok(());
        }

        let result = if state.pinned {
            self.memory.unpin_and_scrub(&mut state.payload)
        } else {
            Ok(())
        };

        state.payload.zeroize();
        state.pinned = false;
        state.checksum = Checksum::zeroed();
        state.encrypted = false;
        state.downloads = 0;
        state.reserved = 0;
        state.download_limit = None;
        state.expires_at = None;
        state.lifecycle = BufferLifecycle::Destroyed;

        log::trace!(target: "vanish", "Buffer {} destroyed", self.name);
        result
    }

    /// Flips every bit of one payload byte without refreshing the checksum
    #[cfg(any(test, feature = "test-hooks"))]
    pub fn corrupt_byte(&self, index: usize) -> Result<(), Error> {
        let mut state = self.state.write();
        self.ensure_live(&state)?;
        let byte = state
            .payload
            .get_mut(index)
            .ok_or_else(|| Error::validation(format!("index {index} is out of bounds")))?;
        *byte ^= 0xFF;
        Ok(())
    }

    fn ensure_live(&self, state: &BufferState) -> Result<(), Error> {
        if state.lifecycle == BufferLifecycle::Destroyed {
            Err(Error::NotFound(self.name.clone()))
        } else {
            Ok(())
        }
    }
}

pub(crate) fn expiry_from(now: DateTime<Utc>, after: Duration) -> Result<DateTime<Utc>, Error> {
    chrono::Duration::from_std(after)
        .ok()
        .and_then(|after| now.checked_add_signed(after))
        .ok_or_else(|| Error::validation(format!("expiration {after:?} is out of range")))
}

impl Drop for SecureBuffer {
    fn drop(&mut self) {
        if let Err(err) = self.destroy() {
            log::warn!(target: "vanish", "Unable to release buffer {}: {err}", self.name);
        }
    }
}

impl Debug for SecureBuffer {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        let state = self.state.read();
        f.debug_struct("SecureBuffer")
            .field("name", &self.name)
            .field("len", &state.payload.len())
            .field("encrypted", &state.encrypted)
            .field("downloads", &state.downloads)
            .field("download_limit", &state.download_limit)
            .field("expires_at", &state.expires_at)
            .field("lifecycle", &state.lifecycle)
            .finish()
    }
}
