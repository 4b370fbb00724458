use crate::codec;
use crate::integrity;
use crate::secure_buffer::buffer::{expiry_from, BufferLifecycle, BufferState, SecureBuffer};
use crate::secure_buffer::sec_bytes::SecBytes;
use crate::secure_memory::{platform_memory, SharedMemory};
use std::time::Duration;
use vanish_types::clock::{SharedClock, SystemClock};
use vanish_types::errors::Error;
use vanish_types::utils::{parse_download_limit, parse_expiration};
use zeroize::Zeroize;

/// Collects the options of one upload and seals it into a [`SecureBuffer`].
///
/// ```ignore
/// let buffer = SecureBufferBuilder::new(archive)
///     .with_passphrase("hunter2")
///     .with_download_limit(3)
///     .try_with_expiration("30")?
///     .build("quiet-otter")?;
/// ```
pub struct SecureBufferBuilder {
    payload: Vec<u8>,
    passphrase: Option<SecBytes>,
    download_limit: u64,
    expiration: Option<Duration>,
    clock: SharedClock,
    memory: SharedMemory,
}

impl SecureBufferBuilder {
    pub fn new(payload: Vec<u8>) -> Self {
        Self {
            payload,
            passphrase: None,
            download_limit: 0,
            expiration: None,
            clock: SystemClock::shared(),
            memory: platform_memory(),
        }
    }

    /// Encrypts the payload under this passphrase. An empty passphrase leaves the payload
    /// in the clear
    pub fn with_passphrase<T: Into<SecBytes>>(mut self, passphrase: T) -> Self {
        let passphrase = passphrase.into();
        self.passphrase = (!passphrase.is_empty()).then_some(passphrase);
        self
    }

    /// Zero means unlimited
    pub fn with_download_limit(mut self, limit: u64) -> Self {
        self.download_limit = limit;
        self
    }

    pub fn try_with_download_limit(self, input: &str) -> Result<Self, Error> {
        Ok(self.with_download_limit(parse_download_limit(input)?))
    }

    pub fn with_expiration(mut self, after: Duration) -> Self {
        self.expiration = Some(after);
        self
    }

    /// Accepts duration text (`"1h30m"`) or a bare number of minutes (`"30"`)
    pub fn try_with_expiration(self, input: &str) -> Result<Self, Error> {
        Ok(self.with_expiration(parse_expiration(input)?))
    }

    pub fn with_clock(mut self, clock: SharedClock) -> Self {
        self.clock = clock;
        self
    }

    pub fn with_memory(mut self, memory: SharedMemory) -> Self {
        self.memory = memory;
        self
    }

    /// Seals the upload: encrypts it when a passphrase was given (scrubbing the plaintext),
    /// pins the final payload and records its checksum
    pub fn build<T: Into<String>>(mut self, name: T) -> Result<SecureBuffer, Error> {
        let name = name.into();
        let expires_at = self
            .expiration
            .map(|after| expiry_from(self.clock.now(), after))
            .transpose()?;

        let mut plaintext = std::mem::take(&mut self.payload);
        let (payload, encrypted) = match self.passphrase.take() {
            Some(passphrase) => {
                let sealed = codec::encrypt(&plaintext, &passphrase);
                plaintext.zeroize();
                (sealed?, true)
            }

            None => (plaintext, false),
        };

        let pinned = match self.memory.pin(&payload) {
            Ok(()) => !payload.is_empty(),
            Err(err) => {
                log::warn!(target: "vanish", "Buffer {name} will be held unpinned: {err}");
                false
            }
        };

        let checksum = integrity::digest(&payload);
        let state = BufferState {
            payload,
            pinned,
            checksum,
            encrypted,
            downloads: 0,
            reserved: 0,
            download_limit: (self.download_limit != 0).then_some(self.download_limit),
            expires_at,
            lifecycle: BufferLifecycle::Active,
        };

        log::trace!(target: "vanish", "Sealed buffer {name} (encrypted: {encrypted}, pinned: {pinned})");
        Ok(SecureBuffer::assemble(
            name,
            state,
            self.clock.clone(),
            self.memory.clone(),
        ))
    }
}

impl Drop for SecureBufferBuilder {
    fn drop(&mut self) {
        self.payload.zeroize();
    }
}

#[cfg(test)]
mod tests {
    use super::SecureBufferBuilder;
    use crate::codec::CIPHERTEXT_OVERHEAD;
    use crate::secure_memory::ScrubOnlyMemory;
    use chrono::Duration as ChronoDuration;
    use rstest::rstest;
    use std::sync::Arc;
    use std::time::Duration;
    use vanish_types::clock::{Clock, ManualClock};
    use vanish_types::errors::Error;

    #[test]
    fn encrypted_uploads_round_trip() {
        let buffer = SecureBufferBuilder::new(b"hello world".to_vec())
            .with_passphrase("hunter2")
            .build("pear")
            .unwrap();
        assert!(buffer.is_encrypted());
        assert_eq!(buffer.len(), 11 + CIPHERTEXT_OVERHEAD);
        assert!(buffer.validate_checksum().unwrap());
        assert_eq!(buffer.decrypt(b"hunter2").unwrap(), b"hello world");
        assert_eq!(buffer.decrypt(b"wrong").unwrap_err(), Error::Crypto);
    }

    #[test]
    fn empty_passphrase_means_plaintext() {
        let buffer = SecureBufferBuilder::new(b"hello".to_vec())
            .with_passphrase("")
            .build("pear")
            .unwrap();
        assert!(!buffer.is_encrypted());
        assert_eq!(buffer.read_payload().unwrap(), b"hello");
    }

    #[rstest]
    #[case("30", 30 * 60)]
    #[case("10m", 10 * 60)]
    #[case("1h30m", 90 * 60)]
    fn expirations_are_stamped_from_the_clock(#[case] input: &str, #[case] secs: i64) {
        let clock = ManualClock::new();
        let buffer = SecureBufferBuilder::new(b"x".to_vec())
            .with_clock(clock.shared())
            .with_memory(Arc::new(ScrubOnlyMemory))
            .try_with_expiration(input)
            .unwrap()
            .build("date")
            .unwrap();
        assert_eq!(
            buffer.expires_at().unwrap(),
            clock.now() + ChronoDuration::seconds(secs)
        );
    }

    #[test]
    fn limits_and_expirations_are_validated() {
        assert!(matches!(
            SecureBufferBuilder::new(vec![1]).try_with_download_limit("lots"),
            Err(Error::Validation(_))
        ));
        assert!(matches!(
            SecureBufferBuilder::new(vec![1]).try_with_expiration("-5m"),
            Err(Error::Validation(_))
        ));
        assert!(matches!(
            SecureBufferBuilder::new(vec![1])
                .with_expiration(Duration::MAX)
                .build("fig"),
            Err(Error::Validation(_))
        ));
    }

    #[test]
    fn zero_limit_is_unlimited() {
        let buffer = SecureBufferBuilder::new(vec![1, 2, 3])
            .try_with_download_limit("0")
            .unwrap()
            .build("grape")
            .unwrap();
        assert_eq!(buffer.download_limit(), None);
    }
}
