//! Serving a buffer to one downloader
//!
//! The order of checks is fixed:
//!
//! 1. the buffer must exist and not have expired
//! 2. the download limit must not be reached. If it is, the buffer is destroyed and the
//!    request fails with [`Error::LimitReached`] without serving anything
//! 3. the payload checksum must verify. A mismatch fails with [`Error::Integrity`] and the
//!    buffer is kept
//! 4. encrypted payloads are opened with the passphrase; a failure is [`Error::Crypto`]
//! 5. the content is handed to the caller's delivery function
//! 6. the download is counted, and the buffer is destroyed once that was the last one
//!
//! Steps 2 through 6 hold a reserved download slot, so concurrent downloads can never
//! exceed the limit. A delivery that fails before step 6 gives its slot back.

use crate::store::BufferStore;
use std::future::Future;
use vanish_crypt::secure_buffer::sec_bytes::SecBytes;
use vanish_crypt::secure_buffer::{BufferHandle, DownloadSlot, DownloadStatus};
use vanish_types::errors::Error;

/// What a successful delivery produced
#[derive(Debug)]
pub struct Delivered<R> {
    /// The value returned by the delivery function
    pub output: R,
    /// Whether more downloads remain. `LimitReached` means the buffer is already destroyed
    pub status: DownloadStatus,
}

/// Serves the named buffer through `deliver`, which receives the plaintext
pub fn serve_download<F, R>(
    store: &BufferStore,
    name: &str,
    passphrase: Option<&[u8]>,
    deliver: F,
) -> Result<Delivered<R>, Error>
where
    F: FnOnce(&[u8]) -> Result<R, Error>,
{
    let (slot, content) = prepare(store, name, passphrase)?;
    let output = deliver(&content[..])?;
    drop(content);
    Ok(finish(store, slot, output))
}

/// Like [`serve_download`] for deliveries that suspend, such as writing a response body.
/// No lock or buffer reference is held across the `.await`; the plaintext is owned by
/// the future and scrubbed when it is dropped
pub async fn serve_download_async<F, Fut, R>(
    store: &BufferStore,
    name: &str,
    passphrase: Option<&[u8]>,
    deliver: F,
) -> Result<Delivered<R>, Error>
where
    F: FnOnce(SecBytes) -> Fut,
    Fut: Future<Output = Result<R, Error>>,
{
    let (slot, content) = prepare(store, name, passphrase)?;
    let output = deliver(content).await?;
    Ok(finish(store, slot, output))
}

fn prepare(
    store: &BufferStore,
    name: &str,
    passphrase: Option<&[u8]>,
) -> Result<(DownloadSlot, SecBytes), Error> {
    let handle = store.get(name)?;

    if handle.is_expired()? {
        log::trace!(target: "vanish", "Refusing expired buffer {name}");
        let _ = store.destroy(name);
        return Err(Error::NotFound(name.to_string()));
    }

    let slot = match handle.begin_download() {
        Ok(slot) => slot,
        Err(err @ Error::LimitReached(_)) => {
            reap_if_exhausted(store, &handle);
            return Err(err);
        }
        Err(err) => return Err(err),
    };

    handle.verify_integrity()?;

    let content = if handle.is_encrypted()? {
        let passphrase = passphrase
            .filter(|passphrase| !passphrase.is_empty())
            .ok_or_else(|| Error::validation(format!("buffer {name} requires a passphrase")))?;
        handle.decrypt(passphrase)?
    } else {
        handle.read_payload()?
    };

    Ok((slot, content))
}

fn finish<R>(store: &BufferStore, slot: DownloadSlot, output: R) -> Delivered<R> {
    let name = slot.name().to_string();
    let status = match slot.complete() {
        Ok(status) => status,
        // destroyed while the content was in flight; the delivery itself completed
        Err(err) => {
            log::debug!(target: "vanish", "Buffer {name} vanished during delivery: {err}");
            DownloadStatus::LimitReached
        }
    };

    if status == DownloadStatus::LimitReached {
        let _ = store.destroy(&name);
    }

    Delivered { output, status }
}

/// In-flight reservations also refuse new downloads. The buffer is only destroyed once
/// every permitted download has actually completed
fn reap_if_exhausted(store: &BufferStore, handle: &BufferHandle) {
    if handle.limit_reached().unwrap_or(false) {
        let _ = store.destroy(handle.name());
    }
}
