//! Pinning and scrubbing of byte regions
//!
//! Payloads and decrypted plaintext are pinned so the kernel neither swaps them to disk
//! nor writes them into a core dump, and are overwritten with zeros before their memory
//! is handed back. Pinning is best-effort: when the platform refuses (for instance
//! because `RLIMIT_MEMLOCK` is exhausted) the caller logs the failure and carries on
//! with an unpinned region, which is still scrubbed on release.
//!
//! # Important Notes
//!
//! - Pinning an empty region is a no-op and never fails
//! - [`SecureMemory::unpin_and_scrub`] always zeroes the region before releasing the pin
//! - A pinned `Vec` must not grow afterwards, since reallocation would move the bytes
//!   out of the pinned range

use std::sync::Arc;
use vanish_types::errors::Error;
use zeroize::Zeroize;

/// Platform abstraction over memory locking
pub trait SecureMemory: Send + Sync + 'static {
    /// Advises the OS not to swap or dump the region
    fn pin(&self, region: &[u8]) -> Result<(), Error>;

    /// Releases a pin previously taken with [`SecureMemory::pin`]
    fn unpin(&self, region: &[u8]) -> Result<(), Error>;

    /// Overwrites the region with zeros, then releases its pin. The region is scrubbed
    /// even if releasing the pin fails
    fn unpin_and_scrub(&self, region: &mut [u8]) -> Result<(), Error> {
        region.zeroize();
        self.unpin(region)
    }
}

/// Shared handle to the memory policy a buffer was created with
pub type SharedMemory = Arc<dyn SecureMemory>;

/// Uses the operating system's locking primitive (`mlock` on unix, `VirtualLock` on
/// windows). On platforms without one, pins are silently skipped
#[derive(Default, Debug, Copy, Clone)]
pub struct PlatformMemory;

/// Never pins; only scrubs. Useful where locked memory is known to be unavailable
#[derive(Default, Debug, Copy, Clone)]
pub struct ScrubOnlyMemory;

/// The memory policy used when the caller does not choose one
pub fn platform_memory() -> SharedMemory {
    Arc::new(PlatformMemory)
}

impl SecureMemory for PlatformMemory {
    fn pin(&self, region: &[u8]) -> Result<(), Error> {
        if region.is_empty() {
            return Ok(());
        }

        unsafe { mlock(region.as_ptr(), region.len()) }
    }

    fn unpin(&self, region: &[u8]) -> Result<(), Error> {
        if region.is_empty() {
            return Ok(());
        }

        unsafe { munlock(region.as_ptr(), region.len()) }
    }
}

impl SecureMemory for ScrubOnlyMemory {
    fn pin(&self, _region: &[u8]) -> Result<(), Error> {
        Ok(())
    }

    fn unpin(&self, _region: &[u8]) -> Result<(), Error> {
        Ok(())
    }
}

/// Locks-down the memory location, preventing it from being swapped out or dumped
/// # Safety
///
/// `ptr` must point to `len` readable bytes
#[cfg(target_family = "unix")]
unsafe fn mlock(ptr: *const u8, len: usize) -> Result<(), Error> {
    use std::os::raw::c_void;
    // dump exclusion is advisory and requires page alignment; failure is ignored
    #[cfg(any(target_os = "freebsd", target_os = "dragonfly"))]
    let _ = libc::madvise(ptr as *mut c_void, len, libc::MADV_NOCORE);
    #[cfg(target_os = "linux")]
    let _ = libc::madvise(ptr as *mut c_void, len, libc::MADV_DONTDUMP);

    if libc::mlock(ptr as *const c_void, len) != 0 {
        return Err(Error::resource(format!(
            "mlock of {len} bytes failed: {}",
            std::io::Error::last_os_error()
        )));
    }

    Ok(())
}

/// # Safety
///
/// `ptr` must point to `len` readable bytes
#[cfg(target_family = "unix")]
unsafe fn munlock(ptr: *const u8, len: usize) -> Result<(), Error> {
    use std::os::raw::c_void;
    if libc::munlock(ptr as *const c_void, len) != 0 {
        return Err(Error::resource(format!(
            "munlock of {len} bytes failed: {}",
            std::io::Error::last_os_error()
        )));
    }

    #[cfg(any(target_os = "freebsd", target_os = "dragonfly"))]
    let _ = libc::madvise(ptr as *mut c_void, len, libc::MADV_CORE);
    #[cfg(target_os = "linux")]
    let _ = libc::madvise(ptr as *mut c_void, len, libc::MADV_DODUMP);

    Ok(())
}

/// For windows, VirtualLock returns nonzero if successful
#[cfg(target_family = "windows")]
unsafe fn mlock(ptr: *const u8, len: usize) -> Result<(), Error> {
    if kernel32::VirtualLock(ptr as _, len as u64) == 0 {
        return Err(Error::resource(format!(
            "VirtualLock of {len} bytes failed: {}",
            std::io::Error::last_os_error()
        )));
    }

    Ok(())
}

/// Windows unlocks a page all at once, and reports an error if it is already unlocked
#[cfg(target_family = "windows")]
unsafe fn munlock(ptr: *const u8, len: usize) -> Result<(), Error> {
    if kernel32::VirtualUnlock(ptr as _, len as u64) == 0 {
        return Err(Error::resource(format!(
            "VirtualUnlock of {len} bytes failed: {}",
            std::io::Error::last_os_error()
        )));
    }

    Ok(())
}

#[cfg(not(any(target_family = "unix", target_family = "windows")))]
unsafe fn mlock(_ptr: *const u8, _len: usize) -> Result<(), Error> {
    Ok(())
}

#[cfg(not(any(target_family = "unix", target_family = "windows")))]
unsafe fn munlock(_ptr: *const u8, _len: usize) -> Result<(), Error> {
    Ok(())
}
