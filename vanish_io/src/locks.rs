//! Lock aliases backed by parking_lot.
//!
//! parking_lot locks never poison, so a panic inside one request handler cannot render a
//! buffer or the registry permanently unusable for every other request.

/// Guards a single value with exclusive access.
pub type Mutex<T> = parking_lot::Mutex<T>;

pub type MutexGuard<'a, T> = parking_lot::MutexGuard<'a, T>;

/// Many concurrent readers or one writer. Used for the registry map and for each
/// buffer's state, where checksum verification and expiry checks share access but
/// destroy needs it exclusively.
pub type RwLock<T> = parking_lot::RwLock<T>;

pub type RwLockReadGuard<'a, T> = parking_lot::RwLockReadGuard<'a, T>;

pub type RwLockWriteGuard<'a, T> = parking_lot::RwLockWriteGuard<'a, T>;
