//! The registry that owns every live buffer
//!
//! # Lock discipline
//!
//! The map lock guards membership only. It is never held while a buffer's own lock is
//! taken for writing: [`BufferStore::destroy`] clones the entry out, releases the map,
//! destroys the buffer, then re-takes the map to remove the entry (only if it still maps
//! to the same buffer). `add`, `get` and `exists` are each a single critical section, so
//! no caller can observe a partially added buffer.

use crate::names::NameSource;
use std::collections::hash_map::Entry;
use std::collections::HashMap;
use std::fmt::{Debug, Formatter};
use std::sync::Arc;
use vanish_crypt::secure_buffer::{BufferHandle, SecureBuffer, SecureBufferBuilder};
use vanish_crypt::secure_memory::{platform_memory, SharedMemory};
use vanish_io::RwLock;
use vanish_types::clock::{SharedClock, SystemClock};
use vanish_types::errors::Error;

/// A concurrency-safe mapping from name to [`SecureBuffer`]
pub struct BufferStore {
    pub(crate) buffers: RwLock<HashMap<String, Arc<SecureBuffer>>>,
    clock: SharedClock,
    memory: SharedMemory,
}

impl BufferStore {
    /// A store reading the system clock and pinning through the platform
    pub fn new() -> Self {
        Self::with_parts(SystemClock::shared(), platform_memory())
    }

    pub fn with_clock(clock: SharedClock) -> Self {
        Self::with_parts(clock, platform_memory())
    }

    pub fn with_parts(clock: SharedClock, memory: SharedMemory) -> Self {
        Self {
            buffers: RwLock::new(HashMap::new()),
            clock,
            memory,
        }
    }

    pub fn clock(&self) -> &SharedClock {
        &self.clock
    }

    /// A builder stamped with this store's clock and memory policy
    pub fn builder(&self, payload: Vec<u8>) -> SecureBufferBuilder {
        SecureBufferBuilder::new(payload)
            .with_clock(self.clock.clone())
            .with_memory(self.memory.clone())
    }

    /// Registers `buffer` under its name. A live entry is never replaced and the rejected
    /// buffer is scrubbed as it is dropped. An entry whose buffer is already destroyed
    /// but not yet removed counts as vacant, matching [`BufferStore::exists`]
    pub fn add(&self, buffer: SecureBuffer) -> Result<BufferHandle, Error> {
        let mut buffers = self.buffers.write();
        match buffers.entry(buffer.name().to_string()) {
            Entry::Occupied(entry) if !entry.get().is_destroyed() => {
                Err(Error::DuplicateName(entry.key().clone()))
            }
            Entry::Occupied(mut entry) => {
                let _ = entry.insert(Arc::new(buffer));
                log::trace!(target: "vanish", "Replaced destroyed entry {}", entry.key());
                Ok(BufferHandle::new(entry.get()))
            }
            Entry::Vacant(entry) => {
                let buffer = entry.insert(Arc::new(buffer));
                log::trace!(target: "vanish", "Registered buffer {}", buffer.name());
                Ok(BufferHandle::new(buffer))
            }
        }
    }

    /// Asks `names` for candidates until one is free, builds the buffer under it and
    /// registers it. `build` runs again only if another caller claimed the same name in
    /// the meantime. Fails with the last [`Error::DuplicateName`] after `attempts`
    /// candidates
    pub fn add_with_fresh_name<F>(
        &self,
        names: &dyn NameSource,
        attempts: usize,
        mut build: F,
    ) -> Result<BufferHandle, Error>
    where
        F: FnMut(&str) -> Result<SecureBuffer, Error>,
    {
        let mut last_err = Error::validation("at least one name attempt is required");

        for _ in 0..attempts {
            let candidate = names.next_name();
            if self.exists(&candidate) {
                log::trace!(target: "vanish", "Name {candidate} is taken; retrying");
                last_err = Error::DuplicateName(candidate);
                continue;
            }

            match self.add(build(&candidate)?) {
                Err(err @ Error::DuplicateName(_)) => last_err = err,
                res => return res,
            }
        }

        Err(last_err)
    }

    /// A handle to the named buffer, or [`Error::NotFound`] if it is absent or destroyed
    pub fn get(&self, name: &str) -> Result<BufferHandle, Error> {
        self.buffers
            .read()
            .get(name)
            .filter(|buffer| !buffer.is_destroyed())
            .map(BufferHandle::new)
            .ok_or_else(|| Error::NotFound(name.to_string()))
    }

    pub fn exists(&self, name: &str) -> bool {
        self.buffers
            .read()
            .get(name)
            .map_or(false, |buffer| !buffer.is_destroyed())
    }

    /// Destroys the named buffer and removes its entry. Destroying an absent name is not
    /// an error. The entry is removed even if releasing the pinned region fails
    pub fn destroy(&self, name: &str) -> Result<(), Error> {
        let existing = self.buffers.read().get(name).cloned();
        let Some(buffer) = existing else {
            return Ok(());
        };

        let result = self.retire(name, &buffer);
        if let Err(err) = &result {
            log::warn!(target: "vanish", "Buffer {name} destroyed with an error: {err}");
        }

        result
    }

    /// Destroys and removes every entry. A failure is logged and the remaining entries are
    /// still destroyed; the last error is returned
    pub fn destroy_all(&self) -> Result<(), Error> {
        let drained: Vec<Arc<SecureBuffer>> = self
            .buffers
            .write()
            .drain()
            .map(|(_, buffer)| buffer)
            .collect();

        let count = drained.len();
        let mut last_err = None;
        for buffer in drained {
            if let Err(err) = buffer.destroy() {
                log::error!(target: "vanish", "Unable to destroy buffer {}: {err}", buffer.name());
                last_err = Some(err);
            }
        }

        log::debug!(target: "vanish", "Destroyed {count} buffers");
        last_err.map_or(Ok(()), Err)
    }

    pub(crate) fn retire(&self, name: &str, buffer: &Arc<SecureBuffer>) -> Result<(), Error> {
        let result = buffer.destroy();

        {
            let mut buffers = self.buffers.write();
            let same_entry = buffers
                .get(name)
                .map_or(false, |current| Arc::ptr_eq(current, buffer));
            if same_entry {
                let _ = buffers.remove(name);
            }
        }

        result
    }

    pub(crate) fn lookup(&self, name: &str) -> Option<Arc<SecureBuffer>> {
        self.buffers.read().get(name).cloned()
    }

    /// Number of registered entries
    pub fn len(&self) -> usize {
        self.buffers.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn names(&self) -> Vec<String> {
        self.buffers.read().keys().cloned().collect()
    }
}

impl Default for BufferStore {
    fn default() -> Self {
        Self::new()
    }
}

impl Debug for BufferStore {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BufferStore")
            .field("len", &self.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::BufferStore;
    use crate::names::NameSource;
    use std::sync::Arc;
    use vanish_crypt::secure_memory::SecureMemory;
    use vanish_io::Mutex;
    use vanish_types::clock::SystemClock;
    use vanish_types::errors::Error;

    struct Scripted(Mutex<Vec<&'static str>>);

    /// Pins fine but refuses to let go, as a failing `munlock` would
    struct StickyMemory;

    impl SecureMemory for StickyMemory {
        fn pin(&self, _region: &[u8]) -> Result<(), Error> {
            Ok(())
        }

        fn unpin(&self, _region: &[u8]) -> Result<(), Error> {
            Err(Error::resource("munlock refused"))
        }
    }

    impl NameSource for Scripted {
        fn next_name(&self) -> String {
            self.0.lock().remove(0).to_string()
        }
    }

    fn store() -> BufferStore {
        BufferStore::new()
    }

    #[test]
    fn add_get_destroy() {
        let store = store();
        let handle = store
            .add(store.builder(b"0123456789".to_vec()).build("apple").unwrap())
            .unwrap();
        assert_eq!(handle.name(), "apple");
        assert!(store.exists("apple"));
        assert_eq!(store.get("apple").unwrap().len().unwrap(), 10);

        store.destroy("apple").unwrap();
        assert!(!store.exists("apple"));
        assert!(matches!(store.get("apple"), Err(Error::NotFound(_))));
        assert!(!handle.is_live());
        store.destroy("apple").unwrap();
        store.destroy("never-added").unwrap();
    }

    #[test]
    fn duplicate_names_are_rejected_without_overwriting() {
        let store = store();
        let _ = store
            .add(store.builder(b"first".to_vec()).build("fig").unwrap())
            .unwrap();
        let err = store
            .add(store.builder(b"second".to_vec()).build("fig").unwrap())
            .unwrap_err();
        assert_eq!(err, Error::DuplicateName("fig".to_string()));
        assert_eq!(store.get("fig").unwrap().read_payload().unwrap(), b"first");
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn fresh_names_skip_taken_candidates() {
        let store = store();
        let _ = store
            .add(store.builder(vec![1]).build("taken").unwrap())
            .unwrap();
        let names = Scripted(Mutex::new(vec!["taken", "free"]));
        let handle = store
            .add_with_fresh_name(&names, 2, |name| store.builder(vec![2]).build(name))
            .unwrap();
        assert_eq!(handle.name(), "free");

        let names = Scripted(Mutex::new(vec!["taken", "free"]));
        assert!(matches!(
            store.add_with_fresh_name(&names, 2, |name| store.builder(vec![3]).build(name)),
            Err(Error::DuplicateName(_))
        ));
    }

    #[test]
    fn destroy_all_empties_the_store() {
        let store = store();
        let handles: Vec<_> = ["a", "b", "c"]
            .into_iter()
            .map(|name| store.add(store.builder(vec![9; 32]).build(name).unwrap()).unwrap())
            .collect();
        store.destroy_all().unwrap();
        assert!(store.is_empty());
        assert!(handles.iter().all(|handle| !handle.is_live()));
    }

    #[test]
    fn destroy_all_continues_past_failed_unpins() {
        let store = BufferStore::with_parts(SystemClock::shared(), Arc::new(StickyMemory));
        let handles: Vec<_> = ["a", "b", "c"]
            .into_iter()
            .map(|name| store.add(store.builder(vec![7; 16]).build(name).unwrap()).unwrap())
            .collect();
        assert!(handles
            .iter()
            .all(|handle| store.lookup(handle.name()).unwrap().is_pinned()));

        assert_eq!(
            store.destroy_all(),
            Err(Error::resource("munlock refused"))
        );
        assert!(store.is_empty());
        assert!(handles.iter().all(|handle| !handle.is_live()));
    }

    #[test]
    fn failed_unpin_still_removes_the_entry() {
        let store = BufferStore::with_parts(SystemClock::shared(), Arc::new(StickyMemory));
        let handle = store
            .add(store.builder(b"olive".to_vec()).build("olive").unwrap())
            .unwrap();
        assert!(matches!(store.destroy("olive"), Err(Error::Resource(_))));
        assert!(!store.exists("olive"));
        assert!(store.is_empty());
        assert!(!handle.is_live());
    }

    #[test]
    fn destroyed_buffers_left_in_the_map_are_invisible() {
        let store = store();
        let _ = store
            .add(store.builder(vec![1, 2]).build("plum").unwrap())
            .unwrap();
        store.lookup("plum").unwrap().destroy().unwrap();
        assert!(!store.exists("plum"));
        assert!(matches!(store.get("plum"), Err(Error::NotFound(_))));
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn add_agrees_with_exists_over_a_destroyed_entry() {
        let store = store();
        let stale = store
            .add(store.builder(vec![1, 2]).build("plum").unwrap())
            .unwrap();
        let old = store.lookup("plum").unwrap();
        old.destroy().unwrap();
        assert!(!store.exists("plum"));

        let fresh = store
            .add(store.builder(vec![3, 4]).build("plum").unwrap())
            .unwrap();
        assert_eq!(fresh.read_payload().unwrap(), [3u8, 4]);
        assert!(!stale.is_live());
        assert_eq!(store.len(), 1);

        // retiring the old buffer must leave the replacement in place
        store.retire("plum", &old).unwrap();
        assert!(store.exists("plum"));
        assert!(matches!(
            store.add(store.builder(vec![5]).build("plum").unwrap()),
            Err(Error::DuplicateName(_))
        ));
    }
}
