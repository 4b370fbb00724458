//! Periodic reaping of expired buffers
//!
//! Each cycle snapshots the names that are due under the map's read lock, releases it,
//! and only then destroys them one at a time. A name that was destroyed and re-added
//! between the snapshot and the destroy is re-checked, so a fresh buffer is never
//! reaped in place of its predecessor.

use crate::store::BufferStore;
use std::sync::Arc;
use std::time::Duration;
use vanish_io::tokio;
use vanish_io::CancellationToken;

impl BufferStore {
    /// Runs one sweep cycle and returns how many buffers were reaped. A failing destroy is
    /// logged and does not stop the cycle
    pub fn sweep_once(&self) -> usize {
        let due: Vec<String> = self
            .buffers
            .read()
            .iter()
            .filter(|(_, buffer)| buffer.is_due_for_reap())
            .map(|(name, _)| name.clone())
            .collect();

        let mut reaped = 0;
        for name in due {
            let Some(buffer) = self.lookup(&name) else {
                continue;
            };

            if !buffer.is_due_for_reap() {
                continue;
            }

            // the entry is gone even when releasing its pin failed
            if let Err(err) = self.retire(&name, &buffer) {
                log::error!(target: "vanish", "Sweep reaped {name} in a degraded state: {err}");
            }
            reaped += 1;
        }

        reaped
    }

    /// Sweeps every `interval` until `token` is cancelled. Cancellation interrupts the
    /// wait between cycles, so the task can be joined promptly on shutdown
    pub async fn run_sweep(self: Arc<Self>, token: CancellationToken, interval: Duration) {
        log::trace!(target: "vanish", "Sweep started with interval {interval:?}");
        loop {
            tokio::select! {
                _ = token.cancelled() => break,
                _ = tokio::time::sleep(interval) => {}
            }

            let reaped = self.sweep_once();
            if reaped > 0 {
                log::debug!(target: "vanish", "Sweep reaped {reaped} buffers");
            }
        }

        log::trace!(target: "vanish", "Sweep stopped");
    }
}

#[cfg(test)]
mod tests {
    use crate::store::BufferStore;
    use chrono::Duration as ChronoDuration;
    use std::sync::Arc;
    use std::time::Duration;
    use vanish_crypt::secure_memory::SecureMemory;
    use vanish_io::CancellationToken;
    use vanish_types::clock::ManualClock;
    use vanish_types::errors::Error;

    struct StickyMemory;

    impl SecureMemory for StickyMemory {
        fn pin(&self, _region: &[u8]) -> Result<(), Error> {
            Ok(())
        }

        fn unpin(&self, _region: &[u8]) -> Result<(), Error> {
            Err(Error::resource("munlock refused"))
        }
    }

    #[test]
    fn sweep_reaps_expired_and_exhausted_buffers() {
        let clock = ManualClock::new();
        let store = BufferStore::with_clock(clock.shared());
        let plum = store
            .add(store.builder(b"plum".to_vec()).build("plum").unwrap())
            .unwrap();
        plum.set_expiration("1m").unwrap();
        let apple = store
            .add(
                store
                    .builder(b"apple".to_vec())
                    .with_download_limit(1)
                    .build("apple")
                    .unwrap(),
            )
            .unwrap();
        let _ = store
            .add(store.builder(b"fig".to_vec()).build("fig").unwrap())
            .unwrap();

        assert_eq!(store.sweep_once(), 0);
        let _ = apple.record_download().unwrap();
        clock.advance(ChronoDuration::seconds(61));

        assert_eq!(store.sweep_once(), 2);
        assert!(!store.exists("plum"));
        assert!(!store.exists("apple"));
        assert!(store.exists("fig"));
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn sweep_keeps_reaping_after_a_failed_unpin() {
        let clock = ManualClock::new();
        let store = BufferStore::with_parts(clock.shared(), Arc::new(StickyMemory));
        let expiring: Vec<_> = ["walnut", "pecan", "hazel"]
            .into_iter()
            .map(|name| {
                let buffer = store
                    .builder(name.as_bytes().to_vec())
                    .with_expiration(Duration::from_secs(60))
                    .build(name)
                    .unwrap();
                store.add(buffer).unwrap()
            })
            .collect();
        let _ = store
            .add(store.builder(b"almond".to_vec()).build("almond").unwrap())
            .unwrap();

        clock.advance(ChronoDuration::seconds(61));
        assert_eq!(store.sweep_once(), 3);
        assert!(expiring.iter().all(|handle| !handle.is_live()));
        assert_eq!(store.names(), vec!["almond".to_string()]);
    }

    #[tokio::test]
    async fn cancelled_sweep_stops_promptly() {
        let store = Arc::new(BufferStore::new());
        let token = CancellationToken::new();
        let task = tokio::spawn(store.run_sweep(token.clone(), Duration::from_secs(3600)));
        token.cancel();
        tokio::time::timeout(Duration::from_secs(5), task)
            .await
            .unwrap()
            .unwrap();
    }
}
