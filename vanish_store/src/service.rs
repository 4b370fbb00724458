//! Lifecycle of a running store
//!
//! A [`VaultService`] owns the store together with its sweep task. Nothing about the
//! sweep is global: the cancellation token and join handle live here, and
//! [`VaultService::shutdown`] cancels the sweep, waits for it to finish and then destroys
//! every remaining buffer. Dropping the service without shutting it down still cancels
//! the sweep.

use crate::config::StoreConfig;
use crate::delivery::{self, Delivered};
use crate::names::{NameSource, SillyNames};
use crate::store::BufferStore;
use std::future::Future;
use std::sync::Arc;
use vanish_crypt::hardening::disable_core_dumps;
use vanish_crypt::secure_buffer::sec_bytes::SecBytes;
use vanish_crypt::secure_buffer::{BufferHandle, SecureBuffer, SecureBufferBuilder};
use vanish_io::tokio::task::JoinHandle;
use vanish_io::{tokio, CancellationToken};
use vanish_types::errors::Error;

pub struct VaultService {
    store: Arc<BufferStore>,
    names: Arc<dyn NameSource>,
    config: StoreConfig,
    token: CancellationToken,
    sweep: Option<JoinHandle<()>>,
}

impl VaultService {
    /// Starts a service over a fresh store with the system clock. Must be called from
    /// within a tokio runtime
    pub fn start(config: StoreConfig) -> Result<Self, Error> {
        Self::start_with(config, Arc::new(BufferStore::new()), Arc::new(SillyNames))
    }

    pub fn start_with(
        config: StoreConfig,
        store: Arc<BufferStore>,
        names: Arc<dyn NameSource>,
    ) -> Result<Self, Error> {
        config.validate()?;

        if config.disable_core_dumps {
            if let Err(err) = disable_core_dumps() {
                log::warn!(target: "vanish", "Continuing with core dumps enabled: {err}");
            }
        }

        let token = CancellationToken::new();
        let sweep = tokio::spawn(
            store
                .clone()
                .run_sweep(token.clone(), config.sweep_interval),
        );

        log::trace!(target: "vanish", "Vault service started ({config:?})");
        Ok(Self {
            store,
            names,
            config,
            token,
            sweep: Some(sweep),
        })
    }

    pub fn store(&self) -> &Arc<BufferStore> {
        &self.store
    }

    pub fn config(&self) -> &StoreConfig {
        &self.config
    }

    /// A builder stamped with the store's clock and memory policy
    pub fn builder(&self, payload: Vec<u8>) -> SecureBufferBuilder {
        self.store.builder(payload)
    }

    /// Registers a new buffer under a freshly generated name
    pub fn upload<F>(&self, build: F) -> Result<BufferHandle, Error>
    where
        F: FnMut(&str) -> Result<SecureBuffer, Error>,
    {
        self.store
            .add_with_fresh_name(self.names.as_ref(), self.config.name_attempts, build)
    }

    pub async fn download<F, Fut, R>(
        &self,
        name: &str,
        passphrase: Option<&[u8]>,
        deliver: F,
    ) -> Result<Delivered<R>, Error>
    where
        F: FnOnce(SecBytes) -> Fut,
        Fut: Future<Output = Result<R, Error>>,
    {
        delivery::serve_download_async(&self.store, name, passphrase, deliver).await
    }

    /// Stops the sweep, waits for it, then destroys every buffer. The store is emptied
    /// even when the sweep task panicked; its join error takes precedence in the result
    pub async fn shutdown(mut self) -> Result<(), Error> {
        self.token.cancel();
        let joined = match self.sweep.take() {
            Some(sweep) => sweep
                .await
                .map_err(|err| Error::resource(format!("Sweep task failed: {err}"))),
            None => Ok(()),
        };

        if let Err(err) = &joined {
            log::error!(target: "vanish", "Destroying every buffer after a failed sweep: {err}");
        }

        let destroyed = self.store.destroy_all();
        log::trace!(target: "vanish", "Vault service shut down");
        joined.and(destroyed)
    }
}

impl Drop for VaultService {
    fn drop(&mut self) {
        self.token.cancel();
    }
}

#[cfg(test)]
mod tests {
    use super::VaultService;
    use crate::config::StoreConfig;
    use crate::names::SillyNames;
    use crate::store::BufferStore;
    use chrono::{DateTime, Utc};
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::Arc;
    use std::time::Duration;
    use vanish_types::clock::{Clock, SharedClock};
    use vanish_types::errors::Error;

    /// Panics once `broken` is set, taking the sweep task down with it
    #[derive(Default)]
    struct BreakingClock {
        broken: AtomicBool,
    }

    impl Clock for BreakingClock {
        fn now(&self) -> DateTime<Utc> {
            if self.broken.load(Ordering::SeqCst) {
                panic!("clock failure");
            }
            Utc::now()
        }
    }

    #[tokio::test]
    async fn shutdown_joins_the_sweep_and_empties_the_store() {
        let service = VaultService::start(
            StoreConfig::default()
                .with_sweep_interval(Duration::from_millis(20))
                .with_core_dumps_disabled(false),
        )
        .unwrap();
        let handle = service
            .upload(|name| service.builder(b"kiwi".to_vec()).build(name))
            .unwrap();
        assert!(service.store().exists(handle.name()));

        let store = service.store().clone();
        service.shutdown().await.unwrap();
        assert!(store.is_empty());
        assert!(!handle.is_live());
    }

    #[tokio::test]
    async fn shutdown_empties_the_store_after_the_sweep_panicked() {
        let clock = Arc::new(BreakingClock::default());
        let store = Arc::new(BufferStore::with_clock(clock.clone() as SharedClock));
        let service = VaultService::start_with(
            StoreConfig::default()
                .with_sweep_interval(Duration::from_millis(10))
                .with_core_dumps_disabled(false),
            store.clone(),
            Arc::new(SillyNames),
        )
        .unwrap();
        let handle = service
            .upload(|name| service.builder(b"walnut".to_vec()).build(name))
            .unwrap();

        clock.broken.store(true, Ordering::SeqCst);
        tokio::time::sleep(Duration::from_millis(100)).await;

        let res = service.shutdown().await;
        assert!(matches!(res, Err(Error::Resource(_))));
        assert!(store.is_empty());
        assert!(!handle.is_live());
    }

    #[tokio::test]
    async fn invalid_config_is_rejected() {
        assert!(VaultService::start(StoreConfig::default().with_name_attempts(0)).is_err());
    }
}
