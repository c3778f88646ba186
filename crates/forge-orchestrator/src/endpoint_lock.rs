//! Per-endpoint serialization: two workflows targeting the same
//! `machine_ip`/`ipmi_ip` never run concurrently. Implemented as a
//! `dashmap` of lazily-created mutexes rather than a global lock, so
//! unrelated endpoints never contend with each other.

use std::sync::Arc;

use dashmap::DashMap;
use forge_core::ForgeError;
use tokio::sync::{Mutex, OwnedMutexGuard};

#[derive(Default)]
pub struct EndpointLocks {
    locks: DashMap<String, Arc<Mutex<()>>>,
}

impl EndpointLocks {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fails immediately with `EndpointBusy` rather than waiting — the
    /// caller (`StartProvision`) surfaces that straight to the second
    /// caller instead of queuing behind the first workflow.
    pub fn try_acquire(&self, endpoint: &str) -> Result<OwnedMutexGuard<()>, ForgeError> {
        let mutex = self.mutex_for(endpoint);
        mutex.try_lock_owned().map_err(|_| ForgeError::EndpointBusy {
            endpoint: endpoint.to_string(),
        })
    }

    /// Waits for the endpoint to become free rather than failing
    /// immediately — the `!require_exclusive` path of `StartProvision`.
    pub async fn acquire(&self, endpoint: &str) -> OwnedMutexGuard<()> {
        self.mutex_for(endpoint).lock_owned().await
    }

    fn mutex_for(&self, endpoint: &str) -> Arc<Mutex<()>> {
        self.locks.entry(endpoint.to_string()).or_insert_with(|| Arc::new(Mutex::new(()))).clone()
    }
}
