/*
 * SPDX-FileCopyrightText: Copyright (c) 2025 NVIDIA CORPORATION & AFFILIATES. All rights reserved.
 * SPDX-License-Identifier: LicenseRef-NvidiaProprietary
 *
 * NVIDIA CORPORATION, its affiliates and licensors retain all intellectual
 * property and proprietary rights in and to this material, related
 * documentation and any modifications thereto. Any use, reproduction,
 * disclosure or distribution of this material and related documentation
 * without an express license agreement from NVIDIA CORPORATION or
 * its affiliates is strictly prohibited.
 */

use std::net::SocketAddr;
use std::path::Path;
use std::sync::Arc;
use std::time::{Duration, Instant};

use async_ssh2_tokio::Client;
use dashmap::DashMap;
use tokio::sync::{Mutex, Semaphore};

use crate::error::SshError;
use crate::transport::{self, CommandResult};

const DEFAULT_TIMEOUT: Duration = Duration::from_secs(60);
const IDLE_EVICTION: Duration = Duration::from_secs(5 * 60);
const MAX_SESSIONS_PER_HOST: usize = 4;

#[derive(Debug, Clone, Eq, PartialEq, Hash)]
struct PoolKey {
    host: SocketAddr,
    user: String,
}

struct PooledEntry {
    client: Mutex<Option<Client>>,
    concurrency: Semaphore,
    last_used: Mutex<Instant>,
}

/// A pool of SSH sessions keyed by `(host, user)`.
///
/// At most [`MAX_SESSIONS_PER_HOST`] concurrent sessions are allowed per
/// host, and connections idle for [`IDLE_EVICTION`] are dropped by a
/// background sweep. No operation retries on failure here; see
/// [`SshError::is_transient`] for what a caller should retry.
pub struct SshPool {
    entries: DashMap<PoolKey, Arc<PooledEntry>>,
}

impl Default for SshPool {
    fn default() -> Self {
        Self::new()
    }
}

impl SshPool {
    pub fn new() -> Self {
        Self {
            entries: DashMap::new(),
        }
    }

    /// Spawns the idle-eviction sweep. The returned handle aborts the task
    /// when dropped.
    pub fn spawn_eviction_sweep(self: &Arc<Self>) -> tokio::task::JoinHandle<()> {
        let pool = self.clone();
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(Duration::from_secs(30));
            loop {
                interval.tick().await;
                pool.evict_idle().await;
            }
        })
    }

    async fn evict_idle(&self) {
        let mut to_remove = Vec::new();
        for entry in self.entries.iter() {
            let last_used = *entry.value().last_used.lock().await;
            if last_used.elapsed() >= IDLE_EVICTION {
                to_remove.push(entry.key().clone());
            }
        }
        for key in to_remove {
            tracing::debug!(host = %key.host, user = %key.user, "evicting idle SSH session");
            self.entries.remove(&key);
        }
    }

    async fn entry(&self, host: SocketAddr, user: &str) -> Arc<PooledEntry> {
        let key = PoolKey {
            host,
            user: user.to_string(),
        };
        self.entries
            .entry(key)
            .or_insert_with(|| {
                Arc::new(PooledEntry {
                    client: Mutex::new(None),
                    concurrency: Semaphore::new(MAX_SESSIONS_PER_HOST),
                    last_used: Mutex::new(Instant::now()),
                })
            })
            .clone()
    }

    async fn with_client<F, Fut, T>(
        &self,
        host: SocketAddr,
        user: &str,
        password: &str,
        f: F,
    ) -> Result<T, SshError>
    where
        F: FnOnce(Client) -> Fut,
        Fut: std::future::Future<Output = (Client, Result<T, SshError>)>,
    {
        let entry = self.entry(host, user).await;
        let _permit = entry
            .concurrency
            .acquire()
            .await
            .expect("semaphore is never closed");

        let mut guard = entry.client.lock().await;
        let client = match guard.take() {
            Some(client) => client,
            None => transport::connect(host, user, password).await?,
        };

        let (client, result) = f(client).await;
        *entry.last_used.lock().await = Instant::now();

        // Only keep the connection around on success; a failed call may have
        // left the transport in an unknown state.
        if result.is_ok() {
            *guard = Some(client);
        }

        result
    }

    /// Executes `cmd` on `host` as `user`, with `timeout` (defaulting to 60s).
    pub async fn exec(
        &self,
        host: SocketAddr,
        user: &str,
        password: &str,
        cmd: &str,
        timeout: Option<Duration>,
    ) -> Result<CommandResult, SshError> {
        let timeout = timeout.unwrap_or(DEFAULT_TIMEOUT);
        let host_str = host.to_string();
        let cmd = cmd.to_string();
        self.with_client(host, user, password, move |client| async move {
            let result = transport::execute(&client, &host_str, &cmd, timeout).await;
            (client, result)
        })
        .await
    }

    pub async fn put(
        &self,
        host: SocketAddr,
        user: &str,
        password: &str,
        local_path: &Path,
        remote_path: &str,
        timeout: Option<Duration>,
    ) -> Result<(), SshError> {
        let timeout = timeout.unwrap_or(DEFAULT_TIMEOUT);
        let host_str = host.to_string();
        let local_path = local_path.to_path_buf();
        let remote_path = remote_path.to_string();
        self.with_client(host, user, password, move |client| async move {
            let result = transport::put(&client, &host_str, &local_path, &remote_path, timeout)
                .await;
            (client, result)
        })
        .await
    }

    pub async fn get(
        &self,
        host: SocketAddr,
        user: &str,
        password: &str,
        remote_path: &str,
        local_path: &Path,
        timeout: Option<Duration>,
    ) -> Result<(), SshError> {
        let timeout = timeout.unwrap_or(DEFAULT_TIMEOUT);
        let host_str = host.to_string();
        let remote_path = remote_path.to_string();
        let local_path = local_path.to_path_buf();
        self.with_client(host, user, password, move |client| async move {
            let result = transport::get(&client, &host_str, &remote_path, &local_path, timeout)
                .await;
            (client, result)
        })
        .await
    }

    #[cfg(test)]
    pub(crate) fn session_count(&self) -> usize {
        self.entries.len()
    }
}
