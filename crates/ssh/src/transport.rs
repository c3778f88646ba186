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
use std::time::Duration;

use async_ssh2_tokio::{AuthMethod, Client, ServerCheckMethod};

use crate::error::SshError;

/// Configuration for russh's SSH client connections.
///
/// Some BMCs use a Diffie-Hellman group size of 2048, which is not allowed
/// by russh's defaults, so it has to be widened explicitly.
pub(crate) fn russh_client_config() -> russh::client::Config {
    russh::client::Config {
        gex: russh::client::GexParams::new(2048, 8192, 8192)
            .expect("BUG: static DH group parameters must be valid"),
        keepalive_interval: Some(Duration::from_secs(60)),
        keepalive_max: 2,
        window_size: 2097152 * 3,
        maximum_packet_size: 65535,
        ..Default::default()
    }
}

pub(crate) async fn connect(
    addr: SocketAddr,
    username: &str,
    password: &str,
) -> Result<Client, SshError> {
    let auth_method = AuthMethod::with_password(password);
    Client::connect_with_config(
        addr,
        username,
        auth_method,
        ServerCheckMethod::NoCheck,
        russh_client_config(),
    )
    .await
    .map_err(|source| {
        if is_auth_failure(&source) {
            SshError::AuthError {
                host: addr.to_string(),
                user: username.to_string(),
            }
        } else {
            SshError::ConnectError {
                host: addr.to_string(),
                source,
            }
        }
    })
}

fn is_auth_failure(err: &async_ssh2_tokio::Error) -> bool {
    // async-ssh2-tokio surfaces authentication rejection and connection
    // failure through the same error type; the message is the only signal.
    err.to_string().to_lowercase().contains("auth")
}

pub struct CommandResult {
    pub stdout: String,
    pub stderr: String,
    pub exit_status: u32,
}

pub(crate) async fn execute(
    client: &Client,
    host: &str,
    cmd: &str,
    timeout: Duration,
) -> Result<CommandResult, SshError> {
    let result = tokio::time::timeout(timeout, client.execute(cmd))
        .await
        .map_err(|_| SshError::TimeoutError {
            host: host.to_string(),
            elapsed: timeout.into(),
        })?
        .map_err(|source| SshError::Transport {
            host: host.to_string(),
            source,
        })?;

    Ok(CommandResult {
        stdout: result.stdout,
        stderr: result.stderr,
        exit_status: result.exit_status,
    })
}

pub(crate) async fn put(
    client: &Client,
    host: &str,
    local_path: &Path,
    remote_path: &str,
    timeout: Duration,
) -> Result<(), SshError> {
    let local = local_path.display().to_string();
    tokio::time::timeout(
        timeout,
        client.upload_file(local, remote_path.to_string(), None, None, false),
    )
    .await
    .map_err(|_| SshError::TimeoutError {
        host: host.to_string(),
        elapsed: timeout.into(),
    })?
    .map_err(|source| {
        tracing::error!(%host, remote_path, "error during client.upload_file: {source:?}");
        SshError::Transport {
            host: host.to_string(),
            source,
        }
    })
}

pub(crate) async fn get(
    client: &Client,
    host: &str,
    remote_path: &str,
    local_path: &Path,
    timeout: Duration,
) -> Result<(), SshError> {
    let local = local_path.display().to_string();
    tokio::time::timeout(
        timeout,
        client.download_file(remote_path.to_string(), local, None),
    )
    .await
    .map_err(|_| SshError::TimeoutError {
        host: host.to_string(),
        elapsed: timeout.into(),
    })?
    .map_err(|source| SshError::Transport {
        host: host.to_string(),
        source,
    })
}
