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

/// Failure modes for a single remote operation.
///
/// There is deliberately no retry logic at this layer: the caller (the
/// workflow engine) decides which of these are worth retrying.
#[derive(thiserror::Error, Debug)]
pub enum SshError {
    #[error("failed to connect to {host}: {source}")]
    ConnectError {
        host: String,
        #[source]
        source: async_ssh2_tokio::Error,
    },

    #[error("authentication failed for {user}@{host}")]
    AuthError { host: String, user: String },

    #[error("operation on {host} timed out after {elapsed}")]
    TimeoutError {
        host: String,
        elapsed: humantime::Duration,
    },

    #[error("command `{cmd}` on {host} exited with status {exit_status}: {stderr}")]
    RemoteNonZero {
        host: String,
        cmd: String,
        exit_status: u32,
        stderr: String,
    },

    #[error("transport error talking to {host}: {source}")]
    Transport {
        host: String,
        #[source]
        source: async_ssh2_tokio::Error,
    },
}

impl SshError {
    /// Transient errors are worth retrying at the workflow level; everything
    /// else represents a condition that will not resolve itself.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            SshError::ConnectError { .. } | SshError::TimeoutError { .. } | SshError::AuthError { .. }
        )
    }
}
