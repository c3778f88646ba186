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

//! Pooled SSH transport used by hardware discovery, the BIOS pipeline, and
//! the vendor toolchain provisioner to talk to freshly-commissioned hosts.
//!
//! Known-hosts verification is intentionally disabled
//! ([`async_ssh2_tokio::ServerCheckMethod::NoCheck`]): commissioning
//! networks are short-lived and the host key of a machine that was
//! re-imaged five minutes ago is not a meaningful trust anchor.

mod error;
mod pool;
mod transport;

pub use error::SshError;
pub use pool::SshPool;
pub use transport::CommandResult;
