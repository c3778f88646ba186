use async_trait::async_trait;

use crate::error::BiosError;
use crate::types::{LiveConfig, TargetConfig};

/// The capability set a vendor-specific BIOS backend implements: pull the
/// live configuration, push a target configuration, and report the
/// setting names it knows how to validate (its schema).
///
/// Selected via the device-type registry's vendor field, never via a
/// runtime string match sprinkled through call sites.
#[async_trait]
pub trait VendorAdapter: Send + Sync {
    async fn pull(&self) -> Result<LiveConfig, BiosError>;
    async fn push(&self, target: &TargetConfig) -> Result<(), BiosError>;
    fn schema(&self) -> &[&'static str];
}
