//! The vendor-agnostic BIOS configuration pipeline: pull, template-merge,
//! delta, validate, push, post-verify.

mod adapter;
mod error;
mod pipeline;
mod types;
mod vendor;

pub use adapter::VendorAdapter;
pub use error::BiosError;
pub use pipeline::apply_bios;
pub use types::{BiosResult, BiosValue, Delta, DeltaEntry, LiveConfig, TargetConfig};
pub use vendor::{DellAdapter, HpeAdapter, SupermicroAdapter};
