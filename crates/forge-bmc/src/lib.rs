//! IPMI and Redfish adapters: thin, vendor-agnostic wrappers around the
//! two out-of-band management interfaces a BMC exposes.

mod error;
mod ipmi;
mod redfish;
mod types;

pub use error::BmcError;
pub use ipmi::{IpmiAdapter, IpmiConfig};
pub use redfish::{RedfishClient, RedfishConfig};
pub use types::BmcInfo;
