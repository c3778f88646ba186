use bmc_vendor::BMCVendor;
use serde::{Deserialize, Serialize};

/// The unified view both the IPMI and Redfish adapters produce.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct BmcInfo {
    pub vendor: BMCVendor,
    pub model: String,
    pub bmc_version: String,
    pub bios_version: String,
    pub mac: String,
    pub ip: String,
}
