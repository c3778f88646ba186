/*
 * SPDX-FileCopyrightText: Copyright (c) 2024 NVIDIA CORPORATION & AFFILIATES. All rights reserved.
 * SPDX-License-Identifier: LicenseRef-NvidiaProprietary
 *
 * NVIDIA CORPORATION, its affiliates and licensors retain all intellectual
 * property and proprietary rights in and to this material, related
 * documentation and any modifications thereto. Any use, reproduction,
 * disclosure or distribution of this material and related documentation
 * without an express license agreement from NVIDIA CORPORATION or
 * its affiliates is strictly prohibited.
 */

//! BMC Manufacturer ID

use std::fmt;

#[derive(Clone, Copy, Debug, Default, Eq, PartialEq, serde::Serialize, serde::Deserialize)]
pub enum BMCVendor {
    Lenovo,
    Dell,
    Supermicro,
    Hpe,
    Nvidia, // DPU, Viking, Oberon
    Liteon,
    #[serde(other)]
    #[default]
    Unknown,
}

impl fmt::Display for BMCVendor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = format!("{self:?}").to_lowercase();
        write!(f, "{s}")
    }
}

impl From<&str> for BMCVendor {
    fn from(s: &str) -> BMCVendor {
        match s.to_lowercase().as_str() {
            "lenovo" => BMCVendor::Lenovo,
            "dell" => BMCVendor::Dell,
            "supermicro" => BMCVendor::Supermicro,
            "hpe" => BMCVendor::Hpe,
            "nvidia" => BMCVendor::Nvidia,
            "liteon" => BMCVendor::Liteon,
            _ => BMCVendor::Unknown,
        }
    }
}

impl BMCVendor {
    /// From the string libudev returns querying the dmi subsystem
    pub fn from_udev_dmi(s: &str) -> BMCVendor {
        match s {
            "Lenovo" => BMCVendor::Lenovo,
            "Dell Inc." => BMCVendor::Dell,
            "https://www.mellanox.com" => BMCVendor::Nvidia,
            "NVIDIA" => BMCVendor::Nvidia,
            "Supermicro" => BMCVendor::Supermicro,
            "HPE" => BMCVendor::Hpe,
            _ => BMCVendor::Unknown,
        }
    }

    /// BMC vendors issue their own TLS certs. Match on the Organization in that cert.
    pub fn from_tls_issuer(s: &str) -> BMCVendor {
        match s {
            "Lenovo" => BMCVendor::Lenovo,
            "Dell Inc." => BMCVendor::Dell,
            "Super Micro Computer" => BMCVendor::Supermicro,
            "Hewlett Packard Enterprise" => BMCVendor::Hpe,
            "American Megatrends International LLC (AMI)" => BMCVendor::Nvidia,
            "OpenBMC" => BMCVendor::Nvidia,
            _ => BMCVendor::Unknown,
        }
    }

    /// to_pascalcase converts to StringLikeThis to match serialization
    pub fn to_pascalcase(self) -> String {
        match self {
            BMCVendor::Lenovo => "Lenovo",
            BMCVendor::Dell => "Dell",
            BMCVendor::Supermicro => "Supermicro",
            BMCVendor::Hpe => "Hpe",
            BMCVendor::Nvidia => "Nvidia",
            BMCVendor::Liteon => "Liteon",
            BMCVendor::Unknown => "Unknown",
        }
        .to_string()
    }
    pub fn is_lenovo(&self) -> bool {
        *self == Self::Lenovo
    }

    pub fn is_supermicro(&self) -> bool {
        *self == Self::Supermicro
    }

    pub fn is_nvidia(&self) -> bool {
        *self == Self::Nvidia
    }

    pub fn is_dell(&self) -> bool {
        *self == Self::Dell
    }

    pub fn is_hpe(&self) -> bool {
        *self == Self::Hpe
    }

    pub fn is_liteon(&self) -> bool {
        *self == Self::Liteon
    }

    pub fn is_unknown(&self) -> bool {
        *self == Self::Unknown
    }
}

impl BMCVendor {
    /// From the free-form `Vendor` field on a Redfish `ServiceRoot`.
    pub fn from_redfish_vendor(s: &str) -> BMCVendor {
        match s {
            "Dell" | "Dell Inc." => BMCVendor::Dell,
            "HPE" | "Hpe" => BMCVendor::Hpe,
            "Lenovo" => BMCVendor::Lenovo,
            "LiteOn" | "Liteon" => BMCVendor::Liteon,
            "Supermicro" | "Super Micro Computer" => BMCVendor::Supermicro,
            "AMI" | "NVIDIA" | "Nvidia" => BMCVendor::Nvidia,
            _ => BMCVendor::Unknown,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn udev_dmi_detects_known_vendors() {
        assert_eq!(BMCVendor::from_udev_dmi("Dell Inc."), BMCVendor::Dell);
        assert_eq!(BMCVendor::from_udev_dmi("unknown corp"), BMCVendor::Unknown);
    }

    #[test]
    fn display_is_lowercase() {
        assert_eq!(BMCVendor::Supermicro.to_string(), "supermicro");
    }

    #[test]
    fn unknown_is_default() {
        assert_eq!(BMCVendor::default(), BMCVendor::Unknown);
    }
}
