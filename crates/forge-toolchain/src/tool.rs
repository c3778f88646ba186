use bmc_vendor::BMCVendor;

/// The vendor CLI tools this crate knows how to install: Supermicro,
/// HPE, and Dell.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub enum VendorTool {
    SumTool,
    IloRest,
    Ssacli,
    Racadm,
}

impl VendorTool {
    /// The binary name probed with `which` and invoked with `--version`.
    pub fn binary_name(self) -> &'static str {
        match self {
            VendorTool::SumTool => "sumtool",
            VendorTool::IloRest => "ilorest",
            VendorTool::Ssacli => "ssacli",
            VendorTool::Racadm => "racadm",
        }
    }

    pub fn install_dir(self) -> String {
        format!("/opt/{}", self.binary_name())
    }

    /// Tools required for a given vendor's BIOS/firmware operations.
    pub fn for_vendor(vendor: BMCVendor) -> Vec<VendorTool> {
        match vendor {
            BMCVendor::Supermicro => vec![VendorTool::SumTool],
            BMCVendor::Hpe => vec![VendorTool::IloRest, VendorTool::Ssacli],
            BMCVendor::Dell => vec![VendorTool::Racadm],
            _ => vec![],
        }
    }
}

/// Per-step policy chosen at workflow assembly time: whether a missing
/// tool is a hard failure or should degrade the step.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub enum ToolPolicy {
    HardRequire,
    DegradeToDummy,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn supermicro_requires_sumtool() {
        assert_eq!(VendorTool::for_vendor(BMCVendor::Supermicro), vec![VendorTool::SumTool]);
    }

    #[test]
    fn unknown_vendor_requires_nothing() {
        assert!(VendorTool::for_vendor(BMCVendor::Unknown).is_empty());
    }
}
