//! Vendor toolchain provisioner: on-demand, in-band install of the
//! vendor CLI a BIOS/firmware step needs (`sumtool`, `ilorest`/`ssacli`,
//! `racadm`), with graceful degradation when every download mirror fails.

mod error;
mod installer;
mod tool;

pub use error::ToolchainError;
pub use installer::ToolInstaller;
pub use tool::{ToolPolicy, VendorTool};
