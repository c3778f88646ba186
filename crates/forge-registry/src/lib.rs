//! Device-type catalog loading and hardware-to-device-type matching.

mod error;
mod matcher;
mod registry;

pub use error::RegistryError;
pub use matcher::MatchCandidate;
pub use registry::DeviceCatalog;
