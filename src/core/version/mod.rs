pub mod distribution;
pub mod manifest;
pub mod version_file;

pub use distribution::{DistributionService, MojangDistribution, VersionMetadata};
pub use manifest::{VersionManifest, VersionSummary};
pub use version_file::{is_version_installed, JavaVersionInfo, VersionJson};
