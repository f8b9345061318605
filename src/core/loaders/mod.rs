pub mod context;
pub mod discovery;
pub mod forge;
pub mod index;
pub mod installer;
pub mod merge;

pub use context::InstallContext;
pub use forge::ForgeInstaller;
pub use index::{ForgeVersion, ForgeVersionIndex};
pub use installer::LoaderInstaller;
