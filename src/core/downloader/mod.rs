pub mod client;
pub mod coordinator;

pub use client::{Downloader, FileProgress, FileSource, ManifestFile};
pub use coordinator::{percent_for, DownloadCoordinator};
