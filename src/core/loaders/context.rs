use std::path::Path;

/// What an overlay install runs against.
#[derive(Debug, Clone, Copy)]
pub struct InstallContext<'a> {
    /// Instance root; the base version must already be materialized here.
    pub instance_root: &'a Path,
    pub minecraft_version: &'a str,
    pub loader_version: &'a str,
}
