// ─── Overlay Version Discovery ───
// The installer writes its version folder into the shared `versions/` directory
// under a name it picks. We find it by diffing the listing around the install.

use std::collections::BTreeSet;
use std::path::Path;

use tracing::debug;

use crate::core::error::{LauncherError, LauncherResult};

/// Token every Forge version folder carries.
pub const LOADER_TOKEN: &str = "forge";

/// Names of the directories directly under `versions_dir`. A missing directory
/// is an empty listing.
pub async fn snapshot(versions_dir: &Path) -> LauncherResult<BTreeSet<String>> {
    let mut names = BTreeSet::new();
    let mut entries = match tokio::fs::read_dir(versions_dir).await {
        Ok(entries) => entries,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(names),
        Err(e) => return Err(LauncherError::io(versions_dir, e)),
    };

    while let Some(entry) = entries
        .next_entry()
        .await
        .map_err(|e| LauncherError::io(versions_dir, e))?
    {
        let is_dir = entry
            .file_type()
            .await
            .map(|t| t.is_dir())
            .unwrap_or(false);
        if !is_dir {
            continue;
        }
        if let Some(name) = entry.file_name().to_str() {
            names.insert(name.to_string());
        }
    }
    Ok(names)
}

pub fn is_candidate(folder: &str, base_version: &str) -> bool {
    folder.to_ascii_lowercase().contains(LOADER_TOKEN) && folder.contains(base_version)
}

/// Pick the folder the installer produced.
///
/// Order: the id the installer declares (when that folder exists), then
/// folders that appeared during the install, then matching folders that were
/// already there. Ties break by name.
pub fn select_version_folder(
    before: &BTreeSet<String>,
    after: &BTreeSet<String>,
    base_version: &str,
    declared: Option<&str>,
) -> LauncherResult<String> {
    if let Some(declared) = declared.filter(|id| after.contains(*id)) {
        debug!("Using installer-declared version {}", declared);
        return Ok(declared.to_string());
    }

    let (fresh, existing): (Vec<&String>, Vec<&String>) = after
        .iter()
        .filter(|name| is_candidate(name, base_version))
        .partition(|name| !before.contains(*name));

    if let Some(first) = fresh.first() {
        return Ok((*first).clone());
    }
    if let Some(first) = existing.first() {
        debug!("No new version folder; reusing existing {}", first);
        return Ok((*first).clone());
    }

    Err(LauncherError::DiscoveryFailure(format!(
        "no `{LOADER_TOKEN}` folder for {base_version} among {} entries",
        after.len()
    )))
}
