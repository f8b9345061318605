use std::path::{Path, PathBuf};

use tracing::{debug, info, warn};

use crate::core::error::{LauncherError, LauncherResult};
use crate::core::version::version_file::{self, VersionJson};

fn staging_dir(versions_dir: &Path, folder: &str) -> PathBuf {
    versions_dir.join(format!(".{folder}.partial"))
}

fn copy_failure(from: &Path, to: &Path) -> impl FnOnce(std::io::Error) -> LauncherError {
    let (from, to) = (from.to_path_buf(), to.to_path_buf());
    move |source| LauncherError::CopyFailure { from, to, source }
}

/// Recursively copy `source` into `destination`, overwriting files.
fn copy_dir_recursive(source: &Path, destination: &Path) -> LauncherResult<()> {
    std::fs::create_dir_all(destination).map_err(copy_failure(source, destination))?;

    for entry in std::fs::read_dir(source).map_err(copy_failure(source, destination))? {
        let entry = entry.map_err(copy_failure(source, destination))?;
        let from = entry.path();
        let to = destination.join(entry.file_name());
        let file_type = entry.file_type().map_err(copy_failure(&from, &to))?;

        if file_type.is_dir() {
            copy_dir_recursive(&from, &to)?;
        } else {
            std::fs::copy(&from, &to).map_err(copy_failure(&from, &to))?;
        }
    }
    Ok(())
}

fn install_version_folder_blocking(
    source: &Path,
    versions_dir: &Path,
    folder: &str,
) -> LauncherResult<PathBuf> {
    let target = versions_dir.join(folder);
    let staging = staging_dir(versions_dir, folder);

    if staging.exists() {
        debug!("Removing leftover staging dir {:?}", staging);
        std::fs::remove_dir_all(&staging).map_err(copy_failure(source, &staging))?;
    }

    copy_dir_recursive(source, &staging)?;

    if target.exists() {
        std::fs::remove_dir_all(&target).map_err(copy_failure(&staging, &target))?;
    }
    std::fs::rename(&staging, &target).map_err(copy_failure(&staging, &target))?;
    Ok(target)
}

/// Copy `source` to `<versions_dir>/<folder>` through a staging directory, so
/// the target is either the previous content or a complete copy.
pub async fn install_version_folder(
    source: &Path,
    versions_dir: &Path,
    folder: &str,
) -> LauncherResult<PathBuf> {
    let (source, versions_dir, folder) = (
        source.to_path_buf(),
        versions_dir.to_path_buf(),
        folder.to_string(),
    );
    let target = tokio::task::spawn_blocking(move || {
        install_version_folder_blocking(&source, &versions_dir, &folder)
    })
    .await
    .map_err(|e| LauncherError::Other(format!("Copy task panicked: {e}")))??;

    info!("Merged version folder into {:?}", target);
    Ok(target)
}

/// Copy the libraries of `version_id` that have no download URL (written by
/// the installer's processors) from `shared_root` into `instance_root`.
///
/// Returns how many files were copied. Files missing from the shared root are
/// left for verification to report.
pub async fn merge_generated_libraries(
    shared_root: &Path,
    instance_root: &Path,
    version_id: &str,
) -> LauncherResult<usize> {
    let json_path = version_file::version_json_path(instance_root, version_id);
    let raw = tokio::fs::read_to_string(&json_path)
        .await
        .map_err(|e| LauncherError::io(&json_path, e))?;
    let version: VersionJson = serde_json::from_str(&raw)?;

    let shared_libs = shared_root.join("libraries");
    let instance_libs = instance_root.join("libraries");
    let mut copied = 0;

    let generated = version
        .allowed_libraries()
        .filter_map(|lib| lib.artifact_file())
        .filter(|file| file.url.is_none());

    for file in generated {
        let from = shared_libs.join(&file.path);
        let to = instance_libs.join(&file.path);

        if !from.is_file() {
            warn!("Generated library {:?} missing from shared root", file.path);
            continue;
        }
        if let Some(parent) = to.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(copy_failure(&from, parent))?;
        }
        tokio::fs::copy(&from, &to)
            .await
            .map_err(copy_failure(&from, &to))?;
        copied += 1;
    }

    debug!("Copied {} generated libraries for {}", copied, version_id);
    Ok(copied)
}
