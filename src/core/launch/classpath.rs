use std::path::{Path, PathBuf};

use tracing::{debug, warn};

use crate::core::error::{LauncherError, LauncherResult};
use crate::core::version::version_file::{self, VersionJson};

/// Platform-specific Java classpath separator.
pub fn get_classpath_separator() -> &'static str {
    if cfg!(target_os = "windows") {
        ";"
    } else {
        ":"
    }
}

/// Library jars followed by the client jar, deduplicated, bootstrap jars first.
///
/// Missing libraries are logged and skipped; a missing client jar is an error.
pub fn build_classpath(game_root: &Path, version: &VersionJson) -> LauncherResult<Vec<PathBuf>> {
    let libs_dir = game_root.join("libraries");
    let mut entries: Vec<PathBuf> = Vec::new();

    for lib in version.allowed_libraries() {
        let Some(file) = lib.artifact_file() else {
            continue;
        };
        let path = libs_dir.join(&file.path);
        if path.is_file() {
            entries.push(path);
        } else {
            warn!("Library {} missing at {:?}", lib.name, path);
        }
    }

    let client_jar = version_file::version_jar_path(game_root, version.jar_id());
    if !client_jar.is_file() {
        return Err(LauncherError::MissingArtifact { path: client_jar });
    }
    entries.push(client_jar);

    dedup_preserving_order(&mut entries);
    prioritize_bootstrap_entries(&mut entries);
    debug!("Classpath has {} entries", entries.len());
    Ok(entries)
}

pub fn join_classpath(entries: &[PathBuf]) -> String {
    entries
        .iter()
        .map(|p| safe_path_str(p))
        .collect::<Vec<_>>()
        .join(get_classpath_separator())
}

fn dedup_preserving_order(entries: &mut Vec<PathBuf>) {
    let mut seen = std::collections::HashSet::new();
    entries.retain(|entry| {
        let key = if cfg!(target_os = "windows") {
            entry.to_string_lossy().to_lowercase()
        } else {
            entry.to_string_lossy().into_owned()
        };
        seen.insert(key)
    });
}

/// ModLauncher-based Forge is sensitive to classpath order: bootstrap
/// artifacts must load before the rest of the runtime jars.
fn prioritize_bootstrap_entries(entries: &mut Vec<PathBuf>) {
    fn score(entry: &Path) -> usize {
        let lower = entry.to_string_lossy().to_ascii_lowercase();
        if lower.contains("bootstraplauncher") {
            0
        } else if lower.contains("modlauncher") {
            1
        } else if lower.contains("securejarhandler") {
            2
        } else {
            10
        }
    }

    let mut indexed: Vec<(usize, usize, PathBuf)> = entries
        .drain(..)
        .enumerate()
        .map(|(idx, entry)| (score(&entry), idx, entry))
        .collect();

    indexed.sort_by_key(|(priority, idx, _)| (*priority, *idx));
    entries.extend(indexed.into_iter().map(|(_, _, entry)| entry));
}

fn is_native_entry(name: &str) -> bool {
    !name.contains("META-INF")
        && !name.contains('/')
        && !name.contains('\\')
        && [".dll", ".so", ".dylib", ".jnilib"]
            .iter()
            .any(|ext| name.ends_with(ext))
}

fn extract_native_jar(jar: &Path, dest_dir: &Path) -> LauncherResult<usize> {
    let file = std::fs::File::open(jar).map_err(|e| LauncherError::io(jar, e))?;
    let mut archive = zip::ZipArchive::new(file)?;
    let mut extracted = 0;

    for i in 0..archive.len() {
        let mut entry = archive.by_index(i)?;
        let name = entry.name().to_string();
        if !is_native_entry(&name) {
            continue;
        }
        let dest = dest_dir.join(&name);
        let mut out = std::fs::File::create(&dest).map_err(|e| LauncherError::io(&dest, e))?;
        std::io::copy(&mut entry, &mut out).map_err(|e| LauncherError::io(&dest, e))?;
        extracted += 1;
    }
    Ok(extracted)
}

/// Unpack legacy native jars into a fresh `natives/` directory under the game root.
pub async fn extract_natives(game_root: &Path, version: &VersionJson) -> LauncherResult<PathBuf> {
    let natives_dir = game_root.join("natives");
    if natives_dir.exists() {
        tokio::fs::remove_dir_all(&natives_dir)
            .await
            .map_err(|e| LauncherError::io(&natives_dir, e))?;
    }
    tokio::fs::create_dir_all(&natives_dir)
        .await
        .map_err(|e| LauncherError::io(&natives_dir, e))?;

    let libs_dir = game_root.join("libraries");
    let jars: Vec<PathBuf> = version
        .allowed_libraries()
        .filter_map(|lib| lib.native_file())
        .map(|file| libs_dir.join(file.path))
        .filter(|path| path.is_file())
        .collect();

    if jars.is_empty() {
        return Ok(natives_dir);
    }

    let dest = natives_dir.clone();
    let extracted = tokio::task::spawn_blocking(move || {
        jars.iter()
            .map(|jar| extract_native_jar(jar, &dest))
            .sum::<LauncherResult<usize>>()
    })
    .await
    .map_err(|e| LauncherError::Other(format!("Task join error: {}", e)))??;

    debug!("Extracted {} native libraries", extracted);
    Ok(natives_dir)
}

/// Convert path to string without the Windows extended-length prefix, which
/// breaks Java classpath handling.
pub fn safe_path_str(path: &Path) -> String {
    let resolved = std::fs::canonicalize(path).unwrap_or_else(|_| path.to_path_buf());
    let text = resolved.to_string_lossy().to_string();

    #[cfg(target_os = "windows")]
    {
        if let Some(stripped) = text.strip_prefix(r"\\?\") {
            return stripped.to_string();
        }
    }

    text
}
