// ─── Java Runtime Manifest ───
// Mojang publishes per-platform Java runtimes as plain file manifests. This
// module turns the manifest of one runtime component into the list of files
// the downloader has to put under `runtime/`.

use std::collections::HashMap;
use std::path::Path;

use serde::Deserialize;
use tracing::{debug, info};

use super::paths::{runtime_dir, runtime_platform};
use crate::core::downloader::{FileSource, ManifestFile};
use crate::core::error::{LauncherError, LauncherResult};
use crate::core::version::JavaVersionInfo;

pub const RUNTIME_CATALOG_URL: &str = "https://launchermeta.mojang.com/v1/products/java-runtime/2ec0cc96c44e5a76b9c8b7c39df7210883d12871/all.json";

/// `all.json`: platform → component → published builds.
pub type RuntimeCatalog = HashMap<String, HashMap<String, Vec<RuntimeBuild>>>;

#[derive(Debug, Clone, Deserialize)]
pub struct RuntimeBuild {
    pub manifest: RuntimeManifestRef,
    #[serde(default)]
    pub version: Option<RuntimeBuildVersion>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RuntimeManifestRef {
    pub sha1: String,
    pub size: u64,
    pub url: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RuntimeBuildVersion {
    pub name: String,
}

/// Manifest of one runtime component: relative path → entry.
#[derive(Debug, Clone, Deserialize)]
pub struct ComponentManifest {
    pub files: HashMap<String, RuntimeEntry>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum RuntimeEntry {
    File {
        #[serde(default)]
        executable: bool,
        downloads: RuntimeDownloads,
    },
    Directory,
    Link {
        target: String,
    },
}

#[derive(Debug, Clone, Deserialize)]
pub struct RuntimeDownloads {
    pub raw: RuntimeManifestRef,
}

/// First published build of `component` for `platform`.
pub fn select_build<'a>(
    catalog: &'a RuntimeCatalog,
    platform: &str,
    component: &str,
) -> Option<&'a RuntimeBuild> {
    catalog.get(platform)?.get(component)?.first()
}

/// Files of a component manifest, rooted at `dest_root`. Directories are
/// implied by their files and produce no entry.
pub fn component_files(manifest: &ComponentManifest, dest_root: &Path) -> Vec<ManifestFile> {
    let mut files: Vec<ManifestFile> = manifest
        .files
        .iter()
        .filter_map(|(relative, entry)| {
            let dest = dest_root.join(relative);
            match entry {
                RuntimeEntry::File {
                    executable,
                    downloads,
                } => Some(ManifestFile {
                    dest,
                    source: FileSource::Remote(downloads.raw.url.clone()),
                    sha1: Some(downloads.raw.sha1.clone()),
                    size: Some(downloads.raw.size),
                    executable: *executable,
                }),
                RuntimeEntry::Link { target } => Some(ManifestFile {
                    dest,
                    source: FileSource::Link(target.clone()),
                    sha1: None,
                    size: None,
                    executable: false,
                }),
                RuntimeEntry::Directory => None,
            }
        })
        .collect();

    // Links go last so their targets already exist when they are created.
    files.sort_by(|a, b| {
        let a_link = matches!(a.source, FileSource::Link(_));
        let b_link = matches!(b.source, FileSource::Link(_));
        a_link.cmp(&b_link).then_with(|| a.dest.cmp(&b.dest))
    });
    files
}

async fn fetch_json<T: serde::de::DeserializeOwned>(
    client: &reqwest::Client,
    url: &str,
) -> LauncherResult<T> {
    let response = client.get(url).send().await?;
    if !response.status().is_success() {
        return Err(LauncherError::DownloadFailed {
            url: url.to_string(),
            status: response.status().as_u16(),
        });
    }
    Ok(response.json().await?)
}

/// Every file of the Java runtime `component` for this platform, destined for
/// the runtime directory under `game_root`.
pub async fn runtime_files(
    client: &reqwest::Client,
    game_root: &Path,
    component: &str,
) -> LauncherResult<Vec<ManifestFile>> {
    let platform = runtime_platform();
    let catalog: RuntimeCatalog = fetch_json(client, RUNTIME_CATALOG_URL).await?;
    let build = select_build(&catalog, platform, component).ok_or_else(|| {
        LauncherError::RuntimeNotFound(runtime_dir(game_root, component))
    })?;

    info!(
        "Java runtime {} for {}: {}",
        component,
        platform,
        build
            .version
            .as_ref()
            .map(|v| v.name.as_str())
            .unwrap_or("unknown build")
    );

    let manifest: ComponentManifest = fetch_json(client, &build.manifest.url).await?;
    let files = component_files(&manifest, &runtime_dir(game_root, component));
    debug!("Runtime {} has {} files", component, files.len());
    Ok(files)
}

/// Java major a Minecraft version needs, for versions that do not declare it.
pub fn required_java_for_minecraft_version(minecraft_version: &str) -> u32 {
    let lower = minecraft_version.to_ascii_lowercase();
    if let Some(week_pos) = lower.find('w') {
        let year_hint = &lower[..week_pos];
        if year_hint.len() >= 2 {
            let year_suffix = &year_hint[year_hint.len() - 2..];
            if let Ok(snapshot_year) = year_suffix.parse::<u32>() {
                if snapshot_year >= 24 {
                    return 21;
                }
                return 17;
            }
        }
    }

    let mut parts = minecraft_version.split('.');
    let major = parts
        .next()
        .and_then(|p| p.parse::<u32>().ok())
        .unwrap_or(1);
    let minor = parts
        .next()
        .and_then(|p| p.parse::<u32>().ok())
        .unwrap_or(20);
    let patch = parts
        .next()
        .and_then(|p| p.parse::<u32>().ok())
        .unwrap_or(0);

    if major > 1 || minor >= 21 || (minor == 20 && patch >= 5) {
        21
    } else if minor >= 17 {
        17
    } else {
        8
    }
}

fn runtime_track(required_major: u32) -> u32 {
    if required_major <= 8 {
        8
    } else if required_major >= 21 {
        21
    } else {
        17
    }
}

/// Runtime requirement inferred from a version id.
pub fn fallback_requirement(minecraft_version: &str) -> JavaVersionInfo {
    let major = required_java_for_minecraft_version(minecraft_version);
    let component = match runtime_track(major) {
        8 => "jre-legacy",
        17 => "java-runtime-gamma",
        _ => "java-runtime-delta",
    };
    JavaVersionInfo {
        component: component.to_string(),
        major_version: major,
    }
}
