use std::collections::HashMap;
use std::path::Path;

use serde::Deserialize;
use tracing::warn;

use crate::core::downloader::{FileSource, ManifestFile};

const RESOURCES_URL: &str = "https://resources.download.minecraft.net";

/// Asset index JSON (`assets/indexes/<id>.json`).
#[derive(Debug, Deserialize)]
pub struct AssetIndex {
    #[serde(default)]
    pub objects: HashMap<String, AssetObject>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AssetObject {
    pub hash: String,
    pub size: u64,
}

impl AssetObject {
    /// Two-character bucket under `assets/objects/`.
    fn prefix(&self) -> Option<&str> {
        self.hash.get(..2)
    }
}

impl AssetIndex {
    /// Every object as a manifest file under `assets_dir/objects`, in
    /// content-addressed order. Objects sharing a hash appear once.
    pub fn object_files(&self, assets_dir: &Path) -> Vec<ManifestFile> {
        let objects_dir = assets_dir.join("objects");
        let mut objects: Vec<&AssetObject> = self.objects.values().collect();
        objects.sort_by(|a, b| a.hash.cmp(&b.hash));
        objects.dedup_by(|a, b| a.hash == b.hash);

        objects
            .into_iter()
            .filter_map(|obj| {
                let Some(prefix) = obj.prefix() else {
                    warn!("Skipping asset with malformed hash {:?}", obj.hash);
                    return None;
                };
                Some(ManifestFile {
                    dest: objects_dir.join(prefix).join(&obj.hash),
                    source: FileSource::Remote(format!("{}/{}/{}", RESOURCES_URL, prefix, obj.hash)),
                    sha1: Some(obj.hash.clone()),
                    size: Some(obj.size),
                    executable: false,
                })
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    #[test]
    fn objects_map_to_hash_buckets() {
        let index: AssetIndex = serde_json::from_str(
            r#"{"objects":{
                "minecraft/sounds/ambient/cave/cave1.ogg":{"hash":"b4dec4b3bd0a1d3ec3d2e3e0e0f1f5a0c0d0e0f1","size":12},
                "icons/icon_16x16.png":{"hash":"bdf48ef6b5d0d23bbb02e17d04865216179f510a","size":3665},
                "duplicate.png":{"hash":"bdf48ef6b5d0d23bbb02e17d04865216179f510a","size":3665},
                "broken":{"hash":"x","size":1}
            }}"#,
        )
        .unwrap();

        let files = index.object_files(Path::new("/game/assets"));
        assert_eq!(files.len(), 2);

        let icon = &files[1];
        assert_eq!(
            icon.dest,
            PathBuf::from("/game/assets/objects/bd/bdf48ef6b5d0d23bbb02e17d04865216179f510a")
        );
        assert_eq!(
            icon.source,
            FileSource::Remote(
                "https://resources.download.minecraft.net/bd/bdf48ef6b5d0d23bbb02e17d04865216179f510a"
                    .into()
            )
        );
        assert_eq!(icon.sha1.as_deref(), Some("bdf48ef6b5d0d23bbb02e17d04865216179f510a"));
        assert_eq!(icon.size, Some(3665));
    }

    #[test]
    fn index_without_objects_is_empty() {
        let index: AssetIndex = serde_json::from_str(r#"{"virtual":true}"#).unwrap();
        assert!(index.object_files(Path::new("assets")).is_empty());
    }
}
