// ─── Forge Version Index ───
// Lists installable Forge builds for a Minecraft version from the Forge maven,
// flagging the promoted ones.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use super::forge::FORGE_MAVEN;
use crate::core::error::{LauncherError, LauncherResult};

const PROMOTIONS_URL: &str =
    "https://files.minecraftforge.net/net/minecraftforge/forge/promotions_slim.json";

#[derive(Debug, Deserialize)]
struct MavenMetadata {
    versioning: MavenVersioning,
}

#[derive(Debug, Deserialize)]
struct MavenVersioning {
    versions: MavenVersions,
}

#[derive(Debug, Deserialize)]
struct MavenVersions {
    #[serde(rename = "version", default)]
    version: Vec<String>,
}

#[derive(Debug, Default, Deserialize)]
struct Promotions {
    #[serde(default)]
    promos: HashMap<String, String>,
}

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct ForgeVersion {
    pub minecraft_version: String,
    pub forge_version: String,
    pub recommended: bool,
    pub latest: bool,
}

pub struct ForgeVersionIndex {
    client: reqwest::Client,
}

impl ForgeVersionIndex {
    pub fn new(client: reqwest::Client) -> Self {
        Self { client }
    }

    async fn get_text(&self, url: &str) -> LauncherResult<String> {
        let response = self.client.get(url).send().await?;
        if !response.status().is_success() {
            return Err(LauncherError::LoaderApi(format!(
                "{url} returned {}",
                response.status()
            )));
        }
        Ok(response.text().await?)
    }

    /// Forge builds for `minecraft_version`, newest first.
    pub async fn list_versions(&self, minecraft_version: &str) -> LauncherResult<Vec<ForgeVersion>> {
        let xml = self
            .get_text(&format!(
                "{FORGE_MAVEN}/net/minecraftforge/forge/maven-metadata.xml"
            ))
            .await?;
        let all = parse_maven_metadata(&xml)?;

        // Promotions only decorate the list.
        let promotions = match self.get_text(PROMOTIONS_URL).await {
            Ok(raw) => serde_json::from_str(&raw).unwrap_or_else(|e| {
                warn!("Unreadable Forge promotions: {}", e);
                Promotions::default()
            }),
            Err(e) => {
                warn!("Forge promotions unavailable: {}", e);
                Promotions::default()
            }
        };

        let versions = versions_for(&all, minecraft_version, &promotions.promos);
        info!(
            "Found {} Forge builds for {}",
            versions.len(),
            minecraft_version
        );
        Ok(versions)
    }

    /// Recommended build, else the newest one.
    pub async fn default_version(&self, minecraft_version: &str) -> LauncherResult<Option<String>> {
        let versions = self.list_versions(minecraft_version).await?;
        Ok(pick_default(&versions).map(|v| v.forge_version.clone()))
    }
}

fn parse_maven_metadata(xml: &str) -> LauncherResult<Vec<String>> {
    let metadata: MavenMetadata = quick_xml::de::from_str(xml)?;
    Ok(metadata.versioning.versions.version)
}

fn version_sort_key(version: &str) -> Vec<u64> {
    version
        .split(|c: char| !c.is_ascii_alphanumeric())
        .filter(|part| !part.is_empty())
        .map(|part| part.parse::<u64>().unwrap_or(0))
        .collect()
}

fn versions_for(
    all: &[String],
    minecraft_version: &str,
    promos: &HashMap<String, String>,
) -> Vec<ForgeVersion> {
    let prefix = format!("{minecraft_version}-");
    let recommended = promos.get(&format!("{minecraft_version}-recommended"));
    let latest = promos.get(&format!("{minecraft_version}-latest"));

    let mut versions: Vec<ForgeVersion> = all
        .iter()
        .filter_map(|full| full.strip_prefix(&prefix))
        .map(|forge| ForgeVersion {
            minecraft_version: minecraft_version.to_string(),
            forge_version: forge.to_string(),
            recommended: recommended.is_some_and(|r| r == forge),
            latest: latest.is_some_and(|l| l == forge),
        })
        .collect();

    versions.sort_by(|a, b| version_sort_key(&b.forge_version).cmp(&version_sort_key(&a.forge_version)));
    versions
}

pub fn pick_default(versions: &[ForgeVersion]) -> Option<&ForgeVersion> {
    versions
        .iter()
        .find(|v| v.recommended)
        .or_else(|| versions.first())
}

#[cfg(test)]
mod tests {
    use super::*;

    const METADATA: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<metadata>
  <groupId>net.minecraftforge</groupId>
  <artifactId>forge</artifactId>
  <versioning>
    <latest>1.20.1-47.3.0</latest>
    <release>1.20.1-47.3.0</release>
    <versions>
      <version>1.20.1-47.1.0</version>
      <version>1.20.1-47.10.0</version>
      <version>1.20.1-47.2.0</version>
      <version>1.19.2-43.2.0</version>
      <version>1.20.10-1.0.0</version>
    </versions>
  </versioning>
</metadata>"#;

    #[test]
    fn metadata_versions_are_parsed() {
        let all = parse_maven_metadata(METADATA).unwrap();
        assert_eq!(all.len(), 5);
        assert_eq!(all[3], "1.19.2-43.2.0");
    }

    #[test]
    fn builds_are_filtered_sorted_and_flagged() {
        let all = parse_maven_metadata(METADATA).unwrap();
        let promos = HashMap::from([
            ("1.20.1-recommended".to_string(), "47.2.0".to_string()),
            ("1.20.1-latest".to_string(), "47.10.0".to_string()),
        ]);
        let versions = versions_for(&all, "1.20.1", &promos);

        let ids: Vec<&str> = versions.iter().map(|v| v.forge_version.as_str()).collect();
        assert_eq!(ids, vec!["47.10.0", "47.2.0", "47.1.0"]);
        assert!(versions[0].latest);
        assert!(versions[1].recommended);
        assert_eq!(pick_default(&versions).unwrap().forge_version, "47.2.0");
    }

    #[test]
    fn default_without_promotions_is_newest() {
        let all = parse_maven_metadata(METADATA).unwrap();
        let versions = versions_for(&all, "1.20.1", &HashMap::new());
        assert_eq!(pick_default(&versions).unwrap().forge_version, "47.10.0");
        assert!(pick_default(&versions_for(&all, "1.8.9", &HashMap::new())).is_none());
    }

    #[test]
    fn malformed_metadata_is_a_parse_error() {
        let err = parse_maven_metadata("<metadata><versioning>").unwrap_err();
        assert!(matches!(err, LauncherError::Xml(_)));
    }
}
