use std::path::{Path, PathBuf};

use anyhow::Context;
use serde::{Deserialize, Serialize};

#[derive(Serialize, Deserialize, PartialEq, Debug, Clone)]
#[serde(default)]
pub struct Config {
    pub site_url: String,
    pub sitemap: PathBuf,
    /// chrono format used for `{{DATE}}`.
    pub date_format: String,
    pub default_author: String,
    pub default_cover: String,
    pub override_policy: OverridePolicy,
    pub collections: Vec<CollectionConfig>,
}

#[derive(Serialize, Deserialize, PartialEq, Debug, Clone)]
pub struct CollectionConfig {
    pub name: String,
    /// JSON document holding the `articles` array.
    pub data: PathBuf,
    /// Output directory, also the URL segment of every page.
    pub dir: PathBuf,
    pub template: PathBuf,
    /// Landing page listing the collection, relative to the site root.
    pub list_page: String,
    #[serde(default)]
    pub hide_cover_on_video: bool,
}

/// How a previously generated meta description is treated when it disagrees with the data file.
#[derive(Serialize, Deserialize, PartialEq, Eq, Debug, Clone, Copy, Default)]
#[serde(rename_all = "lowercase")]
pub enum OverridePolicy {
    /// Any textual difference counts as a manual edit.
    #[default]
    Diff,
    /// Differences in whitespace alone are ignored.
    Normalized,
    /// Only ids listed in the collection's `locked.yaml` keep their edits.
    Locked,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            site_url: "https://www.xintuxiangce.top".into(),
            sitemap: "sitemap.xml".into(),
            date_format: "%Y年%m月%d日".into(),
            default_author: "芯图团队".into(),
            default_cover: "/icons/imageclassify.png".into(),
            override_policy: OverridePolicy::Diff,
            collections: vec![
                CollectionConfig {
                    name: "diary".into(),
                    data: "diary-data.json".into(),
                    dir: "diary".into(),
                    template: "diary/article-template.html".into(),
                    list_page: "diary.html".into(),
                    hide_cover_on_video: true,
                },
                CollectionConfig {
                    name: "guides".into(),
                    data: "guides-data.json".into(),
                    dir: "guides".into(),
                    template: "guides/guide-template.html".into(),
                    list_page: "guides.html".into(),
                    hide_cover_on_video: false,
                },
            ],
        }
    }
}

impl Config {
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("reading config {}", path.display()))?;

        serde_yaml::from_str(&raw).with_context(|| format!("parsing config {}", path.display()))
    }

    pub fn base_url(&self) -> &str {
        self.site_url.trim_end_matches('/')
    }

    pub fn collection(&self, name: &str) -> Option<&CollectionConfig> {
        self.collections.iter().find(|c| c.name == name)
    }
}

impl CollectionConfig {
    /// URL path segment of the collection, always with forward slashes.
    pub fn url_dir(&self) -> String {
        self.dir
            .components()
            .map(|c| c.as_os_str().to_string_lossy().into_owned())
            .collect::<Vec<_>>()
            .join("/")
    }

    pub fn page_url(&self, base_url: &str, id: &str) -> String {
        format!("{}/{}/{}.html", base_url, self.url_dir(), id)
    }

    pub fn list_url(&self, base_url: &str) -> String {
        format!("{}/{}", base_url, self.list_page.trim_start_matches('/'))
    }
}
