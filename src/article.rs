// SPDX-FileCopyrightText: 2024 Ohin "Kazani" Taylor <kazani@kazani.dev>
// SPDX-License-Identifier: MIT

use std::{collections::HashMap, path::Path};

use anyhow::Context;
use serde::Deserialize;

#[derive(Deserialize, PartialEq, Eq, Debug, Clone, Copy, Default)]
#[serde(rename_all = "lowercase")]
pub enum ArticleKind {
    #[default]
    Article,
    Video,
    #[serde(other)]
    Other,
}

#[derive(Deserialize, PartialEq, Debug, Clone, Default)]
#[serde(default, rename_all = "camelCase")]
pub struct Article {
    pub id: String,
    pub title: String,
    pub description: String,
    pub tags: Vec<String>,
    pub cover: Option<String>,
    pub date: Option<String>,
    pub author: Option<String>,
    pub read_time: Option<String>,
    pub duration: Option<String>,
    #[serde(rename = "type")]
    pub kind: ArticleKind,

    /// Markdown source, relative to the site root.
    pub content: Option<String>,

    pub video_url: Option<String>,
    pub video_platform: Option<String>,
    pub transcript: Option<String>,

    pub related: Vec<String>,
}

impl Article {
    pub fn cover(&self) -> Option<&str> {
        self.cover.as_deref().filter(|cover| !cover.is_empty())
    }

    pub fn read_time(&self) -> &str {
        self.read_time
            .as_deref()
            .or(self.duration.as_deref())
            .unwrap_or("")
    }
}

#[derive(Deserialize, Debug, Default)]
pub struct ArticleSet {
    #[serde(default)]
    pub articles: Vec<Article>,
}

impl ArticleSet {
    pub fn parse(json: &str) -> serde_json::Result<Self> {
        serde_json::from_str(json)
    }

    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("cannot read data file {}", path.display()))?;

        Self::parse(&raw).with_context(|| format!("malformed JSON in {}", path.display()))
    }

    pub fn by_id(&self) -> HashMap<&str, &Article> {
        self.articles
            .iter()
            .map(|article| (article.id.as_str(), article))
            .collect()
    }
}

#[cfg(test)]
mod test {
    use super::{ArticleKind, ArticleSet};

    #[test]
    fn parses_camel_case_records() {
        let set = ArticleSet::parse(
            r#"{"articles": [
                {"id": "v1", "title": "Clip", "type": "video", "videoUrl": "https://b23/BV1x", "duration": "3:20", "extra": 1},
                {"id": "a1", "title": "T", "readTime": "5 min", "related": ["v1", "gone"]},
                {"id": "p1", "type": "podcast"}
            ]}"#,
        )
        .unwrap();

        let [video, article, other] = &set.articles[..] else {
            panic!("expected three articles");
        };

        assert_eq!(video.kind, ArticleKind::Video);
        assert_eq!(video.video_url.as_deref(), Some("https://b23/BV1x"));
        assert_eq!(video.read_time(), "3:20");
        assert_eq!(article.kind, ArticleKind::Article);
        assert_eq!(article.read_time(), "5 min");
        assert!(article.tags.is_empty());
        assert_eq!(article.related, vec!["v1", "gone"]);
        assert_eq!(other.kind, ArticleKind::Other);
    }

    #[test]
    fn empty_cover_is_absent() {
        let set = ArticleSet::parse(r#"{"articles": [{"id": "a", "cover": ""}]}"#).unwrap();
        assert_eq!(set.articles[0].cover(), None);
    }

    #[test]
    fn missing_articles_key_is_empty() {
        assert!(ArticleSet::parse("{}").unwrap().articles.is_empty());
        assert!(ArticleSet::parse("{\"articles\": [").is_err());
    }
}
