//! Hand-edited metadata in previously generated pages.
//!
//! Pages get their meta description tuned by hand after generation. Before a page is
//! rewritten, its current description is compared with the data file and the configured
//! [`OverridePolicy`] decides which one the new page carries.

use std::{
    borrow::Cow,
    path::{Path, PathBuf},
};

use anyhow::Context;
use lazy_static::lazy_static;
use regex::Regex;
use serde::Deserialize;
use unicode_segmentation::UnicodeSegmentation;

use crate::{article::Article, config::OverridePolicy, template::unescape_html};

pub const LOCK_FILE: &str = "locked.yaml";

lazy_static! {
    static ref META_DESCRIPTION_REGEX: Regex = Regex::new(
        r#"(?i)<meta\s+name=["']description["']\s+content=(?:"(?<dq>[^"]*)"|'(?<sq>[^']*)')"#
    )
    .unwrap();
}

/// Contents of a collection's `locked.yaml`: article ids per field whose edits are kept.
#[derive(Deserialize, Debug, Default, PartialEq)]
pub struct Locks {
    #[serde(default)]
    pub description: Vec<String>,
}

impl Locks {
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }

        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("reading {}", path.display()))?;
        serde_yaml::from_str(&raw).with_context(|| format!("parsing {}", path.display()))
    }
}

/// The meta description of an existing page, with entities decoded.
pub fn existing_description(html: &str) -> Option<String> {
    let caps = META_DESCRIPTION_REGEX.captures(html)?;
    let value = caps.name("dq").or_else(|| caps.name("sq"))?.as_str();

    Some(unescape_html(value).into_owned())
}

fn normalize(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

pub struct OverrideResolver {
    policy: OverridePolicy,
    locks: Locks,
}

impl OverrideResolver {
    pub fn new(policy: OverridePolicy, locks: Locks) -> Self {
        Self { policy, locks }
    }

    /// Loads the lock sidecar from `dir` when the policy needs it.
    pub fn for_dir(policy: OverridePolicy, dir: &Path) -> anyhow::Result<Self> {
        let locks = match policy {
            OverridePolicy::Locked => Locks::load(&lock_path(dir))?,
            _ => Locks::default(),
        };

        Ok(Self::new(policy, locks))
    }

    fn keeps_edit(&self, article: &Article, existing: &str) -> bool {
        match self.policy {
            OverridePolicy::Diff => true,
            OverridePolicy::Normalized => normalize(existing) != normalize(&article.description),
            OverridePolicy::Locked => self.locks.description.contains(&article.id),
        }
    }

    /// The description the regenerated page at `output` should carry.
    pub fn description<'a>(&self, article: &'a Article, output: &Path) -> Cow<'a, str> {
        let source = Cow::Borrowed(article.description.as_str());

        let html = match std::fs::read_to_string(output) {
            Ok(html) => html,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => return source,
            Err(err) => {
                log::warn!("Cannot read existing page {:?}: {}", output, err);
                return source;
            }
        };

        let Some(existing) = existing_description(&html).filter(|d| !d.is_empty()) else {
            return source;
        };

        if existing == article.description {
            return source;
        }

        if !self.keeps_edit(article, &existing) {
            log::info!(
                "Meta description of `{}` differs from the data file, regenerating it",
                article.id
            );
            return source;
        }

        log::info!(
            "Keeping hand-edited meta description of `{}` ({} characters)",
            article.id,
            existing.graphemes(true).count()
        );
        Cow::Owned(existing)
    }
}

pub fn lock_path(dir: &Path) -> PathBuf {
    dir.join(LOCK_FILE)
}

#[cfg(test)]
mod test {
    use super::{existing_description, Locks, OverrideResolver};
    use crate::{article::Article, config::OverridePolicy};

    fn article(description: &str) -> Article {
        Article {
            id: "a1".into(),
            description: description.into(),
            ..Default::default()
        }
    }

    #[test]
    fn extracts_either_quote_style() {
        assert_eq!(
            existing_description(r#"<meta name="description" content="it's &quot;fine&quot; &amp; ok">"#),
            Some("it's \"fine\" & ok".into())
        );
        assert_eq!(
            existing_description("<meta name='description' content='say \"hi\"'>"),
            Some("say \"hi\"".into())
        );
        assert_eq!(existing_description("<meta name=\"keywords\" content=\"x\">"), None);
    }

    #[test]
    fn policies() {
        let dir = tempfile::tempdir().unwrap();
        let page = dir.path().join("a1.html");
        std::fs::write(
            &page,
            "<meta name=\"description\" content=\"Hand  tuned\ttext\">",
        )
        .unwrap();

        let diff = OverrideResolver::new(OverridePolicy::Diff, Locks::default());
        assert_eq!(diff.description(&article("Generated"), &page), "Hand  tuned\ttext");
        assert_eq!(diff.description(&article("Generated"), &dir.path().join("none.html")), "Generated");

        let normalized = OverrideResolver::new(OverridePolicy::Normalized, Locks::default());
        assert_eq!(normalized.description(&article("Hand tuned text"), &page), "Hand tuned text");
        assert_eq!(normalized.description(&article("Other"), &page), "Hand  tuned\ttext");

        let unlocked = OverrideResolver::new(OverridePolicy::Locked, Locks::default());
        assert_eq!(unlocked.description(&article("Generated"), &page), "Generated");

        std::fs::write(super::lock_path(dir.path()), "description:\n  - a1\n").unwrap();
        let locked = OverrideResolver::for_dir(OverridePolicy::Locked, dir.path()).unwrap();
        assert_eq!(locked.description(&article("Generated"), &page), "Hand  tuned\ttext");
    }
}
