use std::path::Path;

use lazy_static::lazy_static;
use regex::Regex;
use relative_path::RelativePath;

use crate::{
    article::{Article, ArticleKind},
    fragments::Fragments,
    markdown::Document,
    template::escape_html,
};

lazy_static! {
    static ref BVID_REGEX: Regex = Regex::new(r"BV\w+").unwrap();
}

pub struct BodyContext<'a> {
    /// Site root; article `content` paths are relative to it.
    pub root: &'a Path,
    pub fragments: &'a Fragments,
}

/// Builds the `{{CONTENT}}` of a page.
pub trait BodyHandler {
    fn render_body(&self, article: &Article, ctx: &BodyContext) -> anyhow::Result<String>;
}

pub struct MarkdownHandler;

impl MarkdownHandler {
    fn read_source(article: &Article, root: &Path) -> Option<String> {
        let content = article.content.as_deref().filter(|c| !c.is_empty())?;
        let path = RelativePath::new(content).to_logical_path(root);

        match std::fs::read_to_string(&path) {
            Ok(source) => Some(source),
            Err(err) => {
                log::warn!(
                    "Content {:?} of `{}` unavailable ({}), using its description",
                    path,
                    article.id,
                    err
                );
                None
            }
        }
    }
}

impl BodyHandler for MarkdownHandler {
    fn render_body(&self, article: &Article, ctx: &BodyContext) -> anyhow::Result<String> {
        Ok(match Self::read_source(article, ctx.root) {
            Some(source) => Document::parse(&source).strip_title().to_html(),
            None => escape_html(&article.description).into_owned(),
        })
    }
}

pub struct VideoHandler;

impl VideoHandler {
    /// Only bilibili links can be embedded.
    fn embed_id<'a>(platform: &str, url: &'a str) -> Option<&'a str> {
        match platform {
            "bilibili" => BVID_REGEX.find(url).map(|m| m.as_str()),
            _ => None,
        }
    }
}

impl BodyHandler for VideoHandler {
    fn render_body(&self, article: &Article, ctx: &BodyContext) -> anyhow::Result<String> {
        let url = article.video_url.as_deref().unwrap_or("");
        let platform = article.video_platform.as_deref().unwrap_or("bilibili");

        Ok(ctx.fragments.video(
            Self::embed_id(platform, url),
            url,
            &escape_html(&article.description),
            article.transcript.as_deref(),
        )?)
    }
}

pub struct EmptyHandler;

impl BodyHandler for EmptyHandler {
    fn render_body(&self, article: &Article, _ctx: &BodyContext) -> anyhow::Result<String> {
        log::warn!("`{}` has an unknown type, leaving its body empty", article.id);
        Ok(String::new())
    }
}

pub fn handler_for(kind: ArticleKind) -> &'static dyn BodyHandler {
    match kind {
        ArticleKind::Article => &MarkdownHandler,
        ArticleKind::Video => &VideoHandler,
        ArticleKind::Other => &EmptyHandler,
    }
}

#[cfg(test)]
mod test {
    use super::{handler_for, BodyContext, VideoHandler};
    use crate::{
        article::{Article, ArticleKind},
        fragments::Fragments,
    };

    #[test]
    fn markdown_body_drops_title() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir_all(dir.path().join("guides/content")).unwrap();
        std::fs::write(
            dir.path().join("guides/content/a1.md"),
            "# Title\n\nHello **there**\n",
        )
        .unwrap();

        let fragments = Fragments::new().unwrap();
        let ctx = BodyContext {
            root: dir.path(),
            fragments: &fragments,
        };
        let article = Article {
            id: "a1".into(),
            content: Some("guides/content/a1.md".into()),
            ..Default::default()
        };

        assert_eq!(
            handler_for(ArticleKind::Article)
                .render_body(&article, &ctx)
                .unwrap(),
            "<p>Hello <strong>there</strong></p>"
        );
    }

    #[test]
    fn missing_source_falls_back_to_description() {
        let dir = tempfile::tempdir().unwrap();
        let fragments = Fragments::new().unwrap();
        let ctx = BodyContext {
            root: dir.path(),
            fragments: &fragments,
        };
        let article = Article {
            id: "a1".into(),
            description: "Short & sweet".into(),
            content: Some("nope.md".into()),
            ..Default::default()
        };

        assert_eq!(
            handler_for(ArticleKind::Article)
                .render_body(&article, &ctx)
                .unwrap(),
            "Short &amp; sweet"
        );
    }

    #[test]
    fn embed_ids() {
        assert_eq!(
            VideoHandler::embed_id("bilibili", "https://www.bilibili.com/video/BV1GJ411x7h7/?p=1"),
            Some("BV1GJ411x7h7")
        );
        assert_eq!(VideoHandler::embed_id("bilibili", "https://b23.tv/abc"), None);
        assert_eq!(VideoHandler::embed_id("youtube", "https://y/BV1GJ411x7h7"), None);
    }
}
