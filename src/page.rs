use std::{borrow::Cow, collections::HashMap, fmt::Write, path::Path};

use crate::{
    article::{Article, ArticleKind},
    config::{CollectionConfig, Config},
    fragments::{Card, Fragments},
    handler::{handler_for, BodyContext},
    template::{escape_html, escape_json, Escape, Scope, Template},
};

/// Reformats an ISO `YYYY-MM-DD` date; anything else is passed through.
pub fn format_date(date: &str, format: &str) -> String {
    let Ok(parsed) = chrono::NaiveDate::parse_from_str(date, "%Y-%m-%d") else {
        return date.to_owned();
    };

    let mut out = String::new();
    match write!(out, "{}", parsed.format(format)) {
        Ok(()) => out,
        Err(_) => {
            log::warn!("Invalid date format {:?}", format);
            date.to_owned()
        }
    }
}

/// Everything one page needs, resolved up front.
pub struct PageScope<'a> {
    article: &'a Article,
    config: &'a Config,
    collection: &'a CollectionConfig,
    description: Cow<'a, str>,
    body: String,
    tag_items: String,
    related_items: String,
    related_count: usize,
}

impl Scope for PageScope<'_> {
    fn field(&self, name: &str, escape: Escape) -> Option<String> {
        let article = self.article;

        let value: Cow<str> = match name {
            "TITLE" => Cow::Borrowed(&article.title),
            "DESCRIPTION" => Cow::Borrowed(&self.description),
            "TAGS" => Cow::Owned(article.tags.join(", ")),
            "TAG_ITEMS" => Cow::Borrowed(&self.tag_items),
            "COVER" => Cow::Borrowed(article.cover().unwrap_or(&self.config.default_cover)),
            "ID" => Cow::Borrowed(&article.id),
            "DATE" => Cow::Owned(format_date(
                article.date.as_deref().unwrap_or(""),
                &self.config.date_format,
            )),
            "AUTHOR" => Cow::Borrowed(
                article
                    .author
                    .as_deref()
                    .filter(|author| !author.is_empty())
                    .unwrap_or(&self.config.default_author),
            ),
            "READTIME" => Cow::Borrowed(article.read_time()),
            "CONTENT" => Cow::Borrowed(&self.body),
            "RELATED_ITEMS" => Cow::Borrowed(&self.related_items),
            _ => return None,
        };

        Some(match escape {
            Escape::Json => escape_json(&value),
            Escape::Html if matches!(name, "TITLE" | "DESCRIPTION") => {
                escape_html(&value).into_owned()
            }
            Escape::Html => value.into_owned(),
        })
    }

    fn present(&self, name: &str) -> bool {
        match name {
            "TAGS" => !self.article.tags.is_empty(),
            "COVER" => {
                self.article.cover().is_some()
                    && !(self.collection.hide_cover_on_video
                        && self.article.kind == ArticleKind::Video)
            }
            "RELATED" => self.related_count > 0,
            _ => self
                .field(name, Escape::Html)
                .map_or(false, |value| !value.is_empty()),
        }
    }
}

/// Renders the pages of one collection.
pub struct PageRenderer<'a> {
    pub config: &'a Config,
    pub collection: &'a CollectionConfig,
    pub template: &'a Template,
    pub fragments: &'a Fragments,
    pub root: &'a Path,
}

impl<'a> PageRenderer<'a> {
    pub fn scope(
        &self,
        article: &'a Article,
        index: &HashMap<&str, &Article>,
        description: Cow<'a, str>,
    ) -> anyhow::Result<PageScope<'a>> {
        let cards: Vec<Card> = article
            .related
            .iter()
            .filter_map(|id| {
                let related = index.get(id.as_str());
                if related.is_none() {
                    log::debug!("`{}` lists unknown related article `{}`", article.id, id);
                }
                related.map(|related| Card::new(related))
            })
            .collect();

        let body = handler_for(article.kind).render_body(
            article,
            &BodyContext {
                root: self.root,
                fragments: self.fragments,
            },
        )?;

        Ok(PageScope {
            article,
            config: self.config,
            collection: self.collection,
            description,
            body,
            tag_items: self.fragments.tags(&article.tags)?,
            related_items: self.fragments.related(&cards)?,
            related_count: cards.len(),
        })
    }

    pub fn render(
        &self,
        article: &'a Article,
        index: &HashMap<&str, &Article>,
        description: Cow<'a, str>,
    ) -> anyhow::Result<String> {
        Ok(self.template.render(&self.scope(article, index, description)?))
    }
}

#[cfg(test)]
mod test {
    use std::borrow::Cow;

    use super::{format_date, PageRenderer};
    use crate::{
        article::{Article, ArticleKind, ArticleSet},
        config::Config,
        fragments::Fragments,
        template::Template,
    };

    fn render(template: &str, set: &ArticleSet, id: &str, collection: &str) -> String {
        let config = Config::default();
        let template = Template::parse(template).unwrap();
        let fragments = Fragments::new().unwrap();
        let root = tempfile::tempdir().unwrap();
        let renderer = PageRenderer {
            config: &config,
            collection: config.collection(collection).unwrap(),
            template: &template,
            fragments: &fragments,
            root: root.path(),
        };

        let index = set.by_id();
        let article = index[id];
        renderer
            .render(article, &index, Cow::Borrowed(&article.description))
            .unwrap()
    }

    fn set(json: &str) -> ArticleSet {
        ArticleSet::parse(json).unwrap()
    }

    #[test]
    fn minimal_template_without_tags() {
        let articles = set(
            r#"{"articles": [{"id": "a1", "title": "T", "description": "D", "tags": [], "date": "2024-01-02"}]}"#,
        );

        assert_eq!(
            render(
                "<title>{{TITLE}}</title>{{#TAGS}}<x>{{TAGS}}</x>{{/TAGS}}",
                &articles,
                "a1",
                "guides"
            ),
            "<title>T</title>"
        );
    }

    #[test]
    fn fields_and_defaults() {
        let articles = set(
            r#"{"articles": [{"id": "a1", "title": "A & B", "tags": ["x", "y"], "date": "2024-01-02", "duration": "5分钟"}]}"#,
        );

        assert_eq!(
            render(
                "{{TITLE}}|{{TAGS}}|{{TAG_ITEMS}}|{{COVER}}|{{DATE}}|{{AUTHOR}}|{{READTIME}}|{{ID}}",
                &articles,
                "a1",
                "guides"
            ),
            "A &amp; B|x, y|<span class=\"article-tag\">x</span><span class=\"article-tag\">y</span>|/icons/imageclassify.png|2024年01月02日|芯图团队|5分钟|a1"
        );
    }

    #[test]
    fn tags_fill_the_comment_marker() {
        let articles = set(r#"{"articles": [{"id": "a1", "tags": ["x", "y"]}, {"id": "b2"}]}"#);
        let template =
            "{{#TAGS}}<div class=\"article-tags\"><!-- 标签会在这里自动生成 --></div>{{/TAGS}}";

        assert_eq!(
            render(template, &articles, "a1", "guides"),
            r#"<div class="article-tags"><span class="article-tag">x</span><span class="article-tag">y</span></div>"#
        );
        assert_eq!(render(template, &articles, "b2", "guides"), "");
    }

    #[test]
    fn related_block_skips_unknown_ids() {
        let articles = set(
            r#"{"articles": [
                {"id": "a1", "related": ["ghost", "b2"]},
                {"id": "b2", "title": "Second"},
                {"id": "c3", "related": ["ghost"]}
            ]}"#,
        );
        let template = "<aside>{{#RELATED}}<h2>More</h2><div>{{RELATED_ITEMS}}</div>{{/RELATED}}</aside>";

        let html = render(template, &articles, "a1", "guides");
        assert!(html.starts_with("<aside><h2>More</h2><div>"));
        assert!(html.contains("href=\"b2.html\""));
        assert!(!html.contains("ghost"));
        assert_eq!(html.matches("related-article-card").count(), 1);

        assert_eq!(render(template, &articles, "c3", "guides"), "<aside></aside>");
    }

    #[test]
    fn cover_hidden_on_diary_videos() {
        let articles = set(
            r#"{"articles": [{"id": "v1", "type": "video", "cover": "/c.png", "videoUrl": "https://www.bilibili.com/video/BV1ab411c7xy"}]}"#,
        );
        let template = "{{#COVER}}<img src=\"{{COVER}}\">{{/COVER}}{{CONTENT}}";

        let diary = render(template, &articles, "v1", "diary");
        assert!(!diary.contains("/c.png"));
        assert!(diary.contains("bvid=BV1ab411c7xy"));

        let guides = render(template, &articles, "v1", "guides");
        assert!(guides.starts_with("<img src=\"/c.png\">"));
        assert_eq!(articles.articles[0].kind, ArticleKind::Video);
    }

    #[test]
    fn rendering_is_deterministic() {
        let articles = set(
            r#"{"articles": [{"id": "a1", "title": "T", "tags": ["a"], "related": ["a1"]}]}"#,
        );
        let template = "{{TITLE}}{{#TAGS}}{{TAG_ITEMS}}{{/TAGS}}{{#RELATED}}{{RELATED_ITEMS}}{{/RELATED}}";

        assert_eq!(
            render(template, &articles, "a1", "guides"),
            render(template, &articles, "a1", "guides")
        );
    }

    #[test]
    fn generic_blocks_follow_their_field() {
        let articles = set(r#"{"articles": [{"id": "a1", "author": "Li"}, {"id": "b2", "readTime": ""}]}"#);
        let template = "{{#READTIME}}<i>{{READTIME}}</i>{{/READTIME}}{{#AUTHOR}}by {{AUTHOR}}{{/AUTHOR}}";

        assert_eq!(render(template, &articles, "a1", "guides"), "by Li");
        assert_eq!(render(template, &articles, "b2", "guides"), "by 芯图团队");
    }

    #[test]
    fn dates() {
        assert_eq!(format_date("2024-03-09", "%Y年%m月%d日"), "2024年03月09日");
        assert_eq!(format_date("2024-03-09", "%B %-d, %Y"), "March 9, 2024");
        assert_eq!(format_date("soon", "%Y"), "soon");
        assert_eq!(format_date("", "%Y"), "");
    }

    #[test]
    fn unused_article_fields_are_ignored() {
        let article = Article::default();
        assert_eq!(article.read_time(), "");
    }
}
