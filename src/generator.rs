use std::path::{Path, PathBuf};

use anyhow::Context;

use crate::{
    article::ArticleSet,
    config::{CollectionConfig, Config},
    fragments::Fragments,
    overrides::OverrideResolver,
    page::PageRenderer,
    sitemap::{Changes, Entry, Sitemap},
    template::Template,
};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub enum Mode {
    /// Regenerate every page and refresh `lastmod` of known URLs.
    #[default]
    Full,
    /// Only write pages that do not exist yet; the sitemap is add-only.
    Incremental,
}

#[derive(Debug, Default)]
pub struct Report {
    pub generated: usize,
    pub unchanged: usize,
    pub skipped: usize,
    /// Collections aborted by a missing or malformed input.
    pub failed: Vec<String>,
    pub sitemap: Changes,
    pub sitemap_failed: bool,
}

impl Report {
    pub fn success(&self) -> bool {
        self.failed.is_empty() && !self.sitemap_failed
    }
}

/// Whole-file write, skipped when the bytes are already there.
fn write_if_changed(path: &Path, contents: &str) -> std::io::Result<bool> {
    if std::fs::read(path).map_or(false, |existing| existing == contents.as_bytes()) {
        return Ok(false);
    }

    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    std::fs::write(path, contents)?;
    Ok(true)
}

pub struct Generator<'a> {
    config: &'a Config,
    root: PathBuf,
    mode: Mode,
    fragments: Fragments,
    today: String,
}

impl<'a> Generator<'a> {
    pub fn new(config: &'a Config, root: &Path, mode: Mode) -> anyhow::Result<Self> {
        Ok(Self {
            config,
            root: root.to_owned(),
            mode,
            fragments: Fragments::new().context("building HTML fragments")?,
            today: chrono::Local::now().format("%Y-%m-%d").to_string(),
        })
    }

    /// Pins the date used for entries without one.
    pub fn with_today(mut self, today: &str) -> Self {
        self.today = today.to_owned();
        self
    }

    pub fn run(&self, only: Option<&str>) -> anyhow::Result<Report> {
        let collections: Vec<&CollectionConfig> = match only {
            Some(name) => vec![self
                .config
                .collection(name)
                .with_context(|| format!("no collection named `{}`", name))?],
            None => self.config.collections.iter().collect(),
        };

        let mut report = Report::default();
        let mut expected: Vec<(Entry, bool)> = vec![];

        for collection in collections {
            log::info!("Processing collection `{}`", collection.name);

            match self.handle_collection(collection, &mut report) {
                Ok(entries) => expected.extend(entries),
                Err(err) => {
                    log::error!("Collection `{}` aborted: {:#}", collection.name, err);
                    report.failed.push(collection.name.clone());
                }
            }
        }

        if let Err(err) = self.reconcile_sitemap(expected, &mut report) {
            log::error!("Sitemap not updated: {:#}", err);
            report.sitemap_failed = true;
        }

        Ok(report)
    }

    /// Writes the pages of one collection and returns the sitemap entries they need.
    fn handle_collection(
        &self,
        collection: &CollectionConfig,
        report: &mut Report,
    ) -> anyhow::Result<Vec<(Entry, bool)>> {
        let articles = ArticleSet::load(&self.root.join(&collection.data))?;
        log::info!("Found {} articles", articles.articles.len());

        let template = Template::load(&self.root.join(&collection.template))
            .with_context(|| format!("loading template for `{}`", collection.name))?;

        let dir = self.root.join(&collection.dir);
        std::fs::create_dir_all(&dir)
            .with_context(|| format!("creating output directory {}", dir.display()))?;

        let overrides = OverrideResolver::for_dir(self.config.override_policy, &dir)?;
        let renderer = PageRenderer {
            config: self.config,
            collection,
            template: &template,
            fragments: &self.fragments,
            root: &self.root,
        };
        let index = articles.by_id();

        for article in &articles.articles {
            if article.id.is_empty() {
                log::warn!("Skipping an article without id (`{}`)", article.title);
                continue;
            }

            let output = dir.join(format!("{}.html", article.id));

            if self.mode == Mode::Incremental && output.exists() {
                log::info!("Skipping {:?}, it already exists", output);
                report.skipped += 1;
                continue;
            }

            let description = overrides.description(article, &output);
            let html = match renderer.render(article, &index, description) {
                Ok(html) => html,
                Err(err) => {
                    log::warn!("Could not render `{}`: {:#}", article.id, err);
                    continue;
                }
            };

            if write_if_changed(&output, &html)
                .with_context(|| format!("writing {}", output.display()))?
            {
                log::info!("Generated {:?}", output);
                report.generated += 1;
            } else {
                report.unchanged += 1;
            }
        }

        Ok(self.sitemap_entries(collection, &articles))
    }

    /// The list page is only ever added; article dates are refreshed in full runs.
    fn sitemap_entries(
        &self,
        collection: &CollectionConfig,
        articles: &ArticleSet,
    ) -> Vec<(Entry, bool)> {
        let base_url = self.config.base_url();
        let refresh = self.mode == Mode::Full;

        let mut entries = vec![(
            Entry::new(
                collection.list_url(base_url),
                &self.today,
                "weekly",
                "0.9",
            ),
            false,
        )];

        entries.extend(
            articles
                .articles
                .iter()
                .filter(|article| !article.id.is_empty())
                .map(|article| {
                    let lastmod = article
                        .date
                        .as_deref()
                        .filter(|date| !date.is_empty())
                        .unwrap_or(&self.today);

                    (
                        Entry::new(
                            collection.page_url(base_url, &article.id),
                            lastmod,
                            "monthly",
                            "0.8",
                        ),
                        refresh,
                    )
                }),
        );

        entries
    }

    fn reconcile_sitemap(
        &self,
        expected: Vec<(Entry, bool)>,
        report: &mut Report,
    ) -> anyhow::Result<()> {
        if expected.is_empty() {
            return Ok(());
        }

        let path = self.root.join(&self.config.sitemap);
        let mut sitemap = Sitemap::load(&path)?;

        for (entry, refresh) in expected {
            sitemap.upsert(entry, refresh, &mut report.sitemap);
        }

        if report.sitemap.is_empty() {
            log::info!("Sitemap is up to date");
            return Ok(());
        }

        sitemap.save(&path)?;

        for url in &report.sitemap.added {
            log::info!("Sitemap: added {}", url);
        }
        if !report.sitemap.updated.is_empty() {
            log::info!(
                "Sitemap: refreshed lastmod of {} URLs",
                report.sitemap.updated.len()
            );
        }

        Ok(())
    }
}

#[cfg(test)]
mod test {
    use std::path::Path;

    use super::{Generator, Mode};
    use crate::{config::Config, sitemap::Sitemap};

    const TEMPLATE: &str = r#"<html><head><title>{{TITLE}}</title>
<meta name="description" content="{{DESCRIPTION}}">
<script type="application/ld+json">
{"headline": "{{TITLE}}", "description": "{{DESCRIPTION}}", "datePublished": "{{DATE}}"}
</script></head>
<body>{{#TAGS}}<div class="tags">{{TAG_ITEMS}}</div>{{/TAGS}}
{{#COVER}}<img src="{{COVER}}" alt="{{TITLE}}" class="article-cover">{{/COVER}}
<article>{{CONTENT}}</article>
{{#RELATED}}<section>{{RELATED_ITEMS}}</section>{{/RELATED}}</body></html>
"#;

    const SITEMAP: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<urlset xmlns="http://www.sitemaps.org/schemas/sitemap/0.9">
    <url>
        <loc>https://www.xintuxiangce.top/</loc>
        <lastmod>2024-01-01</lastmod>
        <changefreq>daily</changefreq>
        <priority>1.0</priority>
    </url>
    <url>
        <loc>https://www.xintuxiangce.top/guides.html</loc>
        <lastmod>2024-01-01</lastmod>
        <changefreq>weekly</changefreq>
        <priority>0.9</priority>
    </url>
    <url>
        <loc>https://www.xintuxiangce.top/guides/old.html</loc>
        <lastmod>2024-01-01</lastmod>
        <changefreq>monthly</changefreq>
        <priority>0.8</priority>
    </url>
</urlset>
"#;

    const DATA: &str = r#"{"articles": [
        {"id": "old", "title": "Old \"one\"", "description": "Line one\nsays \"hi\"", "date": "2024-06-01", "tags": [], "content": "guides/content/old.md", "related": ["missing", "new"]},
        {"id": "new", "title": "New", "description": "Fresh", "date": "2024-07-01", "tags": ["t"], "type": "video", "videoUrl": "https://youtu.be/x", "videoPlatform": "youtube"}
    ]}"#;

    fn site() -> tempfile::TempDir {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path();

        std::fs::create_dir_all(root.join("guides/content")).unwrap();
        std::fs::write(root.join("guides/guide-template.html"), TEMPLATE).unwrap();
        std::fs::write(root.join("guides/content/old.md"), "# Old\n\nBody **text**\n").unwrap();
        std::fs::write(root.join("guides-data.json"), DATA).unwrap();
        std::fs::write(root.join("sitemap.xml"), SITEMAP).unwrap();

        dir
    }

    fn run(root: &Path, mode: Mode) -> super::Report {
        let config = Config::default();
        Generator::new(&config, root, mode)
            .unwrap()
            .with_today("2024-08-01")
            .run(Some("guides"))
            .unwrap()
    }

    fn read(root: &Path, path: &str) -> String {
        std::fs::read_to_string(root.join(path)).unwrap()
    }

    #[test]
    fn full_run_generates_pages_and_sitemap() {
        let dir = site();
        let root = dir.path();

        let report = run(root, Mode::Full);
        assert!(report.success());
        assert_eq!(report.generated, 2);
        assert_eq!(
            report.sitemap.added,
            vec!["https://www.xintuxiangce.top/guides/new.html"]
        );
        assert_eq!(
            report.sitemap.updated,
            vec!["https://www.xintuxiangce.top/guides/old.html"]
        );

        let sitemap = Sitemap::parse(&read(root, "sitemap.xml")).unwrap();
        assert_eq!(sitemap.entries().len(), 4);
        assert_eq!(sitemap.entries()[2].lastmod.as_deref(), Some("2024-06-01"));
        // The list page keeps its date.
        assert_eq!(sitemap.entries()[1].lastmod.as_deref(), Some("2024-01-01"));

        let old = read(root, "guides/old.html");
        assert!(old.contains("<p>Body <strong>text</strong></p>"));
        assert!(!old.contains("<h1>"));
        assert!(!old.contains("{{"));
        assert!(!old.contains("class=\"tags\""));
        assert!(old.contains("href=\"new.html\""));
        assert!(!old.contains("missing"));
        assert!(old.contains(r#"content="Line one
says &quot;hi&quot;""#));

        let json = old
            .split("<script type=\"application/ld+json\">")
            .nth(1)
            .and_then(|rest| rest.split("</script>").next())
            .unwrap();
        let data: serde_json::Value = serde_json::from_str(json).unwrap();
        assert_eq!(data["headline"], "Old \"one\"");
        assert_eq!(data["description"], "Line one\nsays \"hi\"");
        assert_eq!(data["datePublished"], "2024年06月01日");

        let new = read(root, "guides/new.html");
        assert!(new.contains("<span class=\"article-tag\">t</span>"));
        assert!(new.contains("<a href=\"https://youtu.be/x\" target=\"_blank\">"));
    }

    #[test]
    fn second_run_changes_nothing() {
        let dir = site();
        let root = dir.path();

        run(root, Mode::Full);
        let page = read(root, "guides/old.html");
        let sitemap = read(root, "sitemap.xml");

        let report = run(root, Mode::Full);
        assert_eq!(report.generated, 0);
        assert_eq!(report.unchanged, 2);
        assert!(report.sitemap.is_empty());
        assert_eq!(read(root, "guides/old.html"), page);
        assert_eq!(read(root, "sitemap.xml"), sitemap);
    }

    #[test]
    fn incremental_run_only_adds() {
        let dir = site();
        let root = dir.path();
        std::fs::write(root.join("guides/old.html"), "hand made").unwrap();

        let report = run(root, Mode::Incremental);
        assert_eq!(report.skipped, 1);
        assert_eq!(report.generated, 1);
        assert_eq!(read(root, "guides/old.html"), "hand made");
        assert_eq!(report.sitemap.added.len(), 1);
        assert!(report.sitemap.updated.is_empty());

        let sitemap = Sitemap::parse(&read(root, "sitemap.xml")).unwrap();
        assert_eq!(sitemap.entries().len(), 4);
        assert_eq!(sitemap.entries()[2].lastmod.as_deref(), Some("2024-01-01"));
    }

    #[test]
    fn manual_description_survives_regeneration() {
        let dir = site();
        let root = dir.path();

        run(root, Mode::Full);
        let page = read(root, "guides/old.html").replace(
            "content=\"Line one\nsays &quot;hi&quot;\"",
            "content=\"Tuned &amp; tested\"",
        );
        std::fs::write(root.join("guides/old.html"), page).unwrap();

        run(root, Mode::Full);
        let old = read(root, "guides/old.html");
        assert!(old.contains("content=\"Tuned &amp; tested\""));
        assert!(old.contains("\"description\": \"Tuned & tested\""));
        assert!(!old.contains("Line one"));

        // Stable once preserved.
        run(root, Mode::Full);
        assert_eq!(read(root, "guides/old.html"), old);
    }

    #[test]
    fn broken_inputs_fail_the_collection() {
        let dir = site();
        let root = dir.path();
        std::fs::remove_file(root.join("guides/guide-template.html")).unwrap();

        let report = run(root, Mode::Full);
        assert_eq!(report.failed, vec!["guides"]);
        assert!(!report.success());
        assert!(!root.join("guides/old.html").exists());
        assert_eq!(read(root, "sitemap.xml"), SITEMAP);

        std::fs::write(root.join("guides/guide-template.html"), TEMPLATE).unwrap();
        std::fs::write(root.join("guides-data.json"), "{\"articles\": [").unwrap();
        assert_eq!(run(root, Mode::Full).failed, vec!["guides"]);
    }

    #[test]
    fn missing_sitemap_is_created() {
        let dir = site();
        let root = dir.path();
        std::fs::remove_file(root.join("sitemap.xml")).unwrap();

        let report = run(root, Mode::Full);
        assert!(report.success());
        assert_eq!(report.sitemap.added.len(), 3);

        let xml = read(root, "sitemap.xml");
        assert!(xml.starts_with("<?xml version=\"1.0\" encoding=\"UTF-8\"?>\n<urlset"));
        assert!(xml.contains("<lastmod>2024-08-01</lastmod>"));
    }

    #[test]
    fn unknown_collection_is_an_error() {
        let dir = site();
        let config = Config::default();

        assert!(Generator::new(&config, dir.path(), Mode::Full)
            .unwrap()
            .run(Some("nope"))
            .is_err());
    }
}
