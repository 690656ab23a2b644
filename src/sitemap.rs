//! Sitemap reconciliation.
//!
//! The sitemap is read once, updated in memory and written back once per run. Entries
//! nobody asked about are carried over untouched, in their original order, and so are
//! extension children of an entry (`image:image`, `xhtml:link`, ...).
//!
//! ```xml
//! <?xml version="1.0" encoding="UTF-8"?>
//! <urlset xmlns="http://www.sitemaps.org/schemas/sitemap/0.9">
//!     <url>
//!         <loc>https://example.com/guides/a1.html</loc>
//!         <lastmod>2024-01-02</lastmod>
//!         <changefreq>monthly</changefreq>
//!         <priority>0.8</priority>
//!     </url>
//! </urlset>
//! ```

use std::path::Path;

use anyhow::Context;
use quick_xml::{
    events::{BytesEnd, BytesStart, BytesText, Event},
    Reader, Writer,
};
use thiserror::Error;

pub const SITEMAP_NS: &str = "http://www.sitemaps.org/schemas/sitemap/0.9";
const DEFAULT_DECLARATION: &str = r#"<?xml version="1.0" encoding="UTF-8"?>"#;

#[derive(Debug, Error)]
pub enum SitemapError {
    #[error("malformed sitemap XML near byte {position}")]
    Xml {
        position: usize,
        #[source]
        source: quick_xml::Error,
    },
    #[error("sitemap has no <urlset> element")]
    MissingUrlset,
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Entry {
    pub loc: String,
    pub lastmod: Option<String>,
    pub changefreq: Option<String>,
    pub priority: Option<String>,
    /// Children other than the four above, as read. Written back after them.
    pub extra: Vec<Event<'static>>,
}

impl Entry {
    pub fn new(loc: String, lastmod: &str, changefreq: &str, priority: &str) -> Self {
        Self {
            loc,
            lastmod: Some(lastmod.to_owned()),
            changefreq: Some(changefreq.to_owned()),
            priority: Some(priority.to_owned()),
            extra: vec![],
        }
    }
}

#[derive(Clone, Copy)]
enum Field {
    Loc,
    Lastmod,
    Changefreq,
    Priority,
}

/// URLs touched by [`Sitemap::upsert`].
#[derive(Debug, Default, PartialEq, Eq)]
pub struct Changes {
    pub added: Vec<String>,
    pub updated: Vec<String>,
}

impl Changes {
    pub fn is_empty(&self) -> bool {
        self.added.is_empty() && self.updated.is_empty()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Sitemap {
    /// Written back exactly as it was read.
    declaration: String,
    /// Attributes of `<urlset>`, namespace declarations included.
    attributes: Vec<(String, String)>,
    entries: Vec<Entry>,
}

impl Default for Sitemap {
    fn default() -> Self {
        Self {
            declaration: DEFAULT_DECLARATION.to_owned(),
            attributes: vec![("xmlns".to_owned(), SITEMAP_NS.to_owned())],
            entries: vec![],
        }
    }
}

fn urlset_attributes(start: &BytesStart) -> Result<Vec<(String, String)>, quick_xml::Error> {
    let mut attributes = vec![];

    for attribute in start.attributes() {
        let attribute = attribute?;
        attributes.push((
            String::from_utf8_lossy(attribute.key.as_ref()).into_owned(),
            attribute.unescape_value()?.into_owned(),
        ));
    }

    Ok(attributes)
}

fn is_extension(start: &BytesStart) -> bool {
    let name = start.name();
    name.as_ref() != b"url" && field_of(name.as_ref()).is_none()
}

fn field_of(name: &[u8]) -> Option<Field> {
    match name {
        b"loc" => Some(Field::Loc),
        b"lastmod" => Some(Field::Lastmod),
        b"changefreq" => Some(Field::Changefreq),
        b"priority" => Some(Field::Priority),
        _ => None,
    }
}

impl Sitemap {
    pub fn parse(xml: &str) -> Result<Self, SitemapError> {
        let trimmed = xml.trim_start();
        let declaration = trimmed
            .strip_prefix("<?xml")
            .and_then(|_| trimmed.find("?>"))
            .map_or(DEFAULT_DECLARATION, |end| &trimmed[..end + 2]);

        let mut slf = Self {
            declaration: declaration.to_owned(),
            attributes: vec![],
            entries: vec![],
        };

        let mut reader = Reader::from_str(xml);
        reader.trim_text(true);

        let mut seen_urlset = false;
        let mut current: Option<Entry> = None;
        let mut field: Option<Field> = None;
        // Nesting depth inside an extension child of the current `<url>`.
        let mut depth = 0usize;

        loop {
            let event = reader.read_event().map_err(|source| SitemapError::Xml {
                position: reader.buffer_position(),
                source,
            })?;

            let opens_extension = match &event {
                Event::Start(start) | Event::Empty(start) => {
                    current.is_some() && field.is_none() && is_extension(start)
                }
                _ => false,
            };

            if (depth > 0 || opens_extension) && !matches!(event, Event::Eof) {
                match &event {
                    Event::Start(_) => depth += 1,
                    Event::End(_) => depth = depth.saturating_sub(1),
                    _ => {}
                }
                if let Some(entry) = current.as_mut() {
                    entry.extra.push(event.into_owned());
                }
                continue;
            }

            let text = match event {
                Event::Eof => break,
                Event::Start(start) | Event::Empty(start)
                    if start.local_name().as_ref() == b"urlset" =>
                {
                    seen_urlset = true;
                    slf.attributes =
                        urlset_attributes(&start).map_err(|source| SitemapError::Xml {
                            position: reader.buffer_position(),
                            source,
                        })?;
                    continue;
                }
                Event::Start(start) => {
                    match start.name().as_ref() {
                        b"url" => current = Some(Entry::default()),
                        name => field = field_of(name),
                    }
                    continue;
                }
                Event::End(end) => {
                    if end.local_name().as_ref() == b"url" {
                        if let Some(entry) = current.take().filter(|e| !e.loc.is_empty()) {
                            slf.entries.push(entry);
                        }
                    }
                    field = None;
                    continue;
                }
                Event::Text(text) => text
                    .unescape()
                    .map_err(|source| SitemapError::Xml {
                        position: reader.buffer_position(),
                        source,
                    })?
                    .into_owned(),
                Event::CData(data) => String::from_utf8_lossy(&data.into_inner()).into_owned(),
                _ => continue,
            };

            let (Some(entry), Some(field)) = (current.as_mut(), field) else {
                continue;
            };
            let text = text.trim().to_owned();

            match field {
                Field::Loc => entry.loc = text,
                Field::Lastmod => entry.lastmod = Some(text),
                Field::Changefreq => entry.changefreq = Some(text),
                Field::Priority => entry.priority = Some(text),
            }
        }

        if !seen_urlset {
            return Err(SitemapError::MissingUrlset);
        }

        Ok(slf)
    }

    /// Reads the sitemap at `path`, starting an empty one when there is none yet.
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        if !path.exists() {
            log::warn!("No sitemap at {:?}, starting a new one", path);
            return Ok(Self::default());
        }

        let xml = std::fs::read_to_string(path)
            .with_context(|| format!("reading sitemap {}", path.display()))?;
        Ok(Self::parse(&xml).with_context(|| format!("parsing sitemap {}", path.display()))?)
    }

    pub fn entries(&self) -> &[Entry] {
        &self.entries
    }

    /// Appends `expected` when its URL is unknown. A known URL only gets its `lastmod`
    /// refreshed, and only when `refresh_lastmod` is set.
    pub fn upsert(&mut self, expected: Entry, refresh_lastmod: bool, changes: &mut Changes) {
        match self.entries.iter_mut().find(|entry| entry.loc == expected.loc) {
            None => {
                changes.added.push(expected.loc.clone());
                self.entries.push(expected);
            }
            Some(existing) if refresh_lastmod && existing.lastmod != expected.lastmod => {
                existing.lastmod = expected.lastmod;
                changes.updated.push(expected.loc);
            }
            Some(_) => {}
        }
    }

    pub fn to_xml(&self) -> Result<String, quick_xml::Error> {
        let mut writer = Writer::new_with_indent(Vec::new(), b' ', 4);

        let mut urlset = BytesStart::new("urlset");
        urlset.extend_attributes(
            self.attributes
                .iter()
                .map(|(key, value)| (key.as_str(), value.as_str())),
        );
        writer.write_event(Event::Start(urlset))?;

        for entry in &self.entries {
            writer.write_event(Event::Start(BytesStart::new("url")))?;
            Self::write_field(&mut writer, "loc", Some(&entry.loc))?;
            Self::write_field(&mut writer, "lastmod", entry.lastmod.as_deref())?;
            Self::write_field(&mut writer, "changefreq", entry.changefreq.as_deref())?;
            Self::write_field(&mut writer, "priority", entry.priority.as_deref())?;
            for event in &entry.extra {
                writer.write_event(event)?;
            }
            writer.write_event(Event::End(BytesEnd::new("url")))?;
        }

        writer.write_event(Event::End(BytesEnd::new("urlset")))?;

        let body = String::from_utf8_lossy(&writer.into_inner()).into_owned();
        Ok(format!("{}\n{}\n", self.declaration, body))
    }

    fn write_field(
        writer: &mut Writer<Vec<u8>>,
        name: &str,
        value: Option<&str>,
    ) -> Result<(), quick_xml::Error> {
        if let Some(value) = value {
            writer.write_event(Event::Start(BytesStart::new(name)))?;
            writer.write_event(Event::Text(BytesText::new(value)))?;
            writer.write_event(Event::End(BytesEnd::new(name)))?;
        }
        Ok(())
    }

    pub fn save(&self, path: &Path) -> anyhow::Result<()> {
        let xml = self.to_xml().context("serializing sitemap")?;
        std::fs::write(path, xml).with_context(|| format!("writing sitemap {}", path.display()))
    }
}
