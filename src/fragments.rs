// SPDX-FileCopyrightText: 2024 Ohin "Kazani" Taylor <kazani@kazani.dev>
// SPDX-License-Identifier: MIT

use serde::Serialize;
use tera::{Context, Tera};

use crate::{article::Article, template::escape_html};

const TAGS: &str = r#"{% for tag in tags %}<span class="article-tag">{{ tag }}</span>{% endfor %}"#;

const RELATED: &str = r#"{% for card in cards %}
                <a href="{{ card.id }}.html" class="related-article-card">
                    <h3>{{ card.title }}</h3>
                    <p>{{ card.description }}</p>
                </a>{% endfor %}"#;

const VIDEO: &str = r#"
    <div class="video-container">
        {% if bvid -%}
        <div style="position: relative; padding-bottom: 56.25%; height: 0; overflow: hidden; max-width: 100%; margin: 20px 0;">
            <iframe src="//player.bilibili.com/player.html?bvid={{ bvid }}&page=1"
                    scrolling="no" border="0" frameborder="no" framespacing="0"
                    allowfullscreen="true"
                    style="position: absolute; top: 0; left: 0; width: 100%; height: 100%;">
            </iframe>
        </div>
        {%- else -%}
        <p><a href="{{ url }}" target="_blank">观看视频</a></p>
        {%- endif %}
        <h2>视频简介</h2>
        <p>{{ description }}</p>
    </div>
    {% if transcript %}
        <h2>文字稿</h2>
        <div class="transcript">
            {{ transcript }}
        </div>
    {% endif %}"#;

/// A resolved entry of an article's `related` list.
#[derive(Serialize, Debug)]
pub struct Card {
    id: String,
    title: String,
    description: String,
}

impl Card {
    pub fn new(article: &Article) -> Self {
        Self {
            id: article.id.clone(),
            title: escape_html(&article.title).into_owned(),
            description: escape_html(&article.description).into_owned(),
        }
    }
}

/// Small generated snippets spliced into page templates.
#[derive(Clone, Debug)]
pub struct Fragments {
    tera: Tera,
}

impl Fragments {
    /// Creates the Tera instance with every fragment registered.
    /// Also disables autoescape, values are escaped before they are inserted.
    pub fn new() -> Result<Self, tera::Error> {
        let mut tera = Tera::default();

        tera.add_raw_templates(vec![
            ("tags.html", TAGS),
            ("related.html", RELATED),
            ("video.html", VIDEO),
        ])?;
        tera.autoescape_on(vec![]);

        Ok(Self { tera })
    }

    pub fn tags(&self, tags: &[String]) -> Result<String, tera::Error> {
        let tags: Vec<String> = tags
            .iter()
            .map(|tag| escape_html(tag).into_owned())
            .collect();

        let mut context = Context::new();
        context.insert("tags", &tags);

        self.tera.render("tags.html", &context)
    }

    pub fn related(&self, cards: &[Card]) -> Result<String, tera::Error> {
        let mut context = Context::new();
        context.insert("cards", cards);

        self.tera.render("related.html", &context)
    }

    /// Player block. Without a bilibili id the video degrades to a link.
    pub fn video(
        &self,
        bvid: Option<&str>,
        url: &str,
        description: &str,
        transcript: Option<&str>,
    ) -> Result<String, tera::Error> {
        let mut context = Context::new();
        context.insert("bvid", &bvid);
        context.insert("url", &escape_html(url));
        context.insert("description", description);
        context.insert("transcript", &transcript.filter(|t| !t.is_empty()));

        self.tera.render("video.html", &context)
    }
}
