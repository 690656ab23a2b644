// SPDX-FileCopyrightText: 2024 Ohin "Kazani" Taylor <kazani@kazani.dev>
// SPDX-License-Identifier: MIT

//! Page templates.
//!
//! A template is plain HTML with `{{NAME}}` placeholders and `{{#NAME}}...{{/NAME}}`
//! conditional blocks. It is parsed once into a tree of [`Node`]s and rendered against a
//! [`Scope`] per article. Placeholders inside a `<script type="application/ld+json">`
//! element are tagged with [`Escape::Json`] at parse time so the structured data stays
//! valid JSON.

use std::{
    borrow::Cow,
    path::{Path, PathBuf},
};

use lazy_static::lazy_static;
use regex::Regex;
use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum TemplateError {
    #[error("template {} not found", .0.display())]
    Missing(PathBuf),
    #[error("block `{{{{#{0}}}}}` is never closed")]
    Unclosed(String),
    #[error("expected `{{{{/{expected}}}}}` but found `{{{{/{found}}}}}`")]
    Mismatched { expected: String, found: String },
    #[error("closing marker `{{{{/{0}}}}}` has no opening block")]
    Stray(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Escape {
    Html,
    Json,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Node {
    Text(String),
    Placeholder { name: String, escape: Escape },
    Block { name: String, children: Vec<Node> },
}

/// Values a template is rendered against.
pub trait Scope {
    /// The value of `name`, already escaped for `escape`. `None` leaves the token untouched.
    fn field(&self, name: &str, escape: Escape) -> Option<String>;

    /// Whether the block `name` is kept.
    fn present(&self, name: &str) -> bool {
        self.field(name, Escape::Html)
            .map_or(false, |value| !value.is_empty())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Template {
    nodes: Vec<Node>,
}

lazy_static! {
    static ref TOKEN_REGEX: Regex =
        Regex::new(r"\{\{(?<marker>[#/]?)(?<name>[A-Za-z][A-Za-z0-9_]*)\}\}").unwrap();
    static ref LD_JSON_OPEN_REGEX: Regex =
        Regex::new(r#"(?i)<script\s+type=["']application/ld\+json["'][^>]*>"#).unwrap();
    static ref SCRIPT_CLOSE_REGEX: Regex = Regex::new(r"(?i)</script\s*>").unwrap();
}

/// Older templates mark where the tag spans go with this comment inside `{{#TAGS}}`.
pub const TAG_ITEMS_MARKER: &str = "<!-- 标签会在这里自动生成 -->";

enum Token<'a> {
    Text(&'a str),
    Placeholder(&'a str, Escape),
    Open(&'a str),
    Close(&'a str),
}

/// Splits the source into regions tagged with the escaping they need.
fn regions(source: &str) -> Vec<(&str, Escape)> {
    let mut regions = vec![];
    let mut rest = source;

    while let Some(open) = LD_JSON_OPEN_REGEX.find(rest) {
        regions.push((&rest[..open.end()], Escape::Html));
        rest = &rest[open.end()..];

        let close = SCRIPT_CLOSE_REGEX
            .find(rest)
            .map_or(rest.len(), |close| close.start());
        regions.push((&rest[..close], Escape::Json));
        rest = &rest[close..];
    }

    regions.push((rest, Escape::Html));
    regions
}

fn tokenize(source: &str) -> Vec<Token<'_>> {
    let mut tokens = vec![];

    for (region, escape) in regions(source) {
        let mut last = 0;

        for caps in TOKEN_REGEX.captures_iter(region) {
            let (Some(whole), Some(name)) = (caps.get(0), caps.name("name")) else {
                continue;
            };

            if whole.start() > last {
                tokens.push(Token::Text(&region[last..whole.start()]));
            }
            last = whole.end();

            tokens.push(match caps.name("marker").map_or("", |m| m.as_str()) {
                "#" => Token::Open(name.as_str()),
                "/" => Token::Close(name.as_str()),
                _ => Token::Placeholder(name.as_str(), escape),
            });
        }

        if last < region.len() {
            tokens.push(Token::Text(&region[last..]));
        }
    }

    tokens
}

fn push_text(nodes: &mut Vec<Node>, text: &str) {
    if text.is_empty() {
        return;
    }

    if let Some(Node::Text(previous)) = nodes.last_mut() {
        previous.push_str(text);
    } else {
        nodes.push(Node::Text(text.to_owned()));
    }
}

/// Text inside a `TAGS` block, with the comment marker read as `{{TAG_ITEMS}}`.
fn push_tags_text(nodes: &mut Vec<Node>, text: &str) {
    let mut pieces = text.split(TAG_ITEMS_MARKER);

    if let Some(first) = pieces.next() {
        push_text(nodes, first);
    }
    for piece in pieces {
        nodes.push(Node::Placeholder {
            name: "TAG_ITEMS".to_owned(),
            escape: Escape::Html,
        });
        push_text(nodes, piece);
    }
}

impl Template {
    pub fn parse(source: &str) -> Result<Self, TemplateError> {
        // Bottom of the stack is the document itself.
        let mut stack: Vec<(Option<&str>, Vec<Node>)> = vec![(None, vec![])];

        for token in tokenize(source) {
            match token {
                Token::Text(text) => match stack.last_mut() {
                    Some((Some("TAGS"), nodes)) => push_tags_text(nodes, text),
                    Some((_, nodes)) => push_text(nodes, text),
                    None => {}
                },
                Token::Placeholder(name, escape) => {
                    if let Some((_, nodes)) = stack.last_mut() {
                        nodes.push(Node::Placeholder {
                            name: name.to_owned(),
                            escape,
                        });
                    }
                }
                Token::Open(name) => stack.push((Some(name), vec![])),
                Token::Close(name) => {
                    if stack.len() == 1 {
                        return Err(TemplateError::Stray(name.to_owned()));
                    }

                    let Some((Some(open), children)) = stack.pop() else {
                        return Err(TemplateError::Stray(name.to_owned()));
                    };

                    if open != name {
                        return Err(TemplateError::Mismatched {
                            expected: open.to_owned(),
                            found: name.to_owned(),
                        });
                    }

                    if let Some((_, nodes)) = stack.last_mut() {
                        nodes.push(Node::Block {
                            name: name.to_owned(),
                            children,
                        });
                    }
                }
            }
        }

        match stack.pop() {
            Some((None, nodes)) => Ok(Self { nodes }),
            Some((Some(open), _)) => Err(TemplateError::Unclosed(open.to_owned())),
            None => Ok(Self { nodes: vec![] }),
        }
    }

    pub fn load(path: &Path) -> anyhow::Result<Self> {
        if !path.is_file() {
            return Err(TemplateError::Missing(path.to_owned()).into());
        }

        let source = std::fs::read_to_string(path)?;
        Ok(Self::parse(&source)?)
    }

    pub fn nodes(&self) -> &[Node] {
        &self.nodes
    }

    pub fn render(&self, scope: &dyn Scope) -> String {
        let mut out = String::new();
        render_nodes(&self.nodes, scope, &mut out);
        out
    }
}

fn render_nodes(nodes: &[Node], scope: &dyn Scope, out: &mut String) {
    for node in nodes {
        match node {
            Node::Text(text) => out.push_str(text),
            Node::Placeholder { name, escape } => match scope.field(name, *escape) {
                Some(value) => out.push_str(&value),
                None => {
                    out.push_str("{{");
                    out.push_str(name);
                    out.push_str("}}");
                }
            },
            Node::Block { name, children } => {
                if scope.present(name) {
                    render_nodes(children, scope, out);
                }
            }
        }
    }
}

/// Escapes `&`, `<`, `>` and `"` for markup and attribute values.
pub fn escape_html(text: &str) -> Cow<'_, str> {
    if !text.contains(['&', '<', '>', '"']) {
        return Cow::Borrowed(text);
    }

    Cow::Owned(
        text.replace('&', "&amp;")
            .replace('<', "&lt;")
            .replace('>', "&gt;")
            .replace('"', "&quot;"),
    )
}

/// Reverses [`escape_html`], plus the apostrophe forms browsers and editors produce.
pub fn unescape_html(text: &str) -> Cow<'_, str> {
    if !text.contains('&') {
        return Cow::Borrowed(text);
    }

    Cow::Owned(
        text.replace("&quot;", "\"")
            .replace("&#34;", "\"")
            .replace("&#39;", "'")
            .replace("&apos;", "'")
            .replace("&lt;", "<")
            .replace("&gt;", ">")
            .replace("&amp;", "&"),
    )
}

/// Escapes text for use inside a JSON string literal, without the surrounding quotes.
pub fn escape_json(text: &str) -> String {
    let quoted = serde_json::Value::String(text.to_owned()).to_string();
    quoted[1..quoted.len() - 1].to_owned()
}
