//! A small Markdown subset for article bodies.
//!
//! Lines are lexed into tokens, grouped into [`Block`]s, then written out as HTML. Inline
//! markup (bold, code, links, images) is parsed per block. Nested and malformed constructs
//! degrade to plain text.

mod html;
mod inline;
mod lex;

use lex::{Lexer, TokenKind};

pub use inline::Inline;

#[derive(Debug, Eq, PartialEq, Clone)]
pub enum Block {
    Heading { level: u8, content: Vec<Inline> },
    Paragraph(Vec<Inline>),
    /// A line holding nothing but an image.
    Image { alt: String, src: String },
    List(Vec<Vec<Inline>>),
    Quote(Vec<Vec<Inline>>),
    Table {
        header: Vec<Vec<Inline>>,
        rows: Vec<Vec<Vec<Inline>>>,
    },
    Code { lang: Option<String>, content: String },
}

#[derive(Debug, Eq, PartialEq, Default)]
pub struct Document {
    pub blocks: Vec<Block>,
}

fn cells(cells: &[String]) -> Vec<Vec<Inline>> {
    cells.iter().map(|cell| inline::parse(cell)).collect()
}

impl Document {
    pub fn parse(content: &str) -> Self {
        let mut slf = Self::default();
        let mut table: Vec<(Vec<String>, bool, u32)> = vec![];

        for token in Lexer::new().lex(content) {
            if !matches!(token.kind, TokenKind::TableRow { .. }) && !table.is_empty() {
                slf.flush_table(std::mem::take(&mut table));
            }

            match token.kind {
                TokenKind::EmptyLine => slf.blocks.push(Block::Paragraph(vec![])),
                TokenKind::Text { content } => {
                    let parsed = inline::parse(&content);
                    match &parsed[..] {
                        [Inline::Image { alt, src }] => slf.blocks.push(Block::Image {
                            alt: alt.clone(),
                            src: src.clone(),
                        }),
                        _ => slf.blocks.push(Block::Paragraph(parsed)),
                    }
                }
                TokenKind::Heading { level, title } => slf.blocks.push(Block::Heading {
                    level,
                    content: inline::parse(&title),
                }),
                TokenKind::ListItem { content } => {
                    let item = inline::parse(&content);
                    match slf.blocks.last_mut() {
                        Some(Block::List(items)) => items.push(item),
                        _ => slf.blocks.push(Block::List(vec![item])),
                    }
                }
                TokenKind::Quote { content } => {
                    let line = inline::parse(&content);
                    match slf.blocks.last_mut() {
                        Some(Block::Quote(lines)) => lines.push(line),
                        _ => slf.blocks.push(Block::Quote(vec![line])),
                    }
                }
                TokenKind::TableRow { cells, separator } => {
                    table.push((cells, separator, token.line))
                }
                TokenKind::Code { lang, content } => {
                    slf.blocks.push(Block::Code { lang, content })
                }
            }
        }

        if !table.is_empty() {
            slf.flush_table(table);
        }

        // Blank lines only served to split runs of list items and quotes.
        slf.blocks
            .retain(|block| !matches!(block, Block::Paragraph(inlines) if inlines.is_empty()));

        slf
    }

    /// A header row, a separator row, then data rows. Anything else is kept as text.
    fn flush_table(&mut self, rows: Vec<(Vec<String>, bool, u32)>) {
        match &rows[..] {
            [(header, false, _), (_, true, _), data @ ..] if !header.is_empty() => {
                let width = header.len();
                let rows = data
                    .iter()
                    .filter(|(row, _, _)| !row.is_empty())
                    .map(|(row, _, _)| {
                        let mut row = cells(row);
                        row.resize(width, vec![]);
                        row
                    })
                    .collect();

                self.blocks.push(Block::Table {
                    header: cells(header),
                    rows,
                });
            }
            _ => {
                if let Some((_, _, line)) = rows.first() {
                    log::warn!("Line {}: table without a separator row, kept as text", line);
                }

                for (row, _, _) in &rows {
                    let text = format!("| {} |", row.join(" | "));
                    self.blocks.push(Block::Paragraph(inline::parse(&text)));
                }
            }
        }
    }

    /// Drops a leading level-one heading; the page header already shows the title.
    pub fn strip_title(mut self) -> Self {
        if let Some(Block::Heading { level: 1, .. }) = self.blocks.first() {
            self.blocks.remove(0);
        }
        self
    }

    pub fn to_html(&self) -> String {
        html::HtmlBuilder::new().from_document(self)
    }
}
