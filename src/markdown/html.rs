use build_html::escape_html;

use crate::markdown::{
    inline::{image_html, to_html},
    Block, Document, Inline,
};

const TABLE_STYLE: &str = "border-collapse: collapse; width: 100%; margin: 20px 0; border: 1px solid #ddd;";
const HEADER_ROW_STYLE: &str = "background-color: #f2f2f2;";
const HEADER_CELL_STYLE: &str = "border: 1px solid #ddd; padding: 8px; text-align: left;";
const CELL_STYLE: &str = "border: 1px solid #ddd; padding: 8px;";

pub struct HtmlBuilder {
    lines: Vec<String>,
}

impl HtmlBuilder {
    pub fn new() -> Self {
        Self { lines: vec![] }
    }

    pub fn from_document(mut self, doc: &Document) -> String {
        for block in &doc.blocks {
            let html = match block {
                Block::Heading { level, content } => {
                    format!("<h{0}>{1}</h{0}>", level, to_html(content))
                }
                Block::Paragraph(content) => format!("<p>{}</p>", to_html(content)),
                Block::Image { alt, src } => image_html(alt, src),
                Block::List(items) => {
                    let mut html = String::from("<ul>");
                    for item in items {
                        html.push_str(&format!("\n<li>{}</li>", to_html(item)));
                    }
                    html.push_str("\n</ul>");
                    html
                }
                Block::Quote(lines) => format!(
                    "<blockquote>{}</blockquote>",
                    lines
                        .iter()
                        .map(|line| to_html(line))
                        .collect::<Vec<_>>()
                        .join("<br>")
                ),
                Block::Table { header, rows } => Self::table(header, rows),
                Block::Code { lang, content } => match lang {
                    Some(lang) => format!(
                        "<pre><code class=\"language-{}\">{}</code></pre>",
                        lang,
                        escape_html(content)
                    ),
                    None => format!("<pre><code>{}</code></pre>", escape_html(content)),
                },
            };

            self.lines.push(html);
        }

        self.lines.join("\n")
    }

    fn table(header: &[Vec<Inline>], rows: &[Vec<Vec<Inline>>]) -> String {
        let mut html = format!(
            "<table style=\"{}\"><thead><tr style=\"{}\">",
            TABLE_STYLE, HEADER_ROW_STYLE
        );

        for cell in header {
            html.push_str(&format!("<th style=\"{}\">{}</th>", HEADER_CELL_STYLE, to_html(cell)));
        }
        html.push_str("</tr></thead><tbody>");

        for row in rows {
            html.push_str("<tr>");
            for cell in row {
                html.push_str(&format!("<td style=\"{}\">{}</td>", CELL_STYLE, to_html(cell)));
            }
            html.push_str("</tr>");
        }

        html.push_str("</tbody></table>");
        html
    }
}
