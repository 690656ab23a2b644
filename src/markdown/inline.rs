use build_html::escape_html;

#[derive(Debug, Eq, PartialEq, Clone)]
pub enum Inline {
    /// Passed through untouched, so inline HTML in the source survives.
    Text(String),
    Strong(Vec<Inline>),
    Code(String),
    Image { alt: String, src: String },
    Link { label: Vec<Inline>, href: String },
}

/// Splits `[label](target)` after the opening bracket.
fn bracketed(body: &str) -> Option<(&str, &str, &str)> {
    let close = body.find(']')?;
    let target = body[close + 1..].strip_prefix('(')?;
    let end = target.find(')')?;

    Some((&body[..close], &target[..end], &target[end + 1..]))
}

/// Site images are served from the root.
fn image_src(src: &str) -> String {
    if src.starts_with('/') || src.starts_with("http") {
        src.to_owned()
    } else {
        format!("/{}", src)
    }
}

fn special(rest: &str) -> Option<(Inline, &str)> {
    if let Some(body) = rest.strip_prefix("**") {
        let end = body.find("**")?;
        return Some((Inline::Strong(parse(&body[..end])), &body[end + 2..]));
    }

    if let Some(body) = rest.strip_prefix('`') {
        let end = body.find('`')?;
        return Some((Inline::Code(body[..end].to_owned()), &body[end + 1..]));
    }

    if let Some(body) = rest.strip_prefix("![") {
        let (alt, src, after) = bracketed(body)?;
        return Some((
            Inline::Image {
                alt: alt.to_owned(),
                src: image_src(src.trim()),
            },
            after,
        ));
    }

    if let Some(body) = rest.strip_prefix('[') {
        let (label, href, after) = bracketed(body)?;
        return Some((
            Inline::Link {
                label: parse(label),
                href: href.trim().to_owned(),
            },
            after,
        ));
    }

    None
}

pub fn parse(text: &str) -> Vec<Inline> {
    let mut tokens: Vec<Inline> = vec![];
    let mut buffer = String::new();
    let mut rest = text;

    while let Some(ch) = rest.chars().next() {
        if let Some((inline, after)) = special(rest) {
            if !buffer.is_empty() {
                tokens.push(Inline::Text(std::mem::take(&mut buffer)));
            }
            tokens.push(inline);
            rest = after;
        } else {
            buffer.push(ch);
            rest = &rest[ch.len_utf8()..];
        }
    }

    if !buffer.is_empty() {
        tokens.push(Inline::Text(buffer));
    }

    tokens
}

pub fn image_html(alt: &str, src: &str) -> String {
    format!(
        r#"<img src="{}" alt="{}" style="max-width: 100%; height: auto; margin: 20px 0; border-radius: 8px;">"#,
        src, alt
    )
}

pub fn to_html(inlines: &[Inline]) -> String {
    let mut out = String::new();

    for inline in inlines {
        match inline {
            Inline::Text(text) => out.push_str(text),
            Inline::Strong(inner) => {
                out.push_str(&format!("<strong>{}</strong>", to_html(inner)));
            }
            Inline::Code(code) => {
                out.push_str(&format!("<code>{}</code>", escape_html(code)));
            }
            Inline::Image { alt, src } => out.push_str(&image_html(alt, src)),
            Inline::Link { label, href } => {
                out.push_str(&format!(r#"<a href="{}">{}</a>"#, href, to_html(label)));
            }
        }
    }

    out
}

/// Parses and renders one line.
pub fn render(text: &str) -> String {
    to_html(&parse(text))
}

#[cfg(test)]
mod tests {
    use super::{parse, render, Inline};

    #[test]
    fn mixed_line() {
        assert_eq!(
            render("see **bold [docs](https://x.dev)** and `a<b`"),
            r#"see <strong>bold <a href="https://x.dev">docs</a></strong> and <code>a&lt;b</code>"#
        );
    }

    #[test]
    fn images_are_rooted() {
        assert_eq!(
            parse("![shot](assets/a.png)"),
            vec![Inline::Image {
                alt: "shot".into(),
                src: "/assets/a.png".into()
            }]
        );
        assert_eq!(
            parse("![](https://cdn/x.png)"),
            vec![Inline::Image {
                alt: "".into(),
                src: "https://cdn/x.png".into()
            }]
        );
    }

    #[test]
    fn unmatched_markers_stay_literal() {
        assert_eq!(render("2 ** 3 and [x] (y) `open"), "2 ** 3 and [x] (y) `open");
        assert_eq!(render("中文**加粗**"), "中文<strong>加粗</strong>");
    }
}
