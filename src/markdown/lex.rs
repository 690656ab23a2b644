use lazy_static::lazy_static;
use regex::Regex;

#[derive(Debug, Eq, PartialEq, Clone)]
pub enum TokenKind {
    /// Separates blocks; ends lists, quotes and tables.
    EmptyLine,

    /// Any text that was not part of another block
    Text { content: String },

    /// (?hashes:#{1,6}) (?title:.+)
    Heading { level: u8, title: String },

    /// - item
    ListItem { content: String },

    /// > quoted
    Quote { content: String },

    /// | cell | cell |, optionally inside a quote
    TableRow { cells: Vec<String>, separator: bool },

    /// ```lang ... ```
    /// Nothing inside is seen by the other rules.
    Code { lang: Option<String>, content: String },
}

#[derive(Debug, Eq, PartialEq, Clone)]
pub struct Token {
    pub kind: TokenKind,
    pub line: u32,
}

#[derive(Eq, PartialEq)]
enum State {
    Default,
    Code {
        lang: Option<String>,
        lines: Vec<String>,
        start: u32,
    },
}

pub struct Lexer {
    line: u32,
    state: State,
}

lazy_static! {
    static ref HEADING_REGEX: Regex = Regex::new(r"^(?<hashes>#{1,6})\s+(?<title>.*?)\s*$").unwrap();
    static ref FENCE_REGEX: Regex = Regex::new(r"^```\s*(?<lang>[\w+-]*)\s*$").unwrap();
    static ref SEPARATOR_CELL_REGEX: Regex = Regex::new(r"^:?-+:?$").unwrap();
}

fn table_cells(line: &str) -> Option<Vec<String>> {
    if !line.starts_with('|') || line.matches('|').count() < 2 {
        return None;
    }

    Some(
        line.split('|')
            .map(str::trim)
            .filter(|cell| !cell.is_empty())
            .map(str::to_owned)
            .collect(),
    )
}

impl Lexer {
    pub fn new() -> Self {
        Self {
            line: 1,
            state: State::Default,
        }
    }

    fn wrap(&self, kind: TokenKind) -> Token {
        Token {
            kind,
            line: self.line,
        }
    }

    pub fn lex(&mut self, content: &str) -> Vec<Token> {
        let mut tokens: Vec<Token> = vec![];

        for line in content.lines() {
            if let Some(token) = self.handle_line(line) {
                tokens.push(token);
            }

            self.line += 1;
        }

        // An unterminated fence keeps everything after it as code.
        if let State::Code { lang, lines, start } = std::mem::replace(&mut self.state, State::Default) {
            log::warn!("Code fence opened on line {} is never closed", start);
            tokens.push(Token {
                kind: TokenKind::Code {
                    lang,
                    content: lines.join("\n"),
                },
                line: start,
            });
        }

        tokens
    }

    fn handle_line(&mut self, line: &str) -> Option<Token> {
        if self.state == State::Default {
            return Some(self.handle_normal(line));
        }

        if !line.trim().starts_with("```") {
            if let State::Code { lines, .. } = &mut self.state {
                lines.push(line.to_owned());
            }
            return None;
        }

        match std::mem::replace(&mut self.state, State::Default) {
            State::Code { lang, lines, start } => Some(Token {
                kind: TokenKind::Code {
                    lang,
                    content: lines.join("\n"),
                },
                line: start,
            }),
            State::Default => None,
        }
    }

    fn handle_normal(&mut self, line: &str) -> Token {
        let trimmed = line.trim();

        if trimmed.is_empty() {
            return self.wrap(TokenKind::EmptyLine);
        }

        if let Some(caps) = FENCE_REGEX.captures(trimmed) {
            self.state = State::Code {
                lang: caps
                    .name("lang")
                    .map(|m| m.as_str().to_owned())
                    .filter(|lang| !lang.is_empty()),
                lines: vec![],
                start: self.line,
            };

            // Placeholder so the fence still breaks lists and tables.
            return self.wrap(TokenKind::EmptyLine);
        }

        let unquoted = trimmed.strip_prefix("> ").map(str::trim);

        if let Some(cells) = table_cells(unquoted.unwrap_or(trimmed)) {
            let separator = !cells.is_empty()
                && cells.iter().all(|cell| SEPARATOR_CELL_REGEX.is_match(cell));

            return self.wrap(TokenKind::TableRow { cells, separator });
        }

        if let Some(content) = unquoted {
            return self.wrap(TokenKind::Quote {
                content: content.to_owned(),
            });
        }

        if let Some(caps) = HEADING_REGEX.captures(trimmed) {
            return self.wrap(TokenKind::Heading {
                level: caps["hashes"].len() as u8,
                title: caps["title"].to_owned(),
            });
        }

        if let Some(content) = trimmed
            .strip_prefix("- ")
            .or_else(|| trimmed.strip_prefix("* "))
        {
            return self.wrap(TokenKind::ListItem {
                content: content.trim().to_owned(),
            });
        }

        self.wrap(TokenKind::Text {
            content: trimmed.to_owned(),
        })
    }
}

impl Default for Lexer {
    fn default() -> Self {
        Self::new()
    }
}
