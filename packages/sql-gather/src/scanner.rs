//! Lexical scanning of raw SQL text.
//!
//! Tokenizing is done by [`sqlparser`] with the MySQL dialect. This module flattens its output into the small
//! [`Token`] model the analyzer walks: whitespace and comments are dropped, every token gets the byte [`Span`] it was
//! read from and the parenthesis depth it sits at.
//!
//! Scanning never fails. When the tokenizer stops on an unterminated literal, identifier or comment, the tokens read
//! so far are kept and [`Scan::unterminated`] records where the construct started.

use sqlparser::dialect::MySqlDialect;
use sqlparser::tokenizer::{Location, Token as SqlToken, TokenWithSpan, Tokenizer};
use std::ops::Range;
use std::str::CharIndices;

/// Byte range of a token in the source text.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Span {
    pub start: usize,
    pub end: usize,
}

impl Span {
    pub fn new(start: usize, end: usize) -> Self {
        Self { start, end }
    }

    pub fn range(&self) -> Range<usize> {
        self.start..self.end
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TokenKind {
    /// A keyword or identifier. `value` has any delimiters (`` ` ``, `"`, `[ ]`) removed.
    Word { value: String, quoted: bool },
    /// A positional `?` parameter.
    Placeholder,
    Operator(String),
    LParen,
    RParen,
    Comma,
    Period,
    Semicolon,
    StringLiteral,
    Number,
    Other(char),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Token {
    pub kind: TokenKind,
    pub span: Span,
    /// Parenthesis nesting level. Both parentheses of a pair sit at the level of the enclosing text.
    pub depth: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Unterminated {
    Literal,
    Identifier,
    Comment,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Scan {
    pub tokens: Vec<Token>,
    /// Set when the text ended inside a literal, delimited identifier or block comment.
    /// Holds the kind and the byte offset the construct started at.
    pub unterminated: Option<(Unterminated, usize)>,
}

impl Token {
    /// The unquoted word value, if this is a word.
    pub fn word(&self) -> Option<&str> {
        match &self.kind {
            TokenKind::Word { value, .. } => Some(value),
            _ => None,
        }
    }

    /// True for an unquoted word matching `keyword` case-insensitively.
    ///
    /// Delimited identifiers are never keywords: `` `order` `` is a column called order.
    pub fn is_keyword(&self, keyword: &str) -> bool {
        match &self.kind {
            TokenKind::Word {
                value,
                quoted: false,
            } => value.eq_ignore_ascii_case(keyword),
            _ => false,
        }
    }

    pub fn is_any_keyword(&self, keywords: &[&str]) -> bool {
        keywords.iter().any(|k| self.is_keyword(k))
    }

    pub fn is_placeholder(&self) -> bool {
        matches!(self.kind, TokenKind::Placeholder)
    }

    pub fn is_operator(&self, op: &str) -> bool {
        matches!(&self.kind, TokenKind::Operator(o) if o == op)
    }

    pub fn is_quoted(&self) -> bool {
        matches!(self.kind, TokenKind::Word { quoted: true, .. })
    }
}

impl Scan {
    pub fn placeholder_count(&self) -> usize {
        self.tokens.iter().filter(|t| t.is_placeholder()).count()
    }

    pub fn is_complete(&self) -> bool {
        self.unterminated.is_none()
    }
}

impl Unterminated {
    /// Classifies the construct starting at `offset` by its opening character.
    fn at(sql: &str, offset: usize) -> Self {
        match sql[offset..].chars().next() {
            Some('/' | '-' | '#') => Unterminated::Comment,
            Some('`' | '[') => Unterminated::Identifier,
            _ => Unterminated::Literal,
        }
    }
}

pub fn scan(sql: &str) -> Scan {
    let dialect = MySqlDialect {};
    let mut raw: Vec<TokenWithSpan> = Vec::new();
    let result = Tokenizer::new(&dialect, sql).tokenize_with_location_into_buf(&mut raw);

    let mut offsets = ByteOffsets::new(sql);
    let raw = raw
        .into_iter()
        .map(|t| {
            let start = offsets.of(t.span.start);
            let end = offsets.of(t.span.end);
            (t.token, Span::new(start, end))
        })
        .collect::<Vec<_>>();

    // The buffer holds every token read before the failure, whitespace included, so the last one ends where the
    // offending construct starts.
    let mut unterminated = result.err().map(|_| {
        let start = raw.last().map_or(0, |(_, span)| span.end);
        (Unterminated::at(sql, start), start)
    });

    let mut tokens = Vec::with_capacity(raw.len());
    let mut depth: usize = 0;
    let mut raw = raw.into_iter();

    while let Some((token, span)) = raw.next() {
        let kind = match token {
            SqlToken::Whitespace(_) | SqlToken::EOF => continue,
            SqlToken::Word(word) => TokenKind::Word {
                value: word.value,
                quoted: word.quote_style.is_some(),
            },
            // MySQL reads "x" as a string. It is treated as an identifier, as ANSI_QUOTES mode does.
            SqlToken::DoubleQuotedString(value) => TokenKind::Word {
                value,
                quoted: true,
            },
            SqlToken::LBracket => {
                let close = raw.find(|(t, _)| matches!(t, SqlToken::RBracket));
                match close {
                    Some((_, close)) => {
                        tokens.push(Token {
                            kind: TokenKind::Word {
                                value: sql[span.end..close.start].to_string(),
                                quoted: true,
                            },
                            span: Span::new(span.start, close.end),
                            depth,
                        });
                        continue;
                    }
                    None => {
                        unterminated = Some((Unterminated::Identifier, span.start));
                        break;
                    }
                }
            }
            SqlToken::Placeholder(_) => TokenKind::Placeholder,
            SqlToken::LParen => {
                tokens.push(Token {
                    kind: TokenKind::LParen,
                    span,
                    depth,
                });
                depth += 1;
                continue;
            }
            SqlToken::RParen => {
                depth = depth.saturating_sub(1);
                TokenKind::RParen
            }
            SqlToken::Comma => TokenKind::Comma,
            SqlToken::Period => TokenKind::Period,
            SqlToken::SemiColon => TokenKind::Semicolon,
            SqlToken::Number(..) => TokenKind::Number,
            SqlToken::SingleQuotedString(_)
            | SqlToken::NationalStringLiteral(_)
            | SqlToken::EscapedStringLiteral(_)
            | SqlToken::HexStringLiteral(_) => TokenKind::StringLiteral,
            SqlToken::Char(c) => TokenKind::Other(c),
            _ => TokenKind::Operator(sql[span.range()].to_string()),
        };

        tokens.push(Token { kind, span, depth });
    }

    Scan {
        tokens,
        unterminated,
    }
}

/// Returns `sql` with comments removed and every run of whitespace collapsed to a single space.
///
/// Literals are copied verbatim so their content is never altered.
pub fn normalize(sql: &str) -> String {
    let scan = scan(sql);
    let mut out = String::with_capacity(sql.len());
    let mut previous_end: Option<usize> = None;

    for token in &scan.tokens {
        if let Some(end) = previous_end {
            if end < token.span.start {
                out.push(' ');
            }
        }
        out.push_str(&sql[token.span.range()]);
        previous_end = Some(token.span.end);
    }

    // An unterminated literal is kept so the caller still sees it; an unterminated comment is dropped.
    if let Some((kind, start)) = scan.unterminated {
        if kind != Unterminated::Comment {
            if previous_end.is_some() {
                out.push(' ');
            }
            out.push_str(&sql[start..]);
        }
    }

    out
}

/// Converts the tokenizer's line and column locations into byte offsets.
///
/// Locations must be asked for in non-decreasing order, which is the order tokens come out in.
struct ByteOffsets<'a> {
    chars: CharIndices<'a>,
    line: u64,
    column: u64,
    offset: usize,
}

impl<'a> ByteOffsets<'a> {
    fn new(sql: &'a str) -> Self {
        Self {
            chars: sql.char_indices(),
            line: 1,
            column: 1,
            offset: 0,
        }
    }

    fn of(&mut self, location: Location) -> usize {
        while (self.line, self.column) < (location.line, location.column) {
            let Some((index, c)) = self.chars.next() else {
                break;
            };
            if c == '\n' {
                self.line += 1;
                self.column = 1;
            } else {
                self.column += 1;
            }
            self.offset = index + c.len_utf8();
        }
        self.offset
    }
}
