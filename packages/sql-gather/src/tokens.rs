use crate::scanner::{Token, TokenKind};

/// Read-only helpers over a token slice.
pub(crate) struct Cursor<'a> {
    tokens: &'a [Token],
}

impl<'a> Cursor<'a> {
    pub(crate) fn new(tokens: &'a [Token]) -> Self {
        Self { tokens }
    }

    /// Reads `word {. word}` starting at `start`.
    pub(crate) fn qualified_name(&self, start: usize) -> Option<(Vec<String>, usize)> {
        let mut parts = vec![self.tokens.get(start)?.word()?.to_string()];
        let mut i = start + 1;

        while self.is(i, &TokenKind::Period) {
            match self.tokens.get(i + 1).and_then(Token::word) {
                Some(part) => {
                    parts.push(part.to_string());
                    i += 2;
                }
                None => break,
            }
        }

        Some((parts, i))
    }

    pub(crate) fn is(&self, i: usize, kind: &TokenKind) -> bool {
        self.tokens.get(i).is_some_and(|t| &t.kind == kind)
    }

    pub(crate) fn is_keyword(&self, i: usize, keyword: &str) -> bool {
        self.tokens.get(i).is_some_and(|t| t.is_keyword(keyword))
    }

    pub(crate) fn is_any_keyword(&self, i: usize, keywords: &[&str]) -> bool {
        self.tokens.get(i).is_some_and(|t| t.is_any_keyword(keywords))
    }

    /// Indices of every placeholder in `range`.
    pub(crate) fn placeholders(&self, from: usize, to: usize) -> Vec<usize> {
        (from..to.min(self.tokens.len()))
            .filter(|&i| self.tokens[i].is_placeholder())
            .collect()
    }
}

/// Given the index of an opening parenthesis, returns the index of its matching close.
///
/// Returns `None` if the parenthesis is never closed.
pub(crate) fn matching_close(tokens: &[Token], open: usize) -> Option<usize> {
    let depth = tokens.get(open)?.depth;
    tokens[open + 1..]
        .iter()
        .position(|t| t.kind == TokenKind::RParen && t.depth == depth)
        .map(|offset| open + 1 + offset)
}

/// Given the index of an opening parenthesis, returns the index just past its matching close, or the end of the
/// tokens if it is never closed.
pub(crate) fn skip_balanced(tokens: &[Token], open: usize) -> usize {
    matching_close(tokens, open).map_or(tokens.len(), |close| close + 1)
}

/// Splits the tokens strictly between `open` and `close` on commas at the first nesting level inside them.
pub(crate) fn split_items(tokens: &[Token], open: usize, close: usize) -> Vec<(usize, usize)> {
    let inner = tokens[open].depth + 1;
    let mut items = Vec::new();
    let mut start = open + 1;

    for i in open + 1..close {
        if tokens[i].kind == TokenKind::Comma && tokens[i].depth == inner {
            items.push((start, i));
            start = i + 1;
        }
    }
    items.push((start, close));
    items
}
