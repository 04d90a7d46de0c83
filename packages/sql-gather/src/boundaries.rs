use crate::keywords::{SET_OPERATIONS, TRAILING_KEYWORDS};
use crate::model::SqlStatementKind;
use crate::scanner::{scan, Span, Token, TokenKind};

/// Byte offsets of the top-level clauses of a statement.
///
/// Only tokens outside parentheses are considered, so the WHERE of a subquery is never mistaken for the statement's
/// own. Offsets index into the text given to [`ClauseBoundaries::find`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClauseBoundaries {
    pub kind: Option<SqlStatementKind>,
    /// Start of the top-level `FROM` keyword.
    pub from: Option<usize>,
    /// End of the last token before `WHERE`, the trailing clause or the end of the statement.
    ///
    /// This is where another JOIN can be appended to the FROM clause.
    pub from_end: usize,
    pub where_clause: Option<WhereClause>,
    /// Start of the first clause that follows the WHERE condition: `GROUP BY`, `ORDER BY`, `LIMIT` and so on.
    pub trailing: Option<usize>,
    /// True if the statement combines queries with UNION, INTERSECT or EXCEPT at the top level.
    pub set_operation: bool,
    /// End of the last token of the statement, excluding a terminating `;`.
    pub end: usize,
    /// False when the text ended inside a literal or comment.
    pub complete: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WhereClause {
    pub keyword: Span,
    /// From the first to the last token of the condition. Empty (and positioned after the keyword) when the
    /// condition is missing.
    pub condition: Span,
}

impl ClauseBoundaries {
    pub fn find(sql: &str) -> Self {
        let scan = scan(sql);
        let tokens = statement_tokens(&scan.tokens);

        let kind = tokens
            .first()
            .filter(|t| !t.is_quoted())
            .and_then(Token::word)
            .and_then(SqlStatementKind::from_keyword);

        let mut from = None;
        let mut where_index = None;
        let mut trailing_index = None;
        let mut set_operation = false;

        for (i, token) in tokens.iter().enumerate().filter(|(_, t)| t.depth == 0) {
            if token.is_any_keyword(SET_OPERATIONS) {
                set_operation = true;
            }
            if trailing_index.is_some() {
                continue;
            }

            if token.is_keyword("FROM") && from.is_none() && where_index.is_none() {
                from = Some(token.span.start);
            } else if token.is_keyword("WHERE") && where_index.is_none() {
                where_index = Some(i);
            } else if token.is_any_keyword(TRAILING_KEYWORDS)
                || token.is_any_keyword(SET_OPERATIONS)
            {
                trailing_index = Some(i);
            }
        }

        let end = tokens.last().map_or(0, |t| t.span.end);
        let from_end_index = where_index.or(trailing_index).unwrap_or(tokens.len());
        let from_end = last_end(tokens, from_end_index).unwrap_or(end);

        let where_clause = where_index.map(|w| {
            let keyword = tokens[w].span;
            let stop = trailing_index.unwrap_or(tokens.len());
            let condition = if w + 1 < stop {
                Span::new(tokens[w + 1].span.start, tokens[stop - 1].span.end)
            } else {
                Span::new(keyword.end, keyword.end)
            };
            WhereClause { keyword, condition }
        });

        ClauseBoundaries {
            kind,
            from,
            from_end,
            where_clause,
            trailing: trailing_index.map(|i| tokens[i].span.start),
            set_operation,
            end,
            complete: scan.is_complete(),
        }
    }

    pub fn has_where(&self) -> bool {
        self.where_clause.is_some()
    }
}

/// The tokens of the first statement, up to a top-level `;`.
fn statement_tokens(tokens: &[Token]) -> &[Token] {
    let stop = tokens
        .iter()
        .position(|t| t.kind == TokenKind::Semicolon && t.depth == 0)
        .unwrap_or(tokens.len());
    &tokens[..stop]
}

/// End offset of the token before `index`.
fn last_end(tokens: &[Token], index: usize) -> Option<usize> {
    index
        .checked_sub(1)
        .and_then(|i| tokens.get(i))
        .map(|t| t.span.end)
}
