use crate::keywords::{
    COMPARISON_OPERATORS, EXPRESSION_KEYWORDS, JOIN_KEYWORDS, PATTERN_OPERATORS, SET_OPERATIONS,
    TRAILING_KEYWORDS,
};
use crate::model::{
    Arity, Clause, FieldRef, MappedField, ParameterMapping, SqlGather, SqlStatementKind,
};
use crate::scanner::{scan, Token, TokenKind};
use crate::tables;
use crate::tokens::{matching_close, split_items, Cursor};
use crate::MAPPER;
use std::collections::HashMap;
use tracing::{debug, warn};

/// Analyzes a parameterized statement.
///
/// Analysis never fails. Whatever cannot be recognised is left out: a placeholder the analyzer cannot attribute to a
/// column still gets a [`ParameterMapping`] entry (with no field) so that positions stay aligned with the caller's
/// parameter list.
pub fn analyze(sql: &str) -> SqlGather {
    let scan = scan(sql);

    if let Some((construct, offset)) = scan.unterminated {
        warn!(
            target: MAPPER,
            msg = "Statement ends inside an unterminated construct",
            ?construct,
            offset,
        );
    }

    let tokens = scan.tokens.as_slice();

    let kind = tokens
        .first()
        .filter(|t| !t.is_quoted())
        .and_then(Token::word)
        .and_then(SqlStatementKind::from_keyword);

    let tables = tables::collect(tokens, kind);

    let mut walker = Walker::new(tokens, kind);
    walker.run();

    let mut gather = SqlGather {
        kind,
        tables,
        fields: vec![],
        parameter_mappings: vec![],
        complete: scan.is_complete(),
    };

    let parameter_mappings = tokens
        .iter()
        .enumerate()
        .filter(|(_, t)| t.is_placeholder())
        .enumerate()
        .map(|(index, (token_index, _))| ParameterMapping {
            index,
            field: walker
                .owners
                .get(&token_index)
                .map(|&(field, ordinal)| {
                    walker.fields[field].mapped(&gather, ordinal, walker.nested[field])
                }),
        })
        .collect::<Vec<_>>();

    gather.fields = walker.fields;
    gather.parameter_mappings = parameter_mappings;

    debug!(
        target: MAPPER,
        msg = "Analyzed statement",
        kind = ?gather.kind,
        tables = gather.tables.len(),
        fields = gather.fields.len(),
        placeholders = gather.parameter_mappings.len(),
        unmapped = gather.parameter_mappings.iter().filter(|m| m.field.is_none()).count(),
    );

    gather
}

impl FieldRef {
    /// An unqualified column inside a subquery belongs to one of the subquery's own tables, which are not recorded.
    fn mapped(&self, gather: &SqlGather, ordinal: usize, nested: bool) -> MappedField {
        let table = match (&self.table_alias, nested) {
            (None, true) => None,
            (qualifier, _) => gather.resolve_table(qualifier.as_deref()),
        };

        MappedField {
            table_name: table.map(|t| t.name.clone()),
            table_alias: self.table_alias.clone(),
            column: self.column.clone(),
            label: self.arity.label(&self.column, ordinal),
            clause: self.clause,
            arity: self.arity,
        }
    }
}

/// The clause a token sits in, as far as placeholder attribution is concerned.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Region {
    Statement,
    Projection,
    From,
    Condition,
    Other,
}

/// Keywords that move the walker into a different [`Region`].
const REGION_KEYWORDS: &[&str] = &[
    "SELECT", "FROM", "JOIN", "STRAIGHT_JOIN", "WHERE", "ON", "HAVING", "SET", "INTO", "USING",
    "GROUP", "ORDER", "LIMIT", "OFFSET", "FOR", "LOCK", "FETCH", "WINDOW", "RETURNING", "UNION",
    "INTERSECT", "EXCEPT", "MINUS",
];

/// Keywords that end a SET assignment's value expression.
const ASSIGNMENT_END_KEYWORDS: &[&str] = &["WHERE", "FROM", "ORDER", "LIMIT", "RETURNING"];

/// A single left-to-right pass over the tokens that attributes placeholders to fields.
///
/// The walker keeps a region per parenthesis level: entering a parenthesis inherits the enclosing region, so
/// `WHERE (a = ? OR b IN (?, ?))` is still a condition, while a `SELECT` inside the parenthesis starts a projection
/// for that level only.
struct Walker<'a> {
    tokens: &'a [Token],
    cursor: Cursor<'a>,
    kind: Option<SqlStatementKind>,
    regions: Vec<Region>,
    /// Parallel to `regions`: true once the level is inside a subquery.
    subqueries: Vec<bool>,
    fields: Vec<FieldRef>,
    /// Parallel to `fields`: true for fields found inside a subquery.
    nested: Vec<bool>,
    /// Placeholder token index to `(field index, ordinal within the field)`
    owners: HashMap<usize, (usize, usize)>,
}

/// A column reference: `(qualifier, column, index after the reference)`
type ColumnRef = (Option<String>, String, usize);

impl<'a> Walker<'a> {
    fn new(tokens: &'a [Token], kind: Option<SqlStatementKind>) -> Self {
        Self {
            tokens,
            cursor: Cursor::new(tokens),
            kind,
            regions: vec![Region::Statement],
            subqueries: vec![false],
            fields: vec![],
            nested: vec![],
            owners: HashMap::new(),
        }
    }

    fn run(&mut self) {
        let mut i = 0;
        while i < self.tokens.len() {
            i = self.step(i);
        }
    }

    fn region(&self) -> Region {
        self.regions.last().copied().unwrap_or(Region::Statement)
    }

    fn in_subquery(&self) -> bool {
        self.subqueries.last().copied().unwrap_or(false)
    }

    fn set_region(&mut self, region: Region) {
        if let Some(last) = self.regions.last_mut() {
            *last = region;
        }
    }

    fn step(&mut self, i: usize) -> usize {
        let tokens = self.tokens;
        let token = &tokens[i];

        match &token.kind {
            TokenKind::LParen => {
                let region = self.region();
                let subquery = self.in_subquery();
                self.regions.push(region);
                self.subqueries.push(subquery);
                i + 1
            }
            TokenKind::RParen => {
                if self.regions.len() > 1 {
                    self.regions.pop();
                    self.subqueries.pop();
                }
                i + 1
            }
            TokenKind::Word { quoted: false, .. } if token.is_any_keyword(REGION_KEYWORDS) => {
                self.keyword(i)
            }
            TokenKind::Word { .. } if self.region() == Region::Condition => self.condition(i),
            TokenKind::Placeholder
                if self.region() == Region::Condition && !self.owners.contains_key(&i) =>
            {
                self.reversed_predicate(i).unwrap_or(i + 1)
            }
            _ => i + 1,
        }
    }

    fn keyword(&mut self, i: usize) -> usize {
        let tokens = self.tokens;
        let token = &tokens[i];
        let top_level = token.depth == 0;

        if token.is_keyword("SELECT") {
            self.set_region(Region::Projection);
            if !top_level {
                if let Some(last) = self.subqueries.last_mut() {
                    *last = true;
                }
            }
        } else if token.is_keyword("FROM") || token.is_any_keyword(JOIN_KEYWORDS) {
            self.set_region(Region::From);
        } else if token.is_keyword("ON")
            && self.cursor.is_keyword(i + 1, "DUPLICATE")
            && self.cursor.is_keyword(i + 2, "KEY")
            && self.cursor.is_keyword(i + 3, "UPDATE")
        {
            self.set_region(Region::Other);
            return self.assignments(i + 4);
        } else if token.is_any_keyword(&["WHERE", "ON", "HAVING"]) {
            self.set_region(Region::Condition);
        } else if token.is_keyword("SET")
            && top_level
            && matches!(
                self.kind,
                Some(SqlStatementKind::Update) | Some(SqlStatementKind::Insert)
            )
        {
            self.set_region(Region::Other);
            return self.assignments(i + 1);
        } else if token.is_keyword("INTO")
            && top_level
            && self.kind == Some(SqlStatementKind::Insert)
        {
            self.set_region(Region::Other);
            return self.insert(i + 1);
        } else if token.is_any_keyword(TRAILING_KEYWORDS)
            || token.is_any_keyword(SET_OPERATIONS)
            || token.is_keyword("USING")
            || token.is_keyword("INTO")
            || token.is_keyword("SET")
        {
            self.set_region(Region::Other);
        }

        i + 1
    }

    /// `col = <expr> {, col = <expr>}` as found after `SET` and `ON DUPLICATE KEY UPDATE`.
    fn assignments(&mut self, start: usize) -> usize {
        let Some(depth) = self.tokens.get(start).map(|t| t.depth) else {
            return start;
        };
        let mut i = start;

        loop {
            let Some((mut parts, next)) = self.cursor.qualified_name(i) else {
                return i;
            };
            if !self.cursor.is(next, &TokenKind::Operator("=".into())) {
                return i;
            }

            let column = parts.pop().unwrap_or_default();
            let qualifier = parts.pop();
            let end = self.assignment_end(next + 1, depth);

            if self.has_subquery(next + 1, end) {
                debug!(
                    target: MAPPER,
                    msg = "Subquery in assignment value, only its conditions are attributed",
                    column,
                );
                i = self.walk(next + 1, end);
            } else {
                let placeholders = self.cursor.placeholders(next + 1, end);
                if !placeholders.is_empty() {
                    let arity = Arity::for_expression(placeholders.len());
                    self.push_field(qualifier, column, Clause::Set, arity, placeholders);
                }
                i = end;
            }

            match self.tokens.get(i) {
                Some(t) if t.kind == TokenKind::Comma && t.depth == depth => i += 1,
                _ => return i,
            }
        }
    }

    fn has_subquery(&self, from: usize, to: usize) -> bool {
        (from..to.min(self.tokens.len())).any(|k| self.tokens[k].is_keyword("SELECT"))
    }

    /// Walks `from..to` as ordinary statement text, so conditions inside a subquery are attributed like any other.
    ///
    /// Returns the index to continue from, which is never before `to`.
    fn walk(&mut self, from: usize, to: usize) -> usize {
        let mut i = from;
        while i < to {
            i = self.step(i);
        }
        i
    }

    fn assignment_end(&self, from: usize, depth: usize) -> usize {
        (from..self.tokens.len())
            .find(|&k| {
                let t = &self.tokens[k];
                t.depth < depth
                    || (t.depth == depth
                        && (matches!(t.kind, TokenKind::Comma | TokenKind::Semicolon)
                            || t.is_any_keyword(ASSIGNMENT_END_KEYWORDS)))
            })
            .unwrap_or(self.tokens.len())
    }

    /// `INSERT INTO table (col, …) VALUES (…), (…)`
    ///
    /// Item `k` of each VALUES tuple binds to column `k`. Items without placeholders, such as `NOW()`, consume their
    /// column without producing a field.
    fn insert(&mut self, start: usize) -> usize {
        let Some((parts, mut i)) = self.cursor.qualified_name(start) else {
            return start;
        };
        let table = parts.last().cloned();

        if !self.cursor.is(i, &TokenKind::LParen) {
            debug!(
                target: MAPPER,
                msg = "INSERT without a column list, VALUES parameters are not attributed",
                table,
            );
            return i;
        }
        let Some(close) = matching_close(self.tokens, i) else {
            return i;
        };

        let columns = split_items(self.tokens, i, close)
            .into_iter()
            .map(|(from, to)| {
                self.cursor
                    .qualified_name(from)
                    .filter(|(_, next)| *next == to)
                    .and_then(|(mut parts, _)| parts.pop())
            })
            .collect::<Vec<_>>();

        i = close + 1;

        if !self.cursor.is_any_keyword(i, &["VALUES", "VALUE"]) {
            return i;
        }
        i += 1;

        while self.cursor.is(i, &TokenKind::LParen) {
            let Some(close) = matching_close(self.tokens, i) else {
                return i;
            };

            for (k, (from, to)) in split_items(self.tokens, i, close).into_iter().enumerate() {
                if self.has_subquery(from, to) {
                    self.walk(from, to);
                    continue;
                }
                let placeholders = self.cursor.placeholders(from, to);
                if placeholders.is_empty() {
                    continue;
                }
                match columns.get(k) {
                    Some(Some(column)) => {
                        let arity = Arity::for_expression(placeholders.len());
                        self.push_field(
                            table.clone(),
                            column.clone(),
                            Clause::Insert,
                            arity,
                            placeholders,
                        );
                    }
                    _ => debug!(
                        target: MAPPER,
                        msg = "VALUES item has no matching column",
                        position = k,
                    ),
                }
            }

            i = close + 1;
            if self.cursor.is(i, &TokenKind::Comma) {
                i += 1;
            } else {
                break;
            }
        }

        i
    }

    fn condition(&mut self, i: usize) -> usize {
        match self.column_ref(i) {
            Some((qualifier, column, next)) => self
                .predicate(qualifier, column, next)
                .unwrap_or(next),
            None => i + 1,
        }
    }

    /// `col` or `alias.col`, as long as it is not a keyword or a function call.
    fn column_ref(&self, i: usize) -> Option<ColumnRef> {
        let token = self.tokens.get(i)?;
        if !token.is_quoted() && token.is_any_keyword(EXPRESSION_KEYWORDS) {
            return None;
        }
        let (mut parts, next) = self.cursor.qualified_name(i)?;
        if self.cursor.is(next, &TokenKind::LParen) {
            return None;
        }
        let column = parts.pop()?;
        let qualifier = parts.pop();
        Some((qualifier, column, next))
    }

    /// Matches the operator part of a predicate whose column ends just before `j`.
    ///
    /// Returns the index to continue from when something was consumed.
    fn predicate(&mut self, qualifier: Option<String>, column: String, j: usize) -> Option<usize> {
        let tokens = self.tokens;
        let mut j = j;
        let negated = self.cursor.is_keyword(j, "NOT");
        if negated {
            j += 1;
        }
        let token = tokens.get(j)?;

        let comparison = matches!(
            &token.kind,
            TokenKind::Operator(op) if COMPARISON_OPERATORS.contains(&op.as_str())
        );

        if (comparison && !negated) || token.is_any_keyword(PATTERN_OPERATORS) {
            let (placeholders, next) = self.operand(j + 1)?;
            if !placeholders.is_empty() {
                let arity = Arity::for_expression(placeholders.len());
                self.push_field(qualifier, column, Clause::Condition, arity, placeholders);
            }
            return Some(next);
        }

        if token.is_keyword("IS") {
            return self.is_predicate(qualifier, column, j + 1);
        }

        if token.is_keyword("IN") {
            return self.in_list(qualifier, column, j + 1);
        }

        if token.is_keyword("BETWEEN") {
            return self.between(qualifier, column, j + 1);
        }

        None
    }

    /// `IS [NOT] NULL` consumes no parameter. `IS [NOT] ?` and `IS [NOT] DISTINCT FROM ?` consume one.
    fn is_predicate(
        &mut self,
        qualifier: Option<String>,
        column: String,
        j: usize,
    ) -> Option<usize> {
        let mut k = j;
        if self.cursor.is_keyword(k, "NOT") {
            k += 1;
        }

        if self.cursor.is_any_keyword(k, &["NULL", "TRUE", "FALSE", "UNKNOWN"]) {
            return Some(k + 1);
        }

        if self.cursor.is_keyword(k, "DISTINCT") && self.cursor.is_keyword(k + 1, "FROM") {
            k += 2;
        }

        let (placeholders, next) = self.operand(k)?;
        if !placeholders.is_empty() {
            let arity = Arity::for_expression(placeholders.len());
            self.push_field(qualifier, column, Clause::Condition, arity, placeholders);
        }
        Some(next)
    }

    /// `IN (?, ?, …)`. An `IN (SELECT …)` is left for the walker to descend into.
    fn in_list(&mut self, qualifier: Option<String>, column: String, j: usize) -> Option<usize> {
        if !self.cursor.is(j, &TokenKind::LParen)
            || self.cursor.is_any_keyword(j + 1, &["SELECT", "WITH"])
        {
            return Some(j);
        }
        let close = matching_close(self.tokens, j)?;
        let placeholders = self.cursor.placeholders(j + 1, close);

        if !placeholders.is_empty() {
            let arity = Arity::In(placeholders.len());
            self.push_field(qualifier, column, Clause::Condition, arity, placeholders);
        }
        Some(close + 1)
    }

    /// `BETWEEN <lower> AND <upper>`
    fn between(&mut self, qualifier: Option<String>, column: String, j: usize) -> Option<usize> {
        let (lower, k) = self.operand(j)?;
        if !self.cursor.is_keyword(k, "AND") {
            return Some(k);
        }
        let (upper, next) = self.operand(k + 1)?;

        let arity = match (lower.len(), upper.len()) {
            (0, 0) => return Some(next),
            (1, 1) => Arity::Between,
            (l, u) => Arity::for_expression(l + u),
        };

        let placeholders = lower.into_iter().chain(upper).collect();
        self.push_field(qualifier, column, Clause::Condition, arity, placeholders);
        Some(next)
    }

    /// `? = col`
    fn reversed_predicate(&mut self, i: usize) -> Option<usize> {
        let op = self.tokens.get(i + 1)?;
        let comparison = matches!(
            &op.kind,
            TokenKind::Operator(op) if COMPARISON_OPERATORS.contains(&op.as_str())
        );
        if !comparison {
            return None;
        }

        let (qualifier, column, next) = self.column_ref(i + 2)?;
        self.push_field(qualifier, column, Clause::Condition, Arity::Single, vec![i]);
        Some(next)
    }

    /// Reads one value operand and returns the placeholders it contains and the index after it.
    ///
    /// Returns `None` for a subquery, which the walker then descends into on its own.
    fn operand(&self, j: usize) -> Option<(Vec<usize>, usize)> {
        let token = self.tokens.get(j)?;

        match &token.kind {
            TokenKind::Placeholder => Some((vec![j], j + 1)),
            TokenKind::LParen => {
                if self.cursor.is_any_keyword(j + 1, &["SELECT", "WITH"]) {
                    return None;
                }
                let close = matching_close(self.tokens, j)?;
                Some((self.cursor.placeholders(j + 1, close), close + 1))
            }
            TokenKind::Word { .. } if self.cursor.is(j + 1, &TokenKind::LParen) => {
                let close = matching_close(self.tokens, j + 1)?;
                if (j + 2..close).any(|k| self.tokens[k].is_keyword("SELECT")) {
                    return None;
                }
                Some((self.cursor.placeholders(j + 2, close), close + 1))
            }
            TokenKind::Word { .. } => {
                let (_, next) = self.cursor.qualified_name(j)?;
                Some((vec![], next))
            }
            TokenKind::Operator(op) if op == "-" || op == "+" => self.operand(j + 1),
            TokenKind::StringLiteral | TokenKind::Number => Some((vec![], j + 1)),
            _ => None,
        }
    }

    fn push_field(
        &mut self,
        qualifier: Option<String>,
        column: String,
        clause: Clause,
        arity: Arity,
        placeholders: Vec<usize>,
    ) {
        debug_assert_eq!(arity.count(), placeholders.len());

        let index = self.fields.len();
        for (ordinal, placeholder) in placeholders.into_iter().enumerate() {
            self.owners.entry(placeholder).or_insert((index, ordinal));
        }

        let nested = self.in_subquery();
        self.nested.push(nested);
        self.fields.push(FieldRef {
            table_alias: qualifier,
            column,
            clause,
            arity,
        });
    }
}
