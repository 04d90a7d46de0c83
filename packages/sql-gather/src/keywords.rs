//! Keyword sets shared by the analyzer and the clause boundary finder.

/// Keywords that can never be a table alias. A word from this list directly after a table name starts the next
/// clause instead.
pub(crate) const CLAUSE_KEYWORDS: &[&str] = &[
    "WHERE",
    "ON",
    "USING",
    "SET",
    "VALUES",
    "VALUE",
    "SELECT",
    "FROM",
    "JOIN",
    "INNER",
    "LEFT",
    "RIGHT",
    "FULL",
    "CROSS",
    "OUTER",
    "NATURAL",
    "STRAIGHT_JOIN",
    "GROUP",
    "ORDER",
    "HAVING",
    "LIMIT",
    "OFFSET",
    "UNION",
    "INTERSECT",
    "EXCEPT",
    "WINDOW",
    "FOR",
    "LOCK",
    "FETCH",
    "RETURNING",
    "INTO",
    "PARTITION",
    "FORCE",
    "IGNORE",
    "USE",
    "AND",
    "OR",
    "AS",
];

/// Words that start a JOIN clause.
pub(crate) const JOIN_KEYWORDS: &[&str] = &["JOIN", "STRAIGHT_JOIN"];

/// Top-level keywords after which the FROM clause and the WHERE condition have ended.
pub(crate) const TRAILING_KEYWORDS: &[&str] = &[
    "GROUP",
    "HAVING",
    "ORDER",
    "LIMIT",
    "OFFSET",
    "FOR",
    "LOCK",
    "FETCH",
    "WINDOW",
    "RETURNING",
];

pub(crate) const SET_OPERATIONS: &[&str] = &["UNION", "INTERSECT", "EXCEPT", "MINUS"];

/// Words that cannot be the column side of a predicate.
pub(crate) const EXPRESSION_KEYWORDS: &[&str] = &[
    "AND", "OR", "NOT", "NULL", "IS", "IN", "LIKE", "ILIKE", "RLIKE", "REGEXP", "BETWEEN", "EXISTS",
    "CASE", "WHEN", "THEN", "ELSE", "END", "TRUE", "FALSE", "SELECT", "WHERE", "ON", "HAVING",
    "DISTINCT", "INTERVAL", "ANY", "ALL", "SOME", "ESCAPE", "BINARY", "UNKNOWN",
];

/// Operators that compare a column with a single value.
pub(crate) const COMPARISON_OPERATORS: &[&str] =
    &["=", "==", "!=", "<>", "<", ">", "<=", ">=", "<=>"];

/// Word operators that compare a column with a single value.
pub(crate) const PATTERN_OPERATORS: &[&str] = &["LIKE", "ILIKE", "RLIKE", "REGEXP"];
