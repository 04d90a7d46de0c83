use crate::keywords::{CLAUSE_KEYWORDS, JOIN_KEYWORDS};
use crate::model::{SqlStatementKind, TableRef, TableRole};
use crate::scanner::{Token, TokenKind};
use crate::tokens::{skip_balanced, Cursor};

/// Collects the tables a statement reads or writes at the top nesting level.
///
/// Tables that only appear inside subqueries are deliberately left out: resolving a field against a table from a
/// different scope does more harm than leaving it unresolved.
pub(crate) fn collect(tokens: &[Token], kind: Option<SqlStatementKind>) -> Vec<TableRef> {
    let mut tables = Vec::new();
    let mut i = 0;

    if kind == Some(SqlStatementKind::Update) {
        i = 1;
        while tokens
            .get(i)
            .is_some_and(|t| t.is_any_keyword(&["LOW_PRIORITY", "IGNORE", "ONLY"]))
        {
            i += 1;
        }
        i = table_list(tokens, i, &mut tables);
    }

    while i < tokens.len() {
        let token = &tokens[i];
        if token.depth > 0 {
            i += 1;
            continue;
        }

        if token.is_keyword("FROM") {
            i = table_list(tokens, i + 1, &mut tables);
        } else if token.is_any_keyword(JOIN_KEYWORDS) || token.is_keyword("INTO") {
            i = match table_ref(tokens, i + 1) {
                Some((table, next)) => {
                    push(&mut tables, table);
                    next
                }
                None => i + 1,
            };
        } else {
            i += 1;
        }
    }

    tables
}

/// Reads `table [alias] {, table [alias]}` and returns the index after the list.
fn table_list(tokens: &[Token], start: usize, tables: &mut Vec<TableRef>) -> usize {
    let mut i = start;
    loop {
        match table_ref(tokens, i) {
            Some((table, next)) => {
                push(tables, table);
                i = next;
            }
            None => {
                if tokens.get(i).is_some_and(|t| t.kind == TokenKind::LParen) {
                    // Derived table; skip it and its alias
                    i = skip_alias(tokens, skip_balanced(tokens, i));
                } else {
                    return i;
                }
            }
        }

        match tokens.get(i) {
            Some(t) if t.kind == TokenKind::Comma && t.depth == 0 => i += 1,
            _ => return i,
        }
    }
}

fn push(tables: &mut Vec<TableRef>, mut table: TableRef) {
    if tables.is_empty() {
        table.role = TableRole::Main;
    }
    tables.push(table);
}

/// Reads `[schema.]name [[AS] alias]` starting at `start`.
fn table_ref(tokens: &[Token], start: usize) -> Option<(TableRef, usize)> {
    let cursor = Cursor::new(tokens);
    let (parts, next) = cursor.qualified_name(start)?;
    if !tokens[start].is_quoted() && tokens[start].is_any_keyword(CLAUSE_KEYWORDS) {
        return None;
    }

    let mut parts = parts;
    let name = parts.pop()?;
    let schema = parts.pop();

    let (alias, next) = alias(tokens, next);

    Some((
        TableRef {
            name,
            schema,
            alias,
            role: TableRole::Join,
        },
        next,
    ))
}

/// Reads an optional `[AS] alias`. Reserved words are not aliases.
fn alias(tokens: &[Token], start: usize) -> (Option<String>, usize) {
    let mut i = start;
    let explicit = tokens.get(i).is_some_and(|t| t.is_keyword("AS"));
    if explicit {
        i += 1;
    }

    match tokens.get(i) {
        Some(t @ Token {
            kind: TokenKind::Word { value, quoted },
            ..
        }) if *quoted || !t.is_any_keyword(CLAUSE_KEYWORDS) => (Some(value.clone()), i + 1),
        _ => (None, if explicit { i } else { start }),
    }
}

fn skip_alias(tokens: &[Token], start: usize) -> usize {
    alias(tokens, start).1
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scanner::scan;
    use pretty_assertions::assert_eq;

    fn tables(sql: &str) -> Vec<(String, Option<String>, TableRole)> {
        let scan = scan(sql);
        let kind = scan
            .tokens
            .first()
            .and_then(|t| t.word())
            .and_then(SqlStatementKind::from_keyword);
        collect(&scan.tokens, kind)
            .into_iter()
            .map(|t| (t.name, t.alias, t.role))
            .collect()
    }

    fn t(name: &str, alias: Option<&str>, role: TableRole) -> (String, Option<String>, TableRole) {
        (name.to_string(), alias.map(str::to_string), role)
    }

    #[test]
    fn from_with_alias() {
        assert_eq!(
            tables("SELECT * FROM users u WHERE u.id = ?"),
            vec![t("users", Some("u"), TableRole::Main)]
        );
    }

    #[test]
    fn reserved_word_is_not_an_alias() {
        assert_eq!(
            tables("SELECT * FROM users WHERE id = ?"),
            vec![t("users", None, TableRole::Main)]
        );
        assert_eq!(
            tables("SELECT * FROM users LEFT JOIN dept ON dept.id = users.dept_id"),
            vec![
                t("users", None, TableRole::Main),
                t("dept", None, TableRole::Join)
            ]
        );
    }

    #[test]
    fn joins_with_as_and_backticks() {
        assert_eq!(
            tables("SELECT * FROM `users` AS u LEFT OUTER JOIN `dept` d ON d.id = u.dept_id INNER JOIN role r ON r.id = u.role_id"),
            vec![
                t("users", Some("u"), TableRole::Main),
                t("dept", Some("d"), TableRole::Join),
                t("role", Some("r"), TableRole::Join),
            ]
        );
    }

    #[test]
    fn comma_separated_from_list() {
        assert_eq!(
            tables("SELECT * FROM users u, dept d WHERE u.dept_id = d.id"),
            vec![
                t("users", Some("u"), TableRole::Main),
                t("dept", Some("d"), TableRole::Join),
            ]
        );
    }

    #[test]
    fn schema_qualified_table() {
        let scan = scan("SELECT * FROM app.users WHERE id = ?");
        let tables = collect(&scan.tokens, Some(SqlStatementKind::Select));
        assert_eq!(tables[0].name, "users");
        assert_eq!(tables[0].schema.as_deref(), Some("app"));
    }

    #[test]
    fn update_target() {
        assert_eq!(
            tables("UPDATE users SET email = ? WHERE id = ?"),
            vec![t("users", None, TableRole::Main)]
        );
        assert_eq!(
            tables("UPDATE LOW_PRIORITY users u SET u.email = ?"),
            vec![t("users", Some("u"), TableRole::Main)]
        );
    }

    #[test]
    fn insert_target() {
        assert_eq!(
            tables("INSERT INTO users (email, name) VALUES (?, ?)"),
            vec![t("users", None, TableRole::Main)]
        );
    }

    #[test]
    fn delete_target() {
        assert_eq!(
            tables("DELETE FROM users WHERE id = ?"),
            vec![t("users", None, TableRole::Main)]
        );
    }

    #[test]
    fn subquery_tables_are_omitted() {
        assert_eq!(
            tables("SELECT * FROM users u WHERE EXISTS (SELECT 1 FROM dept d WHERE d.id = u.dept_id)"),
            vec![t("users", Some("u"), TableRole::Main)]
        );
    }

    #[test]
    fn derived_table_is_skipped() {
        assert_eq!(
            tables("SELECT * FROM (SELECT * FROM users) x, dept d"),
            vec![t("dept", Some("d"), TableRole::Main)]
        );
    }
}
