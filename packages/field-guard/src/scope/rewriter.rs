use crate::error::ScopeError;
use sql_gather::{scanner::scan, ClauseBoundaries, SqlStatementKind};

///
/// Splices a JOIN fragment and a WHERE fragment into `sql`.
///
/// The JOIN goes at the end of the top-level FROM clause. The WHERE fragment is ANDed with an existing top-level
/// condition as `WHERE (<existing>) AND (<where>)`, or added as ` WHERE (<where>)` before the first trailing clause.
///
/// Empty fragments are ignored, so two empty fragments return `sql` unchanged.
///
pub fn apply_scope(sql: &str, join: &str, where_clause: &str) -> Result<String, ScopeError> {
    let join = join.trim();
    let where_clause = where_clause.trim();

    if join.is_empty() && where_clause.is_empty() {
        return Ok(sql.to_string());
    }

    for fragment in [join, where_clause] {
        if scan(fragment).placeholder_count() > 0 {
            return Err(ScopeError::PlaceholderInFragment {
                fragment: fragment.to_string(),
            });
        }
    }

    let boundaries = ClauseBoundaries::find(sql);

    if !boundaries.complete {
        return Err(ScopeError::splice("statement ends inside a literal or comment"));
    }
    if boundaries.set_operation {
        return Err(ScopeError::splice("statement combines queries with a set operation"));
    }

    match boundaries.kind {
        Some(SqlStatementKind::Select) if boundaries.from.is_none() => {
            return Err(ScopeError::splice("SELECT has no top-level FROM clause"));
        }
        Some(SqlStatementKind::Select) => {}
        Some(kind @ (SqlStatementKind::Update | SqlStatementKind::Delete)) if !join.is_empty() => {
            return Err(ScopeError::splice(format!("a JOIN cannot be added to {kind}")));
        }
        Some(SqlStatementKind::Update | SqlStatementKind::Delete) => {}
        Some(SqlStatementKind::Insert) => {
            return Err(ScopeError::splice("INSERT statements cannot be scoped"));
        }
        None => {
            return Err(ScopeError::splice("statement kind is not recognized"));
        }
    }

    // (offset, text), applied from the highest offset down so earlier offsets stay valid
    let mut edits: Vec<(usize, String)> = Vec::with_capacity(3);
    let mut at_from_end = String::new();

    if !join.is_empty() {
        at_from_end.push(' ');
        at_from_end.push_str(join);
    }

    if !where_clause.is_empty() {
        match boundaries.where_clause {
            Some(existing) if existing.condition.start < existing.condition.end => {
                edits.push((existing.condition.start, "(".to_string()));
                edits.push((existing.condition.end, format!(") AND ({where_clause})")));
            }
            // `WHERE` with nothing after it
            Some(existing) => {
                edits.push((existing.keyword.end, format!(" ({where_clause})")));
            }
            None => {
                at_from_end.push_str(&format!(" WHERE ({where_clause})"));
            }
        }
    }

    if !at_from_end.is_empty() {
        edits.push((boundaries.from_end, at_from_end));
    }

    edits.sort_by(|a, b| b.0.cmp(&a.0));

    let mut rewritten = sql.to_string();
    for (offset, text) in edits {
        rewritten.insert_str(offset, &text);
    }

    Ok(rewritten)
}
