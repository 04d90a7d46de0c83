use crate::{Clause, SqlGather};

/// `(table, column, label)` per placeholder.
pub(crate) fn columns(gather: &SqlGather) -> Vec<Option<(String, String, String)>> {
    gather
        .parameter_mappings
        .iter()
        .map(|m| {
            m.field.as_ref().map(|f| {
                (
                    f.table_name.clone().unwrap_or_default(),
                    f.column.clone(),
                    f.label.clone(),
                )
            })
        })
        .collect()
}

/// Labels of the mapped placeholders, skipping unmapped ones.
pub(crate) fn labels(gather: &SqlGather) -> Vec<String> {
    gather
        .parameter_mappings
        .iter()
        .filter_map(|m| m.field.as_ref().map(|f| f.label.clone()))
        .collect()
}

pub(crate) fn clauses(gather: &SqlGather) -> Vec<Clause> {
    gather
        .parameter_mappings
        .iter()
        .filter_map(|m| m.field.as_ref().map(|f| f.clause))
        .collect()
}
