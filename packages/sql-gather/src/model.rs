use serde::Serialize;
use std::fmt::{self, Display};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum SqlStatementKind {
    Select,
    Insert,
    Update,
    Delete,
}

impl SqlStatementKind {
    /// Classifies a statement from its leading keyword.
    pub fn from_keyword(keyword: &str) -> Option<Self> {
        match keyword.to_ascii_uppercase().as_str() {
            "SELECT" => Some(Self::Select),
            "INSERT" | "REPLACE" => Some(Self::Insert),
            "UPDATE" => Some(Self::Update),
            "DELETE" => Some(Self::Delete),
            _ => None,
        }
    }
}

impl Display for SqlStatementKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Select => "SELECT",
            Self::Insert => "INSERT",
            Self::Update => "UPDATE",
            Self::Delete => "DELETE",
        };
        write!(f, "{s}")
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum TableRole {
    Main,
    Join,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TableRef {
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub schema: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub alias: Option<String>,
    pub role: TableRole,
}

impl TableRef {
    /// True if `qualifier` names this table, either by alias or by table name.
    pub fn is_named(&self, qualifier: &str) -> bool {
        self.alias
            .as_deref()
            .is_some_and(|alias| alias.eq_ignore_ascii_case(qualifier))
            || self.name.eq_ignore_ascii_case(qualifier)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Clause {
    Condition,
    Set,
    Insert,
}

/// The number of placeholders a single field reference consumes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", content = "count", rename_all = "snake_case")]
pub enum Arity {
    /// `col = ?`, `col LIKE ?`, `col IS ?`
    Single,
    /// `col IN (?, ?, …)`
    In(usize),
    /// `col BETWEEN ? AND ?`
    Between,
    /// Several placeholders feeding one value expression, like `col LIKE CONCAT('%', ?, '%')`
    Expression(usize),
}

impl Arity {
    pub fn count(&self) -> usize {
        match self {
            Arity::Single => 1,
            Arity::Between => 2,
            Arity::In(n) | Arity::Expression(n) => *n,
        }
    }

    /// Picks the arity for an expression holding `count` placeholders.
    pub(crate) fn for_expression(count: usize) -> Self {
        if count == 1 {
            Arity::Single
        } else {
            Arity::Expression(count)
        }
    }

    /// Diagnostic name for the `ordinal`th placeholder of `column`.
    ///
    /// Labels only disambiguate log output. Registry lookups always use the bare column name.
    pub fn label(&self, column: &str, ordinal: usize) -> String {
        match self {
            Arity::Single => column.to_string(),
            Arity::Between if ordinal == 0 => format!("{column}_min"),
            Arity::Between => format!("{column}_max"),
            Arity::In(_) | Arity::Expression(_) => format!("{column}_{}", ordinal + 1),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FieldRef {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub table_alias: Option<String>,
    pub column: String,
    pub clause: Clause,
    pub arity: Arity,
}

/// The column a placeholder was attributed to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MappedField {
    /// `None` when the table could not be determined from the statement alone.
    pub table_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub table_alias: Option<String>,
    pub column: String,
    pub label: String,
    pub clause: Clause,
    pub arity: Arity,
}

/// One entry per `?` placeholder, in textual order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ParameterMapping {
    pub index: usize,
    /// `None` for placeholders that do not bind to a column, such as `LIMIT ?`.
    pub field: Option<MappedField>,
}

impl ParameterMapping {
    pub fn column(&self) -> Option<&str> {
        self.field.as_ref().map(|f| f.column.as_str())
    }
}

/// Everything the analyzer could recover from one statement.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SqlGather {
    pub kind: Option<SqlStatementKind>,
    pub tables: Vec<TableRef>,
    pub fields: Vec<FieldRef>,
    pub parameter_mappings: Vec<ParameterMapping>,
    /// False when the scanner stopped early on an unterminated literal or comment.
    pub complete: bool,
}

impl SqlGather {
    pub fn main_table(&self) -> Option<&TableRef> {
        self.tables.iter().find(|t| t.role == TableRole::Main)
    }

    pub fn fields_in(&self, clause: Clause) -> impl Iterator<Item = &FieldRef> {
        self.fields.iter().filter(move |f| f.clause == clause)
    }

    pub fn placeholder_count(&self) -> usize {
        self.parameter_mappings.len()
    }

    /// True when every placeholder was attributed to a column.
    pub fn is_fully_mapped(&self) -> bool {
        self.parameter_mappings.iter().all(|m| m.field.is_some())
    }

    /// Resolves the table a field belongs to.
    ///
    /// A qualifier is matched against aliases first and table names second. Without a qualifier the field belongs to
    /// the only table, if there is exactly one.
    pub fn resolve_table(&self, qualifier: Option<&str>) -> Option<&TableRef> {
        match qualifier {
            Some(q) => self
                .tables
                .iter()
                .find(|t| t.alias.as_deref().is_some_and(|a| a.eq_ignore_ascii_case(q)))
                .or_else(|| self.tables.iter().find(|t| t.name.eq_ignore_ascii_case(q))),
            None if self.tables.len() == 1 => self.tables.first(),
            None => None,
        }
    }
}
