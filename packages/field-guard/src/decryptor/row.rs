use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

///
/// A materialized result row, as handed back by the host.
///
pub trait Row {
    /// Name of the type the row maps to, used to look up its encrypted fields
    fn type_name(&self) -> &str;

    fn get(&self, field: &str) -> Option<&Value>;

    fn set(&mut self, field: &str, value: Value);
}

/// A row as a type name and a map of field values.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Record {
    pub type_name: String,
    pub fields: Map<String, Value>,
}

impl Record {
    pub fn new(type_name: impl Into<String>) -> Self {
        Record {
            type_name: type_name.into(),
            fields: Map::new(),
        }
    }

    pub fn with(mut self, field: impl Into<String>, value: impl Into<Value>) -> Self {
        self.fields.insert(field.into(), value.into());
        self
    }
}

impl Row for Record {
    fn type_name(&self) -> &str {
        &self.type_name
    }

    fn get(&self, field: &str) -> Option<&Value> {
        self.fields.get(field)
    }

    fn set(&mut self, field: &str, value: Value) {
        self.fields.insert(field.to_owned(), value);
    }
}
