use crate::error::LocatorError;
use serde_json::{Map, Value};
use std::{
    collections::HashSet,
    fmt::{self, Display},
};

///
/// Where a bound value physically lives in a parameter container.
///
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Locator {
    /// Index into a positional list
    Position(usize),
    /// Top-level key of the parameter object
    Key(String),
    /// Dotted path below a top-level object, like `user.address.city`
    Property { object: String, property: String },
    /// Entry in the named-parameter bag
    Named(String),
}

impl Display for Locator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Locator::Position(index) => write!(f, "${}", index + 1),
            Locator::Key(key) => write!(f, "{key}"),
            Locator::Property { object, property } => write!(f, "{object}.{property}"),
            Locator::Named(name) => write!(f, "@{name}"),
        }
    }
}

///
/// A host's parameter container.
///
/// `locate` maps a placeholder ordinal to a [`Locator`]; `read` and `write` work through it.
/// `read` returns `Ok(None)` when the slot exists but holds no value.
///
pub trait Parameters {
    fn locate(&self, index: usize) -> Option<Locator>;

    fn read(&self, locator: &Locator) -> Result<Option<Value>, LocatorError>;

    fn write(&mut self, locator: &Locator, value: Value) -> Result<(), LocatorError>;
}

impl Parameters for Vec<Value> {
    fn locate(&self, index: usize) -> Option<Locator> {
        (index < self.len()).then_some(Locator::Position(index))
    }

    fn read(&self, locator: &Locator) -> Result<Option<Value>, LocatorError> {
        match locator {
            Locator::Position(index) => self
                .get(*index)
                .cloned()
                .map(Some)
                .ok_or_else(|| not_found(locator)),
            _ => Err(not_found(locator)),
        }
    }

    fn write(&mut self, locator: &Locator, value: Value) -> Result<(), LocatorError> {
        let slot = match locator {
            Locator::Position(index) => self.get_mut(*index),
            _ => None,
        };

        let slot = slot.ok_or_else(|| not_found(locator))?;
        *slot = value;
        Ok(())
    }
}

///
/// Parameters bound by property name, the way an ORM binds a statement.
///
/// Each placeholder names a property, in textual order. A property resolves against the named-parameter bag first
/// (loop variables and other additional parameters), then against the parameter object. A scalar parameter object
/// answers to any single property name.
///
#[derive(Debug, Clone, Default)]
pub struct BoundParameters {
    properties: Vec<String>,
    object: Value,
    named: Map<String, Value>,
    read_only: HashSet<String>,
}

impl BoundParameters {
    pub fn new<I, S>(properties: I, object: Value) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        BoundParameters {
            properties: properties.into_iter().map(Into::into).collect(),
            object,
            named: Map::new(),
            read_only: HashSet::new(),
        }
    }

    pub fn with_named(mut self, name: impl Into<String>, value: Value) -> Self {
        self.named.insert(name.into(), value);
        self
    }

    /// Rejects writes to the top-level name, and everything below it.
    pub fn with_read_only(mut self, name: impl Into<String>) -> Self {
        self.read_only.insert(name.into());
        self
    }

    pub fn object(&self) -> &Value {
        &self.object
    }

    pub fn named(&self, name: &str) -> Option<&Value> {
        self.named.get(name)
    }

    pub fn into_parts(self) -> (Value, Map<String, Value>) {
        (self.object, self.named)
    }

    fn root_name(locator: &Locator) -> Option<&str> {
        match locator {
            Locator::Key(name) | Locator::Named(name) => Some(name),
            Locator::Property { object, .. } => Some(object),
            Locator::Position(_) => None,
        }
    }

    fn root(&self, name: &str) -> Option<&Value> {
        self.named.get(name).or_else(|| self.object.get(name))
    }

    fn root_mut(&mut self, name: &str) -> Option<&mut Value> {
        if self.named.contains_key(name) {
            self.named.get_mut(name)
        } else {
            self.object.get_mut(name)
        }
    }
}

impl Parameters for BoundParameters {
    fn locate(&self, index: usize) -> Option<Locator> {
        let property = self.properties.get(index)?;

        if self.named.contains_key(property) {
            return Some(Locator::Named(property.to_owned()));
        }

        match property.split_once('.') {
            Some((object, rest)) if self.root(object).is_some() => Some(Locator::Property {
                object: object.to_owned(),
                property: rest.to_owned(),
            }),
            Some(_) => None,
            None => Some(Locator::Key(property.to_owned())),
        }
    }

    fn read(&self, locator: &Locator) -> Result<Option<Value>, LocatorError> {
        match locator {
            Locator::Named(name) => self
                .named
                .get(name)
                .cloned()
                .map(Some)
                .ok_or_else(|| not_found(locator)),
            Locator::Key(key) => match &self.object {
                Value::Object(map) => Ok(map.get(key).cloned()),
                Value::Null => Ok(None),
                scalar => Ok(Some(scalar.clone())),
            },
            Locator::Property { object, property } => {
                let root = self.root(object).ok_or_else(|| not_found(locator))?;
                if !root.is_object() {
                    return Err(LocatorError::NotAnObject {
                        locator: locator.clone(),
                    });
                }
                Ok(root.pointer(&pointer(property)).cloned())
            }
            Locator::Position(_) => Err(not_found(locator)),
        }
    }

    fn write(&mut self, locator: &Locator, value: Value) -> Result<(), LocatorError> {
        if Self::root_name(locator).is_some_and(|name| self.read_only.contains(name)) {
            return Err(LocatorError::ReadOnly {
                locator: locator.clone(),
            });
        }

        let slot = match locator {
            Locator::Named(name) => self.named.get_mut(name),
            Locator::Key(key) => match &mut self.object {
                Value::Object(map) => map.get_mut(key),
                Value::Null => None,
                scalar => Some(scalar),
            },
            Locator::Property { object, property } => {
                let root = self.root_mut(object).ok_or_else(|| not_found(locator))?;
                if !root.is_object() {
                    return Err(LocatorError::NotAnObject {
                        locator: locator.clone(),
                    });
                }
                root.pointer_mut(&pointer(property))
            }
            Locator::Position(_) => None,
        };

        let slot = slot.ok_or_else(|| not_found(locator))?;
        *slot = value;
        Ok(())
    }
}

fn not_found(locator: &Locator) -> LocatorError {
    LocatorError::NotFound {
        locator: locator.clone(),
    }
}

/// `a.b` as the JSON pointer `/a/b`
fn pointer(path: &str) -> String {
    path.split('.')
        .map(|segment| format!("/{}", segment.replace('~', "~0").replace('/', "~1")))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn positional_parameters() {
        let mut params = vec![json!("a"), json!(1)];

        assert_eq!(params.locate(1), Some(Locator::Position(1)));
        assert_eq!(params.locate(2), None);

        params.write(&Locator::Position(0), json!("b")).unwrap();
        assert_eq!(params.read(&Locator::Position(0)).unwrap(), Some(json!("b")));

        assert!(matches!(
            params.write(&Locator::Position(5), json!("c")),
            Err(LocatorError::NotFound { .. })
        ));
        assert!(params.read(&Locator::Key("a".into())).is_err());
    }

    #[test]
    fn object_properties() {
        let mut params = BoundParameters::new(
            ["email", "user.address.city", "missing.field"],
            json!({ "email": "a@example.com", "user": { "address": { "city": "Perth" } } }),
        );

        assert_eq!(params.locate(0), Some(Locator::Key("email".into())));
        let city = params.locate(1).unwrap();
        assert_eq!(
            city,
            Locator::Property {
                object: "user".into(),
                property: "address.city".into()
            }
        );
        assert_eq!(params.locate(2), None);
        assert_eq!(params.locate(3), None);

        params.write(&city, json!("Sydney")).unwrap();
        assert_eq!(params.read(&city).unwrap(), Some(json!("Sydney")));
        assert_eq!(params.object()["user"]["address"]["city"], "Sydney");
    }

    #[test]
    fn named_bag_takes_precedence() {
        let mut params = BoundParameters::new(
            ["item.email", "email"],
            json!({ "email": "outer", "item": { "email": "shadowed" } }),
        )
        .with_named("item", json!({ "email": "inner" }));

        let locator = params.locate(0).unwrap();
        assert_eq!(params.read(&locator).unwrap(), Some(json!("inner")));

        params.write(&locator, json!("changed")).unwrap();
        assert_eq!(params.named("item").unwrap()["email"], "changed");
        assert_eq!(params.object()["item"]["email"], "shadowed");

        let params = params.with_named("email", json!("named"));
        assert_eq!(params.locate(1), Some(Locator::Named("email".into())));
    }

    #[test]
    fn scalar_parameter_object() {
        let mut params = BoundParameters::new(["value"], json!("13800138000"));
        let locator = params.locate(0).unwrap();

        assert_eq!(params.read(&locator).unwrap(), Some(json!("13800138000")));
        params.write(&locator, json!("ENC:00")).unwrap();
        assert_eq!(params.object(), &json!("ENC:00"));
    }

    #[test]
    fn absent_values_and_non_objects() {
        let params = BoundParameters::new(["email", "name.first"], json!({ "name": "plain" }));

        assert_eq!(params.read(&params.locate(0).unwrap()).unwrap(), None);
        assert!(matches!(
            params.read(&params.locate(1).unwrap()),
            Err(LocatorError::NotAnObject { .. })
        ));
    }

    #[test]
    fn read_only_roots_reject_writes() {
        let mut params =
            BoundParameters::new(["email"], json!({ "email": "a" })).with_read_only("email");
        let locator = params.locate(0).unwrap();

        assert_eq!(
            params.write(&locator, json!("b")),
            Err(LocatorError::ReadOnly {
                locator: locator.clone()
            })
        );
    }

    #[test]
    fn locator_display() {
        assert_eq!(Locator::Position(0).to_string(), "$1");
        assert_eq!(Locator::Named("x".into()).to_string(), "@x");
        assert_eq!(
            Locator::Property {
                object: "a".into(),
                property: "b.c".into()
            }
            .to_string(),
            "a.b.c"
        );
    }
}
