//! Object schema declarations.
//!
//! # Responsibility
//! - Describe object kinds as ordered lists of named, typed properties.
//! - Validate a schema before any store is opened with it.
//!
//! # Invariants
//! - Kind and property names match `^[A-Za-z_][A-Za-z0-9_]*$`.
//! - Relationship targets always name a kind declared in the same schema.
//! - Property order is declaration order; detachment walks it as-is.

use crate::model::value::ValueType;
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::error::Error;
use std::fmt::{Display, Formatter};

static NAME_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[A-Za-z_][A-Za-z0-9_]*$").expect("valid name regex"));

/// Shape of one declared property.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "shape", content = "of", rename_all = "snake_case")]
pub enum PropertyKind {
    /// Single primitive value.
    Value(ValueType),
    /// Ordered collection of primitive values.
    List(ValueType),
    /// Optional link to one object of the named kind.
    ToOne(String),
    /// Ordered collection of links to objects of the named kind.
    ToMany(String),
}

impl PropertyKind {
    pub fn describe(&self) -> &'static str {
        match self {
            Self::Value(_) => "value",
            Self::List(_) => "list",
            Self::ToOne(_) => "to_one",
            Self::ToMany(_) => "to_many",
        }
    }

    /// Target kind for relationship properties.
    pub fn target(&self) -> Option<&str> {
        match self {
            Self::ToOne(target) | Self::ToMany(target) => Some(target.as_str()),
            Self::Value(_) | Self::List(_) => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Property {
    pub name: String,
    pub kind: PropertyKind,
}

/// Declared properties of one object kind.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ObjectSchema {
    kind: String,
    properties: Vec<Property>,
}

impl ObjectSchema {
    pub fn new(kind: impl Into<String>) -> Self {
        Self {
            kind: kind.into(),
            properties: Vec::new(),
        }
    }

    pub fn value(self, name: impl Into<String>, value_type: ValueType) -> Self {
        self.property(name, PropertyKind::Value(value_type))
    }

    pub fn list(self, name: impl Into<String>, value_type: ValueType) -> Self {
        self.property(name, PropertyKind::List(value_type))
    }

    pub fn to_one(self, name: impl Into<String>, target: impl Into<String>) -> Self {
        self.property(name, PropertyKind::ToOne(target.into()))
    }

    pub fn to_many(self, name: impl Into<String>, target: impl Into<String>) -> Self {
        self.property(name, PropertyKind::ToMany(target.into()))
    }

    pub fn property(mut self, name: impl Into<String>, kind: PropertyKind) -> Self {
        self.properties.push(Property {
            name: name.into(),
            kind,
        });
        self
    }

    pub fn kind(&self) -> &str {
        &self.kind
    }

    /// Properties in declaration order.
    pub fn properties(&self) -> &[Property] {
        &self.properties
    }

    pub fn find(&self, name: &str) -> Option<&Property> {
        self.properties.iter().find(|property| property.name == name)
    }
}

/// Full set of object kinds a store may hold.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Schema {
    objects: Vec<ObjectSchema>,
}

impl Schema {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, object: ObjectSchema) -> Self {
        self.objects.push(object);
        self
    }

    pub fn object(&self, kind: &str) -> Option<&ObjectSchema> {
        self.objects.iter().find(|object| object.kind == kind)
    }

    pub fn objects(&self) -> &[ObjectSchema] {
        &self.objects
    }

    pub fn kinds(&self) -> impl Iterator<Item = &str> {
        self.objects.iter().map(|object| object.kind.as_str())
    }

    /// Looks up a property, reporting which part of the path is unknown.
    pub fn property(&self, kind: &str, name: &str) -> Result<&Property, SchemaError> {
        let object = self
            .object(kind)
            .ok_or_else(|| SchemaError::UnknownKind(kind.to_string()))?;
        object
            .find(name)
            .ok_or_else(|| SchemaError::UnknownProperty {
                kind: kind.to_string(),
                property: name.to_string(),
            })
    }

    /// Validates names, uniqueness and relationship targets.
    pub fn validate(&self) -> Result<(), SchemaError> {
        let mut kinds = HashSet::new();
        for object in &self.objects {
            if !NAME_RE.is_match(&object.kind) {
                return Err(SchemaError::InvalidName(object.kind.clone()));
            }
            if !kinds.insert(object.kind.as_str()) {
                return Err(SchemaError::DuplicateKind(object.kind.clone()));
            }
        }

        for object in &self.objects {
            let mut names = HashSet::new();
            for property in &object.properties {
                if !NAME_RE.is_match(&property.name) {
                    return Err(SchemaError::InvalidName(format!(
                        "{}.{}",
                        object.kind, property.name
                    )));
                }
                if !names.insert(property.name.as_str()) {
                    return Err(SchemaError::DuplicateProperty {
                        kind: object.kind.clone(),
                        property: property.name.clone(),
                    });
                }
                if let Some(target) = property.kind.target() {
                    if !kinds.contains(target) {
                        return Err(SchemaError::UnknownTarget {
                            kind: object.kind.clone(),
                            property: property.name.clone(),
                            target: target.to_string(),
                        });
                    }
                }
            }
        }

        Ok(())
    }
}

/// Schema declaration or usage violation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SchemaError {
    InvalidName(String),
    DuplicateKind(String),
    DuplicateProperty {
        kind: String,
        property: String,
    },
    UnknownTarget {
        kind: String,
        property: String,
        target: String,
    },
    UnknownKind(String),
    UnknownProperty {
        kind: String,
        property: String,
    },
    ShapeMismatch {
        kind: String,
        property: String,
        expected: &'static str,
    },
    TypeMismatch {
        kind: String,
        property: String,
        expected: ValueType,
    },
    TargetMismatch {
        kind: String,
        property: String,
        expected: String,
        actual: String,
    },
}

impl Display for SchemaError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::InvalidName(name) => write!(f, "invalid schema name `{name}`"),
            Self::DuplicateKind(kind) => write!(f, "kind `{kind}` declared twice"),
            Self::DuplicateProperty { kind, property } => {
                write!(f, "property `{kind}.{property}` declared twice")
            }
            Self::UnknownTarget {
                kind,
                property,
                target,
            } => write!(
                f,
                "property `{kind}.{property}` links to undeclared kind `{target}`"
            ),
            Self::UnknownKind(kind) => write!(f, "kind `{kind}` is not in the schema"),
            Self::UnknownProperty { kind, property } => {
                write!(f, "property `{kind}.{property}` is not in the schema")
            }
            Self::ShapeMismatch {
                kind,
                property,
                expected,
            } => write!(f, "property `{kind}.{property}` is not a {expected} property"),
            Self::TypeMismatch {
                kind,
                property,
                expected,
            } => write!(
                f,
                "property `{kind}.{property}` expects {} values",
                expected.as_str()
            ),
            Self::TargetMismatch {
                kind,
                property,
                expected,
                actual,
            } => write!(
                f,
                "property `{kind}.{property}` links to `{expected}`, got `{actual}`"
            ),
        }
    }
}

impl Error for SchemaError {}

#[cfg(test)]
mod tests {
    use super::{ObjectSchema, Schema, SchemaError};
    use crate::model::value::ValueType;

    fn people() -> Schema {
        Schema::new()
            .with(
                ObjectSchema::new("Person")
                    .value("name", ValueType::Text)
                    .to_one("spouse", "Person")
                    .to_many("pets", "Pet"),
            )
            .with(ObjectSchema::new("Pet").value("name", ValueType::Text))
    }

    #[test]
    fn valid_schema_passes_and_keeps_declaration_order() {
        let schema = people();
        schema.validate().unwrap();

        let names: Vec<&str> = schema
            .object("Person")
            .unwrap()
            .properties()
            .iter()
            .map(|property| property.name.as_str())
            .collect();
        assert_eq!(names, vec!["name", "spouse", "pets"]);
    }

    #[test]
    fn unknown_link_target_is_rejected() {
        let schema = Schema::new().with(ObjectSchema::new("Person").to_one("car", "Car"));
        assert_eq!(
            schema.validate(),
            Err(SchemaError::UnknownTarget {
                kind: "Person".to_string(),
                property: "car".to_string(),
                target: "Car".to_string(),
            })
        );
    }

    #[test]
    fn invalid_and_duplicate_names_are_rejected() {
        let schema = Schema::new().with(ObjectSchema::new("has space"));
        assert!(matches!(schema.validate(), Err(SchemaError::InvalidName(_))));

        let schema = Schema::new().with(
            ObjectSchema::new("Pet")
                .value("name", ValueType::Text)
                .value("name", ValueType::Int),
        );
        assert!(matches!(
            schema.validate(),
            Err(SchemaError::DuplicateProperty { .. })
        ));
    }

    #[test]
    fn property_lookup_reports_missing_part() {
        let schema = people();
        assert!(schema.property("Person", "pets").is_ok());
        assert_eq!(
            schema.property("Car", "wheels"),
            Err(SchemaError::UnknownKind("Car".to_string()))
        );
        assert!(matches!(
            schema.property("Pet", "age"),
            Err(SchemaError::UnknownProperty { .. })
        ));
    }
}
