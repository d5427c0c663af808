//! Canonical connector schema model.
//!
//! Documents arrive as loosely shaped JSON from converters, the extraction
//! worker, or a user's saved file. Every entry point goes through the
//! `from_value` parse functions below, which either produce a normalized
//! value or a [`ShapeError`] naming why the input was rejected.

use std::collections::{HashMap, HashSet};

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use thiserror::Error;

pub const DEFAULT_SCHEMA_NAME: &str = "Connector";
pub const DEFAULT_SCHEMA_VERSION: &str = "1.0.0";
pub const EXPORT_FILE_NAME: &str = "schema.json";

/// Key-flag spellings accepted on read, highest precedence first.
const KEY_FIELDS: [&str; 2] = ["IsKey", "isKey"];
/// Multi-value spellings accepted on read, highest precedence first.
const MULTI_VALUE_FIELDS: [&str; 2] = ["MultiValue", "multiValue"];

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ShapeError {
    #[error("Expected a JSON object, found {0}")]
    NotAnObject(&'static str),
    #[error("Missing or non-sequence `entities` field")]
    EntitiesNotSequence,
    #[error("Missing or non-string `name` field")]
    MissingName,
    #[error("Entity {0} has a non-sequence `attributes` field")]
    AttributesNotSequence(String),
    #[error("Unknown attribute type: {0}")]
    UnknownType(String),
}

pub type ShapeResult<T> = Result<T, ShapeError>;

fn kind_of(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

fn as_object(value: &Value) -> ShapeResult<&Map<String, Value>> {
    value
        .as_object()
        .ok_or_else(|| ShapeError::NotAnObject(kind_of(value)))
}

fn first_flag(obj: &Map<String, Value>, spellings: &[&str]) -> bool {
    spellings
        .iter()
        .find_map(|field| obj.get(*field).and_then(Value::as_bool))
        .unwrap_or(false)
}

fn string_field(obj: &Map<String, Value>, field: &str) -> String {
    obj.get(field)
        .and_then(Value::as_str)
        .unwrap_or_default()
        .to_string()
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AttributeType {
    #[default]
    String,
    Int,
    Bool,
    Datetime,
}

impl AttributeType {
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::String => "String",
            Self::Int => "Int",
            Self::Bool => "Bool",
            Self::Datetime => "Datetime",
        }
    }
}

impl std::fmt::Display for AttributeType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for AttributeType {
    type Err = ShapeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "string" | "str" | "text" => Ok(Self::String),
            "int" | "integer" | "long" | "number" => Ok(Self::Int),
            "bool" | "boolean" => Ok(Self::Bool),
            "datetime" | "date" | "timestamp" => Ok(Self::Datetime),
            _ => Err(ShapeError::UnknownType(s.to_string())),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "Value")]
pub struct Attribute {
    pub name: String,
    #[serde(rename = "type")]
    pub attr_type: AttributeType,
    #[serde(rename = "MultiValue")]
    pub multi_value: bool,
    #[serde(rename = "IsKey")]
    pub is_key: bool,
}

impl Attribute {
    #[must_use]
    pub fn new(name: impl Into<String>, attr_type: AttributeType) -> Self {
        Self {
            name: name.into(),
            attr_type,
            multi_value: false,
            is_key: false,
        }
    }

    #[must_use]
    pub fn key(name: impl Into<String>) -> Self {
        Self::new(name, AttributeType::String).with_key(true)
    }

    #[must_use]
    pub fn with_key(mut self, is_key: bool) -> Self {
        self.is_key = is_key;
        self
    }

    #[must_use]
    pub fn with_multi_value(mut self, multi_value: bool) -> Self {
        self.multi_value = multi_value;
        self
    }

    /// Parses one attribute, resolving both flag spellings.
    ///
    /// Types are not validated against any source system: a missing or
    /// unrecognized type falls back to `String`.
    pub fn from_value(value: &Value) -> ShapeResult<Self> {
        let obj = as_object(value)?;
        let name = obj
            .get("name")
            .and_then(Value::as_str)
            .ok_or(ShapeError::MissingName)?;

        let attr_type = obj
            .get("type")
            .and_then(Value::as_str)
            .and_then(|t| t.parse().ok())
            .unwrap_or_default();

        Ok(Self {
            name: name.to_string(),
            attr_type,
            multi_value: first_flag(obj, &MULTI_VALUE_FIELDS),
            is_key: first_flag(obj, &KEY_FIELDS),
        })
    }
}

impl TryFrom<Value> for Attribute {
    type Error = ShapeError;

    fn try_from(value: Value) -> Result<Self, Self::Error> {
        Self::from_value(&value)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "Value")]
pub struct Entity {
    pub name: String,
    pub attributes: Vec<Attribute>,
}

impl Entity {
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            attributes: Vec::new(),
        }
    }

    #[must_use]
    pub fn with_attribute(mut self, attribute: Attribute) -> Self {
        self.attributes.push(attribute);
        self
    }

    #[must_use]
    pub fn attribute(&self, name: &str) -> Option<&Attribute> {
        self.attributes.iter().find(|a| a.name == name)
    }

    #[must_use]
    pub fn has_attribute(&self, name: &str) -> bool {
        self.attribute(name).is_some()
    }

    #[must_use]
    pub fn key_count(&self) -> usize {
        self.attributes.iter().filter(|a| a.is_key).count()
    }

    /// Parses one entity. Attributes that fail their own shape test are
    /// dropped rather than failing the entity.
    pub fn from_value(value: &Value) -> ShapeResult<Self> {
        let obj = as_object(value)?;
        let name = obj
            .get("name")
            .and_then(Value::as_str)
            .ok_or(ShapeError::MissingName)?;

        let attributes = match obj.get("attributes") {
            None | Some(Value::Null) => Vec::new(),
            Some(Value::Array(items)) => items
                .iter()
                .filter_map(|item| match Attribute::from_value(item) {
                    Ok(attribute) => Some(attribute),
                    Err(e) => {
                        tracing::debug!("Dropping attribute of entity {}: {}", name, e);
                        None
                    }
                })
                .collect(),
            Some(_) => return Err(ShapeError::AttributesNotSequence(name.to_string())),
        };

        Ok(Self {
            name: name.to_string(),
            attributes,
        })
    }
}

impl TryFrom<Value> for Entity {
    type Error = ShapeError;

    fn try_from(value: Value) -> Result<Self, Self::Error> {
        Self::from_value(&value)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "Value")]
pub struct Schema {
    pub name: String,
    pub version: String,
    pub entities: Vec<Entity>,
}

impl Schema {
    #[must_use]
    pub fn new(name: impl Into<String>, version: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            version: version.into(),
            entities: Vec::new(),
        }
    }

    /// An empty schema carrying the default name and version.
    #[must_use]
    pub fn empty() -> Self {
        Self::new(DEFAULT_SCHEMA_NAME, DEFAULT_SCHEMA_VERSION)
    }

    #[must_use]
    pub fn with_entity(mut self, entity: Entity) -> Self {
        self.entities.push(entity);
        self
    }

    #[must_use]
    pub fn entity(&self, name: &str) -> Option<&Entity> {
        self.entities.iter().find(|e| e.name == name)
    }

    #[must_use]
    pub fn entity_names(&self) -> Vec<&str> {
        self.entities.iter().map(|e| e.name.as_str()).collect()
    }

    /// The schema shape test: an object whose `entities` is a sequence.
    ///
    /// Entities without a name are dropped. Name and version are kept as
    /// found (possibly empty); defaults are applied by the merge engine.
    pub fn from_value(value: &Value) -> ShapeResult<Self> {
        let obj = as_object(value)?;
        let Some(Value::Array(items)) = obj.get("entities") else {
            return Err(ShapeError::EntitiesNotSequence);
        };

        let entities = items
            .iter()
            .filter_map(|item| match Entity::from_value(item) {
                Ok(entity) => Some(entity),
                Err(e) => {
                    tracing::debug!("Dropping entity: {}", e);
                    None
                }
            })
            .collect();

        Ok(Self {
            name: string_field(obj, "name"),
            version: string_field(obj, "version"),
            entities,
        })
    }

    /// Parses JSON text into a schema, normalizing flag spellings.
    pub fn from_json(text: &str) -> crate::Result<Self> {
        let value: Value = serde_json::from_str(text)?;
        Ok(Self::from_value(&value)?)
    }

    pub fn to_value(&self) -> serde_json::Result<Value> {
        serde_json::to_value(self)
    }

    pub fn to_pretty_json(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }

    /// Reports name collisions and multi-key entities without rejecting
    /// them. Renames are permissive, so consumers check this on export.
    #[must_use]
    pub fn validate(&self) -> Vec<ValidationIssue> {
        let mut issues = Vec::new();
        let mut seen_entities = HashSet::new();

        for entity in &self.entities {
            if !seen_entities.insert(entity.name.as_str()) {
                issues.push(ValidationIssue::DuplicateEntity {
                    entity: entity.name.clone(),
                });
            }

            let mut counts: HashMap<&str, usize> = HashMap::new();
            for attribute in &entity.attributes {
                let count = counts.entry(attribute.name.as_str()).or_default();
                *count += 1;
                if *count == 2 {
                    issues.push(ValidationIssue::DuplicateAttribute {
                        entity: entity.name.clone(),
                        attribute: attribute.name.clone(),
                    });
                }
            }

            let keys = entity.key_count();
            if keys > 1 {
                issues.push(ValidationIssue::MultipleKeys {
                    entity: entity.name.clone(),
                    count: keys,
                });
            }
        }

        issues
    }
}

impl TryFrom<Value> for Schema {
    type Error = ShapeError;

    fn try_from(value: Value) -> Result<Self, Self::Error> {
        Self::from_value(&value)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ValidationIssue {
    DuplicateEntity { entity: String },
    DuplicateAttribute { entity: String, attribute: String },
    MultipleKeys { entity: String, count: usize },
}

impl std::fmt::Display for ValidationIssue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::DuplicateEntity { entity } => write!(f, "duplicate entity name {entity:?}"),
            Self::DuplicateAttribute { entity, attribute } => {
                write!(f, "duplicate attribute {attribute:?} on entity {entity:?}")
            }
            Self::MultipleKeys { entity, count } => {
                write!(f, "entity {entity:?} has {count} key attributes")
            }
        }
    }
}
