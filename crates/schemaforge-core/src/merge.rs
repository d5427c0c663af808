//! Schema merge engine.
//!
//! Entities are matched by exact name and attributes by exact name within
//! an entity. The first document to introduce a name wins: later
//! definitions of the same attribute are dropped even when their type or
//! flags differ, so input order decides ties.

use std::collections::{HashMap, HashSet};

use serde::Serialize;
use serde_json::Value;

use crate::job::ResultPayload;
use crate::schema::{Schema, ShapeError, DEFAULT_SCHEMA_NAME, DEFAULT_SCHEMA_VERSION};

#[derive(Debug, Clone, Default)]
pub struct MergeReport {
    pub schema: Schema,
    pub discarded: Vec<ShapeError>,
}

impl MergeReport {
    #[must_use]
    pub fn discarded_count(&self) -> usize {
        self.discarded.len()
    }
}

/// Validates every raw document, expanding arrays into their elements.
///
/// Elements failing the shape test are returned separately, never fatal.
#[must_use]
pub fn parse_documents(documents: &[Value]) -> (Vec<Schema>, Vec<ShapeError>) {
    let mut schemas = Vec::new();
    let mut discarded = Vec::new();

    let elements = documents.iter().flat_map(|doc| match doc {
        Value::Array(items) => items.iter().collect::<Vec<_>>(),
        other => vec![other],
    });

    for element in elements {
        match Schema::from_value(element) {
            Ok(schema) => schemas.push(schema),
            Err(e) => {
                tracing::debug!("Discarding merge input: {}", e);
                discarded.push(e);
            }
        }
    }

    (schemas, discarded)
}

#[must_use]
pub fn merge(documents: &[Value]) -> Schema {
    merge_with_report(documents).schema
}

#[must_use]
pub fn merge_with_report(documents: &[Value]) -> MergeReport {
    let (schemas, discarded) = parse_documents(documents);
    MergeReport {
        schema: merge_schemas(&schemas),
        discarded,
    }
}

/// Merges already-validated schemas. Attributes are cloned out of the
/// inputs, so the result never aliases a source document.
#[must_use]
pub fn merge_schemas(schemas: &[Schema]) -> Schema {
    let name = first_non_empty(schemas.iter().map(|s| s.name.as_str()), DEFAULT_SCHEMA_NAME);
    let version = first_non_empty(
        schemas.iter().map(|s| s.version.as_str()),
        DEFAULT_SCHEMA_VERSION,
    );

    let mut merged = Schema::new(name, version);
    let mut entity_index: HashMap<String, usize> = HashMap::new();
    let mut attribute_names: Vec<HashSet<String>> = Vec::new();

    for entity in schemas.iter().flat_map(|s| &s.entities) {
        let idx = *entity_index.entry(entity.name.clone()).or_insert_with(|| {
            merged
                .entities
                .push(crate::schema::Entity::new(entity.name.clone()));
            attribute_names.push(HashSet::new());
            merged.entities.len() - 1
        });

        let target = &mut merged.entities[idx];
        let seen = &mut attribute_names[idx];

        for attribute in &entity.attributes {
            if seen.insert(attribute.name.clone()) {
                target.attributes.push(attribute.clone());
            } else {
                tracing::debug!(
                    "Dropping duplicate attribute {}.{}",
                    entity.name,
                    attribute.name
                );
            }
        }
    }

    merged
}

fn first_non_empty<'a>(mut values: impl Iterator<Item = &'a str>, default: &str) -> String {
    values
        .find(|v| !v.trim().is_empty())
        .unwrap_or(default)
        .to_string()
}

/// Outcome of turning a completed job's payload into a schema.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum SchemaPayload {
    Parsed { schema: Schema, discarded: usize },
    /// The payload was not valid JSON. The raw text is kept so the user
    /// can inspect and repair it by hand.
    Unparsed { raw: String, error: String },
}

impl SchemaPayload {
    #[must_use]
    pub fn schema(&self) -> Option<&Schema> {
        match self {
            Self::Parsed { schema, .. } => Some(schema),
            Self::Unparsed { .. } => None,
        }
    }

    #[must_use]
    pub fn into_schema(self) -> Option<Schema> {
        match self {
            Self::Parsed { schema, .. } => Some(schema),
            Self::Unparsed { .. } => None,
        }
    }
}

impl From<MergeReport> for SchemaPayload {
    fn from(report: MergeReport) -> Self {
        Self::Parsed {
            discarded: report.discarded_count(),
            schema: report.schema,
        }
    }
}

/// Feeds a result payload to the merge engine. Text payloads are parsed
/// as JSON first; a JSON string holding JSON text is unwrapped once.
#[must_use]
pub fn interpret_payload(payload: &ResultPayload) -> SchemaPayload {
    let value = match payload {
        ResultPayload::Json(Value::String(text)) | ResultPayload::Text(text) => {
            match serde_json::from_str::<Value>(text) {
                Ok(Value::String(inner)) => match serde_json::from_str::<Value>(&inner) {
                    Ok(value) => value,
                    Err(e) => {
                        return SchemaPayload::Unparsed {
                            raw: inner,
                            error: e.to_string(),
                        }
                    }
                },
                Ok(value) => value,
                Err(e) => {
                    return SchemaPayload::Unparsed {
                        raw: text.clone(),
                        error: e.to_string(),
                    }
                }
            }
        }
        ResultPayload::Json(value) => value.clone(),
    };

    merge_with_report(std::slice::from_ref(&value)).into()
}
