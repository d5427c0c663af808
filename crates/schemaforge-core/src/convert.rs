//! Per-path converters: native documents in, canonical schemas out.

use std::collections::{HashMap, HashSet};

use serde_json::{Map, Value};

use crate::classify::BatchKind;
use crate::schema::{Attribute, AttributeType, Entity, Schema};
use crate::upload::UploadFile;

#[derive(Debug, thiserror::Error)]
pub enum ConvertError {
    #[error("No converter registered for {0} batches")]
    NoConverter(BatchKind),
    #[error("Conversion failed: {0}")]
    Failed(String),
}

pub type ConvertResult<T> = Result<T, ConvertError>;

#[async_trait::async_trait]
pub trait Converter: Send + Sync {
    fn kind(&self) -> BatchKind;

    /// Turns a batch into zero or more canonical documents.
    async fn convert(&self, files: &[UploadFile]) -> ConvertResult<Vec<Schema>>;
}

fn scim_type(raw: Option<&str>) -> AttributeType {
    match raw.map(str::to_ascii_lowercase).as_deref() {
        Some("integer" | "decimal") => AttributeType::Int,
        Some("boolean") => AttributeType::Bool,
        Some("datetime") => AttributeType::Datetime,
        _ => AttributeType::String,
    }
}

fn scim_attribute(value: &Value) -> Option<Attribute> {
    let obj = value.as_object()?;
    let name = obj.get("name")?.as_str()?;
    let multi_value = obj
        .get("multiValued")
        .and_then(Value::as_bool)
        .unwrap_or(false);

    Some(
        Attribute::new(name, scim_type(obj.get("type").and_then(Value::as_str)))
            .with_multi_value(multi_value),
    )
}

/// Marks `id` as the key, prepending it when the resource does not list
/// it. SCIM treats `id` as a common attribute, so schemas usually omit it.
fn ensure_key(entity: &mut Entity) {
    if entity.key_count() > 0 {
        return;
    }
    if let Some(id) = entity.attributes.iter_mut().find(|a| a.name == "id") {
        id.is_key = true;
    } else {
        entity.attributes.insert(0, Attribute::key("id"));
    }
}

/// Where a resource was read from. Orders by position in the batch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
struct Origin {
    position: usize,
    document: usize,
}

struct SchemaResource {
    id: String,
    name: String,
    attributes: Vec<Attribute>,
    origin: Origin,
}

struct ResourceType {
    name: String,
    schema: String,
    extensions: Vec<String>,
    origin: Origin,
}

#[derive(Default)]
struct ScimBatch {
    documents: usize,
    next_position: usize,
    schemas: Vec<SchemaResource>,
    resource_types: Vec<ResourceType>,
}

impl ScimBatch {
    fn add_document(&mut self, value: &Value) {
        let document = self.documents;
        self.documents += 1;
        self.collect(value, document);
    }

    fn collect(&mut self, value: &Value, document: usize) {
        match value {
            Value::Array(items) => items.iter().for_each(|item| self.collect(item, document)),
            Value::Object(obj) => {
                if let Some(Value::Array(resources)) = obj.get("Resources") {
                    resources.iter().for_each(|r| self.collect(r, document));
                } else {
                    self.collect_resource(obj, document);
                }
            }
            _ => {}
        }
    }

    fn origin(&mut self, document: usize) -> Origin {
        let position = self.next_position;
        self.next_position += 1;
        Origin { position, document }
    }

    fn collect_resource(&mut self, obj: &Map<String, Value>, document: usize) {
        let str_field = |field: &str| obj.get(field).and_then(Value::as_str).map(String::from);

        if let Some(Value::Array(attributes)) = obj.get("attributes") {
            let id = str_field("id").unwrap_or_default();
            let name = str_field("name")
                .filter(|n| !n.is_empty())
                .unwrap_or_else(|| id.rsplit(':').next().unwrap_or_default().to_string());

            let origin = self.origin(document);
            self.schemas.push(SchemaResource {
                id,
                name,
                attributes: attributes.iter().filter_map(scim_attribute).collect(),
                origin,
            });
        } else if obj.contains_key("schema") || obj.contains_key("schemaExtensions") {
            let extensions = obj
                .get("schemaExtensions")
                .and_then(Value::as_array)
                .map(|exts| {
                    exts.iter()
                        .filter_map(|e| e.get("schema").and_then(Value::as_str))
                        .map(String::from)
                        .collect()
                })
                .unwrap_or_default();

            let origin = self.origin(document);
            self.resource_types.push(ResourceType {
                name: str_field("name")
                    .or_else(|| str_field("id"))
                    .unwrap_or_default(),
                schema: str_field("schema").unwrap_or_default(),
                extensions,
                origin,
            });
        }
    }

    /// One schema per source document. An entity lands in the document
    /// that first introduced it: its resource type or the earliest schema
    /// resource it folds in. Resources sharing an id are folded in input
    /// order, so the first definition of an attribute wins.
    fn into_schemas(self) -> Vec<Schema> {
        let mut by_id: HashMap<&str, Vec<&SchemaResource>> = HashMap::new();
        for resource in &self.schemas {
            by_id.entry(resource.id.as_str()).or_default().push(resource);
        }

        let mut consumed: HashSet<&str> = HashSet::new();
        let mut placed: Vec<(Origin, Entity)> = Vec::new();

        for resource_type in &self.resource_types {
            if resource_type.name.is_empty() {
                continue;
            }
            let mut entity = Entity::new(resource_type.name.clone());
            let mut origin = resource_type.origin;

            let referenced = std::iter::once(&resource_type.schema).chain(&resource_type.extensions);
            for urn in referenced {
                for resource in by_id.get(urn.as_str()).into_iter().flatten() {
                    consumed.insert(resource.id.as_str());
                    origin = origin.min(resource.origin);
                    for attribute in &resource.attributes {
                        if !entity.has_attribute(&attribute.name) {
                            entity.attributes.push(attribute.clone());
                        }
                    }
                }
            }

            ensure_key(&mut entity);
            placed.push((origin, entity));
        }

        for resource in &self.schemas {
            if consumed.contains(resource.id.as_str()) || resource.name.is_empty() {
                continue;
            }
            let mut entity = Entity::new(resource.name.clone());
            entity.attributes = resource.attributes.clone();
            ensure_key(&mut entity);
            placed.push((resource.origin, entity));
        }

        placed.sort_by_key(|(origin, _)| *origin);

        let mut schemas: Vec<Schema> = (0..self.documents).map(|_| Schema::new("", "")).collect();
        for (origin, entity) in placed {
            schemas[origin.document].entities.push(entity);
        }
        schemas.retain(|s| !s.entities.is_empty());
        schemas
    }
}

/// Converts SCIM schema and resource-type resources into entities.
///
/// Resource types become entities carrying their core schema's attributes
/// followed by their extensions'. Schemas no resource type references
/// become entities of their own. Each source document yields its own
/// schema; merging them is left to [`merge_schemas`](crate::merge::merge_schemas).
#[derive(Debug, Default)]
pub struct ScimConverter;

impl ScimConverter {
    #[must_use]
    pub fn new() -> Self {
        Self
    }

    #[must_use]
    pub fn convert_values(&self, values: &[Value]) -> Vec<Schema> {
        let mut batch = ScimBatch::default();
        values.iter().for_each(|v| batch.add_document(v));
        batch.into_schemas()
    }
}

#[async_trait::async_trait]
impl Converter for ScimConverter {
    fn kind(&self) -> BatchKind {
        BatchKind::Scim
    }

    async fn convert(&self, files: &[UploadFile]) -> ConvertResult<Vec<Schema>> {
        let values: Vec<Value> = files
            .iter()
            .filter(|f| f.has_extension(&["json"]))
            .filter_map(|f| match serde_json::from_slice(&f.bytes) {
                Ok(value) => Some(value),
                Err(e) => {
                    tracing::debug!("Skipping {}: {}", f.name, e);
                    None
                }
            })
            .collect();

        Ok(self.convert_values(&values))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::merge::merge_schemas;
    use serde_json::json;

    fn user_schema() -> Value {
        json!({
            "id": "urn:ietf:params:scim:schemas:core:2.0:User",
            "name": "User",
            "attributes": [
                {"name": "userName", "type": "string", "multiValued": false},
                {"name": "active", "type": "boolean"},
                {"name": "emails", "type": "complex", "multiValued": true},
                {"name": "loginCount", "type": "integer"},
                {"name": "lastLogin", "type": "dateTime"}
            ]
        })
    }

    fn enterprise_schema() -> Value {
        json!({
            "id": "urn:ietf:params:scim:schemas:extension:enterprise:2.0:User",
            "attributes": [
                {"name": "employeeNumber", "type": "string"},
                {"name": "userName", "type": "integer"}
            ]
        })
    }

    fn names(entity: &Entity) -> Vec<&str> {
        entity.attributes.iter().map(|a| a.name.as_str()).collect()
    }

    #[test]
    fn test_schema_resource_becomes_entity() {
        let schemas = ScimConverter::new().convert_values(&[user_schema()]);
        let entity = &schemas[0].entities[0];

        assert_eq!(entity.name, "User");
        assert_eq!(
            names(entity),
            vec!["id", "userName", "active", "emails", "loginCount", "lastLogin"]
        );
        assert!(entity.attributes[0].is_key);
        assert_eq!(entity.attribute("active").unwrap().attr_type, AttributeType::Bool);
        assert!(entity.attribute("emails").unwrap().multi_value);
        assert_eq!(entity.attribute("loginCount").unwrap().attr_type, AttributeType::Int);
        assert_eq!(
            entity.attribute("lastLogin").unwrap().attr_type,
            AttributeType::Datetime
        );
    }

    #[test]
    fn test_resource_type_pulls_schema_and_extensions() {
        let envelope = json!({
            "Resources": [
                user_schema(),
                enterprise_schema(),
                {
                    "schemas": ["urn:ietf:params:scim:schemas:core:2.0:ResourceType"],
                    "id": "User",
                    "name": "Account",
                    "endpoint": "/Users",
                    "schema": "urn:ietf:params:scim:schemas:core:2.0:User",
                    "schemaExtensions": [{
                        "schema": "urn:ietf:params:scim:schemas:extension:enterprise:2.0:User",
                        "required": false
                    }]
                }
            ]
        });

        let schemas = ScimConverter::new().convert_values(&[envelope]);
        let entities = &schemas[0].entities;

        assert_eq!(entities.len(), 1);
        assert_eq!(entities[0].name, "Account");
        assert_eq!(
            names(&entities[0]),
            vec![
                "id",
                "userName",
                "active",
                "emails",
                "loginCount",
                "lastLogin",
                "employeeNumber"
            ]
        );
        assert_eq!(
            entities[0].attribute("userName").unwrap().attr_type,
            AttributeType::String
        );
    }

    #[test]
    fn test_unnamed_schema_uses_urn_suffix() {
        let schemas = ScimConverter::new().convert_values(&[json!([enterprise_schema()])]);
        assert_eq!(schemas[0].entities[0].name, "User");
    }

    #[test]
    fn test_existing_id_becomes_key() {
        let schema = json!({
            "id": "urn:x:Group",
            "name": "Group",
            "attributes": [{"name": "displayName"}, {"name": "id"}]
        });
        let schemas = ScimConverter::new().convert_values(&[schema]);
        let group = &schemas[0].entities[0];

        assert_eq!(names(group), vec!["displayName", "id"]);
        assert!(group.attribute("id").unwrap().is_key);
        assert_eq!(group.key_count(), 1);
    }

    fn user_resource_type() -> Value {
        json!({
            "schemas": ["urn:ietf:params:scim:schemas:core:2.0:ResourceType"],
            "id": "User",
            "name": "User",
            "schema": "urn:ietf:params:scim:schemas:core:2.0:User"
        })
    }

    #[test]
    fn test_shared_schema_id_keeps_first_definitions() {
        let first = json!({
            "id": "urn:ietf:params:scim:schemas:core:2.0:User",
            "name": "User",
            "attributes": [
                {"name": "userName", "type": "integer"},
                {"name": "nickName", "type": "string"}
            ]
        });
        let second = json!({"Resources": [
            {
                "id": "urn:ietf:params:scim:schemas:core:2.0:User",
                "name": "User",
                "attributes": [
                    {"name": "userName", "type": "string"},
                    {"name": "active", "type": "boolean"}
                ]
            },
            user_resource_type()
        ]});

        let schemas = ScimConverter::new().convert_values(&[first, second]);
        let merged = merge_schemas(&schemas);
        let user = merged.entity("User").unwrap();

        assert_eq!(names(user), vec!["id", "userName", "nickName", "active"]);
        assert_eq!(user.attribute("userName").unwrap().attr_type, AttributeType::Int);
        assert_eq!(user.key_count(), 1);
    }

    #[test]
    fn test_entities_follow_document_order() {
        let first = json!({
            "id": "urn:ietf:params:scim:schemas:core:2.0:Group",
            "name": "Group",
            "attributes": [{"name": "displayName", "type": "string"}]
        });
        let second = json!([user_schema(), user_resource_type()]);

        let schemas = ScimConverter::new().convert_values(&[first, second]);
        assert_eq!(schemas.len(), 2);
        assert_eq!(merge_schemas(&schemas).entity_names(), vec!["Group", "User"]);
    }

    #[test]
    fn test_resource_type_sits_with_its_earliest_schema() {
        let schemas_file = json!([
            user_schema(),
            {
                "id": "urn:ietf:params:scim:schemas:core:2.0:Group",
                "name": "Group",
                "attributes": [{"name": "displayName"}]
            }
        ]);
        let resource_types_file = json!({"Resources": [user_resource_type()]});

        let schemas = ScimConverter::new().convert_values(&[schemas_file, resource_types_file]);
        assert_eq!(schemas.len(), 1);
        assert_eq!(schemas[0].entity_names(), vec!["User", "Group"]);
        assert_eq!(schemas[0].entities[0].attributes.len(), 6);
    }

    #[tokio::test]
    async fn test_convert_skips_malformed_files() {
        let files = vec![
            UploadFile::new("bad.json", b"{".to_vec()),
            UploadFile::new("user.json", serde_json::to_vec(&user_schema()).unwrap()),
            UploadFile::new("notes.txt", b"ignored".to_vec()),
        ];
        let schemas = ScimConverter::new().convert(&files).await.unwrap();
        assert_eq!(schemas.len(), 1);
        assert_eq!(schemas[0].entity_names(), vec!["User"]);
    }

    #[tokio::test]
    async fn test_nothing_recognizable_yields_no_documents() {
        let files = vec![UploadFile::new("x.json", b"{\"hello\": 1}".to_vec())];
        assert!(ScimConverter::new().convert(&files).await.unwrap().is_empty());
    }
}
