//! Schema edit model.
//!
//! Each [`Edit`] is applied as a pure transform: [`apply`] reads the
//! current schema and returns a fresh one, so nobody ever observes a
//! half-applied change. [`SchemaEditor`] layers the entity selection on
//! top and keeps it in bounds.

use serde::{Deserialize, Serialize};

use crate::schema::{Attribute, AttributeType, Entity, Schema};

pub const DEFAULT_ENTITY_NAME: &str = "Entity";
pub const DEFAULT_ATTRIBUTE_NAME: &str = "field";
pub const DEFAULT_KEY_NAME: &str = "id";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum Edit {
    AddEntity,
    RemoveEntity {
        entity: usize,
    },
    RenameEntity {
        entity: usize,
        name: String,
    },
    AddAttribute {
        entity: usize,
    },
    RemoveAttribute {
        entity: usize,
        attribute: usize,
    },
    RenameAttribute {
        entity: usize,
        attribute: usize,
        name: String,
    },
    SetAttributeType {
        entity: usize,
        attribute: usize,
        #[serde(rename = "type")]
        attr_type: AttributeType,
    },
    SetMultiValue {
        entity: usize,
        attribute: usize,
        multi_value: bool,
    },
    SetKey {
        entity: usize,
        attribute: usize,
        is_key: bool,
    },
}

/// Appends ` 2`, ` 3`, … to `base` until `taken` no longer matches.
#[must_use]
pub fn unique_name(base: &str, taken: impl Fn(&str) -> bool) -> String {
    if !taken(base) {
        return base.to_string();
    }
    (2..)
        .map(|n| format!("{base} {n}"))
        .find(|candidate| !taken(candidate))
        .unwrap_or_else(|| base.to_string())
}

fn non_blank(name: &str, default: &str) -> String {
    if name.trim().is_empty() {
        default.to_string()
    } else {
        name.to_string()
    }
}

/// Applies one edit, returning the new schema, or `None` when the edit
/// targets an entity or attribute that does not exist.
///
/// Renames do not check for collisions with siblings; see
/// [`Schema::validate`] for the report consumers run before export.
#[must_use]
pub fn apply(schema: &Schema, edit: &Edit) -> Option<Schema> {
    let mut next = schema.clone();

    match edit {
        Edit::AddEntity => {
            let name = unique_name(DEFAULT_ENTITY_NAME, |n| schema.entity(n).is_some());
            next.entities
                .push(Entity::new(name).with_attribute(Attribute::key(DEFAULT_KEY_NAME)));
        }
        Edit::RemoveEntity { entity } => {
            if *entity >= next.entities.len() {
                return None;
            }
            next.entities.remove(*entity);
        }
        Edit::RenameEntity { entity, name } => {
            next.entities.get_mut(*entity)?.name = non_blank(name, DEFAULT_ENTITY_NAME);
        }
        Edit::AddAttribute { entity } => {
            let target = next.entities.get_mut(*entity)?;
            let name = unique_name(DEFAULT_ATTRIBUTE_NAME, |n| target.has_attribute(n));
            target
                .attributes
                .push(Attribute::new(name, AttributeType::String));
        }
        Edit::RemoveAttribute { entity, attribute } => {
            let target = next.entities.get_mut(*entity)?;
            if *attribute >= target.attributes.len() {
                return None;
            }
            target.attributes.remove(*attribute);
        }
        Edit::RenameAttribute {
            entity,
            attribute,
            name,
        } => {
            attribute_mut(&mut next, *entity, *attribute)?.name =
                non_blank(name, DEFAULT_ATTRIBUTE_NAME);
        }
        Edit::SetAttributeType {
            entity,
            attribute,
            attr_type,
        } => {
            attribute_mut(&mut next, *entity, *attribute)?.attr_type = *attr_type;
        }
        Edit::SetMultiValue {
            entity,
            attribute,
            multi_value,
        } => {
            attribute_mut(&mut next, *entity, *attribute)?.multi_value = *multi_value;
        }
        Edit::SetKey {
            entity,
            attribute,
            is_key,
        } => {
            let target = next.entities.get_mut(*entity)?;
            if *attribute >= target.attributes.len() {
                return None;
            }
            // Setting a key clears every other key of the entity in the
            // same step, keeping at most one.
            for (idx, attr) in target.attributes.iter_mut().enumerate() {
                if idx == *attribute {
                    attr.is_key = *is_key;
                } else if *is_key {
                    attr.is_key = false;
                }
            }
        }
    }

    Some(next)
}

fn attribute_mut(schema: &mut Schema, entity: usize, attribute: usize) -> Option<&mut Attribute> {
    schema
        .entities
        .get_mut(entity)?
        .attributes
        .get_mut(attribute)
}

/// Holds the schema being edited and which entity is selected.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SchemaEditor {
    schema: Schema,
    selected: usize,
}

impl SchemaEditor {
    #[must_use]
    pub fn new(schema: Schema) -> Self {
        Self {
            schema,
            selected: 0,
        }
    }

    /// Loads a saved document. Legacy flag spellings are normalized away.
    pub fn from_json(text: &str) -> crate::Result<Self> {
        Ok(Self::new(Schema::from_json(text)?))
    }

    #[must_use]
    pub fn schema(&self) -> &Schema {
        &self.schema
    }

    #[must_use]
    pub fn into_schema(self) -> Schema {
        self.schema
    }

    #[must_use]
    pub fn selected(&self) -> usize {
        self.selected
    }

    #[must_use]
    pub fn selected_entity(&self) -> Option<&Entity> {
        self.schema.entities.get(self.selected)
    }

    pub fn select(&mut self, index: usize) -> bool {
        if index < self.schema.entities.len() {
            self.selected = index;
            true
        } else {
            false
        }
    }

    /// Applies `edit`. Returns `false`, leaving everything untouched, when
    /// the edit targets something out of range.
    pub fn apply(&mut self, edit: &Edit) -> bool {
        let Some(next) = apply(&self.schema, edit) else {
            return false;
        };
        self.schema = next;

        match edit {
            Edit::AddEntity => self.selected = self.schema.entities.len() - 1,
            Edit::RemoveEntity { .. } => {
                self.selected = self
                    .selected
                    .min(self.schema.entities.len().saturating_sub(1));
            }
            _ => {}
        }
        true
    }

    pub fn to_pretty_json(&self) -> serde_json::Result<String> {
        self.schema.to_pretty_json()
    }
}

impl Default for SchemaEditor {
    fn default() -> Self {
        Self::new(Schema::empty())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn three_entities() -> SchemaEditor {
        let mut editor = SchemaEditor::default();
        for _ in 0..3 {
            editor.apply(&Edit::AddEntity);
        }
        editor
    }

    fn user_editor() -> SchemaEditor {
        SchemaEditor::new(
            Schema::empty().with_entity(
                Entity::new("User")
                    .with_attribute(Attribute::key("id"))
                    .with_attribute(Attribute::new("userName", AttributeType::String))
                    .with_attribute(Attribute::new("email", AttributeType::String)),
            ),
        )
    }

    #[test]
    fn test_add_entity_names_are_unique() {
        let editor = three_entities();
        assert_eq!(
            editor.schema().entity_names(),
            vec!["Entity", "Entity 2", "Entity 3"]
        );
        let seeded = &editor.schema().entities[0];
        assert_eq!(seeded.attributes.len(), 1);
        assert_eq!(seeded.attributes[0].name, "id");
        assert!(seeded.attributes[0].is_key);
        assert_eq!(editor.selected(), 2);
    }

    #[test]
    fn test_add_entity_fills_gaps() {
        let schema = Schema::empty()
            .with_entity(Entity::new("Entity"))
            .with_entity(Entity::new("Entity 3"));
        let next = apply(&schema, &Edit::AddEntity).unwrap();
        assert_eq!(next.entities[2].name, "Entity 2");
    }

    #[test]
    fn test_remove_last_entity_resets_selection() {
        let mut editor = SchemaEditor::default();
        editor.apply(&Edit::AddEntity);

        assert!(editor.apply(&Edit::RemoveEntity { entity: 0 }));
        assert!(editor.schema().entities.is_empty());
        assert_eq!(editor.selected(), 0);
        assert!(editor.selected_entity().is_none());
    }

    #[test]
    fn test_remove_middle_entity_clamps_selection() {
        let mut editor = three_entities();
        assert_eq!(editor.selected(), 2);

        assert!(editor.apply(&Edit::RemoveEntity { entity: 1 }));
        assert_eq!(editor.schema().entity_names(), vec!["Entity", "Entity 3"]);
        assert!(editor.selected() <= 1);
        assert!(editor.selected_entity().is_some());
    }

    #[test]
    fn test_remove_out_of_range_is_noop() {
        let mut editor = three_entities();
        let before = editor.clone();

        assert!(!editor.apply(&Edit::RemoveEntity { entity: 3 }));
        assert_eq!(editor, before);
    }

    #[test]
    fn test_blank_renames_use_defaults() {
        let mut editor = user_editor();

        editor.apply(&Edit::RenameEntity {
            entity: 0,
            name: "   ".into(),
        });
        assert_eq!(editor.schema().entities[0].name, DEFAULT_ENTITY_NAME);

        editor.apply(&Edit::RenameAttribute {
            entity: 0,
            attribute: 1,
            name: String::new(),
        });
        assert_eq!(
            editor.schema().entities[0].attributes[1].name,
            DEFAULT_ATTRIBUTE_NAME
        );
    }

    #[test]
    fn test_rename_allows_duplicates() {
        let mut editor = user_editor();
        editor.apply(&Edit::RenameAttribute {
            entity: 0,
            attribute: 2,
            name: "userName".into(),
        });

        assert_eq!(editor.schema().validate().len(), 1);
    }

    #[test]
    fn test_set_key_keeps_single_key() {
        let mut editor = user_editor();
        let key_count = |e: &SchemaEditor| e.schema().entities[0].key_count();

        editor.apply(&Edit::SetKey {
            entity: 0,
            attribute: 2,
            is_key: true,
        });
        assert_eq!(key_count(&editor), 1);
        assert!(editor.schema().entities[0].attributes[2].is_key);

        editor.apply(&Edit::SetKey {
            entity: 0,
            attribute: 1,
            is_key: true,
        });
        assert_eq!(key_count(&editor), 1);
        assert!(editor.schema().entities[0].attributes[1].is_key);

        editor.apply(&Edit::SetKey {
            entity: 0,
            attribute: 1,
            is_key: false,
        });
        assert_eq!(key_count(&editor), 0);
    }

    #[test]
    fn test_toggle_sequence_never_exceeds_one_key() {
        let mut editor = user_editor();
        let toggles = [(0, true), (1, true), (2, false), (2, true), (0, true), (0, false), (1, true)];

        for (attribute, is_key) in toggles {
            editor.apply(&Edit::SetKey {
                entity: 0,
                attribute,
                is_key,
            });
            assert!(editor.schema().entities[0].key_count() <= 1);
        }
    }

    #[test]
    fn test_attribute_crud_preserves_order() {
        let mut editor = user_editor();

        editor.apply(&Edit::AddAttribute { entity: 0 });
        editor.apply(&Edit::AddAttribute { entity: 0 });
        editor.apply(&Edit::RemoveAttribute {
            entity: 0,
            attribute: 1,
        });
        editor.apply(&Edit::SetAttributeType {
            entity: 0,
            attribute: 2,
            attr_type: AttributeType::Int,
        });
        editor.apply(&Edit::SetMultiValue {
            entity: 0,
            attribute: 3,
            multi_value: true,
        });

        let attrs = &editor.schema().entities[0].attributes;
        let names: Vec<&str> = attrs.iter().map(|a| a.name.as_str()).collect();
        assert_eq!(names, vec!["id", "email", "field", "field 2"]);
        assert_eq!(attrs[2].attr_type, AttributeType::Int);
        assert!(attrs[3].multi_value);
    }

    #[test]
    fn test_edit_returns_new_value() {
        let original = user_editor().into_schema();
        let next = apply(
            &original,
            &Edit::RemoveAttribute {
                entity: 0,
                attribute: 0,
            },
        )
        .unwrap();

        assert_eq!(original.entities[0].attributes.len(), 3);
        assert_eq!(next.entities[0].attributes.len(), 2);
    }

    #[test]
    fn test_out_of_range_attribute_edits() {
        let schema = user_editor().into_schema();
        assert!(apply(&schema, &Edit::AddAttribute { entity: 9 }).is_none());
        assert!(apply(
            &schema,
            &Edit::SetKey {
                entity: 0,
                attribute: 9,
                is_key: true
            }
        )
        .is_none());
        assert!(apply(
            &schema,
            &Edit::RenameAttribute {
                entity: 0,
                attribute: 3,
                name: "x".into()
            }
        )
        .is_none());
    }

    #[test]
    fn test_edit_deserializes_from_tagged_json() {
        let edit: Edit =
            serde_json::from_str(r#"{"op":"set_key","entity":0,"attribute":1,"is_key":true}"#)
                .unwrap();
        assert_eq!(
            edit,
            Edit::SetKey {
                entity: 0,
                attribute: 1,
                is_key: true
            }
        );
    }

    #[test]
    fn test_load_normalizes_legacy_spelling() {
        let editor = SchemaEditor::from_json(
            r#"{"name":"C","version":"1","entities":[{"name":"User","attributes":[{"name":"id","type":"String","isKey":true}]}]}"#,
        )
        .unwrap();

        let json = editor.to_pretty_json().unwrap();
        assert!(json.contains("\"IsKey\": true"));
        assert!(!json.contains("isKey"));
    }
}
