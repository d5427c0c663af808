use crate::edit::{Edit, SchemaEditor};
use crate::schema::Schema;

/// The one schema a session is working on. A new import replaces it
/// wholesale; there is no history.
#[derive(Debug, Default)]
pub struct SchemaSlot {
    editor: Option<SchemaEditor>,
    generation: u64,
}

impl SchemaSlot {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Installs `schema` as the current one, resetting the selection.
    pub fn replace(&mut self, schema: Schema) {
        self.editor = Some(SchemaEditor::new(schema));
        self.generation += 1;
    }

    pub fn clear(&mut self) {
        self.editor = None;
        self.generation += 1;
    }

    #[must_use]
    pub fn current(&self) -> Option<&Schema> {
        self.editor.as_ref().map(SchemaEditor::schema)
    }

    #[must_use]
    pub fn editor(&self) -> Option<&SchemaEditor> {
        self.editor.as_ref()
    }

    pub fn editor_mut(&mut self) -> Option<&mut SchemaEditor> {
        self.editor.as_mut()
    }

    /// Applies an edit to the current schema. `None` when the slot is empty.
    pub fn apply(&mut self, edit: &Edit) -> Option<bool> {
        let applied = self.editor.as_mut()?.apply(edit);
        if applied {
            self.generation += 1;
        }
        Some(applied)
    }

    /// Bumped on every change, so readers can tell a stale copy.
    #[must_use]
    pub fn generation(&self) -> u64 {
        self.generation
    }
}
