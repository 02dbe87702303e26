use serde::{Deserialize, Serialize};

/// A view. The definition is opaque SQL, stored and replayed as written.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct View {
    pub schema_name: Option<String>,
    pub view_name: String,
    /// The `SELECT` the view is defined as (without `CREATE VIEW ... AS`)
    pub definition: String,
}

impl View {
    pub fn new(view_name: impl Into<String>, definition: impl Into<String>) -> Self {
        Self {
            schema_name: None,
            view_name: view_name.into(),
            definition: definition.into(),
        }
    }

    pub fn in_schema(mut self, schema_name: Option<&str>) -> Self {
        self.schema_name = schema_name.map(str::to_string);
        self
    }
}
