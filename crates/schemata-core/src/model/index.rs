use super::{OrderedColumn, naming};
use serde::{Deserialize, Serialize};

/// Index information
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Index {
    pub schema_name: Option<String>,
    pub table_name: String,
    pub index_name: String,
    pub columns: Vec<OrderedColumn>,
    pub is_unique: bool,
}

impl Index {
    /// Non-unique index named `ix_{table}_{columns}` until renamed.
    pub fn new<C: Into<OrderedColumn>>(
        table_name: impl Into<String>,
        columns: impl IntoIterator<Item = C>,
    ) -> Self {
        let table_name = table_name.into();
        let columns: Vec<OrderedColumn> = columns.into_iter().map(Into::into).collect();
        let names: Vec<&str> = columns.iter().map(|c| c.column_name.as_str()).collect();
        Self {
            schema_name: None,
            index_name: naming::index(&table_name, &names),
            table_name,
            columns,
            is_unique: false,
        }
    }

    pub fn named(mut self, index_name: impl Into<String>) -> Self {
        self.index_name = index_name.into();
        self
    }

    pub fn in_schema(mut self, schema_name: Option<&str>) -> Self {
        self.schema_name = schema_name.map(str::to_string);
        self
    }

    pub fn unique(mut self) -> Self {
        self.is_unique = true;
        self
    }

    pub fn column_names(&self) -> Vec<&str> {
        self.columns.iter().map(|c| c.column_name.as_str()).collect()
    }

    /// Whether the index covers `column_name` at any position.
    pub fn covers(&self, column_name: &str) -> bool {
        self.columns
            .iter()
            .any(|c| c.column_name.eq_ignore_ascii_case(column_name))
    }
}
