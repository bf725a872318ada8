use std::fmt;
use std::sync::Arc;

use serde_json::Value as JsonValue;
use tracing::{debug, info};

use crate::domain::ViewerError;

const CATEGORIES_JSON: &str = include_str!("../assets/categories.json");
const EMPLOYEES_JSON: &str = include_str!("../assets/employees.json");
const PRODUCTS_JSON: &str = include_str!("../assets/products.json");

/// A single scalar cell of a result set.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    Text(String),
}

impl Value {
    fn from_json(value: &JsonValue) -> Self {
        match value {
            JsonValue::Null => Value::Null,
            JsonValue::Bool(b) => Value::Bool(*b),
            JsonValue::Number(n) => match n.as_i64() {
                Some(i) => Value::Int(i),
                None => Value::Float(n.as_f64().unwrap_or(f64::NAN)),
            },
            JsonValue::String(s) => Value::Text(s.clone()),
            // Nested values are kept as their json text
            other => Value::Text(other.to_string()),
        }
    }

    /// Text used for width estimation and export, Null renders as nothing.
    pub fn cell_text(&self) -> String {
        match self {
            Value::Null => String::new(),
            v => v.to_string(),
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => write!(f, "null"),
            Value::Bool(b) => write!(f, "{b}"),
            Value::Int(i) => write!(f, "{i}"),
            Value::Float(x) => write!(f, "{x}"),
            Value::Text(s) => write!(f, "{s}"),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Row {
    pub values: Vec<Value>,
}

impl Row {
    pub fn get(&self, column: usize) -> Option<&Value> {
        self.values.get(column)
    }
}

/// Ordered rows sharing a single column schema.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ResultSet {
    columns: Arc<Vec<String>>,
    rows: Vec<Row>,
}

impl ResultSet {
    pub fn new(columns: Vec<String>, rows: Vec<Row>) -> Self {
        Self {
            columns: Arc::new(columns),
            rows,
        }
    }

    pub fn empty() -> Self {
        Self::default()
    }

    /// Builds a result set from json records. The column list is taken from the
    /// keys of the first record, keys missing in later records become Null.
    pub fn from_json_records(records: &[JsonValue]) -> Result<Self, ViewerError> {
        let columns: Vec<String> = match records.first() {
            Some(JsonValue::Object(first)) => first.keys().cloned().collect(),
            Some(_) => {
                return Err(ViewerError::LoadingFailed(
                    "Records have to be json objects!".into(),
                ));
            }
            None => Vec::new(),
        };

        let mut rows = Vec::with_capacity(records.len());
        for record in records {
            let object = record.as_object().ok_or_else(|| {
                ViewerError::LoadingFailed("Records have to be json objects!".into())
            })?;
            let values = columns
                .iter()
                .map(|c| object.get(c).map(Value::from_json).unwrap_or(Value::Null))
                .collect();
            rows.push(Row { values });
        }
        Ok(Self::new(columns, rows))
    }

    pub fn columns(&self) -> &[String] {
        self.columns.as_slice()
    }

    pub fn rows(&self) -> &[Row] {
        &self.rows
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|c| c == name)
    }

    /// Keeps the rows for which `keep` returns true, sharing the column schema.
    pub fn retain_rows(&self, keep: impl Fn(&Row) -> bool) -> Self {
        Self {
            columns: Arc::clone(&self.columns),
            rows: self.rows.iter().filter(|r| keep(r)).cloned().collect(),
        }
    }

    /// One row per column, used for the "columns only" display.
    pub fn columns_view(&self) -> Self {
        if self.is_empty() {
            return Self::empty();
        }
        let rows = self
            .columns
            .iter()
            .map(|c| Row {
                values: vec![Value::Text(c.clone())],
            })
            .collect();
        Self::new(vec!["columnName".to_string()], rows)
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum TableName {
    Categories,
    Employees,
    Products,
}

impl TableName {
    /// Lookup order used when resolving a table from query text.
    pub const ALL: [TableName; 3] = [
        TableName::Categories,
        TableName::Employees,
        TableName::Products,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            TableName::Categories => "categories",
            TableName::Employees => "employees",
            TableName::Products => "products",
        }
    }
}

/// The static tables queries are answered from. Loaded once and never mutated.
#[derive(Debug)]
pub struct Datasets {
    categories: ResultSet,
    employees: ResultSet,
    products: ResultSet,
}

impl Datasets {
    pub fn load() -> Result<Arc<Self>, ViewerError> {
        let datasets = Self {
            categories: Self::parse(CATEGORIES_JSON, TableName::Categories)?,
            employees: Self::parse(EMPLOYEES_JSON, TableName::Employees)?,
            products: Self::parse(PRODUCTS_JSON, TableName::Products)?,
        };
        info!(
            "Loaded datasets: categories {}, employees {}, products {}",
            datasets.categories.len(),
            datasets.employees.len(),
            datasets.products.len()
        );
        Ok(Arc::new(datasets))
    }

    fn parse(json: &str, table: TableName) -> Result<ResultSet, ViewerError> {
        let document: JsonValue = serde_json::from_str(json)?;
        let records = document
            .get(table.as_str())
            .and_then(|r| r.as_array())
            .ok_or_else(|| {
                ViewerError::LoadingFailed(format!("Missing \"{}\" records", table.as_str()))
            })?;
        let result = ResultSet::from_json_records(records)?;
        debug!("Table {}: columns {:?}", table.as_str(), result.columns());
        Ok(result)
    }

    pub fn table(&self, table: TableName) -> &ResultSet {
        match table {
            TableName::Categories => &self.categories,
            TableName::Employees => &self.employees,
            TableName::Products => &self.products,
        }
    }
}
