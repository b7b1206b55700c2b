//! Fetched row buffer.

use crate::value::Value;
use std::collections::HashMap;
use std::sync::Arc;

/// Column names shared by every row of one result set.
#[derive(Debug, Clone, Default)]
pub struct ColumnInfo {
    names: Vec<String>,
    name_to_index: HashMap<String, usize>,
}

impl ColumnInfo {
    /// Build the lookup table for `names`.
    pub fn new(names: Vec<String>) -> Self {
        let name_to_index = names
            .iter()
            .enumerate()
            .map(|(i, name)| (name.clone(), i))
            .collect();
        Self {
            names,
            name_to_index,
        }
    }

    /// Number of columns.
    pub fn len(&self) -> usize {
        self.names.len()
    }

    /// True when the result has no columns.
    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }

    /// Position of `name`; the last column wins when names repeat.
    pub fn index_of(&self, name: &str) -> Option<usize> {
        self.name_to_index.get(name).copied()
    }

    /// Name of the column at `index`.
    pub fn name_at(&self, index: usize) -> Option<&str> {
        self.names.get(index).map(String::as_str)
    }

    /// All column names in order.
    pub fn names(&self) -> &[String] {
        &self.names
    }
}

/// The caller-visible row buffer.
///
/// A statement keeps one `Row` and refills it on every fetch. When a
/// multi-result execution switches to a result set with a different
/// width, the value vector is resized in place instead of replaced.
#[derive(Debug, Clone, Default)]
pub struct Row {
    values: Vec<Value>,
    columns: Arc<ColumnInfo>,
}

impl Row {
    /// Create a row with the given columns and values.
    pub fn new(column_names: Vec<String>, values: Vec<Value>) -> Self {
        Self {
            values,
            columns: Arc::new(ColumnInfo::new(column_names)),
        }
    }

    /// Create a row that shares an existing column description.
    pub fn with_columns(columns: Arc<ColumnInfo>, values: Vec<Value>) -> Self {
        Self { values, columns }
    }

    /// The shared column description.
    pub fn column_info(&self) -> Arc<ColumnInfo> {
        Arc::clone(&self.columns)
    }

    /// Number of values in the row.
    pub fn len(&self) -> usize {
        self.values.len()
    }

    /// True when the row holds no values.
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Get a value by column index.
    pub fn get(&self, index: usize) -> Option<&Value> {
        self.values.get(index)
    }

    /// Get a value by column name.
    pub fn get_by_name(&self, name: &str) -> Option<&Value> {
        self.columns.index_of(name).and_then(|i| self.values.get(i))
    }

    /// Column names in order.
    pub fn column_names(&self) -> impl Iterator<Item = &str> {
        self.columns.names().iter().map(String::as_str)
    }

    /// Values in column order.
    pub fn values(&self) -> impl Iterator<Item = &Value> {
        self.values.iter()
    }

    /// `(name, value)` pairs in column order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.column_names().zip(self.values())
    }

    /// Adopt a new column description, growing or shrinking the value
    /// storage to match. The allocation is kept when possible.
    pub fn reshape(&mut self, columns: Arc<ColumnInfo>) {
        if !Arc::ptr_eq(&self.columns, &columns) {
            self.values.resize(columns.len(), Value::Null);
            self.columns = columns;
        }
    }

    /// Mutable access to the values for refilling.
    pub fn values_mut(&mut self) -> &mut [Value] {
        &mut self.values
    }

    /// Move the values out, leaving the buffer empty.
    pub fn into_values(self) -> Vec<Value> {
        self.values
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn row_lookup_by_index_and_name() {
        let row = Row::new(
            vec!["id".to_string(), "name".to_string()],
            vec![Value::Int(1), Value::Text("Alice".to_string())],
        );

        assert_eq!(row.len(), 2);
        assert_eq!(row.get(0), Some(&Value::Int(1)));
        assert_eq!(row.get_by_name("name"), Some(&Value::Text("Alice".into())));
        assert_eq!(row.get_by_name("missing"), None);
        let pairs: Vec<_> = row.iter().collect();
        assert_eq!(pairs[0], ("id", &Value::Int(1)));
    }

    #[test]
    fn reshape_reuses_the_value_buffer() {
        let mut row = Row::default();
        let wide = Arc::new(ColumnInfo::new(vec!["a".into(), "b".into(), "c".into()]));
        row.reshape(Arc::clone(&wide));
        assert_eq!(row.len(), 3);
        row.values_mut()[2] = Value::Int(9);
        let ptr = row.values.as_ptr();

        let narrow = Arc::new(ColumnInfo::new(vec!["x".into()]));
        row.reshape(narrow);
        assert_eq!(row.len(), 1);
        assert_eq!(row.values.as_ptr(), ptr);
        assert_eq!(row.column_names().collect::<Vec<_>>(), vec!["x"]);
    }

    #[test]
    fn column_positions() {
        let info = ColumnInfo::new(vec!["a".into(), "b".into()]);
        assert_eq!(info.len(), 2);
        assert_eq!(info.index_of("b"), Some(1));
        assert_eq!(info.name_at(0), Some("a"));
        assert!(!info.is_empty());
    }
}
