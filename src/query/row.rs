//! Result rows and their shape.

use crate::engine::FieldMeta;
use crate::error::{ArgumentError, Result};
use crate::types::{FromValue, Nullability, TypeMapper, Value, ValueType};
use std::collections::HashMap;
use std::sync::Arc;

/// Descriptor of one result column.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColumnMetadata {
    name: String,
    index: usize,
    type_name: String,
    value_type: Option<ValueType>,
    precision: i32,
    scale: i32,
    nullability: Nullability,
}

impl ColumnMetadata {
    /// Build from engine field metadata at `index`.
    pub fn from_field(index: usize, field: &FieldMeta) -> Self {
        Self {
            name: field.name.clone(),
            index,
            type_name: field.type_name.clone(),
            value_type: TypeMapper::resolve(&field.type_name),
            precision: field.precision,
            scale: field.scale,
            nullability: Nullability::from_code(field.nullability),
        }
    }

    /// Column label.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Zero-based position.
    pub fn index(&self) -> usize {
        self.index
    }

    /// Type name as declared by the engine.
    pub fn type_name(&self) -> &str {
        &self.type_name
    }

    /// Resolved value type, `None` for type names the driver does not know.
    pub fn value_type(&self) -> Option<ValueType> {
        self.value_type
    }

    /// Precision or character length.
    pub fn precision(&self) -> i32 {
        self.precision
    }

    /// Scale.
    pub fn scale(&self) -> i32 {
        self.scale
    }

    /// Nullability.
    pub fn nullability(&self) -> Nullability {
        self.nullability
    }
}

/// Ordered column descriptors with name lookup.
///
/// Name lookup tries an exact match first and falls back to a case-insensitive
/// scan. When names repeat, the first declared column wins.
#[derive(Debug, Clone, Default)]
pub struct ColumnSource {
    columns: Vec<ColumnMetadata>,
    by_name: HashMap<String, usize>,
}

impl ColumnSource {
    /// Build from an ordered list of columns.
    pub fn new(columns: Vec<ColumnMetadata>) -> Self {
        let mut by_name = HashMap::with_capacity(columns.len());
        for (i, column) in columns.iter().enumerate() {
            by_name.entry(column.name.clone()).or_insert(i);
        }
        Self { columns, by_name }
    }

    /// Build from a cursor's field metadata.
    pub fn from_fields(fields: &[FieldMeta]) -> Self {
        Self::new(
            fields
                .iter()
                .enumerate()
                .map(|(i, field)| ColumnMetadata::from_field(i, field))
                .collect(),
        )
    }

    /// Number of columns.
    pub fn len(&self) -> usize {
        self.columns.len()
    }

    /// Whether there are no columns.
    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }

    /// All columns in declaration order.
    pub fn columns(&self) -> &[ColumnMetadata] {
        &self.columns
    }

    /// Column at `index`.
    pub fn column(&self, index: usize) -> Result<&ColumnMetadata, ArgumentError> {
        self.columns
            .get(index)
            .ok_or(ArgumentError::ColumnIndexOutOfRange {
                index,
                count: self.columns.len(),
            })
    }

    /// Position of the column called `name`.
    pub fn index_of(&self, name: &str) -> Result<usize, ArgumentError> {
        if let Some(&index) = self.by_name.get(name) {
            return Ok(index);
        }

        self.columns
            .iter()
            .position(|c| c.name.eq_ignore_ascii_case(name))
            .ok_or_else(|| ArgumentError::UnknownColumn {
                name: name.to_string(),
                available: self.columns.iter().map(|c| c.name.clone()).collect(),
            })
    }

    /// Column called `name`.
    pub fn column_by_name(&self, name: &str) -> Result<&ColumnMetadata, ArgumentError> {
        let index = self.index_of(name)?;
        Ok(&self.columns[index])
    }

    /// Set view over the distinct column names.
    pub fn names(&self) -> ColumnNames<'_> {
        ColumnNames::new(self)
    }
}

/// Distinct column names of a result, in declaration order.
///
/// `contains` uses the same case-insensitive rules as column lookup.
#[derive(Debug, Clone)]
pub struct ColumnNames<'a> {
    source: &'a ColumnSource,
    names: Vec<&'a str>,
}

impl<'a> ColumnNames<'a> {
    fn new(source: &'a ColumnSource) -> Self {
        let mut names: Vec<&str> = Vec::with_capacity(source.len());
        for column in &source.columns {
            if !names.contains(&column.name.as_str()) {
                names.push(&column.name);
            }
        }
        Self { source, names }
    }

    /// Whether a column called `name` exists.
    pub fn contains(&self, name: &str) -> bool {
        self.source.index_of(name).is_ok()
    }

    /// Number of distinct names.
    pub fn len(&self) -> usize {
        self.names.len()
    }

    /// Whether there are no names.
    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }

    /// Names in declaration order.
    pub fn iter(&self) -> impl Iterator<Item = &'a str> + '_ {
        self.names.iter().copied()
    }
}

/// Shape of the rows of one result.
#[derive(Debug, Clone, Default)]
pub struct RowMetadata {
    source: Arc<ColumnSource>,
}

impl RowMetadata {
    /// Wrap a column source.
    pub fn new(source: ColumnSource) -> Self {
        Self {
            source: Arc::new(source),
        }
    }

    /// Column at `index`.
    pub fn column_metadata(&self, index: usize) -> Result<&ColumnMetadata> {
        Ok(self.source.column(index)?)
    }

    /// Column called `name`.
    pub fn column_metadata_by_name(&self, name: &str) -> Result<&ColumnMetadata> {
        Ok(self.source.column_by_name(name)?)
    }

    /// All columns in declaration order.
    pub fn column_metadatas(&self) -> &[ColumnMetadata] {
        self.source.columns()
    }

    /// Distinct column names.
    pub fn column_names(&self) -> ColumnNames<'_> {
        self.source.names()
    }

    /// Number of columns.
    pub fn len(&self) -> usize {
        self.source.len()
    }

    /// Whether there are no columns.
    pub fn is_empty(&self) -> bool {
        self.source.is_empty()
    }

    pub(crate) fn source(&self) -> &Arc<ColumnSource> {
        &self.source
    }
}

/// One materialized result row.
#[derive(Debug, Clone)]
pub struct Row {
    values: Vec<Value>,
    source: Arc<ColumnSource>,
}

impl Row {
    pub(crate) fn new(values: Vec<Value>, source: Arc<ColumnSource>) -> Self {
        Self { values, source }
    }

    /// Raw value at `index`.
    pub fn value(&self, index: usize) -> Result<&Value> {
        self.values.get(index).ok_or_else(|| {
            ArgumentError::ColumnIndexOutOfRange {
                index,
                count: self.values.len(),
            }
            .into()
        })
    }

    /// Raw value of the column called `name`.
    pub fn value_by_name(&self, name: &str) -> Result<&Value> {
        let index = self.source.index_of(name)?;
        self.value(index)
    }

    /// Value at `index`, converted to `T`.
    ///
    /// ```
    /// # use ignite_r2dbc::query::Row;
    /// # fn read(row: &Row) -> ignite_r2dbc::Result<()> {
    /// let id: i64 = row.get(0)?;
    /// let name: Option<String> = row.get_by_name("name")?;
    /// # Ok(())
    /// # }
    /// ```
    pub fn get<T: FromValue>(&self, index: usize) -> Result<T> {
        Ok(T::from_value(self.value(index)?, index)?)
    }

    /// Value of the column called `name`, converted to `T`.
    pub fn get_by_name<T: FromValue>(&self, name: &str) -> Result<T> {
        let index = self.source.index_of(name)?;
        self.get(index)
    }

    /// All values in column order.
    pub fn values(&self) -> &[Value] {
        &self.values
    }

    /// Number of values.
    pub fn len(&self) -> usize {
        self.values.len()
    }

    /// Whether the row has no values.
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Shape of this row.
    pub fn metadata(&self) -> RowMetadata {
        RowMetadata {
            source: Arc::clone(&self.source),
        }
    }
}
