// SPDX-License-Identifier: Apache-2.0
// Copyright Authors of pgrecode

//! Row, column and key shapes shared between the store and the pipeline.

/// Binary result format, the only format the store requests.
pub const WIRE_FORMAT_BINARY: i16 = 1;

/// One watched column of the target table, as described by the system
/// catalogs at startup. `type_modifier` is the declared size (-1 when the
/// type is unbounded) and `type_size` the storage width (-1 for
/// variable-length types).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WatchedColumn {
    pub name: String,
    pub attnum: i16,
    pub table_oid: u32,
    pub type_oid: u32,
    pub type_modifier: i32,
    pub type_size: i16,
}

/// One column of one fetched row: the catalog metadata plus the raw bytes
/// that came off the wire. `value` is `None` for SQL NULL; a present value
/// may be any byte sequence, valid UTF-8 or not.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColumnValue {
    pub name: String,
    pub ordinal: usize,
    pub table_oid: u32,
    pub column_id: i16,
    pub wire_format: i16,
    pub type_oid: u32,
    pub type_modifier: i32,
    pub type_size: i16,
    pub value: Option<Vec<u8>>,
}

impl ColumnValue {
    pub fn from_watched(column: &WatchedColumn, ordinal: usize, value: Option<Vec<u8>>) -> Self {
        ColumnValue {
            name: column.name.clone(),
            ordinal,
            table_oid: column.table_oid,
            column_id: column.attnum,
            wire_format: WIRE_FORMAT_BINARY,
            type_oid: column.type_oid,
            type_modifier: column.type_modifier,
            type_size: column.type_size,
            value,
        }
    }

    /// The same column with its bytes replaced, keeping all metadata.
    pub fn with_value(&self, value: Option<Vec<u8>>) -> Self {
        ColumnValue {
            value,
            ..self.clone()
        }
    }

    pub fn is_null(&self) -> bool {
        self.value.is_none()
    }

    /// Raw bytes, empty when null. Byte length is only meaningful for
    /// non-null values.
    pub fn bytes(&self) -> &[u8] {
        self.value.as_deref().unwrap_or(&[])
    }

    /// Value equality as the diff sees it: both null, or both non-null with
    /// identical byte length and content.
    pub fn same_bytes(&self, other: &ColumnValue) -> bool {
        self.value == other.value
    }
}

/// The values of every watched column of one row, captured at one instant.
#[derive(Debug, Clone)]
pub struct RowSnapshot {
    pub columns: Vec<ColumnValue>,
}

/// The shortest unique key of the target table: (column, declared type)
/// pairs in key order, plus the cast expression the key-rendering schema
/// functions use for literal tuples.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UniqueKeySpec {
    columns: Vec<(String, String)>,
    cast_expr: String,
}

impl UniqueKeySpec {
    pub fn new(columns: Vec<(String, String)>, cast_expr: String) -> Self {
        UniqueKeySpec { columns, cast_expr }
    }

    pub fn columns(&self) -> &[(String, String)] {
        &self.columns
    }

    pub fn cast_expr(&self) -> &str {
        &self.cast_expr
    }

    /// Key column names joined for a WHERE tuple, e.g. `id` or `a, b`.
    pub fn column_list(&self) -> String {
        self.columns
            .iter()
            .map(|(name, _)| name.as_str())
            .collect::<Vec<_>>()
            .join(", ")
    }
}
