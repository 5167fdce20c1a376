// SPDX-License-Identifier: Apache-2.0
// Copyright Authors of pgrecode

//! Diffs row snapshots and renders the single UPDATE statement covering
//! all watched columns, with NULL/empty handling and over-length
//! truncation.

use std::str;

use log::warn;
use postgres_protocol::escape::escape_literal;

use crate::types::{ColumnValue, RowSnapshot};

/// Bytes reserved for the length header of variable-length values; a
/// varchar(n) column's type modifier is n plus this.
const VARLENA_HEADER_LEN: i32 = 4;

/// Compares the snapshots column by column and renders an UPDATE when any
/// pair differs. Equal rows produce no statement.
pub fn diff(
    original: &RowSnapshot,
    converted: &RowSnapshot,
    table: &str,
    key_columns: &str,
    key_value: &str,
) -> Option<String> {
    let unchanged = original
        .columns
        .iter()
        .zip(&converted.columns)
        .all(|(before, after)| before.same_bytes(after));
    if unchanged {
        return None;
    }
    Some(build_update(table, converted, key_columns, key_value))
}

/// Renders one UPDATE assigning every watched column of the row, keyed by
/// the already-rendered unique key tuple.
pub fn build_update(table: &str, row: &RowSnapshot, key_columns: &str, key_value: &str) -> String {
    let assignments = row
        .columns
        .iter()
        .map(|column| format!("{} = {}", column.name, render_literal(column)))
        .collect::<Vec<_>>()
        .join(", ");
    format!("update {table} set {assignments} where ({key_columns}) = ({key_value})")
}

fn render_literal(column: &ColumnValue) -> String {
    match column.value.as_deref() {
        None => "NULL".to_string(),
        Some([]) => "''".to_string(),
        Some(bytes) => escape_bytes(apply_truncation(column, bytes)),
    }
}

/// Truncates a value that no longer fits its column's declared size.
/// Applies only to variable-length types with a finite modifier; the
/// boundary is byte-exact and may split a multibyte sequence.
fn apply_truncation<'a>(column: &ColumnValue, bytes: &'a [u8]) -> &'a [u8] {
    if column.type_size != -1 || column.type_modifier == -1 {
        return bytes;
    }
    let allowed = column.type_modifier - VARLENA_HEADER_LEN;
    if allowed < 0 || bytes.len() <= allowed as usize {
        return bytes;
    }
    let truncated = &bytes[..allowed as usize];
    warn!(
        "value for column {} exceeds the declared size; keeping the first {} of {} bytes (original: {}, truncated: {})",
        column.name,
        allowed,
        bytes.len(),
        String::from_utf8_lossy(bytes),
        String::from_utf8_lossy(truncated)
    );
    truncated
}

/// Renders arbitrary bytes as a single SQL literal. Valid UTF-8 goes
/// through the client library's escaping; anything else becomes a pure
/// ASCII `E''` literal of hex byte escapes, which reproduces the exact
/// bytes server-side.
fn escape_bytes(bytes: &[u8]) -> String {
    match str::from_utf8(bytes) {
        Ok(text) => escape_literal(text),
        Err(_) => {
            let mut literal = String::with_capacity(bytes.len() * 4 + 3);
            literal.push_str("E'");
            for byte in bytes {
                literal.push_str(&format!("\\x{byte:02x}"));
            }
            literal.push('\'');
            literal
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::types::WIRE_FORMAT_BINARY;

    const TEXT_OID: u32 = 25;
    const VARCHAR_OID: u32 = 1043;

    fn text_column(name: &str, ordinal: usize, value: Option<&[u8]>) -> ColumnValue {
        ColumnValue {
            name: name.to_string(),
            ordinal,
            table_oid: 16384,
            column_id: ordinal as i16 + 1,
            wire_format: WIRE_FORMAT_BINARY,
            type_oid: TEXT_OID,
            type_modifier: -1,
            type_size: -1,
            value: value.map(<[u8]>::to_vec),
        }
    }

    fn varchar_column(name: &str, declared_size: i32, value: &[u8]) -> ColumnValue {
        ColumnValue {
            name: name.to_string(),
            ordinal: 0,
            table_oid: 16384,
            column_id: 1,
            wire_format: WIRE_FORMAT_BINARY,
            type_oid: VARCHAR_OID,
            type_modifier: declared_size + VARLENA_HEADER_LEN,
            type_size: -1,
            value: Some(value.to_vec()),
        }
    }

    fn snapshot(columns: Vec<ColumnValue>) -> RowSnapshot {
        RowSnapshot { columns }
    }

    #[test]
    fn test_equal_rows_produce_no_update() {
        let original = snapshot(vec![
            text_column("a", 0, Some(b"plain")),
            text_column("b", 1, None),
        ]);
        let converted = snapshot(vec![
            text_column("a", 0, Some(b"plain")),
            text_column("b", 1, None),
        ]);
        assert_eq!(
            diff(&original, &converted, "public.t", "id", "'1'::integer"),
            None
        );
    }

    #[test]
    fn test_changed_row_updates_all_columns() {
        let original = snapshot(vec![
            text_column("first", 0, Some(b"abc")),
            text_column("second", 1, Some(b"x\xe9")),
        ]);
        let converted = snapshot(vec![
            text_column("first", 0, Some(b"abc")),
            text_column("second", 1, Some("xé".as_bytes())),
        ]);
        let sql = diff(&original, &converted, "public.t", "id", "'7'::integer")
            .expect("expected an update");
        assert_eq!(
            sql,
            "update public.t set first = 'abc', second = 'xé' where (id) = ('7'::integer)"
        );
    }

    #[test]
    fn test_null_and_empty_literals() {
        let row = snapshot(vec![
            text_column("a", 0, None),
            text_column("b", 1, Some(b"")),
        ]);
        let sql = build_update("public.t", &row, "id", "'1'::integer");
        assert_eq!(
            sql,
            "update public.t set a = NULL, b = '' where (id) = ('1'::integer)"
        );
    }

    #[test]
    fn test_quotes_are_doubled() {
        let row = snapshot(vec![text_column("name", 0, Some(b"O'Brien"))]);
        let sql = build_update("public.t", &row, "id", "'1'::integer");
        assert_eq!(
            sql,
            "update public.t set name = 'O''Brien' where (id) = ('1'::integer)"
        );
    }

    #[test]
    fn test_backslashes_use_the_e_literal_form() {
        let row = snapshot(vec![text_column("path", 0, Some(br"a\b"))]);
        let sql = build_update("public.t", &row, "id", "'1'::integer");
        assert_eq!(
            sql,
            r"update public.t set path =  E'a\\b' where (id) = ('1'::integer)"
        );
    }

    #[test]
    fn test_invalid_utf8_renders_hex_escapes() {
        let row = snapshot(vec![text_column("blob", 0, Some(b"H\xe9"))]);
        let sql = build_update("public.t", &row, "id", "'1'::integer");
        assert_eq!(
            sql,
            r"update public.t set blob = E'\x48\xe9' where (id) = ('1'::integer)"
        );
    }

    #[test]
    fn test_overlength_varchar_truncates() {
        let row = snapshot(vec![varchar_column("code", 5, b"abcdefghij")]);
        let sql = build_update("public.t", &row, "id", "'1'::integer");
        assert_eq!(
            sql,
            "update public.t set code = 'abcde' where (id) = ('1'::integer)"
        );
    }

    #[test]
    fn test_varchar_within_bounds_is_untouched() {
        let row = snapshot(vec![varchar_column("code", 5, b"abcde")]);
        let sql = build_update("public.t", &row, "id", "'1'::integer");
        assert_eq!(
            sql,
            "update public.t set code = 'abcde' where (id) = ('1'::integer)"
        );
    }

    #[test]
    fn test_unbounded_text_never_truncates() {
        let long = vec![b'z'; 4096];
        let row = snapshot(vec![text_column("body", 0, Some(&long))]);
        let sql = build_update("public.t", &row, "id", "'1'::integer");
        assert!(sql.contains(&format!("body = '{}'", String::from_utf8_lossy(&long))));
    }

    #[test]
    fn test_fixed_width_type_never_truncates() {
        // A name-typed column has a fixed storage size; the varchar rule
        // must not apply even with a finite-looking modifier.
        let mut column = varchar_column("relname", 2, b"pg_class");
        column.type_size = 64;
        let row = snapshot(vec![column]);
        let sql = build_update("public.t", &row, "id", "'1'::integer");
        assert!(sql.contains("relname = 'pg_class'"));
    }

    #[test]
    fn test_composite_key_where_clause() {
        let row = snapshot(vec![text_column("a", 0, Some(b"v"))]);
        let sql = build_update("public.t", &row, "id, status", "'3'::integer, 'Hold'::text");
        assert!(sql.ends_with("where (id, status) = ('3'::integer, 'Hold'::text)"));
    }
}
