// SPDX-License-Identifier: Apache-2.0
// Copyright Authors of pgrecode

//! Table access. [`TableStore`] is the seam between the run loop and
//! PostgreSQL; [`PgStore`] implements it over two blocking sessions so
//! an update never disturbs the keyset walk on the read side.

use std::str::FromStr;

use log::debug;
use postgres::{
    Client, Config, NoTls, Row,
    types::{FromSql, ToSql, Type},
};

use crate::{
    errors::RecodeError,
    types::{ColumnValue, RowSnapshot, UniqueKeySpec, WatchedColumn},
};

const UNIQUE_KEY_CAST_SQL: &str =
    "select array_to_string(public.zip(out_unique_key_col, out_unique_key_data_type), '::') \
     from public.get_shortest_unique_key($1, $2)";

const UNIQUE_KEY_PARTS_SQL: &str =
    "select array_to_string(out_unique_key_col, ', '), \
            array_to_string(out_unique_key_data_type, ', ') \
     from public.get_shortest_unique_key($1, $2)";

const WATCHED_COLUMNS_SQL: &str =
    "select a.attname, a.attnum, c.oid, a.atttypid, a.atttypmod, t.typlen \
     from pg_catalog.pg_class c \
     join pg_catalog.pg_namespace n on n.oid = c.relnamespace \
     join pg_catalog.pg_attribute a on a.attrelid = c.oid \
     join pg_catalog.pg_type t on t.oid = a.atttypid \
     where c.relkind = 'r' \
       and t.typtype = 'b' \
       and t.typcategory = 'S' \
       and not a.attisdropped \
       and a.attnum > 0 \
       and n.nspname = $1 \
       and c.relname = $2 \
     order by a.attnum";

const MIN_KEY_SQL: &str =
    "select out_cast_min_uk_values from public.get_min_shortest_unique_key_values($1, $2)";

const NEXT_KEY_SQL: &str =
    "select out_cast_next_uk_values from public.get_next_shortest_unique_key_values($1, $2, $3)";

/// Everything the run loop asks of a table. Keys cross this boundary as
/// the server-rendered literal tuples the helper functions emit, so the
/// loop never parses or re-renders them.
pub trait TableStore {
    fn unique_key(&mut self, schema: &str, table: &str) -> Result<UniqueKeySpec, RecodeError>;

    fn watched_columns(
        &mut self,
        schema: &str,
        table: &str,
    ) -> Result<Vec<WatchedColumn>, RecodeError>;

    /// Rendered key of the first row, or `None` for an empty table.
    fn minimum_key(&mut self, schema: &str, table: &str) -> Result<Option<String>, RecodeError>;

    /// Rendered key of the row after `current`, or `None` past the last.
    fn next_key(
        &mut self,
        schema: &str,
        table: &str,
        current: &str,
    ) -> Result<Option<String>, RecodeError>;

    fn fetch_row(
        &mut self,
        table: &str,
        columns: &[WatchedColumn],
        key_columns: &str,
        key_value: &str,
    ) -> Result<RowSnapshot, RecodeError>;

    fn execute_update(&mut self, sql: &str) -> Result<u64, RecodeError>;
}

/// Raw column bytes, exactly as they arrived on the wire. Text values
/// come back verbatim, so bytes that are not valid UTF-8 survive where a
/// `String` conversion would refuse them.
#[derive(Debug)]
struct RawValue(Vec<u8>);

impl<'a> FromSql<'a> for RawValue {
    fn from_sql(
        _: &Type,
        raw: &'a [u8],
    ) -> Result<Self, Box<dyn std::error::Error + Sync + Send>> {
        Ok(RawValue(raw.to_vec()))
    }

    fn accepts(_: &Type) -> bool {
        true
    }
}

pub struct PgStore {
    reader: Client,
    writer: Client,
}

impl PgStore {
    /// Opens the read and write sessions from the same DSN.
    pub fn connect(dsn: &str) -> Result<Self, RecodeError> {
        let mut config = Config::from_str(dsn).map_err(RecodeError::ConnectionError)?;
        config.application_name(crate::APPLICATION_NAME);
        let reader = config.connect(NoTls).map_err(RecodeError::ConnectionError)?;
        let writer = config.connect(NoTls).map_err(RecodeError::ConnectionError)?;
        Ok(Self { reader, writer })
    }

    fn query(
        client: &mut Client,
        context: &str,
        sql: &str,
        params: &[&(dyn ToSql + Sync)],
    ) -> Result<Vec<Row>, RecodeError> {
        debug!("{context}: {sql}");
        client
            .query(sql, params)
            .map_err(|error| RecodeError::QueryError(context.to_string(), error.to_string()))
    }
}

fn get<'a, T>(row: &'a Row, index: usize, context: &str) -> Result<T, RecodeError>
where
    T: FromSql<'a>,
{
    row.try_get(index)
        .map_err(|error| RecodeError::QueryError(context.to_string(), error.to_string()))
}

/// Pairs the joined column-name and data-type renditions of the shortest
/// unique key back into (name, type) tuples.
fn zip_key_parts(names: &str, types: &str) -> Vec<(String, String)> {
    names
        .split(", ")
        .zip(types.split(", "))
        .map(|(name, data_type)| (name.to_string(), data_type.to_string()))
        .collect()
}

fn build_read_query(
    table: &str,
    columns: &[WatchedColumn],
    key_columns: &str,
    key_value: &str,
) -> String {
    let column_list = columns
        .iter()
        .map(|column| column.name.as_str())
        .collect::<Vec<_>>()
        .join(", ");
    format!("select {column_list} from {table} where ({key_columns}) = ({key_value})")
}

impl TableStore for PgStore {
    fn unique_key(&mut self, schema: &str, table: &str) -> Result<UniqueKeySpec, RecodeError> {
        const CONTEXT: &str = "shortest unique key lookup";
        let qualified = format!("{schema}.{table}");
        let rows = Self::query(
            &mut self.reader,
            CONTEXT,
            UNIQUE_KEY_CAST_SQL,
            &[&schema, &table],
        )?;
        if rows.is_empty() {
            return Err(RecodeError::CatalogError {
                table: qualified,
                reason: "no shortest unique key was reported".to_string(),
            });
        }
        let mut cast_parts = Vec::with_capacity(rows.len());
        for row in &rows {
            cast_parts.push(get::<String>(row, 0, CONTEXT)?);
        }
        let cast_expr = cast_parts.join(", ");

        let rows = Self::query(
            &mut self.reader,
            CONTEXT,
            UNIQUE_KEY_PARTS_SQL,
            &[&schema, &table],
        )?;
        let row = rows.first().ok_or_else(|| RecodeError::CatalogError {
            table: qualified,
            reason: "the unique key columns could not be listed".to_string(),
        })?;
        let names: String = get(row, 0, CONTEXT)?;
        let types: String = get(row, 1, CONTEXT)?;
        Ok(UniqueKeySpec::new(zip_key_parts(&names, &types), cast_expr))
    }

    fn watched_columns(
        &mut self,
        schema: &str,
        table: &str,
    ) -> Result<Vec<WatchedColumn>, RecodeError> {
        const CONTEXT: &str = "watched column lookup";
        let rows = Self::query(
            &mut self.reader,
            CONTEXT,
            WATCHED_COLUMNS_SQL,
            &[&schema, &table],
        )?;
        let mut columns = Vec::with_capacity(rows.len());
        for row in &rows {
            columns.push(WatchedColumn {
                name: get(row, 0, CONTEXT)?,
                attnum: get(row, 1, CONTEXT)?,
                table_oid: get(row, 2, CONTEXT)?,
                type_oid: get(row, 3, CONTEXT)?,
                type_modifier: get(row, 4, CONTEXT)?,
                type_size: get(row, 5, CONTEXT)?,
            });
        }
        Ok(columns)
    }

    fn minimum_key(&mut self, schema: &str, table: &str) -> Result<Option<String>, RecodeError> {
        const CONTEXT: &str = "minimum key lookup";
        let rows = Self::query(&mut self.reader, CONTEXT, MIN_KEY_SQL, &[&schema, &table])?;
        match rows.first() {
            Some(row) => get(row, 0, CONTEXT),
            None => Ok(None),
        }
    }

    fn next_key(
        &mut self,
        schema: &str,
        table: &str,
        current: &str,
    ) -> Result<Option<String>, RecodeError> {
        const CONTEXT: &str = "next key lookup";
        let rows = Self::query(
            &mut self.reader,
            CONTEXT,
            NEXT_KEY_SQL,
            &[&schema, &table, &current],
        )?;
        match rows.first() {
            Some(row) => get(row, 0, CONTEXT),
            None => Ok(None),
        }
    }

    fn fetch_row(
        &mut self,
        table: &str,
        columns: &[WatchedColumn],
        key_columns: &str,
        key_value: &str,
    ) -> Result<RowSnapshot, RecodeError> {
        const CONTEXT: &str = "row fetch";
        let sql = build_read_query(table, columns, key_columns, key_value);
        let rows = Self::query(&mut self.reader, CONTEXT, &sql, &[])?;
        if rows.len() != 1 {
            return Err(RecodeError::CardinalityError {
                key: key_value.to_string(),
                rows: rows.len() as u64,
            });
        }
        let row = &rows[0];
        let mut values = Vec::with_capacity(columns.len());
        for (ordinal, column) in columns.iter().enumerate() {
            let raw: Option<RawValue> = get(row, ordinal, CONTEXT)?;
            values.push(ColumnValue::from_watched(
                column,
                ordinal,
                raw.map(|value| value.0),
            ));
        }
        Ok(RowSnapshot { columns: values })
    }

    fn execute_update(&mut self, sql: &str) -> Result<u64, RecodeError> {
        const CONTEXT: &str = "row update";
        debug!("{CONTEXT}: {sql}");
        self.writer
            .execute(sql, &[])
            .map_err(|error| RecodeError::QueryError(CONTEXT.to_string(), error.to_string()))
    }
}
