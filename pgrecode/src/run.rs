// SPDX-License-Identifier: Apache-2.0
// Copyright Authors of pgrecode

//! The row walk: resolve the key and column catalog once, then fetch,
//! transcode, diff, and conditionally rewrite one row at a time in
//! ascending shortest-unique-key order.

use std::{
    io::Write,
    time::{Duration, Instant},
};

use log::{debug, error, info};

use crate::{
    audit::{AuditLog, AuditRecord},
    config::RunConfig,
    errors::RecodeError,
    store::TableStore,
    transcode,
    types::RowSnapshot,
    update,
};

const SUMMARY_FRAME: &str = "===============================";

/// Counters accumulated over one run.
#[derive(Debug, Default)]
pub struct RunStats {
    /// Rows fetched and pushed through the pipeline.
    pub rows_visited: u64,
    /// Rows whose diff was non-empty (would-be updates in report mode).
    pub rows_changed: u64,
    /// Rows actually rewritten.
    pub rows_updated: u64,
    /// UPDATE statements that failed; the run continues past them.
    pub write_failures: u64,
    pub elapsed: Duration,
}

impl RunStats {
    /// The end-of-run block printed to stderr.
    pub fn render_summary(&self) -> String {
        let secs = self.elapsed.as_secs_f64();
        let percent = if self.rows_visited > 0 {
            self.rows_updated as f64 * 100.0 / self.rows_visited as f64
        } else {
            0.0
        };
        let mut summary = String::new();
        summary.push_str(SUMMARY_FRAME);
        summary.push('\n');
        summary.push_str(&format!(" Run time (secs):  {secs:.6}\n"));
        summary.push_str(&format!(" Total rows:       {}\n", self.rows_visited));
        summary.push_str(&format!(" Rows updated:     {}\n", self.rows_updated));
        if self.write_failures > 0 {
            summary.push_str(&format!(" Write failures:   {}\n", self.write_failures));
        }
        summary.push_str(&format!(" % updated:        {percent:.2}\n"));
        if secs > 0.0 {
            let rate = self.rows_visited as f64 / secs;
            summary.push_str(&format!(" Avg rows/sec:     {rate:.2}\n"));
        } else {
            summary.push_str(&format!(" *All* the rows in {secs:.6} seconds!\n"));
        }
        summary.push_str(SUMMARY_FRAME);
        summary.push('\n');
        summary
    }
}

/// Walks the configured table once. Fatal errors abort the walk; failed
/// writes and conversion fallbacks do not.
pub fn run<S, W>(
    store: &mut S,
    config: &RunConfig,
    audit: &mut AuditLog<W>,
) -> Result<RunStats, RecodeError>
where
    S: TableStore,
    W: Write,
{
    let started = Instant::now();
    let mut stats = RunStats::default();
    let table = config.qualified_table();
    info!("Starting conversion of {table}");

    let key_spec = store.unique_key(config.schema(), config.table())?;
    debug!("unique key cast expression: {}", key_spec.cast_expr());
    let columns = store.watched_columns(config.schema(), config.table())?;
    if columns.is_empty() {
        return Err(RecodeError::CatalogError {
            table,
            reason: "no character columns found".to_string(),
        });
    }
    debug!("watching {} character columns", columns.len());
    let key_columns = key_spec.column_list();

    // An explicit single-row key beats a restart key beats the computed
    // minimum; a missing minimum means the table is empty.
    let mut key = match config.start_key() {
        Some(start) => Some(start.to_string()),
        None => store.minimum_key(config.schema(), config.table())?,
    };

    while let Some(current) = key {
        stats.rows_visited += 1;
        if config.limit() > 0 && stats.rows_visited > config.limit() {
            stats.rows_visited -= 1;
            break;
        }
        info!("Converting {key_columns}: {current}");

        let original = store.fetch_row(&table, &columns, &key_columns, &current)?;
        let mut converted_columns = Vec::with_capacity(original.columns.len());
        for column in &original.columns {
            let outcome = transcode::convert_column(column, config.hint(), config.force());
            audit.append(&AuditRecord::from_outcome(
                config.schema(),
                config.table(),
                &column.name,
                &key_columns,
                &current,
                column.value.as_deref(),
                &outcome,
            ))?;
            converted_columns.push(column.with_value(outcome.bytes));
        }
        let converted = RowSnapshot {
            columns: converted_columns,
        };

        match update::diff(&original, &converted, &table, &key_columns, &current) {
            Some(sql) => {
                stats.rows_changed += 1;
                if config.report() {
                    debug!("report only, not executing: {sql}");
                } else {
                    match store.execute_update(&sql) {
                        Ok(_) => {
                            stats.rows_updated += 1;
                            debug!("{table}, {key_columns}={current} updated.");
                        }
                        Err(e) => {
                            stats.write_failures += 1;
                            error!("{table}, {key_columns}={current} update failed. {e}");
                        }
                    }
                }
            }
            None => {
                info!("No columns require conversion - skipping update of {key_columns}={current}.");
            }
        }

        if config.is_single_row() {
            break;
        }
        key = store.next_key(config.schema(), config.table(), &current)?;
    }

    audit.flush()?;
    info!("Completed conversion of {table}");
    stats.elapsed = started.elapsed();
    Ok(stats)
}
