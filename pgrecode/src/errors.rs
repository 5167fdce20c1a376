// SPDX-License-Identifier: Apache-2.0
// Copyright Authors of pgrecode

use thiserror::Error;

#[derive(Debug, Error)]
pub enum RecodeError {
    #[error("An error occurred. {0}")]
    Error(String),
    #[error("Invalid argument: {0}")]
    ArgumentError(String),
    #[error("Unable to connect to the database: {0}")]
    ConnectionError(#[source] postgres::Error),
    #[error("{0}: {1}")]
    QueryError(String, String),
    #[error("Catalog lookup for {table} failed: {reason}")]
    CatalogError { table: String, reason: String },
    #[error(
        "Key ({key}) matched {rows} rows; the shortest unique key must address exactly one row"
    )]
    CardinalityError { key: String, rows: u64 },
    #[error(transparent)]
    AuditError(#[from] csv::Error),
    #[error(transparent)]
    IoError(#[from] std::io::Error),
}
