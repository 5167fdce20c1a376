// SPDX-License-Identifier: Apache-2.0
// Copyright Authors of pgrecode

use crate::errors::RecodeError;

/// Everything one run needs to know, built once at startup and threaded
/// through every component call.
#[derive(Debug, Clone)]
pub struct RunConfig {
    dsn: String,
    schema: String,
    table: String,
    one_row: Option<String>,
    restart: Option<String>,
    limit: u64,
    hint: Option<String>,
    force: bool,
    report: bool,
    debug: bool,
}

impl RunConfig {
    pub fn new(
        dsn: impl Into<String>,
        schema: impl Into<String>,
        table: impl Into<String>,
    ) -> Self {
        RunConfig {
            dsn: dsn.into(),
            schema: schema.into(),
            table: table.into(),
            one_row: None,
            restart: None,
            limit: 0,
            hint: None,
            force: false,
            report: false,
            debug: false,
        }
    }

    pub fn with_one_row(mut self, key: Option<String>) -> Self {
        self.one_row = key;
        self
    }

    pub fn with_restart(mut self, key: Option<String>) -> Self {
        self.restart = key;
        self
    }

    /// Row cap; 0 means unlimited.
    pub fn with_limit(mut self, limit: u64) -> Self {
        self.limit = limit;
        self
    }

    pub fn with_hint(mut self, hint: Option<String>) -> Self {
        self.hint = hint;
        self
    }

    pub fn with_force(mut self, force: bool) -> Self {
        self.force = force;
        self
    }

    pub fn with_report(mut self, report: bool) -> Self {
        self.report = report;
        self
    }

    pub fn with_debug(mut self, debug: bool) -> Self {
        self.debug = debug;
        self
    }

    pub fn validate(&self) -> Result<(), RecodeError> {
        if self.dsn.trim().is_empty() {
            return Err(RecodeError::ArgumentError("dsn required".to_string()));
        }
        if self.schema.trim().is_empty() {
            return Err(RecodeError::ArgumentError("schema required".to_string()));
        }
        if self.table.trim().is_empty() {
            return Err(RecodeError::ArgumentError("table required".to_string()));
        }
        Ok(())
    }

    pub fn dsn(&self) -> &str {
        &self.dsn
    }

    pub fn schema(&self) -> &str {
        &self.schema
    }

    pub fn table(&self) -> &str {
        &self.table
    }

    /// Schema-qualified table name, e.g. `public.customer`.
    pub fn qualified_table(&self) -> String {
        format!("{}.{}", self.schema, self.table)
    }

    /// The explicit starting key, if any. A single-row key takes precedence
    /// over a restart key; with neither, the run starts at the computed
    /// minimum.
    pub fn start_key(&self) -> Option<&str> {
        self.one_row.as_deref().or(self.restart.as_deref())
    }

    pub fn is_single_row(&self) -> bool {
        self.one_row.is_some()
    }

    pub fn limit(&self) -> u64 {
        self.limit
    }

    pub fn hint(&self) -> Option<&str> {
        self.hint.as_deref()
    }

    pub fn force(&self) -> bool {
        self.force
    }

    pub fn report(&self) -> bool {
        self.report
    }

    pub fn debug(&self) -> bool {
        self.debug
    }
}
