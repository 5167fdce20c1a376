// SPDX-License-Identifier: Apache-2.0
// Copyright Authors of pgrecode

use clap::Parser;
use pgrecode::config::RunConfig;

#[derive(Parser, Debug)]
#[command(
    long_about = "Detects the character set of text-based column values in a \
PostgreSQL table and transcodes them to UTF-8 in place, walking the table in \
shortest-unique-key order and emitting a CSV audit stream on stdout."
)]
#[command(name = "pgrecode")]
#[command(disable_version_flag = true)]
pub(crate) struct Cli {
    /// Required: Connection spec with the form:
    ///   'host=<host> port=<port> dbname=<db> user=<dblogin> password=<dbpwd>'
    /// When running locally on the database server host, omit 'host' and
    /// 'port' to connect over the Unix domain socket.
    #[clap(short, long, verbatim_doc_comment)]
    pub(crate) dsn: String,

    /// Required: Schema name for the table.
    #[clap(short, long)]
    pub(crate) schema: String,

    /// Required: Table name.
    #[clap(short, long)]
    pub(crate) table: String,

    /// Optional: Process a single row, identified by its shortest unique key
    /// value, e.g. "'20'::integer", or "'3'::integer, 'Hold'::text" for a
    /// multicolumn key. Overrides --restart.
    #[clap(short, long, verbatim_doc_comment)]
    pub(crate) one_row: Option<String>,

    /// Optional: Restart the walk at the given unique key value. See
    /// --one-row for the key syntax.
    #[clap(short, long, verbatim_doc_comment)]
    pub(crate) restart: Option<String>,

    /// Optional: Stop after this many rows; 0 processes the whole table.
    #[clap(short, long, default_value_t = 0)]
    pub(crate) limit: u64,

    /// Optional: Declared encoding from an alternate source, like an HTML
    /// header or XML declaration, trusted when detection is uncertain.
    #[clap(short = 'e', long, verbatim_doc_comment)]
    pub(crate) hint: Option<String>,

    /// Optional: Force transcoding to UTF-8 by dropping invalid, illegal, or
    /// unassigned byte sequences.
    #[clap(long, verbatim_doc_comment)]
    pub(crate) force: bool,

    /// Optional: Report detected character sets but do not transcode or
    /// update any data.
    #[clap(long, verbatim_doc_comment)]
    pub(crate) report: bool,

    /// Optional: Print debug messages, including every SQL statement.
    #[clap(long)]
    pub(crate) debug: bool,
}

impl Cli {
    pub(crate) fn into_config(self) -> RunConfig {
        RunConfig::new(self.dsn, self.schema, self.table)
            .with_one_row(self.one_row)
            .with_restart(self.restart)
            .with_limit(self.limit)
            .with_hint(self.hint)
            .with_force(self.force)
            .with_report(self.report)
            .with_debug(self.debug)
    }
}
