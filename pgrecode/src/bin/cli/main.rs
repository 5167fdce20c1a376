// SPDX-License-Identifier: Apache-2.0
// Copyright Authors of pgrecode

use std::io;

use anyhow::Context;
use clap::Parser;
use pgrecode::{audit::AuditLog, run::run, store::PgStore};

mod args;

fn main() -> anyhow::Result<()> {
    let cli = crate::args::Cli::parse();
    init_logging(cli.debug);

    let config = cli.into_config();
    config.validate()?;

    let mut store =
        PgStore::connect(config.dsn()).context("unable to open the database connections")?;
    let mut audit = AuditLog::new(io::stdout())?;
    let stats = run(&mut store, &config, &mut audit)?;
    eprint!("\n{}\n", stats.render_summary());
    Ok(())
}

// RUST_LOG still wins when set; --debug only raises the default.
fn init_logging(debug: bool) {
    let default_level = if debug { "debug" } else { "info" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default_level))
        .init();
}
