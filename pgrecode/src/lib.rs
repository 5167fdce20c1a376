// SPDX-License-Identifier: Apache-2.0
// Copyright Authors of pgrecode

pub mod audit;
pub mod config;
mod convert;
pub mod errors;
pub mod run;
pub mod store;
pub mod transcode;
pub mod types;
pub mod update;

/// Name both database sessions report in `pg_stat_activity`.
pub const APPLICATION_NAME: &str = "pgrecode";
