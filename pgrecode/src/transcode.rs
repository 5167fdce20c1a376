// SPDX-License-Identifier: Apache-2.0
// Copyright Authors of pgrecode

//! Per-column conversion policy: classify a value as already-canonical,
//! converted, or failed-to-convert, never producing partial output.

use chrono::{DateTime, Local};
use log::debug;

use crate::{convert, types::ColumnValue};

/// The canonical encoding every watched column converges on.
pub const CANONICAL_ENCODING: &str = "UTF-8";

/// The result of one conversion attempt for one column of one row.
#[derive(Debug, Clone)]
pub struct ConversionOutcome {
    /// Detected encoding name; `None` when detection failed.
    pub encoding: Option<String>,
    /// Detected language, when the detector reports one.
    pub language: Option<String>,
    /// Detection confidence, 0–100.
    pub confidence: i32,
    /// The column's post-conversion bytes; the original bytes on every
    /// non-converting branch.
    pub bytes: Option<Vec<u8>>,
    pub converted: bool,
    pub dropped_bytes: bool,
    pub timestamp: DateTime<Local>,
}

/// Runs the conversion policy over one column value. Exactly one attempt is
/// made; every failure falls back to the unmodified value.
pub fn convert_column(value: &ColumnValue, hint: Option<&str>, force_drop: bool) -> ConversionOutcome {
    let timestamp = Local::now();

    let bytes = match value.value.as_deref() {
        // Null and empty values are canonical by definition.
        None | Some([]) => {
            return ConversionOutcome {
                encoding: Some(CANONICAL_ENCODING.to_string()),
                language: None,
                confidence: 100,
                bytes: value.value.clone(),
                converted: false,
                dropped_bytes: false,
                timestamp,
            };
        }
        Some(bytes) => bytes,
    };

    let detection = match convert::detect(bytes, hint) {
        Ok(detection) => detection,
        Err(e) => {
            debug!("charset detection failed for column {}: {e}", value.name);
            return ConversionOutcome {
                encoding: None,
                language: None,
                confidence: 0,
                bytes: value.value.clone(),
                converted: false,
                dropped_bytes: false,
                timestamp,
            };
        }
    };

    if is_utf8_alias(&detection.encoding) {
        return ConversionOutcome {
            encoding: Some(detection.encoding),
            language: some_language(detection.language),
            confidence: detection.confidence,
            bytes: value.value.clone(),
            converted: false,
            dropped_bytes: false,
            timestamp,
        };
    }

    match convert::convert_to_utf8(&detection.encoding, bytes, force_drop) {
        Ok((converted_bytes, dropped_bytes)) => ConversionOutcome {
            encoding: Some(detection.encoding),
            language: some_language(detection.language),
            confidence: detection.confidence,
            bytes: Some(converted_bytes),
            converted: true,
            dropped_bytes,
            timestamp,
        },
        Err(e) => {
            debug!("conversion to UTF-8 failed for column {}: {e}", value.name);
            ConversionOutcome {
                encoding: Some(detection.encoding),
                language: some_language(detection.language),
                confidence: detection.confidence,
                bytes: value.value.clone(),
                converted: false,
                dropped_bytes: false,
                timestamp,
            }
        }
    }
}

fn is_utf8_alias(name: &str) -> bool {
    name.eq_ignore_ascii_case("UTF-8") || name.eq_ignore_ascii_case("UTF8")
}

fn some_language(language: String) -> Option<String> {
    if language.is_empty() { None } else { Some(language) }
}
