// SPDX-License-Identifier: Apache-2.0
// Copyright Authors of pgrecode

//! CSV audit stream. One record is appended per inspected column so the
//! whole run can be replayed or reconciled afterwards.

use std::io::Write;

use chrono::{DateTime, Local};

use crate::{errors::RecodeError, transcode::ConversionOutcome};

const HEADER: [&str; 13] = [
    "schemaname",
    "tablename",
    "columnname",
    "unique_key_columns",
    "uk_value",
    "detected_encoding",
    "detected_language",
    "confidence_level",
    "original_bytestream",
    "converted_bytestream",
    "conversion_ts",
    "converted",
    "dropped_bytes",
];

/// One audit line, already rendered to the strings the CSV carries.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuditRecord {
    pub schemaname: String,
    pub tablename: String,
    pub columnname: String,
    pub unique_key_columns: String,
    pub uk_value: String,
    pub detected_encoding: String,
    pub detected_language: String,
    pub confidence_level: i32,
    pub original_bytestream: String,
    pub converted_bytestream: String,
    pub conversion_ts: String,
    pub converted: bool,
    pub dropped_bytes: bool,
}

impl AuditRecord {
    pub fn from_outcome(
        schema: &str,
        table: &str,
        column: &str,
        key_columns: &str,
        key_value: &str,
        original: Option<&[u8]>,
        outcome: &ConversionOutcome,
    ) -> Self {
        Self {
            schemaname: schema.to_string(),
            tablename: table.to_string(),
            columnname: column.to_string(),
            unique_key_columns: key_columns.to_string(),
            uk_value: key_value.to_string(),
            detected_encoding: outcome.encoding.clone().unwrap_or_default(),
            detected_language: outcome.language.clone().unwrap_or_default(),
            confidence_level: outcome.confidence,
            original_bytestream: render_bytes(original),
            converted_bytestream: render_bytes(outcome.bytes.as_deref()),
            conversion_ts: format_timestamp(&outcome.timestamp),
            converted: outcome.converted,
            dropped_bytes: outcome.dropped_bytes,
        }
    }
}

/// Byte streams are audited as hex so binary-unsafe values survive the
/// CSV; the two degenerate cases keep their historical spellings.
pub(crate) fn render_bytes(bytes: Option<&[u8]>) -> String {
    match bytes {
        None => "NULL".to_string(),
        Some([]) => "empty string".to_string(),
        Some(bytes) => format!("\\x{}", hex::encode(bytes)),
    }
}

pub(crate) fn format_timestamp(timestamp: &DateTime<Local>) -> String {
    timestamp.format("%Y-%m-%d %H:%M:%S%.6f").to_string()
}

/// Audit writer over any sink. The header row is emitted on
/// construction, before any row of the table has been visited.
pub struct AuditLog<W: Write> {
    writer: csv::Writer<W>,
}

impl<W: Write> AuditLog<W> {
    pub fn new(sink: W) -> Result<Self, RecodeError> {
        let mut writer = csv::Writer::from_writer(sink);
        writer.write_record(HEADER)?;
        Ok(Self { writer })
    }

    pub fn append(&mut self, record: &AuditRecord) -> Result<(), RecodeError> {
        let confidence = record.confidence_level.to_string();
        let converted = record.converted.to_string();
        let dropped = record.dropped_bytes.to_string();
        self.writer.write_record([
            record.schemaname.as_str(),
            record.tablename.as_str(),
            record.columnname.as_str(),
            record.unique_key_columns.as_str(),
            record.uk_value.as_str(),
            record.detected_encoding.as_str(),
            record.detected_language.as_str(),
            confidence.as_str(),
            record.original_bytestream.as_str(),
            record.converted_bytestream.as_str(),
            record.conversion_ts.as_str(),
            converted.as_str(),
            dropped.as_str(),
        ])?;
        Ok(())
    }

    pub fn flush(&mut self) -> Result<(), RecodeError> {
        self.writer.flush()?;
        Ok(())
    }

    /// Flushes and hands back the underlying sink.
    pub fn into_inner(self) -> Result<W, RecodeError> {
        self.writer
            .into_inner()
            .map_err(|error| RecodeError::Error(error.to_string()))
    }
}

#[cfg(test)]
mod test {
    use chrono::{TimeZone, Timelike};

    use super::*;

    fn fixed_timestamp() -> DateTime<Local> {
        Local
            .with_ymd_and_hms(2024, 1, 15, 12, 30, 45)
            .single()
            .expect("fixed local time")
            .with_nanosecond(7_000)
            .expect("fixed nanoseconds")
    }

    #[test]
    fn test_render_bytes_spellings() {
        assert_eq!(render_bytes(None), "NULL");
        assert_eq!(render_bytes(Some(b"")), "empty string");
        assert_eq!(render_bytes(Some(b"H\xe9")), "\\x48e9");
    }

    #[test]
    fn test_timestamp_has_microsecond_precision() {
        assert_eq!(format_timestamp(&fixed_timestamp()), "2024-01-15 12:30:45.000007");
    }

    #[test]
    fn test_from_outcome_renders_every_field() {
        let outcome = ConversionOutcome {
            encoding: Some("windows-1252".to_string()),
            language: Some("French".to_string()),
            confidence: 83,
            bytes: Some("Hé".as_bytes().to_vec()),
            converted: true,
            dropped_bytes: false,
            timestamp: fixed_timestamp(),
        };
        let record = AuditRecord::from_outcome(
            "public",
            "customer",
            "notes",
            "id",
            "'7'::integer",
            Some(b"H\xe9"),
            &outcome,
        );
        assert_eq!(record.schemaname, "public");
        assert_eq!(record.tablename, "customer");
        assert_eq!(record.columnname, "notes");
        assert_eq!(record.unique_key_columns, "id");
        assert_eq!(record.uk_value, "'7'::integer");
        assert_eq!(record.detected_encoding, "windows-1252");
        assert_eq!(record.detected_language, "French");
        assert_eq!(record.confidence_level, 83);
        assert_eq!(record.original_bytestream, "\\x48e9");
        assert_eq!(record.converted_bytestream, "\\x48c3a9");
        assert_eq!(record.conversion_ts, "2024-01-15 12:30:45.000007");
        assert!(record.converted);
        assert!(!record.dropped_bytes);
    }

    #[test]
    fn test_unset_detection_fields_render_empty() {
        let outcome = ConversionOutcome {
            encoding: None,
            language: None,
            confidence: 0,
            bytes: None,
            converted: false,
            dropped_bytes: false,
            timestamp: fixed_timestamp(),
        };
        let record = AuditRecord::from_outcome(
            "public",
            "customer",
            "notes",
            "id",
            "'7'::integer",
            None,
            &outcome,
        );
        assert_eq!(record.detected_encoding, "");
        assert_eq!(record.detected_language, "");
        assert_eq!(record.original_bytestream, "NULL");
        assert_eq!(record.converted_bytestream, "NULL");
        assert!(!record.converted);
    }

    #[test]
    fn test_composite_key_fields_are_quoted() {
        let mut log = AuditLog::new(Vec::new()).expect("audit log");
        log.append(&AuditRecord {
            schemaname: "public".to_string(),
            tablename: "orders".to_string(),
            columnname: "status".to_string(),
            unique_key_columns: "id, status".to_string(),
            uk_value: "'3'::integer, 'Hold'::text".to_string(),
            detected_encoding: "windows-1252".to_string(),
            detected_language: "French".to_string(),
            confidence_level: 83,
            original_bytestream: "\\x48e9".to_string(),
            converted_bytestream: "\\x48c3a9".to_string(),
            conversion_ts: "2024-01-15 12:30:45.000007".to_string(),
            converted: true,
            dropped_bytes: false,
        })
        .expect("append");
        log.flush().expect("flush");
        let output =
            String::from_utf8(log.into_inner().expect("into inner")).expect("utf-8 csv");
        let mut lines = output.lines();
        assert_eq!(
            lines.next(),
            Some(
                "schemaname,tablename,columnname,unique_key_columns,uk_value,\
                 detected_encoding,detected_language,confidence_level,\
                 original_bytestream,converted_bytestream,conversion_ts,\
                 converted,dropped_bytes"
            )
        );
        assert_eq!(
            lines.next(),
            Some(
                "public,orders,status,\"id, status\",\"'3'::integer, 'Hold'::text\",\
                 windows-1252,French,83,\\x48e9,\\x48c3a9,\
                 2024-01-15 12:30:45.000007,true,false"
            )
        );
        assert_eq!(lines.next(), None);
    }
}
