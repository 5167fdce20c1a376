// SPDX-License-Identifier: Apache-2.0
// Copyright Authors of pgrecode

//! Wrappers around the charset-detection and byte-conversion collaborators.
//!
//! Detection failures and conversion failures never escape this module and
//! `transcode`; the pipeline maps them to its documented fallbacks.

use chardet::charset2encoding;
use encoding_rs::{DecoderResult, Encoding};
use thiserror::Error;

/// Confidence floor (0.0–1.0) under which a caller-declared encoding hint
/// overrides the detector's own answer.
const DECLARED_HINT_FLOOR: f32 = 0.80;

#[derive(Debug, Error)]
pub(crate) enum ConvertError {
    #[error("charset detection produced no match")]
    NoMatch,
    #[error("no converter available for encoding {0}")]
    UnknownEncoding(String),
    #[error("malformed byte sequence for encoding {0}")]
    Malformed(String),
}

/// What the detector said about one value's bytes.
#[derive(Debug, Clone)]
pub(crate) struct Detection {
    pub(crate) encoding: String,
    pub(crate) language: String,
    /// Scaled to 0–100.
    pub(crate) confidence: i32,
}

/// Detects the charset of `bytes`, biased by an optional declared-encoding
/// hint (an HTML header or XML declaration is the typical source).
pub(crate) fn detect(bytes: &[u8], hint: Option<&str>) -> Result<Detection, ConvertError> {
    let (charset, confidence, language) = chardet::detect(bytes);
    let (charset, confidence, language) = apply_hint(charset, confidence, language, hint);
    if charset.is_empty() || confidence <= 0.0 {
        return Err(ConvertError::NoMatch);
    }
    Ok(Detection {
        encoding: charset,
        language,
        confidence: (confidence * 100.0).round() as i32,
    })
}

/// A declared encoding wins over a weak guess, the way a transport-level
/// charset declaration would; a confident detection wins over the hint.
fn apply_hint(
    charset: String,
    confidence: f32,
    language: String,
    hint: Option<&str>,
) -> (String, f32, String) {
    if let Some(label) = hint {
        if confidence < DECLARED_HINT_FLOOR {
            if let Some(encoding) = Encoding::for_label(label.trim().as_bytes()) {
                return (encoding.name().to_string(), DECLARED_HINT_FLOOR, String::new());
            }
        }
    }
    (charset, confidence, language)
}

/// Converts `bytes` from the detected encoding to UTF-8 via the Unicode
/// pivot. Returns the converted bytes and whether any input sequences were
/// dropped on the way.
pub(crate) fn convert_to_utf8(
    label: &str,
    bytes: &[u8],
    force_drop: bool,
) -> Result<(Vec<u8>, bool), ConvertError> {
    let (unicode, dropped) = to_unicode(label, bytes, force_drop)?;
    // The String pivot is guaranteed Unicode; serializing it to UTF-8
    // cannot fail or drop anything further.
    Ok((unicode.into_bytes(), dropped))
}

fn to_unicode(label: &str, bytes: &[u8], force_drop: bool) -> Result<(String, bool), ConvertError> {
    let name = label.to_string();
    let encoding = Encoding::for_label(charset2encoding(&name).as_bytes())
        .ok_or_else(|| ConvertError::UnknownEncoding(name.clone()))?;
    if force_drop {
        decode_skipping(encoding, bytes)
    } else {
        decode_strict(encoding, bytes)
    }
}

fn decode_strict(
    encoding: &'static Encoding,
    bytes: &[u8],
) -> Result<(String, bool), ConvertError> {
    let (text, had_errors) = encoding.decode_without_bom_handling(bytes);
    if had_errors {
        return Err(ConvertError::Malformed(encoding.name().to_string()));
    }
    Ok((text.into_owned(), false))
}

/// Decodes while skipping malformed sequences, reporting whether any were
/// skipped. Driving the decoder without replacement keeps a legitimate
/// U+FFFD already present in the data distinct from an error marker.
fn decode_skipping(
    encoding: &'static Encoding,
    bytes: &[u8],
) -> Result<(String, bool), ConvertError> {
    let mut decoder = encoding.new_decoder_without_bom_handling();
    let capacity = decoder
        .max_utf8_buffer_length_without_replacement(bytes.len())
        .unwrap_or(bytes.len().saturating_mul(3));
    let mut output = String::with_capacity(capacity);
    let mut dropped = false;
    let mut rest = bytes;
    loop {
        let (result, read) = decoder.decode_to_string_without_replacement(rest, &mut output, true);
        rest = &rest[read..];
        match result {
            DecoderResult::InputEmpty => break,
            // The malformed bytes were consumed; carrying on from here is
            // the skip.
            DecoderResult::Malformed(_, _) => dropped = true,
            DecoderResult::OutputFull => {
                let more = decoder
                    .max_utf8_buffer_length_without_replacement(rest.len())
                    .unwrap_or(rest.len().saturating_mul(3))
                    .max(4);
                output.reserve(more);
            }
        }
    }
    Ok((output, dropped))
}
