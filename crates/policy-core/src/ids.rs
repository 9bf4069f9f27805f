// Copyright The OpenTelemetry Authors
// SPDX-License-Identifier: Apache-2.0

//! Hex encoding helpers for trace/span ids.
//!
//! Trace and span ids are stored as raw bytes, with no re-parsing, while
//! still being readable through the matcher layer as hex text
//! (`FixedField::TraceId`/`SpanId`). A [`FieldAccessor`] implementor needs a
//! canonical, case-consistent hex codec to bridge its own binary id
//! representation and the accessor's string-shaped reads; this module is
//! that codec, shared so every implementor renders/parses ids identically
//! rather than hand-rolling `format!("{b:02x}")` loops per backend.
//!
//! [`FieldAccessor`]: otel_policy_views::FieldAccessor

use data_encoding::HEXLOWER_PERMISSIVE;

/// Renders `bytes` as lowercase hex, with no separators — the form used for
/// `trace_id`/`span_id`/`parent_span_id` reads.
#[must_use]
pub fn encode_hex(bytes: &[u8]) -> String {
    data_encoding::HEXLOWER.encode(bytes)
}

/// Parses a hex id string back to raw bytes. Accepts either case (a
/// `tracestate` or JSON source may carry uppercase hex); returns `None` on
/// any malformed input rather than erroring, consistent with the rest of
/// the accessor boundary being infallible.
#[must_use]
pub fn decode_hex(text: &str) -> Option<Vec<u8>> {
    HEXLOWER_PERMISSIVE.decode(text.as_bytes()).ok()
}

/// Parses a 32-hex-char trace id into its 16 raw bytes, the shape the
/// sampler consumes. `None` on anything else, including valid hex of the
/// wrong length — the sampler treats that as a malformed trace id and
/// defers to `fail_closed`.
#[must_use]
pub fn decode_trace_id(text: &str) -> Option<[u8; 16]> {
    let bytes = decode_hex(text)?;
    bytes.try_into().ok()
}
