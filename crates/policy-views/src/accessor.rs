// Copyright The OpenTelemetry Authors
// SPDX-License-Identifier: Apache-2.0

//! The [`FieldAccessor`] capability trait: the boundary between the policy
//! core and a concrete OTLP record representation (pb-generated, pdata-view,
//! or a plain map). Modeling this boundary as a trait rather than a
//! concrete record type lets multiple callers in the same process use
//! different representations concurrently, and lets the core stay free of
//! any one wire format's dependencies.

use crate::field_ref::{FieldRef, Signal};
use std::borrow::Cow;

/// Whether a field resolved to an absent value, a present-but-empty string,
/// or a present non-empty string. Distinguishing the last two is what lets
/// `exact("")` match a present-empty field while `exists: false` does not.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Presence {
    /// The field does not resolve: missing attribute key, path through a
    /// non-map intermediate, or the field slot itself is unset.
    Absent,
    /// The field resolves to the empty string.
    PresentEmpty,
    /// The field resolves to a non-empty string.
    PresentNonEmpty,
}

impl Presence {
    /// `exists(true)` semantics for a field with the given [`FixedField`]
    /// typing: typed fixed fields (e.g. `body`) count as present even when
    /// empty; everything else requires non-emptiness.
    ///
    /// [`FixedField`]: crate::field_ref::FixedField
    #[must_use]
    pub const fn exists(self, is_typed_field: bool) -> bool {
        match self {
            Presence::Absent => false,
            Presence::PresentEmpty => is_typed_field,
            Presence::PresentNonEmpty => true,
        }
    }
}

/// Capability set for reading and mutating one record (a log, a metric data
/// point, or a span) plus its enclosing resource/scope context.
///
/// Implementations are expected to be infallible: a read that cannot
/// resolve returns [`Presence::Absent`] / `None` rather than an error.
pub trait FieldAccessor {
    /// Which signal this accessor exposes. Used to validate that a
    /// compiled [`FieldRef`] is legal before it is ever evaluated.
    fn signal(&self) -> Signal;

    /// Resolves `field_ref` to its raw string value, if the underlying
    /// value exists and is string-shaped. Unlike [`FieldAccessor::get_string`],
    /// this does *not* fold empty strings to `None` — it is the method the
    /// matcher's `exact("")` predicate consults.
    fn raw_string(&self, field_ref: &FieldRef) -> Option<Cow<'_, str>>;

    /// Resolves `field_ref` to its string value, normalized so that an
    /// empty string reads as absent. This is what every predicate other
    /// than `exact("")` and `exists` should use.
    fn get_string(&self, field_ref: &FieldRef) -> Option<Cow<'_, str>> {
        self.raw_string(field_ref).filter(|s| !s.is_empty())
    }

    /// Presence classification used by the `exists` predicate.
    fn presence(&self, field_ref: &FieldRef) -> Presence {
        match self.raw_string(field_ref) {
            None => Presence::Absent,
            Some(s) if s.is_empty() => Presence::PresentEmpty,
            Some(_) => Presence::PresentNonEmpty,
        }
    }

    /// Overwrites `field_ref` with `value`. Returns `true` if the field
    /// existed (had any value, including empty) before the write.
    fn set_string(&mut self, field_ref: &FieldRef, value: &str) -> bool;

    /// Deletes `field_ref`. Returns `true` if it existed before removal.
    fn remove(&mut self, field_ref: &FieldRef) -> bool;

    /// Renames an attribute key in place. `upsert` controls what happens
    /// when `to` already exists: `true` overwrites it, `false` leaves both
    /// the source and the pre-existing target untouched. Returns `true` if
    /// the source field existed (regardless of whether the rename was
    /// actually performed).
    fn rename(&mut self, field_ref: &FieldRef, to: &str, upsert: bool) -> bool;

    /// The 16 raw trace-id bytes, if this record carries one and it decodes
    /// to exactly 16 bytes. Used by the sampler, which needs the binary
    /// value rather than the matcher-facing hex string.
    fn trace_id_bytes(&self) -> Option<[u8; 16]> {
        None
    }

    /// Canonical lowercase metric point type tag (`"sum"`, `"gauge"`,
    /// `"histogram"`, `"exponential_histogram"`, `"summary"`), if this
    /// accessor is backed by a metric data point.
    fn metric_type_tag(&self) -> Option<&'static str> {
        None
    }

    /// Canonical lowercase aggregation temporality tag (`"delta"`,
    /// `"cumulative"`), if applicable.
    fn aggregation_temporality_tag(&self) -> Option<&'static str> {
        None
    }

    /// Canonical lowercase span kind tag (`"unspecified"`, `"internal"`,
    /// `"server"`, `"client"`, `"producer"`, `"consumer"`), if this accessor
    /// is backed by a span.
    fn span_kind_tag(&self) -> Option<&'static str> {
        None
    }

    /// Canonical lowercase span status tag (`"unset"`, `"ok"`, `"error"`),
    /// if applicable.
    fn span_status_tag(&self) -> Option<&'static str> {
        None
    }
}
