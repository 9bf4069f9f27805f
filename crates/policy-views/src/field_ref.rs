// Copyright The OpenTelemetry Authors
// SPDX-License-Identifier: Apache-2.0

//! Field references: the compile-time address of a piece of data inside a
//! log, metric data point, or span.
//!
//! A `FieldRef` is resolved against a concrete record through the
//! [`crate::FieldAccessor`] capability trait; this module only describes
//! *where* a value lives, never how it is stored.

/// The three telemetry signals a policy can target.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Signal {
    /// Log records.
    Log,
    /// Metric data points.
    Metric,
    /// Spans.
    Trace,
}

impl Signal {
    /// The wire name used in the policy JSON schema (`"log"`, `"metric"`, `"trace"`).
    #[must_use]
    pub const fn wire_name(self) -> &'static str {
        match self {
            Signal::Log => "log",
            Signal::Metric => "metric",
            Signal::Trace => "trace",
        }
    }
}

/// A named field that exists directly on the signal's record shape, as
/// opposed to a key inside an attribute map.
///
/// Not every variant is valid for every [`Signal`]; see [`FixedField::valid_for`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum FixedField {
    /// Log body (`log`).
    Body,
    /// Log severity text (`log`).
    SeverityText,
    /// Log event name (`log`).
    EventName,
    /// Trace id, hex-encoded on read (`log`, `trace`).
    TraceId,
    /// Span id, hex-encoded on read (`log`, `trace`).
    SpanId,
    /// Parent span id, hex-encoded on read (`trace`).
    ParentSpanId,
    /// Span or metric name (`metric`, `trace`).
    Name,
    /// Metric description (`metric`).
    Description,
    /// Metric unit (`metric`).
    Unit,
    /// Metric point type, canonical lowercase tag (`metric`).
    MetricType,
    /// Aggregation temporality, canonical lowercase tag (`metric`).
    AggregationTemporality,
    /// Span kind, canonical lowercase tag (`trace`).
    Kind,
    /// Span status code, canonical lowercase tag (`trace`).
    Status,
    /// W3C `tracestate` header, raw text (`trace`).
    TraceState,
    /// Resource `schema_url` (all signals).
    ResourceSchemaUrl,
    /// Scope `schema_url` (all signals).
    ScopeSchemaUrl,
    /// Instrumentation scope name (all signals).
    ScopeName,
    /// Instrumentation scope version (all signals).
    ScopeVersion,
}

impl FixedField {
    /// Whether this fixed field is addressable on the given signal.
    #[must_use]
    pub const fn valid_for(self, signal: Signal) -> bool {
        use FixedField::{
            AggregationTemporality, Body, Description, EventName, Kind, MetricType, Name,
            ParentSpanId, ResourceSchemaUrl, ScopeName, ScopeSchemaUrl, ScopeVersion,
            SeverityText, SpanId, Status, TraceId, TraceState, Unit,
        };
        match self {
            ResourceSchemaUrl | ScopeSchemaUrl | ScopeName | ScopeVersion => true,
            Body | SeverityText | EventName => matches!(signal, Signal::Log),
            TraceId | SpanId => matches!(signal, Signal::Log | Signal::Trace),
            ParentSpanId | Kind | Status | TraceState => matches!(signal, Signal::Trace),
            Name => matches!(signal, Signal::Metric | Signal::Trace),
            Description | Unit | MetricType | AggregationTemporality => {
                matches!(signal, Signal::Metric)
            }
        }
    }

    /// Whether this field is "typed": a fixed slot that carries meaning even
    /// when its rendered value is the empty string (e.g. an explicitly empty
    /// `body`), as opposed to a generic string field where emptiness is
    /// indistinguishable from absence.
    #[must_use]
    pub const fn is_typed(self) -> bool {
        matches!(self, FixedField::Body)
    }

    /// Parses the wire name used in the policy JSON schema's
    /// `log_field`/`metric_field`/`trace_field` keys.
    #[must_use]
    pub fn from_wire_name(name: &str) -> Option<Self> {
        Some(match name {
            "body" => FixedField::Body,
            "severity_text" => FixedField::SeverityText,
            "event_name" => FixedField::EventName,
            "trace_id" => FixedField::TraceId,
            "span_id" => FixedField::SpanId,
            "parent_span_id" => FixedField::ParentSpanId,
            "name" => FixedField::Name,
            "description" => FixedField::Description,
            "unit" => FixedField::Unit,
            "type" => FixedField::MetricType,
            "aggregation_temporality" => FixedField::AggregationTemporality,
            "kind" => FixedField::Kind,
            "status" => FixedField::Status,
            "trace_state" => FixedField::TraceState,
            "resource_schema_url" => FixedField::ResourceSchemaUrl,
            "scope_schema_url" => FixedField::ScopeSchemaUrl,
            "scope_name" => FixedField::ScopeName,
            "scope_version" => FixedField::ScopeVersion,
            _ => return None,
        })
    }
}

/// The attribute map a path resolves into.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AttributeScope {
    /// The record-level attribute map: log attributes, metric data point
    /// attributes, or span attributes, depending on the policy's signal.
    Record,
    /// The enclosing resource's attribute map.
    Resource,
    /// The enclosing instrumentation scope's attribute map.
    Scope,
}

/// A compiled reference to a field: either a named slot on the record shape,
/// or a path into one of its attribute maps.
///
/// Reads may descend into nested attribute maps at any depth, but only a
/// depth-1 attribute path is a valid target for writes; see [`FieldRef::write_key`].
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum FieldRef {
    /// A named field on the record shape itself.
    Fixed(FixedField),
    /// A path into an attribute map. Non-empty by construction.
    Attribute {
        /// Which attribute map the path resolves into.
        scope: AttributeScope,
        /// The key path, outermost key first. Length 1 for write targets.
        path: Vec<String>,
    },
}

impl FieldRef {
    /// The top-level attribute key, if this is a depth-1 attribute
    /// reference valid as a write target.
    #[must_use]
    pub fn write_key(&self) -> Option<&str> {
        match self {
            FieldRef::Attribute { path, .. } if path.len() == 1 => {
                path.first().map(String::as_str)
            }
            _ => None,
        }
    }
}
