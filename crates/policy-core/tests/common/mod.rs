// Copyright The OpenTelemetry Authors
// SPDX-License-Identifier: Apache-2.0

//! A plain, in-memory [`FieldAccessor`] used only by the integration tests
//! in this crate's `tests/` directory — one concrete backend standing in
//! for whatever production representation (pb-generated structs, a
//! pdata-style zero-copy view) a real caller would plug in.

use otel_policy_core::{encode_hex, AttributeScope, FieldAccessor, FieldRef, FixedField, Signal};
use std::collections::BTreeMap;

/// A single in-memory record: one signal's worth of fixed fields, plus
/// record/resource/scope attribute maps.
#[derive(Debug, Clone)]
pub struct RecordFixture {
    pub signal: Signal,
    pub fixed: BTreeMap<FixedField, String>,
    pub record_attributes: BTreeMap<String, String>,
    pub resource_attributes: BTreeMap<String, String>,
    pub scope_attributes: BTreeMap<String, String>,
    pub trace_id: Option<[u8; 16]>,
    pub metric_type: Option<&'static str>,
    pub aggregation_temporality: Option<&'static str>,
    pub span_kind: Option<&'static str>,
    pub span_status: Option<&'static str>,
}

impl RecordFixture {
    pub fn new(signal: Signal) -> Self {
        Self {
            signal,
            fixed: BTreeMap::new(),
            record_attributes: BTreeMap::new(),
            resource_attributes: BTreeMap::new(),
            scope_attributes: BTreeMap::new(),
            trace_id: None,
            metric_type: None,
            aggregation_temporality: None,
            span_kind: None,
            span_status: None,
        }
    }

    pub fn with_fixed(mut self, field: FixedField, value: impl Into<String>) -> Self {
        self.fixed.insert(field, value.into());
        self
    }

    pub fn with_record_attribute(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.record_attributes.insert(key.into(), value.into());
        self
    }

    pub fn with_trace_id(mut self, id: [u8; 16]) -> Self {
        self.trace_id = Some(id);
        self.fixed.insert(FixedField::TraceId, encode_hex(&id));
        self
    }

    pub fn with_metric_type(mut self, tag: &'static str) -> Self {
        self.metric_type = Some(tag);
        self
    }

    pub fn with_aggregation_temporality(mut self, tag: &'static str) -> Self {
        self.aggregation_temporality = Some(tag);
        self
    }

    pub fn with_span_kind(mut self, tag: &'static str) -> Self {
        self.span_kind = Some(tag);
        self
    }

    pub fn with_span_status(mut self, tag: &'static str) -> Self {
        self.span_status = Some(tag);
        self
    }

    fn map_for(&self, scope: AttributeScope) -> &BTreeMap<String, String> {
        match scope {
            AttributeScope::Record => &self.record_attributes,
            AttributeScope::Resource => &self.resource_attributes,
            AttributeScope::Scope => &self.scope_attributes,
        }
    }

    fn map_for_mut(&mut self, scope: AttributeScope) -> &mut BTreeMap<String, String> {
        match scope {
            AttributeScope::Record => &mut self.record_attributes,
            AttributeScope::Resource => &mut self.resource_attributes,
            AttributeScope::Scope => &mut self.scope_attributes,
        }
    }
}

impl FieldAccessor for RecordFixture {
    fn signal(&self) -> Signal {
        self.signal
    }

    fn raw_string(&self, field_ref: &FieldRef) -> Option<std::borrow::Cow<'_, str>> {
        match field_ref {
            // The four enum-valued fixed fields are routed through their
            // dedicated "special reader" methods, as a real backend would:
            // those hold the canonical lowercase tag, and `fixed` is not
            // the source of truth for them.
            FieldRef::Fixed(FixedField::MetricType) => self.metric_type_tag().map(std::borrow::Cow::Borrowed),
            FieldRef::Fixed(FixedField::AggregationTemporality) => {
                self.aggregation_temporality_tag().map(std::borrow::Cow::Borrowed)
            }
            FieldRef::Fixed(FixedField::Kind) => self.span_kind_tag().map(std::borrow::Cow::Borrowed),
            FieldRef::Fixed(FixedField::Status) => self.span_status_tag().map(std::borrow::Cow::Borrowed),
            FieldRef::Fixed(field) => self.fixed.get(field).map(|s| std::borrow::Cow::Borrowed(s.as_str())),
            FieldRef::Attribute { scope, path } => {
                let mut current = self.map_for(*scope);
                let (last, rest) = path.split_last()?;
                for key in rest {
                    // Only depth-1 values are strings in this fixture; a
                    // deeper path through a non-map intermediate resolves
                    // to nothing rather than erroring.
                    if current.contains_key(key) {
                        return None;
                    }
                }
                current.get(last).map(|s| std::borrow::Cow::Borrowed(s.as_str()))
            }
        }
    }

    fn set_string(&mut self, field_ref: &FieldRef, value: &str) -> bool {
        match field_ref {
            FieldRef::Fixed(field) => self.fixed.insert(*field, value.to_string()).is_some(),
            FieldRef::Attribute { scope, .. } => match field_ref.write_key() {
                Some(key) => self.map_for_mut(*scope).insert(key.to_string(), value.to_string()).is_some(),
                None => false,
            },
        }
    }

    fn remove(&mut self, field_ref: &FieldRef) -> bool {
        match field_ref {
            FieldRef::Fixed(field) => self.fixed.remove(field).is_some(),
            FieldRef::Attribute { scope, .. } => match field_ref.write_key() {
                Some(key) => self.map_for_mut(*scope).remove(key).is_some(),
                None => false,
            },
        }
    }

    fn rename(&mut self, field_ref: &FieldRef, to: &str, upsert: bool) -> bool {
        let FieldRef::Attribute { scope, .. } = field_ref else {
            return false;
        };
        let Some(key) = field_ref.write_key() else {
            return false;
        };
        let map = self.map_for_mut(*scope);
        let Some(value) = map.get(key).cloned() else {
            return false;
        };
        if map.contains_key(to) && !upsert {
            return true;
        }
        map.remove(key);
        map.insert(to.to_string(), value);
        true
    }

    fn trace_id_bytes(&self) -> Option<[u8; 16]> {
        self.trace_id
    }

    fn metric_type_tag(&self) -> Option<&'static str> {
        self.metric_type
    }

    fn aggregation_temporality_tag(&self) -> Option<&'static str> {
        self.aggregation_temporality
    }

    fn span_kind_tag(&self) -> Option<&'static str> {
        self.span_kind
    }

    fn span_status_tag(&self) -> Option<&'static str> {
        self.span_status
    }
}
