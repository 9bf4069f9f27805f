// Copyright The OpenTelemetry Authors
// SPDX-License-Identifier: Apache-2.0

//! Policy ingest: compiles the wire JSON policy schema into compiled
//! [`Policy`] values, or rejects the whole batch.
//!
//! Validation is hand-walked over a [`serde_json::Value`] rather than
//! derived with `#[derive(Deserialize)]`, in the style of
//! `otap-df-config::policy::Policies::validation_errors`: every problem in
//! the batch is collected (not just the first) so a caller sees the whole
//! list of things to fix in one round trip. Ingest is all-or-nothing: one
//! malformed policy in a batch rejects the whole batch, and the registry's
//! prior snapshot survives untouched on any failure.

use crate::error::{IngestError, RegistryUpdateRejected};
use crate::matcher::{Matcher, Predicate};
use crate::policy::{Keep, Policy};
use crate::rate_limiter::{RateLimitConfig, Window};
use crate::sampler::{SampleConfig, SampleMode};
use crate::transform::{TransformKind, TransformOp};
use hashbrown::HashSet;
use otel_policy_views::{AttributeScope, FieldRef, FixedField, Signal};
use serde_json::Value;

/// A source of compiled policy snapshots.
///
/// Implementations typically wrap [`compile_policies`] around whatever
/// transport delivers the wire JSON (a file watch, a config RPC, ...); the
/// watch/transport machinery itself is out of scope here.
pub trait PolicyProvider {
    /// Returns the full desired policy set. An error here aborts the
    /// registry update and leaves the prior snapshot in place.
    fn load(&self) -> Result<Vec<Policy>, RegistryUpdateRejected>;
}

/// Compiles a wire JSON document into a policy set sorted in ascending `id`
/// order, or the full list of reasons it was rejected.
pub fn compile_policies(json: &str) -> Result<Vec<Policy>, RegistryUpdateRejected> {
    let doc: Value = match serde_json::from_str(json) {
        Ok(v) => v,
        Err(e) => {
            return Err(RegistryUpdateRejected::new(vec![IngestError::MalformedJson {
                message: e.to_string(),
            }]));
        }
    };

    let Some(policies_arr) = doc.get("policies").and_then(Value::as_array) else {
        return Err(RegistryUpdateRejected::new(vec![IngestError::MalformedJson {
            message: "top-level document must have a `policies` array".to_string(),
        }]));
    };

    let mut errors = Vec::new();
    let mut compiled = Vec::new();
    let mut seen_ids: HashSet<String> = HashSet::new();

    for (index, raw) in policies_arr.iter().enumerate() {
        match compile_one(index, raw) {
            Ok(policy) => {
                if seen_ids.insert(policy.id().to_string()) {
                    compiled.push(policy);
                } else {
                    errors.push(IngestError::DuplicatePolicyId {
                        id: policy.id().to_string(),
                    });
                }
            }
            Err(mut policy_errors) => errors.append(&mut policy_errors),
        }
    }

    if !errors.is_empty() {
        return Err(RegistryUpdateRejected::new(errors));
    }

    compiled.sort_by(|a, b| a.id().cmp(b.id()));
    Ok(compiled)
}

const SIGNAL_KEYS: [(&str, Signal); 3] =
    [("log", Signal::Log), ("metric", Signal::Metric), ("trace", Signal::Trace)];

fn compile_one(index: usize, raw: &Value) -> Result<Policy, Vec<IngestError>> {
    let mut errors = Vec::new();

    let id = raw.get("id").and_then(Value::as_str).unwrap_or("").to_string();
    if id.is_empty() {
        errors.push(IngestError::EmptyPolicyId { index });
    }

    let enabled = raw.get("enabled").and_then(Value::as_bool).unwrap_or(true);

    let Some((signal, body)) = SIGNAL_KEYS
        .iter()
        .find_map(|(key, signal)| raw.get(*key).map(|v| (*signal, v)))
    else {
        errors.push(IngestError::MalformedJson {
            message: format!("policy `{id}` must have exactly one of `log`, `metric`, `trace`"),
        });
        return Err(errors);
    };

    let matchers = compile_matchers(&id, signal, body, &mut errors);
    let keep = compile_keep(&id, body, &mut errors);
    let transforms = compile_transforms(&id, signal, body, &mut errors);

    let (Some(keep), true) = (keep, errors.is_empty()) else {
        return Err(errors);
    };
    let mut transforms = transforms;
    transforms.sort_by_key(TransformOp::sort_key);

    Ok(Policy::new(id, enabled, signal, matchers, keep, transforms))
}

fn compile_matchers(policy_id: &str, signal: Signal, body: &Value, errors: &mut Vec<IngestError>) -> Vec<Matcher> {
    let Some(match_arr) = body.get("match").and_then(Value::as_array) else {
        errors.push(IngestError::EmptyMatcherList {
            policy_id: policy_id.to_string(),
        });
        return Vec::new();
    };
    if match_arr.is_empty() {
        errors.push(IngestError::EmptyMatcherList {
            policy_id: policy_id.to_string(),
        });
        return Vec::new();
    }

    let mut matchers = Vec::with_capacity(match_arr.len());
    for (matcher_index, entry) in match_arr.iter().enumerate() {
        match compile_one_matcher(policy_id, signal, matcher_index, entry) {
            Ok(m) => matchers.push(m),
            Err(e) => errors.push(e),
        }
    }
    matchers
}

const FIXED_FIELD_KEYS: [(&str, Signal); 3] =
    [("log_field", Signal::Log), ("metric_field", Signal::Metric), ("trace_field", Signal::Trace)];
const RECORD_ATTRIBUTE_KEYS: [(&str, Signal); 3] = [
    ("log_attribute", Signal::Log),
    ("datapoint_attribute", Signal::Metric),
    ("span_attribute", Signal::Trace),
];

fn compile_one_matcher(
    policy_id: &str,
    signal: Signal,
    matcher_index: usize,
    entry: &Value,
) -> Result<Matcher, IngestError> {
    let Some(obj) = entry.as_object() else {
        return Err(IngestError::MalformedJson {
            message: format!("policy `{policy_id}`, matcher #{matcher_index}: expected an object"),
        });
    };

    let field_ref = parse_field_ref(policy_id, signal, matcher_index, obj)?;

    let predicate_keys = ["exact", "starts_with", "ends_with", "contains", "regex", "exists"];
    let present: Vec<&str> = predicate_keys.iter().copied().filter(|k| obj.contains_key(*k)).collect();
    if present.len() != 1 {
        return Err(IngestError::AmbiguousPredicate {
            policy_id: policy_id.to_string(),
            matcher_index,
            found: present.len(),
        });
    }

    let case_insensitive = obj.get("case_insensitive").and_then(Value::as_bool).unwrap_or(false);
    let negate = obj.get("negate").and_then(Value::as_bool).unwrap_or(false);

    let predicate = match present[0] {
        "exact" => Predicate::Exact(expect_str(policy_id, matcher_index, obj, "exact")?),
        "starts_with" => Predicate::StartsWith(expect_str(policy_id, matcher_index, obj, "starts_with")?),
        "ends_with" => Predicate::EndsWith(expect_str(policy_id, matcher_index, obj, "ends_with")?),
        "contains" => Predicate::Contains(expect_str(policy_id, matcher_index, obj, "contains")?),
        "regex" => {
            let pattern = expect_str(policy_id, matcher_index, obj, "regex")?;
            let compiled = Matcher::compile_regex(&pattern, case_insensitive).map_err(|message| {
                IngestError::InvalidRegex {
                    policy_id: policy_id.to_string(),
                    matcher_index,
                    pattern: pattern.clone(),
                    message,
                }
            })?;
            Predicate::Regex(Box::new(compiled))
        }
        "exists" => {
            let want = obj.get("exists").and_then(Value::as_bool).ok_or_else(|| IngestError::MalformedJson {
                message: format!("policy `{policy_id}`, matcher #{matcher_index}: `exists` must be a boolean"),
            })?;
            Predicate::Exists(want)
        }
        _ => unreachable!("present[0] is one of predicate_keys"),
    };

    Ok(Matcher::new(field_ref, predicate, case_insensitive, negate))
}

fn expect_str(policy_id: &str, matcher_index: usize, obj: &serde_json::Map<String, Value>, key: &str) -> Result<String, IngestError> {
    obj.get(key)
        .and_then(Value::as_str)
        .map(str::to_string)
        .ok_or_else(|| IngestError::MalformedJson {
            message: format!("policy `{policy_id}`, matcher #{matcher_index}: `{key}` must be a string"),
        })
}

fn parse_field_ref(
    policy_id: &str,
    signal: Signal,
    matcher_index: usize,
    obj: &serde_json::Map<String, Value>,
) -> Result<FieldRef, IngestError> {
    for (key, required_signal) in FIXED_FIELD_KEYS {
        if let Some(value) = obj.get(key) {
            let Some(name) = value.as_str() else {
                return Err(IngestError::MalformedJson {
                    message: format!("policy `{policy_id}`, matcher #{matcher_index}: `{key}` must be a string"),
                });
            };
            if required_signal != signal {
                return Err(IngestError::UnknownField {
                    policy_id: policy_id.to_string(),
                    field_name: key.to_string(),
                    signal: signal.wire_name().to_string(),
                });
            }
            let field = FixedField::from_wire_name(name).filter(|f| f.valid_for(signal)).ok_or_else(|| {
                IngestError::UnknownField {
                    policy_id: policy_id.to_string(),
                    field_name: name.to_string(),
                    signal: signal.wire_name().to_string(),
                }
            })?;
            return Ok(FieldRef::Fixed(field));
        }
    }

    for (key, required_signal) in RECORD_ATTRIBUTE_KEYS {
        if let Some(value) = obj.get(key) {
            if required_signal != signal {
                return Err(IngestError::UnknownField {
                    policy_id: policy_id.to_string(),
                    field_name: key.to_string(),
                    signal: signal.wire_name().to_string(),
                });
            }
            let path = parse_path(policy_id, matcher_index, value)?;
            return Ok(FieldRef::Attribute { scope: AttributeScope::Record, path });
        }
    }

    for (key, scope) in [("resource_attribute", AttributeScope::Resource), ("scope_attribute", AttributeScope::Scope)] {
        if let Some(value) = obj.get(key) {
            let path = parse_path(policy_id, matcher_index, value)?;
            return Ok(FieldRef::Attribute { scope, path });
        }
    }

    Err(IngestError::MalformedJson {
        message: format!(
            "policy `{policy_id}`, matcher #{matcher_index}: missing a field reference key"
        ),
    })
}

fn parse_path(policy_id: &str, matcher_index: usize, value: &Value) -> Result<Vec<String>, IngestError> {
    let malformed = || IngestError::MalformedJson {
        message: format!(
            "policy `{policy_id}`, matcher #{matcher_index}: attribute path must be a string or array of strings"
        ),
    };
    let path = match value {
        Value::String(s) => vec![s.clone()],
        Value::Array(items) => items
            .iter()
            .map(|v| v.as_str().map(str::to_string))
            .collect::<Option<Vec<String>>>()
            .ok_or_else(malformed)?,
        _ => return Err(malformed()),
    };
    if path.is_empty() {
        return Err(malformed());
    }
    Ok(path)
}

/// Interprets a bare `key` string (as used in `sample.key` / `rate_limit.key`)
/// as a record-level attribute path. The schema gives this field no explicit
/// scope wrapper, unlike matcher field references; this is the ingest
/// layer's resolution of that gap (see `DESIGN.md`).
fn bare_key_field_ref(key: &str) -> FieldRef {
    FieldRef::Attribute {
        scope: AttributeScope::Record,
        path: vec![key.to_string()],
    }
}

fn compile_keep(policy_id: &str, body: &Value, errors: &mut Vec<IngestError>) -> Option<Keep> {
    let Some(keep_value) = body.get("keep") else {
        errors.push(IngestError::UnknownKeepKind { policy_id: policy_id.to_string() });
        return None;
    };

    if let Some(s) = keep_value.as_str() {
        return match s {
            "all" => Some(Keep::All),
            "none" => Some(Keep::None),
            _ => {
                errors.push(IngestError::UnknownKeepKind { policy_id: policy_id.to_string() });
                None
            }
        };
    }

    let Some(obj) = keep_value.as_object() else {
        errors.push(IngestError::UnknownKeepKind { policy_id: policy_id.to_string() });
        return None;
    };

    if let Some(sample_value) = obj.get("sample") {
        return compile_sample(policy_id, sample_value, errors).map(|(config, key)| Keep::Sample { config, key });
    }
    if let Some(rl_value) = obj.get("rate_limit") {
        return compile_rate_limit(policy_id, rl_value, errors).map(|(config, key)| Keep::RateLimit { config, key });
    }

    errors.push(IngestError::UnknownKeepKind { policy_id: policy_id.to_string() });
    None
}

fn compile_sample(policy_id: &str, value: &Value, errors: &mut Vec<IngestError>) -> Option<(SampleConfig, Option<FieldRef>)> {
    let Some(obj) = value.as_object() else {
        errors.push(IngestError::UnknownKeepKind { policy_id: policy_id.to_string() });
        return None;
    };

    let errors_before = errors.len();

    // Both endpoints are valid: `percentage == 0` behaves like `keep: none`
    // and `percentage == 100` like `keep: all` (while still writing `th:0`),
    // so neither is rejected; only outside the closed `[0, 100]` is an error.
    let percentage = obj.get("percentage").and_then(Value::as_f64).unwrap_or(-1.0);
    if !(0.0..=100.0).contains(&percentage) {
        errors.push(IngestError::PercentageOutOfRange {
            policy_id: policy_id.to_string(),
            percentage,
        });
    }

    let mode = match obj.get("mode").and_then(Value::as_str).unwrap_or("proportional") {
        "proportional" => SampleMode::Proportional,
        "equalizing" => SampleMode::Equalizing,
        other => {
            errors.push(IngestError::UnknownSampleMode {
                policy_id: policy_id.to_string(),
                mode: other.to_string(),
            });
            SampleMode::Proportional
        }
    };

    let precision = obj.get("precision").and_then(Value::as_u64).map_or(14, |p| p as u32);
    if !(1..=14).contains(&precision) {
        errors.push(IngestError::PrecisionOutOfRange {
            policy_id: policy_id.to_string(),
            precision,
        });
    }

    let fail_closed = obj.get("fail_closed").and_then(Value::as_bool).unwrap_or(false);
    let key = obj.get("key").and_then(Value::as_str).map(bare_key_field_ref);

    if errors.len() > errors_before {
        return None;
    }

    Some((
        SampleConfig {
            percentage,
            mode,
            precision,
            fail_closed,
        },
        key,
    ))
}

fn compile_rate_limit(policy_id: &str, value: &Value, errors: &mut Vec<IngestError>) -> Option<(RateLimitConfig, Option<FieldRef>)> {
    let Some(obj) = value.as_object() else {
        errors.push(IngestError::UnknownKeepKind { policy_id: policy_id.to_string() });
        return None;
    };

    let count = obj.get("count").and_then(Value::as_u64).unwrap_or(0);
    if count == 0 {
        errors.push(IngestError::InvalidRateLimitCount {
            policy_id: policy_id.to_string(),
        });
    }

    let per = match obj.get("per").and_then(Value::as_str) {
        Some(s) => match Window::from_wire_name(s) {
            Some(w) => w,
            None => {
                errors.push(IngestError::UnknownRateLimitWindow {
                    policy_id: policy_id.to_string(),
                    per: s.to_string(),
                });
                Window::Second
            }
        },
        None => {
            errors.push(IngestError::UnknownRateLimitWindow {
                policy_id: policy_id.to_string(),
                per: String::new(),
            });
            Window::Second
        }
    };

    let key = obj.get("key").and_then(Value::as_str).map(bare_key_field_ref);

    if count == 0 {
        return None;
    }

    Some((RateLimitConfig { count, per }, key))
}

fn compile_transforms(policy_id: &str, signal: Signal, body: &Value, errors: &mut Vec<IngestError>) -> Vec<TransformOp> {
    let Some(arr) = body.get("transforms").and_then(Value::as_array) else {
        return Vec::new();
    };

    let mut ops = Vec::with_capacity(arr.len());
    for (transform_index, entry) in arr.iter().enumerate() {
        match compile_one_transform(policy_id, signal, transform_index, entry) {
            Ok(op) => ops.push(op),
            Err(e) => errors.push(e),
        }
    }
    ops
}

fn compile_one_transform(
    policy_id: &str,
    signal: Signal,
    transform_index: usize,
    entry: &Value,
) -> Result<TransformOp, IngestError> {
    let Some(obj) = entry.as_object() else {
        return Err(IngestError::MalformedJson {
            message: format!("policy `{policy_id}`, transform #{transform_index}: expected an object"),
        });
    };

    let kind_keys = ["remove", "redact", "rename", "add"];
    let present: Vec<&str> = kind_keys.iter().copied().filter(|k| obj.contains_key(*k)).collect();
    let [kind_key] = present.as_slice() else {
        return Err(IngestError::UnknownTransformKind {
            policy_id: policy_id.to_string(),
            transform_index,
        });
    };

    let field_ref = parse_transform_field_ref(policy_id, signal, transform_index, &obj[*kind_key])?;

    let upsert = obj.get("upsert").and_then(Value::as_bool).unwrap_or(true);

    let kind = match *kind_key {
        "remove" => TransformKind::Remove,
        "redact" => {
            let value = obj.get("value").and_then(Value::as_str).ok_or_else(|| IngestError::MissingTransformField {
                policy_id: policy_id.to_string(),
                transform_index,
                field: "value",
            })?;
            TransformKind::Redact { value: value.to_string() }
        }
        "add" => {
            let value = obj.get("value").and_then(Value::as_str).ok_or_else(|| IngestError::MissingTransformField {
                policy_id: policy_id.to_string(),
                transform_index,
                field: "value",
            })?;
            TransformKind::Add { value: value.to_string(), upsert }
        }
        "rename" => {
            if matches!(field_ref, FieldRef::Fixed(_)) {
                return Err(IngestError::RenameOnFixedField {
                    policy_id: policy_id.to_string(),
                    transform_index,
                });
            }
            let to = obj.get("to").and_then(Value::as_str).ok_or_else(|| IngestError::MissingTransformField {
                policy_id: policy_id.to_string(),
                transform_index,
                field: "to",
            })?;
            TransformKind::Rename { to: to.to_string(), upsert }
        }
        _ => unreachable!("kind_key is one of kind_keys"),
    };

    Ok(TransformOp::new(field_ref, kind))
}

fn parse_transform_field_ref(policy_id: &str, signal: Signal, transform_index: usize, value: &Value) -> Result<FieldRef, IngestError> {
    let malformed = || IngestError::MalformedJson {
        message: format!("policy `{policy_id}`, transform #{transform_index}: field reference must be a string or array of strings"),
    };

    if let Value::String(name) = value {
        if let Some(field) = FixedField::from_wire_name(name).filter(|f| f.valid_for(signal)) {
            return Ok(FieldRef::Fixed(field));
        }
    }

    let path = match value {
        Value::String(s) => vec![s.clone()],
        Value::Array(items) => items
            .iter()
            .map(|v| v.as_str().map(str::to_string))
            .collect::<Option<Vec<String>>>()
            .ok_or_else(malformed)?,
        _ => return Err(malformed()),
    };
    if path.is_empty() {
        return Err(malformed());
    }
    Ok(FieldRef::Attribute { scope: AttributeScope::Record, path })
}
