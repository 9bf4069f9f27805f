// Copyright The OpenTelemetry Authors
// SPDX-License-Identifier: Apache-2.0

//! Integration tests exercising concrete end-to-end scenarios through
//! [`compile_policies`], [`PolicyRegistry`], and [`Engine`] against the
//! in-memory reference accessor in `tests/common`.

mod common;

use common::RecordFixture;
use otel_policy_core::{collect_stats, compile_policies, Decision, Engine, PolicyRegistry};
use otel_policy_views::{FieldAccessor, FieldRef, FixedField, Signal};

fn registry_from(json: &str) -> PolicyRegistry {
    let policies = compile_policies(json).expect("fixture policy document compiles");
    PolicyRegistry::new(policies)
}

/// Severity-based drop.
#[test]
fn severity_drop_scenario() {
    let registry = registry_from(
        r#"{"policies": [
            { "id": "drop-debug", "enabled": true, "log": {
                "match": [{"log_field": "severity_text", "exact": "DEBUG"}],
                "keep": "none"
            }}
        ]}"#,
    );
    let engine = Engine::new(&registry);

    let mut debug_record =
        RecordFixture::new(Signal::Log).with_fixed(FixedField::SeverityText, "DEBUG");
    let mut info_record =
        RecordFixture::new(Signal::Log).with_fixed(FixedField::SeverityText, "INFO");

    assert_eq!(engine.evaluate_log(&mut debug_record).decision, Decision::Drop);
    assert_eq!(engine.evaluate_log(&mut info_record).decision, Decision::NoMatch);

    let stats = collect_stats(&registry);
    assert_eq!(stats.policies.len(), 1);
    assert_eq!(stats.policies[0].policy_id, "drop-debug");
    assert_eq!(stats.policies[0].hits, 1);
    assert_eq!(stats.policies[0].misses, 1);
}

/// Proportional sampling at 100% always keeps and writes `th:0`.
#[test]
fn proportional_sampling_at_100_percent() {
    let registry = registry_from(
        r#"{"policies": [
            { "id": "sample-all", "trace": {
                "match": [{"trace_field": "kind", "exists": false, "negate": true}],
                "keep": {"sample": {"percentage": 100, "mode": "proportional", "precision": 14}}
            }}
        ]}"#,
    );
    let engine = Engine::new(&registry);

    let mut span = RecordFixture::new(Signal::Trace)
        .with_trace_id([0xaa; 16])
        .with_span_kind("server");
    let verdict = engine.evaluate_trace(&mut span);

    assert_eq!(verdict.decision, Decision::Keep);
    let ts = span
        .raw_string(&FieldRef::Fixed(FixedField::TraceState))
        .expect("tracestate written back")
        .into_owned();
    assert!(ts.contains("th:0"));
}

/// Sampling preserves non-`ot` vendors verbatim and in order, merging only
/// the `ot=` vendor.
#[test]
fn tracestate_preserves_other_vendors() {
    let registry = registry_from(
        r#"{"policies": [
            { "id": "sample-half", "trace": {
                "match": [{"trace_field": "kind", "exists": false, "negate": true}],
                "keep": {"sample": {"percentage": 50, "mode": "proportional", "precision": 14}}
            }}
        ]}"#,
    );
    let engine = Engine::new(&registry);

    let mut span = RecordFixture::new(Signal::Trace)
        .with_trace_id([0xff; 16])
        .with_span_kind("server")
        .with_fixed(FixedField::TraceState, "vendora=xyz,ot=rv:1234,vendorb=p");

    let verdict = engine.evaluate_trace(&mut span);
    assert_eq!(verdict.decision, Decision::Keep);

    let ts = span
        .raw_string(&FieldRef::Fixed(FixedField::TraceState))
        .expect("tracestate written back")
        .into_owned();
    assert!(ts.starts_with("ot=rv:1234;th:"));
    assert!(ts.ends_with(",vendora=xyz,vendorb=p"));
    assert_eq!(ts.matches("ot=").count(), 1);
}

/// A 2-per-second rate limit keeps exactly the first two of a ten-record
/// burst.
#[test]
fn rate_limit_two_per_second_burst_of_ten() {
    let registry = registry_from(
        r#"{"policies": [
            { "id": "rl-info", "log": {
                "match": [{"log_field": "severity_text", "exact": "INFO"}],
                "keep": {"rate_limit": {"count": 2, "per": "second"}}
            }}
        ]}"#,
    );
    let engine = Engine::new(&registry);

    let kept = (0..10)
        .filter(|_| {
            let mut record =
                RecordFixture::new(Signal::Log).with_fixed(FixedField::SeverityText, "INFO");
            engine.evaluate_log(&mut record).decision == Decision::Keep
        })
        .count();
    assert_eq!(kept, 2);

    let stats = collect_stats(&registry);
    assert_eq!(stats.policies[0].hits, 10);
    assert_eq!(stats.policies[0].misses, 0);
}

/// Most-restrictive-wins: a `drop` and a `keep-all` policy both matching
/// the same record combine to `drop`, and both still hit.
#[test]
fn most_restrictive_wins_drop_beats_keep_all() {
    let registry = registry_from(
        r#"{"policies": [
            { "id": "keep-all", "log": {
                "match": [{"log_field": "severity_text", "exact": "INFO"}],
                "keep": "all"
            }},
            { "id": "drop-it", "log": {
                "match": [{"log_field": "severity_text", "exact": "INFO"}],
                "keep": "none"
            }}
        ]}"#,
    );
    let engine = Engine::new(&registry);

    let mut record = RecordFixture::new(Signal::Log).with_fixed(FixedField::SeverityText, "INFO");
    let verdict = engine.evaluate_log(&mut record);
    assert_eq!(verdict.decision, Decision::Drop);
    assert_eq!(verdict.matched_policy_ids, vec!["drop-it", "keep-all"]);

    let stats = collect_stats(&registry);
    assert!(stats.policies.iter().all(|p| p.hits == 1));
}

/// `rename a->b, upsert:false` with `b` already present leaves both
/// attributes untouched.
#[test]
fn rename_without_upsert_blocked_by_existing_target() {
    let registry = registry_from(
        r#"{"policies": [
            { "id": "rename-a-to-b", "log": {
                "match": [{"log_field": "body", "exists": true}],
                "keep": "all",
                "transforms": [{"rename": "a", "to": "b", "upsert": false}]
            }}
        ]}"#,
    );
    let engine = Engine::new(&registry);

    let mut record = RecordFixture::new(Signal::Log)
        .with_fixed(FixedField::Body, "hello")
        .with_record_attribute("a", "x")
        .with_record_attribute("b", "y");
    let verdict = engine.evaluate_log(&mut record);
    assert_eq!(verdict.decision, Decision::Keep);
    assert_eq!(record.record_attributes.get("a").map(String::as_str), Some("x"));
    assert_eq!(record.record_attributes.get("b").map(String::as_str), Some("y"));
}

/// Ordering independence: delivering the same two policies in either array
/// order produces an identical verdict, because the registry re-sorts by
/// id at ingest.
#[test]
fn ordering_independence_of_input_array() {
    let forward = registry_from(
        r#"{"policies": [
            { "id": "a-keep", "log": { "match": [{"log_field": "severity_text", "exact": "INFO"}], "keep": "all" } },
            { "id": "b-drop", "log": { "match": [{"log_field": "severity_text", "exact": "INFO"}], "keep": "none" } }
        ]}"#,
    );
    let backward = registry_from(
        r#"{"policies": [
            { "id": "b-drop", "log": { "match": [{"log_field": "severity_text", "exact": "INFO"}], "keep": "none" } },
            { "id": "a-keep", "log": { "match": [{"log_field": "severity_text", "exact": "INFO"}], "keep": "all" } }
        ]}"#,
    );

    let engine_forward = Engine::new(&forward);
    let engine_backward = Engine::new(&backward);

    let mut r1 = RecordFixture::new(Signal::Log).with_fixed(FixedField::SeverityText, "INFO");
    let mut r2 = RecordFixture::new(Signal::Log).with_fixed(FixedField::SeverityText, "INFO");

    assert_eq!(
        engine_forward.evaluate_log(&mut r1).decision,
        engine_backward.evaluate_log(&mut r2).decision,
    );
}

/// Disabled policies are inert: same verdict and stats as if removed.
#[test]
fn disabled_policy_is_equivalent_to_absent_policy() {
    let with_disabled = registry_from(
        r#"{"policies": [
            { "id": "would-drop", "enabled": false, "log": {
                "match": [{"log_field": "severity_text", "exact": "INFO"}],
                "keep": "none"
            }}
        ]}"#,
    );
    let without = registry_from(r#"{"policies": []}"#);

    let engine_with = Engine::new(&with_disabled);
    let engine_without = Engine::new(&without);

    let mut r1 = RecordFixture::new(Signal::Log).with_fixed(FixedField::SeverityText, "INFO");
    let mut r2 = RecordFixture::new(Signal::Log).with_fixed(FixedField::SeverityText, "INFO");

    assert_eq!(
        engine_with.evaluate_log(&mut r1).decision,
        engine_without.evaluate_log(&mut r2).decision,
    );
    assert_eq!(engine_with.evaluate_log(&mut r1).decision, Decision::NoMatch);

    let stats = collect_stats(&with_disabled);
    assert_eq!(stats.policies[0].hits, 0);
    assert_eq!(stats.policies[0].misses, 0);
}

/// Transform gating: a dropped record observes no mutation at all.
#[test]
fn drop_blocks_every_transform() {
    let registry = registry_from(
        r#"{"policies": [
            { "id": "redact-then-drop", "log": {
                "match": [{"log_field": "severity_text", "exact": "INFO"}],
                "keep": "none",
                "transforms": [{"redact": "secret", "value": "REDACTED"}]
            }}
        ]}"#,
    );
    let engine = Engine::new(&registry);
    let mut record = RecordFixture::new(Signal::Log)
        .with_fixed(FixedField::SeverityText, "INFO")
        .with_record_attribute("secret", "leaked");

    let verdict = engine.evaluate_log(&mut record);
    assert_eq!(verdict.decision, Decision::Drop);
    assert_eq!(record.record_attributes.get("secret").map(String::as_str), Some("leaked"));
}

/// Empty-vs-missing: `exact("")` matches a present-empty field;
/// `exists:false` does not, and `exists:false, negate:true` matches a
/// present field (including empty).
#[test]
fn empty_vs_missing_distinction() {
    let exact_empty = registry_from(
        r#"{"policies": [
            { "id": "match-empty", "log": {
                "match": [{"log_attribute": "k", "exact": ""}],
                "keep": "none"
            }}
        ]}"#,
    );
    let engine = Engine::new(&exact_empty);

    let mut present_empty = RecordFixture::new(Signal::Log).with_record_attribute("k", "");
    assert_eq!(engine.evaluate_log(&mut present_empty).decision, Decision::Drop);

    let mut absent = RecordFixture::new(Signal::Log);
    assert_eq!(engine.evaluate_log(&mut absent).decision, Decision::NoMatch);

    let exists_false = registry_from(
        r#"{"policies": [
            { "id": "absent-only", "log": {
                "match": [{"log_attribute": "k", "exists": false}],
                "keep": "none"
            }}
        ]}"#,
    );
    let engine2 = Engine::new(&exists_false);
    let mut present_empty2 = RecordFixture::new(Signal::Log).with_record_attribute("k", "");
    assert_eq!(engine2.evaluate_log(&mut present_empty2).decision, Decision::NoMatch);
    let mut absent2 = RecordFixture::new(Signal::Log);
    assert_eq!(engine2.evaluate_log(&mut absent2).decision, Decision::Drop);

    let exists_false_negated = registry_from(
        r#"{"policies": [
            { "id": "present-required", "log": {
                "match": [{"log_attribute": "k", "exists": false, "negate": true}],
                "keep": "none"
            }}
        ]}"#,
    );
    let engine3 = Engine::new(&exists_false_negated);
    let mut present_empty3 = RecordFixture::new(Signal::Log).with_record_attribute("k", "");
    assert_eq!(engine3.evaluate_log(&mut present_empty3).decision, Decision::Drop);
    let mut absent3 = RecordFixture::new(Signal::Log);
    assert_eq!(engine3.evaluate_log(&mut absent3).decision, Decision::NoMatch);
}

/// Determinism: evaluating the same snapshot against the same record twice
/// produces identical verdicts.
#[test]
fn determinism_across_repeated_evaluation() {
    let registry = registry_from(
        r#"{"policies": [
            { "id": "keep-all", "log": { "match": [{"log_field": "body", "exists": true}], "keep": "all" } }
        ]}"#,
    );
    let engine = Engine::new(&registry);
    let mut r1 = RecordFixture::new(Signal::Log).with_fixed(FixedField::Body, "hi");
    let mut r2 = RecordFixture::new(Signal::Log).with_fixed(FixedField::Body, "hi");
    assert_eq!(engine.evaluate_log(&mut r1), engine.evaluate_log(&mut r2));
}

/// Policy ingest is fail-closed and atomic: an invalid update leaves a
/// prior good snapshot untouched.
#[test]
fn invalid_reload_preserves_prior_snapshot() {
    let registry = registry_from(
        r#"{"policies": [
            { "id": "keep-all", "log": { "match": [{"log_field": "body", "exists": true}], "keep": "all" } }
        ]}"#,
    );
    assert!(compile_policies(r#"{"policies": [{"id": "", "log": {"match": [], "keep": "bogus"}}]}"#).is_err());
    assert_eq!(registry.snapshot().len(), 1);
    assert_eq!(registry.snapshot()[0].id(), "keep-all");
}
