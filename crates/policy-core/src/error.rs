// Copyright The OpenTelemetry Authors
// SPDX-License-Identifier: Apache-2.0

//! Errors for the policy core: all failures are caught at policy ingest.
//! The engine never returns an error from `evaluate_*` — a record is always
//! kept, dropped, or left unmatched, never rejected.

use miette::Diagnostic;

/// A single reason one policy in an ingest batch was rejected.
///
/// Every variant names the offending policy id (and, where relevant, the
/// matcher or transform index within it) so that a caller surfaces exactly
/// which policy needs fixing, in the spirit of
/// `otap-df-config::error::Error`'s context-carrying variants.
#[derive(thiserror::Error, Debug, Diagnostic, Clone, PartialEq, Eq)]
pub enum IngestError {
    /// A policy's `id` field was empty.
    #[error("policy at index {index} has an empty id")]
    #[diagnostic(code(policy_core::empty_policy_id))]
    EmptyPolicyId {
        /// Position of the offending policy in the input array.
        index: usize,
    },

    /// Two policies in the same batch share an `id`.
    #[error("duplicate policy id `{id}`")]
    #[diagnostic(code(policy_core::duplicate_policy_id))]
    DuplicatePolicyId {
        /// The id that appeared more than once.
        id: String,
    },

    /// A policy had zero matchers in its `match` array.
    #[error("policy `{policy_id}` has an empty match list")]
    #[diagnostic(code(policy_core::empty_matcher_list))]
    EmptyMatcherList {
        /// The policy that failed validation.
        policy_id: String,
    },

    /// A matcher or transform referenced a field name the compiler does not
    /// recognize for the policy's signal.
    #[error("policy `{policy_id}`: unknown field `{field_name}` for signal `{signal}`")]
    #[diagnostic(code(policy_core::unknown_field))]
    UnknownField {
        /// The policy that failed validation.
        policy_id: String,
        /// The unrecognized field name.
        field_name: String,
        /// The policy's declared signal.
        signal: String,
    },

    /// A `regex` predicate failed to compile.
    #[error(
        "policy `{policy_id}`, matcher #{matcher_index}: invalid regex `{pattern}`: {message}"
    )]
    #[diagnostic(code(policy_core::invalid_regex))]
    InvalidRegex {
        /// The policy that failed validation.
        policy_id: String,
        /// Index of the offending matcher within the policy's `match` array.
        matcher_index: usize,
        /// The pattern that failed to compile.
        pattern: String,
        /// The underlying regex engine's error message.
        message: String,
    },

    /// A matcher specified more than one (or zero) of
    /// `exact`/`starts_with`/`ends_with`/`contains`/`regex`/`exists`.
    #[error(
        "policy `{policy_id}`, matcher #{matcher_index}: expected exactly one predicate, found {found}"
    )]
    #[diagnostic(code(policy_core::ambiguous_predicate))]
    AmbiguousPredicate {
        /// The policy that failed validation.
        policy_id: String,
        /// Index of the offending matcher.
        matcher_index: usize,
        /// How many predicate keys were present (0 or 2+).
        found: usize,
    },

    /// A policy's `keep` object did not match `"all"`, `"none"`, `{"sample": ...}`,
    /// or `{"rate_limit": ...}`.
    #[error("policy `{policy_id}`: unrecognized `keep` decision")]
    #[diagnostic(code(policy_core::unknown_keep_kind))]
    UnknownKeepKind {
        /// The policy that failed validation.
        policy_id: String,
    },

    /// A `sample.percentage` fell outside `[0, 100]`.
    #[error(
        "policy `{policy_id}`: sample percentage {percentage} is out of range [0, 100]"
    )]
    #[diagnostic(code(policy_core::percentage_out_of_range))]
    PercentageOutOfRange {
        /// The policy that failed validation.
        policy_id: String,
        /// The out-of-range percentage that was supplied.
        percentage: f64,
    },

    /// A `sample.precision` fell outside `[1, 14]`.
    #[error("policy `{policy_id}`: sample precision {precision} is out of range [1, 14]")]
    #[diagnostic(code(policy_core::precision_out_of_range))]
    PrecisionOutOfRange {
        /// The policy that failed validation.
        policy_id: String,
        /// The out-of-range precision that was supplied.
        precision: u32,
    },

    /// A `sample.mode` was neither `"proportional"` nor `"equalizing"`.
    #[error("policy `{policy_id}`: unknown sample mode `{mode}`")]
    #[diagnostic(code(policy_core::unknown_sample_mode))]
    UnknownSampleMode {
        /// The policy that failed validation.
        policy_id: String,
        /// The unrecognized mode string.
        mode: String,
    },

    /// A `rate_limit.count` was zero.
    #[error("policy `{policy_id}`: rate_limit.count must be greater than 0")]
    #[diagnostic(code(policy_core::invalid_rate_limit_count))]
    InvalidRateLimitCount {
        /// The policy that failed validation.
        policy_id: String,
    },

    /// A `rate_limit.per` was not one of `"second"`, `"minute"`, `"hour"`.
    #[error("policy `{policy_id}`: unknown rate_limit.per `{per}`")]
    #[diagnostic(code(policy_core::unknown_rate_limit_window))]
    UnknownRateLimitWindow {
        /// The policy that failed validation.
        policy_id: String,
        /// The unrecognized window string.
        per: String,
    },

    /// A transform's `kind` was not one of `"remove"`, `"redact"`, `"rename"`, `"add"`.
    #[error("policy `{policy_id}`, transform #{transform_index}: unknown transform kind")]
    #[diagnostic(code(policy_core::unknown_transform_kind))]
    UnknownTransformKind {
        /// The policy that failed validation.
        policy_id: String,
        /// Index of the offending transform within the policy's `transforms` array.
        transform_index: usize,
    },

    /// A `rename` transform targeted a fixed field. Fixed fields are valid
    /// targets for remove/redact/add but not rename.
    #[error(
        "policy `{policy_id}`, transform #{transform_index}: rename cannot target a fixed field"
    )]
    #[diagnostic(code(policy_core::rename_on_fixed_field))]
    RenameOnFixedField {
        /// The policy that failed validation.
        policy_id: String,
        /// Index of the offending transform.
        transform_index: usize,
    },

    /// A `redact`/`add` transform was missing its required `value`, or a
    /// `rename` was missing its required `to`.
    #[error("policy `{policy_id}`, transform #{transform_index}: missing required field `{field}`")]
    #[diagnostic(code(policy_core::missing_transform_field))]
    MissingTransformField {
        /// The policy that failed validation.
        policy_id: String,
        /// Index of the offending transform.
        transform_index: usize,
        /// The missing field's name (`"value"` or `"to"`).
        field: &'static str,
    },

    /// The top-level JSON document did not parse, or its outer shape did
    /// not match the `{"policies": [...]}` envelope.
    #[error("malformed policy document: {message}")]
    #[diagnostic(code(policy_core::malformed_json))]
    MalformedJson {
        /// A description of the parse failure.
        message: String,
    },
}

/// A batch of [`IngestError`]s that together caused an entire registry
/// update to be rejected.
///
/// Mirrors `otap-df-config::error::Error::InvalidConfiguration`: ingest is
/// all-or-nothing — individual-policy rejection is not supported, so that
/// the snapshot a registry ends up with is always either the old set intact
/// or the new set in full — and every problem in the batch is reported
/// together rather than failing fast on the first one.
#[derive(thiserror::Error, Debug, Diagnostic, Clone, PartialEq, Eq)]
#[error("rejected policy update: {} error(s)", .errors.len())]
#[diagnostic(code(policy_core::registry_update_rejected))]
pub struct RegistryUpdateRejected {
    /// Every validation failure found in the batch.
    #[related]
    pub errors: Vec<IngestError>,
}

impl RegistryUpdateRejected {
    /// Builds a rejection from a non-empty list of errors.
    #[must_use]
    pub fn new(errors: Vec<IngestError>) -> Self {
        Self { errors }
    }
}
