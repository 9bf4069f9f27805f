// Copyright The OpenTelemetry Authors
// SPDX-License-Identifier: Apache-2.0

//! Policy-evaluation engine core for OTLP logs, metrics, and spans.
//!
//! Given a compiled, atomically-swappable set of policies and a per-record
//! [`otel_policy_views::FieldAccessor`], this crate decides whether to keep
//! or drop the record, applies in-place mutations to survivors, and reports
//! per-policy match statistics. It also computes and writes W3C `tracestate`
//! sampling thresholds for spans that survive probabilistic sampling.
//!
//! The crate never returns an error from record evaluation: every failure
//! mode (invalid regex, out-of-range percentage, malformed trace id, ...) is
//! either caught at policy ingest ([`ingest::compile_policies`]) or absorbed
//! into a policy's own `fail_closed` behavior. See [`error::IngestError`]
//! for the full ingest-time error taxonomy.
//!
//! ```text
//! PolicyProvider -> ingest::compile_policies -> PolicyRegistry -> Engine -> Verdict
//! ```

pub mod engine;
pub mod error;
pub mod ids;
pub mod ingest;
pub mod matcher;
pub mod policy;
pub mod rate_limiter;
pub mod registry;
pub mod sampler;
pub mod stats;
pub mod transform;

pub use engine::{Decision, Engine, Verdict};
pub use error::{IngestError, RegistryUpdateRejected};
pub use ids::{decode_hex, decode_trace_id, encode_hex};
pub use ingest::{compile_policies, PolicyProvider};
pub use matcher::{Matcher, Predicate};
pub use policy::{Keep, Policy};
pub use rate_limiter::{RateLimitConfig, RateLimiter, Window};
pub use registry::PolicyRegistry;
pub use sampler::{SampleConfig, SampleMode};
pub use stats::{collect_stats, PolicyStats, StatsReport};
pub use transform::{TransformKind, TransformOp};

pub use otel_policy_views::{AttributeScope, FieldAccessor, FieldRef, FixedField, Presence, Signal};
