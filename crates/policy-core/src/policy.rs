// Copyright The OpenTelemetry Authors
// SPDX-License-Identifier: Apache-2.0

//! The compiled, immutable [`Policy`] and its `keep` decision shape.

use crate::matcher::Matcher;
use crate::rate_limiter::RateLimitConfig;
use crate::sampler::SampleConfig;
use crate::transform::TransformOp;
use otel_policy_views::{FieldRef, Signal};
use std::sync::atomic::{AtomicU64, Ordering};

/// A policy's keep decision, compiled from its `keep` JSON object.
#[derive(Debug, Clone)]
pub enum Keep {
    /// Unconditionally keeps every matching record.
    All,
    /// Unconditionally drops every matching record.
    None,
    /// Probabilistic, consistent sampling.
    Sample {
        /// Sampling configuration.
        config: SampleConfig,
        /// Optional attribute used as the dice source when the record has
        /// no trace id (logs/metrics).
        key: Option<FieldRef>,
    },
    /// Token-bucket rate limiting.
    RateLimit {
        /// Bucket configuration.
        config: RateLimitConfig,
        /// Optional attribute partitioning the bucket per distinct value.
        key: Option<FieldRef>,
    },
}

impl Keep {
    /// This decision's strictness rank for most-restrictive-wins
    /// combination: lower is stricter.
    ///
    /// `none` (0) is strictest, then `rate_limit` (1), then `sample` (2),
    /// then `all` (3, least restrictive). Ties within `rate_limit`/`sample`
    /// are broken by the combinator evaluating the decisions themselves,
    /// not this rank alone.
    #[must_use]
    pub const fn strictness_rank(&self) -> u8 {
        match self {
            Keep::None => 0,
            Keep::RateLimit { .. } => 1,
            Keep::Sample { .. } => 2,
            Keep::All => 3,
        }
    }
}

/// A compiled, immutable policy.
///
/// Built once by the `ingest` module and held inside a
/// [`crate::registry::PolicyRegistry`] snapshot. Matchers and transforms
/// allocate only at compile time; evaluation never allocates except where a
/// record's own field values are copied out through the accessor.
#[derive(Debug)]
pub struct Policy {
    id: String,
    enabled: bool,
    signal: Signal,
    matchers: Vec<Matcher>,
    keep: Keep,
    transforms: Vec<TransformOp>,
    hits: AtomicU64,
    misses: AtomicU64,
}

impl Policy {
    /// Builds a compiled policy. `transforms` must already be sorted by
    /// [`TransformOp::sort_key`] (the `ingest` module's job).
    #[must_use]
    pub fn new(
        id: String,
        enabled: bool,
        signal: Signal,
        matchers: Vec<Matcher>,
        keep: Keep,
        transforms: Vec<TransformOp>,
    ) -> Self {
        Self {
            id,
            enabled,
            signal,
            matchers,
            keep,
            transforms,
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
        }
    }

    /// The policy's id, unique within its registry snapshot.
    #[must_use]
    pub fn id(&self) -> &str {
        &self.id
    }

    /// Whether this policy is active. Disabled policies are skipped
    /// entirely during evaluation and never touch their counters.
    #[must_use]
    pub fn enabled(&self) -> bool {
        self.enabled
    }

    /// The signal this policy targets.
    #[must_use]
    pub fn signal(&self) -> Signal {
        self.signal
    }

    /// The policy's compiled match predicates. A record matches the policy
    /// when every matcher evaluates true: an implicit AND across the list.
    #[must_use]
    pub fn matchers(&self) -> &[Matcher] {
        &self.matchers
    }

    /// The policy's keep decision.
    #[must_use]
    pub fn keep(&self) -> &Keep {
        &self.keep
    }

    /// The policy's compiled transforms, in canonical
    /// remove/redact/rename/add order.
    #[must_use]
    pub fn transforms(&self) -> &[TransformOp] {
        &self.transforms
    }

    /// Records one matching record against this policy's hit counter.
    /// Relaxed ordering: these are monitoring counters, not synchronization
    /// points.
    pub fn record_hit(&self) {
        self.hits.fetch_add(1, Ordering::Relaxed);
    }

    /// Records one non-matching record against this policy's miss counter.
    pub fn record_miss(&self) {
        self.misses.fetch_add(1, Ordering::Relaxed);
    }

    /// Current hit count.
    #[must_use]
    pub fn hits(&self) -> u64 {
        self.hits.load(Ordering::Relaxed)
    }

    /// Current miss count.
    #[must_use]
    pub fn misses(&self) -> u64 {
        self.misses.load(Ordering::Relaxed)
    }

    /// Reads and atomically zeroes both counters, for `collect_stats`'s
    /// snapshot-and-reset contract. Sequentially consistent, since this is
    /// the one place a counter read must not tear against a concurrent
    /// `record_hit`/`record_miss`.
    pub fn take_counters(&self) -> (u64, u64) {
        (
            self.hits.swap(0, Ordering::SeqCst),
            self.misses.swap(0, Ordering::SeqCst),
        )
    }
}
