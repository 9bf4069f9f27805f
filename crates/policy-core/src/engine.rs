// Copyright The OpenTelemetry Authors
// SPDX-License-Identifier: Apache-2.0

//! The per-record evaluation pipeline: matcher combinator,
//! most-restrictive-wins decision combination, transform application, and
//! sampler write-back.

use crate::policy::{Keep, Policy};
use crate::registry::PolicyRegistry;
use crate::transform;
use otel_policy_views::{FieldAccessor, FieldRef, FixedField, Signal};
use tracing::trace;

/// The engine's per-record verdict.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Decision {
    /// The record survives.
    Keep,
    /// The record is discarded; no further policy ran its transforms.
    Drop,
    /// No policy of this signal matched; the record survives by default.
    NoMatch,
}

/// The outcome of evaluating one record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Verdict {
    /// The combined decision.
    pub decision: Decision,
    /// Every policy that matched (hit), in ascending `id` order, regardless
    /// of which one's decision ultimately won the combination.
    pub matched_policy_ids: Vec<String>,
}

/// A single matched policy's own decision, before cross-policy combination.
///
/// Doubles as the combinator's strictness ranking: a `drop` outcome here —
/// whether from `keep: none` or from a `sample`/`rate_limit` policy whose
/// own per-record check denied the record — ranks identically to every
/// other `drop`, since at that point there is nothing left to distinguish.
#[derive(Debug, Clone, PartialEq, Eq)]
enum LocalOutcome {
    Drop,
    KeepRateLimit,
    KeepSample { tracestate: Option<String> },
    KeepAll,
}

impl LocalOutcome {
    const fn rank(&self) -> u8 {
        match self {
            LocalOutcome::Drop => 0,
            LocalOutcome::KeepRateLimit => 1,
            LocalOutcome::KeepSample { .. } => 2,
            LocalOutcome::KeepAll => 3,
        }
    }
}

/// Stateless evaluator: holds no data of its own beyond a borrow of the
/// registry it reads from.
pub struct Engine<'a> {
    registry: &'a PolicyRegistry,
}

impl<'a> Engine<'a> {
    /// Builds an engine over `registry`.
    #[must_use]
    pub fn new(registry: &'a PolicyRegistry) -> Self {
        Self { registry }
    }

    /// Evaluates one log record.
    pub fn evaluate_log(&self, accessor: &mut dyn FieldAccessor) -> Verdict {
        self.evaluate(Signal::Log, accessor)
    }

    /// Evaluates one metric data point.
    pub fn evaluate_metric(&self, accessor: &mut dyn FieldAccessor) -> Verdict {
        self.evaluate(Signal::Metric, accessor)
    }

    /// Evaluates one span.
    pub fn evaluate_trace(&self, accessor: &mut dyn FieldAccessor) -> Verdict {
        self.evaluate(Signal::Trace, accessor)
    }

    fn evaluate(&self, signal: Signal, accessor: &mut dyn FieldAccessor) -> Verdict {
        // One snapshot for the whole record: matchers, combinator,
        // transforms, and sampler all see the same policy set, so a
        // concurrent registry update can't split one record's evaluation
        // across two policy generations.
        let snapshot = self.registry.snapshot();

        let mut matched: Vec<(usize, LocalOutcome)> = Vec::new();
        for (index, policy) in snapshot.iter().enumerate() {
            if !policy.enabled() || policy.signal() != signal {
                continue;
            }
            let is_match = !policy.matchers().is_empty()
                && policy.matchers().iter().all(|m| m.eval(accessor));
            if is_match {
                policy.record_hit();
                let outcome = self.local_outcome(policy, accessor);
                matched.push((index, outcome));
            } else {
                policy.record_miss();
            }
        }

        // Policies are stored in ascending id order, and we walked the
        // snapshot in that order above, so the first entry at the minimal
        // rank is already the lowest-id policy at that rank: `min_by_key`
        // returns the first minimum on ties, giving a deterministic
        // tie-break by id.
        let Some(winner) = matched.iter().min_by_key(|(_, outcome)| outcome.rank()) else {
            return Verdict {
                decision: Decision::NoMatch,
                matched_policy_ids: Vec::new(),
            };
        };
        let winning_rank = winner.1.rank();
        let winning_tracestate = match &winner.1 {
            LocalOutcome::KeepSample { tracestate } => tracestate.clone(),
            _ => None,
        };

        let decision = if winning_rank == LocalOutcome::Drop.rank() {
            Decision::Drop
        } else {
            Decision::Keep
        };

        if decision == Decision::Keep {
            for (index, _) in &matched {
                transform::apply_all(snapshot[*index].transforms(), accessor);
            }
            if let Some(tracestate) = winning_tracestate {
                if signal == Signal::Trace {
                    accessor.set_string(&FieldRef::Fixed(FixedField::TraceState), &tracestate);
                }
            }
        } else {
            trace!("record dropped by most-restrictive-wins combination");
        }

        let mut matched_policy_ids: Vec<String> = matched
            .iter()
            .map(|(index, _)| snapshot[*index].id().to_string())
            .collect();
        matched_policy_ids.sort_unstable();

        Verdict {
            decision,
            matched_policy_ids,
        }
    }

    fn local_outcome(&self, policy: &Policy, accessor: &dyn FieldAccessor) -> LocalOutcome {
        match policy.keep() {
            Keep::All => LocalOutcome::KeepAll,
            Keep::None => LocalOutcome::Drop,
            Keep::Sample { config, key } => {
                let trace_id = accessor.trace_id_bytes();
                let key_value = key
                    .as_ref()
                    .and_then(|field| accessor.get_string(field))
                    .map(|s| s.into_owned());
                let existing_tracestate = if accessor.signal() == Signal::Trace {
                    accessor
                        .get_string(&FieldRef::Fixed(FixedField::TraceState))
                        .map(|s| s.into_owned())
                } else {
                    None
                };
                let outcome = crate::sampler::sample(
                    config,
                    trace_id,
                    key_value.as_deref(),
                    existing_tracestate.as_deref(),
                );
                if outcome.keep {
                    LocalOutcome::KeepSample {
                        tracestate: outcome.tracestate,
                    }
                } else {
                    LocalOutcome::Drop
                }
            }
            Keep::RateLimit { config, key } => {
                let key_value = key
                    .as_ref()
                    .map(|field| {
                        accessor
                            .get_string(field)
                            .map(|s| s.into_owned())
                            .unwrap_or_default()
                    })
                    .unwrap_or_default();
                let kept = self
                    .registry
                    .rate_limiter()
                    .try_acquire(policy.id(), &key_value, config);
                if kept {
                    LocalOutcome::KeepRateLimit
                } else {
                    LocalOutcome::Drop
                }
            }
        }
    }
}
