// Copyright The OpenTelemetry Authors
// SPDX-License-Identifier: Apache-2.0

//! The stats JSON contract: one hit/miss counter pair per policy.

use crate::registry::PolicyRegistry;
use serde::Serialize;

/// One policy's hit/miss counters, as reported in [`StatsReport`].
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct PolicyStats {
    /// The policy's id.
    pub policy_id: String,
    /// Matching-record count.
    pub hits: u64,
    /// Non-matching-record count.
    pub misses: u64,
}

/// The wire shape of the stats contract: `{"policies":[...]}`, sorted
/// ascending by `policy_id`, serializing as `{"policies":[]}` when the
/// registry holds no policies.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct StatsReport {
    /// Per-policy counters, ascending by `policy_id`.
    pub policies: Vec<PolicyStats>,
}

/// Reads a registry's current snapshot's counters and atomically resets
/// every counter to zero: this is a snapshot-and-reset, not a read-only
/// peek. The snapshot itself is unaffected by a concurrent
/// `update`: counters live on the [`crate::policy::Policy`] values this
/// `Arc` holds, not on the registry's swap slot.
#[must_use]
pub fn collect_stats(registry: &PolicyRegistry) -> StatsReport {
    let snapshot = registry.snapshot();
    let policies = snapshot
        .iter()
        .map(|policy| {
            let (hits, misses) = policy.take_counters();
            PolicyStats {
                policy_id: policy.id().to_string(),
                hits,
                misses,
            }
        })
        .collect();
    StatsReport { policies }
}
