// Copyright The OpenTelemetry Authors
// SPDX-License-Identifier: Apache-2.0

//! Atomic policy snapshots.
//!
//! A [`PolicyRegistry`] holds the currently active, compiled policy set
//! behind an [`arc_swap::ArcSwap`], the same snapshot-swap pattern
//! `tls_utils::LazyReloadableCertResolver` uses for hot-reloaded certificates:
//! readers never block on a writer, and a writer's [`PolicyRegistry::update`]
//! is a single atomic pointer swap so every in-flight `evaluate_*` call sees
//! either the whole old policy set or the whole new one, never a mix.

use crate::error::RegistryUpdateRejected;
use crate::ingest::PolicyProvider;
use crate::policy::Policy;
use crate::rate_limiter::RateLimiter;
use arc_swap::ArcSwap;
use std::sync::Arc;
use tracing::{info, warn};

/// Holds the live, compiled policy set and the shared rate-limiter state
/// that outlives any single snapshot.
pub struct PolicyRegistry {
    snapshot: ArcSwap<Vec<Policy>>,
    rate_limiter: RateLimiter,
}

impl PolicyRegistry {
    /// Builds a registry from an already-compiled policy set (see the
    /// `ingest` module for the normal way to produce one).
    #[must_use]
    pub fn new(policies: Vec<Policy>) -> Self {
        Self {
            snapshot: ArcSwap::new(Arc::new(policies)),
            rate_limiter: RateLimiter::new(),
        }
    }

    /// Builds a registry with no policies loaded. Every record is a
    /// `no_match` until [`Self::update`] is called.
    #[must_use]
    pub fn empty() -> Self {
        Self::new(Vec::new())
    }

    /// Loads the current snapshot. Cheap: an `Arc` clone, no policy data is
    /// copied.
    #[must_use]
    pub fn snapshot(&self) -> Arc<Vec<Policy>> {
        self.snapshot.load_full()
    }

    /// Atomically replaces the active policy set. Callers are expected to
    /// have already run the new set through the `ingest` module's
    /// validation; `update` itself does not validate — ingest validation
    /// and the atomic swap are deliberately separate steps.
    pub fn update(&self, policies: Vec<Policy>) {
        info!(policy_count = policies.len(), "policy snapshot swapped in");
        self.snapshot.store(Arc::new(policies));
    }

    /// The rate limiter shared by every `rate_limit` policy in every
    /// snapshot this registry has ever held. Buckets are keyed by policy id,
    /// so reloading the policy set does not reset an unrelated policy's
    /// bucket.
    #[must_use]
    pub fn rate_limiter(&self) -> &RateLimiter {
        &self.rate_limiter
    }

    /// Pulls a fresh policy set from `provider` and, if it loads
    /// successfully, atomically swaps it in. On failure the prior snapshot
    /// is left untouched and the rejection is returned to the caller: any
    /// error aborts that update rather than partially applying it.
    pub fn reload(&self, provider: &dyn PolicyProvider) -> Result<(), RegistryUpdateRejected> {
        match provider.load() {
            Ok(policies) => {
                self.update(policies);
                Ok(())
            }
            Err(rejected) => {
                warn!(errors = rejected.errors.len(), "policy reload rejected, keeping prior snapshot");
                Err(rejected)
            }
        }
    }
}

impl Default for PolicyRegistry {
    fn default() -> Self {
        Self::empty()
    }
}
