// Copyright The OpenTelemetry Authors
// SPDX-License-Identifier: Apache-2.0

//! Backend-agnostic field references and the [`FieldAccessor`] capability
//! trait shared by the policy evaluation core.
//!
//! This crate has no dependencies on purpose, mirroring `otap-df-pdata-views`:
//! the view/accessor layer should be adoptable by any OTLP representation
//! (pb-generated structs, a pdata-style zero-copy view, or a plain map)
//! without forcing that representation to pull in `regex`, `serde`, or any
//! of the policy core's other machinery.

mod accessor;
mod field_ref;

pub use accessor::{FieldAccessor, Presence};
pub use field_ref::{AttributeScope, FieldRef, FixedField, Signal};
