// Copyright The OpenTelemetry Authors
// SPDX-License-Identifier: Apache-2.0

//! Compiled mutations applied to kept records.
//!
//! Transforms only ever run against records the [`crate::engine::Engine`]
//! has already decided to keep, and always in the fixed order
//! `remove, redact, rename, add` regardless of their order in the policy's
//! source JSON. [`TransformKind::sort_key`] is how a compiled
//! [`crate::policy::Policy`] gets its `transforms` vector into that
//! canonical order once, at compile time, rather than re-sorting per record.

use otel_policy_views::{FieldAccessor, FieldRef, Presence};

/// One compiled mutation, bound to the field it targets.
#[derive(Debug, Clone)]
pub struct TransformOp {
    field_ref: FieldRef,
    kind: TransformKind,
}

/// The mutation itself.
#[derive(Debug, Clone)]
pub enum TransformKind {
    /// Deletes the field.
    Remove,
    /// Overwrites the field's value unconditionally.
    Redact {
        /// The replacement value.
        value: String,
    },
    /// Renames an attribute key. Never valid against a fixed field;
    /// rejected at ingest.
    Rename {
        /// The destination key.
        to: String,
        /// Whether to overwrite an existing value at `to`.
        upsert: bool,
    },
    /// Sets a field's value, optionally only if it is currently absent.
    Add {
        /// The value to write.
        value: String,
        /// `true` overwrites any existing value; `false` only writes when
        /// the field is currently absent.
        upsert: bool,
    },
}

impl TransformOp {
    /// Builds a transform from its compiled parts.
    #[must_use]
    pub fn new(field_ref: FieldRef, kind: TransformKind) -> Self {
        Self { field_ref, kind }
    }

    /// The field this transform targets.
    #[must_use]
    pub fn field_ref(&self) -> &FieldRef {
        &self.field_ref
    }

    /// Canonical ordering key: `remove` < `redact` < `rename` < `add`.
    /// Compiled policies sort their `transforms` vector by this once, at
    /// ingest, so [`Self::apply`] never has to reorder at evaluation time.
    #[must_use]
    pub const fn sort_key(&self) -> u8 {
        match self.kind {
            TransformKind::Remove => 0,
            TransformKind::Redact { .. } => 1,
            TransformKind::Rename { .. } => 2,
            TransformKind::Add { .. } => 3,
        }
    }

    /// Applies this transform to `accessor`.
    pub fn apply(&self, accessor: &mut dyn FieldAccessor) {
        match &self.kind {
            TransformKind::Remove => {
                accessor.remove(&self.field_ref);
            }
            TransformKind::Redact { value } => {
                accessor.set_string(&self.field_ref, value);
            }
            TransformKind::Rename { to, upsert } => {
                accessor.rename(&self.field_ref, to, *upsert);
            }
            TransformKind::Add { value, upsert } => {
                if *upsert || accessor.presence(&self.field_ref) == Presence::Absent {
                    accessor.set_string(&self.field_ref, value);
                }
            }
        }
    }
}

/// Applies a policy's compiled transforms, in the order they are stored.
///
/// Callers are expected to pass a `transforms` slice already sorted by
/// [`TransformOp::sort_key`] (the `ingest` module does this once at compile
/// time), so this is a single linear pass with no per-record sorting.
pub fn apply_all(transforms: &[TransformOp], accessor: &mut dyn FieldAccessor) {
    for transform in transforms {
        transform.apply(accessor);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use otel_policy_views::{AttributeScope, FixedField, Signal};
    use std::borrow::Cow;
    use std::collections::BTreeMap;

    struct MapAccessor {
        attributes: BTreeMap<String, String>,
        body: Option<String>,
    }

    impl FieldAccessor for MapAccessor {
        fn signal(&self) -> Signal {
            Signal::Log
        }

        fn raw_string(&self, field_ref: &FieldRef) -> Option<Cow<'_, str>> {
            match field_ref {
                FieldRef::Fixed(FixedField::Body) => self.body.as_deref().map(Cow::Borrowed),
                FieldRef::Attribute { scope: AttributeScope::Record, path } if path.len() == 1 => {
                    self.attributes.get(&path[0]).map(|s| Cow::Borrowed(s.as_str()))
                }
                _ => None,
            }
        }

        fn set_string(&mut self, field_ref: &FieldRef, value: &str) -> bool {
            match field_ref {
                FieldRef::Fixed(FixedField::Body) => {
                    let existed = self.body.is_some();
                    self.body = Some(value.to_string());
                    existed
                }
                FieldRef::Attribute { scope: AttributeScope::Record, path } if path.len() == 1 => {
                    self.attributes.insert(path[0].clone(), value.to_string()).is_some()
                }
                _ => false,
            }
        }

        fn remove(&mut self, field_ref: &FieldRef) -> bool {
            match field_ref {
                FieldRef::Fixed(FixedField::Body) => self.body.take().is_some(),
                FieldRef::Attribute { scope: AttributeScope::Record, path } if path.len() == 1 => {
                    self.attributes.remove(&path[0]).is_some()
                }
                _ => false,
            }
        }

        fn rename(&mut self, field_ref: &FieldRef, to: &str, upsert: bool) -> bool {
            let FieldRef::Attribute { scope: AttributeScope::Record, path } = field_ref else {
                return false;
            };
            if path.len() != 1 {
                return false;
            }
            let Some(value) = self.attributes.get(&path[0]).cloned() else {
                return false;
            };
            if self.attributes.contains_key(to) && !upsert {
                return true;
            }
            self.attributes.remove(&path[0]);
            self.attributes.insert(to.to_string(), value);
            true
        }
    }

    fn attr(key: &str) -> FieldRef {
        FieldRef::Attribute {
            scope: AttributeScope::Record,
            path: vec![key.to_string()],
        }
    }

    #[test]
    fn add_without_upsert_does_not_overwrite_existing() {
        let mut acc = MapAccessor {
            attributes: BTreeMap::from([("k".to_string(), "original".to_string())]),
            body: None,
        };
        let op = TransformOp::new(attr("k"), TransformKind::Add { value: "new".to_string(), upsert: false });
        op.apply(&mut acc);
        assert_eq!(acc.attributes.get("k").unwrap(), "original");
    }

    #[test]
    fn add_without_upsert_writes_when_absent() {
        let mut acc = MapAccessor { attributes: BTreeMap::new(), body: None };
        let op = TransformOp::new(attr("k"), TransformKind::Add { value: "new".to_string(), upsert: false });
        op.apply(&mut acc);
        assert_eq!(acc.attributes.get("k").unwrap(), "new");
    }

    #[test]
    fn rename_without_upsert_blocked_by_existing_target() {
        let mut acc = MapAccessor {
            attributes: BTreeMap::from([
                ("a".to_string(), "x".to_string()),
                ("b".to_string(), "y".to_string()),
            ]),
            body: None,
        };
        let op = TransformOp::new(attr("a"), TransformKind::Rename { to: "b".to_string(), upsert: false });
        op.apply(&mut acc);
        assert_eq!(acc.attributes.get("a").unwrap(), "x");
        assert_eq!(acc.attributes.get("b").unwrap(), "y");
    }

    #[test]
    fn canonical_order_is_remove_redact_rename_add() {
        let mut ops = vec![
            TransformOp::new(attr("d"), TransformKind::Add { value: "v".to_string(), upsert: true }),
            TransformOp::new(attr("c"), TransformKind::Rename { to: "e".to_string(), upsert: true }),
            TransformOp::new(attr("a"), TransformKind::Remove),
            TransformOp::new(attr("b"), TransformKind::Redact { value: "v".to_string() }),
        ];
        ops.sort_by_key(TransformOp::sort_key);
        let keys: Vec<u8> = ops.iter().map(TransformOp::sort_key).collect();
        assert_eq!(keys, vec![0, 1, 2, 3]);
    }
}
