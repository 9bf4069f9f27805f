// Copyright The OpenTelemetry Authors
// SPDX-License-Identifier: Apache-2.0

//! Compiled matchers: a single predicate against one field reference.

use otel_policy_views::{FieldAccessor, FieldRef, Presence};
use regex::{Regex, RegexBuilder};

/// A compiled predicate. Exactly one of these backs every [`Matcher`].
#[derive(Debug, Clone)]
pub enum Predicate {
    /// Exact string equality, including the empty string: this is the one
    /// predicate that distinguishes a present-but-empty field from an
    /// absent one, since it reads [`FieldAccessor::raw_string`] directly
    /// instead of the empty-folds-to-`None` [`FieldAccessor::get_string`].
    Exact(String),
    /// String prefix match.
    StartsWith(String),
    /// String suffix match.
    EndsWith(String),
    /// Substring match.
    Contains(String),
    /// Regular expression match. Case sensitivity is baked in at compile
    /// time via [`RegexBuilder::case_insensitive`].
    Regex(Box<Regex>),
    /// Field presence check.
    Exists(bool),
}

/// A single compiled predicate against one field, as read through a
/// [`FieldAccessor`]. Stateless and immutable once built.
#[derive(Debug, Clone)]
pub struct Matcher {
    field_ref: FieldRef,
    predicate: Predicate,
    case_insensitive: bool,
    negate: bool,
}

impl Matcher {
    /// Builds a matcher directly from its compiled parts. Regex case
    /// sensitivity must already be baked into `predicate` by the caller
    /// (see the `ingest` module, which is the normal entry point).
    #[must_use]
    pub fn new(
        field_ref: FieldRef,
        predicate: Predicate,
        case_insensitive: bool,
        negate: bool,
    ) -> Self {
        Self {
            field_ref,
            predicate,
            case_insensitive,
            negate,
        }
    }

    /// Compiles a regex predicate with case sensitivity baked in.
    ///
    /// # Errors
    ///
    /// Returns the underlying `regex` crate error message if `pattern` does
    /// not compile. Policy compilation fails here, at ingest, rather than
    /// surfacing a compile error from per-record evaluation.
    pub fn compile_regex(pattern: &str, case_insensitive: bool) -> Result<Regex, String> {
        RegexBuilder::new(pattern)
            .case_insensitive(case_insensitive)
            .build()
            .map_err(|e| e.to_string())
    }

    /// The field this matcher reads.
    #[must_use]
    pub fn field_ref(&self) -> &FieldRef {
        &self.field_ref
    }

    /// Evaluates this matcher against one record through `accessor`.
    #[must_use]
    pub fn eval(&self, accessor: &dyn FieldAccessor) -> bool {
        let raw = match &self.predicate {
            // `exists(true)` and `exists(false)` are NOT simple negations of
            // each other. `exists(true)` succeeds on a non-empty value or a
            // present typed field (`Presence::exists`); `exists(false)`
            // succeeds only on strict absence — a present-but-empty,
            // non-typed field matches neither, and `negate` is what turns
            // it into "field is present".
            Predicate::Exists(true) => {
                let is_typed = matches!(&self.field_ref, FieldRef::Fixed(f) if f.is_typed());
                accessor.presence(&self.field_ref).exists(is_typed)
            }
            Predicate::Exists(false) => accessor.presence(&self.field_ref) == Presence::Absent,
            Predicate::Exact(literal) => match accessor.raw_string(&self.field_ref) {
                None => false,
                Some(value) => str_eq(&value, literal, self.case_insensitive),
            },
            Predicate::StartsWith(literal) => match accessor.get_string(&self.field_ref) {
                None => false,
                Some(value) => str_starts_with(&value, literal, self.case_insensitive),
            },
            Predicate::EndsWith(literal) => match accessor.get_string(&self.field_ref) {
                None => false,
                Some(value) => str_ends_with(&value, literal, self.case_insensitive),
            },
            Predicate::Contains(literal) => match accessor.get_string(&self.field_ref) {
                None => false,
                Some(value) => str_contains(&value, literal, self.case_insensitive),
            },
            Predicate::Regex(re) => match accessor.get_string(&self.field_ref) {
                None => false,
                Some(value) => re.is_match(&value),
            },
        };
        raw ^ self.negate
    }
}

fn ascii_eq_ci(a: &str, b: &str) -> bool {
    a.len() == b.len()
        && a.bytes()
            .zip(b.bytes())
            .all(|(x, y)| x.to_ascii_lowercase() == y.to_ascii_lowercase())
}

fn str_eq(hay: &str, needle: &str, ci: bool) -> bool {
    if ci { ascii_eq_ci(hay, needle) } else { hay == needle }
}

fn str_starts_with(hay: &str, needle: &str, ci: bool) -> bool {
    if !ci {
        return hay.starts_with(needle);
    }
    if needle.len() > hay.len() {
        return false;
    }
    ascii_eq_ci(&hay[..needle.len()], needle)
}

fn str_ends_with(hay: &str, needle: &str, ci: bool) -> bool {
    if !ci {
        return hay.ends_with(needle);
    }
    if needle.len() > hay.len() {
        return false;
    }
    ascii_eq_ci(&hay[hay.len() - needle.len()..], needle)
}

fn str_contains(hay: &str, needle: &str, ci: bool) -> bool {
    if !ci {
        return hay.contains(needle);
    }
    if needle.is_empty() {
        return true;
    }
    let h = hay.as_bytes();
    let n = needle.as_bytes();
    if n.len() > h.len() {
        return false;
    }
    (0..=(h.len() - n.len())).any(|start| {
        h[start..start + n.len()]
            .iter()
            .zip(n)
            .all(|(x, y)| x.to_ascii_lowercase() == y.to_ascii_lowercase())
    })
}
