// SPDX-FileCopyrightText: © 2025 TBC Toolkit Contributors
//
// SPDX-License-Identifier: MPL-2.0

//! The observation side-channel: `(field_id, namespace, key) → value`.
//!
//! Produced as a by-product of DAG execution, this is how observer stages
//! (run during rendering) hand results to analysis-sink consumers without
//! threading them through the VFR return value itself.

use crate::ids::FieldId;
use std::collections::HashMap;

/// A scalar value written to the observation context. Never extended at
/// runtime with unknown variants; consumers pattern-match exhaustively.
#[derive(Debug, Clone, PartialEq)]
pub enum ObservationValue {
    I32(i32),
    I64(i64),
    U32(u32),
    Bool(bool),
    F64(f64),
    String(String),
}

/// One fact about one field, in one namespace, under one key.
#[derive(Debug, Clone, PartialEq)]
pub struct Observation {
    pub field_id: FieldId,
    pub namespace: String,
    pub key: String,
    pub value: ObservationValue,
}

type ObservationKey = (FieldId, String, String);

/// Mutable map of `(field_id, namespace, key) → value`, accumulated across a
/// single DAG execution run. Re-invocations of an observer within the same
/// run overwrite prior values for the same key;
/// callers that need write-once semantics across separate runs should start
/// from a fresh context, since a context's lifetime is scoped to one run.
#[derive(Debug, Default, Clone)]
pub struct ObservationContext {
    values: HashMap<ObservationKey, ObservationValue>,
}

impl ObservationContext {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(&mut self, field_id: FieldId, namespace: impl Into<String>, key: impl Into<String>, value: ObservationValue) {
        self.values.insert((field_id, namespace.into(), key.into()), value);
    }

    #[must_use]
    pub fn get(&self, field_id: FieldId, namespace: &str, key: &str) -> Option<&ObservationValue> {
        self.values.get(&(field_id, namespace.to_string(), key.to_string()))
    }

    pub fn clear(&mut self) {
        self.values.clear();
    }

    /// Folds `other`'s entries into `self`, overwriting on key collision —
    /// the same re-invocation-overwrites rule `set` follows.
    pub fn merge(&mut self, other: ObservationContext) {
        self.values.extend(other.values);
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.values.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// All observations recorded for one field, across every namespace/key.
    pub fn for_field(&self, field_id: FieldId) -> impl Iterator<Item = Observation> + '_ {
        self.values.iter().filter(move |((fid, _, _), _)| *fid == field_id).map(|((fid, ns, key), value)| {
            Observation { field_id: *fid, namespace: ns.clone(), key: key.clone(), value: value.clone() }
        })
    }
}

/// Side-effect-free metadata extractor run over a VFR during rendering. An
/// observer writes only to the `ObservationContext` it is given; it must not
/// mutate the VFR or retain interior state across calls.
pub trait Observer: Send + Sync {
    fn observe(
        &self,
        vfr: &dyn crate::vfr::VideoFieldRepresentation,
        field_id: FieldId,
        ctx: &mut ObservationContext,
    ) -> crate::error::Result<()>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn set_then_get_roundtrips() {
        let mut ctx = ObservationContext::new();
        ctx.set(FieldId(3), "white_snr", "db", ObservationValue::F64(42.5));
        assert_eq!(ctx.get(FieldId(3), "white_snr", "db"), Some(&ObservationValue::F64(42.5)));
        assert_eq!(ctx.get(FieldId(3), "white_snr", "missing"), None);
    }

    #[test]
    fn re_invocation_overwrites() {
        let mut ctx = ObservationContext::new();
        ctx.set(FieldId(0), "ns", "k", ObservationValue::I32(1));
        ctx.set(FieldId(0), "ns", "k", ObservationValue::I32(2));
        assert_eq!(ctx.get(FieldId(0), "ns", "k"), Some(&ObservationValue::I32(2)));
        assert_eq!(ctx.len(), 1);
    }

    #[test]
    fn clear_empties_context() {
        let mut ctx = ObservationContext::new();
        ctx.set(FieldId(0), "ns", "k", ObservationValue::Bool(true));
        ctx.clear();
        assert!(ctx.is_empty());
    }

    #[test]
    fn for_field_filters_by_field_id() {
        let mut ctx = ObservationContext::new();
        ctx.set(FieldId(0), "ns", "a", ObservationValue::I32(1));
        ctx.set(FieldId(1), "ns", "a", ObservationValue::I32(2));
        let observations: Vec<_> = ctx.for_field(FieldId(0)).collect();
        assert_eq!(observations.len(), 1);
        assert_eq!(observations[0].value, ObservationValue::I32(1));
    }

    #[test]
    fn merge_overwrites_on_collision() {
        let mut ctx = ObservationContext::new();
        ctx.set(FieldId(0), "ns", "k", ObservationValue::I32(1));
        let mut other = ObservationContext::new();
        other.set(FieldId(0), "ns", "k", ObservationValue::I32(2));
        other.set(FieldId(1), "ns", "k", ObservationValue::I32(3));
        ctx.merge(other);
        assert_eq!(ctx.get(FieldId(0), "ns", "k"), Some(&ObservationValue::I32(2)));
        assert_eq!(ctx.get(FieldId(1), "ns", "k"), Some(&ObservationValue::I32(3)));
    }
}
