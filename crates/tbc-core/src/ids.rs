// SPDX-FileCopyrightText: © 2025 TBC Toolkit Contributors
//
// SPDX-License-Identifier: MPL-2.0

//! Identifier value types shared across the pipeline substrate.

use serde::{Deserialize, Serialize};
use std::fmt;

/// 64-bit field identifier. `FieldId::INVALID` marks an absent field, used
/// by range-remapping wrappers to represent padding.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, schemars::JsonSchema)]
pub struct FieldId(pub u64);

impl FieldId {
    pub const INVALID: FieldId = FieldId(u64::MAX);

    #[must_use]
    pub fn is_valid(self) -> bool {
        self != Self::INVALID
    }

    /// Returns `None` on overflow rather than wrapping.
    #[must_use]
    pub fn checked_add(self, delta: u64) -> Option<FieldId> {
        if !self.is_valid() {
            return None;
        }
        self.0.checked_add(delta).map(FieldId)
    }
}

impl From<u64> for FieldId {
    fn from(v: u64) -> Self {
        FieldId(v)
    }
}

impl From<FieldId> for u64 {
    fn from(v: FieldId) -> Self {
        v.0
    }
}

impl fmt::Display for FieldId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_valid() {
            write!(f, "{}", self.0)
        } else {
            write!(f, "INVALID")
        }
    }
}

/// Half-open range of field identifiers, `[start, end)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FieldIdRange {
    pub start: FieldId,
    pub end: FieldId,
}

impl FieldIdRange {
    #[must_use]
    pub fn new(start: FieldId, end: FieldId) -> Self {
        Self { start, end }
    }

    #[must_use]
    pub fn size(&self) -> u64 {
        self.end.0.saturating_sub(self.start.0)
    }

    #[must_use]
    pub fn contains(&self, id: FieldId) -> bool {
        id.is_valid() && id.0 >= self.start.0 && id.0 < self.end.0
    }

    pub fn iter(&self) -> impl Iterator<Item = FieldId> {
        (self.start.0..self.end.0).map(FieldId)
    }
}

/// Opaque string identifier for a DAG node. Unique within a DAG; the name
/// itself carries no semantics the substrate relies on.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct NodeId(pub String);

impl NodeId {
    #[must_use]
    pub fn new(s: impl Into<String>) -> Self {
        Self(s.into())
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for NodeId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl From<String> for NodeId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

/// String identifier for a produced artifact, used for cache provenance only.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ArtifactId(pub String);

impl ArtifactId {
    #[must_use]
    pub fn new(s: impl Into<String>) -> Self {
        Self(s.into())
    }
}

impl fmt::Display for ArtifactId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}
