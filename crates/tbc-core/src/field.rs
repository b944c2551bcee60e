// SPDX-FileCopyrightText: © 2025 TBC Toolkit Contributors
//
// SPDX-License-Identifier: MPL-2.0

//! Per-field descriptors and hint side-channels.

use crate::ids::FieldId;
use serde::{Deserialize, Serialize};

/// Which half of an interlaced frame a field occupies.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, schemars::JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum Parity {
    Top,
    Bottom,
}

/// Video format a field was decoded against, as carried per-field (distinct
/// from the broader `VideoSystem` on `VideoParameters`, which also has
/// `PalM`/`Unknown`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, schemars::JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum FieldFormat {
    Pal,
    Ntsc,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, schemars::JsonSchema)]
pub struct FieldDescriptor {
    pub field_id: FieldId,
    pub width: u32,
    pub height: u32,
    pub format: FieldFormat,
    pub parity: Parity,
    pub frame_number: Option<u32>,
}

/// Tag describing how a dropout region was identified.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, schemars::JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum DetectionBasis {
    Hardware,
    Computed,
}

/// A single damaged span on one line of a field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, schemars::JsonSchema)]
pub struct DropoutRegion {
    pub line: u32,
    pub start_sample: u32,
    /// Exclusive.
    pub end_sample: u32,
    pub detection_basis: DetectionBasis,
}

impl DropoutRegion {
    #[must_use]
    pub fn len_samples(&self) -> u32 {
        self.end_sample.saturating_sub(self.start_sample)
    }
}

/// A field's dropout regions. Stack-allocated up to a handful of spans —
/// the common case — and spills to the heap only for heavily damaged fields.
pub type DropoutHints = smallvec::SmallVec<[DropoutRegion; 8]>;

/// Field-ordering hint consumed by downstream stages (field-invert, preview
/// weaving) to decide which of a frame's two fields is shown first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, schemars::JsonSchema)]
pub struct FieldParityHint {
    pub is_first_field: bool,
}

/// Colour-subcarrier phase hint.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, schemars::JsonSchema)]
pub struct FieldPhaseHint {
    pub phase_id: i32,
}
