// SPDX-FileCopyrightText: © 2025 TBC Toolkit Contributors
//
// SPDX-License-Identifier: MPL-2.0

//! `VideoFieldRepresentation` (VFR): the central lazy-sequence abstraction.
//!
//! A VFR represents a finite, 0-indexed lazy sequence of fields. Leaf VFRs
//! (synthetic, in-memory) own their data; wrapper VFRs (see
//! [`crate::vfr_wrapper`]) delegate to a held source and override only the
//! methods their stage changes. All methods are read-only: VFRs are
//! logically immutable once
//! constructed, and may be queried concurrently by a single owner's threads.

use crate::field::{DropoutHints, FieldDescriptor, FieldParityHint, FieldPhaseHint};
use crate::ids::{ArtifactId, FieldId, FieldIdRange};
use crate::parameter::ParameterMap;
use crate::video_params::VideoParameters;
use std::time::SystemTime;

/// Identity and lineage of a produced VFR, used for cache provenance and
/// debugging; never interpreted by the executor.
#[derive(Debug, Clone)]
pub struct Provenance {
    pub stage_name: String,
    pub stage_version: String,
    pub parameters: ParameterMap,
    pub input_artifact_ids: Vec<ArtifactId>,
    pub timestamp: SystemTime,
}

/// Interleaved signed-16 stereo audio samples (L, R, L, R, ...) at a fixed rate.
pub type AudioSamples = Vec<i16>;

/// 8-bit EFM "t-values" in `[3, 11]`, `Bytes`-backed so wrappers that pass
/// a source's raw stream through unchanged can clone the handle instead of
/// the buffer.
pub type EfmSamples = bytes::Bytes;

/// The central lazy-sequence abstraction. Any subset of the optional
/// capability methods may be meaningfully implemented; the defaults reflect
/// "this capability is absent" (empty/`false`/`None`), which wrappers must
/// only override when their stage actually changes that capability.
pub trait VideoFieldRepresentation: Send + Sync {
    // -- Core, required --

    fn field_range(&self) -> FieldIdRange;

    fn field_count(&self) -> u64 {
        self.field_range().size()
    }

    fn has_field(&self, id: FieldId) -> bool {
        self.field_range().contains(id)
    }

    fn get_descriptor(&self, id: FieldId) -> Option<FieldDescriptor>;

    /// Borrowed view of one row of 16-bit samples.
    fn get_line(&self, id: FieldId, line: u32) -> Option<Vec<u16>>;

    /// Entire field as a contiguous buffer, `width * height` samples.
    /// The default assembles it by concatenating `get_line` in order;
    /// implementations MAY override with a more efficient path but MUST
    /// return identical logical content.
    fn get_field(&self, id: FieldId) -> Option<Vec<u16>> {
        let descriptor = self.get_descriptor(id)?;
        let mut out = Vec::with_capacity((descriptor.width * descriptor.height) as usize);
        for line in 0..descriptor.height {
            out.extend(self.get_line(id, line)?);
        }
        Some(out)
    }

    fn id(&self) -> ArtifactId;

    fn provenance(&self) -> Provenance;

    // -- Optional separate chroma/luma channels --

    fn has_separate_channels(&self) -> bool {
        false
    }

    fn get_field_luma(&self, _id: FieldId) -> Option<Vec<u16>> {
        None
    }

    fn get_field_chroma(&self, _id: FieldId) -> Option<Vec<u16>> {
        None
    }

    fn get_line_luma(&self, _id: FieldId, _line: u32) -> Option<Vec<u16>> {
        None
    }

    fn get_line_chroma(&self, _id: FieldId, _line: u32) -> Option<Vec<u16>> {
        None
    }

    // -- Side-channel hints --

    fn get_dropout_hints(&self, _id: FieldId) -> DropoutHints {
        DropoutHints::new()
    }

    fn get_field_parity_hint(&self, _id: FieldId) -> Option<FieldParityHint> {
        None
    }

    fn get_field_phase_hint(&self, _id: FieldId) -> Option<FieldPhaseHint> {
        None
    }

    // -- Auxiliary streams --

    fn has_audio(&self) -> bool {
        false
    }

    fn get_audio_sample_count(&self, _id: FieldId) -> u64 {
        0
    }

    fn get_audio_samples(&self, _id: FieldId) -> Option<AudioSamples> {
        None
    }

    fn has_efm(&self) -> bool {
        false
    }

    fn get_efm_sample_count(&self, _id: FieldId) -> u64 {
        0
    }

    fn get_efm_samples(&self, _id: FieldId) -> Option<EfmSamples> {
        None
    }

    // -- Geometry --

    fn video_parameters(&self) -> VideoParameters;
}
