// SPDX-FileCopyrightText: © 2025 TBC Toolkit Contributors
//
// SPDX-License-Identifier: MPL-2.0

//! Field-map / range-remap wrapper: an output-index → source-`FieldId`
//! vector. `FieldId::INVALID` entries produce padding fields — a descriptor
//! whose geometry matches the source's `VideoParameters`, a blanking-filled
//! line, and no hints or auxiliary-stream data.

use crate::field::{DropoutHints, FieldDescriptor, FieldFormat, FieldParityHint, FieldPhaseHint, Parity};
use crate::ids::{ArtifactId, FieldId, FieldIdRange};
use crate::parameter::ParameterMap;
use crate::vfr::{AudioSamples, EfmSamples, Provenance, VideoFieldRepresentation};
use crate::video_params::VideoParameters;
use std::sync::Arc;

/// A range-spec token: either a mapped source field or a padding slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MapEntry {
    Source(FieldId),
    Padding,
}

/// `n` padding slots in a row, e.g. the `PAD_n` token in a persisted range
/// specification string.
#[must_use]
pub fn padding_run(n: u64) -> Vec<MapEntry> {
    vec![MapEntry::Padding; n as usize]
}

pub struct FieldMapWrapper {
    source: Arc<dyn VideoFieldRepresentation>,
    map: Vec<MapEntry>,
    artifact_id: ArtifactId,
}

impl FieldMapWrapper {
    #[must_use]
    pub fn new(source: Arc<dyn VideoFieldRepresentation>, map: Vec<MapEntry>, artifact_id: impl Into<String>) -> Self {
        Self { source, map, artifact_id: ArtifactId::new(artifact_id) }
    }

    /// Parses a comma-separated range specification, e.g. `"0-2,5-7,PAD_2,8-9"`.
    /// Each `a-b` token is inclusive of both ends; `PAD_n` inserts `n`
    /// padding slots.
    ///
    /// # Errors
    /// Returns a parse error string for a malformed token.
    pub fn parse_range_spec(spec: &str) -> Result<Vec<MapEntry>, String> {
        let mut out = Vec::new();
        for token in spec.split(',').map(str::trim).filter(|s| !s.is_empty()) {
            if let Some(rest) = token.strip_prefix("PAD_") {
                let n: u64 = rest.parse().map_err(|_| format!("invalid PAD token '{token}'"))?;
                out.extend(padding_run(n));
                continue;
            }
            if let Some((start, end)) = token.split_once('-') {
                let start: u64 = start.trim().parse().map_err(|_| format!("invalid range start in '{token}'"))?;
                let end: u64 = end.trim().parse().map_err(|_| format!("invalid range end in '{token}'"))?;
                if end < start {
                    return Err(format!("range '{token}' has end before start"));
                }
                for v in start..=end {
                    out.push(MapEntry::Source(FieldId(v)));
                }
            } else {
                let v: u64 = token.parse().map_err(|_| format!("invalid field index '{token}'"))?;
                out.push(MapEntry::Source(FieldId(v)));
            }
        }
        Ok(out)
    }

    fn entry(&self, id: FieldId) -> Option<MapEntry> {
        if !id.is_valid() {
            return None;
        }
        self.map.get(id.0 as usize).copied()
    }

    fn is_padding(&self, id: FieldId) -> bool {
        matches!(self.entry(id), Some(MapEntry::Padding))
    }

    fn source_id(&self, id: FieldId) -> Option<FieldId> {
        match self.entry(id) {
            Some(MapEntry::Source(source_id)) => Some(source_id),
            _ => None,
        }
    }
}

impl VideoFieldRepresentation for FieldMapWrapper {
    fn field_range(&self) -> FieldIdRange {
        FieldIdRange::new(FieldId(0), FieldId(self.map.len() as u64))
    }

    fn get_descriptor(&self, id: FieldId) -> Option<FieldDescriptor> {
        match self.entry(id)? {
            MapEntry::Source(source_id) => self.source.get_descriptor(source_id),
            MapEntry::Padding => {
                let vp = self.source.video_parameters();
                let format = match vp.system {
                    crate::video_params::VideoSystem::Ntsc => FieldFormat::Ntsc,
                    _ => FieldFormat::Pal,
                };
                Some(FieldDescriptor {
                    field_id: id,
                    width: vp.field_width,
                    height: vp.field_height,
                    format,
                    parity: Parity::Top,
                    frame_number: None,
                })
            }
        }
    }

    fn get_line(&self, id: FieldId, line: u32) -> Option<Vec<u16>> {
        match self.entry(id)? {
            MapEntry::Source(source_id) => self.source.get_line(source_id, line),
            MapEntry::Padding => {
                let vp = self.source.video_parameters();
                if line >= vp.field_height {
                    return None;
                }
                Some(vp.blanking_fill_line())
            }
        }
    }

    fn has_separate_channels(&self) -> bool {
        self.source.has_separate_channels()
    }

    fn get_field_luma(&self, id: FieldId) -> Option<Vec<u16>> {
        self.source_id(id).and_then(|sid| self.source.get_field_luma(sid))
    }

    fn get_field_chroma(&self, id: FieldId) -> Option<Vec<u16>> {
        self.source_id(id).and_then(|sid| self.source.get_field_chroma(sid))
    }

    fn get_line_luma(&self, id: FieldId, line: u32) -> Option<Vec<u16>> {
        self.source_id(id).and_then(|sid| self.source.get_line_luma(sid, line))
    }

    fn get_line_chroma(&self, id: FieldId, line: u32) -> Option<Vec<u16>> {
        self.source_id(id).and_then(|sid| self.source.get_line_chroma(sid, line))
    }

    fn get_dropout_hints(&self, id: FieldId) -> DropoutHints {
        if self.is_padding(id) {
            return DropoutHints::new();
        }
        self.source_id(id).map(|sid| self.source.get_dropout_hints(sid)).unwrap_or_default()
    }

    fn get_field_parity_hint(&self, id: FieldId) -> Option<FieldParityHint> {
        if self.is_padding(id) {
            return None;
        }
        self.source_id(id).and_then(|sid| self.source.get_field_parity_hint(sid))
    }

    fn get_field_phase_hint(&self, id: FieldId) -> Option<FieldPhaseHint> {
        if self.is_padding(id) {
            return None;
        }
        self.source_id(id).and_then(|sid| self.source.get_field_phase_hint(sid))
    }

    fn has_audio(&self) -> bool {
        self.source.has_audio()
    }

    fn get_audio_sample_count(&self, id: FieldId) -> u64 {
        if self.is_padding(id) {
            return 0;
        }
        self.source_id(id).map(|sid| self.source.get_audio_sample_count(sid)).unwrap_or(0)
    }

    fn get_audio_samples(&self, id: FieldId) -> Option<AudioSamples> {
        if self.is_padding(id) {
            return None;
        }
        self.source_id(id).and_then(|sid| self.source.get_audio_samples(sid))
    }

    fn has_efm(&self) -> bool {
        self.source.has_efm()
    }

    fn get_efm_sample_count(&self, id: FieldId) -> u64 {
        if self.is_padding(id) {
            return 0;
        }
        self.source_id(id).map(|sid| self.source.get_efm_sample_count(sid)).unwrap_or(0)
    }

    fn get_efm_samples(&self, id: FieldId) -> Option<EfmSamples> {
        if self.is_padding(id) {
            return None;
        }
        self.source_id(id).and_then(|sid| self.source.get_efm_samples(sid))
    }

    fn video_parameters(&self) -> VideoParameters {
        self.source.video_parameters()
    }

    fn id(&self) -> ArtifactId {
        self.artifact_id.clone()
    }

    fn provenance(&self) -> Provenance {
        super::wrapper_provenance("field_map", "1", ParameterMap::new(), self.source.as_ref())
    }
}
