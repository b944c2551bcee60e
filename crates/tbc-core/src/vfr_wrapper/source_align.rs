// SPDX-FileCopyrightText: © 2025 TBC Toolkit Contributors
//
// SPDX-License-Identifier: MPL-2.0

//! Source-align (drop-prefix) wrapper: shifts output indices by a per-source
//! offset. A negative or out-of-range offset excludes the source entirely
//! (zero-field output) rather than clamping or panicking.

use crate::field::{DropoutHints, FieldDescriptor, FieldParityHint, FieldPhaseHint};
use crate::ids::{ArtifactId, FieldId, FieldIdRange};
use crate::parameter::ParameterMap;
use crate::vfr::{AudioSamples, EfmSamples, Provenance, VideoFieldRepresentation};
use crate::video_params::VideoParameters;
use std::sync::Arc;

pub struct SourceAlignWrapper {
    source: Arc<dyn VideoFieldRepresentation>,
    offset: i64,
    artifact_id: ArtifactId,
}

impl SourceAlignWrapper {
    #[must_use]
    pub fn new(source: Arc<dyn VideoFieldRepresentation>, offset: i64, artifact_id: impl Into<String>) -> Self {
        Self { source, offset, artifact_id: ArtifactId::new(artifact_id) }
    }

    fn excluded(&self) -> bool {
        self.offset < 0 || self.offset as u64 >= self.source.field_count()
    }

    fn mapped(&self, id: FieldId) -> Option<FieldId> {
        if self.excluded() || !id.is_valid() {
            return None;
        }
        if id.0 >= self.field_count() {
            return None;
        }
        Some(FieldId(id.0 + self.offset as u64))
    }
}

impl VideoFieldRepresentation for SourceAlignWrapper {
    fn field_range(&self) -> FieldIdRange {
        if self.excluded() {
            return FieldIdRange::new(FieldId(0), FieldId(0));
        }
        FieldIdRange::new(FieldId(0), FieldId(self.source.field_count() - self.offset as u64))
    }

    fn get_descriptor(&self, id: FieldId) -> Option<FieldDescriptor> {
        self.mapped(id).and_then(|sid| self.source.get_descriptor(sid))
    }

    fn get_line(&self, id: FieldId, line: u32) -> Option<Vec<u16>> {
        self.mapped(id).and_then(|sid| self.source.get_line(sid, line))
    }

    fn has_separate_channels(&self) -> bool {
        self.source.has_separate_channels()
    }

    fn get_field_luma(&self, id: FieldId) -> Option<Vec<u16>> {
        self.mapped(id).and_then(|sid| self.source.get_field_luma(sid))
    }

    fn get_field_chroma(&self, id: FieldId) -> Option<Vec<u16>> {
        self.mapped(id).and_then(|sid| self.source.get_field_chroma(sid))
    }

    fn get_line_luma(&self, id: FieldId, line: u32) -> Option<Vec<u16>> {
        self.mapped(id).and_then(|sid| self.source.get_line_luma(sid, line))
    }

    fn get_line_chroma(&self, id: FieldId, line: u32) -> Option<Vec<u16>> {
        self.mapped(id).and_then(|sid| self.source.get_line_chroma(sid, line))
    }

    fn get_dropout_hints(&self, id: FieldId) -> DropoutHints {
        self.mapped(id).map(|sid| self.source.get_dropout_hints(sid)).unwrap_or_default()
    }

    fn get_field_parity_hint(&self, id: FieldId) -> Option<FieldParityHint> {
        self.mapped(id).and_then(|sid| self.source.get_field_parity_hint(sid))
    }

    fn get_field_phase_hint(&self, id: FieldId) -> Option<FieldPhaseHint> {
        self.mapped(id).and_then(|sid| self.source.get_field_phase_hint(sid))
    }

    fn has_audio(&self) -> bool {
        self.source.has_audio()
    }

    fn get_audio_sample_count(&self, id: FieldId) -> u64 {
        self.mapped(id).map(|sid| self.source.get_audio_sample_count(sid)).unwrap_or(0)
    }

    fn get_audio_samples(&self, id: FieldId) -> Option<AudioSamples> {
        self.mapped(id).and_then(|sid| self.source.get_audio_samples(sid))
    }

    fn has_efm(&self) -> bool {
        self.source.has_efm()
    }

    fn get_efm_sample_count(&self, id: FieldId) -> u64 {
        self.mapped(id).map(|sid| self.source.get_efm_sample_count(sid)).unwrap_or(0)
    }

    fn get_efm_samples(&self, id: FieldId) -> Option<EfmSamples> {
        self.mapped(id).and_then(|sid| self.source.get_efm_samples(sid))
    }

    fn video_parameters(&self) -> VideoParameters {
        self.source.video_parameters()
    }

    fn id(&self) -> ArtifactId {
        self.artifact_id.clone()
    }

    fn provenance(&self) -> Provenance {
        super::wrapper_provenance("source_align", "1", ParameterMap::new(), self.source.as_ref())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::synthetic::SyntheticVfr;
    use crate::video_params::VideoParameters;

    fn source() -> Arc<dyn VideoFieldRepresentation> {
        Arc::new(SyntheticVfr::filled("src", VideoParameters::pal_default(), 10, 1000))
    }

    #[test]
    fn positive_offset_drops_prefix() {
        let wrapper = SourceAlignWrapper::new(source(), 3, "aligned");
        assert_eq!(wrapper.field_count(), 7);
        assert_eq!(wrapper.get_descriptor(FieldId(0)).unwrap().field_id, FieldId(3));
    }

    #[test]
    fn negative_offset_excludes_source() {
        let wrapper = SourceAlignWrapper::new(source(), -1, "aligned");
        assert_eq!(wrapper.field_count(), 0);
    }

    #[test]
    fn offset_beyond_source_length_excludes_source() {
        let wrapper = SourceAlignWrapper::new(source(), 100, "aligned");
        assert_eq!(wrapper.field_count(), 0);
    }

    #[test]
    fn zero_offset_is_identity() {
        let src = source();
        let wrapper = SourceAlignWrapper::new(Arc::clone(&src), 0, "aligned");
        assert_eq!(wrapper.field_count(), src.field_count());
    }
}
