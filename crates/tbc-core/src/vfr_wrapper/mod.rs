// SPDX-FileCopyrightText: © 2025 TBC Toolkit Contributors
//
// SPDX-License-Identifier: MPL-2.0

//! VFR wrapper composition: the delegating-adapter base transform stages
//! build on, plus the canonical concrete wrappers (field-map, source-align,
//! field-invert, video-params-override, overwrite).
//!
//! Rust trait objects have no inheritance, so "delegate everything unless
//! overridden" is expressed with a macro that forwards the boilerplate
//! capability-query methods to a held `source: Arc<dyn VideoFieldRepresentation>`
//! field; each concrete wrapper type then overrides only the methods its
//! stage actually changes, exactly mirroring the composition-over-inheritance
//! shape used elsewhere in this codebase for output routing.

pub mod field_invert;
pub mod field_map;
pub mod overwrite;
pub mod source_align;
pub mod video_params_override;

pub use field_invert::FieldInvertWrapper;
pub use field_map::FieldMapWrapper;
pub use overwrite::OverwriteWrapper;
pub use source_align::SourceAlignWrapper;
pub use video_params_override::VideoParamsOverrideWrapper;

/// Forwards every `VideoFieldRepresentation` method whose default behavior
/// is "ask the source" to `$source_field`. Invoke inside an
/// `impl VideoFieldRepresentation for ... { }` block; list any methods you
/// want to override *after* the macro invocation (a later item with the
/// same name is not possible in one `impl`, so overriding wrappers instead
/// write their own full `impl` and call these forwarders only for the
/// subset they don't change — see `field_invert` for the minimal-override
/// pattern).
macro_rules! delegate_to_source {
    ($source_field:ident) => {
        fn field_range(&self) -> crate::ids::FieldIdRange {
            self.$source_field.field_range()
        }

        fn get_descriptor(&self, id: crate::ids::FieldId) -> Option<crate::field::FieldDescriptor> {
            self.$source_field.get_descriptor(id)
        }

        fn get_line(&self, id: crate::ids::FieldId, line: u32) -> Option<Vec<u16>> {
            self.$source_field.get_line(id, line)
        }

        fn has_separate_channels(&self) -> bool {
            self.$source_field.has_separate_channels()
        }

        fn get_field_luma(&self, id: crate::ids::FieldId) -> Option<Vec<u16>> {
            self.$source_field.get_field_luma(id)
        }

        fn get_field_chroma(&self, id: crate::ids::FieldId) -> Option<Vec<u16>> {
            self.$source_field.get_field_chroma(id)
        }

        fn get_line_luma(&self, id: crate::ids::FieldId, line: u32) -> Option<Vec<u16>> {
            self.$source_field.get_line_luma(id, line)
        }

        fn get_line_chroma(&self, id: crate::ids::FieldId, line: u32) -> Option<Vec<u16>> {
            self.$source_field.get_line_chroma(id, line)
        }

        fn get_dropout_hints(&self, id: crate::ids::FieldId) -> crate::field::DropoutHints {
            self.$source_field.get_dropout_hints(id)
        }

        fn get_field_parity_hint(&self, id: crate::ids::FieldId) -> Option<crate::field::FieldParityHint> {
            self.$source_field.get_field_parity_hint(id)
        }

        fn get_field_phase_hint(&self, id: crate::ids::FieldId) -> Option<crate::field::FieldPhaseHint> {
            self.$source_field.get_field_phase_hint(id)
        }

        fn has_audio(&self) -> bool {
            self.$source_field.has_audio()
        }

        fn get_audio_sample_count(&self, id: crate::ids::FieldId) -> u64 {
            self.$source_field.get_audio_sample_count(id)
        }

        fn get_audio_samples(&self, id: crate::ids::FieldId) -> Option<crate::vfr::AudioSamples> {
            self.$source_field.get_audio_samples(id)
        }

        fn has_efm(&self) -> bool {
            self.$source_field.has_efm()
        }

        fn get_efm_sample_count(&self, id: crate::ids::FieldId) -> u64 {
            self.$source_field.get_efm_sample_count(id)
        }

        fn get_efm_samples(&self, id: crate::ids::FieldId) -> Option<crate::vfr::EfmSamples> {
            self.$source_field.get_efm_samples(id)
        }

        fn video_parameters(&self) -> crate::video_params::VideoParameters {
            self.$source_field.video_parameters()
        }
    };
}

pub(crate) use delegate_to_source;

/// Builds the standard provenance record a wrapper stage returns from
/// `provenance()`: its own stage name/version/parameters, plus the source's
/// artifact id as the sole input lineage entry.
pub(crate) fn wrapper_provenance(
    stage_name: &str,
    stage_version: &str,
    parameters: crate::parameter::ParameterMap,
    source: &dyn crate::vfr::VideoFieldRepresentation,
) -> crate::vfr::Provenance {
    crate::vfr::Provenance {
        stage_name: stage_name.to_string(),
        stage_version: stage_version.to_string(),
        parameters,
        input_artifact_ids: vec![source.id()],
        timestamp: std::time::SystemTime::now(),
    }
}
