// SPDX-FileCopyrightText: © 2025 TBC Toolkit Contributors
//
// SPDX-License-Identifier: MPL-2.0

//! Dropout correction: a wrapper VFR that replaces samples inside detected
//! dropout regions with samples borrowed from a nearby line, either within
//! the same field (intrafield) or an adjacent field (interfield).
//!
//! This is kept in `tbc-engine` rather than `tbc-core`'s `vfr_wrapper` module
//! because it is illustrative domain logic layered on top of the substrate,
//! not part of the substrate itself — and because it needs a manual
//! `VideoFieldRepresentation` impl rather than `delegate_to_source!` (that
//! macro is private to `tbc-core`).

use std::collections::HashMap;
use std::sync::Arc;

use tbc_core::{
    ArtifactId, DropoutHints, DropoutRegion, FieldDescriptor, FieldId, FieldIdRange, FieldParityHint, FieldPhaseHint, ParameterMap,
    Provenance, VideoFieldRepresentation, VideoParameters,
};

/// Whether a user accepted or rejected a detected region; absent entries
/// default to accepted (correct everything the detector flagged unless told
/// otherwise).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DropoutDecision {
    Accept,
    Reject,
}

/// Identifies one detected region for the decisions override map. Keyed by
/// position rather than a synthetic index so decisions remain stable across
/// re-detection runs that preserve region geometry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct RegionKey {
    pub field_id: FieldId,
    pub line: u32,
    pub start_sample: u32,
}

pub struct DropoutCorrectConfig {
    /// Samples each region is widened by on either side before the
    /// burst/active-video split, clamped to the line width.
    pub overcorrect_extension: u32,
    /// Maximum line distance (in either direction) searched for an
    /// intrafield replacement before falling back to interfield.
    pub max_replacement_distance: u32,
    /// When the intrafield search fails, look at the *preceding* field
    /// instead of the following one.
    pub reverse_field_order: bool,
}

impl Default for DropoutCorrectConfig {
    fn default() -> Self {
        Self { overcorrect_extension: 0, max_replacement_distance: 4, reverse_field_order: false }
    }
}

pub struct DropoutCorrectWrapper {
    source: Arc<dyn VideoFieldRepresentation>,
    decisions: HashMap<RegionKey, DropoutDecision>,
    config: DropoutCorrectConfig,
    artifact_id: ArtifactId,
}

impl DropoutCorrectWrapper {
    #[must_use]
    pub fn new(
        source: Arc<dyn VideoFieldRepresentation>,
        decisions: HashMap<RegionKey, DropoutDecision>,
        config: DropoutCorrectConfig,
        artifact_id: impl Into<String>,
    ) -> Self {
        Self { source, decisions, config, artifact_id: ArtifactId::new(artifact_id) }
    }

    fn decision_for(&self, region: &DropoutRegion, field_id: FieldId) -> DropoutDecision {
        let key = RegionKey { field_id, line: region.line, start_sample: region.start_sample };
        self.decisions.get(&key).copied().unwrap_or(DropoutDecision::Accept)
    }

    /// Steps 2-3: widen by `overcorrect_extension`, split at the
    /// colour-burst/active-video boundary, and truncate to the active-video
    /// end.
    fn expand_split_truncate(&self, region: DropoutRegion, vp: &VideoParameters) -> Vec<DropoutRegion> {
        let start = region.start_sample.saturating_sub(self.config.overcorrect_extension);
        let end = (region.end_sample + self.config.overcorrect_extension).min(vp.field_width);
        let end = end.min(vp.active_video_end);
        if start >= end {
            return Vec::new();
        }

        let boundary = vp.active_video_start;
        if start < boundary && end > boundary {
            vec![
                DropoutRegion { start_sample: start, end_sample: boundary, ..region },
                DropoutRegion { start_sample: boundary, end_sample: end, ..region },
            ]
        } else {
            vec![DropoutRegion { start_sample: start, end_sample: end, ..region }]
        }
    }

    /// Step 4's intrafield search: candidates tried at increasing distance,
    /// alternating above then below, scored by inverse variance inside the
    /// damaged span. Ties are broken in favor of smaller distance then
    /// "above", which falls out of the iteration order itself — a later
    /// candidate only replaces the running best on a strictly higher score.
    fn intrafield_replacement(&self, field_id: FieldId, region: &DropoutRegion, height: u32) -> Option<Vec<u16>> {
        let mut best: Option<(Vec<u16>, f64)> = None;
        for distance in 1..=self.config.max_replacement_distance {
            for above in [true, false] {
                let candidate_line = if above { region.line.checked_sub(distance) } else { Some(region.line + distance) };
                let Some(candidate_line) = candidate_line else { continue };
                if candidate_line >= height {
                    continue;
                }
                let Some(samples) = self.source.get_line(field_id, candidate_line) else { continue };
                let end = (region.end_sample as usize).min(samples.len());
                let start = (region.start_sample as usize).min(end);
                let span = &samples[start..end];
                if span.is_empty() {
                    continue;
                }
                let score = inverse_variance(span);
                let replace = best.as_ref().is_none_or(|(_, best_score)| score > *best_score);
                if replace {
                    best = Some((samples, score));
                }
            }
        }
        best.map(|(samples, _)| samples)
    }

    /// Step 4's interfield fallback: same line, the adjacent field in the
    /// direction `reverse_field_order` selects. The default (`false`) prefers
    /// the preceding field, falling back to the following one at `field_id ==
    /// 0`; `true` always uses the following field.
    fn interfield_replacement(&self, field_id: FieldId, region: &DropoutRegion) -> Option<Vec<u16>> {
        let adjacent = if self.config.reverse_field_order {
            field_id.checked_add(1)?
        } else {
            field_id.0.checked_sub(1).map(FieldId).or_else(|| field_id.checked_add(1))?
        };
        self.source.get_line(adjacent, region.line)
    }

    /// Steps 1-5 for one line: applies decisions, finds replacements for
    /// every accepted region on this line, and splices them into the base
    /// line. Untouched lines pass through unmodified.
    fn correct_line(&self, field_id: FieldId, line: u32, base: Vec<u16>, vp: &VideoParameters, height: u32) -> Vec<u16> {
        let regions: Vec<DropoutRegion> = self
            .source
            .get_dropout_hints(field_id)
            .into_iter()
            .filter(|r| r.line == line)
            .filter(|r| self.decision_for(r, field_id) == DropoutDecision::Accept)
            .flat_map(|r| self.expand_split_truncate(r, vp))
            .collect();

        if regions.is_empty() {
            return base;
        }

        let mut corrected = base;
        for region in regions {
            let replacement = self
                .intrafield_replacement(field_id, &region, height)
                .or_else(|| self.interfield_replacement(field_id, &region));
            let Some(replacement) = replacement else { continue };
            let end = (region.end_sample as usize).min(corrected.len()).min(replacement.len());
            let start = (region.start_sample as usize).min(end);
            corrected[start..end].copy_from_slice(&replacement[start..end]);
        }
        corrected
    }
}

fn inverse_variance(samples: &[u16]) -> f64 {
    let n = samples.len() as f64;
    let mean = samples.iter().map(|&s| f64::from(s)).sum::<f64>() / n;
    let variance = samples.iter().map(|&s| (f64::from(s) - mean).powi(2)).sum::<f64>() / n;
    1.0 / (variance + 1.0)
}

impl VideoFieldRepresentation for DropoutCorrectWrapper {
    fn field_range(&self) -> FieldIdRange {
        self.source.field_range()
    }

    fn get_descriptor(&self, id: FieldId) -> Option<FieldDescriptor> {
        self.source.get_descriptor(id)
    }

    fn get_line(&self, id: FieldId, line: u32) -> Option<Vec<u16>> {
        let base = self.source.get_line(id, line)?;
        let descriptor = self.source.get_descriptor(id)?;
        let vp = self.source.video_parameters();
        Some(self.correct_line(id, line, base, &vp, descriptor.height))
    }

    fn has_separate_channels(&self) -> bool {
        self.source.has_separate_channels()
    }

    fn get_field_luma(&self, id: FieldId) -> Option<Vec<u16>> {
        self.source.get_field_luma(id)
    }

    fn get_field_chroma(&self, id: FieldId) -> Option<Vec<u16>> {
        self.source.get_field_chroma(id)
    }

    fn get_line_luma(&self, id: FieldId, line: u32) -> Option<Vec<u16>> {
        self.source.get_line_luma(id, line)
    }

    fn get_line_chroma(&self, id: FieldId, line: u32) -> Option<Vec<u16>> {
        self.source.get_line_chroma(id, line)
    }

    /// Corrected regions no longer have dropouts — the point of this
    /// wrapper is to consume the hints, not forward them.
    fn get_dropout_hints(&self, _id: FieldId) -> DropoutHints {
        DropoutHints::new()
    }

    fn get_field_parity_hint(&self, id: FieldId) -> Option<FieldParityHint> {
        self.source.get_field_parity_hint(id)
    }

    fn get_field_phase_hint(&self, id: FieldId) -> Option<FieldPhaseHint> {
        self.source.get_field_phase_hint(id)
    }

    fn has_audio(&self) -> bool {
        self.source.has_audio()
    }

    fn get_audio_sample_count(&self, id: FieldId) -> u64 {
        self.source.get_audio_sample_count(id)
    }

    fn get_audio_samples(&self, id: FieldId) -> Option<tbc_core::AudioSamples> {
        self.source.get_audio_samples(id)
    }

    fn has_efm(&self) -> bool {
        self.source.has_efm()
    }

    fn get_efm_sample_count(&self, id: FieldId) -> u64 {
        self.source.get_efm_sample_count(id)
    }

    fn get_efm_samples(&self, id: FieldId) -> Option<tbc_core::EfmSamples> {
        self.source.get_efm_samples(id)
    }

    fn video_parameters(&self) -> VideoParameters {
        self.source.video_parameters()
    }

    fn id(&self) -> ArtifactId {
        self.artifact_id.clone()
    }

    fn provenance(&self) -> Provenance {
        Provenance {
            stage_name: "dropout_correct".to_string(),
            stage_version: "1".to_string(),
            parameters: ParameterMap::new(),
            input_artifact_ids: vec![self.source.id()],
            timestamp: std::time::SystemTime::now(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tbc_core::{DetectionBasis, FieldBuffer, SyntheticVfr};

    struct DamagedVfr {
        inner: SyntheticVfr,
        regions: Vec<DropoutRegion>,
    }

    impl VideoFieldRepresentation for DamagedVfr {
        fn field_range(&self) -> FieldIdRange {
            self.inner.field_range()
        }
        fn get_descriptor(&self, id: FieldId) -> Option<FieldDescriptor> {
            self.inner.get_descriptor(id)
        }
        fn get_line(&self, id: FieldId, line: u32) -> Option<Vec<u16>> {
            self.inner.get_line(id, line)
        }
        fn get_dropout_hints(&self, _id: FieldId) -> DropoutHints {
            self.regions.iter().copied().collect()
        }
        fn video_parameters(&self) -> VideoParameters {
            self.inner.video_parameters()
        }
        fn id(&self) -> ArtifactId {
            self.inner.id()
        }
        fn provenance(&self) -> Provenance {
            self.inner.provenance()
        }
    }

    fn damaged_source(line: u32, start: u32, end: u32) -> Arc<dyn VideoFieldRepresentation> {
        let vp = VideoParameters::pal_default();
        let mut buffers = vec![
            FieldBuffer::filled(vp.field_width, vp.field_height, 1000),
            FieldBuffer::filled(vp.field_width, vp.field_height, 1000),
        ];
        if let Some(damaged) = buffers[0].line_mut(line) {
            for sample in &mut damaged[start as usize..end as usize] {
                *sample = 0;
            }
        }
        let inner = SyntheticVfr::new("src", vp, buffers);
        Arc::new(DamagedVfr {
            inner,
            regions: vec![DropoutRegion { line, start_sample: start, end_sample: end, detection_basis: DetectionBasis::Computed }],
        })
    }

    #[test]
    fn intrafield_replacement_fills_damaged_span() {
        let source = damaged_source(50, 200, 210);
        let config = DropoutCorrectConfig::default();
        let wrapper = DropoutCorrectWrapper::new(source, HashMap::new(), config, "corrected");

        let corrected = wrapper.get_line(FieldId(0), 50).unwrap();
        assert!(corrected[200..210].iter().all(|&s| s == 1000));
    }

    #[test]
    fn rejected_decision_leaves_region_untouched() {
        let source = damaged_source(50, 200, 210);
        let mut decisions = HashMap::new();
        decisions.insert(RegionKey { field_id: FieldId(0), line: 50, start_sample: 200 }, DropoutDecision::Reject);
        let wrapper = DropoutCorrectWrapper::new(source, decisions, DropoutCorrectConfig::default(), "corrected");

        let corrected = wrapper.get_line(FieldId(0), 50).unwrap();
        assert!(corrected[200..210].iter().all(|&s| s == 0));
    }

    #[test]
    fn untouched_lines_pass_through() {
        let source = damaged_source(50, 200, 210);
        let wrapper = DropoutCorrectWrapper::new(source, HashMap::new(), DropoutCorrectConfig::default(), "corrected");

        let other_line = wrapper.get_line(FieldId(0), 10).unwrap();
        assert!(other_line.iter().all(|&s| s == 1000));
    }

    #[test]
    fn corrected_output_reports_no_dropout_hints() {
        let source = damaged_source(50, 200, 210);
        let wrapper = DropoutCorrectWrapper::new(source, HashMap::new(), DropoutCorrectConfig::default(), "corrected");
        assert!(wrapper.get_dropout_hints(FieldId(0)).is_empty());
    }
}
