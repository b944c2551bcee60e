// SPDX-FileCopyrightText: © 2025 TBC Toolkit Contributors
//
// SPDX-License-Identifier: MPL-2.0

//! Overwrite wrapper: substitutes a constant sample for a rectangular region
//! of the visible area. All other samples pass through unchanged.

use super::delegate_to_source;
use crate::ids::{ArtifactId, FieldId};
use crate::parameter::ParameterMap;
use crate::vfr::{Provenance, VideoFieldRepresentation};
use std::sync::Arc;

/// A rectangular region of samples to overwrite, in line/sample coordinates.
/// `line_end`/`sample_end` are exclusive.
#[derive(Debug, Clone, Copy)]
pub struct OverwriteRegion {
    pub line_start: u32,
    pub line_end: u32,
    pub sample_start: u32,
    pub sample_end: u32,
}

impl OverwriteRegion {
    #[must_use]
    fn covers_line(&self, line: u32) -> bool {
        line >= self.line_start && line < self.line_end
    }
}

pub struct OverwriteWrapper {
    source: Arc<dyn VideoFieldRepresentation>,
    region: OverwriteRegion,
    fill_value: u16,
    artifact_id: ArtifactId,
}

impl OverwriteWrapper {
    #[must_use]
    pub fn new(source: Arc<dyn VideoFieldRepresentation>, region: OverwriteRegion, fill_value: u16, artifact_id: impl Into<String>) -> Self {
        Self { source, region, fill_value, artifact_id: ArtifactId::new(artifact_id) }
    }
}

impl VideoFieldRepresentation for OverwriteWrapper {
    delegate_to_source!(source);

    fn get_line(&self, id: FieldId, line: u32) -> Option<Vec<u16>> {
        let mut samples = self.source.get_line(id, line)?;
        if self.region.covers_line(line) {
            let start = (self.region.sample_start as usize).min(samples.len());
            let end = (self.region.sample_end as usize).min(samples.len());
            for sample in &mut samples[start..end] {
                *sample = self.fill_value;
            }
        }
        Some(samples)
    }

    fn id(&self) -> ArtifactId {
        self.artifact_id.clone()
    }

    fn provenance(&self) -> Provenance {
        super::wrapper_provenance("overwrite", "1", ParameterMap::new(), self.source.as_ref())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::synthetic::SyntheticVfr;
    use crate::video_params::VideoParameters;

    #[test]
    fn overwrites_only_the_configured_region() {
        let source: Arc<dyn VideoFieldRepresentation> =
            Arc::new(SyntheticVfr::filled("src", VideoParameters::pal_default(), 1, 100));
        let region = OverwriteRegion { line_start: 2, line_end: 4, sample_start: 10, sample_end: 20 };
        let wrapper = OverwriteWrapper::new(Arc::clone(&source), region, 0, "overwritten");

        let untouched_line = wrapper.get_line(FieldId(0), 0).unwrap();
        assert!(untouched_line.iter().all(|&s| s == 100));

        let touched_line = wrapper.get_line(FieldId(0), 2).unwrap();
        assert!(touched_line[10..20].iter().all(|&s| s == 0));
        assert!(touched_line[0..10].iter().all(|&s| s == 100));
        assert!(touched_line[20..].iter().all(|&s| s == 100));
    }
}
