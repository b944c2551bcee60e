// SPDX-FileCopyrightText: © 2025 TBC Toolkit Contributors
//
// SPDX-License-Identifier: MPL-2.0

//! An in-memory leaf VFR. Backs tests and the illustrative in-memory source
//! stage; owns its field buffers directly rather than memory-mapping a file.

use crate::field::{FieldDescriptor, FieldFormat, Parity};
use crate::ids::{ArtifactId, FieldId, FieldIdRange};
use crate::parameter::ParameterMap;
use crate::sample::FieldBuffer;
use crate::vfr::{Provenance, VideoFieldRepresentation};
use crate::video_params::VideoParameters;
use std::time::SystemTime;

/// A fully owned, in-memory VFR: one `FieldBuffer` per field, uniform
/// geometry drawn from a single `VideoParameters`.
pub struct SyntheticVfr {
    artifact_id: ArtifactId,
    video_params: VideoParameters,
    fields: Vec<FieldBuffer>,
}

impl SyntheticVfr {
    #[must_use]
    pub fn new(artifact_id: impl Into<String>, video_params: VideoParameters, fields: Vec<FieldBuffer>) -> Self {
        Self { artifact_id: ArtifactId::new(artifact_id), video_params, fields }
    }

    /// Builds `count` fields filled with `fill_value`, alternating parity
    /// starting at `Top`. Convenient for tests and demos.
    #[must_use]
    pub fn filled(artifact_id: impl Into<String>, video_params: VideoParameters, count: u64, fill_value: u16) -> Self {
        let fields = (0..count)
            .map(|_| FieldBuffer::filled(video_params.field_width, video_params.field_height, fill_value))
            .collect();
        Self::new(artifact_id, video_params, fields)
    }

    fn index(&self, id: FieldId) -> Option<usize> {
        if !id.is_valid() {
            return None;
        }
        let idx = id.0;
        if idx < self.fields.len() as u64 {
            Some(idx as usize)
        } else {
            None
        }
    }
}

impl VideoFieldRepresentation for SyntheticVfr {
    fn field_range(&self) -> FieldIdRange {
        FieldIdRange::new(FieldId(0), FieldId(self.fields.len() as u64))
    }

    fn get_descriptor(&self, id: FieldId) -> Option<FieldDescriptor> {
        let idx = self.index(id)?;
        let parity = if idx % 2 == 0 { Parity::Top } else { Parity::Bottom };
        let format = match self.video_params.system {
            crate::video_params::VideoSystem::Ntsc => FieldFormat::Ntsc,
            _ => FieldFormat::Pal,
        };
        Some(FieldDescriptor {
            field_id: id,
            width: self.video_params.field_width,
            height: self.video_params.field_height,
            format,
            parity,
            frame_number: Some((idx / 2) as u32),
        })
    }

    fn get_line(&self, id: FieldId, line: u32) -> Option<Vec<u16>> {
        let idx = self.index(id)?;
        self.fields[idx].line(line).map(<[u16]>::to_vec)
    }

    fn get_field(&self, id: FieldId) -> Option<Vec<u16>> {
        let idx = self.index(id)?;
        Some(self.fields[idx].as_slice().to_vec())
    }

    fn id(&self) -> ArtifactId {
        self.artifact_id.clone()
    }

    fn provenance(&self) -> Provenance {
        Provenance {
            stage_name: "synthetic_source".to_string(),
            stage_version: "1".to_string(),
            parameters: ParameterMap::new(),
            input_artifact_ids: Vec::new(),
            timestamp: SystemTime::now(),
        }
    }

    fn video_parameters(&self) -> VideoParameters {
        self.video_params.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn has_field_matches_range() {
        let vfr = SyntheticVfr::filled("src", VideoParameters::pal_default(), 5, 100);
        for id in vfr.field_range().iter() {
            assert!(vfr.has_field(id));
        }
        assert!(!vfr.has_field(FieldId(5)));
        assert!(!vfr.has_field(FieldId::INVALID));
    }

    #[test]
    fn get_field_matches_concatenated_lines() {
        let vp = VideoParameters::pal_default();
        let vfr = SyntheticVfr::filled("src", vp.clone(), 2, 42);
        let whole = vfr.get_field(FieldId(0)).unwrap();
        let mut expected = Vec::new();
        for line in 0..vp.field_height {
            expected.extend(vfr.get_line(FieldId(0), line).unwrap());
        }
        assert_eq!(whole, expected);
    }

    #[test]
    fn out_of_range_field_returns_none() {
        let vfr = SyntheticVfr::filled("src", VideoParameters::pal_default(), 3, 0);
        assert!(vfr.get_descriptor(FieldId(3)).is_none());
        assert!(vfr.get_line(FieldId(3), 0).is_none());
    }
}
