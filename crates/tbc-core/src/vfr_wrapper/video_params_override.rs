// SPDX-FileCopyrightText: © 2025 TBC Toolkit Contributors
//
// SPDX-License-Identifier: MPL-2.0

//! Video-params-override wrapper: replaces the `VideoParameters` returned to
//! consumers. Sample data is untouched.

use super::delegate_to_source;
use crate::ids::ArtifactId;
use crate::parameter::ParameterMap;
use crate::vfr::{Provenance, VideoFieldRepresentation};
use crate::video_params::VideoParameters;
use std::sync::Arc;

pub struct VideoParamsOverrideWrapper {
    source: Arc<dyn VideoFieldRepresentation>,
    override_params: VideoParameters,
    artifact_id: ArtifactId,
}

impl VideoParamsOverrideWrapper {
    #[must_use]
    pub fn new(source: Arc<dyn VideoFieldRepresentation>, override_params: VideoParameters, artifact_id: impl Into<String>) -> Self {
        Self { source, override_params, artifact_id: ArtifactId::new(artifact_id) }
    }
}

impl VideoFieldRepresentation for VideoParamsOverrideWrapper {
    delegate_to_source!(source);

    fn video_parameters(&self) -> VideoParameters {
        self.override_params.clone()
    }

    fn id(&self) -> ArtifactId {
        self.artifact_id.clone()
    }

    fn provenance(&self) -> Provenance {
        super::wrapper_provenance("video_params_override", "1", ParameterMap::new(), self.source.as_ref())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::synthetic::SyntheticVfr;

    #[test]
    fn overrides_video_parameters_only() {
        let source: Arc<dyn VideoFieldRepresentation> =
            Arc::new(SyntheticVfr::filled("src", VideoParameters::pal_default(), 2, 10));
        let ntsc = VideoParameters::ntsc_default();
        let wrapper = VideoParamsOverrideWrapper::new(Arc::clone(&source), ntsc.clone(), "overridden");

        assert_eq!(wrapper.video_parameters().system, ntsc.system);
        assert_eq!(wrapper.get_field(crate::ids::FieldId(0)), source.get_field(crate::ids::FieldId(0)));
    }
}
