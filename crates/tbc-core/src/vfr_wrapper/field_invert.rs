// SPDX-FileCopyrightText: © 2025 TBC Toolkit Contributors
//
// SPDX-License-Identifier: MPL-2.0

//! Field-invert wrapper: flips `is_first_field` on parity hints only.
//! Sample data, descriptors, and every other capability are untouched —
//! the minimal-override use of [`super::delegate_to_source`].

use super::delegate_to_source;
use crate::field::FieldParityHint;
use crate::ids::{ArtifactId, FieldId};
use crate::parameter::ParameterMap;
use crate::vfr::{Provenance, VideoFieldRepresentation};
use std::sync::Arc;

pub struct FieldInvertWrapper {
    source: Arc<dyn VideoFieldRepresentation>,
    artifact_id: ArtifactId,
}

impl FieldInvertWrapper {
    #[must_use]
    pub fn new(source: Arc<dyn VideoFieldRepresentation>, artifact_id: impl Into<String>) -> Self {
        Self { source, artifact_id: ArtifactId::new(artifact_id) }
    }
}

impl VideoFieldRepresentation for FieldInvertWrapper {
    delegate_to_source!(source);

    fn get_field_parity_hint(&self, id: FieldId) -> Option<FieldParityHint> {
        self.source.get_field_parity_hint(id).map(|hint| FieldParityHint { is_first_field: !hint.is_first_field })
    }

    fn id(&self) -> ArtifactId {
        self.artifact_id.clone()
    }

    fn provenance(&self) -> Provenance {
        super::wrapper_provenance("field_invert", "1", ParameterMap::new(), self.source.as_ref())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::synthetic::SyntheticVfr;
    use crate::video_params::VideoParameters;

    struct HintedVfr {
        inner: SyntheticVfr,
    }
    impl VideoFieldRepresentation for HintedVfr {
        delegate_to_source!(inner);

        fn get_field_parity_hint(&self, _id: FieldId) -> Option<FieldParityHint> {
            Some(FieldParityHint { is_first_field: true })
        }

        fn id(&self) -> ArtifactId {
            self.inner.id()
        }

        fn provenance(&self) -> Provenance {
            self.inner.provenance()
        }
    }

    #[test]
    fn inverts_parity_hint_only() {
        let inner = HintedVfr { inner: SyntheticVfr::filled("src", VideoParameters::pal_default(), 3, 10) };
        let source: Arc<dyn VideoFieldRepresentation> = Arc::new(inner);
        let wrapper = FieldInvertWrapper::new(Arc::clone(&source), "inverted");

        let hint = wrapper.get_field_parity_hint(FieldId(0)).unwrap();
        assert!(!hint.is_first_field);
        // sample data is untouched
        assert_eq!(wrapper.get_field(FieldId(0)), source.get_field(FieldId(0)));
    }
}
