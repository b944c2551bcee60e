// SPDX-FileCopyrightText: © 2025 TBC Toolkit Contributors
//
// SPDX-License-Identifier: MPL-2.0

//! On-demand single-field rendering at any node in a DAG, with a
//! version-keyed cache so repeated requests for the same (node, field)
//! against an unchanged DAG are free.

use tbc_core::{Dag, FieldId, LruCache, NodeId, ObservationContext, Result, StageOutput, VideoFieldRepresentation};

use crate::executor::DagExecutor;

/// The outcome of one [`FieldRenderer::render`] call. Field names match
/// the renderer this module is grounded on: `representation`, `is_valid`,
/// `error_message`, `node_id`, `field_id`, `from_cache`.
#[derive(Clone)]
pub struct RenderResult {
    pub representation: Option<StageOutput>,
    pub is_valid: bool,
    pub error_message: String,
    pub node_id: NodeId,
    pub field_id: FieldId,
    pub from_cache: bool,
}

impl RenderResult {
    fn error(node_id: NodeId, field_id: FieldId, message: impl Into<String>) -> Self {
        Self { representation: None, is_valid: false, error_message: message.into(), node_id, field_id, from_cache: false }
    }
}

type CacheKey = (NodeId, FieldId, u64);

/// Renders a single field at any node of a DAG on demand. Not thread-safe by
/// design — the render coordinator (see [`crate::coordinator`]) is the only
/// intended caller, and it serializes access from its own worker thread.
pub struct FieldRenderer {
    dag: Dag,
    dag_version: u64,
    cache_enabled: bool,
    cache: LruCache<CacheKey, RenderResult>,
    observations: ObservationContext,
}

impl FieldRenderer {
    /// # Errors
    /// Returns whatever `TbcError` [`Dag::validate`] reports (cycles, unbound
    /// required inputs) — a renderer is never constructed over an invalid DAG.
    pub fn new(dag: Dag, cache_capacity: usize) -> Result<Self> {
        dag.validate()?;
        Ok(Self { dag, dag_version: 1, cache_enabled: true, cache: LruCache::new(cache_capacity), observations: ObservationContext::new() })
    }

    /// Observations accumulated across every render performed since
    /// construction or the last DAG update.
    #[must_use]
    pub fn observation_context(&self) -> &ObservationContext {
        &self.observations
    }

    #[must_use]
    pub fn dag_version(&self) -> u64 {
        self.dag_version
    }

    #[must_use]
    pub fn dag(&self) -> &Dag {
        &self.dag
    }

    /// Mutable access to the held DAG, for callers (the coordinator's
    /// trigger path) that need to run a stage's `trigger()` rather than
    /// `execute()`. Does not bump `dag_version` or clear the cache — callers
    /// mutating node state outside of `update_dag` are responsible for
    /// calling it themselves if cached renders are invalidated.
    pub fn dag_mut(&mut self) -> &mut Dag {
        &mut self.dag
    }

    /// Replaces the DAG being rendered, incrementing the version and
    /// discarding every cached result — they described a DAG that no longer
    /// exists.
    ///
    /// # Errors
    /// Returns whatever `TbcError` [`Dag::validate`] reports; the renderer's
    /// previous DAG is left in place if `dag` is rejected.
    pub fn update_dag(&mut self, dag: Dag) -> Result<()> {
        dag.validate()?;
        self.dag = dag;
        self.dag_version += 1;
        self.cache.clear();
        self.observations = ObservationContext::new();
        Ok(())
    }

    pub fn clear_cache(&mut self) {
        self.cache.clear();
    }

    pub fn set_cache_enabled(&mut self, enabled: bool) {
        self.cache_enabled = enabled;
    }

    #[must_use]
    pub fn is_cache_enabled(&self) -> bool {
        self.cache_enabled
    }

    /// Executes the DAG up to `node_id` and returns its zeroth output,
    /// provided `field_id` is actually available from it. Errors are
    /// reported in the result rather than via `Result`, matching the
    /// "never throws across the cache boundary" shape this is grounded on.
    pub fn render(&mut self, node_id: &NodeId, field_id: FieldId) -> RenderResult {
        if !self.dag.contains(node_id) {
            return RenderResult::error(node_id.clone(), field_id, format!("node '{node_id}' does not exist in DAG"));
        }

        let key: CacheKey = (node_id.clone(), field_id, self.dag_version);
        if self.cache_enabled {
            if let Some(cached) = self.cache.get(&key) {
                let mut hit = cached.clone();
                hit.from_cache = true;
                return hit;
            }
        }

        let result = self.render_uncached(node_id, field_id);
        if self.cache_enabled && result.is_valid {
            self.cache.insert(key, result.clone());
        }
        result
    }

    fn render_uncached(&mut self, node_id: &NodeId, field_id: FieldId) -> RenderResult {
        let mut execution = match DagExecutor::execute_to_node(&mut self.dag, node_id) {
            Ok(execution) => execution,
            Err(err) => return RenderResult::error(node_id.clone(), field_id, err.to_string()),
        };
        self.observations.merge(std::mem::take(&mut execution.observations));

        let representation = match execution.target_outputs(node_id).and_then(<[StageOutput]>::first) {
            Some(representation) => std::sync::Arc::clone(representation),
            None => return RenderResult::error(node_id.clone(), field_id, format!("node '{node_id}' produced no output")),
        };

        if !representation.has_field(field_id) {
            return RenderResult::error(node_id.clone(), field_id, format!("field {field_id} not available in node '{node_id}'"));
        }

        RenderResult {
            representation: Some(representation),
            is_valid: true,
            error_message: String::new(),
            node_id: node_id.clone(),
            field_id,
            from_cache: false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tbc_core::{DagNode, FormatCompat, NodeKind, NodeTypeInfo, ObservationContext, ParameterDescriptor, ParameterMap, Stage, SyntheticVfr, VideoParameters, VideoSystem};

    struct SourceStage;
    impl Stage for SourceStage {
        fn node_type_info(&self) -> NodeTypeInfo {
            NodeTypeInfo {
                kind: NodeKind::Source,
                type_name: "test_source".to_string(),
                display_name: "Test Source".to_string(),
                min_inputs: 0,
                max_inputs: 0,
                min_outputs: 0,
                max_outputs: 1,
                format_compat: FormatCompat::All,
            }
        }
        fn execute(&mut self, _inputs: &[StageOutput], _parameters: &ParameterMap, _ctx: &mut ObservationContext) -> tbc_core::Result<Vec<StageOutput>> {
            Ok(vec![std::sync::Arc::new(SyntheticVfr::filled("src", VideoParameters::pal_default(), 4, 500))])
        }
        fn parameter_descriptors(&self, _project_format: VideoSystem, _source_type: &str) -> Vec<ParameterDescriptor> {
            Vec::new()
        }
        fn get_parameters(&self) -> ParameterMap {
            ParameterMap::new()
        }
        fn set_parameters(&mut self, _params: ParameterMap) -> tbc_core::Result<()> {
            Ok(())
        }
    }

    fn dag_with_source() -> Dag {
        let mut dag = Dag::new();
        dag.add_node(DagNode::new(NodeId::from("src"), Box::new(SourceStage), ParameterMap::new())).unwrap();
        dag
    }

    #[test]
    fn renders_valid_field_and_then_hits_cache() {
        let mut renderer = FieldRenderer::new(dag_with_source(), 10).unwrap();
        let first = renderer.render(&NodeId::from("src"), FieldId(1));
        assert!(first.is_valid);
        assert!(!first.from_cache);

        let second = renderer.render(&NodeId::from("src"), FieldId(1));
        assert!(second.is_valid);
        assert!(second.from_cache);
    }

    #[test]
    fn out_of_range_field_is_invalid() {
        let mut renderer = FieldRenderer::new(dag_with_source(), 10).unwrap();
        let result = renderer.render(&NodeId::from("src"), FieldId(99));
        assert!(!result.is_valid);
    }

    #[test]
    fn unknown_node_is_invalid() {
        let mut renderer = FieldRenderer::new(dag_with_source(), 10).unwrap();
        let result = renderer.render(&NodeId::from("ghost"), FieldId(0));
        assert!(!result.is_valid);
    }

    #[test]
    fn update_dag_increments_version_and_clears_cache() {
        let mut renderer = FieldRenderer::new(dag_with_source(), 10).unwrap();
        renderer.render(&NodeId::from("src"), FieldId(0));
        assert_eq!(renderer.cache.len(), 1);

        let before_version = renderer.dag_version();
        renderer.update_dag(dag_with_source()).unwrap();
        assert_eq!(renderer.dag_version(), before_version + 1);
        assert_eq!(renderer.cache.len(), 0);
    }
}
