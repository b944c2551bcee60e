// SPDX-FileCopyrightText: © 2025 TBC Toolkit Contributors
//
// SPDX-License-Identifier: MPL-2.0

//! Caches rendered fields and per-node field counts on top of a
//! [`FieldRenderer`], so repeated scrubbing/analysis passes over the same
//! node don't re-execute the DAG.

use tbc_core::{Dag, FieldId, LruCache, NodeId, ObservationContext, Result, StageOutput};

use crate::renderer::FieldRenderer;

/// Default capacity for the rendered-field cache.
pub const DEFAULT_FIELD_CACHE_CAPACITY: usize = 1000;
/// Default capacity for the per-node field-count cache.
pub const DEFAULT_FIELD_COUNT_CACHE_CAPACITY: usize = 100;

#[derive(Clone, Copy)]
pub struct ObservationCacheConfig {
    pub field_cache_capacity: usize,
    pub field_count_cache_capacity: usize,
}

impl Default for ObservationCacheConfig {
    fn default() -> Self {
        Self { field_cache_capacity: DEFAULT_FIELD_CACHE_CAPACITY, field_count_cache_capacity: DEFAULT_FIELD_COUNT_CACHE_CAPACITY }
    }
}

/// Wraps a [`FieldRenderer`] with two bounded LRUs: rendered-field
/// representations keyed by `(NodeId, FieldId)`, and per-node field counts
/// keyed by `NodeId`. A field-count miss renders field 0 at that node and
/// *retains* the resulting representation in the field cache too —
/// correctness-over-minimality: the field used to derive the count is real
/// data a caller is likely to request next anyway.
pub struct ObservationCache {
    renderer: FieldRenderer,
    fields: LruCache<(NodeId, FieldId), StageOutput>,
    field_counts: LruCache<NodeId, usize>,
}

impl ObservationCache {
    /// # Errors
    /// Returns whatever `TbcError` [`tbc_core::Dag::validate`] reports, via
    /// [`FieldRenderer::new`].
    pub fn new(dag: Dag, config: ObservationCacheConfig) -> Result<Self> {
        Ok(Self {
            renderer: FieldRenderer::new(dag, config.field_cache_capacity)?,
            fields: LruCache::new(config.field_cache_capacity),
            field_counts: LruCache::new(config.field_count_cache_capacity),
        })
    }

    #[must_use]
    pub fn observation_context(&self) -> &ObservationContext {
        self.renderer.observation_context()
    }

    /// # Errors
    /// Returns whatever `TbcError` [`tbc_core::Dag::validate`] reports, via
    /// [`FieldRenderer::update_dag`]; the held DAG is left in place if `dag`
    /// is rejected.
    pub fn update_dag(&mut self, dag: Dag) -> Result<()> {
        self.renderer.update_dag(dag)?;
        self.fields.clear();
        self.field_counts.clear();
        Ok(())
    }

    /// Mutable access to the underlying DAG, for triggering a sink node
    /// directly (see [`crate::coordinator`]).
    pub fn dag_mut(&mut self) -> &mut Dag {
        self.renderer.dag_mut()
    }

    #[must_use]
    pub fn dag(&self) -> &Dag {
        self.renderer.dag()
    }

    /// Renders (or retrieves from cache) the field at `node_id`/`field_id`.
    pub fn get_field(&mut self, node_id: &NodeId, field_id: FieldId) -> Option<StageOutput> {
        let key = (node_id.clone(), field_id);
        if let Some(cached) = self.fields.get(&key) {
            return Some(std::sync::Arc::clone(cached));
        }
        let result = self.renderer.render(node_id, field_id);
        let representation = result.representation?;
        self.fields.insert(key, std::sync::Arc::clone(&representation));
        Some(representation)
    }

    /// Pre-populates the field cache for `node_id` at `field_id` without
    /// returning the representation, used to warm the cache ahead of a
    /// scrub operation.
    pub fn populate_node(&mut self, node_id: &NodeId, field_id: FieldId) {
        self.get_field(node_id, field_id);
    }

    /// Returns the field count for `node_id`'s output, rendering field 0 on
    /// a cache miss to obtain it.
    pub fn get_field_count(&mut self, node_id: &NodeId) -> Option<usize> {
        if let Some(&count) = self.field_counts.get(node_id) {
            return Some(count);
        }
        let representation = self.get_field(node_id, FieldId(0))?;
        let count = representation.field_count() as usize;
        self.field_counts.insert(node_id.clone(), count);
        Some(count)
    }

    /// Drops every cached entry, for every node.
    pub fn clear(&mut self) {
        self.fields.clear();
        self.field_counts.clear();
        self.renderer.clear_cache();
    }

    /// Drops cached entries for one node only. Still a full-cache clear
    /// under the hood for the rendered-field cache, since `LruCache` has no
    /// per-node partial eviction — correctness-over-minimality.
    pub fn clear_node(&mut self, node_id: &NodeId) {
        self.field_counts.remove(node_id);
        self.fields.clear();
        self.renderer.clear_cache();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tbc_core::{
        DagNode, FormatCompat, NodeKind, NodeTypeInfo, ParameterDescriptor, ParameterMap, Stage, SyntheticVfr, VideoFieldRepresentation,
        VideoParameters, VideoSystem,
    };

    struct SourceStage {
        count: u64,
    }
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
            Ok(vec![std::sync::Arc::new(SyntheticVfr::filled("src", VideoParameters::pal_default(), self.count, 500))])
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

    fn dag_with_source(count: u64) -> Dag {
        let mut dag = Dag::new();
        dag.add_node(DagNode::new(NodeId::from("src"), Box::new(SourceStage { count }), ParameterMap::new())).unwrap();
        dag
    }

    #[test]
    fn get_field_count_renders_and_retains_field_zero() {
        let mut cache = ObservationCache::new(dag_with_source(7), ObservationCacheConfig::default()).unwrap();
        let count = cache.get_field_count(&NodeId::from("src")).unwrap();
        assert_eq!(count, 7);
        assert!(cache.fields.contains_key(&(NodeId::from("src"), FieldId(0))));
    }

    #[test]
    fn clear_node_drops_field_count_entry() {
        let mut cache = ObservationCache::new(dag_with_source(3), ObservationCacheConfig::default()).unwrap();
        cache.get_field_count(&NodeId::from("src")).unwrap();
        cache.clear_node(&NodeId::from("src"));
        assert!(!cache.field_counts.contains_key(&NodeId::from("src")));
    }

    #[test]
    fn update_dag_clears_every_cache() {
        let mut cache = ObservationCache::new(dag_with_source(3), ObservationCacheConfig::default()).unwrap();
        cache.get_field_count(&NodeId::from("src")).unwrap();
        cache.update_dag(dag_with_source(3)).unwrap();
        assert_eq!(cache.field_counts.len(), 0);
        assert_eq!(cache.fields.len(), 0);
    }
}
