// SPDX-FileCopyrightText: © 2025 TBC Toolkit Contributors
//
// SPDX-License-Identifier: MPL-2.0

//! The DAG model: nodes, edges, input indices, and structural validation.

use crate::error::{Result, TbcError};
use crate::ids::NodeId;
use crate::parameter::ParameterMap;
use crate::stage::Stage;
use indexmap::IndexMap;
use std::collections::HashSet;

/// One node in a DAG: an owned stage instance, its configured parameters,
/// and the predecessor nodes/output-indices its inputs are drawn from.
/// `input_indices` is parallel to `input_node_ids`: `input_indices[i]`
/// selects which output of `input_node_ids[i]` feeds input slot `i`.
pub struct DagNode {
    pub node_id: NodeId,
    pub stage: Box<dyn Stage>,
    pub parameters: ParameterMap,
    pub input_node_ids: Vec<NodeId>,
    pub input_indices: Vec<usize>,
}

impl DagNode {
    #[must_use]
    pub fn new(node_id: NodeId, stage: Box<dyn Stage>, parameters: ParameterMap) -> Self {
        Self { node_id, stage, parameters, input_node_ids: Vec::new(), input_indices: Vec::new() }
    }

    pub fn bind_input(&mut self, predecessor: NodeId, output_index: usize) {
        self.input_node_ids.push(predecessor);
        self.input_indices.push(output_index);
    }
}

/// A directed acyclic graph of `DagNode`s plus the designated sink/output
/// nodes and an index for O(1) lookup by `NodeId`.
pub struct Dag {
    nodes: Vec<DagNode>,
    index: IndexMap<NodeId, usize>,
    sinks: Vec<NodeId>,
}

impl Dag {
    #[must_use]
    pub fn new() -> Self {
        Self { nodes: Vec::new(), index: IndexMap::new(), sinks: Vec::new() }
    }

    /// # Errors
    /// Returns `TbcError::Validation` if `node_id` is already present.
    pub fn add_node(&mut self, node: DagNode) -> Result<()> {
        if self.index.contains_key(&node.node_id) {
            return Err(TbcError::Validation(format!("duplicate node id '{}'", node.node_id)));
        }
        self.index.insert(node.node_id.clone(), self.nodes.len());
        self.nodes.push(node);
        Ok(())
    }

    pub fn mark_sink(&mut self, node_id: NodeId) {
        if !self.sinks.contains(&node_id) {
            self.sinks.push(node_id);
        }
    }

    #[must_use]
    pub fn node(&self, node_id: &NodeId) -> Option<&DagNode> {
        self.index.get(node_id).map(|&i| &self.nodes[i])
    }

    pub fn node_mut(&mut self, node_id: &NodeId) -> Option<&mut DagNode> {
        let i = *self.index.get(node_id)?;
        Some(&mut self.nodes[i])
    }

    #[must_use]
    pub fn nodes(&self) -> &[DagNode] {
        &self.nodes
    }

    #[must_use]
    pub fn sinks(&self) -> &[NodeId] {
        &self.sinks
    }

    #[must_use]
    pub fn contains(&self, node_id: &NodeId) -> bool {
        self.index.contains_key(node_id)
    }

    /// Validates structural soundness: acyclic, every referenced predecessor
    /// exists, and every non-source node has all declared inputs bound.
    /// Output-count-vs-fan-out compatibility is necessarily a runtime
    /// property (it depends on how many outputs a stage actually returns)
    /// and is instead enforced by the executor (see [`crate::stage::Stage::execute`]).
    ///
    /// # Errors
    /// Returns `TbcError::Validation` describing the first problem found.
    pub fn validate(&self) -> Result<()> {
        for node in &self.nodes {
            for predecessor in &node.input_node_ids {
                if !self.index.contains_key(predecessor) {
                    return Err(TbcError::Validation(format!(
                        "node '{}' references unknown predecessor '{predecessor}'",
                        node.node_id
                    )));
                }
            }
            let info = node.stage.node_type_info();
            if node.input_node_ids.len() < info.min_inputs {
                return Err(TbcError::Validation(format!(
                    "node '{}' requires at least {} input(s), has {}",
                    node.node_id,
                    info.min_inputs,
                    node.input_node_ids.len()
                )));
            }
            if node.input_node_ids.len() > info.max_inputs {
                return Err(TbcError::Validation(format!(
                    "node '{}' accepts at most {} input(s), has {}",
                    node.node_id,
                    info.max_inputs,
                    node.input_node_ids.len()
                )));
            }
        }

        self.detect_cycle()?;
        Ok(())
    }

    fn detect_cycle(&self) -> Result<()> {
        #[derive(PartialEq, Clone, Copy)]
        enum Mark {
            Unvisited,
            InProgress,
            Done,
        }

        let mut marks: Vec<Mark> = vec![Mark::Unvisited; self.nodes.len()];

        fn visit(
            i: usize,
            nodes: &[DagNode],
            index: &IndexMap<NodeId, usize>,
            marks: &mut [Mark],
        ) -> Result<()> {
            match marks[i] {
                Mark::Done => return Ok(()),
                Mark::InProgress => {
                    return Err(TbcError::Validation(format!(
                        "cycle detected at node '{}'",
                        nodes[i].node_id
                    )))
                }
                Mark::Unvisited => {}
            }
            marks[i] = Mark::InProgress;
            for predecessor in &nodes[i].input_node_ids {
                if let Some(&pi) = index.get(predecessor) {
                    visit(pi, nodes, index, marks)?;
                }
            }
            marks[i] = Mark::Done;
            Ok(())
        }

        for i in 0..self.nodes.len() {
            visit(i, &self.nodes, &self.index, &mut marks)?;
        }
        Ok(())
    }

    /// Nodes in a valid forward topological order (predecessors before
    /// dependents). Deterministic given a fixed `Dag`, but the specific
    /// order among independent nodes is not load-bearing.
    ///
    /// # Errors
    /// Returns `TbcError::Validation` if the graph contains a cycle.
    pub fn topological_order(&self) -> Result<Vec<NodeId>> {
        self.detect_cycle()?;
        let mut order = Vec::with_capacity(self.nodes.len());
        let mut visited = HashSet::new();

        fn visit(
            i: usize,
            nodes: &[DagNode],
            index: &IndexMap<NodeId, usize>,
            visited: &mut HashSet<NodeId>,
            order: &mut Vec<NodeId>,
        ) {
            if visited.contains(&nodes[i].node_id) {
                return;
            }
            for predecessor in &nodes[i].input_node_ids {
                if let Some(&pi) = index.get(predecessor) {
                    visit(pi, nodes, index, visited, order);
                }
            }
            visited.insert(nodes[i].node_id.clone());
            order.push(nodes[i].node_id.clone());
        }

        for i in 0..self.nodes.len() {
            visit(i, &self.nodes, &self.index, &mut visited, &mut order);
        }
        Ok(order)
    }

    /// Nodes reachable backward from `target`, inclusive, in forward
    /// topological order — exactly the set an executor run visits.
    ///
    /// # Errors
    /// Returns `TbcError::NotFound` if `target` is not in the DAG.
    pub fn ancestors_of(&self, target: &NodeId) -> Result<Vec<NodeId>> {
        if !self.index.contains_key(target) {
            return Err(TbcError::NotFound(format!("node '{target}' not found in DAG")));
        }
        let full_order = self.topological_order()?;
        let mut reachable = HashSet::new();
        reachable.insert(target.clone());

        // Walk the full order backward, adding any node that is a
        // predecessor of something already known to be reachable.
        for node_id in full_order.iter().rev() {
            if let Some(node) = self.node(node_id) {
                if reachable.contains(node_id) {
                    for predecessor in &node.input_node_ids {
                        reachable.insert(predecessor.clone());
                    }
                }
            }
        }

        Ok(full_order.into_iter().filter(|id| reachable.contains(id)).collect())
    }
}

impl Default for Dag {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::observation::ObservationContext;
    use crate::parameter::ParameterDescriptor;
    use crate::stage::{FormatCompat, NodeKind, StageOutput};
    use crate::video_params::VideoSystem;

    struct StubStage {
        kind: NodeKind,
        min_inputs: usize,
        max_inputs: usize,
    }

    impl Stage for StubStage {
        fn node_type_info(&self) -> crate::stage::NodeTypeInfo {
            crate::stage::NodeTypeInfo {
                kind: self.kind,
                type_name: "stub".to_string(),
                display_name: "Stub".to_string(),
                min_inputs: self.min_inputs,
                max_inputs: self.max_inputs,
                min_outputs: 0,
                max_outputs: 1,
                format_compat: FormatCompat::All,
            }
        }

        fn execute(
            &mut self,
            _inputs: &[StageOutput],
            _parameters: &ParameterMap,
            _observation_context: &mut ObservationContext,
        ) -> Result<Vec<StageOutput>> {
            Ok(Vec::new())
        }

        fn parameter_descriptors(&self, _project_format: VideoSystem, _source_type: &str) -> Vec<ParameterDescriptor> {
            Vec::new()
        }

        fn get_parameters(&self) -> ParameterMap {
            ParameterMap::new()
        }

        fn set_parameters(&mut self, _params: ParameterMap) -> Result<()> {
            Ok(())
        }
    }

    fn source_node(id: &str) -> DagNode {
        DagNode::new(NodeId::from(id), Box::new(StubStage { kind: NodeKind::Source, min_inputs: 0, max_inputs: 0 }), ParameterMap::new())
    }

    fn transform_node(id: &str) -> DagNode {
        DagNode::new(NodeId::from(id), Box::new(StubStage { kind: NodeKind::Transform, min_inputs: 1, max_inputs: 4 }), ParameterMap::new())
    }

    #[test]
    fn validate_accepts_linear_chain() {
        let mut dag = Dag::new();
        dag.add_node(source_node("src")).unwrap();
        let mut t = transform_node("t");
        t.bind_input(NodeId::from("src"), 0);
        dag.add_node(t).unwrap();
        assert!(dag.validate().is_ok());
    }

    #[test]
    fn validate_rejects_unbound_transform() {
        let mut dag = Dag::new();
        dag.add_node(transform_node("t")).unwrap();
        assert!(dag.validate().is_err());
    }

    #[test]
    fn validate_rejects_dangling_predecessor() {
        let mut dag = Dag::new();
        let mut t = transform_node("t");
        t.bind_input(NodeId::from("ghost"), 0);
        dag.add_node(t).unwrap();
        assert!(dag.validate().is_err());
    }

    #[test]
    fn detects_cycle() {
        let mut dag = Dag::new();
        let mut a = transform_node("a");
        a.bind_input(NodeId::from("b"), 0);
        let mut b = transform_node("b");
        b.bind_input(NodeId::from("a"), 0);
        dag.add_node(a).unwrap();
        dag.add_node(b).unwrap();
        assert!(dag.validate().is_err());
    }

    #[test]
    fn topological_order_respects_dependencies() {
        let mut dag = Dag::new();
        dag.add_node(source_node("src")).unwrap();
        let mut t = transform_node("t");
        t.bind_input(NodeId::from("src"), 0);
        dag.add_node(t).unwrap();

        let order = dag.topological_order().unwrap();
        let src_pos = order.iter().position(|n| n.as_str() == "src").unwrap();
        let t_pos = order.iter().position(|n| n.as_str() == "t").unwrap();
        assert!(src_pos < t_pos);
    }

    #[test]
    fn ancestors_of_excludes_unrelated_branch() {
        let mut dag = Dag::new();
        dag.add_node(source_node("src_a")).unwrap();
        dag.add_node(source_node("src_b")).unwrap();
        let mut t = transform_node("t");
        t.bind_input(NodeId::from("src_a"), 0);
        dag.add_node(t).unwrap();

        let ancestors = dag.ancestors_of(&NodeId::from("t")).unwrap();
        assert!(ancestors.contains(&NodeId::from("src_a")));
        assert!(ancestors.contains(&NodeId::from("t")));
        assert!(!ancestors.contains(&NodeId::from("src_b")));
    }
}
