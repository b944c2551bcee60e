// SPDX-FileCopyrightText: © 2025 TBC Toolkit Contributors
//
// SPDX-License-Identifier: MPL-2.0

//! The DAG executor: runs every ancestor of a target node, in topological
//! order, threading each stage's outputs into its dependents' inputs.

use std::collections::HashMap;
use std::sync::Arc;

use tbc_core::{Dag, NodeId, NodeKind, ObservationContext, Result, StageOutput, TbcError};

/// Per-run accumulation of every visited node's outputs, restricted to the
/// nodes actually visited for a given target (not the whole DAG).
pub type ArtifactMap = HashMap<NodeId, Vec<StageOutput>>;

/// The result of one `execute_to_node` call: the artifacts produced by every
/// visited node, and the observations their stages wrote along the way.
pub struct ExecutionResult {
    pub artifacts: ArtifactMap,
    pub observations: ObservationContext,
}

impl ExecutionResult {
    /// The target node's outputs, if the run reached it.
    #[must_use]
    pub fn target_outputs<'a>(&'a self, target: &NodeId) -> Option<&'a [StageOutput]> {
        self.artifacts.get(target).map(Vec::as_slice)
    }
}

/// Runs the ancestor subgraph of a target node and returns its artifacts.
///
/// This is a pure function rather than a struct with held state: the DAG and
/// stage instances it mutates (`execute` takes `&mut self`) are supplied by
/// the caller each time, so the executor itself carries no state across
/// calls. The render coordinator is what actually owns long-lived state
/// across calls.
pub struct DagExecutor;

impl DagExecutor {
    /// Executes every ancestor of `target`, in topological order, and
    /// collects the resulting artifact map plus the accumulated observation
    /// context.
    ///
    /// A node whose predecessor produced no artifact at the requested output
    /// index is never invoked: it is recorded as having produced zero
    /// outputs itself, and execution moves on. This is how an unconfigured
    /// source's emptiness propagates through a chain of transforms as "zero
    /// fields available" instead of surfacing as an execution error — only a
    /// node's *own* stage returning fewer than its declared minimum, while it
    /// still had every input it asked for, is an error.
    ///
    /// # Errors
    /// Returns `TbcError::NotFound` if `target` is not in `dag`, and
    /// `TbcError::Execution` if a fully-supplied transform node returns fewer
    /// than its declared minimum outputs.
    pub fn execute_to_node(dag: &mut Dag, target: &NodeId) -> Result<ExecutionResult> {
        let order = dag.ancestors_of(target)?;
        let mut artifacts: ArtifactMap = HashMap::new();
        let mut observations = ObservationContext::new();

        for node_id in &order {
            let (input_node_ids, input_indices, kind, min_outputs) = {
                let node = dag.node(node_id).ok_or_else(|| TbcError::NotFound(format!("node '{node_id}' vanished mid-execution")))?;
                let info = node.stage.node_type_info();
                (node.input_node_ids.clone(), node.input_indices.clone(), info.kind, info.min_outputs)
            };

            let mut inputs = Vec::with_capacity(input_node_ids.len());
            let mut starved = false;
            for (predecessor, &output_index) in input_node_ids.iter().zip(input_indices.iter()) {
                let produced = artifacts.get(predecessor).ok_or_else(|| {
                    TbcError::Execution(format!("node '{node_id}' requires predecessor '{predecessor}' which was never executed"))
                })?;
                match produced.get(output_index) {
                    Some(output) => inputs.push(Arc::clone(output)),
                    None => {
                        starved = true;
                        break;
                    }
                }
            }

            if starved {
                artifacts.insert(node_id.clone(), Vec::new());
                continue;
            }

            let parameters = dag.node(node_id).expect("node checked above").parameters.clone();
            let node = dag.node_mut(node_id).ok_or_else(|| TbcError::NotFound(format!("node '{node_id}' vanished mid-execution")))?;
            let outputs = node.stage.execute(&inputs, &parameters, &mut observations)?;

            if outputs.len() < min_outputs && kind != NodeKind::Source {
                return Err(TbcError::Execution(format!(
                    "node '{node_id}' produced {} output(s), fewer than its declared minimum of {min_outputs}",
                    outputs.len()
                )));
            }

            artifacts.insert(node_id.clone(), outputs);
        }

        Ok(ExecutionResult { artifacts, observations })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tbc_core::{
        DagNode, FormatCompat, NodeTypeInfo, ParameterDescriptor, ParameterMap, Stage, SyntheticVfr, VideoFieldRepresentation,
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

        fn execute(&mut self, _inputs: &[StageOutput], _parameters: &ParameterMap, _ctx: &mut ObservationContext) -> Result<Vec<StageOutput>> {
            if self.count == 0 {
                return Ok(Vec::new());
            }
            let vfr: StageOutput = Arc::new(SyntheticVfr::filled("src", VideoParameters::pal_default(), self.count, 1000));
            Ok(vec![vfr])
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

    struct PassthroughTransform {
        min_outputs: usize,
        force_empty: bool,
    }

    impl Stage for PassthroughTransform {
        fn node_type_info(&self) -> NodeTypeInfo {
            NodeTypeInfo {
                kind: NodeKind::Transform,
                type_name: "test_passthrough".to_string(),
                display_name: "Test Passthrough".to_string(),
                min_inputs: 1,
                max_inputs: 1,
                min_outputs: self.min_outputs,
                max_outputs: 1,
                format_compat: FormatCompat::All,
            }
        }

        fn execute(&mut self, inputs: &[StageOutput], _parameters: &ParameterMap, _ctx: &mut ObservationContext) -> Result<Vec<StageOutput>> {
            if self.force_empty {
                return Ok(Vec::new());
            }
            Ok(inputs.to_vec())
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

    fn linear_dag(source_count: u64, force_empty: bool, min_outputs: usize) -> Dag {
        let mut dag = Dag::new();
        dag.add_node(DagNode::new(NodeId::from("src"), Box::new(SourceStage { count: source_count }), ParameterMap::new())).unwrap();
        let mut t = DagNode::new(NodeId::from("t"), Box::new(PassthroughTransform { min_outputs, force_empty }), ParameterMap::new());
        t.bind_input(NodeId::from("src"), 0);
        dag.add_node(t).unwrap();
        dag
    }

    #[test]
    fn executes_linear_chain_and_collects_artifacts() {
        let mut dag = linear_dag(5, false, 1);
        let result = DagExecutor::execute_to_node(&mut dag, &NodeId::from("t")).unwrap();
        let outputs = result.target_outputs(&NodeId::from("t")).unwrap();
        assert_eq!(outputs.len(), 1);
        assert_eq!(outputs[0].field_count(), 5);
    }

    #[test]
    fn empty_source_output_is_not_an_error() {
        let mut dag = linear_dag(0, false, 0);
        let result = DagExecutor::execute_to_node(&mut dag, &NodeId::from("src")).unwrap();
        assert!(result.target_outputs(&NodeId::from("src")).unwrap().is_empty());
    }

    #[test]
    fn empty_transform_output_below_minimum_is_an_error() {
        let mut dag = linear_dag(5, true, 1);
        let err = DagExecutor::execute_to_node(&mut dag, &NodeId::from("t")).unwrap_err();
        assert!(err.to_string().contains('t'));
    }

    #[test]
    fn unknown_target_is_not_found() {
        let mut dag = linear_dag(5, false, 1);
        assert!(DagExecutor::execute_to_node(&mut dag, &NodeId::from("ghost")).is_err());
    }

    #[test]
    fn unconfigured_source_propagates_as_absence_through_two_transforms() {
        let mut dag = Dag::new();
        dag.add_node(DagNode::new(NodeId::from("src"), Box::new(SourceStage { count: 0 }), ParameterMap::new())).unwrap();
        let mut t1 = DagNode::new(NodeId::from("t1"), Box::new(PassthroughTransform { min_outputs: 0, force_empty: false }), ParameterMap::new());
        t1.bind_input(NodeId::from("src"), 0);
        dag.add_node(t1).unwrap();
        let mut t2 = DagNode::new(NodeId::from("t2"), Box::new(PassthroughTransform { min_outputs: 0, force_empty: false }), ParameterMap::new());
        t2.bind_input(NodeId::from("t1"), 0);
        dag.add_node(t2).unwrap();

        let result = DagExecutor::execute_to_node(&mut dag, &NodeId::from("t2")).unwrap();
        assert!(result.target_outputs(&NodeId::from("src")).unwrap().is_empty());
        assert!(result.target_outputs(&NodeId::from("t1")).unwrap().is_empty());
        assert!(result.target_outputs(&NodeId::from("t2")).unwrap().is_empty());
    }
}
