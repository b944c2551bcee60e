// SPDX-FileCopyrightText: © 2025 TBC Toolkit Contributors
//
// SPDX-License-Identifier: MPL-2.0

//! tbc-project: the persisted project document format for the TBC pipeline
//! substrate, and its compilation into a [`tbc_core::dag::Dag`].
//!
//! A [`Project`] is a serializable, human-editable description of a pipeline
//! — named nodes plus the connections between their numbered input/output
//! slots — kept separate from `tbc_core::dag::Dag` itself because a `Dag`
//! owns live, non-serializable `Box<dyn Stage>` instances. [`compile`] is
//! the bridge: it resolves each node's stage type through a
//! [`tbc_core::StageRegistry`], validates parameters, and wires up the
//! edges a `Dag` needs.

pub mod yaml;

use std::collections::HashMap;

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use tbc_core::{Dag, DagNode, NodeId, NodeKind, ParameterMap, Result, StageRegistry, TbcError};

/// One node of a [`Project`]: which stage type it instantiates, and the
/// parameters it is configured with.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProjectNode {
    pub stage_type_name: String,
    #[serde(default)]
    pub parameters: ParameterMap,
}

/// An edge from one node's numbered output to another node's numbered
/// input. Numbered rather than named slots, matching
/// [`tbc_core::dag::DagNode`]'s `input_indices` convention.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Connection {
    pub from_node: NodeId,
    #[serde(default)]
    pub from_output_index: usize,
    pub to_node: NodeId,
    pub to_input_index: usize,
}

/// A persisted, serializable pipeline description: named nodes plus the
/// connections between them. Compiles into a [`Dag`] via [`compile`].
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Project {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default)]
    pub nodes: IndexMap<NodeId, ProjectNode>,
    #[serde(default)]
    pub connections: Vec<Connection>,
}

/// Resolves every node's stage type through `registry`, wires up
/// `connections` in input-index order, marks every sink/analysis-sink node
/// as a DAG sink, and validates the result.
///
/// # Errors
/// Returns `TbcError::Construction` if a node names an unregistered stage
/// type, the error from the stage's own parameter validation if its
/// configured parameters are rejected, `TbcError::Validation` if a
/// connection names a node the project doesn't define or leaves an input
/// index ungapped (indices for a node's inputs must be exactly `0..n`), or
/// any error `Dag::validate` reports (cycles, unbound required inputs).
pub fn compile(project: &Project, registry: &StageRegistry) -> Result<Dag> {
    let mut dag = Dag::new();

    for (node_id, project_node) in &project.nodes {
        let stage = registry.create(&project_node.stage_type_name, &project_node.parameters)?;
        let kind = stage.node_type_info().kind;
        dag.add_node(DagNode::new(node_id.clone(), stage, project_node.parameters.clone()))?;
        if matches!(kind, NodeKind::Sink | NodeKind::AnalysisSink) {
            dag.mark_sink(node_id.clone());
        }
    }

    let mut inbound: HashMap<&NodeId, Vec<&Connection>> = HashMap::new();
    for connection in &project.connections {
        if !project.nodes.contains_key(&connection.from_node) {
            return Err(TbcError::Validation(format!(
                "connection references unknown source node '{}'",
                connection.from_node
            )));
        }
        if !project.nodes.contains_key(&connection.to_node) {
            return Err(TbcError::Validation(format!(
                "connection references unknown destination node '{}'",
                connection.to_node
            )));
        }
        inbound.entry(&connection.to_node).or_default().push(connection);
    }

    for (to_node, mut connections) in inbound {
        connections.sort_by_key(|c| c.to_input_index);
        for (expected_index, connection) in connections.iter().enumerate() {
            if connection.to_input_index != expected_index {
                return Err(TbcError::Validation(format!(
                    "node '{to_node}' input index {} is ungapped: inputs must be numbered 0..n without gaps or duplicates",
                    connection.to_input_index
                )));
            }
        }
        let node = dag.node_mut(to_node).expect("node existence already checked above");
        for connection in connections {
            node.bind_input(connection.from_node.clone(), connection.from_output_index);
        }
    }

    dag.validate()?;
    Ok(dag)
}
