// SPDX-FileCopyrightText: © 2025 TBC Toolkit Contributors
//
// SPDX-License-Identifier: MPL-2.0

//! A user-facing YAML project format that compiles into [`Project`].
//!
//! Rather than spelling out numbered output/input indices by hand, a node
//! lists its dependencies under `needs`, in the order its inputs should be
//! bound — the same `needs`-list convention the persisted pipeline format
//! uses elsewhere, adapted here to by-index rather than named pins since a
//! `tbc_core::dag::Dag` node addresses its inputs positionally.

use indexmap::IndexMap;
use serde::Deserialize;

use tbc_core::{NodeId, ParameterMap};

use crate::{Connection, Project, ProjectNode};

/// A single dependency: which node's zeroth output feeds the next free
/// input slot.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum NeedsDependency {
    Simple(String),
    WithOutput { node: String, #[serde(default)] output: usize },
}

impl NeedsDependency {
    fn node(&self) -> &str {
        match self {
            Self::Simple(s) => s,
            Self::WithOutput { node, .. } => node,
        }
    }

    fn output_index(&self) -> usize {
        match self {
            Self::Simple(_) => 0,
            Self::WithOutput { output, .. } => *output,
        }
    }
}

#[derive(Debug, Deserialize, Default)]
#[serde(untagged)]
enum Needs {
    #[default]
    None,
    Single(NeedsDependency),
    Multiple(Vec<NeedsDependency>),
}

/// A single node in a user-facing YAML project document.
#[derive(Debug, Deserialize)]
struct UserNode {
    stage: String,
    #[serde(default)]
    parameters: ParameterMap,
    #[serde(default)]
    needs: Needs,
}

/// The top-level structure of a user-facing YAML project document.
#[derive(Debug, Deserialize)]
pub struct UserProject {
    #[serde(skip_serializing_if = "Option::is_none")]
    name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    description: Option<String>,
    nodes: IndexMap<String, UserNode>,
}

/// Parses a YAML document directly into a [`Project`].
///
/// # Errors
/// Returns a message describing the first parse or cycle-independent
/// structural problem found (a `needs` entry naming a node the document
/// doesn't define). Actual DAG validity — cycles, unbound required inputs —
/// is left to [`crate::compile`], which runs `Dag::validate` once stages
/// have been resolved through a registry.
pub fn parse(document: &str) -> Result<Project, String> {
    let user_project: UserProject = serde_saphyr::from_str(document).map_err(|e| e.to_string())?;
    compile(user_project)
}

fn compile(user_project: UserProject) -> Result<Project, String> {
    let UserProject { name, description, nodes: user_nodes } = user_project;

    let mut nodes = IndexMap::new();
    let mut connections = Vec::new();

    for (node_name, user_node) in &user_nodes {
        let dependencies: Vec<&NeedsDependency> = match &user_node.needs {
            Needs::None => Vec::new(),
            Needs::Single(dep) => vec![dep],
            Needs::Multiple(deps) => deps.iter().collect(),
        };

        for (to_input_index, dependency) in dependencies.iter().enumerate() {
            let dep_name = dependency.node();
            if !user_nodes.contains_key(dep_name) {
                return Err(format!("node '{node_name}' references non-existent node '{dep_name}' in 'needs'"));
            }
            connections.push(Connection {
                from_node: NodeId::from(dep_name),
                from_output_index: dependency.output_index(),
                to_node: NodeId::from(node_name.as_str()),
                to_input_index,
            });
        }
    }

    for (node_name, user_node) in user_nodes {
        nodes.insert(NodeId::from(node_name.as_str()), ProjectNode { stage_type_name: user_node.stage, parameters: user_node.parameters });
    }

    Ok(Project { name, description, nodes, connections })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_linear_project() {
        let yaml = r"
name: demo
nodes:
  src:
    stage: synthetic_source
    parameters:
      field_count: 4
  sink:
    stage: field_export_sink
    parameters:
      output_path: /tmp/out.tbc
    needs: src
";
        let project = parse(yaml).unwrap();
        assert_eq!(project.name, Some("demo".to_string()));
        assert_eq!(project.nodes.len(), 2);
        assert_eq!(project.connections.len(), 1);
        let connection = &project.connections[0];
        assert_eq!(connection.from_node, NodeId::from("src"));
        assert_eq!(connection.to_node, NodeId::from("sink"));
        assert_eq!(connection.to_input_index, 0);
    }

    #[test]
    fn multiple_needs_assigns_increasing_input_indices() {
        let yaml = r"
nodes:
  a:
    stage: synthetic_source
  b:
    stage: synthetic_source
  overwrite:
    stage: overwrite
    needs:
      - a
      - b
";
        let project = parse(yaml).unwrap();
        assert_eq!(project.connections.len(), 2);
        let mut indices: Vec<usize> = project.connections.iter().map(|c| c.to_input_index).collect();
        indices.sort_unstable();
        assert_eq!(indices, vec![0, 1]);
    }

    #[test]
    fn needs_naming_unknown_node_is_rejected() {
        let yaml = r"
nodes:
  a:
    stage: synthetic_source
    needs: ghost
";
        let err = parse(yaml).unwrap_err();
        assert!(err.contains("ghost"));
    }

    #[test]
    fn needs_with_explicit_output_index_is_respected() {
        let yaml = r"
nodes:
  src:
    stage: synthetic_source
  dependent:
    stage: field_invert
    needs:
      node: src
      output: 2
";
        let project = parse(yaml).unwrap();
        assert_eq!(project.connections[0].from_output_index, 2);
    }
}
