// SPDX-FileCopyrightText: © 2025 TBC Toolkit Contributors
//
// SPDX-License-Identifier: MPL-2.0

//! Stage registry: name → factory map with self-registration.
//!
//! Rust has no static-initializer-before-main hook the way C++ translation
//! units do, so "self-registration" here is an explicit
//! `register_builtin_stages` entry point the embedding application calls
//! once before constructing a DAG, per the redesign note in the source
//! material for environments without static initializers.

use crate::error::{Result, TbcError};
use crate::parameter::{ParameterDescriptor, ParameterMap};
use crate::stage::{NodeTypeInfo, Stage};
use std::collections::HashMap;
use std::sync::Arc;

/// Builds a fresh `Stage` instance from a candidate parameter map.
pub type StageFactory = Arc<dyn Fn(&ParameterMap) -> Result<Box<dyn Stage>> + Send + Sync>;

/// Everything the registry knows about one registered stage type.
#[derive(Clone)]
pub struct StageDefinition {
    pub type_name: String,
    pub node_type_info: NodeTypeInfo,
    pub factory: StageFactory,
}

/// Process-wide (or, in Rust, registry-instance-wide) name → factory map.
/// At most one factory per name; a second registration under the same name
/// is a construction error.
#[derive(Default)]
pub struct StageRegistry {
    definitions: HashMap<String, StageDefinition>,
}

impl StageRegistry {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// # Errors
    /// Returns `TbcError::Construction` if `type_name` is already registered.
    pub fn register(
        &mut self,
        type_name: impl Into<String>,
        node_type_info: NodeTypeInfo,
        factory: StageFactory,
    ) -> Result<()> {
        let type_name = type_name.into();
        if self.definitions.contains_key(&type_name) {
            return Err(TbcError::Construction(format!(
                "stage type '{type_name}' is already registered"
            )));
        }
        self.definitions.insert(type_name.clone(), StageDefinition { type_name, node_type_info, factory });
        Ok(())
    }

    /// # Errors
    /// Returns `TbcError::Construction` if `type_name` is unknown, or the
    /// error from the stage's factory if construction fails.
    pub fn create(&self, type_name: &str, parameters: &ParameterMap) -> Result<Box<dyn Stage>> {
        let definition = self
            .definitions
            .get(type_name)
            .ok_or_else(|| TbcError::Construction(format!("unknown stage type '{type_name}'")))?;
        (definition.factory)(parameters)
    }

    #[must_use]
    pub fn contains(&self, type_name: &str) -> bool {
        self.definitions.contains_key(type_name)
    }

    #[must_use]
    pub fn node_type_info(&self, type_name: &str) -> Option<&NodeTypeInfo> {
        self.definitions.get(type_name).map(|d| &d.node_type_info)
    }

    pub fn definitions(&self) -> impl Iterator<Item = &StageDefinition> {
        self.definitions.values()
    }

    pub fn unregister(&mut self, type_name: &str) -> bool {
        self.definitions.remove(type_name).is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::observation::ObservationContext;
    use crate::stage::{FormatCompat, NodeKind, StageOutput};
    use crate::video_params::VideoSystem;

    struct NoopStage;
    impl Stage for NoopStage {
        fn node_type_info(&self) -> NodeTypeInfo {
            NodeTypeInfo {
                kind: NodeKind::Source,
                type_name: "noop".to_string(),
                display_name: "Noop".to_string(),
                min_inputs: 0,
                max_inputs: 0,
                min_outputs: 0,
                max_outputs: 1,
                format_compat: FormatCompat::All,
            }
        }
        fn execute(&mut self, _: &[StageOutput], _: &ParameterMap, _: &mut ObservationContext) -> Result<Vec<StageOutput>> {
            Ok(Vec::new())
        }
        fn parameter_descriptors(&self, _: VideoSystem, _: &str) -> Vec<ParameterDescriptor> {
            Vec::new()
        }
        fn get_parameters(&self) -> ParameterMap {
            ParameterMap::new()
        }
        fn set_parameters(&mut self, _: ParameterMap) -> Result<()> {
            Ok(())
        }
    }

    fn info() -> NodeTypeInfo {
        NoopStage.node_type_info()
    }

    #[test]
    fn duplicate_registration_is_an_error() {
        let mut registry = StageRegistry::new();
        registry.register("noop", info(), Arc::new(|_| Ok(Box::new(NoopStage)))).unwrap();
        let err = registry.register("noop", info(), Arc::new(|_| Ok(Box::new(NoopStage))));
        assert!(err.is_err());
    }

    #[test]
    fn create_instantiates_registered_stage() {
        let mut registry = StageRegistry::new();
        registry.register("noop", info(), Arc::new(|_| Ok(Box::new(NoopStage)))).unwrap();
        let stage = registry.create("noop", &ParameterMap::new()).unwrap();
        assert_eq!(stage.node_type_info().type_name, "noop");
    }

    #[test]
    fn create_unknown_type_is_an_error() {
        let registry = StageRegistry::new();
        assert!(registry.create("missing", &ParameterMap::new()).is_err());
    }
}
