// SPDX-FileCopyrightText: © 2025 TBC Toolkit Contributors
//
// SPDX-License-Identifier: MPL-2.0

//! Typed parameter values, descriptors, and constraint validation.

use crate::error::{Result, TbcError};
use crate::video_params::VideoSystem;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// A single stage parameter value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, schemars::JsonSchema)]
#[serde(untagged)]
pub enum ParameterValue {
    Int(i64),
    Float(f64),
    Bool(bool),
    String(String),
    StringList(Vec<String>),
}

impl ParameterValue {
    #[must_use]
    pub fn type_name(&self) -> &'static str {
        match self {
            Self::Int(_) => "int",
            Self::Float(_) => "float",
            Self::Bool(_) => "bool",
            Self::String(_) => "string",
            Self::StringList(_) => "string_list",
        }
    }

    #[must_use]
    pub fn as_int(&self) -> Option<i64> {
        match self {
            Self::Int(v) => Some(*v),
            _ => None,
        }
    }

    #[must_use]
    pub fn as_float(&self) -> Option<f64> {
        match self {
            Self::Float(v) => Some(*v),
            Self::Int(v) => Some(*v as f64),
            _ => None,
        }
    }

    #[must_use]
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Self::Bool(v) => Some(*v),
            _ => None,
        }
    }

    #[must_use]
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::String(v) => Some(v),
            _ => None,
        }
    }
}

/// Parameter name → value.
pub type ParameterMap = HashMap<String, ParameterValue>;

/// Min/max/default/allowed-values/required constraints for one parameter.
#[derive(Debug, Clone, Default, Serialize, Deserialize, schemars::JsonSchema)]
pub struct ParameterConstraint {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub min: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub default: Option<ParameterValue>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub allowed_values: Option<Vec<String>>,
    #[serde(default)]
    pub required: bool,
}

/// A parameter another parameter's visibility/applicability depends on.
#[derive(Debug, Clone, Serialize, Deserialize, schemars::JsonSchema)]
pub struct ParameterDependency {
    pub parameter_name: String,
    pub required_value: ParameterValue,
}

/// Describes one parameter a stage accepts.
#[derive(Debug, Clone, Serialize, Deserialize, schemars::JsonSchema)]
pub struct ParameterDescriptor {
    pub name: String,
    pub display_name: String,
    pub value_type: String,
    #[serde(default)]
    pub constraint: ParameterConstraint,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub depends_on: Option<ParameterDependency>,
}

impl ParameterDescriptor {
    #[must_use]
    pub fn new(name: impl Into<String>, display_name: impl Into<String>, value_type: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            display_name: display_name.into(),
            value_type: value_type.into(),
            constraint: ParameterConstraint::default(),
            depends_on: None,
        }
    }

    #[must_use]
    pub fn with_constraint(mut self, constraint: ParameterConstraint) -> Self {
        self.constraint = constraint;
        self
    }
}

/// Validates `params` against `descriptors`: unknown keys, missing required
/// values, wrong types, and out-of-range/out-of-allowed-set values are all
/// rejected without mutating the caller's state (`set_parameters` callers
/// validate a candidate map before committing it).
///
/// # Errors
/// Returns `TbcError::Parameter` describing the first violation found.
pub fn validate_against(params: &ParameterMap, descriptors: &[ParameterDescriptor]) -> Result<()> {
    let known: std::collections::HashSet<&str> = descriptors.iter().map(|d| d.name.as_str()).collect();
    for key in params.keys() {
        if !known.contains(key.as_str()) {
            return Err(TbcError::Parameter(format!("unknown parameter '{key}'")));
        }
    }

    for descriptor in descriptors {
        let Some(value) = params.get(&descriptor.name) else {
            if descriptor.constraint.required && descriptor.constraint.default.is_none() {
                return Err(TbcError::Parameter(format!(
                    "missing required parameter '{}'",
                    descriptor.name
                )));
            }
            continue;
        };

        if value.type_name() != descriptor.value_type {
            return Err(TbcError::Parameter(format!(
                "parameter '{}' expects type '{}', got '{}'",
                descriptor.name,
                descriptor.value_type,
                value.type_name()
            )));
        }

        if let Some(numeric) = value.as_float() {
            if let Some(min) = descriptor.constraint.min {
                if numeric < min {
                    return Err(TbcError::Parameter(format!(
                        "parameter '{}' value {numeric} is below minimum {min}",
                        descriptor.name
                    )));
                }
            }
            if let Some(max) = descriptor.constraint.max {
                if numeric > max {
                    return Err(TbcError::Parameter(format!(
                        "parameter '{}' value {numeric} exceeds maximum {max}",
                        descriptor.name
                    )));
                }
            }
        }

        if let Some(allowed) = &descriptor.constraint.allowed_values {
            if let Some(s) = value.as_str() {
                if !allowed.iter().any(|a| a == s) {
                    return Err(TbcError::Parameter(format!(
                        "parameter '{}' value '{s}' is not one of {allowed:?}",
                        descriptor.name
                    )));
                }
            }
        }
    }

    Ok(())
}

/// Applied when a stage's `parameter_descriptors` need to vary by target
/// video system (e.g. a PAL-only gain curve not offered for NTSC sources).
#[must_use]
pub fn format_compatible(system: VideoSystem, compat: crate::stage::FormatCompat) -> bool {
    use crate::stage::FormatCompat;
    match compat {
        FormatCompat::All => true,
        FormatCompat::PalOnly => matches!(system, VideoSystem::Pal | VideoSystem::PalM),
        FormatCompat::NtscOnly => matches!(system, VideoSystem::Ntsc),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn descriptors() -> Vec<ParameterDescriptor> {
        vec![
            ParameterDescriptor::new("gain", "Gain", "float").with_constraint(ParameterConstraint {
                min: Some(0.0),
                max: Some(10.0),
                default: Some(ParameterValue::Float(1.0)),
                allowed_values: None,
                required: false,
            }),
            ParameterDescriptor::new("mode", "Mode", "string").with_constraint(ParameterConstraint {
                allowed_values: Some(vec!["a".to_string(), "b".to_string()]),
                required: true,
                ..Default::default()
            }),
        ]
    }

    #[test]
    fn rejects_unknown_key() {
        let mut params = ParameterMap::new();
        params.insert("bogus".to_string(), ParameterValue::Int(1));
        assert!(validate_against(&params, &descriptors()).is_err());
    }

    #[test]
    fn rejects_missing_required() {
        let params = ParameterMap::new();
        let err = validate_against(&params, &descriptors()).unwrap_err();
        assert!(err.to_string().contains("mode"));
    }

    #[test]
    fn rejects_out_of_range() {
        let mut params = ParameterMap::new();
        params.insert("gain".to_string(), ParameterValue::Float(20.0));
        params.insert("mode".to_string(), ParameterValue::String("a".to_string()));
        assert!(validate_against(&params, &descriptors()).is_err());
    }

    #[test]
    fn rejects_disallowed_string() {
        let mut params = ParameterMap::new();
        params.insert("mode".to_string(), ParameterValue::String("z".to_string()));
        assert!(validate_against(&params, &descriptors()).is_err());
    }

    #[test]
    fn accepts_valid_map() {
        let mut params = ParameterMap::new();
        params.insert("gain".to_string(), ParameterValue::Float(2.0));
        params.insert("mode".to_string(), ParameterValue::String("b".to_string()));
        assert!(validate_against(&params, &descriptors()).is_ok());
    }

    #[test]
    fn missing_optional_with_default_is_ok() {
        let mut params = ParameterMap::new();
        params.insert("mode".to_string(), ParameterValue::String("a".to_string()));
        assert!(validate_against(&params, &descriptors()).is_ok());
    }
}
