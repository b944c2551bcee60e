// SPDX-FileCopyrightText: © 2025 TBC Toolkit Contributors
//
// SPDX-License-Identifier: MPL-2.0

//! Illustrative builtin stages: a synthetic in-memory source, the five
//! `tbc_core::vfr_wrapper` wrappers and the dropout-correct transform as
//! registrable DAG nodes, and a field-export sink exercising the trigger
//! protocol end to end.
//!
//! Every transform here reads its configuration straight from the
//! `parameters` argument `execute`/`trigger` are called with (the DAG's
//! per-node parameter map), the same convention [`crate::analysis`]'s sinks
//! use for `write_csv`/`output_path`. `get_parameters`/`set_parameters` keep
//! a stage-owned copy in step for registry/UI introspection, but are not
//! themselves consulted during execution.

use std::collections::HashMap;
use std::fs::File;
use std::io::BufWriter;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use tbc_core::{
    validate_against, FormatCompat, NodeKind, NodeTypeInfo, ObservationContext, ParameterConstraint, ParameterDescriptor, ParameterMap,
    ParameterValue, ProgressCallback, Result, Stage, StageOutput, StageRegistry, SyntheticVfr, TbcError, TriggerableStage, VideoFieldRepresentation,
    VideoParameters, VideoSystem,
};
use tbc_core::vfr_wrapper::overwrite::OverwriteRegion;
use tbc_core::vfr_wrapper::{FieldInvertWrapper, FieldMapWrapper, OverwriteWrapper, SourceAlignWrapper, VideoParamsOverrideWrapper};

use crate::dropout_correct::{DropoutCorrectConfig, DropoutCorrectWrapper};

fn int_param(parameters: &ParameterMap, name: &str) -> Option<i64> {
    parameters.get(name).and_then(ParameterValue::as_int)
}

fn str_param<'a>(parameters: &'a ParameterMap, name: &str) -> Option<&'a str> {
    parameters.get(name).and_then(ParameterValue::as_str)
}

fn bool_param(parameters: &ParameterMap, name: &str) -> Option<bool> {
    parameters.get(name).and_then(ParameterValue::as_bool)
}

fn required_int(parameters: &ParameterMap, name: &str, stage: &str) -> Result<i64> {
    int_param(parameters, name).ok_or_else(|| TbcError::Parameter(format!("{stage} requires '{name}'")))
}

fn required_u32(parameters: &ParameterMap, name: &str, stage: &str) -> Result<u32> {
    required_int(parameters, name, stage).map(|v| v.clamp(0, i64::from(u32::MAX)) as u32)
}

/// An in-memory source producing `field_count` uniform fields. `field_count
/// == 0` (the default) is the documented "unconfigured source" signal —
/// `execute` returns an empty output vector rather than an error.
pub struct SyntheticSourceStage {
    parameters: ParameterMap,
    next_id: u64,
}

impl SyntheticSourceStage {
    #[must_use]
    pub fn new() -> Self {
        Self { parameters: ParameterMap::new(), next_id: 0 }
    }
}

impl Default for SyntheticSourceStage {
    fn default() -> Self {
        Self::new()
    }
}

impl Stage for SyntheticSourceStage {
    fn node_type_info(&self) -> NodeTypeInfo {
        NodeTypeInfo {
            kind: NodeKind::Source,
            type_name: "synthetic_source".to_string(),
            display_name: "Synthetic Source".to_string(),
            min_inputs: 0,
            max_inputs: 0,
            min_outputs: 0,
            max_outputs: 1,
            format_compat: FormatCompat::All,
        }
    }

    fn execute(&mut self, _inputs: &[StageOutput], parameters: &ParameterMap, _ctx: &mut ObservationContext) -> Result<Vec<StageOutput>> {
        let field_count = int_param(parameters, "field_count").unwrap_or(0).max(0) as u64;
        if field_count == 0 {
            return Ok(Vec::new());
        }
        let fill_value = int_param(parameters, "fill_value").unwrap_or(16384).clamp(0, i64::from(u16::MAX)) as u16;
        let vp = match str_param(parameters, "system") {
            Some("ntsc") => VideoParameters::ntsc_default(),
            _ => VideoParameters::pal_default(),
        };
        self.next_id += 1;
        let vfr = SyntheticVfr::filled(format!("synthetic_{}", self.next_id), vp, field_count, fill_value);
        Ok(vec![Arc::new(vfr)])
    }

    fn parameter_descriptors(&self, _project_format: VideoSystem, _source_type: &str) -> Vec<ParameterDescriptor> {
        vec![
            ParameterDescriptor::new("field_count", "Field Count", "int")
                .with_constraint(ParameterConstraint { min: Some(0.0), default: Some(ParameterValue::Int(0)), ..Default::default() }),
            ParameterDescriptor::new("fill_value", "Fill Value", "int").with_constraint(ParameterConstraint {
                min: Some(0.0),
                max: Some(65535.0),
                default: Some(ParameterValue::Int(16384)),
                ..Default::default()
            }),
            ParameterDescriptor::new("system", "Video System", "string").with_constraint(ParameterConstraint {
                allowed_values: Some(vec!["pal".to_string(), "ntsc".to_string()]),
                default: Some(ParameterValue::String("pal".to_string())),
                ..Default::default()
            }),
        ]
    }

    fn get_parameters(&self) -> ParameterMap {
        self.parameters.clone()
    }

    fn set_parameters(&mut self, params: ParameterMap) -> Result<()> {
        validate_against(&params, &self.parameter_descriptors(VideoSystem::Unknown, ""))?;
        self.parameters = params;
        Ok(())
    }
}

/// `field_map::FieldMapWrapper` as a transform stage: `range_spec` is parsed
/// per [`FieldMapWrapper::parse_range_spec`] on every `execute`.
pub struct FieldMapStage {
    parameters: ParameterMap,
    next_id: u64,
}

impl FieldMapStage {
    #[must_use]
    pub fn new() -> Self {
        Self { parameters: ParameterMap::new(), next_id: 0 }
    }
}

impl Default for FieldMapStage {
    fn default() -> Self {
        Self::new()
    }
}

impl Stage for FieldMapStage {
    fn node_type_info(&self) -> NodeTypeInfo {
        NodeTypeInfo {
            kind: NodeKind::Transform,
            type_name: "field_map".to_string(),
            display_name: "Field Map".to_string(),
            min_inputs: 1,
            max_inputs: 1,
            min_outputs: 1,
            max_outputs: 1,
            format_compat: FormatCompat::All,
        }
    }

    fn execute(&mut self, inputs: &[StageOutput], parameters: &ParameterMap, _ctx: &mut ObservationContext) -> Result<Vec<StageOutput>> {
        let source = inputs.first().ok_or_else(|| TbcError::Execution("field_map requires one input".to_string()))?;
        let spec = str_param(parameters, "range_spec").ok_or_else(|| TbcError::Parameter("field_map requires 'range_spec'".to_string()))?;
        let map = FieldMapWrapper::parse_range_spec(spec).map_err(TbcError::Parameter)?;
        self.next_id += 1;
        let wrapper = FieldMapWrapper::new(Arc::clone(source), map, format!("field_map_{}", self.next_id));
        Ok(vec![Arc::new(wrapper)])
    }

    fn parameter_descriptors(&self, _project_format: VideoSystem, _source_type: &str) -> Vec<ParameterDescriptor> {
        vec![ParameterDescriptor::new("range_spec", "Range Specification", "string")
            .with_constraint(ParameterConstraint { required: true, ..Default::default() })]
    }

    fn get_parameters(&self) -> ParameterMap {
        self.parameters.clone()
    }

    fn set_parameters(&mut self, params: ParameterMap) -> Result<()> {
        validate_against(&params, &self.parameter_descriptors(VideoSystem::Unknown, ""))?;
        self.parameters = params;
        Ok(())
    }
}

/// `source_align::SourceAlignWrapper` as a transform stage.
pub struct SourceAlignStage {
    parameters: ParameterMap,
    next_id: u64,
}

impl SourceAlignStage {
    #[must_use]
    pub fn new() -> Self {
        Self { parameters: ParameterMap::new(), next_id: 0 }
    }
}

impl Default for SourceAlignStage {
    fn default() -> Self {
        Self::new()
    }
}

impl Stage for SourceAlignStage {
    fn node_type_info(&self) -> NodeTypeInfo {
        NodeTypeInfo {
            kind: NodeKind::Transform,
            type_name: "source_align".to_string(),
            display_name: "Source Align".to_string(),
            min_inputs: 1,
            max_inputs: 1,
            min_outputs: 0,
            max_outputs: 1,
            format_compat: FormatCompat::All,
        }
    }

    fn execute(&mut self, inputs: &[StageOutput], parameters: &ParameterMap, _ctx: &mut ObservationContext) -> Result<Vec<StageOutput>> {
        let source = inputs.first().ok_or_else(|| TbcError::Execution("source_align requires one input".to_string()))?;
        let offset = int_param(parameters, "offset").unwrap_or(0);
        self.next_id += 1;
        let wrapper = SourceAlignWrapper::new(Arc::clone(source), offset, format!("source_align_{}", self.next_id));
        Ok(vec![Arc::new(wrapper)])
    }

    fn parameter_descriptors(&self, _project_format: VideoSystem, _source_type: &str) -> Vec<ParameterDescriptor> {
        vec![ParameterDescriptor::new("offset", "Offset", "int")
            .with_constraint(ParameterConstraint { default: Some(ParameterValue::Int(0)), ..Default::default() })]
    }

    fn get_parameters(&self) -> ParameterMap {
        self.parameters.clone()
    }

    fn set_parameters(&mut self, params: ParameterMap) -> Result<()> {
        validate_against(&params, &self.parameter_descriptors(VideoSystem::Unknown, ""))?;
        self.parameters = params;
        Ok(())
    }
}

/// `field_invert::FieldInvertWrapper` as a transform stage. Takes no
/// parameters: it only flips the parity hint.
pub struct FieldInvertStage {
    next_id: u64,
}

impl FieldInvertStage {
    #[must_use]
    pub fn new() -> Self {
        Self { next_id: 0 }
    }
}

impl Default for FieldInvertStage {
    fn default() -> Self {
        Self::new()
    }
}

impl Stage for FieldInvertStage {
    fn node_type_info(&self) -> NodeTypeInfo {
        NodeTypeInfo {
            kind: NodeKind::Transform,
            type_name: "field_invert".to_string(),
            display_name: "Field Invert".to_string(),
            min_inputs: 1,
            max_inputs: 1,
            min_outputs: 0,
            max_outputs: 1,
            format_compat: FormatCompat::All,
        }
    }

    fn execute(&mut self, inputs: &[StageOutput], _parameters: &ParameterMap, _ctx: &mut ObservationContext) -> Result<Vec<StageOutput>> {
        let source = inputs.first().ok_or_else(|| TbcError::Execution("field_invert requires one input".to_string()))?;
        self.next_id += 1;
        let wrapper = FieldInvertWrapper::new(Arc::clone(source), format!("field_invert_{}", self.next_id));
        Ok(vec![Arc::new(wrapper)])
    }

    fn parameter_descriptors(&self, _project_format: VideoSystem, _source_type: &str) -> Vec<ParameterDescriptor> {
        Vec::new()
    }

    fn get_parameters(&self) -> ParameterMap {
        ParameterMap::new()
    }

    fn set_parameters(&mut self, params: ParameterMap) -> Result<()> {
        validate_against(&params, &self.parameter_descriptors(VideoSystem::Unknown, ""))
    }
}

/// `overwrite::OverwriteWrapper` as a transform stage: a constant-fill
/// rectangular region.
pub struct OverwriteStage {
    parameters: ParameterMap,
    next_id: u64,
}

impl OverwriteStage {
    #[must_use]
    pub fn new() -> Self {
        Self { parameters: ParameterMap::new(), next_id: 0 }
    }
}

impl Default for OverwriteStage {
    fn default() -> Self {
        Self::new()
    }
}

impl Stage for OverwriteStage {
    fn node_type_info(&self) -> NodeTypeInfo {
        NodeTypeInfo {
            kind: NodeKind::Transform,
            type_name: "overwrite".to_string(),
            display_name: "Overwrite Region".to_string(),
            min_inputs: 1,
            max_inputs: 1,
            min_outputs: 0,
            max_outputs: 1,
            format_compat: FormatCompat::All,
        }
    }

    fn execute(&mut self, inputs: &[StageOutput], parameters: &ParameterMap, _ctx: &mut ObservationContext) -> Result<Vec<StageOutput>> {
        let source = inputs.first().ok_or_else(|| TbcError::Execution("overwrite requires one input".to_string()))?;
        let region = OverwriteRegion {
            line_start: required_u32(parameters, "line_start", "overwrite")?,
            line_end: required_u32(parameters, "line_end", "overwrite")?,
            sample_start: required_u32(parameters, "sample_start", "overwrite")?,
            sample_end: required_u32(parameters, "sample_end", "overwrite")?,
        };
        let fill_value = int_param(parameters, "fill_value").unwrap_or(0).clamp(0, i64::from(u16::MAX)) as u16;
        self.next_id += 1;
        let wrapper = OverwriteWrapper::new(Arc::clone(source), region, fill_value, format!("overwrite_{}", self.next_id));
        Ok(vec![Arc::new(wrapper)])
    }

    fn parameter_descriptors(&self, _project_format: VideoSystem, _source_type: &str) -> Vec<ParameterDescriptor> {
        let required = |name: &str, display: &str| {
            ParameterDescriptor::new(name, display, "int").with_constraint(ParameterConstraint { required: true, min: Some(0.0), ..Default::default() })
        };
        vec![
            required("line_start", "Line Start"),
            required("line_end", "Line End"),
            required("sample_start", "Sample Start"),
            required("sample_end", "Sample End"),
            ParameterDescriptor::new("fill_value", "Fill Value", "int").with_constraint(ParameterConstraint {
                min: Some(0.0),
                max: Some(65535.0),
                default: Some(ParameterValue::Int(0)),
                ..Default::default()
            }),
        ]
    }

    fn get_parameters(&self) -> ParameterMap {
        self.parameters.clone()
    }

    fn set_parameters(&mut self, params: ParameterMap) -> Result<()> {
        validate_against(&params, &self.parameter_descriptors(VideoSystem::Unknown, ""))?;
        self.parameters = params;
        Ok(())
    }
}

/// `video_params_override::VideoParamsOverrideWrapper` as a transform stage:
/// selects a preset (`"pal"`/`"ntsc"`) to replace the source's
/// `VideoParameters` with.
pub struct VideoParamsOverrideStage {
    parameters: ParameterMap,
    next_id: u64,
}

impl VideoParamsOverrideStage {
    #[must_use]
    pub fn new() -> Self {
        Self { parameters: ParameterMap::new(), next_id: 0 }
    }
}

impl Default for VideoParamsOverrideStage {
    fn default() -> Self {
        Self::new()
    }
}

impl Stage for VideoParamsOverrideStage {
    fn node_type_info(&self) -> NodeTypeInfo {
        NodeTypeInfo {
            kind: NodeKind::Transform,
            type_name: "video_params_override".to_string(),
            display_name: "Video Params Override".to_string(),
            min_inputs: 1,
            max_inputs: 1,
            min_outputs: 0,
            max_outputs: 1,
            format_compat: FormatCompat::All,
        }
    }

    fn execute(&mut self, inputs: &[StageOutput], parameters: &ParameterMap, _ctx: &mut ObservationContext) -> Result<Vec<StageOutput>> {
        let source = inputs.first().ok_or_else(|| TbcError::Execution("video_params_override requires one input".to_string()))?;
        let system = str_param(parameters, "system").ok_or_else(|| TbcError::Parameter("video_params_override requires 'system'".to_string()))?;
        let override_params = match system {
            "ntsc" => VideoParameters::ntsc_default(),
            "pal" => VideoParameters::pal_default(),
            other => return Err(TbcError::Parameter(format!("unknown video system '{other}'"))),
        };
        self.next_id += 1;
        let wrapper = VideoParamsOverrideWrapper::new(Arc::clone(source), override_params, format!("video_params_override_{}", self.next_id));
        Ok(vec![Arc::new(wrapper)])
    }

    fn parameter_descriptors(&self, _project_format: VideoSystem, _source_type: &str) -> Vec<ParameterDescriptor> {
        vec![ParameterDescriptor::new("system", "Video System", "string").with_constraint(ParameterConstraint {
            required: true,
            allowed_values: Some(vec!["pal".to_string(), "ntsc".to_string()]),
            ..Default::default()
        })]
    }

    fn get_parameters(&self) -> ParameterMap {
        self.parameters.clone()
    }

    fn set_parameters(&mut self, params: ParameterMap) -> Result<()> {
        validate_against(&params, &self.parameter_descriptors(VideoSystem::Unknown, ""))?;
        self.parameters = params;
        Ok(())
    }
}

/// `crate::dropout_correct::DropoutCorrectWrapper` as a transform stage.
/// Per-region accept/reject overrides are not exposed through the parameter
/// system (they are keyed by detected-region position, not a flat value);
/// every detected region is corrected.
pub struct DropoutCorrectStage {
    parameters: ParameterMap,
    next_id: u64,
}

impl DropoutCorrectStage {
    #[must_use]
    pub fn new() -> Self {
        Self { parameters: ParameterMap::new(), next_id: 0 }
    }
}

impl Default for DropoutCorrectStage {
    fn default() -> Self {
        Self::new()
    }
}

impl Stage for DropoutCorrectStage {
    fn node_type_info(&self) -> NodeTypeInfo {
        NodeTypeInfo {
            kind: NodeKind::Transform,
            type_name: "dropout_correct".to_string(),
            display_name: "Dropout Correct".to_string(),
            min_inputs: 1,
            max_inputs: 1,
            min_outputs: 0,
            max_outputs: 1,
            format_compat: FormatCompat::All,
        }
    }

    fn execute(&mut self, inputs: &[StageOutput], parameters: &ParameterMap, _ctx: &mut ObservationContext) -> Result<Vec<StageOutput>> {
        let source = inputs.first().ok_or_else(|| TbcError::Execution("dropout_correct requires one input".to_string()))?;
        let config = DropoutCorrectConfig {
            overcorrect_extension: int_param(parameters, "overcorrect_extension").unwrap_or(0).max(0) as u32,
            max_replacement_distance: int_param(parameters, "max_replacement_distance").unwrap_or(4).max(0) as u32,
            reverse_field_order: bool_param(parameters, "reverse_field_order").unwrap_or(false),
        };
        self.next_id += 1;
        let wrapper = DropoutCorrectWrapper::new(Arc::clone(source), HashMap::new(), config, format!("dropout_correct_{}", self.next_id));
        Ok(vec![Arc::new(wrapper)])
    }

    fn parameter_descriptors(&self, _project_format: VideoSystem, _source_type: &str) -> Vec<ParameterDescriptor> {
        vec![
            ParameterDescriptor::new("overcorrect_extension", "Overcorrect Extension", "int").with_constraint(ParameterConstraint {
                min: Some(0.0),
                default: Some(ParameterValue::Int(0)),
                ..Default::default()
            }),
            ParameterDescriptor::new("max_replacement_distance", "Max Replacement Distance", "int").with_constraint(ParameterConstraint {
                min: Some(0.0),
                default: Some(ParameterValue::Int(4)),
                ..Default::default()
            }),
            ParameterDescriptor::new("reverse_field_order", "Reverse Field Order", "bool")
                .with_constraint(ParameterConstraint { default: Some(ParameterValue::Bool(false)), ..Default::default() }),
        ]
    }

    fn get_parameters(&self) -> ParameterMap {
        self.parameters.clone()
    }

    fn set_parameters(&mut self, params: ParameterMap) -> Result<()> {
        validate_against(&params, &self.parameter_descriptors(VideoSystem::Unknown, ""))?;
        self.parameters = params;
        Ok(())
    }
}

struct SinkState {
    cancel: Arc<AtomicBool>,
    status: String,
    progress: Option<ProgressCallback>,
    fields_written: u64,
}

impl SinkState {
    fn new() -> Self {
        Self { cancel: Arc::new(AtomicBool::new(false)), status: "Idle".to_string(), progress: None, fields_written: 0 }
    }
}

/// Streams every field of its input to `output_path` as raw 16-bit
/// little-endian samples via [`tbc_core::BufferedFieldWriter`]. Exercises
/// the trigger/progress/cancel protocol end to end: a cancelled export
/// removes the partial file rather than leaving it behind.
pub struct FieldExportSinkStage {
    state: SinkState,
    parameters: ParameterMap,
}

impl FieldExportSinkStage {
    #[must_use]
    pub fn new() -> Self {
        Self { state: SinkState::new(), parameters: ParameterMap::new() }
    }

    #[must_use]
    pub fn fields_written(&self) -> u64 {
        self.state.fields_written
    }
}

impl Default for FieldExportSinkStage {
    fn default() -> Self {
        Self::new()
    }
}

impl Stage for FieldExportSinkStage {
    fn node_type_info(&self) -> NodeTypeInfo {
        NodeTypeInfo {
            kind: NodeKind::Sink,
            type_name: "field_export_sink".to_string(),
            display_name: "Field Export Sink".to_string(),
            min_inputs: 1,
            max_inputs: 1,
            min_outputs: 0,
            max_outputs: 0,
            format_compat: FormatCompat::All,
        }
    }

    fn execute(&mut self, _inputs: &[StageOutput], _parameters: &ParameterMap, _ctx: &mut ObservationContext) -> Result<Vec<StageOutput>> {
        Ok(Vec::new())
    }

    fn parameter_descriptors(&self, _project_format: VideoSystem, _source_type: &str) -> Vec<ParameterDescriptor> {
        vec![ParameterDescriptor::new("output_path", "Output Path", "string")
            .with_constraint(ParameterConstraint { required: true, ..Default::default() })]
    }

    fn get_parameters(&self) -> ParameterMap {
        self.parameters.clone()
    }

    fn set_parameters(&mut self, params: ParameterMap) -> Result<()> {
        validate_against(&params, &self.parameter_descriptors(VideoSystem::Unknown, ""))?;
        self.parameters = params;
        Ok(())
    }

    fn as_triggerable(&mut self) -> Option<&mut dyn TriggerableStage> {
        Some(self)
    }
}

impl TriggerableStage for FieldExportSinkStage {
    fn trigger(&mut self, inputs: &[StageOutput], parameters: &ParameterMap, _ctx: &mut ObservationContext) -> Result<bool> {
        self.state.cancel.store(false, Ordering::Relaxed);
        self.state.fields_written = 0;
        let source = inputs.first().ok_or_else(|| TbcError::Execution("field_export_sink requires one input".to_string()))?;
        let path = str_param(parameters, "output_path").ok_or_else(|| TbcError::Parameter("field_export_sink requires 'output_path'".to_string()))?;

        let file = File::create(path)?;
        let mut writer = tbc_core::BufferedFieldWriter::new(BufWriter::new(file));
        let total = source.field_count();

        for (index, field_id) in source.field_range().iter().enumerate() {
            if self.state.cancel.load(Ordering::Relaxed) {
                drop(writer);
                let _ = std::fs::remove_file(path);
                self.state.status = "Cancelled by user".to_string();
                return Ok(false);
            }
            if let Some(callback) = self.state.progress.as_mut() {
                callback(index as u64, total, "exporting".to_string());
            }
            let Some(samples) = source.get_field(field_id) else { continue };
            writer.write_field(&samples)?;
            self.state.fields_written += 1;
        }
        writer.flush()?;
        self.state.status = "Completed".to_string();
        Ok(true)
    }

    fn set_progress_callback(&mut self, callback: ProgressCallback) {
        self.state.progress = Some(callback);
    }

    fn cancel_trigger(&self) {
        self.state.cancel.store(true, Ordering::Relaxed);
    }

    fn get_trigger_status(&self) -> String {
        self.state.status.clone()
    }

    fn cancel_handle(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.state.cancel)
    }
}

/// Registers every builtin stage type under its canonical name. Rust has no
/// static-initializer-before-main hook, so this explicit entry point is what
/// an embedding application calls once before compiling any project into a
/// `Dag` (see [`tbc_core::registry::StageRegistry`]).
///
/// # Errors
/// Returns `TbcError::Construction` if any name is registered twice — not
/// expected to happen from this function alone, but surfaced rather than
/// silently ignored if a caller has already registered a conflicting name.
pub fn register_builtin_stages(registry: &mut StageRegistry) -> Result<()> {
    use crate::analysis::{BurstLevelAnalysisSink, DropoutAnalysisSink, SnrAnalysisSink};

    registry.register(
        "synthetic_source",
        SyntheticSourceStage::new().node_type_info(),
        Arc::new(|params| {
            let mut stage = SyntheticSourceStage::new();
            stage.set_parameters(params.clone())?;
            Ok(Box::new(stage) as Box<dyn Stage>)
        }),
    )?;

    registry.register(
        "field_map",
        FieldMapStage::new().node_type_info(),
        Arc::new(|params| {
            let mut stage = FieldMapStage::new();
            stage.set_parameters(params.clone())?;
            Ok(Box::new(stage) as Box<dyn Stage>)
        }),
    )?;

    registry.register(
        "source_align",
        SourceAlignStage::new().node_type_info(),
        Arc::new(|params| {
            let mut stage = SourceAlignStage::new();
            stage.set_parameters(params.clone())?;
            Ok(Box::new(stage) as Box<dyn Stage>)
        }),
    )?;

    registry.register(
        "field_invert",
        FieldInvertStage::new().node_type_info(),
        Arc::new(|params| {
            let mut stage = FieldInvertStage::new();
            stage.set_parameters(params.clone())?;
            Ok(Box::new(stage) as Box<dyn Stage>)
        }),
    )?;

    registry.register(
        "overwrite",
        OverwriteStage::new().node_type_info(),
        Arc::new(|params| {
            let mut stage = OverwriteStage::new();
            stage.set_parameters(params.clone())?;
            Ok(Box::new(stage) as Box<dyn Stage>)
        }),
    )?;

    registry.register(
        "video_params_override",
        VideoParamsOverrideStage::new().node_type_info(),
        Arc::new(|params| {
            let mut stage = VideoParamsOverrideStage::new();
            stage.set_parameters(params.clone())?;
            Ok(Box::new(stage) as Box<dyn Stage>)
        }),
    )?;

    registry.register(
        "dropout_correct",
        DropoutCorrectStage::new().node_type_info(),
        Arc::new(|params| {
            let mut stage = DropoutCorrectStage::new();
            stage.set_parameters(params.clone())?;
            Ok(Box::new(stage) as Box<dyn Stage>)
        }),
    )?;

    registry.register(
        "field_export_sink",
        FieldExportSinkStage::new().node_type_info(),
        Arc::new(|params| {
            let mut stage = FieldExportSinkStage::new();
            stage.set_parameters(params.clone())?;
            Ok(Box::new(stage) as Box<dyn Stage>)
        }),
    )?;

    registry.register(
        "dropout_analysis",
        DropoutAnalysisSink::new(false).node_type_info(),
        Arc::new(|params| {
            let visible_area_only = bool_param(params, "visible_area_only").unwrap_or(false);
            let mut stage = DropoutAnalysisSink::new(visible_area_only);
            stage.set_parameters(params.clone())?;
            Ok(Box::new(stage) as Box<dyn Stage>)
        }),
    )?;

    registry.register(
        "snr_analysis",
        SnrAnalysisSink::new(true, true).node_type_info(),
        Arc::new(|params| {
            let include_white = bool_param(params, "include_white").unwrap_or(true);
            let include_black = bool_param(params, "include_black").unwrap_or(true);
            let mut stage = SnrAnalysisSink::new(include_white, include_black);
            stage.set_parameters(params.clone())?;
            Ok(Box::new(stage) as Box<dyn Stage>)
        }),
    )?;

    registry.register(
        "burst_level_analysis",
        BurstLevelAnalysisSink::new().node_type_info(),
        Arc::new(|params| {
            let mut stage = BurstLevelAnalysisSink::new();
            stage.set_parameters(params.clone())?;
            Ok(Box::new(stage) as Box<dyn Stage>)
        }),
    )?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tbc_core::{FieldId, StageRegistry, VideoFieldRepresentation};

    fn source(count: u64) -> StageOutput {
        Arc::new(SyntheticVfr::filled("src", VideoParameters::pal_default(), count, 20000))
    }

    #[test]
    fn register_builtin_stages_registers_every_type_name() {
        let mut registry = StageRegistry::new();
        register_builtin_stages(&mut registry).unwrap();
        for name in [
            "synthetic_source",
            "field_map",
            "source_align",
            "field_invert",
            "overwrite",
            "video_params_override",
            "dropout_correct",
            "field_export_sink",
            "dropout_analysis",
            "snr_analysis",
            "burst_level_analysis",
        ] {
            assert!(registry.contains(name), "missing registration for '{name}'");
        }
    }

    #[test]
    fn synthetic_source_zero_count_is_unconfigured() {
        let mut stage = SyntheticSourceStage::new();
        let mut ctx = ObservationContext::new();
        let outputs = stage.execute(&[], &ParameterMap::new(), &mut ctx).unwrap();
        assert!(outputs.is_empty());
    }

    #[test]
    fn synthetic_source_configured_count_produces_fields() {
        let mut stage = SyntheticSourceStage::new();
        let mut params = ParameterMap::new();
        params.insert("field_count".to_string(), ParameterValue::Int(4));
        let mut ctx = ObservationContext::new();
        let outputs = stage.execute(&[], &params, &mut ctx).unwrap();
        assert_eq!(outputs.len(), 1);
        assert_eq!(outputs[0].field_count(), 4);
    }

    #[test]
    fn field_map_stage_requires_range_spec() {
        let mut stage = FieldMapStage::new();
        let mut ctx = ObservationContext::new();
        assert!(stage.execute(&[source(3)], &ParameterMap::new(), &mut ctx).is_err());
    }

    #[test]
    fn field_map_stage_applies_parsed_range() {
        let mut stage = FieldMapStage::new();
        let mut params = ParameterMap::new();
        params.insert("range_spec".to_string(), ParameterValue::String("0-1,PAD_1".to_string()));
        let mut ctx = ObservationContext::new();
        let outputs = stage.execute(&[source(3)], &params, &mut ctx).unwrap();
        assert_eq!(outputs[0].field_count(), 3);
    }

    #[test]
    fn source_align_stage_shifts_output_range() {
        let mut stage = SourceAlignStage::new();
        let mut params = ParameterMap::new();
        params.insert("offset".to_string(), ParameterValue::Int(2));
        let mut ctx = ObservationContext::new();
        let outputs = stage.execute(&[source(5)], &params, &mut ctx).unwrap();
        assert_eq!(outputs[0].field_count(), 3);
    }

    #[test]
    fn video_params_override_stage_rejects_unknown_system() {
        let mut stage = VideoParamsOverrideStage::new();
        let mut params = ParameterMap::new();
        params.insert("system".to_string(), ParameterValue::String("secam".to_string()));
        let mut ctx = ObservationContext::new();
        assert!(stage.execute(&[source(1)], &params, &mut ctx).is_err());
    }

    #[test]
    fn field_export_sink_writes_every_field_and_reports_completion() {
        let dir = std::env::temp_dir();
        let path = dir.join(format!("tbc_field_export_test_{}.bin", std::process::id()));
        let mut stage = FieldExportSinkStage::new();
        let mut params = ParameterMap::new();
        params.insert("output_path".to_string(), ParameterValue::String(path.to_string_lossy().to_string()));
        let mut ctx = ObservationContext::new();

        let ok = stage.trigger(&[source(3)], &params, &mut ctx).unwrap();
        assert!(ok);
        assert_eq!(stage.fields_written(), 3);
        assert_eq!(stage.get_trigger_status(), "Completed");

        let bytes = std::fs::read(&path).unwrap();
        let vp = VideoParameters::pal_default();
        assert_eq!(bytes.len(), (vp.field_width as usize) * (vp.field_height as usize) * 3 * 2);
        let _ = std::fs::remove_file(&path);
    }

    #[test]
    fn field_export_sink_cancel_removes_partial_file() {
        let dir = std::env::temp_dir();
        let path = dir.join(format!("tbc_field_export_cancel_test_{}.bin", std::process::id()));
        let mut stage = FieldExportSinkStage::new();
        // `trigger()` resets the cancel flag at entry (it belongs to the new
        // run), so the flag has to flip *after* that point to be observed —
        // the progress callback fires at field granularity, the same point
        // a coordinator's `cancel_trigger()` would land mid-run.
        let cancel = stage.cancel_handle();
        stage.set_progress_callback(Box::new(move |_current, _total, _message| {
            cancel.store(true, Ordering::Relaxed);
        }));
        let mut params = ParameterMap::new();
        params.insert("output_path".to_string(), ParameterValue::String(path.to_string_lossy().to_string()));
        let mut ctx = ObservationContext::new();

        let ok = stage.trigger(&[source(3)], &params, &mut ctx).unwrap();
        assert!(!ok);
        assert!(!path.exists());
    }

    #[test]
    fn field_invert_stage_wraps_without_parameters() {
        let mut stage = FieldInvertStage::new();
        let mut ctx = ObservationContext::new();
        let outputs = stage.execute(&[source(2)], &ParameterMap::new(), &mut ctx).unwrap();
        assert_eq!(outputs.len(), 1);
        assert_eq!(outputs[0].get_field(FieldId(0)), source(2).get_field(FieldId(0)));
    }
}
