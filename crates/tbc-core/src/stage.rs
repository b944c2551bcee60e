// SPDX-FileCopyrightText: © 2025 TBC Toolkit Contributors
//
// SPDX-License-Identifier: MPL-2.0

//! The stage contract: Source / Transform / Sink / Analysis-Sink / Splitter.

use crate::error::Result;
use crate::observation::ObservationContext;
use crate::parameter::{ParameterDescriptor, ParameterMap};
use crate::video_params::VideoSystem;
use crate::vfr::VideoFieldRepresentation;
use std::any::Any;
use std::sync::atomic::AtomicBool;
use std::sync::Arc;

/// Broad role a stage plays in a DAG, used for registry categorization and
/// UI grouping; the executor itself treats every node uniformly.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NodeKind {
    Source,
    Transform,
    Sink,
    AnalysisSink,
    Splitter,
}

/// Which video systems a stage supports.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FormatCompat {
    All,
    PalOnly,
    NtscOnly,
}

/// Static capability description of a stage type.
#[derive(Debug, Clone)]
pub struct NodeTypeInfo {
    pub kind: NodeKind,
    pub type_name: String,
    pub display_name: String,
    pub min_inputs: usize,
    pub max_inputs: usize,
    pub min_outputs: usize,
    pub max_outputs: usize,
    pub format_compat: FormatCompat,
}

/// A single output of `execute()`.
pub type StageOutput = Arc<dyn VideoFieldRepresentation>;

/// Every processing node in a DAG implements `Stage`. Sources receive no
/// inputs; transforms return one or more outputs that lazily wrap their
/// inputs; sinks and analysis sinks return no outputs from `execute` and
/// instead perform their work in `trigger` (see [`TriggerableStage`]).
///
/// `execute()` MUST be side-effect-free beyond writes to `observation_context`
/// and the returned outputs. Any I/O a sink performs belongs in `trigger()`.
pub trait Stage: Send + Sync + 'static {
    fn node_type_info(&self) -> NodeTypeInfo;

    fn execute(
        &mut self,
        inputs: &[StageOutput],
        parameters: &ParameterMap,
        observation_context: &mut ObservationContext,
    ) -> Result<Vec<StageOutput>>;

    fn parameter_descriptors(&self, project_format: VideoSystem, source_type: &str) -> Vec<ParameterDescriptor>;

    fn get_parameters(&self) -> ParameterMap;

    /// Validates `params` against `parameter_descriptors` before committing;
    /// rejects (without mutating `self`) if validation fails.
    fn set_parameters(&mut self, params: ParameterMap) -> Result<()>;

    /// Exposes this stage as triggerable, if it is one. Sinks and analysis
    /// sinks override this to return `Some(self)`; everything else keeps
    /// the default `None`. A dyn-compatible opt-in accessor like this is
    /// how this codebase does "is this trait object also a T" without
    /// reaching for `std::any::Any` downcasting.
    fn as_triggerable(&mut self) -> Option<&mut dyn TriggerableStage> {
        None
    }

    /// Opt-in downcasting target for callers (the render coordinator's
    /// analysis-table lookups) that need a concrete stage type back out of
    /// a `Box<dyn Stage>`. Every implementor gets this for free; there is
    /// nothing to override.
    fn as_any(&self) -> &dyn Any {
        self
    }
}

/// Progress callback invoked during `trigger()`: fields processed so far,
/// total fields, and a stage-chosen human-readable message. Typically
/// emitted every 10 fields.
pub type ProgressCallback = Box<dyn FnMut(u64, u64, String) + Send>;

/// Sinks additionally implement the batch-export trigger protocol.
///
/// Cancellation is cooperative: `trigger()` polls the flag set by
/// `cancel_trigger()` at field granularity and, if set, returns `Ok(false)`
/// with a status beginning `"Cancelled"` — never an `Err`. A triggered sink
/// either produces its complete output artifact or leaves no observable
/// partial artifact (temporary files are removed on cancel or error).
pub trait TriggerableStage: Stage {
    fn trigger(
        &mut self,
        inputs: &[StageOutput],
        parameters: &ParameterMap,
        observation_context: &mut ObservationContext,
    ) -> Result<bool>;

    fn set_progress_callback(&mut self, callback: ProgressCallback);

    /// Cooperative; sets an internally-held atomic flag polled by `trigger`.
    fn cancel_trigger(&self);

    fn get_trigger_status(&self) -> String;

    /// Clones the atomic flag `cancel_trigger` sets. A render coordinator
    /// uses this to cancel an in-flight trigger directly from the caller's
    /// thread, without going through its request queue.
    fn cancel_handle(&self) -> Arc<AtomicBool>;
}
