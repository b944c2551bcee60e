// SPDX-FileCopyrightText: © 2025 TBC Toolkit Contributors
//
// SPDX-License-Identifier: MPL-2.0

//! TBC Engine - Execution, rendering, and the built-in stage library for the
//! time-base-corrected video field processing substrate.
//!
//! This crate builds on `tbc-core`'s DAG and stage contract to provide:
//!
//! ## Modules
//!
//! - [`executor`]: the [`executor::DagExecutor`], which runs every ancestor
//!   of a target node in topological order.
//! - [`renderer`]: the [`renderer::FieldRenderer`], on-demand single-field
//!   rendering at any node with a version-keyed cache.
//! - [`observation_cache`]: the [`observation_cache::ObservationCache`],
//!   which layers rendered-field and field-count caches on top of a renderer.
//! - [`coordinator`]: the [`coordinator::RenderCoordinator`] actor — the
//!   single entry point an embedding application talks to for preview
//!   rendering, scrubbing, analysis-table queries, and sink triggers.
//! - [`analysis`]: the built-in analysis-sink stages (dropout, SNR, burst
//!   level) and the binning/statistics helpers they share.
//! - [`dropout_correct`]: the dropout-correction VFR wrapper and its stage.
//! - [`vbi`]: CLV vertical-blanking-interval timecode decoding.
//! - [`stages`]: the remaining built-in stage types (synthetic source,
//!   field map, source align, field invert, overwrite, video-params
//!   override, field export sink) and [`stages::register_builtin_stages`],
//!   the entry point that populates a [`tbc_core::StageRegistry`] with every
//!   stage type this crate provides.

pub mod analysis;
pub mod coordinator;
pub mod dropout_correct;
pub mod executor;
pub mod observation_cache;
pub mod renderer;
pub mod stages;
pub mod vbi;

pub use analysis::{
    bin_fields, BinStats, BinningPlan, BurstLevelAnalysisSink, DropoutAnalysisSink, FrameStatsTable, SnrAnalysisSink, DEFAULT_TARGET_BINS,
};
pub use coordinator::{LineSamples, PreviewKind, PreviewResult, RenderCoordinator};
pub use dropout_correct::{DropoutCorrectConfig, DropoutCorrectWrapper, DropoutDecision, RegionKey};
pub use executor::{ArtifactMap, DagExecutor, ExecutionResult};
pub use observation_cache::{ObservationCache, ObservationCacheConfig, DEFAULT_FIELD_CACHE_CAPACITY, DEFAULT_FIELD_COUNT_CACHE_CAPACITY};
pub use renderer::{FieldRenderer, RenderResult};
pub use stages::{
    register_builtin_stages, DropoutCorrectStage, FieldExportSinkStage, FieldInvertStage, FieldMapStage, OverwriteStage, SourceAlignStage,
    SyntheticSourceStage, VideoParamsOverrideStage,
};
pub use vbi::{clv_timecode_to_frame, ClvTimecode};
