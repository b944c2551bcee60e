// SPDX-FileCopyrightText: © 2025 TBC Toolkit Contributors
//
// SPDX-License-Identifier: MPL-2.0

//! The render coordinator: a single background worker thread owning the
//! DAG, the field renderer, and the observation cache, so a GUI can enqueue
//! many rendering requests without racing the renderer's internal caches.
//!
//! An actor loop reading a request channel, paired with a client handle
//! that sends a request plus its own response channel, built on
//! `std::thread` and `std::sync::mpsc` rather than an async runtime: this
//! substrate's stage contract is synchronous (one-shot calls, not
//! long-running stream processors), so there is no cooperative scheduler
//! for the coordinator to hand requests off to.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::mpsc;
use std::sync::{Arc, Mutex};
use std::thread;

use tbc_core::{Dag, FieldId, NodeId, ObservationContext, Result as TbcResult, TbcError};

use crate::executor::DagExecutor;
use crate::observation_cache::{ObservationCache, ObservationCacheConfig};

/// Only "frame" previews (two fields woven together) invert on the parity
/// hint of field 0; "split" previews have no single frame order to get
/// wrong, so they never invert. Resolved per `SPEC_FULL.md`'s open-question
/// decision — a fixed branch, not a TODO.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PreviewKind {
    Frame,
    Split,
}

#[derive(Debug, Clone)]
pub struct PreviewResult {
    pub samples: Vec<u16>,
    pub width: u32,
    pub height: u32,
    pub metadata: String,
}

#[derive(Debug, Clone)]
pub struct LineSamples {
    pub samples: Vec<u16>,
}

/// Sealed request taxonomy. `SavePNG` is represented but
/// always answered with an `Error` response — PNG encoding is outside this
/// substrate's scope (no image codec crate is part of the dependency
/// stack), so the coordinator's routing/serialization role is exercised
/// without actually producing a file.
enum CoordinatorRequest {
    UpdateDag(Dag),
    RenderPreview { node: NodeId, kind: PreviewKind, field_id: FieldId },
    GetAvailableOutputs { node: NodeId },
    GetLineSamples { node: NodeId, field_id: FieldId, line: u32 },
    GetDropoutData { node: NodeId },
    GetSnrData { node: NodeId },
    GetBurstLevelData { node: NodeId },
    TriggerStage { node: NodeId },
    SavePng { node: NodeId, field_id: FieldId },
    Shutdown,
}

enum CoordinatorResponse {
    Ack,
    PreviewReady(PreviewResult),
    AvailableOutputs(u64),
    LineSamplesReady(LineSamples),
    AnalysisTable(crate::analysis::FrameStatsTable),
    TriggerComplete { success: bool, status: String },
    Error(String),
}

struct Envelope {
    id: u64,
    request: CoordinatorRequest,
    response_tx: mpsc::Sender<(u64, CoordinatorResponse)>,
}

/// A running trigger's cancel flag, registered by the worker thread and
/// read by `RenderCoordinator::cancel_trigger` from the caller's thread —
/// the one request this coordinator never queues.
type ActiveCancelHandle = Arc<Mutex<Option<Arc<std::sync::atomic::AtomicBool>>>>;

/// Client handle to a running coordinator worker thread. Cheaply cloneable
/// (an `mpsc::Sender` plus a couple of `Arc`s); every clone talks to the
/// same worker.
#[derive(Clone)]
pub struct RenderCoordinator {
    request_tx: mpsc::Sender<Envelope>,
    next_id: Arc<AtomicU64>,
    active_cancel: ActiveCancelHandle,
    worker: Arc<Mutex<Option<thread::JoinHandle<()>>>>,
}

impl RenderCoordinator {
    #[must_use]
    pub fn spawn(dag: Dag, cache_config: ObservationCacheConfig) -> Self {
        let (request_tx, request_rx) = mpsc::channel::<Envelope>();
        let active_cancel: ActiveCancelHandle = Arc::new(Mutex::new(None));
        let worker_active_cancel = Arc::clone(&active_cancel);

        let handle = thread::spawn(move || worker_loop(dag, cache_config, request_rx, worker_active_cancel));

        Self { request_tx, next_id: Arc::new(AtomicU64::new(1)), active_cancel, worker: Arc::new(Mutex::new(Some(handle))) }
    }

    fn next_id(&self) -> u64 {
        self.next_id.fetch_add(1, Ordering::Relaxed)
    }

    fn send(&self, request: CoordinatorRequest) -> TbcResult<CoordinatorResponse> {
        let id = self.next_id();
        let (response_tx, response_rx) = mpsc::channel();
        self.request_tx
            .send(Envelope { id, request, response_tx })
            .map_err(|_| TbcError::Execution("render coordinator worker has shut down".to_string()))?;
        let (echoed_id, response) =
            response_rx.recv().map_err(|_| TbcError::Execution("render coordinator worker dropped the response channel".to_string()))?;
        debug_assert_eq!(echoed_id, id, "coordinator response id must echo the request id");
        Ok(response)
    }

    /// Replaces the DAG the worker renders against.
    ///
    /// # Errors
    /// Returns an error if the worker thread has shut down.
    pub fn update_dag(&self, dag: Dag) -> TbcResult<()> {
        match self.send(CoordinatorRequest::UpdateDag(dag))? {
            CoordinatorResponse::Ack => Ok(()),
            CoordinatorResponse::Error(message) => Err(TbcError::Execution(message)),
            _ => unreachable!("UpdateDag always answers with Ack or Error"),
        }
    }

    /// # Errors
    /// Returns an error if rendering fails or the worker has shut down.
    pub fn render_preview(&self, node: NodeId, kind: PreviewKind, field_id: FieldId) -> TbcResult<PreviewResult> {
        match self.send(CoordinatorRequest::RenderPreview { node, kind, field_id })? {
            CoordinatorResponse::PreviewReady(result) => Ok(result),
            CoordinatorResponse::Error(message) => Err(TbcError::Execution(message)),
            _ => unreachable!("RenderPreview always answers with PreviewReady or Error"),
        }
    }

    /// # Errors
    /// Returns an error if the node doesn't exist or the worker has shut down.
    pub fn get_available_outputs(&self, node: NodeId) -> TbcResult<u64> {
        match self.send(CoordinatorRequest::GetAvailableOutputs { node })? {
            CoordinatorResponse::AvailableOutputs(count) => Ok(count),
            CoordinatorResponse::Error(message) => Err(TbcError::Execution(message)),
            _ => unreachable!("GetAvailableOutputs always answers with AvailableOutputs or Error"),
        }
    }

    /// # Errors
    /// Returns an error if rendering fails or the worker has shut down.
    pub fn get_line_samples(&self, node: NodeId, field_id: FieldId, line: u32) -> TbcResult<LineSamples> {
        match self.send(CoordinatorRequest::GetLineSamples { node, field_id, line })? {
            CoordinatorResponse::LineSamplesReady(samples) => Ok(samples),
            CoordinatorResponse::Error(message) => Err(TbcError::Execution(message)),
            _ => unreachable!("GetLineSamples always answers with LineSamplesReady or Error"),
        }
    }

    /// # Errors
    /// Returns an error if the analysis hasn't run or the worker has shut down.
    pub fn get_dropout_data(&self, node: NodeId) -> TbcResult<crate::analysis::FrameStatsTable> {
        self.get_analysis_table(CoordinatorRequest::GetDropoutData { node })
    }

    /// # Errors
    /// Returns an error if the analysis hasn't run or the worker has shut down.
    pub fn get_snr_data(&self, node: NodeId) -> TbcResult<crate::analysis::FrameStatsTable> {
        self.get_analysis_table(CoordinatorRequest::GetSnrData { node })
    }

    /// # Errors
    /// Returns an error if the analysis hasn't run or the worker has shut down.
    pub fn get_burst_level_data(&self, node: NodeId) -> TbcResult<crate::analysis::FrameStatsTable> {
        self.get_analysis_table(CoordinatorRequest::GetBurstLevelData { node })
    }

    fn get_analysis_table(&self, request: CoordinatorRequest) -> TbcResult<crate::analysis::FrameStatsTable> {
        match self.send(request)? {
            CoordinatorResponse::AnalysisTable(table) => Ok(table),
            CoordinatorResponse::Error(message) => Err(TbcError::Execution(message)),
            _ => unreachable!("analysis requests always answer with AnalysisTable or Error"),
        }
    }

    /// Runs `node`'s trigger to completion (or until cancelled).
    ///
    /// # Errors
    /// Returns an error only if the request could not be delivered; a
    /// failed or cancelled trigger is reported via the returned status, not
    /// an `Err`.
    pub fn trigger_stage(&self, node: NodeId) -> TbcResult<(bool, String)> {
        match self.send(CoordinatorRequest::TriggerStage { node })? {
            CoordinatorResponse::TriggerComplete { success, status } => Ok((success, status)),
            CoordinatorResponse::Error(message) => Err(TbcError::Execution(message)),
            _ => unreachable!("TriggerStage always answers with TriggerComplete or Error"),
        }
    }

    /// Always answered with `Error`: PNG encoding isn't part of this
    /// substrate's illustrative scope.
    ///
    /// # Errors
    /// Always returns an error.
    pub fn save_png(&self, node: NodeId, field_id: FieldId) -> TbcResult<()> {
        match self.send(CoordinatorRequest::SavePng { node, field_id })? {
            CoordinatorResponse::Error(message) => Err(TbcError::Execution(message)),
            _ => unreachable!("SavePng always answers with Error"),
        }
    }

    /// Cancels the currently-running trigger, if any, by setting its atomic
    /// flag directly from the caller's thread — bypasses the request queue
    /// entirely so it can interrupt an in-progress batch without waiting
    /// behind other queued requests.
    pub fn cancel_trigger(&self) {
        if let Ok(guard) = self.active_cancel.lock() {
            if let Some(flag) = guard.as_ref() {
                flag.store(true, Ordering::Relaxed);
            }
        }
    }

    /// Drains the current request, joins the worker thread, and returns.
    ///
    /// # Errors
    /// Returns an error if the worker panicked.
    pub fn shutdown(&self) -> TbcResult<()> {
        let _ = self.send(CoordinatorRequest::Shutdown);
        let handle = self.worker.lock().ok().and_then(|mut guard| guard.take());
        if let Some(handle) = handle {
            handle.join().map_err(|_| TbcError::Execution("render coordinator worker panicked".to_string()))?;
        }
        Ok(())
    }
}

fn worker_loop(dag: Dag, cache_config: ObservationCacheConfig, request_rx: mpsc::Receiver<Envelope>, active_cancel: ActiveCancelHandle) {
    let mut cache = match ObservationCache::new(dag, cache_config) {
        Ok(cache) => Some(cache),
        Err(err) => {
            tracing::error!(error = %err, "render coordinator: initial DAG failed validation");
            None
        }
    };

    while let Ok(envelope) = request_rx.recv() {
        let Envelope { id, request, response_tx } = envelope;
        let shutdown_requested = matches!(request, CoordinatorRequest::Shutdown);
        let response = handle_request(&mut cache, cache_config, &active_cancel, request);
        let _ = response_tx.send((id, response));
        if shutdown_requested {
            break;
        }
    }
}

/// `cache` is `None` whenever no DAG passed `Dag::validate()` yet — the
/// worker never holds an `ObservationCache` built over an invalid DAG.
/// Every request but `UpdateDag`/`Shutdown` is answered with an `Error` in
/// that state rather than panicking.
fn handle_request(
    cache: &mut Option<ObservationCache>,
    cache_config: ObservationCacheConfig,
    active_cancel: &ActiveCancelHandle,
    request: CoordinatorRequest,
) -> CoordinatorResponse {
    if let CoordinatorRequest::UpdateDag(dag) = request {
        return match cache {
            Some(existing) => match existing.update_dag(dag) {
                Ok(()) => {
                    tracing::info!("render coordinator: dag updated, cache invalidated");
                    CoordinatorResponse::Ack
                }
                Err(err) => {
                    tracing::error!(error = %err, "render coordinator: dag update rejected");
                    CoordinatorResponse::Error(err.to_string())
                }
            },
            None => match ObservationCache::new(dag, cache_config) {
                Ok(new_cache) => {
                    tracing::info!("render coordinator: dag accepted");
                    *cache = Some(new_cache);
                    CoordinatorResponse::Ack
                }
                Err(err) => {
                    tracing::error!(error = %err, "render coordinator: dag update rejected");
                    CoordinatorResponse::Error(err.to_string())
                }
            },
        };
    }

    if matches!(request, CoordinatorRequest::Shutdown) {
        return CoordinatorResponse::Ack;
    }

    let Some(cache) = cache else {
        return CoordinatorResponse::Error("render coordinator has no validated DAG loaded".to_string());
    };

    match request {
        CoordinatorRequest::RenderPreview { node, kind, field_id } => render_preview(cache, &node, kind, field_id),
        CoordinatorRequest::GetAvailableOutputs { node } => match cache.get_field_count(&node) {
            Some(count) => CoordinatorResponse::AvailableOutputs(count as u64),
            None => CoordinatorResponse::Error(format!("node '{node}' produced no output")),
        },
        CoordinatorRequest::GetLineSamples { node, field_id, line } => match cache.get_field(&node, field_id) {
            Some(representation) => match representation.get_line(field_id, line) {
                Some(samples) => CoordinatorResponse::LineSamplesReady(LineSamples { samples }),
                None => CoordinatorResponse::Error(format!("line {line} not available in node '{node}'")),
            },
            None => CoordinatorResponse::Error(format!("field {field_id} not available in node '{node}'")),
        },
        CoordinatorRequest::GetDropoutData { node } => analysis_table(cache, &node, "dropout"),
        CoordinatorRequest::GetSnrData { node } => analysis_table(cache, &node, "snr"),
        CoordinatorRequest::GetBurstLevelData { node } => analysis_table(cache, &node, "burst_level"),
        CoordinatorRequest::TriggerStage { node } => trigger_stage(cache, active_cancel, &node),
        CoordinatorRequest::SavePng { node, .. } => {
            CoordinatorResponse::Error(format!("PNG export for node '{node}' is outside this substrate's scope"))
        }
        CoordinatorRequest::UpdateDag(_) | CoordinatorRequest::Shutdown => {
            unreachable!("UpdateDag and Shutdown are handled above")
        }
    }
}

fn render_preview(cache: &mut ObservationCache, node: &NodeId, kind: PreviewKind, field_id: FieldId) -> CoordinatorResponse {
    tracing::debug!(%node, %field_id, ?kind, "rendering preview");
    let Some(representation) = cache.get_field(node, field_id) else {
        tracing::warn!(%node, %field_id, "preview render failed: field not available");
        return CoordinatorResponse::Error(format!("field {field_id} not available in node '{node}'"));
    };
    let Some(descriptor) = representation.get_descriptor(field_id) else {
        return CoordinatorResponse::Error(format!("no descriptor for field {field_id} in node '{node}'"));
    };
    let Some(samples) = representation.get_field(field_id) else {
        return CoordinatorResponse::Error(format!("field {field_id} not materialized in node '{node}'"));
    };

    let invert = match kind {
        PreviewKind::Frame => representation.get_field_parity_hint(field_id).is_some_and(|hint| !hint.is_first_field),
        PreviewKind::Split => false,
    };
    let metadata = format!("{:?} field {field_id} ({}x{}), invert={invert}", kind, descriptor.width, descriptor.height);
    CoordinatorResponse::PreviewReady(PreviewResult { samples, width: descriptor.width, height: descriptor.height, metadata })
}

fn analysis_table(cache: &mut ObservationCache, node: &NodeId, kind: &str) -> CoordinatorResponse {
    use crate::analysis::{BurstLevelAnalysisSink, DropoutAnalysisSink, SnrAnalysisSink};

    let dag = cache.dag_mut();
    let Some(dag_node) = dag.node_mut(node) else {
        return CoordinatorResponse::Error(format!("node '{node}' does not exist in DAG"));
    };
    let stage = dag_node.stage.as_any();
    let table = match kind {
        "dropout" => stage.downcast_ref::<DropoutAnalysisSink>().and_then(DropoutAnalysisSink::results).cloned(),
        "snr" => stage.downcast_ref::<SnrAnalysisSink>().and_then(SnrAnalysisSink::results).cloned(),
        "burst_level" => stage.downcast_ref::<BurstLevelAnalysisSink>().and_then(BurstLevelAnalysisSink::results).cloned(),
        _ => None,
    };
    table.map_or_else(|| CoordinatorResponse::Error(format!("node '{node}' has no {kind} results yet")), CoordinatorResponse::AnalysisTable)
}

fn trigger_stage(cache: &mut ObservationCache, active_cancel: &ActiveCancelHandle, node: &NodeId) -> CoordinatorResponse {
    tracing::info!(%node, "trigger started");
    let dag = cache.dag_mut();
    let execution = match DagExecutor::execute_to_node(dag, node) {
        Ok(execution) => execution,
        Err(err) => {
            tracing::error!(%node, error = %err, "trigger failed: upstream execution error");
            return CoordinatorResponse::Error(err.to_string());
        }
    };

    let Some(dag_node) = dag.node(node) else {
        return CoordinatorResponse::Error(format!("node '{node}' vanished mid-trigger"));
    };
    let mut inputs = Vec::with_capacity(dag_node.input_node_ids.len());
    for (predecessor, &output_index) in dag_node.input_node_ids.iter().zip(dag_node.input_indices.iter()) {
        let Some(produced) = execution.artifacts.get(predecessor) else {
            return CoordinatorResponse::Error(format!("predecessor '{predecessor}' of '{node}' was never executed"));
        };
        let Some(output) = produced.get(output_index) else {
            return CoordinatorResponse::Error(format!("predecessor '{predecessor}' of '{node}' has no output {output_index}"));
        };
        inputs.push(Arc::clone(output));
    }
    let parameters = dag_node.parameters.clone();

    let Some(dag_node) = dag.node_mut(node) else {
        return CoordinatorResponse::Error(format!("node '{node}' vanished mid-trigger"));
    };
    let Some(triggerable) = dag_node.stage.as_triggerable() else {
        return CoordinatorResponse::Error(format!("node '{node}' is not a triggerable sink"));
    };

    if let Ok(mut guard) = active_cancel.lock() {
        *guard = Some(triggerable.cancel_handle());
    }

    let mut ctx = ObservationContext::new();
    let result = triggerable.trigger(&inputs, &parameters, &mut ctx);

    if let Ok(mut guard) = active_cancel.lock() {
        *guard = None;
    }

    match result {
        Ok(success) => CoordinatorResponse::TriggerComplete { success, status: triggerable_status(dag, node) },
        Err(err) => CoordinatorResponse::Error(err.to_string()),
    }
}

fn triggerable_status(dag: &mut Dag, node: &NodeId) -> String {
    dag.node_mut(node)
        .and_then(|n| n.stage.as_triggerable())
        .map(|stage| stage.get_trigger_status())
        .unwrap_or_else(|| "Unknown".to_string())
}
