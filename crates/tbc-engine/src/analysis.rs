// SPDX-FileCopyrightText: © 2025 TBC Toolkit Contributors
//
// SPDX-License-Identifier: MPL-2.0

//! Analysis sinks: stream every field of a source through a metric
//! extractor, bin the results down to a bounded point count regardless of
//! source length, and optionally export the binned table as CSV.

use std::collections::HashMap;
use std::fs::File;
use std::io::Write as _;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use tbc_core::{
    FieldId, FormatCompat, NodeKind, NodeTypeInfo, ObservationContext, ParameterDescriptor, ParameterMap, ProgressCallback, Result, Stage,
    StageOutput, TbcError, TriggerableStage, VideoFieldRepresentation, VideoSystem,
};

/// Target point count a bin plan never exceeds, regardless of source length.
pub const DEFAULT_TARGET_BINS: usize = 1000;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BinningPlan {
    pub fields_per_bin: usize,
    pub bin_count: usize,
}

/// `fields_per_bin = ceil(total / target_max)`, `bin_count =
/// ceil(total / fields_per_bin)`. A source of zero fields bins to zero.
#[must_use]
pub fn bin_fields(total: usize, target_max: usize) -> BinningPlan {
    if total == 0 {
        return BinningPlan { fields_per_bin: 1, bin_count: 0 };
    }
    let target_max = target_max.max(1);
    let fields_per_bin = total.div_ceil(target_max);
    let bin_count = total.div_ceil(fields_per_bin);
    BinningPlan { fields_per_bin, bin_count }
}

/// One binned data point. `metrics` holds the arithmetic mean of every
/// metric this analysis collected across the bin's valid samples.
/// `has_data` is false when the bin had no valid samples at all.
#[derive(Debug, Clone)]
pub struct BinStats {
    pub bin_index: usize,
    pub has_data: bool,
    pub metrics: HashMap<String, f64>,
}

#[derive(Debug, Clone)]
pub struct FrameStatsTable {
    pub bins: Vec<BinStats>,
    pub total_frames: u64,
}

impl FrameStatsTable {
    fn to_csv(&self, metric_names: &[&str]) -> String {
        let mut out = String::from("bin,has_data");
        for name in metric_names {
            out.push(',');
            out.push_str(name);
        }
        out.push('\n');
        for bin in &self.bins {
            out.push_str(&format!("{},{}", bin.bin_index, bin.has_data));
            for name in metric_names {
                out.push(',');
                match bin.metrics.get(*name) {
                    Some(value) => out.push_str(&format!("{value:.6}")),
                    None => {}
                }
            }
            out.push('\n');
        }
        out
    }
}

/// Streams `source` field by field, binning `per_field`'s output (`None`
/// means that field contributed no valid sample). Returns `None` if `cancel`
/// became set partway through — callers MUST discard any partial table on
/// that signal rather than keep it, per the trigger protocol's atomicity
/// requirement.
fn accumulate_bins(
    source: &dyn VideoFieldRepresentation,
    cancel: &AtomicBool,
    mut progress: Option<&mut ProgressCallback>,
    mut per_field: impl FnMut(&dyn VideoFieldRepresentation, FieldId) -> Option<HashMap<String, f64>>,
) -> Option<FrameStatsTable> {
    let total = source.field_count();
    let plan = bin_fields(total as usize, DEFAULT_TARGET_BINS);

    let mut sums: Vec<HashMap<String, f64>> = vec![HashMap::new(); plan.bin_count];
    let mut counts: Vec<HashMap<String, u64>> = vec![HashMap::new(); plan.bin_count];

    for (index, field_id) in source.field_range().iter().enumerate() {
        if cancel.load(Ordering::Relaxed) {
            return None;
        }
        if let Some(callback) = progress.as_deref_mut() {
            callback(index as u64, total, "analyzing".to_string());
        }
        if let Some(metrics) = per_field(source, field_id) {
            let bin = index / plan.fields_per_bin;
            for (key, value) in metrics {
                *sums[bin].entry(key.clone()).or_insert(0.0) += value;
                *counts[bin].entry(key).or_insert(0) += 1;
            }
        }
    }

    let bins = sums
        .into_iter()
        .zip(counts)
        .enumerate()
        .map(|(bin_index, (sum, count))| {
            let mut metrics = HashMap::new();
            for (key, total) in sum {
                let n = count[&key];
                metrics.insert(key, total / n as f64);
            }
            BinStats { bin_index, has_data: !metrics.is_empty(), metrics }
        })
        .collect();

    Some(FrameStatsTable { bins, total_frames: total })
}

fn mean_and_stddev(samples: &[u16]) -> (f64, f64) {
    let n = samples.len() as f64;
    if n == 0.0 {
        return (0.0, 0.0);
    }
    let mean = samples.iter().map(|&s| f64::from(s)).sum::<f64>() / n;
    let variance = samples.iter().map(|&s| (f64::from(s) - mean).powi(2)).sum::<f64>() / n;
    (mean, variance.sqrt())
}

fn db(ratio: f64) -> f64 {
    if ratio <= 0.0 { f64::NEG_INFINITY } else { 20.0 * ratio.log10() }
}

fn median(mut values: Vec<f64>) -> Option<f64> {
    if values.is_empty() {
        return None;
    }
    values.sort_by(f64::total_cmp);
    let mid = values.len() / 2;
    if values.len() % 2 == 0 { Some((values[mid - 1] + values[mid]) / 2.0) } else { Some(values[mid]) }
}

fn write_csv_if_requested(parameters: &ParameterMap, table: &FrameStatsTable, metric_names: &[&str]) -> Result<()> {
    let write_csv = parameters.get("write_csv").and_then(tbc_core::ParameterValue::as_bool).unwrap_or(false);
    if !write_csv {
        return Ok(());
    }
    let path = parameters
        .get("output_path")
        .and_then(tbc_core::ParameterValue::as_str)
        .ok_or_else(|| TbcError::Parameter("write_csv requires output_path".to_string()))?;
    let mut file = File::create(path)?;
    file.write_all(table.to_csv(metric_names).as_bytes())?;
    Ok(())
}

fn common_descriptors() -> Vec<ParameterDescriptor> {
    let mut output_path = ParameterDescriptor::new("output_path", "Output Path", "string");
    output_path.depends_on =
        Some(tbc_core::ParameterDependency { parameter_name: "write_csv".to_string(), required_value: tbc_core::ParameterValue::Bool(true) });

    vec![ParameterDescriptor::new("write_csv", "Write CSV", "bool"), output_path]
}

/// Shared state every analysis sink needs: the binned result table (if a
/// trigger has completed), the cancel flag `cancel_trigger` sets, and the
/// last human-readable status.
struct AnalysisState {
    parameters: ParameterMap,
    results: Option<FrameStatsTable>,
    cancel: Arc<AtomicBool>,
    status: String,
    progress: Option<ProgressCallback>,
}

impl AnalysisState {
    fn new() -> Self {
        Self { parameters: ParameterMap::new(), results: None, cancel: Arc::new(AtomicBool::new(false)), status: "Idle".to_string(), progress: None }
    }
}

macro_rules! impl_triggerable_scaffold {
    () => {
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
    };
}

/// Dropout length/count analysis: full-field counts every detected region;
/// visible-area mode restricts to the active-video sample range.
pub struct DropoutAnalysisSink {
    state: AnalysisState,
    visible_area_only: bool,
}

impl DropoutAnalysisSink {
    #[must_use]
    pub fn new(visible_area_only: bool) -> Self {
        Self { state: AnalysisState::new(), visible_area_only }
    }

    #[must_use]
    pub fn results(&self) -> Option<&FrameStatsTable> {
        self.state.results.as_ref()
    }

    #[must_use]
    pub fn has_results(&self) -> bool {
        self.state.results.is_some()
    }
}

impl Stage for DropoutAnalysisSink {
    fn node_type_info(&self) -> NodeTypeInfo {
        NodeTypeInfo {
            kind: NodeKind::AnalysisSink,
            type_name: "dropout_analysis".to_string(),
            display_name: "Dropout Analysis".to_string(),
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
        common_descriptors()
    }

    fn get_parameters(&self) -> ParameterMap {
        self.state.parameters.clone()
    }

    fn set_parameters(&mut self, params: ParameterMap) -> Result<()> {
        self.state.parameters = params;
        Ok(())
    }

    fn as_triggerable(&mut self) -> Option<&mut dyn TriggerableStage> {
        Some(self)
    }
}

impl TriggerableStage for DropoutAnalysisSink {
    fn trigger(&mut self, inputs: &[StageOutput], parameters: &ParameterMap, _ctx: &mut ObservationContext) -> Result<bool> {
        self.state.cancel.store(false, Ordering::Relaxed);
        let Some(source) = inputs.first() else {
            self.state.results = None;
            self.state.status = "Failed: dropout analysis requires one input".to_string();
            return Err(TbcError::Execution("dropout analysis requires one input".to_string()));
        };
        let vp = source.video_parameters();
        let visible_area_only = self.visible_area_only;

        let table = accumulate_bins(source.as_ref(), &self.state.cancel, self.state.progress.as_mut(), |src, field_id| {
            let regions = src.get_dropout_hints(field_id);
            let (mut length, mut count) = (0u32, 0u32);
            for region in regions {
                if visible_area_only && (region.start_sample < vp.active_video_start || region.end_sample > vp.active_video_end) {
                    continue;
                }
                length += region.len_samples();
                count += 1;
            }
            let mut metrics = HashMap::new();
            metrics.insert("length".to_string(), f64::from(length));
            metrics.insert("count".to_string(), f64::from(count));
            Some(metrics)
        });

        match table {
            Some(table) => {
                if let Err(err) = write_csv_if_requested(parameters, &table, &["length", "count"]) {
                    self.state.results = None;
                    self.state.status = format!("Failed: {err}");
                    return Err(err);
                }
                self.state.results = Some(table);
                self.state.status = "Completed".to_string();
                Ok(true)
            }
            None => {
                self.state.results = None;
                self.state.status = "Cancelled by user".to_string();
                Ok(false)
            }
        }
    }

    impl_triggerable_scaffold!();
}

/// White SNR (dB) and black PSNR (dB), estimated from sample variance in
/// each region rather than a literal port of a reference decoder's noise
/// model — illustrative, not a calibrated measurement.
pub struct SnrAnalysisSink {
    state: AnalysisState,
    include_white: bool,
    include_black: bool,
}

impl SnrAnalysisSink {
    #[must_use]
    pub fn new(include_white: bool, include_black: bool) -> Self {
        Self { state: AnalysisState::new(), include_white, include_black }
    }

    #[must_use]
    pub fn results(&self) -> Option<&FrameStatsTable> {
        self.state.results.as_ref()
    }

    #[must_use]
    pub fn has_results(&self) -> bool {
        self.state.results.is_some()
    }
}

impl Stage for SnrAnalysisSink {
    fn node_type_info(&self) -> NodeTypeInfo {
        NodeTypeInfo {
            kind: NodeKind::AnalysisSink,
            type_name: "snr_analysis".to_string(),
            display_name: "SNR Analysis".to_string(),
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
        common_descriptors()
    }

    fn get_parameters(&self) -> ParameterMap {
        self.state.parameters.clone()
    }

    fn set_parameters(&mut self, params: ParameterMap) -> Result<()> {
        self.state.parameters = params;
        Ok(())
    }

    fn as_triggerable(&mut self) -> Option<&mut dyn TriggerableStage> {
        Some(self)
    }
}

impl TriggerableStage for SnrAnalysisSink {
    fn trigger(&mut self, inputs: &[StageOutput], parameters: &ParameterMap, _ctx: &mut ObservationContext) -> Result<bool> {
        self.state.cancel.store(false, Ordering::Relaxed);
        let Some(source) = inputs.first() else {
            self.state.results = None;
            self.state.status = "Failed: SNR analysis requires one input".to_string();
            return Err(TbcError::Execution("SNR analysis requires one input".to_string()));
        };
        let vp = source.video_parameters();
        let (include_white, include_black) = (self.include_white, self.include_black);

        let table = accumulate_bins(source.as_ref(), &self.state.cancel, self.state.progress.as_mut(), |src, field_id| {
            let Some(descriptor) = src.get_descriptor(field_id) else { return None };
            let mut white_samples = Vec::new();
            let mut black_samples = Vec::new();
            for line in vp.first_active_field_line..vp.last_active_field_line.min(descriptor.height) {
                let Some(samples) = src.get_line(field_id, line) else { continue };
                let end = (vp.active_video_end as usize).min(samples.len());
                let start = (vp.active_video_start as usize).min(end);
                for &sample in &samples[start..end] {
                    if sample >= vp.white_16b_ire.saturating_sub(vp.white_16b_ire / 8) {
                        white_samples.push(sample);
                    } else if sample <= vp.black_16b_ire.saturating_add(vp.black_16b_ire / 8) {
                        black_samples.push(sample);
                    }
                }
            }
            let mut metrics = HashMap::new();
            if include_white && !white_samples.is_empty() {
                let (_, stddev) = mean_and_stddev(&white_samples);
                metrics.insert("white_snr_db".to_string(), db(f64::from(vp.white_16b_ire) / stddev.max(1.0)));
            }
            if include_black && !black_samples.is_empty() {
                let (_, stddev) = mean_and_stddev(&black_samples);
                metrics.insert("black_psnr_db".to_string(), db(f64::from(vp.white_16b_ire) / stddev.max(1.0)));
            }
            if metrics.is_empty() { None } else { Some(metrics) }
        });

        match table {
            Some(table) => {
                if let Err(err) = write_csv_if_requested(parameters, &table, &["white_snr_db", "black_psnr_db"]) {
                    self.state.results = None;
                    self.state.status = format!("Failed: {err}");
                    return Err(err);
                }
                self.state.results = Some(table);
                self.state.status = "Completed".to_string();
                Ok(true)
            }
            None => {
                self.state.results = None;
                self.state.status = "Cancelled by user".to_string();
                Ok(false)
            }
        }
    }

    impl_triggerable_scaffold!();
}

/// Median colour-burst IRE level per field.
pub struct BurstLevelAnalysisSink {
    state: AnalysisState,
}

impl BurstLevelAnalysisSink {
    #[must_use]
    pub fn new() -> Self {
        Self { state: AnalysisState::new() }
    }

    #[must_use]
    pub fn results(&self) -> Option<&FrameStatsTable> {
        self.state.results.as_ref()
    }

    #[must_use]
    pub fn has_results(&self) -> bool {
        self.state.results.is_some()
    }
}

impl Default for BurstLevelAnalysisSink {
    fn default() -> Self {
        Self::new()
    }
}

impl Stage for BurstLevelAnalysisSink {
    fn node_type_info(&self) -> NodeTypeInfo {
        NodeTypeInfo {
            kind: NodeKind::AnalysisSink,
            type_name: "burst_level_analysis".to_string(),
            display_name: "Burst Level Analysis".to_string(),
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
        common_descriptors()
    }

    fn get_parameters(&self) -> ParameterMap {
        self.state.parameters.clone()
    }

    fn set_parameters(&mut self, params: ParameterMap) -> Result<()> {
        self.state.parameters = params;
        Ok(())
    }

    fn as_triggerable(&mut self) -> Option<&mut dyn TriggerableStage> {
        Some(self)
    }
}

impl TriggerableStage for BurstLevelAnalysisSink {
    fn trigger(&mut self, inputs: &[StageOutput], parameters: &ParameterMap, _ctx: &mut ObservationContext) -> Result<bool> {
        self.state.cancel.store(false, Ordering::Relaxed);
        let Some(source) = inputs.first() else {
            self.state.results = None;
            self.state.status = "Failed: burst level analysis requires one input".to_string();
            return Err(TbcError::Execution("burst level analysis requires one input".to_string()));
        };
        let vp = source.video_parameters();

        let table = accumulate_bins(source.as_ref(), &self.state.cancel, self.state.progress.as_mut(), |src, field_id| {
            let Some(descriptor) = src.get_descriptor(field_id) else { return None };
            let mut burst_levels = Vec::new();
            for line in 0..descriptor.height {
                let Some(samples) = src.get_line(field_id, line) else { continue };
                let end = (vp.colour_burst_end as usize).min(samples.len());
                let start = (vp.colour_burst_start as usize).min(end);
                if start < end {
                    let (mean, _) = mean_and_stddev(&samples[start..end]);
                    burst_levels.push(mean);
                }
            }
            let mut metrics = HashMap::new();
            if let Some(median_level) = median(burst_levels) {
                metrics.insert("median_burst_ire".to_string(), median_level);
            }
            if metrics.is_empty() { None } else { Some(metrics) }
        });

        match table {
            Some(table) => {
                if let Err(err) = write_csv_if_requested(parameters, &table, &["median_burst_ire"]) {
                    self.state.results = None;
                    self.state.status = format!("Failed: {err}");
                    return Err(err);
                }
                self.state.results = Some(table);
                self.state.status = "Completed".to_string();
                Ok(true)
            }
            None => {
                self.state.results = None;
                self.state.status = "Cancelled by user".to_string();
                Ok(false)
            }
        }
    }

    impl_triggerable_scaffold!();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bin_fields_respects_target_max() {
        let plan = bin_fields(123_456, 1000);
        assert!(plan.bin_count <= 1001);
        assert!(plan.bin_count > 0);
    }

    #[test]
    fn bin_fields_zero_total_is_zero_bins() {
        let plan = bin_fields(0, 1000);
        assert_eq!(plan.bin_count, 0);
    }

    #[test]
    fn bin_fields_under_target_is_one_field_per_bin() {
        let plan = bin_fields(500, 1000);
        assert_eq!(plan.fields_per_bin, 1);
        assert_eq!(plan.bin_count, 500);
    }

    fn synthetic_source(count: u64) -> StageOutput {
        Arc::new(tbc_core::SyntheticVfr::filled("src", tbc_core::VideoParameters::pal_default(), count, 20000))
    }

    #[test]
    fn dropout_analysis_reports_zero_on_undamaged_source() {
        let mut sink = DropoutAnalysisSink::new(false);
        let mut ctx = ObservationContext::new();
        let ok = sink.trigger(&[synthetic_source(5)], &ParameterMap::new(), &mut ctx).unwrap();
        assert!(ok);
        let table = sink.results().unwrap();
        assert_eq!(table.total_frames, 5);
        assert!(table.bins.iter().all(|b| b.metrics["count"] == 0.0));
    }

    #[test]
    fn cancel_mid_run_clears_results() {
        // `trigger()` resets the cancel flag at entry (it belongs to the
        // *new* run), so cancellation has to land after that point to be
        // observed. The progress callback fires once per field, which is
        // exactly the granularity cancellation is polled at, so using it to
        // flip the flag mid-run exercises the same path a coordinator
        // calling `cancel_trigger()` from another thread would.
        let mut sink = DropoutAnalysisSink::new(false);
        let cancel = sink.cancel_handle();
        sink.set_progress_callback(Box::new(move |current, _total, _message| {
            if current >= 1 {
                cancel.store(true, Ordering::Relaxed);
            }
        }));
        let mut ctx = ObservationContext::new();
        let ok = sink.trigger(&[synthetic_source(5)], &ParameterMap::new(), &mut ctx).unwrap();
        assert!(!ok);
        assert!(!sink.has_results());
        assert_eq!(sink.get_trigger_status(), "Cancelled by user");
    }

    #[test]
    fn burst_level_analysis_reports_constant_fill_level() {
        let mut sink = BurstLevelAnalysisSink::new();
        let mut ctx = ObservationContext::new();
        sink.trigger(&[synthetic_source(2)], &ParameterMap::new(), &mut ctx).unwrap();
        let table = sink.results().unwrap();
        assert!(table.bins.iter().all(|b| (b.metrics["median_burst_ire"] - 20000.0).abs() < f64::EPSILON));
    }
}
