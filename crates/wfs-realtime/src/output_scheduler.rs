//! C10: output-buffer scheduler — one worker thread per output (§4.10).
//!
//! A symmetric alternative architecture to C9 (input-buffer scheduler):
//! instead of each input worker fanning its samples out across every
//! output, each output worker fans in across every input. This avoids the
//! shared accumulator bus and its per-sample atomic contention at the cost
//! of N delay-line/HF-shelf banks living per output instead of per input
//! (same total count, different ownership split). Thread lifecycle is the
//! same `thread::Builder` + `Arc<AtomicBool>` pattern as C9, grounded on
//! `rf_realtime::masscore::MassCoreEngine`.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use parking_lot::{Mutex, RwLock};

use wfs_core::{Sample, WfsError, WfsResult};
use wfs_dsp::{Biquad, CompressorParams, DelayLine, HfShelf, LevelDetector, LevelHandle};
use wfs_spatial::MatrixHandle;

use crate::semaphore::Semaphore;
use crate::telemetry::{WorkerSnapshot, WorkerTelemetry};

#[derive(Debug, Clone, Copy)]
pub struct OutputSchedulerConfig {
    pub sample_rate: f64,
    pub max_block_size: usize,
    pub num_inputs: usize,
    pub num_outputs: usize,
    pub max_delay_seconds: f64,
}

/// Single-writer-before-signal, many-reader-after-wait block of input
/// samples. The callback thread is the sole writer for a given block; every
/// output worker only reads after the corresponding work semaphore fires,
/// so the `RwLock` never contends in steady state (§4.10).
struct InputBlockBus {
    blocks: Vec<RwLock<Vec<Sample>>>,
}

impl InputBlockBus {
    fn new(num_inputs: usize, block_size: usize) -> Self {
        Self {
            blocks: (0..num_inputs).map(|_| RwLock::new(vec![0.0; block_size])).collect(),
        }
    }

    fn write(&self, input_index: usize, data: &[Sample]) {
        let mut block = self.blocks[input_index].write();
        block.clear();
        block.extend_from_slice(data);
    }

    fn read(&self, input_index: usize) -> parking_lot::RwLockReadGuard<'_, Vec<Sample>> {
        self.blocks[input_index].read()
    }
}

/// Single-writer-per-output result block, drained by the callback thread
/// after every completion semaphore has fired.
struct OutputResultBus {
    blocks: Vec<Mutex<Vec<Sample>>>,
}

impl OutputResultBus {
    fn new(num_outputs: usize, block_size: usize) -> Self {
        Self { blocks: (0..num_outputs).map(|_| Mutex::new(vec![0.0; block_size])).collect() }
    }

    fn write(&self, output_index: usize, data: &[Sample]) {
        let mut block = self.blocks[output_index].lock();
        block.clear();
        block.extend_from_slice(data);
    }

    fn drain_into(&self, outputs: &mut [Vec<Sample>]) {
        for (output_index, out) in outputs.iter_mut().enumerate().take(self.blocks.len()) {
            let block = self.blocks[output_index].lock();
            out.clear();
            out.extend_from_slice(&block);
        }
    }
}

/// One worker thread per output, each owning an exclusive per-input
/// delay-line bank, an exclusive per-input HF-shelf bank, and a single
/// trailing EQ [`Biquad`] applied after the fan-in sum (§4.10).
pub struct OutputScheduler {
    config: OutputSchedulerConfig,
    input_bus: Arc<InputBlockBus>,
    output_bus: Arc<OutputResultBus>,
    work_semaphores: Vec<Arc<Semaphore>>,
    completion_semaphores: Vec<Arc<Semaphore>>,
    telemetry: Vec<Arc<WorkerTelemetry>>,
    level_handles: Vec<LevelHandle>,
    output_eq_coeffs: Vec<Arc<RwLock<wfs_dsp::BiquadCoeffs>>>,
    level_params: Vec<Arc<RwLock<CompressorParams>>>,
    running: Arc<AtomicBool>,
    threads: Vec<JoinHandle<()>>,
    block_duration: Duration,
}

impl OutputScheduler {
    pub fn start(config: OutputSchedulerConfig, matrix: Arc<MatrixHandle>) -> WfsResult<Self> {
        if !config.sample_rate.is_finite() || config.sample_rate <= 0.0 {
            log::error!("rejecting output scheduler config: sample_rate={}", config.sample_rate);
            return Err(WfsError::InvalidSampleRate(config.sample_rate));
        }
        if config.num_outputs == 0 || config.max_block_size == 0 {
            log::error!(
                "rejecting output scheduler config: num_outputs={}, max_block_size={}",
                config.num_outputs,
                config.max_block_size
            );
            return Err(WfsError::Configuration(format!(
                "num_outputs and max_block_size must both be nonzero, got {} and {}",
                config.num_outputs, config.max_block_size
            )));
        }

        let input_bus = Arc::new(InputBlockBus::new(config.num_inputs, config.max_block_size));
        let output_bus = Arc::new(OutputResultBus::new(config.num_outputs, config.max_block_size));
        let running = Arc::new(AtomicBool::new(true));
        let block_duration =
            Duration::from_secs_f64(config.max_block_size as f64 / config.sample_rate);

        let mut work_semaphores = Vec::with_capacity(config.num_outputs);
        let mut completion_semaphores = Vec::with_capacity(config.num_outputs);
        let mut telemetry = Vec::with_capacity(config.num_outputs);
        let mut level_handles = Vec::with_capacity(config.num_outputs);
        let mut output_eq_coeffs = Vec::with_capacity(config.num_outputs);
        let mut level_params = Vec::with_capacity(config.num_outputs);
        let mut threads = Vec::with_capacity(config.num_outputs);

        for output_index in 0..config.num_outputs {
            let work_semaphore = Arc::new(Semaphore::new());
            let completion_semaphore = Arc::new(Semaphore::new());
            let worker_telemetry = Arc::new(WorkerTelemetry::new());
            let eq_coeffs = Arc::new(RwLock::new(wfs_dsp::BiquadCoeffs::IDENTITY));
            let level_detector = LevelDetector::new(config.sample_rate);
            let level_handle = level_detector.handle();
            let level_param = Arc::new(RwLock::new(CompressorParams::default()));

            let spawned = thread::Builder::new()
                .name(format!("wfs-output-worker-{output_index}"))
                .spawn({
                    let running = running.clone();
                    let matrix = matrix.clone();
                    let input_bus = input_bus.clone();
                    let output_bus = output_bus.clone();
                    let work_semaphore = work_semaphore.clone();
                    let completion_semaphore = completion_semaphore.clone();
                    let worker_telemetry = worker_telemetry.clone();
                    let eq_coeffs = eq_coeffs.clone();
                    let level_param = level_param.clone();
                    let sample_rate = config.sample_rate;
                    let max_block_size = config.max_block_size;
                    let max_delay_seconds = config.max_delay_seconds;
                    let num_inputs = config.num_inputs;
                    move || {
                        run_output_worker(OutputWorkerArgs {
                            output_index,
                            input_bus,
                            output_bus,
                            matrix,
                            work_semaphore,
                            completion_semaphore,
                            telemetry: worker_telemetry,
                            level_detector,
                            eq_coeffs,
                            level_params: level_param,
                            running,
                            sample_rate,
                            max_block_size,
                            max_delay_seconds,
                            num_inputs,
                            block_duration,
                        })
                    }
                });

            let handle = match spawned {
                Ok(handle) => handle,
                Err(err) => {
                    running.store(false, Ordering::Release);
                    for semaphore in &work_semaphores {
                        semaphore.signal();
                    }
                    for handle in threads {
                        let _ = handle.join();
                    }
                    return Err(WfsError::ThreadSpawn(err));
                }
            };

            work_semaphores.push(work_semaphore);
            completion_semaphores.push(completion_semaphore);
            telemetry.push(worker_telemetry);
            level_handles.push(level_handle);
            output_eq_coeffs.push(eq_coeffs);
            level_params.push(level_param);
            threads.push(handle);
        }

        Ok(Self {
            config,
            input_bus,
            output_bus,
            work_semaphores,
            completion_semaphores,
            telemetry,
            level_handles,
            output_eq_coeffs,
            level_params,
            running,
            threads,
            block_duration,
        })
    }

    pub fn process_block(&mut self, inputs: &[&[Sample]], outputs: &mut [Vec<Sample>]) {
        for (input_index, &input) in inputs.iter().enumerate() {
            self.input_bus.write(input_index, input);
        }
        for semaphore in &self.work_semaphores {
            semaphore.signal();
        }

        let bounded_wait = self.block_duration * 2;
        for (index, semaphore) in self.completion_semaphores.iter().enumerate() {
            if !semaphore.wait_timeout(bounded_wait) {
                self.telemetry[index].record_underrun();
            }
        }

        self.output_bus.drain_into(outputs);
    }

    /// Sets the trailing per-output EQ coefficients (e.g. room correction),
    /// picked up by that output's worker on its next block.
    pub fn set_output_eq(&self, output_index: usize, coeffs: wfs_dsp::BiquadCoeffs) {
        *self.output_eq_coeffs[output_index].write() = coeffs;
    }

    /// Sets the peak/slow compressor thresholds and ratios that output's
    /// worker feeds to its metering [`LevelDetector`] (§4.4, §4.11). There is
    /// no per-output equivalent of `live_source` in the data model, so
    /// callers that don't have a specific calibration can leave this at its
    /// [`CompressorParams::default`].
    pub fn set_level_params(&self, output_index: usize, params: CompressorParams) {
        *self.level_params[output_index].write() = params;
    }

    pub fn telemetry(&self, output_index: usize) -> WorkerSnapshot {
        self.telemetry[output_index].snapshot()
    }

    pub fn level_handle(&self, output_index: usize) -> LevelHandle {
        self.level_handles[output_index].clone()
    }

    pub fn num_inputs(&self) -> usize {
        self.config.num_inputs
    }

    pub fn num_outputs(&self) -> usize {
        self.config.num_outputs
    }

    pub fn stop(&mut self) {
        self.running.store(false, Ordering::Release);
        for semaphore in &self.work_semaphores {
            semaphore.signal();
        }
        for handle in self.threads.drain(..) {
            let _ = handle.join();
        }
    }
}

impl Drop for OutputScheduler {
    fn drop(&mut self) {
        if !self.threads.is_empty() {
            self.stop();
        }
    }
}

struct OutputWorkerArgs {
    output_index: usize,
    input_bus: Arc<InputBlockBus>,
    output_bus: Arc<OutputResultBus>,
    matrix: Arc<MatrixHandle>,
    work_semaphore: Arc<Semaphore>,
    completion_semaphore: Arc<Semaphore>,
    telemetry: Arc<WorkerTelemetry>,
    level_detector: LevelDetector,
    eq_coeffs: Arc<RwLock<wfs_dsp::BiquadCoeffs>>,
    level_params: Arc<RwLock<CompressorParams>>,
    running: Arc<AtomicBool>,
    sample_rate: f64,
    max_block_size: usize,
    max_delay_seconds: f64,
    num_inputs: usize,
    block_duration: Duration,
}

fn run_output_worker(args: OutputWorkerArgs) {
    let OutputWorkerArgs {
        output_index,
        input_bus,
        output_bus,
        matrix,
        work_semaphore,
        completion_semaphore,
        telemetry,
        mut level_detector,
        eq_coeffs,
        level_params,
        running,
        sample_rate,
        max_block_size,
        max_delay_seconds,
        num_inputs,
        block_duration,
    } = args;

    let mut delay_lines: Vec<DelayLine> = (0..num_inputs)
        .map(|_| DelayLine::new(sample_rate, max_delay_seconds, max_block_size))
        .collect();
    let mut hf_shelves: Vec<HfShelf> = (0..num_inputs).map(|_| HfShelf::new(sample_rate)).collect();
    let mut output_eq = Biquad::new();
    let mut mix = vec![0.0; max_block_size];

    while running.load(Ordering::Acquire) {
        if !work_semaphore.wait_timeout(block_duration * 4) {
            continue;
        }
        if !running.load(Ordering::Acquire) {
            break;
        }

        let start = Instant::now();
        for sample in mix.iter_mut() {
            *sample = 0.0;
        }

        let snapshot = matrix.load();
        for input_index in 0..num_inputs {
            let cell = *snapshot.cell(input_index, output_index);
            if cell.muted {
                continue;
            }

            let input_block = input_bus.read(input_index);
            let delay_line = &mut delay_lines[input_index];
            let hf_shelf = &mut hf_shelves[input_index];
            delay_line.set_delay_samples(cell.delay_samples);
            hf_shelf.set_gain_db(cell.hf_shelf_db);

            for (sample_index, &x) in input_block.iter().enumerate().take(mix.len()) {
                let delayed = delay_line.process(x);
                let shelved = hf_shelf.process(delayed);
                mix[sample_index] += shelved * cell.gain_linear;
            }
        }

        let coeffs = *eq_coeffs.read();
        output_eq.set_coeffs(coeffs);
        let params = *level_params.read();
        for sample in mix.iter_mut() {
            *sample = output_eq.process(*sample);
            level_detector.process(*sample, &params);
        }

        output_bus.write(output_index, &mix);
        telemetry.record_block(start.elapsed(), block_duration);
        completion_semaphore.signal();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wfs_core::RoutingMatrix;

    fn make_scheduler(num_inputs: usize, num_outputs: usize) -> (OutputScheduler, Arc<MatrixHandle>) {
        let config = OutputSchedulerConfig {
            sample_rate: 48_000.0,
            max_block_size: 64,
            num_inputs,
            num_outputs,
            max_delay_seconds: 0.1,
        };
        let matrix = Arc::new(MatrixHandle::new(RoutingMatrix::new(num_inputs, num_outputs)));
        let scheduler = OutputScheduler::start(config, matrix.clone()).unwrap();
        (scheduler, matrix)
    }

    #[test]
    fn start_rejects_non_finite_sample_rate() {
        let config = OutputSchedulerConfig {
            sample_rate: f64::INFINITY,
            max_block_size: 64,
            num_inputs: 1,
            num_outputs: 1,
            max_delay_seconds: 0.1,
        };
        let matrix = Arc::new(MatrixHandle::new(RoutingMatrix::new(1, 1)));
        let result = OutputScheduler::start(config, matrix);
        assert!(matches!(result, Err(WfsError::InvalidSampleRate(_))));
    }

    #[test]
    fn start_rejects_zero_outputs() {
        let config = OutputSchedulerConfig {
            sample_rate: 48_000.0,
            max_block_size: 64,
            num_inputs: 1,
            num_outputs: 0,
            max_delay_seconds: 0.1,
        };
        let matrix = Arc::new(MatrixHandle::new(RoutingMatrix::new(1, 0)));
        let result = OutputScheduler::start(config, matrix);
        assert!(matches!(result, Err(WfsError::Configuration(_))));
    }

    #[test]
    fn muted_matrix_produces_silent_output() {
        let (mut scheduler, _matrix) = make_scheduler(1, 1);
        let input = vec![1.0; 64];
        let mut outputs = vec![Vec::new()];
        scheduler.process_block(&[&input], &mut outputs);
        assert!(outputs[0].iter().all(|&s| s == 0.0));
        scheduler.stop();
    }

    #[test]
    fn two_inputs_sum_into_one_output() {
        let (mut scheduler, matrix) = make_scheduler(2, 1);
        let mut next = RoutingMatrix::new(2, 1);
        for input_index in 0..2 {
            let cell = next.cell_mut(input_index, 0);
            cell.muted = false;
            cell.gain_linear = 1.0;
            cell.delay_samples = 0.0;
        }
        matrix.store(next);

        let a = vec![1.0; 64];
        let b = vec![1.0; 64];
        let mut outputs = vec![Vec::new()];
        for _ in 0..200 {
            scheduler.process_block(&[&a, &b], &mut outputs);
        }
        let last = *outputs[0].last().unwrap();
        assert!(last > 1.9, "expected near-2.0 sum, got {last}");
        scheduler.stop();
    }

    #[test]
    fn stop_joins_all_worker_threads() {
        let (mut scheduler, _matrix) = make_scheduler(2, 3);
        scheduler.stop();
        assert!(scheduler.threads.is_empty());
    }

    #[test]
    fn a_loud_mix_actually_triggers_gain_reduction_with_the_default_level_params() {
        let (mut scheduler, matrix) = make_scheduler(1, 1);
        let mut next = RoutingMatrix::new(1, 1);
        next.cell_mut(0, 0).muted = false;
        next.cell_mut(0, 0).gain_linear = 1.0;
        matrix.store(next);

        let loud = vec![1.0; 64];
        let mut outputs = vec![Vec::new()];
        for _ in 0..50 {
            scheduler.process_block(&[&loud], &mut outputs);
        }
        assert!(scheduler.level_handle(0).peak_gr() < 1.0);
        scheduler.stop();
    }

    #[test]
    fn set_level_params_steepens_gain_reduction_relative_to_the_default() {
        let (mut scheduler, matrix) = make_scheduler(1, 1);
        let mut next = RoutingMatrix::new(1, 1);
        next.cell_mut(0, 0).muted = false;
        next.cell_mut(0, 0).gain_linear = 1.0;
        matrix.store(next);

        let loud = vec![1.0; 64];
        let mut outputs = vec![Vec::new()];
        for _ in 0..50 {
            scheduler.process_block(&[&loud], &mut outputs);
        }
        let default_gr = scheduler.level_handle(0).peak_gr();

        scheduler.set_level_params(
            0,
            CompressorParams {
                peak_threshold_db: -20.0,
                peak_ratio: 10.0,
                slow_threshold_db: -20.0,
                slow_ratio: 10.0,
            },
        );
        for _ in 0..50 {
            scheduler.process_block(&[&loud], &mut outputs);
        }
        let steeper_gr = scheduler.level_handle(0).peak_gr();

        assert!(steeper_gr < default_gr, "steeper ratio should reduce gain further: {steeper_gr} vs {default_gr}");
        scheduler.stop();
    }
}
