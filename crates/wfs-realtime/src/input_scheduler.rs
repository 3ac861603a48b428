//! C9: input-buffer scheduler — one worker thread per input (§4.9).
//!
//! Thread lifecycle grounded on `rf_realtime::masscore::MassCoreEngine`:
//! named `thread::Builder` spawn, `Arc<AtomicBool>` running flag checked
//! after every bounded wait, `stop()` signalling every worker before
//! joining. The per-sample inner loop (fractional delay -> HF shelf ->
//! gain -> atomic add) is new: it is the spec's own contract, not present
//! in the teacher, which this scheduler exists to carry out.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use parking_lot::RwLock;

use wfs_core::{Sample, WfsError, WfsResult};
use wfs_dsp::{ring_buffer, Consumer, DelayLine, HfShelf, LevelDetector, LevelHandle, Producer};
use wfs_dsp::CompressorParams;
use wfs_spatial::MatrixHandle;

use crate::output_bus::OutputAccumulatorBus;
use crate::semaphore::Semaphore;
use crate::telemetry::{WorkerSnapshot, WorkerTelemetry};

#[derive(Debug, Clone, Copy)]
pub struct InputSchedulerConfig {
    pub sample_rate: f64,
    pub max_block_size: usize,
    pub num_inputs: usize,
    pub num_outputs: usize,
    pub max_delay_seconds: f64,
}

/// One worker thread per input, each owning an exclusive ring consumer, a
/// per-output delay-line bank, and a per-output HF-shelf bank, contributing
/// into the shared [`OutputAccumulatorBus`] (§4.9).
pub struct InputScheduler {
    config: InputSchedulerConfig,
    producers: Vec<Producer>,
    work_semaphores: Vec<Arc<Semaphore>>,
    completion_semaphores: Vec<Arc<Semaphore>>,
    telemetry: Vec<Arc<WorkerTelemetry>>,
    level_handles: Vec<LevelHandle>,
    level_params: Vec<Arc<RwLock<CompressorParams>>>,
    running: Arc<AtomicBool>,
    threads: Vec<JoinHandle<()>>,
    output_bus: Arc<OutputAccumulatorBus>,
    block_duration: Duration,
}

impl InputScheduler {
    pub fn start(config: InputSchedulerConfig, matrix: Arc<MatrixHandle>) -> WfsResult<Self> {
        if !config.sample_rate.is_finite() || config.sample_rate <= 0.0 {
            log::error!("rejecting input scheduler config: sample_rate={}", config.sample_rate);
            return Err(WfsError::InvalidSampleRate(config.sample_rate));
        }
        if config.num_inputs == 0 || config.max_block_size == 0 {
            log::error!(
                "rejecting input scheduler config: num_inputs={}, max_block_size={}",
                config.num_inputs,
                config.max_block_size
            );
            return Err(WfsError::Configuration(format!(
                "num_inputs and max_block_size must both be nonzero, got {} and {}",
                config.num_inputs, config.max_block_size
            )));
        }

        let ring_capacity = config.max_block_size * 4;
        let mut producers = Vec::with_capacity(config.num_inputs);
        let mut consumers = Vec::with_capacity(config.num_inputs);
        for _ in 0..config.num_inputs {
            let (producer, consumer) = ring_buffer(ring_capacity);
            producers.push(producer);
            consumers.push(consumer);
        }

        let output_bus = Arc::new(OutputAccumulatorBus::new(config.num_outputs, config.max_block_size));
        let running = Arc::new(AtomicBool::new(true));
        let block_duration =
            Duration::from_secs_f64(config.max_block_size as f64 / config.sample_rate);

        let mut work_semaphores = Vec::with_capacity(config.num_inputs);
        let mut completion_semaphores = Vec::with_capacity(config.num_inputs);
        let mut telemetry = Vec::with_capacity(config.num_inputs);
        let mut level_handles = Vec::with_capacity(config.num_inputs);
        let mut level_params = Vec::with_capacity(config.num_inputs);
        let mut threads = Vec::with_capacity(config.num_inputs);

        for (input_index, consumer) in consumers.into_iter().enumerate() {
            let work_semaphore = Arc::new(Semaphore::new());
            let completion_semaphore = Arc::new(Semaphore::new());
            let worker_telemetry = Arc::new(WorkerTelemetry::new());
            let level_detector = LevelDetector::new(config.sample_rate);
            let level_handle = level_detector.handle();
            let level_param = Arc::new(RwLock::new(CompressorParams::default()));

            let spawned = thread::Builder::new()
                .name(format!("wfs-input-worker-{input_index}"))
                .spawn({
                    let running = running.clone();
                    let matrix = matrix.clone();
                    let output_bus = output_bus.clone();
                    let work_semaphore = work_semaphore.clone();
                    let completion_semaphore = completion_semaphore.clone();
                    let worker_telemetry = worker_telemetry.clone();
                    let level_param = level_param.clone();
                    let sample_rate = config.sample_rate;
                    let max_block_size = config.max_block_size;
                    let max_delay_seconds = config.max_delay_seconds;
                    let num_outputs = config.num_outputs;
                    move || {
                        run_input_worker(InputWorkerArgs {
                            input_index,
                            consumer,
                            matrix,
                            output_bus,
                            work_semaphore,
                            completion_semaphore,
                            telemetry: worker_telemetry,
                            level_detector,
                            level_params: level_param,
                            running,
                            sample_rate,
                            max_block_size,
                            max_delay_seconds,
                            num_outputs,
                            block_duration,
                        })
                    }
                });

            let handle = match spawned {
                Ok(handle) => handle,
                Err(err) => {
                    // unwind the threads already spawned before surfacing the error.
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
            level_params.push(level_param);
            threads.push(handle);
        }

        Ok(Self {
            config,
            producers,
            work_semaphores,
            completion_semaphores,
            telemetry,
            level_handles,
            level_params,
            running,
            threads,
            output_bus,
            block_duration,
        })
    }

    /// Processes one audio callback block (§4.9): writes each input's
    /// samples into its ring, signals every worker, waits bounded (2x block
    /// duration) for completions, then drains the shared bus. A worker that
    /// misses the deadline silently contributes nothing this block; its
    /// miss is recorded as an underrun in telemetry, not propagated as an
    /// error (§4.9, §7).
    pub fn process_block(&mut self, inputs: &[&[Sample]], outputs: &mut [Vec<Sample>]) {
        self.output_bus.zero();

        for (producer, &input) in self.producers.iter_mut().zip(inputs.iter()) {
            producer.write(input);
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

    pub fn telemetry(&self, input_index: usize) -> WorkerSnapshot {
        self.telemetry[input_index].snapshot()
    }

    pub fn level_handle(&self, input_index: usize) -> LevelHandle {
        self.level_handles[input_index].clone()
    }

    /// Sets the peak/slow compressor thresholds and ratios that input's
    /// worker feeds to its [`LevelDetector`] (§4.4), sourced from that
    /// input's `live_source` parameters. Picked up on the worker's next
    /// block.
    pub fn set_level_params(&self, input_index: usize, params: CompressorParams) {
        *self.level_params[input_index].write() = params;
    }

    pub fn num_inputs(&self) -> usize {
        self.config.num_inputs
    }

    pub fn num_outputs(&self) -> usize {
        self.config.num_outputs
    }

    /// Signals every worker's shutdown and joins all threads (§5
    /// "Cancellation").
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

impl Drop for InputScheduler {
    fn drop(&mut self) {
        if !self.threads.is_empty() {
            self.stop();
        }
    }
}

struct InputWorkerArgs {
    input_index: usize,
    consumer: Consumer,
    matrix: Arc<MatrixHandle>,
    output_bus: Arc<OutputAccumulatorBus>,
    work_semaphore: Arc<Semaphore>,
    completion_semaphore: Arc<Semaphore>,
    telemetry: Arc<WorkerTelemetry>,
    level_detector: LevelDetector,
    level_params: Arc<RwLock<CompressorParams>>,
    running: Arc<AtomicBool>,
    sample_rate: f64,
    max_block_size: usize,
    max_delay_seconds: f64,
    num_outputs: usize,
    block_duration: Duration,
}

fn run_input_worker(args: InputWorkerArgs) {
    let InputWorkerArgs {
        input_index,
        mut consumer,
        matrix,
        output_bus,
        work_semaphore,
        completion_semaphore,
        telemetry,
        mut level_detector,
        level_params,
        running,
        sample_rate,
        max_block_size,
        max_delay_seconds,
        num_outputs,
        block_duration,
    } = args;

    let mut delay_lines: Vec<DelayLine> = (0..num_outputs)
        .map(|_| DelayLine::new(sample_rate, max_delay_seconds, max_block_size))
        .collect();
    let mut hf_shelves: Vec<HfShelf> = (0..num_outputs).map(|_| HfShelf::new(sample_rate)).collect();
    let mut block = vec![0.0; max_block_size];

    while running.load(Ordering::Acquire) {
        if !work_semaphore.wait_timeout(block_duration * 4) {
            continue;
        }
        if !running.load(Ordering::Acquire) {
            break;
        }

        let start = Instant::now();
        let read = consumer.read(&mut block);
        let params = *level_params.read();
        for &sample in &block[..read] {
            level_detector.process(sample, &params);
        }
        let snapshot = matrix.load();

        for output_index in 0..num_outputs {
            let cell = *snapshot.cell(input_index, output_index);
            if cell.muted {
                continue;
            }

            let delay_line = &mut delay_lines[output_index];
            let hf_shelf = &mut hf_shelves[output_index];
            delay_line.set_delay_samples(cell.delay_samples);
            hf_shelf.set_gain_db(cell.hf_shelf_db);

            for sample_index in 0..read {
                let delayed = delay_line.process(block[sample_index]);
                let shelved = hf_shelf.process(delayed);
                output_bus.add(output_index, sample_index, shelved * cell.gain_linear);
            }
        }

        telemetry.record_block(start.elapsed(), block_duration);
        completion_semaphore.signal();
    }
}
