//! Invariant #2 (§8): once the scheduler is running, `process_block` makes
//! zero heap operations per block. A counting wrapper around the system
//! allocator is the only way to observe this without an external profiler.

use std::alloc::{GlobalAlloc, Layout, System};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use wfs_core::RoutingMatrix;
use wfs_realtime::{InputScheduler, InputSchedulerConfig};
use wfs_spatial::MatrixHandle;

struct CountingAllocator;

static ALLOC_COUNT: AtomicUsize = AtomicUsize::new(0);

unsafe impl GlobalAlloc for CountingAllocator {
    unsafe fn alloc(&self, layout: Layout) -> *mut u8 {
        ALLOC_COUNT.fetch_add(1, Ordering::Relaxed);
        System.alloc(layout)
    }

    unsafe fn dealloc(&self, ptr: *mut u8, layout: Layout) {
        System.dealloc(ptr, layout)
    }
}

#[global_allocator]
static ALLOCATOR: CountingAllocator = CountingAllocator;

#[test]
fn process_block_makes_no_heap_allocations_once_running() {
    let config = InputSchedulerConfig {
        sample_rate: 48_000.0,
        max_block_size: 64,
        num_inputs: 2,
        num_outputs: 2,
        max_delay_seconds: 0.1,
    };
    let matrix = Arc::new(MatrixHandle::new(RoutingMatrix::new(2, 2)));
    let mut scheduler = InputScheduler::start(config, matrix).unwrap();

    let input_a = vec![0.0; 64];
    let input_b = vec![0.0; 64];
    let mut outputs = vec![Vec::new(), Vec::new()];

    // warm up: let the worker threads settle into their steady-state loop
    // and grow any internal scratch buffers to their working size.
    for _ in 0..8 {
        scheduler.process_block(&[&input_a, &input_b], &mut outputs);
    }

    let before = ALLOC_COUNT.load(Ordering::Relaxed);
    for _ in 0..32 {
        scheduler.process_block(&[&input_a, &input_b], &mut outputs);
    }
    let after = ALLOC_COUNT.load(Ordering::Relaxed);

    assert_eq!(after, before, "process_block allocated after warmup");

    scheduler.stop();
}
