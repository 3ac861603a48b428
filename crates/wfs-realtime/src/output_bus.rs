//! Shared output accumulator bus for C9 (§4.9): `M x maxBlockSize` atomic
//! floats, zeroed by the callback before each block, written via relaxed
//! atomic adds by whichever input workers contribute to a given output.

use portable_atomic::{AtomicF64, Ordering};

use wfs_core::Sample;

pub struct OutputAccumulatorBus {
    num_outputs: usize,
    block_size: usize,
    cells: Vec<AtomicF64>,
}

impl OutputAccumulatorBus {
    pub fn new(num_outputs: usize, block_size: usize) -> Self {
        let mut cells = Vec::with_capacity(num_outputs * block_size);
        cells.resize_with(num_outputs * block_size, || AtomicF64::new(0.0));
        Self { num_outputs, block_size, cells }
    }

    pub fn zero(&self) {
        for cell in &self.cells {
            cell.store(0.0, Ordering::Relaxed);
        }
    }

    #[inline]
    pub fn add(&self, output_index: usize, sample_index: usize, value: Sample) {
        let index = output_index * self.block_size + sample_index;
        self.cells[index].fetch_add(value, Ordering::Relaxed);
    }

    /// Drains the bus into caller-owned per-output buffers, resizing each to
    /// the block size.
    pub fn drain_into(&self, outputs: &mut [Vec<Sample>]) {
        for (output_index, out) in outputs.iter_mut().enumerate().take(self.num_outputs) {
            out.resize(self.block_size, 0.0);
            for (sample_index, slot) in out.iter_mut().enumerate() {
                let index = output_index * self.block_size + sample_index;
                *slot = self.cells[index].load(Ordering::Relaxed);
            }
        }
    }
}
