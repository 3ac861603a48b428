//! wfs-realtime: audio-thread scheduling and telemetry for the WFS
//! rendering core — input-buffer scheduler (C9), output-buffer scheduler
//! (C10), and the level-metering coordinator (C11).

pub mod input_scheduler;
pub mod level_metering;
pub mod output_bus;
pub mod output_scheduler;
pub mod semaphore;
pub mod telemetry;

pub use input_scheduler::{InputScheduler, InputSchedulerConfig};
pub use level_metering::{LevelMeteringCoordinator, LevelSnapshot};
pub use output_bus::OutputAccumulatorBus;
pub use output_scheduler::{OutputScheduler, OutputSchedulerConfig};
pub use semaphore::Semaphore;
pub use telemetry::{WorkerSnapshot, WorkerTelemetry};
