//! wfs-spatial: geometry-to-coefficient pipeline for the WFS rendering core —
//! automotion (§3) and cluster resolution (§9) feeding the position pipeline
//! (C5), the calculation engine (C6), the Live-Source Tamer (C7), and the
//! binaural preview engine (C8).

pub mod automotion;
pub mod binaural;
pub mod calculation_engine;
pub mod cluster;
pub mod live_source_tamer;
pub mod position_pipeline;

pub use automotion::{AutomotionEngine, AutomotionPhase};
pub use binaural::{
    active_input_indices, calculate_binaural_geometry, BinauralGeometry, Ear, Listener,
};
pub use calculation_engine::{
    calculate_cell, calculate_floor_reflection_cell, compose_routing_matrix, keystone_attenuation,
    CalculationContext, CellContext, FloorReflectionCell, MatrixHandle,
};
pub use cluster::ClusterResolver;
pub use live_source_tamer::LiveSourceTamer;
pub use position_pipeline::{PositionPipeline, WaypointQueue};
