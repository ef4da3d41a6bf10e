//! Zero-cost per-stage timing for the partition pipeline.
//!
//! With the `timing` feature, [`PipelineTimings`] records the wall time of
//! each stage of the last run. Without it, all types are zero-sized and all
//! methods compile away.

/// Stage of the partition pipeline, in execution order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PipelineStage {
    EstimateCellSize,
    FillHashCells,
    SortHashCells,
    CountCollisionPerCell,
    CreateCollisionPairList,
}

impl PipelineStage {
    pub const COUNT: usize = 5;

    pub const ALL: [PipelineStage; Self::COUNT] = [
        PipelineStage::EstimateCellSize,
        PipelineStage::FillHashCells,
        PipelineStage::SortHashCells,
        PipelineStage::CountCollisionPerCell,
        PipelineStage::CreateCollisionPairList,
    ];

    pub fn name(self) -> &'static str {
        match self {
            PipelineStage::EstimateCellSize => "estimate_cell_size",
            PipelineStage::FillHashCells => "fill_hash_cells",
            PipelineStage::SortHashCells => "sort_hash_cells",
            PipelineStage::CountCollisionPerCell => "count_collision_per_cell",
            PipelineStage::CreateCollisionPairList => "create_collision_pair_list",
        }
    }

    #[cfg_attr(not(feature = "timing"), allow(dead_code))]
    #[inline]
    fn index(self) -> usize {
        self as usize
    }
}

#[cfg(feature = "timing")]
mod real;
#[cfg(not(feature = "timing"))]
mod stub;

#[cfg(feature = "timing")]
pub use real::*;
#[cfg(not(feature = "timing"))]
pub use stub::*;
