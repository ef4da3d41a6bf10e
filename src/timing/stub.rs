use super::PipelineStage;
use std::time::Duration;

/// Dummy timer when `timing` is disabled (zero-sized).
pub struct Timer;

impl Timer {
    #[inline(always)]
    pub fn start() -> Self {
        Self
    }

    #[inline(always)]
    pub fn elapsed(&self) -> Duration {
        Duration::ZERO
    }
}

/// Dummy timings when `timing` is disabled (zero-sized).
#[derive(Debug, Clone, Copy, Default)]
pub struct PipelineTimings;

impl PipelineTimings {
    #[inline(always)]
    pub fn set(&mut self, _stage: PipelineStage, _d: Duration) {}

    #[inline(always)]
    pub fn get(&self, _stage: PipelineStage) -> Duration {
        Duration::ZERO
    }

    #[inline(always)]
    pub fn total(&self) -> Duration {
        Duration::ZERO
    }

    #[inline(always)]
    pub fn reset(&mut self) {}

    #[inline(always)]
    pub fn report(&self, _n: usize) {}
}
