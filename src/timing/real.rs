use super::PipelineStage;
use std::time::{Duration, Instant};

/// Timer that tracks elapsed time when timing is enabled.
pub struct Timer(Instant);

impl Timer {
    #[inline]
    pub fn start() -> Self {
        Self(Instant::now())
    }

    #[inline]
    pub fn elapsed(&self) -> Duration {
        self.0.elapsed()
    }
}

/// Wall time of each stage of the last run.
#[derive(Debug, Clone, Copy, Default)]
pub struct PipelineTimings {
    stages: [Duration; PipelineStage::COUNT],
}

impl PipelineTimings {
    #[inline]
    pub fn set(&mut self, stage: PipelineStage, d: Duration) {
        self.stages[stage.index()] = d;
    }

    #[inline]
    pub fn get(&self, stage: PipelineStage) -> Duration {
        self.stages[stage.index()]
    }

    pub fn total(&self) -> Duration {
        self.stages.iter().sum()
    }

    pub fn reset(&mut self) {
        *self = Self::default();
    }

    /// Print a per-stage breakdown to stderr.
    ///
    /// Set `SPHERE_BROADPHASE_TIMING_KV` to also emit a single key=value line
    /// for scripts.
    pub fn report(&self, n: usize) {
        let ms = |d: Duration| d.as_secs_f64() * 1000.0;
        let total = self.total();
        let pct = |d: Duration| {
            if total.as_nanos() == 0 {
                0.0
            } else {
                100.0 * d.as_secs_f64() / total.as_secs_f64()
            }
        };

        eprintln!("timing n={} total={:.1}ms", n, ms(total));
        for stage in PipelineStage::ALL {
            let d = self.get(stage);
            eprintln!("  {:<28}{:7.2}ms ({:4.1}%)", stage.name(), ms(d), pct(d));
        }

        if std::env::var_os("SPHERE_BROADPHASE_TIMING_KV").is_some() {
            let kv: Vec<String> = PipelineStage::ALL
                .iter()
                .map(|&s| format!("{}_ms={:.3}", s.name(), ms(self.get(s))))
                .collect();
            eprintln!("TIMING_KV n={} total_ms={:.3} {}", n, ms(total), kv.join(" "));
        }
    }
}
