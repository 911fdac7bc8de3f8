use rand::Rng;
use shared::domain::Phase;

use crate::config::SimulationSettings;

/// Source of per-tick progress increments.
///
/// `UploadRecord::advance` floors whatever is returned here, so
/// implementations do not need to guard against zero or negative steps.
pub trait ProgressGenerator: Send + Sync {
    fn next_step(&self, phase: Phase) -> f64;
}

impl<F> ProgressGenerator for F
where
    F: Fn(Phase) -> f64 + Send + Sync,
{
    fn next_step(&self, phase: Phase) -> f64 {
        self(phase)
    }
}

/// Uniform steps in `[0, max_step)` per phase.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RandomProgress {
    uploading_max: f64,
    processing_max: f64,
}

impl RandomProgress {
    pub fn new(uploading_max: f64, processing_max: f64) -> Self {
        Self {
            uploading_max,
            processing_max,
        }
    }

    pub fn from_settings(settings: &SimulationSettings) -> Self {
        Self::new(settings.uploading.max_step, settings.processing.max_step)
    }

    fn max_for(&self, phase: Phase) -> f64 {
        match phase {
            Phase::Uploading => self.uploading_max,
            Phase::Processing => self.processing_max,
        }
    }
}

impl ProgressGenerator for RandomProgress {
    fn next_step(&self, phase: Phase) -> f64 {
        let max = self.max_for(phase);
        if !max.is_finite() || max <= 0.0 {
            return 0.0;
        }
        rand::thread_rng().gen_range(0.0..max)
    }
}

/// Same step on every tick of a phase.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FixedProgress {
    pub uploading: f64,
    pub processing: f64,
}

impl FixedProgress {
    pub fn new(uploading: f64, processing: f64) -> Self {
        Self {
            uploading,
            processing,
        }
    }

    pub fn uniform(step: f64) -> Self {
        Self::new(step, step)
    }
}

impl ProgressGenerator for FixedProgress {
    fn next_step(&self, phase: Phase) -> f64 {
        match phase {
            Phase::Uploading => self.uploading,
            Phase::Processing => self.processing,
        }
    }
}
