use super::stage::{EnergyVariant, Stage};

/// Progress message sent from a pipeline worker to whoever is displaying progress
#[derive(Debug, Clone, Default)]
pub struct WorkerStatus {
    pub progress: f32,
    pub tag: String,
    pub worker_id: usize,
    pub stage: Stage,
}

impl WorkerStatus {
    pub fn new(tag: &str, worker_id: usize, stage: Stage) -> Self {
        Self {
            progress: stage_progress(&stage),
            tag: tag.to_string(),
            worker_id,
            stage,
        }
    }
}

/// Fraction of a selection's preparation finished once `stage` has been entered
fn stage_progress(stage: &Stage) -> f32 {
    match stage {
        Stage::Idle | Stage::ResolvingSelection => 0.0,
        Stage::BuildingManifest => 0.05,
        Stage::LinkingInstrumentState => 0.1,
        Stage::RunningVariant(EnergyVariant::Base) => 0.15,
        Stage::RunningVariant(EnergyVariant::HighEnergy) => 0.3,
        // Livetime accumulation dominates the wall clock
        Stage::AccumulatingExposure => 0.45,
        Stage::Done | Stage::Failed => 1.0,
    }
}
