use serde::{Deserialize, Serialize};
use std::fmt::Display;

use super::constants::{BASE_ENERGY_MIN, EVENT_CLASS_MIN, HIGH_ENERGY_MIN};

/// The two event lists made for every selection. They differ only by the minimum energy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EnergyVariant {
    Base,
    HighEnergy,
}

impl EnergyVariant {
    /// Variants in the order they are produced
    pub const ALL: [EnergyVariant; 2] = [EnergyVariant::Base, EnergyVariant::HighEnergy];

    /// Minimum photon energy in MeV
    pub fn energy_min(&self) -> f64 {
        match self {
            Self::Base => BASE_ENERGY_MIN,
            Self::HighEnergy => HIGH_ENERGY_MIN,
        }
    }

    pub fn class_min(&self) -> u32 {
        EVENT_CLASS_MIN
    }

    fn file_suffix(&self) -> &'static str {
        match self {
            Self::Base => "",
            Self::HighEnergy => "_1000",
        }
    }

    /// Output of the select stage, e.g. photon_1000.fits
    pub fn events_file_name(&self) -> String {
        format!("photon{}.fits", self.file_suffix())
    }

    /// Output of the time filter stage, e.g. photon_1000_gti.fits
    pub fn filtered_file_name(&self) -> String {
        format!("photon{}_gti.fits", self.file_suffix())
    }
}

impl Display for EnergyVariant {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Base => write!(f, "base"),
            Self::HighEnergy => write!(f, "high-energy"),
        }
    }
}

/// Where a selection is in its preparation.
///
/// Idle -> ResolvingSelection -> BuildingManifest -> LinkingInstrumentState
/// -> RunningVariant(Base) -> RunningVariant(HighEnergy) -> AccumulatingExposure -> Done
///
/// Any failure moves the selection to Failed and nothing after it is run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Stage {
    #[default]
    Idle,
    ResolvingSelection,
    BuildingManifest,
    LinkingInstrumentState,
    RunningVariant(EnergyVariant),
    AccumulatingExposure,
    Done,
    Failed,
}

impl Display for Stage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Idle => write!(f, "idle"),
            Self::ResolvingSelection => write!(f, "resolving selection"),
            Self::BuildingManifest => write!(f, "building manifest"),
            Self::LinkingInstrumentState => write!(f, "linking spacecraft file"),
            Self::RunningVariant(v) => write!(f, "making {v} event list"),
            Self::AccumulatingExposure => write!(f, "accumulating livetime"),
            Self::Done => write!(f, "done"),
            Self::Failed => write!(f, "failed"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_variant_naming() {
        assert_eq!(EnergyVariant::Base.events_file_name(), "photon.fits");
        assert_eq!(EnergyVariant::Base.filtered_file_name(), "photon_gti.fits");
        assert_eq!(EnergyVariant::HighEnergy.events_file_name(), "photon_1000.fits");
        assert_eq!(
            EnergyVariant::HighEnergy.filtered_file_name(),
            "photon_1000_gti.fits"
        );
    }

    #[test]
    fn test_high_energy_is_one_decade_up() {
        let base = EnergyVariant::Base;
        let high = EnergyVariant::HighEnergy;
        assert_eq!(high.energy_min(), base.energy_min() * 10.0);
        assert_eq!(high.class_min(), base.class_min());
        assert_eq!(base.class_min(), 3);
    }
}
