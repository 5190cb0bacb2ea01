// Working directory layout. These names are what the downstream likelihood tooling expects
// to find in a prepared selection directory.
pub const MANIFEST_FILE_NAME: &str = "weeks.lis";
pub const SPACECRAFT_ALIAS_NAME: &str = "spacecraft.fits";
pub const EXPOSURE_FILE_NAME: &str = "ltcube.fits";
pub const CHECKPOINT_FILE_NAME: &str = "prep_checkpoint.yaml";

// Download directory layout
pub const WEEKLY_SUBDIR: &str = "weekly/photon";
pub const SPACECRAFT_FILE_NAME: &str = "lat_spacecraft_merged.fits";

/// Only weekly files with this extension are considered for a manifest
pub const WEEKLY_FILE_EXTENSION: &str = "fits";

// Energy thresholds in MeV
pub const BASE_ENERGY_MIN: f64 = 100.0;
pub const HIGH_ENERGY_MIN: f64 = 1000.0;
pub const ENERGY_MAX: f64 = 300_000.0;
pub const EVENT_CLASS_MIN: u32 = 3;

// Fixed selection parameters
pub const ZENITH_MAX: f64 = 180.0;
pub const GTI_FILTER: &str = "DATA_QUAL==1";
pub const LTCUBE_DCOSTHETA: f64 = 0.025;
pub const LTCUBE_BINSZ: f64 = 1.0;
pub const TOOL_CHATTER: u8 = 2;

// Default executable names for the science tools
pub const SELECT_TOOL: &str = "gtselect";
pub const TIME_FILTER_TOOL: &str = "gtmktime";
pub const EXPOSURE_TOOL: &str = "gtltcube";

/// How often a running tool is polled when a stage timeout is set
pub const TOOL_POLL_INTERVAL_MS: u64 = 500;

// Environment variables read by Config::from_env
pub const DOWNLOAD_DIR_ENV: &str = "FERMI_DOWNLOAD_DIR";
pub const DATA_DIR_ENV: &str = "FERMI_DATA_DIR";

//     (tag,        #weeks)
pub const DEFAULT_SELECTIONS: [(&str, u32); 6] = [
    ("week", 1),
    ("month", 4),
    ("11month", 48),
    ("24month", 105),
    ("36month", 156),
    ("all", 1000),
];
