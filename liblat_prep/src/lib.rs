//! # lat_prep
//!
//! lat_prep prepares multi-week Fermi-LAT photon data for likelihood analysis. It takes the
//! weekly photon files and the merged spacecraft file mirrored from the FSSC data server and,
//! for each requested data selection, runs the Fermi Science Tools to produce event lists and
//! a livetime cube in that selection's working directory.
//!
//! ## Installation
//!
//! The only method of install is from source. If you have not used Rust before, you will most
//! likely need to install the Rust tool chain. See the
//! [Rust docs](https://www.rust-lang.org/tools/install) for installation instructions.
//!
//! The Fermi Science Tools (`gtselect`, `gtmktime`, `gtltcube`) must be installed and on your
//! `PATH`, or their location given in the configuration file.
//!
//! To build and install the CLI use `cargo install --path ./lat_prep_cli` from the top level
//! repository.
//!
//! ## Selections
//!
//! A selection is a named number of weeks of data. The bundled selections are
//!
//! | selection | weeks |
//! |-----------|-------|
//! | week      | 1     |
//! | month     | 4     |
//! | 11month   | 48    |
//! | 24month   | 105   |
//! | 36month   | 156   |
//! | all       | 1000  |
//!
//! Selections always take the *earliest* weeks available. Extra selections (or different week
//! counts) can be given in the `selections` map of the configuration file.
//!
//! ## Configuration
//!
//! The YAML format of a configuration file is as follows:
//!
//! ```yml
//! download_path: /data/fermi/download
//! data_path: /data/fermi/data
//! weekly_path: null
//! spacecraft_path: null
//! selections: {}
//! tools:
//!   select: gtselect
//!   time_filter: gtmktime
//!   exposure: gtltcube
//! stage_timeout_secs: null
//! resume: false
//! n_workers: 1
//! ```
//!
//! - `download_path`: where the data was mirrored to. Weekly files are expected in
//! `weekly/photon` and the spacecraft file is `lat_spacecraft_merged.fits`, unless
//! `weekly_path` or `spacecraft_path` are given.
//! - `data_path`: contains one working directory per selection (i.e. `data_path/month`). The
//! working directories must exist before running.
//! - `stage_timeout_secs`: if set, a science tool running longer than this is killed and the
//! selection is marked failed.
//! - `resume`: pick up each selection after the last completed stage of a previous run.
//! - `n_workers`: number of selections prepared in parallel. Each selection is independent.
//!
//! ## Output
//!
//! ```text
//! data_path/month
//! |---- weeks.lis              (weekly files used, one absolute path per line)
//! |---- spacecraft.fits        (link to the spacecraft file)
//! |---- photon.fits            (E > 100 MeV, evclass >= 3)
//! |---- photon_gti.fits        (good time intervals only)
//! |---- photon_1000.fits       (E > 1 GeV, evclass >= 3)
//! |---- photon_1000_gti.fits
//! |---- ltcube.fits            (livetime cube from photon_gti.fits)
//! |---- prep_checkpoint.yaml   (completed stages, used by resume)
//! ```
//!
//! Each science tool also leaves its stdout next to its output as a `.log` file.
pub mod adapter;
pub mod catalog;
pub mod checkpoint;
pub mod config;
pub mod constants;
pub mod error;
pub mod linker;
pub mod process;
pub mod stage;
pub mod weekly_index;
pub mod worker_status;
