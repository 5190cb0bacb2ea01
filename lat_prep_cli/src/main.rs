//! # lat_prep_cli
//!
//! Part of the lat_prep crate family.
//!
//! Command line application to prepare Fermi-LAT data selections.
//!
//! ## Use
//!
//! ```bash
//! lat_prep_cli -p config.yaml new                  # write a template config
//! lat_prep_cli -p config.yaml run week,month all   # prepare selections
//! lat_prep_cli -p config.yaml run --resume 24month # continue an interrupted run
//! lat_prep_cli selections                          # list known selections
//! ```
//!
//! Without `-p`, `run` takes its directories from `FERMI_DOWNLOAD_DIR` and `FERMI_DATA_DIR`.
//! Everything is logged to the terminal and to `lat_prep.log`. The exit status is non-zero if
//! any selection was skipped or failed.
use clap::{Arg, ArgAction, Command};
use indicatif::{MultiProgress, ProgressBar, ProgressStyle};
use indicatif_log_bridge::LogWrapper;
use std::collections::HashMap;
use std::fs::{File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::mpsc;
use std::time::Duration;

use liblat_prep::adapter::ScienceToolsAdapter;
use liblat_prep::catalog::{parse_tags, SelectionCatalog};
use liblat_prep::config::Config;
use liblat_prep::error::ConfigError;
use liblat_prep::process::{BatchSummary, PreparationPipeline};
use liblat_prep::worker_status::WorkerStatus;

const LOG_FILE: &str = "lat_prep.log";

fn make_template_config(path: &Path) -> Result<(), ConfigError> {
    let config = Config::default();
    let yaml_str = serde_yaml::to_string(&config)?;
    let mut file = File::create(path)?;
    file.write_all(yaml_str.as_bytes())?;
    Ok(())
}

fn load_config(path: Option<&String>) -> Result<Config, ConfigError> {
    match path {
        Some(p) => {
            log::info!("Loading config from {p}...");
            Config::read_config_file(&PathBuf::from(p))
        }
        None => {
            log::info!("No config given, reading directories from the environment...");
            Config::from_env()
        }
    }
}

fn init_logging(pb_manager: &MultiProgress) {
    let term_logger = simplelog::TermLogger::new(
        simplelog::LevelFilter::Info,
        simplelog::Config::default(),
        simplelog::TerminalMode::Mixed,
        simplelog::ColorChoice::Auto,
    );
    let mut loggers: Vec<Box<dyn simplelog::SharedLogger>> = vec![term_logger];
    // Appended so a resumed run keeps the log of the run it picks up from
    match OpenOptions::new().create(true).append(true).open(LOG_FILE) {
        Ok(file) => loggers.push(simplelog::WriteLogger::new(
            simplelog::LevelFilter::Info,
            simplelog::Config::default(),
            file,
        )),
        Err(e) => eprintln!("Could not open log file {LOG_FILE}: {e}"),
    }
    let logger = simplelog::CombinedLogger::new(loggers);

    LogWrapper::new(pb_manager.clone(), logger)
        .try_init()
        .expect("Could not create logging/progress!");
    log::set_max_level(simplelog::LevelFilter::Info);
}

/// Run the pipeline on a worker thread and drive one progress bar per worker until it is done
fn run_with_progress(
    config: Config,
    tags: Vec<String>,
    pb_manager: &MultiProgress,
) -> Option<BatchSummary> {
    let catalog = SelectionCatalog::with_overrides(&config.selections);
    let adapter = ScienceToolsAdapter::from_config(&config);
    let n_workers = config.n_workers as usize;
    let (tx, rx) = mpsc::channel::<WorkerStatus>();

    // Spawn the task!
    let handle = std::thread::spawn(move || {
        let pipeline = PreparationPipeline::new(config, catalog, adapter);
        pipeline.run_workers(&tags, n_workers, &tx)
    });

    let style = ProgressStyle::with_template("[{elapsed_precise}] {bar:40.cyan/blue} {msg}")
        .unwrap_or_else(|_| ProgressStyle::default_bar());
    let mut bars: HashMap<usize, ProgressBar> = HashMap::new();
    // Ends once every worker has hung up
    for status in rx.iter() {
        let pb = bars.entry(status.worker_id).or_insert_with(|| {
            let pb = pb_manager.add(ProgressBar::new(100));
            pb.set_style(style.clone());
            pb.enable_steady_tick(Duration::from_secs(1));
            pb
        });
        pb.set_position((status.progress * 100.0) as u64);
        pb.set_message(format!(
            "Worker {} : {} - {}",
            status.worker_id, status.tag, status.stage
        ));
    }
    for pb in bars.values() {
        pb.finish();
    }

    match handle.join() {
        Ok(summary) => Some(summary),
        Err(_) => {
            log::error!("Failed to join preparation task!");
            None
        }
    }
}

fn main() {
    // Create a cli
    let matches = Command::new("lat_prep_cli")
        .arg_required_else_help(true)
        .arg(
            Arg::new("path")
                .short('p')
                .long("path")
                .global(true)
                .help("Path to the config file"),
        )
        .subcommand(Command::new("new").about("Make a template configuration yaml file"))
        .subcommand(
            Command::new("run")
                .about("Prepare data for the given selections")
                .arg(
                    Arg::new("tags")
                        .required(true)
                        .num_args(1..)
                        .help("Selections to prepare, comma or space separated"),
                )
                .arg(
                    Arg::new("resume")
                        .long("resume")
                        .action(ArgAction::SetTrue)
                        .help("Skip stages completed by a previous run"),
                )
                .arg(
                    Arg::new("workers")
                        .short('w')
                        .long("workers")
                        .value_parser(clap::value_parser!(i32))
                        .help("Number of selections to prepare in parallel"),
                ),
        )
        .subcommand(Command::new("selections").about("List the known selections"))
        .get_matches();

    // Initialize feedback
    let pb_manager = MultiProgress::new();
    init_logging(&pb_manager);

    let config_path = matches.get_one::<String>("path");

    match matches.subcommand() {
        Some(("new", _)) => {
            let Some(path) = config_path else {
                log::error!("new requires a path (-p) for the template config");
                std::process::exit(1);
            };
            log::info!("Making a template config at {path}...");
            if let Err(e) = make_template_config(Path::new(path)) {
                log::error!("{e}");
                std::process::exit(1);
            }
            log::info!("Done.");
        }
        Some(("selections", _)) => {
            let catalog = match config_path {
                Some(_) => match load_config(config_path) {
                    Ok(config) => SelectionCatalog::with_overrides(&config.selections),
                    Err(e) => {
                        log::error!("{e}");
                        std::process::exit(1);
                    }
                },
                None => SelectionCatalog::default(),
            };
            log::info!("*** SELECTIONS ***");
            for selection in catalog.entries() {
                log::info!("{:.<20} {} weeks", selection.name, selection.n_weeks);
            }
        }
        Some(("run", run_matches)) => {
            // Load our config
            let mut config = match load_config(config_path) {
                Ok(c) => c,
                Err(e) => {
                    log::error!("{e}");
                    std::process::exit(1);
                }
            };
            if run_matches.get_flag("resume") {
                config.resume = true;
            }
            if let Some(n_workers) = run_matches.get_one::<i32>("workers") {
                config.n_workers = *n_workers;
            }
            if !config.is_n_workers_valid() {
                log::error!("Number of workers must be at least 1, got {}", config.n_workers);
                std::process::exit(1);
            }
            log::info!("Config successfully loaded.");
            log::info!("Download Path: {}", config.download_path.display());
            log::info!("Data Path: {}", config.data_path.display());
            log::info!("Weekly Path: {}", config.get_weekly_directory().display());
            log::info!("Spacecraft File: {}", config.get_spacecraft_file().display());
            log::info!("Resume: {} Workers: {}", config.resume, config.n_workers);

            let raw_tags: Vec<String> = run_matches
                .get_many::<String>("tags")
                .map(|values| values.cloned().collect())
                .unwrap_or_default();
            let tags = parse_tags(&raw_tags);
            if tags.is_empty() {
                log::error!("No selections given");
                std::process::exit(1);
            }
            log::info!("Selections: {}", tags.join(", "));

            let Some(summary) = run_with_progress(config, tags, &pb_manager) else {
                std::process::exit(1);
            };
            summary.log();
            if summary.has_failures() {
                log::warn!("Some selections were not prepared. Check {LOG_FILE} for details.");
                std::process::exit(1);
            }
            log::info!("Done.");
        }
        _ => (),
    }
}
