use std::path::{Path, PathBuf};
use std::sync::mpsc::{self, Sender};
use std::time::{Duration, Instant};

use super::adapter::{
    AnalysisStageAdapter, EventArtifact, ExposureArtifact, ExposureRequest, SelectRequest,
    TimeFilterRequest,
};
use super::catalog::{SelectionCatalog, SelectionTag};
use super::checkpoint::{Checkpoint, CompletedStage};
use super::config::Config;
use super::constants::{
    CHECKPOINT_FILE_NAME, EXPOSURE_FILE_NAME, MANIFEST_FILE_NAME, SPACECRAFT_ALIAS_NAME,
};
use super::error::{CatalogError, PipelineError};
use super::linker::{InstrumentStateLinker, LinkStatus};
use super::stage::{EnergyVariant, Stage};
use super::weekly_index::{WeeklyFileIndex, WeeklyFileManifest};
use super::worker_status::WorkerStatus;

/// Everything the stages of one selection need to know about where they work.
///
/// Made fresh for every selection and handed down the stages; never kept on the pipeline.
#[derive(Debug, Clone)]
pub struct TagContext {
    pub selection: SelectionTag,
    pub work_dir: PathBuf,
    pub manifest_path: PathBuf,
    pub alias_path: PathBuf,
    pub checkpoint_path: PathBuf,
    pub spacecraft_file: PathBuf,
}

impl TagContext {
    /// Every path in the context is absolute
    pub fn new(config: &Config, selection: SelectionTag) -> Result<Self, PipelineError> {
        let work_dir = std::path::absolute(config.get_work_directory(&selection.name))?;
        let spacecraft_file = std::path::absolute(config.get_spacecraft_file())?;
        Ok(Self {
            manifest_path: work_dir.join(MANIFEST_FILE_NAME),
            alias_path: work_dir.join(SPACECRAFT_ALIAS_NAME),
            checkpoint_path: work_dir.join(CHECKPOINT_FILE_NAME),
            spacecraft_file,
            work_dir,
            selection,
        })
    }

    pub fn events_path(&self, variant: EnergyVariant) -> PathBuf {
        self.work_dir.join(variant.events_file_name())
    }

    pub fn filtered_path(&self, variant: EnergyVariant) -> PathBuf {
        self.work_dir.join(variant.filtered_file_name())
    }

    pub fn exposure_path(&self) -> PathBuf {
        self.work_dir.join(EXPOSURE_FILE_NAME)
    }
}

/// The outputs of a fully prepared selection
#[derive(Debug, Clone)]
pub struct PreparedArtifacts {
    pub manifest_len: usize,
    pub link: LinkStatus,
    /// Time filtered event list per variant. The high-energy list is not used for the
    /// livetime cube but is kept for downstream analyses.
    pub events: Vec<(EnergyVariant, EventArtifact)>,
    pub exposure: ExposureArtifact,
}

#[derive(Debug)]
pub enum TagOutcome {
    Done(PreparedArtifacts),
    Skipped(CatalogError),
    Failed { stage: Stage, error: PipelineError },
}

/// Result of preparing one requested selection
#[derive(Debug)]
pub struct TagReport {
    pub tag: String,
    pub outcome: TagOutcome,
    pub elapsed: Duration,
}

impl TagReport {
    pub fn final_stage(&self) -> Stage {
        match self.outcome {
            TagOutcome::Done(_) => Stage::Done,
            _ => Stage::Failed,
        }
    }

    pub fn is_done(&self) -> bool {
        matches!(self.outcome, TagOutcome::Done(_))
    }
}

/// Reports for a batch, in the order the selections were requested
#[derive(Debug, Default)]
pub struct BatchSummary {
    pub reports: Vec<TagReport>,
}

impl BatchSummary {
    pub fn get(&self, tag: &str) -> Option<&TagReport> {
        self.reports.iter().find(|r| r.tag == tag)
    }

    pub fn n_done(&self) -> usize {
        self.reports.iter().filter(|r| r.is_done()).count()
    }

    /// True if any selection was skipped or failed
    pub fn has_failures(&self) -> bool {
        self.reports.iter().any(|r| !r.is_done())
    }

    /// Print the pass/fail table
    pub fn log(&self) {
        log::info!("*** SUMMARY ***");
        for report in self.reports.iter() {
            match &report.outcome {
                TagOutcome::Done(_) => log::info!(
                    "{:.<20} done in {} s",
                    report.tag,
                    report.elapsed.as_secs()
                ),
                TagOutcome::Skipped(e) => log::warn!("{:.<20} skipped: {e}", report.tag),
                TagOutcome::Failed { stage, error } => {
                    log::error!("{:.<20} FAILED while {stage}: {error}", report.tag)
                }
            }
        }
        log::info!(
            "{} of {} selections prepared.",
            self.n_done(),
            self.reports.len()
        );
    }
}

/// Which stages of a selection may be skipped on resume, and the record of what is done
struct ResumeState {
    checkpoint: Checkpoint,
    path: PathBuf,
    resuming: bool,
}

impl ResumeState {
    fn start(ctx: &TagContext, resume: bool) -> Self {
        let checkpoint = if resume {
            match Checkpoint::load_for(&ctx.checkpoint_path, &ctx.selection) {
                Ok(c) => c,
                Err(e) => {
                    log::warn!("Could not read checkpoint, starting over: {e}");
                    Checkpoint::new(&ctx.selection)
                }
            }
        } else {
            Checkpoint::new(&ctx.selection)
        };
        let state = Self {
            checkpoint,
            path: ctx.checkpoint_path.clone(),
            resuming: resume,
        };
        if !resume {
            state.save();
        }
        state
    }

    /// A stage is skipped only if every stage before it was skipped too
    fn can_skip(&self, step: CompletedStage, output: &Path) -> bool {
        self.resuming && self.checkpoint.is_complete(step) && output.exists()
    }

    /// Call before a stage's tool runs. Forgets this stage and every later one.
    fn begin(&mut self, step: CompletedStage) {
        self.resuming = false;
        self.checkpoint.invalidate_from(step);
        self.save();
    }

    fn record(&mut self, step: CompletedStage) {
        self.checkpoint.mark(step);
        self.save();
    }

    fn save(&self) {
        if let Err(e) = self.checkpoint.save(&self.path) {
            log::warn!("Could not write checkpoint {}: {e}", self.path.display());
        }
    }
}

/// PreparationPipeline turns selection tags into prepared data directories.
///
/// For each selection: resolve the number of weeks, write the weekly file manifest, link the
/// spacecraft file, make the base and high-energy event lists (select then time filter) and
/// finally the livetime cube. A failure only ends the selection it happened in.
pub struct PreparationPipeline<A: AnalysisStageAdapter> {
    config: Config,
    catalog: SelectionCatalog,
    adapter: A,
    linker: InstrumentStateLinker,
}

impl<A: AnalysisStageAdapter> PreparationPipeline<A> {
    pub fn new(config: Config, catalog: SelectionCatalog, adapter: A) -> Self {
        Self {
            config,
            catalog,
            adapter,
            linker: InstrumentStateLinker,
        }
    }

    pub fn adapter(&self) -> &A {
        &self.adapter
    }

    /// Prepare the selections one after the other on this thread
    pub fn run(&self, tags: &[String]) -> BatchSummary {
        let (tx, _rx) = mpsc::channel::<WorkerStatus>();
        self.run_workers(tags, 1, &tx)
    }

    /// Prepare the selections using up to `n_workers` threads.
    ///
    /// Selections are dealt out to the workers round-robin. Status updates are sent on `tx`.
    /// The returned reports are in the requested order regardless of which worker ran them.
    pub fn run_workers(
        &self,
        tags: &[String],
        n_workers: usize,
        tx: &Sender<WorkerStatus>,
    ) -> BatchSummary {
        if n_workers <= 1 || tags.len() <= 1 {
            let subset = tags.iter().cloned().enumerate().collect();
            let reports = self.process_subset(subset, tx, 0);
            return BatchSummary {
                reports: reports.into_iter().map(|(_, r)| r).collect(),
            };
        }

        let subsets = create_subsets(tags, n_workers);
        let mut reports: Vec<(usize, TagReport)> = std::thread::scope(|scope| {
            let handles: Vec<_> = subsets
                .into_iter()
                .enumerate()
                .filter(|(_, subset)| !subset.is_empty()) // Dont make empty workers
                .map(|(worker_id, subset)| {
                    let tx = tx.clone();
                    scope.spawn(move || self.process_subset(subset, &tx, worker_id))
                })
                .collect();
            handles
                .into_iter()
                .flat_map(|handle| match handle.join() {
                    Ok(reports) => reports,
                    Err(_) => {
                        log::error!("An error occured joining one of the workers!");
                        Vec::new()
                    }
                })
                .collect()
        });
        reports.sort_by_key(|(idx, _)| *idx);

        BatchSummary {
            reports: reports.into_iter().map(|(_, r)| r).collect(),
        }
    }

    /// Process a subset of selections. Each entry carries its position in the original request.
    pub fn process_subset(
        &self,
        subset: Vec<(usize, String)>,
        tx: &Sender<WorkerStatus>,
        worker_id: usize,
    ) -> Vec<(usize, TagReport)> {
        subset
            .into_iter()
            .map(|(idx, tag)| (idx, self.process_tag(&tag, tx, worker_id)))
            .collect()
    }

    /// Prepare a single selection. Never panics or returns early on failure; the outcome is
    /// in the report.
    pub fn process_tag(
        &self,
        tag: &str,
        tx: &Sender<WorkerStatus>,
        worker_id: usize,
    ) -> TagReport {
        let start = Instant::now();
        let mut stage = Stage::Idle;
        log::info!("Processing selection {tag}...");

        let outcome = match self.prepare(tag, &mut stage, tx, worker_id) {
            Ok(artifacts) => {
                log::info!("Finished processing selection {tag}.");
                TagOutcome::Done(artifacts)
            }
            Err(PipelineError::Catalog(e)) => {
                log::warn!("{e}. Skipping.");
                TagOutcome::Skipped(e)
            }
            Err(error) => {
                log::error!("Selection {tag} failed while {stage}: {error}");
                TagOutcome::Failed { stage, error }
            }
        };

        let report = TagReport {
            tag: tag.to_string(),
            outcome,
            elapsed: start.elapsed(),
        };
        send_status(tx, WorkerStatus::new(tag, worker_id, report.final_stage()));
        report
    }

    fn prepare(
        &self,
        tag: &str,
        stage: &mut Stage,
        tx: &Sender<WorkerStatus>,
        worker_id: usize,
    ) -> Result<PreparedArtifacts, PipelineError> {
        let mut enter = |next: Stage| {
            *stage = next;
            send_status(tx, WorkerStatus::new(tag, worker_id, next));
        };

        enter(Stage::ResolvingSelection);
        let selection = self.catalog.resolve(tag)?;
        let ctx = TagContext::new(&self.config, selection)?;

        enter(Stage::BuildingManifest);
        if !ctx.work_dir.is_dir() {
            return Err(PipelineError::MissingWorkDir(ctx.work_dir.clone()));
        }
        log::info!("WORKDIR: {}", ctx.work_dir.display());
        let mut resume = ResumeState::start(&ctx, self.config.resume);
        let manifest = self.write_manifest(&ctx, &mut resume)?;

        enter(Stage::LinkingInstrumentState);
        let link = self
            .linker
            .ensure(&ctx.spacecraft_file, &ctx.alias_path);
        match &link {
            LinkStatus::Created => log::info!("Linked {}", ctx.alias_path.display()),
            LinkStatus::AlreadyPresent => {
                log::info!("{} exists already, not linking", ctx.alias_path.display())
            }
            LinkStatus::Failed(reason) => {
                log::warn!("Could not create spacecraft file link ({reason}); continuing")
            }
        }

        let mut events = Vec::with_capacity(EnergyVariant::ALL.len());
        for variant in EnergyVariant::ALL {
            enter(Stage::RunningVariant(variant));
            events.push((variant, self.make_event_list(&ctx, variant, &mut resume)?));
        }

        enter(Stage::AccumulatingExposure);
        let base_events = ctx.filtered_path(EnergyVariant::Base);
        let exposure = self.accumulate_exposure(&ctx, &base_events, &mut resume)?;

        Ok(PreparedArtifacts {
            manifest_len: manifest.len(),
            link,
            events,
            exposure,
        })
    }

    /// Select the weekly files for the selection and write them to the manifest file
    fn write_manifest(
        &self,
        ctx: &TagContext,
        resume: &mut ResumeState,
    ) -> Result<WeeklyFileManifest, PipelineError> {
        if resume.can_skip(CompletedStage::Manifest, &ctx.manifest_path) {
            log::info!(
                "Reusing manifest {} from the previous run",
                ctx.manifest_path.display()
            );
            return Ok(WeeklyFileManifest::read(&ctx.manifest_path)?);
        }

        resume.begin(CompletedStage::Manifest);
        let index = WeeklyFileIndex::new(&self.config.get_weekly_directory());
        let manifest = index.build(ctx.selection.n_weeks)?;
        log::debug!(
            "Writing {} with {:04} lines.",
            MANIFEST_FILE_NAME,
            manifest.len()
        );
        manifest.write(&ctx.manifest_path)?;
        log::info!(
            "Selected {} weekly files with total size: {}",
            manifest.len(),
            human_bytes::human_bytes(manifest.get_total_data_size() as f64)
        );
        if manifest.len() < ctx.selection.n_weeks as usize {
            log::warn!(
                "Selection {} asks for {} weeks but only {} are available",
                ctx.selection.name,
                ctx.selection.n_weeks,
                manifest.len()
            );
        }

        resume.checkpoint.manifest_len = manifest.len();
        resume.record(CompletedStage::Manifest);
        Ok(manifest)
    }

    /// Run select then time filter for one energy variant
    fn make_event_list(
        &self,
        ctx: &TagContext,
        variant: EnergyVariant,
        resume: &mut ResumeState,
    ) -> Result<EventArtifact, PipelineError> {
        let events_path = ctx.events_path(variant);
        let select_step = CompletedStage::Select(variant);
        if resume.can_skip(select_step, &events_path) {
            log::info!("{} already selected, skipping", events_path.display());
        } else {
            resume.begin(select_step);
            self.adapter.select(&SelectRequest {
                input_manifest: ctx.manifest_path.clone(),
                output: events_path.clone(),
                energy_min: variant.energy_min(),
                class_min: variant.class_min(),
            })?;
            resume.record(select_step);
        }

        let filtered_path = ctx.filtered_path(variant);
        let filter_step = CompletedStage::TimeFilter(variant);
        if resume.can_skip(filter_step, &filtered_path) {
            log::info!("{} already filtered, skipping", filtered_path.display());
            return Ok(EventArtifact {
                path: filtered_path,
            });
        }
        resume.begin(filter_step);
        let artifact = self.adapter.time_filter(&TimeFilterRequest {
            spacecraft: ctx.spacecraft_file.clone(),
            events: events_path,
            output: filtered_path,
        })?;
        resume.record(filter_step);
        Ok(artifact)
    }

    fn accumulate_exposure(
        &self,
        ctx: &TagContext,
        events: &Path,
        resume: &mut ResumeState,
    ) -> Result<ExposureArtifact, PipelineError> {
        let exposure_path = ctx.exposure_path();
        if resume.can_skip(CompletedStage::Exposure, &exposure_path) {
            log::info!("{} already accumulated, skipping", exposure_path.display());
            return Ok(ExposureArtifact {
                path: exposure_path,
            });
        }
        resume.begin(CompletedStage::Exposure);
        let artifact = self.adapter.accumulate_exposure(&ExposureRequest {
            events: events.to_path_buf(),
            spacecraft: ctx.alias_path.clone(),
            output: exposure_path,
        })?;
        resume.record(CompletedStage::Exposure);
        Ok(artifact)
    }
}

/// Status updates are best effort; nobody listening is not an error
fn send_status(tx: &Sender<WorkerStatus>, status: WorkerStatus) {
    if tx.send(status).is_err() {
        log::debug!("No receiver for worker status");
    }
}

/// Divide the selections into subsets (per thread/worker), keeping each one's request position
pub fn create_subsets(tags: &[String], n_workers: usize) -> Vec<Vec<(usize, String)>> {
    let mut subsets: Vec<Vec<(usize, String)>> = vec![Vec::new(); n_workers.max(1)];
    let n_subsets = subsets.len();

    for (idx, tag) in tags.iter().enumerate() {
        subsets[idx % n_subsets].push((idx, tag.clone()))
    }

    subsets
}
