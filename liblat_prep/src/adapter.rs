use std::fmt::Display;
use std::fs::File;
use std::io::Read;
use std::path::{Path, PathBuf};
use std::process::{Child, Command, ExitStatus, Stdio};
use std::time::{Duration, Instant};

use super::config::{Config, ToolPaths};
use super::constants::{
    ENERGY_MAX, GTI_FILTER, LTCUBE_BINSZ, LTCUBE_DCOSTHETA, TOOL_CHATTER, TOOL_POLL_INTERVAL_MS,
    ZENITH_MAX,
};
use super::error::StageError;

/// The three external analysis operations
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ToolStage {
    Select,
    TimeFilter,
    Exposure,
}

impl Display for ToolStage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Select => write!(f, "Event selection"),
            Self::TimeFilter => write!(f, "Time filter"),
            Self::Exposure => write!(f, "Exposure accumulation"),
        }
    }
}

/// An event list produced by the select or time filter stage
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EventArtifact {
    pub path: PathBuf,
}

/// A livetime cube produced by the exposure stage
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExposureArtifact {
    pub path: PathBuf,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SelectRequest {
    pub input_manifest: PathBuf,
    pub output: PathBuf,
    pub energy_min: f64,
    pub class_min: u32,
}

#[derive(Debug, Clone, PartialEq)]
pub struct TimeFilterRequest {
    pub spacecraft: PathBuf,
    pub events: PathBuf,
    pub output: PathBuf,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ExposureRequest {
    pub events: PathBuf,
    pub spacecraft: PathBuf,
    pub output: PathBuf,
}

impl SelectRequest {
    fn to_args(&self) -> Vec<String> {
        vec![
            format!("infile=@{}", self.input_manifest.display()),
            format!("outfile={}", self.output.display()),
            String::from("ra=INDEF"),
            String::from("dec=INDEF"),
            String::from("rad=INDEF"),
            String::from("tmin=INDEF"),
            String::from("tmax=INDEF"),
            format!("emin={}", self.energy_min),
            format!("emax={ENERGY_MAX}"),
            format!("zmax={ZENITH_MAX}"),
            format!("evclsmin={}", self.class_min),
            format!("chatter={TOOL_CHATTER}"),
        ]
    }
}

impl TimeFilterRequest {
    fn to_args(&self) -> Vec<String> {
        vec![
            format!("scfile={}", self.spacecraft.display()),
            format!("filter={GTI_FILTER}"),
            String::from("roicut=no"),
            format!("evfile={}", self.events.display()),
            format!("outfile={}", self.output.display()),
            format!("chatter={TOOL_CHATTER}"),
        ]
    }
}

impl ExposureRequest {
    fn to_args(&self) -> Vec<String> {
        vec![
            format!("evfile={}", self.events.display()),
            format!("scfile={}", self.spacecraft.display()),
            format!("outfile={}", self.output.display()),
            format!("dcostheta={LTCUBE_DCOSTHETA}"),
            format!("binsz={LTCUBE_BINSZ}"),
            format!("chatter={TOOL_CHATTER}"),
        ]
    }
}

/// The boundary between the pipeline and the science tools.
///
/// Every call blocks until the operation is complete. Implementations do not retry; a failed
/// call is reported as a StageError carrying the stage and its parameters. Calls are safe to
/// repeat with the same request.
pub trait AnalysisStageAdapter: Send + Sync {
    /// Keep events above a minimum energy and event class
    fn select(&self, request: &SelectRequest) -> Result<EventArtifact, StageError>;

    /// Keep events inside the good time intervals of the spacecraft file
    fn time_filter(&self, request: &TimeFilterRequest) -> Result<EventArtifact, StageError>;

    /// Integrate the livetime of the instrument. Can take hours.
    fn accumulate_exposure(
        &self,
        request: &ExposureRequest,
    ) -> Result<ExposureArtifact, StageError>;
}

/// Runs the command line science tools (gtselect, gtmktime, gtltcube) as child processes.
///
/// Tool stdout is kept next to the output as `<output stem>.log`. Stderr is captured and
/// attached to the error if the tool fails.
#[derive(Debug, Clone)]
pub struct ScienceToolsAdapter {
    tools: ToolPaths,
    timeout: Option<Duration>,
}

impl ScienceToolsAdapter {
    pub fn new(tools: ToolPaths, timeout: Option<Duration>) -> Self {
        Self { tools, timeout }
    }

    pub fn from_config(config: &Config) -> Self {
        Self::new(config.tools.clone(), config.get_stage_timeout())
    }

    fn run_tool(
        &self,
        stage: ToolStage,
        program: &Path,
        args: Vec<String>,
        output: &Path,
    ) -> Result<(), StageError> {
        let params = args.join(" ");
        log::info!("Running {} {}", program.display(), params);

        let launch_error = |source: std::io::Error| StageError::Launch {
            stage,
            program: program.display().to_string(),
            source,
        };
        let tool_log = File::create(output.with_extension("log")).map_err(launch_error)?;
        let mut command = Command::new(program);
        command
            .args(&args)
            .stdin(Stdio::null())
            .stdout(Stdio::from(tool_log))
            .stderr(Stdio::piped());
        // Relative arguments are resolved from our own directory, so only move the tool
        // next to its output when the output path is absolute
        if let Some(parent) = output.parent().filter(|p| p.is_absolute()) {
            command.current_dir(parent);
        }
        let mut child = command.spawn().map_err(launch_error)?;

        // Drain stderr on the side so a chatty tool can't block on a full pipe
        let stderr_reader = child.stderr.take().map(|mut pipe| {
            std::thread::spawn(move || {
                let mut buffer = String::new();
                let _ = pipe.read_to_string(&mut buffer);
                buffer
            })
        });

        let status = self.wait(stage, &mut child, &params);
        let stderr = stderr_reader
            .and_then(|handle| handle.join().ok())
            .unwrap_or_default();
        let status = status?;

        if !status.success() {
            return Err(StageError::ToolFailed {
                stage,
                params,
                status: status.to_string(),
                stderr: stderr.trim().to_string(),
            });
        }
        if !output.exists() {
            return Err(StageError::MissingOutput {
                stage,
                path: output.to_path_buf(),
            });
        }
        Ok(())
    }

    /// Wait on the child, killing it if the stage timeout is exceeded
    fn wait(
        &self,
        stage: ToolStage,
        child: &mut Child,
        params: &str,
    ) -> Result<ExitStatus, StageError> {
        let io_error = |source: std::io::Error| StageError::IOError { stage, source };
        let timeout = match self.timeout {
            Some(t) => t,
            None => return child.wait().map_err(io_error),
        };

        let start = Instant::now();
        loop {
            if let Some(status) = child.try_wait().map_err(io_error)? {
                return Ok(status);
            }
            if start.elapsed() >= timeout {
                log::error!("{stage} exceeded its {} s timeout, killing it", timeout.as_secs());
                let _ = child.kill();
                let _ = child.wait();
                return Err(StageError::TimedOut {
                    stage,
                    params: params.to_string(),
                    timeout_secs: timeout.as_secs(),
                });
            }
            std::thread::sleep(Duration::from_millis(TOOL_POLL_INTERVAL_MS));
        }
    }
}

impl AnalysisStageAdapter for ScienceToolsAdapter {
    fn select(&self, request: &SelectRequest) -> Result<EventArtifact, StageError> {
        self.run_tool(
            ToolStage::Select,
            &self.tools.select,
            request.to_args(),
            &request.output,
        )?;
        Ok(EventArtifact {
            path: request.output.clone(),
        })
    }

    fn time_filter(&self, request: &TimeFilterRequest) -> Result<EventArtifact, StageError> {
        self.run_tool(
            ToolStage::TimeFilter,
            &self.tools.time_filter,
            request.to_args(),
            &request.output,
        )?;
        Ok(EventArtifact {
            path: request.output.clone(),
        })
    }

    fn accumulate_exposure(
        &self,
        request: &ExposureRequest,
    ) -> Result<ExposureArtifact, StageError> {
        self.run_tool(
            ToolStage::Exposure,
            &self.tools.exposure,
            request.to_args(),
            &request.output,
        )?;
        Ok(ExposureArtifact {
            path: request.output.clone(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_select_arguments() {
        let request = SelectRequest {
            input_manifest: PathBuf::from("/data/month/weeks.lis"),
            output: PathBuf::from("/data/month/photon_1000.fits"),
            energy_min: 1000.0,
            class_min: 3,
        };
        let args = request.to_args();
        assert_eq!(args[0], "infile=@/data/month/weeks.lis");
        assert_eq!(args[1], "outfile=/data/month/photon_1000.fits");
        assert!(args.contains(&String::from("emin=1000")));
        assert!(args.contains(&String::from("evclsmin=3")));
    }

    #[test]
    fn test_time_filter_and_exposure_arguments() {
        let filter = TimeFilterRequest {
            spacecraft: PathBuf::from("/dl/sc.fits"),
            events: PathBuf::from("photon.fits"),
            output: PathBuf::from("photon_gti.fits"),
        };
        let args = filter.to_args();
        assert!(args.contains(&String::from("scfile=/dl/sc.fits")));
        assert!(args.contains(&String::from("filter=DATA_QUAL==1")));
        assert!(args.contains(&String::from("evfile=photon.fits")));

        let exposure = ExposureRequest {
            events: PathBuf::from("photon_gti.fits"),
            spacecraft: PathBuf::from("spacecraft.fits"),
            output: PathBuf::from("ltcube.fits"),
        };
        let args = exposure.to_args();
        assert_eq!(args[0], "evfile=photon_gti.fits");
        assert_eq!(args[1], "scfile=spacecraft.fits");
        assert_eq!(args[2], "outfile=ltcube.fits");
    }

    #[cfg(target_family = "unix")]
    fn write_script(dir: &Path, name: &str, body: &str) -> PathBuf {
        use std::os::unix::fs::PermissionsExt;
        let path = dir.join(name);
        std::fs::write(&path, format!("#!/bin/sh\n{body}\n")).unwrap();
        std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o755)).unwrap();
        path
    }

    // Process based checks live in one test so the scripts are never exec'd while another
    // test thread is still writing them
    #[cfg(target_family = "unix")]
    #[test]
    fn test_tool_invocations() {
        let dir = tempfile::tempdir().unwrap();
        let touch_outfile = write_script(
            dir.path(),
            "fake_tool",
            "for arg in \"$@\"; do case \"$arg\" in outfile=*) : > \"${arg#outfile=}\";; esac; done",
        );
        let failing = write_script(dir.path(), "failing_tool", "echo bad emin >&2\nexit 3");
        let silent = write_script(dir.path(), "silent_tool", "exit 0");
        let slow = write_script(dir.path(), "slow_tool", "exec sleep 5");

        let request = ExposureRequest {
            events: dir.path().join("photon_gti.fits"),
            spacecraft: dir.path().join("spacecraft.fits"),
            output: dir.path().join("ltcube.fits"),
        };
        let tools = |exposure: &Path| ToolPaths {
            exposure: exposure.to_path_buf(),
            ..Default::default()
        };

        // Success
        let adapter = ScienceToolsAdapter::new(tools(&touch_outfile), None);
        let artifact = adapter.accumulate_exposure(&request).unwrap();
        assert_eq!(artifact.path, request.output);
        assert!(request.output.exists());
        assert!(dir.path().join("ltcube.log").exists());

        // Non-zero exit keeps stage, parameters and stderr
        let adapter = ScienceToolsAdapter::new(tools(&failing), None);
        match adapter.accumulate_exposure(&request) {
            Err(StageError::ToolFailed {
                stage,
                params,
                stderr,
                ..
            }) => {
                assert_eq!(stage, ToolStage::Exposure);
                assert!(params.contains("outfile="));
                assert_eq!(stderr, "bad emin");
            }
            other => panic!("unexpected result {other:?}"),
        }

        // Zero exit but nothing written
        std::fs::remove_file(&request.output).unwrap();
        let adapter = ScienceToolsAdapter::new(tools(&silent), None);
        assert!(matches!(
            adapter.accumulate_exposure(&request),
            Err(StageError::MissingOutput { .. })
        ));

        // Not installed
        let adapter = ScienceToolsAdapter::new(tools(&dir.path().join("not_a_tool")), None);
        assert!(matches!(
            adapter.accumulate_exposure(&request),
            Err(StageError::Launch { .. })
        ));

        // Timeout
        let adapter = ScienceToolsAdapter::new(tools(&slow), Some(Duration::from_secs(1)));
        let start = Instant::now();
        assert!(matches!(
            adapter.accumulate_exposure(&request),
            Err(StageError::TimedOut { timeout_secs: 1, .. })
        ));
        assert!(start.elapsed() < Duration::from_secs(5));
    }
}
