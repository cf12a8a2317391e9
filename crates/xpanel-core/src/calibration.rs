//! Multi-stage arm calibration that survives the reboot between stages.
//!
//! Progress lives in a marker file holding `stage <n>`. Each stage writes the
//! *next* stage number before running, then asks for a reboot; on the next
//! start the marker is read back and the sequence resumes.

use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

use crate::error::CalibrationError;
use crate::input::Side;
use crate::services::ProcessSupervisor;

/// Stage number at which the sequence is complete
pub const FINAL_STAGE: u32 = 2;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CalibrationStage {
    /// Full joint calibration
    Arm,
    /// Torque sensor tare
    Tare,
}

impl CalibrationStage {
    pub fn from_number(stage: u32) -> Option<Self> {
        match stage {
            0 => Some(Self::Arm),
            1 => Some(Self::Tare),
            _ => None,
        }
    }

    pub fn number(self) -> u32 {
        match self {
            Self::Arm => 0,
            Self::Tare => 1,
        }
    }
}

/// Per-stage command templates; `{side}` is replaced with the arm name
#[derive(Debug, Clone)]
pub struct StageCommands {
    pub arm: String,
    pub tare: String,
}

impl StageCommands {
    pub fn command(&self, stage: CalibrationStage, side: Side) -> String {
        let template = match stage {
            CalibrationStage::Arm => &self.arm,
            CalibrationStage::Tare => &self.tare,
        };
        template.replace("{side}", side.name())
    }
}

impl Default for StageCommands {
    fn default() -> Self {
        Self {
            arm: "rosrun baxter_tools calibrate_arm.py -l {side}".to_string(),
            tare: "rosrun baxter_tools tare.py -l {side}".to_string(),
        }
    }
}

/// What a stage number read at startup asks for
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CalibrationPlan {
    Run(CalibrationStage),
    Cleanup,
}

impl CalibrationPlan {
    pub fn for_stage(stage: u32) -> Self {
        CalibrationStage::from_number(stage)
            .map(Self::Run)
            .unwrap_or(Self::Cleanup)
    }
}

/// Result of running or resuming calibration
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CalibrationOutcome {
    /// Nothing was in progress
    Idle,
    /// A stage finished; reboot to continue with the next one
    RebootRequired,
    /// The final marker was found and removed
    Finished,
}

/// Persisted `stage <n>` marker
#[derive(Debug, Clone)]
pub struct CalibrationMarker {
    path: PathBuf,
}

impl CalibrationMarker {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Stage in progress, or `None` when no marker exists
    pub fn read(&self) -> Result<Option<u32>, CalibrationError> {
        let content = match std::fs::read_to_string(&self.path) {
            Ok(content) => content,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
            Err(source) => {
                return Err(CalibrationError::Marker {
                    path: self.path.clone(),
                    source,
                })
            }
        };

        let stage = content
            .split_whitespace()
            .nth(1)
            .and_then(|n| n.parse().ok())
            .ok_or_else(|| CalibrationError::MalformedMarker {
                path: self.path.clone(),
                content: content.clone(),
            })?;
        Ok(Some(stage))
    }

    pub fn write(&self, stage: u32) -> Result<(), CalibrationError> {
        let marker_err = |source| CalibrationError::Marker {
            path: self.path.clone(),
            source,
        };
        if let Some(dir) = self.path.parent() {
            std::fs::create_dir_all(dir).map_err(marker_err)?;
        }
        std::fs::write(&self.path, format!("stage {}", stage)).map_err(marker_err)
    }

    /// Remove the marker; a missing marker is fine
    pub fn clear(&self) -> Result<(), CalibrationError> {
        match std::fs::remove_file(&self.path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(source) => Err(CalibrationError::Marker {
                path: self.path.clone(),
                source,
            }),
        }
    }
}

/// Drives calibration stages through the process supervisor
#[derive(Debug, Clone)]
pub struct Calibration {
    marker: CalibrationMarker,
    commands: StageCommands,
}

impl Calibration {
    pub fn new(marker: CalibrationMarker, commands: StageCommands) -> Self {
        Self { marker, commands }
    }

    pub fn marker(&self) -> &CalibrationMarker {
        &self.marker
    }

    /// Continue whatever the marker says is in progress
    pub fn resume(&self, supervisor: &ProcessSupervisor) -> Result<CalibrationOutcome, CalibrationError> {
        match self.marker.read() {
            Ok(Some(stage)) => {
                info!("Resuming calibration at stage {}", stage);
                self.run(stage, supervisor)
            }
            Ok(None) => Ok(CalibrationOutcome::Idle),
            Err(CalibrationError::MalformedMarker { path, content }) => {
                warn!("Discarding malformed calibration marker {:?}: {:?}", path, content);
                self.marker.clear()?;
                Ok(CalibrationOutcome::Idle)
            }
            Err(e) => Err(e),
        }
    }

    /// Run `stage` on both arms, or clean up when past the final stage
    pub fn run(&self, stage: u32, supervisor: &ProcessSupervisor) -> Result<CalibrationOutcome, CalibrationError> {
        let stage = match CalibrationPlan::for_stage(stage) {
            CalibrationPlan::Run(stage) => stage,
            CalibrationPlan::Cleanup => {
                info!("Calibration complete, removing marker");
                self.marker.clear()?;
                return Ok(CalibrationOutcome::Finished);
            }
        };

        self.marker.write(stage.number() + 1)?;

        for side in [Side::Left, Side::Right] {
            let command = self.commands.command(stage, side);
            let ok = match supervisor.run_to_completion(&command) {
                Ok(status) => status.success(),
                Err(e) => {
                    warn!("{}", e);
                    false
                }
            };
            if !ok {
                self.marker.clear()?;
                return Err(CalibrationError::StepFailed {
                    stage: stage.number(),
                    side,
                });
            }
        }

        info!("Calibration stage {} done, rebooting", stage.number());
        Ok(CalibrationOutcome::RebootRequired)
    }
}
