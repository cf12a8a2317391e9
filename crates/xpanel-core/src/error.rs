//! Error types for the menu core.

use std::path::PathBuf;

use compact_str::CompactString;
use thiserror::Error;

use crate::input::Side;

/// Malformed or inconsistent menu configuration. Fatal at startup.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Failed to read a configuration file.
    #[error("failed to read {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Configuration file is not valid JSON for its schema.
    #[error("failed to parse {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    /// Two windows share a name.
    #[error("duplicate window '{0}'")]
    DuplicateWindow(CompactString),

    /// Two buttons share a name (including synthesized back buttons).
    #[error("duplicate button '{0}'")]
    DuplicateButton(CompactString),

    /// A button is owned by a window that does not exist.
    #[error("button '{button}' belongs to unknown window '{window}'")]
    UnknownOwner {
        button: CompactString,
        window: CompactString,
    },

    /// A button navigates to a window that does not exist.
    #[error("button '{button}' targets unknown window '{window}'")]
    UnknownTarget {
        button: CompactString,
        window: CompactString,
    },

    /// A window names a parent that does not exist.
    #[error("window '{window}' references unknown parent '{parent}'")]
    UnknownParent {
        window: CompactString,
        parent: CompactString,
    },

    /// Following parent links from this window loops back on itself.
    #[error("window '{0}' is part of a parent cycle")]
    ParentCycle(CompactString),

    /// The configured start window is not part of the menu.
    #[error("default window '{0}' is not defined")]
    UnknownDefaultWindow(CompactString),

    /// An error kind has no window to show it in.
    #[error("error window '{0}' is not defined")]
    MissingErrorWindow(&'static str),

    /// A button calls an action nobody registered.
    #[error("button '{button}' calls unknown action '{action}'")]
    UnknownAction {
        button: CompactString,
        action: CompactString,
    },
}

/// Failures reported by the robot, cameras or grippers.
#[derive(Debug, Error)]
pub enum HardwareError {
    /// The enable call itself failed.
    #[error("robot enable failed: {0}")]
    EnableFailed(String),

    /// Enable returned but the robot still reports disabled.
    #[error("robot reports disabled after enable")]
    NotEnabled,

    /// A camera could not be opened, closed or subscribed to.
    #[error("camera '{camera}': {message}")]
    Camera {
        camera: &'static str,
        message: String,
    },

    /// A gripper query or calibration failed.
    #[error("{side} gripper: {message}")]
    Gripper { side: Side, message: String },
}

/// An external command could not be spawned.
#[derive(Debug, Error)]
#[error("failed to launch '{command}': {source}")]
pub struct ProcessLaunchError {
    pub command: CompactString,
    #[source]
    pub source: std::io::Error,
}

/// Failures of the multi-stage calibration sequence.
#[derive(Debug, Error)]
pub enum CalibrationError {
    /// A calibration sub-step exited unsuccessfully or never started.
    #[error("calibration stage {stage} failed on {side} arm")]
    StepFailed { stage: u32, side: Side },

    /// The progress marker could not be read or written.
    #[error("calibration marker {path}: {source}")]
    Marker {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The progress marker exists but does not hold `stage <n>`.
    #[error("calibration marker {path} is malformed: {content:?}")]
    MalformedMarker { path: PathBuf, content: String },
}

/// Everything an action handler can fail with.
#[derive(Debug, Error)]
pub enum ActionError {
    #[error(transparent)]
    Hardware(#[from] HardwareError),

    #[error(transparent)]
    Launch(#[from] ProcessLaunchError),

    #[error(transparent)]
    Calibration(#[from] CalibrationError),
}
