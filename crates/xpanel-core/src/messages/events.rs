use crate::input::{ScrollDirection, Side};

/// Fault conditions that take over the screen
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// Robot could not be enabled (e-stop, fault)
    Stopped,
    /// Enable returned but the robot stayed disabled
    NoEnable,
    /// A calibration step failed
    Calibration,
}

impl ErrorKind {
    pub const ALL: [ErrorKind; 3] = [Self::Stopped, Self::NoEnable, Self::Calibration];

    /// Parse from string (for IPC commands)
    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "stopped" => Some(Self::Stopped),
            "no_enable" | "no-enable" => Some(Self::NoEnable),
            "calib_error" | "calibration" => Some(Self::Calibration),
            _ => None,
        }
    }

    /// Window that displays this error
    pub fn window_name(&self) -> &'static str {
        match self {
            Self::Stopped => "stopped",
            Self::NoEnable => "no_enable",
            Self::Calibration => "calib_error",
        }
    }
}

/// Everything the navigator reacts to, serialized onto one dispatcher
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PanelEvent {
    // =========== Navigator Input ===========

    /// Wheel button pressed
    Press(Side),

    /// Raw wheel reading, debounced into a scroll
    Wheel { side: Side, value: i32 },

    /// Already debounced scroll
    Scroll(Side, ScrollDirection),

    /// Back button pressed
    Back(Side),

    // =========== Robot State ===========

    /// Robot enable state may have changed
    HardwareEnableChanged,

    /// Show an error window
    ErrorRaised(ErrorKind),

    /// Periodic gripper poll
    GripperTick,

    // =========== Lifecycle ===========

    /// Stop everything before the daemon exits
    Shutdown,
}
