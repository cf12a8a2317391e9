use compact_str::CompactString;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::warn;

use crate::render::Rect;

/// Daemon settings (settings.json)
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PanelSettings {
    /// Menu description consumed by the menu graph
    pub menu_config: PathBuf,
    /// Directory holding `<prefix>_<visual>.png` button artwork
    #[serde(skip_serializing_if = "Option::is_none")]
    pub assets_dir: Option<PathBuf>,
    /// Window shown at startup
    pub default_window: CompactString,
    /// Calibration progress marker
    pub calibration_marker: PathBuf,
    /// Where composited frames are written
    pub frame_output: PathBuf,
    /// Input socket override (defaults to the runtime dir)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub socket_path: Option<PathBuf>,

    pub redraw_interval_ms: u64,
    pub wheel_debounce_ms: u64,
    pub gripper_poll_ms: u64,

    /// Tag substrings terminated whenever examples are killed
    pub kill_patterns: Vec<CompactString>,
    /// Commands launched once at startup
    pub startup_commands: Vec<String>,
    pub cuff: CuffSettings,
    pub camera: CameraSettings,
    pub examples: ExampleCommands,
    pub hardware: HardwareCommands,
}

/// Gripper cuff controller kept alive in the background
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CuffSettings {
    pub command: String,
    pub tag: CompactString,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CameraSettings {
    pub resolution: (u32, u32),
    pub overlay: Rect,
    /// Directory where the camera bridge drops `<camera>.png` frames
    pub frames_dir: PathBuf,
    pub poll_ms: u64,
}

/// Demonstration programs behind the built-in actions. `{side}` is the
/// pressing navigator's arm.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ExampleCommands {
    pub springs: String,
    pub puppet: String,
    pub wobbler: String,
    pub record: String,
    pub action_server: String,
    pub playback: String,
    /// Head start given to the action server before playback connects
    pub playback_delay_ms: u64,
}

/// Shell templates backing the hardware bridge.
///
/// `{side}`, `{camera}`, `{width}` and `{height}` are substituted before running.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct HardwareCommands {
    pub enable: String,
    pub state: String,
    pub camera_open: String,
    pub camera_close: String,
    pub gripper_type: String,
    pub gripper_calibrate: String,
    pub calibrate_arm: String,
    pub tare: String,
}

impl Default for PanelSettings {
    fn default() -> Self {
        Self {
            menu_config: PathBuf::from("/usr/share/xpanel/config.json"),
            assets_dir: None,
            default_window: "demo_1".into(),
            calibration_marker: PathBuf::from("/var/tmp/hlr/calib.txt"),
            frame_output: std::env::temp_dir().join("xpanel/frame.png"),
            socket_path: None,
            redraw_interval_ms: 100,
            wheel_debounce_ms: 10,
            gripper_poll_ms: 500,
            kill_patterns: [
                "joint_torque",
                "wobbler",
                "puppet",
                "joint",
                "baxter_interface",
                "baxter_examples",
            ]
            .into_iter()
            .map(CompactString::from)
            .collect(),
            startup_commands: vec!["rosrun baxter_tools tuck_arms.py -u".to_string()],
            cuff: CuffSettings::default(),
            camera: CameraSettings::default(),
            examples: ExampleCommands::default(),
            hardware: HardwareCommands::default(),
        }
    }
}

impl Default for CuffSettings {
    fn default() -> Self {
        Self {
            command: "rosrun baxter_examples gripper_cuff_control.py".to_string(),
            tag: "gripper_cuff_control".into(),
        }
    }
}

impl Default for CameraSettings {
    fn default() -> Self {
        Self {
            resolution: (640, 400),
            overlay: Rect::new(205, 140, 640, 400),
            frames_dir: std::env::temp_dir().join("xpanel/cameras"),
            poll_ms: 50,
        }
    }
}

impl Default for ExampleCommands {
    fn default() -> Self {
        Self {
            springs: "rosrun baxter_examples joint_torque_springs.py -l {side}".to_string(),
            puppet: "rosrun baxter_examples joint_velocity_puppet.py -l {side}".to_string(),
            wobbler: "rosrun baxter_examples joint_velocity_wobbler.py".to_string(),
            record: "rosrun baxter_examples joint_recorder.py -f recording".to_string(),
            action_server: "rosrun baxter_interface joint_trajectory_action_server.py".to_string(),
            playback: "rosrun baxter_examples joint_trajectory_file_playback.py -f recording -l 0"
                .to_string(),
            playback_delay_ms: 1000,
        }
    }
}

impl ExampleCommands {
    pub fn playback_delay(&self) -> Duration {
        Duration::from_millis(self.playback_delay_ms)
    }
}

impl Default for HardwareCommands {
    fn default() -> Self {
        Self {
            enable: "rosrun baxter_tools enable_robot.py -e".to_string(),
            state: "rosrun baxter_tools enable_robot.py -s".to_string(),
            camera_open: "rosrun baxter_tools camera_control.py -o {camera}_camera -r {width}x{height}"
                .to_string(),
            camera_close: "rosrun baxter_tools camera_control.py -c {camera}_camera".to_string(),
            gripper_type: "rostopic echo -n 1 /robot/end_effector/{side}_gripper/properties/ui_type"
                .to_string(),
            gripper_calibrate: "rosrun baxter_examples gripper_calibrate.py -g {side}".to_string(),
            calibrate_arm: "rosrun baxter_tools calibrate_arm.py -l {side}".to_string(),
            tare: "rosrun baxter_tools tare.py -l {side}".to_string(),
        }
    }
}

impl PanelSettings {
    /// Load settings, falling back to defaults when the file is absent or unreadable
    pub fn load(path: &Path) -> Self {
        let Ok(data) = std::fs::read(path) else {
            return Self::default();
        };
        match serde_json::from_slice(&data) {
            Ok(settings) => settings,
            Err(e) => {
                warn!("Ignoring malformed settings {:?}: {}", path, e);
                Self::default()
            }
        }
    }

    pub fn save(&self, path: &Path) -> anyhow::Result<()> {
        let dir = path.parent().ok_or_else(|| anyhow::anyhow!("Invalid path"))?;
        std::fs::create_dir_all(dir)?;
        let data = serde_json::to_string_pretty(self)?;
        std::fs::write(path, data)?;
        Ok(())
    }

    pub fn redraw_interval(&self) -> Duration {
        Duration::from_millis(self.redraw_interval_ms)
    }

    pub fn wheel_debounce(&self) -> Duration {
        Duration::from_millis(self.wheel_debounce_ms)
    }

    pub fn gripper_poll(&self) -> Duration {
        Duration::from_millis(self.gripper_poll_ms)
    }
}
