//! Command-backed implementations of the hardware seams.
//!
//! Every robot call is a shell template from `settings.hardware`; camera
//! frames arrive as PNG files dropped into a directory by whatever bridges
//! the robot's image topics.

use anyhow::Context;
use image::ImageFormat;
use parking_lot::Mutex;
use std::path::{Path, PathBuf};
use std::process::{Command, Output, Stdio};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, SystemTime};
use tracing::debug;

use xpanel_core::config::HardwareCommands;
use xpanel_core::hardware::{Gripper, GripperKind, Robot};
use xpanel_core::render::{Frame, FrameSink};
use xpanel_core::services::{Camera, CameraFeed, CameraId, FeedSubscription, FrameCallback};
use xpanel_core::{HardwareError, Side};

/// Run a command line to completion, capturing its output
fn run(command_line: &str) -> std::io::Result<Output> {
    debug!("Running '{}'", command_line);
    Command::new("sh")
        .args(["-c", command_line])
        .stdin(Stdio::null())
        .output()
}

fn failure_message(output: &Output) -> String {
    let stderr = String::from_utf8_lossy(&output.stderr);
    let stderr = stderr.trim();
    if stderr.is_empty() {
        output.status.to_string()
    } else {
        stderr.to_string()
    }
}

pub struct CommandRobot {
    commands: HardwareCommands,
}

impl CommandRobot {
    pub fn new(commands: HardwareCommands) -> Self {
        Self { commands }
    }
}

impl Robot for CommandRobot {
    fn enable(&mut self) -> Result<(), HardwareError> {
        let output =
            run(&self.commands.enable).map_err(|e| HardwareError::EnableFailed(e.to_string()))?;
        if output.status.success() {
            Ok(())
        } else {
            Err(HardwareError::EnableFailed(failure_message(&output)))
        }
    }

    fn is_enabled(&mut self) -> Result<bool, HardwareError> {
        let output =
            run(&self.commands.state).map_err(|e| HardwareError::EnableFailed(e.to_string()))?;
        if !output.status.success() {
            return Err(HardwareError::EnableFailed(failure_message(&output)));
        }
        Ok(parse_enabled(&String::from_utf8_lossy(&output.stdout)))
    }
}

/// Find `enabled: <bool>` in robot state output
fn parse_enabled(state: &str) -> bool {
    state
        .lines()
        .filter_map(|line| line.trim().strip_prefix("enabled:"))
        .any(|value| value.trim().eq_ignore_ascii_case("true"))
}

pub struct CommandGripper {
    side: Side,
    commands: HardwareCommands,
}

impl CommandGripper {
    pub fn new(side: Side, commands: HardwareCommands) -> Self {
        Self { side, commands }
    }

    fn expand(&self, template: &str) -> String {
        template.replace("{side}", self.side.name())
    }

    fn gripper_error(&self, message: impl Into<String>) -> HardwareError {
        HardwareError::Gripper {
            side: self.side,
            message: message.into(),
        }
    }
}

impl Gripper for CommandGripper {
    fn kind(&mut self) -> Result<GripperKind, HardwareError> {
        let output = run(&self.expand(&self.commands.gripper_type))
            .map_err(|e| self.gripper_error(e.to_string()))?;
        if !output.status.success() {
            return Err(self.gripper_error(failure_message(&output)));
        }
        let stdout = String::from_utf8_lossy(&output.stdout);
        let value = stdout
            .split_whitespace()
            .rev()
            .find(|token| *token != "---")
            .unwrap_or_default()
            .trim_matches(|c| c == '"' || c == '\'');
        Ok(GripperKind::from_str(value))
    }

    fn calibrate(&mut self) -> Result<(), HardwareError> {
        let output = run(&self.expand(&self.commands.gripper_calibrate))
            .map_err(|e| self.gripper_error(e.to_string()))?;
        if output.status.success() {
            Ok(())
        } else {
            Err(self.gripper_error(failure_message(&output)))
        }
    }
}

pub struct CommandCamera {
    camera: CameraId,
    commands: HardwareCommands,
}

impl CommandCamera {
    pub fn new(camera: CameraId, commands: HardwareCommands) -> Self {
        Self { camera, commands }
    }

    fn run_template(&self, template: &str, resolution: (u32, u32)) -> Result<(), HardwareError> {
        let command_line = template
            .replace("{camera}", self.camera.name())
            .replace("{width}", &resolution.0.to_string())
            .replace("{height}", &resolution.1.to_string());
        let output = run(&command_line).map_err(|e| HardwareError::Camera {
            camera: self.camera.name(),
            message: e.to_string(),
        })?;
        if output.status.success() {
            Ok(())
        } else {
            Err(HardwareError::Camera {
                camera: self.camera.name(),
                message: failure_message(&output),
            })
        }
    }
}

impl Camera for CommandCamera {
    fn open(&mut self, resolution: (u32, u32)) -> Result<(), HardwareError> {
        self.run_template(&self.commands.camera_open, resolution)
    }

    fn close(&mut self) -> Result<(), HardwareError> {
        self.run_template(&self.commands.camera_close, (0, 0))
    }
}

/// Watches `<dir>/<camera>.png` and delivers every new version
pub struct FileCameraFeed {
    dir: PathBuf,
    poll: Duration,
}

impl FileCameraFeed {
    pub fn new(dir: PathBuf, poll: Duration) -> Self {
        Self { dir, poll }
    }
}

impl CameraFeed for FileCameraFeed {
    fn subscribe(
        &mut self,
        camera: CameraId,
        on_frame: FrameCallback,
    ) -> Result<Box<dyn FeedSubscription>, HardwareError> {
        let path = self.dir.join(format!("{}.png", camera.name()));
        let stop = Arc::new(AtomicBool::new(false));
        let poll = self.poll;

        let thread_stop = stop.clone();
        std::thread::Builder::new()
            .name(format!("feed-{}", camera.name()))
            .spawn(move || watch_frames(&path, poll, &thread_stop, on_frame))
            .map_err(|e| HardwareError::Camera {
                camera: camera.name(),
                message: e.to_string(),
            })?;

        Ok(Box::new(FileSubscription { stop }))
    }
}

fn watch_frames(path: &Path, poll: Duration, stop: &AtomicBool, on_frame: FrameCallback) {
    let mut last_seen: Option<SystemTime> = None;

    while !stop.load(Ordering::Acquire) {
        let modified = std::fs::metadata(path).and_then(|m| m.modified()).ok();
        if modified.is_some() && modified != last_seen {
            last_seen = modified;
            match image::open(path) {
                Ok(image) => {
                    if !stop.load(Ordering::Acquire) {
                        on_frame(image.to_rgba8());
                    }
                }
                Err(e) => debug!("Skipping unreadable frame {:?}: {}", path, e),
            }
        }
        std::thread::sleep(poll);
    }
    debug!("Stopped watching {:?}", path);
}

struct FileSubscription {
    stop: Arc<AtomicBool>,
}

impl FeedSubscription for FileSubscription {
    fn unregister(&mut self) {
        self.stop.store(true, Ordering::Release);
    }
}

impl Drop for FileSubscription {
    fn drop(&mut self) {
        self.unregister();
    }
}

/// Writes each frame to a PNG file, replacing it atomically
pub struct PngFileSink {
    path: PathBuf,
    // Menu redraws and camera frames publish from different threads
    write_lock: Mutex<()>,
}

impl PngFileSink {
    pub fn new(path: PathBuf) -> Self {
        Self {
            path,
            write_lock: Mutex::new(()),
        }
    }
}

impl FrameSink for PngFileSink {
    fn publish(&self, frame: &Frame) -> anyhow::Result<()> {
        let _guard = self.write_lock.lock();
        if let Some(dir) = self.path.parent() {
            std::fs::create_dir_all(dir)
                .with_context(|| format!("Failed to create {:?}", dir))?;
        }

        let tmp = self.path.with_extension("png.tmp");
        frame
            .save_with_format(&tmp, ImageFormat::Png)
            .with_context(|| format!("Failed to write {:?}", tmp))?;
        std::fs::rename(&tmp, &self.path)
            .with_context(|| format!("Failed to replace {:?}", self.path))?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{ImageBuffer, Rgba};
    use std::sync::mpsc;

    #[test]
    fn test_parse_enabled() {
        assert!(parse_enabled("enabled: True\nstopped: False\n"));
        assert!(!parse_enabled("enabled: False\nstopped: True\n"));
        assert!(!parse_enabled(""));
    }

    #[test]
    fn test_robot_commands() {
        let mut commands = HardwareCommands::default();
        commands.enable = "true".to_string();
        commands.state = "echo 'enabled: True'".to_string();
        let mut robot = CommandRobot::new(commands.clone());
        assert!(robot.enable().is_ok());
        assert!(robot.is_enabled().unwrap());

        commands.enable = "echo 'e-stop' >&2; exit 1".to_string();
        let mut robot = CommandRobot::new(commands);
        match robot.enable() {
            Err(HardwareError::EnableFailed(message)) => assert_eq!(message, "e-stop"),
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_gripper_kind_from_command() {
        let mut commands = HardwareCommands::default();
        commands.gripper_type = "echo 'data: \"electric\"'; echo ---".to_string();
        let mut gripper = CommandGripper::new(Side::Left, commands);
        assert_eq!(gripper.kind().unwrap(), GripperKind::Electric);
    }

    #[test]
    fn test_png_sink_replaces_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out/frame.png");
        let sink = PngFileSink::new(path.clone());

        let frame: Frame = ImageBuffer::from_pixel(4, 4, Rgba([1, 2, 3, 255]));
        sink.publish(&frame).unwrap();
        sink.publish(&frame).unwrap();

        let written = image::open(&path).unwrap().to_rgba8();
        assert_eq!(*written.get_pixel(0, 0), Rgba([1, 2, 3, 255]));
        assert!(!path.with_extension("png.tmp").exists());
    }

    #[test]
    fn test_file_feed_delivers_until_unregistered() {
        let dir = tempfile::tempdir().unwrap();
        let frame: Frame = ImageBuffer::from_pixel(2, 2, Rgba([9, 9, 9, 255]));
        frame.save(dir.path().join("head.png")).unwrap();

        let (tx, rx) = mpsc::channel();
        let tx = Mutex::new(tx);
        let mut feed = FileCameraFeed::new(dir.path().to_path_buf(), Duration::from_millis(5));
        let mut subscription = feed
            .subscribe(
                CameraId::Head,
                Box::new(move |frame| {
                    let _ = tx.lock().send(frame);
                }),
            )
            .unwrap();

        let received = rx.recv_timeout(Duration::from_secs(2)).unwrap();
        assert_eq!(*received.get_pixel(1, 1), Rgba([9, 9, 9, 255]));
        subscription.unregister();
        subscription.unregister();
    }
}
