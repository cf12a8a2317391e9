//! Core of the robot menu screen: the menu graph, wheel debouncing, the
//! navigation state machine, process supervision and frame composition.

pub mod calibration;
pub mod config;
pub mod error;
pub mod hardware;
pub mod input;
pub mod menu;
pub mod messages;
pub mod navigation;
pub mod render;
pub mod services;

#[cfg(test)]
mod testing;

pub use calibration::{Calibration, CalibrationMarker, CalibrationOutcome, StageCommands};
pub use config::{ConfigPaths, MenuConfig, PanelSettings};
pub use error::{ActionError, CalibrationError, ConfigError, HardwareError, ProcessLaunchError};
pub use hardware::{Gripper, GripperKind, GripperMonitor, Robot};
pub use input::{ScrollDirection, Side, WheelDebouncer};
pub use menu::MenuGraph;
pub use messages::{Control, ErrorKind, ExitMode, PanelEvent};
pub use navigation::{ActionRegistry, NavState, Navigator, NavigatorParts};
pub use render::{AssetStore, Compositor, Frame, FrameSink, Rect};
pub use services::{Camera, CameraFeed, CameraId, FeedSubscription, Peripherals, ProcessSupervisor};
