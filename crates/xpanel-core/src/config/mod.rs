mod menu;
mod paths;
mod settings;

pub use menu::{BackConfig, ButtonConfig, MenuConfig, WindowConfig};
pub use paths::ConfigPaths;
pub use settings::{CameraSettings, CuffSettings, ExampleCommands, HardwareCommands, PanelSettings};
