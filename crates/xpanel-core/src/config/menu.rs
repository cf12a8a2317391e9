use compact_str::CompactString;
use serde::{Deserialize, Deserializer};
use std::path::Path;

use crate::error::ConfigError;

/// Menu description (config.json) - windows and the buttons placed on them
#[derive(Debug, Clone, Default, Deserialize)]
pub struct MenuConfig {
    #[serde(rename = "Windows", default)]
    pub windows: Vec<WindowConfig>,
    #[serde(rename = "Buttons", default)]
    pub buttons: Vec<ButtonConfig>,
}

/// A single window descriptor
#[derive(Debug, Clone, Deserialize)]
pub struct WindowConfig {
    pub name: CompactString,
    #[serde(default, deserialize_with = "empty_as_none")]
    pub parent: Option<CompactString>,
    /// Geometry of the synthetic back button, if the window has one
    #[serde(default)]
    pub back: Option<BackConfig>,
    #[serde(default, rename = "noScroll", alias = "no_scroll")]
    pub no_scroll: bool,
}

#[derive(Debug, Clone, Copy, Deserialize)]
pub struct BackConfig {
    pub size: (u32, u32),
    pub offset: (i32, i32),
}

/// A single button descriptor
#[derive(Debug, Clone, Deserialize)]
pub struct ButtonConfig {
    pub name: CompactString,
    pub size: (u32, u32),
    pub offset: (i32, i32),
    #[serde(default)]
    pub index: i32,
    #[serde(default)]
    pub image_prefix: CompactString,
    #[serde(default)]
    pub inner: bool,
    pub window: CompactString,
    #[serde(rename = "nextWindow")]
    pub next_window: CompactString,
    #[serde(default, deserialize_with = "empty_as_none")]
    pub function: Option<CompactString>,
    #[serde(default = "default_true")]
    pub selectable: bool,
}

fn default_true() -> bool {
    true
}

/// Treat `null`, a missing key and `""` the same way
fn empty_as_none<'de, D>(deserializer: D) -> Result<Option<CompactString>, D::Error>
where
    D: Deserializer<'de>,
{
    let value: Option<CompactString> = Option::deserialize(deserializer)?;
    Ok(value.filter(|s| !s.trim().is_empty()))
}

impl MenuConfig {
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let data = std::fs::read(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        serde_json::from_slice(&data).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    pub fn from_json(data: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(data)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_menu_config() {
        let json = r#"{
            "Windows": [
                {"name": "demo_1", "parent": null, "back": null},
                {"name": "demo_2", "parent": "demo_1", "noScroll": true,
                 "back": {"size": [80, 40], "offset": [10, 10]}}
            ],
            "Buttons": [
                {"name": "arm", "size": [200, 60], "offset": [100, 200], "index": 1,
                 "image_prefix": "Arm", "inner": false, "window": "demo_1",
                 "nextWindow": "demo_2", "function": "", "selectable": true}
            ]
        }"#;

        let config = MenuConfig::from_json(json).unwrap();
        assert_eq!(config.windows.len(), 2);
        assert!(config.windows[0].parent.is_none());
        assert_eq!(config.windows[1].parent.as_deref(), Some("demo_1"));
        assert!(config.windows[1].no_scroll);
        assert_eq!(config.windows[1].back.unwrap().size, (80, 40));

        let button = &config.buttons[0];
        assert_eq!(button.next_window, "demo_2");
        assert!(button.function.is_none());
        assert_eq!(button.offset, (100, 200));
    }

    #[test]
    fn test_missing_file_is_read_error() {
        let err = MenuConfig::load(Path::new("/nonexistent/xpanel/config.json")).unwrap_err();
        assert!(matches!(err, ConfigError::Read { .. }));
    }
}
