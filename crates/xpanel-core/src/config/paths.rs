use std::path::PathBuf;

/// Well-known locations for the panel daemon
pub struct ConfigPaths {
    pub settings: PathBuf,
    pub socket: PathBuf,
}

impl ConfigPaths {
    pub fn new() -> Self {
        let config_dir = dirs::config_dir().unwrap_or_else(|| PathBuf::from(".config"));
        let runtime_dir = dirs::runtime_dir().unwrap_or_else(std::env::temp_dir);

        Self {
            settings: config_dir.join("xpanel/settings.json"),
            socket: runtime_dir.join("xpanel.sock"),
        }
    }
}

impl Default for ConfigPaths {
    fn default() -> Self {
        Self::new()
    }
}
