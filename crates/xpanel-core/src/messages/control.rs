/// How the daemon should exit
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExitMode {
    Reboot,
    Shutdown,
}

impl ExitMode {
    /// Process exit code the supervising service maps to a power action
    pub fn exit_code(&self) -> i32 {
        match self {
            Self::Reboot => 3,
            Self::Shutdown => 4,
        }
    }
}

/// Result of handling one event
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Control {
    Continue,
    Exit(ExitMode),
}
