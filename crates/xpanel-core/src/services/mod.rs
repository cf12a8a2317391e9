mod peripherals;
mod process;

pub use peripherals::{
    Camera, CameraFeed, CameraId, FeedGate, FeedSubscription, FrameCallback, Peripherals,
};
pub use process::{ProcessHandle, ProcessSupervisor};
