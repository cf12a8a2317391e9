use ahash::AHashMap;
use parking_lot::RwLock;
use std::fmt;
use std::sync::Arc;
use tracing::{debug, warn};

use crate::error::HardwareError;
use crate::render::Frame;

/// Cameras an example can preview on screen
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CameraId {
    LeftHand,
    RightHand,
    Head,
}

impl CameraId {
    pub const ALL: [CameraId; 3] = [Self::LeftHand, Self::RightHand, Self::Head];

    pub fn name(&self) -> &'static str {
        match self {
            Self::LeftHand => "left_hand",
            Self::RightHand => "right_hand",
            Self::Head => "head",
        }
    }

    /// Image topic the camera publishes on
    pub fn topic(&self) -> String {
        format!("cameras/{}_camera/image", self.name())
    }
}

impl fmt::Display for CameraId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

pub trait Camera: Send {
    fn open(&mut self, resolution: (u32, u32)) -> Result<(), HardwareError>;

    /// Closing an already closed camera must succeed
    fn close(&mut self) -> Result<(), HardwareError>;
}

/// Called from the feed's own thread for every incoming image
pub type FrameCallback = Box<dyn Fn(Frame) + Send + Sync>;

/// Source of live camera images
pub trait CameraFeed: Send {
    fn subscribe(
        &mut self,
        camera: CameraId,
        on_frame: FrameCallback,
    ) -> Result<Box<dyn FeedSubscription>, HardwareError>;
}

pub trait FeedSubscription: Send {
    /// Stop delivering frames. Calling this twice is a no-op.
    fn unregister(&mut self);
}

/// Session counter guarding frame delivery.
///
/// A callback only runs while its session is current. Closing a session
/// waits for any delivery already in progress, so nothing from an old
/// session is delivered once [`FeedGate::close`] returns.
#[derive(Clone, Default)]
pub struct FeedGate(Arc<RwLock<u64>>);

impl FeedGate {
    /// Start a new session and wrap `on_frame` so it only runs during it
    pub fn open(&self, on_frame: FrameCallback) -> FrameCallback {
        let session = {
            let mut current = self.0.write();
            *current += 1;
            *current
        };
        let gate = self.0.clone();
        Box::new(move |frame: Frame| {
            let current = gate.read();
            if *current == session {
                on_frame(frame);
            } else {
                debug!("Dropping frame from closed feed session {}", session);
            }
        })
    }

    pub fn close(&self) {
        *self.0.write() += 1;
    }
}

/// Resources examples acquire that must be released when they are killed
pub struct Peripherals {
    cameras: AHashMap<CameraId, Box<dyn Camera>>,
    feed: Box<dyn CameraFeed>,
    live: Option<Box<dyn FeedSubscription>>,
    gate: FeedGate,
}

impl Peripherals {
    pub fn new(cameras: AHashMap<CameraId, Box<dyn Camera>>, feed: Box<dyn CameraFeed>) -> Self {
        Self {
            cameras,
            feed,
            live: None,
            gate: FeedGate::default(),
        }
    }

    /// Reopen `camera` at `resolution` and route its images to `on_frame`
    pub fn start_preview(
        &mut self,
        camera: CameraId,
        resolution: (u32, u32),
        on_frame: FrameCallback,
    ) -> Result<(), HardwareError> {
        self.stop_live_feed();

        let handle = self.cameras.get_mut(&camera).ok_or_else(|| HardwareError::Camera {
            camera: camera.name(),
            message: "not available".to_string(),
        })?;
        handle.close()?;
        handle.open(resolution)?;

        debug!("Subscribing to {}", camera.topic());
        let on_frame = self.gate.open(on_frame);
        self.live = Some(self.feed.subscribe(camera, on_frame)?);
        Ok(())
    }

    pub fn has_live_feed(&self) -> bool {
        self.live.is_some()
    }

    fn stop_live_feed(&mut self) {
        self.gate.close();
        if let Some(mut subscription) = self.live.take() {
            subscription.unregister();
        }
    }

    /// Unregister the live feed and close every camera
    pub fn release(&mut self) {
        self.stop_live_feed();
        for (id, camera) in self.cameras.iter_mut() {
            if let Err(e) = camera.close() {
                warn!("Failed to close {} camera: {}", id, e);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{fake_peripherals, Counter};
    use image::{ImageBuffer, Rgba};

    fn frame() -> Frame {
        ImageBuffer::from_pixel(2, 2, Rgba([0, 0, 0, 255]))
    }

    fn counting(counter: &Counter) -> FrameCallback {
        let counter = counter.clone();
        Box::new(move |_: Frame| counter.inc())
    }

    #[test]
    fn test_gate_drops_frames_after_close() {
        let gate = FeedGate::default();
        let delivered = Counter::default();
        let on_frame = gate.open(counting(&delivered));

        on_frame(frame());
        gate.close();
        on_frame(frame());
        assert_eq!(delivered.get(), 1);
    }

    #[test]
    fn test_gate_new_session_retires_old_callback() {
        let gate = FeedGate::default();
        let old = Counter::default();
        let new = Counter::default();
        let old_callback = gate.open(counting(&old));
        let new_callback = gate.open(counting(&new));

        old_callback(frame());
        new_callback(frame());
        assert_eq!(old.get(), 0);
        assert_eq!(new.get(), 1);
    }

    #[test]
    fn test_release_silences_in_flight_feed() {
        let (mut peripherals, probe) = fake_peripherals();
        let delivered = Counter::default();
        peripherals
            .start_preview(CameraId::Head, (640, 400), counting(&delivered))
            .unwrap();

        // A feed thread that already passed its own stop check
        assert!(probe.feed_tap.deliver(frame()));
        assert_eq!(delivered.get(), 1);

        peripherals.release();
        assert!(!peripherals.has_live_feed());
        assert!(probe.feed_tap.deliver(frame()));
        assert_eq!(delivered.get(), 1);
    }
}
