//! Fakes for the hardware seams and frame sink.

use ahash::AHashMap;
use parking_lot::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use crate::error::HardwareError;
use crate::hardware::{Gripper, GripperKind, Robot};
use crate::render::{Frame, FrameSink};
use crate::services::{Camera, CameraFeed, CameraId, FeedSubscription, FrameCallback, Peripherals};

/// Shared call counter
#[derive(Debug, Clone, Default)]
pub(crate) struct Counter(Arc<AtomicUsize>);

impl Counter {
    pub fn inc(&self) {
        self.0.fetch_add(1, Ordering::SeqCst);
    }

    pub fn get(&self) -> usize {
        self.0.load(Ordering::SeqCst)
    }
}

pub(crate) struct FakeGripper {
    kind: GripperKind,
    pub calibrations: Counter,
}

impl FakeGripper {
    pub fn new(kind: GripperKind) -> Self {
        Self {
            kind,
            calibrations: Counter::default(),
        }
    }
}

impl Gripper for FakeGripper {
    fn kind(&mut self) -> Result<GripperKind, HardwareError> {
        Ok(self.kind.clone())
    }

    fn calibrate(&mut self) -> Result<(), HardwareError> {
        self.calibrations.inc();
        Ok(())
    }
}

/// How a [`FakeRobot`] answers enable requests
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum RobotBehaviour {
    Healthy,
    EnableFails,
    StaysDisabled,
}

pub(crate) struct FakeRobot {
    behaviour: Arc<Mutex<RobotBehaviour>>,
    pub enables: Counter,
}

impl FakeRobot {
    pub fn new(behaviour: RobotBehaviour) -> Self {
        Self {
            behaviour: Arc::new(Mutex::new(behaviour)),
            enables: Counter::default(),
        }
    }

    /// Handle for changing the behaviour after the robot is boxed
    pub fn behaviour(&self) -> Arc<Mutex<RobotBehaviour>> {
        self.behaviour.clone()
    }
}

impl Robot for FakeRobot {
    fn enable(&mut self) -> Result<(), HardwareError> {
        self.enables.inc();
        match *self.behaviour.lock() {
            RobotBehaviour::EnableFails => Err(HardwareError::EnableFailed("e-stop engaged".into())),
            _ => Ok(()),
        }
    }

    fn is_enabled(&mut self) -> Result<bool, HardwareError> {
        Ok(*self.behaviour.lock() == RobotBehaviour::Healthy)
    }
}

/// Last callback handed to the fake feed, for pushing frames by hand
#[derive(Clone, Default)]
pub(crate) struct FeedTap(Arc<Mutex<Option<FrameCallback>>>);

impl FeedTap {
    /// Push `frame` through the latest callback; false if none was registered
    pub fn deliver(&self, frame: Frame) -> bool {
        match self.0.lock().as_ref() {
            Some(on_frame) => {
                on_frame(frame);
                true
            }
            None => false,
        }
    }
}

/// Counters shared by every fake camera and the fake feed
#[derive(Clone, Default)]
pub(crate) struct PeripheralProbe {
    pub opens: Counter,
    pub closes: Counter,
    pub subscribes: Counter,
    pub unregisters: Counter,
    pub feed_tap: FeedTap,
}

struct FakeCamera {
    probe: PeripheralProbe,
}

impl Camera for FakeCamera {
    fn open(&mut self, _resolution: (u32, u32)) -> Result<(), HardwareError> {
        self.probe.opens.inc();
        Ok(())
    }

    fn close(&mut self) -> Result<(), HardwareError> {
        self.probe.closes.inc();
        Ok(())
    }
}

struct FakeFeed {
    probe: PeripheralProbe,
}

impl CameraFeed for FakeFeed {
    fn subscribe(
        &mut self,
        _camera: CameraId,
        on_frame: FrameCallback,
    ) -> Result<Box<dyn FeedSubscription>, HardwareError> {
        self.probe.subscribes.inc();
        *self.probe.feed_tap.0.lock() = Some(on_frame);
        Ok(Box::new(FakeSubscription {
            probe: self.probe.clone(),
            active: true,
        }))
    }
}

struct FakeSubscription {
    probe: PeripheralProbe,
    active: bool,
}

impl FeedSubscription for FakeSubscription {
    fn unregister(&mut self) {
        if std::mem::replace(&mut self.active, false) {
            self.probe.unregisters.inc();
        }
    }
}

/// Peripherals with all three cameras backed by counting fakes
pub(crate) fn fake_peripherals() -> (Peripherals, PeripheralProbe) {
    let probe = PeripheralProbe::default();
    let cameras: AHashMap<CameraId, Box<dyn Camera>> = CameraId::ALL
        .into_iter()
        .map(|id| {
            let camera: Box<dyn Camera> = Box::new(FakeCamera {
                probe: probe.clone(),
            });
            (id, camera)
        })
        .collect();
    let feed = Box::new(FakeFeed {
        probe: probe.clone(),
    });
    (Peripherals::new(cameras, feed), probe)
}

/// Keeps every published frame
#[derive(Default)]
pub(crate) struct RecordingSink {
    frames: Mutex<Vec<Frame>>,
}

impl RecordingSink {
    pub fn count(&self) -> usize {
        self.frames.lock().len()
    }

    pub fn last(&self) -> Option<Frame> {
        self.frames.lock().last().cloned()
    }
}

impl FrameSink for RecordingSink {
    fn publish(&self, frame: &Frame) -> anyhow::Result<()> {
        self.frames.lock().push(frame.clone());
        Ok(())
    }
}
