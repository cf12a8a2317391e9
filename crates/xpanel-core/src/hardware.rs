//! Seams to the robot hardware: enable state and grippers.

use smallvec::SmallVec;
use tracing::{info, warn};

use crate::error::HardwareError;
use crate::input::Side;

/// Robot enable/disable interface
pub trait Robot: Send {
    fn enable(&mut self) -> Result<(), HardwareError>;

    /// Whether the robot currently reports itself enabled
    fn is_enabled(&mut self) -> Result<bool, HardwareError>;
}

/// Kind of end effector attached to an arm
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GripperKind {
    Electric,
    Suction,
    Custom,
}

impl GripperKind {
    pub fn from_str(s: &str) -> Self {
        match s.trim().to_lowercase().as_str() {
            "electric" => Self::Electric,
            "suction" => Self::Suction,
            _ => Self::Custom,
        }
    }
}

pub trait Gripper: Send {
    fn kind(&mut self) -> Result<GripperKind, HardwareError>;
    fn calibrate(&mut self) -> Result<(), HardwareError>;
}

struct GripperSlot {
    side: Side,
    gripper: Box<dyn Gripper>,
    kind: GripperKind,
}

/// Tracks gripper swaps and calibrates electric grippers when they appear
pub struct GripperMonitor {
    slots: SmallVec<[GripperSlot; 2]>,
}

impl GripperMonitor {
    pub fn new(left: Box<dyn Gripper>, right: Box<dyn Gripper>) -> Self {
        let slots = [(Side::Left, left), (Side::Right, right)]
            .into_iter()
            .map(|(side, gripper)| GripperSlot {
                side,
                gripper,
                kind: GripperKind::Custom,
            })
            .collect();
        Self { slots }
    }

    /// Query both grippers; returns the sides whose kind changed
    pub fn poll(&mut self) -> SmallVec<[(Side, GripperKind); 2]> {
        let mut changed = SmallVec::new();

        for slot in &mut self.slots {
            let kind = match slot.gripper.kind() {
                Ok(kind) => kind,
                Err(e) => {
                    warn!("Gripper poll failed: {}", e);
                    continue;
                }
            };
            if kind == slot.kind {
                continue;
            }

            info!("{} gripper changed to {:?}", slot.side, kind);
            slot.kind = kind.clone();
            if kind == GripperKind::Electric {
                if let Err(e) = slot.gripper.calibrate() {
                    warn!("Gripper calibration failed: {}", e);
                }
            }
            changed.push((slot.side, kind));
        }

        changed
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::FakeGripper;

    #[test]
    fn test_electric_gripper_calibrated_once() {
        let left = FakeGripper::new(GripperKind::Electric);
        let right = FakeGripper::new(GripperKind::Custom);
        let left_calibrations = left.calibrations.clone();
        let right_calibrations = right.calibrations.clone();
        let mut monitor = GripperMonitor::new(Box::new(left), Box::new(right));

        let changed = monitor.poll();
        assert_eq!(changed.as_slice(), &[(Side::Left, GripperKind::Electric)]);
        assert_eq!(left_calibrations.get(), 1);
        assert_eq!(right_calibrations.get(), 0);

        assert!(monitor.poll().is_empty());
        assert_eq!(left_calibrations.get(), 1);
    }

    #[test]
    fn test_kind_parse() {
        assert_eq!(GripperKind::from_str(" Electric\n"), GripperKind::Electric);
        assert_eq!(GripperKind::from_str("suction"), GripperKind::Suction);
        assert_eq!(GripperKind::from_str("anything"), GripperKind::Custom);
    }
}
