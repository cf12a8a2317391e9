//! Named behaviours buttons can trigger.
//!
//! Handlers are plain functions looked up by the `function` id from the menu
//! config. They get an [`ActionContext`] lending out exactly the state they
//! may touch; none of it is global.

use ahash::{AHashMap, AHashSet};
use compact_str::CompactString;
use tracing::{info, warn};

use super::NavigationSnapshot;
use crate::calibration::{Calibration, CalibrationOutcome};
use crate::config::PanelSettings;
use crate::error::ActionError;
use crate::input::Side;
use crate::menu::{ActionId, ButtonName, MenuGraph};
use crate::messages::ExitMode;
use crate::render::LiveOverlay;
use crate::services::{CameraId, ProcessSupervisor};

/// Window whose playback button `record` unlocks
pub const RECORD_WINDOW: &str = "record_submenu";
/// Position of the playback button in [`RECORD_WINDOW`]
pub const PLAYBACK_INDEX: usize = 2;

/// What a finished handler asks of the navigator
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ActionOutcome {
    Done,
    /// Something is now running that Back must tear down
    ExampleStarted,
    Exit(ExitMode),
}

/// State lent to a handler for the duration of one call
pub struct ActionContext<'a> {
    pub snapshot: &'a NavigationSnapshot,
    pub graph: &'a MenuGraph,
    pub supervisor: &'a mut ProcessSupervisor,
    pub calibration: &'a Calibration,
    pub unlocks: &'a mut AHashSet<ButtonName>,
    pub overlay: &'a LiveOverlay,
    pub settings: &'a PanelSettings,
}

pub type ActionHandler = fn(&mut ActionContext<'_>, Side) -> Result<ActionOutcome, ActionError>;

/// `ActionId -> handler` table
#[derive(Clone, Default)]
pub struct ActionRegistry {
    handlers: AHashMap<ActionId, ActionHandler>,
}

impl ActionRegistry {
    /// Empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry holding every built-in action
    pub fn with_builtins() -> Self {
        let mut registry = Self::new();
        registry.register("cam_left", cam_left);
        registry.register("cam_right", cam_right);
        registry.register("cam_head", cam_head);
        registry.register("springs", springs);
        registry.register("puppet", puppet);
        registry.register("wobbler", wobbler);
        registry.register("record", record);
        registry.register("play", play);
        registry.register("tare", tare);
        registry.register("reboot", reboot);
        registry.register("shutdown", shutdown);
        registry
    }

    pub fn register(&mut self, id: &str, handler: ActionHandler) {
        self.handlers.insert(CompactString::from(id), handler);
    }

    pub fn get(&self, id: &str) -> Option<ActionHandler> {
        self.handlers.get(id).copied()
    }

    pub fn contains(&self, id: &str) -> bool {
        self.handlers.contains_key(id)
    }

    pub fn len(&self) -> usize {
        self.handlers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.handlers.is_empty()
    }
}

fn cam_left(ctx: &mut ActionContext<'_>, _side: Side) -> Result<ActionOutcome, ActionError> {
    show_camera(ctx, CameraId::LeftHand)
}

fn cam_right(ctx: &mut ActionContext<'_>, _side: Side) -> Result<ActionOutcome, ActionError> {
    show_camera(ctx, CameraId::RightHand)
}

fn cam_head(ctx: &mut ActionContext<'_>, _side: Side) -> Result<ActionOutcome, ActionError> {
    show_camera(ctx, CameraId::Head)
}

fn show_camera(ctx: &mut ActionContext<'_>, camera: CameraId) -> Result<ActionOutcome, ActionError> {
    let overlay = ctx.overlay.clone();
    ctx.supervisor.peripherals_mut().start_preview(
        camera,
        ctx.settings.camera.resolution,
        Box::new(move |frame| overlay.present(frame)),
    )?;
    info!("Showing {} camera", camera);
    Ok(ActionOutcome::ExampleStarted)
}

fn springs(ctx: &mut ActionContext<'_>, side: Side) -> Result<ActionOutcome, ActionError> {
    let settings = ctx.settings;
    launch_example(ctx, &settings.examples.springs, side)
}

fn puppet(ctx: &mut ActionContext<'_>, side: Side) -> Result<ActionOutcome, ActionError> {
    let settings = ctx.settings;
    launch_example(ctx, &settings.examples.puppet, side)
}

fn wobbler(ctx: &mut ActionContext<'_>, side: Side) -> Result<ActionOutcome, ActionError> {
    let settings = ctx.settings;
    launch_example(ctx, &settings.examples.wobbler, side)
}

fn record(ctx: &mut ActionContext<'_>, side: Side) -> Result<ActionOutcome, ActionError> {
    let settings = ctx.settings;
    let outcome = launch_example(ctx, &settings.examples.record, side)?;

    match ctx
        .graph
        .window(RECORD_WINDOW)
        .and_then(|w| w.buttons.get(PLAYBACK_INDEX))
    {
        Some(playback) => {
            ctx.unlocks.insert(playback.clone());
        }
        None => warn!("No playback button to unlock in {}", RECORD_WINDOW),
    }
    Ok(outcome)
}

fn play(ctx: &mut ActionContext<'_>, side: Side) -> Result<ActionOutcome, ActionError> {
    let settings = ctx.settings;
    let examples = &settings.examples;
    launch_example(ctx, &examples.action_server, side)?;

    let playback = expand(&examples.playback, side);
    ctx.supervisor
        .launch_after(examples.playback_delay(), &playback, &playback);
    Ok(ActionOutcome::ExampleStarted)
}

fn tare(ctx: &mut ActionContext<'_>, _side: Side) -> Result<ActionOutcome, ActionError> {
    match ctx.calibration.run(0, ctx.supervisor)? {
        CalibrationOutcome::RebootRequired => Ok(ActionOutcome::Exit(ExitMode::Reboot)),
        CalibrationOutcome::Idle | CalibrationOutcome::Finished => Ok(ActionOutcome::Done),
    }
}

fn reboot(_ctx: &mut ActionContext<'_>, _side: Side) -> Result<ActionOutcome, ActionError> {
    Ok(ActionOutcome::Exit(ExitMode::Reboot))
}

fn shutdown(_ctx: &mut ActionContext<'_>, _side: Side) -> Result<ActionOutcome, ActionError> {
    Ok(ActionOutcome::Exit(ExitMode::Shutdown))
}

/// Launch a templated example; its command line doubles as the kill tag
fn launch_example(
    ctx: &mut ActionContext<'_>,
    template: &str,
    side: Side,
) -> Result<ActionOutcome, ActionError> {
    let command = expand(template, side);
    ctx.supervisor.launch(&command, &command)?;
    Ok(ActionOutcome::ExampleStarted)
}

fn expand(template: &str, side: Side) -> String {
    template.replace("{side}", side.name())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builtins_registered() {
        let registry = ActionRegistry::with_builtins();
        for id in [
            "cam_left", "cam_right", "cam_head", "springs", "puppet", "wobbler", "record", "play",
            "tare", "reboot", "shutdown",
        ] {
            assert!(registry.contains(id), "{} missing", id);
        }
        assert_eq!(registry.len(), 11);
        assert!(registry.get("Back").is_none());
    }

    #[test]
    fn test_expand_side() {
        assert_eq!(
            expand("joint_torque_springs.py -l {side}", Side::Right),
            "joint_torque_springs.py -l right"
        );
        assert_eq!(expand("wobbler.py", Side::Left), "wobbler.py");
    }
}
