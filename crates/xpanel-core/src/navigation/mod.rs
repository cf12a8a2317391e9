//! The navigation state machine.
//!
//! A [`Navigator`] owns every piece of mutable menu state and handles one
//! [`PanelEvent`] at a time. The daemon feeds it from a single dispatcher, so
//! nothing here needs locking.

mod actions;

pub use actions::{
    ActionContext, ActionHandler, ActionOutcome, ActionRegistry, PLAYBACK_INDEX, RECORD_WINDOW,
};

use ahash::{AHashMap, AHashSet};
use std::time::Instant;
use tracing::{debug, error, info, warn};

use crate::calibration::{Calibration, CalibrationOutcome};
use crate::config::PanelSettings;
use crate::error::{ActionError, CalibrationError, ConfigError, HardwareError};
use crate::hardware::{GripperMonitor, Robot};
use crate::input::{ScrollDirection, Side, WheelDebouncer};
use crate::menu::{Button, ButtonAction, ButtonName, ButtonStatus, MenuGraph, Window, WindowName};
use crate::messages::{Control, ErrorKind, ExitMode, PanelEvent};
use crate::render::{Compositor, LiveOverlay};
use crate::services::ProcessSupervisor;

/// Tag used for the fire-and-forget startup commands
const STARTUP_TAG: &str = "startup";

/// Navigation state lent to action handlers
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NavigationSnapshot {
    pub active_window: WindowName,
    pub active_example_running: bool,
}

/// Coarse state, derived from the snapshot
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NavState {
    Idle,
    ExampleActive,
    ErrorShown,
}

/// Collaborators the navigator takes ownership of
pub struct NavigatorParts {
    pub graph: MenuGraph,
    pub supervisor: ProcessSupervisor,
    pub compositor: Compositor,
    pub robot: Box<dyn Robot>,
    pub grippers: Option<GripperMonitor>,
    pub actions: ActionRegistry,
    pub calibration: Calibration,
    pub settings: PanelSettings,
}

pub struct Navigator {
    graph: MenuGraph,
    supervisor: ProcessSupervisor,
    compositor: Compositor,
    overlay: LiveOverlay,
    robot: Box<dyn Robot>,
    grippers: Option<GripperMonitor>,
    actions: ActionRegistry,
    calibration: Calibration,
    settings: PanelSettings,
    debouncer: WheelDebouncer,
    snapshot: NavigationSnapshot,
    /// Selected index per window; absent means the first selectable button
    cursors: AHashMap<WindowName, usize>,
    /// Runtime back targets of error windows
    back_overrides: AHashMap<WindowName, WindowName>,
    /// Buttons made selectable by actions
    unlocks: AHashSet<ButtonName>,
}

impl Navigator {
    /// Validate the parts against each other and start idle at the default window
    pub fn new(parts: NavigatorParts) -> Result<Self, ConfigError> {
        let NavigatorParts {
            graph,
            supervisor,
            compositor,
            robot,
            grippers,
            actions,
            calibration,
            settings,
        } = parts;

        if !graph.contains_window(&settings.default_window) {
            return Err(ConfigError::UnknownDefaultWindow(settings.default_window.clone()));
        }
        for kind in ErrorKind::ALL {
            if !graph.contains_window(kind.window_name()) {
                return Err(ConfigError::MissingErrorWindow(kind.window_name()));
            }
        }
        for (button, context) in graph.contexts() {
            if let Some(ButtonAction::Invoke(action)) = &context.action {
                if !actions.contains(action) {
                    return Err(ConfigError::UnknownAction {
                        button: button.clone(),
                        action: action.clone(),
                    });
                }
            }
        }

        let overlay = compositor.live_overlay(settings.camera.overlay);
        let debouncer = WheelDebouncer::new(settings.wheel_debounce());
        let snapshot = NavigationSnapshot {
            active_window: settings.default_window.clone(),
            active_example_running: false,
        };
        info!(
            "Navigator ready: {} windows, {} actions, starting at '{}'",
            graph.window_count(),
            actions.len(),
            snapshot.active_window
        );

        Ok(Self {
            graph,
            supervisor,
            compositor,
            overlay,
            robot,
            grippers,
            actions,
            calibration,
            settings,
            debouncer,
            snapshot,
            cursors: AHashMap::new(),
            back_overrides: AHashMap::new(),
            unlocks: AHashSet::new(),
        })
    }

    /// Startup sequence: startup commands, first frame, enable, calibration resume
    pub fn start(&mut self) -> Control {
        for command in &self.settings.startup_commands {
            if let Err(e) = self.supervisor.launch(command, STARTUP_TAG) {
                error!("{}", e);
            }
        }

        self.redraw();
        if let Control::Exit(mode) = self.enable() {
            return Control::Exit(mode);
        }

        match self.calibration.resume(&self.supervisor) {
            Ok(CalibrationOutcome::RebootRequired) => Control::Exit(ExitMode::Reboot),
            Ok(_) => Control::Continue,
            Err(e @ CalibrationError::StepFailed { .. }) => {
                error!("{}", e);
                self.raise_error(ErrorKind::Calibration)
            }
            Err(e) => {
                error!("Calibration resume failed: {}", e);
                Control::Continue
            }
        }
    }

    pub fn handle(&mut self, event: PanelEvent) -> Control {
        debug!("Handling {:?}", event);
        match event {
            PanelEvent::Press(side) => self.press(side),
            PanelEvent::Wheel { side, value } => {
                match self.debouncer.observe(side, value, Instant::now()) {
                    Some(direction) => self.scroll(direction),
                    None => Control::Continue,
                }
            }
            PanelEvent::Scroll(_, direction) => self.scroll(direction),
            PanelEvent::Back(_) => self.back(),
            PanelEvent::HardwareEnableChanged => self.enable(),
            PanelEvent::ErrorRaised(kind) => self.raise_error(kind),
            PanelEvent::GripperTick => self.gripper_tick(),
            PanelEvent::Shutdown => {
                let killed = self.supervisor.terminate_all();
                info!("Shut down, {} process(es) interrupted", killed);
                Control::Continue
            }
        }
    }

    fn press(&mut self, side: Side) -> Control {
        let active = self.snapshot.active_window.clone();
        let cursor = self.cursor(&active);
        let Some(button) = self.graph.button_at(&active, cursor) else {
            warn!("Press on '{}' with nothing selected", active);
            return Control::Continue;
        };
        let Some(context) = self.graph.context(&button.name).cloned() else {
            warn!("Button '{}' has no context", button.name);
            return Control::Continue;
        };
        debug!("Pressed '{}' on '{}'", button.name, active);

        match context.action {
            Some(ButtonAction::Back) => {
                let target = self
                    .back_overrides
                    .get(&active)
                    .cloned()
                    .unwrap_or(context.next_window);
                self.return_to(target)
            }
            action => {
                self.snapshot.active_window = context.next_window;
                self.redraw();
                match action {
                    Some(ButtonAction::Invoke(id)) => self.invoke(&id, side),
                    _ => Control::Continue,
                }
            }
        }
    }

    fn back(&mut self) -> Control {
        let active = &self.snapshot.active_window;
        match effective_parent(&self.graph, &self.back_overrides, active).cloned() {
            Some(parent) => self.return_to(parent),
            None => {
                debug!("'{}' has no parent, ignoring back", active);
                Control::Continue
            }
        }
    }

    /// Kill examples, show `target`, then re-enable
    fn return_to(&mut self, target: WindowName) -> Control {
        self.kill_examples();
        self.snapshot.active_window = target;
        self.redraw();
        self.enable()
    }

    fn scroll(&mut self, direction: ScrollDirection) -> Control {
        if self.snapshot.active_example_running {
            debug!("Example running, ignoring scroll");
            return Control::Continue;
        }
        let active = self.snapshot.active_window.clone();
        let Some(window) = self.graph.window(&active) else {
            return Control::Continue;
        };
        if window.no_scroll {
            return Control::Continue;
        }

        let current = self.cursor(&active);
        let step = direction.step();
        let mut index = current as isize + step;
        let mut found = None;
        while index >= 0 && (index as usize) < window.buttons.len() {
            if self.is_selectable(&window.buttons[index as usize]) {
                found = Some(index as usize);
                break;
            }
            index += step;
        }

        if let Some(next) = found.filter(|&next| next != current) {
            self.cursors.insert(active, next);
            self.redraw();
        }
        Control::Continue
    }

    /// Show the error window for `kind`, remembering where to go back to
    fn raise_error(&mut self, kind: ErrorKind) -> Control {
        let window = WindowName::from(kind.window_name());
        let active = self.snapshot.active_window.clone();

        let on_chain = window_chain(&self.graph, &self.back_overrides, &active)
            .iter()
            .any(|w| w.name == window);
        if on_chain {
            warn!(
                "'{}' already leads to '{}', keeping its back target",
                active, window
            );
        } else {
            self.back_overrides.insert(window.clone(), active);
        }

        warn!("Showing error window '{}'", window);
        self.snapshot.active_window = window;
        self.redraw();
        Control::Continue
    }

    fn invoke(&mut self, id: &str, side: Side) -> Control {
        let Some(handler) = self.actions.get(id) else {
            warn!("No handler for action '{}'", id);
            return Control::Continue;
        };
        info!("Running '{}' for the {} navigator", id, side);

        let mut ctx = ActionContext {
            snapshot: &self.snapshot,
            graph: &self.graph,
            supervisor: &mut self.supervisor,
            calibration: &self.calibration,
            unlocks: &mut self.unlocks,
            overlay: &self.overlay,
            settings: &self.settings,
        };
        match handler(&mut ctx, side) {
            Ok(ActionOutcome::Done) => Control::Continue,
            Ok(ActionOutcome::ExampleStarted) => {
                self.snapshot.active_example_running = true;
                Control::Continue
            }
            Ok(ActionOutcome::Exit(mode)) => {
                info!("'{}' requested {:?}", id, mode);
                Control::Exit(mode)
            }
            Err(e) => self.action_failed(id, e),
        }
    }

    fn action_failed(&mut self, id: &str, err: ActionError) -> Control {
        error!("Action '{}' failed: {}", id, err);
        match err {
            ActionError::Hardware(HardwareError::EnableFailed(_)) => {
                self.raise_error(ErrorKind::Stopped)
            }
            ActionError::Hardware(HardwareError::NotEnabled) => self.raise_error(ErrorKind::NoEnable),
            ActionError::Calibration(CalibrationError::StepFailed { .. }) => {
                self.raise_error(ErrorKind::Calibration)
            }
            _ => Control::Continue,
        }
    }

    fn kill_examples(&mut self) {
        self.supervisor.kill_all(&self.settings.kill_patterns);
        self.snapshot.active_example_running = false;
    }

    /// Enable the robot, routing failures to their error windows
    fn enable(&mut self) -> Control {
        if let Err(e) = self.robot.enable() {
            warn!("{}", e);
            return self.raise_error(ErrorKind::Stopped);
        }

        match self.robot.is_enabled() {
            Ok(true) => {}
            Ok(false) => {
                warn!("{}", HardwareError::NotEnabled);
                self.raise_error(ErrorKind::NoEnable);
            }
            Err(e) => {
                warn!("{}", e);
                self.raise_error(ErrorKind::NoEnable);
            }
        }

        self.ensure_cuff();
        Control::Continue
    }

    fn ensure_cuff(&mut self) {
        let cuff = &self.settings.cuff;
        if self.supervisor.is_running(&cuff.tag) {
            return;
        }
        if let Err(e) = self.supervisor.launch(&cuff.command, &cuff.tag) {
            error!("{}", e);
        }
    }

    fn gripper_tick(&mut self) -> Control {
        let changed = match self.grippers.as_mut() {
            Some(monitor) => !monitor.poll().is_empty(),
            None => false,
        };
        self.ensure_cuff();
        if changed {
            self.redraw();
        }
        Control::Continue
    }

    fn redraw(&mut self) {
        let active = self.snapshot.active_window.clone();
        let cursor = self.cursor(&active);
        let chain = window_chain(&self.graph, &self.back_overrides, &active);
        self.compositor.redraw(&self.graph, &chain, cursor);
    }

    fn is_selectable(&self, button: &str) -> bool {
        self.unlocks.contains(button) || self.graph.button(button).is_some_and(|b| b.selectable)
    }

    /// Selected index on `window`
    pub fn cursor(&self, window: &str) -> usize {
        if let Some(&cursor) = self.cursors.get(window) {
            return cursor;
        }
        self.graph
            .window(window)
            .and_then(|w| w.buttons.iter().position(|b| self.is_selectable(b)))
            .unwrap_or(0)
    }

    pub fn selected_button(&self) -> Option<&Button> {
        let active = &self.snapshot.active_window;
        self.graph.button_at(active, self.cursor(active))
    }

    /// Status of a button on the active window
    pub fn button_status(&self, button: &str) -> Option<ButtonStatus> {
        let window = self.graph.window(&self.snapshot.active_window)?;
        let index = window.buttons.iter().position(|b| b.as_str() == button)?;
        if index == self.cursor(&window.name) {
            Some(ButtonStatus::Selected)
        } else {
            Some(ButtonStatus::Normal)
        }
    }

    /// Parent after error-window overrides
    pub fn effective_parent(&self, window: &str) -> Option<&WindowName> {
        effective_parent(&self.graph, &self.back_overrides, window)
    }

    /// Active window and its ancestors, root first
    pub fn chain(&self) -> Vec<&Window> {
        window_chain(&self.graph, &self.back_overrides, &self.snapshot.active_window)
    }

    pub fn state(&self) -> NavState {
        let active = self.snapshot.active_window.as_str();
        if ErrorKind::ALL.iter().any(|k| k.window_name() == active) {
            NavState::ErrorShown
        } else if self.snapshot.active_example_running {
            NavState::ExampleActive
        } else {
            NavState::Idle
        }
    }

    pub fn snapshot(&self) -> &NavigationSnapshot {
        &self.snapshot
    }

    pub fn graph(&self) -> &MenuGraph {
        &self.graph
    }

    pub fn supervisor(&self) -> &ProcessSupervisor {
        &self.supervisor
    }

    pub fn compositor(&self) -> &Compositor {
        &self.compositor
    }
}

fn effective_parent<'a>(
    graph: &'a MenuGraph,
    overrides: &'a AHashMap<WindowName, WindowName>,
    window: &str,
) -> Option<&'a WindowName> {
    overrides
        .get(window)
        .or_else(|| graph.window(window).and_then(|w| w.parent.as_ref()))
}

/// Walk effective parents up from `leaf`, returning root first.
/// Stops early if the walk revisits a window.
fn window_chain<'a>(
    graph: &'a MenuGraph,
    overrides: &'a AHashMap<WindowName, WindowName>,
    leaf: &str,
) -> Vec<&'a Window> {
    let mut chain: Vec<&Window> = Vec::new();
    let mut current = graph.window(leaf);

    while let Some(window) = current {
        if chain.iter().any(|w| w.name == window.name) {
            error!("Window chain loops at '{}'", window.name);
            break;
        }
        chain.push(window);
        current = effective_parent(graph, overrides, &window.name).and_then(|p| graph.window(p));
    }

    chain.reverse();
    chain
}
