//! Static menu graph: windows, their buttons, and what each button does.
//!
//! Built once from [`MenuConfig`] and never mutated afterwards. Runtime
//! re-targeting of error windows lives in the navigator, not here.

use ahash::{AHashMap, AHashSet};
use compact_str::CompactString;
use smallvec::SmallVec;

use crate::config::{ButtonConfig, MenuConfig, WindowConfig};
use crate::error::ConfigError;

pub type WindowName = CompactString;
pub type ButtonName = CompactString;
pub type ActionId = CompactString;

/// Action value in config that maps to back-navigation
pub const BACK_ACTION: &str = "Back";

/// A control placed on a window
#[derive(Debug, Clone, PartialEq)]
pub struct Button {
    pub name: ButtonName,
    pub size: (u32, u32),
    pub offset: (i32, i32),
    pub z_index: i32,
    pub image_prefix: CompactString,
    pub inner: bool,
    pub window: WindowName,
    pub selectable: bool,
}

/// Visual state of a button on the active window
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ButtonStatus {
    Normal,
    Selected,
}

/// A named menu screen
#[derive(Debug, Clone, PartialEq)]
pub struct Window {
    pub name: WindowName,
    pub parent: Option<WindowName>,
    /// Paint and scroll order
    pub buttons: SmallVec<[ButtonName; 8]>,
    pub no_scroll: bool,
    pub back_button: Option<ButtonName>,
}

/// What pressing a button does
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ButtonAction {
    Back,
    Invoke(ActionId),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ButtonContext {
    pub next_window: WindowName,
    pub action: Option<ButtonAction>,
}

/// Immutable window/button forest
#[derive(Debug, Clone, Default)]
pub struct MenuGraph {
    windows: AHashMap<WindowName, Window>,
    buttons: AHashMap<ButtonName, Button>,
    contexts: AHashMap<ButtonName, ButtonContext>,
}

impl MenuGraph {
    /// Build the graph, rejecting dangling references and parent cycles
    pub fn build(config: &MenuConfig) -> Result<Self, ConfigError> {
        let mut graph = Self::default();

        for window in &config.windows {
            if graph.windows.contains_key(&window.name) {
                return Err(ConfigError::DuplicateWindow(window.name.clone()));
            }
            graph.windows.insert(
                window.name.clone(),
                Window {
                    name: window.name.clone(),
                    parent: window.parent.clone(),
                    buttons: SmallVec::new(),
                    no_scroll: window.no_scroll,
                    back_button: None,
                },
            );
        }

        for window in &config.windows {
            if let Some(parent) = &window.parent {
                if !graph.windows.contains_key(parent) {
                    return Err(ConfigError::UnknownParent {
                        window: window.name.clone(),
                        parent: parent.clone(),
                    });
                }
            }
        }
        graph.check_acyclic()?;

        // (z_index, config position, name) per window, back buttons first
        let mut placement: AHashMap<WindowName, Vec<(i32, usize, ButtonName)>> = AHashMap::new();

        for window in &config.windows {
            if let Some(button) = back_button_for(window) {
                let name = button.name.clone();
                graph.insert_button(button, ButtonContext {
                    next_window: window.parent.clone().unwrap_or_else(|| window.name.clone()),
                    action: Some(ButtonAction::Back),
                })?;
                placement.entry(window.name.clone()).or_default().push((0, 0, name.clone()));
                if let Some(w) = graph.windows.get_mut(&window.name) {
                    w.back_button = Some(name);
                }
            }
        }

        for (position, button) in config.buttons.iter().enumerate() {
            if !graph.windows.contains_key(&button.window) {
                return Err(ConfigError::UnknownOwner {
                    button: button.name.clone(),
                    window: button.window.clone(),
                });
            }
            if !graph.windows.contains_key(&button.next_window) {
                return Err(ConfigError::UnknownTarget {
                    button: button.name.clone(),
                    window: button.next_window.clone(),
                });
            }
            let context = ButtonContext {
                next_window: button.next_window.clone(),
                action: button.function.as_ref().map(|f| {
                    if f == BACK_ACTION {
                        ButtonAction::Back
                    } else {
                        ButtonAction::Invoke(f.clone())
                    }
                }),
            };
            placement
                .entry(button.window.clone())
                .or_default()
                .push((button.index, position + 1, button.name.clone()));
            graph.insert_button(button_from_config(button), context)?;
        }

        for (window, mut entries) in placement {
            entries.sort_by_key(|(z, position, _)| (*z, *position));
            if let Some(w) = graph.windows.get_mut(&window) {
                w.buttons = entries.into_iter().map(|(_, _, name)| name).collect();
            }
        }

        Ok(graph)
    }

    fn insert_button(&mut self, button: Button, context: ButtonContext) -> Result<(), ConfigError> {
        if self.buttons.contains_key(&button.name) {
            return Err(ConfigError::DuplicateButton(button.name));
        }
        self.contexts.insert(button.name.clone(), context);
        self.buttons.insert(button.name.clone(), button);
        Ok(())
    }

    fn check_acyclic(&self) -> Result<(), ConfigError> {
        for start in self.windows.values() {
            let mut seen: AHashSet<&str> = AHashSet::new();
            let mut current = Some(start);
            while let Some(window) = current {
                if !seen.insert(window.name.as_str()) {
                    return Err(ConfigError::ParentCycle(start.name.clone()));
                }
                current = window.parent.as_ref().and_then(|p| self.windows.get(p));
            }
        }
        Ok(())
    }

    pub fn window(&self, name: &str) -> Option<&Window> {
        self.windows.get(name)
    }

    pub fn button(&self, name: &str) -> Option<&Button> {
        self.buttons.get(name)
    }

    pub fn context(&self, button: &str) -> Option<&ButtonContext> {
        self.contexts.get(button)
    }

    /// Button at `index` in the window's scroll order
    pub fn button_at(&self, window: &str, index: usize) -> Option<&Button> {
        self.windows
            .get(window)
            .and_then(|w| w.buttons.get(index))
            .and_then(|name| self.buttons.get(name))
    }

    pub fn windows(&self) -> impl Iterator<Item = &Window> {
        self.windows.values()
    }

    /// Every button context, for validating action ids up front
    pub fn contexts(&self) -> impl Iterator<Item = (&ButtonName, &ButtonContext)> {
        self.contexts.iter()
    }

    pub fn window_count(&self) -> usize {
        self.windows.len()
    }

    pub fn contains_window(&self, name: &str) -> bool {
        self.windows.contains_key(name)
    }
}

fn back_button_for(window: &WindowConfig) -> Option<Button> {
    let back = window.back?;
    let (image_prefix, inner) = if window.parent.is_some() {
        ("Back", true)
    } else {
        ("MainBack", false)
    };
    Some(Button {
        name: format!("{}_back", window.name).into(),
        size: back.size,
        offset: back.offset,
        z_index: 0,
        image_prefix: image_prefix.into(),
        inner,
        window: window.name.clone(),
        selectable: true,
    })
}

fn button_from_config(config: &ButtonConfig) -> Button {
    Button {
        name: config.name.clone(),
        size: config.size,
        offset: config.offset,
        z_index: config.index,
        image_prefix: config.image_prefix.clone(),
        inner: config.inner,
        window: config.window.clone(),
        selectable: config.selectable,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const MENU: &str = r#"{
        "Windows": [
            {"name": "demo_1"},
            {"name": "arms", "parent": "demo_1", "back": {"size": [80, 40], "offset": [0, 0]}},
            {"name": "springs_run", "parent": "arms", "noScroll": true}
        ],
        "Buttons": [
            {"name": "to_arms", "size": [200, 60], "offset": [100, 100], "index": 0,
             "image_prefix": "Arms", "inner": false, "window": "demo_1",
             "nextWindow": "arms", "function": null, "selectable": true},
            {"name": "springs", "size": [200, 60], "offset": [100, 200], "index": 2,
             "image_prefix": "Springs", "inner": true, "window": "arms",
             "nextWindow": "springs_run", "function": "springs", "selectable": true},
            {"name": "label", "size": [200, 60], "offset": [100, 300], "index": 1,
             "image_prefix": "Label", "inner": true, "window": "arms",
             "nextWindow": "arms", "function": "", "selectable": false}
        ]
    }"#;

    fn graph() -> MenuGraph {
        MenuGraph::build(&MenuConfig::from_json(MENU).unwrap()).unwrap()
    }

    #[test]
    fn test_back_button_is_synthesized() {
        let graph = graph();
        let arms = graph.window("arms").unwrap();
        assert_eq!(arms.back_button.as_deref(), Some("arms_back"));

        let back = graph.button("arms_back").unwrap();
        assert_eq!(back.image_prefix, "Back");
        assert!(back.inner);

        let context = graph.context("arms_back").unwrap();
        assert_eq!(context.action, Some(ButtonAction::Back));
        assert_eq!(context.next_window, "demo_1");
    }

    #[test]
    fn test_buttons_ordered_by_z_index() {
        let graph = graph();
        let arms = graph.window("arms").unwrap();
        let order: Vec<&str> = arms.buttons.iter().map(|b| b.as_str()).collect();
        assert_eq!(order, ["arms_back", "label", "springs"]);
        assert_eq!(graph.button_at("arms", 2).unwrap().name, "springs");
    }

    #[test]
    fn test_function_mapping() {
        let graph = graph();
        assert_eq!(graph.context("label").unwrap().action, None);
        assert_eq!(
            graph.context("springs").unwrap().action,
            Some(ButtonAction::Invoke("springs".into()))
        );
    }

    #[test]
    fn test_unknown_owner_rejected() {
        let mut config = MenuConfig::from_json(MENU).unwrap();
        config.buttons[0].window = "nowhere".into();
        let err = MenuGraph::build(&config).unwrap_err();
        assert!(matches!(err, ConfigError::UnknownOwner { .. }));
    }

    #[test]
    fn test_unknown_target_rejected() {
        let mut config = MenuConfig::from_json(MENU).unwrap();
        config.buttons[0].next_window = "nowhere".into();
        let err = MenuGraph::build(&config).unwrap_err();
        assert!(matches!(err, ConfigError::UnknownTarget { .. }));
    }

    #[test]
    fn test_unknown_parent_rejected() {
        let mut config = MenuConfig::from_json(MENU).unwrap();
        config.windows[1].parent = Some("ghost".into());
        let err = MenuGraph::build(&config).unwrap_err();
        assert!(matches!(err, ConfigError::UnknownParent { .. }));
    }

    #[test]
    fn test_parent_cycle_rejected() {
        let mut config = MenuConfig::from_json(MENU).unwrap();
        config.windows[0].parent = Some("springs_run".into());
        let err = MenuGraph::build(&config).unwrap_err();
        assert!(matches!(err, ConfigError::ParentCycle(_)));
    }

    #[test]
    fn test_duplicate_button_rejected() {
        let mut config = MenuConfig::from_json(MENU).unwrap();
        config.buttons[1].name = "arms_back".into();
        let err = MenuGraph::build(&config).unwrap_err();
        assert!(matches!(err, ConfigError::DuplicateButton(_)));
    }

    #[test]
    fn test_parent_chains_terminate() {
        let graph = graph();
        for window in graph.windows() {
            let mut hops = 0;
            let mut current = window.parent.clone();
            while let Some(parent) = current {
                hops += 1;
                assert!(hops <= graph.window_count());
                current = graph.window(&parent).unwrap().parent.clone();
            }
        }
    }
}
