//! Keyboard input mapped onto driving actions.
//!
//! Raw key events are folded into a small action table that the simulation
//! reads once per frame through the [`ActionProvider`] trait. There is no event
//! queue: a press sets the action, a release clears it immediately.

use std::collections::{HashMap, HashSet};

/// Logical driving actions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Action {
    Forward,
    Backward,
    Left,
    Right,
    Reset,
}

impl Action {
    pub const ALL: [Action; 5] = [
        Action::Forward,
        Action::Backward,
        Action::Left,
        Action::Right,
        Action::Reset,
    ];
}

/// Read-only view of the current action state.
pub trait ActionProvider {
    fn is_pressed(&self, action: Action) -> bool;
}

/// Key to action table.
#[derive(Debug, Clone)]
pub struct KeyBindings {
    map: HashMap<KeyCode, Action>,
}

impl Default for KeyBindings {
    /// Arrow keys and WASD for driving, R to reset.
    fn default() -> Self {
        let mut bindings = Self::empty();
        bindings.bind(KeyCode::ArrowUp, Action::Forward);
        bindings.bind(KeyCode::KeyW, Action::Forward);
        bindings.bind(KeyCode::ArrowDown, Action::Backward);
        bindings.bind(KeyCode::KeyS, Action::Backward);
        bindings.bind(KeyCode::ArrowLeft, Action::Left);
        bindings.bind(KeyCode::KeyA, Action::Left);
        bindings.bind(KeyCode::ArrowRight, Action::Right);
        bindings.bind(KeyCode::KeyD, Action::Right);
        bindings.bind(KeyCode::KeyR, Action::Reset);
        bindings
    }
}

impl KeyBindings {
    pub fn empty() -> Self {
        Self {
            map: HashMap::new(),
        }
    }

    /// Bind a key to an action, replacing any previous binding for that key.
    pub fn bind(&mut self, key: KeyCode, action: Action) {
        self.map.insert(key, action);
    }

    pub fn action_for(&self, key: KeyCode) -> Option<Action> {
        self.map.get(&key).copied()
    }
}

/// Current state of every action.
#[derive(Debug, Default)]
pub struct ActionState {
    bindings: KeyBindings,
    pressed: HashSet<Action>,
}

impl ActionState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Process a keyboard event. Unbound keys are ignored.
    pub fn process_keyboard(&mut self, key: KeyCode, state: ElementState) {
        let Some(action) = self.bindings.action_for(key) else {
            return;
        };
        match state {
            ElementState::Pressed => {
                if self.pressed.insert(action) {
                    log::trace!("{:?} pressed", action);
                }
            }
            ElementState::Released => {
                if self.pressed.remove(&action) {
                    log::trace!("{:?} released", action);
                }
            }
        }
    }

    /// Set an action directly, bypassing the key table.
    pub fn set(&mut self, action: Action, pressed: bool) {
        if pressed {
            self.pressed.insert(action);
        } else {
            self.pressed.remove(&action);
        }
    }

    /// Drop every held action, e.g. when the window loses focus.
    pub fn release_all(&mut self) {
        self.pressed.clear();
    }
}

impl ActionProvider for ActionState {
    fn is_pressed(&self, action: Action) -> bool {
        self.pressed.contains(&action)
    }
}

// Re-export for convenience
pub use winit::event::ElementState;
pub use winit::keyboard::KeyCode;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn press_and_release_toggle_action() {
        let mut input = ActionState::new();
        input.process_keyboard(KeyCode::KeyW, ElementState::Pressed);
        assert!(input.is_pressed(Action::Forward));
        assert!(!input.is_pressed(Action::Backward));

        input.process_keyboard(KeyCode::KeyW, ElementState::Released);
        assert!(!input.is_pressed(Action::Forward));
    }

    #[test]
    fn arrows_and_letters_share_actions() {
        let mut input = ActionState::new();
        input.process_keyboard(KeyCode::ArrowLeft, ElementState::Pressed);
        input.process_keyboard(KeyCode::KeyD, ElementState::Pressed);
        input.process_keyboard(KeyCode::KeyR, ElementState::Pressed);
        assert!(input.is_pressed(Action::Left));
        assert!(input.is_pressed(Action::Right));
        assert!(input.is_pressed(Action::Reset));

        // Release clears the action even though it came from another key.
        input.process_keyboard(KeyCode::KeyA, ElementState::Released);
        assert!(!input.is_pressed(Action::Left));
    }

    #[test]
    fn unbound_keys_are_ignored() {
        let mut input = ActionState::new();
        input.process_keyboard(KeyCode::Space, ElementState::Pressed);
        assert!(Action::ALL.iter().all(|a| !input.is_pressed(*a)));
    }
}
