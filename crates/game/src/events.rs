//! Window and keyboard event handling.

use input::KeyCode;
use winit::event::WindowEvent;
use winit::keyboard::PhysicalKey;

use crate::GameState;

impl GameState {
    /// Returns true when the app should exit.
    pub(crate) fn handle_window_event(&mut self, event: WindowEvent) -> bool {
        match event {
            WindowEvent::CloseRequested => {
                self.running = false;
                true
            }
            WindowEvent::Resized(size) => {
                self.renderer.resize(size.width, size.height);
                self.camera.set_aspect(size.width, size.height);
                false
            }
            WindowEvent::Focused(false) => {
                // Keys released while unfocused never reach us.
                self.input.release_all();
                false
            }
            WindowEvent::KeyboardInput { event, .. } => {
                if let PhysicalKey::Code(key) = event.physical_key {
                    self.input.process_keyboard(key, event.state);
                    if event.state.is_pressed() && !event.repeat {
                        match key {
                            KeyCode::Escape => {
                                self.running = false;
                                return true;
                            }
                            KeyCode::F3 => self.show_debug = !self.show_debug,
                            _ => {}
                        }
                    }
                }
                false
            }
            WindowEvent::RedrawRequested => {
                self.update();
                if let Err(e) = self.render() {
                    log::error!("Render error: {:#}", e);
                }
                self.window.request_redraw();
                false
            }
            _ => false,
        }
    }
}
