mod camera;
mod game;
mod heightmap;
mod mesh;
mod renderer;
mod terrain;

use renderer::State;
use std::sync::Arc;
use winit::{
    application::ApplicationHandler,
    event::*,
    event_loop::{ActiveEventLoop, EventLoop},
    keyboard::{Key, NamedKey},
    window::{Window, WindowId},
};

const DEFAULT_HEIGHTMAP: &str = "heightmap.bmp";

struct App {
    heightmap_path: String,
    window: Option<Arc<Window>>,
    state: Option<State>,
    last_score: u32,
}

impl App {
    fn new(heightmap_path: String) -> Self {
        Self {
            heightmap_path,
            window: None,
            state: None,
            last_score: 0,
        }
    }
}

impl ApplicationHandler for App {
    fn resumed(&mut self, event_loop: &ActiveEventLoop) {
        if self.window.is_none() {
            let window_attributes = Window::default_attributes().with_title("Spintop");
            let window = match event_loop.create_window(window_attributes) {
                Ok(w) => Arc::new(w),
                Err(e) => {
                    log::error!("failed to create window: {e:?}");
                    event_loop.exit();
                    return;
                }
            };
            self.window = Some(window.clone());

            match pollster::block_on(State::new(window, &self.heightmap_path)) {
                Ok(state) => self.state = Some(state),
                Err(e) => {
                    log::error!("failed to create state: {e:?}");
                    event_loop.exit();
                }
            }
        }
    }

    fn window_event(&mut self, event_loop: &ActiveEventLoop, id: WindowId, event: WindowEvent) {
        let window = match self.window.as_ref() {
            Some(w) => w,
            None => return,
        };
        let state = match self.state.as_mut() {
            Some(s) => s,
            None => return,
        };

        if id != window.id() {
            return;
        }

        if !state.input(&event) {
            match event {
                WindowEvent::CloseRequested
                | WindowEvent::KeyboardInput {
                    event:
                        KeyEvent {
                            state: ElementState::Pressed,
                            logical_key: Key::Named(NamedKey::Escape),
                            ..
                        },
                    ..
                } => {
                    event_loop.exit();
                }
                WindowEvent::Resized(physical_size) => {
                    state.resize(physical_size);
                    window.request_redraw();
                }
                WindowEvent::RedrawRequested => match state.render() {
                    Ok(_) => {}
                    Err(wgpu::SurfaceError::Lost) => state.resize(state.size()),
                    Err(wgpu::SurfaceError::OutOfMemory) => event_loop.exit(),
                    Err(e) => log::warn!("surface error: {e:?}"),
                },
                _ => {}
            }
        }
    }

    fn about_to_wait(&mut self, _event_loop: &ActiveEventLoop) {
        if let Some(state) = self.state.as_mut() {
            state.update();
            if state.score() != self.last_score {
                self.last_score = state.score();
                if let Some(window) = self.window.as_ref() {
                    window.set_title(&format!("Spintop - score: {}", self.last_score));
                }
            }
        }
        if let Some(window) = self.window.as_ref() {
            window.request_redraw();
        }
    }
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::init();
    let heightmap_path = std::env::args()
        .nth(1)
        .unwrap_or_else(|| DEFAULT_HEIGHTMAP.to_string());
    let event_loop = EventLoop::new()?;
    let mut app = App::new(heightmap_path);
    event_loop.run_app(&mut app)?;
    Ok(())
}
