//! Window and event loop.

use std::sync::Arc;

use winit::{
    application::ApplicationHandler,
    event::{ElementState, KeyEvent, WindowEvent},
    event_loop::{ActiveEventLoop, ControlFlow, EventLoop},
    keyboard::{KeyCode, PhysicalKey},
    window::{Window, WindowId},
};

use crate::canvas::CanvasSize;
use crate::config::{ParameterId, SimConfig};
use crate::error::SimulationError;
use crate::simulation::Simulation;

const BLOOM_STEP: f64 = 0.1;
const DECAY_STEP: f64 = 0.005;

pub struct App {
    config: SimConfig,
    window: Option<Arc<Window>>,
    simulation: Option<Simulation>,
    error: Option<SimulationError>,
}

impl App {
    pub fn new(config: SimConfig) -> Self {
        Self {
            config,
            window: None,
            simulation: None,
            error: None,
        }
    }

    fn fail(&mut self, event_loop: &ActiveEventLoop, error: SimulationError) {
        log::error!("{error}");
        self.error = Some(error);
        event_loop.exit();
    }

    fn nudge(&mut self, id: ParameterId, step: f64) {
        let Some(sim) = &mut self.simulation else {
            return;
        };
        let Some(current) = sim.config().numeric(id) else {
            return;
        };
        let (min, max) = id.range().unwrap_or((f64::MIN, f64::MAX));
        let value = (current + step).clamp(min, max);
        match sim.on_parameter_change(id.as_str(), value) {
            Ok(_) => log::info!("{id} = {value:.3}"),
            Err(e) => log::warn!("{e}"),
        }
    }

    fn on_key(&mut self, code: KeyCode) {
        match code {
            KeyCode::Space => {
                if let Some(sim) = &mut self.simulation {
                    sim.on_pause();
                }
            }
            KeyCode::KeyR => {
                if let Some(sim) = &mut self.simulation {
                    sim.on_reset();
                }
            }
            KeyCode::KeyF => {
                if let Some(sim) = &mut self.simulation {
                    sim.request_agent_readback();
                }
            }
            KeyCode::BracketLeft => self.nudge(ParameterId::BloomIntensity, -BLOOM_STEP),
            KeyCode::BracketRight => self.nudge(ParameterId::BloomIntensity, BLOOM_STEP),
            KeyCode::Minus => self.nudge(ParameterId::DecayFactor, -DECAY_STEP),
            KeyCode::Equal => self.nudge(ParameterId::DecayFactor, DECAY_STEP),
            _ => {}
        }
    }
}

impl ApplicationHandler for App {
    fn resumed(&mut self, event_loop: &ActiveEventLoop) {
        if self.window.is_some() {
            return;
        }
        let window_attrs = Window::default_attributes()
            .with_title("Ants")
            .with_inner_size(winit::dpi::LogicalSize::new(1280, 720));

        let window = match event_loop.create_window(window_attrs) {
            Ok(window) => Arc::new(window),
            Err(e) => return self.fail(event_loop, e.into()),
        };
        self.window = Some(window.clone());

        match pollster::block_on(Simulation::with_window(self.config.clone(), window.clone())) {
            Ok(sim) => {
                self.simulation = Some(sim);
                window.request_redraw();
            }
            Err(e) => self.fail(event_loop, e),
        }
    }

    fn window_event(&mut self, event_loop: &ActiveEventLoop, _id: WindowId, event: WindowEvent) {
        match event {
            WindowEvent::CloseRequested => {
                event_loop.exit();
            }
            WindowEvent::Resized(physical_size) => {
                if let Some(sim) = &mut self.simulation {
                    sim.request_resize(CanvasSize::from(physical_size));
                }
            }
            WindowEvent::KeyboardInput {
                event:
                    KeyEvent {
                        physical_key: PhysicalKey::Code(code),
                        state: ElementState::Pressed,
                        repeat: false,
                        ..
                    },
                ..
            } => self.on_key(code),
            WindowEvent::RedrawRequested => {
                if let Some(sim) = &mut self.simulation {
                    if let Err(e) = sim.frame() {
                        return self.fail(event_loop, e);
                    }
                }
                if let Some(window) = &self.window {
                    window.request_redraw();
                }
            }
            _ => {}
        }
    }
}

/// Open a window and run the simulation until it is closed.
pub fn run(config: SimConfig) -> Result<(), SimulationError> {
    let event_loop = EventLoop::new()?;
    event_loop.set_control_flow(ControlFlow::Poll);

    let mut app = App::new(config);
    event_loop.run_app(&mut app)?;

    match app.error.take() {
        Some(e) => Err(e),
        None => Ok(()),
    }
}
