//! # Ants
//!
//! A GPU agent simulation in the Physarum family. Every frame a population
//! of agents senses a half-resolution trail texture, turns toward the
//! strongest match for its own colour and moves. The agents are then
//! painted into an HDR trail that decays over time and is run through a
//! multi-scale bloom before presentation.
//!
//! ## Quick Start
//!
//! ```ignore
//! use ants::prelude::*;
//!
//! fn main() -> Result<(), SimulationError> {
//!     let config = SimConfig {
//!         population: 200_000,
//!         num_blur_scales: 6,
//!         ..SimConfig::default()
//!     };
//!     ants::app::run(config)
//! }
//! ```
//!
//! ## Frame structure
//!
//! Each frame is described by a [`FramePlan`](schedule::FramePlan): an
//! ordered list of passes, each naming what it reads and writes, and the
//! swap points of the three ping-pong pairs (agent state, trail, sensing).
//! The plan is checked for read/write aliasing before it is executed, and
//! the executor checks the concrete GPU resources again while recording.
//!
//! 1. Decay the sensing and trail textures into their other halves.
//! 2. Run the agent kernel, then swap the agent buffers.
//! 3. Paint agents additively into the trail and, at half scale, into the
//!    sensing texture. Swap both.
//! 4. Threshold, then for each blur scale downscale and blur horizontally
//!    and vertically.
//! 5. Merge the trail with every blurred scale and present it.
//!
//! While paused only the presentation pass runs.
//!
//! ## Headless use
//!
//! [`Simulation::headless`](simulation::Simulation::headless) renders into
//! an offscreen texture; this is what the integration tests drive.
//!
//! ```ignore
//! let mut sim = Simulation::headless(SimConfig::default(), CanvasSize::new(640, 480))?;
//! sim.frame()?;
//! let agents = sim.read_agents()?;
//! ```

pub mod app;
pub mod canvas;
pub mod config;
pub mod double_buffer;
pub mod error;
pub mod gpu;
pub mod palette;
pub mod pipeline;
pub mod schedule;
pub mod simulation;
pub mod spawn;
pub mod time;

pub use bytemuck;
pub use glam;

/// Everything needed to configure and drive a simulation.
pub mod prelude {
    pub use crate::canvas::CanvasSize;
    pub use crate::config::{AgentParams, ParamEffect, ParamValue, ParameterId, SimConfig};
    pub use crate::error::{ConfigError, GpuError, PipelineError, SimulationError};
    pub use crate::palette::{Color, Palette};
    pub use crate::simulation::{FrameOutcome, Simulation};
    pub use crate::spawn::Agent;
    pub use crate::time::Time;
}
