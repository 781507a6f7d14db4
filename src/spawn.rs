//! Agent layout and initial placement.

use bytemuck::{Pod, Zeroable};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::f32::consts::TAU;

use crate::canvas::CanvasSize;

/// One agent as stored in the GPU state buffers.
///
/// Matches the kernel's `array<f32>` stride of three floats and the
/// compositor's vertex layout (position at offset 0, angle at offset 8).
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Default, Pod, Zeroable)]
pub struct Agent {
    pub x: f32,
    pub y: f32,
    /// Heading in radians.
    pub angle: f32,
}

impl Agent {
    pub const STRIDE: u64 = std::mem::size_of::<Agent>() as u64;
}

/// Place `count` agents uniformly in a disc of `radius` around the canvas
/// centre, each heading straight away from the centre.
pub fn spawn_disc(count: u32, canvas: CanvasSize, radius: f32, seed: Option<u64>) -> Vec<Agent> {
    let mut rng = match seed {
        Some(seed) => StdRng::seed_from_u64(seed),
        None => StdRng::from_entropy(),
    };
    let [cx, cy] = canvas.center();

    (0..count)
        .map(|_| {
            let theta = rng.gen_range(0.0..TAU);
            // sqrt keeps the density uniform over the disc area
            let r = radius * rng.gen::<f32>().sqrt();
            let (dy, dx) = theta.sin_cos();
            Agent {
                x: cx + dx * r,
                y: cy + dy * r,
                angle: theta,
            }
        })
        .collect()
}
