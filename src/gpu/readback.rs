//! Diagnostic GPU readback.
//!
//! A [`Readback`] copies a buffer or texture into a staging buffer and maps
//! it. It never blocks on its own: [`Readback::poll`] checks once and returns
//! [`Poll::Pending`] until the map completes or the poll budget runs out.
//! Dropping a pending readback cancels it.

use std::sync::mpsc;
use std::task::Poll;

use super::resources::{AgentBuffer, RenderTarget};
use super::GpuContext;
use crate::error::GpuError;
use crate::spawn::Agent;

/// Polls allowed before a readback is abandoned.
pub const DEFAULT_POLL_BUDGET: u32 = 600;

#[derive(Debug, Clone, Copy)]
enum Layout {
    Linear { len: u64 },
    Rows { padded: u32, unpadded: u32, height: u32 },
}

pub struct Readback {
    staging: wgpu::Buffer,
    receiver: mpsc::Receiver<Result<(), wgpu::BufferAsyncError>>,
    layout: Layout,
    polls: u32,
    budget: u32,
    finished: bool,
}

impl Readback {
    /// Start reading the first `count` agents of `agents`.
    pub fn agents(gpu: &GpuContext, agents: &AgentBuffer, count: u32) -> Self {
        let len = (count.max(1) as u64) * Agent::STRIDE;
        let staging = staging_buffer(gpu, "Agent Readback", len);

        let mut encoder = gpu
            .device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some("Agent Readback Encoder"),
            });
        encoder.copy_buffer_to_buffer(&agents.buffer, 0, &staging, 0, len);
        gpu.queue.submit(Some(encoder.finish()));

        Self::start(staging, Layout::Linear {
            len: count as u64 * Agent::STRIDE,
        })
    }

    /// Start reading every texel of `target`, row padding removed.
    pub fn texture(gpu: &GpuContext, target: &RenderTarget) -> Self {
        let unpadded = target.size.width * target.format.bytes_per_pixel();
        let align = wgpu::COPY_BYTES_PER_ROW_ALIGNMENT;
        let padded = unpadded.div_ceil(align) * align;
        let height = target.size.height;
        let staging = staging_buffer(gpu, "Texture Readback", padded as u64 * height as u64);

        let mut encoder = gpu
            .device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some("Texture Readback Encoder"),
            });
        encoder.copy_texture_to_buffer(
            wgpu::TexelCopyTextureInfo {
                texture: &target.texture,
                mip_level: 0,
                origin: wgpu::Origin3d::ZERO,
                aspect: wgpu::TextureAspect::All,
            },
            wgpu::TexelCopyBufferInfo {
                buffer: &staging,
                layout: wgpu::TexelCopyBufferLayout {
                    offset: 0,
                    bytes_per_row: Some(padded),
                    rows_per_image: Some(height),
                },
            },
            target.size.extent(),
        );
        gpu.queue.submit(Some(encoder.finish()));

        Self::start(staging, Layout::Rows {
            padded,
            unpadded,
            height,
        })
    }

    fn start(staging: wgpu::Buffer, layout: Layout) -> Self {
        let (tx, rx) = mpsc::channel();
        staging
            .slice(..)
            .map_async(wgpu::MapMode::Read, move |result| {
                if tx.send(result).is_err() {
                    log::debug!("readback dropped before its buffer was mapped");
                }
            });
        Self {
            staging,
            receiver: rx,
            layout,
            polls: 0,
            budget: DEFAULT_POLL_BUDGET,
            finished: false,
        }
    }

    pub fn with_budget(mut self, budget: u32) -> Self {
        self.budget = budget.max(1);
        self
    }

    pub fn polls(&self) -> u32 {
        self.polls
    }

    /// Check once for completion without blocking.
    pub fn poll(&mut self, device: &wgpu::Device) -> Poll<Result<Vec<u8>, GpuError>> {
        self.poll_with(device, wgpu::Maintain::Poll)
    }

    /// Block until the readback completes.
    pub fn wait(mut self, device: &wgpu::Device) -> Result<Vec<u8>, GpuError> {
        loop {
            if let Poll::Ready(result) = self.poll_with(device, wgpu::Maintain::Wait) {
                return result;
            }
        }
    }

    fn poll_with(
        &mut self,
        device: &wgpu::Device,
        maintain: wgpu::Maintain,
    ) -> Poll<Result<Vec<u8>, GpuError>> {
        if self.finished {
            return Poll::Ready(Err(GpuError::BufferMapping("readback already consumed".into())));
        }
        let blocking = matches!(maintain, wgpu::Maintain::Wait);
        let queue_empty = device.poll(maintain).is_queue_empty();
        log::trace!("readback poll {}: queue empty = {queue_empty}", self.polls);

        match self.receiver.try_recv() {
            Ok(Ok(())) => {
                self.finished = true;
                Poll::Ready(Ok(self.copy_out()))
            }
            Ok(Err(e)) => {
                self.finished = true;
                Poll::Ready(Err(GpuError::BufferMapping(e.to_string())))
            }
            Err(mpsc::TryRecvError::Empty) => {
                self.polls += 1;
                match still_pending(self.polls, self.budget, blocking, queue_empty) {
                    Ok(()) => Poll::Pending,
                    Err(e) => {
                        self.finished = true;
                        Poll::Ready(Err(e))
                    }
                }
            }
            Err(mpsc::TryRecvError::Disconnected) => {
                self.finished = true;
                Poll::Ready(Err(GpuError::BufferMapping("map callback was dropped".into())))
            }
        }
    }

    fn copy_out(&self) -> Vec<u8> {
        let bytes = {
            let data = self.staging.slice(..).get_mapped_range();
            match self.layout {
                Layout::Linear { len } => data[..len as usize].to_vec(),
                Layout::Rows {
                    padded,
                    unpadded,
                    height,
                } => strip_row_padding(&data, padded, unpadded, height),
            }
        };
        self.staging.unmap();
        bytes
    }
}

/// Whether an unfinished map may still complete. A blocking poll that
/// drained the queue without firing the callback never will.
fn still_pending(
    polls: u32,
    budget: u32,
    blocking: bool,
    queue_empty: bool,
) -> Result<(), GpuError> {
    if blocking && queue_empty {
        Err(GpuError::BufferMapping(
            "queue drained without completing the map".into(),
        ))
    } else if polls >= budget {
        Err(GpuError::ReadbackTimeout(polls))
    } else {
        Ok(())
    }
}

fn staging_buffer(gpu: &GpuContext, label: &str, size: u64) -> wgpu::Buffer {
    gpu.device.create_buffer(&wgpu::BufferDescriptor {
        label: Some(label),
        size: size.max(wgpu::COPY_BUFFER_ALIGNMENT),
        usage: wgpu::BufferUsages::MAP_READ | wgpu::BufferUsages::COPY_DST,
        mapped_at_creation: false,
    })
}

fn strip_row_padding(data: &[u8], padded: u32, unpadded: u32, height: u32) -> Vec<u8> {
    let mut out = Vec::with_capacity((unpadded * height) as usize);
    for row in data.chunks(padded as usize).take(height as usize) {
        out.extend_from_slice(&row[..unpadded as usize]);
    }
    out
}

/// Reinterpret readback bytes as agents.
pub fn decode_agents(bytes: &[u8]) -> Vec<Agent> {
    bytes
        .chunks_exact(Agent::STRIDE as usize)
        .map(bytemuck::pod_read_unaligned)
        .collect()
}

/// Mean position of a population, `None` when empty.
pub fn centroid(agents: &[Agent]) -> Option<[f32; 2]> {
    if agents.is_empty() {
        return None;
    }
    let n = agents.len() as f64;
    let (sx, sy) = agents
        .iter()
        .fold((0.0f64, 0.0f64), |(sx, sy), a| (sx + a.x as f64, sy + a.y as f64));
    Some([(sx / n) as f32, (sy / n) as f32])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn nonblocking_poll_waits_for_budget() {
        assert!(still_pending(1, 3, false, true).is_ok());
        assert!(still_pending(2, 3, false, false).is_ok());
        assert!(matches!(
            still_pending(3, 3, false, false),
            Err(GpuError::ReadbackTimeout(3))
        ));
    }

    #[test]
    fn drained_blocking_poll_gives_up() {
        assert!(still_pending(1, 100, true, false).is_ok());
        assert!(matches!(
            still_pending(1, 100, true, true),
            Err(GpuError::BufferMapping(_))
        ));
    }

    #[test]
    fn strips_padding_per_row() {
        let data: Vec<u8> = (0..16).collect();
        let out = strip_row_padding(&data, 8, 3, 2);
        assert_eq!(out, vec![0, 1, 2, 8, 9, 10]);
    }

    #[test]
    fn decodes_agents() {
        let agents = [Agent { x: 1.0, y: 2.0, angle: 3.0 }];
        let bytes = bytemuck::cast_slice(&agents).to_vec();
        assert_eq!(decode_agents(&bytes), agents);
    }

    #[test]
    fn centroid_of_population() {
        let agents = [
            Agent { x: 0.0, y: 0.0, angle: 0.0 },
            Agent { x: 10.0, y: 4.0, angle: 1.0 },
        ];
        assert_eq!(centroid(&agents), Some([5.0, 2.0]));
        assert_eq!(centroid(&[]), None);
    }
}
