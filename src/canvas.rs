//! Canvas geometry: target sizes, blur pyramid and projections.

use glam::Mat4;

/// Size of a drawable area in physical pixels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct CanvasSize {
    pub width: u32,
    pub height: u32,
}

impl CanvasSize {
    /// Create a size; zero dimensions are raised to one.
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            width: width.max(1),
            height: height.max(1),
        }
    }

    /// Size of the sensing target: half the canvas, floored, at least 1.
    pub fn sensing(self) -> Self {
        self.scaled_pow2(1)
    }

    /// `self / 2^level`, floored, at least one pixel.
    pub fn scaled_pow2(self, level: u32) -> Self {
        let shift = level.min(31);
        Self::new(self.width >> shift, self.height >> shift)
    }

    /// Sizes of every blur scale, full resolution first.
    pub fn blur_scales(self, count: u32) -> Vec<CanvasSize> {
        (0..count).map(|i| self.scaled_pow2(i)).collect()
    }

    pub fn as_vec2(self) -> [f32; 2] {
        [self.width as f32, self.height as f32]
    }

    pub fn extent(self) -> wgpu::Extent3d {
        wgpu::Extent3d {
            width: self.width,
            height: self.height,
            depth_or_array_layers: 1,
        }
    }

    /// Pixel-space orthographic projection, origin top-left, y down.
    pub fn projection(self) -> Mat4 {
        Mat4::orthographic_rh(0.0, self.width as f32, self.height as f32, 0.0, -1.0, 1.0)
    }

    pub fn center(self) -> [f32; 2] {
        [self.width as f32 * 0.5, self.height as f32 * 0.5]
    }
}

impl From<winit::dpi::PhysicalSize<u32>> for CanvasSize {
    fn from(size: winit::dpi::PhysicalSize<u32>) -> Self {
        Self::new(size.width, size.height)
    }
}

/// Remembers the last applied canvas size and holds a pending resize until
/// the next frame boundary.
#[derive(Debug)]
pub struct ResizeTracker {
    applied: CanvasSize,
    pending: Option<CanvasSize>,
}

impl ResizeTracker {
    pub fn new(initial: CanvasSize) -> Self {
        Self {
            applied: initial,
            pending: None,
        }
    }

    /// Record a new size. Later requests in the same frame win.
    pub fn request(&mut self, size: CanvasSize) {
        self.pending = Some(size);
    }

    /// Take the pending size if it differs from the applied one.
    pub fn take_change(&mut self) -> Option<CanvasSize> {
        let size = self.pending.take()?;
        if size == self.applied {
            return None;
        }
        self.applied = size;
        Some(size)
    }

    pub fn applied(&self) -> CanvasSize {
        self.applied
    }

    pub fn has_pending(&self) -> bool {
        self.pending.is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use glam::Vec4;

    #[test]
    fn sensing_is_half_floor_min_one() {
        assert_eq!(CanvasSize::new(801, 600).sensing(), CanvasSize::new(400, 300));
        assert_eq!(CanvasSize::new(1, 1).sensing(), CanvasSize::new(1, 1));
        assert_eq!(CanvasSize::new(0, 0), CanvasSize::new(1, 1));
    }

    #[test]
    fn blur_scales_halve() {
        let scales = CanvasSize::new(800, 600).blur_scales(4);
        assert_eq!(
            scales,
            vec![
                CanvasSize::new(800, 600),
                CanvasSize::new(400, 300),
                CanvasSize::new(200, 150),
                CanvasSize::new(100, 75),
            ]
        );
        assert_eq!(CanvasSize::new(4, 4).blur_scales(5)[4], CanvasSize::new(1, 1));
    }

    #[test]
    fn projection_maps_corners_to_clip_space() {
        let p = CanvasSize::new(800, 600).projection();
        let top_left = p * Vec4::new(0.0, 0.0, 0.0, 1.0);
        let bottom_right = p * Vec4::new(800.0, 600.0, 0.0, 1.0);
        assert!((top_left.x + 1.0).abs() < 1e-6 && (top_left.y - 1.0).abs() < 1e-6);
        assert!((bottom_right.x - 1.0).abs() < 1e-6 && (bottom_right.y + 1.0).abs() < 1e-6);
    }

    #[test]
    fn resize_applies_only_changes() {
        let mut tracker = ResizeTracker::new(CanvasSize::new(800, 600));
        tracker.request(CanvasSize::new(800, 600));
        assert_eq!(tracker.take_change(), None);

        tracker.request(CanvasSize::new(1024, 768));
        tracker.request(CanvasSize::new(640, 480));
        assert!(tracker.has_pending());
        assert_eq!(tracker.take_change(), Some(CanvasSize::new(640, 480)));
        assert_eq!(tracker.applied(), CanvasSize::new(640, 480));
        assert_eq!(tracker.take_change(), None);
    }
}
