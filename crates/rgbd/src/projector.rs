//! Depth image -> point cloud projection and color texture mapping.

use crate::frame::{PixelFormat, PointCloudFrame, VideoFrame};
use crate::pipeline::SensorError;
use rayon::prelude::*;

/// Reference pinhole intrinsics at 640x480.
const BASE_WIDTH: f32 = 640.0;
const BASE_HEIGHT: f32 = 480.0;
const BASE_FX: f32 = 594.21;
const BASE_FY: f32 = 591.04;
const BASE_CX: f32 = 339.5;
const BASE_CY: f32 = 242.7;

/// Meters per raw Z16 unit (millimetres).
pub const DEFAULT_DEPTH_SCALE: f32 = 0.001;

/// Pinhole camera model in pixels.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Intrinsics {
    pub width: u32,
    pub height: u32,
    pub fx: f32,
    pub fy: f32,
    pub cx: f32,
    pub cy: f32,
}

impl Intrinsics {
    /// Reference intrinsics scaled to the given resolution.
    pub fn for_resolution(width: u32, height: u32) -> Self {
        let sx = width as f32 / BASE_WIDTH;
        let sy = height as f32 / BASE_HEIGHT;
        Self {
            width,
            height,
            fx: BASE_FX * sx,
            fy: BASE_FY * sy,
            cx: BASE_CX * sx,
            cy: BASE_CY * sy,
        }
    }

    /// Back-projects pixel `(u, v)` at depth `z` meters.
    #[inline]
    pub fn deproject(&self, u: f32, v: f32, z: f32) -> [f32; 3] {
        [(u - self.cx) * z / self.fx, (v - self.cy) * z / self.fy, z]
    }

    /// Projects a camera-space point to normalized image coordinates.
    #[inline]
    pub fn project_normalized(&self, p: &[f32; 3]) -> [f32; 2] {
        let u = p[0] * self.fx / p[2] + self.cx;
        let v = p[1] * self.fy / p[2] + self.cy;
        [u / self.width as f32, v / self.height as f32]
    }
}

/// The projection primitive a sensor SDK supplies.
pub trait Projector {
    /// One vertex per depth pixel, index aligned with texture coordinates.
    fn project(&self, depth: &VideoFrame) -> Result<PointCloudFrame, SensorError>;

    /// Rewrites texture coordinates so they address pixels of `color`.
    fn map_to(&self, points: &mut PointCloudFrame, color: &VideoFrame);
}

/// Projects with a pinhole model. Depth and color sensors are treated as
/// co-located, each with the reference intrinsics scaled to its resolution.
#[derive(Debug, Clone, Copy)]
pub struct PinholeProjector {
    pub depth_scale: f32,
}

impl Default for PinholeProjector {
    fn default() -> Self {
        Self {
            depth_scale: DEFAULT_DEPTH_SCALE,
        }
    }
}

impl Projector for PinholeProjector {
    fn project(&self, depth: &VideoFrame) -> Result<PointCloudFrame, SensorError> {
        if depth.format != PixelFormat::Z16 {
            return Err(SensorError::Format(depth.format));
        }

        let intr = Intrinsics::for_resolution(depth.width, depth.height);
        let width = depth.width as usize;
        let (w_f, h_f) = (depth.width as f32, depth.height as f32);
        let scale = self.depth_scale;

        let (vertices, tex_coords): (Vec<[f32; 3]>, Vec<[f32; 2]>) = depth
            .data()
            .par_chunks_exact(2)
            .take(depth.pixel_count())
            .enumerate()
            .map(|(i, raw)| {
                let u = (i % width) as f32;
                let v = (i / width) as f32;
                let tc = [(u + 0.5) / w_f, (v + 0.5) / h_f];
                let d = u16::from_le_bytes([raw[0], raw[1]]);
                if d == 0 {
                    ([0.0; 3], tc)
                } else {
                    (intr.deproject(u, v, d as f32 * scale), tc)
                }
            })
            .unzip();

        PointCloudFrame::new(vertices, tex_coords)
    }

    fn map_to(&self, points: &mut PointCloudFrame, color: &VideoFrame) {
        let intr = Intrinsics::for_resolution(color.width, color.height);
        let mapped: Vec<[f32; 2]> = points
            .vertices()
            .par_iter()
            .map(|v| {
                if PointCloudFrame::is_valid(v) {
                    intr.project_normalized(v)
                } else {
                    [0.0, 0.0]
                }
            })
            .collect();
        points.tex_coords_mut().copy_from_slice(&mapped);
    }
}
