//! CPU side of a frame: projection, point primitives and tile quads.
//! Nothing here touches the GPU.

use crate::camera::CameraState;
use crate::layout::Rect;
use crate::textures::TextureId;
use glam::Mat4;
use rayon::prelude::*;
use rgbd::{PointCloudFrame, StreamKind};

pub const FOV_Y_DEG: f32 = 60.0;
pub const Z_NEAR: f32 = 0.1;
pub const Z_FAR: f32 = 100.0;
/// Viewport width at which points are one pixel wide.
pub const REFERENCE_WIDTH_PX: f32 = 640.0;

/// Background of the point cloud view (153/255 grey).
pub const CLEAR_COLOR: wgpu::Color = wgpu::Color {
    r: 0.6,
    g: 0.6,
    b: 0.6,
    a: 1.0,
};

/// Per-instance data of one drawn point.
/// Must match the instance inputs of `POINTS_WGSL`.
#[repr(C)]
#[derive(Clone, Copy, Debug, PartialEq, bytemuck::Pod, bytemuck::Zeroable)]
pub struct PointVertex {
    pub position: [f32; 3],
    pub uv: [f32; 2],
}

/// Must match `PointUniforms` in `POINTS_WGSL`.
#[repr(C)]
#[derive(Clone, Copy, Debug, bytemuck::Pod, bytemuck::Zeroable)]
pub struct PointUniforms {
    pub view_proj: [[f32; 4]; 4],
    pub viewport_size: [f32; 2],
    pub point_size_px: f32,
    pub _pad: f32,
}

const _: [(); 80] = [(); core::mem::size_of::<PointUniforms>()];

/// One corner of a stream tile, already in clip space.
#[repr(C)]
#[derive(Clone, Copy, Debug, PartialEq, bytemuck::Pod, bytemuck::Zeroable)]
pub struct QuadVertex {
    pub position: [f32; 2],
    pub uv: [f32; 2],
}

pub fn projection(viewport_width: f32, viewport_height: f32) -> Mat4 {
    Mat4::perspective_rh(
        FOV_Y_DEG.to_radians(),
        viewport_width / viewport_height.max(1.0),
        Z_NEAR,
        Z_FAR,
    )
}

/// Points grow with the viewport so density looks the same at any size.
#[inline]
pub fn point_size(viewport_width: f32) -> f32 {
    viewport_width / REFERENCE_WIDTH_PX
}

pub fn point_uniforms(camera: &CameraState, viewport: &Rect) -> PointUniforms {
    let view_proj = projection(viewport.w, viewport.h) * camera.view();
    PointUniforms {
        view_proj: view_proj.to_cols_array_2d(),
        viewport_size: [viewport.w, viewport.h],
        point_size_px: point_size(viewport.w),
        _pad: 0.0,
    }
}

/// Instances for every vertex that carries depth; z == 0 is skipped.
pub fn build_point_vertices(frame: &PointCloudFrame) -> Vec<PointVertex> {
    frame
        .vertices()
        .par_iter()
        .zip(frame.tex_coords().par_iter())
        .filter(|(v, _)| PointCloudFrame::is_valid(v))
        .map(|(v, uv)| PointVertex {
            position: *v,
            uv: *uv,
        })
        .collect()
}

/// How the point cloud is colored this frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PointFill<K = TextureId> {
    /// Sample the stream texture the coordinates were mapped to.
    Textured(K),
    /// No color source in the bundle; draw the bare geometry.
    Untextured,
}

/// `None` while the mapped stream has no texture yet, so the points are
/// skipped until it is uploaded.
pub fn point_fill<K>(point_source: Option<StreamKind>, handle: Option<K>) -> Option<PointFill<K>> {
    match point_source {
        None => Some(PointFill::Untextured),
        Some(_) => handle.map(PointFill::Textured),
    }
}

/// Texture to bind for the points, or `None` to skip them.
pub fn resolve_point_texture<'t, K, T>(
    fill: Option<PointFill<K>>,
    lookup: impl Fn(K) -> Option<&'t T>,
    untextured: &'t T,
) -> Option<&'t T> {
    match fill? {
        PointFill::Textured(id) => lookup(id),
        PointFill::Untextured => Some(untextured),
    }
}

/// Tiles whose handle resolves to a texture; unknown handles are dropped.
pub fn resolve_tiles<'t, K: Copy, T>(
    tiles: &[(K, Rect)],
    lookup: impl Fn(K) -> Option<&'t T>,
) -> Vec<(&'t T, Rect)> {
    tiles
        .iter()
        .filter_map(|(id, rect)| lookup(*id).map(|t| (t, *rect)))
        .collect()
}

/// Triangle-strip corners of `rect` (window pixels, origin top-left) on a
/// surface of `surface` pixels. Image row 0 maps to the top edge.
pub fn tile_quad(rect: &Rect, surface: [f32; 2]) -> [QuadVertex; 4] {
    let [sw, sh] = surface;
    let to_ndc = |x: f32, y: f32| [2.0 * x / sw - 1.0, 1.0 - 2.0 * y / sh];

    let (l, t, r, b) = (rect.x, rect.y, rect.x + rect.w, rect.y + rect.h);
    [
        QuadVertex { position: to_ndc(l, t), uv: [0.0, 0.0] },
        QuadVertex { position: to_ndc(l, b), uv: [0.0, 1.0] },
        QuadVertex { position: to_ndc(r, t), uv: [1.0, 0.0] },
        QuadVertex { position: to_ndc(r, b), uv: [1.0, 1.0] },
    ]
}
