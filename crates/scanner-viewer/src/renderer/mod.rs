//! The rendering orchestrator. Owns the GPU context, the depth target, the
//! point and tile pipelines, and every stream texture.

pub mod context;
pub mod pipelines;
pub mod scene;
pub mod targets;
pub mod textures;

use self::{
    context::GfxContext,
    pipelines::{points::PointPipeline, quads::QuadPipeline},
    scene::{PointFill, PointUniforms, PointVertex, CLEAR_COLOR},
    targets::Targets,
    textures::{GpuTexture, TextureBindings, WgpuTextures},
};
use crate::{
    error::TextureError,
    layout::Rect,
    textures::{TextureBackend, TextureCache, TextureId},
};
use rgbd::{StreamKind, VideoFrame};
use std::sync::Arc;
use winit::window::Window;

/// Everything one frame draws, in window pixels.
pub struct Scene<'a> {
    pub point_viewport: Rect,
    pub uniforms: PointUniforms,
    /// `None` skips the points for this frame.
    pub point_fill: Option<PointFill>,
    pub tiles: &'a [(TextureId, Rect)],
}

/// Owns all rendering-related state.
pub struct Renderer {
    pub gfx: GfxContext,
    pub targets: Targets,
    bindings: TextureBindings,
    points: PointPipeline,
    quads: QuadPipeline,
    textures: TextureCache<GpuTexture>,
    /// 1x1 white, bound for points without a color source.
    untextured: GpuTexture,
    pub egui_renderer: egui_wgpu::Renderer,
}

impl Renderer {
    pub async fn new(window: Arc<Window>) -> anyhow::Result<Self> {
        let gfx = GfxContext::new(window).await?;
        let size = gfx.size;

        let targets = Targets::new(&gfx.device, size);
        let bindings = TextureBindings::new(&gfx.device);
        let points = PointPipeline::new(
            &gfx.device,
            gfx.config.format,
            targets.depth_fmt,
            &bindings.layout,
        );
        let quads = QuadPipeline::new(&gfx.device, gfx.config.format, &bindings.layout);

        let untextured = {
            let backend = WgpuTextures {
                device: &gfx.device,
                queue: &gfx.queue,
                bindings: &bindings,
            };
            let texture = backend.allocate("Untextured Points", 1, 1);
            backend.write(&texture, &[255; 4], 1, 1);
            texture
        };

        let egui_renderer =
            egui_wgpu::Renderer::new(&gfx.device, gfx.config.format, None, 1);

        Ok(Self {
            gfx,
            targets,
            bindings,
            points,
            quads,
            textures: TextureCache::new(),
            untextured,
            egui_renderer,
        })
    }

    pub fn resize(&mut self, new_size: winit::dpi::PhysicalSize<u32>) {
        if new_size.width > 0 && new_size.height > 0 {
            self.gfx.resize(new_size);
            self.targets.resize(&self.gfx.device, new_size);
        }
    }

    /// Uploads `frame` into the texture owned by `stream`.
    pub fn upload_texture(&mut self, stream: StreamKind, frame: &VideoFrame) -> Result<TextureId, TextureError> {
        let backend = WgpuTextures {
            device: &self.gfx.device,
            queue: &self.gfx.queue,
            bindings: &self.bindings,
        };
        self.textures.upload(
            &backend,
            stream,
            frame.data(),
            frame.width,
            frame.height,
            frame.format,
        )
    }

    pub fn texture_handle(&self, stream: StreamKind) -> Option<TextureId> {
        self.textures.get_handle(stream)
    }

    pub fn upload_points(&mut self, points: &[PointVertex]) {
        self.points.upload(&self.gfx.device, &self.gfx.queue, points);
    }

    pub fn point_count(&self) -> u32 {
        self.points.count()
    }

    pub fn render(&self, swap_view: &wgpu::TextureView, scene: &Scene<'_>) {
        let surface = self.gfx.surface_size();
        let mut encoder = self
            .gfx
            .device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some("Frame Encoder"),
            });

        self.points.write_uniforms(&self.gfx.queue, &scene.uniforms);

        // Pass 1: clear, then the point cloud inside its viewport.
        {
            let mut pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
                label: Some("Point Cloud Pass"),
                color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                    view: swap_view,
                    resolve_target: None,
                    ops: wgpu::Operations {
                        load: wgpu::LoadOp::Clear(CLEAR_COLOR),
                        store: wgpu::StoreOp::Store,
                    },
                })],
                depth_stencil_attachment: Some(wgpu::RenderPassDepthStencilAttachment {
                    view: &self.targets.depth,
                    depth_ops: Some(wgpu::Operations {
                        load: wgpu::LoadOp::Clear(1.0),
                        store: wgpu::StoreOp::Store,
                    }),
                    stencil_ops: None,
                }),
                timestamp_writes: None,
                occlusion_query_set: None,
            });

            let texture = scene::resolve_point_texture(
                scene.point_fill,
                |id| self.textures.texture(id),
                &self.untextured,
            );
            if let (Some(texture), Some(vp)) = (texture, clamp_viewport(&scene.point_viewport, surface)) {
                pass.set_viewport(vp.x, vp.y, vp.w, vp.h, 0.0, 1.0);
                self.points.draw(&mut pass, &texture.bind_group);
            }
        }

        // Pass 2: stream tiles on top, no depth.
        let drawable = scene::resolve_tiles(scene.tiles, |id| self.textures.texture(id));

        if !drawable.is_empty() {
            let quads: Vec<_> = drawable
                .iter()
                .map(|(_, rect)| scene::tile_quad(rect, surface))
                .collect();
            let written = self.quads.write_quads(&self.gfx.queue, &quads);

            let mut pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
                label: Some("Stream Tile Pass"),
                color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                    view: swap_view,
                    resolve_target: None,
                    ops: wgpu::Operations {
                        load: wgpu::LoadOp::Load,
                        store: wgpu::StoreOp::Store,
                    },
                })],
                depth_stencil_attachment: None,
                timestamp_writes: None,
                occlusion_query_set: None,
            });

            for (i, (texture, _)) in drawable.iter().take(written).enumerate() {
                self.quads.draw(&mut pass, i, &texture.bind_group);
            }
        }

        self.gfx.queue.submit(std::iter::once(encoder.finish()));
    }
}

/// Intersects `rect` with the surface; `None` when nothing is left to draw.
fn clamp_viewport(rect: &Rect, surface: [f32; 2]) -> Option<Rect> {
    let x0 = rect.x.max(0.0);
    let y0 = rect.y.max(0.0);
    let x1 = (rect.x + rect.w).min(surface[0]);
    let y1 = (rect.y + rect.h).min(surface[1]);
    (x1 - x0 >= 1.0 && y1 - y0 >= 1.0).then(|| Rect::new(x0, y0, x1 - x0, y1 - y0))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn viewport_is_clipped_to_surface() {
        let vp = clamp_viewport(&Rect::new(-10.0, 5.0, 900.0, 100.0), [800.0, 600.0]).unwrap();
        assert_eq!(vp, Rect::new(0.0, 5.0, 800.0, 100.0));
    }

    #[test]
    fn degenerate_viewport_draws_nothing() {
        assert!(clamp_viewport(&Rect::new(0.0, 0.0, 0.5, 100.0), [800.0, 600.0]).is_none());
        assert!(clamp_viewport(&Rect::new(900.0, 0.0, 100.0, 100.0), [800.0, 600.0]).is_none());
    }
}
