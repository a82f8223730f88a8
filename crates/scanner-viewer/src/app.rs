use crate::{
    camera::{CameraController, CameraState},
    config::Config,
    error::FrameError,
    layout::{compute_tiles, strip_tiles, Rect},
    processor::FrameProcessor,
    renderer::{scene, Renderer, Scene},
    session::{CaptureMode, DeviceSession, FramePoll, SessionState, StartOutcome},
    textures::{is_supported, TextureId},
    ui::{self, FrameTimer, PanelAction, PanelState},
};
use anyhow::Result;
use rgbd::{FrameBundle, PinholeProjector, SensorPipeline, StreamKind, VideoFrame};
use std::sync::Arc;
use std::time::Instant;
use winit::{event::WindowEvent, window::Window};

/// A stream texture shown as a tile, with its source size.
#[derive(Debug, Clone, Copy)]
struct TileSource {
    stream: StreamKind,
    texture: TextureId,
    size: [f32; 2],
}

pub struct App<P: SensorPipeline + 'static> {
    pub renderer: Renderer,
    camera: CameraState,
    camera_controller: CameraController,
    session: DeviceSession<P>,
    processor: FrameProcessor<PinholeProjector>,
    /// Stream the point cloud's texture coordinates address.
    point_source: Option<StreamKind>,
    tiles: Vec<TileSource>,
    status: Option<String>,
    show_tiles: bool,
    timer: FrameTimer,
    last_probe: Option<Instant>,
    config: Config,
    egui_ctx: egui::Context,
    egui_state: egui_winit::State,
}

impl<P: SensorPipeline + 'static> App<P> {
    pub async fn new(window: Arc<Window>, config: Config, pipeline: P) -> Result<Self> {
        let renderer = Renderer::new(window.clone()).await?;

        let mode = if config.threaded_capture {
            CaptureMode::Threaded {
                capacity: config.queue_capacity(),
            }
        } else {
            CaptureMode::Inline
        };
        let session = DeviceSession::new(pipeline, mode, config.frame_timeout());

        let egui_ctx = egui::Context::default();
        let egui_state = egui_winit::State::new(
            egui_ctx.clone(),
            egui_ctx.viewport_id(),
            &*window,
            None,
            None,
        );

        let mut app = Self {
            renderer,
            camera: CameraState::default(),
            camera_controller: CameraController::new(),
            session,
            processor: FrameProcessor::new(PinholeProjector::default()),
            point_source: None,
            tiles: Vec::new(),
            status: None,
            show_tiles: true,
            timer: FrameTimer::new(),
            last_probe: None,
            config,
            egui_ctx,
            egui_state,
        };

        if app.config.autostart {
            app.start_streaming();
        } else {
            app.probe_devices();
        }

        Ok(app)
    }

    pub fn resize(&mut self, new_size: winit::dpi::PhysicalSize<u32>) {
        self.renderer.resize(new_size);
    }

    /// Returns true when the GUI consumed the event.
    pub fn handle_event(&mut self, window: &Window, event: &WindowEvent) -> bool {
        let response = self.egui_state.on_window_event(window, event);
        if response.consumed {
            return true;
        }

        self.camera_controller.handle_event(event);

        if let WindowEvent::Resized(physical_size) = event {
            self.resize(*physical_size);
        }

        false
    }

    fn start_streaming(&mut self) {
        self.status = match self.session.start() {
            StartOutcome::Streaming | StartOutcome::AlreadyStreaming => None,
            StartOutcome::NoDevice => Some("No device connected".to_owned()),
            StartOutcome::OpenFailed(e) => Some(format!("Failed to start streaming: {e}")),
        };
    }

    fn stop_streaming(&mut self) {
        self.session.stop();
        self.status = None;
    }

    fn probe_devices(&mut self) {
        let before = self.session.state();
        let after = self.session.probe();
        self.last_probe = Some(Instant::now());

        if before != after {
            self.status = match after {
                SessionState::Ready => Some("Device detected, press Start".to_owned()),
                SessionState::Disconnected if self.session.has_seen_device() => {
                    Some("Device disconnected".to_owned())
                }
                _ => self.status.take(),
            };
        }
    }

    fn probe_if_due(&mut self) {
        if self.session.is_ready() {
            return;
        }
        let Some(interval) = self.config.probe_interval() else {
            return;
        };
        if self.last_probe.map_or(true, |t| t.elapsed() >= interval) {
            self.probe_devices();
        }
    }

    fn poll_frames(&mut self) {
        match self.session.wait_for_frames() {
            FramePoll::Frames(bundle) => self.ingest(&bundle),
            FramePoll::Empty | FramePoll::NotStreaming => {}
            FramePoll::Lost(e) => {
                self.status = Some(format!("Device lost: {e}"));
            }
        }
    }

    /// Replaces the point cloud and stream textures with `bundle`. On any
    /// failure the previous frame stays on screen.
    fn ingest(&mut self, bundle: &FrameBundle) {
        match self.processor.process(bundle) {
            Ok(processed) => {
                let verts = scene::build_point_vertices(&processed.points);
                self.renderer.upload_points(&verts);
                self.point_source = Some(processed.color_source.stream);
                self.status = None;
            }
            Err(FrameError::NoColorSource { points }) => {
                log::warn!("Frame bundle has neither a color nor an infrared channel");
                let verts = scene::build_point_vertices(&points);
                self.renderer.upload_points(&verts);
                self.point_source = None;
                self.status = Some("No color or infrared stream to texture the points".to_owned());
            }
            Err(e) => {
                log::warn!("Skipping frame bundle: {}", e);
                return;
            }
        }

        let mut tiles = Vec::new();
        for frame in tile_streams(bundle, self.point_source) {
            match self.renderer.upload_texture(frame.stream, frame) {
                Ok(texture) => tiles.push(TileSource {
                    stream: frame.stream,
                    texture,
                    size: frame.size(),
                }),
                Err(e) => {
                    log::warn!("Skipping {} stream: {}", frame.stream, e);
                    self.status = Some(format!("{} stream: {}", frame.stream, e));
                }
            }
        }
        self.tiles = tiles;
    }

    pub fn render(&mut self, window: &Window) -> Result<(), wgpu::SurfaceError> {
        self.timer.tick();

        // Input first, so a blocking frame wait never sees half-applied state.
        let input = self.camera_controller.sample();
        self.camera.update(&input);

        self.probe_if_due();
        self.poll_frames();

        let frame = self.renderer.gfx.surface.get_current_texture()?;
        let swap_view = frame
            .texture
            .create_view(&wgpu::TextureViewDescriptor::default());

        let surface = self.renderer.gfx.surface_size();
        let show_tiles = self.show_tiles && !self.tiles.is_empty();
        let (point_viewport, tile_panel) =
            split_window(surface, self.config.tile_panel_fraction(), show_tiles);

        let placed = match tile_panel {
            Some(panel) => self.place_tiles(&panel),
            None => Vec::new(),
        };
        let tile_draws: Vec<(TextureId, Rect)> = placed
            .iter()
            .map(|(tile, rect)| (tile.texture, *rect))
            .collect();

        let point_fill = scene::point_fill(
            self.point_source,
            self.point_source.and_then(|s| self.renderer.texture_handle(s)),
        );

        self.renderer.render(
            &swap_view,
            &Scene {
                point_viewport,
                uniforms: scene::point_uniforms(&self.camera, &point_viewport),
                point_fill,
                tiles: &tile_draws,
            },
        );

        let egui_input = self.egui_state.take_egui_input(window);
        self.egui_ctx.begin_frame(egui_input);

        let panel = PanelState {
            session: self.session.state(),
            status: self.status.as_deref(),
            points: self.renderer.point_count(),
            dropped_frames: self.session.dropped_frames(),
            timer: &self.timer,
        };
        let action = ui::draw_control_panel(&self.egui_ctx, &panel, &mut self.show_tiles);

        let labels: Vec<(Rect, &str)> = placed
            .iter()
            .map(|(tile, rect)| (*rect, tile.stream.label()))
            .collect();
        ui::draw_stream_labels(&self.egui_ctx, &labels, self.egui_ctx.pixels_per_point());

        let egui_output = self.egui_ctx.end_frame();
        self.egui_state
            .handle_platform_output(window, egui_output.platform_output);
        let shapes = self
            .egui_ctx
            .tessellate(egui_output.shapes, self.egui_ctx.pixels_per_point());

        let screen_descriptor = egui_wgpu::ScreenDescriptor {
            size_in_pixels: [
                self.renderer.gfx.config.width,
                self.renderer.gfx.config.height,
            ],
            pixels_per_point: self.egui_ctx.pixels_per_point(),
        };

        let mut encoder = self
            .renderer
            .gfx
            .device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some("UI Encoder"),
            });

        for (id, delta) in &egui_output.textures_delta.set {
            self.renderer.egui_renderer.update_texture(
                &self.renderer.gfx.device,
                &self.renderer.gfx.queue,
                *id,
                delta,
            );
        }

        self.renderer.egui_renderer.update_buffers(
            &self.renderer.gfx.device,
            &self.renderer.gfx.queue,
            &mut encoder,
            &shapes,
            &screen_descriptor,
        );

        {
            let mut render_pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
                label: Some("EGUI Pass"),
                color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                    view: &swap_view,
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

            self.renderer
                .egui_renderer
                .render(&mut render_pass, &shapes, &screen_descriptor);
        }

        for id in &egui_output.textures_delta.free {
            self.renderer.egui_renderer.free_texture(id);
        }

        self.renderer
            .gfx
            .queue
            .submit(std::iter::once(encoder.finish()));
        frame.present();

        self.apply(action);
        Ok(())
    }

    fn apply(&mut self, action: PanelAction) {
        if action.start {
            self.start_streaming();
        }
        if action.stop {
            self.stop_streaming();
        }
    }

    /// Packs the current tiles into `panel`, in stream order.
    fn place_tiles(&self, panel: &Rect) -> Vec<(TileSource, Rect)> {
        let sizes: Vec<[f32; 2]> = self.tiles.iter().map(|t| t.size).collect();
        self.tiles
            .iter()
            .copied()
            .zip(pack_tiles(panel, &sizes))
            .collect()
    }
}

/// Tile rectangles inside `panel`, in window pixels. Panels too elongated
/// for a grid get a single row or column instead.
fn pack_tiles(panel: &Rect, sizes: &[[f32; 2]]) -> Vec<Rect> {
    let rects = compute_tiles(panel.w, panel.h, sizes).or_else(|e| {
        log::debug!("{}; packing tiles in a strip", e);
        strip_tiles(panel.w, panel.h, sizes)
    });
    match rects {
        Ok(rects) => rects
            .into_iter()
            .map(|rect| rect.translate(panel.x, panel.y))
            .collect(),
        Err(e) => {
            log::error!("{}", e);
            Vec::new()
        }
    }
}

/// Streams to upload this tick, sorted by kind: every renderable one, plus
/// the texture source of the point cloud so a bad format gets reported.
fn tile_streams(bundle: &FrameBundle, point_source: Option<StreamKind>) -> Vec<&VideoFrame> {
    let mut frames: Vec<&VideoFrame> = bundle
        .frames()
        .iter()
        .filter(|f| is_supported(f.format) || Some(f.stream) == point_source)
        .collect();
    frames.sort_by_key(|f| f.stream);
    frames
}

/// Splits the surface into the point cloud viewport and, when tiles are
/// shown, the panel that holds them: on the right of a landscape window,
/// along the bottom of a portrait one.
fn split_window(surface: [f32; 2], tile_fraction: f32, show_tiles: bool) -> (Rect, Option<Rect>) {
    let [w, h] = surface;
    if !show_tiles {
        return (Rect::new(0.0, 0.0, w, h), None);
    }

    if h > w {
        let panel_h = (h * tile_fraction).round();
        let points_h = h - panel_h;
        return (
            Rect::new(0.0, 0.0, w, points_h),
            Some(Rect::new(0.0, points_h, w, panel_h)),
        );
    }

    let panel_w = (w * tile_fraction).round();
    let points_w = w - panel_w;
    (
        Rect::new(0.0, 0.0, points_w, h),
        Some(Rect::new(points_w, 0.0, panel_w, h)),
    )
}
