//! egui overlay: the streaming control panel and the stream tile labels.

use crate::layout::Rect;
use crate::session::SessionState;
use std::time::{Duration, Instant};

/// Weight of the newest sample in the frame time average.
const SMOOTHING: f64 = 0.1;
const LABEL_INSET: (f32, f32) = (15.0, 20.0);

/// Exponential moving average of the application frame time.
#[derive(Debug, Clone)]
pub struct FrameTimer {
    last: Option<Instant>,
    avg_ms: f64,
}

impl Default for FrameTimer {
    fn default() -> Self {
        Self::new()
    }
}

impl FrameTimer {
    pub fn new() -> Self {
        Self {
            last: None,
            avg_ms: 0.0,
        }
    }

    /// Marks the start of a frame.
    pub fn tick(&mut self) {
        let now = Instant::now();
        if let Some(last) = self.last.replace(now) {
            self.record(now - last);
        }
    }

    pub fn record(&mut self, frame_time: Duration) {
        let ms = frame_time.as_secs_f64() * 1000.0;
        self.avg_ms = if self.avg_ms == 0.0 {
            ms
        } else {
            self.avg_ms + SMOOTHING * (ms - self.avg_ms)
        };
    }

    pub fn ms_per_frame(&self) -> f64 {
        self.avg_ms
    }

    pub fn fps(&self) -> f64 {
        if self.avg_ms > 0.0 {
            1000.0 / self.avg_ms
        } else {
            0.0
        }
    }

    pub fn summary(&self) -> String {
        format!("{:.3} ms/frame ({:.1} FPS)", self.ms_per_frame(), self.fps())
    }
}

/// What the control panel shows this frame.
#[derive(Debug, Clone)]
pub struct PanelState<'a> {
    pub session: SessionState,
    pub status: Option<&'a str>,
    pub points: u32,
    pub dropped_frames: u64,
    pub timer: &'a FrameTimer,
}

/// Buttons clicked this frame.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct PanelAction {
    pub start: bool,
    pub stop: bool,
}

pub fn draw_control_panel(ctx: &egui::Context, panel: &PanelState<'_>, show_tiles: &mut bool) -> PanelAction {
    let mut action = PanelAction::default();

    egui::Window::new("Control Streaming")
        .default_pos([10.0, 10.0])
        .resizable(false)
        .show(ctx, |ui| {
            ui.horizontal(|ui| {
                let streaming = panel.session == SessionState::Streaming;
                action.start = ui.add_enabled(!streaming, egui::Button::new("Start")).clicked();
                action.stop = ui.add_enabled(streaming, egui::Button::new("Stop")).clicked();
            });

            ui.label(format!("State: {}", panel.session.label()));
            if let Some(status) = panel.status {
                ui.colored_label(egui::Color32::YELLOW, status);
            }

            ui.separator();
            ui.label(format!("Points: {}", panel.points));
            if panel.dropped_frames > 0 {
                ui.label(format!("Dropped frames: {}", panel.dropped_frames));
            }
            ui.label(format!("Application average {}", panel.timer.summary()));
            ui.checkbox(show_tiles, "Show stream tiles");
        });

    action
}

/// Stream names drawn in the top-left corner of each tile. `tiles` are in
/// physical pixels.
pub fn draw_stream_labels(ctx: &egui::Context, tiles: &[(Rect, &str)], pixels_per_point: f32) {
    let painter = ctx.layer_painter(egui::LayerId::background());
    let ppp = pixels_per_point.max(f32::EPSILON);

    for (rect, label) in tiles {
        let pos = egui::pos2(
            (rect.x + LABEL_INSET.0) / ppp,
            (rect.y + LABEL_INSET.1) / ppp,
        );
        painter.text(
            pos,
            egui::Align2::LEFT_TOP,
            *label,
            egui::FontId::proportional(14.0),
            egui::Color32::WHITE,
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn first_sample_seeds_the_average() {
        let mut timer = FrameTimer::new();
        timer.record(Duration::from_millis(20));
        assert_relative_eq!(timer.ms_per_frame(), 20.0);
        assert_relative_eq!(timer.fps(), 50.0);
    }

    #[test]
    fn average_moves_toward_new_samples() {
        let mut timer = FrameTimer::new();
        timer.record(Duration::from_millis(10));
        timer.record(Duration::from_millis(20));
        assert_relative_eq!(timer.ms_per_frame(), 11.0, epsilon = 1e-9);
    }

    #[test]
    fn idle_timer_reports_zero_fps() {
        let timer = FrameTimer::new();
        assert_eq!(timer.fps(), 0.0);
        assert_eq!(timer.summary(), "0.000 ms/frame (0.0 FPS)");
    }

    #[test]
    fn panel_reports_clicks_only_when_run() {
        let ctx = egui::Context::default();
        let timer = FrameTimer::new();
        let panel = PanelState {
            session: SessionState::Disconnected,
            status: Some("No device connected"),
            points: 0,
            dropped_frames: 0,
            timer: &timer,
        };
        let mut show_tiles = true;
        let mut action = PanelAction::default();
        let _ = ctx.run(egui::RawInput::default(), |ctx| {
            action = draw_control_panel(ctx, &panel, &mut show_tiles);
        });
        assert_eq!(action, PanelAction::default());
        assert!(show_tiles);
    }
}
