use glam::{Mat4, Vec3};
use winit::event::{ElementState, MouseButton, MouseScrollDelta, WindowEvent};
use winit::keyboard::{KeyCode, PhysicalKey};

pub const YAW_LIMIT_DEG: f64 = 120.0;
pub const PITCH_LIMIT_DEG: f64 = 80.0;

/// Distance from the eye to the orbit target, in meters.
const ORBIT_TARGET_DEPTH: f32 = 0.5;
/// Meters of translation per unit of accumulated scroll.
const PAN_STEP: f32 = 0.05;

/// Pointer state sampled once per tick.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct CameraInput {
    pub left_button_down: bool,
    pub cursor_x: f64,
    pub cursor_y: f64,
    pub scroll_x: f32,
    pub scroll_y: f32,
    pub reset_requested: bool,
}

/// Orbit/pan state of the point cloud view.
///
/// Fields are private so yaw and pitch are never observed outside
/// `[-120, 120]` and `[-80, 80]` degrees.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CameraState {
    yaw: f64,
    pitch: f64,
    offset_x: f32,
    offset_y: f32,
    last_x: f64,
    last_y: f64,
    dragging: bool,
}

impl CameraState {
    pub fn update(&mut self, input: &CameraInput) {
        if input.reset_requested {
            self.yaw = 0.0;
            self.pitch = 0.0;
            self.offset_x = 0.0;
            self.offset_y = 0.0;
            return;
        }

        self.offset_x = -input.scroll_x;
        self.offset_y = -input.scroll_y;

        self.dragging = input.left_button_down;
        if self.dragging {
            self.yaw = (self.yaw - (input.cursor_x - self.last_x))
                .clamp(-YAW_LIMIT_DEG, YAW_LIMIT_DEG);
            self.pitch = (self.pitch + (input.cursor_y - self.last_y))
                .clamp(-PITCH_LIMIT_DEG, PITCH_LIMIT_DEG);
        }

        // Tracked while released too, so pressing later doesn't jump.
        self.last_x = input.cursor_x;
        self.last_y = input.cursor_y;
    }

    #[inline]
    pub fn yaw(&self) -> f64 {
        self.yaw
    }

    #[inline]
    pub fn pitch(&self) -> f64 {
        self.pitch
    }

    #[inline]
    pub fn offsets(&self) -> (f32, f32) {
        (self.offset_x, self.offset_y)
    }

    #[inline]
    pub fn last_cursor(&self) -> (f64, f64) {
        (self.last_x, self.last_y)
    }

    #[inline]
    pub fn dragging(&self) -> bool {
        self.dragging
    }

    /// View transform orbiting a target `ORBIT_TARGET_DEPTH` in front of the
    /// sensor. The sensor frame is x right, y down, z forward.
    pub fn view(&self) -> Mat4 {
        let look = Mat4::look_at_rh(Vec3::ZERO, Vec3::Z, Vec3::NEG_Y);
        let pan = Vec3::new(
            self.offset_x * PAN_STEP,
            0.0,
            ORBIT_TARGET_DEPTH + self.offset_y * PAN_STEP,
        );

        look * Mat4::from_translation(pan)
            * Mat4::from_rotation_x((self.pitch as f32).to_radians())
            * Mat4::from_rotation_y((self.yaw as f32).to_radians())
            * Mat4::from_translation(Vec3::new(0.0, 0.0, -ORBIT_TARGET_DEPTH))
    }
}

/// Collects winit pointer/keyboard events into one `CameraInput` per tick.
#[derive(Debug, Default)]
pub struct CameraController {
    mouse_down: bool,
    cursor: (f64, f64),
    scroll: (f32, f32),
    reset_pending: bool,
}

impl CameraController {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn handle_event(&mut self, event: &WindowEvent) {
        match event {
            WindowEvent::MouseInput { button, state, .. } => {
                if *button == MouseButton::Left {
                    self.mouse_down = *state == ElementState::Pressed;
                }
            }
            WindowEvent::CursorMoved { position, .. } => {
                self.cursor = (position.x, position.y);
            }
            WindowEvent::MouseWheel { delta, .. } => {
                let (dx, dy) = match delta {
                    MouseScrollDelta::LineDelta(x, y) => (*x, *y),
                    MouseScrollDelta::PixelDelta(pos) => (pos.x as f32 / 120.0, pos.y as f32 / 120.0),
                };
                self.scroll.0 += dx;
                self.scroll.1 += dy;
            }
            WindowEvent::KeyboardInput { event, .. } => {
                if event.physical_key == PhysicalKey::Code(KeyCode::Space)
                    && event.state == ElementState::Released
                {
                    self.reset_pending = true;
                }
            }
            WindowEvent::Focused(false) => {
                self.mouse_down = false;
            }
            _ => {}
        }
    }

    /// Input for this tick. A reset is delivered once and also clears the
    /// accumulated scroll so the pan does not snap back on the next tick.
    pub fn sample(&mut self) -> CameraInput {
        let reset_requested = std::mem::take(&mut self.reset_pending);
        if reset_requested {
            self.scroll = (0.0, 0.0);
        }

        CameraInput {
            left_button_down: self.mouse_down,
            cursor_x: self.cursor.0,
            cursor_y: self.cursor.1,
            scroll_x: self.scroll.0,
            scroll_y: self.scroll.1,
            reset_requested,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn drag(x: f64, y: f64) -> CameraInput {
        CameraInput {
            left_button_down: true,
            cursor_x: x,
            cursor_y: y,
            ..CameraInput::default()
        }
    }

    fn hover(x: f64, y: f64) -> CameraInput {
        CameraInput {
            cursor_x: x,
            cursor_y: y,
            ..CameraInput::default()
        }
    }

    #[test]
    fn drag_right_decreases_yaw_and_clamps() {
        let mut cam = CameraState::default();
        cam.update(&hover(100.0, 0.0));
        cam.update(&drag(400.0, 0.0));
        assert_eq!(cam.yaw(), -120.0);

        let mut cam = CameraState::default();
        cam.update(&hover(100.0, 0.0));
        cam.update(&drag(150.0, 0.0));
        assert_eq!(cam.yaw(), -50.0);
    }

    #[test]
    fn drag_down_increases_pitch_and_clamps() {
        let mut cam = CameraState::default();
        cam.update(&hover(0.0, 0.0));
        cam.update(&drag(0.0, 30.0));
        assert_eq!(cam.pitch(), 30.0);
        cam.update(&drag(0.0, 500.0));
        assert_eq!(cam.pitch(), 80.0);
        cam.update(&drag(0.0, -1000.0));
        assert_eq!(cam.pitch(), -80.0);
    }

    #[test]
    fn angles_stay_in_range_for_any_sequence() {
        let mut cam = CameraState::default();
        let mut x = 0.0;
        let mut y = 0.0;
        for i in 0..500 {
            // Deterministic pseudo-random walk with large jumps.
            x += ((i * 7919) % 613) as f64 - 306.0;
            y += ((i * 104_729) % 411) as f64 - 205.0;
            cam.update(&CameraInput {
                left_button_down: i % 3 != 0,
                cursor_x: x,
                cursor_y: y,
                ..CameraInput::default()
            });
            assert!((-YAW_LIMIT_DEG..=YAW_LIMIT_DEG).contains(&cam.yaw()));
            assert!((-PITCH_LIMIT_DEG..=PITCH_LIMIT_DEG).contains(&cam.pitch()));
        }
    }

    #[test]
    fn cursor_is_tracked_without_button() {
        let mut cam = CameraState::default();
        cam.update(&hover(10.0, 10.0));
        cam.update(&hover(300.0, 200.0));
        assert_eq!(cam.yaw(), 0.0);
        assert_eq!(cam.last_cursor(), (300.0, 200.0));

        // Pressing at the current position does not jump.
        cam.update(&drag(300.0, 200.0));
        assert_eq!((cam.yaw(), cam.pitch()), (0.0, 0.0));
        assert!(cam.dragging());
    }

    #[test]
    fn scroll_sets_negated_offsets() {
        let mut cam = CameraState::default();
        cam.update(&CameraInput {
            scroll_x: 2.0,
            scroll_y: -3.0,
            ..CameraInput::default()
        });
        assert_eq!(cam.offsets(), (-2.0, 3.0));
    }

    #[test]
    fn reset_is_idempotent() {
        let mut cam = CameraState::default();
        cam.update(&hover(0.0, 0.0));
        cam.update(&CameraInput {
            scroll_y: 4.0,
            ..drag(80.0, 40.0)
        });
        assert_ne!(cam.yaw(), 0.0);

        let reset = CameraInput {
            reset_requested: true,
            ..drag(900.0, 900.0)
        };
        for _ in 0..2 {
            cam.update(&reset);
            assert_eq!((cam.yaw(), cam.pitch()), (0.0, 0.0));
            assert_eq!(cam.offsets(), (0.0, 0.0));
        }
    }

    #[test]
    fn neutral_view_maps_target_in_front_of_eye() {
        let cam = CameraState::default();
        let p = cam.view().transform_point3(Vec3::new(0.0, 0.0, 1.0));
        // Right-handed view space looks down -z.
        assert!(p.z < 0.0);
        assert!(p.x.abs() < 1e-6 && p.y.abs() < 1e-6);
    }

    #[test]
    fn controller_accumulates_scroll_and_clears_on_reset() {
        let mut ctl = CameraController::new();
        ctl.scroll = (1.0, 2.0);
        assert_eq!(ctl.sample().scroll_y, 2.0);
        assert_eq!(ctl.sample().scroll_y, 2.0);

        ctl.reset_pending = true;
        let input = ctl.sample();
        assert!(input.reset_requested);
        assert_eq!((input.scroll_x, input.scroll_y), (0.0, 0.0));
        assert!(!ctl.sample().reset_requested);
    }
}
