//! A software RGB-D camera. Produces an animated wavy surface with an
//! invalid (zero depth) border, a matching RGB8 color image and a Y8
//! infrared image, paced at a fixed frame rate.

use crate::frame::{FrameBundle, PixelFormat, StreamKind, VideoFrame};
use crate::pipeline::{SensorError, SensorPipeline};
use parking_lot::Mutex;
use rayon::prelude::*;
use std::time::{Duration, Instant};

/// Pixels along each image edge that carry no depth.
const INVALID_BORDER_PX: u32 = 8;
/// Mean surface distance in depth units (mm).
const BASE_DEPTH_UNITS: f32 = 1200.0;
const WAVE_AMPLITUDE_UNITS: f32 = 180.0;

#[derive(Debug, Clone)]
pub struct SyntheticConfig {
    /// Reported by `enumerate_devices`; 0 behaves like an unplugged camera.
    pub devices: usize,
    pub width: u32,
    pub height: u32,
    pub fps: u32,
    pub color: bool,
    pub infrared: bool,
}

impl Default for SyntheticConfig {
    fn default() -> Self {
        Self {
            devices: 1,
            width: 640,
            height: 480,
            fps: 30,
            color: true,
            infrared: true,
        }
    }
}

#[derive(Debug)]
struct Stream {
    started_at: Instant,
    next_frame_at: Instant,
    frame_number: u64,
}

#[derive(Debug)]
pub struct SyntheticCamera {
    config: SyntheticConfig,
    stream: Mutex<Option<Stream>>,
}

impl SyntheticCamera {
    pub fn new(config: SyntheticConfig) -> Self {
        Self {
            config,
            stream: Mutex::new(None),
        }
    }

    fn frame_interval(&self) -> Duration {
        Duration::from_secs_f64(1.0 / self.config.fps.max(1) as f64)
    }

    /// Renders the bundle for time `t` seconds.
    fn render(&self, t: f32, frame_number: u64, timestamp_ms: f64) -> Result<FrameBundle, SensorError> {
        let (w, h) = (self.config.width, self.config.height);
        let depth_units = depth_surface(w, h, t);

        let mut frames = Vec::with_capacity(3);

        if self.config.color {
            let rgb: Vec<u8> = depth_units
                .par_iter()
                .enumerate()
                .flat_map_iter(|(i, &d)| {
                    let x = (i as u32 % w) as f32 / w as f32;
                    let y = (i as u32 / w) as f32 / h as f32;
                    let shade = shade(d);
                    [
                        (255.0 * x * shade) as u8,
                        (255.0 * y * shade) as u8,
                        (255.0 * (0.5 + 0.5 * (t + x * 6.0).sin()) * shade) as u8,
                    ]
                })
                .collect();
            frames.push(VideoFrame::new(StreamKind::Color, PixelFormat::Rgb8, w, h, frame_number, rgb)?);
        }

        if self.config.infrared {
            let ir: Vec<u8> = depth_units.par_iter().map(|&d| (255.0 * shade(d)) as u8).collect();
            frames.push(VideoFrame::new(StreamKind::Infrared, PixelFormat::Y8, w, h, frame_number, ir)?);
        }

        let depth_bytes: Vec<u8> = depth_units.iter().flat_map(|d| d.to_le_bytes()).collect();
        frames.insert(
            0,
            VideoFrame::new(StreamKind::Depth, PixelFormat::Z16, w, h, frame_number, depth_bytes)?,
        );

        Ok(FrameBundle::new(timestamp_ms, frames))
    }
}

/// Brightness in [0.2, 1.0]; nearer surfaces are brighter, no depth is black.
#[inline]
fn shade(depth_units: u16) -> f32 {
    if depth_units == 0 {
        return 0.0;
    }
    let near = BASE_DEPTH_UNITS - WAVE_AMPLITUDE_UNITS;
    let far = BASE_DEPTH_UNITS + WAVE_AMPLITUDE_UNITS;
    let t = ((depth_units as f32 - near) / (far - near)).clamp(0.0, 1.0);
    1.0 - 0.8 * t
}

fn depth_surface(w: u32, h: u32, t: f32) -> Vec<u16> {
    (0..w * h)
        .into_par_iter()
        .map(|i| {
            let (x, y) = (i % w, i / w);
            let border = x < INVALID_BORDER_PX
                || y < INVALID_BORDER_PX
                || x >= w.saturating_sub(INVALID_BORDER_PX)
                || y >= h.saturating_sub(INVALID_BORDER_PX);
            if border {
                return 0;
            }
            let (fx, fy) = (x as f32 * 0.03, y as f32 * 0.03);
            let wave = (fx + t).sin() * (fy + 0.7 * t).cos();
            (BASE_DEPTH_UNITS + WAVE_AMPLITUDE_UNITS * wave) as u16
        })
        .collect()
}

impl SensorPipeline for SyntheticCamera {
    fn enumerate_devices(&self) -> usize {
        self.config.devices
    }

    fn open(&self) -> Result<(), SensorError> {
        if self.config.devices == 0 {
            return Err(SensorError::NoDevice);
        }
        let now = Instant::now();
        *self.stream.lock() = Some(Stream {
            started_at: now,
            next_frame_at: now,
            frame_number: 0,
        });
        log::debug!(
            "Synthetic camera streaming {}x{} @ {} fps (color={}, infrared={})",
            self.config.width,
            self.config.height,
            self.config.fps,
            self.config.color,
            self.config.infrared
        );
        Ok(())
    }

    fn close(&self) {
        self.stream.lock().take();
    }

    fn wait_for_frame_bundle(&self, timeout: Duration) -> Result<FrameBundle, SensorError> {
        // The lock is released while sleeping so `close` never waits on a frame.
        let due = match self.stream.lock().as_ref() {
            Some(s) => s.next_frame_at,
            None => return Err(SensorError::NotStreaming),
        };

        let wait = due.saturating_duration_since(Instant::now());
        if wait > timeout {
            std::thread::sleep(timeout);
            return Err(SensorError::Timeout(timeout));
        }
        std::thread::sleep(wait);

        let interval = self.frame_interval();
        let (t, frame_number, timestamp_ms) = {
            let mut guard = self.stream.lock();
            let s = guard.as_mut().ok_or(SensorError::NotStreaming)?;
            // After a stall the schedule restarts from now instead of
            // replaying every missed frame.
            s.next_frame_at = (due + interval).max(Instant::now());
            s.frame_number += 1;
            let elapsed = due.duration_since(s.started_at);
            (elapsed.as_secs_f32(), s.frame_number, elapsed.as_secs_f64() * 1000.0)
        };

        self.render(t, frame_number, timestamp_ms)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn small() -> SyntheticConfig {
        SyntheticConfig {
            width: 32,
            height: 24,
            fps: 1000,
            ..SyntheticConfig::default()
        }
    }

    #[test]
    fn waiting_before_open_reports_not_streaming() {
        let cam = SyntheticCamera::new(small());
        assert!(matches!(
            cam.wait_for_frame_bundle(Duration::from_millis(1)),
            Err(SensorError::NotStreaming)
        ));
    }

    #[test]
    fn bundles_carry_requested_streams() {
        let cam = SyntheticCamera::new(small());
        cam.open().unwrap();
        let bundle = cam.wait_for_frame_bundle(Duration::from_millis(50)).unwrap();

        let depth = bundle.depth().unwrap();
        assert_eq!((depth.width, depth.height), (32, 24));
        assert_eq!(depth.depth_at(0, 0), Some(0));
        assert!(depth.depth_at(16, 12).unwrap() > 0);
        assert_eq!(bundle.color().unwrap().format, PixelFormat::Rgb8);
        assert_eq!(bundle.infrared().unwrap().format, PixelFormat::Y8);
    }

    #[test]
    fn disabled_streams_are_omitted() {
        let cam = SyntheticCamera::new(SyntheticConfig {
            color: false,
            infrared: false,
            ..small()
        });
        cam.open().unwrap();
        let bundle = cam.wait_for_frame_bundle(Duration::from_millis(50)).unwrap();
        assert_eq!(bundle.len(), 1);
        assert!(bundle.depth().is_some());
    }

    #[test]
    fn stalled_consumer_gets_fresh_frames() {
        let cam = SyntheticCamera::new(SyntheticConfig { fps: 1000, ..small() });
        cam.open().unwrap();
        std::thread::sleep(Duration::from_millis(50));

        // The first frame was due at open; the one after it must not be.
        cam.wait_for_frame_bundle(Duration::from_millis(5)).unwrap();
        let next = cam.wait_for_frame_bundle(Duration::from_millis(5)).unwrap();
        assert!(next.timestamp_ms >= 40.0, "stale frame at {} ms", next.timestamp_ms);
    }

    #[test]
    fn slow_frames_time_out() {
        let cam = SyntheticCamera::new(SyntheticConfig { fps: 1, ..small() });
        cam.open().unwrap();
        // First frame is due immediately, the next one a second later.
        cam.wait_for_frame_bundle(Duration::from_millis(5)).unwrap();
        assert!(matches!(
            cam.wait_for_frame_bundle(Duration::from_millis(5)),
            Err(SensorError::Timeout(_))
        ));
    }

    #[test]
    fn unplugged_camera_fails_to_open() {
        let cam = SyntheticCamera::new(SyntheticConfig { devices: 0, ..small() });
        assert_eq!(cam.enumerate_devices(), 0);
        assert!(matches!(cam.open(), Err(SensorError::NoDevice)));
    }
}
