use clap::Parser;
use rgbd::SyntheticConfig;
use std::time::Duration;

/// `scanner_viewer` - live point cloud preview for RGB-D cameras.
///
/// Streams depth frames, projects them into a textured point cloud and shows
/// the color/infrared feeds next to it.
#[derive(Parser, Debug, Clone)]
#[command(name = "scanner_viewer", version, about, long_about = None)]
pub struct Config {
    /// Initial window width in logical pixels.
    #[arg(long, default_value_t = 1280)]
    pub width: u32,

    /// Initial window height in logical pixels.
    #[arg(long, default_value_t = 720)]
    pub height: u32,

    /// How long one render tick may block waiting for a frame bundle.
    #[arg(long, env = "SCANNER_FRAME_TIMEOUT_MS", default_value_t = 100)]
    pub frame_timeout_ms: u64,

    /// Interval between device availability checks while not streaming.
    /// 0 disables probing.
    #[arg(long, env = "SCANNER_PROBE_INTERVAL_MS", default_value_t = 2000)]
    pub probe_interval_ms: u64,

    /// Start streaming as soon as the window is up.
    #[arg(long, default_value_t = false)]
    pub autostart: bool,

    /// Wait for frames on a background thread instead of the render tick.
    #[arg(long, env = "SCANNER_THREADED_CAPTURE", default_value_t = false)]
    pub threaded_capture: bool,

    /// Frame bundles buffered by the capture thread (2..=5); the oldest is
    /// dropped when full.
    #[arg(long, default_value_t = 3)]
    pub queue_capacity: usize,

    /// Fraction of the window width given to the stream tiles.
    #[arg(long, default_value_t = 0.3)]
    pub tile_panel_fraction: f32,

    /// Number of synthetic devices reported; 0 simulates an unplugged camera.
    #[arg(long, env = "SCANNER_SYNTHETIC_DEVICES", default_value_t = 1)]
    pub synthetic_devices: usize,

    /// Synthetic camera frame rate.
    #[arg(long, default_value_t = 30)]
    pub fps: u32,

    /// Disable the synthetic color stream (texture falls back to infrared).
    #[arg(long, default_value_t = false)]
    pub no_color: bool,

    /// Disable the synthetic infrared stream.
    #[arg(long, default_value_t = false)]
    pub no_infrared: bool,
}

impl Config {
    pub fn frame_timeout(&self) -> Duration {
        Duration::from_millis(self.frame_timeout_ms)
    }

    pub fn probe_interval(&self) -> Option<Duration> {
        (self.probe_interval_ms > 0).then(|| Duration::from_millis(self.probe_interval_ms))
    }

    pub fn queue_capacity(&self) -> usize {
        self.queue_capacity.clamp(2, 5)
    }

    pub fn tile_panel_fraction(&self) -> f32 {
        self.tile_panel_fraction.clamp(0.1, 0.9)
    }

    pub fn synthetic(&self) -> SyntheticConfig {
        SyntheticConfig {
            devices: self.synthetic_devices,
            fps: self.fps,
            color: !self.no_color,
            infrared: !self.no_infrared,
            ..SyntheticConfig::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_parse() {
        let config = Config::parse_from(["scanner_viewer"]);
        assert_eq!(config.frame_timeout(), Duration::from_millis(100));
        assert_eq!(config.probe_interval(), Some(Duration::from_secs(2)));
        assert_eq!(config.queue_capacity(), 3);
        assert!(config.synthetic().color);
    }

    #[test]
    fn out_of_range_values_are_clamped() {
        let config = Config::parse_from([
            "scanner_viewer",
            "--queue-capacity",
            "64",
            "--probe-interval-ms",
            "0",
            "--no-color",
        ]);
        assert_eq!(config.queue_capacity(), 5);
        assert_eq!(config.probe_interval(), None);
        assert!(!config.synthetic().color);
    }
}
