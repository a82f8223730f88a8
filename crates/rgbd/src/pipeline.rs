//! The device boundary: anything that can enumerate cameras and deliver
//! frame bundles implements `SensorPipeline`.

use crate::frame::FrameBundle;
use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum SensorError {
    #[error("no frame bundle arrived within {0:?}")]
    Timeout(Duration),
    #[error("pipeline is not streaming")]
    NotStreaming,
    #[error("no device connected")]
    NoDevice,
    #[error("failed to open pipeline: {0}")]
    Open(String),
    #[error("device disconnected: {0}")]
    Disconnected(String),
    #[error("frame buffer holds {actual} bytes, expected at least {expected}")]
    BufferSize { expected: usize, actual: usize },
    #[error("point cloud has {vertices} vertices but {tex_coords} texture coordinates")]
    LengthMismatch { vertices: usize, tex_coords: usize },
    #[error("{0:?} frames cannot be projected")]
    Format(crate::frame::PixelFormat),
}

/// A camera pipeline as exposed by a device SDK.
///
/// Methods take `&self` so a capture thread can wait for frames while the
/// owner keeps the handle; implementations synchronize internally.
pub trait SensorPipeline: Send + Sync {
    /// Number of attached devices.
    fn enumerate_devices(&self) -> usize;

    /// Opens the first device and starts its streams.
    fn open(&self) -> Result<(), SensorError>;

    /// Stops streaming. Closing a closed pipeline is a no-op.
    fn close(&self);

    /// Blocks until the next bundle is available or `timeout` elapses.
    fn wait_for_frame_bundle(&self, timeout: Duration) -> Result<FrameBundle, SensorError>;
}
