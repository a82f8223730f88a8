//! Typed errors raised by the preview core. All of them are recoverable
//! for the session; the caller decides whether to skip a stream or a tick.

use rgbd::{PixelFormat, PointCloudFrame, SensorError};
use thiserror::Error;

/// Non-positive window size or stream count passed to the grid layout.
#[derive(Debug, Error, PartialEq)]
pub enum LayoutError {
    #[error("invalid window configuration {width}x{height} for {streams} streams, failed to calculate window grid")]
    InvalidLayout {
        width: f32,
        height: f32,
        streams: usize,
    },
}

#[derive(Debug, Error, PartialEq)]
pub enum TextureError {
    #[error("{0:?} pixels cannot be uploaded as a texture")]
    UnsupportedFormat(PixelFormat),
    #[error("pixel buffer holds {actual} bytes, expected {expected}")]
    BufferSize { expected: usize, actual: usize },
}

#[derive(Debug, Error)]
pub enum FrameError {
    /// The bundle had no depth channel; nothing can be projected this tick.
    #[error("frame bundle has no depth channel")]
    MissingDepth,
    /// Geometry was computed but there is nothing to texture it with.
    #[error("frame bundle has neither a color nor an infrared channel")]
    NoColorSource { points: PointCloudFrame },
    #[error("projection failed: {0}")]
    Projection(#[from] SensorError),
}
