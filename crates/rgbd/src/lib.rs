//! RGBD: frame types and the sensor boundary for depth-camera viewers.
//!
//! - `frame`: stream kinds, pixel formats, video frames and synchronized
//!   frame bundles (depth + color + infrared for one capture instant).
//! - `pipeline`: the `SensorPipeline` trait a device SDK is wrapped behind.
//! - `projector`: depth -> point cloud projection and texture mapping.
//! - `synthetic`: a software RGB-D camera implementing `SensorPipeline`.
//!
//! Point cloud layout:
//!   vertices   : [f32; 3] per depth pixel, meters, camera frame
//!   tex_coords : [f32; 2] per depth pixel, normalized [0,1] into the mapped
//!                color frame
//! A vertex with z == 0 carries no depth and must not be drawn.

pub mod frame;
pub mod pipeline;
pub mod projector;
pub mod synthetic;

pub use self::frame::{FrameBundle, PixelFormat, PointCloudFrame, StreamKind, VideoFrame};
pub use self::pipeline::{SensorError, SensorPipeline};
pub use self::projector::{Intrinsics, PinholeProjector, Projector};
pub use self::synthetic::{SyntheticCamera, SyntheticConfig};
