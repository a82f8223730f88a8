use crate::error::FrameError;
use rgbd::{FrameBundle, PointCloudFrame, Projector, VideoFrame};

/// Geometry and the image its texture coordinates address.
#[derive(Debug, Clone)]
pub struct ProcessedFrame {
    pub points: PointCloudFrame,
    pub color_source: VideoFrame,
}

/// Turns a frame bundle into a textured point cloud.
#[derive(Debug, Clone, Default)]
pub struct FrameProcessor<J> {
    projector: J,
}

impl<J: Projector> FrameProcessor<J> {
    pub fn new(projector: J) -> Self {
        Self { projector }
    }

    /// Projects the depth channel and maps it onto the color channel, or
    /// onto infrared for cameras without a color sensor.
    ///
    /// `FrameError::NoColorSource` still carries the projected points.
    pub fn process(&self, bundle: &FrameBundle) -> Result<ProcessedFrame, FrameError> {
        let depth = bundle.depth().ok_or(FrameError::MissingDepth)?;
        let mut points = self.projector.project(depth)?;

        let Some(color_source) = bundle.color().or_else(|| bundle.infrared()) else {
            return Err(FrameError::NoColorSource { points });
        };

        self.projector.map_to(&mut points, color_source);
        Ok(ProcessedFrame {
            points,
            color_source: color_source.clone(),
        })
    }
}
