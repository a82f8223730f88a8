//! Frame and point cloud containers shared by sensors and viewers.

use crate::pipeline::SensorError;
use std::sync::Arc;

/// Sensor channel a frame was captured from.
///
/// The ordering is used to keep multi-stream layouts stable between ticks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum StreamKind {
    Depth,
    Color,
    Infrared,
}

impl StreamKind {
    pub const ALL: [StreamKind; 3] = [StreamKind::Depth, StreamKind::Color, StreamKind::Infrared];

    /// Human readable stream name.
    pub fn label(self) -> &'static str {
        match self {
            StreamKind::Depth => "Depth",
            StreamKind::Color => "Color",
            StreamKind::Infrared => "Infrared",
        }
    }
}

impl std::fmt::Display for StreamKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.label())
    }
}

/// Pixel layout of a frame buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PixelFormat {
    /// 16-bit little-endian depth units.
    Z16,
    /// 8-bit RGB, 3 bytes per pixel.
    Rgb8,
    /// 8-bit RGBA, 4 bytes per pixel.
    Rgba8,
    /// 8-bit BGR, 3 bytes per pixel.
    Bgr8,
    /// 8-bit luminance.
    Y8,
    /// Packed YUV 4:2:2.
    Yuyv,
}

impl PixelFormat {
    #[inline]
    pub fn bytes_per_pixel(self) -> usize {
        match self {
            PixelFormat::Y8 => 1,
            PixelFormat::Z16 | PixelFormat::Yuyv => 2,
            PixelFormat::Rgb8 | PixelFormat::Bgr8 => 3,
            PixelFormat::Rgba8 => 4,
        }
    }
}

/// One image captured from one stream.
///
/// Pixel data is reference counted so bundles can be handed between the
/// capture and render sides without copying.
#[derive(Debug, Clone)]
pub struct VideoFrame {
    pub stream: StreamKind,
    pub format: PixelFormat,
    pub width: u32,
    pub height: u32,
    pub frame_number: u64,
    data: Arc<[u8]>,
}

impl VideoFrame {
    /// Wraps a pixel buffer. Fails when the buffer is shorter than
    /// `width * height * bytes_per_pixel`.
    pub fn new(
        stream: StreamKind,
        format: PixelFormat,
        width: u32,
        height: u32,
        frame_number: u64,
        data: Vec<u8>,
    ) -> Result<Self, SensorError> {
        let expected = width as usize * height as usize * format.bytes_per_pixel();
        if data.len() < expected {
            return Err(SensorError::BufferSize {
                expected,
                actual: data.len(),
            });
        }

        Ok(Self {
            stream,
            format,
            width,
            height,
            frame_number,
            data: data.into(),
        })
    }

    #[inline]
    pub fn data(&self) -> &[u8] {
        &self.data
    }

    #[inline]
    pub fn pixel_count(&self) -> usize {
        self.width as usize * self.height as usize
    }

    /// Native size as `[width, height]` floats, for aspect computations.
    #[inline]
    pub fn size(&self) -> [f32; 2] {
        [self.width as f32, self.height as f32]
    }

    /// Raw depth units at pixel `(x, y)`; `None` for non-Z16 frames or
    /// out-of-range coordinates.
    pub fn depth_at(&self, x: u32, y: u32) -> Option<u16> {
        if self.format != PixelFormat::Z16 || x >= self.width || y >= self.height {
            return None;
        }
        let i = 2 * (y as usize * self.width as usize + x as usize);
        Some(u16::from_le_bytes([self.data[i], self.data[i + 1]]))
    }
}

/// A synchronized set of frames captured at one instant.
#[derive(Debug, Clone, Default)]
pub struct FrameBundle {
    pub timestamp_ms: f64,
    frames: Vec<VideoFrame>,
}

impl FrameBundle {
    pub fn new(timestamp_ms: f64, frames: Vec<VideoFrame>) -> Self {
        Self {
            timestamp_ms,
            frames,
        }
    }

    /// First frame of the given stream, if present.
    pub fn get(&self, stream: StreamKind) -> Option<&VideoFrame> {
        self.frames.iter().find(|f| f.stream == stream)
    }

    pub fn depth(&self) -> Option<&VideoFrame> {
        self.get(StreamKind::Depth)
    }

    pub fn color(&self) -> Option<&VideoFrame> {
        self.get(StreamKind::Color)
    }

    pub fn infrared(&self) -> Option<&VideoFrame> {
        self.get(StreamKind::Infrared)
    }

    pub fn frames(&self) -> &[VideoFrame] {
        &self.frames
    }

    pub fn len(&self) -> usize {
        self.frames.len()
    }

    pub fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }
}

/// Vertices paired 1:1 with texture coordinates.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PointCloudFrame {
    vertices: Vec<[f32; 3]>,
    tex_coords: Vec<[f32; 2]>,
}

impl PointCloudFrame {
    pub fn new(vertices: Vec<[f32; 3]>, tex_coords: Vec<[f32; 2]>) -> Result<Self, SensorError> {
        if vertices.len() != tex_coords.len() {
            return Err(SensorError::LengthMismatch {
                vertices: vertices.len(),
                tex_coords: tex_coords.len(),
            });
        }
        Ok(Self {
            vertices,
            tex_coords,
        })
    }

    /// A vertex with zero depth is the "no data" sentinel, not the origin.
    #[inline]
    pub fn is_valid(vertex: &[f32; 3]) -> bool {
        vertex[2] != 0.0
    }

    #[inline]
    pub fn vertices(&self) -> &[[f32; 3]] {
        &self.vertices
    }

    #[inline]
    pub fn tex_coords(&self) -> &[[f32; 2]] {
        &self.tex_coords
    }

    /// Mutable texture coordinates; the length is fixed by the vertices.
    #[inline]
    pub fn tex_coords_mut(&mut self) -> &mut [[f32; 2]] {
        &mut self.tex_coords
    }

    pub fn len(&self) -> usize {
        self.vertices.len()
    }

    pub fn is_empty(&self) -> bool {
        self.vertices.is_empty()
    }

    /// Number of vertices carrying depth data.
    pub fn valid_count(&self) -> usize {
        self.vertices.iter().filter(|v| Self::is_valid(v)).count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn depth_frame(values: &[u16], width: u32, height: u32) -> VideoFrame {
        let data = values.iter().flat_map(|v| v.to_le_bytes()).collect();
        VideoFrame::new(StreamKind::Depth, PixelFormat::Z16, width, height, 0, data).unwrap()
    }

    #[test]
    fn short_buffers_are_rejected() {
        let err = VideoFrame::new(StreamKind::Color, PixelFormat::Rgb8, 4, 4, 0, vec![0; 10])
            .unwrap_err();
        assert!(matches!(
            err,
            SensorError::BufferSize {
                expected: 48,
                actual: 10
            }
        ));
    }

    #[test]
    fn depth_lookup_reads_little_endian() {
        let frame = depth_frame(&[0, 1, 513, 65535], 2, 2);
        assert_eq!(frame.depth_at(1, 0), Some(1));
        assert_eq!(frame.depth_at(0, 1), Some(513));
        assert_eq!(frame.depth_at(1, 1), Some(65535));
        assert_eq!(frame.depth_at(2, 0), None);
    }

    #[test]
    fn bundle_lookup_by_stream() {
        let depth = depth_frame(&[0; 4], 2, 2);
        let ir = VideoFrame::new(StreamKind::Infrared, PixelFormat::Y8, 2, 2, 0, vec![7; 4])
            .unwrap();
        let bundle = FrameBundle::new(0.0, vec![depth, ir]);

        assert!(bundle.depth().is_some());
        assert!(bundle.color().is_none());
        assert_eq!(bundle.infrared().map(|f| f.data()[0]), Some(7));
    }

    #[test]
    fn point_cloud_requires_matching_lengths() {
        assert!(PointCloudFrame::new(vec![[0.0; 3]; 3], vec![[0.0; 2]; 2]).is_err());

        let cloud = PointCloudFrame::new(
            vec![[0.0, 0.0, 0.0], [0.1, 0.2, 1.0], [1.0, 1.0, 0.0]],
            vec![[0.0; 2]; 3],
        )
        .unwrap();
        assert_eq!(cloud.len(), 3);
        assert_eq!(cloud.valid_count(), 1);
    }

    #[test]
    fn stream_order_is_depth_color_infrared() {
        let mut kinds = vec![StreamKind::Infrared, StreamKind::Depth, StreamKind::Color];
        kinds.sort();
        assert_eq!(kinds, StreamKind::ALL.to_vec());
    }
}
