//! Still-image frame source.

use crate::frame::VideoFrame;
use anyhow::Result;
use std::path::Path;

/// A source that serves one static frame.
///
/// Backs the pick-image path (apply an effect to a photo instead of the live
/// feed) and the camera-unavailable fallback. The frame is handed out once;
/// the renderer keeps sampling the uploaded texture afterwards.
pub struct StillSource {
    frame: Option<VideoFrame>,
    size: (u32, u32),
}

impl StillSource {
    /// Loads a still frame from an image file.
    pub fn from_file(path: &Path) -> Result<Self> {
        let frame = VideoFrame::from_image(path)?;
        Ok(Self::new(frame))
    }

    /// A checkered gray pattern shown when no camera is available.
    pub fn fallback_pattern(width: u32, height: u32) -> Self {
        const CELL: u32 = 32;
        let mut frame = VideoFrame::solid(width.max(1), height.max(1), [24, 24, 24, 255]);
        for y in 0..frame.height {
            for x in 0..frame.width {
                if ((x / CELL) + (y / CELL)) % 2 == 0 {
                    let i = ((y * frame.width + x) * 4) as usize;
                    frame.data[i..i + 3].copy_from_slice(&[56, 56, 56]);
                }
            }
        }
        Self::new(frame)
    }

    fn new(frame: VideoFrame) -> Self {
        let size = (frame.width, frame.height);
        Self {
            frame: Some(frame),
            size,
        }
    }

    /// Takes the frame on first call; returns `None` afterwards.
    pub fn take_frame(&mut self) -> Option<VideoFrame> {
        self.frame.take()
    }

    /// Returns the frame dimensions.
    pub fn frame_size(&self) -> (u32, u32) {
        self.size
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_still_delivers_once() {
        let mut still = StillSource::fallback_pattern(64, 64);
        assert!(still.take_frame().is_some());
        assert!(still.take_frame().is_none());
        assert_eq!(still.frame_size(), (64, 64));
    }
}
