//! Destinations for rendered frames.

mod window;

pub use window::WindowSurface;

use crate::frame::VideoFrame;
use anyhow::{Context, Result};
use std::fs;
use std::path::PathBuf;

/// Trait for sinks that consume rendered frames.
pub trait OutputBackend {
    /// Delivers one rendered frame to the sink.
    fn write_frame(&mut self, frame: &VideoFrame) -> Result<()>;
}

/// Writes numbered PNG files into a directory.
///
/// Used for captured photos in window mode and for every frame in the
/// headless frames mode.
pub struct FrameWriter {
    dir: PathBuf,
    prefix: String,
    index: u32,
}

impl FrameWriter {
    /// Creates the output directory if needed.
    pub fn new(dir: PathBuf, prefix: &str) -> Result<Self> {
        fs::create_dir_all(&dir)
            .with_context(|| format!("Failed to create output directory {:?}", dir))?;
        Ok(Self {
            dir,
            prefix: prefix.to_string(),
            index: 0,
        })
    }

    /// Path the next frame will be written to.
    pub fn next_path(&self) -> PathBuf {
        self.dir
            .join(format!("{}-{:05}.png", self.prefix, self.index))
    }
}

impl OutputBackend for FrameWriter {
    fn write_frame(&mut self, frame: &VideoFrame) -> Result<()> {
        let path = self.next_path();
        frame.save_png(&path)?;
        self.index += 1;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::frame::{PixelFormat, VideoFrame};

    #[test]
    fn test_frame_writer_numbers_files() {
        let dir = std::env::temp_dir().join(format!("obscura-writer-{}", std::process::id()));
        let _ = fs::remove_dir_all(&dir);

        let mut writer = FrameWriter::new(dir.clone(), "frame").unwrap();
        let frame = VideoFrame::new(2, 2, PixelFormat::Rgba);
        writer.write_frame(&frame).unwrap();
        writer.write_frame(&frame).unwrap();

        assert!(dir.join("frame-00000.png").exists());
        assert!(dir.join("frame-00001.png").exists());
        assert_eq!(writer.next_path(), dir.join("frame-00002.png"));

        let _ = fs::remove_dir_all(&dir);
    }
}
