use std::path::{Path, PathBuf};
use std::sync::Arc;

use tracing::debug;

use crate::error::{EngineError, Result};
use crate::video::types::FrameBuffer;

/// Consumer of processed frames (preview surface, virtual camera, recorder)
///
/// Sinks receive the shared output reference; the engine does not care how
/// many of them read the same frame.
pub trait FrameSink: Send {
    fn name(&self) -> &str;

    fn consume(&mut self, frame: &Arc<FrameBuffer>) -> Result<()>;
}

/// Counts frames and drops them
#[derive(Debug, Default)]
pub struct NullSink {
    pub frames: u64,
}

impl FrameSink for NullSink {
    fn name(&self) -> &str {
        "null"
    }

    fn consume(&mut self, _frame: &Arc<FrameBuffer>) -> Result<()> {
        self.frames += 1;
        Ok(())
    }
}

/// Writes every n-th frame as `frame_<sequence>.png` into a directory
pub struct PngSequenceSink {
    directory: PathBuf,
    every_nth: u64,
    written: u64,
}

impl PngSequenceSink {
    pub fn new<P: AsRef<Path>>(directory: P, every_nth: u64) -> Result<Self> {
        let directory = directory.as_ref().to_path_buf();
        std::fs::create_dir_all(&directory)?;
        Ok(Self {
            directory,
            every_nth: every_nth.max(1),
            written: 0,
        })
    }

    pub fn written(&self) -> u64 {
        self.written
    }

    pub fn path_for(&self, sequence: u64) -> PathBuf {
        self.directory.join(format!("frame_{:06}.png", sequence))
    }
}

impl FrameSink for PngSequenceSink {
    fn name(&self) -> &str {
        "png"
    }

    fn consume(&mut self, frame: &Arc<FrameBuffer>) -> Result<()> {
        if frame.sequence() % self.every_nth != 0 {
            return Ok(());
        }
        let path = self.path_for(frame.sequence());
        frame
            .save_png(&path)
            .map_err(|e| EngineError::generic(format!("Failed to write {}: {}", path.display(), e)))?;
        self.written += 1;
        debug!("Wrote {:?}", path);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::video::types::PixelLayout;
    use tempfile::tempdir;

    #[test]
    fn test_png_sink_writes_every_nth() {
        let dir = tempdir().unwrap();
        let mut sink = PngSequenceSink::new(dir.path().join("out"), 2).unwrap();

        for seq in 0..5 {
            let frame = Arc::new(FrameBuffer::new_filled(8, 8, PixelLayout::Rgb8, [1, 2, 3]).with_sequence(seq));
            sink.consume(&frame).unwrap();
        }

        assert_eq!(sink.written(), 3);
        assert!(sink.path_for(4).exists());
        assert!(!sink.path_for(3).exists());
    }
}
