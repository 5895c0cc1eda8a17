//! Where presented CPU frames go.

use std::path::PathBuf;
use std::sync::{Arc, Mutex};

use crate::error::{OverlayError, Result};

use super::frame::Frame;

/// Receives every presented frame.
pub trait FrameSink: Send {
    fn consume(&mut self, frame: &Frame, index: u64) -> Result<()>;
}

/// Keeps a copy of the most recent frame for other threads to read.
#[derive(Debug, Clone, Default)]
pub struct LatestFrame {
    shared: Arc<Mutex<Option<Frame>>>,
}

impl LatestFrame {
    pub fn new() -> Self {
        Self::default()
    }

    /// Copy of the last presented frame, if any.
    pub fn latest(&self) -> Option<Frame> {
        self.shared.lock().expect("latest frame lock poisoned").clone()
    }
}

impl FrameSink for LatestFrame {
    fn consume(&mut self, frame: &Frame, _index: u64) -> Result<()> {
        let mut slot = self.shared.lock().expect("latest frame lock poisoned");
        match slot.as_mut() {
            Some(prev) if prev.width() == frame.width() && prev.height() == frame.height() => {
                prev.clone_from(frame)
            }
            _ => *slot = Some(frame.clone()),
        }
        Ok(())
    }
}

/// Writes every `every`-th frame as `frame_NNNNNN.png` under `dir`.
#[derive(Debug, Clone)]
pub struct PngSnapshot {
    dir: PathBuf,
    every: u64,
}

impl PngSnapshot {
    pub fn new(dir: impl Into<PathBuf>, every: u64) -> Self {
        Self { dir: dir.into(), every: every.max(1) }
    }

    pub fn path_for(&self, index: u64) -> PathBuf {
        self.dir.join(format!("frame_{index:06}.png"))
    }
}

impl FrameSink for PngSnapshot {
    fn consume(&mut self, frame: &Frame, index: u64) -> Result<()> {
        if index % self.every != 0 {
            return Ok(());
        }
        let path = self.path_for(index);
        let img = image::RgbaImage::from_raw(frame.width(), frame.height(), frame.data().to_vec())
            .ok_or_else(|| OverlayError::skipped("frame size does not match its data"))?;
        img.save(&path)
            .map_err(|e| OverlayError::skipped(format!("png snapshot {}: {e}", path.display())))?;
        log::debug!("wrote {}", path.display());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::coords::Rgba;

    fn frame() -> Frame {
        let mut p = Frame::new(3, 2);
        p.fill(Rgba::rgb(200, 10, 10));
        p
    }

    #[test]
    fn latest_frame_tracks_the_newest() {
        let mut sink = LatestFrame::new();
        assert!(sink.latest().is_none());

        sink.consume(&frame(), 0).unwrap();
        let mut second = frame();
        second.fill(Rgba::rgb(0, 0, 50));
        sink.consume(&second, 1).unwrap();
        assert_eq!(sink.latest(), Some(second));
    }

    #[test]
    fn png_snapshot_writes_every_nth_frame() {
        let dir = std::env::temp_dir().join(format!("projector-png-{}", std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();
        let mut sink = PngSnapshot::new(&dir, 2);

        for index in 0..3 {
            sink.consume(&frame(), index).unwrap();
        }
        assert!(sink.path_for(0).exists());
        assert!(!sink.path_for(1).exists());
        assert!(sink.path_for(2).exists());

        let img = image::open(sink.path_for(2)).unwrap().to_rgba8();
        assert_eq!(img.dimensions(), (3, 2));
        assert_eq!(img.get_pixel(1, 1).0, [200, 10, 10, 255]);
        std::fs::remove_dir_all(&dir).unwrap();
    }

    #[test]
    fn missing_directory_is_a_skip() {
        let mut sink = PngSnapshot::new("/nonexistent/projector/frames", 1);
        let err = sink.consume(&frame(), 0).unwrap_err();
        assert!(!err.is_fatal());
    }
}
