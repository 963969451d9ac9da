use anyhow::Context;
use std::path::{Path, PathBuf};
use time::OffsetDateTime;
use time::format_description::BorrowedFormatItem;
use tracing::{debug, info};

use super::{AnnotatedFrame, FrameSink};

/// Any closure taking a frame is a sink
impl<F> FrameSink for F
where
    F: FnMut(&AnnotatedFrame) -> anyhow::Result<()>,
{
    fn present(&mut self, frame: &AnnotatedFrame) -> anyhow::Result<()> {
        self(frame)
    }
}

/// Writes each annotated frame to `<dir>/frame_<index>.jpg`
pub struct FrameDirSink {
    dir: PathBuf,
    written: u64,
}

impl FrameDirSink {
    pub fn create(dir: impl Into<PathBuf>) -> anyhow::Result<Self> {
        let dir = dir.into();
        std::fs::create_dir_all(&dir)
            .with_context(|| format!("Failed to create frame directory {:?}", dir))?;
        info!("Writing annotated frames to {:?}", dir);
        Ok(Self { dir, written: 0 })
    }

    /// A fresh `<root>/<YYYYmmdd-HHMMSS>` directory for one session
    pub fn timestamped(root: &Path) -> anyhow::Result<Self> {
        let now = OffsetDateTime::now_local().unwrap_or_else(|_| OffsetDateTime::now_utc());
        Self::create(root.join(session_dir_name(now)?))
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn written(&self) -> u64 {
        self.written
    }
}

impl FrameSink for FrameDirSink {
    fn present(&mut self, frame: &AnnotatedFrame) -> anyhow::Result<()> {
        let path = self.dir.join(format!("frame_{:06}.jpg", frame.index));
        frame
            .image
            .save(&path)
            .with_context(|| format!("Failed to write frame {:?}", path))?;
        debug!(
            "frame {}: {} detections, {:.1} fps",
            frame.index,
            frame.detections.len(),
            frame.fps
        );
        self.written += 1;
        Ok(())
    }
}

pub fn session_dir_name(at: OffsetDateTime) -> anyhow::Result<String> {
    let format: Vec<BorrowedFormatItem<'_>> =
        time::format_description::parse("[year][month][day]-[hour][minute][second]")?;
    Ok(at.format(&format)?)
}

/// Stops presenting after `limit` frames by raising the session's cancel flag
pub struct FrameLimit<K> {
    inner: K,
    limit: u64,
    seen: u64,
    cancel: super::CancelFlag,
}

impl<K: FrameSink> FrameLimit<K> {
    pub fn new(inner: K, limit: u64, cancel: super::CancelFlag) -> Self {
        if limit == 0 {
            cancel.cancel();
        }
        Self {
            inner,
            limit,
            seen: 0,
            cancel,
        }
    }

    pub fn into_inner(self) -> K {
        self.inner
    }
}

impl<K: FrameSink> FrameSink for FrameLimit<K> {
    fn present(&mut self, frame: &AnnotatedFrame) -> anyhow::Result<()> {
        if self.seen >= self.limit {
            self.cancel.cancel();
            return Ok(());
        }
        self.inner.present(frame)?;
        self.seen += 1;
        if self.seen >= self.limit {
            self.cancel.cancel();
        }
        Ok(())
    }
}
