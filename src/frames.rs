use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{anyhow, Context, Result};
use tiny_skia::Pixmap;

/// Destination for finished frames. Exactly one frame is written per tick,
/// in strictly increasing index order, before the next frame is rendered.
pub trait FrameSink {
    fn write_frame(&mut self, pixmap: &Pixmap) -> Result<()>;
    fn frames_written(&self) -> u32;
}

/// Scratch directory of `frame_<index>.png` files, cleared at run start and
/// removed after a fully successful run. A failed encode leaves the frames
/// behind for manual recovery.
pub struct DiskFrameStore {
    dir: PathBuf,
    next_index: u32,
}

impl DiskFrameStore {
    pub fn create(dir: &Path) -> Result<Self> {
        if dir.exists() {
            fs::remove_dir_all(dir)
                .with_context(|| format!("failed to clear frame directory {}", dir.display()))?;
        }
        fs::create_dir_all(dir)
            .with_context(|| format!("failed to create frame directory {}", dir.display()))?;
        Ok(Self {
            dir: dir.to_path_buf(),
            next_index: 0,
        })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// ffmpeg-style input pattern for the numbered sequence.
    pub fn pattern(&self) -> PathBuf {
        self.dir.join("frame_%d.png")
    }

    pub fn remove(self) -> Result<()> {
        fs::remove_dir_all(&self.dir)
            .with_context(|| format!("failed to remove frame directory {}", self.dir.display()))
    }
}

impl FrameSink for DiskFrameStore {
    fn write_frame(&mut self, pixmap: &Pixmap) -> Result<()> {
        let path = self.dir.join(format!("frame_{}.png", self.next_index));
        let image = image::RgbaImage::from_raw(
            pixmap.width(),
            pixmap.height(),
            pixmap.data().to_vec(),
        )
        .ok_or_else(|| anyhow!("frame buffer size mismatch"))?;
        image
            .save(&path)
            .with_context(|| format!("failed to write frame {}", path.display()))?;
        self.next_index += 1;
        Ok(())
    }

    fn frames_written(&self) -> u32 {
        self.next_index
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn frames_are_numbered_from_zero_in_order() {
        let scratch = tempfile::tempdir().expect("tempdir");
        let dir = scratch.path().join("frames");
        let mut store = DiskFrameStore::create(&dir).expect("store creates");

        let pixmap = Pixmap::new(4, 4).expect("pixmap");
        for _ in 0..3 {
            store.write_frame(&pixmap).expect("frame writes");
        }
        assert_eq!(store.frames_written(), 3);
        for index in 0..3 {
            assert!(dir.join(format!("frame_{index}.png")).is_file());
        }
    }

    #[test]
    fn create_clears_stale_frames() {
        let scratch = tempfile::tempdir().expect("tempdir");
        let dir = scratch.path().join("frames");
        fs::create_dir_all(&dir).expect("mkdir");
        fs::write(dir.join("frame_9.png"), b"stale").expect("stale file");

        let store = DiskFrameStore::create(&dir).expect("store creates");
        assert!(!dir.join("frame_9.png").exists());
        assert_eq!(store.frames_written(), 0);
    }

    #[test]
    fn remove_deletes_the_scratch_dir() {
        let scratch = tempfile::tempdir().expect("tempdir");
        let dir = scratch.path().join("frames");
        let mut store = DiskFrameStore::create(&dir).expect("store creates");
        let pixmap = Pixmap::new(2, 2).expect("pixmap");
        store.write_frame(&pixmap).expect("frame writes");

        store.remove().expect("remove succeeds");
        assert!(!dir.exists());
    }
}
