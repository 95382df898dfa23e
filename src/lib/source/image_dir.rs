use std::{
    path::{Path, PathBuf},
    sync::{
        atomic::{AtomicBool, Ordering},
        Arc,
    },
    time::Duration,
};

use anyhow::{anyhow, Context, Result};
use tokio::sync::mpsc;
use tracing::*;

use super::{deliver, Frame, FrameSourceInterface, PixelFormat, SourceHandle};

const EXTENSIONS: [&str; 4] = ["png", "jpg", "jpeg", "bmp"];

/// Replays the still images of a directory, in file name order, as a frame stream.
#[derive(Debug, Clone)]
pub struct ImageDirSource {
    pub directory: PathBuf,
    pub interval: Duration,
    pub max_frames: Option<usize>,
    pub looping: bool,
}

impl ImageDirSource {
    pub fn new(directory: impl Into<PathBuf>, interval: Duration) -> Self {
        Self {
            directory: directory.into(),
            interval,
            max_frames: None,
            looping: false,
        }
    }

    pub fn with_max_frames(mut self, max_frames: Option<usize>) -> Self {
        self.max_frames = max_frames;
        self
    }

    /// Restart from the first image after the last one, until stopped or `max_frames` is reached.
    pub fn with_looping(mut self, looping: bool) -> Self {
        self.looping = looping;
        self
    }

    pub fn image_paths(&self) -> Result<Vec<PathBuf>> {
        let entries = std::fs::read_dir(&self.directory)
            .with_context(|| format!("Failed listing {:?}", self.directory))?;

        let mut paths: Vec<PathBuf> = entries
            .filter_map(|entry| entry.ok().map(|entry| entry.path()))
            .filter(|path| path.is_file() && has_image_extension(path))
            .collect();
        paths.sort();

        Ok(paths)
    }
}

fn has_image_extension(path: &Path) -> bool {
    path.extension()
        .and_then(|extension| extension.to_str())
        .map(|extension| EXTENSIONS.contains(&extension.to_ascii_lowercase().as_str()))
        .unwrap_or(false)
}

fn read_frame(path: &Path) -> Result<Frame> {
    let image = image::open(path)
        .with_context(|| format!("Failed reading image {path:?}"))?
        .into_rgb8();

    Ok(Frame {
        width: image.width(),
        height: image.height(),
        format: PixelFormat::Rgb8,
        pixels: image.into_raw(),
    })
}

impl FrameSourceInterface for ImageDirSource {
    fn name(&self) -> String {
        format!("directory {}", self.directory.display())
    }

    #[instrument(level = "debug", skip(self, frames), fields(directory = ?self.directory))]
    fn open(&mut self, frames: mpsc::Sender<Frame>) -> Result<SourceHandle> {
        let paths = self.image_paths()?;
        if paths.is_empty() {
            return Err(anyhow!("No images found in {:?}", self.directory));
        }
        info!("Replaying {} images", paths.len());

        let stop = Arc::new(AtomicBool::new(false));
        let interval = self.interval;
        let looping = self.looping;
        let limit = self.max_frames.unwrap_or(usize::MAX);

        let thread = std::thread::Builder::new()
            .name("source".into())
            .spawn({
                let stop = stop.clone();
                move || {
                    let mut emitted = 0;
                    'replay: loop {
                        let pass_start = emitted;
                        for path in &paths {
                            if emitted >= limit {
                                break 'replay;
                            }

                            let frame = match read_frame(path) {
                                Ok(frame) => frame,
                                Err(error) => {
                                    warn!("Skipping unreadable image: {error:#}");
                                    continue;
                                }
                            };

                            if !deliver(&frames, frame, &stop) {
                                break 'replay;
                            }
                            emitted += 1;
                            std::thread::sleep(interval);
                        }

                        if !looping || emitted == pass_start {
                            break;
                        }
                    }
                    debug!("Directory source finished after {emitted} frames");
                }
            })
            .context("Failed spawning the directory source thread")?;

        Ok(SourceHandle::new(self.name(), move || {
            stop.store(true, Ordering::Release);
            if thread.join().is_err() {
                error!("Directory source thread panicked");
            }
        }))
    }
}
