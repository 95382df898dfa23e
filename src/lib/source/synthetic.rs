use std::{
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

/// Produces moving RGB gradients at a fixed interval, standing in for a camera.
#[derive(Debug, Clone)]
pub struct SyntheticSource {
    pub width: u32,
    pub height: u32,
    pub interval: Duration,
    pub max_frames: Option<usize>,
    pub format: PixelFormat,
}

impl SyntheticSource {
    pub fn new(width: u32, height: u32, interval: Duration) -> Self {
        Self {
            width,
            height,
            interval,
            max_frames: None,
            format: PixelFormat::Rgb8,
        }
    }

    pub fn with_max_frames(mut self, max_frames: Option<usize>) -> Self {
        self.max_frames = max_frames;
        self
    }

    pub fn with_format(mut self, format: PixelFormat) -> Self {
        self.format = format;
        self
    }

    /// Renders frame number `index`. The gradient shifts with the index so
    /// consecutive frames differ.
    pub fn render(&self, index: usize) -> Frame {
        let channels = self.format.bytes_per_pixel();
        let mut pixels = Vec::with_capacity(self.width as usize * self.height as usize * channels);

        let shift = (index % 256) as u32 * 7;
        for y in 0..self.height {
            for x in 0..self.width {
                let r = gradient(x + shift, self.width);
                let g = gradient(y + shift, self.height);
                let b = (index % 256) as u8;

                match self.format {
                    PixelFormat::Rgb8 => pixels.extend_from_slice(&[r, g, b]),
                    PixelFormat::Bgr8 => pixels.extend_from_slice(&[b, g, r]),
                    PixelFormat::Rgba8 => pixels.extend_from_slice(&[r, g, b, 255]),
                    PixelFormat::Gray8 => pixels.push(r / 2 + g / 2),
                }
            }
        }

        Frame {
            pixels,
            width: self.width,
            height: self.height,
            format: self.format,
        }
    }
}

/// Maps `position` onto a byte ramp over one `extent`, wrapping around at the edge.
fn gradient(position: u32, extent: u32) -> u8 {
    let extent = extent.max(1);
    ((position % extent) * 255 / extent) as u8
}

impl FrameSourceInterface for SyntheticSource {
    fn name(&self) -> String {
        format!("synthetic {}x{}", self.width, self.height)
    }

    #[instrument(level = "debug", skip(self, frames))]
    fn open(&mut self, frames: mpsc::Sender<Frame>) -> Result<SourceHandle> {
        if self.width == 0 || self.height == 0 {
            return Err(anyhow!(
                "Invalid synthetic frame size {}x{}",
                self.width,
                self.height
            ));
        }

        let stop = Arc::new(AtomicBool::new(false));
        let producer = self.clone();

        let thread = std::thread::Builder::new()
            .name("source".into())
            .spawn({
                let stop = stop.clone();
                move || {
                    let mut index = 0;
                    while producer.max_frames.map_or(true, |max| index < max) {
                        if !deliver(&frames, producer.render(index), &stop) {
                            break;
                        }
                        index += 1;
                        std::thread::sleep(producer.interval);
                    }
                    debug!("Synthetic source finished after {index} frames");
                }
            })
            .context("Failed spawning the synthetic source thread")?;

        Ok(SourceHandle::new(self.name(), move || {
            stop.store(true, Ordering::Release);
            if thread.join().is_err() {
                error!("Synthetic source thread panicked");
            }
        }))
    }
}
