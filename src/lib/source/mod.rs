pub mod authorization;
pub mod image_dir;
pub mod synthetic;

use std::fmt;

use anyhow::Result;
use enum_dispatch::enum_dispatch;
use scopeguard::ScopeGuard;
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tracing::*;

use image_dir::ImageDirSource;
use synthetic::SyntheticSource;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PixelFormat {
    Rgb8,
    Bgr8,
    Rgba8,
    Gray8,
}

impl PixelFormat {
    pub fn bytes_per_pixel(&self) -> usize {
        match self {
            Self::Rgb8 | Self::Bgr8 => 3,
            Self::Rgba8 => 4,
            Self::Gray8 => 1,
        }
    }
}

/// A raw frame as emitted by a producer.
#[derive(Clone, PartialEq)]
pub struct Frame {
    pub pixels: Vec<u8>,
    pub width: u32,
    pub height: u32,
    pub format: PixelFormat,
}

impl fmt::Debug for Frame {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Frame")
            .field("width", &self.width)
            .field("height", &self.height)
            .field("format", &self.format)
            .field("bytes", &self.pixels.len())
            .finish()
    }
}

#[enum_dispatch]
pub trait FrameSourceInterface {
    fn name(&self) -> String;

    /// Starts the producer. Frames are pushed into `frames` on the producer's
    /// own schedule until the returned handle is stopped or the receiver is dropped.
    fn open(&mut self, frames: mpsc::Sender<Frame>) -> Result<SourceHandle>;
}

#[enum_dispatch(FrameSourceInterface)]
#[derive(Debug)]
pub enum Source {
    Synthetic(SyntheticSource),
    Directory(ImageDirSource),
}

type StopCallback = Box<dyn FnOnce() + Send>;

/// Ownership of a running producer.
///
/// The stop callback runs exactly once: on [`SourceHandle::stop`] or, failing
/// that, when the handle is dropped.
pub struct SourceHandle {
    name: String,
    stop: Option<ScopeGuard<StopCallback, fn(StopCallback)>>,
}

fn run_stop_callback(callback: StopCallback) {
    callback()
}

impl SourceHandle {
    pub fn new(name: impl Into<String>, stop: impl FnOnce() + Send + 'static) -> Self {
        let stop: StopCallback = Box::new(stop);
        Self {
            name: name.into(),
            stop: Some(scopeguard::guard(stop, run_stop_callback as fn(StopCallback))),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn is_running(&self) -> bool {
        self.stop.is_some()
    }

    /// Synchronously stops the producer and releases its resources.
    #[instrument(level = "debug", skip(self), fields(source = self.name))]
    pub fn stop(&mut self) {
        if let Some(guard) = self.stop.take() {
            debug!("Stopping frame source");
            drop(guard);
            debug!("Frame source stopped");
        }
    }
}

/// Pushes one frame from a producer thread without blocking past a stop request.
///
/// Returns `false` when the producer should exit: the stop flag is set or the
/// consumer dropped its receiver.
pub(crate) fn deliver(
    frames: &mpsc::Sender<Frame>,
    mut frame: Frame,
    stop: &std::sync::atomic::AtomicBool,
) -> bool {
    use std::sync::atomic::Ordering;
    use tokio::sync::mpsc::error::TrySendError;

    loop {
        if stop.load(Ordering::Acquire) {
            return false;
        }

        match frames.try_send(frame) {
            Ok(()) => return true,
            Err(TrySendError::Closed(_)) => return false,
            Err(TrySendError::Full(returned)) => {
                frame = returned;
                std::thread::sleep(std::time::Duration::from_millis(1));
            }
        }
    }
}

impl fmt::Debug for SourceHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SourceHandle")
            .field("name", &self.name)
            .field("running", &self.is_running())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use std::sync::{
        atomic::{AtomicUsize, Ordering},
        Arc,
    };

    #[test]
    fn stop_callback_runs_exactly_once() {
        let calls = Arc::new(AtomicUsize::new(0));

        let mut handle = SourceHandle::new("test", {
            let calls = calls.clone();
            move || {
                calls.fetch_add(1, Ordering::SeqCst);
            }
        });

        assert!(handle.is_running());
        handle.stop();
        handle.stop();
        assert!(!handle.is_running());
        drop(handle);

        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn dropping_the_handle_stops_the_source() {
        let calls = Arc::new(AtomicUsize::new(0));

        drop(SourceHandle::new("test", {
            let calls = calls.clone();
            move || {
                calls.fetch_add(1, Ordering::SeqCst);
            }
        }));

        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn pixel_format_sizes() {
        assert_eq!(PixelFormat::Rgba8.bytes_per_pixel(), 4);
        assert_eq!(PixelFormat::Bgr8.bytes_per_pixel(), 3);
        assert_eq!(PixelFormat::Gray8.bytes_per_pixel(), 1);
    }
}
