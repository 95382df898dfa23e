//! The single-threaded presentation context.
//!
//! Overlays and latency reports produced on worker threads are posted to a
//! dedicated `ui` thread, the only place a [`Renderer`] is ever called from.

use std::thread::JoinHandle;

use anyhow::{anyhow, Context, Result};
use tokio::sync::mpsc;
use tracing::*;

use super::{agent::Agent, grabber::Grabber, stage::wrap_infallible, token::Token};
use crate::{report::LatencyReport, vision::overlay::Overlay};

pub const UI_THREAD_NAME: &str = "ui";

/// Presentation surface, owned by the UI thread.
pub trait Renderer: Send + 'static {
    fn render(&mut self, overlay: &Token<Overlay>);

    fn report(&mut self, report: &LatencyReport);
}

#[derive(Debug)]
pub enum UiEvent {
    Overlay(Token<Overlay>),
    Report(LatencyReport),
}

/// Cloneable handle used by the pipeline to post work to the UI thread.
#[derive(Debug, Clone)]
pub struct UiSender {
    events: mpsc::UnboundedSender<UiEvent>,
}

impl UiSender {
    pub fn overlay(&self, overlay: Token<Overlay>) {
        if self.events.send(UiEvent::Overlay(overlay)).is_err() {
            warn!("UI context is gone, dropping overlay");
        }
    }

    pub fn report(&self, report: LatencyReport) {
        if self.events.send(UiEvent::Report(report)).is_err() {
            warn!("UI context is gone, dropping latency report");
        }
    }
}

#[derive(Debug)]
pub struct UiContext {
    sender: UiSender,
    thread: JoinHandle<Vec<Overlay>>,
}

impl UiContext {
    /// Starts the UI thread. The last `capture_capacity` overlays it renders are kept.
    #[instrument(level = "debug", skip(renderer))]
    pub fn spawn(mut renderer: impl Renderer, capture_capacity: usize) -> Result<Self> {
        if capture_capacity == 0 {
            return Err(anyhow!("Capture capacity must be at least 1"));
        }

        let (events, mut receiver) = mpsc::unbounded_channel();

        let thread = std::thread::Builder::new()
            .name(UI_THREAD_NAME.into())
            .spawn(move || {
                let mut grabber: Grabber<Overlay> = Grabber::new(capture_capacity);
                let mut overlays_rendered = 0usize;

                while let Some(event) = receiver.blocking_recv() {
                    match event {
                        UiEvent::Overlay(token) => {
                            let mut capture = wrap_infallible("capture", |overlay: Overlay| {
                                grabber.apply(overlay)
                            });
                            let token = capture(token);
                            renderer.render(&token);
                            overlays_rendered += 1;
                        }
                        UiEvent::Report(report) => renderer.report(&report),
                    }
                }

                debug!("UI context closed after {overlays_rendered} overlays");
                grabber.captured()
            })
            .context("Failed spawning the UI thread")?;

        Ok(Self {
            sender: UiSender { events },
            thread,
        })
    }

    pub fn sender(&self) -> UiSender {
        self.sender.clone()
    }

    /// Stops accepting events, drains the queue and returns the captured overlays,
    /// oldest first. Every [`UiSender`] clone must be dropped for this to return.
    #[instrument(level = "debug", skip(self))]
    pub fn shutdown(self) -> Result<Vec<Overlay>> {
        let Self { sender, thread } = self;
        drop(sender);

        thread
            .join()
            .map_err(|_| anyhow!("UI thread panicked"))
    }
}

/// Renders through the log: one line per label and the latency table.
#[derive(Debug, Default)]
pub struct TracingRenderer;

impl Renderer for TracingRenderer {
    fn render(&mut self, overlay: &Token<Overlay>) {
        for label in &overlay.value().labels {
            info!("{label}");
        }
    }

    fn report(&mut self, report: &LatencyReport) {
        debug!("Stage latencies:\n{report}");
    }
}
