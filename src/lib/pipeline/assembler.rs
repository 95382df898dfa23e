//! The concrete classification pipeline:
//!
//! `source -> gate -> decode -> [rotate] -> [crop] -> resize -> normalize -> infer -> top_n`,
//! then fanned out to `render` (posted to the UI context) and to the latency
//! smoother (report posted to the UI context).

use std::sync::{
    atomic::{AtomicU64, Ordering},
    Arc, Mutex,
};

use image::RgbImage;
use serde::Serialize;
use tokio::{sync::mpsc, task::JoinSet};
use tokio_util::sync::CancellationToken;
use tracing::*;

use super::{
    agent::Agent,
    clock,
    gate::{AdmissionGate, AdmissionPermit},
    smoother::LatencySmoother,
    stage::{apply_async, wrap, wrap_infallible},
    stats::{PipelineStats, StatsSnapshot},
    token::Token,
    ui::{UiContext, UiSender},
};
use crate::{
    classifier::{top_n::extract_top_n, Label},
    error::{PipelineError, Result},
    inference::{InferenceEngine, InputShape},
    report::{busiest_thread_latency_ms, frame_timeline, LatencyReport},
    settings::manager::{CropSize, PipelineSettings},
    source::{
        authorization::{authorize_with_retry, Authorizer},
        Frame, FrameSourceInterface, Source,
    },
    vision::{
        decode::decode,
        normalize::Normalization,
        overlay::{render_labels, Overlay},
        resize::{center_crop, resize, rotate},
    },
};

const FRAME_QUEUE_CAPACITY: usize = 4;

#[derive(Debug, Clone, PartialEq)]
pub struct PipelineConfig {
    pub normalization: Normalization,
    pub top_n: usize,
    pub discount: f32,
    pub overlay_width: u32,
    pub overlay_height: u32,
    pub rotate_degrees: u32,
    pub center_crop: Option<CropSize>,
    pub authorization_retries: u32,
    /// Frames buffered between the producer thread and the ingest loop.
    pub frame_queue_capacity: usize,
}

impl From<&PipelineSettings> for PipelineConfig {
    fn from(settings: &PipelineSettings) -> Self {
        Self {
            normalization: Normalization {
                mean: settings.mean,
                scale: settings.scale,
                order: settings.channel_order,
            },
            top_n: settings.top_n,
            discount: settings.discount,
            overlay_width: settings.overlay_width,
            overlay_height: settings.overlay_height,
            rotate_degrees: settings.rotate_degrees,
            center_crop: settings.center_crop,
            authorization_retries: settings.authorization_retries,
            frame_queue_capacity: FRAME_QUEUE_CAPACITY,
        }
    }
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self::from(&PipelineSettings::default())
    }
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct PipelineSummary {
    pub stats: StatsSnapshot,
    pub last_report: Option<LatencyReport>,
    /// Busiest execution context of the last completed frame, plus a 5% margin.
    pub suggested_interval_ms: Option<u64>,
}

/// Everything a per-frame task needs, shared with the pipeline.
struct FrameContext {
    config: PipelineConfig,
    engine: Arc<dyn InferenceEngine>,
    labels: Vec<String>,
    stats: PipelineStats,
    smoother: Mutex<LatencySmoother<Vec<Label>>>,
    last_report: Mutex<Option<LatencyReport>>,
    suggested_interval_ms: AtomicU64,
}

pub struct ClassifierPipeline {
    id: uuid::Uuid,
    gate: AdmissionGate,
    context: Arc<FrameContext>,
}

impl std::fmt::Debug for ClassifierPipeline {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ClassifierPipeline")
            .field("id", &self.id)
            .field("config", &self.context.config)
            .field("busy", &self.gate.is_busy())
            .finish()
    }
}

impl ClassifierPipeline {
    /// Assembles the pipeline, rejecting configurations that could only fail later on every frame.
    #[instrument(level = "debug", skip_all)]
    pub fn try_new(
        config: PipelineConfig,
        engine: Arc<dyn InferenceEngine>,
        labels: Vec<String>,
    ) -> Result<Self> {
        let output_len = engine.output_len();

        if labels.len() != output_len {
            return Err(PipelineError::LabelCountMismatch {
                labels: labels.len(),
                output_len,
            });
        }
        if config.top_n > output_len {
            return Err(PipelineError::InvalidTopN {
                n: config.top_n,
                output_len,
            });
        }
        if !(config.discount > 0.0 && config.discount < 1.0) {
            return Err(PipelineError::InvalidConfig(format!(
                "latency discount must be inside (0, 1), got {}",
                config.discount
            )));
        }
        if config.normalization.scale == 0.0 {
            return Err(PipelineError::InvalidConfig(
                "normalization scale cannot be zero".into(),
            ));
        }
        if config.frame_queue_capacity == 0 {
            return Err(PipelineError::InvalidConfig(
                "frame queue capacity must be at least 1".into(),
            ));
        }
        let InputShape { width, height } = engine.input_shape();
        if width == 0 || height == 0 {
            return Err(PipelineError::InvalidConfig(format!(
                "engine input shape {width}x{height} is empty"
            )));
        }

        let id = uuid::Uuid::new_v4();
        debug!("Assembled classifier pipeline {id}");

        Ok(Self {
            id,
            gate: AdmissionGate::new(),
            context: Arc::new(FrameContext {
                smoother: Mutex::new(LatencySmoother::new(config.discount)),
                config,
                engine,
                labels,
                stats: PipelineStats::default(),
                last_report: Mutex::new(None),
                suggested_interval_ms: AtomicU64::new(0),
            }),
        })
    }

    pub fn id(&self) -> uuid::Uuid {
        self.id
    }

    pub fn stats(&self) -> StatsSnapshot {
        self.context.stats.snapshot()
    }

    pub fn is_busy(&self) -> bool {
        self.gate.is_busy()
    }

    pub fn summary(&self) -> PipelineSummary {
        let suggested = self.context.suggested_interval_ms.load(Ordering::Relaxed);
        PipelineSummary {
            stats: self.stats(),
            last_report: self.context.last_report.lock().unwrap().clone(),
            suggested_interval_ms: (suggested > 0).then_some(suggested),
        }
    }

    /// Authorizes, opens `source` and classifies its frames until the source
    /// ends or `cancel` fires.
    ///
    /// The source is stopped, synchronously, before in-flight work is drained,
    /// and no frame is accepted before authorization succeeds.
    #[instrument(level = "debug", skip_all, fields(pipeline_id = self.id.to_string()))]
    pub async fn run(
        &self,
        source: &mut Source,
        authorizer: &dyn Authorizer,
        ui: &UiContext,
        cancel: CancellationToken,
    ) -> Result<PipelineSummary> {
        authorize_with_retry(authorizer, self.context.config.authorization_retries).await?;

        let (frames_tx, mut frames) = mpsc::channel(self.context.config.frame_queue_capacity);
        let mut handle = source
            .open(frames_tx)
            .map_err(|error| PipelineError::Source(format!("{error:#}")))?;
        info!("Source {:?} opened", handle.name());

        let ui = ui.sender();
        let epoch_ms = clock::now_ms();
        let mut in_flight = JoinSet::new();

        loop {
            tokio::select! {
                biased;
                _ = cancel.cancelled() => {
                    info!("Pipeline cancelled");
                    break;
                }
                Some(finished) = in_flight.join_next(), if !in_flight.is_empty() => {
                    self.reap(finished);
                }
                frame = frames.recv() => {
                    let Some(frame) = frame else {
                        info!("Source reached the end of its stream");
                        break;
                    };
                    self.ingest(frame, &ui, epoch_ms, &mut in_flight);
                }
            }
        }

        drop(frames);
        tokio::task::spawn_blocking(move || handle.stop()).await?;

        while let Some(finished) = in_flight.join_next().await {
            self.reap(finished);
        }

        let summary = self.summary();
        debug!("Pipeline finished: {:?}", summary.stats);
        Ok(summary)
    }

    fn ingest(
        &self,
        frame: Frame,
        ui: &UiSender,
        epoch_ms: u64,
        in_flight: &mut JoinSet<()>,
    ) {
        let token = Token::source("source", frame);
        self.context.stats.frame_received();

        let Some(permit) = self.gate.try_admit() else {
            self.context.stats.frame_dropped();
            trace!("Pipeline busy, dropping frame");
            return;
        };
        self.context.stats.frame_admitted();

        let context = self.context.clone();
        let ui = ui.clone();
        in_flight.spawn(
            async move { context.process(permit, token, &ui, epoch_ms).await }
                .instrument(debug_span!("frame")),
        );
    }

    fn reap(&self, finished: std::result::Result<(), tokio::task::JoinError>) {
        if let Err(error) = finished {
            self.context.stats.stage_failed();
            error!("Frame task panicked: {error}");
        }
    }
}

impl FrameContext {
    /// Runs one admitted frame to completion. The permit is held until both
    /// fan-out branches are done, or until the first failure.
    async fn process(
        self: Arc<Self>,
        permit: AdmissionPermit,
        token: Token<Frame>,
        ui: &UiSender,
        epoch_ms: u64,
    ) {
        let _permit = permit;

        match self.clone().classify(token).await {
            Ok(labels) => {
                self.fan_out(labels, ui, epoch_ms);
                self.stats.frame_completed();
            }
            Err(error @ PipelineError::Decode(_)) => {
                self.stats.decode_failed();
                warn!("Discarding frame: {error}");
            }
            Err(error) => {
                self.stats.stage_failed();
                error!("Frame failed: {error}");
            }
        }
    }

    async fn classify(self: Arc<Self>, token: Token<Frame>) -> Result<Token<Vec<Label>>> {
        let tensor = tokio::task::spawn_blocking({
            let context = self.clone();
            move || context.prepare(token)
        })
        .await??;

        let InputShape { width, height } = self.engine.input_shape();
        let engine = self.engine.clone();
        let scores = apply_async("infer", tensor, |tensor| async move {
            engine
                .infer(tensor, width, height)
                .await
                .map_err(PipelineError::from)
        })
        .await?;

        tokio::task::spawn_blocking(move || {
            let mut top_n = wrap("top_n", |mut scores: Vec<f32>| {
                extract_top_n(&mut scores, &self.labels, self.config.top_n)
            });
            top_n(scores)
        })
        .await?
    }

    /// CPU-bound stages, from the raw frame to the model input tensor.
    fn prepare(&self, token: Token<Frame>) -> Result<Token<Vec<f32>>> {
        let mut token: Token<RgbImage> = wrap("decode", decode)(token)?;

        let degrees = self.config.rotate_degrees % 360;
        if degrees != 0 {
            let mut rotate_stage = wrap_infallible("rotate", |image| rotate(image, degrees));
            token = rotate_stage(token);
        }

        if let Some(crop) = self.config.center_crop {
            let mut crop_stage =
                wrap_infallible("crop", |image: RgbImage| center_crop(&image, crop));
            token = crop_stage(token);
        }

        let InputShape { width, height } = self.engine.input_shape();
        let mut resize_stage =
            wrap_infallible("resize", |image: RgbImage| resize(&image, width, height));
        let mut normalize_stage = wrap_infallible("normalize", |image: RgbImage| {
            self.config.normalization.apply(&image)
        });

        Ok(normalize_stage(resize_stage(token)))
    }

    /// Both branches see the same completed history.
    fn fan_out(&self, labels: Token<Vec<Label>>, ui: &UiSender, epoch_ms: u64) {
        let (width, height) = (self.config.overlay_width, self.config.overlay_height);
        let mut render =
            wrap_infallible("render", |labels| render_labels(labels, width, height));
        let overlay: Token<Overlay> = render(labels.clone());
        ui.overlay(overlay);

        trace!("\n{}", frame_timeline(labels.meta(), epoch_ms));
        let busiest = busiest_thread_latency_ms(labels.meta());
        self.suggested_interval_ms.store(busiest, Ordering::Relaxed);

        let (_, report) = self.smoother.lock().unwrap().apply(labels);
        debug!("Stage latencies:\n{report}");
        *self.last_report.lock().unwrap() = Some(report.clone());
        ui.report(report);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use tracing_test::traced_test;

    use crate::{
        classifier::labels::generated_labels, inference::SyntheticEngine,
        pipeline::ui::TracingRenderer,
    };

    fn engine(classes: usize) -> Arc<dyn InferenceEngine> {
        Arc::new(SyntheticEngine::new(
            InputShape {
                width: 8,
                height: 8,
            },
            classes,
        ))
    }

    fn frame(width: u32, height: u32) -> Frame {
        Frame {
            pixels: vec![100; (width * height * 3) as usize],
            width,
            height,
            format: crate::source::PixelFormat::Rgb8,
        }
    }

    #[test]
    fn assembly_rejects_mismatched_labels_and_top_n() {
        let config = PipelineConfig::default();

        assert!(matches!(
            ClassifierPipeline::try_new(config.clone(), engine(4), generated_labels(3)),
            Err(PipelineError::LabelCountMismatch {
                labels: 3,
                output_len: 4
            })
        ));

        let config = PipelineConfig {
            top_n: 5,
            ..config
        };
        assert!(matches!(
            ClassifierPipeline::try_new(config, engine(4), generated_labels(4)),
            Err(PipelineError::InvalidTopN {
                n: 5,
                output_len: 4
            })
        ));
    }

    #[tokio::test]
    async fn classify_records_every_stage_in_order() {
        let config = PipelineConfig {
            rotate_degrees: 90,
            center_crop: Some(CropSize {
                width: 10,
                height: 10,
            }),
            ..Default::default()
        };
        let pipeline = ClassifierPipeline::try_new(config, engine(4), generated_labels(4)).unwrap();

        let token = Token::source("source", frame(16, 12));
        let labels = pipeline.context.clone().classify(token).await.unwrap();

        assert_eq!(
            labels.meta().tags(),
            ["source", "decode", "rotate", "crop", "resize", "normalize", "infer", "top_n"]
        );
        assert!(labels.meta().is_consistent());
        assert_eq!(labels.value().len(), 3);
    }

    #[tokio::test]
    async fn decode_failures_stop_the_frame_without_history() {
        let pipeline =
            ClassifierPipeline::try_new(PipelineConfig::default(), engine(4), generated_labels(4))
                .unwrap();

        let mut broken = frame(4, 4);
        broken.pixels.truncate(5);

        let result = pipeline
            .context
            .clone()
            .classify(Token::source("source", broken))
            .await;
        assert!(matches!(result, Err(PipelineError::Decode(_))));
    }

    #[tokio::test]
    #[traced_test]
    async fn failed_frames_release_the_gate_and_are_counted() {
        let engine = SyntheticEngine::new(
            InputShape {
                width: 8,
                height: 8,
            },
            4,
        )
        .with_failure_every(1);
        let pipeline = ClassifierPipeline::try_new(
            PipelineConfig::default(),
            Arc::new(engine),
            generated_labels(4),
        )
        .unwrap();
        let ui = UiContext::spawn(TracingRenderer, 1).unwrap();

        let permit = pipeline.gate.try_admit().unwrap();
        assert!(pipeline.is_busy());
        pipeline
            .context
            .clone()
            .process(permit, Token::source("source", frame(8, 8)), &ui.sender(), 0)
            .await;

        assert!(!pipeline.is_busy());
        assert_eq!(pipeline.stats().stage_failures, 1);
        assert!(pipeline.summary().last_report.is_none());
        assert!(logs_contain("Frame failed"));

        assert!(ui.shutdown().unwrap().is_empty());
    }

    #[tokio::test]
    #[traced_test]
    async fn malformed_frames_are_discarded_and_the_stream_carries_on() {
        let pipeline =
            ClassifierPipeline::try_new(PipelineConfig::default(), engine(4), generated_labels(4))
                .unwrap();
        let ui = UiContext::spawn(TracingRenderer, 1).unwrap();

        let mut broken = frame(4, 4);
        broken.pixels.truncate(5);

        let permit = pipeline.gate.try_admit().unwrap();
        pipeline
            .context
            .clone()
            .process(permit, Token::source("source", broken), &ui.sender(), 0)
            .await;

        assert!(!pipeline.is_busy());
        assert_eq!(pipeline.stats().decode_failures, 1);
        assert!(pipeline.summary().last_report.is_none());
        assert!(logs_contain("Discarding frame"));

        let permit = pipeline.gate.try_admit().unwrap();
        pipeline
            .context
            .clone()
            .process(permit, Token::source("source", frame(8, 8)), &ui.sender(), 0)
            .await;

        assert!(!pipeline.is_busy());
        let stats = pipeline.stats();
        assert_eq!(stats.completed, 1);
        assert_eq!(stats.decode_failures, 1);
        assert_eq!(stats.stage_failures, 0);
        assert_eq!(pipeline.summary().last_report.unwrap().len(), 6);

        assert_eq!(ui.shutdown().unwrap().len(), 1);
    }
}
