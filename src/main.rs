use std::{
    path::Path,
    sync::{
        atomic::{AtomicUsize, Ordering},
        Arc,
    },
    time::Duration,
};

use anyhow::{anyhow, Context, Result};
use tokio_util::sync::CancellationToken;
use tracing::*;

use classifier_stream::{
    classifier::labels::{generated_labels, load_labels},
    cli,
    inference::{InferenceEngine, InputShape, SyntheticEngine},
    logger,
    pipeline::{
        ui::{TracingRenderer, UiContext},
        ClassifierPipeline, PipelineConfig, PipelineSummary,
    },
    settings::{
        self,
        manager::{SettingsStruct, SourceKind},
    },
    source::{
        authorization::AlwaysGranted, image_dir::ImageDirSource, synthetic::SyntheticSource,
        Source,
    },
    vision::overlay::Overlay,
};

const MODEL_INPUT: InputShape = InputShape {
    width: 224,
    height: 224,
};

fn main() -> Result<()> {
    // CLI should be started before logger to allow control over verbosity
    cli::manager::init();
    // Logger should start before everything else to register any log information
    logger::manager::init()?;
    // Settings should start before everybody else to ensure that the CLI are stored
    settings::manager::init(
        cli::manager::settings_file().as_deref(),
        cli::manager::is_reset(),
    );

    let settings = apply_cli_overrides(settings::manager::settings());
    settings.pipeline.validate()?;

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .thread_name_fn(worker_thread_name)
        .enable_all()
        .build()
        .context("Failed building the tokio runtime")?;

    runtime.block_on(run(settings))
}

// worker-1, worker-2, ... so latency rows can tell runtime threads apart
fn worker_thread_name() -> String {
    static NEXT_WORKER: AtomicUsize = AtomicUsize::new(1);
    let id = NEXT_WORKER.fetch_add(1, Ordering::Relaxed);
    format!("worker-{id}")
}

fn apply_cli_overrides(mut settings: SettingsStruct) -> SettingsStruct {
    if let Some(kind) = cli::manager::source_kind() {
        settings.source.kind = kind;
    }
    if let Some(directory) = cli::manager::source_dir() {
        settings.source.directory = Some(directory);
    }
    if let Some(frames) = cli::manager::frames() {
        settings.source.max_frames = Some(frames);
    }
    if let Some(interval) = cli::manager::frame_interval_ms() {
        settings.source.frame_interval_ms = interval;
    }
    if let Some(labels_path) = cli::manager::labels_path() {
        settings.pipeline.labels_path = Some(labels_path);
    }

    settings
}

fn build_source(settings: &SettingsStruct) -> Result<Source> {
    let source = &settings.source;
    let interval = Duration::from_millis(source.frame_interval_ms);

    Ok(match source.kind {
        SourceKind::Synthetic => SyntheticSource::new(source.width, source.height, interval)
            .with_max_frames(source.max_frames)
            .into(),
        SourceKind::Directory => {
            let directory = source
                .directory
                .clone()
                .ok_or_else(|| anyhow!("The directory source needs a directory"))?;
            ImageDirSource::new(directory, interval)
                .with_max_frames(source.max_frames)
                .with_looping(source.looping)
                .into()
        }
    })
}

async fn run(settings: SettingsStruct) -> Result<()> {
    let labels = match &settings.pipeline.labels_path {
        Some(path) => load_labels(path)?,
        None => generated_labels(cli::manager::classes()),
    };

    let engine: Arc<dyn InferenceEngine> = Arc::new(
        SyntheticEngine::new(MODEL_INPUT, labels.len())
            .with_latency(Duration::from_millis(cli::manager::inference_latency_ms())),
    );

    let pipeline =
        ClassifierPipeline::try_new(PipelineConfig::from(&settings.pipeline), engine, labels)?;
    let mut source = build_source(&settings)?;
    let ui = UiContext::spawn(TracingRenderer, settings.pipeline.grabber_capacity)?;

    let cancel = CancellationToken::new();
    tokio::spawn({
        let cancel = cancel.clone();
        async move {
            if let Err(error) = tokio::signal::ctrl_c().await {
                error!("Failed listening for Ctrl-C: {error:#?}");
                return;
            }
            info!("Ctrl-C received, stopping");
            cancel.cancel();
        }
    });

    info!("Running pipeline {} on {:?}", pipeline.id(), source);
    let result = pipeline.run(&mut source, &AlwaysGranted, &ui, cancel).await;

    let captured = ui.shutdown()?;
    let summary = result?;
    log_summary(&summary);

    if let Some(directory) = cli::manager::capture_dir() {
        save_captures(&directory, &captured)?;
    }

    Ok(())
}

fn log_summary(summary: &PipelineSummary) {
    let stats = &summary.stats;
    info!(
        "Frames received: {}, admitted: {}, dropped: {}, completed: {}, decode failures: {}, stage failures: {}",
        stats.received,
        stats.admitted,
        stats.dropped,
        stats.completed,
        stats.decode_failures,
        stats.stage_failures,
    );

    if let Some(report) = &summary.last_report {
        info!("Last latency report:\n{report}");
    }
    if let Some(interval) = summary.suggested_interval_ms {
        info!("Suggested minimum frame interval: {interval} ms");
    }

    match serde_json::to_string(summary) {
        Ok(json) => debug!("Summary: {json}"),
        Err(error) => warn!("Failed serializing the summary: {error:#?}"),
    }
}

#[instrument(level = "debug", skip(captured))]
fn save_captures(directory: &Path, captured: &[Overlay]) -> Result<()> {
    std::fs::create_dir_all(directory)
        .with_context(|| format!("Failed creating capture directory {directory:?}"))?;

    for (index, overlay) in captured.iter().enumerate() {
        let path = directory.join(format!("capture_{index:03}.png"));
        overlay
            .image
            .save(&path)
            .with_context(|| format!("Failed saving capture {path:?}"))?;
    }

    info!("Saved {} captures into {directory:?}", captured.len());
    Ok(())
}
