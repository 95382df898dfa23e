use std::{path::PathBuf, sync::Arc};

use clap::{Parser, ValueEnum};

use crate::settings::manager::SourceKind;

#[derive(Parser, Debug, Clone)]
#[command(
    version = env!("CARGO_PKG_VERSION"),
    author = env!("CARGO_PKG_AUTHORS"),
    about = env!("CARGO_PKG_DESCRIPTION")
)]
struct Args {
    /// Turn all log categories up to Debug, for more information check RUST_LOG env variable.
    #[arg(short, long)]
    verbose: bool,

    /// Turn all log categories up to Trace in the log file, including the per-frame timelines.
    #[arg(long)]
    enable_tracing: bool,

    /// Specifies the path in which the logs will be stored.
    #[arg(long, default_value = "./logs", env = "CLASSIFIER_STREAM_LOG_PATH")]
    log_path: String,

    /// Sets the settings file path.
    #[arg(long, value_name = "./settings.json")]
    settings_file: Option<String>,

    /// Resets the settings file to its defaults.
    #[arg(long)]
    reset: bool,

    /// Overrides the frame source kind from the settings file.
    #[arg(long, value_enum)]
    source: Option<SourceArg>,

    /// Directory replayed by the directory source.
    #[arg(long, value_name = "DIR")]
    source_dir: Option<PathBuf>,

    /// Stops after the source emitted this many frames.
    #[arg(long, value_name = "COUNT")]
    frames: Option<usize>,

    /// Overrides the interval between two source frames.
    #[arg(long, value_name = "MILLISECONDS")]
    frame_interval_ms: Option<u64>,

    /// Newline-delimited label file, line N names class index N.
    #[arg(long, value_name = "FILE", env = "CLASSIFIER_STREAM_LABELS")]
    labels: Option<PathBuf>,

    /// Simulated latency of the synthetic inference engine.
    #[arg(long, default_value = "30", value_name = "MILLISECONDS")]
    inference_latency_ms: u64,

    /// Number of classes produced by the synthetic inference engine when no label file is given.
    #[arg(long, default_value = "10", value_name = "COUNT")]
    classes: usize,

    /// Writes the last captured overlays as PNG files into this directory on exit.
    #[arg(long, value_name = "DIR")]
    capture_dir: Option<PathBuf>,
}

#[derive(ValueEnum, PartialEq, Debug, Clone, Copy)]
#[clap(rename_all = "lower")]
enum SourceArg {
    Synthetic,
    Directory,
}

impl From<SourceArg> for SourceKind {
    fn from(value: SourceArg) -> Self {
        match value {
            SourceArg::Synthetic => SourceKind::Synthetic,
            SourceArg::Directory => SourceKind::Directory,
        }
    }
}

#[derive(Debug)]
struct Manager {
    clap_matches: Args,
}

lazy_static! {
    static ref MANAGER: Arc<Manager> = Arc::new(Manager::new());
}

impl Manager {
    fn new() -> Self {
        Self {
            clap_matches: Args::parse(),
        }
    }
}

// Construct our manager, should be done inside main
pub fn init() {
    MANAGER.as_ref();
}

// Check if the verbosity parameter was used
pub fn is_verbose() -> bool {
    MANAGER.clap_matches.verbose
}

pub fn is_tracing() -> bool {
    MANAGER.clap_matches.enable_tracing
}

pub fn log_path() -> String {
    MANAGER.clap_matches.log_path.clone()
}

pub fn settings_file() -> Option<String> {
    MANAGER.clap_matches.settings_file.clone()
}

pub fn is_reset() -> bool {
    MANAGER.clap_matches.reset
}

pub fn source_kind() -> Option<SourceKind> {
    MANAGER.clap_matches.source.map(SourceKind::from)
}

pub fn source_dir() -> Option<PathBuf> {
    MANAGER.clap_matches.source_dir.clone()
}

pub fn frames() -> Option<usize> {
    MANAGER.clap_matches.frames
}

pub fn frame_interval_ms() -> Option<u64> {
    MANAGER.clap_matches.frame_interval_ms
}

pub fn labels_path() -> Option<PathBuf> {
    MANAGER.clap_matches.labels.clone()
}

pub fn inference_latency_ms() -> u64 {
    MANAGER.clap_matches.inference_latency_ms
}

pub fn classes() -> usize {
    MANAGER.clap_matches.classes
}

pub fn capture_dir() -> Option<PathBuf> {
    MANAGER.clap_matches.capture_dir.clone()
}

// Return the command line used to start this application
pub fn command_line_string() -> String {
    std::env::args().collect::<Vec<String>>().join(" ")
}

// Return a clone of current Args struct
pub fn command_line() -> String {
    format!("{:#?}", MANAGER.clap_matches)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_overrides() {
        let args = Args::parse_from([
            "classifier-stream",
            "--source",
            "directory",
            "--source-dir",
            "/tmp/frames",
            "--frames",
            "12",
            "-v",
        ]);

        assert!(args.verbose);
        assert_eq!(args.source, Some(SourceArg::Directory));
        assert_eq!(args.source_dir, Some(PathBuf::from("/tmp/frames")));
        assert_eq!(args.frames, Some(12));
        assert_eq!(args.inference_latency_ms, 30);
        assert_eq!(args.classes, 10);
    }

    #[test]
    fn default_arguments() {
        let args = Args::parse_from(["classifier-stream"]);

        assert!(!args.verbose);
        assert!(!args.reset);
        assert!(args.source.is_none());
        assert!(args.capture_dir.is_none());
    }

    #[test]
    fn reset_flag_describes_restoring_defaults() {
        use clap::CommandFactory;

        let args = Args::parse_from(["classifier-stream", "--reset"]);
        assert!(args.reset);

        let command = Args::command();
        let help = command
            .get_arguments()
            .find(|arg| arg.get_id() == "reset")
            .and_then(|arg| arg.get_help())
            .map(|help| help.to_string())
            .unwrap();
        assert!(help.contains("defaults"), "{help}");
        assert!(!help.contains("Deletes"), "{help}");
    }
}
