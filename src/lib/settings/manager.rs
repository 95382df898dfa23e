use std::{
    io::prelude::*,
    path::{Path, PathBuf},
    sync::{Arc, Mutex},
};

use anyhow::{anyhow, Context, Result};
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use tracing::*;

#[derive(Clone, Debug, Deserialize, Serialize, PartialEq)]
pub struct HeaderSettingsFile {
    pub name: String,
    pub version: u32,
}

#[derive(Clone, Copy, Debug, Deserialize, Serialize, PartialEq, Eq)]
#[serde(rename_all = "UPPERCASE")]
pub enum ChannelOrder {
    Rgb,
    Bgr,
}

#[derive(Clone, Copy, Debug, Deserialize, Serialize, PartialEq, Eq)]
pub struct CropSize {
    pub width: u32,
    pub height: u32,
}

#[derive(Clone, Debug, Deserialize, Serialize, PartialEq)]
#[serde(default)]
pub struct PipelineSettings {
    pub mean: f32,
    pub scale: f32,
    pub channel_order: ChannelOrder,
    pub top_n: usize,
    /// Pole of the latency low-pass filter, in (0, 1)
    pub discount: f32,
    pub labels_path: Option<PathBuf>,
    pub overlay_width: u32,
    pub overlay_height: u32,
    pub grabber_capacity: usize,
    pub authorization_retries: u32,
    /// Clockwise, one of 0, 90, 180 or 270
    pub rotate_degrees: u32,
    pub center_crop: Option<CropSize>,
}

impl Default for PipelineSettings {
    fn default() -> Self {
        Self {
            mean: 128.0,
            scale: 128.0,
            channel_order: ChannelOrder::Rgb,
            top_n: 3,
            discount: 0.5,
            labels_path: None,
            overlay_width: 320,
            overlay_height: 240,
            grabber_capacity: 8,
            authorization_retries: 5,
            rotate_degrees: 0,
            center_crop: None,
        }
    }
}

#[derive(Clone, Copy, Debug, Deserialize, Serialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum SourceKind {
    Synthetic,
    Directory,
}

#[derive(Clone, Debug, Deserialize, Serialize, PartialEq)]
#[serde(default)]
pub struct SourceSettings {
    pub kind: SourceKind,
    pub width: u32,
    pub height: u32,
    pub frame_interval_ms: u64,
    pub max_frames: Option<usize>,
    pub directory: Option<PathBuf>,
    /// Directory sources restart from the first image after the last one.
    pub looping: bool,
}

impl Default for SourceSettings {
    fn default() -> Self {
        Self {
            kind: SourceKind::Synthetic,
            width: 640,
            height: 480,
            frame_interval_ms: 33,
            max_frames: None,
            directory: None,
            looping: false,
        }
    }
}

#[derive(Clone, Debug, Deserialize, Serialize, PartialEq)]
pub struct SettingsStruct {
    pub header: HeaderSettingsFile,
    #[serde(default)]
    pub pipeline: PipelineSettings,
    #[serde(default)]
    pub source: SourceSettings,
}

impl Default for SettingsStruct {
    fn default() -> Self {
        SettingsStruct {
            header: HeaderSettingsFile {
                name: "Classifier Stream".to_string(),
                version: 0,
            },
            pipeline: PipelineSettings::default(),
            source: SourceSettings::default(),
        }
    }
}

impl PipelineSettings {
    /// Checks the values that would otherwise only fail deep inside a running pipeline.
    pub fn validate(&self) -> Result<()> {
        if !(self.discount > 0.0 && self.discount < 1.0) {
            return Err(anyhow!(
                "Latency discount must be inside (0, 1), got {}",
                self.discount
            ));
        }
        if self.scale == 0.0 {
            return Err(anyhow!("Normalization scale cannot be zero"));
        }
        if self.top_n == 0 {
            return Err(anyhow!("top_n must be at least 1"));
        }
        if self.grabber_capacity == 0 {
            return Err(anyhow!("grabber_capacity must be at least 1"));
        }
        if !matches!(self.rotate_degrees, 0 | 90 | 180 | 270) {
            return Err(anyhow!(
                "rotate_degrees must be one of 0, 90, 180 or 270, got {}",
                self.rotate_degrees
            ));
        }
        if let Some(crop) = &self.center_crop {
            if crop.width == 0 || crop.height == 0 {
                return Err(anyhow!("center_crop dimensions cannot be zero"));
            }
        }

        Ok(())
    }
}

#[derive(Debug)]
struct ManagerStruct {
    pub file_name: String,
    pub config: SettingsStruct,
}

#[derive(Default)]
struct Manager {
    pub content: Option<ManagerStruct>,
}

lazy_static! {
    static ref MANAGER: Arc<Mutex<Manager>> = Default::default();
}

impl Manager {
    fn new(file_name: &str, reset: bool) -> ManagerStruct {
        let file_name = resolve_file_name(file_name);

        debug!("Using settings file: {file_name}");

        let config = if reset {
            info!("Resetting settings file: {file_name}");
            SettingsStruct::default()
        } else {
            load_settings_from_file(&file_name)
        };

        let settings = ManagerStruct {
            file_name: file_name.to_string(),
            config,
        };

        if let Err(error) = save_settings_to_file(&settings.file_name, &settings.config) {
            error!("Failed to save file: {error:#?}");
        }

        settings
    }
}

fn resolve_file_name(file_name: &str) -> String {
    if Path::new(file_name).is_absolute() {
        return file_name.into();
    }

    match ProjectDirs::from("com", "Classifier Stream", env!("CARGO_PKG_NAME")) {
        Some(project) => {
            let folder_path = project.config_dir();
            if let Err(error) = std::fs::create_dir_all(folder_path) {
                error!(
                    "Failed to create settings folder: {folder_path:?}, reason: {error:#?}"
                );
            }
            folder_path.join(file_name).to_string_lossy().to_string()
        }
        None => {
            warn!("Failed to find user settings path, using the current directory.");
            file_name.into()
        }
    }
}

// Init settings manager with the desired settings file,
// will be created if does not exist
#[instrument(level = "debug")]
pub fn init(file_name: Option<&str>, reset: bool) {
    let mut manager = MANAGER.lock().unwrap();
    let file_name = file_name.unwrap_or("settings.json");
    manager.content = Some(Manager::new(file_name, reset));
}

pub fn load_settings_from_file(file_name: &str) -> SettingsStruct {
    let content = match std::fs::read_to_string(file_name) {
        Ok(content) => content,
        Err(error) => {
            debug!("Settings file {file_name:?} unavailable ({error}), using defaults");
            return SettingsStruct::default();
        }
    };

    serde_json::from_str(&content).unwrap_or_else(|error| {
        warn!("Failed to parse settings file {file_name:?}: {error}, using defaults");
        SettingsStruct::default()
    })
}

pub fn save_settings_to_file(file_name: &str, content: &SettingsStruct) -> Result<()> {
    let mut file = std::fs::File::create(file_name)
        .with_context(|| format!("Failed creating settings file {file_name:?}"))?;
    let value = serde_json::to_string_pretty(content)?;
    file.write_all(value.as_bytes())
        .with_context(|| format!("Failed writing settings file {file_name:?}"))
}

pub fn settings() -> SettingsStruct {
    let manager = MANAGER.lock().unwrap();
    manager
        .content
        .as_ref()
        .map(|content| content.config.clone())
        .unwrap_or_default()
}

pub fn file_name() -> Option<String> {
    let manager = MANAGER.lock().unwrap();
    manager
        .content
        .as_ref()
        .map(|content| content.file_name.clone())
}

pub fn set_pipeline(pipeline: &PipelineSettings) {
    let mut manager = MANAGER.lock().unwrap();
    let Some(content) = manager.content.as_mut() else {
        error!("Failed to save settings: manager was not initialized");
        return;
    };

    content.config.pipeline = pipeline.clone();
    if let Err(error) = save_settings_to_file(&content.file_name, &content.config) {
        error!("Failed to save file: {error:#?}");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use serial_test::serial;

    fn temporary_settings_path(name: &str) -> String {
        std::env::temp_dir()
            .join(format!("{name}-{}.json", uuid::Uuid::new_v4()))
            .to_string_lossy()
            .to_string()
    }

    #[test]
    #[serial]
    fn creates_file_with_defaults() {
        let file_name = temporary_settings_path("settings-defaults");

        init(Some(&file_name), false);

        assert_eq!(settings(), SettingsStruct::default());
        assert_eq!(load_settings_from_file(&file_name), SettingsStruct::default());

        let _ = std::fs::remove_file(file_name);
    }

    #[test]
    #[serial]
    fn persists_pipeline_changes() {
        let file_name = temporary_settings_path("settings-persist");
        init(Some(&file_name), false);

        let mut pipeline = settings().pipeline;
        pipeline.top_n = 5;
        pipeline.channel_order = ChannelOrder::Bgr;
        set_pipeline(&pipeline);

        init(Some(&file_name), false);
        assert_eq!(settings().pipeline.top_n, 5);
        assert_eq!(settings().pipeline.channel_order, ChannelOrder::Bgr);

        init(Some(&file_name), true);
        assert_eq!(settings().pipeline, PipelineSettings::default());

        let _ = std::fs::remove_file(file_name);
    }

    #[test]
    fn partial_file_falls_back_per_section() {
        let file_name = temporary_settings_path("settings-partial");
        std::fs::write(
            &file_name,
            r#"{"header":{"name":"x","version":1},"pipeline":{"top_n":2}}"#,
        )
        .unwrap();

        let loaded = load_settings_from_file(&file_name);
        assert_eq!(loaded.pipeline.top_n, 2);
        assert_eq!(loaded.pipeline.mean, 128.0);
        assert_eq!(loaded.source, SourceSettings::default());

        let _ = std::fs::remove_file(file_name);
    }

    #[test]
    fn rejects_invalid_pipeline_values() {
        let mut pipeline = PipelineSettings::default();
        assert!(pipeline.validate().is_ok());

        pipeline.discount = 1.0;
        assert!(pipeline.validate().is_err());

        pipeline.discount = 0.5;
        pipeline.rotate_degrees = 45;
        assert!(pipeline.validate().is_err());
    }
}
