//! Application configuration.
//!
//! One typed struct with serde defaults, persisted as JSON under
//! `~/.stride_studio/config.json`.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::StrideResult;
use crate::logging::app_data_dir;

/// Input containers the file picker and drag-and-drop accept.
pub const SUPPORTED_EXTENSIONS: &[&str] = &["mp4", "avi", "mov", "mkv", "wmv"];

/// True if the path carries a supported video extension.
pub fn is_supported_video(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .map(|e| {
            let lower = e.to_ascii_lowercase();
            SUPPORTED_EXTENSIONS.contains(&lower.as_str())
        })
        .unwrap_or(false)
}

/// Model task selected by the user. Only `Pose` changes the overlay style;
/// every other task uses the generic detection overlay.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ModelTask {
    Pose,
    Detection,
    Segmentation,
    Classification,
    OrientedBbox,
}

impl ModelTask {
    /// Default checkpoint file for this task, resolved under `models_dir`.
    pub fn checkpoint(self) -> &'static str {
        match self {
            ModelTask::Pose => "yolo11x-pose.onnx",
            ModelTask::Detection => "yolo11x.onnx",
            ModelTask::Segmentation => "yolo11x-seg.onnx",
            ModelTask::Classification => "yolo11x-cls.onnx",
            ModelTask::OrientedBbox => "yolo11x-obb.onnx",
        }
    }

    pub fn from_name(name: &str) -> Option<ModelTask> {
        match name.to_ascii_lowercase().as_str() {
            "pose" => Some(ModelTask::Pose),
            "detection" | "detect" => Some(ModelTask::Detection),
            "segmentation" | "seg" => Some(ModelTask::Segmentation),
            "classification" | "cls" => Some(ModelTask::Classification),
            "orientedbbox" | "obb" => Some(ModelTask::OrientedBbox),
            _ => None,
        }
    }
}

/// Application configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct AppConfig {
    /// Directory holding model checkpoints.
    pub models_dir: PathBuf,

    /// Task preselected at startup.
    pub default_task: ModelTask,

    /// Keypoint/detection confidence threshold (0.0 - 1.0).
    pub confidence_threshold: f32,

    /// Square model input edge in pixels.
    pub model_input_size: u32,

    /// Frame rate assumed when a source reports none.
    pub fallback_fps: f64,

    /// Camera index preselected in live mode.
    pub camera_index: u32,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            models_dir: app_data_dir().join("models"),
            default_task: ModelTask::Pose,
            confidence_threshold: 0.05,
            model_input_size: 640,
            fallback_fps: 30.0,
            camera_index: 0,
        }
    }
}

impl AppConfig {
    fn config_path() -> PathBuf {
        app_data_dir().join("config.json")
    }

    /// Load the saved configuration, falling back to defaults if the file
    /// is missing or unreadable.
    pub fn load() -> AppConfig {
        let path = Self::config_path();
        match std::fs::read_to_string(&path) {
            Ok(raw) => serde_json::from_str(&raw).unwrap_or_else(|e| {
                log::warn!("Invalid config at {}: {} (using defaults)", path.display(), e);
                AppConfig::default()
            }),
            Err(_) => AppConfig::default(),
        }
    }

    /// Persist the configuration as pretty JSON.
    pub fn save(&self) -> StrideResult<()> {
        let path = Self::config_path();
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(&path, serde_json::to_string_pretty(self)?)?;
        Ok(())
    }

    /// Absolute checkpoint path for a task.
    pub fn checkpoint_path(&self, task: ModelTask) -> PathBuf {
        self.models_dir.join(task.checkpoint())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_supported_extensions() {
        assert!(is_supported_video(Path::new("clip.mp4")));
        assert!(is_supported_video(Path::new("/videos/run.MKV")));
        assert!(is_supported_video(Path::new("a.wmv")));
        assert!(!is_supported_video(Path::new("notes.txt")));
        assert!(!is_supported_video(Path::new("noext")));
    }

    #[test]
    fn test_task_checkpoints() {
        assert_eq!(ModelTask::Pose.checkpoint(), "yolo11x-pose.onnx");
        assert_eq!(ModelTask::Detection.checkpoint(), "yolo11x.onnx");
    }

    #[test]
    fn test_task_from_name() {
        assert_eq!(ModelTask::from_name("pose"), Some(ModelTask::Pose));
        assert_eq!(ModelTask::from_name("Detect"), Some(ModelTask::Detection));
        assert_eq!(ModelTask::from_name("obb"), Some(ModelTask::OrientedBbox));
        assert_eq!(ModelTask::from_name("unknown"), None);
    }

    #[test]
    fn test_config_roundtrip() {
        let config = AppConfig {
            confidence_threshold: 0.25,
            model_input_size: 320,
            ..AppConfig::default()
        };
        let json = serde_json::to_string(&config).unwrap();
        let back: AppConfig = serde_json::from_str(&json).unwrap();
        assert_eq!(back.confidence_threshold, 0.25);
        assert_eq!(back.model_input_size, 320);
        assert_eq!(back.default_task, ModelTask::Pose);
    }

    #[test]
    fn test_config_defaults_fill_missing_fields() {
        let partial: AppConfig = serde_json::from_str(r#"{"cameraIndex": 2}"#).unwrap();
        assert_eq!(partial.camera_index, 2);
        assert_eq!(partial.fallback_fps, 30.0);
    }
}
