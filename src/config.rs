//! TOML configuration.
//!
//! Every section and key is optional; missing values take the defaults documented on the fields.
//! Unknown keys are rejected to catch typos.
//!
//! ```toml
//! [camera]
//! index = 0
//! mirror = true
//!
//! [gestures]
//! unknown = "???"
//!
//! [[gestures.entry]]
//! fingers = [0, 1, 1, 0, 0]
//! label = "Victory"
//! ```

use std::{
    env, fs,
    path::{Path, PathBuf},
};

use anyhow::{bail, Context};
use serde::Deserialize;

use crate::{
    gesture::{FingerState, GestureTable, UNKNOWN_GESTURE},
    image::Resolution,
    video::webcam::WebcamOptions,
};

/// Environment variable naming the configuration file.
pub const CONFIG_ENV_VAR: &str = "HANDSIGN_CONFIG";

/// File in the working directory that is loaded when [`CONFIG_ENV_VAR`] is unset.
pub const DEFAULT_CONFIG_FILE: &str = "handsign.toml";

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    pub camera: CameraConfig,
    pub models: ModelPaths,
    pub hands: HandsConfig,
    pub face: FaceConfig,
    pub display: DisplayConfig,
    pub gestures: GesturesConfig,
}

impl Config {
    /// Loads the configuration from the environment.
    ///
    /// The file named by `HANDSIGN_CONFIG` is used if the variable is set. Otherwise
    /// `handsign.toml` is loaded if it exists in the working directory, and the built-in defaults
    /// are used if it does not.
    pub fn load() -> anyhow::Result<Self> {
        if let Some(path) = env::var_os(CONFIG_ENV_VAR) {
            return Self::from_path(PathBuf::from(path));
        }

        let default_path = Path::new(DEFAULT_CONFIG_FILE);
        if default_path.exists() {
            Self::from_path(default_path)
        } else {
            log::debug!("no {DEFAULT_CONFIG_FILE} found, using built-in configuration");
            Ok(Self::default())
        }
    }

    /// Reads and parses the configuration file at `path`.
    pub fn from_path<P: AsRef<Path>>(path: P) -> anyhow::Result<Self> {
        let path = path.as_ref();
        log::info!("loading configuration from {}", path.display());
        let text = fs::read_to_string(path)
            .with_context(|| format!("failed to read config file {}", path.display()))?;
        Self::parse(&text).with_context(|| format!("invalid config file {}", path.display()))
    }

    /// Parses configuration from a TOML string.
    pub fn parse(toml: &str) -> anyhow::Result<Self> {
        let config: Self = toml::from_str(toml)?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> anyhow::Result<()> {
        for (name, value) in [
            (
                "hands.min_detection_confidence",
                self.hands.min_detection_confidence,
            ),
            (
                "hands.min_tracking_confidence",
                self.hands.min_tracking_confidence,
            ),
            (
                "face.min_detection_confidence",
                self.face.min_detection_confidence,
            ),
        ] {
            if !(0.0..=1.0).contains(&value) {
                bail!("`{name}` must be between 0.0 and 1.0, got {value}");
            }
        }
        if self.hands.max_num_hands == 0 {
            bail!("`hands.max_num_hands` must be at least 1");
        }
        if let Some([w, h]) = self.camera.resolution {
            if w == 0 || h == 0 {
                bail!("`camera.resolution` must be non-zero, got {w}x{h}");
            }
        }
        if let Some(entries) = &self.gestures.entry {
            for entry in entries {
                entry.finger_state()?;
            }
        }
        Ok(())
    }

    /// Builds the gesture table.
    ///
    /// `[[gestures.entry]]` lists replace the built-in gestures entirely. Later entries override
    /// earlier ones with the same finger state.
    pub fn gesture_table(&self) -> anyhow::Result<GestureTable> {
        let unknown = self.gestures.unknown.as_str();
        match &self.gestures.entry {
            None => Ok(GestureTable::default().with_unknown_label(unknown)),
            Some(entries) => {
                let entries = entries
                    .iter()
                    .map(|e| Ok((e.finger_state()?, e.label.clone())))
                    .collect::<anyhow::Result<Vec<_>>>()?;
                Ok(GestureTable::from_entries(entries, unknown))
            }
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct CameraConfig {
    /// Index of the camera among the supported capture devices. Defaults to 0.
    pub index: usize,
    /// Name of the camera device. `HANDSIGN_WEBCAM_NAME` takes precedence.
    pub name: Option<String>,
    /// Mirror frames horizontally before processing. Defaults to `true`.
    pub mirror: bool,
    pub fps: Option<u32>,
    /// Desired capture resolution as `[width, height]`.
    pub resolution: Option<[u32; 2]>,
}

impl Default for CameraConfig {
    fn default() -> Self {
        Self {
            index: 0,
            name: None,
            mirror: true,
            fps: None,
            resolution: None,
        }
    }
}

impl CameraConfig {
    pub fn webcam_options(&self) -> WebcamOptions {
        let mut options = WebcamOptions::default().index(self.index);
        if let Some(name) = &self.name {
            options = options.name(name);
        }
        if let Some(fps) = self.fps {
            options = options.fps(fps);
        }
        if let Some([w, h]) = self.resolution {
            options = options.resolution(Resolution::new(w, h));
        }
        options
    }
}

/// Paths to the ONNX model files, relative to the working directory.
#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ModelPaths {
    pub palm_detection: PathBuf,
    pub palm_detection_full: PathBuf,
    pub hand_landmark: PathBuf,
    pub face_detection_short_range: PathBuf,
    pub face_detection_full_range: PathBuf,
}

impl Default for ModelPaths {
    fn default() -> Self {
        Self {
            palm_detection: "models/palm_detection_lite.onnx".into(),
            palm_detection_full: "models/palm_detection_full.onnx".into(),
            hand_landmark: "models/hand_landmark_full.onnx".into(),
            face_detection_short_range: "models/face_detection_short_range.onnx".into(),
            face_detection_full_range: "models/face_detection_full_range.onnx".into(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct HandsConfig {
    /// Defaults to 2.
    pub max_num_hands: usize,
    /// Palm detection threshold. Defaults to 0.5.
    pub min_detection_confidence: f32,
    /// Hand presence score below which a tracked hand is dropped. Defaults to 0.5.
    pub min_tracking_confidence: f32,
    pub full_range_palm_detection: bool,
}

impl Default for HandsConfig {
    fn default() -> Self {
        Self {
            max_num_hands: 2,
            min_detection_confidence: 0.5,
            min_tracking_confidence: 0.5,
            full_range_palm_detection: false,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct FaceConfig {
    pub enabled: bool,
    pub min_detection_confidence: f32,
    pub full_range: bool,
}

impl Default for FaceConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            min_detection_confidence: 0.5,
            full_range: false,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct DisplayConfig {
    pub window_title: String,
    /// Character that ends the application when typed into the window.
    pub quit_key: char,
    /// Draw the finger-state vector below each wrist.
    pub show_finger_state: bool,
}

impl Default for DisplayConfig {
    fn default() -> Self {
        Self {
            window_title: "Gesture & Face Recognition System".into(),
            quit_key: 'q',
            show_finger_state: true,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct GesturesConfig {
    /// Label for finger states without an entry.
    pub unknown: String,
    /// Replaces the built-in gestures when present.
    pub entry: Option<Vec<GestureEntry>>,
}

impl Default for GesturesConfig {
    fn default() -> Self {
        Self {
            unknown: UNKNOWN_GESTURE.into(),
            entry: None,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct GestureEntry {
    /// Thumb to pinky, `1` for an extended finger and `0` for a curled one.
    pub fingers: [u8; 5],
    pub label: String,
}

impl GestureEntry {
    fn finger_state(&self) -> anyhow::Result<FingerState> {
        let mut open = [false; 5];
        for (open, &value) in open.iter_mut().zip(&self.fingers) {
            *open = match value {
                0 => false,
                1 => true,
                _ => bail!(
                    "gesture '{}': finger values must be 0 or 1, got {:?}",
                    self.label,
                    self.fingers
                ),
            };
        }
        Ok(FingerState::new(open))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_config_uses_defaults() {
        let config = Config::parse("").unwrap();
        assert_eq!(config.camera.index, 0);
        assert!(config.camera.mirror);
        assert_eq!(config.hands.max_num_hands, 2);
        assert_eq!(config.hands.min_detection_confidence, 0.5);
        assert_eq!(config.hands.min_tracking_confidence, 0.5);
        assert_eq!(config.display.quit_key, 'q');

        let table = config.gesture_table().unwrap();
        assert_eq!(table.len(), GestureTable::default().len());
        assert_eq!(table.unknown_label(), UNKNOWN_GESTURE);
        assert_eq!(
            table.classify(&FingerState::new([true; 5])),
            "Open Hand"
        );
    }

    #[test]
    fn gesture_entries_replace_builtin_table() {
        let config = Config::parse(
            r#"
            [gestures]
            unknown = "???"

            [[gestures.entry]]
            fingers = [0, 1, 1, 0, 0]
            label = "Victory"

            [[gestures.entry]]
            fingers = [0, 1, 1, 0, 0]
            label = "Scissors"
            "#,
        )
        .unwrap();

        let table = config.gesture_table().unwrap();
        assert_eq!(table.len(), 1);
        assert_eq!(
            table.classify(&FingerState::new([false, true, true, false, false])),
            "Scissors"
        );
        assert_eq!(table.classify(&FingerState::new([true; 5])), "???");
    }

    #[test]
    fn custom_unknown_label_keeps_builtin_gestures() {
        let config = Config::parse("[gestures]\nunknown = \"-\"").unwrap();
        let table = config.gesture_table().unwrap();
        assert_eq!(
            table.classify(&FingerState::new([false, false, true, false, false])),
            "Middle Finger"
        );
        assert_eq!(table.classify(&FingerState::new([false; 5])), "-");
        assert_eq!(table.unknown_label(), "-");
    }

    #[test]
    fn camera_section() {
        let config = Config::parse(
            r#"
            [camera]
            index = 1
            name = "USB Camera"
            mirror = false
            fps = 30
            resolution = [1280, 720]
            "#,
        )
        .unwrap();
        assert_eq!(config.camera.index, 1);
        assert_eq!(config.camera.name.as_deref(), Some("USB Camera"));
        assert!(!config.camera.mirror);
        assert_eq!(config.camera.resolution, Some([1280, 720]));
    }

    #[test]
    fn rejects_invalid_configs() {
        assert!(Config::parse("[camera]\nindx = 1").is_err());
        assert!(Config::parse("[hands]\nmin_detection_confidence = 1.5").is_err());
        assert!(Config::parse("[hands]\nmax_num_hands = 0").is_err());
        assert!(Config::parse("[display]\nquit_key = \"qq\"").is_err());
        assert!(Config::parse(
            r#"
            [[gestures.entry]]
            fingers = [0, 2, 0, 0, 0]
            label = "Broken"
            "#
        )
        .is_err());
    }
}
