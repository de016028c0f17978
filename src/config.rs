use config::{Config, ConfigError, Environment, File};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{debug, info};

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct FacewatchConfig {
    pub camera: CameraConfig,
    pub detection: DetectionConfig,
    pub alert: AlertConfig,
    pub display: DisplayConfig,
    pub storage: StorageConfig,
    pub preview: PreviewConfig,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct CameraConfig {
    /// Camera device indices tried in order (e.g., 0 for /dev/video0)
    #[serde(default = "default_camera_indices")]
    pub indices: Vec<u32>,

    /// Capture resolution (width, height)
    #[serde(default = "default_camera_resolution")]
    pub resolution: (u32, u32),

    /// Frames per second requested from the device
    #[serde(default = "default_camera_fps")]
    pub fps: u32,

    /// Frame source backend
    #[serde(default = "default_camera_backend")]
    pub backend: CameraBackend,

    /// Directory of still images used by the replay backend
    #[serde(default = "default_replay_path")]
    pub replay_path: String,

    /// Maximum time to wait for a single frame
    #[serde(default = "default_read_timeout_ms")]
    pub read_timeout_ms: u64,
}

#[derive(Debug, Deserialize, Serialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum CameraBackend {
    /// Video4Linux device through GStreamer
    V4l2,
    /// Still images replayed from a directory
    Replay,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct DetectionConfig {
    /// How long face detection runs after a motion trigger
    #[serde(default = "default_active_window_seconds")]
    pub active_window_seconds: u64,

    /// Minimum time between two alerts for the same identity
    #[serde(default = "default_cooldown_seconds")]
    pub cooldown_seconds: u64,

    /// Resize factor applied before location and encoding
    #[serde(default = "default_scale_factor")]
    pub scale_factor: f32,

    /// Distances strictly below this value count as a match
    #[serde(default = "default_match_threshold")]
    pub match_threshold: f32,

    /// Whether continued motion extends an open window
    #[serde(default = "default_window_policy")]
    pub window_policy: WindowPolicy,

    /// Signature distance metric
    #[serde(default = "default_distance_metric")]
    pub distance_metric: DistanceMetric,

    /// Pause between processed frames while a window is open
    #[serde(default = "default_frame_interval_ms")]
    pub frame_interval_ms: u64,

    /// Pause between motion polls while idle
    #[serde(default = "default_motion_poll_interval_ms")]
    pub motion_poll_interval_ms: u64,

    /// Face locator implementation
    #[serde(default = "default_locator")]
    pub locator: LocatorKind,

    /// Face encoder implementation
    #[serde(default = "default_encoder")]
    pub encoder: EncoderKind,

    /// Frames between simulated face sightings
    #[serde(default = "default_simulate_interval_frames")]
    pub simulate_interval_frames: u64,

    /// ONNX face detection model (onnx feature)
    #[serde(default = "default_detector_model_path")]
    pub detector_model_path: String,

    /// ONNX face embedding model (onnx feature)
    #[serde(default = "default_embedding_model_path")]
    pub embedding_model_path: String,

    /// Minimum detector confidence for the ONNX locator
    #[serde(default = "default_detector_confidence")]
    pub detector_confidence: f32,
}

#[derive(Debug, Deserialize, Serialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum WindowPolicy {
    /// Window length is fixed from the first motion trigger
    Fixed,
    /// Every tick with motion pushes the window end forward
    ExtendOnMotion,
}

#[derive(Debug, Deserialize, Serialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum DistanceMetric {
    Euclidean,
    Cosine,
}

#[derive(Debug, Deserialize, Serialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum LocatorKind {
    Simulated,
    Onnx,
}

#[derive(Debug, Deserialize, Serialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum EncoderKind {
    Pixel,
    Onnx,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct AlertConfig {
    /// BCM pin driving the buzzer
    #[serde(default = "default_buzzer_pin")]
    pub buzzer_pin: u32,

    /// BCM pin of the PIR motion sensor
    #[serde(default = "default_motion_pin")]
    pub motion_pin: u32,

    /// How long the buzzer sounds per alert
    #[serde(default = "default_hold_seconds")]
    pub hold_seconds: u64,

    /// Hardware variant selection
    #[serde(default = "default_hardware_mode")]
    pub hardware: HardwareMode,
}

#[derive(Debug, Deserialize, Serialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum HardwareMode {
    /// Real GPIO on a Raspberry Pi, console logging elsewhere
    Auto,
    Real,
    Mock,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct DisplayConfig {
    /// Master switch for the character LCD
    #[serde(default = "default_display_enabled")]
    pub enabled: bool,

    /// I2C bus number (/dev/i2c-N)
    #[serde(default = "default_i2c_bus")]
    pub i2c_bus: u32,

    /// I2C address of the PCF8574 expander
    #[serde(default = "default_i2c_address")]
    pub i2c_address: u16,

    /// Display columns
    #[serde(default = "default_display_cols")]
    pub cols: usize,

    /// Display rows
    #[serde(default = "default_display_rows")]
    pub rows: usize,

    /// Idle status refresh period
    #[serde(default = "default_idle_refresh_seconds")]
    pub idle_refresh_seconds: u64,

    /// Show the device IP address the first time the terminal boots
    #[serde(default = "default_show_ip_on_first_boot")]
    pub show_ip_on_first_boot: bool,

    /// How long the IP address stays on screen
    #[serde(default = "default_ip_display_seconds")]
    pub ip_display_seconds: u64,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct StorageConfig {
    /// Data directory holding the database, face crops and flag files
    #[serde(default = "default_data_dir")]
    pub data_dir: String,

    /// SQLite database file name inside the data directory
    #[serde(default = "default_database_name")]
    pub database_name: String,

    /// Sub-directory of the data directory for detected face crops
    #[serde(default = "default_faces_subdir")]
    pub faces_subdir: String,

    /// Identifier written into every alert record
    #[serde(default = "default_terminal_id")]
    pub terminal_id: String,

    /// What happens when a face crop comes out empty
    #[serde(default = "default_empty_crop_policy")]
    pub empty_crop_policy: EmptyCropPolicy,

    /// Timezone used for face crop file names
    #[serde(default = "default_timestamp_timezone")]
    pub timestamp_timezone: String,
}

#[derive(Debug, Deserialize, Serialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum EmptyCropPolicy {
    /// No image and no alert row; the physical alert still fires
    SkipRecord,
    /// Alert row with no image path
    RecordWithoutImage,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct PreviewConfig {
    /// Write annotated frames to disk
    #[serde(default = "default_preview_enabled")]
    pub enabled: bool,

    /// Destination of the latest annotated frame
    #[serde(default = "default_preview_path")]
    pub path: String,

    /// Minimum time between two preview writes
    #[serde(default = "default_preview_interval_ms")]
    pub interval_ms: u64,

    /// TrueType font used for face labels
    #[serde(default = "default_preview_font_path")]
    pub font_path: String,
}

impl FacewatchConfig {
    /// Load configuration from default sources (file + environment variables)
    pub fn load() -> Result<Self, ConfigError> {
        Self::load_from_file("facewatch.toml")
    }

    /// Load configuration from a specific file path
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        Self::load_with_environment(path, Self::environment())
    }

    /// `FACEWATCH_DETECTION__COOLDOWN_SECONDS=10` style overrides. `__`
    /// separates nesting levels since field names contain `_`.
    fn environment() -> Environment {
        Environment::with_prefix("FACEWATCH")
            .prefix_separator("_")
            .separator("__")
    }

    fn load_with_environment<P: AsRef<Path>>(
        path: P,
        environment: Environment,
    ) -> Result<Self, ConfigError> {
        let path_str = path.as_ref().to_string_lossy();
        debug!("Loading configuration from: {}", path_str);

        let settings = Config::builder()
            .set_default(
                "camera.indices",
                default_camera_indices()
                    .into_iter()
                    .map(i64::from)
                    .collect::<Vec<_>>(),
            )?
            .set_default(
                "camera.resolution",
                vec![default_camera_resolution().0, default_camera_resolution().1],
            )?
            .set_default("camera.fps", default_camera_fps())?
            .set_default("camera.backend", "v4l2")?
            .set_default("camera.replay_path", default_replay_path())?
            .set_default("camera.read_timeout_ms", default_read_timeout_ms() as i64)?
            .set_default(
                "detection.active_window_seconds",
                default_active_window_seconds() as i64,
            )?
            .set_default("detection.cooldown_seconds", default_cooldown_seconds() as i64)?
            .set_default("detection.scale_factor", default_scale_factor() as f64)?
            .set_default("detection.match_threshold", default_match_threshold() as f64)?
            .set_default("detection.window_policy", "fixed")?
            .set_default("detection.distance_metric", "euclidean")?
            .set_default("detection.frame_interval_ms", default_frame_interval_ms() as i64)?
            .set_default(
                "detection.motion_poll_interval_ms",
                default_motion_poll_interval_ms() as i64,
            )?
            .set_default("detection.locator", "simulated")?
            .set_default("detection.encoder", "pixel")?
            .set_default(
                "detection.simulate_interval_frames",
                default_simulate_interval_frames() as i64,
            )?
            .set_default(
                "detection.detector_model_path",
                default_detector_model_path(),
            )?
            .set_default(
                "detection.embedding_model_path",
                default_embedding_model_path(),
            )?
            .set_default(
                "detection.detector_confidence",
                default_detector_confidence() as f64,
            )?
            .set_default("alert.buzzer_pin", default_buzzer_pin())?
            .set_default("alert.motion_pin", default_motion_pin())?
            .set_default("alert.hold_seconds", default_hold_seconds() as i64)?
            .set_default("alert.hardware", "auto")?
            .set_default("display.enabled", default_display_enabled())?
            .set_default("display.i2c_bus", default_i2c_bus())?
            .set_default("display.i2c_address", default_i2c_address() as i64)?
            .set_default("display.cols", default_display_cols() as i64)?
            .set_default("display.rows", default_display_rows() as i64)?
            .set_default(
                "display.idle_refresh_seconds",
                default_idle_refresh_seconds() as i64,
            )?
            .set_default(
                "display.show_ip_on_first_boot",
                default_show_ip_on_first_boot(),
            )?
            .set_default("display.ip_display_seconds", default_ip_display_seconds() as i64)?
            .set_default("storage.data_dir", default_data_dir())?
            .set_default("storage.database_name", default_database_name())?
            .set_default("storage.faces_subdir", default_faces_subdir())?
            .set_default("storage.terminal_id", default_terminal_id())?
            .set_default("storage.empty_crop_policy", "skip_record")?
            .set_default(
                "storage.timestamp_timezone",
                default_timestamp_timezone(),
            )?
            .set_default("preview.enabled", default_preview_enabled())?
            .set_default("preview.path", default_preview_path())?
            .set_default("preview.interval_ms", default_preview_interval_ms() as i64)?
            .set_default("preview.font_path", default_preview_font_path())?
            // Add configuration file (optional)
            .add_source(File::with_name(&path_str).required(false))
            .add_source(environment)
            .build()?;

        let config: FacewatchConfig = settings.try_deserialize()?;

        info!("Configuration loaded successfully");
        debug!("Final configuration: {:#?}", config);

        Ok(config)
    }

    /// Validate configuration values
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.camera.indices.is_empty() {
            return Err(ConfigError::Message(
                "At least one camera index must be configured".to_string(),
            ));
        }

        if self.camera.resolution.0 == 0 || self.camera.resolution.1 == 0 {
            return Err(ConfigError::Message(
                "Camera resolution must be greater than 0".to_string(),
            ));
        }

        if self.camera.fps == 0 {
            return Err(ConfigError::Message(
                "Camera fps must be greater than 0".to_string(),
            ));
        }

        if self.detection.active_window_seconds == 0 {
            return Err(ConfigError::Message(
                "Detection active_window_seconds must be greater than 0".to_string(),
            ));
        }

        if !(self.detection.scale_factor > 0.0 && self.detection.scale_factor <= 1.0) {
            return Err(ConfigError::Message(format!(
                "Detection scale_factor must be in (0, 1], got {}",
                self.detection.scale_factor
            )));
        }

        if !(self.detection.match_threshold > 0.0 && self.detection.match_threshold <= 1.0) {
            return Err(ConfigError::Message(format!(
                "Detection match_threshold must be in (0, 1], got {}",
                self.detection.match_threshold
            )));
        }

        if self.detection.simulate_interval_frames == 0 {
            return Err(ConfigError::Message(
                "Detection simulate_interval_frames must be greater than 0".to_string(),
            ));
        }

        if self.alert.hold_seconds == 0 {
            return Err(ConfigError::Message(
                "Alert hold_seconds must be greater than 0".to_string(),
            ));
        }

        if self.alert.buzzer_pin == self.alert.motion_pin {
            return Err(ConfigError::Message(format!(
                "Buzzer and motion sensor cannot share GPIO {}",
                self.alert.buzzer_pin
            )));
        }

        if self.display.cols == 0 || self.display.rows == 0 {
            return Err(ConfigError::Message(
                "Display geometry must be greater than 0".to_string(),
            ));
        }

        if self.storage.terminal_id.trim().is_empty() {
            return Err(ConfigError::Message(
                "Storage terminal_id must not be empty".to_string(),
            ));
        }

        Ok(())
    }
}

impl DetectionConfig {
    pub fn active_window(&self) -> Duration {
        Duration::from_secs(self.active_window_seconds)
    }

    pub fn cooldown(&self) -> Duration {
        Duration::from_secs(self.cooldown_seconds)
    }

    pub fn frame_interval(&self) -> Duration {
        Duration::from_millis(self.frame_interval_ms)
    }

    pub fn motion_poll_interval(&self) -> Duration {
        Duration::from_millis(self.motion_poll_interval_ms)
    }
}

impl StorageConfig {
    pub fn database_path(&self) -> PathBuf {
        Path::new(&self.data_dir).join(&self.database_name)
    }

    pub fn faces_dir(&self) -> PathBuf {
        Path::new(&self.data_dir).join(&self.faces_subdir)
    }

    /// Marker written once the IP address has been shown on the LCD
    pub fn ip_flag_path(&self) -> PathBuf {
        Path::new(&self.data_dir).join(".ip_displayed_flag")
    }
}

impl Default for FacewatchConfig {
    fn default() -> Self {
        Self {
            camera: CameraConfig {
                indices: default_camera_indices(),
                resolution: default_camera_resolution(),
                fps: default_camera_fps(),
                backend: default_camera_backend(),
                replay_path: default_replay_path(),
                read_timeout_ms: default_read_timeout_ms(),
            },
            detection: DetectionConfig {
                active_window_seconds: default_active_window_seconds(),
                cooldown_seconds: default_cooldown_seconds(),
                scale_factor: default_scale_factor(),
                match_threshold: default_match_threshold(),
                window_policy: default_window_policy(),
                distance_metric: default_distance_metric(),
                frame_interval_ms: default_frame_interval_ms(),
                motion_poll_interval_ms: default_motion_poll_interval_ms(),
                locator: default_locator(),
                encoder: default_encoder(),
                simulate_interval_frames: default_simulate_interval_frames(),
                detector_model_path: default_detector_model_path(),
                embedding_model_path: default_embedding_model_path(),
                detector_confidence: default_detector_confidence(),
            },
            alert: AlertConfig {
                buzzer_pin: default_buzzer_pin(),
                motion_pin: default_motion_pin(),
                hold_seconds: default_hold_seconds(),
                hardware: default_hardware_mode(),
            },
            display: DisplayConfig {
                enabled: default_display_enabled(),
                i2c_bus: default_i2c_bus(),
                i2c_address: default_i2c_address(),
                cols: default_display_cols(),
                rows: default_display_rows(),
                idle_refresh_seconds: default_idle_refresh_seconds(),
                show_ip_on_first_boot: default_show_ip_on_first_boot(),
                ip_display_seconds: default_ip_display_seconds(),
            },
            storage: StorageConfig {
                data_dir: default_data_dir(),
                database_name: default_database_name(),
                faces_subdir: default_faces_subdir(),
                terminal_id: default_terminal_id(),
                empty_crop_policy: default_empty_crop_policy(),
                timestamp_timezone: default_timestamp_timezone(),
            },
            preview: PreviewConfig {
                enabled: default_preview_enabled(),
                path: default_preview_path(),
                interval_ms: default_preview_interval_ms(),
                font_path: default_preview_font_path(),
            },
        }
    }
}

// Default value functions
fn default_camera_indices() -> Vec<u32> {
    vec![0, 1]
}
fn default_camera_resolution() -> (u32, u32) {
    (640, 480)
}
fn default_camera_fps() -> u32 {
    30
}
fn default_camera_backend() -> CameraBackend {
    CameraBackend::V4l2
}
fn default_replay_path() -> String {
    "./data/replay".to_string()
}
fn default_read_timeout_ms() -> u64 {
    1000
}

fn default_active_window_seconds() -> u64 {
    30
}
fn default_cooldown_seconds() -> u64 {
    30
}
fn default_scale_factor() -> f32 {
    0.5
}
fn default_match_threshold() -> f32 {
    0.6
}
fn default_window_policy() -> WindowPolicy {
    WindowPolicy::Fixed
}
fn default_distance_metric() -> DistanceMetric {
    DistanceMetric::Euclidean
}
fn default_frame_interval_ms() -> u64 {
    30
}
fn default_motion_poll_interval_ms() -> u64 {
    1000
}
fn default_locator() -> LocatorKind {
    LocatorKind::Simulated
}
fn default_encoder() -> EncoderKind {
    EncoderKind::Pixel
}
fn default_simulate_interval_frames() -> u64 {
    150
}
fn default_detector_model_path() -> String {
    "./models/yolov8n-face.onnx".to_string()
}
fn default_embedding_model_path() -> String {
    "./models/arcface.onnx".to_string()
}
fn default_detector_confidence() -> f32 {
    0.5
}

fn default_buzzer_pin() -> u32 {
    26
}
fn default_motion_pin() -> u32 {
    4
}
fn default_hold_seconds() -> u64 {
    5
}
fn default_hardware_mode() -> HardwareMode {
    HardwareMode::Auto
}

fn default_display_enabled() -> bool {
    true
}
fn default_i2c_bus() -> u32 {
    1
}
fn default_i2c_address() -> u16 {
    0x27
}
fn default_display_cols() -> usize {
    16
}
fn default_display_rows() -> usize {
    2
}
fn default_idle_refresh_seconds() -> u64 {
    5
}
fn default_show_ip_on_first_boot() -> bool {
    true
}
fn default_ip_display_seconds() -> u64 {
    10
}

fn default_data_dir() -> String {
    "./data".to_string()
}
fn default_database_name() -> String {
    "facial_recognition.db".to_string()
}
fn default_faces_subdir() -> String {
    "detected_faces".to_string()
}
fn default_terminal_id() -> String {
    "BDR_TERM_01".to_string()
}
fn default_empty_crop_policy() -> EmptyCropPolicy {
    EmptyCropPolicy::SkipRecord
}
fn default_timestamp_timezone() -> String {
    "UTC".to_string()
}

fn default_preview_enabled() -> bool {
    false
}
fn default_preview_path() -> String {
    "./data/preview.jpg".to_string()
}
fn default_preview_interval_ms() -> u64 {
    500
}
fn default_preview_font_path() -> String {
    "/usr/share/fonts/truetype/dejavu/DejaVuSans.ttf".to_string()
}
