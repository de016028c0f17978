use super::shutdown::ShutdownHandle;
use super::types::{ComponentState, RunSummary};
use crate::alerting::{AlertStateMachine, EventRecorder};
use crate::annotation::FaceAnnotator;
use crate::camera::{open_first_available, open_from_config, FrameSource};
use crate::config::FacewatchConfig;
use crate::error::{CameraError, FacewatchError, Result};
use crate::events::EventBus;
use crate::hardware::{
    select_peripherals, AlertDriver, ManualTrigger, MotionSensor, Peripherals,
    TriggeredMotionSensor,
};
use crate::keyboard_input::KeyboardInputHandler;
use crate::preview::PreviewWriter;
use crate::recognition::{FaceEncoder, FaceLocator, Matcher, RecognitionPipeline};
use crate::recovery::RecoveryManager;
use crate::storage::{GalleryStore, SqliteStore};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info, warn};

/// Opens one camera index
pub type CameraOpener = Box<dyn FnMut(u32) -> std::result::Result<Box<dyn FrameSource>, CameraError> + Send>;

/// Owns every resource of the terminal and runs the detection loop
pub struct FacewatchOrchestrator {
    pub(super) config: FacewatchConfig,
    pub(super) event_bus: EventBus,
    pub(super) store: Arc<SqliteStore>,

    // Components
    pub(super) camera: Box<dyn FrameSource>,
    pub(super) sensor: Box<dyn MotionSensor>,
    pub(super) driver: AlertDriver,
    pub(super) pipeline: RecognitionPipeline,
    pub(super) machine: AlertStateMachine,
    pub(super) recorder: EventRecorder,
    pub(super) annotator: Option<FaceAnnotator>,
    pub(super) preview: Option<PreviewWriter>,
    pub(super) keyboard_handler: Option<KeyboardInputHandler>,
    pub(super) recovery: RecoveryManager,

    // Lifecycle management
    pub(super) component_states: HashMap<String, ComponentState>,
    pub(super) shutdown: ShutdownHandle,
    pub(super) trigger: ManualTrigger,
    pub(super) released: bool,
    pub(super) exit_code: Option<i32>,
    pub(super) summary: RunSummary,
}

impl FacewatchOrchestrator {
    pub fn builder(config: FacewatchConfig) -> FacewatchOrchestratorBuilder {
        FacewatchOrchestratorBuilder::new(config)
    }

    /// Build with the hardware, camera and database named by `config`
    pub fn new(config: FacewatchConfig) -> Result<Self> {
        Self::builder(config).build()
    }

    pub fn config(&self) -> &FacewatchConfig {
        &self.config
    }

    pub fn event_bus(&self) -> &EventBus {
        &self.event_bus
    }

    /// Handle for requesting shutdown from other tasks
    pub fn shutdown_handle(&self) -> ShutdownHandle {
        self.shutdown.clone()
    }

    /// Pulse that counts as one motion reading
    pub fn motion_trigger(&self) -> ManualTrigger {
        self.trigger.clone()
    }

    pub fn gallery_size(&self) -> usize {
        self.pipeline.matcher().gallery_len()
    }
}

/// Startup in dependency order: store, gallery, camera, hardware. A camera
/// that cannot be opened fails the build before any peripheral is touched.
pub struct FacewatchOrchestratorBuilder {
    config: FacewatchConfig,
    store: Option<Arc<SqliteStore>>,
    camera_opener: Option<CameraOpener>,
    peripherals: Option<Peripherals>,
    recognizers: Option<(Box<dyn FaceLocator>, Box<dyn FaceEncoder>)>,
    event_bus: Option<EventBus>,
    shutdown: Option<ShutdownHandle>,
    keyboard_enabled: bool,
}

impl FacewatchOrchestratorBuilder {
    pub fn new(config: FacewatchConfig) -> Self {
        Self {
            config,
            store: None,
            camera_opener: None,
            peripherals: None,
            recognizers: None,
            event_bus: None,
            shutdown: None,
            keyboard_enabled: false,
        }
    }

    pub fn with_store(mut self, store: Arc<SqliteStore>) -> Self {
        self.store = Some(store);
        self
    }

    /// Open frame sources through `opener`, trying each configured index
    pub fn with_camera_opener(mut self, opener: CameraOpener) -> Self {
        self.camera_opener = Some(opener);
        self
    }

    pub fn with_peripherals(mut self, peripherals: Peripherals) -> Self {
        self.peripherals = Some(peripherals);
        self
    }

    pub fn with_recognizers(
        mut self,
        locator: Box<dyn FaceLocator>,
        encoder: Box<dyn FaceEncoder>,
    ) -> Self {
        self.recognizers = Some((locator, encoder));
        self
    }

    pub fn with_event_bus(mut self, event_bus: EventBus) -> Self {
        self.event_bus = Some(event_bus);
        self
    }

    pub fn with_shutdown_handle(mut self, shutdown: ShutdownHandle) -> Self {
        self.shutdown = Some(shutdown);
        self
    }

    pub fn with_keyboard(mut self, enabled: bool) -> Self {
        self.keyboard_enabled = enabled;
        self
    }

    pub fn build(self) -> Result<FacewatchOrchestrator> {
        let config = self.config;
        let mut component_states = HashMap::new();

        // Storage and gallery
        let store = match self.store {
            Some(store) => store,
            None => Arc::new(SqliteStore::open(config.storage.database_path())?),
        };
        let gallery = store.load_all_known_signatures()?;
        if gallery.is_empty() {
            warn!("Gallery is empty; every face will be reported as Unknown");
        } else {
            info!("Loaded {} known face signature(s)", gallery.len());
        }
        component_states.insert("storage".to_string(), ComponentState::Running);

        let pipeline = match self.recognizers {
            Some((locator, encoder)) => RecognitionPipeline::new(
                locator,
                encoder,
                Matcher::new(
                    gallery,
                    config.detection.match_threshold,
                    config.detection.distance_metric,
                ),
                config.detection.scale_factor,
            ),
            None => RecognitionPipeline::from_config(&config.detection, gallery)?,
        };

        // Camera, fatal when nothing opens
        let camera = match self.camera_opener {
            Some(opener) => open_first_available(&config.camera.indices, opener),
            None => open_from_config(&config.camera),
        }
        .map_err(|e| {
            error!("Camera unavailable: {}", e);
            FacewatchError::from(e)
        })?;
        component_states.insert("camera".to_string(), ComponentState::Running);

        // Hardware
        let peripherals = match self.peripherals {
            Some(peripherals) => peripherals,
            None => select_peripherals(&config.alert, &config.display),
        };
        let trigger = ManualTrigger::new();
        let sensor: Box<dyn MotionSensor> =
            Box::new(TriggeredMotionSensor::new(peripherals.sensor, trigger.clone()));
        let driver = AlertDriver::new(
            peripherals.pin,
            peripherals.display,
            Duration::from_secs(config.alert.hold_seconds),
        );
        component_states.insert("hardware".to_string(), ComponentState::Running);

        let recorder = EventRecorder::new(
            store.clone(),
            &config.storage,
            config.detection.scale_factor,
        )?;

        let event_bus = self.event_bus.unwrap_or_default();
        let shutdown = self.shutdown.unwrap_or_default();

        let keyboard_handler = self.keyboard_enabled.then(|| {
            KeyboardInputHandler::new(shutdown.clone(), trigger.clone())
        });
        if keyboard_handler.is_some() {
            component_states.insert("keyboard".to_string(), ComponentState::Stopped);
        }

        Ok(FacewatchOrchestrator {
            machine: AlertStateMachine::from_config(&config.detection),
            annotator: config
                .preview
                .enabled
                .then(|| FaceAnnotator::new(&config.preview.font_path)),
            preview: PreviewWriter::from_config(&config.preview),
            config,
            event_bus,
            store,
            camera,
            sensor,
            driver,
            pipeline,
            recorder,
            keyboard_handler,
            recovery: RecoveryManager::new(),
            component_states,
            shutdown,
            trigger,
            released: false,
            exit_code: None,
            summary: RunSummary::default(),
        })
    }
}
