use super::*;
use crate::camera::FrameSource;
use crate::config::FacewatchConfig;
use crate::error::{CameraError, FacewatchError, RecognitionError};
use crate::events::{EventBus, EventFilter, FacewatchEvent};
use crate::frame::{FaceRegion, Frame};
use crate::hardware::{HardwareEvent, HardwareLog, Peripherals, PinLevel, ScriptedMotionSensor};
use crate::recognition::{FaceEncoder, FixedFaceLocator, Signature};
use crate::storage::SqliteStore;
use image::{Rgb, RgbImage};
use std::net::{IpAddr, Ipv4Addr};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::{Duration, SystemTime};
use tempfile::TempDir;

struct CountingSource {
    reads: Arc<AtomicUsize>,
    releases: Arc<AtomicUsize>,
    fail_first: usize,
}

impl FrameSource for CountingSource {
    fn read_frame(&mut self) -> Result<Frame, CameraError> {
        let n = self.reads.fetch_add(1, Ordering::SeqCst) + 1;
        if n <= self.fail_first {
            return Err(CameraError::ReadFailed {
                details: "device busy".to_string(),
            });
        }
        Ok(Frame::new(
            n as u64,
            SystemTime::now(),
            RgbImage::from_pixel(64, 64, Rgb([90, 120, 150])),
        ))
    }

    fn release(&mut self) {
        self.releases.fetch_add(1, Ordering::SeqCst);
    }

    fn describe(&self) -> String {
        "counting source".to_string()
    }
}

/// Always returns the same signature
struct ConstantEncoder(Signature);

impl FaceEncoder for ConstantEncoder {
    fn encode(
        &mut self,
        _image: &RgbImage,
        _region: &FaceRegion,
    ) -> Result<Signature, RecognitionError> {
        Ok(self.0.clone())
    }

    fn signature_len(&self) -> usize {
        self.0.len()
    }
}

fn alice_signature() -> Signature {
    Signature::new(vec![1.0, 0.0, 0.0, 0.0])
}

struct Harness {
    orchestrator: FacewatchOrchestrator,
    store: Arc<SqliteStore>,
    log: HardwareLog,
    reads: Arc<AtomicUsize>,
    releases: Arc<AtomicUsize>,
    polls: Arc<AtomicUsize>,
    _data: TempDir,
}

struct Setup {
    enroll_alice: bool,
    motion: Vec<bool>,
    fail_reads: usize,
    regions: Vec<FaceRegion>,
    event_bus: EventBus,
}

impl Default for Setup {
    fn default() -> Self {
        Self {
            enroll_alice: true,
            motion: vec![true],
            fail_reads: 0,
            regions: vec![FaceRegion::new(8, 24, 24, 8)],
            event_bus: EventBus::new(1024),
        }
    }
}

fn test_config(dir: &TempDir) -> FacewatchConfig {
    let mut config = FacewatchConfig::default();
    config.storage.data_dir = dir.path().display().to_string();
    config.display.show_ip_on_first_boot = false;
    config.detection.frame_interval_ms = 1000;
    config.detection.motion_poll_interval_ms = 1000;
    config
}

fn harness(setup: Setup) -> Harness {
    let data = TempDir::new().unwrap();
    let config = test_config(&data);

    let store = Arc::new(SqliteStore::open_in_memory().unwrap());
    if setup.enroll_alice {
        let key = store.enroll_identity("alice", None).unwrap();
        store.add_signature(key, None, &alice_signature()).unwrap();
    }

    let reads = Arc::new(AtomicUsize::new(0));
    let releases = Arc::new(AtomicUsize::new(0));
    let source_reads = reads.clone();
    let source_releases = releases.clone();
    let fail_first = setup.fail_reads;

    let sensor = ScriptedMotionSensor::new(setup.motion);
    let polls = sensor.poll_counter();
    let log = HardwareLog::new();

    let orchestrator = FacewatchOrchestrator::builder(config)
        .with_store(store.clone())
        .with_camera_opener(Box::new(move |_index| {
            Ok(Box::new(CountingSource {
                reads: source_reads.clone(),
                releases: source_releases.clone(),
                fail_first,
            }) as Box<dyn FrameSource>)
        }))
        .with_peripherals(Peripherals {
            pin: Box::new(log.pin()),
            display: Some(Box::new(log.display(16))),
            sensor: Box::new(sensor),
            real_hardware: false,
        })
        .with_recognizers(
            Box::new(FixedFaceLocator::new(setup.regions)),
            Box::new(ConstantEncoder(alice_signature())),
        )
        .with_event_bus(setup.event_bus)
        .build()
        .unwrap();

    Harness {
        orchestrator,
        store,
        log,
        reads,
        releases,
        polls,
        _data: data,
    }
}

/// Request a user shutdown after `after` of (paused) time
fn stop_after(orchestrator: &FacewatchOrchestrator, after: Duration) {
    let shutdown = orchestrator.shutdown_handle();
    tokio::spawn(async move {
        tokio::time::sleep(after).await;
        shutdown.request(ShutdownReason::UserRequest);
    });
}

#[tokio::test(start_paused = true)]
async fn test_cooldown_limits_records() {
    let mut h = harness(Setup::default());
    stop_after(&h.orchestrator, Duration::from_secs(45));

    h.orchestrator.start().await;
    let reason = h.orchestrator.detection_loop().await;
    assert_eq!(reason, ShutdownReason::UserRequest);

    // Alerts at t=0 and t=30; every other sighting is inside the cooldown
    assert_eq!(h.store.alert_count().unwrap(), 2);
    let summary = h.orchestrator.summary().clone();
    assert_eq!(summary.alerts_raised, 2);
    assert_eq!(summary.alerts_recorded, 2);
    assert!(summary.alerts_suppressed > 0);
    assert_eq!(summary.windows_opened, 2);

    assert_eq!(h.log.count(&HardwareEvent::Pin(PinLevel::High)), 2);
    assert_eq!(h.orchestrator.shutdown(reason).await, 0);
}

#[tokio::test(start_paused = true)]
async fn test_two_faces_of_one_identity_alert_once() {
    let bus = EventBus::new(1024);
    let mut rx = bus.subscribe();
    let mut h = harness(Setup {
        regions: vec![FaceRegion::new(0, 10, 10, 0), FaceRegion::new(12, 30, 30, 12)],
        event_bus: bus,
        ..Default::default()
    });
    // Past the 5s hold so the whole first frame is evaluated
    stop_after(&h.orchestrator, Duration::from_secs(8));

    h.orchestrator.detection_loop().await;

    assert_eq!(h.store.alert_count().unwrap(), 1);
    assert_eq!(h.orchestrator.summary().alerts_raised, 1);
    assert!(h.orchestrator.summary().alerts_suppressed >= 1);

    // Second face of the first frame: observed, then suppressed
    let mut seen = Vec::new();
    while let Ok(event) = rx.try_recv() {
        seen.push(event.event_type());
    }
    let raised = seen.iter().position(|t| *t == "alert_raised").unwrap();
    let after: Vec<_> = seen[raised + 1..]
        .iter()
        .copied()
        .filter(|t| *t != "alert_recorded")
        .take(2)
        .collect();
    assert_eq!(after, vec!["face_observed", "alert_suppressed"]);
}

#[tokio::test(start_paused = true)]
async fn test_persistence_failure_still_fires_alert() {
    let mut h = harness(Setup::default());
    // Gallery is already loaded; every save now fails
    assert!(h.store.close());
    stop_after(&h.orchestrator, Duration::from_secs(8));

    let reason = h.orchestrator.detection_loop().await;
    assert_eq!(reason, ShutdownReason::UserRequest);

    let summary = h.orchestrator.summary();
    assert_eq!(summary.alerts_raised, 1);
    assert_eq!(summary.alerts_recorded, 0);
    assert!(summary.frames_processed > 1);
    assert_eq!(h.log.count(&HardwareEvent::Pin(PinLevel::High)), 1);
    assert!(h.log.messages().iter().any(|(l1, l2)| l1 == "CRIMINAL DETECTE" && l2 == "alice"));
}

#[tokio::test(start_paused = true)]
async fn test_empty_gallery_never_alerts() {
    let mut h = harness(Setup {
        enroll_alice: false,
        ..Default::default()
    });
    assert_eq!(h.orchestrator.gallery_size(), 0);
    stop_after(&h.orchestrator, Duration::from_secs(20));

    h.orchestrator.detection_loop().await;

    assert!(h.orchestrator.summary().faces_observed > 0);
    assert_eq!(h.orchestrator.summary().alerts_raised, 0);
    assert_eq!(h.store.alert_count().unwrap(), 0);
    assert_eq!(h.log.count(&HardwareEvent::Pin(PinLevel::High)), 0);
}

#[tokio::test(start_paused = true)]
async fn test_camera_failure_is_fatal_before_motion_polling() {
    let data = TempDir::new().unwrap();
    let attempts = Arc::new(AtomicUsize::new(0));
    let opener_attempts = attempts.clone();

    let sensor = ScriptedMotionSensor::new([true]);
    let polls = sensor.poll_counter();
    let log = HardwareLog::new();

    let result = FacewatchOrchestrator::builder(test_config(&data))
        .with_store(Arc::new(SqliteStore::open_in_memory().unwrap()))
        .with_camera_opener(Box::new(move |index| {
            opener_attempts.fetch_add(1, Ordering::SeqCst);
            Err(CameraError::DeviceOpen {
                device: format!("/dev/video{}", index),
                details: "no such device".to_string(),
            })
        }))
        .with_peripherals(Peripherals {
            pin: Box::new(log.pin()),
            display: None,
            sensor: Box::new(sensor),
            real_hardware: false,
        })
        .build();

    let Err(FacewatchError::Camera(CameraError::NoneAvailable { indices })) = result else {
        panic!("expected camera failure");
    };
    assert_eq!(indices, vec![0, 1]);
    assert_eq!(attempts.load(Ordering::SeqCst), 2);
    assert_eq!(polls.load(Ordering::SeqCst), 0);
    assert_eq!(log.count(&HardwareEvent::Pin(PinLevel::High)), 0);
}

#[tokio::test(start_paused = true)]
async fn test_cancel_during_alert_releases_once() {
    let mut h = harness(Setup::default());
    stop_after(&h.orchestrator, Duration::from_secs(2));

    let start = tokio::time::Instant::now();
    let reason = h.orchestrator.detection_loop().await;
    assert!(start.elapsed() < Duration::from_secs(5));

    let events = h.log.events();
    let high = events
        .iter()
        .position(|e| *e == HardwareEvent::Pin(PinLevel::High))
        .unwrap();
    let low = events
        .iter()
        .position(|e| *e == HardwareEvent::Pin(PinLevel::Low))
        .unwrap();
    assert!(low > high);

    assert_eq!(h.orchestrator.shutdown(reason.clone()).await, 0);
    assert_eq!(h.orchestrator.shutdown(reason).await, 0);
    drop(h.orchestrator);

    assert_eq!(h.log.count(&HardwareEvent::PinReleased), 1);
    assert_eq!(h.log.count(&HardwareEvent::DisplayReleased), 1);
    assert_eq!(h.releases.load(Ordering::SeqCst), 1);
    assert!(!h.store.is_open());
    assert!(h
        .log
        .messages()
        .contains(&("System Quitting".to_string(), String::new())));
}

#[tokio::test(start_paused = true)]
async fn test_idle_without_motion_reads_no_frames() {
    let mut h = harness(Setup {
        motion: vec![false],
        ..Default::default()
    });
    stop_after(&h.orchestrator, Duration::from_secs(12));

    h.orchestrator.start().await;
    h.orchestrator.detection_loop().await;

    assert_eq!(h.reads.load(Ordering::SeqCst), 0);
    assert!(h.polls.load(Ordering::SeqCst) >= 10);

    let messages = h.log.messages();
    assert_eq!(
        messages[0],
        ("System Ready".to_string(), "Monitoring...".to_string())
    );
    assert!(messages.contains(&("Status: Idle".to_string(), "Monitoring...".to_string())));
}

#[tokio::test(start_paused = true)]
async fn test_window_messages() {
    let mut h = harness(Setup {
        enroll_alice: false,
        motion: vec![true, false],
        ..Default::default()
    });
    stop_after(&h.orchestrator, Duration::from_secs(35));

    h.orchestrator.detection_loop().await;

    let messages = h.log.messages();
    assert!(messages.contains(&("Motion Detected!".to_string(), "Scanning...".to_string())));
    assert!(messages.contains(&("Scan Complete".to_string(), "Monitoring...".to_string())));
    // One window, then idle polling
    assert_eq!(h.orchestrator.summary().windows_opened, 1);
}

#[tokio::test(start_paused = true)]
async fn test_transient_read_failures_are_retried() {
    let mut h = harness(Setup {
        enroll_alice: false,
        fail_reads: 3,
        ..Default::default()
    });
    stop_after(&h.orchestrator, Duration::from_secs(10));

    h.orchestrator.detection_loop().await;

    let summary = h.orchestrator.summary();
    assert_eq!(summary.frame_read_failures, 3);
    assert!(summary.frames_processed > 0);
}

#[tokio::test(start_paused = true)]
async fn test_events_published() {
    let bus = EventBus::new(1024);
    let mut rx = bus.subscribe();
    let mut alice_only = bus.subscribe_filtered(
        EventFilter::Identities(vec!["alice".to_string()]),
        "alice",
    );
    let mut bob_only =
        bus.subscribe_filtered(EventFilter::Identities(vec!["bob".to_string()]), "bob");
    let mut h = harness(Setup {
        event_bus: bus,
        ..Default::default()
    });
    stop_after(&h.orchestrator, Duration::from_secs(10));

    h.orchestrator.detection_loop().await;

    let mut seen = Vec::new();
    while let Ok(event) = rx.try_recv() {
        seen.push(event.event_type());
    }
    assert!(seen.contains(&"window_opened"));
    assert!(seen.contains(&"alert_raised"));
    assert!(seen.contains(&"alert_recorded"));
    assert!(seen.contains(&"alert_suppressed"));

    let mut alice_events = Vec::new();
    while let Some(event) = alice_only.try_recv().unwrap() {
        alice_events.push(event.event_type());
    }
    assert!(alice_events.contains(&"alert_raised"));
    assert!(!alice_events.contains(&"window_opened"));
    assert!(bob_only.try_recv().unwrap().is_none());

    h.orchestrator.shutdown(ShutdownReason::UserRequest).await;
    let mut last = None;
    while let Ok(event) = rx.try_recv() {
        last = Some(event);
    }
    assert!(matches!(last, Some(FacewatchEvent::ShutdownRequested { .. })));
}

#[tokio::test(start_paused = true)]
async fn test_user_quit_announced_once() {
    let bus = EventBus::new(64);
    let mut rx = bus.subscribe_filtered(
        EventFilter::EventTypes(vec!["shutdown_requested"]),
        "shutdown",
    );
    let mut h = harness(Setup {
        motion: vec![false],
        event_bus: bus,
        ..Default::default()
    });

    // What the keyboard handler does on `q`
    h.orchestrator
        .shutdown_handle()
        .request(ShutdownReason::UserRequest);
    let reason = h.orchestrator.detection_loop().await;
    h.orchestrator.shutdown(reason).await;

    assert!(rx.try_recv().unwrap().is_some());
    assert!(rx.try_recv().unwrap().is_none());
}

#[tokio::test(start_paused = true)]
async fn test_error_shutdown_shows_fatal_message() {
    let mut h = harness(Setup::default());
    let code = h
        .orchestrator
        .shutdown(ShutdownReason::Error("camera lost".to_string()))
        .await;

    assert_eq!(code, 1);
    assert!(h
        .log
        .messages()
        .contains(&("FATAL ERROR".to_string(), "camera lost".to_string())));
    assert_eq!(
        h.orchestrator.get_component_state("camera"),
        Some(ComponentState::Stopped)
    );
}

#[tokio::test(start_paused = true)]
async fn test_first_boot_ip_shown_once() {
    let mut h = harness(Setup::default());
    let flag = h.orchestrator.config().storage.ip_flag_path();
    assert!(!flag.exists());

    h.orchestrator
        .show_first_boot_ip(Some(IpAddr::V4(Ipv4Addr::new(192, 168, 1, 40))))
        .await;

    assert!(flag.exists());
    assert!(h
        .log
        .messages()
        .contains(&("IP Address:".to_string(), "192.168.1.40".to_string())));
}

#[test]
fn test_first_shutdown_reason_wins() {
    let handle = ShutdownHandle::new();
    assert!(!handle.is_requested());

    assert!(handle.request(ShutdownReason::Signal("SIGINT".to_string())));
    assert!(!handle.request(ShutdownReason::UserRequest));

    assert!(handle.is_requested());
    assert_eq!(
        handle.reason(),
        Some(ShutdownReason::Signal("SIGINT".to_string()))
    );
}

#[test]
fn test_shutdown_reason_display_lines() {
    assert_eq!(
        ShutdownReason::Signal("SIGINT".to_string()).display_lines(),
        ("System Halted".to_string(), "User Interrupt".to_string())
    );
    assert_eq!(ShutdownReason::UserRequest.exit_code(), 0);
    assert_eq!(ShutdownReason::Error("x".to_string()).exit_code(), 1);
}
