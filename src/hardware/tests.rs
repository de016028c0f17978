use super::*;
use crate::config::{AlertConfig, DisplayConfig, FacewatchConfig, HardwareMode};
use std::fs;
use std::sync::atomic::Ordering;
use std::time::Duration;
use tempfile::TempDir;
use tokio_util::sync::CancellationToken;

fn fake_sysfs(pins: &[u32]) -> TempDir {
    let dir = TempDir::new().unwrap();
    for pin in pins {
        fs::create_dir(dir.path().join(format!("gpio{}", pin))).unwrap();
    }
    dir
}

fn read_attr(dir: &TempDir, pin: u32, name: &str) -> String {
    fs::read_to_string(dir.path().join(format!("gpio{}", pin)).join(name)).unwrap()
}

#[test]
fn test_sysfs_output_pin_starts_low() {
    let sysfs = fake_sysfs(&[26]);
    let mut pin = SysfsOutputPin::open(sysfs.path(), 26).unwrap();

    assert_eq!(read_attr(&sysfs, 26, "direction"), "out");
    assert_eq!(read_attr(&sysfs, 26, "value"), "0");

    pin.set_level(PinLevel::High).unwrap();
    assert_eq!(read_attr(&sysfs, 26, "value"), "1");

    pin.release().unwrap();
    assert_eq!(read_attr(&sysfs, 26, "value"), "0");
    assert!(pin.set_level(PinLevel::High).is_err());
}

#[test]
fn test_sysfs_export_failure() {
    let sysfs = TempDir::new().unwrap();
    // No gpio4 directory ever appears
    let result = SysfsGpio::export(sysfs.path().join("missing"), 4, Direction::In);
    assert!(matches!(
        result,
        Err(crate::error::HardwareError::GpioExport { pin: 4, .. })
    ));
}

#[test]
fn test_sysfs_export_unexports_when_pin_never_appears() {
    let sysfs = TempDir::new().unwrap();

    let result = SysfsGpio::export(sysfs.path(), 17, Direction::Out);
    assert!(matches!(
        result,
        Err(crate::error::HardwareError::Gpio { pin: 17, .. })
    ));
    assert_eq!(fs::read_to_string(sysfs.path().join("export")).unwrap(), "17");
    assert_eq!(fs::read_to_string(sysfs.path().join("unexport")).unwrap(), "17");
}

#[test]
fn test_sysfs_existing_pin_not_unexported_on_failure() {
    let sysfs = fake_sysfs(&[5]);
    // A directory where the direction file should be makes the write fail
    fs::create_dir(sysfs.path().join("gpio5/direction")).unwrap();

    assert!(SysfsGpio::export(sysfs.path(), 5, Direction::In).is_err());
    assert!(!sysfs.path().join("unexport").exists());
}

#[test]
fn test_sysfs_motion_sensor() {
    let sysfs = fake_sysfs(&[4]);
    let mut sensor = SysfsMotionSensor::open(sysfs.path(), 4).unwrap();
    assert_eq!(read_attr(&sysfs, 4, "direction"), "in");

    fs::write(sysfs.path().join("gpio4/value"), "1\n").unwrap();
    assert!(sensor.motion_detected().unwrap());

    fs::write(sysfs.path().join("gpio4/value"), "0\n").unwrap();
    assert!(!sensor.motion_detected().unwrap());
}

#[test]
fn test_lcd_init_and_line_bytes() {
    let lcd = Hd44780Lcd::with_pulse_delay(Vec::new(), 16, 2, Duration::ZERO).unwrap();
    let bytes = lcd.into_inner();

    // 6 commands, 2 nibbles each, 3 bus writes per nibble
    assert_eq!(bytes.len(), 6 * 2 * 3);
    // High nibble of 0x33 with backlight, then strobed
    assert_eq!(&bytes[..3], &[0x38, 0x3C, 0x38]);

    let mut lcd = Hd44780Lcd::with_pulse_delay(Vec::new(), 16, 2, Duration::ZERO).unwrap();
    lcd.show("HI", "").unwrap();
    let bytes = lcd.into_inner();
    let shown = &bytes[6 * 2 * 3..];

    // Two lines, each an address command plus 16 padded characters
    assert_eq!(shown.len(), 2 * 17 * 2 * 3);
    // Line 1 address 0x80
    assert_eq!(shown[0], 0x88);
    // 'H' = 0x48 sent in character mode
    assert_eq!(shown[6], 0x49);
    assert_eq!(shown[9], 0x89);
    // Line 2 address 0xC0
    assert_eq!(shown[17 * 6], 0xC8);
}

#[test]
fn test_lcd_release_turns_backlight_off() {
    let mut lcd = Hd44780Lcd::with_pulse_delay(Vec::new(), 16, 2, Duration::ZERO).unwrap();
    lcd.release().unwrap();
    let bytes = lcd.into_inner();
    assert_eq!(bytes.last(), Some(&0x00));
}

fn recording_driver(hold: Duration) -> (AlertDriver, HardwareLog) {
    let log = HardwareLog::new();
    let driver = AlertDriver::new(
        Box::new(log.pin()),
        Some(Box::new(log.display(16))),
        hold,
    );
    (driver, log)
}

#[tokio::test(start_paused = true)]
async fn test_alert_holds_then_silences() {
    let (mut driver, log) = recording_driver(Duration::from_secs(5));
    let token = CancellationToken::new();

    let start = tokio::time::Instant::now();
    let outcome = driver.alert("Alice", &token).await;

    assert_eq!(outcome, AlertOutcome::Completed);
    assert!(start.elapsed() >= Duration::from_secs(5));
    assert_eq!(
        log.events(),
        vec![
            HardwareEvent::Display("CRIMINAL DETECTE".into(), "Alice".into()),
            HardwareEvent::Pin(PinLevel::High),
            HardwareEvent::Pin(PinLevel::Low),
            HardwareEvent::DisplayCleared,
        ]
    );
}

#[tokio::test(start_paused = true)]
async fn test_alert_cut_short_by_cancellation() {
    let (mut driver, log) = recording_driver(Duration::from_secs(5));
    let token = CancellationToken::new();

    let canceller = token.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_secs(1)).await;
        canceller.cancel();
    });

    let start = tokio::time::Instant::now();
    let outcome = driver.alert("Bob", &token).await;

    assert_eq!(outcome, AlertOutcome::Interrupted);
    assert!(start.elapsed() < Duration::from_secs(5));
    assert_eq!(log.count(&HardwareEvent::Pin(PinLevel::Low)), 1);
}

#[tokio::test(start_paused = true)]
async fn test_release_once() {
    let (mut driver, log) = recording_driver(Duration::from_secs(1));

    assert!(driver.release());
    assert!(!driver.release());
    drop(driver);

    assert_eq!(log.count(&HardwareEvent::PinReleased), 1);
    assert_eq!(log.count(&HardwareEvent::DisplayReleased), 1);
}

#[tokio::test(start_paused = true)]
async fn test_alert_after_release_is_skipped() {
    let (mut driver, log) = recording_driver(Duration::from_secs(1));
    driver.release();

    let outcome = driver.alert("Carol", &CancellationToken::new()).await;
    assert_eq!(outcome, AlertOutcome::Skipped);
    assert_eq!(log.count(&HardwareEvent::Pin(PinLevel::High)), 0);
}

#[test]
fn test_status_without_display() {
    let log = HardwareLog::new();
    let mut driver = AlertDriver::new(Box::new(log.pin()), None, Duration::from_secs(1));
    assert!(!driver.has_display());
    driver.status("System Ready", "Monitoring...");
    assert!(log.messages().is_empty());
}

#[test]
fn test_scripted_sensor_repeats_last_reading() {
    let mut sensor = ScriptedMotionSensor::new([false, true]);
    let polls = sensor.poll_counter();

    assert!(!sensor.motion_detected().unwrap());
    assert!(sensor.motion_detected().unwrap());
    assert!(sensor.motion_detected().unwrap());
    assert_eq!(polls.load(Ordering::SeqCst), 3);
}

#[test]
fn test_manual_trigger_is_one_shot() {
    let trigger = ManualTrigger::new();
    let mut sensor =
        TriggeredMotionSensor::new(Box::new(ScriptedMotionSensor::new([false])), trigger.clone());

    assert!(!sensor.motion_detected().unwrap());
    trigger.pulse();
    assert!(sensor.motion_detected().unwrap());
    assert!(!sensor.motion_detected().unwrap());
}

#[test]
fn test_mock_mode_selects_console_peripherals() {
    let defaults = FacewatchConfig::default();
    let alert = AlertConfig {
        hardware: HardwareMode::Mock,
        ..defaults.alert
    };
    let display = DisplayConfig {
        enabled: false,
        ..defaults.display
    };

    let mut peripherals = select_peripherals(&alert, &display);
    assert!(!peripherals.real_hardware);
    assert!(peripherals.display.is_none());
    assert!(peripherals.pin.describe().contains("console"));
    assert!(peripherals.sensor.motion_detected().unwrap());
}
