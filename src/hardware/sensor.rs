use crate::error::HardwareError;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use tracing::{debug, info};

/// Binary motion indicator polled by the detection loop
pub trait MotionSensor: Send {
    fn motion_detected(&mut self) -> Result<bool, HardwareError>;

    fn release(&mut self) -> Result<(), HardwareError>;
}

/// Motion source for benches without a PIR sensor: always reports motion
pub struct ContinuousMotionSensor;

impl ContinuousMotionSensor {
    pub fn new() -> Self {
        info!("No motion sensor; treating the scene as always in motion");
        Self
    }
}

impl Default for ContinuousMotionSensor {
    fn default() -> Self {
        Self::new()
    }
}

impl MotionSensor for ContinuousMotionSensor {
    fn motion_detected(&mut self) -> Result<bool, HardwareError> {
        Ok(true)
    }

    fn release(&mut self) -> Result<(), HardwareError> {
        Ok(())
    }
}

/// One-shot motion pulse raised from outside the loop (keyboard)
#[derive(Clone, Default)]
pub struct ManualTrigger {
    pending: Arc<AtomicBool>,
}

impl ManualTrigger {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn pulse(&self) {
        self.pending.store(true, Ordering::SeqCst);
    }

    /// Consume a pending pulse
    pub fn take(&self) -> bool {
        self.pending.swap(false, Ordering::SeqCst)
    }
}

/// A sensor OR-ed with a manual trigger
pub struct TriggeredMotionSensor {
    inner: Box<dyn MotionSensor>,
    trigger: ManualTrigger,
}

impl TriggeredMotionSensor {
    pub fn new(inner: Box<dyn MotionSensor>, trigger: ManualTrigger) -> Self {
        Self { inner, trigger }
    }
}

impl MotionSensor for TriggeredMotionSensor {
    fn motion_detected(&mut self) -> Result<bool, HardwareError> {
        if self.trigger.take() {
            debug!("Manual motion trigger");
            return Ok(true);
        }
        self.inner.motion_detected()
    }

    fn release(&mut self) -> Result<(), HardwareError> {
        self.inner.release()
    }
}

/// Sensor that replays a fixed script of readings, then repeats the last
/// one. Counts every poll.
pub struct ScriptedMotionSensor {
    script: VecDeque<bool>,
    last: bool,
    polls: Arc<AtomicUsize>,
}

impl ScriptedMotionSensor {
    pub fn new<I: IntoIterator<Item = bool>>(readings: I) -> Self {
        Self {
            script: readings.into_iter().collect(),
            last: false,
            polls: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Handle for reading the poll count after the sensor has been moved
    pub fn poll_counter(&self) -> Arc<AtomicUsize> {
        Arc::clone(&self.polls)
    }
}

impl MotionSensor for ScriptedMotionSensor {
    fn motion_detected(&mut self) -> Result<bool, HardwareError> {
        self.polls.fetch_add(1, Ordering::SeqCst);
        if let Some(reading) = self.script.pop_front() {
            self.last = reading;
        }
        Ok(self.last)
    }

    fn release(&mut self) -> Result<(), HardwareError> {
        Ok(())
    }
}

