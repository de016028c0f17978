use crate::config::CameraConfig;
use crate::error::CameraError;
use crate::frame::Frame;
use gstreamer::prelude::*;
use gstreamer::Pipeline;
use gstreamer_app::AppSink;
use gstreamer_video::VideoInfo;
use image::RgbImage;
use std::time::{Duration, SystemTime};
use tracing::{debug, info, trace, warn};

use super::FrameSource;

/// V4L2 camera read through a GStreamer pipeline that converts to packed RGB
pub struct V4l2FrameSource {
    index: u32,
    pipeline: Pipeline,
    appsink: AppSink,
    read_timeout: Duration,
    frame_counter: u64,
    released: bool,
}

impl V4l2FrameSource {
    pub fn open(index: u32, config: &CameraConfig) -> Result<Self, CameraError> {
        let device = format!("/dev/video{}", index);
        let open_error = |details: String| CameraError::DeviceOpen {
            device: device.clone(),
            details,
        };

        gstreamer::init().map_err(|e| open_error(format!("GStreamer init failed: {}", e)))?;

        let pipeline_desc = Self::build_pipeline_string(&device, config);
        debug!("Creating GStreamer pipeline: {}", pipeline_desc);

        let pipeline = gstreamer::parse::launch(&pipeline_desc)
            .map_err(|e| open_error(format!("failed to create pipeline: {}", e)))?
            .downcast::<Pipeline>()
            .map_err(|_| open_error("failed to downcast to Pipeline".to_string()))?;

        let appsink = pipeline
            .by_name("sink")
            .ok_or_else(|| open_error("pipeline has no appsink".to_string()))?
            .downcast::<AppSink>()
            .map_err(|_| open_error("sink element is not an AppSink".to_string()))?;

        if let Err(e) = pipeline.set_state(gstreamer::State::Playing) {
            let _ = pipeline.set_state(gstreamer::State::Null);
            return Err(open_error(format!("failed to start pipeline: {}", e)));
        }

        // v4l2src reports a missing device while prerolling
        let (result, _, _) = pipeline.state(gstreamer::ClockTime::from_seconds(5));
        if let Err(e) = result {
            let _ = pipeline.set_state(gstreamer::State::Null);
            return Err(open_error(format!("pipeline did not start: {}", e)));
        }

        info!(
            "Camera {} streaming at {}x{} @ {}fps",
            device, config.resolution.0, config.resolution.1, config.fps
        );

        Ok(Self {
            index,
            pipeline,
            appsink,
            read_timeout: Duration::from_millis(config.read_timeout_ms),
            frame_counter: 0,
            released: false,
        })
    }

    fn build_pipeline_string(device: &str, config: &CameraConfig) -> String {
        let (width, height) = config.resolution;
        format!(
            "v4l2src device={} ! videoconvert ! videoscale ! \
             video/x-raw,format=RGB,width={},height={} ! \
             queue max-size-buffers=2 leaky=downstream ! \
             appsink name=sink sync=false max-buffers=1 drop=true emit-signals=false",
            device, width, height
        )
    }

    fn sample_to_frame(&mut self, sample: gstreamer::Sample) -> Result<Frame, CameraError> {
        let read_error = |details: String| CameraError::ReadFailed { details };

        let buffer = sample
            .buffer()
            .ok_or_else(|| read_error("no buffer in sample".to_string()))?;
        let caps = sample
            .caps()
            .ok_or_else(|| read_error("no caps in sample".to_string()))?;
        let video_info = VideoInfo::from_caps(caps)
            .map_err(|e| read_error(format!("failed to get video info: {}", e)))?;

        let width = video_info.width();
        let height = video_info.height();
        let stride = video_info.stride()[0] as usize;
        let row_bytes = width as usize * 3;

        let map = buffer
            .map_readable()
            .map_err(|e| read_error(format!("failed to map buffer: {}", e)))?;
        let data = map.as_slice();

        let mut pixels = Vec::with_capacity(row_bytes * height as usize);
        for row in 0..height as usize {
            let start = row * stride;
            let line = data
                .get(start..start + row_bytes)
                .ok_or_else(|| read_error("short frame buffer".to_string()))?;
            pixels.extend_from_slice(line);
        }

        let image = RgbImage::from_raw(width, height, pixels)
            .ok_or_else(|| read_error("frame size mismatch".to_string()))?;

        let frame_id = self.frame_counter;
        self.frame_counter += 1;
        trace!("Captured frame {} ({}x{})", frame_id, width, height);

        Ok(Frame::new(frame_id, SystemTime::now(), image))
    }
}

impl FrameSource for V4l2FrameSource {
    fn read_frame(&mut self) -> Result<Frame, CameraError> {
        if self.released {
            return Err(CameraError::Released);
        }

        let timeout = gstreamer::ClockTime::from_mseconds(self.read_timeout.as_millis() as u64);
        match self.appsink.try_pull_sample(timeout) {
            Some(sample) => self.sample_to_frame(sample),
            None if self.appsink.is_eos() => Err(CameraError::ReadFailed {
                details: "end of stream".to_string(),
            }),
            None => Err(CameraError::FrameTimeout {
                timeout: self.read_timeout,
            }),
        }
    }

    fn release(&mut self) {
        if self.released {
            return;
        }
        self.released = true;

        if let Err(e) = self.pipeline.set_state(gstreamer::State::Null) {
            warn!("Failed to stop camera pipeline: {}", e);
        }
        info!("Camera /dev/video{} released", self.index);
    }

    fn describe(&self) -> String {
        format!("/dev/video{} via GStreamer", self.index)
    }
}

impl Drop for V4l2FrameSource {
    fn drop(&mut self) {
        self.release();
    }
}
