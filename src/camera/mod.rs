mod replay;
mod source;
#[cfg(all(feature = "camera", target_os = "linux"))]
mod v4l2;

pub use replay::ReplayFrameSource;
pub use source::{open_first_available, open_from_config, FrameSource};
#[cfg(all(feature = "camera", target_os = "linux"))]
pub use v4l2::V4l2FrameSource;
