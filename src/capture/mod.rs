//! Camera Capture Layer
//!
//! Camera sources are external collaborators: the core only needs something
//! that can be opened from a URL and yields frames until the stream ends.
//! [`HttpCameraOpener`] handles HTTP cameras, both MJPEG streams and
//! cameras that serve one still image per request. Anything else plugs in
//! through [`SourceOpener`].

pub mod frame;
pub mod http;
pub mod mjpeg;

use anyhow::Result;

use crate::error::MonitorError;

pub use frame::Frame;
pub use http::{HttpCameraOpener, HttpSnapshotSource, MjpegStreamSource};
pub use mjpeg::JpegSplitter;

/// URL schemes accepted as camera sources
pub const SUPPORTED_SCHEMES: &[&str] = &["http://", "https://", "rtsp://"];

/// A stream of frames from one camera
///
/// `Ok(None)` signals end of stream. Dropping the source releases it.
pub trait FrameSource: Send {
    fn next_frame(&mut self) -> Result<Option<Frame>>;
}

/// Opens frame sources from URLs
pub trait SourceOpener: Send + Sync {
    fn open(&self, url: &str) -> Result<Box<dyn FrameSource>>;
}

/// Check that a URL names a camera stream before anything tries to open it
pub fn validate_source_url(url: &str) -> Result<(), MonitorError> {
    let url = url.trim();
    let has_host = SUPPORTED_SCHEMES
        .iter()
        .filter_map(|scheme| url.strip_prefix(scheme))
        .any(|rest| !rest.is_empty());
    if has_host {
        Ok(())
    } else {
        Err(MonitorError::InvalidSourceUrl(url.to_string()))
    }
}
