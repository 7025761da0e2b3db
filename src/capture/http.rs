//! HTTP camera sources
//!
//! The response's content type picks the mode. `multipart/*` bodies are
//! read as an endless MJPEG stream; anything else is treated as a single
//! still image and the URL is polled again for each frame.

use anyhow::{anyhow, bail, Context, Result};
use image::imageops::FilterType;
use reqwest::blocking::{Client, Response};
use reqwest::header::CONTENT_TYPE;
use std::io::Read;
use std::time::Duration;
use tracing::{debug, info, warn};

use super::mjpeg::JpegSplitter;
use super::{Frame, FrameSource, SourceOpener};
use crate::config::CameraConfig;

/// Consecutive undecodable stream parts tolerated before giving up
const MAX_CORRUPT_PARTS: usize = 10;

/// Opens HTTP cameras as [`MjpegStreamSource`] or [`HttpSnapshotSource`]
#[derive(Debug, Clone)]
pub struct HttpCameraOpener {
    /// Connect timeout, and the longest a single read may wait for data
    pub timeout: Duration,
    /// Size frames are scaled to, if any
    pub frame_size: Option<(u32, u32)>,
}

impl HttpCameraOpener {
    pub fn from_config(config: &CameraConfig) -> Self {
        let frame_size = (config.frame_width > 0 && config.frame_height > 0)
            .then_some((config.frame_width, config.frame_height));
        Self {
            timeout: config.connection_timeout(),
            frame_size,
        }
    }
}

impl SourceOpener for HttpCameraOpener {
    fn open(&self, url: &str) -> Result<Box<dyn FrameSource>> {
        if !(url.starts_with("http://") || url.starts_with("https://")) {
            bail!("only http(s) cameras are supported by this opener");
        }

        // The blocking client applies `timeout` to each read of the body, so
        // an endless stream stays open as long as data keeps arriving.
        // Cameras are reached directly, never through a configured proxy.
        let client = Client::builder()
            .no_proxy()
            .connect_timeout(self.timeout)
            .timeout(self.timeout)
            .build()
            .context("Failed to build HTTP client")?;

        let response = request(&client, url)?;
        let content_type = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|value| value.to_str().ok())
            .unwrap_or_default()
            .to_ascii_lowercase();

        // Reading one frame up front proves the camera is usable
        if content_type.starts_with("multipart/") {
            let mut source = MjpegStreamSource::new(response, self.frame_size);
            let first = source
                .read_frame()?
                .ok_or_else(|| anyhow!("Camera at {} closed the stream before the first frame", url))?;
            source.pending = Some(first);
            info!("Opened MJPEG stream {} ({})", url, content_type);
            Ok(Box::new(source))
        } else {
            let bytes = response.bytes().context("Failed to read snapshot")?;
            let first = decode_frame(&bytes, self.frame_size)
                .with_context(|| format!("Camera at {} did not return a frame", url))?;
            info!("Opened HTTP snapshot source {}", url);
            Ok(Box::new(HttpSnapshotSource {
                client,
                url: url.to_string(),
                frame_size: self.frame_size,
                pending: Some(first),
            }))
        }
    }
}

fn request(client: &Client, url: &str) -> Result<Response> {
    let response = client
        .get(url)
        .send()
        .with_context(|| format!("Camera at {} is unreachable", url))?;
    response
        .error_for_status()
        .with_context(|| format!("Camera at {} refused the request", url))
}

fn decode_frame(bytes: &[u8], frame_size: Option<(u32, u32)>) -> Result<Frame> {
    let mut image = image::load_from_memory(bytes).context("Not a decodable image")?;
    if let Some((width, height)) = frame_size {
        if image.width() != width || image.height() != height {
            image = image.resize_exact(width, height, FilterType::Triangle);
        }
    }
    Ok(Frame::from_image(image))
}

/// Frames cut from a `multipart/x-mixed-replace` MJPEG body
pub struct MjpegStreamSource<R> {
    images: JpegSplitter<R>,
    frame_size: Option<(u32, u32)>,
    pending: Option<Frame>,
}

impl<R: Read> MjpegStreamSource<R> {
    pub fn new(reader: R, frame_size: Option<(u32, u32)>) -> Self {
        Self {
            images: JpegSplitter::new(reader),
            frame_size,
            pending: None,
        }
    }

    fn read_frame(&mut self) -> Result<Option<Frame>> {
        let mut corrupt = 0;
        loop {
            let Some(bytes) = self.images.next_image().context("Camera stream read failed")? else {
                return Ok(None);
            };
            match decode_frame(&bytes, self.frame_size) {
                Ok(frame) => return Ok(Some(frame)),
                Err(e) => {
                    corrupt += 1;
                    warn!("Skipping undecodable stream part ({} bytes): {:#}", bytes.len(), e);
                    if corrupt >= MAX_CORRUPT_PARTS {
                        bail!("{} consecutive stream parts failed to decode", corrupt);
                    }
                }
            }
        }
    }
}

impl<R: Read + Send> FrameSource for MjpegStreamSource<R> {
    fn next_frame(&mut self) -> Result<Option<Frame>> {
        if let Some(frame) = self.pending.take() {
            return Ok(Some(frame));
        }
        self.read_frame()
    }
}

/// Polls a camera URL that answers each request with one still image
pub struct HttpSnapshotSource {
    client: Client,
    url: String,
    frame_size: Option<(u32, u32)>,
    pending: Option<Frame>,
}

impl HttpSnapshotSource {
    fn fetch(&self) -> Result<Frame> {
        let bytes = request(&self.client, &self.url)?.bytes()?;
        let frame = decode_frame(&bytes, self.frame_size)?;
        debug!("Fetched {}x{} snapshot", frame.width, frame.height);
        Ok(frame)
    }
}

impl FrameSource for HttpSnapshotSource {
    fn next_frame(&mut self) -> Result<Option<Frame>> {
        if let Some(frame) = self.pending.take() {
            return Ok(Some(frame));
        }
        self.fetch().map(Some)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{DynamicImage, ImageFormat, Rgb, RgbImage};
    use std::io::{Cursor, Write};
    use std::net::{TcpListener, TcpStream};
    use std::thread;

    const STREAM_HEADER: &[u8] = b"HTTP/1.1 200 OK\r\n\
        Content-Type: multipart/x-mixed-replace; boundary=frame\r\n\
        Connection: close\r\n\r\n";

    fn jpeg(width: u32, height: u32) -> Vec<u8> {
        let image = RgbImage::from_pixel(width, height, Rgb([90, 120, 200]));
        let mut bytes = Vec::new();
        DynamicImage::ImageRgb8(image)
            .write_to(&mut Cursor::new(&mut bytes), ImageFormat::Jpeg)
            .unwrap();
        bytes
    }

    fn part(image: &[u8]) -> Vec<u8> {
        let mut part = format!(
            "--frame\r\nContent-Type: image/jpeg\r\nContent-Length: {}\r\n\r\n",
            image.len()
        )
        .into_bytes();
        part.extend_from_slice(image);
        part.extend_from_slice(b"\r\n");
        part
    }

    fn snapshot_response(image: &[u8]) -> Vec<u8> {
        let mut response = format!(
            "HTTP/1.1 200 OK\r\nContent-Type: image/jpeg\r\nContent-Length: {}\r\nConnection: close\r\n\r\n",
            image.len()
        )
        .into_bytes();
        response.extend_from_slice(image);
        response
    }

    fn read_request(stream: &mut TcpStream) {
        let mut request = Vec::new();
        let mut byte = [0u8; 1];
        while !request.ends_with(b"\r\n\r\n") {
            if stream.read(&mut byte).unwrap() == 0 {
                break;
            }
            request.push(byte[0]);
        }
    }

    fn local_listener() -> (TcpListener, String) {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let url = format!("http://{}/video_feed", listener.local_addr().unwrap());
        (listener, url)
    }

    /// Answers one connection per response, in order
    fn serve(responses: Vec<Vec<u8>>) -> (String, thread::JoinHandle<()>) {
        let (listener, url) = local_listener();
        let handle = thread::spawn(move || {
            for response in responses {
                let (mut stream, _) = listener.accept().unwrap();
                read_request(&mut stream);
                stream.write_all(&response).unwrap();
            }
        });
        (url, handle)
    }

    fn opener() -> HttpCameraOpener {
        HttpCameraOpener {
            timeout: Duration::from_secs(5),
            frame_size: None,
        }
    }

    #[test]
    fn test_opener_rejects_rtsp() {
        let opener = HttpCameraOpener::from_config(&CameraConfig::default());
        assert!(opener.open("rtsp://10.0.0.2:554/stream").is_err());
    }

    #[test]
    fn test_opener_frame_size_from_config() {
        let mut config = CameraConfig::default();
        assert_eq!(HttpCameraOpener::from_config(&config).frame_size, Some((640, 480)));

        config.frame_width = 0;
        assert_eq!(HttpCameraOpener::from_config(&config).frame_size, None);
    }

    #[test]
    fn test_mjpeg_stream_opens_before_the_body_ends() {
        let (listener, url) = local_listener();
        let (more_tx, more_rx) = crossbeam_channel::bounded::<()>(1);
        let server = thread::spawn(move || {
            let (mut stream, _) = listener.accept().unwrap();
            read_request(&mut stream);
            stream.write_all(STREAM_HEADER).unwrap();
            stream.write_all(&part(&jpeg(8, 6))).unwrap();
            stream.flush().unwrap();

            // The rest of the body only follows once the first frame was seen
            more_rx.recv().unwrap();
            stream.write_all(&part(&jpeg(16, 6))).unwrap();
            stream.write_all(&part(&jpeg(24, 6))).unwrap();
        });

        let mut source = opener().open(&url).unwrap();
        more_tx.send(()).unwrap();

        let widths: Vec<u32> = std::iter::from_fn(|| source.next_frame().unwrap())
            .map(|frame| frame.width)
            .collect();
        assert_eq!(widths, vec![8, 16, 24]);
        server.join().unwrap();
    }

    #[test]
    fn test_mjpeg_frames_are_scaled() {
        let mut body = STREAM_HEADER.to_vec();
        body.extend(part(&jpeg(32, 24)));
        let (url, server) = serve(vec![body]);

        let opener = HttpCameraOpener {
            frame_size: Some((16, 12)),
            ..opener()
        };
        let mut source = opener.open(&url).unwrap();
        let frame = source.next_frame().unwrap().unwrap();
        assert_eq!(frame.dimensions(), (16, 12));
        assert!(source.next_frame().unwrap().is_none());
        server.join().unwrap();
    }

    #[test]
    fn test_empty_mjpeg_stream_fails_to_open() {
        let (url, server) = serve(vec![STREAM_HEADER.to_vec()]);
        assert!(opener().open(&url).is_err());
        server.join().unwrap();
    }

    #[test]
    fn test_snapshot_camera_is_polled_per_frame() {
        let (url, server) = serve(vec![
            snapshot_response(&jpeg(8, 6)),
            snapshot_response(&jpeg(12, 6)),
        ]);

        let mut source = opener().open(&url).unwrap();
        assert_eq!(source.next_frame().unwrap().unwrap().width, 8);
        assert_eq!(source.next_frame().unwrap().unwrap().width, 12);
        server.join().unwrap();
    }

    #[test]
    fn test_error_status_fails_to_open() {
        let not_found = b"HTTP/1.1 404 Not Found\r\nContent-Length: 0\r\nConnection: close\r\n\r\n";
        let (url, server) = serve(vec![not_found.to_vec()]);
        assert!(opener().open(&url).is_err());
        server.join().unwrap();
    }

    #[test]
    fn test_corrupt_parts_are_skipped() {
        let mut body = part(&[0xFF, 0xD8, 1, 2, 3, 0xFF, 0xD9]);
        body.extend(part(&jpeg(8, 6)));

        let mut source = MjpegStreamSource::new(Cursor::new(body), None);
        assert_eq!(source.next_frame().unwrap().unwrap().width, 8);
        assert!(source.next_frame().unwrap().is_none());
    }
}
