//! Motion JPEG stream splitting
//!
//! A `multipart/x-mixed-replace` camera feed is an endless HTTP body of
//! JPEG parts separated by boundary lines and part headers. Images are cut
//! out on their start (FF D8) and end (FF D9) markers, so boundary names and
//! part headers never need to be parsed.

use std::io::{self, Read};

const SOI: [u8; 2] = [0xFF, 0xD8];
const EOI: [u8; 2] = [0xFF, 0xD9];

const READ_CHUNK: usize = 16 * 1024;

/// Largest image accepted before the stream is considered corrupt
pub const MAX_IMAGE_BYTES: usize = 16 * 1024 * 1024;

/// Yields complete JPEG images from a byte stream
pub struct JpegSplitter<R> {
    reader: R,
    buffer: Vec<u8>,
    /// Offset the end-marker search resumes from
    scanned: usize,
    max_image_bytes: usize,
}

impl<R: Read> JpegSplitter<R> {
    pub fn new(reader: R) -> Self {
        Self::with_limit(reader, MAX_IMAGE_BYTES)
    }

    pub fn with_limit(reader: R, max_image_bytes: usize) -> Self {
        Self {
            reader,
            buffer: Vec::new(),
            scanned: 0,
            max_image_bytes,
        }
    }

    /// Next complete image, or `None` once the stream ends.
    /// A partial image at the end of the stream is dropped.
    pub fn next_image(&mut self) -> io::Result<Option<Vec<u8>>> {
        loop {
            if let Some(image) = self.take_image()? {
                return Ok(Some(image));
            }
            if !self.fill()? {
                return Ok(None);
            }
        }
    }

    fn take_image(&mut self) -> io::Result<Option<Vec<u8>>> {
        match find(&self.buffer, &SOI, 0) {
            Some(0) => {}
            Some(start) => {
                self.buffer.drain(..start);
                self.scanned = 0;
            }
            None => {
                // A trailing FF may be the first half of a start marker
                let keep = usize::from(self.buffer.last() == Some(&0xFF));
                let cut = self.buffer.len() - keep;
                self.buffer.drain(..cut);
                self.scanned = 0;
                return Ok(None);
            }
        }

        let from = self.scanned.max(SOI.len());
        if let Some(end) = find(&self.buffer, &EOI, from) {
            let image = self.buffer.drain(..end + EOI.len()).collect();
            self.scanned = 0;
            return Ok(Some(image));
        }

        if self.buffer.len() > self.max_image_bytes {
            return Err(io::Error::new(
                io::ErrorKind::InvalidData,
                format!("no JPEG end marker within {} bytes", self.max_image_bytes),
            ));
        }
        self.scanned = self.buffer.len().saturating_sub(1);
        Ok(None)
    }

    /// Read one more chunk; `false` at end of stream
    fn fill(&mut self) -> io::Result<bool> {
        let start = self.buffer.len();
        self.buffer.resize(start + READ_CHUNK, 0);
        let read = loop {
            match self.reader.read(&mut self.buffer[start..]) {
                Ok(read) => break read,
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) => {
                    self.buffer.truncate(start);
                    return Err(e);
                }
            }
        };
        self.buffer.truncate(start + read);
        Ok(read > 0)
    }
}

fn find(haystack: &[u8], marker: &[u8], from: usize) -> Option<usize> {
    haystack
        .get(from..)?
        .windows(marker.len())
        .position(|window| window == marker)
        .map(|offset| offset + from)
}
