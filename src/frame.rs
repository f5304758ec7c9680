//! Decoded video frames.
//!
//! - `Frame`: one decoded RGB frame pulled from the display surface for a single tick.
//! - `Dimensions`: decoded pixel size reported by the surface.
//!
//! Frames are ephemeral. The detection loop pulls one per tick, hands a shared
//! reference to the detector and drops it before the next tick. Pixel bytes are
//! wiped on drop.

use sha2::{Digest, Sha256};
use zeroize::Zeroize;

/// Decoded pixel dimensions of a surface or frame.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Dimensions {
    pub width: u32,
    pub height: u32,
}

impl Dimensions {
    pub const ZERO: Dimensions = Dimensions {
        width: 0,
        height: 0,
    };

    pub fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    /// True once a decoded frame of non-zero size is available.
    pub fn is_valid(&self) -> bool {
        self.width > 0 && self.height > 0
    }
}

impl std::fmt::Display for Dimensions {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}x{}", self.width, self.height)
    }
}

/// One decoded RGB frame.
///
/// There is no `Clone`: a frame belongs to the tick that pulled it.
pub struct Frame {
    /// Packed RGB24 pixel data, row-major.
    pixels: Vec<u8>,
    pub width: u32,
    pub height: u32,
    /// Per-session monotonic frame counter.
    pub sequence: u64,
}

impl Frame {
    pub fn new(pixels: Vec<u8>, width: u32, height: u32, sequence: u64) -> Self {
        Self {
            pixels,
            width,
            height,
            sequence,
        }
    }

    /// Solid-color frame, mostly for tests.
    pub fn filled(width: u32, height: u32, value: u8, sequence: u64) -> Self {
        let len = (width as usize) * (height as usize) * 3;
        Self::new(vec![value; len], width, height, sequence)
    }

    pub fn dimensions(&self) -> Dimensions {
        Dimensions::new(self.width, self.height)
    }

    /// Read-only pixel access for detectors.
    pub fn pixels(&self) -> &[u8] {
        &self.pixels
    }

    pub fn byte_len(&self) -> usize {
        self.pixels.len()
    }

    /// Short hex digest of the pixel data for debug logging.
    pub fn digest_hex(&self) -> String {
        let digest = Sha256::digest(&self.pixels);
        hex::encode(&digest[..6])
    }
}

impl std::fmt::Debug for Frame {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Frame")
            .field("width", &self.width)
            .field("height", &self.height)
            .field("sequence", &self.sequence)
            .field("bytes", &self.pixels.len())
            .finish()
    }
}

impl Drop for Frame {
    fn drop(&mut self) {
        self.pixels.zeroize();
    }
}
