//! # webpbin
//!
//! WebP encoding and decoding by driving the reference `cwebp` and `dwebp`
//! command-line tools from libwebp.
//!
//! The crate provides:
//! - [`CWebP`] and [`DWebP`] controllers exposing the tools' flags as builder
//!   methods, with file, stream, or in-memory image inputs
//! - Locating the binaries in a vendor directory or on `PATH`, with an
//!   optional [`Fetch`] hook to download a pinned libwebp release
//! - Cooperative cancellation through [`Stop`]: a fired signal kills
//!   the running tool
//! - A PNG bridge that moves in-memory images to and from the tools
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use imgref::ImgVec;
//! use rgb::RGBA8;
//!
//! let image = ImgVec::new(vec![RGBA8::new(255, 0, 0, 255); 64 * 64], 64, 64);
//!
//! let mut webp: Vec<u8> = Vec::new();
//! webpbin::encode(&mut webp, image.as_ref())?;
//!
//! let decoded = webpbin::decode(webp.as_slice())?;
//! assert_eq!((decoded.width(), decoded.height()), (64, 64));
//! # Ok::<(), webpbin::At<webpbin::Error>>(())
//! ```
//!
//! ## Controller API
//!
//! ```rust,no_run
//! use webpbin::{CWebP, Preset, ToolConfig};
//!
//! CWebP::new(ToolConfig::from_env())
//!     .preset(Preset::Photo)
//!     .quality(85)
//!     .input_file("photo.png")
//!     .output_file("photo.webp")
//!     .run()?;
//! # Ok::<(), webpbin::At<webpbin::Error>>(())
//! ```
//!
//! ## Environment
//!
//! [`ToolConfig::from_env`] reads `SKIP_DOWNLOAD`, `VENDOR_PATH`, and
//! `LIBWEBP_VERSION`.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

extern crate alloc;

whereat::define_at_crate_info!();

mod args;
mod cancel;
mod config;
mod error;
mod locate;
mod process;
mod types;

pub mod bridge;

#[cfg(feature = "encode")]
mod cwebp;

#[cfg(feature = "decode")]
mod dwebp;

// Re-exports
pub use args::{CommandLine, END_OF_OPTIONS, STDIO_MARKER};
pub use cancel::{CancelToken, Stop, StopReason, Unstoppable};
pub use config::{
    Arch, Fetch, Os, Platform, Source, ToolConfig, ARCHIVE_STRIP, DEFAULT_LIBWEBP_VERSION,
    DEFAULT_VENDOR_DIR, RELEASE_BASE_URL,
};
pub use error::{Error, ExecutionFailure, Result};
pub use locate::{Tool, ToolKind};
pub use process::{execute, Execution, ExecutionRequest};
pub use types::{CropBox, ImageRef, Pixel, PixelFormat, Preset};
pub use whereat::At;

#[cfg(feature = "encode")]
pub use cwebp::{CWebP, EncodeOptions};

#[cfg(feature = "decode")]
pub use dwebp::{DWebP, DecodeOptions};

#[cfg(feature = "decode")]
use imgref::ImgVec;
#[cfg(feature = "decode")]
use rgb::RGBA8;
#[cfg(feature = "decode")]
use std::io::Read;
#[cfg(feature = "encode")]
use std::io::Write;

/// Quality used by [`encode`] and [`Encoder::default`]; matches cwebp's own.
pub const DEFAULT_QUALITY: u32 = 75;

/// Encode `image` to WebP, writing the bytes to `writer`.
///
/// Uses [`ToolConfig::shared`] and quality [`DEFAULT_QUALITY`].
#[cfg(feature = "encode")]
pub fn encode<'a>(
    writer: &'a mut (dyn Write + Send),
    image: impl Into<ImageRef<'a>>,
) -> Result<()> {
    Encoder::default().encode(writer, image)
}

/// [`encode`] with a cancellation signal.
#[cfg(feature = "encode")]
pub fn encode_with_stop<'a>(
    writer: &'a mut (dyn Write + Send),
    image: impl Into<ImageRef<'a>>,
    stop: impl Stop,
) -> Result<()> {
    Encoder::default().encode_with_stop(writer, image, stop)
}

/// Decode a WebP stream into an RGBA image.
///
/// Uses [`ToolConfig::shared`].
#[cfg(feature = "decode")]
pub fn decode(reader: impl Read + Send) -> Result<ImgVec<RGBA8>> {
    decode_with_stop(reader, Unstoppable)
}

/// [`decode`] with a cancellation signal.
#[cfg(feature = "decode")]
pub fn decode_with_stop(reader: impl Read + Send, stop: impl Stop) -> Result<ImgVec<RGBA8>> {
    let mut dwebp = DWebP::default();
    dwebp.input(reader);
    dwebp.run_with_stop(stop)?.ok_or_else(|| {
        whereat::at!(Error::Codec(
            "dwebp produced no image for a captured output".into()
        ))
    })
}

/// Minimal in-memory encoder: one quality setting, shared configuration.
///
/// ```rust,no_run
/// use imgref::ImgVec;
/// use rgb::RGB8;
///
/// let image = ImgVec::new(vec![RGB8::new(0, 128, 255); 16], 4, 4);
/// let mut webp: Vec<u8> = Vec::new();
/// webpbin::Encoder { quality: 90 }.encode(&mut webp, image.as_ref())?;
/// # Ok::<(), webpbin::At<webpbin::Error>>(())
/// ```
#[cfg(feature = "encode")]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Encoder {
    /// 0..=100; values above 100 are clamped.
    pub quality: u32,
}

#[cfg(feature = "encode")]
impl Default for Encoder {
    fn default() -> Self {
        Self {
            quality: DEFAULT_QUALITY,
        }
    }
}

#[cfg(feature = "encode")]
impl Encoder {
    /// Encode `image` into `writer`.
    pub fn encode<'a>(
        &self,
        writer: &'a mut (dyn Write + Send),
        image: impl Into<ImageRef<'a>>,
    ) -> Result<()> {
        self.encode_with_stop(writer, image, Unstoppable)
    }

    /// Encode `image` into `writer`, aborting if `stop` fires.
    pub fn encode_with_stop<'a>(
        &self,
        writer: &'a mut (dyn Write + Send),
        image: impl Into<ImageRef<'a>>,
        stop: impl Stop,
    ) -> Result<()> {
        let mut cwebp = CWebP::default();
        cwebp
            .quality(self.quality)
            .input_image(image)
            .output(writer);
        cwebp.run_with_stop(stop)
    }
}
