//! Core types shared by the encode and decode controllers.

use imgref::ImgRef;
use rgb::alt::{BGR8, BGRA8};
use rgb::{RGB8, RGBA8};
use std::io::Write;
use std::path::PathBuf;

/// Pixel format of an in-memory image handed to the encoder.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[non_exhaustive]
pub enum PixelFormat {
    /// RGBA - 4 bytes per pixel (red, green, blue, alpha)
    Rgba,
    /// BGRA - 4 bytes per pixel (blue, green, red, alpha) - Windows/GPU native
    Bgra,
    /// RGB - 3 bytes per pixel (red, green, blue)
    Rgb,
    /// BGR - 3 bytes per pixel (blue, green, red) - OpenCV native
    Bgr,
}

impl PixelFormat {
    /// Bytes per pixel for this format.
    #[must_use]
    pub const fn bytes_per_pixel(self) -> usize {
        match self {
            PixelFormat::Rgba | PixelFormat::Bgra => 4,
            PixelFormat::Rgb | PixelFormat::Bgr => 3,
        }
    }

    /// Whether this format has an alpha channel.
    #[must_use]
    pub const fn has_alpha(self) -> bool {
        matches!(self, PixelFormat::Rgba | PixelFormat::Bgra)
    }
}

/// Marker trait for pixel types that can be fed to the encoder.
///
/// # Implemented Types
///
/// - [`RGB8`] - 3-channel RGB
/// - [`RGBA8`] - 4-channel RGBA
/// - [`BGR8`] - 3-channel BGR (Windows/OpenCV)
/// - [`BGRA8`] - 4-channel BGRA (Windows/GPU native)
pub trait Pixel: Copy + 'static + private::Sealed {
    /// The pixel format corresponding to this type.
    const FORMAT: PixelFormat;

    /// Wrap a borrowed image of this pixel type.
    fn image_ref(img: ImgRef<'_, Self>) -> ImageRef<'_>;
}

impl Pixel for RGBA8 {
    const FORMAT: PixelFormat = PixelFormat::Rgba;

    fn image_ref(img: ImgRef<'_, Self>) -> ImageRef<'_> {
        ImageRef::Rgba(img)
    }
}

impl Pixel for BGRA8 {
    const FORMAT: PixelFormat = PixelFormat::Bgra;

    fn image_ref(img: ImgRef<'_, Self>) -> ImageRef<'_> {
        ImageRef::Bgra(img)
    }
}

impl Pixel for RGB8 {
    const FORMAT: PixelFormat = PixelFormat::Rgb;

    fn image_ref(img: ImgRef<'_, Self>) -> ImageRef<'_> {
        ImageRef::Rgb(img)
    }
}

impl Pixel for BGR8 {
    const FORMAT: PixelFormat = PixelFormat::Bgr;

    fn image_ref(img: ImgRef<'_, Self>) -> ImageRef<'_> {
        ImageRef::Bgr(img)
    }
}

mod private {
    use super::*;

    pub trait Sealed {}
    impl Sealed for RGBA8 {}
    impl Sealed for BGRA8 {}
    impl Sealed for RGB8 {}
    impl Sealed for BGR8 {}
}

/// A borrowed in-memory image in any supported pixel format.
#[derive(Debug, Clone, Copy)]
pub enum ImageRef<'a> {
    /// RGBA pixels.
    Rgba(ImgRef<'a, RGBA8>),
    /// BGRA pixels.
    Bgra(ImgRef<'a, BGRA8>),
    /// RGB pixels.
    Rgb(ImgRef<'a, RGB8>),
    /// BGR pixels.
    Bgr(ImgRef<'a, BGR8>),
}

impl ImageRef<'_> {
    /// Image width in pixels.
    #[must_use]
    pub fn width(&self) -> usize {
        match self {
            ImageRef::Rgba(img) => img.width(),
            ImageRef::Bgra(img) => img.width(),
            ImageRef::Rgb(img) => img.width(),
            ImageRef::Bgr(img) => img.width(),
        }
    }

    /// Image height in pixels.
    #[must_use]
    pub fn height(&self) -> usize {
        match self {
            ImageRef::Rgba(img) => img.height(),
            ImageRef::Bgra(img) => img.height(),
            ImageRef::Rgb(img) => img.height(),
            ImageRef::Bgr(img) => img.height(),
        }
    }

    /// Pixel format of the wrapped image.
    #[must_use]
    pub fn format(&self) -> PixelFormat {
        match self {
            ImageRef::Rgba(_) => RGBA8::FORMAT,
            ImageRef::Bgra(_) => BGRA8::FORMAT,
            ImageRef::Rgb(_) => RGB8::FORMAT,
            ImageRef::Bgr(_) => BGR8::FORMAT,
        }
    }
}

impl<'a, P: Pixel> From<ImgRef<'a, P>> for ImageRef<'a> {
    fn from(img: ImgRef<'a, P>) -> Self {
        P::image_ref(img)
    }
}

/// Where a controller sends the tool's result.
pub(crate) enum Output<'a> {
    File(PathBuf),
    Stream(&'a mut (dyn Write + Send)),
}

impl Output<'_> {
    /// The part of the selection that outlives a run. A borrowed writer is
    /// single-use.
    pub(crate) fn retained(&self) -> Option<Self> {
        match self {
            Output::File(path) => Some(Output::File(path.clone())),
            Output::Stream(_) => None,
        }
    }
}

/// Rectangular region, in source pixels.
///
/// Bounds are checked by the tool, not locally: a region outside the image
/// makes the run fail with the tool's own diagnostic.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CropBox {
    /// Left edge.
    pub x: u32,
    /// Top edge.
    pub y: u32,
    /// Region width.
    pub width: u32,
    /// Region height.
    pub height: u32,
}

impl CropBox {
    /// Create a crop box.
    #[must_use]
    pub const fn new(x: u32, y: u32, width: u32, height: u32) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }
}

/// Content-aware encoding presets understood by `cwebp -preset`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Preset {
    /// Default preset, balanced for general use.
    #[default]
    Default,
    /// Digital picture (portrait, indoor shot).
    Picture,
    /// Outdoor photograph with natural lighting.
    Photo,
    /// Hand or line drawing with high-contrast details.
    Drawing,
    /// Small-sized colorful images like icons or sprites.
    Icon,
    /// Text-heavy images.
    Text,
}

impl Preset {
    /// Name passed on the cwebp command line.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Preset::Default => "default",
            Preset::Picture => "picture",
            Preset::Photo => "photo",
            Preset::Drawing => "drawing",
            Preset::Icon => "icon",
            Preset::Text => "text",
        }
    }
}
