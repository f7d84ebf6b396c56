//! PNG bridge between in-memory images and the tools' stdio.
//!
//! cwebp reads PNG from stdin and dwebp writes PNG to stdout, so in-memory
//! images cross the process boundary as PNG. Encoding stores the pixels
//! uncompressed and unfiltered: the bytes only travel through a pipe.

use crate::error::{Error, Result};
use crate::types::ImageRef;
use alloc::vec::Vec;
use image::codecs::png::{CompressionType, FilterType, PngEncoder};
use image::{ExtendedColorType, ImageEncoder, ImageFormat};
use imgref::{ImgRef, ImgVec};
use rgb::RGBA8;
use whereat::*;

/// Encode an in-memory image as PNG.
///
/// RGB(A) channel order is preserved; BGR(A) inputs are swizzled to RGB(A).
/// Alpha is kept only for formats that carry it.
///
/// # Example
///
/// ```rust
/// use imgref::ImgVec;
/// use rgb::RGBA8;
///
/// let img = ImgVec::new(vec![RGBA8::new(255, 0, 0, 255); 4], 2, 2);
/// let png = webpbin::bridge::to_png(img.as_ref().into())?;
/// let back = webpbin::bridge::from_png(&png)?;
/// assert_eq!((back.width(), back.height()), (2, 2));
/// # Ok::<(), whereat::At<webpbin::Error>>(())
/// ```
pub fn to_png(image: ImageRef<'_>) -> Result<Vec<u8>> {
    let width = dimension(image.width())?;
    let height = dimension(image.height())?;

    let format = image.format();
    let color = if format.has_alpha() {
        ExtendedColorType::Rgba8
    } else {
        ExtendedColorType::Rgb8
    };
    let capacity = image.width() * image.height() * format.bytes_per_pixel();
    let raw = match image {
        ImageRef::Rgba(img) => collect(img, capacity, |p| [p.r, p.g, p.b, p.a]),
        ImageRef::Bgra(img) => collect(img, capacity, |p| [p.r, p.g, p.b, p.a]),
        ImageRef::Rgb(img) => collect(img, capacity, |p| [p.r, p.g, p.b]),
        ImageRef::Bgr(img) => collect(img, capacity, |p| [p.r, p.g, p.b]),
    };

    let mut png = Vec::new();
    PngEncoder::new_with_quality(&mut png, CompressionType::Uncompressed, FilterType::NoFilter)
        .write_image(&raw, width, height, color)
        .map_err(|e| at!(Error::Codec(alloc::format!("PNG encode failed: {}", e))))?;
    Ok(png)
}

/// Decode a PNG byte stream into an RGBA image.
pub fn from_png(data: &[u8]) -> Result<ImgVec<RGBA8>> {
    let decoded = image::load_from_memory_with_format(data, ImageFormat::Png)
        .map_err(|e| at!(Error::Codec(alloc::format!("PNG decode failed: {}", e))))?
        .into_rgba8();

    let width = decoded.width() as usize;
    let height = decoded.height() as usize;
    let pixels: Vec<RGBA8> = decoded
        .into_raw()
        .chunks_exact(4)
        .map(|c| RGBA8::new(c[0], c[1], c[2], c[3]))
        .collect();

    Ok(ImgVec::new(pixels, width, height))
}

fn dimension(value: usize) -> Result<u32> {
    if value == 0 {
        return Err(at!(Error::Codec("image has zero width or height".into())));
    }
    u32::try_from(value).map_err(|_| {
        at!(Error::Codec(alloc::format!(
            "image dimension {} exceeds PNG limits",
            value
        )))
    })
}

/// Flatten rows (honoring stride) into packed channel bytes.
fn collect<P: Copy, const N: usize>(
    img: ImgRef<'_, P>,
    capacity: usize,
    channels: impl Fn(P) -> [u8; N],
) -> Vec<u8> {
    let mut out = Vec::with_capacity(capacity);
    for px in img.pixels() {
        out.extend_from_slice(&channels(px));
    }
    out
}
