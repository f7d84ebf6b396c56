//! `cwebp` controller: encode PNG/JPEG/TIFF files, byte streams, or
//! in-memory images to WebP.

use crate::args::CommandLine;
use crate::bridge;
use crate::cancel::{Stop, Unstoppable};
use crate::config::ToolConfig;
use crate::error::{Error, Result};
use crate::locate::{Tool, ToolKind};
use crate::process;
use crate::types::{CropBox, ImageRef, Output, Preset};
use alloc::boxed::Box;
use alloc::string::String;
use std::io::{Cursor, Read, Write};
use std::path::PathBuf;
use whereat::*;

/// Encoding options passed to cwebp as flags.
///
/// `None`/`false` leaves the tool's own default in place (quality 75,
/// method 4, and so on).
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EncodeOptions {
    /// `-preset`; cwebp requires it before any other option.
    pub preset: Option<Preset>,
    /// `-q`, 0..=100.
    pub quality: Option<u8>,
    /// `-alpha_q`, 0..=100.
    pub alpha_quality: Option<u8>,
    /// `-m`, 0..=6.
    pub method: Option<u8>,
    /// `-lossless`.
    pub lossless: bool,
    /// `-near_lossless`, 0..=100.
    pub near_lossless: Option<u8>,
    /// `-exact`.
    pub exact: bool,
    /// `-sharp_yuv`.
    pub sharp_yuv: bool,
    /// `-size`, target output size in bytes.
    pub target_size: Option<u32>,
    /// `-mt`.
    pub multithreaded: bool,
    /// `-crop`.
    pub crop: Option<CropBox>,
}

impl EncodeOptions {
    fn apply(&self, cmd: &mut CommandLine<'_>) {
        if let Some(preset) = self.preset {
            cmd.option("-preset", &[preset.as_str()]);
        }
        cmd.quality(self.quality);
        if let Some(q) = self.alpha_quality {
            cmd.option("-alpha_q", &[q]);
        }
        if let Some(m) = self.method {
            cmd.option("-m", &[m]);
        }
        cmd.switch("-lossless", self.lossless);
        if let Some(level) = self.near_lossless {
            cmd.option("-near_lossless", &[level]);
        }
        cmd.switch("-exact", self.exact)
            .switch("-sharp_yuv", self.sharp_yuv);
        if let Some(size) = self.target_size {
            cmd.option("-size", &[size]);
        }
        cmd.switch("-mt", self.multithreaded).crop(self.crop);
    }
}

enum EncoderInput<'a> {
    File(PathBuf),
    Stream(Box<dyn Read + Send + 'a>),
    Image(ImageRef<'a>),
}

impl EncoderInput<'_> {
    /// Streams are drained by a run; paths and image borrows can be reused.
    fn retained(&self) -> Option<Self> {
        match self {
            EncoderInput::File(path) => Some(EncoderInput::File(path.clone())),
            EncoderInput::Image(image) => Some(EncoderInput::Image(*image)),
            EncoderInput::Stream(_) => None,
        }
    }
}

/// Wrapper around the `cwebp` command-line encoder.
///
/// Select exactly one input and one output, set options, then [`run`].
/// Each run restores the options to their defaults, whether it succeeds or
/// fails. File paths and in-memory images stay selected for the next run;
/// a reader or writer is used once. One instance can be reused
/// sequentially but must not be shared between concurrent runs.
///
/// See <https://developers.google.com/speed/webp/docs/cwebp>.
///
/// # Example
///
/// ```rust,no_run
/// use webpbin::{CWebP, ToolConfig};
///
/// let mut webp: Vec<u8> = Vec::new();
/// CWebP::new(ToolConfig::from_env())
///     .input_file("photo.png")
///     .quality(80)
///     .output(&mut webp)
///     .run()?;
/// # Ok::<(), whereat::At<webpbin::Error>>(())
/// ```
///
/// [`run`]: CWebP::run
pub struct CWebP<'a> {
    tool: Tool,
    input: Option<EncoderInput<'a>>,
    output: Option<Output<'a>>,
    options: EncodeOptions,
}

impl Default for CWebP<'_> {
    fn default() -> Self {
        Self::new(ToolConfig::shared().clone())
    }
}

impl<'a> CWebP<'a> {
    /// Create a controller. The binary is located on first use.
    #[must_use]
    pub fn new(config: ToolConfig) -> Self {
        Self {
            tool: Tool::new(ToolKind::Cwebp, config),
            input: None,
            output: None,
            options: EncodeOptions::default(),
        }
    }

    /// Version reported by the cwebp binary.
    pub fn version(&mut self) -> Result<String> {
        self.tool.version(&Unstoppable)
    }

    /// Underlying tool descriptor.
    #[must_use]
    pub fn tool(&self) -> &Tool {
        &self.tool
    }

    /// Options for the next run.
    #[must_use]
    pub fn options(&self) -> &EncodeOptions {
        &self.options
    }

    // === Input / output ===

    /// Encode the image file at `path`. Replaces any other input.
    pub fn input_file(&mut self, path: impl Into<PathBuf>) -> &mut Self {
        self.input = Some(EncoderInput::File(path.into()));
        self
    }

    /// Encode image bytes read from `reader`. Replaces any other input.
    pub fn input(&mut self, reader: impl Read + Send + 'a) -> &mut Self {
        self.input = Some(EncoderInput::Stream(Box::new(reader)));
        self
    }

    /// Encode an in-memory image. Replaces any other input.
    pub fn input_image(&mut self, image: impl Into<ImageRef<'a>>) -> &mut Self {
        self.input = Some(EncoderInput::Image(image.into()));
        self
    }

    /// Write the WebP file to `path`. Replaces any other output.
    pub fn output_file(&mut self, path: impl Into<PathBuf>) -> &mut Self {
        self.output = Some(Output::File(path.into()));
        self
    }

    /// Stream the WebP bytes into `writer`. Replaces any other output.
    pub fn output(&mut self, writer: &'a mut (dyn Write + Send)) -> &mut Self {
        self.output = Some(Output::Stream(writer));
        self
    }

    // === Options ===

    /// Compression factor, 0 (smallest) to 100 (best). Values above 100 are
    /// clamped. The tool default is 75.
    pub fn quality(&mut self, quality: u32) -> &mut Self {
        self.options.quality = Some(quality.min(100) as u8);
        self
    }

    /// Crop the source to the given rectangle before encoding. The rectangle
    /// must lie within the source; the tool rejects it otherwise.
    pub fn crop(&mut self, x: u32, y: u32, width: u32, height: u32) -> &mut Self {
        self.options.crop = Some(CropBox::new(x, y, width, height));
        self
    }

    /// Content-aware preset.
    pub fn preset(&mut self, preset: Preset) -> &mut Self {
        self.options.preset = Some(preset);
        self
    }

    /// Alpha plane quality, 0..=100 (clamped).
    pub fn alpha_quality(&mut self, quality: u32) -> &mut Self {
        self.options.alpha_quality = Some(quality.min(100) as u8);
        self
    }

    /// Speed/size tradeoff, 0 (fast) to 6 (slowest, smallest); clamped.
    pub fn method(&mut self, method: u32) -> &mut Self {
        self.options.method = Some(method.min(6) as u8);
        self
    }

    /// Encode losslessly.
    pub fn lossless(&mut self, lossless: bool) -> &mut Self {
        self.options.lossless = lossless;
        self
    }

    /// Near-lossless preprocessing level, 0 (max) to 100 (off); clamped.
    pub fn near_lossless(&mut self, level: u32) -> &mut Self {
        self.options.near_lossless = Some(level.min(100) as u8);
        self
    }

    /// Preserve RGB values under transparent pixels.
    pub fn exact(&mut self, exact: bool) -> &mut Self {
        self.options.exact = exact;
        self
    }

    /// Use the slower, sharper RGB to YUV conversion.
    pub fn sharp_yuv(&mut self, enable: bool) -> &mut Self {
        self.options.sharp_yuv = enable;
        self
    }

    /// Aim for an output of roughly `bytes` bytes.
    pub fn target_size(&mut self, bytes: u32) -> &mut Self {
        self.options.target_size = Some(bytes);
        self
    }

    /// Let the tool use multiple threads.
    pub fn multithreaded(&mut self, enable: bool) -> &mut Self {
        self.options.multithreaded = enable;
        self
    }

    /// Restore all options to their defaults. The resolved binary is kept.
    pub fn reset(&mut self) -> &mut Self {
        self.options = EncodeOptions::default();
        self
    }

    // === Execution ===

    /// Run cwebp with the current settings.
    pub fn run(&mut self) -> Result<()> {
        self.run_with_stop(Unstoppable)
    }

    /// Run cwebp, killing it if `stop` fires before it exits.
    pub fn run_with_stop(&mut self, stop: impl Stop) -> Result<()> {
        let input = self.input.take();
        self.input = input.as_ref().and_then(EncoderInput::retained);
        let output = self.output.take();
        self.output = output.as_ref().and_then(Output::retained);
        // Taking the options is the reset; it happens on every path.
        let options = core::mem::take(&mut self.options);

        let input = input.ok_or_else(|| at!(Error::Configuration("undefined input".into())))?;
        let output =
            output.ok_or_else(|| at!(Error::Configuration("undefined output".into())))?;

        let mut cmd = CommandLine::new();
        options.apply(&mut cmd);

        let sink = match output {
            Output::File(path) => {
                cmd.output_file(&path);
                None
            }
            Output::Stream(writer) => {
                cmd.output_stdout();
                Some(writer)
            }
        };

        match input {
            EncoderInput::File(path) => {
                cmd.input_file(&path);
            }
            EncoderInput::Stream(reader) => {
                cmd.input_stream(reader);
            }
            EncoderInput::Image(image) => {
                let png = bridge::to_png(image)?;
                cmd.input_stream(Box::new(Cursor::new(png)));
            }
        }

        let program = self.tool.resolve()?.to_path_buf();
        process::execute(&program, cmd.into_request(sink), &stop)?;
        Ok(())
    }
}
